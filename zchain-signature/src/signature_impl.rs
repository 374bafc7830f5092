// Copyright (c) 2022 The zchain developers

use crate::error::ZchainSignatureError;
use ed25519_dalek::{Signer, Verifier};
use std::{convert::TryInto, str::FromStr};
use zchain_hash::Hash;

/// Size of a public key
pub const PUBLIC_KEY_SIZE_BYTES: usize = 32;
/// Size of a keypair
pub const KEYPAIR_SIZE_BYTES: usize = 32;
/// Size of a signature
pub const SIGNATURE_SIZE_BYTES: usize = 64;

fn decode_bs58_check<const N: usize>(data: &str) -> Result<[u8; N], ZchainSignatureError> {
    let decoded = bs58::decode(data)
        .with_check(None)
        .into_vec()
        .map_err(|err| ZchainSignatureError::ParsingError(err.to_string()))?;
    decoded.as_slice().try_into().map_err(|_| {
        ZchainSignatureError::ParsingError(format!(
            "expected {} bytes, got {}",
            N,
            decoded.len()
        ))
    })
}

/// Implements bs58-check serde (human readable) / raw bytes serde for a key type.
macro_rules! bs58_serde {
    ($ty:ty, $size:expr, $expecting:literal) => {
        impl ::serde::Serialize for $ty {
            fn serialize<S: ::serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                if s.is_human_readable() {
                    s.collect_str(&self.to_bs58_check())
                } else {
                    s.serialize_bytes(&self.to_bytes())
                }
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $ty {
            fn deserialize<D: ::serde::Deserializer<'de>>(d: D) -> Result<$ty, D::Error> {
                struct KeyVisitor;

                impl<'de> ::serde::de::Visitor<'de> for KeyVisitor {
                    type Value = $ty;

                    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                        formatter.write_str($expecting)
                    }

                    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
                    where
                        E: ::serde::de::Error,
                    {
                        <$ty>::from_bs58_check(v).map_err(E::custom)
                    }

                    fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
                    where
                        E: ::serde::de::Error,
                    {
                        let bytes: &[u8; $size] = v.try_into().map_err(E::custom)?;
                        <$ty>::from_bytes(bytes).map_err(E::custom)
                    }
                }

                if d.is_human_readable() {
                    d.deserialize_str(KeyVisitor)
                } else {
                    d.deserialize_bytes(KeyVisitor)
                }
            }
        }

        impl FromStr for $ty {
            type Err = ZchainSignatureError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty>::from_bs58_check(s)
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", self.to_bs58_check())
            }
        }
    };
}

/// `KeyPair` is used for signing
#[derive(Clone)]
pub struct KeyPair(ed25519_dalek::SigningKey);

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "KeyPair({})", self.get_public_key())
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bytes() == other.0.to_bytes()
    }
}

impl Eq for KeyPair {}

impl KeyPair {
    /// Generate a new `KeyPair`
    ///
    /// # Example
    ///  ```
    /// # use zchain_signature::KeyPair;
    /// # use zchain_hash::Hash;
    /// let keypair = KeyPair::generate();
    /// let data = Hash::compute_from("Hello World!".as_bytes());
    /// let signature = keypair.sign(&data);
    /// assert!(keypair.get_public_key().verify_signature(&data, &signature).is_ok());
    /// ```
    pub fn generate() -> KeyPair {
        let mut rng = rand::rngs::OsRng;
        KeyPair(ed25519_dalek::SigningKey::generate(&mut rng))
    }

    /// Returns the Signature produced by signing the hash bytes.
    pub fn sign(&self, hash: &Hash) -> Signature {
        Signature(self.0.sign(hash.to_bytes()))
    }

    /// Return the bytes representing the keypair
    pub fn to_bytes(&self) -> [u8; KEYPAIR_SIZE_BYTES] {
        self.0.to_bytes()
    }

    /// Convert a byte array of size `KEYPAIR_SIZE_BYTES` to a `KeyPair`
    pub fn from_bytes(data: &[u8; KEYPAIR_SIZE_BYTES]) -> Result<Self, ZchainSignatureError> {
        Ok(KeyPair(ed25519_dalek::SigningKey::from_bytes(data)))
    }

    /// Get the public key of the keypair
    pub fn get_public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    /// Encode a keypair into its `base58` form
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.to_bytes()).with_check().into_string()
    }

    /// Decode a `base58` encoded keypair
    pub fn from_bs58_check(data: &str) -> Result<Self, ZchainSignatureError> {
        let bytes = decode_bs58_check::<KEYPAIR_SIZE_BYTES>(data)?;
        KeyPair::from_bytes(&bytes)
    }
}

bs58_serde!(KeyPair, KEYPAIR_SIZE_BYTES, "a base58check keypair");

/// Public key used to check if a message was encoded by the corresponding `KeyPair`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey(ed25519_dalek::VerifyingKey);

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.as_bytes().hash(state);
    }
}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.as_bytes().cmp(other.0.as_bytes())
    }
}

impl PublicKey {
    /// Checks if the `Signature` associated with data bytes
    /// was produced with the `KeyPair` associated to given `PublicKey`
    pub fn verify_signature(
        &self,
        hash: &Hash,
        signature: &Signature,
    ) -> Result<(), ZchainSignatureError> {
        self.0
            .verify(hash.to_bytes(), &signature.0)
            .map_err(|_| ZchainSignatureError::InvalidSignature)
    }

    /// Serialize a `PublicKey` using `bs58` encoding with checksum.
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.to_bytes()).with_check().into_string()
    }

    /// Serialize a `PublicKey` as bytes.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE_BYTES] {
        self.0.to_bytes()
    }

    /// Deserialize a `PublicKey` using `bs58` encoding with checksum.
    pub fn from_bs58_check(data: &str) -> Result<PublicKey, ZchainSignatureError> {
        let bytes = decode_bs58_check::<PUBLIC_KEY_SIZE_BYTES>(data)?;
        PublicKey::from_bytes(&bytes)
    }

    /// Deserialize a `PublicKey` from bytes.
    pub fn from_bytes(
        data: &[u8; PUBLIC_KEY_SIZE_BYTES],
    ) -> Result<PublicKey, ZchainSignatureError> {
        Ok(PublicKey(ed25519_dalek::VerifyingKey::from_bytes(data)?))
    }

    /// Hash of the key bytes, the identity of whoever owns the key.
    pub fn id_hash(&self) -> Hash {
        Hash::compute_from(self.0.as_bytes())
    }
}

bs58_serde!(PublicKey, PUBLIC_KEY_SIZE_BYTES, "a base58check public key");

/// Signature generated from a message and a `KeyPair`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl Signature {
    /// Serialize a `Signature` using `bs58` encoding with checksum.
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.to_bytes()).with_check().into_string()
    }

    /// Serialize a Signature as bytes.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE_BYTES] {
        self.0.to_bytes()
    }

    /// Deserialize a `Signature` using `bs58` encoding with checksum.
    pub fn from_bs58_check(data: &str) -> Result<Signature, ZchainSignatureError> {
        let bytes = decode_bs58_check::<SIGNATURE_SIZE_BYTES>(data)?;
        Signature::from_bytes(&bytes)
    }

    /// Deserialize a Signature from bytes.
    pub fn from_bytes(data: &[u8; SIGNATURE_SIZE_BYTES]) -> Result<Signature, ZchainSignatureError> {
        Ok(Signature(ed25519_dalek::Signature::from_bytes(data)))
    }
}

bs58_serde!(Signature, SIGNATURE_SIZE_BYTES, "a base58check signature");

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_example() {
        let keypair = KeyPair::generate();
        let message = "Hello World!".as_bytes();
        let hash = Hash::compute_from(message);
        let signature = keypair.sign(&hash);
        assert!(keypair
            .get_public_key()
            .verify_signature(&hash, &signature)
            .is_ok());

        let other = Hash::compute_from("Hello Moon!".as_bytes());
        assert!(keypair
            .get_public_key()
            .verify_signature(&other, &signature)
            .is_err());
    }

    #[test]
    #[serial]
    fn test_serde_keys() {
        let keypair = KeyPair::generate();
        let public_key = keypair.get_public_key();
        let serialized = serde_json::to_string(&public_key).expect("could not serialize key");
        let deserialized: PublicKey =
            serde_json::from_str(&serialized).expect("could not deserialize key");
        assert_eq!(public_key, deserialized);

        let serialized = serde_json::to_string(&keypair).expect("could not serialize keypair");
        let deserialized: KeyPair =
            serde_json::from_str(&serialized).expect("could not deserialize keypair");
        assert_eq!(keypair, deserialized);
    }

    #[test]
    #[serial]
    fn test_serde_signature() {
        let keypair = KeyPair::generate();
        let signature = keypair.sign(&Hash::compute_from("Hello World!".as_bytes()));
        let text = signature.to_string();
        let parsed = Signature::from_str(&text).expect("could not parse signature");
        assert_eq!(signature, parsed);
    }
}
