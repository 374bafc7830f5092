// Copyright (c) 2022 The zchain developers

use crate::error::ZchainHashError;
use crate::settings::HASH_SIZE_BYTES;
use sha2::{Digest, Sha256};
use std::{convert::TryInto, str::FromStr};

/// SHA-256 digest. Blocks, clients, magic blocks and trie nodes are all keyed by one.
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Hash, Default)]
pub struct Hash([u8; HASH_SIZE_BYTES]);

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl Hash {
    /// The all-zero hash, used as the "no value" marker (empty trie root, genesis parent).
    pub const ZERO: Hash = Hash([0u8; HASH_SIZE_BYTES]);

    /// Compute a hash from data.
    ///
    /// # Example
    ///  ```
    /// # use zchain_hash::Hash;
    /// let hash = Hash::compute_from(&"hello world".as_bytes());
    /// ```
    pub fn compute_from(data: &[u8]) -> Self {
        Hash(Sha256::digest(data).into())
    }

    /// Compute a hash over several byte slices, as if they were concatenated.
    ///
    /// # Example
    ///  ```
    /// # use zchain_hash::Hash;
    /// let a = Hash::compute_from_tuple(&[b"hello ", b"world"]);
    /// assert_eq!(a, Hash::compute_from(b"hello world"));
    /// ```
    pub fn compute_from_tuple(data: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for chunk in data {
            hasher.update(chunk);
        }
        Hash(hasher.finalize().into())
    }

    /// Returns true for [`Hash::ZERO`].
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_SIZE_BYTES]
    }

    /// Serialize a Hash using bs58 encoding with checksum.
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.to_bytes()).with_check().into_string()
    }

    /// Serialize a Hash as bytes.
    pub fn to_bytes(&self) -> &[u8; HASH_SIZE_BYTES] {
        &self.0
    }

    /// Convert into bytes.
    pub fn into_bytes(self) -> [u8; HASH_SIZE_BYTES] {
        self.0
    }

    /// Deserialize using bs58 encoding with checksum.
    ///
    /// # Example
    ///  ```
    /// # use zchain_hash::Hash;
    /// let hash = Hash::compute_from(&"hello world".as_bytes());
    /// let serialized: String = hash.to_bs58_check();
    /// let deserialized: Hash = Hash::from_bs58_check(&serialized).unwrap();
    /// assert_eq!(hash, deserialized);
    /// ```
    pub fn from_bs58_check(data: &str) -> Result<Hash, ZchainHashError> {
        let decoded_bs58_check = bs58::decode(data)
            .with_check(None)
            .into_vec()
            .map_err(|err| ZchainHashError::ParsingError(format!("{}", err)))?;
        Hash::from_slice(&decoded_bs58_check)
    }

    /// Deserialize a Hash as bytes.
    pub fn from_bytes(data: &[u8; HASH_SIZE_BYTES]) -> Hash {
        Hash(*data)
    }

    /// Deserialize a Hash from a slice that must be exactly `HASH_SIZE_BYTES` long.
    pub fn from_slice(data: &[u8]) -> Result<Hash, ZchainHashError> {
        let bytes: [u8; HASH_SIZE_BYTES] =
            data.try_into()
                .map_err(|_| ZchainHashError::WrongLength {
                    expected: HASH_SIZE_BYTES,
                    got: data.len(),
                })?;
        Ok(Hash(bytes))
    }
}

impl ::serde::Serialize for Hash {
    /// Human readable serializers get the bs58 check string, binary ones the raw bytes.
    fn serialize<S: ::serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            s.collect_str(&self.to_bs58_check())
        } else {
            s.serialize_bytes(self.to_bytes())
        }
    }
}

impl<'de> ::serde::Deserialize<'de> for Hash {
    fn deserialize<D: ::serde::Deserializer<'de>>(d: D) -> Result<Hash, D::Error> {
        if d.is_human_readable() {
            struct Base58CheckVisitor;

            impl<'de> ::serde::de::Visitor<'de> for Base58CheckVisitor {
                type Value = Hash;

                fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("an ASCII base58check string")
                }

                fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
                where
                    E: ::serde::de::Error,
                {
                    if let Ok(v_str) = std::str::from_utf8(v) {
                        Hash::from_bs58_check(v_str).map_err(E::custom)
                    } else {
                        Err(E::invalid_value(::serde::de::Unexpected::Bytes(v), &self))
                    }
                }

                fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
                where
                    E: ::serde::de::Error,
                {
                    Hash::from_bs58_check(v).map_err(E::custom)
                }
            }
            d.deserialize_str(Base58CheckVisitor)
        } else {
            struct BytesVisitor;

            impl<'de> ::serde::de::Visitor<'de> for BytesVisitor {
                type Value = Hash;

                fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("a bytestring")
                }

                fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
                where
                    E: ::serde::de::Error,
                {
                    Hash::from_slice(v).map_err(E::custom)
                }
            }

            d.deserialize_bytes(BytesVisitor)
        }
    }
}

impl FromStr for Hash {
    type Err = ZchainHashError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::from_bs58_check(s)
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn example() -> Hash {
        Hash::compute_from("hello world".as_bytes())
    }

    #[test]
    #[serial]
    fn test_serde_json() {
        let hash = example();
        let serialized = serde_json::to_string(&hash).unwrap();
        let deserialized = serde_json::from_str(&serialized).unwrap();
        assert_eq!(hash, deserialized)
    }

    #[test]
    #[serial]
    fn test_hash() {
        let data = "abc".as_bytes();
        let hash = Hash::compute_from(data);
        let hash_ref: [u8; HASH_SIZE_BYTES] = [
            186, 120, 22, 191, 143, 1, 207, 234, 65, 65, 64, 222, 93, 174, 34, 35, 176, 3, 97, 163,
            150, 23, 122, 156, 180, 16, 255, 97, 242, 0, 21, 173,
        ];
        assert_eq!(hash.to_bytes(), &hash_ref);
    }

    #[test]
    fn test_from_slice_wrong_length() {
        let err = Hash::from_slice(&[1u8; 12]).unwrap_err();
        assert!(matches!(
            err,
            ZchainHashError::WrongLength {
                expected: HASH_SIZE_BYTES,
                got: 12
            }
        ));
        assert!(Hash::ZERO.is_zero());
        assert!(!example().is_zero());
    }
}
