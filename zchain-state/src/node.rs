// Copyright (c) 2022 The zchain developers

use nom::{
    bytes::complete::take,
    error::{context, ContextError, ErrorKind, ParseError},
    multi::length_data,
    number::complete::{be_u16, be_u32, be_u64, be_u8},
    IResult,
};
use zchain_hash::{Hash, HASH_SIZE_BYTES};
use zchain_models::{Deserializer, SerializeError, Serializer};

const LEAF_TAG: u8 = 0;
const FULL_TAG: u8 = 1;
const EXTENSION_TAG: u8 = 2;

/// Number of children of a full node, one per nibble
pub const FULL_NODE_CHILDREN: usize = 16;

/// Trie path of a key: one nibble per byte
///
/// ```
/// # use zchain_state::path_from_key;
/// assert_eq!(path_from_key(&[0xab, 0x01]), vec![0xa, 0xb, 0x0, 0x1]);
/// ```
pub fn path_from_key(key: &[u8]) -> Vec<u8> {
    key.iter().flat_map(|b| [b >> 4, b & 0x0f]).collect()
}

/// A node of the Merkle-Patricia trie. The version is the round that last
/// touched the node and is not part of the node hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrieNode {
    /// remaining path and value
    Leaf {
        /// nibbles
        path: Vec<u8>,
        /// stored value
        value: Vec<u8>,
        /// round
        version: u64,
    },
    /// branch on the next nibble, optionally holding the value of its own path
    Full {
        /// child hashes by nibble
        children: [Option<Hash>; FULL_NODE_CHILDREN],
        /// value ending here
        value: Option<Vec<u8>>,
        /// round
        version: u64,
    },
    /// shared path leading to a single child
    Extension {
        /// nibbles
        path: Vec<u8>,
        /// child hash
        child: Hash,
        /// round
        version: u64,
    },
}

impl TrieNode {
    /// Round that last touched the node
    pub fn version(&self) -> u64 {
        match self {
            TrieNode::Leaf { version, .. }
            | TrieNode::Full { version, .. }
            | TrieNode::Extension { version, .. } => *version,
        }
    }

    /// Change the version, the hash is unaffected
    pub fn set_version(&mut self, new_version: u64) {
        match self {
            TrieNode::Leaf { version, .. }
            | TrieNode::Full { version, .. }
            | TrieNode::Extension { version, .. } => *version = new_version,
        }
    }

    /// Hash of the node content
    pub fn compute_hash(&self) -> Hash {
        let mut buffer = Vec::new();
        self.write_content(&mut buffer);
        Hash::compute_from(&buffer)
    }

    /// Hashes of the nodes this one points to
    pub fn child_hashes(&self) -> Vec<Hash> {
        match self {
            TrieNode::Leaf { .. } => Vec::new(),
            TrieNode::Full { children, .. } => children.iter().flatten().copied().collect(),
            TrieNode::Extension { child, .. } => vec![*child],
        }
    }

    fn write_content(&self, buffer: &mut Vec<u8>) {
        match self {
            TrieNode::Leaf { path, value, .. } => {
                buffer.push(LEAF_TAG);
                write_bytes(buffer, path);
                write_bytes(buffer, value);
            }
            TrieNode::Full {
                children, value, ..
            } => {
                buffer.push(FULL_TAG);
                let bitmap = children
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| c.is_some())
                    .fold(0u16, |acc, (i, _)| acc | (1 << i));
                buffer.extend(bitmap.to_be_bytes());
                for child in children.iter().flatten() {
                    buffer.extend(child.to_bytes());
                }
                match value {
                    Some(value) => {
                        buffer.push(1);
                        write_bytes(buffer, value);
                    }
                    None => buffer.push(0),
                }
            }
            TrieNode::Extension { path, child, .. } => {
                buffer.push(EXTENSION_TAG);
                write_bytes(buffer, path);
                buffer.extend(child.to_bytes());
            }
        }
    }
}

fn write_bytes(buffer: &mut Vec<u8>, data: &[u8]) {
    buffer.extend((data.len() as u32).to_be_bytes());
    buffer.extend(data);
}

/// Encoder of [`TrieNode`]: content followed by the version
#[derive(Default, Clone)]
pub struct TrieNodeSerializer;

impl TrieNodeSerializer {
    /// Creates a new serializer
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<TrieNode> for TrieNodeSerializer {
    fn serialize(&self, value: &TrieNode, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        let before = buffer.len();
        value.write_content(buffer);
        if buffer.len() - before > u32::MAX as usize {
            return Err(SerializeError::NumberTooBig(
                "trie node larger than 4GiB".to_string(),
            ));
        }
        buffer.extend(value.version().to_be_bytes());
        Ok(())
    }
}

/// Decoder of [`TrieNode`]
#[derive(Default, Clone)]
pub struct TrieNodeDeserializer;

impl TrieNodeDeserializer {
    /// Creates a new deserializer
    pub const fn new() -> Self {
        Self
    }
}

fn nibbles<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
    input: &'a [u8],
) -> IResult<&'a [u8], Vec<u8>, E> {
    let (rest, path) = length_data(be_u32)(input)?;
    if path.iter().any(|n| *n >= FULL_NODE_CHILDREN as u8) {
        return Err(nom::Err::Error(E::from_error_kind(input, ErrorKind::Verify)));
    }
    Ok((rest, path.to_vec()))
}

fn hash<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
    input: &'a [u8],
) -> IResult<&'a [u8], Hash, E> {
    let (rest, bytes) = take(HASH_SIZE_BYTES)(input)?;
    let hash = Hash::from_slice(bytes)
        .map_err(|_| nom::Err::Error(E::from_error_kind(input, ErrorKind::LengthValue)))?;
    Ok((rest, hash))
}

impl Deserializer<TrieNode> for TrieNodeDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], TrieNode, E> {
        let (rest, tag) = context("Failed tag deserialization", be_u8)(buffer)?;
        let (rest, node) = match tag {
            LEAF_TAG => {
                let (rest, path) = context("Failed leaf path deserialization", nibbles)(rest)?;
                let (rest, value) =
                    context("Failed leaf value deserialization", length_data(be_u32))(rest)?;
                (
                    rest,
                    TrieNode::Leaf {
                        path,
                        value: value.to_vec(),
                        version: 0,
                    },
                )
            }
            FULL_TAG => {
                let (mut rest, bitmap) =
                    context("Failed full bitmap deserialization", be_u16)(rest)?;
                let mut children = [None; FULL_NODE_CHILDREN];
                for (i, child) in children.iter_mut().enumerate() {
                    if bitmap & (1 << i) != 0 {
                        let (r, h) = context("Failed full child deserialization", hash)(rest)?;
                        *child = Some(h);
                        rest = r;
                    }
                }
                let (rest, has_value) = be_u8(rest)?;
                let (rest, value) = if has_value == 1 {
                    let (rest, value) =
                        context("Failed full value deserialization", length_data(be_u32))(rest)?;
                    (rest, Some(value.to_vec()))
                } else {
                    (rest, None)
                };
                (
                    rest,
                    TrieNode::Full {
                        children,
                        value,
                        version: 0,
                    },
                )
            }
            EXTENSION_TAG => {
                let (rest, path) =
                    context("Failed extension path deserialization", nibbles)(rest)?;
                let (rest, child) =
                    context("Failed extension child deserialization", hash)(rest)?;
                (
                    rest,
                    TrieNode::Extension {
                        path,
                        child,
                        version: 0,
                    },
                )
            }
            _ => return Err(nom::Err::Error(E::from_error_kind(buffer, ErrorKind::Tag))),
        };
        let (rest, version) = context("Failed version deserialization", be_u64)(rest)?;
        let mut node = node;
        node.set_version(version);
        Ok((rest, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nom::error::VerboseError;

    fn decode(buffer: &[u8]) -> TrieNode {
        let (rest, node) = TrieNodeDeserializer::new()
            .deserialize::<VerboseError<&[u8]>>(buffer)
            .unwrap();
        assert!(rest.is_empty());
        node
    }

    #[test]
    fn test_codec_keeps_version_and_hash_ignores_it() {
        let mut children = [None; FULL_NODE_CHILDREN];
        children[3] = Some(Hash::compute_from(b"a"));
        children[15] = Some(Hash::compute_from(b"b"));
        let nodes = vec![
            TrieNode::Leaf {
                path: vec![1, 2, 3],
                value: b"value".to_vec(),
                version: 7,
            },
            TrieNode::Full {
                children,
                value: Some(b"here".to_vec()),
                version: 9,
            },
            TrieNode::Extension {
                path: vec![0xf],
                child: Hash::compute_from(b"c"),
                version: 11,
            },
        ];
        for node in nodes {
            let mut buffer = Vec::new();
            TrieNodeSerializer::new().serialize(&node, &mut buffer).unwrap();
            let decoded = decode(&buffer);
            assert_eq!(decoded, node);

            let mut bumped = node.clone();
            bumped.set_version(1000);
            assert_eq!(bumped.compute_hash(), node.compute_hash());
        }
    }

    #[test]
    fn test_rejects_invalid_nibble() {
        let node = TrieNode::Leaf {
            path: vec![16],
            value: vec![],
            version: 0,
        };
        let mut buffer = Vec::new();
        TrieNodeSerializer::new().serialize(&node, &mut buffer).unwrap();
        assert!(TrieNodeDeserializer::new()
            .deserialize::<VerboseError<&[u8]>>(&buffer)
            .is_err());
    }
}
