use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use xxhash_rust::{xxh3::xxh3_128, xxh32::xxh32, xxh64::xxh64};

use crate::{
    error::{AbacError, Result},
    labels::Node,
    storefmt::{ByteReader, Decoder, EncodeMode, Encoder, ScratchBuf, StoreFmt},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Xx32,
    Xx64,
    #[default]
    Xx128,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    pub fn digest_len(self) -> usize {
        match self {
            HashAlgorithm::Xx32 => 4,
            HashAlgorithm::Xx64 => 8,
            HashAlgorithm::Xx128 => 16,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha512 => 64,
        }
    }

    fn put_digest(self, buf: &mut ScratchBuf, bytes: &[u8]) -> Result<()> {
        match self {
            HashAlgorithm::Xx32 => buf.put_slice(&xxh32(bytes, 0).to_be_bytes()),
            HashAlgorithm::Xx64 => buf.put_slice(&xxh64(bytes, 0).to_be_bytes()),
            HashAlgorithm::Xx128 => buf.put_slice(&xxh3_128(bytes).to_be_bytes()),
            HashAlgorithm::Sha256 => buf.put_slice(&Sha256::digest(bytes)),
            HashAlgorithm::Sha512 => buf.put_slice(&Sha512::digest(bytes)),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HashAlgorithm::Xx32 => "xx32",
            HashAlgorithm::Xx64 => "xx64",
            HashAlgorithm::Xx128 => "xx128",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        })
    }
}

/// Nodes written as a fixed-length digest of their term form.
/// Keys cannot be turned back into nodes.
pub struct StoreFmtByHash {
    algorithm: HashAlgorithm,
}

impl StoreFmtByHash {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

impl Encoder for StoreFmtByHash {
    fn encode_node(&self, buf: &mut ScratchBuf, node: &Node, _mode: EncodeMode) -> Result<bool> {
        match node {
            Node::Any => self.algorithm.put_digest(buf, b"*")?,
            node => self.algorithm.put_digest(buf, node.to_term().as_bytes())?,
        }
        Ok(true)
    }
}

impl Decoder for StoreFmtByHash {
    fn decode_node(&self, _reader: &mut ByteReader<'_>) -> Result<Node> {
        Err(AbacError::unsupported("decoding hashed node keys"))
    }
}

impl StoreFmt for StoreFmtByHash {
    fn name(&self) -> String {
        format!("by_hash:{}", self.algorithm)
    }

    fn encoder(&self) -> &dyn Encoder {
        self
    }

    fn decoder(&self) -> &dyn Decoder {
        self
    }

    fn is_reversible(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        labels::{Triple, label::labels},
        storefmt::StoreFormat,
    };

    #[test]
    fn digest_lengths() {
        for (algorithm, len) in [
            (HashAlgorithm::Xx32, 4),
            (HashAlgorithm::Xx64, 8),
            (HashAlgorithm::Xx128, 16),
            (HashAlgorithm::Sha256, 32),
            (HashAlgorithm::Sha512, 64),
        ] {
            assert_eq!(algorithm.digest_len(), len);
            let fmt = StoreFmtByHash::new(algorithm);
            let mut buf = ScratchBuf::with_capacity(256);
            let t = Triple::new(Node::uri("s"), Node::uri("p"), Node::Any);
            fmt.encode_triple(&mut buf, &t, EncodeMode::Store).unwrap();
            assert_eq!(buf.len(), 3 * algorithm.digest_len());
        }
    }

    #[test]
    fn xx128_is_the_default() {
        assert_eq!(HashAlgorithm::default(), HashAlgorithm::Xx128);
        let parsed: StoreFormat = serde_json::from_str(r#"{"by_hash": {}}"#).unwrap();
        assert_eq!(
            parsed,
            StoreFormat::ByHash {
                algorithm: HashAlgorithm::Xx128
            }
        );
        assert_eq!(parsed.to_string(), "by_hash:xx128");
    }

    #[test]
    fn xx_keys_are_compact() {
        let fmt = StoreFmtByHash::new(HashAlgorithm::Xx64);
        let mut buf = ScratchBuf::with_capacity(64);
        let long = Node::uri(&format!("http://example/{}", "x".repeat(200)));
        fmt.encode_node(&mut buf, &long, EncodeMode::Store).unwrap();
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn equal_nodes_equal_keys() {
        let fmt = StoreFmtByHash::new(HashAlgorithm::Xx128);
        let key = |node: &Node| {
            let mut buf = ScratchBuf::with_capacity(64);
            fmt.encode_node(&mut buf, node, EncodeMode::Lookup).unwrap();
            buf.to_vec()
        };
        assert_eq!(key(&Node::uri("a")), key(&Node::uri("a")));
        assert_ne!(key(&Node::uri("a")), key(&Node::literal("a")));
        assert_ne!(key(&Node::uri("a")), key(&Node::Any));
    }

    #[test]
    fn keys_are_one_way() {
        let fmt = StoreFmtByHash::new(HashAlgorithm::Sha512);
        assert!(!fmt.is_reversible());
        let err = fmt.decode_node(&mut ByteReader::new(&[0; 64])).unwrap_err();
        assert!(err.is_unsupported());
        assert_eq!(fmt.name(), "by_hash:sha512");
    }

    #[test]
    fn labels_still_round_trip() {
        let fmt = StoreFmtByHash::new(HashAlgorithm::Sha256);
        let mut buf = ScratchBuf::with_capacity(64);
        let list = labels(&["role=admin"]);
        fmt.encode_labels(&mut buf, &list).unwrap();
        assert_eq!(fmt.decode_labels(buf.as_slice()).unwrap(), list);
    }

    #[test]
    fn algorithm_names() {
        assert_eq!(
            serde_json::to_string(&HashAlgorithm::Sha512).unwrap(),
            "\"sha512\""
        );
        let parsed: HashAlgorithm = serde_json::from_str("\"sha256\"").unwrap();
        assert_eq!(parsed, HashAlgorithm::Sha256);
        let parsed: HashAlgorithm = serde_json::from_str("\"xx32\"").unwrap();
        assert_eq!(parsed, HashAlgorithm::Xx32);
    }
}
