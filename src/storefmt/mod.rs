//! Byte encodings for nodes, triples and label lists.
//!
//! All formats share the label-list value layout: a 4-byte little-endian
//! count, then that many 4-byte lengths, then the UTF-8 bytes of each label.
//! A value may hold several such records back to back (merge mode).

pub mod buffer;
pub mod by_hash;
pub mod by_node_id;
pub mod by_string;
pub mod node_table;

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

pub use buffer::{BufferPool, ByteReader, DEFAULT_BUFFER_CAPACITY, PooledBuf, ScratchBuf};
pub use by_hash::{HashAlgorithm, StoreFmtByHash};
pub use by_node_id::StoreFmtByNodeId;
pub use by_string::StoreFmtByString;
pub use node_table::{MemNodeTable, NodeTable};

use crate::{
    error::{AbacError, Result},
    labels::{Charset, Label, Node, Triple},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeMode {
    /// Writing: node ids may be allocated.
    Store,
    /// Reading: unknown nodes cannot match anything.
    Lookup,
}

pub trait Encoder: Send + Sync {
    /// Append `node`. Returns `false` when a lookup can already tell the
    /// node was never stored.
    fn encode_node(&self, buf: &mut ScratchBuf, node: &Node, mode: EncodeMode) -> Result<bool>;

    fn encode_triple(
        &self,
        buf: &mut ScratchBuf,
        triple: &Triple,
        mode: EncodeMode,
    ) -> Result<bool> {
        Ok(self.encode_node(buf, &triple.s, mode)?
            && self.encode_node(buf, &triple.p, mode)?
            && self.encode_node(buf, &triple.o, mode)?)
    }

    fn encode_labels(&self, buf: &mut ScratchBuf, labels: &[Label]) -> Result<()> {
        encode_label_list(buf, labels)
    }
}

pub trait Decoder: Send + Sync {
    fn decode_node(&self, reader: &mut ByteReader<'_>) -> Result<Node>;

    fn decode_triple(&self, reader: &mut ByteReader<'_>) -> Result<Triple> {
        let s = self.decode_node(reader)?;
        let p = self.decode_node(reader)?;
        let o = self.decode_node(reader)?;
        Ok(Triple::new(s, p, o))
    }

    fn decode_labels(&self, bytes: &[u8]) -> Result<Vec<Label>> {
        decode_label_records(bytes)
    }
}

/// An encoder/decoder pair.
pub trait StoreFmt: Send + Sync {
    fn name(&self) -> String;

    fn encoder(&self) -> &dyn Encoder;

    fn decoder(&self) -> &dyn Decoder;

    /// Whether keys can be decoded back into nodes.
    fn is_reversible(&self) -> bool {
        true
    }
}

/// Which encoding a persistent store uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreFormat {
    #[default]
    ByString,
    ByNodeId,
    ByHash {
        #[serde(default)]
        algorithm: HashAlgorithm,
    },
}

impl StoreFormat {
    /// Build the format. By-node-id keys resolve through `nodes`.
    pub fn build(self, nodes: Option<Arc<dyn NodeTable>>) -> Result<Box<dyn StoreFmt>> {
        Ok(match self {
            StoreFormat::ByString => Box::new(StoreFmtByString),
            StoreFormat::ByNodeId => {
                let nodes = nodes.ok_or_else(|| {
                    AbacError::validation("by-node-id format needs a node table")
                })?;
                Box::new(StoreFmtByNodeId::new(nodes))
            }
            StoreFormat::ByHash { algorithm } => Box::new(StoreFmtByHash::new(algorithm)),
        })
    }
}

impl fmt::Display for StoreFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreFormat::ByString => f.write_str("by_string"),
            StoreFormat::ByNodeId => f.write_str("by_node_id"),
            StoreFormat::ByHash { algorithm } => write!(f, "by_hash:{algorithm}"),
        }
    }
}

fn len_u32(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| AbacError::validation(format!("length {len} does not fit in 4 bytes")))
}

pub fn encode_label_list(buf: &mut ScratchBuf, labels: &[Label]) -> Result<()> {
    let bodies: Vec<_> = labels.iter().map(Label::utf8_bytes).collect();
    buf.put_u32_le(len_u32(bodies.len())?)?;
    for body in &bodies {
        buf.put_u32_le(len_u32(body.len())?)?;
    }
    for body in &bodies {
        buf.put_slice(body)?;
    }
    Ok(())
}

/// Read one label-list record.
pub fn decode_label_list(reader: &mut ByteReader<'_>) -> Result<Vec<Label>> {
    let count = reader.u32_le()? as usize;
    if count.saturating_mul(4) > reader.remaining() {
        return Err(AbacError::decode(format!(
            "label count {count} exceeds the stored bytes"
        )));
    }
    let mut lengths = Vec::with_capacity(count);
    for _ in 0..count {
        lengths.push(reader.u32_le()? as usize);
    }
    lengths
        .into_iter()
        .map(|len| Ok(Label::from_bytes(reader.take(len)?, Charset::Utf8)))
        .collect()
}

/// Read every record in a value, keeping the first occurrence of each label.
pub fn decode_label_records(bytes: &[u8]) -> Result<Vec<Label>> {
    let mut reader = ByteReader::new(bytes);
    let mut labels: Vec<Label> = Vec::new();
    while !reader.is_empty() {
        for label in decode_label_list(&mut reader)? {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
    }
    Ok(labels)
}
