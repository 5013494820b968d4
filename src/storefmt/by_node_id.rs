use std::sync::Arc;

use crate::{
    error::{AbacError, Result},
    labels::{Node, NodeKind},
    storefmt::{ByteReader, Decoder, EncodeMode, Encoder, NodeTable, ScratchBuf, StoreFmt},
};

/// Width of the id that follows the top byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdSize {
    OneByte = 0,
    TwoBytes = 1,
    FourBytes = 2,
    EightBytes = 3,
}

impl IdSize {
    fn for_id(id: i64) -> Self {
        let magnitude = id.unsigned_abs();
        if magnitude <= i8::MAX as u64 {
            IdSize::OneByte
        } else if magnitude <= i16::MAX as u64 {
            IdSize::TwoBytes
        } else if magnitude <= i32::MAX as u64 {
            IdSize::FourBytes
        } else {
            IdSize::EightBytes
        }
    }

    fn from_ordinal(ordinal: u8) -> Result<Self> {
        match ordinal {
            0 => Ok(IdSize::OneByte),
            1 => Ok(IdSize::TwoBytes),
            2 => Ok(IdSize::FourBytes),
            3 => Ok(IdSize::EightBytes),
            other => Err(AbacError::decode(format!("unknown id size {other}"))),
        }
    }

    fn width(self) -> usize {
        match self {
            IdSize::OneByte => 1,
            IdSize::TwoBytes => 2,
            IdSize::FourBytes => 4,
            IdSize::EightBytes => 8,
        }
    }
}

/// Nodes written as ids from a [`NodeTable`]: a top byte holding the node
/// kind in the high nibble and the id width in the low one, then the id in
/// little-endian order. The wildcard has no id.
pub struct StoreFmtByNodeId {
    nodes: Arc<dyn NodeTable>,
}

impl StoreFmtByNodeId {
    pub fn new(nodes: Arc<dyn NodeTable>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &Arc<dyn NodeTable> {
        &self.nodes
    }
}

fn top_byte(kind: NodeKind, size: IdSize) -> u8 {
    (kind.tag() << 4) | size as u8
}

impl Encoder for StoreFmtByNodeId {
    fn encode_node(&self, buf: &mut ScratchBuf, node: &Node, mode: EncodeMode) -> Result<bool> {
        if let Node::Any = node {
            buf.put_u8(top_byte(NodeKind::Any, IdSize::OneByte))?;
            return Ok(true);
        }
        let id = match mode {
            EncodeMode::Store => self.nodes.get_or_allocate(node)?,
            EncodeMode::Lookup => match self.nodes.id_for(node) {
                Some(id) => id,
                None => return Ok(false),
            },
        };
        let id = i64::try_from(id)
            .map_err(|_| AbacError::validation(format!("node id {id} out of range")))?;
        let size = IdSize::for_id(id);
        buf.put_u8(top_byte(node.kind(), size))?;
        buf.put_slice(&id.to_le_bytes()[..size.width()])?;
        Ok(true)
    }
}

impl Decoder for StoreFmtByNodeId {
    fn decode_node(&self, reader: &mut ByteReader<'_>) -> Result<Node> {
        let top = reader.u8()?;
        let kind = NodeKind::from_tag(top >> 4)?;
        if kind == NodeKind::Any {
            return Ok(Node::Any);
        }
        let size = IdSize::from_ordinal(top & 0x0f)?;
        let id = reader.int_le(size.width())?;
        let node = u64::try_from(id)
            .ok()
            .and_then(|id| self.nodes.node_for(id))
            .ok_or_else(|| AbacError::decode(format!("unknown node id {id}")))?;
        if node.kind() != kind {
            return Err(AbacError::decode(format!(
                "node id {id} is a {:?}, key says {kind:?}",
                node.kind()
            )));
        }
        Ok(node)
    }
}

impl StoreFmt for StoreFmtByNodeId {
    fn name(&self) -> String {
        "by_node_id".to_string()
    }

    fn encoder(&self) -> &dyn Encoder {
        self
    }

    fn decoder(&self) -> &dyn Decoder {
        self
    }
}
