use std::borrow::Cow;

use crate::{
    error::{AbacError, Result},
    labels::{Node, NodeKind, Triple},
    storefmt::{ByteReader, Decoder, EncodeMode, Encoder, ScratchBuf, StoreFmt},
};

/// Nodes written as text: one type byte, a 4-byte little-endian length and
/// the UTF-8 body. Triple keys put the three (type, length) pairs first.
pub struct StoreFmtByString;

fn body(node: &Node) -> Cow<'_, str> {
    match node {
        Node::Uri(iri) => Cow::Borrowed(iri),
        Node::Blank(label) => Cow::Borrowed(label),
        Node::Literal(lit) => Cow::Owned(lit.to_term()),
        Node::Any => Cow::Borrowed(""),
    }
}

fn node_from_body(kind: NodeKind, bytes: &[u8]) -> Result<Node> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| AbacError::decode(format!("node body is not UTF-8: {e}")))?;
    match kind {
        NodeKind::Uri => Ok(Node::uri(text)),
        NodeKind::Blank => Ok(Node::blank(text)),
        NodeKind::Literal => Node::from_term(text),
        NodeKind::Any => Ok(Node::Any),
    }
}

fn put_info(buf: &mut ScratchBuf, kind: NodeKind, len: usize) -> Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| AbacError::validation(format!("node of {len} bytes is too large")))?;
    buf.put_u8(kind.tag())?;
    buf.put_u32_le(len)
}

fn read_info(reader: &mut ByteReader<'_>) -> Result<(NodeKind, usize)> {
    let kind = NodeKind::from_tag(reader.u8()?)?;
    let len = reader.u32_le()? as usize;
    Ok((kind, len))
}

impl Encoder for StoreFmtByString {
    fn encode_node(&self, buf: &mut ScratchBuf, node: &Node, _mode: EncodeMode) -> Result<bool> {
        let body = body(node);
        put_info(buf, node.kind(), body.len())?;
        buf.put_slice(body.as_bytes())?;
        Ok(true)
    }

    fn encode_triple(
        &self,
        buf: &mut ScratchBuf,
        triple: &Triple,
        _mode: EncodeMode,
    ) -> Result<bool> {
        let nodes = [&triple.s, &triple.p, &triple.o];
        let bodies = nodes.map(body);
        for (node, body) in nodes.iter().zip(&bodies) {
            put_info(buf, node.kind(), body.len())?;
        }
        for body in &bodies {
            buf.put_slice(body.as_bytes())?;
        }
        Ok(true)
    }
}

impl Decoder for StoreFmtByString {
    fn decode_node(&self, reader: &mut ByteReader<'_>) -> Result<Node> {
        let (kind, len) = read_info(reader)?;
        node_from_body(kind, reader.take(len)?)
    }

    fn decode_triple(&self, reader: &mut ByteReader<'_>) -> Result<Triple> {
        let infos = [read_info(reader)?, read_info(reader)?, read_info(reader)?];
        let [s, p, o] = infos;
        Ok(Triple::new(
            node_from_body(s.0, reader.take(s.1)?)?,
            node_from_body(p.0, reader.take(p.1)?)?,
            node_from_body(o.0, reader.take(o.1)?)?,
        ))
    }
}

impl StoreFmt for StoreFmtByString {
    fn name(&self) -> String {
        "by_string".to_string()
    }

    fn encoder(&self) -> &dyn Encoder {
        self
    }

    fn decoder(&self) -> &dyn Decoder {
        self
    }
}
