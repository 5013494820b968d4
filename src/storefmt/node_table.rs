use std::collections::HashMap;

use parking_lot::RwLock;

use crate::{
    error::{AbacError, Result},
    labels::Node,
};

/// Two-way mapping between nodes and the integer ids used in keys.
pub trait NodeTable: Send + Sync {
    fn get_or_allocate(&self, node: &Node) -> Result<u64>;

    fn id_for(&self, node: &Node) -> Option<u64>;

    fn node_for(&self, id: u64) -> Option<Node>;
}

#[derive(Default)]
struct Ids {
    ids: HashMap<Node, u64>,
    /// `nodes[i]` has id `i + 1`.
    nodes: Vec<Node>,
}

/// Node table held in memory. Persistent stores save the ids allocated
/// since their last commit and reload them with [`MemNodeTable::load`].
#[derive(Default)]
pub struct MemNodeTable {
    inner: RwLock<Ids>,
}

impl MemNodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest id handed out so far.
    pub fn watermark(&self) -> u64 {
        self.len() as u64
    }

    /// Ids allocated after `watermark`, in order.
    pub fn allocated_since(&self, watermark: u64) -> Vec<(u64, Node)> {
        let inner = self.inner.read();
        let start = (watermark as usize).min(inner.nodes.len());
        inner.nodes[start..]
            .iter()
            .enumerate()
            .map(|(i, node)| ((start + i + 1) as u64, node.clone()))
            .collect()
    }

    /// Forget ids allocated after `watermark`.
    pub fn truncate(&self, watermark: u64) {
        let mut inner = self.inner.write();
        let keep = (watermark as usize).min(inner.nodes.len());
        let dropped: Vec<Node> = inner.nodes.drain(keep..).collect();
        for node in dropped {
            inner.ids.remove(&node);
        }
    }

    /// Restore saved ids, which must be dense and in order.
    pub fn load(&self, entries: impl IntoIterator<Item = (u64, Node)>) -> Result<()> {
        let mut inner = self.inner.write();
        for (id, node) in entries {
            let expected = inner.nodes.len() as u64 + 1;
            if id != expected {
                return Err(AbacError::decode(format!(
                    "node table gap: expected id {expected}, found {id}"
                )));
            }
            inner.ids.insert(node.clone(), id);
            inner.nodes.push(node);
        }
        Ok(())
    }
}

impl NodeTable for MemNodeTable {
    fn get_or_allocate(&self, node: &Node) -> Result<u64> {
        if let Some(id) = self.id_for(node) {
            return Ok(id);
        }
        let mut inner = self.inner.write();
        // Another writer may have got here first.
        if let Some(&id) = inner.ids.get(node) {
            return Ok(id);
        }
        let id = inner.nodes.len() as u64 + 1;
        inner.ids.insert(node.clone(), id);
        inner.nodes.push(node.clone());
        Ok(id)
    }

    fn id_for(&self, node: &Node) -> Option<u64> {
        self.inner.read().ids.get(node).copied()
    }

    fn node_for(&self, id: u64) -> Option<Node> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.inner.read().nodes.get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable() {
        let table = MemNodeTable::new();
        let a = table.get_or_allocate(&Node::uri("a")).unwrap();
        let b = table.get_or_allocate(&Node::uri("b")).unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(table.get_or_allocate(&Node::uri("a")).unwrap(), 1);
        assert_eq!(table.node_for(2), Some(Node::uri("b")));
        assert_eq!(table.node_for(0), None);
        assert_eq!(table.id_for(&Node::uri("c")), None);
    }

    #[test]
    fn reload_after_watermark() {
        let table = MemNodeTable::new();
        table.get_or_allocate(&Node::uri("a")).unwrap();
        let mark = table.watermark();
        table.get_or_allocate(&Node::literal("x")).unwrap();
        let fresh = table.allocated_since(mark);
        assert_eq!(fresh, vec![(2, Node::literal("x"))]);

        let copy = MemNodeTable::new();
        copy.load(table.allocated_since(0)).unwrap();
        assert_eq!(copy.id_for(&Node::literal("x")), Some(2));
    }

    #[test]
    fn truncate_forgets_uncommitted_ids() {
        let table = MemNodeTable::new();
        table.get_or_allocate(&Node::uri("a")).unwrap();
        table.get_or_allocate(&Node::uri("b")).unwrap();
        table.truncate(1);
        assert_eq!(table.id_for(&Node::uri("b")), None);
        assert_eq!(table.get_or_allocate(&Node::uri("c")).unwrap(), 2);
    }

    #[test]
    fn gaps_rejected() {
        let table = MemNodeTable::new();
        assert!(table.load([(2, Node::uri("a"))]).is_err());
    }
}
