pub mod label;
pub mod mem;
pub mod node;
pub mod pattern;
pub mod txn;
pub mod zero;

use std::collections::BTreeMap;

pub use label::{ALLOW_LABEL, Charset, DENY_LABEL, Label, validate_labels};
pub use mem::LabelsStoreMem;
pub use node::{Literal, Node, NodeKind, Triple, TriplePattern};
pub use pattern::{PRIORITY, PatternShape};
pub use txn::{BatchOp, Transactional, Txn, TxnMode, TxnType, WriteBatch};
pub use zero::LabelsStoreZero;

use crate::error::Result;

/// Maps triples and triple patterns to labels.
///
/// Writes go through [`Txn`]; the plain `add`/`remove` methods run in their
/// own write transaction and must not be called while this thread holds one.
pub trait LabelsStore: Send + Sync {
    /// Labels for a concrete triple, resolved by [`PRIORITY`].
    /// An empty list means nothing is recorded for it.
    fn labels_for_triple(&self, triple: &Triple) -> Result<Vec<Label>>;

    fn transactional(&self) -> &Transactional;

    /// Make a committed batch visible. Called with the writer slot held.
    fn apply(&self, batch: WriteBatch) -> Result<()>;

    fn for_each(&self, f: &mut dyn FnMut(&Triple, &[Label])) -> Result<()>;

    fn is_empty(&self) -> Result<bool>;

    /// Checks run when an entry is added to a batch.
    fn check_entry(&self, pattern: &Triple, labels: &[Label]) -> Result<()> {
        PatternShape::of(pattern)?;
        validate_labels(labels)
    }

    fn supports_remove(&self) -> bool {
        true
    }

    fn add(&self, pattern: &Triple, labels: &[Label]) -> Result<()> {
        let mut txn = Txn::begin(self, TxnType::Write)?;
        txn.add(pattern, labels)?;
        txn.commit()
    }

    fn remove(&self, triple: &Triple) -> Result<()> {
        let mut txn = Txn::begin(self, TxnType::Write)?;
        txn.remove(triple)?;
        txn.commit()
    }

    /// Every entry, patterns included.
    fn as_graph(&self) -> Result<Vec<(Triple, Vec<Label>)>> {
        let mut entries = Vec::new();
        self.for_each(&mut |pattern, labels| entries.push((pattern.clone(), labels.to_vec())))?;
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    fn properties(&self) -> Result<BTreeMap<String, String>> {
        Ok(BTreeMap::new())
    }

    fn as_compaction(&self) -> Option<&dyn SupportsCompaction> {
        None
    }
}

/// Stores whose on-disk footprint can be reclaimed.
pub trait SupportsCompaction {
    fn compact(&self) -> Result<()>;
}

/// Compact `store` if it can be compacted. Returns whether it was.
pub fn compact_if_supported(store: &dyn LabelsStore) -> Result<bool> {
    match store.as_compaction() {
        Some(compaction) => {
            compaction.compact()?;
            Ok(true)
        }
        None => Ok(false),
    }
}
