use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::{
    error::{AbacError, Result},
    labels::{Label, LabelsStore, Triple},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnType {
    Read,
    Write,
    /// Starts as a reader and may become the writer.
    ReadPromote,
    ReadCommittedPromote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnMode {
    Read,
    Write,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Add { pattern: Triple, labels: Vec<Label> },
    Remove(Triple),
}

/// Pending writes of one transaction.
#[derive(Debug, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn push(&mut self, op: BatchOp) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

impl IntoIterator for WriteBatch {
    type Item = BatchOp;
    type IntoIter = std::vec::IntoIter<BatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

/// Writer slot of a store: any number of readers, one writer.
#[derive(Default)]
pub struct Transactional {
    writer: Mutex<()>,
    commits: AtomicU64,
}

impl Transactional {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed write transactions.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Acquire)
    }

    pub fn is_writer_active(&self) -> bool {
        self.writer.is_locked()
    }
}

/// A transaction against a labels store.
///
/// Reads always see committed state; a writer does not see its own batch
/// until `commit`. Dropping an unfinished transaction aborts it.
pub struct Txn<'a, S: LabelsStore + ?Sized> {
    store: &'a S,
    txn_type: TxnType,
    mode: TxnMode,
    writer: Option<MutexGuard<'a, ()>>,
    batch: WriteBatch,
    finished: bool,
}

impl<'a, S: LabelsStore + ?Sized> Txn<'a, S> {
    pub fn begin(store: &'a S, txn_type: TxnType) -> Result<Self> {
        let (mode, writer) = match txn_type {
            TxnType::ReadCommittedPromote => {
                return Err(AbacError::unsupported(
                    "READ_COMMITTED_PROMOTE transactions",
                ));
            }
            TxnType::Write => (TxnMode::Write, Some(store.transactional().writer.lock())),
            TxnType::Read | TxnType::ReadPromote => (TxnMode::Read, None),
        };
        Ok(Self {
            store,
            txn_type,
            mode,
            writer,
            batch: WriteBatch::default(),
            finished: false,
        })
    }

    pub fn txn_type(&self) -> TxnType {
        self.txn_type
    }

    pub fn mode(&self) -> TxnMode {
        self.mode
    }

    /// Become the writer. `Ok(false)` when another writer holds the slot.
    pub fn promote(&mut self) -> Result<bool> {
        if self.mode == TxnMode::Write {
            return Ok(true);
        }
        match self.txn_type {
            TxnType::ReadPromote => match self.store.transactional().writer.try_lock() {
                Some(guard) => {
                    self.writer = Some(guard);
                    self.mode = TxnMode::Write;
                    Ok(true)
                }
                None => Ok(false),
            },
            _ => Err(AbacError::consistency(
                "cannot promote a READ transaction to write",
            )),
        }
    }

    fn ensure_write(&mut self) -> Result<()> {
        if self.finished {
            return Err(AbacError::consistency("transaction already finished"));
        }
        if self.promote()? {
            Ok(())
        } else {
            Err(AbacError::consistency(
                "cannot promote: another write transaction is active",
            ))
        }
    }

    pub fn labels_for_triple(&self, triple: &Triple) -> Result<Vec<Label>> {
        self.store.labels_for_triple(triple)
    }

    pub fn add(&mut self, pattern: &Triple, labels: &[Label]) -> Result<()> {
        self.ensure_write()?;
        self.store.check_entry(pattern, labels)?;
        self.batch.push(BatchOp::Add {
            pattern: pattern.clone(),
            labels: labels.to_vec(),
        });
        Ok(())
    }

    pub fn remove(&mut self, triple: &Triple) -> Result<()> {
        self.ensure_write()?;
        if !self.store.supports_remove() {
            log::warn!("remove of {triple} refused: store is append-only");
            return Err(AbacError::unsupported("remove on an append-only labels store"));
        }
        self.batch.push(BatchOp::Remove(triple.clone()));
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        if self.mode == TxnMode::Read {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.batch);
        if !batch.is_empty() {
            self.store.apply(batch)?;
        }
        self.store
            .transactional()
            .commits
            .fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    pub fn abort(mut self) {
        self.finished = true;
        self.batch.clear();
    }
}

impl<S: LabelsStore + ?Sized> Drop for Txn<'_, S> {
    fn drop(&mut self) {
        if !self.finished && !self.batch.is_empty() {
            log::debug!(
                "discarding {} uncommitted labels operations",
                self.batch.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::{LabelsStoreMem, Node, label::labels};

    fn triple(o: &str) -> Triple {
        Triple::new(Node::uri("s"), Node::uri("p"), Node::literal(o))
    }

    #[test]
    fn read_committed_promote_rejected() {
        let store = LabelsStoreMem::new();
        let err = Txn::begin(&store, TxnType::ReadCommittedPromote).err().unwrap();
        assert!(err.is_unsupported());
    }

    #[test]
    fn read_cannot_promote() {
        let store = LabelsStoreMem::new();
        let mut txn = Txn::begin(&store, TxnType::Read).unwrap();
        assert!(matches!(txn.promote(), Err(AbacError::Consistency { .. })));
        let err = txn.add(&triple("o"), &labels(&["a"])).unwrap_err();
        assert!(matches!(err, AbacError::Consistency { .. }));
    }

    #[test]
    fn read_promote_becomes_writer() {
        let store = LabelsStoreMem::new();
        let mut txn = Txn::begin(&store, TxnType::ReadPromote).unwrap();
        assert_eq!(txn.mode(), TxnMode::Read);
        txn.add(&triple("o"), &labels(&["a"])).unwrap();
        assert_eq!(txn.mode(), TxnMode::Write);
        txn.commit().unwrap();
        assert_eq!(store.labels_for_triple(&triple("o")).unwrap(), labels(&["a"]));
    }

    #[test]
    fn promote_fails_while_writer_active() {
        let store = LabelsStoreMem::new();
        let writer = Txn::begin(&store, TxnType::Write).unwrap();
        let mut reader = Txn::begin(&store, TxnType::ReadPromote).unwrap();
        assert!(!reader.promote().unwrap());
        writer.abort();
        assert!(reader.promote().unwrap());
    }

    #[test]
    fn abort_and_drop_discard() {
        let store = LabelsStoreMem::new();
        let mut txn = Txn::begin(&store, TxnType::Write).unwrap();
        txn.add(&triple("o"), &labels(&["a"])).unwrap();
        txn.abort();
        {
            let mut txn = Txn::begin(&store, TxnType::Write).unwrap();
            txn.add(&triple("o"), &labels(&["b"])).unwrap();
        }
        assert!(store.labels_for_triple(&triple("o")).unwrap().is_empty());
        assert_eq!(store.transactional().commits(), 0);
    }

    #[test]
    fn writer_does_not_see_its_own_batch() {
        let store = LabelsStoreMem::new();
        let mut txn = Txn::begin(&store, TxnType::Write).unwrap();
        txn.add(&triple("o"), &labels(&["a"])).unwrap();
        assert!(txn.labels_for_triple(&triple("o")).unwrap().is_empty());
        assert_eq!(txn.pending(), 1);
        txn.commit().unwrap();
        assert_eq!(store.labels_for_triple(&triple("o")).unwrap(), labels(&["a"]));
    }

    #[test]
    fn validation_happens_at_add() {
        let store = LabelsStoreMem::new();
        let mut txn = Txn::begin(&store, TxnType::Write).unwrap();
        let err = txn.add(&triple("o"), &labels(&["a", "a"])).unwrap_err();
        assert!(err.is_validation());
        let bad = Triple::new(Node::uri("s"), Node::Any, Node::literal("o"));
        assert!(txn.add(&bad, &labels(&["a"])).unwrap_err().is_validation());
        assert_eq!(txn.pending(), 0);
    }
}
