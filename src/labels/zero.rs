use std::collections::BTreeMap;

use crate::{
    error::{AbacError, Result},
    labels::{Label, LabelsStore, Transactional, Triple, WriteBatch, pattern::resolve},
};

/// A store with no labels that refuses writes.
#[derive(Default)]
pub struct LabelsStoreZero {
    txn: Transactional,
}

impl LabelsStoreZero {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LabelsStore for LabelsStoreZero {
    fn labels_for_triple(&self, triple: &Triple) -> Result<Vec<Label>> {
        resolve(triple, false, |_, _| Ok(None))
    }

    fn transactional(&self) -> &Transactional {
        &self.txn
    }

    fn apply(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            Ok(())
        } else {
            Err(AbacError::unsupported("writes to the empty labels store"))
        }
    }

    fn for_each(&self, _f: &mut dyn FnMut(&Triple, &[Label])) -> Result<()> {
        Ok(())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(true)
    }

    fn check_entry(&self, _pattern: &Triple, _labels: &[Label]) -> Result<()> {
        Err(AbacError::unsupported("add to the empty labels store"))
    }

    fn supports_remove(&self) -> bool {
        false
    }

    fn properties(&self) -> Result<BTreeMap<String, String>> {
        Ok(BTreeMap::from([("kind".to_string(), "empty".to_string())]))
    }
}
