use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use crate::{
    error::Result,
    labels::{
        BatchOp,
        Label,
        LabelsStore,
        PatternShape,
        Transactional,
        Triple,
        WriteBatch,
        pattern::resolve,
    },
};

#[derive(Default)]
struct MemState {
    /// Keyed by pattern; wildcard slots hold `Node::Any`.
    entries: HashMap<Triple, Vec<Label>>,
    patterns_loaded: bool,
}

/// Labels held in memory. A committed batch is applied under one write lock,
/// so readers see all of it or none of it.
#[derive(Default)]
pub struct LabelsStoreMem {
    state: RwLock<MemState>,
    txn: Transactional,
}

impl LabelsStoreMem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }
}

impl LabelsStore for LabelsStoreMem {
    fn labels_for_triple(&self, triple: &Triple) -> Result<Vec<Label>> {
        let triple = triple.normalized();
        let state = self.state.read();
        resolve(&triple, state.patterns_loaded, |_, key| {
            Ok(state.entries.get(key).cloned())
        })
    }

    fn transactional(&self) -> &Transactional {
        &self.txn
    }

    fn apply(&self, batch: WriteBatch) -> Result<()> {
        let mut state = self.state.write();
        for op in batch {
            match op {
                BatchOp::Add { pattern, labels } => {
                    if PatternShape::of(&pattern)?.is_wildcard() {
                        state.patterns_loaded = true;
                    }
                    state.entries.insert(pattern.normalized(), labels);
                }
                BatchOp::Remove(pattern) => {
                    state.entries.remove(&pattern.normalized());
                }
            }
        }
        Ok(())
    }

    fn for_each(&self, f: &mut dyn FnMut(&Triple, &[Label])) -> Result<()> {
        let state = self.state.read();
        for (pattern, labels) in &state.entries {
            f(pattern, labels);
        }
        Ok(())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.state.read().entries.is_empty())
    }

    fn properties(&self) -> Result<BTreeMap<String, String>> {
        let state = self.state.read();
        let mut props = BTreeMap::new();
        props.insert("kind".to_string(), "memory".to_string());
        props.insert("entries".to_string(), state.entries.len().to_string());
        props.insert(
            "patterns_loaded".to_string(),
            state.patterns_loaded.to_string(),
        );
        Ok(props)
    }
}
