use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    sync::Arc,
};

use parking_lot::RwLock;
use serde::Deserialize;

use crate::{
    attr::{Attribute, AttributeValueSet, Hierarchy},
    error::Result,
    source::{AttributesSource, HierarchySource},
};

/// Users and hierarchies held in memory.
#[derive(Debug, Default)]
pub struct AttributesStoreLocal {
    users: RwLock<HashMap<String, AttributeValueSet>>,
    hierarchies: RwLock<HashMap<Attribute, Arc<Hierarchy>>>,
}

/// JSON layout:
/// `{ "users": { "u1": ["role=admin, role=engineer"] }, "hierarchies": ["clearance: public, secret"] }`
#[derive(Deserialize)]
struct LocalFile {
    #[serde(default)]
    users: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    hierarchies: Vec<String>,
}

impl AttributesStoreLocal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let file: LocalFile = serde_json::from_str(text)?;
        let store = Self::new();
        for (user, lists) in file.users {
            let mut set = AttributeValueSet::new();
            for list in lists {
                set.merge(&AttributeValueSet::parse(&list)?);
            }
            store.put(&user, set);
        }
        for text in file.hierarchies {
            store.add_hierarchy(Hierarchy::parse(&text)?);
        }
        Ok(store)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let store = Self::from_json(&text)?;
        log::info!(
            "loaded {} users and {} hierarchies from {}",
            store.users.read().len(),
            store.hierarchies.read().len(),
            path.display()
        );
        Ok(store)
    }

    pub fn put(&self, user: &str, attributes: AttributeValueSet) {
        self.users.write().insert(user.to_string(), attributes);
    }

    pub fn add_hierarchy(&self, hierarchy: Hierarchy) {
        self.hierarchies
            .write()
            .insert(hierarchy.attribute().clone(), Arc::new(hierarchy));
    }

    pub fn clear(&self) {
        self.users.write().clear();
        self.hierarchies.write().clear();
    }
}

impl HierarchySource for AttributesStoreLocal {
    fn hierarchy(&self, attribute: &Attribute) -> Option<Arc<Hierarchy>> {
        self.hierarchies.read().get(attribute).cloned()
    }
}

impl AttributesSource for AttributesStoreLocal {
    fn attributes(&self, user: &str) -> Option<AttributeValueSet> {
        self.users.read().get(user).cloned()
    }

    fn users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.users.read().keys().cloned().collect();
        users.sort();
        users
    }
}
