use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Weak},
};

use parking_lot::Mutex;

use crate::{
    error::{AbacError, Result},
    persist::{LabelsStoreSqlite, SqliteOptions},
};

/// Open persistent stores by directory, so that opening the same directory
/// twice hands back the live instance. Owned by the application; entries
/// go away when the last handle is dropped or on [`StoreRegistry::close`].
#[derive(Default)]
pub struct StoreRegistry {
    stores: Mutex<HashMap<PathBuf, Weak<LabelsStoreSqlite>>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(
        &self,
        dir: impl AsRef<Path>,
        options: SqliteOptions,
    ) -> Result<Arc<LabelsStoreSqlite>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let key = dir.canonicalize()?;

        let mut stores = self.stores.lock();
        if let Some(store) = stores.get(&key).and_then(Weak::upgrade) {
            if !store.is_closed() {
                if *store.options() != options {
                    return Err(AbacError::validation(format!(
                        "labels store {} is already open with {:?}, requested {:?}",
                        key.display(),
                        store.options(),
                        options
                    )));
                }
                log::info!("reusing open labels store {}", key.display());
                return Ok(store);
            }
        }
        let store = Arc::new(LabelsStoreSqlite::open(&key, options)?);
        stores.insert(key, Arc::downgrade(&store));
        Ok(store)
    }

    /// Close the store for `dir`. Returns whether one was open.
    pub fn close(&self, dir: impl AsRef<Path>) -> Result<bool> {
        let key = dir.as_ref().canonicalize()?;
        let entry = self.stores.lock().remove(&key);
        Ok(entry
            .and_then(|weak| weak.upgrade())
            .is_some_and(|store| store.close()))
    }

    /// Stores still alive.
    pub fn len(&self) -> usize {
        let mut stores = self.stores.lock();
        stores.retain(|_, weak| weak.strong_count() > 0);
        stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
