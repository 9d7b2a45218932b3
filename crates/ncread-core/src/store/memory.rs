//! In-memory configuration store.
//!
//! Running and startup data live behind an `Arc<RwLock<_>>` shared by every
//! handle created with [`MemoryStore::handle`]. Datastore selection,
//! config-only selection and the candidate are per handle.

use super::{ConfigStore, ItemIter, StoredValue, module_items, normalize, select_items};
use crate::path::PathFilter;
use crate::types::{Datastore, StoreFault};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

type Items = BTreeMap<String, StoredValue>;

#[derive(Debug, Default)]
struct Shared {
    modules: BTreeSet<String>,
    datastores: BTreeMap<Datastore, Items>,
}

/// A volatile store shared between handles.
#[derive(Debug, Default)]
pub struct MemoryStore {
    shared: Arc<RwLock<Shared>>,
    datastore: Datastore,
    config_only: bool,
    candidate: Items,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Another handle onto the same data, starting on running.
    #[must_use]
    pub fn handle(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            datastore: Datastore::Running,
            config_only: false,
            candidate: Items::new(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Shared> {
        self.shared.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Shared> {
        self.shared.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConfigStore for MemoryStore {
    fn datastore(&self) -> Datastore {
        self.datastore
    }

    fn switch_datastore(&mut self, datastore: Datastore) -> Result<(), StoreFault> {
        self.datastore = datastore;
        Ok(())
    }

    fn config_only(&self) -> bool {
        self.config_only
    }

    fn set_config_only(&mut self, config_only: bool) -> Result<(), StoreFault> {
        self.config_only = config_only;
        Ok(())
    }

    fn refresh(&mut self) -> Result<(), StoreFault> {
        if self.datastore == Datastore::Candidate {
            let running = self
                .read()
                .datastores
                .get(&Datastore::Running)
                .cloned()
                .unwrap_or_default();
            self.candidate = running;
        }
        Ok(())
    }

    fn get_items(&self, filter: &PathFilter) -> Result<ItemIter<'_>, StoreFault> {
        let shared = self.read();
        let module = filter.module();
        if !shared.modules.contains(module) {
            return Err(StoreFault::UnknownModel(module.to_string()));
        }

        let scoped = match self.datastore {
            Datastore::Candidate => module_items(&self.candidate, module),
            datastore => shared
                .datastores
                .get(&datastore)
                .map(|items| module_items(items, module))
                .unwrap_or_default(),
        };

        let items = select_items(filter, &scoped, self.config_only)?;
        if items.is_empty() {
            return Err(StoreFault::NotFound(filter.to_string()));
        }
        Ok(Box::new(items.into_iter().map(Ok::<_, StoreFault>)))
    }

    fn set_item(
        &mut self,
        datastore: Datastore,
        path: &str,
        value: StoredValue,
    ) -> Result<(), StoreFault> {
        let (path, module) = normalize(path)?;
        if !self.read().modules.contains(&module) {
            return Err(StoreFault::UnknownModel(module));
        }
        match datastore {
            Datastore::Candidate => {
                self.candidate.insert(path, value);
            }
            datastore => {
                self.write()
                    .datastores
                    .entry(datastore)
                    .or_default()
                    .insert(path, value);
            }
        }
        Ok(())
    }

    fn install_module(&mut self, module: &str) -> Result<(), StoreFault> {
        self.write().modules.insert(module.to_string());
        Ok(())
    }

    fn installed_modules(&self) -> Result<Vec<String>, StoreFault> {
        Ok(self.read().modules.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(value: &str) -> StoredValue {
        StoredValue {
            value: Some(value.into()),
            default: false,
            state: false,
        }
    }

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.install_module("m").expect("install");
        store
            .set_item(Datastore::Running, "/m:sys/name", leaf("r1"))
            .expect("set");
        store
    }

    #[test]
    fn unknown_model_and_not_found_are_distinct() {
        let store = store();
        let unknown = store
            .get_items(&PathFilter::parse("/x:*").expect("parse"))
            .err();
        assert!(matches!(unknown, Some(StoreFault::UnknownModel(_))));

        let missing = store
            .get_items(&PathFilter::parse("/m:sys/other").expect("parse"))
            .err();
        assert!(matches!(missing, Some(StoreFault::NotFound(_))));
    }

    #[test]
    fn handles_share_data_not_selection() {
        let mut a = store();
        let b = a.handle();
        a.switch_datastore(Datastore::Startup).expect("switch");

        assert_eq!(b.datastore(), Datastore::Running);
        let filter = PathFilter::parse("/m:*").expect("parse");
        assert_eq!(b.get_items(&filter).expect("items").count(), 1);
        assert!(a.get_items(&filter).is_err());
    }

    #[test]
    fn candidate_refresh_copies_running() {
        let mut store = store();
        store.switch_datastore(Datastore::Candidate).expect("switch");
        let filter = PathFilter::parse("/m:*").expect("parse");
        assert!(store.get_items(&filter).is_err());

        store.refresh().expect("refresh");
        assert_eq!(store.get_items(&filter).expect("items").count(), 1);
    }

    #[test]
    fn candidate_is_private_to_a_handle() {
        let mut editor = store();
        let mut reader = editor.handle();
        let filter = PathFilter::parse("/m:sys").expect("parse");

        editor.switch_datastore(Datastore::Candidate).expect("switch");
        editor.refresh().expect("refresh");
        editor
            .set_item(Datastore::Candidate, "/m:sys/mtu", leaf("9000"))
            .expect("edit");

        reader.switch_datastore(Datastore::Candidate).expect("switch");
        reader.refresh().expect("refresh");
        assert_eq!(reader.get_items(&filter).expect("items").count(), 1);
        assert_eq!(editor.get_items(&filter).expect("items").count(), 2);
    }

    #[test]
    fn writes_need_installed_module() {
        let mut store = store();
        let err = store
            .set_item(Datastore::Running, "/other:x", leaf("1"))
            .expect_err("not installed");
        assert!(matches!(err, StoreFault::UnknownModel(_)));
    }
}
