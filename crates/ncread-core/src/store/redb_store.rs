//! # redb-backed Configuration Store
//!
//! A persistent store using the redb embedded database.
//!
//! - One table each for running and startup: normalized instance path ->
//!   postcard-encoded [`StoredValue`]
//! - One module table: installed module name -> install sequence
//!
//! Paths are table keys, so a module's items form one contiguous key range.
//! Handles share the `Database` through an `Arc`. The candidate is not
//! persisted: each handle holds its own copy, taken from running on refresh.

use super::{
    ConfigStore, ItemIter, StoredValue, module_items, module_prefix, normalize, select_items,
};
use crate::path::PathFilter;
use crate::types::{Datastore, StoreFault};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Running datastore: path -> serialized StoredValue
const RUNNING: TableDefinition<&str, &[u8]> = TableDefinition::new("running");

/// Startup datastore: path -> serialized StoredValue
const STARTUP: TableDefinition<&str, &[u8]> = TableDefinition::new("startup");

/// Installed modules: name -> install sequence
const MODULES: TableDefinition<&str, u64> = TableDefinition::new("modules");

type Items = BTreeMap<String, StoredValue>;

/// Table holding a datastore, `None` for the per-handle candidate.
fn datastore_table(
    datastore: Datastore,
) -> Option<TableDefinition<'static, &'static str, &'static [u8]>> {
    match datastore {
        Datastore::Running => Some(RUNNING),
        Datastore::Startup => Some(STARTUP),
        Datastore::Candidate => None,
    }
}

fn backend<E: fmt::Display>(e: E) -> StoreFault {
    StoreFault::Backend(e.to_string())
}

/// A disk-backed store handle.
pub struct RedbStore {
    db: Arc<Database>,
    datastore: Datastore,
    config_only: bool,
    candidate: Items,
}

impl fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedbStore")
            .field("datastore", &self.datastore)
            .field("config_only", &self.config_only)
            .field("candidate_items", &self.candidate.len())
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreFault> {
        let db = Database::create(path.as_ref()).map_err(backend)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(backend)?;
            for table in Datastore::ALL.into_iter().filter_map(datastore_table) {
                let _ = write_txn.open_table(table).map_err(backend)?;
            }
            let _ = write_txn.open_table(MODULES).map_err(backend)?;
            write_txn.commit().map_err(backend)?;
        }

        Ok(Self {
            db: Arc::new(db),
            datastore: Datastore::Running,
            config_only: false,
            candidate: Items::new(),
        })
    }

    /// Another handle onto the same database, starting on running.
    #[must_use]
    pub fn handle(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            datastore: Datastore::Running,
            config_only: false,
            candidate: Items::new(),
        }
    }

    /// Items of one module in a datastore, keyed by path.
    fn load_module(&self, datastore: Datastore, module: &str) -> Result<Items, StoreFault> {
        match datastore_table(datastore) {
            Some(table) => self.load_prefix(table, &module_prefix(module)),
            None => Ok(module_items(&self.candidate, module)),
        }
    }

    /// Items of a table whose path starts with `prefix`.
    fn load_prefix(
        &self,
        table: TableDefinition<'static, &'static str, &'static [u8]>,
        prefix: &str,
    ) -> Result<Items, StoreFault> {
        let read_txn = self.db.begin_read().map_err(backend)?;
        let table = read_txn.open_table(table).map_err(backend)?;

        let mut items = BTreeMap::new();
        for entry in table.range(prefix..).map_err(backend)? {
            let (key, value) = entry.map_err(backend)?;
            let path = key.value();
            if !path.starts_with(prefix) {
                break;
            }
            let stored: StoredValue = postcard::from_bytes(value.value())
                .map_err(|e| StoreFault::Serialization(e.to_string()))?;
            items.insert(path.to_string(), stored);
        }
        Ok(items)
    }

    fn is_installed(&self, module: &str) -> Result<bool, StoreFault> {
        let read_txn = self.db.begin_read().map_err(backend)?;
        let table = read_txn.open_table(MODULES).map_err(backend)?;
        Ok(table.get(module).map_err(backend)?.is_some())
    }
}

impl ConfigStore for RedbStore {
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
            self.candidate = self.load_prefix(RUNNING, "")?;
        }
        Ok(())
    }

    fn get_items(&self, filter: &PathFilter) -> Result<ItemIter<'_>, StoreFault> {
        let module = filter.module();
        if !self.is_installed(module)? {
            return Err(StoreFault::UnknownModel(module.to_string()));
        }

        let scoped = self.load_module(self.datastore, module)?;
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
        if !self.is_installed(&module)? {
            return Err(StoreFault::UnknownModel(module));
        }
        let Some(table) = datastore_table(datastore) else {
            self.candidate.insert(path, value);
            return Ok(());
        };
        let bytes =
            postcard::to_allocvec(&value).map_err(|e| StoreFault::Serialization(e.to_string()))?;

        let write_txn = self.db.begin_write().map_err(backend)?;
        {
            let mut table = write_txn.open_table(table).map_err(backend)?;
            table
                .insert(path.as_str(), bytes.as_slice())
                .map_err(backend)?;
        }
        write_txn.commit().map_err(backend)?;
        Ok(())
    }

    fn install_module(&mut self, module: &str) -> Result<(), StoreFault> {
        let write_txn = self.db.begin_write().map_err(backend)?;
        {
            let mut table = write_txn.open_table(MODULES).map_err(backend)?;
            if table.get(module).map_err(backend)?.is_none() {
                let next = table.len().map_err(backend)?;
                table.insert(module, next).map_err(backend)?;
            }
        }
        write_txn.commit().map_err(backend)?;
        Ok(())
    }

    fn installed_modules(&self) -> Result<Vec<String>, StoreFault> {
        let read_txn = self.db.begin_read().map_err(backend)?;
        let table = read_txn.open_table(MODULES).map_err(backend)?;
        let mut modules = Vec::new();
        for entry in table.iter().map_err(backend)? {
            let (key, _) = entry.map_err(backend)?;
            modules.push(key.value().to_string());
        }
        Ok(modules)
    }
}
