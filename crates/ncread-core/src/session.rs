//! # Session Module
//!
//! A protocol session and its handle onto the configuration store.
//!
//! The session records which datastore and config-only option it last
//! selected. That record must always equal the store handle's own view, so
//! it is only updated after the store accepted a switch.
//!
//! ## Storage Backends
//!
//! - `InMemory`: a [`MemoryStore`] handle (fast, volatile)
//! - `Persistent`: a [`RedbStore`] handle (disk-backed, ACID)
//! - `External`: any other [`ConfigStore`] implementation

use crate::path::PathFilter;
use crate::store::{ConfigStore, ItemIter, MemoryStore, RedbStore, StoredValue};
use crate::types::{Datastore, ReadError, StoreFault, StoreStage};
use std::path::Path;
use tracing::debug;

/// Storage backend for a Session.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store handle.
    InMemory(MemoryStore),
    /// Disk-backed store handle using redb.
    Persistent(RedbStore),
    /// A store implemented outside this crate.
    External(Box<dyn ConfigStore>),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl StorageBackend {
    fn store(&self) -> &dyn ConfigStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(store) => store,
            Self::External(store) => store.as_ref(),
        }
    }

    fn store_mut(&mut self) -> &mut dyn ConfigStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(store) => store,
            Self::External(store) => store.as_mut(),
        }
    }
}

/// A protocol session.
#[derive(Debug)]
pub struct Session {
    id: u32,
    username: String,
    source_host: String,
    backend: StorageBackend,
    /// Datastore last accepted by the store.
    datastore: Datastore,
    /// Config-only option last accepted by the store.
    config_only: bool,
    /// Whether this session modified the candidate since its last refresh.
    candidate_changed: bool,
}

impl Session {
    /// Create a session over a storage backend.
    #[must_use]
    pub fn new(id: u32, backend: StorageBackend) -> Self {
        let datastore = backend.store().datastore();
        let config_only = backend.store().config_only();
        Self {
            id,
            username: String::new(),
            source_host: String::new(),
            backend,
            datastore,
            config_only,
            candidate_changed: false,
        }
    }

    /// Create a session with a fresh in-memory store.
    #[must_use]
    pub fn in_memory(id: u32) -> Self {
        Self::new(id, StorageBackend::default())
    }

    /// Create a session with persistent redb storage.
    ///
    /// Opens or creates a redb database at the given path.
    pub fn with_redb(id: u32, path: impl AsRef<Path>) -> Result<Self, StoreFault> {
        Ok(Self::new(id, StorageBackend::Persistent(RedbStore::open(path)?)))
    }

    /// Builder: record who opened the session.
    #[must_use]
    pub fn with_peer(mut self, username: impl Into<String>, source_host: impl Into<String>) -> Self {
        self.username = username.into();
        self.source_host = source_host.into();
        self
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn source_host(&self) -> &str {
        &self.source_host
    }

    #[must_use]
    pub fn datastore(&self) -> Datastore {
        self.datastore
    }

    #[must_use]
    pub fn config_only(&self) -> bool {
        self.config_only
    }

    #[must_use]
    pub fn candidate_changed(&self) -> bool {
        self.candidate_changed
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    /// Get a reference to the storage backend.
    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    // =========================================================================
    // DATASTORE SELECTION
    // =========================================================================

    /// Select the datastore and config-only option for the next read.
    ///
    /// The store is only asked to switch when the selection differs from the
    /// recorded one.
    pub fn select(&mut self, datastore: Datastore, config_only: bool) -> Result<(), ReadError> {
        if self.datastore != datastore {
            debug!(session = self.id, from = %self.datastore, to = %datastore, "Switching datastore");
            self.backend
                .store_mut()
                .switch_datastore(datastore)
                .map_err(|e| ReadError::store(StoreStage::Select, e))?;
            self.datastore = datastore;
        }
        if self.config_only != config_only {
            self.backend
                .store_mut()
                .set_config_only(config_only)
                .map_err(|e| ReadError::store(StoreStage::Select, e))?;
            self.config_only = config_only;
        }
        Ok(())
    }

    /// Refresh the store view before a read.
    ///
    /// Skipped on a candidate this session has modified, so its own edits are
    /// not overwritten by running.
    pub fn refresh_for_read(&mut self) -> Result<(), StoreFault> {
        if self.datastore == Datastore::Candidate && self.candidate_changed {
            debug!(session = self.id, "Candidate modified, refresh skipped");
            return Ok(());
        }
        self.backend.store_mut().refresh()
    }

    // =========================================================================
    // STORE ACCESS
    // =========================================================================

    /// Items covered by a path filter in the selected datastore.
    pub fn get_items(&self, filter: &PathFilter) -> Result<ItemIter<'_>, StoreFault> {
        self.backend.store().get_items(filter)
    }

    /// Write one item. Writing the candidate marks it as modified.
    pub fn set_item(
        &mut self,
        datastore: Datastore,
        path: &str,
        value: StoredValue,
    ) -> Result<(), StoreFault> {
        self.backend.store_mut().set_item(datastore, path, value)?;
        if datastore == Datastore::Candidate {
            self.candidate_changed = true;
        }
        Ok(())
    }

    /// Make a module's data known to the store.
    pub fn install_module(&mut self, module: &str) -> Result<(), StoreFault> {
        self.backend.store_mut().install_module(module)
    }

    /// Installed module names.
    pub fn installed_modules(&self) -> Result<Vec<String>, StoreFault> {
        self.backend.store().installed_modules()
    }

    /// Discard candidate modifications (the next read re-syncs from running).
    pub fn discard_changes(&mut self) {
        self.candidate_changed = false;
    }
}
