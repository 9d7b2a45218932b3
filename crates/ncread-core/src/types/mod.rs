//! # Core Type Definitions
//!
//! This module contains the types shared by every stage of the read path:
//! - Arena identifiers (`NodeId`)
//! - Structural node kinds (`NodeKind`)
//! - Datastore and operation selectors (`Datastore`, `Operation`)
//! - Error types (`ReadError`, `StoreFault`, `TreeError`, `PathError`)
//!
//! ## Error Classes
//!
//! `ReadError` is the only error returned by the read operation. Its variants
//! map one-to-one onto the failure classes a client can observe: a bad filter,
//! a failing store, or an internal fault (tree build, assembly, consistency).

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// ARENA IDENTIFIERS
// =============================================================================

/// Index of a node inside a `DataTree` arena.
///
/// Nodes are never removed from the arena, so an id stays valid for the
/// lifetime of the tree that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Get the raw arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

// =============================================================================
// NODE KIND
// =============================================================================

/// Structural kind of a data node, as dictated by its schema definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// Non-presence container.
    Container,
    /// Container whose existence carries meaning on its own.
    PresenceContainer,
    /// Entry of a list that declares keys.
    KeyedList,
    /// Entry of a list without keys (state data only).
    KeylessList,
    /// Leaf.
    Leaf,
    /// One entry of a leaf-list.
    LeafList,
    /// Opaque anyxml/anydata content.
    AnyXml,
}

impl NodeKind {
    /// Terminal kinds carry a value and have no relevant children.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Leaf | Self::LeafList | Self::AnyXml)
    }

    /// Opaque boundaries for default propagation.
    #[must_use]
    pub const fn is_boundary(self) -> bool {
        matches!(self, Self::PresenceContainer | Self::KeyedList)
    }

    /// Whether a node of this kind must carry a value.
    #[must_use]
    pub const fn has_value(self) -> bool {
        self.is_terminal()
    }
}

// =============================================================================
// DATASTORE & OPERATION
// =============================================================================

/// A named configuration datastore.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Datastore {
    #[default]
    Running,
    Startup,
    Candidate,
}

impl Datastore {
    /// All datastores, in a fixed order.
    pub const ALL: [Datastore; 3] = [Self::Running, Self::Startup, Self::Candidate];

    /// Protocol name of the datastore.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Startup => "startup",
            Self::Candidate => "candidate",
        }
    }

    /// Parse a datastore name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ds| ds.name() == name)
    }
}

impl fmt::Display for Datastore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The read operations handled by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Get,
    GetConfig,
}

impl Operation {
    /// RPC name of the operation.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::GetConfig => "get-config",
        }
    }

    /// `get-config` only ever returns configuration data.
    #[must_use]
    pub const fn is_config_only(self) -> bool {
        matches!(self, Self::GetConfig)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// A path string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset} in '{input}'")]
pub struct PathError {
    pub input: String,
    pub offset: usize,
    pub message: String,
}

impl PathError {
    pub(crate) fn new(input: &str, offset: usize, message: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            offset,
            message: message.into(),
        }
    }
}

/// Outcome classes reported by a configuration store.
///
/// `UnknownModel` and `NotFound` are "no data" outcomes, not failures; see
/// [`StoreFault::is_no_data`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreFault {
    /// The store has no module installed for the requested path.
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// The path is valid but no instances exist.
    #[error("No data found for {0}")]
    NotFound(String),

    /// The store could not interpret the requested path.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The storage engine failed.
    #[error("Store backend error: {0}")]
    Backend(String),

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreFault {
    /// Whether this outcome only means "nothing to return".
    #[must_use]
    pub const fn is_no_data(&self) -> bool {
        matches!(self, Self::UnknownModel(_) | Self::NotFound(_))
    }
}

/// An item could not be placed into a data tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The instance path could not be parsed.
    #[error("Malformed path: {0}")]
    MalformedPath(#[from] PathError),

    /// A path segment has no schema definition.
    #[error("Unknown schema node '{name}' in {path}")]
    UnknownNode { path: String, name: String },

    /// A keyed list entry was addressed without all of its keys.
    #[error("Missing key '{key}' for list '{list}' in {path}")]
    MissingKey {
        path: String,
        list: String,
        key: String,
    },

    /// A keyless list entry was addressed without a valid position.
    #[error("Invalid position for keyless list '{list}' in {path}")]
    InvalidPosition { path: String, list: String },

    /// A leaf or leaf-list entry was given without a value.
    #[error("Value required for {0}")]
    MissingValue(String),

    /// A value was given for a node that cannot carry one.
    #[error("Unexpected value for {0}")]
    UnexpectedValue(String),

    /// A wildcard cannot address a concrete instance.
    #[error("Wildcard not allowed in instance path {0}")]
    Wildcard(String),
}

/// Stage of the read operation at which the store failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStage {
    /// Switching datastore or session options.
    Select,
    /// Refreshing the session's view of the store.
    Refresh,
    /// Iterating items for a path filter.
    Iterate,
}

impl fmt::Display for StoreStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Select => "datastore selection",
            Self::Refresh => "session refresh",
            Self::Iterate => "item iteration",
        })
    }
}

/// Errors returned by the read operation.
///
/// - No partial data replies: any error aborts the whole request
/// - Every intermediate structure is owned by the request and dropped on return
#[derive(Debug, Error)]
pub enum ReadError {
    /// The client filter cannot be compiled.
    #[error("Invalid filter: {0}")]
    Filter(String),

    /// The store failed for a reason other than "no data".
    #[error("Store {stage} failed: {source}")]
    Store {
        stage: StoreStage,
        #[source]
        source: StoreFault,
    },

    /// A store-reported item does not fit the schema.
    #[error("Failed to build data tree: {0}")]
    TreeBuild(#[from] TreeError),

    /// The assembled tree or reply envelope failed validation.
    #[error("Reply assembly fault: {0}")]
    Assembly(String),

    /// A collaborator broke its contract (e.g. an unvalidated parameter).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReadError {
    /// Shorthand for a store failure at a given stage.
    #[must_use]
    pub fn store(stage: StoreStage, source: StoreFault) -> Self {
        Self::Store { stage, source }
    }

    /// Internal faults are surfaced generically and logged with detail.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::TreeBuild(_) | Self::Assembly(_) | Self::Internal(_)
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
