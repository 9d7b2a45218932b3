//! # ncread-core
//!
//! The response-assembly engine behind NETCONF `<get>` and `<get-config>`.
//!
//! Given a possibly-filtered request against a selected datastore, the engine
//! produces one schema-valid, default-annotated data tree and wraps it in a
//! reply envelope:
//!
//! - the filter clause is compiled into normalized path filters
//! - store items are streamed into an arena tree with update-mode insertion
//! - default flags are propagated per inserted item, stopping at presence
//!   containers and keyed list entries
//! - locally served state (yang-library, monitoring, notification streams) is
//!   merged from per-request snapshots
//! - the finished tree is validated and attached to a duplicate of the request
//!
//! ## Architectural Constraints
//!
//! - Synchronous: one request runs to completion on the calling thread
//! - No async, no network dependencies (pure Rust)
//! - Collaborators (store, schema, local sources) are reached through fixed
//!   interfaces; the workspace ships minimal in-crate versions of each

// =============================================================================
// MODULES
// =============================================================================

pub mod assemble;
pub mod builder;
pub mod config;
pub mod filter;
pub mod local;
pub mod monitoring;
pub mod path;
pub mod primitives;
pub mod propagate;
pub mod rpc;
pub mod schema;
pub mod server;
pub mod session;
pub mod store;
pub mod tree;
pub mod types;
pub mod with_defaults;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Datastore, NodeId, NodeKind, Operation, PathError, ReadError, StoreFault, StoreStage,
    TreeError,
};

// =============================================================================
// RE-EXPORTS: Read Path
// =============================================================================

pub use assemble::assemble;
pub use builder::build_subtree;
pub use filter::{Filter, SubtreeNode, compile};
pub use local::{LocalDomain, LocalSnapshots, LocalSources};
pub use path::{PathFilter, Predicate, Segment};
pub use propagate::propagate;
pub use rpc::{Envelope, ErrorReply, Reply, Request, ServerReply};
pub use server::Server;
pub use tree::{DataNode, DataTree, Insertion};
pub use with_defaults::{WithDefaultsMode, resolve};

// =============================================================================
// RE-EXPORTS: Collaborators
// =============================================================================

pub use config::ServerConfig;
pub use monitoring::{Monitor, SessionInfo, Statistics, StreamInfo};
pub use schema::{Module, Schema, SchemaKind, SchemaNode, ValidationMode};
pub use session::{Session, StorageBackend};
pub use store::{ConfigStore, MemoryStore, RedbStore, StoreItem, StoredValue};
