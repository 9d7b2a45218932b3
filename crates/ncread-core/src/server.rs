//! # Read Operation Driver
//!
//! Runs one `get` / `get-config` request end to end:
//!
//! 1. derive and apply the datastore selection
//! 2. compile the filter
//! 3. resolve the with-defaults mode
//! 4. refresh the session's store view
//! 5. build the result tree, one filter at a time, from the store or a local
//!    domain snapshot
//! 6. validate and wrap the tree into the reply
//!
//! Any error aborts the request with a single error reply; nothing partial
//! is ever returned. Every intermediate structure is owned by [`Server::read`]
//! and dropped on return.

use crate::assemble::assemble;
use crate::builder::build_subtree;
use crate::config::ServerConfig;
use crate::filter;
use crate::local::{LocalDomain, LocalSnapshots, LocalSources};
use crate::monitoring::Monitor;
use crate::path::PathFilter;
use crate::primitives::INTERNAL_ERROR_MESSAGE;
use crate::rpc::{ErrorReply, Reply, Request, ServerReply};
use crate::schema::Schema;
use crate::session::{Session, StorageBackend};
use crate::tree::DataTree;
use crate::types::{ReadError, StoreStage};
use crate::with_defaults;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// The read-path engine shared by every session.
#[derive(Debug)]
pub struct Server {
    schema: Schema,
    config: ServerConfig,
    monitor: Arc<Monitor>,
}

impl Server {
    /// Create a server over a complete schema.
    #[must_use]
    pub fn new(schema: Schema, config: ServerConfig) -> Self {
        Self {
            schema,
            config,
            monitor: Arc::new(Monitor::new()),
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    #[must_use]
    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    // =========================================================================
    // SESSIONS
    // =========================================================================

    /// Open a session and register it for monitoring.
    pub fn open_session(
        &self,
        id: u32,
        username: &str,
        source_host: &str,
        backend: StorageBackend,
    ) -> Session {
        self.monitor.session_started(id, username, source_host);
        info!(session = id, username, source_host, "Session opened");
        Session::new(id, backend).with_peer(username, source_host)
    }

    /// Close a session.
    pub fn close_session(&self, session: Session) {
        self.monitor.session_stopped(session.id(), false);
        info!(session = session.id(), "Session closed");
    }

    // =========================================================================
    // READ OPERATION
    // =========================================================================

    /// Handle one read request and produce the reply sent to the client.
    #[instrument(
        skip_all,
        fields(session = session.id(), op = %request.operation, message_id = %request.message_id)
    )]
    pub fn handle_read(&self, session: &mut Session, request: &Request) -> ServerReply {
        self.monitor.rpc_received(session.id());
        match self.read(session, request) {
            Ok(reply) => {
                debug!("Read succeeded");
                ServerReply::Data(reply)
            }
            Err(err) => {
                self.monitor.rpc_failed(session.id());
                ServerReply::Error(self.error_reply(request, &err))
            }
        }
    }

    /// Run the read pipeline, returning the typed error on failure.
    pub fn read(&self, session: &mut Session, request: &Request) -> Result<Reply, ReadError> {
        let (datastore, config_only) = request.selection()?;
        session.select(datastore, config_only)?;

        let filters = filter::compile(request, &self.schema)?;
        let mode = with_defaults::resolve(request.with_defaults.as_deref(), self.config.with_defaults)?;
        debug!(filters = filters.len(), datastore = %datastore, config_only, with_defaults = %mode, "Request prepared");

        session
            .refresh_for_read()
            .map_err(|e| ReadError::store(StoreStage::Refresh, e))?;

        let mut snapshots = LocalSnapshots::new();
        let tree = self.build_tree(session, &filters, config_only, &mut snapshots)?;
        assemble(tree, &self.schema, request, config_only, mode)
    }

    /// Build the unvalidated result tree for compiled filters.
    ///
    /// Local domains are materialized into `snapshots` on first use. A
    /// config-only read never touches them.
    pub fn build_tree(
        &self,
        session: &Session,
        filters: &[PathFilter],
        config_only: bool,
        snapshots: &mut LocalSnapshots,
    ) -> Result<DataTree, ReadError> {
        let sources = LocalSources {
            schema: &self.schema,
            monitor: &self.monitor,
            with_defaults: self.config.with_defaults,
        };
        let mut tree = DataTree::new();

        for filter in filters {
            match LocalDomain::for_filter(filter) {
                Some(domain) if config_only => {
                    debug!(filter = %filter, module = domain.module(), "Local state skipped for config-only read");
                }
                Some(domain) => snapshots.merge_into(&mut tree, domain, filter, &sources)?,
                None => build_subtree(session, &mut tree, &self.schema, filter)?,
            }
        }
        debug!(nodes = tree.len(), snapshots = snapshots.materialized(), "Result tree built");
        Ok(tree)
    }

    // =========================================================================
    // ERROR REPLIES
    // =========================================================================

    fn error_reply(&self, request: &Request, err: &ReadError) -> ErrorReply {
        let structured = match err {
            ReadError::Store {
                stage: StoreStage::Refresh,
                source,
            } => {
                warn!(error = %source, "Session refresh failed");
                Some(ErrorReply::from_store(&request.message_id, source))
            }
            _ => None,
        };

        structured.unwrap_or_else(|| {
            let message = if err.is_internal() {
                error!(error = %err, "Internal fault while assembling reply");
                INTERNAL_ERROR_MESSAGE.to_string()
            } else {
                warn!(error = %err, "Read failed");
                err.to_string()
            };
            ErrorReply::operation_failed(&request.message_id, message)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Module, SchemaNode};
    use crate::store::{MemoryStore, StoredValue};
    use crate::types::Datastore;

    fn server() -> Server {
        let mut schema = Schema::with_builtin_modules();
        schema.add_module(
            Module::new("sys", "urn:sys").with_node(
                SchemaNode::container("system")
                    .with_child(SchemaNode::leaf("hostname"))
                    .with_child(SchemaNode::leaf("uptime").state()),
            ),
        );
        Server::new(schema, ServerConfig::default())
    }

    fn session(server: &Server) -> Session {
        let mut session =
            server.open_session(1, "admin", "::1", StorageBackend::InMemory(MemoryStore::new()));
        session.install_module("sys").expect("install");
        for (path, value, state) in [
            ("/sys:system/hostname", "r1", false),
            ("/sys:system/uptime", "100", true),
        ] {
            session
                .set_item(
                    Datastore::Running,
                    path,
                    StoredValue {
                        value: Some(value.into()),
                        default: false,
                        state,
                    },
                )
                .expect("set");
        }
        session
    }

    #[test]
    fn get_merges_store_and_local_data() {
        let server = server();
        let mut session = session(&server);
        let reply = server.handle_read(&mut session, &Request::get("1"));
        let data = reply.data().and_then(Reply::data).expect("data reply");

        let modules: Vec<_> = data
            .roots()
            .iter()
            .map(|&r| data.node(r).module().to_string())
            .collect();
        assert_eq!(
            modules,
            vec![
                "ietf-yang-library",
                "ietf-netconf-monitoring",
                "nc-notifications",
                "sys"
            ]
        );
        assert!(data.find_path("/sys:system/uptime").expect("parse").is_some());
    }

    #[test]
    fn get_config_skips_state() {
        let server = server();
        let mut session = session(&server);
        let reply = server.handle_read(&mut session, &Request::get_config("2", Datastore::Running));
        let data = reply.data().and_then(Reply::data).expect("data reply");

        assert_eq!(data.roots().len(), 1);
        assert!(data.find_path("/sys:system/hostname").expect("parse").is_some());
        assert!(data.find_path("/sys:system/uptime").expect("parse").is_none());
    }

    #[test]
    fn filter_errors_are_reported_verbatim() {
        let server = server();
        let mut session = session(&server);
        let request = Request::get("3").with_filter(crate::filter::Filter::XPath("//x".into()));
        let reply = server.handle_read(&mut session, &request);
        let err = reply.error().expect("error reply");
        assert!(err.error_message.starts_with("Invalid filter"));
        assert_eq!(server.monitor().statistics().out_rpc_errors, 1);
    }

    #[test]
    fn internal_faults_are_generic() {
        let server = server();
        let mut session = session(&server);
        let request = Request::get("4").with_defaults("sometimes");
        let reply = server.handle_read(&mut session, &request);
        assert_eq!(
            reply.error().map(|e| e.error_message.as_str()),
            Some(INTERNAL_ERROR_MESSAGE)
        );
    }
}
