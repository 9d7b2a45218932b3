//! # Read Path Tier Tests (T0-T3)
//!
//! If ANY tier fails, replies cannot be trusted.
//!
//! ## Tiers
//! - T0: Filter Compilation
//! - T1: Tree Building & Default Flags
//! - T2: Source Merging
//! - T3: Replies & Sessions

use ncread_core::{
    ConfigStore, DataTree, Datastore, Filter, LocalSnapshots, MemoryStore, Module, PathFilter,
    ReadError, Request, Schema, SchemaNode, Server, ServerConfig, Session, StorageBackend,
    StoreFault, StoredValue, SubtreeNode, WithDefaultsMode, build_subtree, compile,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

// =============================================================================
// FIXTURES
// =============================================================================

/// Module `a`: one container with an optional leaf that has a default.
/// Module `b`: a container nobody ever instantiates.
fn two_module_schema() -> Schema {
    let mut schema = Schema::new();
    schema.add_module(
        Module::new("a", "urn:example:a").with_node(
            SchemaNode::container("settings")
                .with_child(SchemaNode::leaf("timeout").with_default("30")),
        ),
    );
    schema.add_module(
        Module::new("b", "urn:example:b")
            .with_node(SchemaNode::container("unused").with_child(SchemaNode::leaf("x"))),
    );
    schema
}

/// A device schema on top of the protocol modules.
fn device_schema() -> Schema {
    let mut schema = Schema::with_builtin_modules();
    schema.add_module(
        Module::new("dev", "urn:example:dev").with_node(
            SchemaNode::container("system")
                .with_child(SchemaNode::leaf("hostname"))
                .with_child(SchemaNode::leaf("domain").with_default("local"))
                .with_child(
                    SchemaNode::container("clock")
                        .with_child(SchemaNode::leaf("timezone").with_default("UTC")),
                )
                .with_child(
                    SchemaNode::presence_container("ssh")
                        .with_child(SchemaNode::leaf("port").with_default("22")),
                )
                .with_child(
                    SchemaNode::list("user", &["name"])
                        .with_child(SchemaNode::leaf("name"))
                        .with_child(SchemaNode::leaf("shell").with_default("/bin/sh")),
                )
                .with_child(SchemaNode::leaf("uptime").state()),
        ),
    );
    schema
}

fn value(v: &str, default: bool) -> StoredValue {
    StoredValue {
        value: Some(v.into()),
        default,
        state: false,
    }
}

fn seed_device(session: &mut Session) {
    session.install_module("dev").expect("install");
    for (path, v, default) in [
        ("/dev:system/hostname", "edge-1", false),
        ("/dev:system/domain", "local", true),
        ("/dev:system/clock/timezone", "UTC", true),
        ("/dev:system/ssh/port", "22", true),
        ("/dev:system/user[name='ops']/shell", "/bin/sh", true),
    ] {
        session
            .set_item(Datastore::Running, path, value(v, default))
            .expect("seed");
    }
    session
        .set_item(
            Datastore::Running,
            "/dev:system/uptime",
            StoredValue {
                state: true,
                ..value("3600", false)
            },
        )
        .expect("seed state");
}

fn flag(tree: &DataTree, path: &str) -> bool {
    let id = tree.find_path(path).expect("parse").expect(path);
    tree.node(id).is_default()
}

/// Store wrapper that counts datastore switches and can fail refreshes.
#[derive(Debug)]
struct CountingStore {
    inner: MemoryStore,
    switches: Arc<AtomicUsize>,
    refresh_error: Option<String>,
}

impl ConfigStore for CountingStore {
    fn datastore(&self) -> Datastore {
        self.inner.datastore()
    }
    fn switch_datastore(&mut self, datastore: Datastore) -> Result<(), StoreFault> {
        self.switches.fetch_add(1, Ordering::SeqCst);
        self.inner.switch_datastore(datastore)
    }
    fn config_only(&self) -> bool {
        self.inner.config_only()
    }
    fn set_config_only(&mut self, config_only: bool) -> Result<(), StoreFault> {
        self.inner.set_config_only(config_only)
    }
    fn refresh(&mut self) -> Result<(), StoreFault> {
        match &self.refresh_error {
            Some(message) => Err(StoreFault::Backend(message.clone())),
            None => self.inner.refresh(),
        }
    }
    fn get_items(&self, filter: &PathFilter) -> Result<ncread_core::store::ItemIter<'_>, StoreFault> {
        self.inner.get_items(filter)
    }
    fn set_item(
        &mut self,
        datastore: Datastore,
        path: &str,
        value: StoredValue,
    ) -> Result<(), StoreFault> {
        self.inner.set_item(datastore, path, value)
    }
    fn install_module(&mut self, module: &str) -> Result<(), StoreFault> {
        self.inner.install_module(module)
    }
    fn installed_modules(&self) -> Result<Vec<String>, StoreFault> {
        self.inner.installed_modules()
    }
}

// =============================================================================
// TIER T0: FILTER COMPILATION
// =============================================================================

mod t0_filter_compilation {
    use super::*;

    /// T0.1: No filter selects every module with data, in schema order.
    #[test]
    fn implicit_filter_is_complete() {
        let schema = device_schema();
        let filters = compile(&Request::get("1"), &schema).expect("compile");
        let modules: Vec<_> = filters.iter().map(|f| f.module().to_string()).collect();
        let expected: Vec<_> = schema.data_modules().map(|m| m.name.clone()).collect();
        assert_eq!(modules, expected);
        assert!(filters.iter().all(|f| f.segments()[0].is_wildcard()));
    }

    /// T0.2: Subtree filters translate to the documented paths.
    #[test]
    fn subtree_translation() {
        let schema = device_schema();
        let request = Request::get("1").with_filter(Filter::Subtree(vec![
            SubtreeNode::select("system").with_child(
                SubtreeNode::select("user")
                    .with_child(SubtreeNode::matching("name", "ops"))
                    .with_child(SubtreeNode::select("shell")),
            ),
            SubtreeNode::select("netconf-state")
                .in_module("ietf-netconf-monitoring")
                .with_child(SubtreeNode::select("statistics")),
        ]));
        let filters: Vec<_> = compile(&request, &schema)
            .expect("compile")
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            filters,
            vec![
                "/dev:system/user[name='ops']/shell",
                "/ietf-netconf-monitoring:netconf-state/statistics",
            ]
        );
    }

    /// T0.3: An XPath filter outside the supported subset is a filter error.
    #[test]
    fn unsupported_xpath_rejected() {
        let request = Request::get("1").with_filter(Filter::XPath("/dev:system//port".into()));
        assert!(matches!(
            compile(&request, &device_schema()),
            Err(ReadError::Filter(_))
        ));
    }
}

// =============================================================================
// TIER T1: TREE BUILDING & DEFAULT FLAGS
// =============================================================================

mod t1_tree_building {
    use super::*;

    fn built() -> (Schema, DataTree) {
        let schema = device_schema();
        let mut session = Session::in_memory(1);
        seed_device(&mut session);
        let mut tree = DataTree::new();
        build_subtree(&session, &mut tree, &schema, &PathFilter::module_wildcard("dev"))
            .expect("build");
        (schema, tree)
    }

    /// T1.1: A container holding only defaults is default; one explicit value clears it.
    #[test]
    fn default_flags_follow_content() {
        let (_, tree) = built();
        assert!(flag(&tree, "/dev:system/clock"));
        assert!(flag(&tree, "/dev:system/clock/timezone"));
        assert!(!flag(&tree, "/dev:system/hostname"));
        assert!(!flag(&tree, "/dev:system"));
    }

    /// T1.2: Presence containers and keyed entries are never marked default.
    #[test]
    fn boundaries_are_never_marked() {
        let (_, tree) = built();
        assert!(flag(&tree, "/dev:system/ssh/port"));
        assert!(!flag(&tree, "/dev:system/ssh"));
        assert!(flag(&tree, "/dev:system/user[name='ops']/shell"));
        assert!(!flag(&tree, "/dev:system/user[name='ops']"));
    }

    /// T1.3: Re-inserting the same items changes nothing.
    #[test]
    fn reinsertion_is_idempotent() {
        let schema = device_schema();
        let mut session = Session::in_memory(1);
        seed_device(&mut session);

        let mut tree = DataTree::new();
        let filter = PathFilter::module_wildcard("dev");
        build_subtree(&session, &mut tree, &schema, &filter).expect("first");
        let once = tree.clone();
        build_subtree(&session, &mut tree, &schema, &filter).expect("second");
        assert_eq!(tree, once);
    }

    /// T1.4: A store item that does not fit the schema is a tree-build fault.
    #[test]
    fn mismatched_item_is_internal() {
        let mut session = Session::in_memory(1);
        seed_device(&mut session);
        let mut tree = DataTree::new();
        let err = build_subtree(
            &session,
            &mut tree,
            &two_module_schema(),
            &PathFilter::module_wildcard("dev"),
        )
        .expect_err("unknown schema");
        assert!(err.is_internal());
    }

    /// T1.5: Keyless list entries past the ninth build in position order.
    #[test]
    fn long_keyless_list_builds() {
        let mut schema = Schema::new();
        schema.add_module(
            Module::new("log", "urn:example:log").with_node(
                SchemaNode::container("top")
                    .with_child(SchemaNode::list("entry", &[]).with_child(SchemaNode::leaf("msg"))),
            ),
        );
        let mut session = Session::in_memory(1);
        session.install_module("log").expect("install");
        for pos in 1..=12 {
            session
                .set_item(
                    Datastore::Running,
                    &format!("/log:top/entry[{}]/msg", pos),
                    value(&format!("line {}", pos), false),
                )
                .expect("seed");
        }

        let mut tree = DataTree::new();
        build_subtree(&session, &mut tree, &schema, &PathFilter::parse("/log:top").expect("parse"))
            .expect("build");
        let top = tree.find_path("/log:top").expect("parse").expect("top");
        assert_eq!(tree.node(top).children().len(), 12);
        for pos in [1, 9, 10, 12] {
            let msg = tree
                .find_path(&format!("/log:top/entry[{}]/msg", pos))
                .expect("parse")
                .expect("entry");
            assert_eq!(tree.node(msg).value(), Some(format!("line {}", pos).as_str()));
        }
    }
}

// =============================================================================
// TIER T2: SOURCE MERGING
// =============================================================================

mod t2_source_merging {
    use super::*;

    fn server() -> Server {
        Server::new(device_schema(), ServerConfig::default())
    }

    fn session(server: &Server) -> Session {
        let mut session = server.open_session(7, "admin", "192.0.2.1", StorageBackend::default());
        seed_device(&mut session);
        session
    }

    /// T2.1: get-config returns no local state and no state leaves.
    #[test]
    fn config_only_exclusion() {
        let server = server();
        let mut session = session(&server);
        let reply = server
            .read(&mut session, &Request::get_config("1", Datastore::Running))
            .expect("reply");
        let data = reply.data().expect("data");

        let modules: Vec<_> = data
            .roots()
            .iter()
            .map(|&r| data.node(r).module().to_string())
            .collect();
        assert_eq!(modules, vec!["dev"]);
        assert!(data.find_path("/dev:system/uptime").expect("parse").is_none());
    }

    /// T2.1b: Config-only reads never materialize a local domain.
    #[test]
    fn config_only_skips_local_snapshots() {
        let server = server();
        let session = session(&server);
        let request = Request::get("1").with_filter(Filter::XPath(
            "/ietf-netconf-monitoring:netconf-state/sessions | /ietf-yang-library:modules-state/module-set-id"
                .into(),
        ));
        let filters = compile(&request, server.schema()).expect("compile");

        let mut skipped = LocalSnapshots::new();
        let tree = server
            .build_tree(&session, &filters, true, &mut skipped)
            .expect("config-only build");
        assert!(tree.is_empty());
        assert_eq!(skipped.materialized(), 0);

        let mut used = LocalSnapshots::new();
        let tree = server
            .build_tree(&session, &filters, false, &mut used)
            .expect("full build");
        assert_eq!(tree.roots().len(), 2);
        assert_eq!(used.materialized(), 2);
    }

    /// T2.2: get merges local domains with store data.
    #[test]
    fn get_includes_local_domains() {
        let server = server();
        let mut session = session(&server);
        let request = Request::get("2").with_filter(Filter::XPath(
            "/ietf-netconf-monitoring:netconf-state/sessions | /dev:system/uptime".into(),
        ));
        let reply = server.read(&mut session, &request).expect("reply");
        let data = reply.data().expect("data");

        assert!(
            data.find_path("/ietf-netconf-monitoring:netconf-state/sessions/session[session-id='7']/username")
                .expect("parse")
                .is_some()
        );
        assert!(data.find_path("/dev:system/uptime").expect("parse").is_some());
        assert!(data.find_path("/dev:system/hostname").expect("parse").is_none());
    }

    /// T2.3: Filters with no data in the store yield an empty, valid reply.
    #[test]
    fn no_data_tolerance() {
        let server = server();
        let mut session = server.open_session(8, "admin", "::1", StorageBackend::default());
        let reply = server
            .read(&mut session, &Request::get_config("3", Datastore::Startup))
            .expect("reply");
        assert!(reply.data().expect("data").is_empty());
    }

    /// T2.4: Two filters hitting one domain see the same snapshot.
    #[test]
    fn local_snapshot_shared_between_filters() {
        let server = server();
        let mut session = session(&server);
        let request = Request::get("4").with_filter(Filter::XPath(
            "/ietf-yang-library:modules-state/module-set-id | /ietf-yang-library:modules-state/module[name='dev']"
                .into(),
        ));
        let reply = server.read(&mut session, &request).expect("reply");
        let data = reply.data().expect("data");
        assert_eq!(data.roots().len(), 1);
        assert!(
            data.find_path("/ietf-yang-library:modules-state/module[name='dev'][revision='']/namespace")
                .expect("parse")
                .is_some()
        );
    }
}

// =============================================================================
// TIER T3: REPLIES & SESSIONS
// =============================================================================

mod t3_replies {
    use super::*;

    fn two_module_session(server: &Server) -> Session {
        let mut session = server.open_session(1, "admin", "::1", StorageBackend::default());
        session.install_module("a").expect("install");
        session.install_module("b").expect("install");
        session
            .set_item(Datastore::Running, "/a:settings/timeout", value("30", true))
            .expect("seed");
        session
    }

    /// T3.1: End-to-end get-config with an all-default module and an empty one.
    #[test]
    fn end_to_end_get_config() {
        let server = Server::new(
            two_module_schema(),
            ServerConfig::default().with_defaults(WithDefaultsMode::ReportAll),
        );
        let mut session = two_module_session(&server);
        let request = Request::get_config("101", Datastore::Running);

        let reply = server.handle_read(&mut session, &request);
        let reply = reply.data().expect("data reply");
        let data = reply.data().expect("data output");

        assert_eq!(data.roots().len(), 1);
        let settings = data.roots()[0];
        assert_eq!(data.node(settings).module(), "a");
        assert!(flag(data, "/a:settings/timeout"));
        assert!(data.node(settings).is_default());
        assert_eq!(reply.envelope.request(), &request);
        assert_eq!(reply.with_defaults, WithDefaultsMode::ReportAll);
    }

    /// T3.2: A requested with-defaults mode overrides the server default only.
    #[test]
    fn with_defaults_override() {
        let server = Server::new(
            two_module_schema(),
            ServerConfig::default().with_defaults(WithDefaultsMode::ReportAll),
        );
        let mut session = two_module_session(&server);
        let plain = server
            .read(&mut session, &Request::get_config("1", Datastore::Running))
            .expect("plain");
        let trimmed = server
            .read(
                &mut session,
                &Request::get_config("2", Datastore::Running).with_defaults("trim"),
            )
            .expect("trimmed");

        assert_eq!(trimmed.with_defaults, WithDefaultsMode::Trim);
        assert_eq!(plain.data(), trimmed.data());
    }

    /// T3.3: The store is only switched when the selection changes.
    #[test]
    fn datastore_switch_only_on_change() {
        let server = Server::new(two_module_schema(), ServerConfig::default());
        let switches = Arc::new(AtomicUsize::new(0));
        let store = CountingStore {
            inner: MemoryStore::new(),
            switches: Arc::clone(&switches),
            refresh_error: None,
        };
        let mut session =
            server.open_session(2, "admin", "::1", StorageBackend::External(Box::new(store)));

        for (id, ds) in [
            ("1", Datastore::Running),
            ("2", Datastore::Running),
            ("3", Datastore::Startup),
            ("4", Datastore::Startup),
            ("5", Datastore::Running),
        ] {
            server
                .read(&mut session, &Request::get_config(id, ds))
                .expect("read");
        }
        assert_eq!(switches.load(Ordering::SeqCst), 2);
        assert_eq!(session.datastore(), Datastore::Running);
    }

    /// T3.4: A refresh failure produces an error reply with the store's text.
    #[test]
    fn refresh_failure_structured_reply() {
        let server = Server::new(two_module_schema(), ServerConfig::default());
        let store = CountingStore {
            inner: MemoryStore::new(),
            switches: Arc::new(AtomicUsize::new(0)),
            refresh_error: Some("datastore locked by session 4".into()),
        };
        let mut session =
            server.open_session(3, "admin", "::1", StorageBackend::External(Box::new(store)));

        let reply = server.handle_read(&mut session, &Request::get("9"));
        let err = reply.error().expect("error reply");
        assert_eq!(err.message_id, "9");
        assert_eq!(err.error_tag, "operation-failed");
        assert_eq!(
            err.error_message,
            StoreFault::Backend("datastore locked by session 4".into()).to_string()
        );
    }

    /// T3.5: A modified candidate is read as-is; an unmodified one mirrors running.
    #[test]
    fn candidate_refresh_rules() {
        let server = Server::new(two_module_schema(), ServerConfig::default());
        let mut session = two_module_session(&server);

        let synced = server
            .read(&mut session, &Request::get_config("1", Datastore::Candidate))
            .expect("synced");
        assert_eq!(synced.data().map(DataTree::len), Some(2));

        session
            .set_item(Datastore::Candidate, "/b:unused/x", value("1", false))
            .expect("edit");
        let edited = server
            .read(&mut session, &Request::get_config("2", Datastore::Candidate))
            .expect("edited");
        let data = edited.data().expect("data");
        assert!(data.find_path("/b:unused/x").expect("parse").is_some());
    }

    /// T3.5b: Refreshing one session's candidate leaves another session's edits alone.
    #[test]
    fn candidate_edits_stay_with_their_session() {
        let server = Server::new(two_module_schema(), ServerConfig::default());
        let root = MemoryStore::new();
        let mut editor =
            server.open_session(1, "admin", "::1", StorageBackend::InMemory(root.handle()));
        editor.install_module("a").expect("install");
        editor.install_module("b").expect("install");
        editor
            .set_item(Datastore::Running, "/a:settings/timeout", value("30", true))
            .expect("seed");
        let mut reader =
            server.open_session(2, "oper", "::1", StorageBackend::InMemory(root.handle()));
        let request = |id: &str| Request::get_config(id, Datastore::Candidate);

        server.read(&mut editor, &request("1")).expect("sync");
        editor
            .set_item(Datastore::Candidate, "/b:unused/x", value("1", false))
            .expect("edit");
        let seen = server.read(&mut reader, &request("2")).expect("reader");
        assert!(seen.data().is_some_and(|d| d.find_path("/b:unused").expect("parse").is_none()));

        let own = server.read(&mut editor, &request("3")).expect("editor");
        let data = own.data().expect("data");
        assert!(data.find_path("/b:unused/x").expect("parse").is_some());
        assert!(data.find_path("/a:settings/timeout").expect("parse").is_some());
    }

    /// T3.6: A redb-backed session produces the same reply as an in-memory one.
    #[test]
    fn redb_and_memory_replies_match() {
        let server = Server::new(device_schema(), ServerConfig::default());
        let dir = tempfile::tempdir().expect("tempdir");
        let mut persistent = server.open_session(
            10,
            "admin",
            "::1",
            StorageBackend::Persistent(
                ncread_core::RedbStore::open(dir.path().join("ncread.redb")).expect("open"),
            ),
        );
        let mut volatile = server.open_session(11, "admin", "::1", StorageBackend::default());
        seed_device(&mut persistent);
        seed_device(&mut volatile);

        let request = Request::get_config("1", Datastore::Running)
            .with_filter(Filter::XPath("/dev:system".into()));
        let a = server.read(&mut persistent, &request).expect("redb");
        let b = server.read(&mut volatile, &request).expect("memory");
        assert_eq!(a.data(), b.data());
        assert!(a.data().is_some_and(|d| !d.is_empty()));
    }
}
