//! # Local Data Sources
//!
//! Three state documents are served by the server itself rather than the
//! configuration store:
//! - schema inventory (`ietf-yang-library`)
//! - monitoring (`ietf-netconf-monitoring`)
//! - notification capabilities (`nc-notifications`)
//!
//! Each is materialized as a whole [`DataTree`] at most once per request,
//! on first use. Filters hitting a domain select nodes from its snapshot and
//! merge them into the result tree with their default flags.

use crate::monitoring::{Monitor, Statistics};
use crate::path::{PathFilter, Segment};
use crate::primitives::{
    BASE_CAPABILITIES, MONITORING_MODULE, NOTIFICATIONS_MODULE, WITH_DEFAULTS_CAPABILITY,
    YANG_LIBRARY_MODULE,
};
use crate::schema::Schema;
use crate::tree::DataTree;
use crate::types::{Datastore, ReadError, TreeError};
use crate::with_defaults::WithDefaultsMode;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

// =============================================================================
// DOMAINS
// =============================================================================

/// A locally served data domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalDomain {
    SchemaInventory,
    Monitoring,
    NotificationCapabilities,
}

impl LocalDomain {
    pub const ALL: [LocalDomain; 3] = [
        Self::SchemaInventory,
        Self::Monitoring,
        Self::NotificationCapabilities,
    ];

    /// Module whose data this domain serves.
    #[must_use]
    pub const fn module(self) -> &'static str {
        match self {
            Self::SchemaInventory => YANG_LIBRARY_MODULE,
            Self::Monitoring => MONITORING_MODULE,
            Self::NotificationCapabilities => NOTIFICATIONS_MODULE,
        }
    }

    /// Path prefix of every filter routed to this domain (`/<module>:`).
    #[must_use]
    pub fn prefix(self) -> String {
        format!("/{}:", self.module())
    }

    /// Domain serving a filter, if it is local.
    #[must_use]
    pub fn for_filter(filter: &PathFilter) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.module() == filter.module())
    }

    const fn slot(self) -> usize {
        match self {
            Self::SchemaInventory => 0,
            Self::Monitoring => 1,
            Self::NotificationCapabilities => 2,
        }
    }

    /// Build the domain's whole document.
    pub fn materialize(self, sources: &LocalSources<'_>) -> Result<DataTree, ReadError> {
        let mut doc = Document::new(sources.schema, self.module());
        match self {
            Self::SchemaInventory => schema_inventory(&mut doc, sources.schema)?,
            Self::Monitoring => monitoring(&mut doc, sources)?,
            Self::NotificationCapabilities => notification_capabilities(&mut doc, sources.monitor)?,
        }
        Ok(doc.tree)
    }
}

/// Everything the local domains are built from.
#[derive(Debug, Clone, Copy)]
pub struct LocalSources<'a> {
    pub schema: &'a Schema,
    pub monitor: &'a Monitor,
    /// Server default with-defaults mode (advertised as the basic mode).
    pub with_defaults: WithDefaultsMode,
}

// =============================================================================
// SNAPSHOTS
// =============================================================================

/// Per-request cache of materialized domain documents.
///
/// Dropped once, when the request's filter loop ends.
#[derive(Debug, Default)]
pub struct LocalSnapshots {
    trees: [Option<DataTree>; 3],
    materialized: usize,
}

impl LocalSnapshots {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents built so far.
    #[must_use]
    pub fn materialized(&self) -> usize {
        self.materialized
    }

    /// The domain's snapshot, building it on first use.
    pub fn get_or_materialize(
        &mut self,
        domain: LocalDomain,
        sources: &LocalSources<'_>,
    ) -> Result<&DataTree, ReadError> {
        let slot = &mut self.trees[domain.slot()];
        if slot.is_none() {
            debug!(module = domain.module(), "Materializing local data");
            *slot = Some(domain.materialize(sources)?);
            self.materialized += 1;
        }
        slot.as_ref()
            .ok_or_else(|| ReadError::Internal("local snapshot missing".into()))
    }

    /// Merge the nodes `filter` selects from the domain snapshot into `tree`.
    pub fn merge_into(
        &mut self,
        tree: &mut DataTree,
        domain: LocalDomain,
        filter: &PathFilter,
        sources: &LocalSources<'_>,
    ) -> Result<(), ReadError> {
        let snapshot = self.get_or_materialize(domain, sources)?;
        let selected = snapshot.select(filter);
        debug!(filter = %filter, nodes = selected.len(), "Merging local data");
        for id in selected {
            tree.merge_subtree(sources.schema, snapshot, id)?;
        }
        Ok(())
    }
}

// =============================================================================
// DOCUMENT BUILDERS
// =============================================================================

/// A domain document under construction.
struct Document<'a> {
    schema: &'a Schema,
    module: &'static str,
    tree: DataTree,
}

impl<'a> Document<'a> {
    fn new(schema: &'a Schema, module: &'static str) -> Self {
        Self {
            schema,
            module,
            tree: DataTree::new(),
        }
    }

    fn seg(&self, name: &str) -> Segment {
        Segment::new(self.module, name)
    }

    /// Insert a leaf (or leaf-list entry) under `parent`.
    fn leaf(&mut self, parent: &[Segment], name: &str, value: &str) -> Result<(), TreeError> {
        let mut path = parent.to_vec();
        path.push(self.seg(name));
        self.tree.insert(self.schema, &path, Some(value))?;
        Ok(())
    }

    fn leaf_list(&mut self, parent: &[Segment], name: &str, value: &str) -> Result<(), TreeError> {
        let mut path = parent.to_vec();
        path.push(self.seg(name).with_value(value));
        self.tree.insert(self.schema, &path, None)?;
        Ok(())
    }

    /// Insert an interior node (container or list entry) at `path`.
    fn node(&mut self, path: &[Segment]) -> Result<(), TreeError> {
        self.tree.insert(self.schema, path, None)?;
        Ok(())
    }
}

fn timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn schema_inventory(doc: &mut Document<'_>, schema: &Schema) -> Result<(), TreeError> {
    let root = vec![doc.seg("modules-state")];
    doc.leaf(&root, "module-set-id", &schema.module_set_id())?;

    for module in schema.modules() {
        let revision = module.revision.clone().unwrap_or_default();
        let mut entry = root.clone();
        entry.push(
            doc.seg("module")
                .with_key("name", module.name.as_str())
                .with_key("revision", revision.as_str()),
        );
        doc.leaf(&entry, "namespace", &module.namespace)?;
        doc.leaf(&entry, "conformance-type", "implement")?;
    }
    Ok(())
}

fn monitoring(doc: &mut Document<'_>, sources: &LocalSources<'_>) -> Result<(), TreeError> {
    let root = vec![doc.seg("netconf-state")];

    let mut caps = root.clone();
    caps.push(doc.seg("capabilities"));
    for cap in BASE_CAPABILITIES {
        doc.leaf_list(&caps, "capability", cap)?;
    }
    let also: Vec<&str> = WithDefaultsMode::ALL
        .into_iter()
        .filter(|m| *m != sources.with_defaults)
        .map(WithDefaultsMode::name)
        .collect();
    let with_defaults = format!(
        "{}?basic-mode={}&also-supported={}",
        WITH_DEFAULTS_CAPABILITY,
        sources.with_defaults,
        also.join(",")
    );
    doc.leaf_list(&caps, "capability", &with_defaults)?;
    for module in sources.schema.modules() {
        let mut cap = format!("{}?module={}", module.namespace, module.name);
        if let Some(revision) = &module.revision {
            cap.push_str("&revision=");
            cap.push_str(revision);
        }
        doc.leaf_list(&caps, "capability", &cap)?;
    }

    let mut datastores = root.clone();
    datastores.push(doc.seg("datastores"));
    for datastore in Datastore::ALL {
        let mut entry = datastores.clone();
        entry.push(doc.seg("datastore").with_key("name", datastore.name()));
        doc.node(&entry)?;
    }

    let mut schemas = root.clone();
    schemas.push(doc.seg("schemas"));
    for module in sources.schema.modules() {
        let mut entry = schemas.clone();
        entry.push(
            doc.seg("schema")
                .with_key("identifier", module.name.as_str())
                .with_key("version", module.revision.clone().unwrap_or_default())
                .with_key("format", "yang"),
        );
        doc.leaf(&entry, "namespace", &module.namespace)?;
        doc.leaf_list(&entry, "location", "NETCONF")?;
    }

    let mut sessions = root.clone();
    sessions.push(doc.seg("sessions"));
    for info in sources.monitor.sessions() {
        let mut entry = sessions.clone();
        entry.push(doc.seg("session").with_key("session-id", info.id.to_string()));
        doc.leaf(&entry, "transport", &info.transport)?;
        doc.leaf(&entry, "username", &info.username)?;
        doc.leaf(&entry, "source-host", &info.source_host)?;
        doc.leaf(&entry, "login-time", &timestamp(&info.login_time))?;
        doc.leaf(&entry, "in-rpcs", &info.in_rpcs.to_string())?;
        doc.leaf(&entry, "in-bad-rpcs", &info.in_bad_rpcs.to_string())?;
        doc.leaf(&entry, "out-rpc-errors", &info.out_rpc_errors.to_string())?;
        doc.leaf(&entry, "out-notifications", &info.out_notifications.to_string())?;
    }

    let mut statistics = root;
    statistics.push(doc.seg("statistics"));
    let stats: Statistics = sources.monitor.statistics();
    doc.leaf(&statistics, "netconf-start-time", &timestamp(&stats.start_time))?;
    for (name, value) in [
        ("in-bad-hellos", stats.in_bad_hellos),
        ("in-sessions", stats.in_sessions),
        ("dropped-sessions", stats.dropped_sessions),
        ("in-rpcs", stats.in_rpcs),
        ("in-bad-rpcs", stats.in_bad_rpcs),
        ("out-rpc-errors", stats.out_rpc_errors),
        ("out-notifications", stats.out_notifications),
    ] {
        doc.leaf(&statistics, name, &value.to_string())?;
    }
    Ok(())
}

fn notification_capabilities(doc: &mut Document<'_>, monitor: &Monitor) -> Result<(), TreeError> {
    let streams = vec![doc.seg("netconf"), doc.seg("streams")];
    for stream in monitor.streams() {
        let mut entry = streams.clone();
        entry.push(doc.seg("stream").with_key("name", stream.name.as_str()));
        doc.leaf(&entry, "description", &stream.description)?;
        doc.leaf(&entry, "replaySupport", if stream.replay_support { "true" } else { "false" })?;
        if let Some(created) = &stream.replay_log_creation_time {
            doc.leaf(&entry, "replayLogCreationTime", &timestamp(created))?;
        }
    }
    Ok(())
}
