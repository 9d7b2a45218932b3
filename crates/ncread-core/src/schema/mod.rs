//! # Schema Model
//!
//! The subset of a YANG schema the read path consults:
//! - module inventory (name, namespace, revision)
//! - the structural kind of every data node (presence, keyed lists)
//! - config/state classification and declared defaults
//! - tree validation for `get` and `get-config` replies
//!
//! Schemas are plain data and can be loaded from JSON fixtures through serde.
//! `Schema::with_builtin_modules` adds the protocol modules the server always
//! implements (see [`builtin`]).

pub mod builtin;

use crate::path::Segment;
use crate::tree::DataTree;
use crate::types::{NodeId, NodeKind, ReadError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// SCHEMA NODES
// =============================================================================

/// Kind of a schema statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaKind {
    Container,
    PresenceContainer,
    List,
    Leaf,
    LeafList,
    AnyXml,
    /// Reusable definitions only; never instantiated as data.
    Grouping,
    Notification,
    Rpc,
}

impl SchemaKind {
    /// Whether this statement defines data nodes.
    #[must_use]
    pub const fn is_data(self) -> bool {
        !matches!(self, Self::Grouping | Self::Notification | Self::Rpc)
    }
}

/// A schema statement with its children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaNode {
    pub name: String,
    pub kind: SchemaKind,
    /// Key leaf names, in order (lists only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    /// `false` marks state data; inherited by descendants.
    #[serde(default = "default_config")]
    pub config: bool,
    /// Declared default value (leaves only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SchemaNode>,
}

fn default_config() -> bool {
    true
}

impl SchemaNode {
    fn new(name: impl Into<String>, kind: SchemaKind) -> Self {
        Self {
            name: name.into(),
            kind,
            keys: Vec::new(),
            config: true,
            default: None,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn container(name: impl Into<String>) -> Self {
        Self::new(name, SchemaKind::Container)
    }

    #[must_use]
    pub fn presence_container(name: impl Into<String>) -> Self {
        Self::new(name, SchemaKind::PresenceContainer)
    }

    /// A list; an empty key set makes it a keyless (state-only) list.
    #[must_use]
    pub fn list(name: impl Into<String>, keys: &[&str]) -> Self {
        let mut node = Self::new(name, SchemaKind::List);
        node.keys = keys.iter().map(|k| (*k).to_string()).collect();
        node
    }

    #[must_use]
    pub fn leaf(name: impl Into<String>) -> Self {
        Self::new(name, SchemaKind::Leaf)
    }

    #[must_use]
    pub fn leaf_list(name: impl Into<String>) -> Self {
        Self::new(name, SchemaKind::LeafList)
    }

    #[must_use]
    pub fn anyxml(name: impl Into<String>) -> Self {
        Self::new(name, SchemaKind::AnyXml)
    }

    #[must_use]
    pub fn grouping(name: impl Into<String>) -> Self {
        Self::new(name, SchemaKind::Grouping)
    }

    #[must_use]
    pub fn notification(name: impl Into<String>) -> Self {
        Self::new(name, SchemaKind::Notification)
    }

    #[must_use]
    pub fn rpc(name: impl Into<String>) -> Self {
        Self::new(name, SchemaKind::Rpc)
    }

    /// Builder: append a child statement.
    #[must_use]
    pub fn with_child(mut self, child: SchemaNode) -> Self {
        self.children.push(child);
        self
    }

    /// Builder: append several child statements.
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = SchemaNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Builder: declare a default value.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Builder: mark as state data (`config false`).
    #[must_use]
    pub fn state(mut self) -> Self {
        self.config = false;
        self
    }

    /// Structural kind of data instances of this node.
    #[must_use]
    pub fn data_kind(&self) -> Option<NodeKind> {
        match self.kind {
            SchemaKind::Container => Some(NodeKind::Container),
            SchemaKind::PresenceContainer => Some(NodeKind::PresenceContainer),
            SchemaKind::List if self.keys.is_empty() => Some(NodeKind::KeylessList),
            SchemaKind::List => Some(NodeKind::KeyedList),
            SchemaKind::Leaf => Some(NodeKind::Leaf),
            SchemaKind::LeafList => Some(NodeKind::LeafList),
            SchemaKind::AnyXml => Some(NodeKind::AnyXml),
            SchemaKind::Grouping | SchemaKind::Notification | SchemaKind::Rpc => None,
        }
    }

    /// Data child with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&SchemaNode> {
        self.children
            .iter()
            .find(|c| c.name == name && c.kind.is_data())
    }

    /// Whether `name` is one of this list's keys.
    #[must_use]
    pub fn is_key(&self, name: &str) -> bool {
        self.keys.iter().any(|k| k == name)
    }
}

// =============================================================================
// MODULES
// =============================================================================

/// A schema module and its top-level statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default)]
    pub nodes: Vec<SchemaNode>,
}

impl Module {
    /// Create an empty module.
    #[must_use]
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            revision: None,
            nodes: Vec::new(),
        }
    }

    /// Builder: set the revision.
    #[must_use]
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Builder: append a top-level statement.
    #[must_use]
    pub fn with_node(mut self, node: SchemaNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// A module defines data if any top-level statement is a data node.
    #[must_use]
    pub fn has_data_definitions(&self) -> bool {
        self.nodes.iter().any(|n| n.kind.is_data())
    }

    /// Top-level data node with the given name.
    #[must_use]
    pub fn top_level(&self, name: &str) -> Option<&SchemaNode> {
        self.nodes.iter().find(|n| n.name == name && n.kind.is_data())
    }
}

// =============================================================================
// SCHEMA
// =============================================================================

/// Which rule set a reply tree is validated under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// `<get>`: configuration and state data.
    Get,
    /// `<get-config>`: configuration data only.
    GetConfig,
}

/// The module inventory known to the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    modules: Vec<Module>,
}

impl Schema {
    /// An empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A schema pre-populated with the protocol modules.
    #[must_use]
    pub fn with_builtin_modules() -> Self {
        let mut schema = Self::new();
        for module in builtin::modules() {
            schema.add_module(module);
        }
        schema
    }

    /// Add a module, replacing any module of the same name.
    pub fn add_module(&mut self, module: Module) {
        match self.modules.iter_mut().find(|m| m.name == module.name) {
            Some(existing) => *existing = module,
            None => self.modules.push(module),
        }
    }

    /// Merge another schema's modules into this one.
    pub fn extend(&mut self, other: Schema) {
        for module in other.modules {
            self.add_module(module);
        }
    }

    /// All modules in load order.
    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// Module by name.
    #[must_use]
    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Modules with at least one real data definition, in load order.
    pub fn data_modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter().filter(|m| m.has_data_definitions())
    }

    /// Modules defining a top-level data node called `name`.
    pub fn modules_defining<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Module> + 'a {
        self.modules
            .iter()
            .filter(move |m| m.top_level(name).is_some())
    }

    /// Resolve the schema node addressed by a segment list.
    ///
    /// Wildcards never resolve.
    #[must_use]
    pub fn node_at(&self, segments: &[Segment]) -> Option<&SchemaNode> {
        let (first, rest) = segments.split_first()?;
        let mut node = self.module(&first.module)?.top_level(&first.name)?;
        for seg in rest {
            if seg.module != first.module {
                return None;
            }
            node = node.child(&seg.name)?;
        }
        Some(node)
    }

    /// Whether the addressed node is state data (it or an ancestor is `config false`).
    ///
    /// Unknown paths are reported as configuration.
    #[must_use]
    pub fn is_state(&self, segments: &[Segment]) -> bool {
        let Some((first, rest)) = segments.split_first() else {
            return false;
        };
        let Some(mut node) = self
            .module(&first.module)
            .and_then(|m| m.top_level(&first.name))
        else {
            return false;
        };
        if !node.config {
            return true;
        }
        for seg in rest {
            match node.child(&seg.name) {
                Some(child) if !child.config => return true,
                Some(child) => node = child,
                None => return false,
            }
        }
        false
    }

    /// Identifier of the current module set.
    ///
    /// BLAKE3 over every module name and revision, as hex. Identical across
    /// processes and builds for identical module inventories.
    #[must_use]
    pub fn module_set_id(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for module in &self.modules {
            hasher.update(module.name.as_bytes());
            hasher.update(&[0]);
            hasher.update(module.revision.as_deref().unwrap_or_default().as_bytes());
            hasher.update(&[0]);
        }
        hasher.finalize().to_hex().to_string()
    }

    // =========================================================================
    // VALIDATION
    // =========================================================================

    /// Validate a data tree against this schema.
    ///
    /// Checks every node's schema identity and kind, value presence, list keys,
    /// sibling uniqueness and, for `GetConfig`, the absence of state data.
    pub fn validate(&self, tree: &DataTree, mode: ValidationMode) -> Result<(), ReadError> {
        let mut stack: Vec<(NodeId, &SchemaNode, bool)> = Vec::new();

        for &root in tree.roots() {
            let node = tree.node(root);
            let schema = self
                .module(node.module())
                .and_then(|m| m.top_level(node.name()))
                .ok_or_else(|| {
                    ReadError::Assembly(format!(
                        "unknown top-level node {}:{}",
                        node.module(),
                        node.name()
                    ))
                })?;
            stack.push((root, schema, !schema.config));
        }
        self.check_siblings(tree, tree.roots())?;

        while let Some((id, schema, state)) = stack.pop() {
            let node = tree.node(id);
            let path = || tree.path_string(id);

            if schema.data_kind() != Some(node.kind()) {
                return Err(ReadError::Assembly(format!(
                    "node {} has kind {:?}, schema expects {:?}",
                    path(),
                    node.kind(),
                    schema.kind
                )));
            }
            if node.kind().has_value() != node.value().is_some() {
                return Err(ReadError::Assembly(format!(
                    "node {} has an invalid value",
                    path()
                )));
            }
            if mode == ValidationMode::GetConfig && state {
                return Err(ReadError::Assembly(format!(
                    "state data {} in a configuration reply",
                    path()
                )));
            }
            if node.kind() == NodeKind::KeyedList {
                for key in &schema.keys {
                    let count = node
                        .children()
                        .iter()
                        .filter(|&&c| tree.node(c).name() == key.as_str())
                        .count();
                    if count != 1 {
                        return Err(ReadError::Assembly(format!(
                            "list entry {} must carry key '{}' exactly once",
                            path(),
                            key
                        )));
                    }
                }
            }

            self.check_siblings(tree, node.children())?;
            for &child in node.children() {
                let child_node = tree.node(child);
                let child_schema = schema
                    .child(child_node.name())
                    .filter(|_| child_node.module() == node.module())
                    .ok_or_else(|| {
                        ReadError::Assembly(format!(
                            "unknown node {} under {}",
                            child_node.name(),
                            path()
                        ))
                    })?;
                stack.push((child, child_schema, state || !child_schema.config));
            }
        }
        Ok(())
    }

    fn check_siblings(&self, tree: &DataTree, siblings: &[NodeId]) -> Result<(), ReadError> {
        let mut singletons: BTreeSet<(&str, &str)> = BTreeSet::new();
        let mut instances: BTreeMap<(&str, &str), BTreeSet<String>> = BTreeMap::new();

        for &id in siblings {
            let node = tree.node(id);
            let ident = (node.module(), node.name());
            let duplicate = match node.kind() {
                NodeKind::Container
                | NodeKind::PresenceContainer
                | NodeKind::Leaf
                | NodeKind::AnyXml => !singletons.insert(ident),
                NodeKind::KeyedList | NodeKind::LeafList => {
                    !instances.entry(ident).or_default().insert(tree.path_string(id))
                }
                NodeKind::KeylessList => false,
            };
            if duplicate {
                return Err(ReadError::Assembly(format!(
                    "duplicate instance {}",
                    tree.path_string(id)
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
