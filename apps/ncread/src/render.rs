//! # Reply Rendering
//!
//! Turns a [`ServerReply`] into a JSON document, applying the reply's
//! with-defaults mode to the data tree:
//!
//! - `report-all`: every node
//! - `report-all-tagged`: every node; default leaves carry the
//!   `ietf-netconf-with-defaults:default` annotation
//! - `trim`: leaves equal to their schema default are omitted
//! - `explicit`: leaves the store reported as defaults are omitted
//!
//! Members are named `module:name` at the top level and whenever the module
//! changes, `name` otherwise. List entries and leaf-list values become
//! arrays; annotations use `@name` sibling members.

use ncread_core::primitives::WITH_DEFAULTS_MODULE;
use ncread_core::{DataTree, NodeId, NodeKind, Schema, ServerReply, WithDefaultsMode};
use serde_json::{Map, Value, json};

/// Render a reply as `{"rpc-reply": ...}`.
#[must_use]
pub fn render_reply(reply: &ServerReply, schema: &Schema) -> Value {
    match reply {
        ServerReply::Data(reply) => {
            let data = reply
                .data()
                .map(|tree| render_tree(tree, schema, reply.with_defaults))
                .unwrap_or_else(|| Value::Object(Map::new()));
            json!({
                "rpc-reply": {
                    "message-id": reply.message_id(),
                    "with-defaults": reply.with_defaults.name(),
                    "data": data,
                }
            })
        }
        ServerReply::Error(err) => json!({
            "rpc-reply": {
                "message-id": err.message_id,
                "rpc-error": {
                    "error-type": err.error_type,
                    "error-tag": err.error_tag,
                    "error-severity": err.error_severity,
                    "error-message": {
                        "lang": err.error_message_lang,
                        "value": err.error_message,
                    },
                }
            }
        }),
    }
}

/// Render a data tree under one with-defaults mode.
#[must_use]
pub fn render_tree(tree: &DataTree, schema: &Schema, mode: WithDefaultsMode) -> Value {
    let renderer = Renderer { tree, schema, mode };
    Value::Object(renderer.members(tree.roots(), None))
}

struct Renderer<'a> {
    tree: &'a DataTree,
    schema: &'a Schema,
    mode: WithDefaultsMode,
}

impl Renderer<'_> {
    fn member_name(&self, id: NodeId, parent_module: Option<&str>) -> String {
        let node = self.tree.node(id);
        if parent_module == Some(node.module()) {
            node.name().to_string()
        } else {
            format!("{}:{}", node.module(), node.name())
        }
    }

    fn schema_default(&self, id: NodeId) -> Option<&str> {
        self.schema
            .node_at(&self.tree.instance_segments(id))
            .and_then(|n| n.default.as_deref())
    }

    fn is_key(&self, id: NodeId) -> bool {
        self.tree
            .node(id)
            .parent()
            .is_some_and(|p| self.tree.node(p).key_children().contains(&id))
    }

    /// Whether a terminal node is left out of the output.
    fn omitted(&self, id: NodeId) -> bool {
        let node = self.tree.node(id);
        if !node.kind().is_terminal() || self.is_key(id) {
            return false;
        }
        match self.mode {
            WithDefaultsMode::ReportAll | WithDefaultsMode::ReportAllTagged => false,
            WithDefaultsMode::Explicit => node.is_default(),
            WithDefaultsMode::Trim => {
                node.is_default() || (node.value().is_some() && node.value() == self.schema_default(id))
            }
        }
    }

    fn tagged(&self, id: NodeId) -> bool {
        self.mode == WithDefaultsMode::ReportAllTagged && self.tree.node(id).is_default()
    }

    /// Render sibling nodes into one JSON object.
    fn members(&self, ids: &[NodeId], parent_module: Option<&str>) -> Map<String, Value> {
        let mut out = Map::new();
        let mut annotations: Map<String, Value> = Map::new();

        for &id in ids {
            if self.omitted(id) {
                continue;
            }
            let node = self.tree.node(id);
            let name = self.member_name(id, parent_module);
            let Some(value) = self.value(id) else {
                continue;
            };

            match node.kind() {
                NodeKind::KeyedList | NodeKind::KeylessList => push_entry(&mut out, &name, value),
                NodeKind::LeafList => {
                    let position = out.get(&name).and_then(Value::as_array).map_or(0, Vec::len);
                    push_entry(&mut out, &name, value);
                    if self.tagged(id) {
                        let slot = annotations
                            .entry(format!("@{name}"))
                            .or_insert_with(|| Value::Array(Vec::new()));
                        if let Value::Array(tags) = slot {
                            tags.resize(position, Value::Null);
                            tags.push(default_tag());
                        }
                    }
                }
                _ => {
                    if self.tagged(id) {
                        annotations.insert(format!("@{name}"), default_tag());
                    }
                    out.insert(name, value);
                }
            }
        }

        out.extend(annotations);
        out
    }

    /// JSON value of one node; `None` when an emptied container is dropped.
    fn value(&self, id: NodeId) -> Option<Value> {
        let node = self.tree.node(id);
        match node.kind() {
            NodeKind::Leaf | NodeKind::LeafList | NodeKind::AnyXml => {
                Some(Value::String(node.value().unwrap_or_default().to_string()))
            }
            NodeKind::Container => {
                let members = self.members(node.children(), Some(node.module()));
                if members.is_empty() && !node.children().is_empty() {
                    None
                } else {
                    Some(Value::Object(members))
                }
            }
            NodeKind::PresenceContainer | NodeKind::KeyedList | NodeKind::KeylessList => {
                Some(Value::Object(self.members(node.children(), Some(node.module()))))
            }
        }
    }
}

fn push_entry(out: &mut Map<String, Value>, name: &str, value: Value) {
    let slot = out
        .entry(name.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(entries) = slot {
        entries.push(value);
    }
}

fn default_tag() -> Value {
    let mut tag = Map::new();
    tag.insert(format!("{WITH_DEFAULTS_MODULE}:default"), Value::Bool(true));
    Value::Object(tag)
}
