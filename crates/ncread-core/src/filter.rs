//! # Filter Compiler
//!
//! Turns the filter clause of a read request into the ordered list of path
//! filters the store and the local sources are queried with.
//!
//! - **XPath**: top-level `|` alternatives, each an absolute path in the
//!   supported subset.
//! - **Subtree**: RFC 6241 section 6 filter nodes. Content-match nodes become
//!   predicates on their parent, selection nodes select their own path and
//!   containment nodes recurse.
//! - **No filter**: one `/<module>:*` per schema module that defines data.
//!
//! Output order only determines merge order. Duplicates are dropped, keeping
//! the first occurrence.

use crate::path::{PathFilter, Segment};
use crate::primitives::{MAX_FILTER_COUNT, MAX_PATH_DEPTH};
use crate::rpc::Request;
use crate::schema::Schema;
use crate::types::ReadError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// FILTER CLAUSE
// =============================================================================

/// The filter clause of a read request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "select", rename_all = "lowercase")]
pub enum Filter {
    /// Subtree filter: a forest of filter nodes.
    Subtree(Vec<SubtreeNode>),
    /// XPath filter expression.
    XPath(String),
}

/// One node of a subtree filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtreeNode {
    /// Explicit module (namespace) of the node; inherited when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    pub name: String,
    /// Text content. Set on content-match nodes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SubtreeNode>,
}

impl SubtreeNode {
    /// A selection node.
    #[must_use]
    pub fn select(name: impl Into<String>) -> Self {
        Self {
            module: None,
            name: name.into(),
            content: None,
            children: Vec::new(),
        }
    }

    /// A content-match node.
    #[must_use]
    pub fn matching(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::select(name)
        }
    }

    /// Builder: qualify the node with a module.
    #[must_use]
    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Builder: add a child (turns the node into a containment node).
    #[must_use]
    pub fn with_child(mut self, child: SubtreeNode) -> Self {
        self.children.push(child);
        self
    }

    fn is_content_match(&self) -> bool {
        self.content.is_some() && self.children.is_empty()
    }
}

// =============================================================================
// COMPILATION
// =============================================================================

/// Compile the filter clause of `request` into path filters.
pub fn compile(request: &Request, schema: &Schema) -> Result<Vec<PathFilter>, ReadError> {
    let filters = match &request.filter {
        None => schema
            .data_modules()
            .map(|m| PathFilter::module_wildcard(&m.name))
            .collect(),
        Some(Filter::XPath(expr)) => compile_xpath(expr, schema)?,
        Some(Filter::Subtree(nodes)) => compile_subtree(nodes, schema)?,
    };
    if filters.len() > MAX_FILTER_COUNT {
        return Err(ReadError::Filter(format!(
            "filter expands to {} paths (limit {})",
            filters.len(),
            MAX_FILTER_COUNT
        )));
    }
    Ok(dedup(filters))
}

fn dedup(filters: Vec<PathFilter>) -> Vec<PathFilter> {
    let mut seen = BTreeSet::new();
    filters
        .into_iter()
        .filter(|f| seen.insert(f.to_string()))
        .collect()
}

fn compile_xpath(expr: &str, schema: &Schema) -> Result<Vec<PathFilter>, ReadError> {
    let mut filters = Vec::new();
    for alternative in split_alternatives(expr) {
        let alternative = alternative.trim();
        let filter =
            PathFilter::parse(alternative).map_err(|e| ReadError::Filter(e.to_string()))?;
        if schema.module(filter.module()).is_none() {
            return Err(ReadError::Filter(format!(
                "unknown module prefix '{}' in '{}'",
                filter.module(),
                alternative
            )));
        }
        filters.push(filter);
    }
    Ok(filters)
}

/// Split on `|` outside of quotes and predicates.
fn split_alternatives(expr: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in expr.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, '|') if depth == 0 => {
                parts.push(&expr[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&expr[start..]);
    parts
}

fn compile_subtree(nodes: &[SubtreeNode], schema: &Schema) -> Result<Vec<PathFilter>, ReadError> {
    let mut filters = Vec::new();
    for node in nodes {
        let module = resolve_top_module(node, schema)?;
        let mut prefix = Vec::new();
        walk(node, &module, &mut prefix, &mut filters)?;
    }
    Ok(filters)
}

fn resolve_top_module(node: &SubtreeNode, schema: &Schema) -> Result<String, ReadError> {
    if let Some(module) = &node.module {
        return schema
            .module(module)
            .map(|m| m.name.clone())
            .ok_or_else(|| ReadError::Filter(format!("unknown module '{}'", module)));
    }
    let candidates: Vec<&str> = schema
        .modules_defining(&node.name)
        .map(|m| m.name.as_str())
        .collect();
    match candidates.as_slice() {
        [only] => Ok((*only).to_string()),
        [] => Err(ReadError::Filter(format!(
            "no module defines top-level node '{}'",
            node.name
        ))),
        many => Err(ReadError::Filter(format!(
            "top-level node '{}' is ambiguous between modules {}",
            node.name,
            many.join(", ")
        ))),
    }
}

fn walk(
    node: &SubtreeNode,
    parent_module: &str,
    prefix: &mut Vec<Segment>,
    out: &mut Vec<PathFilter>,
) -> Result<(), ReadError> {
    if prefix.len() >= MAX_PATH_DEPTH {
        return Err(ReadError::Filter(format!(
            "subtree filter nested deeper than {} levels",
            MAX_PATH_DEPTH
        )));
    }
    if node.content.is_some() && !node.children.is_empty() {
        return Err(ReadError::Filter(format!(
            "filter node '{}' mixes content and child nodes",
            node.name
        )));
    }

    let module = node.module.as_deref().unwrap_or(parent_module);
    let mut segment = Segment::new(module, node.name.as_str());

    if let Some(content) = &node.content {
        // Top-level content match: the node itself must equal the content.
        segment = segment.with_value(content.as_str());
    }
    for child in node.children.iter().filter(|c| c.is_content_match()) {
        // Predicates name child leaves without a module.
        if let Some(other) = child.module.as_deref().filter(|m| *m != module) {
            return Err(ReadError::Filter(format!(
                "content match on '{}:{}' under '{}:{}' crosses modules",
                other, child.name, module, node.name
            )));
        }
        if let Some(content) = &child.content {
            segment = segment.with_key(child.name.as_str(), content.as_str());
        }
    }

    prefix.push(segment);
    let nested: Vec<&SubtreeNode> = node
        .children
        .iter()
        .filter(|c| !c.is_content_match())
        .collect();

    if nested.is_empty() {
        if let Some(filter) = PathFilter::from_segments(prefix.clone()) {
            out.push(filter);
        }
    } else {
        for child in nested {
            walk(child, module, prefix, out)?;
        }
    }
    prefix.pop();
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Module, SchemaNode};
    use crate::types::Datastore;

    fn schema() -> Schema {
        let mut schema = Schema::with_builtin_modules();
        schema.add_module(
            Module::new("ifaces", "urn:ifaces").with_node(
                SchemaNode::container("interfaces").with_child(
                    SchemaNode::list("interface", &["name"])
                        .with_child(SchemaNode::leaf("name"))
                        .with_child(SchemaNode::leaf("enabled"))
                        .with_child(SchemaNode::leaf("mtu"))
                        .with_child(SchemaNode::container("ipv4").with_child(SchemaNode::leaf("address"))),
                ),
            ),
        );
        schema.add_module(Module::new("types-only", "urn:t").with_node(SchemaNode::grouping("g")));
        schema
    }

    fn rendered(filters: &[PathFilter]) -> Vec<String> {
        filters.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn no_filter_selects_every_data_module() {
        let req = Request::get_config("1", Datastore::Running);
        let filters = compile(&req, &schema()).expect("compile");
        assert_eq!(
            rendered(&filters),
            vec![
                "/ietf-yang-library:*",
                "/ietf-netconf-monitoring:*",
                "/nc-notifications:*",
                "/ifaces:*",
            ]
        );
    }

    #[test]
    fn xpath_alternatives_split_outside_predicates() {
        let req = Request::get("1").with_filter(Filter::XPath(
            "/ifaces:interfaces/interface[name='a|b'] | /ietf-netconf-monitoring:netconf-state"
                .into(),
        ));
        let filters = compile(&req, &schema()).expect("compile");
        assert_eq!(
            rendered(&filters),
            vec![
                "/ifaces:interfaces/interface[name='a|b']",
                "/ietf-netconf-monitoring:netconf-state",
            ]
        );
    }

    #[test]
    fn xpath_outside_subset_is_rejected() {
        let schema = schema();
        for expr in ["//interface", "/ifaces:interfaces//name", "/nope:x", "count(/ifaces:x)"] {
            let req = Request::get("1").with_filter(Filter::XPath(expr.into()));
            assert!(
                matches!(compile(&req, &schema), Err(ReadError::Filter(_))),
                "{expr} should be rejected"
            );
        }
    }

    #[test]
    fn subtree_content_match_becomes_predicate() {
        let req = Request::get("1").with_filter(Filter::Subtree(vec![
            SubtreeNode::select("interfaces").with_child(
                SubtreeNode::select("interface")
                    .with_child(SubtreeNode::matching("name", "eth0"))
                    .with_child(SubtreeNode::select("mtu"))
                    .with_child(SubtreeNode::select("ipv4")),
            ),
        ]));
        let filters = compile(&req, &schema()).expect("compile");
        assert_eq!(
            rendered(&filters),
            vec![
                "/ifaces:interfaces/interface[name='eth0']/mtu",
                "/ifaces:interfaces/interface[name='eth0']/ipv4",
            ]
        );
    }

    #[test]
    fn subtree_all_content_match_selects_entry() {
        let req = Request::get("1").with_filter(Filter::Subtree(vec![
            SubtreeNode::select("interfaces").with_child(
                SubtreeNode::select("interface").with_child(SubtreeNode::matching("name", "eth0")),
            ),
            SubtreeNode::select("interfaces"),
            SubtreeNode::select("interfaces"),
        ]));
        let filters = compile(&req, &schema()).expect("compile");
        assert_eq!(
            rendered(&filters),
            vec![
                "/ifaces:interfaces/interface[name='eth0']",
                "/ifaces:interfaces",
            ]
        );
    }

    #[test]
    fn subtree_top_level_must_resolve() {
        let schema = schema();
        let unknown = Request::get("1").with_filter(Filter::Subtree(vec![SubtreeNode::select("nothing")]));
        assert!(matches!(compile(&unknown, &schema), Err(ReadError::Filter(_))));

        let explicit = Request::get("1").with_filter(Filter::Subtree(vec![
            SubtreeNode::select("netconf-state").in_module("ietf-netconf-monitoring"),
        ]));
        let filters = compile(&explicit, &schema).expect("compile");
        assert_eq!(rendered(&filters), vec!["/ietf-netconf-monitoring:netconf-state"]);
    }

    #[test]
    fn content_match_from_another_module_rejected() {
        let schema = schema();
        let foreign = Request::get("1").with_filter(Filter::Subtree(vec![
            SubtreeNode::select("interfaces").with_child(
                SubtreeNode::select("interface")
                    .with_child(SubtreeNode::matching("name", "eth0").in_module("vendor-ext")),
            ),
        ]));
        let err = compile(&foreign, &schema).expect_err("cross-module match");
        assert!(matches!(&err, ReadError::Filter(m) if m.contains("vendor-ext:name")));

        let same = Request::get("1").with_filter(Filter::Subtree(vec![
            SubtreeNode::select("interfaces").with_child(
                SubtreeNode::select("interface")
                    .with_child(SubtreeNode::matching("name", "eth0").in_module("ifaces")),
            ),
        ]));
        let filters = compile(&same, &schema).expect("same-module match");
        assert_eq!(rendered(&filters), vec!["/ifaces:interfaces/interface[name='eth0']"]);
    }
}
