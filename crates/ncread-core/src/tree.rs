//! # Result Data Tree
//!
//! The arena-allocated data tree assembled by a read operation.
//!
//! Nodes live in a `Vec` and refer to each other by `NodeId` index, with an
//! explicit parent link on every node. Nodes are never removed, so ids stay
//! valid while the tree is being built and default flags can be propagated
//! with plain loops over parent/child indices.
//!
//! ## Update-Mode Insertion
//!
//! [`DataTree::insert`] creates every missing node on an instance path and
//! reuses every existing one: containers and leaves by name, keyed list
//! entries by their key values, leaf-list entries by value and keyless list
//! entries by position. Inserting the same path twice never duplicates a node.

use crate::path::{PathFilter, Predicate, Segment, parse_segments, render_segments};
use crate::schema::{Schema, SchemaNode};
use crate::types::{NodeId, NodeKind, PathError, TreeError};

// =============================================================================
// DATA NODE
// =============================================================================

/// One node of a data tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataNode {
    module: String,
    name: String,
    kind: NodeKind,
    value: Option<String>,
    default: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Number of leading children that are list keys (keyed list entries only).
    key_count: usize,
}

impl DataNode {
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Whether the node is flagged as a schema default.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.default
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Key leaves of a keyed list entry (the leading children).
    #[must_use]
    pub fn key_children(&self) -> &[NodeId] {
        &self.children[..self.key_count.min(self.children.len())]
    }
}

/// Outcome of one update-mode insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insertion {
    /// The node addressed by the inserted path.
    pub target: NodeId,
    /// Top-most node that was created or whose value changed, if any.
    pub touched: Option<NodeId>,
    /// Whether `target` itself was created by this insertion.
    pub created: bool,
}

// =============================================================================
// DATA TREE
// =============================================================================

/// An arena-backed forest of data nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTree {
    nodes: Vec<DataNode>,
    roots: Vec<NodeId>,
}

impl DataTree {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Top-level nodes in insertion order.
    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Access a node.
    ///
    /// Ids are only issued by this tree, so an out-of-range id is a caller bug.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &DataNode {
        &self.nodes[id.index()]
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node ids in arena order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Ids of `root` and all of its descendants, in pre-order.
    #[must_use]
    pub fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        out
    }

    pub(crate) fn set_default(&mut self, id: NodeId, default: bool) {
        self.nodes[id.index()].default = default;
    }

    // =========================================================================
    // INSTANCE PATHS
    // =========================================================================

    /// Instance path of a node, root first.
    #[must_use]
    pub fn instance_segments(&self, id: NodeId) -> Vec<Segment> {
        let mut chain = vec![id];
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.node(parent).parent;
        }
        chain.iter().rev().map(|&n| self.segment_of(n)).collect()
    }

    /// Rendered instance path of a node.
    #[must_use]
    pub fn path_string(&self, id: NodeId) -> String {
        render_segments(&self.instance_segments(id))
    }

    fn segment_of(&self, id: NodeId) -> Segment {
        let node = self.node(id);
        let mut seg = Segment::new(node.module.clone(), node.name.clone());
        match node.kind {
            NodeKind::KeyedList => {
                for &key in node.key_children() {
                    let key_node = self.node(key);
                    seg = seg.with_key(key_node.name.clone(), key_node.value.clone().unwrap_or_default());
                }
            }
            NodeKind::LeafList => {
                seg = seg.with_value(node.value.clone().unwrap_or_default());
            }
            NodeKind::KeylessList => {
                let position = self
                    .siblings(node.parent)
                    .iter()
                    .filter(|&&s| self.node(s).same_identity(node))
                    .position(|&s| s == id)
                    .map_or(1, |p| p + 1);
                seg = seg.with_position(position);
            }
            _ => {}
        }
        seg
    }

    fn siblings(&self, parent: Option<NodeId>) -> &[NodeId] {
        match parent {
            Some(p) => &self.node(p).children,
            None => &self.roots,
        }
    }

    /// Find the node at an exact instance path.
    #[must_use]
    pub fn find(&self, segments: &[Segment]) -> Option<NodeId> {
        let mut parent: Option<NodeId> = None;
        for seg in segments {
            let id = self
                .siblings(parent)
                .iter()
                .copied()
                .filter(|&c| {
                    let node = self.node(c);
                    node.module == seg.module && node.name == seg.name
                })
                .enumerate()
                .find(|&(index, c)| self.instance_matches(c, index, seg))
                .map(|(_, c)| c)?;
            parent = Some(id);
        }
        parent
    }

    /// Find the node at an exact instance path given as a string.
    pub fn find_path(&self, path: &str) -> Result<Option<NodeId>, PathError> {
        Ok(self.find(&parse_segments(path)?))
    }

    fn instance_matches(&self, id: NodeId, index: usize, seg: &Segment) -> bool {
        seg.predicates.iter().all(|pred| match pred {
            Predicate::Equals { name, value } => self.child_value(id, name).as_deref() == Some(value.as_str()),
            Predicate::Value(value) => self.node(id).value.as_deref() == Some(value.as_str()),
            Predicate::Position(pos) => index + 1 == *pos,
        })
    }

    /// Value of the child leaf `name` of `id`.
    #[must_use]
    pub fn child_value(&self, id: NodeId, name: &str) -> Option<String> {
        self.node(id)
            .children
            .iter()
            .map(|&c| self.node(c))
            .find(|c| c.name == name && c.kind == NodeKind::Leaf)
            .and_then(|c| c.value.clone())
    }

    // =========================================================================
    // SELECTION
    // =========================================================================

    /// Nodes selected by a path filter, in document order.
    #[must_use]
    pub fn select(&self, filter: &PathFilter) -> Vec<NodeId> {
        let mut candidates: Vec<NodeId> = self.roots.clone();
        let mut selected: Vec<NodeId> = Vec::new();

        for (depth, seg) in filter.segments().iter().enumerate() {
            selected = candidates
                .iter()
                .copied()
                .filter(|&id| {
                    let instance = self.segment_of(id);
                    seg.selects(&instance, |name| {
                        if name == "." {
                            self.node(id).value.clone()
                        } else {
                            self.child_value(id, name)
                        }
                    })
                })
                .collect();
            if depth + 1 < filter.depth() {
                candidates = selected
                    .iter()
                    .flat_map(|&id| self.node(id).children.iter().copied())
                    .collect();
            }
        }
        selected
    }

    // =========================================================================
    // INSERTION
    // =========================================================================

    /// Insert an instance path given as a string.
    pub fn insert_path(
        &mut self,
        schema: &Schema,
        path: &str,
        value: Option<&str>,
    ) -> Result<Insertion, TreeError> {
        let segments = parse_segments(path)?;
        self.insert(schema, &segments, value)
    }

    /// Insert or update the node at an instance path (update mode).
    ///
    /// Missing ancestors are created; existing nodes are reused. `value` is
    /// required for leaves and anyxml, optional for leaf-list entries that
    /// carry a `[.='v']` predicate, and rejected for interior nodes.
    pub fn insert(
        &mut self,
        schema: &Schema,
        segments: &[Segment],
        value: Option<&str>,
    ) -> Result<Insertion, TreeError> {
        let path = render_segments(segments);
        if segments.is_empty() {
            return Err(PathError::new("", 0, "empty path").into());
        }

        let mut parent: Option<NodeId> = None;
        let mut parent_schema: Option<&SchemaNode> = None;
        let mut touched: Option<NodeId> = None;
        let mut created = false;
        let last = segments.len() - 1;

        for (i, seg) in segments.iter().enumerate() {
            if seg.is_wildcard() {
                return Err(TreeError::Wildcard(path));
            }
            let unknown = || TreeError::UnknownNode {
                path: path.clone(),
                name: seg.name.clone(),
            };
            let snode = match (parent, parent_schema) {
                (Some(p), Some(ps)) if self.node(p).module == seg.module => ps.child(&seg.name),
                (None, _) => schema
                    .module(&seg.module)
                    .and_then(|m| m.top_level(&seg.name)),
                _ => None,
            }
            .ok_or_else(unknown)?;
            let kind = snode.data_kind().ok_or_else(unknown)?;
            let is_last = i == last;

            let node_value: Option<String> = match kind {
                NodeKind::LeafList => {
                    let v = seg
                        .value_predicate()
                        .or(if is_last { value } else { None })
                        .ok_or_else(|| TreeError::MissingValue(path.clone()))?;
                    Some(v.to_string())
                }
                NodeKind::Leaf | NodeKind::AnyXml if is_last => Some(
                    value
                        .ok_or_else(|| TreeError::MissingValue(path.clone()))?
                        .to_string(),
                ),
                NodeKind::Leaf | NodeKind::AnyXml => return Err(unknown()),
                _ if is_last && value.is_some() => {
                    return Err(TreeError::UnexpectedValue(path));
                }
                _ => None,
            };

            let id = match self.find_child(parent, seg, snode, kind, node_value.as_deref(), &path)? {
                Some(existing) => {
                    if is_last
                        && matches!(kind, NodeKind::Leaf | NodeKind::AnyXml)
                        && self.node(existing).value != node_value
                    {
                        let node = &mut self.nodes[existing.index()];
                        node.value = node_value;
                        node.default = false;
                        touched.get_or_insert(existing);
                    }
                    existing
                }
                None => {
                    let id = self.push_node(parent, seg, kind, node_value);
                    if kind == NodeKind::KeyedList {
                        self.create_keys(id, seg, snode, &path)?;
                    }
                    touched.get_or_insert(id);
                    created = is_last;
                    id
                }
            };

            parent = Some(id);
            parent_schema = Some(snode);
        }

        let target = parent.ok_or_else(|| PathError::new(&path, 0, "empty path"))?;
        Ok(Insertion {
            target,
            touched,
            created,
        })
    }

    fn find_child(
        &self,
        parent: Option<NodeId>,
        seg: &Segment,
        snode: &SchemaNode,
        kind: NodeKind,
        value: Option<&str>,
        path: &str,
    ) -> Result<Option<NodeId>, TreeError> {
        let same: Vec<NodeId> = self
            .siblings(parent)
            .iter()
            .copied()
            .filter(|&c| {
                let node = self.node(c);
                node.module == seg.module && node.name == seg.name
            })
            .collect();

        Ok(match kind {
            NodeKind::Container | NodeKind::PresenceContainer | NodeKind::Leaf | NodeKind::AnyXml => {
                same.first().copied()
            }
            NodeKind::LeafList => same
                .into_iter()
                .find(|&c| self.node(c).value.as_deref() == value),
            NodeKind::KeyedList => {
                let mut keys = Vec::with_capacity(snode.keys.len());
                for key in &snode.keys {
                    let v = seg.key(key).ok_or_else(|| TreeError::MissingKey {
                        path: path.to_string(),
                        list: seg.name.clone(),
                        key: key.clone(),
                    })?;
                    keys.push((key.as_str(), v));
                }
                same.into_iter().find(|&c| {
                    keys.iter()
                        .all(|(k, v)| self.child_value(c, k).as_deref() == Some(*v))
                })
            }
            NodeKind::KeylessList => {
                let invalid = || TreeError::InvalidPosition {
                    path: path.to_string(),
                    list: seg.name.clone(),
                };
                let pos = seg.position().ok_or_else(invalid)?;
                if pos == 0 {
                    return Err(invalid());
                } else if pos <= same.len() {
                    Some(same[pos - 1])
                } else if pos == same.len() + 1 {
                    None
                } else {
                    return Err(invalid());
                }
            }
        })
    }

    fn push_node(
        &mut self,
        parent: Option<NodeId>,
        seg: &Segment,
        kind: NodeKind,
        value: Option<String>,
    ) -> NodeId {
        self.push_raw(parent, seg.module.clone(), seg.name.clone(), kind, value)
    }

    fn push_raw(
        &mut self,
        parent: Option<NodeId>,
        module: String,
        name: String,
        kind: NodeKind,
        value: Option<String>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(DataNode {
            module,
            name,
            kind,
            value,
            default: false,
            parent,
            children: Vec::new(),
            key_count: 0,
        });
        match parent {
            Some(p) => self.nodes[p.index()].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    fn create_keys(
        &mut self,
        entry: NodeId,
        seg: &Segment,
        snode: &SchemaNode,
        path: &str,
    ) -> Result<(), TreeError> {
        for key in &snode.keys {
            let value = seg.key(key).ok_or_else(|| TreeError::MissingKey {
                path: path.to_string(),
                list: seg.name.clone(),
                key: key.clone(),
            })?;
            self.push_raw(
                Some(entry),
                seg.module.clone(),
                key.clone(),
                NodeKind::Leaf,
                Some(value.to_string()),
            );
        }
        self.nodes[entry.index()].key_count = snode.keys.len();
        Ok(())
    }

    // =========================================================================
    // MERGING
    // =========================================================================

    /// Copy `src_root` (with its ancestors and descendants) from another tree.
    ///
    /// Uses update-mode insertion, so shared ancestors are not duplicated.
    /// Nodes created by the copy keep the source node's default flag.
    pub fn merge_subtree(
        &mut self,
        schema: &Schema,
        src: &DataTree,
        src_root: NodeId,
    ) -> Result<(), TreeError> {
        let mut ancestors = Vec::new();
        let mut current = src.node(src_root).parent;
        while let Some(p) = current {
            ancestors.push(p);
            current = src.node(p).parent;
        }

        for id in ancestors.into_iter().rev().chain(src.subtree(src_root)) {
            let node = src.node(id);
            let segments = src.instance_segments(id);
            let value = match node.kind {
                NodeKind::Leaf | NodeKind::AnyXml => node.value.as_deref(),
                _ => None,
            };
            let inserted = self.insert(schema, &segments, value)?;
            if inserted.created {
                self.set_default(inserted.target, node.default);
            }
        }
        Ok(())
    }
}

impl DataNode {
    fn same_identity(&self, other: &DataNode) -> bool {
        self.module == other.module && self.name == other.name
    }
}

// =============================================================================
// TESTS
// =============================================================================
