//! # Default-Flag Propagation
//!
//! Keeps the default flags of a data tree consistent after each store item.
//!
//! A node is default only if every value beneath it, up to the next presence
//! container or keyed list entry, is a store-reported default. Both walks are
//! plain loops over arena indices.

use crate::tree::DataTree;
use crate::types::NodeId;

/// Update default flags after `node` was created or changed.
///
/// `node` is the top-most node touched by the insertion and `is_default` is
/// the flag the store reported for the inserted item.
///
/// - default: descend along the most recently inserted children to the
///   value-carrying node, then mark nodes upward until `node`, never marking
///   a presence container or keyed list entry
/// - explicit: clear the ancestors of `node` up to the first one that is
///   already explicit
pub fn propagate(tree: &mut DataTree, node: NodeId, is_default: bool) {
    if is_default && mark_chain(tree, node) {
        return;
    }
    clear_ancestors(tree, node);
}

/// Mark the chain below `node` as default. Returns whether `node` was reached.
fn mark_chain(tree: &mut DataTree, node: NodeId) -> bool {
    let mut deepest = node;
    while !tree.node(deepest).kind().is_terminal() {
        match tree.node(deepest).children().last() {
            Some(&child) => deepest = child,
            None => break,
        }
    }

    let mut current = deepest;
    loop {
        let (kind, parent) = {
            let n = tree.node(current);
            (n.kind(), n.parent())
        };
        if kind.is_boundary() {
            return false;
        }
        tree.set_default(current, true);
        if current == node {
            return true;
        }
        match parent {
            Some(p) => current = p,
            None => return false,
        }
    }
}

/// Clear default flags from the parent of `node` upward.
fn clear_ancestors(tree: &mut DataTree, node: NodeId) {
    let mut current = tree.node(node).parent();
    while let Some(id) = current {
        if !tree.node(id).is_default() {
            break;
        }
        tree.set_default(id, false);
        current = tree.node(id).parent();
    }
}
