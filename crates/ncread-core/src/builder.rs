//! # Store Subtree Builder
//!
//! Streams the store items covered by one path filter into the shared result
//! tree, propagating default flags after every change.

use crate::path::PathFilter;
use crate::propagate::propagate;
use crate::schema::Schema;
use crate::session::Session;
use crate::tree::DataTree;
use crate::types::{ReadError, StoreStage};
use tracing::{debug, warn};

/// Insert everything the store holds at or beneath `filter` into `tree`.
///
/// "No data" outcomes leave the tree unchanged. Any other store failure
/// aborts; a store item that does not fit the schema is a tree-build fault.
pub fn build_subtree(
    session: &Session,
    tree: &mut DataTree,
    schema: &Schema,
    filter: &PathFilter,
) -> Result<(), ReadError> {
    debug!(query = %filter.subtree_query(), "Fetching store items");

    let items = match session.get_items(filter) {
        Ok(items) => items,
        Err(fault) if fault.is_no_data() => {
            warn!(filter = %filter, reason = %fault, "No data for filter");
            return Ok(());
        }
        Err(fault) => return Err(ReadError::store(StoreStage::Iterate, fault)),
    };

    let mut inserted = 0usize;
    for item in items {
        let item = item.map_err(|fault| ReadError::store(StoreStage::Iterate, fault))?;
        let insertion = tree.insert_path(schema, &item.path, item.value.as_deref())?;
        if let Some(top) = insertion.touched {
            propagate(tree, top, item.default);
        }
        inserted += 1;
    }
    debug!(filter = %filter, items = inserted, "Store items merged");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Module, SchemaNode};
    use crate::store::StoredValue;
    use crate::types::{Datastore, TreeError};

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema.add_module(
            Module::new("a", "urn:a").with_node(
                SchemaNode::container("settings")
                    .with_child(SchemaNode::leaf("timeout").with_default("30")),
            ),
        );
        schema.add_module(
            Module::new("b", "urn:b").with_node(SchemaNode::container("empty")),
        );
        schema
    }

    fn session() -> Session {
        let mut session = Session::in_memory(1);
        session.install_module("a").expect("install");
        session
            .set_item(
                Datastore::Running,
                "/a:settings/timeout",
                StoredValue {
                    value: Some("30".into()),
                    default: true,
                    state: false,
                },
            )
            .expect("set");
        session
    }

    #[test]
    fn default_item_marks_container() {
        let schema = schema();
        let session = session();
        let mut tree = DataTree::new();
        build_subtree(&session, &mut tree, &schema, &PathFilter::module_wildcard("a"))
            .expect("build");

        let leaf = tree
            .find_path("/a:settings/timeout")
            .expect("parse")
            .expect("leaf");
        assert!(tree.node(leaf).is_default());
        assert!(tree.node(tree.roots()[0]).is_default());
    }

    #[test]
    fn no_data_leaves_tree_unchanged() {
        let schema = schema();
        let session = session();
        let mut tree = DataTree::new();
        build_subtree(&session, &mut tree, &schema, &PathFilter::module_wildcard("b"))
            .expect("unknown model tolerated");
        build_subtree(
            &session,
            &mut tree,
            &schema,
            &PathFilter::parse("/a:settings/missing").expect("parse"),
        )
        .expect("not found tolerated");
        assert!(tree.is_empty());
    }

    #[test]
    fn item_outside_schema_is_tree_fault() {
        let schema = Schema::new();
        let session = session();
        let mut tree = DataTree::new();
        let err = build_subtree(&session, &mut tree, &schema, &PathFilter::module_wildcard("a"))
            .expect_err("schema mismatch");
        assert!(matches!(err, ReadError::TreeBuild(TreeError::UnknownNode { .. })));
    }
}
