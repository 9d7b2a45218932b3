//! # Reply Assembly
//!
//! Validates the finished result tree and wraps it in the reply envelope.

use crate::primitives::OUTPUT_DATA;
use crate::rpc::{Envelope, Reply, Request};
use crate::schema::{Schema, ValidationMode};
use crate::tree::DataTree;
use crate::types::ReadError;
use crate::with_defaults::WithDefaultsMode;

/// Validate `tree`, attach it to a duplicate of `request` and validate the
/// envelope as a read reply.
///
/// Config-only requests are validated under `get-config` rules, so a state
/// node anywhere in the tree is a fault.
pub fn assemble(
    tree: DataTree,
    schema: &Schema,
    request: &Request,
    config_only: bool,
    with_defaults: WithDefaultsMode,
) -> Result<Reply, ReadError> {
    let mode = if config_only {
        ValidationMode::GetConfig
    } else {
        ValidationMode::Get
    };
    schema.validate(&tree, mode)?;

    let mut envelope = Envelope::duplicate(request);
    envelope.attach(OUTPUT_DATA, tree);
    envelope.validate_reply()?;

    Ok(Reply {
        envelope,
        with_defaults,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Module, SchemaNode};
    use crate::types::Datastore;

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema.add_module(
            Module::new("m", "urn:m").with_node(
                SchemaNode::container("top")
                    .with_child(SchemaNode::leaf("cfg"))
                    .with_child(SchemaNode::leaf("oper").state()),
            ),
        );
        schema
    }

    #[test]
    fn reply_duplicates_request() {
        let schema = schema();
        let mut tree = DataTree::new();
        tree.insert_path(&schema, "/m:top/cfg", Some("1")).expect("insert");

        let request = Request::get_config("42", Datastore::Startup);
        let reply = assemble(tree, &schema, &request, true, WithDefaultsMode::Trim)
            .expect("assemble");
        assert_eq!(reply.envelope.request(), &request);
        assert_eq!(reply.message_id(), "42");
        assert_eq!(reply.with_defaults, WithDefaultsMode::Trim);
        assert_eq!(reply.data().map(DataTree::len), Some(2));
    }

    #[test]
    fn state_in_config_reply_is_a_fault() {
        let schema = schema();
        let mut tree = DataTree::new();
        tree.insert_path(&schema, "/m:top/oper", Some("up")).expect("insert");

        let request = Request::get_config("1", Datastore::Running);
        let err = assemble(tree.clone(), &schema, &request, true, WithDefaultsMode::Explicit)
            .expect_err("state data");
        assert!(matches!(err, ReadError::Assembly(_)));

        let get = Request::get("2");
        assert!(assemble(tree, &schema, &get, false, WithDefaultsMode::Explicit).is_ok());
    }
}
