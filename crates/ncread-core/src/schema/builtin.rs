//! Protocol modules every server implements.
//!
//! Only the statements the read path touches are modelled: the RPCs of the
//! base protocol and the three locally served state trees.

use super::{Module, SchemaNode};
use crate::primitives::{
    MONITORING_MODULE, NETCONF_MODULE, NOTIFICATIONS_MODULE, WITH_DEFAULTS_MODULE,
    YANG_LIBRARY_MODULE,
};

/// All built-in modules, in load order.
#[must_use]
pub fn modules() -> Vec<Module> {
    vec![
        netconf(),
        with_defaults(),
        yang_library(),
        monitoring(),
        nc_notifications(),
        notifications(),
    ]
}

fn leaves(names: &[&str]) -> Vec<SchemaNode> {
    names.iter().map(|n| SchemaNode::leaf(*n)).collect()
}

fn netconf() -> Module {
    Module::new(NETCONF_MODULE, "urn:ietf:params:xml:ns:netconf:base:1.0")
        .with_revision("2011-06-01")
        .with_node(SchemaNode::rpc("get-config"))
        .with_node(SchemaNode::rpc("edit-config"))
        .with_node(SchemaNode::rpc("copy-config"))
        .with_node(SchemaNode::rpc("delete-config"))
        .with_node(SchemaNode::rpc("lock"))
        .with_node(SchemaNode::rpc("unlock"))
        .with_node(SchemaNode::rpc("get"))
        .with_node(SchemaNode::rpc("close-session"))
        .with_node(SchemaNode::rpc("kill-session"))
}

fn with_defaults() -> Module {
    Module::new(
        WITH_DEFAULTS_MODULE,
        "urn:ietf:params:xml:ns:yang:ietf-netconf-with-defaults",
    )
    .with_revision("2011-06-01")
    .with_node(SchemaNode::grouping("with-defaults-parameters"))
}

fn yang_library() -> Module {
    Module::new(
        YANG_LIBRARY_MODULE,
        "urn:ietf:params:xml:ns:yang:ietf-yang-library",
    )
    .with_revision("2016-06-21")
    .with_node(
        SchemaNode::container("modules-state")
            .state()
            .with_child(SchemaNode::leaf("module-set-id"))
            .with_child(
                SchemaNode::list("module", &["name", "revision"])
                    .with_children(leaves(&["name", "revision", "namespace", "conformance-type"]))
                    .with_child(SchemaNode::leaf_list("feature")),
            ),
    )
}

fn monitoring() -> Module {
    Module::new(
        MONITORING_MODULE,
        "urn:ietf:params:xml:ns:yang:ietf-netconf-monitoring",
    )
    .with_revision("2010-10-04")
    .with_node(
        SchemaNode::container("netconf-state")
            .state()
            .with_child(
                SchemaNode::container("capabilities")
                    .with_child(SchemaNode::leaf_list("capability")),
            )
            .with_child(
                SchemaNode::container("datastores")
                    .with_child(SchemaNode::list("datastore", &["name"]).with_child(SchemaNode::leaf("name"))),
            )
            .with_child(
                SchemaNode::container("schemas").with_child(
                    SchemaNode::list("schema", &["identifier", "version", "format"])
                        .with_children(leaves(&["identifier", "version", "format", "namespace"]))
                        .with_child(SchemaNode::leaf_list("location")),
                ),
            )
            .with_child(
                SchemaNode::container("sessions").with_child(
                    SchemaNode::list("session", &["session-id"]).with_children(leaves(&[
                        "session-id",
                        "transport",
                        "username",
                        "source-host",
                        "login-time",
                        "in-rpcs",
                        "in-bad-rpcs",
                        "out-rpc-errors",
                        "out-notifications",
                    ])),
                ),
            )
            .with_child(SchemaNode::container("statistics").with_children(leaves(&[
                "netconf-start-time",
                "in-bad-hellos",
                "in-sessions",
                "dropped-sessions",
                "in-rpcs",
                "in-bad-rpcs",
                "out-rpc-errors",
                "out-notifications",
            ]))),
    )
    .with_node(SchemaNode::rpc("get-schema"))
}

fn nc_notifications() -> Module {
    Module::new(NOTIFICATIONS_MODULE, "urn:ietf:params:xml:ns:netmod:notification")
        .with_revision("2008-07-14")
        .with_node(
            SchemaNode::container("netconf").state().with_child(
                SchemaNode::container("streams").with_child(
                    SchemaNode::list("stream", &["name"]).with_children(leaves(&[
                        "name",
                        "description",
                        "replaySupport",
                        "replayLogCreationTime",
                    ])),
                ),
            ),
        )
        .with_node(SchemaNode::notification("replayComplete"))
        .with_node(SchemaNode::notification("notificationComplete"))
}

fn notifications() -> Module {
    Module::new("notifications", "urn:ietf:params:xml:ns:netconf:notification:1.0")
        .with_revision("2008-07-14")
        .with_node(SchemaNode::rpc("create-subscription"))
        .with_node(SchemaNode::notification("notification"))
}
