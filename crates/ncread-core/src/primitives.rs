//! # Protocol Primitives
//!
//! Fixed names and limits used by the read path.
//!
//! These values are compiled in and immutable at runtime.

/// Module that defines the `get` / `get-config` RPCs.
pub const NETCONF_MODULE: &str = "ietf-netconf";

/// Module that defines the `with-defaults` RPC parameter.
pub const WITH_DEFAULTS_MODULE: &str = "ietf-netconf-with-defaults";

/// Schema inventory module (served locally).
pub const YANG_LIBRARY_MODULE: &str = "ietf-yang-library";

/// Monitoring module (served locally).
pub const MONITORING_MODULE: &str = "ietf-netconf-monitoring";

/// Notification capability module (served locally).
pub const NOTIFICATIONS_MODULE: &str = "nc-notifications";

/// Name of the output payload attached to read replies.
pub const OUTPUT_DATA: &str = "data";

/// Message used for internal faults surfaced to the client.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal error";

/// Language tag attached to error messages.
pub const ERROR_MESSAGE_LANG: &str = "en";

/// Maximum number of segments in a path filter or instance path.
///
/// Schema nesting is bounded; anything deeper is rejected while parsing.
pub const MAX_PATH_DEPTH: usize = 64;

/// Maximum number of path filters a single request may compile to.
pub const MAX_FILTER_COUNT: usize = 4096;

/// Base capabilities advertised in the monitoring data.
pub const BASE_CAPABILITIES: &[&str] = &[
    "urn:ietf:params:netconf:base:1.0",
    "urn:ietf:params:netconf:base:1.1",
    "urn:ietf:params:netconf:capability:candidate:1.0",
    "urn:ietf:params:netconf:capability:startup:1.0",
    "urn:ietf:params:netconf:capability:xpath:1.0",
];

/// Capability URI for with-defaults, completed with the basic mode.
pub const WITH_DEFAULTS_CAPABILITY: &str =
    "urn:ietf:params:netconf:capability:with-defaults:1.0";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_modules_are_distinct() {
        assert_ne!(YANG_LIBRARY_MODULE, MONITORING_MODULE);
        assert_ne!(MONITORING_MODULE, NOTIFICATIONS_MODULE);
    }
}
