//! # With-Defaults Resolution
//!
//! Picks the default-value reporting mode of a reply (RFC 6243).
//!
//! The mode only affects rendering; the assembled tree is the same in every
//! mode.

use crate::types::ReadError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How default values are reported in a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WithDefaultsMode {
    /// Every value, default or not.
    ReportAll,
    /// Every value, defaults tagged with `default="true"`.
    ReportAllTagged,
    /// Values equal to the schema default are omitted.
    Trim,
    /// Only values that were explicitly set.
    #[default]
    Explicit,
}

impl WithDefaultsMode {
    pub const ALL: [WithDefaultsMode; 4] = [
        Self::ReportAll,
        Self::ReportAllTagged,
        Self::Trim,
        Self::Explicit,
    ];

    /// Parameter value of the mode.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ReportAll => "report-all",
            Self::ReportAllTagged => "report-all-tagged",
            Self::Trim => "trim",
            Self::Explicit => "explicit",
        }
    }

    /// Parse a parameter value.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

impl fmt::Display for WithDefaultsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve the mode for one request.
///
/// The request value was schema-validated upstream; an unknown value is an
/// internal fault, not a client error.
pub fn resolve(
    requested: Option<&str>,
    server_default: WithDefaultsMode,
) -> Result<WithDefaultsMode, ReadError> {
    match requested {
        None => Ok(server_default),
        Some(value) => WithDefaultsMode::from_name(value).ok_or_else(|| {
            ReadError::Internal(format!("unexpected with-defaults value '{}'", value))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_uses_server_default() {
        assert_eq!(
            resolve(None, WithDefaultsMode::ReportAll).expect("resolve"),
            WithDefaultsMode::ReportAll
        );
    }

    #[test]
    fn request_overrides_server_default() {
        for mode in WithDefaultsMode::ALL {
            assert_eq!(
                resolve(Some(mode.name()), WithDefaultsMode::Explicit).expect("resolve"),
                mode
            );
        }
    }

    #[test]
    fn unknown_value_is_internal() {
        let err = resolve(Some("everything"), WithDefaultsMode::Explicit).expect_err("invalid");
        assert!(err.is_internal());
    }
}
