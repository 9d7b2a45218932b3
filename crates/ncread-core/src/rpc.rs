//! # RPC Envelopes
//!
//! Inbound read requests, data replies and error replies.
//!
//! A data reply is a duplicate of the inbound request with the result tree
//! attached as its single `data` output.

use crate::filter::Filter;
use crate::primitives::{ERROR_MESSAGE_LANG, OUTPUT_DATA};
use crate::tree::DataTree;
use crate::types::{Datastore, Operation, ReadError, StoreFault};
use crate::with_defaults::WithDefaultsMode;
use serde::{Deserialize, Serialize};

// =============================================================================
// REQUEST
// =============================================================================

/// A `get` or `get-config` request as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub message_id: String,
    pub operation: Operation,
    /// Source datastore (`get-config` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Datastore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    /// Raw `with-defaults` parameter, as validated upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_defaults: Option<String>,
}

impl Request {
    /// A `<get>` request.
    #[must_use]
    pub fn get(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            operation: Operation::Get,
            source: None,
            filter: None,
            with_defaults: None,
        }
    }

    /// A `<get-config>` request on `source`.
    #[must_use]
    pub fn get_config(message_id: impl Into<String>, source: Datastore) -> Self {
        Self {
            operation: Operation::GetConfig,
            source: Some(source),
            ..Self::get(message_id)
        }
    }

    /// Builder: attach a filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Builder: attach a with-defaults parameter.
    #[must_use]
    pub fn with_defaults(mut self, mode: impl Into<String>) -> Self {
        self.with_defaults = Some(mode.into());
        self
    }

    /// Datastore and config-only flag this request reads from.
    ///
    /// A `get-config` without a source never passes upstream validation, so
    /// its absence is an internal fault.
    pub fn selection(&self) -> Result<(Datastore, bool), ReadError> {
        match self.operation {
            Operation::Get => Ok((Datastore::Running, false)),
            Operation::GetConfig => self
                .source
                .map(|ds| (ds, true))
                .ok_or_else(|| ReadError::Internal("get-config without a source datastore".into())),
        }
    }
}

// =============================================================================
// DATA REPLY
// =============================================================================

/// A named payload attached to an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub name: String,
    pub tree: DataTree,
}

/// A duplicated request carrying reply outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    request: Request,
    outputs: Vec<Output>,
}

impl Envelope {
    /// Duplicate a request into a reply envelope without outputs.
    #[must_use]
    pub fn duplicate(request: &Request) -> Self {
        Self {
            request: request.clone(),
            outputs: Vec::new(),
        }
    }

    /// Attach a named output payload.
    pub fn attach(&mut self, name: impl Into<String>, tree: DataTree) {
        self.outputs.push(Output {
            name: name.into(),
            tree,
        });
    }

    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    #[must_use]
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Validate the envelope as a read reply.
    ///
    /// A read reply carries exactly one `data` output, and a `get-config`
    /// reply keeps its source.
    pub fn validate_reply(&self) -> Result<(), ReadError> {
        match self.outputs.as_slice() {
            [only] if only.name == OUTPUT_DATA => {}
            [only] => {
                return Err(ReadError::Assembly(format!(
                    "reply output must be '{}', found '{}'",
                    OUTPUT_DATA, only.name
                )));
            }
            outputs => {
                return Err(ReadError::Assembly(format!(
                    "reply must carry exactly one output, found {}",
                    outputs.len()
                )));
            }
        }
        if self.request.operation.is_config_only() && self.request.source.is_none() {
            return Err(ReadError::Assembly(
                "get-config reply without a source datastore".into(),
            ));
        }
        Ok(())
    }
}

/// A successful read reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub envelope: Envelope,
    /// Resolved default-reporting mode for rendering.
    pub with_defaults: WithDefaultsMode,
}

impl Reply {
    /// The attached result tree.
    #[must_use]
    pub fn data(&self) -> Option<&DataTree> {
        self.envelope
            .outputs()
            .iter()
            .find(|o| o.name == OUTPUT_DATA)
            .map(|o| &o.tree)
    }

    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.envelope.request().message_id
    }
}

// =============================================================================
// ERROR REPLY
// =============================================================================

/// An `<rpc-error>` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ErrorReply {
    pub message_id: String,
    pub error_type: String,
    pub error_tag: String,
    pub error_severity: String,
    pub error_message: String,
    pub error_message_lang: String,
}

impl ErrorReply {
    /// An application-level `operation-failed` error.
    #[must_use]
    pub fn operation_failed(message_id: &str, message: impl Into<String>) -> Self {
        Self {
            message_id: message_id.to_string(),
            error_type: "application".into(),
            error_tag: "operation-failed".into(),
            error_severity: "error".into(),
            error_message: message.into(),
            error_message_lang: ERROR_MESSAGE_LANG.into(),
        }
    }

    /// An error reply carrying the store's own error text.
    #[must_use]
    pub fn from_store(message_id: &str, fault: &StoreFault) -> Self {
        Self::operation_failed(message_id, fault.to_string())
    }
}

/// What the transport sends back for a read request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerReply {
    Data(Reply),
    Error(ErrorReply),
}

impl ServerReply {
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The data reply, if the request succeeded.
    #[must_use]
    pub fn data(&self) -> Option<&Reply> {
        match self {
            Self::Data(reply) => Some(reply),
            Self::Error(_) => None,
        }
    }

    /// The error reply, if the request failed.
    #[must_use]
    pub fn error(&self) -> Option<&ErrorReply> {
        match self {
            Self::Data(_) => None,
            Self::Error(err) => Some(err),
        }
    }
}
