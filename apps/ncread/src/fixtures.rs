//! # File Inputs
//!
//! Loads everything the CLI reads from disk:
//!
//! - schema modules (JSON, merged over the built-in protocol modules)
//! - seed items for a datastore (JSON array)
//! - subtree filters and request batches (JSON)
//! - the server configuration (TOML, with an environment override)

use crate::error::AppError;
use ncread_core::{
    Datastore, Request, Schema, ServerConfig, Session, StoredValue, SubtreeNode, WithDefaultsMode,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, info};

/// Maximum size of any input file (64 MB).
const MAX_INPUT_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Environment variable overriding the configured with-defaults mode.
pub const WITH_DEFAULTS_ENV: &str = "NCREAD_WITH_DEFAULTS";

// =============================================================================
// FILE TYPES
// =============================================================================

/// One item of a seed file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedItem {
    pub path: String,
    #[serde(default)]
    pub value: Option<String>,
    /// The value is the schema default rather than explicitly set.
    #[serde(default)]
    pub default: bool,
    /// State (`config false`) data.
    #[serde(default)]
    pub state: bool,
}

impl SeedItem {
    fn stored(&self) -> StoredValue {
        StoredValue {
            value: self.value.clone(),
            default: self.default,
            state: self.state,
        }
    }
}

/// One entry of a batch file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchEntry {
    /// Session the request runs on; entries of one session run in order.
    pub session: u32,
    pub request: Request,
}

// =============================================================================
// LOADERS
// =============================================================================

fn read_file(path: &Path) -> Result<Vec<u8>, AppError> {
    let metadata = std::fs::metadata(path).map_err(|e| AppError::io(path, &e))?;
    if !metadata.is_file() {
        return Err(AppError::Usage(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    if metadata.len() > MAX_INPUT_FILE_SIZE {
        return Err(AppError::Usage(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_INPUT_FILE_SIZE
        )));
    }
    std::fs::read(path).map_err(|e| AppError::io(path, &e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let bytes = read_file(path)?;
    serde_json::from_slice(&bytes).map_err(|e| AppError::json(path, &e))
}

/// The built-in protocol modules, plus the modules in `path` if given.
pub fn load_schema(path: Option<&Path>) -> Result<Schema, AppError> {
    let mut schema = Schema::with_builtin_modules();
    if let Some(path) = path {
        let extra: Schema = read_json(path)?;
        debug!(modules = extra.modules().len(), file = %path.display(), "Schema modules loaded");
        schema.extend(extra);
    }
    Ok(schema)
}

pub fn load_seed(path: &Path) -> Result<Vec<SeedItem>, AppError> {
    read_json(path)
}

pub fn load_subtree(path: &Path) -> Result<Vec<SubtreeNode>, AppError> {
    read_json(path)
}

pub fn load_batch(path: &Path) -> Result<Vec<BatchEntry>, AppError> {
    read_json(path)
}

/// Load the server configuration, then apply the environment override.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, AppError> {
    let config = match path {
        Some(path) => {
            let bytes = read_file(path)?;
            let text = String::from_utf8(bytes)
                .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
            parse_config(&text)?
        }
        None => ServerConfig::default(),
    };
    apply_env_override(config, std::env::var(WITH_DEFAULTS_ENV).ok().as_deref())
}

/// Parse a TOML configuration document.
pub fn parse_config(text: &str) -> Result<ServerConfig, AppError> {
    toml::from_str(text).map_err(|e| AppError::Config(e.to_string()))
}

/// Replace the with-defaults mode with the environment value, if set.
pub fn apply_env_override(
    config: ServerConfig,
    value: Option<&str>,
) -> Result<ServerConfig, AppError> {
    match value {
        None => Ok(config),
        Some(name) => {
            let mode = WithDefaultsMode::from_name(name).ok_or_else(|| {
                AppError::Config(format!("{}: unknown with-defaults mode '{}'", WITH_DEFAULTS_ENV, name))
            })?;
            Ok(config.with_defaults(mode))
        }
    }
}

/// Write seed items into one datastore of a session.
pub fn apply_seed(
    session: &mut Session,
    datastore: Datastore,
    items: &[SeedItem],
) -> Result<usize, AppError> {
    for item in items {
        session.set_item(datastore, &item.path, item.stored())?;
    }
    info!(items = items.len(), datastore = %datastore, "Seed applied");
    Ok(items.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn toml_config_fills_defaults() {
        let config = parse_config("with_defaults = \"trim\"\n").expect("parse");
        assert_eq!(config.with_defaults, WithDefaultsMode::Trim);
        assert_eq!(config.workers, ServerConfig::default().workers);
    }

    #[test]
    fn unknown_config_key_rejected() {
        assert!(matches!(parse_config("threads = 3\n"), Err(AppError::Config(_))));
    }

    #[test]
    fn env_override_wins() {
        let config = ServerConfig::default().with_defaults(WithDefaultsMode::Trim);
        let config = apply_env_override(config, Some("report-all")).expect("override");
        assert_eq!(config.with_defaults, WithDefaultsMode::ReportAll);
        assert!(apply_env_override(ServerConfig::default(), Some("loud")).is_err());
    }

    #[test]
    fn schema_file_extends_builtins() {
        let mut file = tempfile::NamedTempFile::new().expect("temp");
        write!(
            file,
            r#"{{"modules": [{{"name": "dev", "namespace": "urn:dev", "nodes": [
                {{"name": "system", "kind": "container", "children": [
                    {{"name": "hostname", "kind": "leaf"}}
                ]}}
            ]}}]}}"#
        )
        .expect("write");

        let schema = load_schema(Some(file.path())).expect("load");
        assert!(schema.module("dev").is_some());
        assert!(schema.module("ietf-yang-library").is_some());
    }

    #[test]
    fn seed_items_reach_the_store() {
        let mut file = tempfile::NamedTempFile::new().expect("temp");
        write!(
            file,
            r#"[{{"path": "/dev:system/hostname", "value": "r1"}},
                {{"path": "/dev:system/domain", "value": "local", "default": true}}]"#
        )
        .expect("write");

        let items = load_seed(file.path()).expect("load");
        assert!(items[1].default);

        let mut session = Session::in_memory(1);
        session.install_module("dev").expect("install");
        let count = apply_seed(&mut session, Datastore::Running, &items).expect("apply");
        assert_eq!(count, 2);
    }
}
