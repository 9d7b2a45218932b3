//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::{Cli, ReadArgs};
use crate::error::AppError;
use crate::fixtures;
use crate::pool::{SharedSession, WorkerPool, shared};
use crate::render::render_reply;
use ncread_core::{
    Datastore, Filter, LocalDomain, MemoryStore, RedbStore, Request, Schema, Server, ServerConfig,
    Session, StorageBackend, compile,
};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

// =============================================================================
// CONTEXT
// =============================================================================

/// Everything a command needs, resolved from flags and files.
#[derive(Debug)]
pub struct Context {
    pub schema: Schema,
    pub config: ServerConfig,
    pub json_mode: bool,
}

impl Context {
    /// Resolve schema and configuration; `--database` overrides the config file.
    pub fn load(cli: &Cli) -> Result<Self, AppError> {
        let schema = fixtures::load_schema(cli.schema.as_deref())?;
        let mut config = fixtures::load_config(cli.config.as_deref())?;
        if let Some(database) = &cli.database {
            config.database = Some(database.clone());
        }
        if cli.verbose {
            info!(
                modules = schema.modules().len(),
                with_defaults = %config.with_defaults,
                workers = config.effective_workers(),
                "Configuration loaded"
            );
        }
        Ok(Self {
            schema,
            config,
            json_mode: cli.json_mode,
        })
    }

    fn server(&self) -> Server {
        Server::new(self.schema.clone(), self.config.clone())
    }

    /// Open the configured store and install every store-served module.
    fn open_store(&self) -> Result<StoreRoot, AppError> {
        let root = match &self.config.database {
            Some(path) => StoreRoot::Persistent(RedbStore::open(path)?),
            None => StoreRoot::InMemory(MemoryStore::new()),
        };
        let mut session = Session::new(0, root.backend());
        for module in store_modules(&self.schema) {
            session.install_module(module)?;
        }
        Ok(root)
    }

    fn emit(&self, value: &Value) {
        let text = if self.json_mode {
            serde_json::to_string(value).unwrap_or_default()
        } else {
            serde_json::to_string_pretty(value).unwrap_or_default()
        };
        println!("{}", text);
    }
}

/// The shared store every session gets a handle onto.
#[derive(Debug)]
enum StoreRoot {
    InMemory(MemoryStore),
    Persistent(RedbStore),
}

impl StoreRoot {
    fn backend(&self) -> StorageBackend {
        match self {
            Self::InMemory(store) => StorageBackend::InMemory(store.handle()),
            Self::Persistent(store) => StorageBackend::Persistent(store.handle()),
        }
    }

    fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }
}

/// Modules with data the store serves (everything except the local domains).
fn store_modules(schema: &Schema) -> impl Iterator<Item = &str> {
    schema
        .data_modules()
        .map(|m| m.name.as_str())
        .filter(|name| LocalDomain::ALL.iter().all(|d| d.module() != *name))
}

fn parse_datastore(name: &str) -> Result<Datastore, AppError> {
    Datastore::from_name(name).ok_or_else(|| {
        AppError::Usage(format!(
            "Unknown datastore '{}' (expected running, startup or candidate)",
            name
        ))
    })
}

fn build_filter(read: &ReadArgs) -> Result<Option<Filter>, AppError> {
    match (&read.xpath, &read.subtree) {
        (Some(xpath), _) => Ok(Some(Filter::XPath(xpath.clone()))),
        (None, Some(path)) => Ok(Some(Filter::Subtree(fixtures::load_subtree(path)?))),
        (None, None) => Ok(None),
    }
}

fn finish_request(mut request: Request, read: &ReadArgs) -> Result<Request, AppError> {
    if let Some(filter) = build_filter(read)? {
        request = request.with_filter(filter);
    }
    if let Some(mode) = &read.with_defaults {
        request = request.with_defaults(mode.clone());
    }
    Ok(request)
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create the database and install the schema's modules.
pub fn cmd_init(ctx: &Context, force: bool) -> Result<(), AppError> {
    let Some(path) = &ctx.config.database else {
        return Err(AppError::Usage(
            "init needs a database path (--database or config file)".to_string(),
        ));
    };
    if path.exists() {
        if !force {
            return Err(AppError::Usage(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(path).map_err(|e| AppError::io(path, &e))?;
    }

    ctx.open_store()?;
    let installed = store_modules(&ctx.schema).count();
    if ctx.json_mode {
        ctx.emit(&json!({
            "database": path.to_string_lossy(),
            "modules_installed": installed,
        }));
    } else {
        println!("Initialized new redb database at {:?}", path);
        println!("Installed {} modules", installed);
    }
    Ok(())
}

// =============================================================================
// SEED COMMAND
// =============================================================================

/// Load items from a JSON file into a datastore.
pub fn cmd_seed(ctx: &Context, file: &Path, datastore: &str) -> Result<(), AppError> {
    let datastore = parse_datastore(datastore)?;
    if datastore == Datastore::Candidate {
        return Err(AppError::Usage(
            "the candidate belongs to a session and is not stored; seed running instead"
                .to_string(),
        ));
    }
    let items = fixtures::load_seed(file)?;
    let store = ctx.open_store()?;
    if !store.is_persistent() {
        warn!("No database configured; seeded items are discarded on exit");
    }

    let mut session = Session::new(0, store.backend());
    let count = fixtures::apply_seed(&mut session, datastore, &items)?;
    if ctx.json_mode {
        ctx.emit(&json!({ "datastore": datastore.name(), "items": count }));
    } else {
        println!("Seeded {} items into {}", count, datastore);
    }
    Ok(())
}

// =============================================================================
// READ COMMANDS
// =============================================================================

fn run_single(ctx: &Context, request: &Request) -> Result<(), AppError> {
    let server = ctx.server();
    let store = ctx.open_store()?;
    let mut session = server.open_session(1, "cli", "localhost", store.backend());
    let reply = server.handle_read(&mut session, request);
    if let Some(err) = reply.error() {
        warn!(message_id = %err.message_id, error = %err.error_message, "Request failed");
    }
    ctx.emit(&render_reply(&reply, server.schema()));
    server.close_session(session);
    Ok(())
}

/// Run a `<get>` request.
pub fn cmd_get(ctx: &Context, read: &ReadArgs) -> Result<(), AppError> {
    let request = finish_request(Request::get(read.message_id.clone()), read)?;
    run_single(ctx, &request)
}

/// Run a `<get-config>` request.
pub fn cmd_get_config(ctx: &Context, source: &str, read: &ReadArgs) -> Result<(), AppError> {
    let source = parse_datastore(source)?;
    let request = finish_request(Request::get_config(read.message_id.clone(), source), read)?;
    run_single(ctx, &request)
}

// =============================================================================
// MODULES COMMAND
// =============================================================================

/// List the modules a filterless read covers and where their data comes from.
pub fn cmd_modules(ctx: &Context) -> Result<(), AppError> {
    let filters = compile(&Request::get("modules"), &ctx.schema)
        .map_err(|e| AppError::Usage(e.to_string()))?;
    let rows: Vec<(String, &str)> = filters
        .iter()
        .map(|f| {
            let source = if LocalDomain::for_filter(f).is_some() {
                "local"
            } else {
                "store"
            };
            (f.module().to_string(), source)
        })
        .collect();

    if ctx.json_mode {
        let list: Vec<Value> = rows
            .iter()
            .map(|(module, source)| json!({ "module": module, "source": source }))
            .collect();
        ctx.emit(&Value::Array(list));
        return Ok(());
    }

    println!("Modules with data");
    println!("=================");
    for (module, source) in rows {
        println!("{:<32} {}", module, source);
    }
    Ok(())
}

// =============================================================================
// BATCH COMMAND
// =============================================================================

/// Run a batch file on the worker pool and print every reply in order.
pub async fn cmd_batch(ctx: &Context, file: &Path) -> Result<(), AppError> {
    let entries = fixtures::load_batch(file)?;
    let server = Arc::new(ctx.server());
    let store = ctx.open_store()?;

    let mut sessions: BTreeMap<u32, SharedSession> = BTreeMap::new();
    for entry in &entries {
        if !sessions.contains_key(&entry.session) {
            let session = server.open_session(entry.session, "batch", "localhost", store.backend());
            sessions.insert(entry.session, shared(session));
        }
    }

    let pool = WorkerPool::new(Arc::clone(&server), ctx.config.effective_workers());
    let jobs = entries.into_iter().map(|e| (e.session, e.request)).collect();
    let replies = pool.run_batch(&sessions, jobs).await?;
    info!(
        replies = replies.len(),
        errors = replies.iter().filter(|r| r.is_error()).count(),
        "Batch finished"
    );

    let rendered: Vec<Value> = replies
        .iter()
        .map(|r| render_reply(r, server.schema()))
        .collect();
    if ctx.json_mode {
        for reply in &rendered {
            ctx.emit(reply);
        }
    } else {
        ctx.emit(&Value::Array(rendered));
    }
    Ok(())
}
