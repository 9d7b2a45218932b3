//! # Server Monitoring
//!
//! Counters and registries behind the locally served monitoring and
//! notification-capability data.
//!
//! Counters are atomics and registries sit behind mutexes, so one `Monitor`
//! is shared by every worker without a request-wide lock. A poisoned mutex
//! still holds consistent data (every update is a single insert or removal)
//! and is recovered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Name of the stream every server offers.
pub const DEFAULT_STREAM: &str = "NETCONF";

/// One live session as reported in the monitoring data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: u32,
    pub transport: String,
    pub username: String,
    pub source_host: String,
    pub login_time: DateTime<Utc>,
    pub in_rpcs: u64,
    pub in_bad_rpcs: u64,
    pub out_rpc_errors: u64,
    pub out_notifications: u64,
}

/// A notification stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub name: String,
    pub description: String,
    pub replay_support: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay_log_creation_time: Option<DateTime<Utc>>,
}

/// Server-wide statistics at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub start_time: DateTime<Utc>,
    pub in_bad_hellos: u64,
    pub in_sessions: u64,
    pub dropped_sessions: u64,
    pub in_rpcs: u64,
    pub in_bad_rpcs: u64,
    pub out_rpc_errors: u64,
    pub out_notifications: u64,
}

/// Shared server counters and registries.
#[derive(Debug)]
pub struct Monitor {
    start_time: DateTime<Utc>,
    in_bad_hellos: AtomicU64,
    in_sessions: AtomicU64,
    dropped_sessions: AtomicU64,
    in_rpcs: AtomicU64,
    in_bad_rpcs: AtomicU64,
    out_rpc_errors: AtomicU64,
    out_notifications: AtomicU64,
    sessions: Mutex<BTreeMap<u32, SessionInfo>>,
    streams: Mutex<Vec<StreamInfo>>,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Monitor {
    /// A monitor started now, offering the default stream.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start_time: Utc::now(),
            in_bad_hellos: AtomicU64::new(0),
            in_sessions: AtomicU64::new(0),
            dropped_sessions: AtomicU64::new(0),
            in_rpcs: AtomicU64::new(0),
            in_bad_rpcs: AtomicU64::new(0),
            out_rpc_errors: AtomicU64::new(0),
            out_notifications: AtomicU64::new(0),
            sessions: Mutex::new(BTreeMap::new()),
            streams: Mutex::new(vec![StreamInfo {
                name: DEFAULT_STREAM.into(),
                description: "Default NETCONF notification stream".into(),
                replay_support: false,
                replay_log_creation_time: None,
            }]),
        }
    }

    // =========================================================================
    // SESSIONS
    // =========================================================================

    /// Register a new session.
    pub fn session_started(&self, id: u32, username: &str, source_host: &str) {
        self.in_sessions.fetch_add(1, Ordering::Relaxed);
        lock(&self.sessions).insert(
            id,
            SessionInfo {
                id,
                transport: "netconf-ssh".into(),
                username: username.into(),
                source_host: source_host.into(),
                login_time: Utc::now(),
                in_rpcs: 0,
                in_bad_rpcs: 0,
                out_rpc_errors: 0,
                out_notifications: 0,
            },
        );
    }

    /// Unregister a session. `dropped` counts sessions that ended abnormally.
    pub fn session_stopped(&self, id: u32, dropped: bool) {
        if dropped {
            self.dropped_sessions.fetch_add(1, Ordering::Relaxed);
        }
        lock(&self.sessions).remove(&id);
    }

    /// Live sessions ordered by id.
    #[must_use]
    pub fn sessions(&self) -> Vec<SessionInfo> {
        lock(&self.sessions).values().cloned().collect()
    }

    // =========================================================================
    // COUNTERS
    // =========================================================================

    /// Count an RPC received on a session.
    pub fn rpc_received(&self, session: u32) {
        self.in_rpcs.fetch_add(1, Ordering::Relaxed);
        if let Some(info) = lock(&self.sessions).get_mut(&session) {
            info.in_rpcs = info.in_rpcs.saturating_add(1);
        }
    }

    /// Count an RPC answered with an error.
    pub fn rpc_failed(&self, session: u32) {
        self.out_rpc_errors.fetch_add(1, Ordering::Relaxed);
        if let Some(info) = lock(&self.sessions).get_mut(&session) {
            info.out_rpc_errors = info.out_rpc_errors.saturating_add(1);
        }
    }

    /// Count a malformed RPC.
    pub fn bad_rpc(&self, session: u32) {
        self.in_bad_rpcs.fetch_add(1, Ordering::Relaxed);
        if let Some(info) = lock(&self.sessions).get_mut(&session) {
            info.in_bad_rpcs = info.in_bad_rpcs.saturating_add(1);
        }
    }

    /// Current statistics.
    #[must_use]
    pub fn statistics(&self) -> Statistics {
        Statistics {
            start_time: self.start_time,
            in_bad_hellos: self.in_bad_hellos.load(Ordering::Relaxed),
            in_sessions: self.in_sessions.load(Ordering::Relaxed),
            dropped_sessions: self.dropped_sessions.load(Ordering::Relaxed),
            in_rpcs: self.in_rpcs.load(Ordering::Relaxed),
            in_bad_rpcs: self.in_bad_rpcs.load(Ordering::Relaxed),
            out_rpc_errors: self.out_rpc_errors.load(Ordering::Relaxed),
            out_notifications: self.out_notifications.load(Ordering::Relaxed),
        }
    }

    // =========================================================================
    // STREAMS
    // =========================================================================

    /// Add a stream, replacing one with the same name.
    pub fn register_stream(&self, stream: StreamInfo) {
        let mut streams = lock(&self.streams);
        match streams.iter_mut().find(|s| s.name == stream.name) {
            Some(existing) => *existing = stream,
            None => streams.push(stream),
        }
    }

    /// Registered streams in registration order.
    #[must_use]
    pub fn streams(&self) -> Vec<StreamInfo> {
        lock(&self.streams).clone()
    }
}
