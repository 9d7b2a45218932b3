//! # Worker Pool
//!
//! Runs read requests on blocking workers, at most `workers` at a time.
//!
//! Each session sits behind its own mutex, so requests of one session are
//! serialized while different sessions proceed in parallel. A request runs
//! to completion once started.

use crate::error::AppError;
use ncread_core::{Request, Server, ServerReply, Session};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Semaphore;
use tracing::debug;

/// A session shared between workers.
pub type SharedSession = Arc<Mutex<Session>>;

/// Bounded pool of blocking request workers.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    server: Arc<Server>,
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    #[must_use]
    pub fn new(server: Arc<Server>, workers: usize) -> Self {
        Self {
            server,
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    #[must_use]
    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }

    /// Run one request on a worker.
    pub async fn submit(
        &self,
        session: SharedSession,
        request: Request,
    ) -> Result<ServerReply, AppError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| AppError::Worker(e.to_string()))?;
        let server = Arc::clone(&self.server);

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
            server.handle_read(&mut session, &request)
        })
        .await
        .map_err(|e| AppError::Worker(e.to_string()))
    }

    /// Run a batch of `(session, request)` jobs; replies come back in job order.
    ///
    /// Jobs of one session run in submission order.
    pub async fn run_batch(
        &self,
        sessions: &BTreeMap<u32, SharedSession>,
        jobs: Vec<(u32, Request)>,
    ) -> Result<Vec<ServerReply>, AppError> {
        let mut lanes: BTreeMap<u32, Vec<(usize, Request)>> = BTreeMap::new();
        let total = jobs.len();
        for (index, (session, request)) in jobs.into_iter().enumerate() {
            if !sessions.contains_key(&session) {
                return Err(AppError::Usage(format!("Unknown session {session}")));
            }
            lanes.entry(session).or_default().push((index, request));
        }
        debug!(jobs = total, sessions = lanes.len(), "Batch scheduled");

        let mut handles = Vec::with_capacity(lanes.len());
        for (id, lane) in lanes {
            let Some(session) = sessions.get(&id).map(Arc::clone) else {
                continue;
            };
            let pool = self.clone();
            handles.push(tokio::spawn(async move {
                let mut replies = Vec::with_capacity(lane.len());
                for (index, request) in lane {
                    let reply = pool.submit(Arc::clone(&session), request).await?;
                    replies.push((index, reply));
                }
                Ok::<_, AppError>(replies)
            }));
        }

        let mut ordered: Vec<Option<ServerReply>> = vec![None; total];
        for handle in handles {
            let replies = handle
                .await
                .map_err(|e| AppError::Worker(e.to_string()))??;
            for (index, reply) in replies {
                ordered[index] = Some(reply);
            }
        }
        ordered
            .into_iter()
            .map(|r| r.ok_or_else(|| AppError::Worker("missing reply".into())))
            .collect()
    }
}

/// Wrap a session for the pool.
#[must_use]
pub fn shared(session: Session) -> SharedSession {
    Arc::new(Mutex::new(session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ncread_core::{Datastore, ServerConfig, StorageBackend};

    fn pool(workers: usize) -> WorkerPool {
        WorkerPool::new(
            Arc::new(Server::new(ncread_core::Schema::with_builtin_modules(), ServerConfig::default())),
            workers,
        )
    }

    #[tokio::test]
    async fn submit_runs_request() {
        let pool = pool(2);
        let session = shared(pool.server().open_session(1, "u", "::1", StorageBackend::default()));
        let reply = pool
            .submit(session, Request::get_config("1", Datastore::Running))
            .await
            .expect("reply");
        assert!(!reply.is_error());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn batch_preserves_order() {
        let pool = pool(1);
        let mut sessions = BTreeMap::new();
        for id in [1, 2] {
            sessions.insert(
                id,
                shared(pool.server().open_session(id, "u", "::1", StorageBackend::default())),
            );
        }
        let jobs = vec![
            (2, Request::get("a")),
            (1, Request::get("b")),
            (2, Request::get("c")),
        ];
        let replies = pool.run_batch(&sessions, jobs).await.expect("batch");
        let ids: Vec<_> = replies
            .iter()
            .map(|r| r.data().map(|d| d.message_id().to_string()))
            .collect();
        assert_eq!(
            ids,
            vec![Some("a".into()), Some("b".into()), Some("c".into())]
        );
    }

    #[tokio::test]
    async fn unknown_session_rejected() {
        let pool = pool(1);
        let err = pool
            .run_batch(&BTreeMap::new(), vec![(9, Request::get("x"))])
            .await
            .expect_err("unknown session");
        assert!(matches!(err, AppError::Usage(_)));
    }
}
