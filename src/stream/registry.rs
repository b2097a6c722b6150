use std::collections::BTreeMap;

use tokio::sync::Mutex;

use crate::foundation::error::BrawlResult;
use crate::stream::StreamTarget;
use crate::stream::session::{SessionDeps, StreamSession};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// Snapshot of one registered stream.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatus {
    pub stream_key: String,
    pub screen_id: String,
    pub running: bool,
}

/// The process's active stream sessions, keyed by stream key.
///
/// Owned by the entry point and handed to whatever needs to start or stop targets.
pub struct StreamRegistry {
    deps: SessionDeps,
    sessions: Mutex<BTreeMap<String, StreamSession>>,
}

impl StreamRegistry {
    pub fn new(deps: SessionDeps) -> Self {
        Self {
            deps,
            sessions: Mutex::new(BTreeMap::new()),
        }
    }

    /// Start streaming to `target`. A live session under the same key is left alone.
    pub async fn start(&self, target: StreamTarget) -> BrawlResult<StartOutcome> {
        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions.get(&target.stream_key) {
            if existing.is_running() {
                tracing::info!(stream_key = %target.stream_key, "stream already running");
                return Ok(StartOutcome::AlreadyRunning);
            }
            // a session whose tasks died is replaced
            if let Some(dead) = sessions.remove(&target.stream_key) {
                dead.stop().await;
            }
        }
        let key = target.stream_key.clone();
        let session = StreamSession::start(target, self.deps.clone())?;
        sessions.insert(key, session);
        Ok(StartOutcome::Started)
    }

    /// Stop and forget a stream. Returns whether it was registered.
    pub async fn stop(&self, stream_key: &str) -> bool {
        let removed = self.sessions.lock().await.remove(stream_key);
        match removed {
            Some(session) => {
                session.stop().await;
                true
            }
            None => false,
        }
    }

    pub async fn list(&self) -> Vec<StreamStatus> {
        self.sessions
            .lock()
            .await
            .values()
            .map(|s| StreamStatus {
                stream_key: s.target().stream_key.clone(),
                screen_id: s.target().screen_id.clone(),
                running: s.is_running(),
            })
            .collect()
    }

    pub async fn stop_all(&self) {
        let sessions = std::mem::take(&mut *self.sessions.lock().await);
        for session in sessions.into_values() {
            session.stop().await;
        }
    }
}
