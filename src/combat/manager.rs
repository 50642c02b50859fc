//! Session registry
//!
//! Holds every live [`CombatSession`] keyed by id. The map sits behind an
//! async lock; each session has its own mutex so independent fights never
//! contend. Session work is synchronous and never awaits while holding a
//! session lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::dice::{DiceRoller, RandomRoller};
use super::error::{CombatError, CombatResult};
use super::log::{ActionSink, TracingSink};
use super::session::{CombatSession, SessionRules, SessionStatus};

/// One line of a session listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub name: String,
    pub status: SessionStatus,
    pub current_round: u32,
    pub participants: usize,
}

/// Owns all combat sessions
pub struct CombatManager {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<CombatSession>>>>,
    rules: SessionRules,
    sink: Arc<dyn ActionSink>,
    /// Base seed; each new session gets the next value
    seed: Option<u64>,
    created: AtomicU64,
}

impl Default for CombatManager {
    fn default() -> Self {
        Self::new(SessionRules::default(), Arc::new(TracingSink), None)
    }
}

impl CombatManager {
    pub fn new(rules: SessionRules, sink: Arc<dyn ActionSink>, seed: Option<u64>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            rules,
            sink,
            seed,
            created: AtomicU64::new(0),
        }
    }

    /// Create a shared instance
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rules(&self) -> SessionRules {
        self.rules
    }

    /// Create a session with the manager's dice
    pub async fn create_session(&self, name: &str) -> Uuid {
        let n = self.created.fetch_add(1, Ordering::Relaxed);
        let roller: Box<dyn DiceRoller> = match self.seed {
            Some(seed) => Box::new(RandomRoller::seeded(seed.wrapping_add(n))),
            None => Box::new(RandomRoller::new()),
        };
        self.create_session_with_roller(name, roller).await
    }

    /// Create a session with caller-supplied dice
    pub async fn create_session_with_roller(&self, name: &str, roller: Box<dyn DiceRoller>) -> Uuid {
        let session = CombatSession::with_sink(name, self.rules, roller, self.sink.clone());
        let id = session.id();
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        info!("Created combat session {} ({})", id, name);
        id
    }

    /// Look up a session handle
    pub async fn get(&self, id: Uuid) -> CombatResult<Arc<Mutex<CombatSession>>> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| CombatError::not_found(format!("session {}", id)))
    }

    /// Run `f` against a locked session
    pub async fn with_session<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut CombatSession) -> CombatResult<T>,
    ) -> CombatResult<T> {
        let handle = self.get(id).await?;
        let mut session = handle.lock();
        f(&mut session)
    }

    pub async fn remove(&self, id: Uuid) -> CombatResult<()> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|_| info!("Removed combat session {}", id))
            .ok_or_else(|| CombatError::not_found(format!("session {}", id)))
    }

    /// All sessions, ordered by name then id
    pub async fn list(&self) -> Vec<SessionSummary> {
        let handles: Vec<_> = self.sessions.read().await.values().cloned().collect();
        let mut summaries: Vec<SessionSummary> = handles
            .iter()
            .map(|h| {
                let s = h.lock();
                SessionSummary {
                    id: s.id(),
                    name: s.name().to_string(),
                    status: s.status(),
                    current_round: s.current_round(),
                    participants: s.participants().count(),
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        summaries
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
