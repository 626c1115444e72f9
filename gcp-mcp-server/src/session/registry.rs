use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

use super::sweeper::SweeperHandle;
use super::token::generate_session_id;

/// Maximum number of times a session id can be rotated before the session is retired.
pub const MAX_ROTATIONS: u32 = 10;

/// Default session lifetime, measured from the record's creation.
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Default interval between background expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub type SessionMetadata = Map<String, Value>;

#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub id: String,
    pub created: SystemTime,
    pub last_used: SystemTime,
    pub rotation_count: u32,
    pub metadata: SessionMetadata,
}

impl SessionRecord {
    fn new(id: String, metadata: SessionMetadata, rotation_count: u32, now: SystemTime) -> Self {
        Self {
            id,
            created: now,
            last_used: now,
            rotation_count,
            metadata,
        }
    }

    /// Age of the record at `now`. A clock that went backwards counts as zero.
    pub fn age_at(&self, now: SystemTime) -> Duration {
        now.duration_since(self.created).unwrap_or(Duration::ZERO)
    }

    fn is_expired_at(&self, now: SystemTime, lifetime: Duration) -> bool {
        self.age_at(now) > lifetime
    }
}

/// Registry counters. `active` is the live map size, the others are totals
/// since the registry was constructed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub active: usize,
    pub created: u64,
    pub rotated: u64,
    pub expired: u64,
    pub invalidated: u64,
    pub rotation_limit_reached: u64,
}

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<String, SessionRecord>,
    stats: SessionStats,
}

impl RegistryInner {
    fn remove_expired(&mut self, id: &str) {
        if self.sessions.remove(id).is_some() {
            self.stats.expired += 1;
        }
    }
}

/// Owns every live [`SessionRecord`], keyed by its current id.
pub struct SessionRegistry {
    lifetime: Duration,
    inner: Mutex<RegistryInner>,
    sweeper: Mutex<Option<SweeperHandle>>,
}

impl SessionRegistry {
    /// Creates a registry without a background sweep.
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            inner: Mutex::new(RegistryInner::default()),
            sweeper: Mutex::new(None),
        }
    }

    /// Creates a registry whose expiry sweep runs every `sweep_interval` until
    /// [`SessionRegistry::shutdown`] is called or the registry is dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_sweeper(lifetime: Duration, sweep_interval: Duration) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            lifetime,
            inner: Mutex::new(RegistryInner::default()),
            sweeper: Mutex::new(Some(SweeperHandle::spawn(weak.clone(), sweep_interval))),
        })
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create_session(&self, metadata: SessionMetadata) -> String {
        self.create_session_at(metadata, SystemTime::now())
    }

    pub fn create_session_at(&self, metadata: SessionMetadata, now: SystemTime) -> String {
        let id = generate_session_id();
        let mut inner = self.lock();
        inner
            .sessions
            .insert(id.clone(), SessionRecord::new(id.clone(), metadata, 0, now));
        inner.stats.created += 1;
        debug!("Created session (active: {})", inner.sessions.len());
        id
    }

    pub fn rotate_session_id(&self, current_id: &str) -> Option<String> {
        self.rotate_session_id_at(current_id, SystemTime::now())
    }

    /// Replaces `current_id` with a fresh id carrying the same metadata.
    ///
    /// Returns `None` when the session is unknown, or when it already reached
    /// [`MAX_ROTATIONS`], in which case it is removed and the caller has to
    /// create a new one.
    pub fn rotate_session_id_at(&self, current_id: &str, now: SystemTime) -> Option<String> {
        let mut inner = self.lock();
        let rotation_count = inner.sessions.get(current_id)?.rotation_count;

        if rotation_count >= MAX_ROTATIONS {
            inner.sessions.remove(current_id);
            inner.stats.rotation_limit_reached += 1;
            info!("Session reached rotation limit ({}), retired", MAX_ROTATIONS);
            return None;
        }

        let old = inner.sessions.remove(current_id)?;
        let new_id = generate_session_id();
        inner.sessions.insert(
            new_id.clone(),
            SessionRecord::new(new_id.clone(), old.metadata, rotation_count + 1, now),
        );
        inner.stats.rotated += 1;
        debug!("Rotated session id (rotation {})", rotation_count + 1);
        Some(new_id)
    }

    pub fn validate_session(&self, id: &str) -> bool {
        self.validate_session_at(id, SystemTime::now())
    }

    pub fn validate_session_at(&self, id: &str, now: SystemTime) -> bool {
        let lifetime = self.lifetime;
        let mut inner = self.lock();
        let expired = match inner.sessions.get_mut(id) {
            None => return false,
            Some(record) if record.is_expired_at(now, lifetime) => true,
            Some(record) => {
                record.last_used = now;
                false
            }
        };
        if expired {
            inner.remove_expired(id);
            debug!("Session expired on validation");
            return false;
        }
        true
    }

    pub fn get_session(&self, id: &str) -> Option<SessionRecord> {
        self.lock().sessions.get(id).cloned()
    }

    pub fn get_session_metadata(&self, id: &str) -> Option<SessionMetadata> {
        self.lock()
            .sessions
            .get(id)
            .map(|record| record.metadata.clone())
    }

    pub fn update_session_metadata(&self, id: &str, patch: SessionMetadata) -> bool {
        self.update_session_metadata_at(id, patch, SystemTime::now())
    }

    /// Shallow-merges `patch` into the session's metadata and touches `last_used`.
    pub fn update_session_metadata_at(
        &self,
        id: &str,
        patch: SessionMetadata,
        now: SystemTime,
    ) -> bool {
        match self.lock().sessions.get_mut(id) {
            Some(record) => {
                record.metadata.extend(patch);
                record.last_used = now;
                true
            }
            None => false,
        }
    }

    pub fn invalidate_session(&self, id: &str) -> bool {
        let mut inner = self.lock();
        let existed = inner.sessions.remove(id).is_some();
        if existed {
            inner.stats.invalidated += 1;
        }
        existed
    }

    pub fn cleanup_expired_sessions(&self) -> usize {
        self.cleanup_expired_sessions_at(SystemTime::now())
    }

    pub fn cleanup_expired_sessions_at(&self, now: SystemTime) -> usize {
        let lifetime = self.lifetime;
        let mut inner = self.lock();
        let before = inner.sessions.len();
        inner
            .sessions
            .retain(|_, record| !record.is_expired_at(now, lifetime));
        let removed = before - inner.sessions.len();
        inner.stats.expired += removed as u64;
        removed
    }

    pub fn get_session_stats(&self) -> SessionStats {
        let inner = self.lock();
        SessionStats {
            active: inner.sessions.len(),
            ..inner.stats.clone()
        }
    }

    /// Stops the background sweep, if any, and waits for it to finish.
    pub async fn shutdown(&self) {
        let handle = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_LIFETIME)
    }
}
