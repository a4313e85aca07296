//! Server-side session store.
//!
//! One `SessionUser` per browser session, keyed by the random id carried in
//! the session cookie. Entries expire after the configured lifetime; they are
//! evicted on read and by the periodic purge task.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use uuid::Uuid;

use models::user::{self, Role};

/// Identity kept for the lifetime of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl From<&user::Model> for SessionUser {
    fn from(u: &user::Model) -> Self {
        Self { id: u.id, username: u.username.clone(), role: u.role }
    }
}

struct Entry {
    user: SessionUser,
    expires_at: Instant,
}

pub struct SessionStore {
    inner: DashMap<Uuid, Entry>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { inner: DashMap::new(), ttl }
    }

    /// Start a session and return its id.
    pub fn create(&self, user: SessionUser) -> Uuid {
        let id = Uuid::new_v4();
        debug!(session_id = %id, user_id = %user.id, "session_created");
        self.inner.insert(id, Entry { user, expires_at: Instant::now() + self.ttl });
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<SessionUser> {
        let expired = match self.inner.get(id) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.user.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.inner.remove(id);
            debug!(session_id = %id, "session_expired");
        }
        None
    }

    /// Remove the session; returns whether it existed.
    pub fn destroy(&self, id: &Uuid) -> bool {
        self.inner.remove(id).is_some()
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, e| e.expires_at > now);
        before - self.inner.len()
    }

    /// Run `purge_expired` every `every` until the store is dropped.
    pub fn spawn_purge(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                let Some(store) = store.upgrade() else { break };
                let removed = store.purge_expired();
                if removed > 0 {
                    debug!(removed, remaining = store.len(), "sessions_purged");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
