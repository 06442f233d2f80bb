//! Per-idea lock table.
//!
//! Every mutating operation runs inside [`IdeaLocks::with_locked`]. Keys are
//! sorted before acquisition so overlapping multi-key operations (merges)
//! cannot deadlock, and the whole acquisition is bounded by one deadline.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use pulse_types::{IdeaId, UserId};
use tracing::warn;

use crate::error::{EngineError, EngineResult};

/// Something an operation can lock.
///
/// User keys order before idea keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    User(UserId),
    Idea(IdeaId),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::User(id) => write!(f, "{}", id),
            LockKey::Idea(id) => write!(f, "{}", id),
        }
    }
}

impl From<IdeaId> for LockKey {
    fn from(id: IdeaId) -> Self {
        LockKey::Idea(id)
    }
}

impl From<UserId> for LockKey {
    fn from(id: UserId) -> Self {
        LockKey::User(id)
    }
}

/// Table of mutexes keyed by idea or user.
pub struct IdeaLocks {
    table: DashMap<LockKey, Arc<Mutex<()>>>,
    timeout: Duration,
}

impl IdeaLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            table: DashMap::new(),
            timeout,
        }
    }

    /// Run `f` while holding every key in `keys`.
    ///
    /// Fails with [`EngineError::Contention`] if the keys cannot all be taken
    /// before the deadline; anything already taken is released.
    pub fn with_locked<K, T, F>(&self, keys: K, f: F) -> EngineResult<T>
    where
        K: IntoIterator<Item = LockKey>,
        F: FnOnce() -> EngineResult<T>,
    {
        let mut keys: Vec<LockKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let handles: Vec<(LockKey, Arc<Mutex<()>>)> = keys
            .into_iter()
            .map(|key| {
                let mutex = Arc::clone(self.table.entry(key.clone()).or_default().value());
                (key, mutex)
            })
            .collect();

        let result = self.run_holding(&handles, f);
        self.release(handles);
        result
    }

    fn run_holding<T, F>(&self, handles: &[(LockKey, Arc<Mutex<()>>)], f: F) -> EngineResult<T>
    where
        F: FnOnce() -> EngineResult<T>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut guards = Vec::with_capacity(handles.len());
        for (key, mutex) in handles {
            match mutex.try_lock_until(deadline) {
                Some(guard) => guards.push(guard),
                None => {
                    warn!(
                        key = %key,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "lock contention"
                    );
                    return Err(EngineError::Contention {
                        key: key.to_string(),
                    });
                }
            }
        }

        f()
    }

    /// Drop table entries nobody else holds a handle to.
    ///
    /// Handles are only cloned under the shard lock, so a count of one seen
    /// inside `remove_if` means no caller is waiting on or holding the mutex.
    fn release(&self, handles: Vec<(LockKey, Arc<Mutex<()>>)>) {
        for (key, mutex) in handles {
            drop(mutex);
            self.table
                .remove_if(&key, |_, mutex| Arc::strong_count(mutex) == 1);
        }
    }
}
