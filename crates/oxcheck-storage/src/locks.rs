use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Set of hosts whose cycle is currently running.
///
/// # Examples
///
/// ```
/// use oxcheck_storage::HostLocks;
///
/// let locks = HostLocks::default();
/// let guard = locks.try_lock("web-01").unwrap();
/// assert!(locks.try_lock("web-01").is_none());
/// drop(guard);
/// assert!(locks.try_lock("web-01").is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct HostLocks {
    running: Arc<Mutex<HashSet<String>>>,
}

impl HostLocks {
    fn lock_running(&self) -> MutexGuard<'_, HashSet<String>> {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claims the host, or returns `None` when another cycle holds it.
    pub fn try_lock(&self, host: &str) -> Option<HostGuard> {
        if !self.lock_running().insert(host.to_string()) {
            return None;
        }
        Some(HostGuard {
            host: host.to_string(),
            running: Arc::clone(&self.running),
        })
    }

    pub fn is_locked(&self, host: &str) -> bool {
        self.lock_running().contains(host)
    }
}

/// Exclusive claim on one host, released on drop.
#[derive(Debug)]
pub struct HostGuard {
    host: String,
    running: Arc<Mutex<HashSet<String>>>,
}

impl HostGuard {
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl Drop for HostGuard {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.host);
    }
}
