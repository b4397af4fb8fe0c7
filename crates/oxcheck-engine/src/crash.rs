use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Text of a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panic: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panic: {msg}")
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Per-plugin count of crashed check invocations since process start.
///
/// # Examples
///
/// ```
/// use oxcheck_engine::crash::CrashCounters;
///
/// let counters = CrashCounters::default();
/// counters.record("tsm_drives");
/// counters.record("tsm_drives");
/// assert_eq!(counters.get("tsm_drives"), 2);
/// assert_eq!(counters.total(), 2);
/// ```
#[derive(Debug, Default)]
pub struct CrashCounters {
    counts: Mutex<BTreeMap<String, u64>>,
}

impl CrashCounters {
    fn lock_counts(&self) -> MutexGuard<'_, BTreeMap<String, u64>> {
        self.counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, plugin: &str) -> u64 {
        let mut counts = self.lock_counts();
        let count = counts.entry(plugin.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn get(&self, plugin: &str) -> u64 {
        self.lock_counts().get(plugin).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.lock_counts().values().sum()
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.lock_counts().clone()
    }
}
