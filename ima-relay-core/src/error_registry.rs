//! Error-category registry (`spec.md` §3, §7): process-wide, lock-guarded
//! map from a category tag (`"loop-M2S"`, `"oracle"`, ...) to its most recent
//! failure; success on a category clears it. Also keeps a bounded ring of
//! the N most recent failure records overall, for observability.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

const DEFAULT_RING_CAPACITY: usize = 20;

#[derive(Clone, Debug)]
pub struct FailureRecord {
    pub category: String,
    pub detail: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

struct Inner {
    by_category: HashMap<String, FailureRecord>,
    recent: VecDeque<FailureRecord>,
    capacity: usize,
}

/// Single instance shared across all direction loops (`spec.md` §5: "the
/// global error-category registry (guarded by a lock)").
pub struct ErrorRegistry {
    inner: Mutex<Inner>,
}

impl ErrorRegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RING_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                by_category: HashMap::new(),
                recent: VecDeque::with_capacity(capacity),
                capacity,
            }),
        }
    }

    pub fn record_failure(&self, category: impl Into<String>, detail: impl Into<String>) {
        let category = category.into();
        let record = FailureRecord {
            category: category.clone(),
            detail: detail.into(),
            timestamp: chrono::Utc::now(),
        };

        let mut inner = self.inner.lock();
        inner.by_category.insert(category, record.clone());
        if inner.recent.len() == inner.capacity {
            inner.recent.pop_front();
        }
        inner.recent.push_back(record);
    }

    pub fn clear_category(&self, category: &str) {
        self.inner.lock().by_category.remove(category);
    }

    pub fn current_failure(&self, category: &str) -> Option<FailureRecord> {
        self.inner.lock().by_category.get(category).cloned()
    }

    pub fn recent_failures(&self) -> Vec<FailureRecord> {
        self.inner.lock().recent.iter().cloned().collect()
    }
}

impl Default for ErrorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_clears_category() {
        let registry = ErrorRegistry::new();
        registry.record_failure("loop-M2S", "boom");
        assert!(registry.current_failure("loop-M2S").is_some());
        registry.clear_category("loop-M2S");
        assert!(registry.current_failure("loop-M2S").is_none());
    }

    #[test]
    fn recent_ring_is_bounded() {
        let registry = ErrorRegistry::with_capacity(2);
        registry.record_failure("a", "1");
        registry.record_failure("b", "2");
        registry.record_failure("c", "3");
        let recent = registry.recent_failures();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].category, "b");
        assert_eq!(recent[1].category, "c");
    }
}
