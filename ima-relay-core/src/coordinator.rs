//! Coordinator (`spec.md` §6): external mutual-exclusion authority for
//! running passes. Abstracted as `checkStart`/`notifyStart`/`notifyEnd`; the
//! default implementation enforces single-in-flight in-process since the
//! core carries no cross-process coordination of its own (`spec.md` §5).

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;

#[async_trait]
pub trait Coordinator: Send + Sync {
    async fn check_start(&self, direction: &str, index: u64) -> bool;
    async fn notify_start(&self, direction: &str, index: u64);
    async fn notify_end(&self, direction: &str, index: u64);
}

/// `spec.md` §5 single-in-flight guarantee: grants start only when no prior
/// pass for the same `(direction, index)` is in progress.
#[derive(Default)]
pub struct InMemoryCoordinator {
    in_progress: Mutex<HashSet<(String, u64)>>,
}

#[async_trait]
impl Coordinator for InMemoryCoordinator {
    async fn check_start(&self, direction: &str, index: u64) -> bool {
        !self.in_progress.lock().contains(&(direction.to_string(), index))
    }

    async fn notify_start(&self, direction: &str, index: u64) {
        self.in_progress.lock().insert((direction.to_string(), index));
    }

    async fn notify_end(&self, direction: &str, index: u64) {
        self.in_progress.lock().remove(&(direction.to_string(), index));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refuses_second_start_while_first_in_progress() {
        let coordinator = InMemoryCoordinator::default();
        assert!(coordinator.check_start("M2S", 0).await);
        coordinator.notify_start("M2S", 0).await;
        assert!(!coordinator.check_start("M2S", 0).await);
        coordinator.notify_end("M2S", 0).await;
        assert!(coordinator.check_start("M2S", 0).await);
    }

    #[tokio::test]
    async fn distinct_indices_are_independent() {
        let coordinator = InMemoryCoordinator::default();
        coordinator.notify_start("S2S", 0).await;
        assert!(coordinator.check_start("S2S", 1).await);
    }
}
