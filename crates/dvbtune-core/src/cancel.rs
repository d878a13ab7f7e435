//! Cooperative cancellation token.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag aborting an in-flight tune.
///
/// Checked at exactly three points: before the tune commit call, on each
/// iteration of the lock-wait loop, and before starting a new filter.
/// Only one outstanding tune can be cancelled at a time; there is no
/// queueing.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, pending: bool) {
        self.flag.store(pending, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_set());
        token.set(true);
        assert!(other.is_set());
        other.set(false);
        assert!(!token.is_set());
    }
}
