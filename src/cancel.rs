//! Cooperative cancellation shared between a caller and running work.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cancellation flag with an optional deadline.
///
/// Clones share the flag. A token derived with [`CancelToken::with_deadline`]
/// also reports cancellation once its deadline has passed, without
/// affecting the parent.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation for every clone of this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// A token sharing this flag that also expires after `budget`.
    ///
    /// An existing earlier deadline is kept.
    pub fn with_deadline(&self, budget: Duration) -> Self {
        let deadline = Instant::now() + budget;
        Self {
            flag: Arc::clone(&self.flag),
            deadline: Some(self.deadline.map_or(deadline, |d| d.min(deadline))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn expired_deadline_cancels_child_only() {
        let parent = CancelToken::new();
        let child = parent.with_deadline(Duration::ZERO);
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn child_sees_parent_cancel() {
        let parent = CancelToken::new();
        let child = parent.with_deadline(Duration::from_secs(3600));
        assert!(!child.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
