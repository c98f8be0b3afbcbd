use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation signal shared by every worker of one job.
///
/// Clone is cheap and shares state. Once cancelled it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Request cancellation. Returns `true` only for the call that flipped
    /// the token.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_sticky_and_shared() {
        let token = CancellationToken::new();
        let worker_view = token.clone();
        assert!(!worker_view.is_cancelled());

        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(worker_view.is_cancelled());
    }
}
