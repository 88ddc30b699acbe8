//! Epoch-based staleness for orchestrator handles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic run counter shared by all runs of one handle.
#[derive(Debug, Clone, Default)]
pub struct EpochCounter {
    current: Arc<AtomicU64>,
}

impl EpochCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new epoch, superseding every earlier token.
    pub fn advance(&self) -> RunToken {
        let epoch = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        RunToken {
            epoch,
            counter: self.current.clone(),
        }
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.current() == epoch
    }
}

/// Identity of one run. Results carried under a superseded token are
/// dropped on arrival.
#[derive(Debug, Clone)]
pub struct RunToken {
    epoch: u64,
    counter: Arc<AtomicU64>,
}

impl RunToken {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.epoch
    }

    pub fn is_stale(&self) -> bool {
        !self.is_current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_token_supersedes() {
        let counter = EpochCounter::new();
        let a = counter.advance();
        assert!(a.is_current());
        let b = counter.advance();
        assert!(a.is_stale());
        assert!(b.is_current());
        assert!(b.epoch() > a.epoch());
        assert!(counter.is_current(b.epoch()));
    }

    #[test]
    fn test_clones_share_counter() {
        let counter = EpochCounter::new();
        let other = counter.clone();
        let a = counter.advance();
        other.advance();
        assert!(a.is_stale());
    }
}
