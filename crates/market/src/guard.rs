//! Re-entrancy guard
//!
//! Two states: `Idle`, or `Entered` by one thread. A thread that is already
//! inside an operation (for example a payment-asset callback running on the
//! operation's own thread) is rejected instead of deadlocking on the engine
//! lock.

use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use crate::error::{MarketError, MarketResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Idle,
    Entered(ThreadId),
}

#[derive(Debug)]
pub struct ReentrancyGuard {
    state: Mutex<GuardState>,
}

impl Default for ReentrancyGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GuardState::Idle),
        }
    }

    pub fn state(&self) -> GuardState {
        *self.lock()
    }

    /// Reject the calling thread if it is already inside an operation
    pub fn check(&self) -> MarketResult<()> {
        match *self.lock() {
            GuardState::Entered(owner) if owner == thread::current().id() => {
                tracing::warn!("Re-entrant call rejected");
                Err(MarketError::Reentrant)
            }
            _ => Ok(()),
        }
    }

    /// Mark the calling thread as inside an operation until the token drops.
    ///
    /// Call only while holding the engine lock.
    pub fn enter(&self) -> MarketResult<Entered<'_>> {
        let mut state = self.lock();
        if let GuardState::Entered(owner) = *state {
            if owner == thread::current().id() {
                return Err(MarketError::Reentrant);
            }
        }
        *state = GuardState::Entered(thread::current().id());
        Ok(Entered { guard: self })
    }

    fn lock(&self) -> MutexGuard<'_, GuardState> {
        // Poisoning cannot leave the enum half-written
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Resets the guard to `Idle` on drop
#[must_use = "the guard is released when this is dropped"]
pub struct Entered<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        *self.guard.lock() = GuardState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_and_release() {
        let guard = ReentrancyGuard::new();
        assert_eq!(guard.state(), GuardState::Idle);
        {
            let _entered = guard.enter().unwrap();
            assert_eq!(guard.state(), GuardState::Entered(thread::current().id()));
            assert_eq!(guard.check(), Err(MarketError::Reentrant));
            assert!(guard.enter().is_err());
        }
        assert_eq!(guard.state(), GuardState::Idle);
        assert!(guard.check().is_ok());
    }

    #[test]
    fn test_other_thread_passes_check() {
        let guard = std::sync::Arc::new(ReentrancyGuard::new());
        let _entered = guard.enter().unwrap();

        let remote = std::sync::Arc::clone(&guard);
        let result = thread::spawn(move || remote.check()).join().unwrap();
        assert!(result.is_ok());
    }
}
