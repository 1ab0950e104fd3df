//! Run-wide coordination flags shared between the driver, its steps and the
//! external controller.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const BLOCK_REQUESTED: u8 = 0b01;
const LOCK_HELD: u8 = 0b10;

/// Why a step stopped paging before its table was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptReason {
    /// An operator asked the run to pause.
    BlockRequested,
    /// The run no longer owns exclusive access to the migration state.
    LockLost,
}

impl fmt::Display for InterruptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlockRequested => write!(f, "block requested"),
            Self::LockLost => write!(f, "lock lost"),
        }
    }
}

/// A consistent snapshot of both run flags, taken with a single atomic load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunFlags {
    /// An external actor asked the run to pause.
    pub block_requested: bool,
    /// The run still owns exclusive access.
    pub in_lock: bool,
}

impl RunFlags {
    fn from_bits(bits: u8) -> Self {
        Self {
            block_requested: bits & BLOCK_REQUESTED != 0,
            in_lock: bits & LOCK_HELD != 0,
        }
    }

    /// Returns the reason new page reads must stop, if any.
    ///
    /// A block request takes precedence over a lost lock.
    #[must_use]
    pub fn interruption(&self) -> Option<InterruptReason> {
        if self.block_requested {
            Some(InterruptReason::BlockRequested)
        } else if !self.in_lock {
            Some(InterruptReason::LockLost)
        } else {
            None
        }
    }

    /// Returns true if the run may keep initiating page reads.
    #[must_use]
    pub fn can_proceed(&self) -> bool {
        self.interruption().is_none()
    }
}

#[derive(Debug)]
struct Inner {
    run_id: Uuid,
    flags: AtomicU8,
    block_reason: RwLock<Option<String>>,
}

impl Inner {
    fn flags(&self) -> RunFlags {
        RunFlags::from_bits(self.flags.load(Ordering::SeqCst))
    }
}

/// Process-local state of one driver invocation.
///
/// Owned by the driver. Steps only ever see a [`RunStateReader`]; the
/// operator side holds a [`RunController`].
#[derive(Debug)]
pub struct SharedRunState {
    inner: Arc<Inner>,
}

impl SharedRunState {
    /// Creates the state for `run_id` with the exclusivity lock held.
    #[must_use]
    pub fn new(run_id: Uuid) -> Self {
        Self {
            inner: Arc::new(Inner {
                run_id,
                flags: AtomicU8::new(LOCK_HELD),
                block_reason: RwLock::new(None),
            }),
        }
    }

    /// Creates the state for a freshly generated run id.
    #[must_use]
    pub fn for_new_run() -> Self {
        Self::new(Uuid::new_v4())
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.inner.run_id
    }

    /// Returns a snapshot of both flags.
    #[must_use]
    pub fn flags(&self) -> RunFlags {
        self.inner.flags()
    }

    /// Returns a read-only view for steps.
    #[must_use]
    pub fn reader(&self) -> RunStateReader {
        RunStateReader {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Returns a read-write handle for the external controller.
    #[must_use]
    pub fn controller(&self) -> RunController {
        RunController {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Read-only view of the run flags.
#[derive(Debug, Clone)]
pub struct RunStateReader {
    inner: Arc<Inner>,
}

impl RunStateReader {
    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.inner.run_id
    }

    /// Returns a snapshot of both flags.
    #[must_use]
    pub fn flags(&self) -> RunFlags {
        self.inner.flags()
    }

    /// Returns whether a block has been requested.
    #[must_use]
    pub fn is_block_requested(&self) -> bool {
        self.flags().block_requested
    }

    /// Returns whether the run still holds its exclusivity lock.
    #[must_use]
    pub fn is_in_lock(&self) -> bool {
        self.flags().in_lock
    }

    /// Returns the reason given with the block request, if any.
    #[must_use]
    pub fn block_reason(&self) -> Option<String> {
        self.inner.block_reason.read().clone()
    }
}

/// Read-write handle for whoever manages pausing and exclusivity.
#[derive(Debug, Clone)]
pub struct RunController {
    inner: Arc<Inner>,
}

impl RunController {
    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.inner.run_id
    }

    /// Returns a snapshot of both flags.
    #[must_use]
    pub fn flags(&self) -> RunFlags {
        self.inner.flags()
    }

    /// Asks the run to pause at the next page boundary.
    ///
    /// Idempotent: only the first reason is kept. Returns true if this call
    /// set the flag.
    pub fn request_block(&self, reason: impl Into<String>) -> bool {
        let previous = self.inner.flags.fetch_or(BLOCK_REQUESTED, Ordering::SeqCst);
        if previous & BLOCK_REQUESTED != 0 {
            return false;
        }

        let reason = reason.into();
        info!(run_id = %self.inner.run_id, %reason, "Block requested for migration run");
        *self.inner.block_reason.write() = Some(reason);
        true
    }

    /// Withdraws a pending block request.
    pub fn clear_block(&self) {
        self.inner.flags.fetch_and(!BLOCK_REQUESTED, Ordering::SeqCst);
        *self.inner.block_reason.write() = None;
    }

    /// Marks the exclusivity lock as held.
    pub fn acquire_lock(&self) {
        self.inner.flags.fetch_or(LOCK_HELD, Ordering::SeqCst);
    }

    /// Marks the exclusivity lock as lost; steps stop at the next page boundary.
    pub fn release_lock(&self) {
        info!(run_id = %self.inner.run_id, "Exclusivity lock released for migration run");
        self.inner.flags.fetch_and(!LOCK_HELD, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_holds_lock() {
        let state = SharedRunState::for_new_run();
        let flags = state.flags();

        assert!(flags.in_lock);
        assert!(!flags.block_requested);
        assert!(flags.can_proceed());
    }

    #[test]
    fn test_block_visible_to_reader() {
        let state = SharedRunState::for_new_run();
        let reader = state.reader();
        let controller = state.controller();

        assert!(controller.request_block("maintenance window"));
        assert!(reader.is_block_requested());
        assert_eq!(reader.block_reason(), Some("maintenance window".to_string()));
        assert_eq!(
            reader.flags().interruption(),
            Some(InterruptReason::BlockRequested)
        );
    }

    #[test]
    fn test_request_block_idempotent() {
        let state = SharedRunState::for_new_run();
        let controller = state.controller();

        assert!(controller.request_block("first"));
        assert!(!controller.request_block("second"));
        assert_eq!(state.reader().block_reason(), Some("first".to_string()));
    }

    #[test]
    fn test_lock_lost_interrupts() {
        let state = SharedRunState::for_new_run();
        let controller = state.controller();

        controller.release_lock();
        assert_eq!(state.flags().interruption(), Some(InterruptReason::LockLost));

        controller.acquire_lock();
        assert!(state.flags().can_proceed());
    }

    #[test]
    fn test_block_takes_precedence_over_lock() {
        let state = SharedRunState::for_new_run();
        let controller = state.controller();
        controller.release_lock();
        controller.request_block("pause");

        assert_eq!(
            state.flags().interruption(),
            Some(InterruptReason::BlockRequested)
        );
    }

    #[test]
    fn test_clear_block() {
        let state = SharedRunState::for_new_run();
        let controller = state.controller();
        controller.request_block("pause");
        controller.clear_block();

        assert!(!state.reader().is_block_requested());
        assert!(state.reader().block_reason().is_none());
    }

    #[test]
    fn test_handles_share_run_id() {
        let state = SharedRunState::for_new_run();
        assert_eq!(state.reader().run_id(), state.run_id());
        assert_eq!(state.controller().run_id(), state.run_id());
    }
}
