//! Cooperative cancellation of an index build.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use ftrie_common::{Result, error::Error};

/// A cloneable stop flag shared between the builder and its owner.
///
/// The builder polls the token at record boundaries and periodically while
/// inserting tokens; any clone may request the stop from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    stopped: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> CancellationToken {
        Self::default()
    }

    /// Requests the build to stop at its next poll.
    pub fn cancel(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Returns a `Cancelled` error once a stop has been requested.
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::cancelled())
        } else {
            Ok(())
        }
    }
}
