//! Progress reporting for long-running load and save operations.
//!
//! The framework performs no internal thread spawning; a caller that runs a whole
//! [`load`](crate::io::FileIo::load) or [`save`](crate::io::FileIo::save) on a worker thread
//! supplies a [`Progress`] whose observer may be polled or forwarded from any thread.
//! The core calls the observer synchronously: once at 0%, periodically during long pixel
//! loops, and once at 100%.

use std::sync::atomic::{AtomicU8, Ordering};

/// A progress reporting sink.
pub struct Progress {
    observer: Option<Box<dyn Fn(u8) + Send + Sync>>,
    last: AtomicU8,
}

impl Progress {
    /// Create a progress sink forwarding percentages to `observer`.
    #[must_use]
    pub fn new(observer: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            observer: Some(Box::new(observer)),
            last: AtomicU8::new(u8::MAX),
        }
    }

    /// Create a progress sink that discards all reports.
    #[must_use]
    pub fn none() -> Self {
        Self {
            observer: None,
            last: AtomicU8::new(u8::MAX),
        }
    }

    /// Report `percent` (clamped to 100) to the observer.
    ///
    /// Consecutive reports of the same percentage are collapsed into one observer call.
    pub fn emit(&self, percent: u8) {
        let percent = percent.min(100);
        if let Some(observer) = &self.observer {
            if self.last.swap(percent, Ordering::Relaxed) != percent {
                observer(percent);
            }
        }
    }

    /// Report the completed fraction `current / total` as a percentage.
    ///
    /// A `total` of zero reports 100%.
    pub fn emit_fraction(&self, current: usize, total: usize) {
        if total == 0 {
            self.emit(100);
        } else {
            #[allow(clippy::cast_possible_truncation)]
            self.emit(((current.min(total) * 100) / total) as u8);
        }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl core::fmt::Debug for Progress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Progress")
            .field("observed", &self.observer.is_some())
            .finish()
    }
}
