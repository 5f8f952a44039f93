//! Frame scheduling abstraction
//!
//! The animation engine never owns a render loop. It asks the host for
//! "call me on the next frame" and "call me after N milliseconds", and
//! cancels those requests when its state is reset or destroyed.

use slotmap::new_key_type;
use std::rc::Rc;

/// Duration of one frame at 60 Hz, in milliseconds
pub const NOMINAL_FRAME_MS: f64 = 1000.0 / 60.0;

new_key_type! {
    /// Handle to a scheduled tick or timeout
    pub struct TickId;
}

impl TickId {
    /// Convert to raw u64 for logging and storage
    pub fn to_raw(self) -> u64 {
        self.0.as_ffi()
    }
}

/// Callback invoked by the host with the current timestamp in milliseconds
pub type TickCallback = Box<dyn FnOnce(f64)>;

/// Shared, single-threaded handle to a frame scheduler
pub type SharedScheduler = Rc<dyn FrameScheduler>;

/// A monotonically non-decreasing timestamp source
pub trait Clock {
    /// Current time in milliseconds
    fn now_ms(&self) -> f64;
}

/// The host's frame scheduling facility
///
/// Implementations must invoke each callback at most once, with timestamps
/// that never decrease between calls.
pub trait FrameScheduler: Clock {
    /// Run `callback` on the next frame
    fn request_tick(&self, callback: TickCallback) -> TickId;

    /// Run `callback` once at least `delay_ms` have elapsed
    fn request_timeout(&self, delay_ms: f64, callback: TickCallback) -> TickId;

    /// Cancel a pending tick or timeout
    ///
    /// Returns `false` if the callback already ran or was already cancelled.
    fn cancel(&self, id: TickId) -> bool;

    /// Check whether a tick or timeout is still waiting to run
    fn is_pending(&self, id: TickId) -> bool;
}
