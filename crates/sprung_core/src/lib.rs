//! Sprung Core Runtime
//!
//! Host-facing primitives that the spring animation engine is driven by:
//!
//! - **Clock**: a monotonically non-decreasing millisecond timestamp source
//! - **Frame Scheduling**: "request next tick" and deferred-invocation callbacks
//! - **Manual Frame Loop**: a deterministic single-threaded host for tests,
//!   headless tools, and demos
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use sprung_core::{FrameScheduler, ManualFrameLoop};
//!
//! let frames = ManualFrameLoop::new();
//! let fired = Rc::new(Cell::new(0.0));
//!
//! let seen = Rc::clone(&fired);
//! frames.request_tick(Box::new(move |now| seen.set(now)));
//!
//! frames.advance(16.0);
//! assert_eq!(fired.get(), 16.0);
//! ```

pub mod frame;
pub mod manual;

pub use frame::{Clock, FrameScheduler, SharedScheduler, TickCallback, TickId, NOMINAL_FRAME_MS};
pub use manual::ManualFrameLoop;
