//! Sprung Animation System
//!
//! Closed-form spring physics for values that can be redirected mid-flight.
//!
//! # Features
//!
//! - **Spring Solver**: analytic damped-oscillator solution (under-, critically
//!   and overdamped), exact for any time step
//! - **Spring Values**: self-scheduling animated scalars with observers
//! - **Interruptible**: retargets inherit the current value and velocity
//! - **Rest Detection**: velocity/displacement thresholds and overshoot clamping
//! - **Value Groups**: records of named springs animated together
//! - **Trails**: staggered cascades of value groups
//! - **Spring Presets**: common physical configurations
//!
//! Everything is single-threaded and driven by a host
//! [`FrameScheduler`](sprung_core::FrameScheduler).

pub mod error;
pub mod group;
pub mod solver;
pub mod spring;
pub mod trail;
pub mod value;

pub use error::{Result, SpringError};
pub use group::{ListenerId, ValueGroup, ValueRecord};
pub use solver::{solve, Sample, Segment};
pub use spring::{Regime, SpringConfig};
pub use trail::{Trail, TrailConfig};
pub use value::{SpringObserver, SpringValue, Subscription, SubscriptionId, MAX_DELTA_MS};
