//! Animated scalar values
//!
//! A [`SpringValue`] owns one spring's runtime state and drives itself with
//! host frame ticks. Every retarget starts a new trajectory segment from the
//! *current* value and velocity, so interrupted animations continue without
//! a jump.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use sprung_animation::{SpringConfig, SpringValue};
//! use sprung_core::ManualFrameLoop;
//!
//! let frames = Rc::new(ManualFrameLoop::new());
//! let opacity = SpringValue::new(frames.clone(), 0.0, SpringConfig::stiff()).unwrap();
//!
//! opacity.set(1.0).unwrap();
//! frames.run_until_idle(1000);
//!
//! assert_eq!(opacity.value(), 1.0);
//! assert!(!opacity.is_animating());
//! ```

use crate::error::{Result, SpringError};
use crate::solver::{solve, Segment};
use crate::spring::SpringConfig;
use smallvec::SmallVec;
use sprung_core::{Clock, SharedScheduler, TickId, NOMINAL_FRAME_MS};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Largest time step a single tick may advance spring time by
///
/// After a frame stall the spring resumes as if at most four frames had
/// passed. The solver is closed-form and would stay exact for any step; the
/// cap only bounds how far a value can visibly jump in one frame.
pub const MAX_DELTA_MS: f64 = 4.0 * NOMINAL_FRAME_MS;

/// Receives samples from a [`SpringValue`]
pub trait SpringObserver {
    /// Called on every tick and once per hard set
    fn on_sample(&self, value: f64);

    /// Called once when an animation comes to rest or overshoots a clamped target
    fn on_settle(&self) {}
}

/// Adapter so plain closures can observe samples
struct SampleFn<F>(F);

impl<F: Fn(f64)> SpringObserver for SampleFn<F> {
    fn on_sample(&self, value: f64) {
        (self.0)(value)
    }
}

/// Identity of one observer registration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ObserverList = SmallVec<[(SubscriptionId, Rc<dyn SpringObserver>); 4]>;

/// Runtime state, owned exclusively by one `SpringValue`
struct SpringState {
    config: SpringConfig,
    segment: Segment,
    value: f64,
    velocity: f64,
    /// Time since the current segment began (ms)
    spring_time: f64,
    last_tick_ms: f64,
    animating: bool,
    pending: Option<TickId>,
    /// Bumped on every state reset; ticks carrying an older value are stale
    generation: u64,
    observers: ObserverList,
    next_subscription: u64,
}

impl SpringState {
    fn is_overshooting(&self) -> bool {
        let Segment { from, to, .. } = self.segment;
        if !self.config.clamp || self.config.stiffness == 0.0 {
            return false;
        }
        if from < to {
            self.value > to
        } else {
            self.value < to
        }
    }

    /// Velocity alone decides rest for a zero-stiffness spring
    fn is_at_rest(&self) -> bool {
        let still = self.velocity.abs() <= self.config.rest_velocity_threshold;
        let arrived = self.config.stiffness == 0.0
            || (self.segment.to - self.value).abs() <= self.config.rest_displacement_threshold;
        still && arrived
    }
}

/// A single spring-animated scalar
///
/// Not `Clone`: the value and its scheduled tick live and die together.
/// Dropping a `SpringValue` cancels any pending tick.
pub struct SpringValue {
    state: Rc<RefCell<SpringState>>,
    scheduler: SharedScheduler,
}

impl SpringValue {
    /// Create an idle value resting at `initial`
    pub fn new(scheduler: SharedScheduler, initial: f64, config: SpringConfig) -> Result<Self> {
        Self::with_velocity(scheduler, initial, 0.0, config)
    }

    /// Create an idle value that will launch with `velocity` (units/ms) on its first `set`
    pub fn with_velocity(
        scheduler: SharedScheduler,
        initial: f64,
        velocity: f64,
        config: SpringConfig,
    ) -> Result<Self> {
        config.validate()?;
        if !initial.is_finite() {
            return Err(SpringError::NonFiniteTarget(initial));
        }
        if !velocity.is_finite() {
            return Err(SpringError::InvalidParameter {
                name: "velocity",
                value: velocity,
            });
        }

        let now = scheduler.now_ms();
        Ok(Self {
            state: Rc::new(RefCell::new(SpringState {
                config,
                segment: Segment::new(initial, initial, velocity),
                value: initial,
                velocity,
                spring_time: 0.0,
                last_tick_ms: now,
                animating: false,
                pending: None,
                generation: 0,
                observers: SmallVec::new(),
                next_subscription: 0,
            })),
            scheduler,
        })
    }

    /// Begin or redirect an animation toward `to`
    ///
    /// The new segment starts from the current value and velocity. A value
    /// already resting at `to` stays idle and schedules nothing.
    pub fn set(&self, to: f64) -> Result<()> {
        if !to.is_finite() {
            return Err(SpringError::NonFiniteTarget(to));
        }

        let now = self.scheduler.now_ms();
        let mut state = self.state.borrow_mut();
        self.cancel_pending(&mut state);

        state.segment = Segment::new(state.value, to, state.velocity);
        state.spring_time = 0.0;
        state.last_tick_ms = now;

        if state.segment.is_stationary() {
            state.animating = false;
            return Ok(());
        }

        tracing::debug!(
            "SpringValue: retarget {:.4} -> {:.4} (velocity {:.5})",
            state.segment.from,
            to,
            state.velocity
        );
        state.animating = true;
        let generation = state.generation;
        state.pending = Some(request_tick(&self.state, &self.scheduler, generation));
        Ok(())
    }

    /// Snap to `value` immediately
    ///
    /// Stops any animation, zeroes velocity, and notifies observers once
    /// with the forced value. Observers are never told to settle.
    pub fn hard_set(&self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(SpringError::NonFiniteTarget(value));
        }

        let now = self.scheduler.now_ms();
        let observers = {
            let mut state = self.state.borrow_mut();
            self.cancel_pending(&mut state);

            state.segment = Segment::at_rest(value);
            state.value = value;
            state.velocity = 0.0;
            state.spring_time = 0.0;
            state.last_tick_ms = now;
            state.animating = false;
            state.observers.clone()
        };

        tracing::debug!("SpringValue: hard set to {:.4}", value);
        for (_, observer) in &observers {
            observer.on_sample(value);
        }
        Ok(())
    }

    /// Halt the animation where it stands, without snapping or notifying
    pub fn stop(&self) {
        let mut state = self.state.borrow_mut();
        if !state.animating {
            return;
        }
        self.cancel_pending(&mut state);
        state.animating = false;
        tracing::debug!("SpringValue: stopped at {:.4}", state.value);
    }

    /// Register an observer; notification order is registration order
    pub fn subscribe(&self, observer: Rc<dyn SpringObserver>) -> Subscription {
        let mut state = self.state.borrow_mut();
        let id = SubscriptionId(state.next_subscription);
        state.next_subscription += 1;
        state.observers.push((id, observer));

        Subscription {
            state: Rc::downgrade(&self.state),
            id,
        }
    }

    /// Register a closure that receives every sample
    pub fn on_sample<F>(&self, callback: F) -> Subscription
    where
        F: Fn(f64) + 'static,
    {
        self.subscribe(Rc::new(SampleFn(callback)))
    }

    /// Current sample, valid at any time
    pub fn value(&self) -> f64 {
        self.state.borrow().value
    }

    /// Current velocity in units per millisecond
    pub fn velocity(&self) -> f64 {
        self.state.borrow().velocity
    }

    /// End point of the current segment
    pub fn target(&self) -> f64 {
        self.state.borrow().segment.to
    }

    pub fn is_animating(&self) -> bool {
        self.state.borrow().animating
    }

    /// Time elapsed in the current segment (ms)
    pub fn spring_time(&self) -> f64 {
        self.state.borrow().spring_time
    }

    pub fn config(&self) -> SpringConfig {
        self.state.borrow().config
    }

    pub fn observer_count(&self) -> usize {
        self.state.borrow().observers.len()
    }

    /// Invalidate any scheduled tick
    fn cancel_pending(&self, state: &mut SpringState) {
        state.generation = state.generation.wrapping_add(1);
        if let Some(id) = state.pending.take() {
            self.scheduler.cancel(id);
            tracing::trace!("SpringValue: cancelled pending tick {}", id.to_raw());
        }
    }
}

impl Drop for SpringValue {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            if let Some(id) = state.pending.take() {
                self.scheduler.cancel(id);
            }
        }
    }
}

impl fmt::Debug for SpringValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SpringValue")
            .field("value", &state.value)
            .field("velocity", &state.velocity)
            .field("target", &state.segment.to)
            .field("animating", &state.animating)
            .finish()
    }
}

/// Ask the host for the next frame on behalf of `state`
///
/// The callback holds only weak references, so a dropped value or scheduler
/// turns it into a no-op.
fn request_tick(
    state: &Rc<RefCell<SpringState>>,
    scheduler: &SharedScheduler,
    generation: u64,
) -> TickId {
    let weak_state = Rc::downgrade(state);
    let weak_scheduler = Rc::downgrade(scheduler);
    scheduler.request_tick(Box::new(move |now| {
        if let (Some(state), Some(scheduler)) = (weak_state.upgrade(), weak_scheduler.upgrade()) {
            tick(&state, &scheduler, generation, now);
        }
    }))
}

/// Advance one frame, then notify observers outside the state borrow
fn tick(state: &Rc<RefCell<SpringState>>, scheduler: &SharedScheduler, generation: u64, now: f64) {
    let (observers, value, settled) = {
        let mut s = state.borrow_mut();
        if s.generation != generation || !s.animating {
            tracing::trace!("SpringValue: ignoring stale tick");
            return;
        }
        s.pending = None;

        let delta = (now - s.last_tick_ms).clamp(0.0, MAX_DELTA_MS);
        s.last_tick_ms = now;
        s.spring_time += delta;

        let sample = solve(&s.config, &s.segment, s.spring_time);
        s.value = sample.value;
        s.velocity = sample.velocity;
        tracing::trace!(
            "SpringValue: t={:.2}ms value={:.5} velocity={:.6}",
            s.spring_time,
            s.value,
            s.velocity
        );

        let settled = s.is_overshooting() || s.is_at_rest();
        if settled {
            if s.config.stiffness != 0.0 {
                s.value = s.segment.to;
                s.velocity = 0.0;
            }
            s.animating = false;
            tracing::debug!(
                "SpringValue: settled at {:.4} after {:.1}ms",
                s.value,
                s.spring_time
            );
        } else {
            s.pending = Some(request_tick(state, scheduler, generation));
        }
        (s.observers.clone(), s.value, settled)
    };

    for (_, observer) in &observers {
        observer.on_sample(value);
    }
    if settled {
        for (_, observer) in &observers {
            observer.on_settle();
        }
    }
}

/// Capability to remove one observer from a [`SpringValue`]
///
/// Dropping it keeps the observer registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
#[derive(Clone)]
pub struct Subscription {
    state: Weak<RefCell<SpringState>>,
    id: SubscriptionId,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the observer; safe to call any number of times
    pub fn unsubscribe(&self) {
        if let Some(state) = self.state.upgrade() {
            state
                .borrow_mut()
                .observers
                .retain(|(id, _)| *id != self.id);
        }
    }
}
