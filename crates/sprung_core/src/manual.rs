//! Deterministic frame loop
//!
//! `ManualFrameLoop` is a [`FrameScheduler`] whose clock only moves when the
//! caller says so. Tests use it to simulate frame stalls and stagger delays
//! exactly; headless tools use it to render an animation to samples without
//! a window.

use crate::frame::{Clock, FrameScheduler, TickCallback, TickId, NOMINAL_FRAME_MS};
use slotmap::SlotMap;
use smallvec::SmallVec;
use std::cell::RefCell;

/// A scheduled callback waiting to run
enum Pending {
    /// Runs on the next frame
    Frame(TickCallback),
    /// Runs once the clock reaches `due_ms`
    Timeout { due_ms: f64, callback: TickCallback },
}

impl Pending {
    fn into_callback(self) -> TickCallback {
        match self {
            Pending::Frame(callback) => callback,
            Pending::Timeout { callback, .. } => callback,
        }
    }
}

struct LoopInner {
    now_ms: f64,
    frame_interval_ms: f64,
    pending: SlotMap<TickId, Pending>,
    /// Insertion order of everything in `pending` (may contain stale ids)
    order: Vec<TickId>,
}

/// A single-threaded frame scheduler driven by explicit clock advances
///
/// # Ordering
///
/// On every [`advance`](Self::advance):
/// 1. the clock moves forward,
/// 2. timeouts that are now due run, earliest due time first,
/// 3. every frame callback that was pending when the frame began runs, in
///    request order.
///
/// Callbacks are removed before they run. A callback cancelled by an earlier
/// callback of the same frame never runs, and callbacks requested while a
/// frame is running wait for the next frame.
pub struct ManualFrameLoop {
    inner: RefCell<LoopInner>,
}

impl ManualFrameLoop {
    /// Create a loop at time zero with a 60 Hz nominal frame interval
    pub fn new() -> Self {
        Self::with_frame_interval(NOMINAL_FRAME_MS)
    }

    /// Create a loop with a custom frame interval used by [`step_frame`](Self::step_frame)
    pub fn with_frame_interval(frame_interval_ms: f64) -> Self {
        Self {
            inner: RefCell::new(LoopInner {
                now_ms: 0.0,
                frame_interval_ms,
                pending: SlotMap::with_key(),
                order: Vec::new(),
            }),
        }
    }

    /// The interval `step_frame` advances by
    pub fn frame_interval_ms(&self) -> f64 {
        self.inner.borrow().frame_interval_ms
    }

    /// Move the clock forward by `dt_ms` and run one frame
    ///
    /// Negative deltas are treated as zero so the clock never runs backwards.
    /// Returns the number of callbacks that ran.
    pub fn advance(&self, dt_ms: f64) -> usize {
        let (now, due_timeouts, frame_ticks) = {
            let mut inner = self.inner.borrow_mut();
            inner.now_ms += dt_ms.max(0.0);
            let now = inner.now_ms;

            let LoopInner { pending, order, .. } = &mut *inner;
            order.retain(|id| pending.contains_key(*id));

            let mut due_timeouts: SmallVec<[(f64, TickId); 8]> = SmallVec::new();
            let mut frame_ticks: SmallVec<[TickId; 16]> = SmallVec::new();
            for &id in order.iter() {
                match pending.get(id) {
                    Some(Pending::Timeout { due_ms, .. }) if *due_ms <= now => {
                        due_timeouts.push((*due_ms, id))
                    }
                    Some(Pending::Frame(_)) => frame_ticks.push(id),
                    _ => {}
                }
            }
            // Stable sort keeps request order among equal due times
            due_timeouts.sort_by(|a, b| a.0.total_cmp(&b.0));

            (now, due_timeouts, frame_ticks)
        };

        let mut ran = 0;
        for id in due_timeouts
            .into_iter()
            .map(|(_, id)| id)
            .chain(frame_ticks)
        {
            let callback = self.inner.borrow_mut().pending.remove(id);
            if let Some(pending) = callback {
                (pending.into_callback())(now);
                ran += 1;
            }
        }

        if ran > 0 {
            tracing::trace!("ManualFrameLoop: frame at {:.3}ms ran {} callbacks", now, ran);
        }
        ran
    }

    /// Advance by one frame interval
    pub fn step_frame(&self) -> usize {
        let interval = self.frame_interval_ms();
        self.advance(interval)
    }

    /// Step frames until nothing is pending or `max_frames` is reached
    ///
    /// Returns the number of frames stepped.
    pub fn run_until_idle(&self, max_frames: usize) -> usize {
        let mut frames = 0;
        while frames < max_frames && self.has_pending() {
            self.step_frame();
            frames += 1;
        }
        if self.has_pending() {
            tracing::debug!(
                "ManualFrameLoop: still busy after {} frames ({} ticks, {} timeouts pending)",
                frames,
                self.pending_ticks(),
                self.pending_timeouts()
            );
        }
        frames
    }

    /// Number of frame callbacks waiting for the next frame
    pub fn pending_ticks(&self) -> usize {
        self.inner
            .borrow()
            .pending
            .values()
            .filter(|p| matches!(p, Pending::Frame(_)))
            .count()
    }

    /// Number of timeouts that have not fired yet
    pub fn pending_timeouts(&self) -> usize {
        self.inner
            .borrow()
            .pending
            .values()
            .filter(|p| matches!(p, Pending::Timeout { .. }))
            .count()
    }

    /// Check if any tick or timeout is still scheduled
    pub fn has_pending(&self) -> bool {
        !self.inner.borrow().pending.is_empty()
    }

    fn insert(&self, pending: Pending) -> TickId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.pending.insert(pending);
        inner.order.push(id);
        id
    }
}

impl Default for ManualFrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualFrameLoop {
    fn now_ms(&self) -> f64 {
        self.inner.borrow().now_ms
    }
}

impl FrameScheduler for ManualFrameLoop {
    fn request_tick(&self, callback: TickCallback) -> TickId {
        self.insert(Pending::Frame(callback))
    }

    fn request_timeout(&self, delay_ms: f64, callback: TickCallback) -> TickId {
        let due_ms = self.now_ms() + delay_ms.max(0.0);
        self.insert(Pending::Timeout { due_ms, callback })
    }

    fn cancel(&self, id: TickId) -> bool {
        self.inner.borrow_mut().pending.remove(id).is_some()
    }

    fn is_pending(&self, id: TickId) -> bool {
        self.inner.borrow().pending.contains_key(id)
    }
}
