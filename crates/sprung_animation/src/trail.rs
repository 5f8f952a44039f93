//! Staggered trails
//!
//! A [`Trail`] is a fixed number of identically configured [`ValueGroup`]s
//! ("slots"). Retargeting the trail starts slot `i` after `i × stagger_ms`,
//! producing a cascade. Delays go through the host's
//! [`FrameScheduler::request_timeout`](sprung_core::FrameScheduler::request_timeout),
//! so simulated clocks control them exactly.

use crate::error::{Result, SpringError};
use crate::group::{ValueGroup, ValueRecord};
use crate::spring::SpringConfig;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use sprung_core::{SharedScheduler, TickId};
use std::cell::RefCell;
use std::rc::Rc;

/// Configuration for a staggered trail
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailConfig {
    /// Number of slots, fixed at construction
    pub slots: usize,
    /// Delay between consecutive slots (ms)
    pub stagger_ms: f64,
    /// Physics shared by every spring in every slot
    pub spring: SpringConfig,
}

impl TrailConfig {
    pub fn new(slots: usize, stagger_ms: f64) -> Self {
        Self {
            slots,
            stagger_ms,
            ..Self::default()
        }
    }

    pub fn with_spring(mut self, spring: SpringConfig) -> Self {
        self.spring = spring;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.stagger_ms.is_finite() || self.stagger_ms < 0.0 {
            return Err(SpringError::InvalidParameter {
                name: "stagger_ms",
                value: self.stagger_ms,
            });
        }
        self.spring.validate()
    }
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            slots: 1,
            stagger_ms: 50.0,
            spring: SpringConfig::default(),
        }
    }
}

/// A fixed-size cascade of value groups
///
/// Dropping a trail cancels any staggered start that has not fired yet.
pub struct Trail {
    slots: Vec<Rc<ValueGroup>>,
    /// Keys every slot was built with, checked even when there are no slots
    keys: IndexSet<String>,
    scheduler: SharedScheduler,
    stagger_ms: f64,
    /// Staggered starts that may still be waiting on the scheduler
    pending: RefCell<Vec<TickId>>,
}

impl Trail {
    /// Build `config.slots` groups, all starting from the same record
    pub fn new<K, I>(scheduler: SharedScheduler, initial: I, config: TrailConfig) -> Result<Self>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, f64)>,
    {
        config.validate()?;
        let initial: Vec<(String, f64)> = initial.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let keys = initial.iter().map(|(key, _)| key.clone()).collect();

        let slots = (0..config.slots)
            .map(|_| {
                ValueGroup::new(scheduler.clone(), initial.iter().cloned(), config.spring)
                    .map(Rc::new)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            slots,
            keys,
            scheduler,
            stagger_ms: config.stagger_ms,
            pending: RefCell::new(Vec::new()),
        })
    }

    /// Retarget every slot, slot `i` starting `i × stagger_ms` after slot 0
    ///
    /// Slot 0 retargets synchronously. Targets are validated up front, so an
    /// error schedules nothing.
    pub fn set<K, I>(&self, targets: I) -> Result<()>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, f64)>,
    {
        let targets: Vec<(String, f64)> = targets
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v))
            .collect();
        self.validate_targets(&targets)?;

        let mut pending = self.pending.borrow_mut();
        pending.retain(|id| self.scheduler.is_pending(*id));

        for (index, slot) in self.slots.iter().enumerate() {
            let delay = index as f64 * self.stagger_ms;
            if delay <= 0.0 {
                slot.set_all(pairs(&targets))?;
                continue;
            }

            let weak_slot = Rc::downgrade(slot);
            let targets = targets.clone();
            let id = self.scheduler.request_timeout(
                delay,
                Box::new(move |_| {
                    if let Some(slot) = weak_slot.upgrade() {
                        if let Err(err) = slot.set_all(pairs(&targets)) {
                            tracing::warn!("Trail: staggered start for slot {} failed: {}", index, err);
                        }
                    }
                }),
            );
            pending.push(id);
        }

        tracing::debug!(
            "Trail: staggered set across {} slots ({}ms apart)",
            self.slots.len(),
            self.stagger_ms
        );
        Ok(())
    }

    /// Snap every slot at once, dropping staggered starts still in flight
    pub fn hard_set<K, I>(&self, targets: I) -> Result<()>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, f64)>,
    {
        let targets: Vec<(String, f64)> = targets
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v))
            .collect();
        self.validate_targets(&targets)?;

        let cancelled = self.cancel_pending();
        if cancelled > 0 {
            tracing::debug!("Trail: hard set cancelled {} staggered starts", cancelled);
        }

        for slot in &self.slots {
            slot.hard_set_all(pairs(&targets))?;
        }
        Ok(())
    }

    /// One record per slot, in slot order
    pub fn values(&self) -> Vec<ValueRecord> {
        self.slots.iter().map(|slot| slot.values()).collect()
    }

    pub fn slot(&self, index: usize) -> Option<&ValueGroup> {
        self.slots.get(index).map(Rc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn stagger_ms(&self) -> f64 {
        self.stagger_ms
    }

    /// Check if any slot is still moving
    pub fn is_animating(&self) -> bool {
        self.slots.iter().any(|slot| slot.is_animating())
    }

    /// Check if any staggered start has not fired yet
    pub fn has_pending_starts(&self) -> bool {
        self.pending
            .borrow()
            .iter()
            .any(|id| self.scheduler.is_pending(*id))
    }

    fn validate_targets(&self, targets: &[(String, f64)]) -> Result<()> {
        for (key, to) in targets {
            if !self.keys.contains(key) {
                return Err(SpringError::UnknownKey(key.clone()));
            }
            if !to.is_finite() {
                return Err(SpringError::NonFiniteTarget(*to));
            }
        }
        Ok(())
    }

    fn cancel_pending(&self) -> usize {
        self.pending
            .borrow_mut()
            .drain(..)
            .filter(|id| self.scheduler.cancel(*id))
            .count()
    }
}

impl Drop for Trail {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

fn pairs(targets: &[(String, f64)]) -> impl Iterator<Item = (&str, f64)> {
    targets.iter().map(|(key, value)| (key.as_str(), *value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprung_core::{Clock, ManualFrameLoop};

    fn trail(frames: &Rc<ManualFrameLoop>, slots: usize) -> Trail {
        Trail::new(
            frames.clone(),
            [("x", 0.0), ("scale", 1.0)],
            TrailConfig::new(slots, 50.0).with_spring(SpringConfig::stiff()),
        )
        .unwrap()
    }

    #[test]
    fn test_slots_share_initial_record() {
        let frames = Rc::new(ManualFrameLoop::new());
        let trail = trail(&frames, 7);

        assert_eq!(trail.len(), 7);
        for record in trail.values() {
            assert_eq!(record["x"], 0.0);
            assert_eq!(record["scale"], 1.0);
        }
    }

    #[test]
    fn test_slots_start_staggered() {
        let frames = Rc::new(ManualFrameLoop::new());
        let trail = trail(&frames, 7);
        frames.advance(100.0);

        let start = frames.now_ms();
        trail.set([("x", 100.0)]).unwrap();
        assert!(trail.slot(0).unwrap().is_animating());
        assert!(trail.has_pending_starts());

        for _ in 0..30 {
            frames.step_frame();
            for index in 0..trail.len() {
                let due = start + index as f64 * 50.0;
                let slot = trail.slot(index).unwrap();
                if frames.now_ms() < due {
                    assert!(!slot.is_animating(), "slot {index} started early");
                    assert_eq!(slot.get("x"), Some(0.0));
                }
            }
        }

        assert!(!trail.has_pending_starts());
        frames.run_until_idle(10_000);
        for record in trail.values() {
            assert_eq!(record["x"], 100.0);
            assert_eq!(record["scale"], 1.0);
        }
    }

    #[test]
    fn test_later_slots_lag_behind() {
        let frames = Rc::new(ManualFrameLoop::new());
        let trail = trail(&frames, 4);
        trail.set([("x", 100.0)]).unwrap();

        for _ in 0..12 {
            frames.step_frame();
        }

        let xs: Vec<f64> = trail.values().iter().map(|r| r["x"]).collect();
        assert!(xs.windows(2).all(|w| w[0] > w[1]), "{xs:?}");
    }

    #[test]
    fn test_hard_set_snaps_every_slot_and_drops_pending_starts() {
        let frames = Rc::new(ManualFrameLoop::new());
        let trail = trail(&frames, 7);
        trail.set([("x", 100.0)]).unwrap();

        // Slots 0..=2 have started, 3..=6 are still waiting
        for _ in 0..7 {
            frames.step_frame();
        }
        assert!(trail.has_pending_starts());

        trail.hard_set([("x", 0.0)]).unwrap();
        assert!(!trail.has_pending_starts());
        assert!(!trail.is_animating());
        assert!(!frames.has_pending());

        frames.advance(1000.0);
        for record in trail.values() {
            assert_eq!(record["x"], 0.0);
        }
    }

    #[test]
    fn test_unknown_key_schedules_nothing() {
        let frames = Rc::new(ManualFrameLoop::new());
        let trail = trail(&frames, 3);

        let err = trail.set([("rotation", 1.0)]).unwrap_err();
        assert_eq!(err, SpringError::UnknownKey("rotation".to_string()));
        assert!(!frames.has_pending());
        assert!(trail.hard_set([("x", f64::NAN)]).is_err());
    }

    #[test]
    fn test_empty_trail_still_checks_keys() {
        let frames = Rc::new(ManualFrameLoop::new());
        let trail = trail(&frames, 0);
        assert!(trail.is_empty());

        assert_eq!(
            trail.set([("rotation", 1.0)]),
            Err(SpringError::UnknownKey("rotation".to_string()))
        );
        assert_eq!(
            trail.hard_set([("opacity", 0.0)]),
            Err(SpringError::UnknownKey("opacity".to_string()))
        );
        assert!(trail.set([("x", f64::INFINITY)]).is_err());

        trail.set([("x", 10.0)]).unwrap();
        trail.hard_set([("scale", 2.0)]).unwrap();
        assert!(trail.values().is_empty());
        assert!(!frames.has_pending());
    }

    #[test]
    fn test_drop_cancels_pending_starts() {
        let frames = Rc::new(ManualFrameLoop::new());
        let trail = trail(&frames, 5);
        trail.set([("x", 10.0)]).unwrap();
        assert_eq!(frames.pending_timeouts(), 4);

        drop(trail);
        assert!(!frames.has_pending());
    }

    #[test]
    fn test_zero_stagger_starts_all_slots_together() {
        let frames = Rc::new(ManualFrameLoop::new());
        let trail = Trail::new(frames.clone(), [("x", 0.0)], TrailConfig::new(3, 0.0)).unwrap();

        trail.set([("x", 1.0)]).unwrap();
        assert_eq!(frames.pending_timeouts(), 0);
        assert!((0..3).all(|i| trail.slot(i).unwrap().is_animating()));
    }

    #[test]
    fn test_invalid_trail_config() {
        let frames = Rc::new(ManualFrameLoop::new());
        let result = Trail::new(frames.clone(), [("x", 0.0)], TrailConfig::new(3, -5.0));
        assert!(matches!(
            result,
            Err(SpringError::InvalidParameter {
                name: "stagger_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_trail_config_from_toml() {
        let config: TrailConfig = toml::from_str(
            r#"
            slots = 7

            [spring]
            stiffness = 180.0
            damping = 12.0
            "#,
        )
        .unwrap();

        assert_eq!(config.slots, 7);
        assert_eq!(config.stagger_ms, 50.0);
        assert_eq!(config.spring.stiffness, 180.0);
        assert_eq!(config.spring.mass, 1.0);
        assert!(config.validate().is_ok());
    }
}
