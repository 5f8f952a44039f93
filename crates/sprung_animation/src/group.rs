//! Keyed groups of springs
//!
//! A [`ValueGroup`] animates a record of named scalars (`x`, `y`, `scale`,
//! `opacity`, ...) with one independent [`SpringValue`] per key. All members
//! share one physical configuration. Each member schedules its own ticks, so
//! a snapshot read mid-animation is consistent at read time only: two keys
//! may have been sampled on slightly different frames.

use crate::error::{Result, SpringError};
use crate::spring::SpringConfig;
use crate::value::{SpringObserver, SpringValue};
use indexmap::IndexMap;
use smallvec::SmallVec;
use sprung_core::SharedScheduler;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// A record of named values, in construction order
pub type ValueRecord = IndexMap<String, f64>;

/// Handle to a group change listener
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(&ValueRecord)>;

/// State shared between a group and the observers it installs on its members
struct GroupShared {
    record: RefCell<ValueRecord>,
    settled: Cell<usize>,
    listeners: RefCell<SmallVec<[(ListenerId, Listener); 2]>>,
    next_listener: Cell<u64>,
}

/// Mirrors one member's samples into the group record
struct MemberObserver {
    index: usize,
    shared: Weak<GroupShared>,
}

impl SpringObserver for MemberObserver {
    fn on_sample(&self, value: f64) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let snapshot = {
            let mut record = shared.record.borrow_mut();
            if let Some((_, slot)) = record.get_index_mut(self.index) {
                *slot = value;
            }
            record.clone()
        };
        let listeners = shared.listeners.borrow().clone();
        for (_, listener) in &listeners {
            listener(&snapshot);
        }
    }

    fn on_settle(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.settled.set(shared.settled.get() + 1);
        }
    }
}

/// A fixed set of named springs sharing one configuration
pub struct ValueGroup {
    springs: IndexMap<String, SpringValue>,
    shared: Rc<GroupShared>,
}

impl ValueGroup {
    /// Build one spring per key, each resting at its initial value
    ///
    /// Keys are fixed for the lifetime of the group. A repeated key keeps its
    /// first position and its last value.
    pub fn new<K, I>(scheduler: SharedScheduler, initial: I, config: SpringConfig) -> Result<Self>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, f64)>,
    {
        config.validate()?;
        let record: ValueRecord = initial.into_iter().map(|(k, v)| (k.into(), v)).collect();

        let shared = Rc::new(GroupShared {
            record: RefCell::new(record.clone()),
            settled: Cell::new(0),
            listeners: RefCell::new(SmallVec::new()),
            next_listener: Cell::new(0),
        });

        let mut springs = IndexMap::with_capacity(record.len());
        for (index, (key, value)) in record.into_iter().enumerate() {
            let spring = SpringValue::new(scheduler.clone(), value, config)?;
            spring.subscribe(Rc::new(MemberObserver {
                index,
                shared: Rc::downgrade(&shared),
            }));
            springs.insert(key, spring);
        }

        Ok(Self { springs, shared })
    }

    /// Animate the named keys toward new targets; other keys are untouched
    ///
    /// Every key is checked before any spring moves, so an error leaves the
    /// whole group as it was.
    pub fn set_all<K, I>(&self, targets: I) -> Result<()>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, f64)>,
    {
        let targets = self.resolve(targets)?;
        self.shared.settled.set(0);
        for (spring, to) in targets {
            spring.set(to)?;
        }
        Ok(())
    }

    /// Snap the named keys to new values; other keys are untouched
    pub fn hard_set_all<K, I>(&self, targets: I) -> Result<()>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, f64)>,
    {
        let targets = self.resolve(targets)?;
        self.shared.settled.set(0);
        for (spring, value) in targets {
            spring.hard_set(value)?;
        }
        Ok(())
    }

    /// Check a batch of targets without applying it
    pub fn validate_targets<K, I>(&self, targets: I) -> Result<()>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, f64)>,
    {
        self.resolve(targets).map(|_| ())
    }

    fn resolve<K, I>(&self, targets: I) -> Result<SmallVec<[(&SpringValue, f64); 4]>>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, f64)>,
    {
        targets
            .into_iter()
            .map(|(key, to)| {
                let key = key.as_ref();
                let spring = self
                    .springs
                    .get(key)
                    .ok_or_else(|| SpringError::UnknownKey(key.to_string()))?;
                if !to.is_finite() {
                    return Err(SpringError::NonFiniteTarget(to));
                }
                Ok((spring, to))
            })
            .collect()
    }

    /// Live values of every key, read now
    pub fn values(&self) -> ValueRecord {
        self.springs
            .iter()
            .map(|(key, spring)| (key.clone(), spring.value()))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.springs.get(key).map(SpringValue::value)
    }

    pub fn spring(&self, key: &str) -> Option<&SpringValue> {
        self.springs.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.springs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.springs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.springs.is_empty()
    }

    /// Check if any member is still moving
    pub fn is_animating(&self) -> bool {
        self.springs.values().any(SpringValue::is_animating)
    }

    /// Members that settled since the last batch retarget
    pub fn settled_count(&self) -> usize {
        self.shared.settled.get()
    }

    /// Call `listener` with a fresh record after every member sample
    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ValueRecord) + 'static,
    {
        let id = ListenerId(self.shared.next_listener.get());
        self.shared.next_listener.set(id.0 + 1);
        self.shared
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));
        id
    }

    /// Remove a change listener, returning whether it was registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.shared.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}
