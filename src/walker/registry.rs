//! Traversal unit registry and completion detection
//!
//! Every unit ever spawned is appended to the registry and never removed;
//! units only move forward through Spawned → Running → Finished. A unit
//! registers its children while it is still running, so once every
//! registered unit is finished no further registration can happen.
//! [`ConvergenceCheck`] still requires two consecutive polls with an
//! unchanged registry before it declares the walk complete.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Index of a unit in the registry
pub type UnitId = usize;

/// Lifecycle of a traversal unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UnitState {
    /// Registered, waiting for a concurrency slot
    Spawned = 0,
    /// Holding a slot and listing its prefix
    Running = 1,
    /// Done (successfully, failed or cancelled)
    Finished = 2,
}

impl UnitState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => UnitState::Spawned,
            1 => UnitState::Running,
            _ => UnitState::Finished,
        }
    }
}

#[derive(Debug)]
struct UnitEntry {
    prefix: String,
    state: AtomicU8,
}

/// Append-only registry of traversal units
#[derive(Debug, Default)]
pub struct UnitRegistry {
    units: RwLock<Vec<UnitEntry>>,
    finished: AtomicUsize,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit for `prefix`
    pub fn register(&self, prefix: &str) -> UnitId {
        let mut units = self.units.write();
        units.push(UnitEntry {
            prefix: prefix.to_string(),
            state: AtomicU8::new(UnitState::Spawned as u8),
        });
        units.len() - 1
    }

    /// Mark a unit as holding a concurrency slot
    pub fn mark_running(&self, id: UnitId) {
        if let Some(unit) = self.units.read().get(id) {
            let _ = unit.state.compare_exchange(
                UnitState::Spawned as u8,
                UnitState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
        }
    }

    /// Mark a unit as finished; repeated calls are ignored
    pub fn mark_finished(&self, id: UnitId) {
        if let Some(unit) = self.units.read().get(id) {
            let previous = unit.state.swap(UnitState::Finished as u8, Ordering::SeqCst);
            if previous != UnitState::Finished as u8 {
                self.finished.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// State of one unit
    pub fn state(&self, id: UnitId) -> Option<UnitState> {
        self.units
            .read()
            .get(id)
            .map(|unit| UnitState::from_u8(unit.state.load(Ordering::SeqCst)))
    }

    /// Units ever registered
    pub fn registered(&self) -> usize {
        self.units.read().len()
    }

    /// Units finished
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Units currently holding a concurrency slot
    pub fn running(&self) -> usize {
        self.units
            .read()
            .iter()
            .filter(|unit| unit.state.load(Ordering::SeqCst) == UnitState::Running as u8)
            .count()
    }

    /// Up to `limit` prefixes of units that are not finished yet
    pub fn unfinished_prefixes(&self, limit: usize) -> Vec<String> {
        self.units
            .read()
            .iter()
            .filter(|unit| unit.state.load(Ordering::SeqCst) != UnitState::Finished as u8)
            .take(limit)
            .map(|unit| unit.prefix.clone())
            .collect()
    }

    /// Registered count if every registered unit is finished
    ///
    /// `finished` is read before `registered`: a child is registered before
    /// its parent finishes, so equal counts mean nothing was left running.
    pub fn settled_count(&self) -> Option<usize> {
        let finished = self.finished();
        let registered = self.registered();
        (registered > 0 && finished == registered).then_some(registered)
    }
}

/// Fixed-point completion check over successive polls
#[derive(Debug, Default)]
pub struct ConvergenceCheck {
    last_settled: Option<usize>,
}

impl ConvergenceCheck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Poll the registry; true once two consecutive polls saw the same
    /// fully-finished registry
    pub fn observe(&mut self, registry: &UnitRegistry) -> bool {
        let settled = registry.settled_count();
        let converged = settled.is_some() && settled == self.last_settled;
        self.last_settled = settled;
        converged
    }
}
