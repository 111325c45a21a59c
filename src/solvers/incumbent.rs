//! Incumbent
//!
//! The best plan found so far, shared by all search workers. The cost is mirrored in an atomic
//! so workers can prune without taking the lock; that read may be stale, which only costs
//! extra work. Installation always re-checks under the lock.

use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicI64, Ordering},
};

use crate::{pricing::Cost, solvers::Candidate};

/// Shared best-so-far register.
#[derive(Debug)]
pub struct SharedIncumbent {
    upper_bound: AtomicI64,
    candidate: Mutex<Option<Candidate>>,
}

impl Default for SharedIncumbent {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SharedIncumbent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Incumbent(upper_bound: {})", self.upper_bound())
    }
}

impl SharedIncumbent {
    /// Create an empty incumbent.
    pub fn new() -> Self {
        Self {
            upper_bound: AtomicI64::new(Cost::MAX),
            candidate: Mutex::new(None),
        }
    }

    /// Create an incumbent seeded with `candidate`, if any.
    pub fn seeded(candidate: Option<Candidate>) -> Self {
        let incumbent = Self::new();

        if let Some(candidate) = candidate {
            incumbent.try_install(candidate);
        }

        incumbent
    }

    /// Cost of the current incumbent, or `Cost::MAX` if there is none. May be stale.
    pub fn upper_bound(&self) -> Cost {
        self.upper_bound.load(Ordering::Relaxed)
    }

    /// Copy of the current incumbent.
    pub fn snapshot(&self) -> Option<Candidate> {
        self.candidate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install `candidate` if it ranks ahead of the current incumbent.
    ///
    /// Returns `true` if the candidate was installed.
    pub fn try_install(&self, candidate: Candidate) -> bool {
        // Equal cost can still win on vendor count or shipping.
        if candidate.cost() > self.upper_bound() {
            return false;
        }

        let mut guard = self
            .candidate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(current) = guard.as_ref()
            && !candidate.is_better_than(current)
        {
            return false;
        }

        self.upper_bound.store(candidate.cost(), Ordering::Relaxed);
        *guard = Some(candidate);

        true
    }

    /// Take the final incumbent.
    pub fn into_inner(self) -> Option<Candidate> {
        self.candidate
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
