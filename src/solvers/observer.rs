//! Search Observer

use crate::{pricing::Cost, solvers::Candidate};

/// Observer trait for following the branch-and-bound search as it runs.
///
/// Callbacks may arrive from several worker threads at once, so implementations take `&self`
/// and must be `Send + Sync`. Every callback defaults to doing nothing.
pub trait SearchObserver: Send + Sync {
    /// Called before subsets of size `size` are enumerated.
    fn on_level_start(&self, _size: usize) {}

    /// Called once every subset of size `size` has been handled, with the incumbent cost.
    fn on_level_finish(&self, _size: usize, _incumbent: Option<Cost>) {}

    /// Called when a subset leaves a component uncovered.
    ///
    /// `subset` holds vendor search indices in ascending order.
    fn on_coverage_pruned(&self, _subset: &[usize]) {}

    /// Called when a subset's lower bound cannot beat the incumbent.
    fn on_bound_pruned(&self, _subset: &[usize], _lower_bound: Cost, _incumbent: Cost) {}

    /// Called after the assignment strategy ran on a subset.
    fn on_evaluated(&self, _subset: &[usize], _candidate: Option<&Candidate>) {}

    /// Called when a candidate replaces the incumbent.
    fn on_improvement(&self, _candidate: &Candidate) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SearchObserver for NoopObserver {}
