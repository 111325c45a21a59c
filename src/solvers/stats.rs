//! Search Statistics

use std::time::Duration;

use crate::pricing::Cost;

/// Counters collected during a planning run.
///
/// Each worker keeps its own copy; copies are merged once the workers finish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStatistics {
    /// Vendor subsets taken from the enumeration
    pub subsets_enumerated: u64,

    /// Subsets skipped because they leave a component uncovered
    pub prunings_coverage: u64,

    /// Subsets skipped because their lower bound cannot beat the incumbent
    pub prunings_bound: u64,

    /// Subsets handed to the assignment strategy
    pub evaluations: u64,

    /// Evaluations that produced no valid plan
    pub assignment_failures: u64,

    /// Incumbent replacements
    pub improvements: u64,

    /// Subset sizes searched to completion
    pub levels_completed: u64,

    /// Lower bound over the unrestricted catalog
    pub global_lower_bound: Cost,

    /// Vendors in the pool before dominance filtering
    pub vendors_before_filter: u64,

    /// Vendors in the pool after dominance filtering
    pub vendors_after_filter: u64,

    /// Wall-clock time of the run
    pub time_total: Duration,
}

impl SearchStatistics {
    #[inline]
    pub(crate) fn on_subset(&mut self) {
        self.subsets_enumerated = self.subsets_enumerated.saturating_add(1);
    }

    #[inline]
    pub(crate) fn on_pruning_coverage(&mut self) {
        self.prunings_coverage = self.prunings_coverage.saturating_add(1);
    }

    #[inline]
    pub(crate) fn on_pruning_bound(&mut self) {
        self.prunings_bound = self.prunings_bound.saturating_add(1);
    }

    #[inline]
    pub(crate) fn on_evaluation(&mut self, produced: bool) {
        self.evaluations = self.evaluations.saturating_add(1);

        if !produced {
            self.assignment_failures = self.assignment_failures.saturating_add(1);
        }
    }

    #[inline]
    pub(crate) fn on_improvement(&mut self) {
        self.improvements = self.improvements.saturating_add(1);
    }

    #[inline]
    pub(crate) fn on_level_completed(&mut self) {
        self.levels_completed = self.levels_completed.saturating_add(1);
    }

    /// Add the per-subset counters of `other` into `self`.
    pub(crate) fn merge(&mut self, other: &Self) {
        self.subsets_enumerated = self
            .subsets_enumerated
            .saturating_add(other.subsets_enumerated);
        self.prunings_coverage = self.prunings_coverage.saturating_add(other.prunings_coverage);
        self.prunings_bound = self.prunings_bound.saturating_add(other.prunings_bound);
        self.evaluations = self.evaluations.saturating_add(other.evaluations);
        self.assignment_failures = self
            .assignment_failures
            .saturating_add(other.assignment_failures);
        self.improvements = self.improvements.saturating_add(other.improvements);
    }
}

impl std::fmt::Display for SearchStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Search Statistics:")?;
        writeln!(f, "  Vendors (pool/filtered): {}/{}", self.vendors_before_filter, self.vendors_after_filter)?;
        writeln!(f, "  Subsets enumerated:      {}", self.subsets_enumerated)?;
        writeln!(f, "  Prunings (coverage):     {}", self.prunings_coverage)?;
        writeln!(f, "  Prunings (bound):        {}", self.prunings_bound)?;
        writeln!(f, "  Evaluations:             {}", self.evaluations)?;
        writeln!(f, "  Assignment failures:     {}", self.assignment_failures)?;
        writeln!(f, "  Improvements:            {}", self.improvements)?;
        writeln!(f, "  Levels completed:        {}", self.levels_completed)?;
        writeln!(f, "  Global lower bound:      {}", self.global_lower_bound)?;
        writeln!(f, "  Total time:              {:.2?}", self.time_total)?;
        Ok(())
    }
}
