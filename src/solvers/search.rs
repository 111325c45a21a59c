//! Branch-and-bound search over vendor subsets
//!
//! Subsets are enumerated by size `k = 1..=max_vendors` in lexicographic order of vendor search
//! indices. Each subset is skipped if it leaves a component uncovered or if its lower bound
//! cannot beat the incumbent; otherwise it is handed to the assignment strategy. Once every
//! subset of a size has been handled, the search stops early if the incumbent is already within
//! the termination threshold.

use std::{
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use smallvec::SmallVec;
use tracing::{debug, info, trace};

use crate::{
    lookup::Lookup,
    pricing::Cost,
    solvers::{
        AssignmentStrategy, Candidate, incumbent::SharedIncumbent, observer::SearchObserver,
        stats::SearchStatistics,
    },
};

/// Vendor search indices of one subset, ascending.
pub type Subset = SmallVec<[usize; 8]>;

/// Subsets a worker takes from the shared cursor at a time.
const SUBSET_BATCH: usize = 32;

/// Why the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Every subset up to the vendor cap was handled.
    Exhausted,

    /// The incumbent came within the termination threshold after a completed level.
    EarlyTermination,

    /// The deadline passed; the incumbent is the best plan found so far.
    TimeLimit,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhausted => write!(f, "search exhausted"),
            Self::EarlyTermination => write!(f, "within tolerance of the lower bound"),
            Self::TimeLimit => write!(f, "time limit reached"),
        }
    }
}

/// Bounds and knobs for one search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    /// Largest subset size to enumerate
    pub max_vendors: usize,

    /// Product subtotal every used vendor must reach
    pub minimum_order: Cost,

    /// Stop after a level once the incumbent costs at most this much
    pub termination_threshold: Option<Cost>,

    /// Wall-clock deadline, checked before each subset
    pub deadline: Option<Instant>,

    /// Number of worker threads
    pub workers: usize,
}

/// Result of a search run.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Best candidate found, including the seed
    pub best: Option<Candidate>,

    /// Why the search stopped
    pub termination: TerminationReason,

    /// Counters collected during the run
    pub statistics: SearchStatistics,
}

/// Lexicographic enumeration of `k`-subsets of `0..n`.
#[derive(Debug, Clone)]
pub struct VendorSubsets {
    n: usize,
    next: Option<Subset>,
}

impl VendorSubsets {
    /// Enumerate the `k`-subsets of `0..n`. Yields nothing when `k` is zero or exceeds `n`.
    pub fn new(n: usize, k: usize) -> Self {
        let next = (k > 0 && k <= n).then(|| (0..k).collect());

        Self { n, next }
    }

    fn take_batch(&mut self, size: usize) -> Vec<Subset> {
        self.by_ref().take(size).collect()
    }
}

impl Iterator for VendorSubsets {
    type Item = Subset;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let mut following = current.clone();

        if advance(&mut following, self.n) {
            self.next = Some(following);
        }

        Some(current)
    }
}

fn advance(indices: &mut [usize], n: usize) -> bool {
    let k = indices.len();

    for i in (0..k).rev() {
        let limit = n - k + i;

        let Some(value) = indices.get(i).copied() else {
            return false;
        };

        if value < limit {
            for (offset, slot) in indices.iter_mut().skip(i).enumerate() {
                *slot = value + 1 + offset;
            }

            return true;
        }
    }

    false
}

/// Branch-and-bound search over vendor subsets of a [`Lookup`].
pub struct BranchAndBound<'s> {
    lookup: &'s Lookup,
    strategy: &'s dyn AssignmentStrategy,
    observer: &'s dyn SearchObserver,
    limits: SearchLimits,
}

impl std::fmt::Debug for BranchAndBound<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchAndBound")
            .field("strategy", &self.strategy.name())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl<'s> BranchAndBound<'s> {
    /// Create a search over `lookup`.
    pub fn new(
        lookup: &'s Lookup,
        strategy: &'s dyn AssignmentStrategy,
        observer: &'s dyn SearchObserver,
        limits: SearchLimits,
    ) -> Self {
        Self {
            lookup,
            strategy,
            observer,
            limits,
        }
    }

    fn deadline_passed(&self) -> bool {
        self.limits
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Run the search, starting from `incumbent`.
    pub fn run(&self, incumbent: SharedIncumbent) -> SearchOutcome {
        let mut statistics = SearchStatistics::default();
        let mut termination = TerminationReason::Exhausted;

        let max_size = self.limits.max_vendors.min(self.lookup.vendor_count());
        let workers = self.limits.workers.max(1);

        for size in 1..=max_size {
            if self.deadline_passed() {
                termination = TerminationReason::TimeLimit;
                break;
            }

            self.observer.on_level_start(size);

            let cursor = Mutex::new(VendorSubsets::new(self.lookup.vendor_count(), size));
            let timed_out = AtomicBool::new(false);

            if workers == 1 {
                let local = self.work(&cursor, &incumbent, &timed_out);
                statistics.merge(&local);
            } else {
                thread::scope(|scope| {
                    let handles: Vec<_> = (0..workers)
                        .map(|_worker| scope.spawn(|| self.work(&cursor, &incumbent, &timed_out)))
                        .collect();

                    for handle in handles {
                        let local = handle
                            .join()
                            .unwrap_or_else(|payload| std::panic::resume_unwind(payload));

                        statistics.merge(&local);
                    }
                });
            }

            if timed_out.load(Ordering::Relaxed) {
                info!(size, "time limit reached during level");
                termination = TerminationReason::TimeLimit;
                break;
            }

            statistics.on_level_completed();

            let best = incumbent.upper_bound();
            let best = (best != Cost::MAX).then_some(best);

            self.observer.on_level_finish(size, best);

            info!(
                size,
                incumbent = ?best,
                subsets = statistics.subsets_enumerated,
                evaluations = statistics.evaluations,
                "level finished"
            );

            if let (Some(best), Some(threshold)) = (best, self.limits.termination_threshold)
                && best <= threshold
            {
                debug!(best, threshold, "incumbent within tolerance, stopping");
                termination = TerminationReason::EarlyTermination;
                break;
            }
        }

        SearchOutcome {
            best: incumbent.into_inner(),
            termination,
            statistics,
        }
    }

    fn work(
        &self,
        cursor: &Mutex<VendorSubsets>,
        incumbent: &SharedIncumbent,
        timed_out: &AtomicBool,
    ) -> SearchStatistics {
        let mut statistics = SearchStatistics::default();

        loop {
            let batch = cursor
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take_batch(SUBSET_BATCH);

            if batch.is_empty() {
                break;
            }

            for subset in batch {
                if timed_out.load(Ordering::Relaxed) || self.deadline_passed() {
                    timed_out.store(true, Ordering::Relaxed);
                    return statistics;
                }

                statistics.on_subset();
                self.visit(&subset, incumbent, &mut statistics);
            }
        }

        statistics
    }

    fn visit(&self, subset: &[usize], incumbent: &SharedIncumbent, statistics: &mut SearchStatistics) {
        let Some(lower_bound) = self.lookup.lower_bound(subset) else {
            trace!(?subset, "coverage pruned");
            statistics.on_pruning_coverage();
            self.observer.on_coverage_pruned(subset);
            return;
        };

        let upper_bound = incumbent.upper_bound();

        if lower_bound >= upper_bound {
            trace!(?subset, lower_bound, upper_bound, "bound pruned");
            statistics.on_pruning_bound();
            self.observer.on_bound_pruned(subset, lower_bound, upper_bound);
            return;
        }

        let candidate = self
            .strategy
            .assign(self.lookup, subset, self.limits.minimum_order);

        statistics.on_evaluation(candidate.is_some());
        self.observer.on_evaluated(subset, candidate.as_ref());

        if let Some(candidate) = candidate
            && incumbent.try_install(candidate.clone())
        {
            debug!(
                ?subset,
                cost = candidate.cost(),
                vendors = candidate.vendor_count(),
                "incumbent improved"
            );
            statistics.on_improvement();
            self.observer.on_improvement(&candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::EUR};
    use testresult::TestResult;

    use super::*;
    use crate::{
        catalog::{CatalogBuilder, OfferRow},
        solvers::{Exhaustive, GreedyRepair, NoopObserver, single_vendor},
    };

    fn lookup(rows: &[(&str, &str, i64, i64)]) -> Result<Lookup, Box<dyn std::error::Error>> {
        let mut builder = CatalogBuilder::new(EUR);

        for (component, vendor, price, shipping) in rows {
            builder.component(*component, 1)?;
            builder.offer(OfferRow {
                component: (*component).to_string(),
                product: (*component).to_string(),
                unit_price: Money::from_minor(*price, EUR),
                shipping: Money::from_minor(*shipping, EUR),
                vendor: (*vendor).to_string(),
                url: String::new(),
            })?;
        }

        let catalog = builder.build();
        let required = catalog.component_keys().to_vec();

        Ok(Lookup::new(&catalog, &required)?)
    }

    fn limits(max_vendors: usize, minimum_order: Cost, workers: usize) -> SearchLimits {
        SearchLimits {
            max_vendors,
            minimum_order,
            termination_threshold: None,
            deadline: None,
            workers,
        }
    }

    #[derive(Debug, Default)]
    struct Levels {
        started: Mutex<Vec<usize>>,
    }

    impl SearchObserver for Levels {
        fn on_level_start(&self, size: usize) {
            self.started
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(size);
        }
    }

    #[test]
    fn subsets_are_lexicographic() {
        let subsets: Vec<Vec<usize>> = VendorSubsets::new(4, 2).map(SmallVec::into_vec).collect();

        assert_eq!(
            subsets,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
        assert_eq!(VendorSubsets::new(3, 0).count(), 0);
        assert_eq!(VendorSubsets::new(2, 3).count(), 0);
        assert_eq!(VendorSubsets::new(5, 5).count(), 1);
    }

    #[test]
    fn finds_split_plan_cheaper_than_single_vendor() -> TestResult {
        let lookup = lookup(&[
            ("CPU", "X", 100, 5),
            ("RAM", "X", 80, 5),
            ("RAM", "Y", 30, 5),
        ])?;

        let search = BranchAndBound::new(&lookup, &GreedyRepair, &NoopObserver, limits(2, 0, 1));
        let outcome = search.run(SharedIncumbent::seeded(single_vendor(&lookup, 0)));

        let best = outcome.best.ok_or("no plan")?;

        assert_eq!(best.cost(), 100 + 30 + 5 + 5);
        assert_eq!(outcome.termination, TerminationReason::Exhausted);
        assert_eq!(outcome.statistics.levels_completed, 2);

        Ok(())
    }

    #[test]
    fn parallel_workers_agree_with_sequential_search() -> TestResult {
        let lookup = lookup(&[
            ("A", "One", 10, 3),
            ("B", "One", 14, 3),
            ("B", "Two", 9, 4),
            ("C", "Two", 12, 4),
            ("C", "Three", 8, 2),
            ("A", "Three", 13, 2),
            ("D", "Four", 20, 1),
            ("A", "Four", 11, 1),
            ("D", "One", 25, 3),
        ])?;

        let sequential =
            BranchAndBound::new(&lookup, &Exhaustive::default(), &NoopObserver, limits(4, 0, 1))
                .run(SharedIncumbent::new());
        let parallel =
            BranchAndBound::new(&lookup, &Exhaustive::default(), &NoopObserver, limits(4, 0, 4))
                .run(SharedIncumbent::new());

        assert_eq!(
            sequential.best.as_ref().map(Candidate::cost),
            parallel.best.as_ref().map(Candidate::cost)
        );

        Ok(())
    }

    #[test]
    fn stops_early_within_threshold() -> TestResult {
        let lookup = lookup(&[("CPU", "X", 100, 5), ("RAM", "X", 50, 5), ("RAM", "Y", 49, 5)])?;

        let observer = Levels::default();
        let mut limits = limits(2, 0, 1);
        limits.termination_threshold = Some(lookup.global_lower_bound() + 10);

        let outcome = BranchAndBound::new(&lookup, &GreedyRepair, &observer, limits)
            .run(SharedIncumbent::seeded(single_vendor(&lookup, 0)));

        assert_eq!(outcome.termination, TerminationReason::EarlyTermination);
        assert_eq!(
            *observer.started.lock().unwrap_or_else(PoisonError::into_inner),
            vec![1]
        );

        Ok(())
    }

    #[test]
    fn expired_deadline_returns_the_seed() -> TestResult {
        let lookup = lookup(&[("CPU", "X", 100, 5), ("RAM", "X", 50, 5), ("RAM", "Y", 10, 5)])?;

        let mut limits = limits(2, 0, 2);
        limits.deadline = Some(Instant::now());

        let seed = single_vendor(&lookup, 0);
        let outcome = BranchAndBound::new(&lookup, &GreedyRepair, &NoopObserver, limits)
            .run(SharedIncumbent::seeded(seed.clone()));

        assert_eq!(outcome.termination, TerminationReason::TimeLimit);
        assert_eq!(outcome.best, seed);
        assert_eq!(outcome.statistics.subsets_enumerated, 0);

        Ok(())
    }
}
