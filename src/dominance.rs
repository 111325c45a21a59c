//! Dominance
//!
//! Vendor `U` dominates vendor `V` when `U` covers every component `V` covers, and on each of
//! them `U`'s cheapest offer is no more expensive than `V`'s in both product price and
//! shipping. Moving all of `V`'s picks to `U` then never raises the cost of a plan nor the
//! number of vendors in it, so `V` can be dropped from the search pool.

use fixedbitset::FixedBitSet;
use tracing::debug;

use crate::lookup::Lookup;

/// Outcome of running the dominance filter over a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DominanceFilter {
    survivors: FixedBitSet,
    removed: Vec<usize>,
    guarded: bool,
}

impl DominanceFilter {
    /// Compute the surviving vendors of `lookup`.
    ///
    /// Among vendors that dominate each other (identical cells on identical coverage) the one
    /// earliest in search order survives. If the survivors would cover fewer components than
    /// the full pool, the filter falls back to keeping every vendor.
    pub fn compute(lookup: &Lookup) -> Self {
        let m = lookup.vendor_count();
        let mut survivors = FixedBitSet::with_capacity(m);
        survivors.insert_range(..);

        let mut removed = Vec::new();

        for v in 0..m {
            let dominated = (0..m).any(|u| {
                u != v && dominates(lookup, u, v) && (u < v || !dominates(lookup, v, u))
            });

            if dominated {
                survivors.set(v, false);
                removed.push(v);
            }
        }

        let all: Vec<usize> = (0..m).collect();
        let kept: Vec<usize> = survivors.ones().collect();

        if lookup.union_coverage(&kept) != lookup.union_coverage(&all) {
            debug!(
                removed = removed.len(),
                "dominance filter would lose coverage, keeping all vendors"
            );

            let mut all_vendors = FixedBitSet::with_capacity(m);
            all_vendors.insert_range(..);

            return Self {
                survivors: all_vendors,
                removed: Vec::new(),
                guarded: true,
            };
        }

        Self {
            survivors,
            removed,
            guarded: false,
        }
    }

    /// Search indices of the vendors that survive the filter.
    pub fn survivors(&self) -> &FixedBitSet {
        &self.survivors
    }

    /// Search indices of the vendors removed as dominated.
    pub fn removed(&self) -> &[usize] {
        &self.removed
    }

    /// Whether the coverage guard discarded the filter result.
    pub fn guarded(&self) -> bool {
        self.guarded
    }
}

/// Whether vendor `u` dominates vendor `v` (both search indices into `lookup`).
pub fn dominates(lookup: &Lookup, u: usize, v: usize) -> bool {
    let (Some(u_cov), Some(v_cov)) = (lookup.coverage(u), lookup.coverage(v)) else {
        return false;
    };

    if !v_cov.is_subset(u_cov) {
        return false;
    }

    v_cov.ones().all(|component| {
        match (lookup.cell(component, u), lookup.cell(component, v)) {
            (Some(better), Some(worse)) => {
                better.total_price <= worse.total_price && better.shipping <= worse.shipping
            }
            _ => false,
        }
    })
}
