//! Solvers for Shopping Plans

use std::cmp::Ordering;

use smallvec::SmallVec;

use crate::{lookup::Lookup, lookup::VendorTotals, pricing::Cost};

pub mod assignment;
pub mod incumbent;
pub mod observer;
pub mod search;
pub mod single_vendor;
pub mod stats;

pub use assignment::{Exhaustive, GreedyRepair};
pub use incumbent::SharedIncumbent;
pub use observer::{NoopObserver, SearchObserver};
pub use search::{BranchAndBound, SearchLimits, SearchOutcome, TerminationReason};
pub use single_vendor::single_vendor;
pub use stats::SearchStatistics;

/// Component index to vendor search index.
pub type Choices = SmallVec<[usize; 16]>;

/// A complete, minimum-order-valid assignment together with its cost summary.
///
/// Candidates are ranked by total cost, then number of vendors, then total shipping, and
/// finally by the choice vector itself so that ranking is a total order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    choices: Choices,
    cost: Cost,
    vendor_count: usize,
    shipping: Cost,
}

impl Candidate {
    /// Evaluate `choices` against `lookup`.
    ///
    /// Returns `None` if a choice refers to a missing cell, or if any vendor with at least one
    /// item falls below `minimum_order` in product subtotal.
    pub fn evaluate(lookup: &Lookup, choices: Choices, minimum_order: Cost) -> Option<Self> {
        if choices.len() != lookup.component_count() {
            return None;
        }

        let mut totals = VendorTotals::new(lookup.vendor_count());

        for (component, &vendor) in choices.iter().enumerate() {
            totals.add(vendor, lookup.cell(component, vendor)?);
        }

        let below_minimum = (0..lookup.vendor_count())
            .any(|v| totals.items(v) > 0 && totals.subtotal(v) < minimum_order);

        if below_minimum {
            return None;
        }

        Some(Self {
            cost: totals.total_cost(),
            vendor_count: totals.vendor_count(),
            shipping: totals.total_shipping(),
            choices,
        })
    }

    /// Chosen vendor (search index) per component index.
    pub fn choices(&self) -> &[usize] {
        &self.choices
    }

    /// Total cost in minor units.
    pub fn cost(&self) -> Cost {
        self.cost
    }

    /// Number of distinct vendors ordered from.
    pub fn vendor_count(&self) -> usize {
        self.vendor_count
    }

    /// Sum of per-vendor shipping.
    pub fn shipping(&self) -> Cost {
        self.shipping
    }

    /// Whether `self` ranks strictly ahead of `other`.
    pub fn is_better_than(&self, other: &Self) -> bool {
        self < other
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost
            .cmp(&other.cost)
            .then_with(|| self.vendor_count.cmp(&other.vendor_count))
            .then_with(|| self.shipping.cmp(&other.shipping))
            .then_with(|| self.choices.cmp(&other.choices))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pick the better ranked of two optional candidates.
pub fn better_of(a: Option<Candidate>, b: Option<Candidate>) -> Option<Candidate> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Strategy for turning a vendor subset into a candidate plan.
pub trait AssignmentStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Assign every component to a vendor of `subset` (search indices, ascending), honouring
    /// `minimum_order` for every vendor that receives at least one item.
    ///
    /// Returns `None` when the strategy finds no valid assignment for the subset; this is a
    /// local outcome and never an error.
    fn assign(&self, lookup: &Lookup, subset: &[usize], minimum_order: Cost) -> Option<Candidate>;
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::EUR};
    use smallvec::smallvec;
    use testresult::TestResult;

    use super::*;
    use crate::catalog::{CatalogBuilder, OfferRow};

    fn lookup() -> Result<Lookup, Box<dyn std::error::Error>> {
        let mut builder = CatalogBuilder::new(EUR);
        let cpu = builder.component("CPU", 1)?;
        let ram = builder.component("RAM", 1)?;

        for (component, vendor, price, shipping) in [
            ("CPU", "X", 100, 5),
            ("RAM", "X", 50, 5),
            ("CPU", "Y", 100, 2),
            ("RAM", "Y", 50, 8),
        ] {
            builder.offer(OfferRow {
                component: component.to_string(),
                product: component.to_string(),
                unit_price: Money::from_minor(price, EUR),
                shipping: Money::from_minor(shipping, EUR),
                vendor: vendor.to_string(),
                url: String::new(),
            })?;
        }

        let catalog = builder.build();

        Ok(Lookup::new(&catalog, &[cpu, ram])?)
    }

    #[test]
    fn evaluate_applies_max_shipping_per_vendor() -> TestResult {
        let lookup = lookup()?;

        // Both vendors cover everything; Y ships cheaper on its own and sorts first.
        let x = (0..2).find(|&v| lookup.vendor_name(v) == "X").ok_or("X missing")?;
        let y = 1 - x;

        let single = Candidate::evaluate(&lookup, smallvec![x, x], 0).ok_or("no candidate")?;
        let split = Candidate::evaluate(&lookup, smallvec![y, x], 0).ok_or("no candidate")?;

        assert_eq!(single.cost(), 155);
        assert_eq!(single.vendor_count(), 1);
        assert_eq!(split.cost(), 157);
        assert_eq!(split.shipping(), 7);
        assert!(single.is_better_than(&split));

        Ok(())
    }

    #[test]
    fn evaluate_rejects_minimum_order_violations() -> TestResult {
        let lookup = lookup()?;

        assert!(Candidate::evaluate(&lookup, smallvec![0, 1], 101).is_none());
        assert!(Candidate::evaluate(&lookup, smallvec![0, 0], 150).is_some());
        assert!(Candidate::evaluate(&lookup, smallvec![0], 0).is_none());

        Ok(())
    }

    #[test]
    fn ties_rank_by_vendor_count_then_shipping() -> TestResult {
        let lookup = lookup()?;

        let mut candidates: Vec<Candidate> = [[0, 0], [0, 1], [1, 0], [1, 1]]
            .into_iter()
            .filter_map(|choices| Candidate::evaluate(&lookup, Choices::from_slice(&choices), 0))
            .collect();

        candidates.sort();

        let first = candidates.first().ok_or("no candidates")?;

        assert_eq!(first.vendor_count(), 1);
        assert_eq!(better_of(None, Some(first.clone())), Some(first.clone()));

        Ok(())
    }
}
