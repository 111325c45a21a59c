//! Assignment strategies
//!
//! [`GreedyRepair`] picks the cheapest vendor of the subset for every component, moves
//! components into vendors that fall short of the minimum order, and then keeps any single
//! component move that lowers the plan's cost. [`Exhaustive`] walks the
//! component → vendor decision tree depth first and returns the best valid assignment it sees
//! within a node budget.

use std::cmp::Ordering;

use crate::{
    lookup::{Lookup, VendorTotals, compare_cells},
    pricing::Cost,
    solvers::{AssignmentStrategy, Candidate, Choices, better_of},
};

/// Default node budget for [`Exhaustive`].
pub const DEFAULT_NODE_LIMIT: usize = 200_000;

/// Greedy assignment followed by swap-based minimum-order repair.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyRepair;

impl GreedyRepair {
    /// Cheapest vendor of `subset` per component, ties to the earlier vendor.
    fn greedy(lookup: &Lookup, subset: &[usize]) -> Option<Choices> {
        (0..lookup.component_count())
            .map(|component| {
                subset
                    .iter()
                    .filter_map(|&v| lookup.cell(component, v).map(|cell| (v, cell)))
                    .min_by(|(a_v, a), (b_v, b)| compare_cells(a, b).then_with(|| a_v.cmp(b_v)))
                    .map(|(v, _cell)| v)
            })
            .collect()
    }

    /// Best legal move of one component into `failing`.
    ///
    /// A move out of donor `D` is legal when `D` keeps at least `minimum_order` in product
    /// subtotal, or when it was `D`'s only item. Returns `(component, delta)`.
    fn best_swap(
        lookup: &Lookup,
        choices: &Choices,
        totals: &VendorTotals,
        failing: usize,
        minimum_order: Cost,
    ) -> Option<(usize, Cost)> {
        let mut best: Option<(usize, Cost)> = None;

        for (component, &donor) in choices.iter().enumerate() {
            if donor == failing {
                continue;
            }

            let (Some(into), Some(from)) = (
                lookup.cell(component, failing),
                lookup.cell(component, donor),
            ) else {
                continue;
            };

            let remaining = totals.subtotal(donor).saturating_sub(from.total_price);
            let legal = remaining >= minimum_order || totals.items(donor) == 1;

            if !legal {
                continue;
            }

            let delta = into.total_cost.saturating_sub(from.total_cost);

            if best.is_none_or(|(_c, best_delta)| delta < best_delta) {
                best = Some((component, delta));
            }
        }

        best
    }

    fn totals(lookup: &Lookup, choices: &Choices) -> VendorTotals {
        let mut totals = VendorTotals::new(lookup.vendor_count());

        for (component, &vendor) in choices.iter().enumerate() {
            if let Some(cell) = lookup.cell(component, vendor) {
                totals.add(vendor, cell);
            }
        }

        totals
    }

    /// Move single components between subset vendors while that ranks the plan strictly better.
    ///
    /// A vendor ships once, so moving an item onto a vendor that already ships can undercut the
    /// per-item greedy choice.
    fn improve(
        lookup: &Lookup,
        subset: &[usize],
        mut current: Candidate,
        minimum_order: Cost,
    ) -> Candidate {
        loop {
            let mut best: Option<Candidate> = None;

            for (component, &from) in current.choices().iter().enumerate() {
                for &to in subset {
                    if to == from || lookup.cell(component, to).is_none() {
                        continue;
                    }

                    let mut choices = Choices::from_slice(current.choices());

                    if let Some(slot) = choices.get_mut(component) {
                        *slot = to;
                    }

                    best = better_of(best, Candidate::evaluate(lookup, choices, minimum_order));
                }
            }

            match best {
                Some(next) if next.is_better_than(&current) => current = next,
                _ => return current,
            }
        }
    }

    fn failing(totals: &VendorTotals, subset: &[usize], minimum_order: Cost) -> Vec<usize> {
        subset
            .iter()
            .copied()
            .filter(|&v| totals.items(v) > 0 && totals.subtotal(v) < minimum_order)
            .collect()
    }
}

impl AssignmentStrategy for GreedyRepair {
    fn name(&self) -> &'static str {
        "greedy-repair"
    }

    fn assign(&self, lookup: &Lookup, subset: &[usize], minimum_order: Cost) -> Option<Candidate> {
        let mut choices = Self::greedy(lookup, subset)?;

        // One round per component bounds the repair loop.
        for _round in 0..lookup.component_count() {
            let totals = Self::totals(lookup, &choices);
            let failing = Self::failing(&totals, subset, minimum_order);

            if failing.is_empty() {
                break;
            }

            let mut applied = false;

            for vendor in failing {
                let totals = Self::totals(lookup, &choices);

                if totals.items(vendor) == 0 || totals.subtotal(vendor) >= minimum_order {
                    continue;
                }

                if let Some((component, _delta)) =
                    Self::best_swap(lookup, &choices, &totals, vendor, minimum_order)
                    && let Some(slot) = choices.get_mut(component)
                {
                    *slot = vendor;
                    applied = true;
                }
            }

            if !applied {
                return None;
            }
        }

        let repaired = Candidate::evaluate(lookup, choices, minimum_order)?;

        Some(Self::improve(lookup, subset, repaired, minimum_order))
    }
}

/// Depth-first enumeration of component → vendor choices within a subset.
///
/// Branches whose partial cost plus the cheapest remaining product prices already exceeds the
/// best assignment found are cut. When the node budget runs out the better of the best
/// assignment so far and the [`GreedyRepair`] result is returned.
#[derive(Debug, Clone, Copy)]
pub struct Exhaustive {
    node_limit: usize,
}

impl Exhaustive {
    /// Create a strategy visiting at most `node_limit` nodes per subset.
    pub fn new(node_limit: usize) -> Self {
        Self { node_limit }
    }

    /// Node budget per subset.
    pub fn node_limit(&self) -> usize {
        self.node_limit
    }
}

impl Default for Exhaustive {
    fn default() -> Self {
        Self::new(DEFAULT_NODE_LIMIT)
    }
}

#[derive(Debug)]
struct Walk<'l> {
    lookup: &'l Lookup,
    subset: &'l [usize],
    minimum_order: Cost,

    // Per component: subset vendors that offer it, cheapest first.
    options: Vec<Vec<usize>>,

    // Suffix sums of the cheapest product price per component.
    remaining_floor: Vec<Cost>,

    choices: Choices,
    subtotal: Vec<Cost>,
    shipping: Vec<Cost>,
    items: Vec<usize>,

    nodes: usize,
    node_limit: usize,
    best: Option<Candidate>,
}

impl Walk<'_> {
    fn partial_cost(&self) -> Cost {
        self.subtotal
            .iter()
            .chain(self.shipping.iter())
            .fold(0, |acc: Cost, value| acc.saturating_add(*value))
    }

    fn exhausted(&self) -> bool {
        self.nodes >= self.node_limit
    }

    fn visit(&mut self, component: usize) {
        if self.exhausted() {
            return;
        }

        self.nodes += 1;

        if component == self.lookup.component_count() {
            self.leaf();
            return;
        }

        let floor = self.remaining_floor.get(component).copied().unwrap_or(0);

        if let Some(best) = &self.best
            && self.partial_cost().saturating_add(floor) > best.cost()
        {
            return;
        }

        let options = self.options.get(component).cloned().unwrap_or_default();

        for vendor in options {
            let Some(cell) = self.lookup.cell(component, vendor).copied() else {
                continue;
            };

            let (Some(subtotal), Some(shipping), Some(items)) = (
                self.subtotal.get(vendor).copied(),
                self.shipping.get(vendor).copied(),
                self.items.get(vendor).copied(),
            ) else {
                continue;
            };

            self.set(
                vendor,
                subtotal.saturating_add(cell.total_price),
                shipping.max(cell.shipping),
                items + 1,
            );
            self.choices.push(vendor);

            self.visit(component + 1);

            self.choices.pop();
            self.set(vendor, subtotal, shipping, items);

            if self.exhausted() {
                return;
            }
        }
    }

    fn set(&mut self, vendor: usize, subtotal: Cost, shipping: Cost, items: usize) {
        if let (Some(s), Some(h), Some(i)) = (
            self.subtotal.get_mut(vendor),
            self.shipping.get_mut(vendor),
            self.items.get_mut(vendor),
        ) {
            *s = subtotal;
            *h = shipping;
            *i = items;
        }
    }

    fn leaf(&mut self) {
        let valid = self
            .subset
            .iter()
            .all(|&v| {
                let items = self.items.get(v).copied().unwrap_or(0);
                let subtotal = self.subtotal.get(v).copied().unwrap_or(0);

                items == 0 || subtotal >= self.minimum_order
            });

        if !valid {
            return;
        }

        let candidate = Candidate::evaluate(self.lookup, self.choices.clone(), self.minimum_order);

        self.best = better_of(self.best.take(), candidate);
    }
}

impl AssignmentStrategy for Exhaustive {
    fn name(&self) -> &'static str {
        "exhaustive"
    }

    fn assign(&self, lookup: &Lookup, subset: &[usize], minimum_order: Cost) -> Option<Candidate> {
        let n = lookup.component_count();
        let m = lookup.vendor_count();

        let mut options = Vec::with_capacity(n);
        let mut floors = Vec::with_capacity(n);

        for component in 0..n {
            let mut vendors: Vec<usize> = subset
                .iter()
                .copied()
                .filter(|&v| lookup.cell(component, v).is_some())
                .collect();

            if vendors.is_empty() {
                return None;
            }

            vendors.sort_by(|&a, &b| match (lookup.cell(component, a), lookup.cell(component, b)) {
                (Some(x), Some(y)) => compare_cells(x, y).then_with(|| a.cmp(&b)),
                _ => Ordering::Equal,
            });

            let floor = vendors
                .iter()
                .filter_map(|&v| lookup.cell(component, v))
                .map(|cell| cell.total_price)
                .min()
                .unwrap_or(0);

            options.push(vendors);
            floors.push(floor);
        }

        let mut remaining_floor: Vec<Cost> = vec![0; n + 1];

        for component in (0..n).rev() {
            let next = remaining_floor.get(component + 1).copied().unwrap_or(0);
            let here = floors.get(component).copied().unwrap_or(0);

            if let Some(slot) = remaining_floor.get_mut(component) {
                *slot = next.saturating_add(here);
            }
        }

        let mut walk = Walk {
            lookup,
            subset,
            minimum_order,
            options,
            remaining_floor,
            choices: Choices::new(),
            subtotal: vec![0; m],
            shipping: vec![0; m],
            items: vec![0; m],
            nodes: 0,
            node_limit: self.node_limit,
            best: None,
        };

        walk.visit(0);

        if walk.exhausted() {
            return better_of(walk.best, GreedyRepair.assign(lookup, subset, minimum_order));
        }

        walk.best
    }
}
