//! Solution
//!
//! The plan returned to callers: one order per vendor, each listing the offers bought from
//! that vendor. Shipping is charged once per order as the largest shipping requirement among
//! its lines.

use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    catalog::{Catalog, ComponentKey, VendorKey},
    lookup::Lookup,
    offers::OfferKey,
    pricing::Cost,
    solvers::Candidate,
};

/// Errors raised when a plan does not hold up against its catalog.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SolutionError {
    /// A required component is not bought from any vendor.
    #[error("component {0} is not covered")]
    MissingComponent(String),

    /// A component is bought more than once.
    #[error("component {0} is bought more than once")]
    DuplicateComponent(String),

    /// A component that was not required appears in the plan.
    #[error("component {0} was not required")]
    UnexpectedComponent(String),

    /// An order line refers to an offer the catalog does not contain, or one that belongs to
    /// another vendor or component.
    #[error("order for {vendor} lists an offer it does not publish for {component}")]
    OfferMismatch {
        /// Vendor name of the order
        vendor: String,

        /// Component name of the line
        component: String,
    },

    /// The recorded total does not match the recomputed one.
    #[error("total cost is {recorded} but the orders add up to {recomputed}")]
    CostMismatch {
        /// Total stored in the plan, in minor units
        recorded: Cost,

        /// Total recomputed from the orders, in minor units
        recomputed: Cost,
    },

    /// An order's product subtotal is below the minimum order value.
    #[error("order for {vendor} has subtotal {subtotal}, below the minimum of {minimum}")]
    BelowMinimumOrder {
        /// Vendor name of the order
        vendor: String,

        /// Product subtotal in minor units
        subtotal: Cost,

        /// Minimum order value in minor units
        minimum: Cost,
    },

    /// A candidate references a cell the lookup does not have.
    #[error("candidate references a missing offer")]
    MissingCell,
}

/// One bought offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    /// Component the offer supplies
    pub component: ComponentKey,

    /// Offer bought
    pub offer: OfferKey,
}

/// Everything bought from one vendor.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorOrder<'a> {
    vendor: VendorKey,
    lines: SmallVec<[OrderLine; 8]>,
    subtotal: Money<'a, Currency>,
    shipping: Money<'a, Currency>,
}

impl<'a> VendorOrder<'a> {
    /// Vendor of this order.
    pub fn vendor(&self) -> VendorKey {
        self.vendor
    }

    /// Lines of this order, sorted by component name.
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Product subtotal (shipping excluded).
    pub fn subtotal(&self) -> Money<'a, Currency> {
        self.subtotal
    }

    /// Shipping charged for this order.
    pub fn shipping(&self) -> Money<'a, Currency> {
        self.shipping
    }

    /// Subtotal plus shipping, in minor units.
    pub fn total_minor(&self) -> Cost {
        self.subtotal
            .to_minor_units()
            .saturating_add(self.shipping.to_minor_units())
    }
}

/// A complete shopping plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution<'a> {
    total_cost: Money<'a, Currency>,
    orders: SmallVec<[VendorOrder<'a>; 4]>,
}

impl<'a> Solution<'a> {
    /// Materialise a search candidate into per-vendor orders.
    ///
    /// Orders are sorted by vendor name and lines by component name.
    ///
    /// # Errors
    ///
    /// Returns [`SolutionError::MissingCell`] if the candidate does not fit the lookup.
    pub fn from_candidate(
        catalog: &Catalog<'a>,
        lookup: &Lookup,
        candidate: &Candidate,
    ) -> Result<Self, SolutionError> {
        let currency = catalog.currency();
        let mut orders: SmallVec<[VendorOrder<'a>; 4]> = SmallVec::new();

        let mut total: Cost = 0;

        let mut vendors: Vec<usize> = candidate.choices().to_vec();
        vendors.sort_unstable();
        vendors.dedup();

        for vendor in vendors {
            let vendor_key = lookup.vendor_key(vendor).ok_or(SolutionError::MissingCell)?;

            let mut lines: SmallVec<[OrderLine; 8]> = SmallVec::new();
            let mut subtotal: Cost = 0;
            let mut shipping: Cost = 0;

            for (component, _choice) in candidate
                .choices()
                .iter()
                .enumerate()
                .filter(|(_component, choice)| **choice == vendor)
            {
                let cell = lookup
                    .cell(component, vendor)
                    .ok_or(SolutionError::MissingCell)?;
                let component_key = lookup
                    .component_key(component)
                    .ok_or(SolutionError::MissingCell)?;

                subtotal = subtotal.saturating_add(cell.total_price);
                shipping = shipping.max(cell.shipping);

                lines.push(OrderLine {
                    component: component_key,
                    offer: cell.offer,
                });
            }

            lines.sort_by(|a, b| {
                catalog
                    .component_name(a.component)
                    .cmp(catalog.component_name(b.component))
            });

            total = total.saturating_add(subtotal).saturating_add(shipping);

            orders.push(VendorOrder {
                vendor: vendor_key,
                lines,
                subtotal: Money::from_minor(subtotal, currency),
                shipping: Money::from_minor(shipping, currency),
            });
        }

        orders.sort_by(|a, b| catalog.vendor_name(a.vendor).cmp(catalog.vendor_name(b.vendor)));

        Ok(Self {
            total_cost: Money::from_minor(total, currency),
            orders,
        })
    }

    /// Total cost including shipping.
    pub fn total_cost(&self) -> Money<'a, Currency> {
        self.total_cost
    }

    /// Total cost in minor units.
    pub fn total_cost_minor(&self) -> Cost {
        self.total_cost.to_minor_units()
    }

    /// Orders, sorted by vendor name.
    pub fn orders(&self) -> &[VendorOrder<'a>] {
        &self.orders
    }

    /// The order placed with `vendor`, if any.
    pub fn order_for(&self, vendor: VendorKey) -> Option<&VendorOrder<'a>> {
        self.orders.iter().find(|order| order.vendor == vendor)
    }

    /// Number of vendors ordered from.
    pub fn vendor_count(&self) -> usize {
        self.orders.len()
    }

    /// Shipping summed over all orders.
    pub fn total_shipping(&self) -> Money<'a, Currency> {
        let minor = self
            .orders
            .iter()
            .fold(0, |acc: Cost, order| acc.saturating_add(order.shipping.to_minor_units()));

        Money::from_minor(minor, self.total_cost.currency())
    }

    /// Product subtotal summed over all orders (shipping excluded).
    pub fn products_subtotal(&self) -> Money<'a, Currency> {
        let minor = self
            .orders
            .iter()
            .fold(0, |acc: Cost, order| acc.saturating_add(order.subtotal.to_minor_units()));

        Money::from_minor(minor, self.total_cost.currency())
    }

    /// Offer bought for `component`, if any.
    pub fn offer_for(&self, component: ComponentKey) -> Option<OfferKey> {
        self.orders
            .iter()
            .flat_map(|order| order.lines.iter())
            .find(|line| line.component == component)
            .map(|line| line.offer)
    }

    /// Check the plan against `catalog`.
    ///
    /// The total is recomputed from the catalog's offers; every required component must be
    /// bought exactly once, from an offer the order's vendor publishes; every order must reach
    /// `minimum_order` in product subtotal.
    ///
    /// # Errors
    ///
    /// Returns the first [`SolutionError`] found.
    pub fn verify(
        &self,
        catalog: &Catalog<'_>,
        required: &[ComponentKey],
        minimum_order: Cost,
    ) -> Result<(), SolutionError> {
        let mut seen: Vec<ComponentKey> = Vec::new();
        let mut recomputed: Cost = 0;

        for order in &self.orders {
            let vendor = catalog.vendor_name(order.vendor).to_string();
            let mut subtotal: Cost = 0;
            let mut shipping: Cost = 0;

            for line in &order.lines {
                let component = catalog.component_name(line.component).to_string();

                let offer = catalog
                    .offer(line.offer)
                    .filter(|offer| offer.vendor() == order.vendor && offer.component() == line.component)
                    .ok_or_else(|| SolutionError::OfferMismatch {
                        vendor: vendor.clone(),
                        component: component.clone(),
                    })?;

                if !required.contains(&line.component) {
                    return Err(SolutionError::UnexpectedComponent(component));
                }

                if seen.contains(&line.component) {
                    return Err(SolutionError::DuplicateComponent(component));
                }

                seen.push(line.component);

                subtotal = subtotal.saturating_add(offer.total_price_minor());
                shipping = shipping.max(offer.shipping_minor());
            }

            if subtotal < minimum_order {
                return Err(SolutionError::BelowMinimumOrder {
                    vendor,
                    subtotal,
                    minimum: minimum_order,
                });
            }

            recomputed = recomputed.saturating_add(subtotal).saturating_add(shipping);
        }

        if let Some(missing) = required.iter().find(|component| !seen.contains(component)) {
            return Err(SolutionError::MissingComponent(
                catalog.component_name(*missing).to_string(),
            ));
        }

        if recomputed != self.total_cost_minor() {
            return Err(SolutionError::CostMismatch {
                recorded: self.total_cost_minor(),
                recomputed,
            });
        }

        Ok(())
    }
}
