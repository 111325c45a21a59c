//! Lookup
//!
//! Dense, index-based view of a [`Catalog`] restricted to the required components. The search
//! never touches slotmap keys: components are `0..n`, vendors are `0..m` in search order, and
//! each (component, vendor) pair resolves to at most one [`Cell`] holding that vendor's
//! cheapest offer for the component.

use std::cmp::Ordering;

use fixedbitset::FixedBitSet;

use crate::{
    catalog::{Catalog, CatalogError, ComponentKey, VendorKey},
    offers::{OfferKey, cheapest_offer},
    pricing::Cost,
};

/// Cheapest offer a vendor has for one component, with its costs cached in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// Offer backing this cell
    pub offer: OfferKey,

    /// Unit price times quantity
    pub total_price: Cost,

    /// Shipping requirement of the offer
    pub shipping: Cost,

    /// Total price plus shipping
    pub total_cost: Cost,
}

/// Dense search view over the required components of a catalog.
#[derive(Debug, Clone)]
pub struct Lookup {
    components: Vec<ComponentKey>,
    vendors: Vec<VendorKey>,
    vendor_names: Vec<String>,

    // Row-major by vendor: `cells[vendor * components.len() + component]`.
    cells: Vec<Option<Cell>>,
    coverage: Vec<FixedBitSet>,
    min_shipping: Vec<Cost>,

    cheapest_total_cost: Vec<Cost>,
    cheapest_total_price: Vec<Cost>,
    cheapest_shipping: Vec<Cost>,
    global_lower_bound: Cost,
}

impl Lookup {
    /// Build the lookup for `required` components of `catalog`.
    ///
    /// Vendors offering none of the required components are left out. The remaining vendors are
    /// sorted by coverage size (descending), minimum own shipping (ascending) and name.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::NoComponents`]: `required` is empty.
    /// - [`CatalogError::UnknownComponent`]: a key does not belong to `catalog`.
    /// - [`CatalogError::UncoveredComponent`]: a required component has no offers at all.
    pub fn new(catalog: &Catalog<'_>, required: &[ComponentKey]) -> Result<Self, CatalogError> {
        if required.is_empty() {
            return Err(CatalogError::NoComponents);
        }

        for &component in required {
            if catalog.component(component).is_none() {
                return Err(CatalogError::UnknownComponent(format!("{component:?}")));
            }
        }

        let n = required.len();

        // Cells per catalog vendor, in catalog order; re-ordered once sorting is known.
        let mut rows: Vec<(VendorKey, Vec<Option<Cell>>)> = Vec::new();

        for &vendor in catalog.vendor_keys() {
            let mut row = vec![None; n];

            for (component_idx, &component) in required.iter().enumerate() {
                let offers: Vec<_> = catalog
                    .offers_for(component)
                    .filter(|(_key, offer)| offer.vendor() == vendor)
                    .collect();

                let cell = cheapest_offer(offers.iter().map(|(_key, offer)| *offer))
                    .and_then(|best| {
                        offers
                            .iter()
                            .find(|(_key, offer)| std::ptr::eq(*offer, best))
                    })
                    .map(|(key, offer)| Cell {
                        offer: *key,
                        total_price: offer.total_price_minor(),
                        shipping: offer.shipping_minor(),
                        total_cost: offer.total_cost_minor(),
                    });

                if let Some(slot) = row.get_mut(component_idx) {
                    *slot = cell;
                }
            }

            if row.iter().any(Option::is_some) {
                rows.push((vendor, row));
            }
        }

        for (component_idx, &component) in required.iter().enumerate() {
            let covered = rows
                .iter()
                .any(|(_vendor, row)| row.get(component_idx).is_some_and(Option::is_some));

            if !covered {
                return Err(CatalogError::UncoveredComponent(
                    catalog.component_name(component).to_string(),
                ));
            }
        }

        rows.sort_by(|(a_key, a_row), (b_key, b_row)| {
            let a_coverage = a_row.iter().flatten().count();
            let b_coverage = b_row.iter().flatten().count();

            b_coverage
                .cmp(&a_coverage)
                .then_with(|| own_min_shipping(a_row).cmp(&own_min_shipping(b_row)))
                .then_with(|| catalog.vendor_name(*a_key).cmp(catalog.vendor_name(*b_key)))
        });

        let mut lookup = Self {
            components: required.to_vec(),
            vendors: Vec::with_capacity(rows.len()),
            vendor_names: Vec::with_capacity(rows.len()),
            cells: Vec::with_capacity(rows.len() * n),
            coverage: Vec::with_capacity(rows.len()),
            min_shipping: Vec::with_capacity(rows.len()),
            cheapest_total_cost: Vec::new(),
            cheapest_total_price: Vec::new(),
            cheapest_shipping: Vec::new(),
            global_lower_bound: 0,
        };

        for (vendor, row) in rows {
            let mut coverage = FixedBitSet::with_capacity(n);

            for (component_idx, cell) in row.iter().enumerate() {
                if cell.is_some() {
                    coverage.insert(component_idx);
                }
            }

            lookup.vendors.push(vendor);
            lookup
                .vendor_names
                .push(catalog.vendor_name(vendor).to_string());
            lookup.min_shipping.push(own_min_shipping(&row));
            lookup.coverage.push(coverage);
            lookup.cells.extend(row);
        }

        lookup.refresh_component_minima();

        Ok(lookup)
    }

    fn refresh_component_minima(&mut self) {
        let all: Vec<usize> = (0..self.vendor_count()).collect();

        self.cheapest_total_cost = (0..self.component_count())
            .map(|c| self.component_min(c, &all, |cell| cell.total_cost))
            .collect();
        self.cheapest_total_price = (0..self.component_count())
            .map(|c| self.component_min(c, &all, |cell| cell.total_price))
            .collect();
        self.cheapest_shipping = (0..self.component_count())
            .map(|c| self.component_min(c, &all, |cell| cell.shipping))
            .collect();

        self.global_lower_bound = self.lower_bound(&all).unwrap_or(0);
    }

    fn component_min(&self, component: usize, vendors: &[usize], value: impl Fn(&Cell) -> Cost) -> Cost {
        vendors
            .iter()
            .filter_map(|&v| self.cell(component, v))
            .map(value)
            .min()
            .unwrap_or(0)
    }

    /// Keep only the vendors whose search index is set in `keep`, preserving search order.
    ///
    /// Per-component minima are recomputed. The global lower bound is left as it was, since
    /// it describes the unrestricted catalog.
    pub fn retain_vendors(&mut self, keep: &FixedBitSet) {
        let n = self.component_count();
        let global_lower_bound = self.global_lower_bound;

        let mut vendors = Vec::new();
        let mut vendor_names = Vec::new();
        let mut cells = Vec::new();
        let mut coverage = Vec::new();
        let mut min_shipping = Vec::new();

        for v in keep.ones().filter(|&v| v < self.vendor_count()) {
            let start = v * n;

            if let (Some(key), Some(name), Some(row), Some(bits), Some(shipping)) = (
                self.vendors.get(v),
                self.vendor_names.get(v),
                self.cells.get(start..start + n),
                self.coverage.get(v),
                self.min_shipping.get(v),
            ) {
                vendors.push(*key);
                vendor_names.push(name.clone());
                cells.extend_from_slice(row);
                coverage.push(bits.clone());
                min_shipping.push(*shipping);
            }
        }

        self.vendors = vendors;
        self.vendor_names = vendor_names;
        self.cells = cells;
        self.coverage = coverage;
        self.min_shipping = min_shipping;

        self.refresh_component_minima();
        self.global_lower_bound = global_lower_bound;
    }

    /// Number of required components.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Number of vendors in the search pool.
    pub fn vendor_count(&self) -> usize {
        self.vendors.len()
    }

    /// Catalog key of the component at `component`.
    pub fn component_key(&self, component: usize) -> Option<ComponentKey> {
        self.components.get(component).copied()
    }

    /// Catalog key of the vendor at search index `vendor`.
    pub fn vendor_key(&self, vendor: usize) -> Option<VendorKey> {
        self.vendors.get(vendor).copied()
    }

    /// Name of the vendor at search index `vendor`.
    pub fn vendor_name(&self, vendor: usize) -> &str {
        self.vendor_names.get(vendor).map_or("", String::as_str)
    }

    /// Search index of a vendor key, if the vendor is in the pool.
    pub fn vendor_index(&self, key: VendorKey) -> Option<usize> {
        self.vendors.iter().position(|vendor| *vendor == key)
    }

    /// Cheapest offer `vendor` has for `component`.
    pub fn cell(&self, component: usize, vendor: usize) -> Option<&Cell> {
        if component >= self.component_count() {
            return None;
        }

        self.cells
            .get(vendor * self.component_count() + component)
            .and_then(Option::as_ref)
    }

    /// Components `vendor` can supply.
    pub fn coverage(&self, vendor: usize) -> Option<&FixedBitSet> {
        self.coverage.get(vendor)
    }

    /// Lowest shipping among `vendor`'s own offers.
    pub fn min_shipping(&self, vendor: usize) -> Option<Cost> {
        self.min_shipping.get(vendor).copied()
    }

    /// Bitset with every required component set.
    pub fn full_coverage(&self) -> FixedBitSet {
        let mut all = FixedBitSet::with_capacity(self.component_count());
        all.insert_range(..);
        all
    }

    /// Union of the coverage of `vendors`.
    pub fn union_coverage(&self, vendors: &[usize]) -> FixedBitSet {
        let mut union = FixedBitSet::with_capacity(self.component_count());

        for bits in vendors.iter().filter_map(|&v| self.coverage.get(v)) {
            union.union_with(bits);
        }

        union
    }

    /// Whether `vendors` together supply every required component.
    pub fn covers_all(&self, vendors: &[usize]) -> bool {
        self.union_coverage(vendors).count_ones(..) == self.component_count()
    }

    /// Cheapest total cost of `component` across the whole pool.
    pub fn cheapest_total_cost(&self, component: usize) -> Option<Cost> {
        self.cheapest_total_cost.get(component).copied()
    }

    /// Cheapest total price (shipping excluded) of `component` across the whole pool.
    pub fn cheapest_total_price(&self, component: usize) -> Option<Cost> {
        self.cheapest_total_price.get(component).copied()
    }

    /// Cheapest shipping requirement of `component` across the whole pool.
    pub fn cheapest_shipping(&self, component: usize) -> Option<Cost> {
        self.cheapest_shipping.get(component).copied()
    }

    /// Lower bound on any plan over the unrestricted catalog.
    pub fn global_lower_bound(&self) -> Cost {
        self.global_lower_bound
    }

    /// Lower bound on the cost of any plan that only orders from `vendors`, or `None` when the
    /// subset leaves a component uncovered.
    ///
    /// Every plan pays at least the cheapest product price of each component within the
    /// subset, and at least one shipment as expensive as the largest per-component minimum
    /// shipping. Shipping is charged once per vendor as a maximum, so summing per-component
    /// total costs would overestimate and is not used.
    pub fn lower_bound(&self, vendors: &[usize]) -> Option<Cost> {
        let mut products: Cost = 0;
        let mut shipping: Cost = 0;

        for component in 0..self.component_count() {
            let mut price = None::<Cost>;
            let mut ship = None::<Cost>;

            for cell in vendors.iter().filter_map(|&v| self.cell(component, v)) {
                price = Some(price.map_or(cell.total_price, |p| p.min(cell.total_price)));
                ship = Some(ship.map_or(cell.shipping, |s| s.min(cell.shipping)));
            }

            products = products.saturating_add(price?);
            shipping = shipping.max(ship?);
        }

        Some(products.saturating_add(shipping))
    }

    /// Cost of a complete assignment (`choices[component] = vendor`), computed with the
    /// per-vendor maximum shipping rule. Returns `None` if a choice has no cell.
    pub fn assignment_cost(&self, choices: &[usize]) -> Option<Cost> {
        let mut orders = VendorTotals::new(self.vendor_count());

        for (component, &vendor) in choices.iter().enumerate() {
            orders.add(vendor, self.cell(component, vendor)?);
        }

        Some(orders.total_cost())
    }
}

/// Running per-vendor subtotals and maximum shipping for an assignment.
#[derive(Debug, Clone)]
pub(crate) struct VendorTotals {
    subtotal: Vec<Cost>,
    shipping: Vec<Cost>,
    items: Vec<usize>,
}

impl VendorTotals {
    pub(crate) fn new(vendors: usize) -> Self {
        Self {
            subtotal: vec![0; vendors],
            shipping: vec![0; vendors],
            items: vec![0; vendors],
        }
    }

    pub(crate) fn add(&mut self, vendor: usize, cell: &Cell) {
        if let (Some(subtotal), Some(shipping), Some(items)) = (
            self.subtotal.get_mut(vendor),
            self.shipping.get_mut(vendor),
            self.items.get_mut(vendor),
        ) {
            *subtotal = subtotal.saturating_add(cell.total_price);
            *shipping = (*shipping).max(cell.shipping);
            *items += 1;
        }
    }

    pub(crate) fn subtotal(&self, vendor: usize) -> Cost {
        self.subtotal.get(vendor).copied().unwrap_or(0)
    }

    pub(crate) fn items(&self, vendor: usize) -> usize {
        self.items.get(vendor).copied().unwrap_or(0)
    }

    pub(crate) fn vendor_count(&self) -> usize {
        self.items.iter().filter(|&&items| items > 0).count()
    }

    pub(crate) fn total_shipping(&self) -> Cost {
        self.shipping
            .iter()
            .fold(0, |acc: Cost, shipping| acc.saturating_add(*shipping))
    }

    pub(crate) fn total_cost(&self) -> Cost {
        self.subtotal
            .iter()
            .fold(self.total_shipping(), |acc: Cost, subtotal| acc.saturating_add(*subtotal))
    }
}

fn own_min_shipping(row: &[Option<Cell>]) -> Cost {
    row.iter()
        .flatten()
        .map(|cell| cell.shipping)
        .min()
        .unwrap_or(Cost::MAX)
}

/// Compare two vendors' cells for `component`: cheaper total cost first, then lower shipping.
pub(crate) fn compare_cells(a: &Cell, b: &Cell) -> Ordering {
    a.total_cost
        .cmp(&b.total_cost)
        .then_with(|| a.shipping.cmp(&b.shipping))
}
