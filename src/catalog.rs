//! Catalog
//!
//! The read-only collection of components, vendors and offers the planner searches over. A
//! catalog is built once per run through [`CatalogBuilder`] and shared immutably afterwards.

use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use slotmap::{SlotMap, new_key_type};
use thiserror::Error;

use crate::offers::{Offer, OfferError, OfferKey};

new_key_type! {
    /// Component Key
    pub struct ComponentKey;

    /// Vendor Key
    pub struct VendorKey;
}

/// Errors related to catalog construction or component coverage.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// An offer references a component that was never registered.
    #[error("unknown component: {0}")]
    UnknownComponent(String),

    /// A component was registered with a zero quantity.
    #[error("component {0} has a zero quantity")]
    ZeroQuantity(String),

    /// An amount uses a different currency than the catalog (found, catalog).
    #[error("amount in {0}, but the catalog is priced in {1}")]
    CurrencyMismatch(&'static str, &'static str),

    /// A required component has no covering vendor anywhere in the catalog.
    #[error("no vendor offers component {0}")]
    UncoveredComponent(String),

    /// There is nothing left to buy.
    #[error("no required components")]
    NoComponents,

    /// Wrapped offer construction error.
    #[error(transparent)]
    Offer(#[from] OfferError),
}

/// A category of product the buyer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Component name
    pub name: String,

    /// Number of units needed
    pub quantity: u32,
}

/// A seller publishing offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vendor {
    /// Vendor name
    pub name: String,
}

/// One row of an input listing table.
#[derive(Debug, Clone)]
pub struct OfferRow<'a> {
    /// Name of the component this listing supplies
    pub component: String,

    /// Product name
    pub product: String,

    /// Price per unit
    pub unit_price: Money<'a, Currency>,

    /// Shipping cost
    pub shipping: Money<'a, Currency>,

    /// Vendor name
    pub vendor: String,

    /// Listing URL
    pub url: String,
}

/// Builder for an immutable [`Catalog`].
#[derive(Debug)]
pub struct CatalogBuilder<'a> {
    currency: &'static Currency,
    components: SlotMap<ComponentKey, Component>,
    vendors: SlotMap<VendorKey, Vendor>,
    offers: SlotMap<OfferKey, Offer<'a>>,
    component_keys: FxHashMap<String, ComponentKey>,
    vendor_keys: FxHashMap<String, VendorKey>,
    component_order: Vec<ComponentKey>,
    vendor_order: Vec<VendorKey>,
}

impl<'a> CatalogBuilder<'a> {
    /// Create an empty builder for the given currency.
    pub fn new(currency: &'static Currency) -> Self {
        Self {
            currency,
            components: SlotMap::with_key(),
            vendors: SlotMap::with_key(),
            offers: SlotMap::with_key(),
            component_keys: FxHashMap::default(),
            vendor_keys: FxHashMap::default(),
            component_order: Vec::new(),
            vendor_order: Vec::new(),
        }
    }

    /// Register a component. Registering an existing name returns the existing key.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::ZeroQuantity`] if `quantity` is zero.
    pub fn component(
        &mut self,
        name: impl Into<String>,
        quantity: u32,
    ) -> Result<ComponentKey, CatalogError> {
        let name = name.into();

        if quantity == 0 {
            return Err(CatalogError::ZeroQuantity(name));
        }

        if let Some(key) = self.component_keys.get(&name) {
            return Ok(*key);
        }

        let key = self.components.insert(Component {
            name: name.clone(),
            quantity,
        });

        self.component_keys.insert(name, key);
        self.component_order.push(key);

        Ok(key)
    }

    /// Add an offer for a registered component, registering its vendor on first sight.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] if the component is unknown, the row is priced in another
    /// currency, or the offer itself is invalid.
    pub fn offer(&mut self, row: OfferRow<'a>) -> Result<OfferKey, CatalogError> {
        let component_key = *self
            .component_keys
            .get(&row.component)
            .ok_or_else(|| CatalogError::UnknownComponent(row.component.clone()))?;

        let quantity = self
            .components
            .get(component_key)
            .map(|component| component.quantity)
            .ok_or_else(|| CatalogError::UnknownComponent(row.component.clone()))?;

        for amount in [&row.unit_price, &row.shipping] {
            if amount.currency() != self.currency {
                return Err(CatalogError::CurrencyMismatch(
                    amount.currency().iso_alpha_code,
                    self.currency.iso_alpha_code,
                ));
            }
        }

        let vendor_key = self.vendor(row.vendor);

        let offer = Offer::new(
            component_key,
            vendor_key,
            row.product,
            row.url,
            row.unit_price,
            row.shipping,
            quantity,
        )?;

        Ok(self.offers.insert(offer))
    }

    fn vendor(&mut self, name: String) -> VendorKey {
        if let Some(key) = self.vendor_keys.get(&name) {
            return *key;
        }

        let key = self.vendors.insert(Vendor { name: name.clone() });

        self.vendor_keys.insert(name, key);
        self.vendor_order.push(key);

        key
    }

    /// Finish building.
    pub fn build(self) -> Catalog<'a> {
        let mut offers_by_component: FxHashMap<ComponentKey, Vec<OfferKey>> = FxHashMap::default();

        for (key, offer) in &self.offers {
            offers_by_component
                .entry(offer.component())
                .or_default()
                .push(key);
        }

        Catalog {
            currency: self.currency,
            components: self.components,
            vendors: self.vendors,
            offers: self.offers,
            component_keys: self.component_keys,
            vendor_keys: self.vendor_keys,
            component_order: self.component_order,
            vendor_order: self.vendor_order,
            offers_by_component,
        }
    }
}

/// Read-only collection of components, vendors and their offers.
#[derive(Debug)]
pub struct Catalog<'a> {
    currency: &'static Currency,
    components: SlotMap<ComponentKey, Component>,
    vendors: SlotMap<VendorKey, Vendor>,
    offers: SlotMap<OfferKey, Offer<'a>>,
    component_keys: FxHashMap<String, ComponentKey>,
    vendor_keys: FxHashMap<String, VendorKey>,
    component_order: Vec<ComponentKey>,
    vendor_order: Vec<VendorKey>,
    offers_by_component: FxHashMap<ComponentKey, Vec<OfferKey>>,
}

impl<'a> Catalog<'a> {
    /// Currency every amount in the catalog is priced in.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Component keys in registration order.
    pub fn component_keys(&self) -> &[ComponentKey] {
        &self.component_order
    }

    /// Vendor keys in registration order.
    pub fn vendor_keys(&self) -> &[VendorKey] {
        &self.vendor_order
    }

    /// Get a component by key.
    pub fn component(&self, key: ComponentKey) -> Option<&Component> {
        self.components.get(key)
    }

    /// Find a component key by name.
    pub fn component_key(&self, name: &str) -> Option<ComponentKey> {
        self.component_keys.get(name).copied()
    }

    /// Get a vendor by key.
    pub fn vendor(&self, key: VendorKey) -> Option<&Vendor> {
        self.vendors.get(key)
    }

    /// Find a vendor key by name.
    pub fn vendor_key(&self, name: &str) -> Option<VendorKey> {
        self.vendor_keys.get(name).copied()
    }

    /// Name of a component, or an empty string for foreign keys.
    pub fn component_name(&self, key: ComponentKey) -> &str {
        self.components
            .get(key)
            .map_or("", |component| component.name.as_str())
    }

    /// Name of a vendor, or an empty string for foreign keys.
    pub fn vendor_name(&self, key: VendorKey) -> &str {
        self.vendors
            .get(key)
            .map_or("", |vendor| vendor.name.as_str())
    }

    /// Get an offer by key.
    pub fn offer(&self, key: OfferKey) -> Option<&Offer<'a>> {
        self.offers.get(key)
    }

    /// Iterate over all offers.
    pub fn offers(&self) -> impl Iterator<Item = (OfferKey, &Offer<'a>)> {
        self.offers.iter()
    }

    /// Iterate over the offers for one component.
    pub fn offers_for(&self, component: ComponentKey) -> impl Iterator<Item = (OfferKey, &Offer<'a>)> {
        self.offers_by_component
            .get(&component)
            .into_iter()
            .flatten()
            .filter_map(|key| self.offers.get(*key).map(|offer| (*key, offer)))
    }

    /// Whether at least one vendor offers the component.
    pub fn is_covered(&self, component: ComponentKey) -> bool {
        self.offers_by_component
            .get(&component)
            .is_some_and(|offers| !offers.is_empty())
    }

    /// Components nobody offers, in registration order.
    pub fn uncovered_components(&self) -> Vec<ComponentKey> {
        self.component_order
            .iter()
            .copied()
            .filter(|key| !self.is_covered(*key))
            .collect()
    }

    /// Number of components.
    pub fn component_count(&self) -> usize {
        self.component_order.len()
    }

    /// Number of vendors.
    pub fn vendor_count(&self) -> usize {
        self.vendor_order.len()
    }

    /// Number of offers.
    pub fn offer_count(&self) -> usize {
        self.offers.len()
    }
}
