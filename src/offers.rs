//! Offers

use rusty_money::{Money, iso::Currency};
use slotmap::new_key_type;
use thiserror::Error;

use crate::{
    catalog::{ComponentKey, VendorKey},
    pricing::Cost,
};

new_key_type! {
    /// Offer Key
    pub struct OfferKey;
}

/// Errors raised while constructing an [`Offer`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OfferError {
    /// Unit price or shipping is below zero.
    #[error("offer for {product} has a negative price or shipping cost")]
    NegativePrice {
        /// Product name of the rejected offer
        product: String,
    },

    /// Quantity must be at least one.
    #[error("offer for {product} has a zero quantity")]
    ZeroQuantity {
        /// Product name of the rejected offer
        product: String,
    },

    /// Price times quantity (plus shipping) does not fit into minor units.
    #[error("offer for {product} overflows minor units")]
    Overflow {
        /// Product name of the rejected offer
        product: String,
    },

    /// Unit price and shipping use different currencies.
    #[error("offer for {product} mixes currencies {unit_price} and {shipping}")]
    CurrencyMismatch {
        /// Product name of the rejected offer
        product: String,

        /// Currency of the unit price
        unit_price: &'static str,

        /// Currency of the shipping cost
        shipping: &'static str,
    },
}

/// A vendor's quote for one component: unit price, per-order shipping and the quantity the
/// buyer needs.
///
/// Offers are created once when the catalog is built and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Offer<'a> {
    component: ComponentKey,
    vendor: VendorKey,
    product: String,
    url: String,
    unit_price: Money<'a, Currency>,
    shipping: Money<'a, Currency>,
    quantity: u32,
    total_price: Cost,
    total_cost: Cost,
}

impl<'a> Offer<'a> {
    /// Create a new offer.
    ///
    /// # Errors
    ///
    /// Returns an [`OfferError`] if a price is negative, the quantity is zero, the currencies
    /// differ, or the totals overflow.
    pub fn new(
        component: ComponentKey,
        vendor: VendorKey,
        product: impl Into<String>,
        url: impl Into<String>,
        unit_price: Money<'a, Currency>,
        shipping: Money<'a, Currency>,
        quantity: u32,
    ) -> Result<Self, OfferError> {
        let product = product.into();

        if unit_price.currency() != shipping.currency() {
            return Err(OfferError::CurrencyMismatch {
                product,
                unit_price: unit_price.currency().iso_alpha_code,
                shipping: shipping.currency().iso_alpha_code,
            });
        }

        if unit_price.to_minor_units() < 0 || shipping.to_minor_units() < 0 {
            return Err(OfferError::NegativePrice { product });
        }

        if quantity == 0 {
            return Err(OfferError::ZeroQuantity { product });
        }

        let Some(total_price) = unit_price
            .to_minor_units()
            .checked_mul(i64::from(quantity))
        else {
            return Err(OfferError::Overflow { product });
        };

        let Some(total_cost) = total_price.checked_add(shipping.to_minor_units()) else {
            return Err(OfferError::Overflow { product });
        };

        Ok(Self {
            component,
            vendor,
            product,
            url: url.into(),
            unit_price,
            shipping,
            quantity,
            total_price,
            total_cost,
        })
    }

    /// Component this offer supplies.
    pub fn component(&self) -> ComponentKey {
        self.component
    }

    /// Vendor publishing this offer.
    pub fn vendor(&self) -> VendorKey {
        self.vendor
    }

    /// Product name as listed by the vendor.
    pub fn product(&self) -> &str {
        &self.product
    }

    /// Listing URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Price of a single unit.
    pub fn unit_price(&self) -> Money<'a, Currency> {
        self.unit_price
    }

    /// Shipping requirement attached to this listing.
    pub fn shipping(&self) -> Money<'a, Currency> {
        self.shipping
    }

    /// Number of units the buyer needs.
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Unit price times quantity.
    pub fn total_price(&self) -> Money<'a, Currency> {
        Money::from_minor(self.total_price, self.unit_price.currency())
    }

    /// Total price plus shipping, as if this offer were ordered on its own.
    pub fn total_cost(&self) -> Money<'a, Currency> {
        Money::from_minor(self.total_cost, self.unit_price.currency())
    }

    /// Total price in minor units.
    pub fn total_price_minor(&self) -> Cost {
        self.total_price
    }

    /// Shipping in minor units.
    pub fn shipping_minor(&self) -> Cost {
        self.shipping.to_minor_units()
    }

    /// Total cost in minor units.
    pub fn total_cost_minor(&self) -> Cost {
        self.total_cost
    }
}

/// Returns the offer with the lowest total cost, preferring lower shipping on ties and then the
/// earlier offer.
pub fn cheapest_offer<'o, 'a>(offers: impl IntoIterator<Item = &'o Offer<'a>>) -> Option<&'o Offer<'a>>
where
    'a: 'o,
{
    offers.into_iter().fold(None, |best, offer| match best {
        Some(current)
            if (current.total_cost_minor(), current.shipping_minor())
                <= (offer.total_cost_minor(), offer.shipping_minor()) =>
        {
            Some(current)
        }
        _ => Some(offer),
    })
}
