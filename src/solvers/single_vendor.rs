//! Single Vendor

use smallvec::smallvec;

use crate::{
    lookup::Lookup,
    pricing::Cost,
    solvers::{Candidate, better_of},
};

/// Cheapest plan that orders everything from one vendor.
///
/// A vendor qualifies when it covers every component and its product subtotal reaches
/// `minimum_order`. Returns `None` if no vendor qualifies.
pub fn single_vendor(lookup: &Lookup, minimum_order: Cost) -> Option<Candidate> {
    let n = lookup.component_count();

    (0..lookup.vendor_count())
        .filter(|&v| lookup.covers_all(&[v]))
        .filter_map(|v| Candidate::evaluate(lookup, smallvec![v; n], minimum_order))
        .fold(None, |best, candidate| better_of(best, Some(candidate)))
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::EUR};
    use testresult::TestResult;

    use super::*;
    use crate::catalog::{CatalogBuilder, OfferRow};

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

    #[test]
    fn picks_cheapest_complete_vendor() -> TestResult {
        let lookup = lookup(&[
            ("CPU", "X", 100, 5),
            ("RAM", "X", 50, 5),
            ("CPU", "Y", 90, 20),
            ("RAM", "Y", 50, 2),
            ("RAM", "Z", 10, 0),
        ])?;

        let best = single_vendor(&lookup, 100).ok_or("no candidate")?;

        assert_eq!(best.cost(), 155);
        assert_eq!(best.vendor_count(), 1);

        Ok(())
    }

    #[test]
    fn rejects_vendors_below_minimum_order() -> TestResult {
        let lookup = lookup(&[("CPU", "X", 100, 5), ("RAM", "X", 50, 5)])?;

        assert!(single_vendor(&lookup, 151).is_none());
        assert_eq!(single_vendor(&lookup, 150).as_ref().map(Candidate::cost), Some(155));

        Ok(())
    }

    #[test]
    fn partial_vendors_never_qualify() -> TestResult {
        let lookup = lookup(&[("CPU", "X", 40, 5), ("RAM", "Y", 30, 4)])?;

        assert!(single_vendor(&lookup, 0).is_none());

        Ok(())
    }
}
