//! End-to-end planning scenarios

use std::sync::Mutex;

use decimal_percentage::Percentage;
use rusty_money::{Money, iso::EUR};
use testresult::TestResult;

use quartermaster::{
    catalog::{Catalog, CatalogBuilder, OfferRow},
    config::{PlannerConfig, StrategyKind},
    lookup::Lookup,
    planner::{PlanResult, Planner},
    pricing::Cost,
    solvers::{
        BranchAndBound, Candidate, GreedyRepair, SearchLimits, SearchObserver, SharedIncumbent,
        single_vendor,
    },
};

/// `(component, vendor, unit price, shipping)` in minor units, quantity 1.
type Row<'r> = (&'r str, &'r str, i64, i64);

fn catalog(components: &[&str], rows: &[Row<'_>]) -> Result<Catalog<'static>, Box<dyn std::error::Error>> {
    let mut builder = CatalogBuilder::new(EUR);

    for component in components {
        builder.component(*component, 1)?;
    }

    for (component, vendor, price, shipping) in rows {
        builder.offer(OfferRow {
            component: (*component).to_string(),
            product: format!("{vendor} {component}"),
            unit_price: Money::from_minor(*price, EUR),
            shipping: Money::from_minor(*shipping, EUR),
            vendor: (*vendor).to_string(),
            url: String::new(),
        })?;
    }

    Ok(builder.build())
}

fn exact_config(minimum_order: Cost, max_vendors: usize) -> PlannerConfig {
    PlannerConfig {
        minimum_order,
        max_vendor_combinations: max_vendors,
        tolerance: Percentage::from(0.0),
        workers: 1,
        strategy: StrategyKind::Exhaustive,
        ..PlannerConfig::default()
    }
}

#[test]
fn single_vendor_covering_everything_is_chosen() -> TestResult {
    let catalog = catalog(
        &["CPU", "RAM"],
        &[("CPU", "X", 10_000, 500), ("RAM", "X", 5_000, 500)],
    )?;

    let planner = Planner::new(PlannerConfig {
        minimum_order: 10_000,
        workers: 1,
        ..PlannerConfig::default()
    })?;

    let outcome = planner.plan(&catalog)?;
    let solution = outcome.result.solution().ok_or("expected a plan")?;

    assert_eq!(solution.total_cost_minor(), 15_500);
    assert_eq!(solution.vendor_count(), 1);
    assert_eq!(solution.total_shipping(), Money::from_minor(500, EUR));

    solution.verify(&catalog, &outcome.required_components, 10_000)?;

    Ok(())
}

#[test]
fn minimum_order_unreachable_by_any_vendor_is_infeasible() -> TestResult {
    let catalog = catalog(
        &["CPU", "RAM"],
        &[("CPU", "X", 4_000, 500), ("RAM", "Y", 3_000, 400)],
    )?;

    let planner = Planner::new(PlannerConfig {
        minimum_order: 5_000,
        workers: 1,
        ..PlannerConfig::default()
    })?;

    let outcome = planner.plan(&catalog)?;

    assert_eq!(outcome.result, PlanResult::Infeasible);

    Ok(())
}

#[test]
fn cheaper_split_beats_pricier_single_vendor() -> TestResult {
    let catalog = catalog(
        &["A", "B", "C"],
        &[
            ("A", "P", 1_000, 300),
            ("B", "P", 4_000, 300),
            ("B", "Q", 1_500, 200),
            ("C", "Q", 2_500, 200),
            ("A", "R", 1_800, 100),
            ("C", "R", 1_200, 100),
        ],
    )?;

    let outcome = Planner::new(exact_config(0, 3))?.plan(&catalog)?;
    let solution = outcome.result.solution().ok_or("expected a plan")?;

    let oracle = brute_force(&catalog, &["A", "B", "C"])?;

    assert_eq!(oracle, 4_300);
    assert_eq!(solution.total_cost_minor(), oracle);
    assert_eq!(solution.vendor_count(), 3);

    solution.verify(&catalog, &outcome.required_components, 0)?;

    Ok(())
}

#[test]
fn default_planner_finds_the_cheapest_split() -> TestResult {
    let config = PlannerConfig {
        minimum_order: 0,
        tolerance: Percentage::from(0.0),
        workers: 1,
        ..PlannerConfig::default()
    };

    let cases: [(&[Row<'_>], Cost); 2] = [
        (
            &[
                ("A", "P", 1_000, 300),
                ("B", "P", 4_000, 300),
                ("B", "Q", 1_500, 200),
                ("C", "Q", 2_500, 200),
                ("A", "R", 1_800, 100),
                ("C", "R", 1_200, 100),
            ],
            4_300,
        ),
        // B is cheaper per item from X, but Y already ships C.
        (
            &[
                ("A", "X", 1_076, 135),
                ("B", "X", 932, 135),
                ("B", "Y", 899, 577),
                ("C", "Y", 678, 577),
                ("A", "Z", 739, 867),
                ("C", "Z", 2_279, 867),
            ],
            3_365,
        ),
    ];

    for (rows, expected) in cases {
        let catalog = catalog(&["A", "B", "C"], rows)?;

        let outcome = Planner::new(config.clone())?.plan(&catalog)?;
        let solution = outcome.result.solution().ok_or("expected a plan")?;

        assert_eq!(brute_force(&catalog, &["A", "B", "C"])?, expected);
        assert_eq!(solution.total_cost_minor(), expected);

        solution.verify(&catalog, &outcome.required_components, 0)?;
    }

    Ok(())
}

/// Cheapest cost over every assignment of one vendor per component, shipping charged once per
/// vendor as its most expensive item shipping.
fn brute_force(catalog: &Catalog<'_>, components: &[&str]) -> Result<Cost, Box<dyn std::error::Error>> {
    let mut options: Vec<Vec<(String, Cost, Cost)>> = Vec::new();

    for name in components {
        let key = catalog.component_key(name).ok_or("unknown component")?;

        options.push(
            catalog
                .offers_for(key)
                .map(|(_, offer)| {
                    (
                        catalog.vendor_name(offer.vendor()).to_string(),
                        offer.total_price_minor(),
                        offer.shipping_minor(),
                    )
                })
                .collect(),
        );
    }

    let mut best = Cost::MAX;
    let mut picks = vec![0usize; options.len()];

    loop {
        let mut shipping: Vec<(String, Cost)> = Vec::new();
        let mut products = 0;

        for (choices, pick) in options.iter().zip(&picks) {
            let (vendor, price, ship) = choices.get(*pick).ok_or("pick out of range")?;
            products += price;

            match shipping.iter_mut().find(|(name, _)| name == vendor) {
                Some((_, max)) => *max = (*max).max(*ship),
                None => shipping.push((vendor.clone(), *ship)),
            }
        }

        best = best.min(products + shipping.iter().map(|(_, ship)| ship).sum::<Cost>());

        let mut position = 0;

        loop {
            let Some(pick) = picks.get_mut(position) else {
                return Ok(best);
            };

            let len = options.get(position).map_or(0, Vec::len);

            *pick += 1;

            if *pick < len {
                break;
            }

            *pick = 0;
            position += 1;
        }
    }
}

#[derive(Debug, Default)]
struct RecordingObserver {
    bound_pruned: Mutex<Vec<Vec<usize>>>,
    evaluated: Mutex<Vec<Vec<usize>>>,
}

impl SearchObserver for RecordingObserver {
    fn on_bound_pruned(&self, subset: &[usize], _lower_bound: Cost, _incumbent: Cost) {
        if let Ok(mut pruned) = self.bound_pruned.lock() {
            pruned.push(subset.to_vec());
        }
    }

    fn on_evaluated(&self, subset: &[usize], _candidate: Option<&Candidate>) {
        if let Ok(mut evaluated) = self.evaluated.lock() {
            evaluated.push(subset.to_vec());
        }
    }
}

#[test]
fn subsets_bounded_above_the_incumbent_are_never_assigned() -> TestResult {
    let catalog = catalog(
        &["A", "B"],
        &[
            ("A", "X", 1_000, 0),
            ("B", "X", 1_000, 0),
            ("A", "Y", 100, 0),
            ("B", "Z", 3_000, 0),
        ],
    )?;

    let lookup = Lookup::new(&catalog, catalog.component_keys())?;

    let index = |name: &str| {
        (0..lookup.vendor_count())
            .find(|&v| lookup.vendor_name(v) == name)
            .ok_or("unknown vendor")
    };

    let mut expensive_pair = vec![index("Y")?, index("Z")?];
    expensive_pair.sort_unstable();

    assert_eq!(lookup.lower_bound(&expensive_pair), Some(3_100));

    let seed = single_vendor(&lookup, 0);
    assert_eq!(seed.as_ref().map(Candidate::cost), Some(2_000));

    let observer = RecordingObserver::default();
    let limits = SearchLimits {
        max_vendors: 2,
        minimum_order: 0,
        termination_threshold: None,
        deadline: None,
        workers: 1,
    };

    let outcome = BranchAndBound::new(&lookup, &GreedyRepair, &observer, limits)
        .run(SharedIncumbent::seeded(seed));

    let pruned = observer.bound_pruned.lock().map_err(|_err| "poisoned")?;
    let evaluated = observer.evaluated.lock().map_err(|_err| "poisoned")?;

    assert!(pruned.contains(&expensive_pair));
    assert!(!evaluated.contains(&expensive_pair));
    assert_eq!(outcome.best.as_ref().map(Candidate::cost), Some(1_100));

    Ok(())
}
