//! Planner
//!
//! Orchestrates one planning run: resolve the required components, build the lookup, filter
//! dominated vendors, seed the incumbent with the best single-vendor plan, run the
//! branch-and-bound search and materialise the winner.

use std::time::Instant;

use fixedbitset::FixedBitSet;
use rusty_money::MoneyError;
use thiserror::Error;
use tracing::{debug, info, info_span};

use crate::{
    catalog::{Catalog, CatalogError, ComponentKey},
    config::{ConfigurationError, PlannerConfig, StrategyKind, UncoveredPolicy},
    dominance::DominanceFilter,
    lookup::Lookup,
    pricing::{Cost, PricingError, percent_of_minor},
    solution::{Solution, SolutionError},
    solvers::{
        AssignmentStrategy, BranchAndBound, Candidate, Exhaustive, GreedyRepair, NoopObserver,
        SearchLimits, SearchObserver, SearchStatistics, SharedIncumbent, TerminationReason,
        single_vendor,
    },
};

/// Errors that stop a planning run before or during the search.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// Wrapped configuration error
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Wrapped catalog error
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Wrapped pricing error
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// Wrapped solution materialisation error
    #[error(transparent)]
    Solution(#[from] SolutionError),
}

/// Final result of a planning run.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanResult<'a> {
    /// A plan satisfying coverage and minimum-order constraints
    Solved(Solution<'a>),

    /// No vendor subset within the cap yields a valid plan
    Infeasible,
}

impl<'a> PlanResult<'a> {
    /// The plan, if one was found.
    pub fn solution(&self) -> Option<&Solution<'a>> {
        match self {
            Self::Solved(solution) => Some(solution),
            Self::Infeasible => None,
        }
    }

    /// Whether no plan was found.
    pub fn is_infeasible(&self) -> bool {
        matches!(self, Self::Infeasible)
    }
}

/// Plan result together with run metadata.
#[derive(Debug, Clone)]
pub struct PlanOutcome<'a> {
    /// Plan or infeasibility
    pub result: PlanResult<'a>,

    /// Why the search stopped
    pub termination: TerminationReason,

    /// Counters collected during the run
    pub statistics: SearchStatistics,

    /// Required components dropped because no vendor offers them
    pub excluded_components: Vec<ComponentKey>,

    /// Components the plan covers, in catalog order
    pub required_components: Vec<ComponentKey>,
}

/// Cost-minimal shopping planner.
#[derive(Debug, Clone)]
pub struct Planner {
    config: PlannerConfig,
}

impl Planner {
    /// Create a planner.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the configuration is out of range.
    pub fn new(config: PlannerConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;

        Ok(Self { config })
    }

    /// Configuration in use.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan purchases for every component of `catalog`.
    ///
    /// # Errors
    ///
    /// Returns a [`PlannerError`] if the catalog cannot be planned over. Infeasibility is
    /// reported through [`PlanResult::Infeasible`].
    pub fn plan<'a>(&self, catalog: &Catalog<'a>) -> Result<PlanOutcome<'a>, PlannerError> {
        self.plan_with_observer(catalog, &NoopObserver)
    }

    /// Plan with an observer receiving search events.
    ///
    /// # Errors
    ///
    /// Returns a [`PlannerError`] if the catalog cannot be planned over.
    pub fn plan_with_observer<'a>(
        &self,
        catalog: &Catalog<'a>,
        observer: &dyn SearchObserver,
    ) -> Result<PlanOutcome<'a>, PlannerError> {
        let span = info_span!("plan", components = catalog.component_count());
        let _enter = span.enter();

        let started = Instant::now();

        if catalog.currency() != self.config.currency {
            return Err(CatalogError::CurrencyMismatch(
                catalog.currency().iso_alpha_code,
                self.config.currency.iso_alpha_code,
            )
            .into());
        }

        let (required, excluded_components) = self.required_components(catalog)?;

        let mut lookup = Lookup::new(catalog, &required)?;
        let vendors_before_filter = lookup.vendor_count();

        self.filter_dominated(&mut lookup);

        info!(
            components = lookup.component_count(),
            vendors = lookup.vendor_count(),
            excluded = excluded_components.len(),
            global_lower_bound = lookup.global_lower_bound(),
            "planning"
        );

        let seed = single_vendor(&lookup, self.config.minimum_order);

        debug!(cost = seed.as_ref().map(Candidate::cost), "single-vendor baseline");

        let strategy: Box<dyn AssignmentStrategy> = match self.config.strategy {
            StrategyKind::GreedyRepair => Box::new(GreedyRepair),
            StrategyKind::Exhaustive => Box::new(Exhaustive::new(self.config.exhaustive_node_limit)),
        };

        let limits = SearchLimits {
            max_vendors: self.config.max_vendor_combinations,
            minimum_order: self.config.minimum_order,
            termination_threshold: Some(self.termination_threshold(lookup.global_lower_bound())?),
            deadline: self.config.timeout.and_then(|timeout| started.checked_add(timeout)),
            workers: self.config.workers,
        };

        let search = BranchAndBound::new(&lookup, strategy.as_ref(), observer, limits);
        let outcome = search.run(SharedIncumbent::seeded(seed));

        let mut statistics = outcome.statistics;
        statistics.global_lower_bound = lookup.global_lower_bound();
        statistics.vendors_before_filter = u64::try_from(vendors_before_filter).unwrap_or(u64::MAX);
        statistics.vendors_after_filter = u64::try_from(lookup.vendor_count()).unwrap_or(u64::MAX);
        statistics.time_total = started.elapsed();

        let result = match outcome.best {
            Some(best) => PlanResult::Solved(Solution::from_candidate(catalog, &lookup, &best)?),
            None => PlanResult::Infeasible,
        };

        info!(
            cost = result.solution().map(Solution::total_cost_minor),
            termination = %outcome.termination,
            elapsed = ?statistics.time_total,
            "planning finished"
        );

        Ok(PlanOutcome {
            result,
            termination: outcome.termination,
            statistics,
            excluded_components,
            required_components: required,
        })
    }

    fn required_components(
        &self,
        catalog: &Catalog<'_>,
    ) -> Result<(Vec<ComponentKey>, Vec<ComponentKey>), CatalogError> {
        let uncovered = catalog.uncovered_components();

        if catalog.component_count() == 0 {
            return Err(CatalogError::NoComponents);
        }

        match (self.config.uncovered_components, uncovered.first()) {
            (_, None) => Ok((catalog.component_keys().to_vec(), Vec::new())),
            (UncoveredPolicy::Fail, Some(first)) => Err(CatalogError::UncoveredComponent(
                catalog.component_name(*first).to_string(),
            )),
            (UncoveredPolicy::Exclude, Some(_first)) => {
                for key in &uncovered {
                    info!(component = catalog.component_name(*key), "excluding uncovered component");
                }

                let required: Vec<ComponentKey> = catalog
                    .component_keys()
                    .iter()
                    .copied()
                    .filter(|key| !uncovered.contains(key))
                    .collect();

                if required.is_empty() {
                    return Err(CatalogError::NoComponents);
                }

                Ok((required, uncovered))
            }
        }
    }

    fn filter_dominated(&self, lookup: &mut Lookup) {
        if !self.config.dominance_filter {
            return;
        }

        if self.config.minimum_order > 0 {
            debug!(
                minimum_order = self.config.minimum_order,
                "dominance filter skipped under a positive minimum order"
            );
            return;
        }

        let filter = DominanceFilter::compute(lookup);

        if filter.removed().is_empty() {
            return;
        }

        debug!(removed = filter.removed().len(), "dominated vendors removed");

        let survivors: FixedBitSet = filter.survivors().clone();
        lookup.retain_vendors(&survivors);
    }

    fn termination_threshold(&self, global_lower_bound: Cost) -> Result<Cost, PricingError> {
        let slack = percent_of_minor(&self.config.tolerance, global_lower_bound)?;

        Ok(global_lower_bound.saturating_add(slack))
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::EUR};
    use testresult::TestResult;

    use super::*;
    use crate::catalog::{CatalogBuilder, OfferRow};

    fn catalog(
        components: &[&str],
        rows: &[(&str, &str, i64, i64)],
    ) -> Result<Catalog<'static>, Box<dyn std::error::Error>> {
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

    fn config(minimum_order: Cost) -> PlannerConfig {
        PlannerConfig {
            minimum_order,
            workers: 1,
            ..PlannerConfig::default()
        }
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let result = Planner::new(PlannerConfig {
            max_vendor_combinations: 0,
            ..PlannerConfig::default()
        });

        assert!(matches!(result, Err(ConfigurationError::InvalidVendorCap(0))));
    }

    #[test]
    fn uncovered_components_fail_by_default() -> TestResult {
        let catalog = catalog(&["CPU", "GPU"], &[("CPU", "X", 100, 5)])?;
        let planner = Planner::new(config(0))?;

        let result = planner.plan(&catalog);

        assert!(matches!(
            result,
            Err(PlannerError::Catalog(CatalogError::UncoveredComponent(name))) if name == "GPU"
        ));

        Ok(())
    }

    #[test]
    fn uncovered_components_can_be_excluded() -> TestResult {
        let catalog = catalog(&["CPU", "GPU"], &[("CPU", "X", 100, 5)])?;
        let planner = Planner::new(PlannerConfig {
            uncovered_components: UncoveredPolicy::Exclude,
            ..config(0)
        })?;

        let outcome = planner.plan(&catalog)?;
        let gpu = catalog.component_key("GPU").ok_or("GPU")?;

        assert_eq!(outcome.excluded_components, vec![gpu]);
        assert_eq!(
            outcome.result.solution().map(Solution::total_cost_minor),
            Some(105)
        );

        Ok(())
    }

    #[test]
    fn excluding_everything_leaves_nothing_to_plan() -> TestResult {
        let catalog = catalog(&["GPU"], &[])?;
        let planner = Planner::new(PlannerConfig {
            uncovered_components: UncoveredPolicy::Exclude,
            ..config(0)
        })?;

        assert!(matches!(
            planner.plan(&catalog),
            Err(PlannerError::Catalog(CatalogError::NoComponents))
        ));

        Ok(())
    }

    #[test]
    fn dominance_filter_shrinks_pool_without_minimum_order() -> TestResult {
        let catalog = catalog(
            &["CPU", "RAM"],
            &[
                ("CPU", "Big", 100, 5),
                ("RAM", "Big", 50, 5),
                ("RAM", "Small", 60, 5),
            ],
        )?;

        let filtered = Planner::new(config(0))?.plan(&catalog)?;
        let guarded = Planner::new(config(10))?.plan(&catalog)?;

        assert_eq!(filtered.statistics.vendors_before_filter, 2);
        assert_eq!(filtered.statistics.vendors_after_filter, 1);
        assert_eq!(guarded.statistics.vendors_after_filter, 2);

        assert_eq!(
            filtered.result.solution().map(Solution::total_cost_minor),
            guarded.result.solution().map(Solution::total_cost_minor)
        );

        Ok(())
    }

    #[test]
    fn catalog_currency_must_match() -> TestResult {
        let catalog = catalog(&["CPU"], &[("CPU", "X", 100, 5)])?;
        let planner = Planner::new(PlannerConfig {
            currency: rusty_money::iso::GBP,
            ..config(0)
        })?;

        assert!(matches!(
            planner.plan(&catalog),
            Err(PlannerError::Catalog(CatalogError::CurrencyMismatch("EUR", "GBP")))
        ));

        Ok(())
    }
}
