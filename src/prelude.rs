//! Quartermaster prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    catalog::{Catalog, CatalogBuilder, CatalogError, ComponentKey, OfferRow, VendorKey},
    config::{
        ConfigurationError, PlannerConfig, PlannerSettings, StrategyKind, UncoveredPolicy,
    },
    dominance::DominanceFilter,
    listings::{ListingError, ShoppingList, load_catalog},
    lookup::Lookup,
    offers::{Offer, OfferKey},
    planner::{PlanOutcome, PlanResult, Planner, PlannerError},
    pricing::Cost,
    report::{PlanReport, ReportError},
    solution::{OrderLine, Solution, SolutionError, VendorOrder},
    solvers::{
        AssignmentStrategy, BranchAndBound, Candidate, Exhaustive, GreedyRepair, NoopObserver,
        SearchLimits, SearchObserver, SearchOutcome, SearchStatistics, SharedIncumbent,
        TerminationReason, single_vendor,
    },
};
