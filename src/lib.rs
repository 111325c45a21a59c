//! Quartermaster
//!
//! Quartermaster assembles cost-minimal shopping plans. Given the components a buyer needs and
//! the offers vendors publish for them, it picks one offer per component and groups the picks
//! into per-vendor orders, minimising the total spend while every vendor order clears that
//! vendor's minimum order value.
//!
//! The engine is a branch-and-bound search over vendor subsets with coverage and lower-bound
//! pruning, optional dominance filtering, and a swap-based repair step for minimum-order
//! violations. Loading listing tables and rendering reports are thin collaborators around it.

pub mod catalog;
pub mod config;
pub mod dominance;
pub mod listings;
pub mod lookup;
pub mod offers;
pub mod planner;
pub mod prelude;
pub mod pricing;
pub mod report;
pub mod solution;
pub mod solvers;
