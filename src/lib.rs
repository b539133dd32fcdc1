//! Clears an Energy Auction Component (EAC) market via a two-level
//! MILP/LP optimization loop with no-good cuts (spec §1).
//!
//! The entry point is [`orchestrator::run_market`]: it validates unit
//! capacities, builds and solves the Volume MILP ([`volume`]) alongside
//! the Pricing LP ([`pricing`]) across a bounded no-good-cut outer loop,
//! then rounds the converged continuous solution into integer dispatch
//! volumes ([`rounding`]) that conserve energy per product.

pub mod config;
pub mod domain;
pub mod error;
pub mod orchestrator;
pub mod pricing;
pub mod rounding;
pub mod solver;
pub mod validators;
pub mod volume;

pub use config::ClearingConfig;
pub use domain::{Basket, BuyOrder, SellOrder, SellType};
pub use error::{EacError, Result};
pub use orchestrator::{run_market, ClearingRequest, ClearingResult};
