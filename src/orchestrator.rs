//! `run_market`: wires validators, the Volume MILP / no-good-cut outer
//! loop, the Pricing LP, and rounding into one clearing (spec §4.7, §6).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info_span;

use crate::config::ClearingConfig;
use crate::domain::{Basket, BasketId, BuyOrder, FamilyId, OrderId, ProductId, SellOrder, UnitId};
use crate::error::{EacError, Result};
use crate::rounding::round_and_redistribute;
use crate::solver::Status;
use crate::validators::validate_unit_capacity;
use crate::volume::solve_with_pricing_loop;

/// Bundles everything one clearing needs (spec §6: "folding the positional
/// parameter list into one struct, `serde`-deserializable").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearingRequest {
    pub products: Vec<ProductId>,
    pub buy_orders: Vec<BuyOrder>,
    pub sell_orders: Vec<SellOrder>,
    pub baskets: BTreeMap<BasketId, Basket>,
    #[serde(default)]
    pub unit_capacity_registry: BTreeMap<UnitId, f64>,
    #[serde(default)]
    pub overholding: BTreeMap<ProductId, f64>,
    #[serde(default)]
    pub config: ClearingConfig,
}

/// The final or exhausted clearing (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearingResult {
    pub x_b: BTreeMap<OrderId, f64>,
    pub x_s: BTreeMap<OrderId, f64>,
    pub y_parent: BTreeMap<BasketId, f64>,
    pub prices_unrounded: Option<BTreeMap<ProductId, f64>>,
    pub prices_status: Option<String>,
    pub milp_status: String,
    pub r#final: bool,
    pub iterations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prices_rounded: Option<BTreeMap<ProductId, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sell_round: Option<BTreeMap<OrderId, i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buy_round: Option<BTreeMap<OrderId, i64>>,
}

fn status_str(status: Status) -> String {
    match status {
        Status::Optimal => "Optimal",
        Status::Feasible => "Feasible",
        Status::Infeasible => "Infeasible",
        Status::Unbounded => "Unbounded",
        Status::NotSolved => "NotSolved",
        Status::Undefined => "Undefined",
    }
    .to_string()
}

/// Groups buy orders by their optional `family` field, in ascending id
/// order within each group, so [`crate::volume`]'s constraint 7 ("buy
/// substitutability families", spec §4.4) has something to iterate.
/// `original_source/eac/orchestrator.py` never wires this parameter
/// through from `run_market` even though `Volume.py` accepts it — a
/// `BuyOrder.family` field with no constraint behind it would make the
/// distilled spec's "optional substitutability-family id" attribute
/// (§3) dead weight, so this reimplementation derives the grouping from
/// the field instead of leaving it unused (see DESIGN.md).
fn buy_substitutability_families(buy_orders: &[BuyOrder]) -> BTreeMap<FamilyId, Vec<OrderId>> {
    let mut families: BTreeMap<FamilyId, Vec<OrderId>> = BTreeMap::new();
    for b in buy_orders {
        if let Some(family) = &b.family {
            families.entry(family.clone()).or_default().push(b.id.clone());
        }
    }
    for members in families.values_mut() {
        members.sort();
    }
    families
}

/// Runs one clearing end to end (spec §4.7, §6).
///
/// Validates unit capacities synchronously before any solve (spec §7: a
/// validation failure is raised before the Volume MILP is even built).
/// Drives the no-good-cut outer loop; if it converges (`final == true`),
/// additionally rounds prices and volumes and repairs per-product
/// residuals.
pub fn run_market(request: &ClearingRequest) -> Result<ClearingResult> {
    let _span = info_span!("run_market", products = request.products.len()).entered();

    let problems = validate_unit_capacity(
        &request.sell_orders,
        &request.baskets,
        &request.unit_capacity_registry,
        request.config.eps_cap,
    );
    if !problems.is_empty() {
        return Err(EacError::Validation(problems));
    }

    let families = buy_substitutability_families(&request.buy_orders);

    let outcome = solve_with_pricing_loop(
        &request.products,
        &request.buy_orders,
        &request.sell_orders,
        &request.baskets,
        &families,
        &request.overholding,
        &request.config,
    );

    let mut result = ClearingResult {
        x_b: outcome.x_b,
        x_s: outcome.x_s,
        y_parent: outcome.y_parent,
        prices_unrounded: outcome.prices_unrounded,
        prices_status: outcome.prices_status.map(status_str),
        milp_status: status_str(outcome.milp_status),
        r#final: outcome.final_,
        iterations: outcome.iterations,
        prices_rounded: None,
        sell_round: None,
        buy_round: None,
    };

    if result.r#final {
        let prices_unrounded = result.prices_unrounded.clone().unwrap_or_default();
        let rounding = round_and_redistribute(
            &request.products,
            &prices_unrounded,
            &result.x_s,
            &request.sell_orders,
            &result.x_b,
            &outcome.buy_orders_extended,
        );
        result.prices_rounded = Some(rounding.prices_rounded);
        result.sell_round = Some(rounding.sell_round);
        result.buy_round = Some(rounding.buy_round);
    }

    Ok(result)
}
