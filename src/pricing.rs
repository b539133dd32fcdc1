//! Pricing LP: given fixed acceptances, derive per-product prices that
//! minimize procurement cost subject to seller non-negative-surplus
//! constraints (spec §4.3).

use std::collections::BTreeMap;

use crate::config::ClearingConfig;
use crate::domain::{Basket, BasketId, OrderId, ProductId, SellOrder, SellType};
use crate::solver::{ObjSense, Problem, Sense, Status, VarKind};
use crate::validators::build_loop_families;

/// Result of one Pricing LP solve.
pub struct PricingResult {
    pub prices: BTreeMap<ProductId, f64>,
    pub status: Status,
}

/// Solves the Pricing LP for the fixed acceptance vector `x_s`.
///
/// Variables: `p[product]` in `[price_min, price_max]`.
/// Objective: minimize procurement cost over accepted sells
/// (`x_s[s] > eps_accept`).
/// Constraints: child/substitutable_child non-negative surplus per order;
/// basket net non-negativity for non-looped baskets; loop-family net
/// non-negativity aggregated across the family (spec §4.3).
pub fn solve_pricing_lp(
    products: &[ProductId],
    sells: &[SellOrder],
    x_s: &BTreeMap<OrderId, f64>,
    baskets: &BTreeMap<BasketId, Basket>,
    config: &ClearingConfig,
) -> PricingResult {
    let accepted = |s: &SellOrder| -> f64 { x_s.get(&s.id).copied().unwrap_or(0.0) };

    // Objective: minimize Σ p[q] * s.qty[q] * x_s[s] over accepted sells.
    // The solver backend takes a variable's objective coefficient at
    // creation time, so the per-product coefficient is accumulated first
    // and the price variables are created with it already summed.
    let mut obj_coef: BTreeMap<ProductId, f64> = products.iter().map(|p| (p.clone(), 0.0)).collect();
    for s in sells {
        let x_fixed = accepted(s);
        if x_fixed > config.eps_accept {
            for (product, qty) in &s.qty {
                if qty.abs() > config.eps_accept {
                    *obj_coef.entry(product.clone()).or_insert(0.0) += qty * x_fixed;
                }
            }
        }
    }

    let mut problem = Problem::new(ObjSense::Minimize, config.verbosity);
    let price_vars: BTreeMap<ProductId, _> = products
        .iter()
        .map(|p| {
            let handle = problem.add_var(
                format!("price_{p}"),
                VarKind::Continuous { lb: config.price_min, ub: config.price_max },
                *obj_coef.get(p).unwrap_or(&0.0),
            );
            (p.clone(), handle)
        })
        .collect();

    // Child / substitutable_child non-negative surplus, per accepted order.
    for s in sells {
        let x_fixed = accepted(s);
        if x_fixed <= config.eps_accept {
            continue;
        }
        if !matches!(s.sell_type, SellType::Child | SellType::SubstitutableChild) {
            continue;
        }
        let total_qty = s.total_qty();
        if total_qty <= config.eps_accept {
            continue;
        }
        // revenue - required >= 0  <=>  Σ qty[p]*x_fixed * price[p] >= price_bid*total_qty*x_fixed
        let terms: Vec<_> = s
            .qty
            .iter()
            .filter(|(_, q)| q.abs() > config.eps_accept)
            .map(|(p, q)| (price_vars[p], q * x_fixed))
            .collect();
        let required = s.price * total_qty * x_fixed;
        problem.add_linear_constraint(format!("child_nonneg_{}", s.id), &terms, Sense::Ge, required);
    }

    // Basket net non-negativity (non-looped baskets) and loop-family net
    // non-negativity (looped baskets, aggregated across the family).
    let mut sells_by_basket: BTreeMap<BasketId, Vec<&SellOrder>> = BTreeMap::new();
    for s in sells {
        sells_by_basket.entry(s.basket.clone()).or_default().push(s);
    }

    let loop_families = build_loop_families(baskets);
    let baskets_in_loops: std::collections::BTreeSet<BasketId> =
        loop_families.iter().flatten().cloned().collect();

    let net_terms_for = |orders: &[&SellOrder]| -> (Vec<(crate::solver::VarHandle, f64)>, f64) {
        let mut terms: Vec<(crate::solver::VarHandle, f64)> = Vec::new();
        let mut const_offset = 0.0;
        for s in orders {
            let x_fixed = accepted(s);
            if x_fixed <= config.eps_accept {
                continue;
            }
            for (p, q) in &s.qty {
                if q.abs() > config.eps_accept {
                    terms.push((price_vars[p], q * x_fixed));
                }
            }
            const_offset -= s.price * s.total_qty() * x_fixed;
        }
        (terms, const_offset)
    };

    for (basket_id, orders) in &sells_by_basket {
        if baskets_in_loops.contains(basket_id) {
            continue;
        }
        let (terms, const_offset) = net_terms_for(orders);
        if !terms.is_empty() {
            // Σ (revenue - cost) >= 0  <=>  Σ terms >= -const_offset
            problem.add_linear_constraint(format!("basket_net_{basket_id}"), &terms, Sense::Ge, -const_offset);
        }
    }

    for family in &loop_families {
        let mut fam_orders: Vec<&SellOrder> = Vec::new();
        for basket_id in family {
            if let Some(orders) = sells_by_basket.get(basket_id) {
                fam_orders.extend(orders.iter().copied());
            }
        }
        let (terms, const_offset) = net_terms_for(&fam_orders);
        if !terms.is_empty() {
            let name = format!(
                "loop_net_{}",
                family.iter().map(|b| b.as_str()).collect::<Vec<_>>().join("_")
            );
            problem.add_linear_constraint(name, &terms, Sense::Ge, -const_offset);
        }
    }

    let outcome = problem.solve();
    let prices = products
        .iter()
        .map(|p| (p.clone(), outcome.value(price_vars[p])))
        .collect();

    PricingResult { prices, status: outcome.status }
}
