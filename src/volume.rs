//! Volume MILP construction and the no-good-cut outer loop (spec §4.4, §4.5).

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::config::ClearingConfig;
use crate::domain::{Basket, BasketId, BuyOrder, FamilyId, OrderId, ProductId, SellOrder, SellType};
use crate::pricing::solve_pricing_lp;
use crate::solver::{ObjSense, Problem, Sense, Status, VarHandle, VarKind};
use crate::validators::build_loop_families;

/// Everything the outer loop threads through iterations: the live
/// variable handles plus enough bookkeeping to extract a result.
struct VolumeModel {
    problem: Problem,
    x_b: BTreeMap<OrderId, VarHandle>,
    x_s: BTreeMap<OrderId, VarHandle>,
    y_parent: BTreeMap<BasketId, VarHandle>,
    buy_orders_extended: Vec<BuyOrder>,
}

/// The outcome of driving the outer loop to completion or exhaustion.
pub struct VolumeOutcome {
    pub x_b: BTreeMap<OrderId, f64>,
    pub x_s: BTreeMap<OrderId, f64>,
    pub y_parent: BTreeMap<BasketId, f64>,
    pub prices_unrounded: Option<BTreeMap<ProductId, f64>>,
    pub prices_status: Option<Status>,
    pub milp_status: Status,
    pub final_: bool,
    pub iterations: u32,
    pub buy_orders_extended: Vec<BuyOrder>,
}

/// Builds the Volume MILP: variables `x_b`, `x_s`, `y_parent`, and
/// constraints 1-8 of spec §4.4. `overholding` synthesizes one phantom
/// buy order per `(product, volume)` entry with `volume > 0` (spec §4.4
/// "extended buy orders").
fn build_volume_model(
    products: &[ProductId],
    buy_orders: &[BuyOrder],
    sell_orders: &[SellOrder],
    baskets: &BTreeMap<BasketId, Basket>,
    substitutability_families_buy: &BTreeMap<FamilyId, Vec<OrderId>>,
    overholding: &BTreeMap<ProductId, f64>,
    config: &ClearingConfig,
) -> VolumeModel {
    let mut buy_orders_extended: Vec<BuyOrder> = buy_orders.to_vec();
    for (product, volume) in overholding {
        if *volume > 0.0 {
            buy_orders_extended.push(BuyOrder::overholding(product.clone(), *volume));
        }
    }

    let mut problem = Problem::new(ObjSense::Maximize, config.verbosity);

    // Objective (welfare, spec §4.4): Σ b.price*b.volume*x_b[b] - Σ
    // s.price*total_qty(s)*x_s[s]. The solver backend takes a variable's
    // objective coefficient at creation time, so it is computed here,
    // per-order, before the variable is added.
    let x_b: BTreeMap<OrderId, VarHandle> = buy_orders_extended
        .iter()
        .map(|b| {
            let lb = b.min_acceptance_ratio.clamp(0.0, 1.0);
            let handle = problem.add_var(
                format!("x_b_{}", b.id),
                VarKind::Continuous { lb, ub: 1.0 },
                b.price * b.volume,
            );
            (b.id.clone(), handle)
        })
        .collect();

    let x_s: BTreeMap<OrderId, VarHandle> = sell_orders
        .iter()
        .map(|s| {
            let obj = -s.price * s.total_qty();
            let handle = match s.sell_type {
                SellType::Parent => problem.add_var(format!("x_s_{}", s.id), VarKind::Binary, obj),
                _ => {
                    let lb = s.effective_min_acceptance();
                    problem.add_var(format!("x_s_{}", s.id), VarKind::Continuous { lb, ub: 1.0 }, obj)
                }
            };
            (s.id.clone(), handle)
        })
        .collect();

    let y_parent: BTreeMap<BasketId, VarHandle> = baskets
        .keys()
        .map(|b_id| (b_id.clone(), problem.add_var(format!("y_parent_{b_id}"), VarKind::Binary, 0.0)))
        .collect();

    // Constraint 1: parent linkage.
    let mut parent_by_basket: BTreeMap<BasketId, OrderId> = BTreeMap::new();
    for s in sell_orders {
        if s.sell_type == SellType::Parent {
            parent_by_basket.insert(s.basket.clone(), s.id.clone());
        }
    }
    for (basket_id, parent_id) in &parent_by_basket {
        problem.add_linear_constraint(
            format!("parent_accept_equals_y_{basket_id}"),
            &[(x_s[parent_id], 1.0), (y_parent[basket_id], -1.0)],
            Sense::Eq,
            0.0,
        );
    }

    // Constraint 2: child gating.
    for s in sell_orders {
        if matches!(s.sell_type, SellType::Child | SellType::SubstitutableChild) {
            problem.add_linear_constraint(
                format!("child_less_than_parent_{}", s.id),
                &[(x_s[&s.id], 1.0), (y_parent[&s.basket], -1.0)],
                Sense::Le,
                0.0,
            );
        }
    }

    // Constraint 3: substitutability per basket.
    let mut subs_by_basket: BTreeMap<BasketId, Vec<OrderId>> = BTreeMap::new();
    for s in sell_orders {
        if s.sell_type == SellType::SubstitutableChild {
            subs_by_basket.entry(s.basket.clone()).or_default().push(s.id.clone());
        }
    }
    for (basket_id, subs) in &subs_by_basket {
        let terms: Vec<_> = subs.iter().map(|id| (x_s[id], 1.0)).collect();
        problem.add_linear_constraint(format!("subs_family_basket_{basket_id}"), &terms, Sense::Le, 1.0);
    }

    // Constraint 4: concomitance, emitted once per unordered pair in
    // lexicographic order (spec §9 determinism of enumeration).
    for (b_id, info) in baskets {
        for other in &info.concomitant {
            if b_id < other {
                problem.add_linear_constraint(
                    format!("mutual_exclusive_{b_id}_{other}"),
                    &[(y_parent[b_id], 1.0), (y_parent[other], 1.0)],
                    Sense::Le,
                    1.0,
                );
            }
        }
    }

    // Constraint 5: loop equality, chained to the lexicographically first
    // family member.
    for family in build_loop_families(baskets) {
        let mut members: Vec<BasketId> = family.into_iter().collect();
        members.sort();
        let base = members[0].clone();
        for other in &members[1..] {
            problem.add_linear_constraint(
                format!("loop_eq_{base}_{other}"),
                &[(y_parent[&base], 1.0), (y_parent[other], -1.0)],
                Sense::Eq,
                0.0,
            );
        }
    }

    // Constraint 6: per-product energy balance.
    for p in products {
        let mut terms: Vec<(VarHandle, f64)> = Vec::new();
        for s in sell_orders {
            if let Some(q) = s.qty.get(p) {
                if q.abs() > config.eps_accept {
                    terms.push((x_s[&s.id], *q));
                }
            }
        }
        for b in &buy_orders_extended {
            if &b.product == p {
                terms.push((x_b[&b.id], -b.volume));
            }
        }
        problem.add_linear_constraint(format!("balance_product_{p}"), &terms, Sense::Eq, 0.0);
    }

    // Constraint 7: buy substitutability families.
    for (fam_id, members) in substitutability_families_buy {
        let terms: Vec<_> = members.iter().map(|id| (x_b[id], 1.0)).collect();
        problem.add_linear_constraint(format!("buy_subs_family_{fam_id}"), &terms, Sense::Le, 1.0);
    }

    // Constraint 8: redundant bound reassertions (defensive, retained for
    // solver hygiene per spec §4.4).
    for b in &buy_orders_extended {
        problem.add_linear_constraint(format!("x_b_ub_{}", b.id), &[(x_b[&b.id], 1.0)], Sense::Le, 1.0);
        problem.add_linear_constraint(format!("x_b_lb_{}", b.id), &[(x_b[&b.id], 1.0)], Sense::Ge, 0.0);
    }
    for s in sell_orders {
        problem.add_linear_constraint(format!("x_s_ub_{}", s.id), &[(x_s[&s.id], 1.0)], Sense::Le, 1.0);
        problem.add_linear_constraint(format!("x_s_lb_{}", s.id), &[(x_s[&s.id], 1.0)], Sense::Ge, 0.0);
    }

    VolumeModel { problem, x_b, x_s, y_parent, buy_orders_extended }
}

/// Drives the no-good-cut outer loop (spec §4.5) to completion or
/// exhaustion at `config.max_retries`.
pub fn solve_with_pricing_loop(
    products: &[ProductId],
    buy_orders: &[BuyOrder],
    sell_orders: &[SellOrder],
    baskets: &BTreeMap<BasketId, Basket>,
    substitutability_families_buy: &BTreeMap<FamilyId, Vec<OrderId>>,
    overholding: &BTreeMap<ProductId, f64>,
    config: &ClearingConfig,
) -> VolumeOutcome {
    let mut model = build_volume_model(
        products,
        buy_orders,
        sell_orders,
        baskets,
        substitutability_families_buy,
        overholding,
        config,
    );

    let mut seen_parent_patterns: BTreeSet<BTreeSet<BasketId>> = BTreeSet::new();
    let mut nogood_counter: u64 = 0;

    let mut last_x_b = BTreeMap::new();
    let mut last_x_s = BTreeMap::new();
    let mut last_y_parent = BTreeMap::new();
    let mut last_prices: Option<BTreeMap<ProductId, f64>> = None;
    let mut last_price_status: Option<Status> = None;
    let mut last_milp_status = Status::NotSolved;

    for iteration in 1..=config.max_retries {
        let outcome = model.problem.solve();
        last_milp_status = outcome.status;

        let x_b_val: BTreeMap<OrderId, f64> =
            model.x_b.iter().map(|(id, h)| (id.clone(), outcome.value(*h))).collect();
        let x_s_val: BTreeMap<OrderId, f64> =
            model.x_s.iter().map(|(id, h)| (id.clone(), outcome.value(*h))).collect();
        let y_parent_val: BTreeMap<BasketId, f64> =
            model.y_parent.iter().map(|(id, h)| (id.clone(), outcome.value(*h))).collect();

        last_x_b = x_b_val.clone();
        last_x_s = x_s_val.clone();
        last_y_parent = y_parent_val.clone();

        if !outcome.status.is_ok_for_extraction() {
            return VolumeOutcome {
                x_b: last_x_b,
                x_s: last_x_s,
                y_parent: last_y_parent,
                prices_unrounded: None,
                prices_status: None,
                milp_status: last_milp_status,
                final_: false,
                iterations: iteration,
                buy_orders_extended: model.buy_orders_extended,
            };
        }

        let accepted_parents: BTreeSet<BasketId> = y_parent_val
            .iter()
            .filter(|(_, v)| **v > 0.5)
            .map(|(b, _)| b.clone())
            .collect();

        if seen_parent_patterns.contains(&accepted_parents) {
            if accepted_parents.is_empty() {
                // spec §9 open question: the literal cut here is vacuously
                // infeasible; skip insertion and let the retry counter
                // advance instead.
                warn!("empty accepted-parent pattern repeated; skipping no-good cut for this iteration");
            } else {
                nogood_counter += 1;
                add_pattern_cut(&mut model.problem, &model.y_parent, &accepted_parents, nogood_counter);
            }
            continue;
        }
        seen_parent_patterns.insert(accepted_parents.clone());

        let pricing = solve_pricing_lp(products, sell_orders, &x_s_val, baskets, config);
        last_prices = Some(pricing.prices.clone());
        last_price_status = Some(pricing.status);

        debug!(
            iteration,
            milp_status = ?last_milp_status,
            price_status = ?pricing.status,
            accepted = accepted_parents.len(),
            "outer loop iteration"
        );

        if pricing.status != Status::Optimal {
            nogood_counter += 1;
            add_rejection_cut(&mut model.problem, &model.y_parent, &accepted_parents, nogood_counter);
            continue;
        }

        let mut buy_violating = false;
        for b in &model.buy_orders_extended {
            let ratio = x_b_val.get(&b.id).copied().unwrap_or(0.0);
            if ratio <= config.eps_accept {
                continue;
            }
            let clearing_price = pricing.prices.get(&b.product).copied().unwrap_or(0.0);
            let surplus = (b.price - clearing_price) * b.volume * ratio;
            if surplus < -config.eps_surplus && !b.paradoxical {
                buy_violating = true;
            }
        }

        if buy_violating {
            nogood_counter += 1;
            add_rejection_cut(&mut model.problem, &model.y_parent, &accepted_parents, nogood_counter);
            continue;
        }

        return VolumeOutcome {
            x_b: x_b_val,
            x_s: x_s_val,
            y_parent: y_parent_val,
            prices_unrounded: last_prices,
            prices_status: last_price_status,
            milp_status: last_milp_status,
            final_: true,
            iterations: iteration,
            buy_orders_extended: model.buy_orders_extended,
        };
    }

    VolumeOutcome {
        x_b: last_x_b,
        x_s: last_x_s,
        y_parent: last_y_parent,
        prices_unrounded: last_prices,
        prices_status: last_price_status,
        milp_status: last_milp_status,
        final_: false,
        iterations: config.max_retries,
        buy_orders_extended: model.buy_orders_extended,
    }
}

/// `Σ y_parent[b in accepted] <= max(0, |accepted| - 1)`, used both by the
/// pattern-repeat guard (non-empty branch) and as the shared shape of the
/// pricing-infeasibility / paradoxical-buy cuts (spec §4.5 steps 3/5/7).
fn add_pattern_cut(
    problem: &mut Problem,
    y_parent: &BTreeMap<BasketId, VarHandle>,
    accepted_parents: &BTreeSet<BasketId>,
    nogood_counter: u64,
) {
    let terms: Vec<_> = accepted_parents.iter().map(|b| (y_parent[b], 1.0)).collect();
    let rhs = accepted_parents.len().saturating_sub(1) as f64;
    problem.add_linear_constraint(format!("nogood_repeat_{nogood_counter}"), &terms, Sense::Le, rhs);
}

/// The two-branch cut from spec §4.5 steps 5/7: force-commit at least one
/// basket when nothing was accepted, otherwise exclude the exact
/// commitment pattern just explored.
fn add_rejection_cut(
    problem: &mut Problem,
    y_parent: &BTreeMap<BasketId, VarHandle>,
    accepted_parents: &BTreeSet<BasketId>,
    nogood_counter: u64,
) {
    if accepted_parents.is_empty() {
        let terms: Vec<_> = y_parent.values().map(|h| (*h, 1.0)).collect();
        problem.add_linear_constraint(format!("nogood_nonzero_{nogood_counter}"), &terms, Sense::Ge, 1.0);
    } else {
        let terms: Vec<_> = accepted_parents.iter().map(|b| (y_parent[b], 1.0)).collect();
        let rhs = accepted_parents.len().saturating_sub(1) as f64;
        problem.add_linear_constraint(format!("nogood_cut_{nogood_counter}"), &terms, Sense::Le, rhs);
    }
}
