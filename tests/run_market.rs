//! Whole-pipeline scenarios (spec §8) exercised through [`run_market`]
//! rather than any single module — these are the ten literal test cases
//! `original_source/eac_tests/testers.py` names, reimplemented against
//! this crate's types.

use std::collections::BTreeMap;

use approx::assert_abs_diff_eq;
use eac_clearing::domain::{Basket, BuyOrder, ProductId, SellOrder, SellType};
use eac_clearing::{run_market, ClearingRequest};

fn qty(pairs: &[(&str, f64)]) -> BTreeMap<ProductId, f64> {
    pairs.iter().map(|(p, v)| (ProductId::from(*p), *v)).collect()
}

fn welfare(
    buys: &[BuyOrder],
    x_b: &BTreeMap<eac_clearing::domain::OrderId, f64>,
    sells: &[SellOrder],
    x_s: &BTreeMap<eac_clearing::domain::OrderId, f64>,
) -> f64 {
    let buy_side: f64 = buys.iter().map(|b| b.price * b.volume * x_b.get(&b.id).copied().unwrap_or(0.0)).sum();
    let sell_side: f64 = sells
        .iter()
        .map(|s| s.price * s.total_qty() * x_s.get(&s.id).copied().unwrap_or(0.0))
        .sum();
    buy_side - sell_side
}

/// Test 2: single buy, single sell (50 POWER @ bid 100 / ask 60, cap 100).
#[test]
fn single_buy_single_sell() {
    let products = vec![ProductId::from("POWER")];
    let buy_orders = vec![BuyOrder::new("BUY_1", "POWER", 100.0, 50.0).with_paradoxical(false)];
    let sell_orders =
        vec![SellOrder::new("SELL_1", "BASKET_1", SellType::Parent, qty(&[("POWER", 50.0)]), 60.0)];
    let baskets = BTreeMap::from([("BASKET_1".into(), Basket::new("BASKET_1", "UNIT_1"))]);
    let unit_capacity_registry = BTreeMap::from([("UNIT_1".into(), 100.0)]);

    let request = ClearingRequest {
        products,
        buy_orders: buy_orders.clone(),
        sell_orders: sell_orders.clone(),
        baskets,
        unit_capacity_registry,
        overholding: BTreeMap::new(),
        config: Default::default(),
    };
    let result = run_market(&request).expect("capacity is valid");

    assert!(result.r#final);
    assert_abs_diff_eq!(result.x_b["BUY_1"], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(result.x_s["SELL_1"], 1.0, epsilon = 1e-6);
    assert_eq!(result.prices_rounded.unwrap()[&ProductId::from("POWER")], 60.0);
    assert_abs_diff_eq!(welfare(&buy_orders, &result.x_b, &sell_orders, &result.x_s), 2000.0, epsilon = 1e-4);
}

/// Test 3: two buys (30@100, 30@80) vs one sell (50@60).
#[test]
fn multiple_buys_single_sell() {
    let products = vec![ProductId::from("POWER")];
    let buy_orders = vec![
        BuyOrder::new("BUY_HIGH", "POWER", 100.0, 30.0).with_paradoxical(false),
        BuyOrder::new("BUY_LOW", "POWER", 80.0, 30.0).with_paradoxical(false),
    ];
    let sell_orders =
        vec![SellOrder::new("SELL_1", "BASKET_1", SellType::Parent, qty(&[("POWER", 50.0)]), 60.0)];
    let baskets = BTreeMap::from([("BASKET_1".into(), Basket::new("BASKET_1", "UNIT_1"))]);
    let unit_capacity_registry = BTreeMap::from([("UNIT_1".into(), 100.0)]);

    let request = ClearingRequest {
        products,
        buy_orders,
        sell_orders,
        baskets,
        unit_capacity_registry,
        overholding: BTreeMap::new(),
        config: Default::default(),
    };
    let result = run_market(&request).expect("capacity is valid");

    assert!(result.r#final);
    assert_abs_diff_eq!(result.x_b["BUY_HIGH"], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(result.x_b["BUY_LOW"], 2.0 / 3.0, epsilon = 1e-4);
    assert_abs_diff_eq!(result.x_s["SELL_1"], 1.0, epsilon = 1e-6);
    assert_eq!(result.prices_rounded.unwrap()[&ProductId::from("POWER")], 60.0);
}

/// Test 4: parent 50@60 + child 20@55, buy 60@100.
#[test]
fn parent_child_acceptance() {
    let products = vec![ProductId::from("POWER")];
    let buy_orders = vec![BuyOrder::new("BUY_1", "POWER", 100.0, 60.0).with_paradoxical(false)];
    let sell_orders = vec![
        SellOrder::new("SELL_PARENT", "BASKET_1", SellType::Parent, qty(&[("POWER", 50.0)]), 60.0),
        SellOrder::new("SELL_CHILD", "BASKET_1", SellType::Child, qty(&[("POWER", 20.0)]), 55.0),
    ];
    let baskets = BTreeMap::from([("BASKET_1".into(), Basket::new("BASKET_1", "UNIT_1"))]);
    let unit_capacity_registry = BTreeMap::from([("UNIT_1".into(), 100.0)]);

    let request = ClearingRequest {
        products,
        buy_orders: buy_orders.clone(),
        sell_orders: sell_orders.clone(),
        baskets,
        unit_capacity_registry,
        overholding: BTreeMap::new(),
        config: Default::default(),
    };
    let result = run_market(&request).expect("capacity is valid");

    assert!(result.r#final);
    assert_abs_diff_eq!(result.x_s["SELL_PARENT"], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(result.x_s["SELL_CHILD"], 0.5, epsilon = 1e-4);
    assert_eq!(result.prices_rounded.as_ref().unwrap()[&ProductId::from("POWER")], 60.0);
    assert_abs_diff_eq!(welfare(&buy_orders, &result.x_b, &sell_orders, &result.x_s), 2450.0, epsilon = 1e-4);
}

/// Test 5: two substitutable_children 30@60/30@65, buy 50@100.
#[test]
fn substitutable_children_accept_at_most_one() {
    let products = vec![ProductId::from("POWER")];
    let buy_orders = vec![BuyOrder::new("BUY_1", "POWER", 100.0, 50.0).with_paradoxical(false)];
    let sell_orders = vec![
        SellOrder::new("SELL_CHILD_1", "BASKET_1", SellType::SubstitutableChild, qty(&[("POWER", 30.0)]), 60.0),
        SellOrder::new("SELL_CHILD_2", "BASKET_1", SellType::SubstitutableChild, qty(&[("POWER", 30.0)]), 65.0),
    ];
    let baskets = BTreeMap::from([("BASKET_1".into(), Basket::new("BASKET_1", "UNIT_1"))]);
    let unit_capacity_registry = BTreeMap::from([("UNIT_1".into(), 100.0)]);

    let request = ClearingRequest {
        products,
        buy_orders: buy_orders.clone(),
        sell_orders: sell_orders.clone(),
        baskets,
        unit_capacity_registry,
        overholding: BTreeMap::new(),
        config: Default::default(),
    };
    let result = run_market(&request).expect("capacity is valid");

    assert!(result.r#final);
    let accepted = sell_orders.iter().filter(|s| result.x_s[&s.id] > 0.0).count();
    assert!(accepted <= 1);
    assert_eq!(result.prices_rounded.as_ref().unwrap()[&ProductId::from("POWER")], 60.0);
    assert_abs_diff_eq!(welfare(&buy_orders, &result.x_b, &sell_orders, &result.x_s), 1200.0, epsilon = 1e-4);
}

/// Test 6: two mutually exclusive baskets 50@60/50@65, buy 100@100.
#[test]
fn concomitant_baskets_accept_exactly_one() {
    let products = vec![ProductId::from("POWER")];
    let buy_orders = vec![BuyOrder::new("BUY_1", "POWER", 100.0, 100.0).with_paradoxical(false)];
    let sell_orders = vec![
        SellOrder::new("SELL_1", "BASKET_1", SellType::Parent, qty(&[("POWER", 50.0)]), 60.0),
        SellOrder::new("SELL_2", "BASKET_2", SellType::Parent, qty(&[("POWER", 50.0)]), 65.0),
    ];
    let baskets = BTreeMap::from([
        ("BASKET_1".into(), Basket::new("BASKET_1", "UNIT_1").with_concomitant(["BASKET_2".into()])),
        ("BASKET_2".into(), Basket::new("BASKET_2", "UNIT_1").with_concomitant(["BASKET_1".into()])),
    ]);
    let unit_capacity_registry = BTreeMap::from([("UNIT_1".into(), 100.0)]);

    let request = ClearingRequest {
        products,
        buy_orders: buy_orders.clone(),
        sell_orders: sell_orders.clone(),
        baskets,
        unit_capacity_registry,
        overholding: BTreeMap::new(),
        config: Default::default(),
    };
    let result = run_market(&request).expect("capacity is valid");

    assert!(result.r#final);
    let accepted_baskets: Vec<_> = sell_orders.iter().filter(|s| result.x_s[&s.id] > 0.0).collect();
    assert_eq!(accepted_baskets.len(), 1);
    assert_eq!(result.prices_rounded.as_ref().unwrap()[&ProductId::from("POWER")], 60.0);
    assert_abs_diff_eq!(welfare(&buy_orders, &result.x_b, &sell_orders, &result.x_s), 2000.0, epsilon = 1e-4);
}

/// Test 7: two looped baskets 50@60/50@65, buy 100@100. The loop-family
/// net constraint aggregates surplus across both members rather than
/// bounding each individually, so the price floor is the family's blended
/// break-even point `(50p - 3000) + (50p - 3250) >= 0 => p >= 62.5`, not
/// the costlier member's own ask.
#[test]
fn looped_baskets_commit_together() {
    let products = vec![ProductId::from("POWER")];
    let buy_orders = vec![BuyOrder::new("BUY_1", "POWER", 100.0, 100.0).with_paradoxical(false)];
    let sell_orders = vec![
        SellOrder::new("SELL_1", "BASKET_1", SellType::Parent, qty(&[("POWER", 50.0)]), 60.0),
        SellOrder::new("SELL_2", "BASKET_2", SellType::Parent, qty(&[("POWER", 50.0)]), 65.0),
    ];
    let baskets = BTreeMap::from([
        ("BASKET_1".into(), Basket::new("BASKET_1", "UNIT_1").with_loop("BASKET_2")),
        ("BASKET_2".into(), Basket::new("BASKET_2", "UNIT_1").with_loop("BASKET_1")),
    ]);
    let unit_capacity_registry = BTreeMap::from([("UNIT_1".into(), 100.0)]);

    let request = ClearingRequest {
        products,
        buy_orders: buy_orders.clone(),
        sell_orders: sell_orders.clone(),
        baskets,
        unit_capacity_registry,
        overholding: BTreeMap::new(),
        config: Default::default(),
    };
    let result = run_market(&request).expect("capacity is valid");

    assert!(result.r#final);
    assert_abs_diff_eq!(result.x_s["SELL_1"], result.x_s["SELL_2"], epsilon = 1e-6);
    assert_eq!(result.prices_rounded.as_ref().unwrap()[&ProductId::from("POWER")], 62.5);
    assert_abs_diff_eq!(welfare(&buy_orders, &result.x_b, &sell_orders, &result.x_s), 3750.0, epsilon = 1e-4);
}

/// Test 8: non-paradoxical low-price buy would be rejected by a lower
/// clearing price; the paradoxical buyer absorbs the loss instead, so
/// both clear fully at price 65.
#[test]
fn non_paradoxical_buy_forces_price_to_avoid_negative_surplus() {
    let products = vec![ProductId::from("POWER")];
    let buy_orders = vec![
        BuyOrder::new("BUY_1", "POWER", 80.0, 50.0).with_paradoxical(false),
        BuyOrder::new("BUY_2", "POWER", 60.0, 50.0).with_paradoxical(true),
    ];
    let sell_orders =
        vec![SellOrder::new("SELL_1", "BASKET_1", SellType::Parent, qty(&[("POWER", 100.0)]), 65.0)];
    let baskets = BTreeMap::from([("BASKET_1".into(), Basket::new("BASKET_1", "UNIT_1"))]);
    let unit_capacity_registry = BTreeMap::from([("UNIT_1".into(), 200.0)]);

    let request = ClearingRequest {
        products,
        buy_orders: buy_orders.clone(),
        sell_orders: sell_orders.clone(),
        baskets,
        unit_capacity_registry,
        overholding: BTreeMap::new(),
        config: Default::default(),
    };
    let result = run_market(&request).expect("capacity is valid");

    assert!(result.r#final);
    assert_abs_diff_eq!(result.x_b["BUY_1"], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(result.x_b["BUY_2"], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(result.x_s["SELL_1"], 1.0, epsilon = 1e-6);
    assert_eq!(result.prices_rounded.as_ref().unwrap()[&ProductId::from("POWER")], 65.0);
    assert_abs_diff_eq!(welfare(&buy_orders, &result.x_b, &sell_orders, &result.x_s), 500.0, epsilon = 1e-4);
}

/// Test 9: a sell order pinned to full acceptance (`min_acceptance_ratio
/// == 1`) with only a small real buyer clears via the phantom OVERHOLD
/// buyer absorbing the rest of the supply.
#[test]
fn overholding_absorbs_unsold_supply() {
    let products = vec![ProductId::from("POWER")];
    let buy_orders = vec![BuyOrder::new("BUY_1", "POWER", 100.0, 50.0).with_paradoxical(false)];
    let sell_orders = vec![SellOrder::new(
        "SELL_1",
        "BASKET_1",
        SellType::Parent,
        qty(&[("POWER", 100.0)]),
        40.0,
    )
    .with_min_acceptance_ratio(1.0)];
    let baskets = BTreeMap::from([("BASKET_1".into(), Basket::new("BASKET_1", "UNIT_1"))]);
    let unit_capacity_registry = BTreeMap::from([("UNIT_1".into(), 200.0)]);
    let overholding = BTreeMap::from([(ProductId::from("POWER"), 100.0)]);

    let request = ClearingRequest {
        products,
        buy_orders: buy_orders.clone(),
        sell_orders: sell_orders.clone(),
        baskets,
        unit_capacity_registry,
        overholding,
        config: Default::default(),
    };
    let result = run_market(&request).expect("capacity is valid");

    assert!(result.r#final);
    assert_abs_diff_eq!(result.x_b["BUY_1"], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(result.x_s["SELL_1"], 1.0, epsilon = 1e-6);
    assert_eq!(result.prices_rounded.as_ref().unwrap()[&ProductId::from("POWER")], 40.0);
    assert_abs_diff_eq!(welfare(&buy_orders, &result.x_b, &sell_orders, &result.x_s), 1000.0, epsilon = 1e-4);
}

/// Unit-capacity validation fails synchronously before any solve (spec §7).
#[test]
fn capacity_violation_is_rejected_before_any_solve() {
    let products = vec![ProductId::from("POWER")];
    let buy_orders = vec![BuyOrder::new("BUY_1", "POWER", 100.0, 50.0)];
    let sell_orders =
        vec![SellOrder::new("SELL_1", "BASKET_1", SellType::Parent, qty(&[("POWER", 150.0)]), 60.0)];
    let baskets = BTreeMap::from([("BASKET_1".into(), Basket::new("BASKET_1", "UNIT_1"))]);
    let unit_capacity_registry = BTreeMap::from([("UNIT_1".into(), 100.0)]);

    let request = ClearingRequest {
        products,
        buy_orders,
        sell_orders,
        baskets,
        unit_capacity_registry,
        overholding: BTreeMap::new(),
        config: Default::default(),
    };

    let err = run_market(&request).expect_err("capacity is violated");
    assert!(err.to_string().contains("violates capacity"));
}

/// Property: a converged clearing's per-product energy balance holds
/// before rounding (spec §8).
#[test]
fn energy_balance_holds_for_final_clearings() {
    let products = vec![ProductId::from("POWER")];
    let buy_orders = vec![
        BuyOrder::new("BUY_HIGH", "POWER", 100.0, 30.0).with_paradoxical(false),
        BuyOrder::new("BUY_LOW", "POWER", 80.0, 30.0).with_paradoxical(false),
    ];
    let sell_orders =
        vec![SellOrder::new("SELL_1", "BASKET_1", SellType::Parent, qty(&[("POWER", 50.0)]), 60.0)];
    let baskets = BTreeMap::from([("BASKET_1".into(), Basket::new("BASKET_1", "UNIT_1"))]);
    let unit_capacity_registry = BTreeMap::from([("UNIT_1".into(), 100.0)]);

    let request = ClearingRequest {
        products: products.clone(),
        buy_orders: buy_orders.clone(),
        sell_orders: sell_orders.clone(),
        baskets,
        unit_capacity_registry,
        overholding: BTreeMap::new(),
        config: Default::default(),
    };
    let result = run_market(&request).expect("capacity is valid");
    assert!(result.r#final);

    for product in &products {
        let buy_total: f64 = buy_orders
            .iter()
            .filter(|b| &b.product == product)
            .map(|b| b.volume * result.x_b[&b.id])
            .sum();
        let sell_total: f64 = sell_orders
            .iter()
            .map(|s| s.qty.get(product).copied().unwrap_or(0.0) * result.x_s[&s.id])
            .sum();
        assert_abs_diff_eq!(buy_total, sell_total, epsilon = 1e-6);
    }

    // And, after rounding, the per-product integer totals agree exactly.
    let sell_round = result.sell_round.unwrap();
    let buy_round = result.buy_round.unwrap();
    let sell_total: i64 = sell_orders.iter().map(|s| sell_round[&s.id]).sum();
    let buy_total: i64 = buy_orders.iter().map(|b| buy_round[&b.id]).sum();
    assert_eq!(sell_total, buy_total);
}
