//! Integer rounding and per-product residual redistribution (spec §4.6).

use std::collections::BTreeMap;

use tracing::warn;

use crate::domain::{BuyOrder, OrderId, ProductId, SellOrder, SellType};

/// Rounds `price` up to the nearest cent. Directional, not
/// banker's-rounding: `-10.331 -> -10.33`, `10.331 -> 10.34` (spec §4.6).
pub fn round_price_up_to_cent(price: f64) -> f64 {
    (price * 100.0).ceil() / 100.0
}

/// Output of [`round_and_redistribute`].
pub struct RoundingResult {
    pub prices_rounded: BTreeMap<ProductId, f64>,
    pub sell_round: BTreeMap<OrderId, i64>,
    pub buy_round: BTreeMap<OrderId, i64>,
}

/// Implements spec §4.6 end to end: round prices up to the cent; round
/// accepted sell volumes per type (floor for substitutable_child, nearest
/// for parent/child); distribute each sell order's rounded total across
/// its products proportionally; round buy volumes to the nearest integer;
/// then repair any per-product buy/sell mismatch by shifting +-1-unit
/// ticks across buyers, cheapest-first when topping up, most-expensive-first
/// when trimming.
pub fn round_and_redistribute(
    products: &[ProductId],
    prices_unrounded: &BTreeMap<ProductId, f64>,
    x_s: &BTreeMap<OrderId, f64>,
    sells: &[SellOrder],
    x_b: &BTreeMap<OrderId, f64>,
    buys: &[BuyOrder],
) -> RoundingResult {
    let prices_rounded: BTreeMap<ProductId, f64> = products
        .iter()
        .map(|p| (p.clone(), round_price_up_to_cent(prices_unrounded.get(p).copied().unwrap_or(0.0))))
        .collect();

    let mut sell_round: BTreeMap<OrderId, i64> = BTreeMap::new();
    for s in sells {
        let ratio = x_s.get(&s.id).copied().unwrap_or(0.0);
        let unrounded = s.total_qty() * ratio;
        let rounded = if unrounded <= 0.0 {
            0
        } else {
            match s.sell_type {
                SellType::SubstitutableChild => (unrounded + 1e-9).floor() as i64,
                _ => (unrounded + 0.5 + 1e-9).floor() as i64,
            }
        };
        sell_round.insert(s.id.clone(), rounded);
    }

    let mut total_rounded_sells_by_product: BTreeMap<ProductId, i64> =
        products.iter().map(|p| (p.clone(), 0)).collect();
    for s in sells {
        let rounded_total = sell_round[&s.id];
        let total_qty = s.total_qty();
        if total_qty <= 0.0 || rounded_total == 0 {
            continue;
        }
        let prods: Vec<&ProductId> = products.iter().filter(|p| s.qty.get(*p).copied().unwrap_or(0.0) > 0.0).collect();
        if prods.is_empty() {
            continue;
        }

        let mut shares: Vec<(ProductId, i64, f64)> = Vec::with_capacity(prods.len());
        let mut remaining = rounded_total;
        for p in &prods {
            let qty = s.qty[*p];
            let raw = qty * rounded_total as f64 / total_qty;
            let share = (raw + 1e-9).floor() as i64;
            shares.push(((*p).clone(), share, raw));
            remaining -= share;
        }

        // Largest fractional part first, ties broken by ascending product id.
        shares.sort_by(|a, b| {
            let frac_a = a.2 - a.2.floor();
            let frac_b = b.2 - b.2.floor();
            frac_b.partial_cmp(&frac_a).unwrap().then_with(|| a.0.cmp(&b.0))
        });

        let mut idx = 0;
        while remaining > 0 {
            shares[idx].1 += 1;
            remaining -= 1;
            idx = (idx + 1) % shares.len();
        }

        for (p, share, _) in &shares {
            *total_rounded_sells_by_product.get_mut(p).unwrap() += share;
        }
    }

    let mut buy_round: BTreeMap<OrderId, i64> = BTreeMap::new();
    for b in buys {
        let ratio = x_b.get(&b.id).copied().unwrap_or(0.0);
        let unrounded = b.volume * ratio;
        buy_round.insert(b.id.clone(), (unrounded + 1e-9).round() as i64);
    }

    let mut buys_by_product: BTreeMap<ProductId, Vec<&BuyOrder>> = BTreeMap::new();
    for b in buys {
        buys_by_product.entry(b.product.clone()).or_default().push(b);
    }

    for p in products {
        let rounded_buys_sum: i64 = buys_by_product.get(p).into_iter().flatten().map(|b| buy_round[&b.id]).sum();
        let rounded_sells_sum = total_rounded_sells_by_product.get(p).copied().unwrap_or(0);

        if rounded_buys_sum == rounded_sells_sum {
            continue;
        }

        if rounded_buys_sum < rounded_sells_sum {
            let mut need = rounded_sells_sum - rounded_buys_sum;
            let mut candidates: Vec<&BuyOrder> = buys_by_product.get(p).cloned().unwrap_or_default();
            if candidates.is_empty() {
                continue;
            }
            candidates.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap().then_with(|| a.id.cmp(&b.id)));
            let mut idx = 0;
            while need > 0 {
                let b = candidates[idx % candidates.len()];
                *buy_round.get_mut(&b.id).unwrap() += 1;
                need -= 1;
                idx += 1;
            }
        } else {
            let mut need = rounded_buys_sum - rounded_sells_sum;
            let mut candidates: Vec<&BuyOrder> = buys_by_product.get(p).cloned().unwrap_or_default();
            if candidates.is_empty() {
                continue;
            }
            candidates.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap().then_with(|| a.id.cmp(&b.id)));
            let mut idx = 0;
            let mut stalled_passes = 0;
            while need > 0 && stalled_passes <= candidates.len() {
                let b = candidates[idx % candidates.len()];
                let count = buy_round.get_mut(&b.id).unwrap();
                if *count > 0 {
                    *count -= 1;
                    need -= 1;
                    stalled_passes = 0;
                } else {
                    stalled_passes += 1;
                }
                idx += 1;
            }
            if need > 0 {
                warn!(product = %p, remaining = need, "residual repair could not fully decrement buy volumes");
            }
        }
    }

    RoundingResult { prices_rounded, sell_round, buy_round }
}
