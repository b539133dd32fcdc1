use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ids::{BasketId, OrderId, ProductId};

/// The three sell-order roles a basket can hold (spec §3, §9 "polymorphic
/// sell variants" — a tagged variant, not an inheritance hierarchy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SellType {
    /// The commit-gate for a basket. Binary acceptance; controls `y_parent`.
    Parent,
    /// Bounded above by the parent's acceptance; divisible.
    Child,
    /// A child within a mutually-exclusive family inside its basket.
    SubstitutableChild,
}

/// An immutable sell order belonging to exactly one basket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellOrder {
    pub id: OrderId,
    pub basket: BasketId,
    pub qty: BTreeMap<ProductId, f64>,
    pub price: f64,
    #[serde(rename = "type")]
    pub sell_type: SellType,
    #[serde(default)]
    pub min_acceptance_ratio: f64,
}

impl SellOrder {
    pub fn new(
        id: impl Into<OrderId>,
        basket: impl Into<BasketId>,
        sell_type: SellType,
        qty: BTreeMap<ProductId, f64>,
        price: f64,
    ) -> Self {
        SellOrder {
            id: id.into(),
            basket: basket.into(),
            qty,
            price,
            sell_type,
            min_acceptance_ratio: 0.0,
        }
    }

    pub fn with_min_acceptance_ratio(mut self, ratio: f64) -> Self {
        self.min_acceptance_ratio = ratio;
        self
    }

    /// Sum of `qty` over all products.
    pub fn total_qty(&self) -> f64 {
        self.qty.values().sum()
    }

    /// `min_acceptance_ratio` is stored on every variant but structurally
    /// meaningless for `Parent`, whose acceptance is always binary (spec §3).
    pub fn effective_min_acceptance(&self) -> f64 {
        match self.sell_type {
            SellType::Parent => 0.0,
            _ => self.min_acceptance_ratio.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qty(pairs: &[(&str, f64)]) -> BTreeMap<ProductId, f64> {
        pairs.iter().map(|(p, v)| (ProductId::from(*p), *v)).collect()
    }

    #[test]
    fn total_qty_sums_products() {
        let s = SellOrder::new("S1", "B1", SellType::Child, qty(&[("P1", 20.0), ("P2", 10.0)]), 55.0);
        assert_eq!(s.total_qty(), 30.0);
    }

    #[test]
    fn parent_min_acceptance_is_always_zero() {
        let s = SellOrder::new("S1", "B1", SellType::Parent, qty(&[("P1", 50.0)]), 60.0)
            .with_min_acceptance_ratio(0.9);
        assert_eq!(s.effective_min_acceptance(), 0.0);
    }

    #[test]
    fn child_min_acceptance_is_clamped() {
        let s = SellOrder::new("S1", "B1", SellType::Child, qty(&[("P1", 50.0)]), 60.0)
            .with_min_acceptance_ratio(1.5);
        assert_eq!(s.effective_min_acceptance(), 1.0);
    }
}
