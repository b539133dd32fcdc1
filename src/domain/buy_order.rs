use serde::{Deserialize, Serialize};

use super::ids::{FamilyId, OrderId, ProductId};

/// An immutable, divisible buy order for a single product.
///
/// `paradoxical == true` means a negative-surplus outcome for this buyer is
/// tolerated by the non-paradoxical-buy check in the outer loop (spec §4.5
/// step 6); phantom overholding buyers (§4.4) are always paradoxical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyOrder {
    pub id: OrderId,
    pub product: ProductId,
    pub price: f64,
    pub volume: f64,
    pub family: Option<FamilyId>,
    #[serde(default = "default_paradoxical")]
    pub paradoxical: bool,
    #[serde(default)]
    pub min_acceptance_ratio: f64,
}

fn default_paradoxical() -> bool {
    true
}

impl BuyOrder {
    pub fn new(id: impl Into<OrderId>, product: impl Into<ProductId>, price: f64, volume: f64) -> Self {
        BuyOrder {
            id: id.into(),
            product: product.into(),
            price,
            volume,
            family: None,
            paradoxical: true,
            min_acceptance_ratio: 0.0,
        }
    }

    pub fn with_family(mut self, family: impl Into<FamilyId>) -> Self {
        self.family = Some(family.into());
        self
    }

    pub fn with_paradoxical(mut self, paradoxical: bool) -> Self {
        self.paradoxical = paradoxical;
        self
    }

    pub fn with_min_acceptance_ratio(mut self, ratio: f64) -> Self {
        self.min_acceptance_ratio = ratio;
        self
    }

    /// The id of the phantom overholding buyer synthesized for `product` (spec §4.4).
    pub fn overholding_id(product: &ProductId) -> OrderId {
        OrderId::new(format!("OVERHOLD_{}", product.as_str()))
    }

    /// Builds the phantom, always-paradoxical, zero-price buy order used to absorb
    /// unsold supply when an overholding hook is supplied.
    pub fn overholding(product: ProductId, volume: f64) -> Self {
        BuyOrder {
            id: Self::overholding_id(&product),
            product,
            price: 0.0,
            volume,
            family: None,
            paradoxical: true,
            min_acceptance_ratio: 0.0,
        }
    }
}
