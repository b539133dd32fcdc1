use serde::{Deserialize, Serialize};

use super::ids::{BasketId, UnitId};

/// A unit's offer group: at most one parent sell order plus any number of
/// child/substitutable_child sells co-located by `basket` id (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Basket {
    pub id: BasketId,
    pub unit: UnitId,
    #[serde(default)]
    pub concomitant: Vec<BasketId>,
    #[serde(default)]
    pub looped_to: Option<BasketId>,
}

impl Basket {
    pub fn new(id: impl Into<BasketId>, unit: impl Into<UnitId>) -> Self {
        Basket {
            id: id.into(),
            unit: unit.into(),
            concomitant: Vec::new(),
            looped_to: None,
        }
    }

    pub fn with_concomitant(mut self, peers: impl IntoIterator<Item = BasketId>) -> Self {
        self.concomitant = peers.into_iter().collect();
        self
    }

    pub fn with_loop(mut self, partner: impl Into<BasketId>) -> Self {
        self.looped_to = Some(partner.into());
        self
    }
}
