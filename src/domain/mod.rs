//! Immutable order and basket descriptors (spec §3).

mod basket;
mod buy_order;
mod ids;
mod sell_order;

pub use basket::Basket;
pub use buy_order::BuyOrder;
pub use ids::{BasketId, FamilyId, OrderId, ProductId, UnitId};
pub use sell_order::{SellOrder, SellType};
