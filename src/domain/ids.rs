use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(ProductId, "Identifier for a tradable product.");
string_id!(OrderId, "Identifier for a buy or sell order.");
string_id!(BasketId, "Identifier for a basket (a unit's offer group).");
string_id!(UnitId, "Identifier for a generating unit, the owner of a basket's capacity.");
string_id!(FamilyId, "Identifier for a buy-side substitutability family.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_sort_lexicographically() {
        let mut ids = vec![BasketId::from("B2"), BasketId::from("B10"), BasketId::from("B1")];
        ids.sort();
        assert_eq!(ids, vec![BasketId::from("B1"), BasketId::from("B10"), BasketId::from("B2")]);
    }

    #[test]
    fn id_deref_to_str() {
        let id = OrderId::from("SELL_1");
        assert_eq!(&*id, "SELL_1");
        assert_eq!(id.as_str(), "SELL_1");
    }
}
