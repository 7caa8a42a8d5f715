use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates the identifier from anything string-like.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Stock-keeping unit: identifies one kind of product.
    Sku
);

string_id!(
    /// Reference of a purchased or incoming stock batch.
    BatchReference
);

string_id!(
    /// Identifier of the customer order an order line belongs to.
    OrderId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sku_from_str_preserves_value() {
        let sku = Sku::from("RED-CHAIR");
        assert_eq!(sku.as_str(), "RED-CHAIR");
        assert_eq!(sku.to_string(), "RED-CHAIR");
    }

    #[test]
    fn ids_of_different_kinds_compare_by_value() {
        assert_eq!(BatchReference::new("b1"), BatchReference::from("b1".to_string()));
        assert_ne!(OrderId::new("o1"), OrderId::new("o2"));
    }

    #[test]
    fn sku_serializes_as_plain_string() {
        let sku = Sku::new("LAMP");
        let json = serde_json::to_string(&sku).unwrap();
        assert_eq!(json, "\"LAMP\"");
        let back: Sku = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sku);
    }
}
