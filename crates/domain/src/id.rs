//! Typed identifier newtypes backed by strings.
//!
//! Identifiers arrive from external publishers and are free-form text, so
//! they are not constrained to UUIDs. Freshly generated ones are UUID v4.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Borrow the identifier text.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// `true` when the identifier is the empty string.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a [`GeofenceArea`](crate::area::GeofenceArea).
    AreaId
);

define_id!(
    /// Unique identifier for a [`GeofenceRule`](crate::rule::GeofenceRule).
    RuleId
);

define_id!(
    /// Identifier of a tracked entity (a user or a device that reports its position).
    EntityId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_generate_unique_ids_when_called_twice() {
        let a = RuleId::generate();
        let b = RuleId::generate();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn should_serialize_as_plain_string() {
        let id = AreaId::from("home");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"home\"");
        let parsed: AreaId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn should_display_inner_text() {
        assert_eq!(EntityId::from("alice").to_string(), "alice");
    }

    #[test]
    fn should_report_empty_ids() {
        assert!(RuleId::from("").is_empty());
        assert!(!RuleId::from("r").is_empty());
    }
}
