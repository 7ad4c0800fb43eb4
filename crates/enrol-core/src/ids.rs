//! Learner and course identifiers.
//!
//! Both are thin `u64` newtypes. Zero is reserved: the persistence layer never
//! hands out entity id `0`, so it is rejected as invalid caller input.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CoreError;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Build an identifier, rejecting the reserved value `0`.
            ///
            /// # Errors
            ///
            /// Returns `CoreError::InvalidId` when `raw` is zero.
            pub fn new(raw: u64) -> Result<Self, CoreError> {
                if raw == 0 {
                    return Err(CoreError::InvalidId {
                        kind: $kind,
                        value: raw.to_string(),
                    });
                }
                Ok(Self(raw))
            }

            /// The raw numeric id.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }

            /// Whether this id is the reserved zero value.
            ///
            /// Only reachable through deserialization of bad data.
            #[must_use]
            pub const fn is_reserved(self) -> bool {
                self.0 == 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.trim().parse::<u64>().map_err(|_| CoreError::InvalidId {
                    kind: $kind,
                    value: s.to_string(),
                })?;
                Self::new(raw)
            }
        }
    };
}

entity_id!(
    /// Identifier of a learner (a site user).
    LearnerId,
    "learner"
);

entity_id!(
    /// Identifier of a course.
    CourseId,
    "course"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_rejected() {
        assert!(LearnerId::new(0).is_err());
        assert!(CourseId::new(0).is_err());
    }

    #[test]
    fn parses_from_str() {
        let course: CourseId = " 42 ".parse().unwrap();
        assert_eq!(course.get(), 42);
        assert!("-3".parse::<CourseId>().is_err());
        assert!("abc".parse::<LearnerId>().is_err());
    }

    #[test]
    fn serializes_as_bare_number() {
        let learner = LearnerId::new(7).unwrap();
        assert_eq!(serde_json::to_string(&learner).unwrap(), "7");
        let recovered: LearnerId = serde_json::from_str("7").unwrap();
        assert_eq!(recovered, learner);
    }
}
