//! Identifier newtypes.
//!
//! Stop points, routes, lines and providers are all identified by opaque
//! strings. Wrapping them keeps a route id from being passed where a stop
//! point id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
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
    };
}

string_id!(
    /// Stable logical identifier of a configured realtime provider.
    ///
    /// Also the cache-sharing key: every process serving the same region
    /// uses the same id, so they converge on the same cached responses.
    ProviderId
);

string_id!(
    /// Identifier of a stop point in the base schedule.
    StopPointId
);

string_id!(
    /// Identifier of a route (one direction of a line).
    RouteId
);

string_id!(
    /// Identifier of a line.
    LineId
);
