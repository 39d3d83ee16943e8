//! Branded ID newtypes for type safety.
//!
//! Connection identities and request correlation ids are both strings on the
//! wire, but mixing them up would misroute a response. Each gets its own
//! newtype wrapper around `String`.
//!
//! Generated ids are UUID v7 (time-ordered) with a short prefix, generated
//! via [`uuid::Uuid::now_v7`].

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh id (`<prefix>_<uuid v7>`).
            #[must_use]
            pub fn generate() -> Self {
                Self(format!(concat!($prefix, "_{}"), Uuid::now_v7()))
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

branded_id!(
    /// Identity of one live connection, assigned once at accept time.
    ConnectionId,
    "conn"
);

branded_id!(
    /// Correlates a query with its eventual response.
    ///
    /// Usually supplied by the caller; the router generates one only when a
    /// query arrives without it.
    RequestId,
    "req"
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_connection_ids_are_prefixed() {
        let id = ConnectionId::generate();
        assert!(id.as_str().starts_with("conn_"));
    }

    #[test]
    fn generated_request_ids_are_prefixed() {
        let id = RequestId::generate();
        assert!(id.as_str().starts_with("req_"));
    }

    #[test]
    fn thousand_generated_ids_are_distinct() {
        let ids: HashSet<ConnectionId> = (0..1000).map(|_| ConnectionId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn wrapped_value_is_kept_verbatim() {
        let id = RequestId::from(String::from("x"));
        assert_eq!(id.as_str(), "x");
        assert_eq!(id.to_string(), "x");
    }

    #[test]
    fn serializes_as_bare_string() {
        let id = ConnectionId::from("conn_abc");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"conn_abc\"");
        let back: ConnectionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn borrow_allows_str_lookup() {
        let mut set = HashSet::new();
        let _ = set.insert(RequestId::from("abc"));
        assert!(set.contains("abc"));
    }
}
