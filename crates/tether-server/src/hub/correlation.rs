//! Pending request table: request id → identity of the connection waiting
//! for the answer.
//!
//! Entries reference requesters by identity only, so a departed connection
//! is never kept alive by a stale entry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tether_core::{ConnectionId, RequestId};
use tracing::debug;

#[derive(Debug)]
struct PendingRequest {
    requester: ConnectionId,
    created_at: Instant,
}

/// Outstanding requests keyed by request id. At most one requester per id.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    entries: HashMap<RequestId, PendingRequest>,
}

impl CorrelationTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `requester` as waiting on `request_id`.
    ///
    /// Last writer wins: returns the requester this entry superseded, if any.
    /// An empty id is ignored.
    pub fn put(&mut self, request_id: RequestId, requester: ConnectionId) -> Option<ConnectionId> {
        if request_id.is_empty() {
            debug!("ignoring empty request id");
            return None;
        }
        self.entries
            .insert(
                request_id,
                PendingRequest {
                    requester,
                    created_at: Instant::now(),
                },
            )
            .map(|prev| prev.requester)
    }

    /// Remove and return the requester waiting on `request_id`.
    pub fn take_and_clear(&mut self, request_id: &str) -> Option<ConnectionId> {
        self.entries.remove(request_id).map(|p| p.requester)
    }

    /// Drop every entry whose requester is `connection`. Returns how many.
    pub fn purge_connection(&mut self, connection: &ConnectionId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, p| &p.requester != connection);
        before - self.entries.len()
    }

    /// Drop entries created more than `ttl` before `now`. Returns how many.
    pub fn expire_older_than(&mut self, ttl: Duration, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, p| now.saturating_duration_since(p.created_at) <= ttl);
        before - self.entries.len()
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(s: &str) -> RequestId {
        RequestId::from(s)
    }

    fn cid(s: &str) -> ConnectionId {
        ConnectionId::from(s)
    }

    #[test]
    fn put_then_take() {
        let mut table = CorrelationTable::new();
        assert_eq!(table.put(rid("x"), cid("a")), None);
        assert_eq!(table.take_and_clear("x"), Some(cid("a")));
        assert_eq!(table.take_and_clear("x"), None);
        assert!(table.is_empty());
    }

    #[test]
    fn last_writer_wins() {
        let mut table = CorrelationTable::new();
        let _ = table.put(rid("x"), cid("a"));
        assert_eq!(table.put(rid("x"), cid("b")), Some(cid("a")));
        assert_eq!(table.len(), 1);
        assert_eq!(table.take_and_clear("x"), Some(cid("b")));
    }

    #[test]
    fn empty_id_is_ignored() {
        let mut table = CorrelationTable::new();
        assert_eq!(table.put(rid(""), cid("a")), None);
        assert!(table.is_empty());
    }

    #[test]
    fn take_unknown_is_none() {
        let mut table = CorrelationTable::new();
        assert_eq!(table.take_and_clear("nope"), None);
    }

    #[test]
    fn purge_only_touches_that_connection() {
        let mut table = CorrelationTable::new();
        let _ = table.put(rid("a1"), cid("a"));
        let _ = table.put(rid("a2"), cid("a"));
        let _ = table.put(rid("b1"), cid("b"));
        assert_eq!(table.purge_connection(&cid("a")), 2);
        assert_eq!(table.len(), 1);
        assert_eq!(table.purge_connection(&cid("a")), 0);
        assert_eq!(table.take_and_clear("a1"), None);
        assert_eq!(table.take_and_clear("b1"), Some(cid("b")));
    }

    #[test]
    fn expire_drops_only_old_entries() {
        let mut table = CorrelationTable::new();
        let _ = table.put(rid("old"), cid("a"));
        let ttl = Duration::from_secs(30);
        // Nothing is older than the ttl yet.
        assert_eq!(table.expire_older_than(ttl, Instant::now()), 0);
        let later = Instant::now() + Duration::from_secs(31);
        assert_eq!(table.expire_older_than(ttl, later), 1);
        assert!(table.is_empty());
    }
}
