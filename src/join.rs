//! Join admission guard.
//!
//! Joining a realm is the one operation that suspends mid-sequence (realm and
//! profile lookups hit the external store), so a second join message for the
//! same uid could race ahead of the first. The coordinator marks a uid as
//! joining for the duration of the sequence; the marker is released when the
//! ticket drops, on every exit path.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

pub struct JoinCoordinator {
    joining: DashMap<String, ()>,
}

impl JoinCoordinator {
    pub fn new() -> Self {
        Self {
            joining: DashMap::new(),
        }
    }

    /// Mark a uid as joining. Returns `None` if a join for this uid is
    /// already in flight.
    pub fn begin(&self, uid: &str) -> Option<JoinTicket<'_>> {
        match self.joining.entry(uid.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(entry) => {
                entry.insert(());
                Some(JoinTicket {
                    uid: uid.to_string(),
                    coordinator: self,
                })
            }
        }
    }

    pub fn is_joining(&self, uid: &str) -> bool {
        self.joining.contains_key(uid)
    }

    fn release(&self, uid: &str) {
        self.joining.remove(uid);
    }
}

impl Default for JoinCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Held for the duration of one join sequence; dropping it returns the uid
/// to idle so a retry can proceed.
pub struct JoinTicket<'a> {
    uid: String,
    coordinator: &'a JoinCoordinator,
}

impl Drop for JoinTicket<'_> {
    fn drop(&mut self) {
        self.coordinator.release(&self.uid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_blocks_second_attempt() {
        let coordinator = JoinCoordinator::new();

        let ticket = coordinator.begin("u1").unwrap();
        assert!(coordinator.is_joining("u1"));
        assert!(coordinator.begin("u1").is_none());

        drop(ticket);
        assert!(!coordinator.is_joining("u1"));
        assert!(coordinator.begin("u1").is_some());
    }

    #[test]
    fn test_distinct_uids_join_independently() {
        let coordinator = JoinCoordinator::new();

        let _a = coordinator.begin("u1").unwrap();
        let _b = coordinator.begin("u2").unwrap();
        assert!(coordinator.is_joining("u1"));
        assert!(coordinator.is_joining("u2"));
    }

    #[test]
    fn test_ticket_releases_on_early_exit() {
        let coordinator = JoinCoordinator::new();

        fn rejected(coordinator: &JoinCoordinator) -> Option<()> {
            let _ticket = coordinator.begin("u1")?;
            None
        }

        assert!(rejected(&coordinator).is_none());
        assert!(!coordinator.is_joining("u1"));
    }
}
