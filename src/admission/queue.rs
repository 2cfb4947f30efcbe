//! Deduplicating admission queues
//!
//! Two ordered sets share one lock so an address can be moved between them
//! without ever being visible in both.

use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexSet;

#[derive(Debug, Default)]
struct Queues {
    /// Seen for the first time, no resource path yet
    incoming: IndexSet<IpAddr>,
    /// Resource path allocated, not yet attached to the dispatcher
    pending: IndexSet<IpAddr>,
}

/// Shared handle to the incoming/pending queue pair
#[derive(Debug, Clone, Default)]
pub struct AdmissionQueues {
    inner: Arc<Mutex<Queues>>,
}

impl AdmissionQueues {
    /// Create an empty queue pair
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Queues> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an address awaiting a resource path
    ///
    /// Returns `false` if the address is already queued in either set.
    pub fn enqueue_incoming(&self, address: IpAddr) -> bool {
        let mut queues = self.lock();
        if queues.pending.contains(&address) {
            return false;
        }
        queues.incoming.insert(address)
    }

    /// Queue an address awaiting dispatcher attachment
    ///
    /// Removes it from `incoming` if present. Returns `false` if it was
    /// already pending.
    pub fn enqueue_pending(&self, address: IpAddr) -> bool {
        let mut queues = self.lock();
        queues.incoming.shift_remove(&address);
        queues.pending.insert(address)
    }

    /// Pop the oldest incoming address
    pub fn pop_incoming(&self) -> Option<IpAddr> {
        self.lock().incoming.shift_remove_index(0)
    }

    /// Take every pending address, oldest first
    pub fn drain_pending(&self) -> Vec<IpAddr> {
        self.lock().pending.drain(..).collect()
    }

    /// Whether the address waits for a resource path
    #[must_use]
    pub fn is_incoming(&self, address: &IpAddr) -> bool {
        self.lock().incoming.contains(address)
    }

    /// Whether the address waits for attachment
    #[must_use]
    pub fn is_pending(&self, address: &IpAddr) -> bool {
        self.lock().pending.contains(address)
    }

    /// Number of incoming addresses
    #[must_use]
    pub fn incoming_len(&self) -> usize {
        self.lock().incoming.len()
    }

    /// Number of pending addresses
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv6Addr;

    use super::*;

    fn addr(last: u16) -> IpAddr {
        IpAddr::V6(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, last))
    }

    #[test]
    fn enqueue_is_idempotent() {
        let queues = AdmissionQueues::new();
        assert!(queues.enqueue_incoming(addr(1)));
        assert!(!queues.enqueue_incoming(addr(1)));
        assert_eq!(queues.incoming_len(), 1);
    }

    #[test]
    fn pops_in_arrival_order() {
        let queues = AdmissionQueues::new();
        queues.enqueue_incoming(addr(2));
        queues.enqueue_incoming(addr(1));
        queues.enqueue_incoming(addr(3));

        assert_eq!(queues.pop_incoming(), Some(addr(2)));
        assert_eq!(queues.pop_incoming(), Some(addr(1)));
        assert_eq!(queues.pop_incoming(), Some(addr(3)));
        assert_eq!(queues.pop_incoming(), None);
    }

    #[test]
    fn address_is_never_in_both_queues() {
        let queues = AdmissionQueues::new();
        queues.enqueue_incoming(addr(1));
        queues.enqueue_pending(addr(1));

        assert!(!queues.is_incoming(&addr(1)));
        assert!(queues.is_pending(&addr(1)));

        // Reappearing while pending must not land in incoming
        assert!(!queues.enqueue_incoming(addr(1)));
        assert!(!queues.is_incoming(&addr(1)));
    }

    #[test]
    fn drain_pending_empties_the_set() {
        let queues = AdmissionQueues::new();
        queues.enqueue_pending(addr(1));
        queues.enqueue_pending(addr(2));
        assert!(!queues.enqueue_pending(addr(1)));

        assert_eq!(queues.drain_pending(), vec![addr(1), addr(2)]);
        assert_eq!(queues.pending_len(), 0);
    }
}
