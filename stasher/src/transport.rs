//! Transport adapter (spec.md §6)
//!
//! The real transport is a SAM bridge datagram socket; this crate only
//! depends on the narrow contract below. `MemoryTransport` is the
//! in-process test double used by the integration tests in place of a
//! live SAM socket.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Unreliable, message-oriented send/receive keyed by opaque destination
/// byte strings. No ordering, duplication, or delivery guarantees.
pub trait Transport: Send + Sync {
    /// This node's own destination, fixed at socket creation.
    fn local_destination(&self) -> &[u8];

    /// Non-blocking send; may silently drop (spec.md §6, §7 TransportError).
    fn send_to(&self, destination: &[u8], payload: &[u8]);

    /// Non-blocking receive; `None` means would-block, not EOF.
    fn try_recv(&self) -> Option<(Vec<u8>, Vec<u8>)>;
}

/// A registry of in-process mailboxes keyed by destination, used to wire
/// up a handful of `MemoryTransport` instances that can reach each other
/// without a real network.
#[derive(Default)]
pub struct MemoryNetwork {
    mailboxes: Mutex<HashMap<Vec<u8>, VecDeque<(Vec<u8>, Vec<u8>)>>>,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn transport(self: &Arc<Self>, destination: Vec<u8>) -> MemoryTransport {
        self.mailboxes.lock().entry(destination.clone()).or_default();
        MemoryTransport {
            network: self.clone(),
            local: destination,
        }
    }
}

pub struct MemoryTransport {
    network: Arc<MemoryNetwork>,
    local: Vec<u8>,
}

impl Transport for MemoryTransport {
    fn local_destination(&self) -> &[u8] {
        &self.local
    }

    fn send_to(&self, destination: &[u8], payload: &[u8]) {
        let mut mailboxes = self.network.mailboxes.lock();
        if let Some(queue) = mailboxes.get_mut(destination) {
            queue.push_back((self.local.clone(), payload.to_vec()));
        }
        // Unknown destination: silently dropped, per the transport contract.
    }

    fn try_recv(&self) -> Option<(Vec<u8>, Vec<u8>)> {
        let mut mailboxes = self.network.mailboxes.lock();
        mailboxes.get_mut(&self.local).and_then(|q| q.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_then_recv_round_trips() {
        let net = MemoryNetwork::new();
        let a = net.transport(b"a".to_vec());
        let b = net.transport(b"b".to_vec());
        a.send_to(b"b", b"hello");
        let (from, payload) = b.try_recv().unwrap();
        assert_eq!(from, b"a");
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn send_to_unknown_destination_is_dropped() {
        let net = MemoryNetwork::new();
        let a = net.transport(b"a".to_vec());
        a.send_to(b"nowhere", b"hello");
        assert!(a.try_recv().is_none());
    }

    #[test]
    fn try_recv_empty_is_none() {
        let net = MemoryNetwork::new();
        let a = net.transport(b"a".to_vec());
        assert!(a.try_recv().is_none());
    }
}
