//! Message ID (0000,0110) allocation and in-flight tracking.
//!
//! PS3.7 6.3.1 requires every DIMSE request to carry a Message ID that
//! distinguishes it from other messages on the same association; a
//! response is correlated back to its request via Message ID Being
//! Responded To (0000,0120). Two requests sharing the same Message ID
//! while both are outstanding would make that correlation ambiguous, so
//! this module rejects the duplicate rather than letting it reach the wire.

use std::collections::HashSet;

use snafu::Snafu;

/// A Message ID could not be reserved for a new request.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum MessageIdError {
    /// the given Message ID already identifies an outstanding request
    #[snafu(display("message ID {} is already in flight", message_id))]
    InFlight { message_id: u16 },
}

/// Tracks which Message IDs are currently in flight on an association,
/// and hands out fresh ones for new requests.
///
/// A single store is meant to be shared by every `send_<operation>` call
/// made over one association, since Message IDs are scoped to the
/// association, not to any one DIMSE service.
#[derive(Debug, Default)]
pub struct MessageIdStore {
    next: u16,
    in_flight: HashSet<u16>,
}

impl MessageIdStore {
    /// Create a new, empty store. The first allocated ID is 1.
    pub fn new() -> Self {
        MessageIdStore {
            next: 1,
            in_flight: HashSet::new(),
        }
    }

    /// Reserve and return a fresh Message ID, skipping over any already
    /// in flight. Wraps from 65535 back to 1 (0 is never handed out, to
    /// stay clear of implementations that treat it as "no value").
    pub fn reserve(&mut self) -> u16 {
        loop {
            let id = self.next;
            self.next = if self.next == u16::MAX { 1 } else { self.next + 1 };
            if id != 0 && self.in_flight.insert(id) {
                return id;
            }
        }
    }

    /// Reserve a caller-chosen Message ID, failing if it is already in
    /// flight on this association.
    pub fn reserve_explicit(&mut self, message_id: u16) -> Result<(), MessageIdError> {
        if !self.in_flight.insert(message_id) {
            return InFlightSnafu { message_id }.fail();
        }
        Ok(())
    }

    /// Release a Message ID once its exchange (request plus every response,
    /// including the terminal one of a multi-response operation) has
    /// concluded.
    pub fn release(&mut self, message_id: u16) {
        self.in_flight.remove(&message_id);
    }

    /// Whether a Message ID currently identifies an outstanding request.
    pub fn is_in_flight(&self, message_id: u16) -> bool {
        self.in_flight.contains(&message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserves_increasing_ids() {
        let mut store = MessageIdStore::new();
        assert_eq!(store.reserve(), 1);
        assert_eq!(store.reserve(), 2);
        assert_eq!(store.reserve(), 3);
    }

    #[test]
    fn released_ids_can_be_reused_explicitly() {
        let mut store = MessageIdStore::new();
        let id = store.reserve();
        assert!(store.is_in_flight(id));
        store.release(id);
        assert!(!store.is_in_flight(id));
        assert!(store.reserve_explicit(id).is_ok());
    }

    #[test]
    fn duplicate_explicit_id_is_rejected() {
        let mut store = MessageIdStore::new();
        store.reserve_explicit(7).unwrap();
        let err = store.reserve_explicit(7);
        assert!(matches!(err, Err(MessageIdError::InFlight { message_id: 7 })));
    }

    #[test]
    fn reserve_skips_in_flight_ids_on_wraparound() {
        let mut store = MessageIdStore {
            next: u16::MAX,
            in_flight: HashSet::from([u16::MAX, 1]),
        };
        assert_eq!(store.reserve(), 2);
    }
}
