//! The Upper Layer state machine (PS3.8 Annex A).
//!
//! This is the pivot the rest of the association layer is built around:
//! every inbound PDU, service primitive and transport event is an [`Event`],
//! every state is a [`State`] variant named after its Annex A state number,
//! and [`StateMachine::step`] is the one place the (state, event) -> (action,
//! next state) table lives. [`client::ClientAssociation`](super::client::ClientAssociation)
//! and [`server::ServerAssociation`](super::server::ServerAssociation) drive
//! their connections by feeding it events and acting on the [`Action`] it
//! returns; neither owns a parallel copy of the table.

use snafu::Snafu;

/// Association states, Sta1 (idle) through Sta13 (awaiting transport close
/// after a release exchange), per PS3.8 Annex A.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Sta1: idle, no transport connection.
    Sta1,
    /// Sta2: transport connection open, awaiting A-ASSOCIATE-RQ PDU (acceptor).
    Sta2,
    /// Sta3: awaiting local A-ASSOCIATE response primitive (acceptor).
    Sta3,
    /// Sta4: awaiting transport connection to open (requestor).
    Sta4,
    /// Sta5: awaiting A-ASSOCIATE-AC or -RJ PDU (requestor).
    Sta5,
    /// Sta6: association established, ready for data transfer.
    Sta6,
    /// Sta7: awaiting A-RELEASE-RP PDU (requestor of release).
    Sta7,
    /// Sta8: awaiting local A-RELEASE response primitive (acceptor of release).
    Sta8,
    /// Sta9: release collision, awaiting local A-RELEASE response (both requested release).
    Sta9,
    /// Sta10: release collision, awaiting A-RELEASE-RP (acceptor requested, also requested by peer).
    Sta10,
    /// Sta11: release collision, awaiting local A-RELEASE response (requestor side of collision).
    Sta11,
    /// Sta12: release collision, awaiting A-RELEASE-RP (requestor side of collision).
    Sta12,
    /// Sta13: awaiting transport close confirmation.
    Sta13,
}

/// Every input the state machine can react to: service primitives requested
/// locally, PDUs received from the peer, and transport-level events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// A-ASSOCIATE request primitive (local user wants to associate).
    AAssociateReq,
    /// A-ASSOCIATE-RQ PDU received.
    AAssociateRqPdu,
    /// A-ASSOCIATE response primitive, accept.
    AAssociateRspAccept,
    /// A-ASSOCIATE response primitive, reject.
    AAssociateRspReject,
    /// A-ASSOCIATE-AC PDU received.
    AAssociateAcPdu,
    /// A-ASSOCIATE-RJ PDU received.
    AAssociateRjPdu,
    /// P-DATA request primitive.
    PDataReq,
    /// P-DATA-TF PDU received.
    PDataTfPdu,
    /// A-RELEASE request primitive.
    AReleaseReq,
    /// A-RELEASE-RQ PDU received.
    AReleaseRqPdu,
    /// A-RELEASE response primitive.
    AReleaseRsp,
    /// A-RELEASE-RP PDU received.
    AReleaseRpPdu,
    /// A-ABORT request primitive (local user aborts).
    AAbortReq,
    /// A-ABORT PDU received.
    AAbortPdu,
    /// Transport connection confirmed open (requestor side).
    TransportConnected,
    /// Transport connection closed by the peer or the network.
    TransportClosed,
    /// The ARTIM timer expired.
    ArtimExpired,
    /// A PDU was received that cannot be parsed, or is invalid for this state.
    InvalidPdu,
}

/// The action the caller must perform in response to a transition: send a
/// PDU, open/close the transport, start/stop the ARTIM timer, or deliver a
/// primitive upward. Matches the naming in PS3.8 Annex A.2 (AE-*, AA-*,
/// DT-*, AR-*) so the table below can be checked against the standard
/// line by line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// AE-1: issue TRANSPORT CONNECT request, start ARTIM.
    Ae1,
    /// AE-2: send A-ASSOCIATE-RQ PDU.
    Ae2,
    /// AE-3: issue A-ASSOCIATE confirmation (accept), stop ARTIM.
    Ae3,
    /// AE-4: issue A-ASSOCIATE confirmation (reject), close transport.
    Ae4,
    /// AE-5: stop ARTIM, accept transport connection.
    Ae5,
    /// AE-6: stop ARTIM; issue A-ASSOCIATE indication if acceptable, else AA-8.
    Ae6,
    /// AE-7: send A-ASSOCIATE-AC PDU.
    Ae7,
    /// AE-8: send A-ASSOCIATE-RJ PDU.
    Ae8,
    /// DT-1: send P-DATA-TF PDU.
    Dt1,
    /// DT-2: issue P-DATA indication.
    Dt2,
    /// AR-1: send A-RELEASE-RQ PDU.
    Ar1,
    /// AR-2: issue A-RELEASE indication.
    Ar2,
    /// AR-3: issue A-RELEASE confirmation, close transport.
    Ar3,
    /// AR-4: send A-RELEASE-RP PDU.
    Ar4,
    /// AR-5: stop ARTIM, close transport.
    Ar5,
    /// AR-6: issue P-DATA indication.
    Ar6,
    /// AR-7: send P-DATA-TF PDU.
    Ar7,
    /// AR-8: issue A-RELEASE indication (collision), requestor side continues.
    Ar8,
    /// AR-9: send A-RELEASE-RP PDU (collision, acceptor side).
    Ar9,
    /// AR-10: issue A-RELEASE confirmation (collision, requestor side).
    Ar10,
    /// AA-1: send A-ABORT PDU, start (or restart) ARTIM.
    Aa1,
    /// AA-2: stop ARTIM, close transport.
    Aa2,
    /// AA-3: issue A-ABORT indication, close transport.
    Aa3,
    /// AA-4: issue A-P-ABORT indication.
    Aa4,
    /// AA-5: stop ARTIM.
    Aa5,
    /// AA-6: ignore PDU.
    Aa6,
    /// AA-7: send A-ABORT PDU.
    Aa7,
    /// AA-8: send A-ABORT PDU, issue A-P-ABORT indication, start ARTIM.
    Aa8,
}

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("event {:?} is not valid in state {:?}", event, state))]
    #[non_exhaustive]
    InvalidTransition { state: State, event: Event },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Look up the action and next state for a (state, event) pair.
///
/// Every pair not explicitly listed below falls back to AA-8 (the
/// catch-all "unrecognized or invalid PDU" path mandated by PS3.8 Annex
/// A.2 for events that have no defined reaction in a given state), landing
/// back in Sta1 once the abort has been sent. This mirrors the standard's
/// own treatment of undefined transitions rather than inventing a
/// different fallback.
pub fn transition(state: State, event: Event) -> (Action, State) {
    use Event::*;
    use State::*;

    match (state, event) {
        // Sta1: idle.
        (Sta1, AAssociateReq) => (Action::Ae1, Sta4),
        (Sta1, TransportConnected) => (Action::Ae5, Sta2),

        // Sta2: transport open, awaiting A-ASSOCIATE-RQ.
        (Sta2, AAssociateRqPdu) => (Action::Ae6, Sta3),
        (Sta2, TransportClosed) => (Action::Aa5, Sta1),
        (Sta2, ArtimExpired) => (Action::Aa2, Sta1),
        (Sta2, InvalidPdu) => (Action::Aa1, Sta13),

        // Sta3: awaiting local A-ASSOCIATE response (acceptor).
        (Sta3, AAssociateRspAccept) => (Action::Ae7, Sta6),
        (Sta3, AAssociateRspReject) => (Action::Ae8, Sta13),
        (Sta3, AAbortReq) => (Action::Aa1, Sta13),
        (Sta3, TransportClosed) => (Action::Aa4, Sta1),

        // Sta4: awaiting transport connection to open (requestor).
        (Sta4, TransportConnected) => (Action::Ae2, Sta5),
        (Sta4, TransportClosed) => (Action::Aa4, Sta1),
        (Sta4, AAbortReq) => (Action::Aa2, Sta1),

        // Sta5: awaiting A-ASSOCIATE-AC/RJ (requestor).
        (Sta5, AAssociateAcPdu) => (Action::Ae3, Sta6),
        (Sta5, AAssociateRjPdu) => (Action::Ae4, Sta1),
        (Sta5, TransportClosed) => (Action::Aa4, Sta1),
        (Sta5, AAbortReq) => (Action::Aa1, Sta13),
        (Sta5, InvalidPdu) => (Action::Aa8, Sta13),

        // Sta6: established, data transfer.
        (Sta6, PDataReq) => (Action::Dt1, Sta6),
        (Sta6, PDataTfPdu) => (Action::Dt2, Sta6),
        (Sta6, AReleaseReq) => (Action::Ar1, Sta7),
        (Sta6, AReleaseRqPdu) => (Action::Ar2, Sta8),
        (Sta6, AAbortReq) => (Action::Aa1, Sta13),
        (Sta6, AAbortPdu) => (Action::Aa3, Sta1),
        (Sta6, TransportClosed) => (Action::Aa4, Sta1),

        // Sta7: requestor awaiting A-RELEASE-RP.
        (Sta7, AReleaseRpPdu) => (Action::Ar3, Sta1),
        (Sta7, AReleaseRqPdu) => (Action::Ar8, Sta9),
        (Sta7, PDataTfPdu) => (Action::Ar6, Sta7),
        (Sta7, AAbortReq) => (Action::Aa1, Sta13),
        (Sta7, AAbortPdu) => (Action::Aa3, Sta1),
        (Sta7, TransportClosed) => (Action::Aa4, Sta1),

        // Sta8: acceptor awaiting local A-RELEASE response.
        (Sta8, AReleaseRsp) => (Action::Ar4, Sta13),
        (Sta8, PDataReq) => (Action::Ar7, Sta8),
        (Sta8, AAbortReq) => (Action::Aa1, Sta13),
        (Sta8, TransportClosed) => (Action::Aa4, Sta1),

        // Sta9: release collision, acceptor awaiting local response.
        (Sta9, AReleaseRsp) => (Action::Ar9, Sta11),
        (Sta9, AAbortReq) => (Action::Aa1, Sta13),
        (Sta9, TransportClosed) => (Action::Aa4, Sta1),

        // Sta10: release collision, requestor awaiting A-RELEASE-RP.
        (Sta10, AReleaseRpPdu) => (Action::Ar10, Sta12),
        (Sta10, AAbortReq) => (Action::Aa1, Sta13),
        (Sta10, TransportClosed) => (Action::Aa4, Sta1),

        // Sta11: release collision, requestor side continuing after local response.
        (Sta11, AReleaseRpPdu) => (Action::Ar3, Sta1),
        (Sta11, TransportClosed) => (Action::Aa4, Sta1),

        // Sta12: release collision, acceptor side awaiting local confirmation.
        (Sta12, AReleaseRsp) => (Action::Ar4, Sta13),
        (Sta12, TransportClosed) => (Action::Aa4, Sta1),

        // Sta13: awaiting transport close.
        (Sta13, TransportClosed) => (Action::Aa5, Sta1),
        (Sta13, ArtimExpired) => (Action::Aa2, Sta1),
        (Sta13, AAbortPdu) => (Action::Aa6, Sta13),
        (Sta13, PDataTfPdu) => (Action::Aa6, Sta13),
        (Sta13, AReleaseRqPdu) => (Action::Aa6, Sta13),
        (Sta13, AReleaseRpPdu) => (Action::Aa6, Sta13),

        // Any event an established or transient state has no defined
        // reaction to: abort and restart the ARTIM timer (AA-8).
        _ => (Action::Aa8, Sta13),
    }
}

/// Owns the current [`State`] and advances it on each [`Event`], so callers
/// don't have to thread the current state through every call to
/// [`transition`] by hand.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: State,
}

impl Default for StateMachine {
    fn default() -> Self {
        StateMachine { state: State::Sta1 }
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Feed an event to the machine, updating its state and returning the
    /// action the caller must now perform.
    pub fn step(&mut self, event: Event) -> Action {
        let (action, next) = transition(self.state, event);
        self.state = next;
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(State::Sta1, Event::AAssociateReq, Action::Ae1, State::Sta4)]
    #[case(State::Sta4, Event::TransportConnected, Action::Ae2, State::Sta5)]
    #[case(State::Sta5, Event::AAssociateAcPdu, Action::Ae3, State::Sta6)]
    #[case(State::Sta5, Event::AAssociateRjPdu, Action::Ae4, State::Sta1)]
    #[case(State::Sta1, Event::TransportConnected, Action::Ae5, State::Sta2)]
    #[case(State::Sta2, Event::AAssociateRqPdu, Action::Ae6, State::Sta3)]
    #[case(State::Sta3, Event::AAssociateRspAccept, Action::Ae7, State::Sta6)]
    #[case(State::Sta3, Event::AAssociateRspReject, Action::Ae8, State::Sta13)]
    #[case(State::Sta6, Event::AReleaseReq, Action::Ar1, State::Sta7)]
    #[case(State::Sta7, Event::AReleaseRpPdu, Action::Ar3, State::Sta1)]
    #[case(State::Sta6, Event::AReleaseRqPdu, Action::Ar2, State::Sta8)]
    #[case(State::Sta8, Event::AReleaseRsp, Action::Ar4, State::Sta13)]
    fn test_known_transitions(
        #[case] state: State,
        #[case] event: Event,
        #[case] expected_action: Action,
        #[case] expected_state: State,
    ) {
        let (action, next) = transition(state, event);
        assert_eq!(action, expected_action);
        assert_eq!(next, expected_state);
    }

    #[test]
    fn release_collision_resolves_via_ar8_through_ar11() {
        // Both sides send A-RELEASE-RQ before either sees the other's:
        // the requestor (now in Sta7 awaiting A-RELEASE-RP) receives an
        // A-RELEASE-RQ PDU instead, and AR-8 routes it into the collision
        // branch rather than treating it as a protocol error.
        let (action, next) = transition(State::Sta7, Event::AReleaseRqPdu);
        assert_eq!(action, Action::Ar8);
        assert_eq!(next, State::Sta9);

        let (action, next) = transition(next, Event::AReleaseRsp);
        assert_eq!(action, Action::Ar9);
        assert_eq!(next, State::Sta11);

        let (action, next) = transition(next, Event::AReleaseRpPdu);
        assert_eq!(action, Action::Ar3);
        assert_eq!(next, State::Sta1);
    }

    #[test]
    fn undefined_transition_falls_back_to_aa8() {
        let (action, next) = transition(State::Sta6, Event::AAssociateAcPdu);
        assert_eq!(action, Action::Aa8);
        assert_eq!(next, State::Sta13);
    }

    #[test]
    fn state_machine_tracks_current_state() {
        let mut fsm = StateMachine::new();
        assert_eq!(fsm.state(), State::Sta1);
        assert_eq!(fsm.step(Event::AAssociateReq), Action::Ae1);
        assert_eq!(fsm.state(), State::Sta4);
    }
}
