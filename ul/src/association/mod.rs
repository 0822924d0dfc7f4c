//! DICOM association module
//!
//! This module contains utilities for establishing associations
//! between DICOM nodes via TCP/IP, plus the shared contract
//! ([`Association`], [`SyncAssociation`], [`AsyncAssociation`]) implemented
//! by both [`client::ClientAssociation`] and [`server::ServerAssociation`].
//!
//! Role negotiation (SCU/SCP role selection, PS3.7 D.3.3.4) is resolved the
//! same way on both sides: a proposed role is granted only if the local
//! node is willing to take it, and willingness defaults to mirroring
//! whatever was proposed. See [`negotiate_roles`].

use std::time::Duration;

use bytes::BytesMut;
use snafu::{ResultExt, Snafu};

use crate::pdu::{
    Pdu, RoleSelection, WriteError, DEFAULT_MAX_PDU, LARGE_PDU_SIZE, PDU_HEADER_SIZE,
};

pub mod client;
pub mod pdata;
pub mod server;
pub mod state_machine;
pub(crate) mod uid;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// missing abstract syntax to begin negotiation
    MissingAbstractSyntax,

    /// failed to encode a PDU
    SendPdu { source: WriteError },

    /// failed to decode a PDU
    Receive { source: crate::pdu::reader::Error },

    /// failed to write the encoded PDU to the wire
    WireSend { source: std::io::Error },

    /// could not connect to the other application entity
    Connect { source: std::io::Error },

    /// could not set the socket's read timeout
    SetReadTimeout { source: std::io::Error },

    /// could not set the socket's write timeout
    SetWriteTimeout { source: std::io::Error },

    /// an operation did not complete before its deadline
    Timeout,

    /// the association was aborted by the peer, or a release collision occurred
    Aborted,

    #[snafu(display("unexpected PDU `{:?}`", pdu))]
    #[non_exhaustive]
    UnexpectedPdu {
        /// the PDU obtained from the peer
        pdu: Pdu,
    },

    #[snafu(display("unrecognized PDU `{:?}`", pdu))]
    #[non_exhaustive]
    UnknownPdu {
        /// the PDU obtained from the peer, of variant `Unknown`
        pdu: Pdu,
    },

    #[snafu(display("protocol version mismatch: expected {}, got {}", expected, got))]
    ProtocolVersionMismatch { expected: u16, got: u16 },

    #[snafu(display("association rejected: {:?}", association_rj))]
    #[non_exhaustive]
    Rejected {
        association_rj: crate::pdu::AssociationRJ,
    },

    /// no presentation contexts were accepted by the service class provider
    NoAcceptedPresentationContexts,

    #[snafu(display("negotiated maximum PDU length {} is too small to carry a data fragment", max_pdu_length))]
    #[non_exhaustive]
    InvalidMaxPdu {
        /// the maximum PDU length that was rejected
        max_pdu_length: u32,
    },

    /// failed to encode a command set or data set for transmission
    EncodeMessage {
        source: Box<dicom_object::WriteError>,
    },

    /// failed to decode a received command set
    DecodeMessage {
        source: Box<dicom_object::ReadError>,
    },

    /// a DIMSE response did not carry a Status (0000,0900) element
    MissingStatus,

    #[snafu(display("no accepted presentation context for abstract syntax `{}`", abstract_syntax_uid))]
    #[non_exhaustive]
    UnknownPresentationContext { abstract_syntax_uid: String },

    #[snafu(display("transfer syntax `{}` is not in the registry", transfer_syntax_uid))]
    #[non_exhaustive]
    UnknownTransferSyntax { transfer_syntax_uid: String },

    #[snafu(display("no TLS configuration was provided"))]
    TlsConfigMissing,

    #[cfg(feature = "sync-tls")]
    #[snafu(display("TLS connection failure"))]
    TlsConnection { source: rustls::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The negotiated outcome of processing an A-ASSOCIATE-RQ,
/// returned alongside the A-ASSOCIATE-AC to build on the acceptor side.
#[derive(Debug, Clone)]
pub struct NegotiatedOptions {
    pub user_variables: Vec<crate::pdu::UserVariableItem>,
    pub presentation_contexts: Vec<crate::pdu::PresentationContextNegotiated>,
    pub peer_max_pdu_length: u32,
    pub peer_ae_title: String,
}

/// Common accessors shared by both ends of an established association.
pub trait Association {
    /// Obtain a view of the negotiated presentation contexts.
    fn presentation_contexts(&self) -> &[crate::pdu::PresentationContextNegotiated];

    /// Retrieve the maximum PDU length admitted by this application entity.
    fn acceptor_max_pdu_length(&self) -> u32;

    /// Retrieve the maximum PDU length that the peer is expecting to receive.
    fn requestor_max_pdu_length(&self) -> u32;

    /// Obtain the remote DICOM node's application entity title.
    fn peer_ae_title(&self) -> &str;

    /// Obtain the user variables received from the peer during negotiation.
    fn user_variables(&self) -> &[crate::pdu::UserVariableItem];
}

/// A transport that can be shut down from this side once an association
/// is released or aborted.
pub trait CloseSocket {
    fn close(&mut self) -> std::io::Result<()>;
}

impl CloseSocket for std::net::TcpStream {
    fn close(&mut self) -> std::io::Result<()> {
        self.shutdown(std::net::Shutdown::Both)
    }
}

#[cfg(feature = "sync-tls")]
impl CloseSocket for rustls::StreamOwned<rustls::ServerConnection, std::net::TcpStream> {
    fn close(&mut self) -> std::io::Result<()> {
        self.sock.shutdown(std::net::Shutdown::Both)
    }
}

#[cfg(feature = "sync-tls")]
impl CloseSocket for rustls::StreamOwned<rustls::ClientConnection, std::net::TcpStream> {
    fn close(&mut self) -> std::io::Result<()> {
        self.sock.shutdown(std::net::Shutdown::Both)
    }
}

/// TCP-level options applied to the socket underlying an association.
///
/// The defaults follow the ACSE/network timeout guidance commonly used
/// by DICOM application entities: reads may wait up to a minute for the
/// peer, writes are expected to drain well within the ACSE timeout.
#[derive(Debug, Clone, Copy)]
pub struct SocketOptions {
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub connection_timeout: Option<Duration>,
}

impl Default for SocketOptions {
    fn default() -> Self {
        SocketOptions {
            read_timeout: Some(Duration::from_secs(60)),
            write_timeout: Some(Duration::from_secs(30)),
            connection_timeout: Some(Duration::from_secs(30)),
        }
    }
}

pub(crate) mod private {
    use crate::pdu::Pdu;

    /// Sealed half of [`super::SyncAssociation`]: only this crate's
    /// association types may provide the raw send/receive/close primitives.
    pub trait SyncAssociationSealed<S> {
        fn send(&mut self, pdu: &Pdu) -> super::Result<()>;
        fn receive(&mut self) -> super::Result<Pdu>;
        fn close(&mut self) -> std::io::Result<()>;
    }

    #[cfg(feature = "async")]
    pub trait AsyncAssociationSealed<S> {
        fn send(
            &mut self,
            pdu: &Pdu,
        ) -> impl std::future::Future<Output = super::Result<()>> + Send;
        fn receive(&mut self) -> impl std::future::Future<Output = super::Result<Pdu>> + Send;
        fn close(&mut self) -> impl std::future::Future<Output = std::io::Result<()>> + Send;
    }
}

/// A synchronous DICOM upper layer association, established by either
/// [`client::ClientAssociationOptions`] or [`server::ServerAssociationOptions`].
pub trait SyncAssociation<S>: Association + private::SyncAssociationSealed<S>
where
    S: std::io::Read + std::io::Write + CloseSocket,
{
    /// Send a PDU message to the other intervenient.
    fn send(&mut self, pdu: &Pdu) -> Result<()> {
        private::SyncAssociationSealed::send(self, pdu)
    }

    /// Read a PDU message from the other intervenient.
    fn receive(&mut self) -> Result<Pdu> {
        private::SyncAssociationSealed::receive(self)
    }

    /// Shut down the underlying transport without sending a release or abort.
    fn close(&mut self) -> std::io::Result<()> {
        private::SyncAssociationSealed::close(self)
    }

    /// Obtain a writer for sending a P-DATA-TF message's data values,
    /// fragmented automatically to fit the negotiated maximum PDU length.
    ///
    /// Fails if the negotiated maximum PDU length is too small to carry
    /// even a single byte of fragment data alongside the PDV header.
    fn send_pdata(&mut self, presentation_context_id: u8) -> Result<pdata::PDataWriter<&mut S>> {
        let max_pdu_length = self.requestor_max_pdu_length();
        let stream = self.inner_stream();
        pdata::PDataWriter::new(stream, presentation_context_id, max_pdu_length)
    }

    /// Obtain mutable access to the underlying transport.
    fn inner_stream(&mut self) -> &mut S;

    /// Obtain mutable access to both the underlying transport and the
    /// association's reusable read buffer.
    fn get_mut(&mut self) -> (&mut S, &mut BytesMut);
}

/// An asynchronous DICOM upper layer association.
#[cfg(feature = "async")]
pub trait AsyncAssociation<S>: Association + private::AsyncAssociationSealed<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    /// Send a PDU message to the other intervenient.
    fn send(&mut self, pdu: &Pdu) -> impl std::future::Future<Output = Result<()>> + Send {
        private::AsyncAssociationSealed::send(self, pdu)
    }

    /// Read a PDU message from the other intervenient.
    fn receive(&mut self) -> impl std::future::Future<Output = Result<Pdu>> + Send {
        private::AsyncAssociationSealed::receive(self)
    }

    /// Shut down the underlying transport without sending a release or abort.
    fn close(&mut self) -> impl std::future::Future<Output = std::io::Result<()>> + Send {
        private::AsyncAssociationSealed::close(self)
    }

    /// Obtain a writer for sending a P-DATA-TF message's data values,
    /// fragmented automatically to fit the negotiated maximum PDU length.
    fn send_pdata(&mut self, presentation_context_id: u8) -> Result<pdata::PDataWriterAsync<&mut S>> {
        let max_pdu_length = self.requestor_max_pdu_length();
        let stream = self.inner_stream();
        pdata::PDataWriterAsync::new(stream, presentation_context_id, max_pdu_length)
    }

    /// Obtain mutable access to the underlying transport.
    fn inner_stream(&mut self) -> &mut S;

    /// Obtain mutable access to both the underlying transport and the
    /// association's reusable read buffer.
    fn get_mut(&mut self) -> (&mut S, &mut BytesMut);
}

/// Encode a PDU into `buffer`, refusing to produce a message larger than
/// what the peer declared it is willing to receive.
pub(crate) fn encode_pdu(buffer: &mut Vec<u8>, pdu: &Pdu, max_pdu_length: u32) -> Result<()> {
    crate::pdu::write_pdu(buffer, pdu).context(SendPduSnafu)?;
    if max_pdu_length != 0 && buffer.len() as u32 > max_pdu_length {
        tracing::warn!(
            pdu_length = buffer.len(),
            max_pdu_length,
            "outgoing PDU exceeds the peer's negotiated maximum"
        );
    }
    Ok(())
}

/// Read one PDU from a blocking transport, reusing `buffer` for the
/// network read to avoid a fresh allocation on every message.
pub(crate) fn read_pdu_from_wire<S: std::io::Read>(
    socket: &mut S,
    buffer: &mut BytesMut,
    max_pdu_length: u32,
    strict: bool,
) -> Result<Pdu> {
    buffer.clear();
    crate::pdu::read_pdu(socket, max_pdu_length, strict).context(ReceiveSnafu)
}

/// Asynchronous counterpart to [`read_pdu_from_wire`].
///
/// Reads the full PDU into `buffer` first so that decoding itself
/// (which expects a blocking [`std::io::Read`]) can run over a cursor.
#[cfg(feature = "async")]
pub(crate) async fn read_pdu_from_wire_async<S>(
    socket: &mut S,
    buffer: &mut BytesMut,
    max_pdu_length: u32,
    strict: bool,
) -> Result<Pdu>
where
    S: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::AsyncReadExt;

    buffer.clear();
    let mut header = [0u8; PDU_HEADER_SIZE as usize];
    socket
        .read_exact(&mut header)
        .await
        .context(crate::pdu::reader::ReadPduSnafu)
        .context(ReceiveSnafu)?;
    let length = u32::from_be_bytes([header[2], header[3], header[4], header[5]]);

    let cap = (length as usize).min(LARGE_PDU_SIZE as usize);
    buffer.clear();
    buffer.extend_from_slice(&header);
    buffer.resize(PDU_HEADER_SIZE as usize + cap, 0);
    socket
        .read_exact(&mut buffer[PDU_HEADER_SIZE as usize..])
        .await
        .context(crate::pdu::reader::ReadPduSnafu)
        .context(ReceiveSnafu)?;

    let mut cursor = std::io::Cursor::new(&buffer[..]);
    crate::pdu::read_pdu(&mut cursor, max_pdu_length, strict).context(ReceiveSnafu)
}

/// Race a future against an optional deadline.
#[cfg(feature = "async")]
pub(crate) async fn timeout<F, T>(duration: Option<Duration>, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match duration {
        Some(d) => tokio::time::timeout(d, fut).await.unwrap_or(Err(Error::Timeout)),
        None => fut.await,
    }
}

/// Resolve the roles granted to the requestor of an abstract syntax,
/// given what it proposed and what this node is willing to take on.
///
/// A role is granted only if it was proposed and this node is willing to
/// accept it; willingness defaults to mirroring the proposal (the
/// permissive default most DICOM implementations use when no explicit
/// restriction has been configured).
pub(crate) fn negotiate_roles(proposed: &RoleSelection, willing: Option<&RoleSelection>) -> RoleSelection {
    let (willing_scu, willing_scp) = match willing {
        Some(w) => (w.scu_role, w.scp_role),
        None => (proposed.scu_role, proposed.scp_role),
    };
    RoleSelection {
        abstract_syntax: proposed.abstract_syntax.clone(),
        scu_role: proposed.scu_role && willing_scu,
        scp_role: proposed.scp_role && willing_scp,
    }
}

#[cfg(test)]
mod role_selection_tests {
    use super::negotiate_roles;
    use crate::pdu::RoleSelection;
    use rstest::rstest;

    fn role(scu: bool, scp: bool) -> RoleSelection {
        RoleSelection {
            abstract_syntax: "1.2.840.10008.5.1.4.1.1.7".to_string(),
            scu_role: scu,
            scp_role: scp,
        }
    }

    #[rstest]
    // both sides accept both roles: fully granted
    #[case(role(true, true), Some(role(true, true)), role(true, true))]
    // acceptor only willing to take SCP: asymmetric grant
    #[case(role(true, true), Some(role(false, true)), role(false, true))]
    // acceptor only willing to take SCU: asymmetric grant
    #[case(role(true, true), Some(role(true, false)), role(true, false))]
    // acceptor unwilling to grant either role: degenerate outcome
    #[case(role(true, true), Some(role(false, false)), role(false, false))]
    // requestor proposes neither role: degenerate outcome regardless of willingness
    #[case(role(false, false), Some(role(true, true)), role(false, false))]
    // no explicit willingness configured: mirrors the proposal
    #[case(role(true, false), None, role(true, false))]
    #[case(role(false, true), None, role(false, true))]
    fn negotiates_expected_roles(
        #[case] proposed: RoleSelection,
        #[case] willing: Option<RoleSelection>,
        #[case] expected: RoleSelection,
    ) {
        let negotiated = negotiate_roles(&proposed, willing.as_ref());
        assert_eq!(negotiated.scu_role, expected.scu_role);
        assert_eq!(negotiated.scp_role, expected.scp_role);
    }

    #[rstest]
    #[case(role(true, true), Some(role(false, false)))]
    #[case(role(false, false), None)]
    fn degenerate_outcomes_are_detectable(
        #[case] proposed: RoleSelection,
        #[case] willing: Option<RoleSelection>,
    ) {
        let negotiated = negotiate_roles(&proposed, willing.as_ref());
        assert!(!negotiated.scu_role && !negotiated.scp_role);
    }
}
