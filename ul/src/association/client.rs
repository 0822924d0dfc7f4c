//! Association initiation module
//!
//! The module provides an abstraction for a DICOM association
//! in which this application entity initiates the association request,
//! thus taking the role of a service class user (SCU).
//! See [`ClientAssociationOptions`] for details and examples on how to
//! create an association.

use std::borrow::Cow;
use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::BytesMut;
use snafu::{ensure, OptionExt, ResultExt};

use crate::association::private::SyncAssociationSealed;
use crate::association::{
    encode_pdu, read_pdu_from_wire, Association, CloseSocket, ConnectSnafu,
    MissingAbstractSyntaxSnafu, NoAcceptedPresentationContextsSnafu, ProtocolVersionMismatchSnafu,
    RejectedSnafu, SendPduSnafu, SetReadTimeoutSnafu, SetWriteTimeoutSnafu, SocketOptions,
    SyncAssociation, UnexpectedPduSnafu, UnknownPduSnafu, WireSendSnafu,
};
use crate::association::{Error, Result};
use crate::pdu::{
    write_pdu, AssociationAC, AssociationRQ, Pdu, PresentationContextNegotiated,
    PresentationContextProposed, PresentationContextResultReason, RoleSelection, UserVariableItem,
    DEFAULT_MAX_PDU, LARGE_PDU_SIZE, PDU_HEADER_SIZE,
};
use crate::{IMPLEMENTATION_CLASS_UID, IMPLEMENTATION_VERSION_NAME};

pub use crate::association::{Association as _, SyncAssociation as _};

/// A DICOM association builder for a service class user (SCU).
///
/// This is the standard way of establishing an association
/// with a service class provider (SCP).
///
/// # Example
///
/// ```no_run
/// # use dicom_ul::ClientAssociationOptions;
///
/// # fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let association = ClientAssociationOptions::new()
///    .with_abstract_syntax("1.2.840.10008.1.1")
///    .with_transfer_syntax("1.2.840.10008.1.2.1")
///    .establish("127.0.0.1:104")?;
/// # Ok(())
/// # }
/// ```
///
/// The SCU will propose by default the transfer syntaxes
/// _Implicit VR Little Endian_ and _Explicit VR Little Endian_.
/// Other transfer syntaxes can be requested via `with_transfer_syntax`.
#[derive(Debug, Clone)]
pub struct ClientAssociationOptions<'a> {
    /// the calling AE title
    calling_ae_title: Cow<'a, str>,
    /// the called AE title
    called_ae_title: Cow<'a, str>,
    /// the requested application context name
    application_context_name: Cow<'a, str>,
    /// the list of requested abstract syntaxes
    abstract_syntax_uids: Vec<Cow<'a, str>>,
    /// the list of requested transfer syntaxes
    transfer_syntax_uids: Vec<Cow<'a, str>>,
    /// the roles this node proposes for a given abstract syntax
    role_selection: Vec<RoleSelection>,
    /// the user identity to present during negotiation
    user_identity: Option<crate::pdu::UserIdentity>,
    /// the expected protocol version
    protocol_version: u16,
    /// the maximum PDU length this node is willing to receive
    max_pdu_length: u32,
    /// whether to receive PDUs in strict mode
    strict: bool,
    /// options for the underlying TCP socket
    socket_options: SocketOptions,
}

impl Default for ClientAssociationOptions<'_> {
    fn default() -> Self {
        ClientAssociationOptions {
            calling_ae_title: "THIS-SCU".into(),
            called_ae_title: "ANY-SCP".into(),
            application_context_name: "1.2.840.10008.3.1.1.1".into(),
            abstract_syntax_uids: Vec::new(),
            transfer_syntax_uids: Vec::new(),
            role_selection: Vec::new(),
            user_identity: None,
            protocol_version: 1,
            max_pdu_length: DEFAULT_MAX_PDU,
            strict: true,
            socket_options: SocketOptions::default(),
        }
    }
}

impl<'a> ClientAssociationOptions<'a> {
    /// Create a new set of options for establishing an association.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define the calling application entity title for the association,
    /// which refers to this DICOM node.
    ///
    /// The default is `THIS-SCU`.
    pub fn calling_ae_title<T>(mut self, calling_ae_title: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        self.calling_ae_title = calling_ae_title.into();
        self
    }

    /// Define the called application entity title for the association,
    /// which refers to the target DICOM node.
    ///
    /// The default is `ANY-SCP`.
    pub fn called_ae_title<T>(mut self, called_ae_title: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        self.called_ae_title = called_ae_title.into();
        self
    }

    /// Override the requested application context name.
    pub fn application_context_name<T>(mut self, application_context_name: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        self.application_context_name = application_context_name.into();
        self
    }

    /// Include this abstract syntax
    /// in the list of proposed presentation contexts.
    pub fn with_abstract_syntax<T>(mut self, abstract_syntax_uid: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        self.abstract_syntax_uids.push(abstract_syntax_uid.into());
        self
    }

    /// Include this transfer syntax in each proposed presentation context.
    pub fn with_transfer_syntax<T>(mut self, transfer_syntax_uid: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        self.transfer_syntax_uids.push(transfer_syntax_uid.into());
        self
    }

    /// Propose an SCU/SCP role for the given abstract syntax
    /// (PS3.7 D.3.3.4). By default, a requestor proposes the
    /// conventional SCU role and nothing else.
    pub fn with_role_selection<T>(mut self, abstract_syntax_uid: T, scu_role: bool, scp_role: bool) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        self.role_selection.push(RoleSelection {
            abstract_syntax: abstract_syntax_uid.into().to_string(),
            scu_role,
            scp_role,
        });
        self
    }

    /// Present a user identity during negotiation.
    pub fn user_identity(mut self, user_identity: crate::pdu::UserIdentity) -> Self {
        self.user_identity = Some(user_identity);
        self
    }

    /// Override the maximum PDU length this node is willing to receive.
    pub fn max_pdu_length(mut self, value: u32) -> Self {
        self.max_pdu_length = value;
        self
    }

    /// Override strict mode: whether incoming PDUs must not surpass the
    /// negotiated maximum PDU length.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the read timeout for the underlying TCP socket.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.socket_options.read_timeout = Some(timeout);
        self
    }

    /// Set the write timeout for the underlying TCP socket.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.socket_options.write_timeout = Some(timeout);
        self
    }

    /// Set the connection timeout for the underlying TCP socket.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.socket_options.connection_timeout = Some(timeout);
        self
    }

    fn build_request(&self) -> Pdu {
        let presentation_contexts: Vec<_> = self
            .abstract_syntax_uids
            .iter()
            .enumerate()
            .map(|(i, abstract_syntax)| PresentationContextProposed {
                // odd-numbered, starting at 1, as required by PS3.8 9.3.2.2
                id: (i as u8) * 2 + 1,
                abstract_syntax: abstract_syntax.to_string(),
                transfer_syntaxes: if self.transfer_syntax_uids.is_empty() {
                    vec![
                        "1.2.840.10008.1.2.1".to_string(),
                        "1.2.840.10008.1.2".to_string(),
                    ]
                } else {
                    self.transfer_syntax_uids.iter().map(|ts| ts.to_string()).collect()
                },
            })
            .collect();

        let mut user_variables = vec![
            UserVariableItem::MaxLength(self.max_pdu_length),
            UserVariableItem::ImplementationClassUID(IMPLEMENTATION_CLASS_UID.to_string()),
            UserVariableItem::ImplementationVersionName(IMPLEMENTATION_VERSION_NAME.to_string()),
        ];
        user_variables.extend(
            self.role_selection
                .iter()
                .cloned()
                .map(UserVariableItem::RoleSelection),
        );
        if let Some(user_identity) = self.user_identity.clone() {
            user_variables.push(UserVariableItem::UserIdentityItem(user_identity));
        }

        Pdu::AssociationRQ(AssociationRQ {
            protocol_version: self.protocol_version,
            calling_ae_title: self.calling_ae_title.to_string(),
            called_ae_title: self.called_ae_title.to_string(),
            application_context_name: self.application_context_name.to_string(),
            presentation_contexts,
            user_variables,
        })
    }

    fn negotiate<S>(&self, mut socket: S, request: Pdu) -> Result<ClientAssociation<S>>
    where
        S: std::io::Read + std::io::Write + CloseSocket,
    {
        ensure!(
            !self.abstract_syntax_uids.is_empty(),
            MissingAbstractSyntaxSnafu
        );

        let mut write_buffer: Vec<u8> = Vec::with_capacity(self.max_pdu_length as usize);
        write_pdu(&mut write_buffer, &request).context(SendPduSnafu)?;
        socket.write_all(&write_buffer).context(WireSendSnafu)?;

        let mut read_buffer = BytesMut::with_capacity(
            (self.max_pdu_length.min(LARGE_PDU_SIZE) + PDU_HEADER_SIZE) as usize,
        );
        let response = read_pdu_from_wire(&mut socket, &mut read_buffer, self.max_pdu_length, self.strict)?;

        match response {
            Pdu::AssociationAC(AssociationAC {
                protocol_version,
                presentation_contexts,
                user_variables,
                called_ae_title,
                calling_ae_title: _,
                application_context_name: _,
            }) => {
                ensure!(
                    protocol_version == self.protocol_version,
                    ProtocolVersionMismatchSnafu {
                        expected: self.protocol_version,
                        got: protocol_version,
                    }
                );

                ensure!(
                    presentation_contexts
                        .iter()
                        .any(|pc| pc.reason == PresentationContextResultReason::Acceptance),
                    NoAcceptedPresentationContextsSnafu
                );

                let proposed_by_id: std::collections::HashMap<u8, &str> = self
                    .abstract_syntax_uids
                    .iter()
                    .enumerate()
                    .map(|(i, uid)| ((i as u8) * 2 + 1, uid.as_ref()))
                    .collect();

                let presentation_contexts_negotiated: Vec<_> = presentation_contexts
                    .into_iter()
                    .map(|pc| PresentationContextNegotiated {
                        abstract_syntax: proposed_by_id.get(&pc.id).copied().unwrap_or("").to_string(),
                        id: pc.id,
                        reason: pc.reason,
                        transfer_syntax: pc.transfer_syntax,
                    })
                    .collect();

                let peer_max_pdu_length = user_variables
                    .iter()
                    .find_map(|item| match item {
                        UserVariableItem::MaxLength(len) => Some(*len),
                        _ => None,
                    })
                    .unwrap_or(DEFAULT_MAX_PDU);
                let peer_max_pdu_length = if peer_max_pdu_length == 0 {
                    u32::MAX
                } else {
                    peer_max_pdu_length
                };

                Ok(ClientAssociation {
                    presentation_contexts: presentation_contexts_negotiated,
                    requestor_max_pdu_length: self.max_pdu_length,
                    acceptor_max_pdu_length: peer_max_pdu_length,
                    socket,
                    peer_ae_title: called_ae_title,
                    write_buffer,
                    strict: self.strict,
                    read_buffer,
                    user_variables,
                })
            }
            Pdu::AssociationRJ(association_rj) => RejectedSnafu { association_rj }.fail(),
            pdu @ Pdu::AbortRQ { .. }
            | pdu @ Pdu::ReleaseRQ
            | pdu @ Pdu::ReleaseRP
            | pdu @ Pdu::AssociationRQ(_)
            | pdu @ Pdu::PData { .. } => UnexpectedPduSnafu { pdu }.fail(),
            pdu @ Pdu::Unknown { .. } => UnknownPduSnafu { pdu }.fail(),
        }
    }

    /// Initiate the TCP connection and negotiate the association.
    pub fn establish<A: ToSocketAddrs>(self, address: A) -> Result<ClientAssociation<TcpStream>> {
        let request = self.build_request();
        let socket = TcpStream::connect(address).context(ConnectSnafu)?;
        socket
            .set_read_timeout(self.socket_options.read_timeout)
            .context(SetReadTimeoutSnafu)?;
        socket
            .set_write_timeout(self.socket_options.write_timeout)
            .context(SetWriteTimeoutSnafu)?;
        self.negotiate(socket, request)
    }

    /// Negotiate the association over an already-connected TLS stream.
    #[cfg(feature = "sync-tls")]
    pub fn establish_tls(
        self,
        address: impl ToSocketAddrs,
        config: impl Into<std::sync::Arc<rustls::ClientConfig>>,
        server_name: rustls::pki_types::ServerName<'static>,
    ) -> Result<ClientAssociation<rustls::StreamOwned<rustls::ClientConnection, TcpStream>>> {
        let request = self.build_request();
        let socket = TcpStream::connect(address).context(ConnectSnafu)?;
        socket
            .set_read_timeout(self.socket_options.read_timeout)
            .context(SetReadTimeoutSnafu)?;
        socket
            .set_write_timeout(self.socket_options.write_timeout)
            .context(SetWriteTimeoutSnafu)?;
        let conn = rustls::ClientConnection::new(config.into(), server_name)
            .context(crate::association::TlsConnectionSnafu)?;
        let tls_stream = rustls::StreamOwned::new(conn, socket);
        self.negotiate(tls_stream, request)
    }
}

/// A DICOM upper level association from the perspective
/// of the requesting application entity.
///
/// The most common operations of an established association are
/// [`send`](SyncAssociation::send) and [`receive`](SyncAssociation::receive).
/// Sending large P-Data fragments may be easier through the P-Data sender
/// abstraction (see [`send_pdata`](SyncAssociation::send_pdata)).
#[derive(Debug)]
pub struct ClientAssociation<S>
where
    S: std::io::Read + std::io::Write + CloseSocket,
{
    /// the negotiated presentation contexts
    presentation_contexts: Vec<PresentationContextNegotiated>,
    /// the maximum PDU length this node is willing to receive
    requestor_max_pdu_length: u32,
    /// the maximum PDU length the acceptor is willing to receive
    acceptor_max_pdu_length: u32,
    /// the TCP stream to the other DICOM node
    socket: S,
    /// the application entity title of the acceptor
    peer_ae_title: String,
    /// reusable buffer for sending PDUs on the wire
    write_buffer: Vec<u8>,
    /// whether to receive PDUs in strict mode
    strict: bool,
    /// read buffer from the socket
    read_buffer: BytesMut,
    /// user variables received from the peer
    user_variables: Vec<UserVariableItem>,
}

impl<S> Association for ClientAssociation<S>
where
    S: std::io::Read + std::io::Write + CloseSocket,
{
    fn presentation_contexts(&self) -> &[PresentationContextNegotiated] {
        &self.presentation_contexts
    }

    fn acceptor_max_pdu_length(&self) -> u32 {
        self.acceptor_max_pdu_length
    }

    fn requestor_max_pdu_length(&self) -> u32 {
        self.requestor_max_pdu_length
    }

    fn peer_ae_title(&self) -> &str {
        &self.peer_ae_title
    }

    fn user_variables(&self) -> &[UserVariableItem] {
        &self.user_variables
    }
}

impl<S> SyncAssociationSealed<S> for ClientAssociation<S>
where
    S: std::io::Read + std::io::Write + CloseSocket,
{
    fn send(&mut self, pdu: &Pdu) -> Result<()> {
        self.write_buffer.clear();
        encode_pdu(&mut self.write_buffer, pdu, self.acceptor_max_pdu_length + PDU_HEADER_SIZE)?;
        self.socket.write_all(&self.write_buffer).context(WireSendSnafu)
    }

    fn receive(&mut self) -> Result<Pdu> {
        read_pdu_from_wire(&mut self.socket, &mut self.read_buffer, self.requestor_max_pdu_length, self.strict)
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.socket.close()
    }
}

impl<S> SyncAssociation<S> for ClientAssociation<S>
where
    S: std::io::Read + std::io::Write + CloseSocket,
{
    fn inner_stream(&mut self) -> &mut S {
        &mut self.socket
    }

    fn get_mut(&mut self) -> (&mut S, &mut BytesMut) {
        let Self { socket, read_buffer, .. } = self;
        (socket, read_buffer)
    }
}

impl<S> ClientAssociation<S>
where
    S: std::io::Read + std::io::Write + CloseSocket,
{
    /// Gracefully release the association: send an A-RELEASE-RQ and wait
    /// for the A-RELEASE-RP, then shut down the transport. Consumes the
    /// association, since no further activity is possible afterwards.
    ///
    /// Handles release collision (PS3.8 Annex A, Sta7/Sta9/Sta11): if the
    /// peer requested its own release before seeing ours, answer in kind
    /// and keep waiting for its A-RELEASE-RP, rather than treating the
    /// second A-RELEASE-RQ as a protocol error.
    pub fn release(mut self) -> Result<()> {
        use crate::association::state_machine::{transition, Event, State};

        SyncAssociationSealed::send(&mut self, &Pdu::ReleaseRQ)?;
        let mut state = State::Sta7;

        loop {
            match SyncAssociationSealed::receive(&mut self)? {
                Pdu::ReleaseRP => {
                    let _ = transition(state, Event::AReleaseRpPdu);
                    break;
                }
                Pdu::ReleaseRQ => {
                    state = transition(state, Event::AReleaseRqPdu).1;
                    state = transition(state, Event::AReleaseRsp).1;
                    SyncAssociationSealed::send(&mut self, &Pdu::ReleaseRP)?;
                }
                pdu @ Pdu::AbortRQ { .. }
                | pdu @ Pdu::AssociationAC(_)
                | pdu @ Pdu::AssociationRJ(_)
                | pdu @ Pdu::AssociationRQ(_)
                | pdu @ Pdu::PData { .. } => return UnexpectedPduSnafu { pdu }.fail(),
                pdu @ Pdu::Unknown { .. } => return UnknownPduSnafu { pdu }.fail(),
            }
        }
        let _ = SyncAssociationSealed::close(&mut self);
        Ok(())
    }

    /// Abort the association unconditionally: available at any point in
    /// the association's lifetime, and terminal once sent.
    pub fn abort(mut self) -> Result<()> {
        SyncAssociationSealed::send(
            &mut self,
            &Pdu::AbortRQ {
                source: crate::pdu::AbortRQSource::ServiceUser,
            },
        )?;
        let _ = SyncAssociationSealed::close(&mut self);
        Ok(())
    }

    /// Find the accepted presentation context negotiated for the given
    /// abstract syntax, and resolve its transfer syntax from the registry.
    ///
    /// Used ahead of every `dimse::send_<operation>` call to turn an
    /// abstract syntax UID into the presentation context ID and transfer
    /// syntax those functions need.
    pub fn resolve_presentation_context(
        &self,
        abstract_syntax_uid: &str,
    ) -> Result<(u8, &'static dicom_encoding::TransferSyntax)> {
        use dicom_encoding::TransferSyntaxIndex;
        use dicom_transfer_syntax_registry::TransferSyntaxRegistry;

        let pc = self
            .presentation_contexts
            .iter()
            .find(|pc| pc.abstract_syntax == abstract_syntax_uid)
            .context(crate::association::UnknownPresentationContextSnafu {
                abstract_syntax_uid: abstract_syntax_uid.to_string(),
            })?;
        let ts = TransferSyntaxRegistry
            .get(&pc.transfer_syntax)
            .context(crate::association::UnknownTransferSyntaxSnafu {
                transfer_syntax_uid: pc.transfer_syntax.clone(),
            })?;
        Ok((pc.id, ts))
    }
}

impl<S> Drop for ClientAssociation<S>
where
    S: std::io::Read + std::io::Write + CloseSocket,
{
    fn drop(&mut self) {
        let _ = SyncAssociationSealed::send(self, &Pdu::ReleaseRQ);
        let _ = SyncAssociationSealed::close(self);
    }
}
