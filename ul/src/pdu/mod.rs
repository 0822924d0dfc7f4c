//! PDU data types for the DICOM Upper Layer protocol (PS3.8).
//!
//! This module holds the wire-level value types; encoding and decoding
//! live in [`reader`] and [`writer`] (and their non-blocking counterparts).

use snafu::Snafu;

pub mod reader;
pub mod writer;
pub mod writer_nonblocking;

pub mod commands;
pub mod generated;

pub use reader::{read_pdu, DEFAULT_MAX_PDU, MAXIMUM_PDU_SIZE, MINIMUM_PDU_SIZE, PDU_HEADER_SIZE};
pub use writer::write_pdu;
pub use writer_nonblocking::write_pdu as write_pdu_async;
pub use commands::decode_command_set;

/// A cap on buffer preallocation, independent of the protocol's own
/// [`MAXIMUM_PDU_SIZE`]. A peer's advertised maximum PDU length is
/// attacker-influenced; this bounds how much we ever preallocate for it.
pub const LARGE_PDU_SIZE: u32 = 1_048_576;

/// A presentation context as proposed by an association requestor.
#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub struct PresentationContextProposed {
    /// the presentation context ID, an odd integer between 1 and 255
    pub id: u8,
    /// the UID of the abstract syntax (SOP class) proposed
    pub abstract_syntax: String,
    /// the list of transfer syntaxes proposed, in preference order
    pub transfer_syntaxes: Vec<String>,
}

/// A presentation context as returned in an A-ASSOCIATE-AC,
/// carrying the single transfer syntax the acceptor chose
/// (significant only when `reason` is [`Acceptance`](PresentationContextResultReason::Acceptance)).
#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub struct PresentationContextResult {
    pub id: u8,
    pub reason: PresentationContextResultReason,
    pub transfer_syntax: String,
}

/// The outcome of negotiating a single presentation context,
/// carrying both halves (the abstract syntax survives from the proposal,
/// since the AC PDU does not echo it back on the wire).
#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub struct PresentationContextNegotiated {
    pub id: u8,
    pub reason: PresentationContextResultReason,
    pub transfer_syntax: String,
    pub abstract_syntax: String,
}

#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum PresentationContextResultReason {
    Acceptance = 0,
    UserRejection = 1,
    NoReason = 2,
    AbstractSyntaxNotSupported = 3,
    TransferSyntaxesNotSupported = 4,
}

impl PresentationContextResultReason {
    pub(crate) fn from(value: u8) -> Option<Self> {
        match value {
            0 => Some(PresentationContextResultReason::Acceptance),
            1 => Some(PresentationContextResultReason::UserRejection),
            2 => Some(PresentationContextResultReason::NoReason),
            3 => Some(PresentationContextResultReason::AbstractSyntaxNotSupported),
            4 => Some(PresentationContextResultReason::TransferSyntaxesNotSupported),
            _ => None,
        }
    }
}

/// The two roles a node can play within one presentation context's
/// abstract syntax, per PS3.7 Annex D.3.3.4.
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum SopClassRole {
    Scu,
    Scp,
}

/// SCP/SCU Role Selection Sub-Item (PS3.8 D.3.3.4), a user-information
/// item keyed by abstract syntax rather than by presentation context ID
/// (a node may propose/negotiate a role for an abstract syntax regardless
/// of which presentation context ID eventually carries it).
#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub struct RoleSelection {
    pub abstract_syntax: String,
    /// whether the proposer/acceptor may act as SCU for this abstract syntax
    pub scu_role: bool,
    /// whether the proposer/acceptor may act as SCP for this abstract syntax
    pub scp_role: bool,
}

/// Asynchronous Operations Window Sub-Item (PS3.7 D.3.3.3).
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub struct AsyncOperationsWindow {
    pub max_operations_invoked: u16,
    pub max_operations_performed: u16,
}

/// SOP Class Common Extended Negotiation Sub-Item (PS3.7 D.3.3.6).
/// The related general SOP classes and service-class content are opaque
/// to the upper layer; only their presence and UIDs are structural.
#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub struct SopClassCommonExtendedNegotiation {
    pub sop_class_uid: String,
    pub service_class_uid: String,
    pub related_general_sop_classes: Vec<String>,
}

/// The well-known user identity types (PS3.7 D.3.3.7.1).
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum UserIdentityType {
    Username = 1,
    UsernameAndPassword = 2,
    Kerberos = 3,
    Saml = 4,
    Jwt = 5,
}

impl UserIdentityType {
    pub(crate) fn from(value: u8) -> Option<Self> {
        match value {
            1 => Some(UserIdentityType::Username),
            2 => Some(UserIdentityType::UsernameAndPassword),
            3 => Some(UserIdentityType::Kerberos),
            4 => Some(UserIdentityType::Saml),
            5 => Some(UserIdentityType::Jwt),
            _ => None,
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        self as u8
    }
}

/// User Identity Negotiation Sub-Item, RQ variant (item 0x58).
#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub struct UserIdentity {
    positive_response_requested: bool,
    identity_type: UserIdentityType,
    primary_field: Vec<u8>,
    secondary_field: Vec<u8>,
}

impl UserIdentity {
    pub fn new(
        positive_response_requested: bool,
        identity_type: UserIdentityType,
        primary_field: Vec<u8>,
        secondary_field: Vec<u8>,
    ) -> Self {
        UserIdentity {
            positive_response_requested,
            identity_type,
            primary_field,
            secondary_field,
        }
    }

    pub fn positive_response_requested(&self) -> bool {
        self.positive_response_requested
    }

    pub fn identity_type(&self) -> UserIdentityType {
        self.identity_type
    }

    pub fn primary_field(&self) -> &[u8] {
        &self.primary_field
    }

    pub fn secondary_field(&self) -> &[u8] {
        &self.secondary_field
    }
}

/// User Identity Negotiation Sub-Item, AC variant (item 0x59):
/// the acceptor's positive-response token, sent only when the requestor's
/// [`UserIdentity::positive_response_requested`] was true.
#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub struct UserIdentityServerResponse {
    server_response: Vec<u8>,
}

impl UserIdentityServerResponse {
    pub fn new(server_response: Vec<u8>) -> Self {
        UserIdentityServerResponse { server_response }
    }

    pub fn server_response(&self) -> &[u8] {
        &self.server_response
    }
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum AssociationRJResult {
    Permanent,
    Transient,
}

impl AssociationRJResult {
    pub(crate) fn from(value: u8) -> Option<Self> {
        match value {
            1 => Some(AssociationRJResult::Permanent),
            2 => Some(AssociationRJResult::Transient),
            _ => None,
        }
    }
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum AssociationRJSource {
    ServiceUser(AssociationRJServiceUserReason),
    ServiceProviderASCE(AssociationRJServiceProviderASCEReason),
    ServiceProviderPresentation(AssociationRJServiceProviderPresentationReason),
}

impl AssociationRJSource {
    pub(crate) fn from(source: u8, reason: u8) -> Option<Self> {
        match source {
            1 => AssociationRJServiceUserReason::from(reason).map(AssociationRJSource::ServiceUser),
            2 => AssociationRJServiceProviderASCEReason::from(reason)
                .map(AssociationRJSource::ServiceProviderASCE),
            3 => AssociationRJServiceProviderPresentationReason::from(reason)
                .map(AssociationRJSource::ServiceProviderPresentation),
            _ => None,
        }
    }

    /// The numeric (source, reason) pair as written on the wire.
    pub(crate) fn to_bytes(&self) -> (u8, u8) {
        match self {
            AssociationRJSource::ServiceUser(reason) => (1, reason.to_byte()),
            AssociationRJSource::ServiceProviderASCE(reason) => (2, reason.to_byte()),
            AssociationRJSource::ServiceProviderPresentation(reason) => (3, reason.to_byte()),
        }
    }
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum AssociationRJServiceUserReason {
    NoReasonGiven,
    ApplicationContextNameNotSupported,
    CallingAETitleNotRecognized,
    CalledAETitleNotRecognized,
    Reserved(u8),
}

impl AssociationRJServiceUserReason {
    pub(crate) fn from(value: u8) -> Option<Self> {
        Some(match value {
            1 => AssociationRJServiceUserReason::NoReasonGiven,
            2 => AssociationRJServiceUserReason::ApplicationContextNameNotSupported,
            3 => AssociationRJServiceUserReason::CallingAETitleNotRecognized,
            7 => AssociationRJServiceUserReason::CalledAETitleNotRecognized,
            v @ (4..=6 | 8..=10) => AssociationRJServiceUserReason::Reserved(v),
            _ => return None,
        })
    }

    pub(crate) fn to_byte(&self) -> u8 {
        match self {
            AssociationRJServiceUserReason::NoReasonGiven => 1,
            AssociationRJServiceUserReason::ApplicationContextNameNotSupported => 2,
            AssociationRJServiceUserReason::CallingAETitleNotRecognized => 3,
            AssociationRJServiceUserReason::CalledAETitleNotRecognized => 7,
            AssociationRJServiceUserReason::Reserved(v) => *v,
        }
    }
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum AssociationRJServiceProviderASCEReason {
    NoReasonGiven,
    ProtocolVersionNotSupported,
}

impl AssociationRJServiceProviderASCEReason {
    pub(crate) fn from(value: u8) -> Option<Self> {
        match value {
            1 => Some(AssociationRJServiceProviderASCEReason::NoReasonGiven),
            2 => Some(AssociationRJServiceProviderASCEReason::ProtocolVersionNotSupported),
            _ => None,
        }
    }

    pub(crate) fn to_byte(&self) -> u8 {
        match self {
            AssociationRJServiceProviderASCEReason::NoReasonGiven => 1,
            AssociationRJServiceProviderASCEReason::ProtocolVersionNotSupported => 2,
        }
    }
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum AssociationRJServiceProviderPresentationReason {
    TemporaryCongestion,
    LocalLimitExceeded,
    Reserved(u8),
}

impl AssociationRJServiceProviderPresentationReason {
    pub(crate) fn from(value: u8) -> Option<Self> {
        Some(match value {
            1 => AssociationRJServiceProviderPresentationReason::TemporaryCongestion,
            2 => AssociationRJServiceProviderPresentationReason::LocalLimitExceeded,
            v @ (0 | 3..=7) => AssociationRJServiceProviderPresentationReason::Reserved(v),
            _ => return None,
        })
    }

    pub(crate) fn to_byte(&self) -> u8 {
        match self {
            AssociationRJServiceProviderPresentationReason::TemporaryCongestion => 1,
            AssociationRJServiceProviderPresentationReason::LocalLimitExceeded => 2,
            AssociationRJServiceProviderPresentationReason::Reserved(v) => *v,
        }
    }
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub struct PDataValue {
    pub presentation_context_id: u8,
    pub value_type: PDataValueType,
    pub is_last: bool,
    pub data: Vec<u8>,
}

#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum PDataValueType {
    Command,
    Data,
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum AbortRQSource {
    ServiceUser,
    ServiceProvider(AbortRQServiceProviderReason),
    Reserved,
}

impl AbortRQSource {
    pub(crate) fn from(source: u8, reason: u8) -> Option<Self> {
        match source {
            0 => Some(AbortRQSource::ServiceUser),
            1 => Some(AbortRQSource::Reserved),
            2 => AbortRQServiceProviderReason::from(reason).map(AbortRQSource::ServiceProvider),
            _ => None,
        }
    }

    pub(crate) fn to_bytes(&self) -> (u8, u8) {
        match self {
            AbortRQSource::ServiceUser => (0, 0),
            AbortRQSource::Reserved => (1, 0),
            AbortRQSource::ServiceProvider(reason) => (2, reason.to_byte()),
        }
    }
}

#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum AbortRQServiceProviderReason {
    ReasonNotSpecified,
    UnrecognizedPdu,
    Reserved,
    UnrecognizedPduParameter,
    UnexpectedPduParameter,
    InvalidPduParameter,
}

impl AbortRQServiceProviderReason {
    pub(crate) fn from(value: u8) -> Option<Self> {
        match value {
            0 => Some(AbortRQServiceProviderReason::ReasonNotSpecified),
            1 => Some(AbortRQServiceProviderReason::UnrecognizedPdu),
            2 => Some(AbortRQServiceProviderReason::Reserved),
            3 => Some(AbortRQServiceProviderReason::UnrecognizedPduParameter),
            4 => Some(AbortRQServiceProviderReason::UnexpectedPduParameter),
            5 => Some(AbortRQServiceProviderReason::InvalidPduParameter),
            _ => None,
        }
    }

    pub(crate) fn to_byte(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum UserVariableItem {
    Unknown(u8, Vec<u8>),
    MaxLength(u32),
    ImplementationClassUID(String),
    ImplementationVersionName(String),
    RoleSelection(RoleSelection),
    AsyncOperationsWindow(AsyncOperationsWindow),
    SopClassExtendedNegotiationSubItem(String, Vec<u8>),
    SopClassCommonExtendedNegotiationSubItem(SopClassCommonExtendedNegotiation),
    UserIdentityItem(UserIdentity),
    UserIdentityItemAC(UserIdentityServerResponse),
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub struct AssociationRQ {
    pub protocol_version: u16,
    pub calling_ae_title: String,
    pub called_ae_title: String,
    pub application_context_name: String,
    pub presentation_contexts: Vec<PresentationContextProposed>,
    pub user_variables: Vec<UserVariableItem>,
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub struct AssociationAC {
    pub protocol_version: u16,
    pub calling_ae_title: String,
    pub called_ae_title: String,
    pub application_context_name: String,
    pub presentation_contexts: Vec<PresentationContextResult>,
    pub user_variables: Vec<UserVariableItem>,
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub struct AssociationRJ {
    pub result: AssociationRJResult,
    pub source: AssociationRJSource,
}

/// An Upper Layer protocol data unit (PS3.8 §9.3).
#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
#[non_exhaustive]
pub enum Pdu {
    AssociationRQ(AssociationRQ),
    AssociationAC(AssociationAC),
    AssociationRJ(AssociationRJ),
    PData { data: Vec<PDataValue> },
    ReleaseRQ,
    ReleaseRP,
    AbortRQ { source: AbortRQSource },
    /// a PDU of a type this crate does not recognize;
    /// its body is kept verbatim so that a caller may still choose
    /// to abort cleanly instead of panicking on unknown wire input
    Unknown { pdu_type: u8, data: Vec<u8> },
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub(crate) enum PduVariableItem {
    Unknown(u8),
    ApplicationContext(String),
    PresentationContextProposed(PresentationContextProposed),
    PresentationContextResult(PresentationContextResult),
    UserVariables(Vec<UserVariableItem>),
}

/// Errors that occur while building PDU bytes from a [`Pdu`] value.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum WriteError {
    #[snafu(display("could not write PDU field `{}`", field))]
    WriteField {
        field: &'static str,
        source: std::io::Error,
    },

    #[snafu(display("could not write {} reserved bytes", bytes))]
    WriteReserved { bytes: u32, source: std::io::Error },

    #[snafu(display("could not encode text field `{}`", field))]
    EncodeField {
        field: &'static str,
        source: dicom_encoding::text::EncodeTextError,
    },

    #[snafu(display("failed to write chunk `{}`", name))]
    WriteChunk {
        name: &'static str,
        source: writer::WriteChunkError,
    },

    #[snafu(display("could not write the command set of a DIMSE message"))]
    WriteCommandSet {
        source: Box<dicom_object::WriteError>,
    },

    #[snafu(display("could not write the data set of a DIMSE message"))]
    WriteDataSet {
        source: Box<dicom_object::WriteError>,
    },
}
