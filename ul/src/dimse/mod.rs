//! DIMSE-level concerns that sit above the raw PDU/association layers:
//! categorizing response status codes, tracking Message IDs, and sending
//! or receiving whole DIMSE messages (a command set plus its optional
//! data set) over an established association.
//!
//! A DIMSE message may be split across several P-DATA-TF PDUs on the
//! wire (PS3.8 Annex E); [`receive_message`] reassembles one back into a
//! decoded command set and the raw (still transfer-syntax-encoded) data
//! set bytes, if any. The `send_<operation>` functions build the
//! corresponding command, fragment it via the `Command` traits in
//! [`crate::pdu::commands`], and send the resulting PDUs in order.

pub mod messageid;
pub mod status;

pub use messageid::{MessageIdError, MessageIdStore};
pub use status::{categorize, Category};

use std::io::{Read, Write};

use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_encoding::TransferSyntax;
use dicom_object::InMemDicomObject;
use snafu::OptionExt;

use crate::association::{CloseSocket, MissingStatusSnafu, Result, SyncAssociation, UnexpectedPduSnafu};
use crate::pdu::commands::{
    CommandDatasetType, DatasetConditionalCommand, DatasetForbiddenCommand, DatasetRequiredCommand,
    Priority,
};
use crate::pdu::generated::{
    CCancelRq, CEchoRq, CFindRq, CGetRq, CMoveRq, CStoreRq, NActionRq, NCreateRq, NDeleteRq,
    NEventReportRq, NGetRq, NSetRq,
};
use crate::pdu::{decode_command_set, PDataValueType, Pdu};

/// The decoded outcome of a single-response DIMSE exchange: a request
/// followed by exactly one response (C-ECHO, C-STORE, and every DIMSE-N
/// service).
#[derive(Debug)]
pub struct MessageOutcome {
    pub status: u16,
    pub category: Category,
    /// the response command set, for services whose response carries
    /// fields beyond Status (e.g. Affected SOP Instance UID)
    pub command: InMemDicomObject,
    /// the response data set, still encoded per the negotiated transfer
    /// syntax, present only when the command set's Command Data Set Type
    /// says so
    pub dataset: Option<Vec<u8>>,
}

/// One response in a (possibly multi-response) C-FIND/C-GET/C-MOVE
/// exchange.
#[derive(Debug)]
pub struct QueryResponse {
    pub status: u16,
    pub category: Category,
    /// the identifier data set, still encoded per the negotiated transfer
    /// syntax, sent alongside Pending C-FIND responses
    pub identifier: Option<Vec<u8>>,
    pub remaining_suboperations: Option<u16>,
    pub completed_suboperations: Option<u16>,
    pub failed_suboperations: Option<u16>,
    pub warning_suboperations: Option<u16>,
}

/// A lazy stream of responses for a multi-response DIMSE-C operation.
/// Each call to [`Iterator::next`] blocks for the next response PDU(s)
/// and yields it; the stream is exhausted once a non-Pending status is
/// seen (PS3.7 C.4.1, C.4.2, C.4.3), matching [`Category::is_terminal`].
pub struct ResponseStream<'a, S>
where
    S: Read + Write + CloseSocket,
{
    association: &'a mut dyn SyncAssociation<S>,
    message_ids: &'a mut MessageIdStore,
    message_id: u16,
    pc_selected: u8,
    strict: bool,
    done: bool,
}

impl<S> ResponseStream<'_, S>
where
    S: Read + Write + CloseSocket,
{
    /// The Message ID identifying this operation, as carried by Message
    /// ID Being Responded To (0000,0120) on every response.
    pub fn message_id(&self) -> u16 {
        self.message_id
    }

    /// Ask the service class provider to stop producing further Pending
    /// responses for this operation (C-CANCEL-RQ, PS3.7 9.3.2.3/9.3.3.3/
    /// 9.3.4.3). The stream is not closed by this call: a provider may
    /// still be mid-flight on a response it had already started, and is
    /// expected to answer with one last, non-Pending response which must
    /// still be read out of the stream to reach [`Category::is_terminal`].
    pub fn cancel(&mut self) -> Result<()> {
        tracing::debug!(message_id = self.message_id, "sending C-CANCEL-RQ");
        send_c_cancel(self.association, self.pc_selected, self.message_id)
    }
}

impl<S> Iterator for ResponseStream<'_, S>
where
    S: Read + Write + CloseSocket,
{
    type Item = Result<QueryResponse>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let outcome = receive_message(self.association, self.strict).and_then(|(command, identifier)| {
            warn_on_mismatched_correlation(&command, self.message_id);
            let status = status_of(&command)?;
            Ok(QueryResponse {
                status,
                category: categorize(status),
                identifier,
                remaining_suboperations: get_u16(&command, tags::NUMBER_OF_REMAINING_SUBOPERATIONS),
                completed_suboperations: get_u16(&command, tags::NUMBER_OF_COMPLETED_SUBOPERATIONS),
                failed_suboperations: get_u16(&command, tags::NUMBER_OF_FAILED_SUBOPERATIONS),
                warning_suboperations: get_u16(&command, tags::NUMBER_OF_WARNING_SUBOPERATIONS),
            })
        });

        match &outcome {
            Ok(response) => self.done = response.category.is_terminal(),
            Err(_) => self.done = true,
        }
        if self.done {
            self.message_ids.release(self.message_id);
        }
        Some(outcome)
    }
}

fn get_u16(ds: &InMemDicomObject, tag: Tag) -> Option<u16> {
    ds.get(tag).and_then(|v| v.to_int().ok())
}

fn status_of(command: &InMemDicomObject) -> Result<u16> {
    get_u16(command, tags::STATUS).context(MissingStatusSnafu)
}

fn warn_on_mismatched_correlation(command: &InMemDicomObject, expected_message_id: u16) {
    if let Some(responded_to) = get_u16(command, tags::MESSAGE_ID_BEING_RESPONDED_TO) {
        if responded_to != expected_message_id {
            tracing::warn!(
                expected_message_id,
                responded_to,
                "DIMSE response correlates to a different Message ID than the one awaited"
            );
        }
    }
}

fn send_pdus<S>(association: &mut dyn SyncAssociation<S>, pdus: Vec<Pdu>) -> Result<()>
where
    S: Read + Write + CloseSocket,
{
    for pdu in pdus {
        association.send(&pdu)?;
    }
    Ok(())
}

/// Read one complete DIMSE message off the association: its command set,
/// reassembled from however many P-DATA-TF PDUs it was fragmented into on
/// the wire, and the accompanying data set bytes, still encoded per the
/// negotiated transfer syntax, when the command set's Command Data Set
/// Type says one follows.
pub fn receive_message<S>(
    association: &mut dyn SyncAssociation<S>,
    strict: bool,
) -> Result<(InMemDicomObject, Option<Vec<u8>>)>
where
    S: Read + Write + CloseSocket,
{
    let command_bytes = receive_fragmented(association, PDataValueType::Command)?;
    let command = decode_command_set(&command_bytes, strict)
        .map_err(|source| crate::association::Error::DecodeMessage { source })?;

    let has_dataset = get_u16(&command, tags::COMMAND_DATA_SET_TYPE)
        .map(|v| v != CommandDatasetType::Absent as u16)
        .unwrap_or(false);

    if has_dataset {
        let dataset_bytes = receive_fragmented(association, PDataValueType::Data)?;
        tracing::debug!(bytes = dataset_bytes.len(), "received DIMSE data set");
        Ok((command, Some(dataset_bytes)))
    } else {
        Ok((command, None))
    }
}

/// Read consecutive P-DATA-TF PDUs, keeping only the PDVs of `expected`
/// type, until one marked as the last fragment is seen.
fn receive_fragmented<S>(association: &mut dyn SyncAssociation<S>, expected: PDataValueType) -> Result<Vec<u8>>
where
    S: Read + Write + CloseSocket,
{
    let mut buffer = Vec::new();
    loop {
        match association.receive()? {
            Pdu::PData { data } => {
                for pdv in data {
                    if pdv.value_type != expected {
                        continue;
                    }
                    buffer.extend_from_slice(&pdv.data);
                    if pdv.is_last {
                        return Ok(buffer);
                    }
                }
            }
            pdu => return UnexpectedPduSnafu { pdu }.fail(),
        }
    }
}

fn exchange<S>(
    association: &mut dyn SyncAssociation<S>,
    message_ids: &mut MessageIdStore,
    message_id: u16,
    pdus: Vec<Pdu>,
    strict: bool,
) -> Result<MessageOutcome>
where
    S: Read + Write + CloseSocket,
{
    send_pdus(association, pdus)?;
    let (command, dataset) = receive_message(association, strict)?;
    message_ids.release(message_id);
    warn_on_mismatched_correlation(&command, message_id);
    let status = status_of(&command)?;
    Ok(MessageOutcome {
        status,
        category: categorize(status),
        command,
        dataset,
    })
}

/// Send a C-ECHO-RQ and wait for its C-ECHO-RSP (PS3.7 9.3.5).
pub fn send_c_echo<S>(
    association: &mut dyn SyncAssociation<S>,
    message_ids: &mut MessageIdStore,
    pc_selected: u8,
    affected_sop_class_uid: &str,
) -> Result<MessageOutcome>
where
    S: Read + Write + CloseSocket,
{
    let message_id = message_ids.reserve();
    tracing::debug!(message_id, affected_sop_class_uid, "sending C-ECHO-RQ");
    let request = CEchoRq {
        message_id,
        message_id_being_responded_to: None,
        affected_sop_class_uid,
        status: None,
    };
    let pdus = request.pdu(pc_selected, association.acceptor_max_pdu_length())?;
    exchange(association, message_ids, message_id, pdus, true)
}

/// Send a C-STORE-RQ with its composite SOP instance, and wait for its
/// C-STORE-RSP (PS3.7 9.3.1).
#[allow(clippy::too_many_arguments)]
pub fn send_c_store<S>(
    association: &mut dyn SyncAssociation<S>,
    message_ids: &mut MessageIdStore,
    pc_selected: u8,
    affected_sop_class_uid: &str,
    affected_sop_instance_uid: &str,
    priority: Priority,
    dataset: InMemDicomObject,
    ts: &TransferSyntax,
) -> Result<MessageOutcome>
where
    S: Read + Write + CloseSocket,
{
    let message_id = message_ids.reserve();
    tracing::debug!(message_id, affected_sop_instance_uid, "sending C-STORE-RQ");
    let request = CStoreRq {
        message_id,
        message_id_being_responded_to: None,
        affected_sop_class_uid,
        affected_sop_instance_uid,
        priority,
        move_originator_application_entity_title: None,
        move_originator_message_id: None,
        status: None,
    };
    let max_pdu_length = association.acceptor_max_pdu_length();
    let pdus = request.pdu_with_dataset(pc_selected, max_pdu_length, dataset, ts)?;
    exchange(association, message_ids, message_id, pdus, true)
}

/// Send a C-CANCEL-RQ for an outstanding C-FIND, C-GET or C-MOVE
/// operation. Fire-and-forget: PS3.7 9.3.2.3/9.3.3.3/9.3.4.3 define no
/// response to a cancel request.
pub fn send_c_cancel<S>(
    association: &mut dyn SyncAssociation<S>,
    pc_selected: u8,
    message_id_being_responded_to: u16,
) -> Result<()>
where
    S: Read + Write + CloseSocket,
{
    let request = CCancelRq {
        message_id_being_responded_to,
    };
    let max_pdu_length = association.acceptor_max_pdu_length();
    let pdus = request.pdu(pc_selected, max_pdu_length)?;
    send_pdus(association, pdus)
}

/// Send a C-FIND-RQ and return a lazy stream of its Pending/terminal
/// responses (PS3.7 9.3.2).
pub fn send_c_find<'a, S>(
    association: &'a mut dyn SyncAssociation<S>,
    message_ids: &'a mut MessageIdStore,
    pc_selected: u8,
    affected_sop_class_uid: &str,
    priority: Priority,
    identifier: InMemDicomObject,
    ts: &TransferSyntax,
) -> Result<ResponseStream<'a, S>>
where
    S: Read + Write + CloseSocket,
{
    let message_id = message_ids.reserve();
    tracing::debug!(message_id, affected_sop_class_uid, "sending C-FIND-RQ");
    let request = CFindRq {
        message_id,
        message_id_being_responded_to: None,
        affected_sop_class_uid,
        priority,
        status: None,
    };
    let max_pdu_length = association.acceptor_max_pdu_length();
    let pdus = request.pdu_with_dataset(pc_selected, max_pdu_length, identifier, ts)?;
    send_pdus(association, pdus)?;
    Ok(ResponseStream {
        association,
        message_ids,
        message_id,
        pc_selected,
        strict: true,
        done: false,
    })
}

/// Send a C-GET-RQ and return a lazy stream of its Pending (sub-operation
/// progress)/terminal responses (PS3.7 9.3.3).
pub fn send_c_get<'a, S>(
    association: &'a mut dyn SyncAssociation<S>,
    message_ids: &'a mut MessageIdStore,
    pc_selected: u8,
    affected_sop_class_uid: &str,
    priority: Priority,
    identifier: InMemDicomObject,
    ts: &TransferSyntax,
) -> Result<ResponseStream<'a, S>>
where
    S: Read + Write + CloseSocket,
{
    let message_id = message_ids.reserve();
    tracing::debug!(message_id, affected_sop_class_uid, "sending C-GET-RQ");
    let request = CGetRq {
        message_id,
        message_id_being_responded_to: None,
        affected_sop_class_uid,
        priority,
        status: None,
        number_of_remaining_suboperations: None,
        number_of_completed_suboperations: None,
        number_of_failed_suboperations: None,
        number_of_warning_suboperations: None,
    };
    let max_pdu_length = association.acceptor_max_pdu_length();
    let pdus = request.pdu_with_dataset(pc_selected, max_pdu_length, identifier, ts)?;
    send_pdus(association, pdus)?;
    Ok(ResponseStream {
        association,
        message_ids,
        message_id,
        pc_selected,
        strict: true,
        done: false,
    })
}

/// Send a C-MOVE-RQ and return a lazy stream of its Pending (sub-operation
/// progress)/terminal responses (PS3.7 9.3.4).
#[allow(clippy::too_many_arguments)]
pub fn send_c_move<'a, S>(
    association: &'a mut dyn SyncAssociation<S>,
    message_ids: &'a mut MessageIdStore,
    pc_selected: u8,
    affected_sop_class_uid: &str,
    priority: Priority,
    move_destination: &str,
    identifier: InMemDicomObject,
    ts: &TransferSyntax,
) -> Result<ResponseStream<'a, S>>
where
    S: Read + Write + CloseSocket,
{
    let message_id = message_ids.reserve();
    tracing::debug!(message_id, affected_sop_class_uid, move_destination, "sending C-MOVE-RQ");
    let request = CMoveRq {
        message_id,
        message_id_being_responded_to: None,
        affected_sop_class_uid,
        priority,
        move_destination,
        status: None,
        number_of_remaining_suboperations: None,
        number_of_completed_suboperations: None,
        number_of_failed_suboperations: None,
        number_of_warning_suboperations: None,
    };
    let max_pdu_length = association.acceptor_max_pdu_length();
    let pdus = request.pdu_with_dataset(pc_selected, max_pdu_length, identifier, ts)?;
    send_pdus(association, pdus)?;
    Ok(ResponseStream {
        association,
        message_ids,
        message_id,
        pc_selected,
        strict: true,
        done: false,
    })
}

/// Send an N-EVENT-REPORT-RQ and wait for its response (PS3.7 10.1.1).
pub fn send_n_event_report<S>(
    association: &mut dyn SyncAssociation<S>,
    message_ids: &mut MessageIdStore,
    pc_selected: u8,
    affected_sop_class_uid: &str,
    affected_sop_instance_uid: &str,
    event_type_id: u16,
    event_information: Option<(InMemDicomObject, &TransferSyntax)>,
) -> Result<MessageOutcome>
where
    S: Read + Write + CloseSocket,
{
    let message_id = message_ids.reserve();
    let request = NEventReportRq {
        message_id,
        affected_sop_class_uid,
        affected_sop_instance_uid,
        event_type_id,
    };
    let max_pdu_length = association.acceptor_max_pdu_length();
    let pdus = match event_information {
        Some((dataset, ts)) => request.pdu_with_dataset(pc_selected, max_pdu_length, dataset, ts)?,
        None => request.pdu(pc_selected, max_pdu_length)?,
    };
    exchange(association, message_ids, message_id, pdus, true)
}

/// Send an N-GET-RQ and wait for its response (PS3.7 10.1.2). The
/// requested attributes are named in the command set itself, so no
/// dataset accompanies the request.
pub fn send_n_get<S>(
    association: &mut dyn SyncAssociation<S>,
    message_ids: &mut MessageIdStore,
    pc_selected: u8,
    requested_sop_class_uid: &str,
    requested_sop_instance_uid: &str,
    attribute_identifier_list: Option<Vec<Tag>>,
) -> Result<MessageOutcome>
where
    S: Read + Write + CloseSocket,
{
    let message_id = message_ids.reserve();
    let request = NGetRq {
        message_id,
        requested_sop_class_uid,
        requested_sop_instance_uid,
        attribute_identifier_list,
    };
    let pdus = request.pdu(pc_selected, association.acceptor_max_pdu_length())?;
    exchange(association, message_ids, message_id, pdus, true)
}

/// Send an N-SET-RQ with its modification list, and wait for its response
/// (PS3.7 10.1.3).
pub fn send_n_set<S>(
    association: &mut dyn SyncAssociation<S>,
    message_ids: &mut MessageIdStore,
    pc_selected: u8,
    requested_sop_class_uid: &str,
    requested_sop_instance_uid: &str,
    modification_list: InMemDicomObject,
    ts: &TransferSyntax,
) -> Result<MessageOutcome>
where
    S: Read + Write + CloseSocket,
{
    let message_id = message_ids.reserve();
    let request = NSetRq {
        message_id,
        requested_sop_class_uid,
        requested_sop_instance_uid,
    };
    let max_pdu_length = association.acceptor_max_pdu_length();
    let pdus = request.pdu_with_dataset(pc_selected, max_pdu_length, modification_list, ts)?;
    exchange(association, message_ids, message_id, pdus, true)
}

/// Send an N-ACTION-RQ and wait for its response (PS3.7 10.1.4).
pub fn send_n_action<S>(
    association: &mut dyn SyncAssociation<S>,
    message_ids: &mut MessageIdStore,
    pc_selected: u8,
    requested_sop_class_uid: &str,
    requested_sop_instance_uid: &str,
    action_type_id: u16,
    action_information: Option<(InMemDicomObject, &TransferSyntax)>,
) -> Result<MessageOutcome>
where
    S: Read + Write + CloseSocket,
{
    let message_id = message_ids.reserve();
    let request = NActionRq {
        message_id,
        requested_sop_class_uid,
        requested_sop_instance_uid,
        action_type_id,
    };
    let max_pdu_length = association.acceptor_max_pdu_length();
    let pdus = match action_information {
        Some((dataset, ts)) => request.pdu_with_dataset(pc_selected, max_pdu_length, dataset, ts)?,
        None => request.pdu(pc_selected, max_pdu_length)?,
    };
    exchange(association, message_ids, message_id, pdus, true)
}

/// Send an N-CREATE-RQ and wait for its response (PS3.7 10.1.5).
pub fn send_n_create<S>(
    association: &mut dyn SyncAssociation<S>,
    message_ids: &mut MessageIdStore,
    pc_selected: u8,
    affected_sop_class_uid: &str,
    affected_sop_instance_uid: Option<&str>,
    initial_attributes: Option<(InMemDicomObject, &TransferSyntax)>,
) -> Result<MessageOutcome>
where
    S: Read + Write + CloseSocket,
{
    let message_id = message_ids.reserve();
    let request = NCreateRq {
        message_id,
        affected_sop_class_uid,
        affected_sop_instance_uid,
    };
    let max_pdu_length = association.acceptor_max_pdu_length();
    let pdus = match initial_attributes {
        Some((dataset, ts)) => request.pdu_with_dataset(pc_selected, max_pdu_length, dataset, ts)?,
        None => request.pdu(pc_selected, max_pdu_length)?,
    };
    exchange(association, message_ids, message_id, pdus, true)
}

/// Send an N-DELETE-RQ and wait for its response (PS3.7 10.1.6).
pub fn send_n_delete<S>(
    association: &mut dyn SyncAssociation<S>,
    message_ids: &mut MessageIdStore,
    pc_selected: u8,
    requested_sop_class_uid: &str,
    requested_sop_instance_uid: &str,
) -> Result<MessageOutcome>
where
    S: Read + Write + CloseSocket,
{
    let message_id = message_ids.reserve();
    let request = NDeleteRq {
        message_id,
        requested_sop_class_uid,
        requested_sop_instance_uid,
    };
    let pdus = request.pdu(pc_selected, association.acceptor_max_pdu_length())?;
    exchange(association, message_ids, message_id, pdus, true)
}
