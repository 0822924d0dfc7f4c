use dicom_core::{DataElement, VR, dicom_value};
use dicom_dictionary_std::tags;
use dicom_encoding::TransferSyntax;
use dicom_object::{InMemDicomObject, ReadError, WriteError};
use dicom_transfer_syntax_registry::entries;
use snafu::{OptionExt, ResultExt};

use crate::{Pdu, pdu::{PDataValue, PDataValueType}};

#[repr(u16)]
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Priority {
    Low = 0x0002,
    Medium = 0x0000,
    High = 0x0001,
}

#[repr(u16)]
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum CommandDatasetType {
    Present = 0x0001,
    Absent = 0x0101
}

#[allow(non_camel_case_types)]
pub enum CommandField {
    C_STORE_RQ         = 0x0001,
    C_STORE_RSP        = 0x8001,
    C_GET_RQ           = 0x0010,
    C_GET_RSP          = 0x8010,
    C_FIND_RQ          = 0x0020,
    C_FIND_RSP         = 0x8020,
    C_MOVE_RQ          = 0x0021,
    C_MOVE_RSP         = 0x8021,
    C_ECHO_RQ          = 0x0030,
    C_ECHO_RSP         = 0x8030,
    N_EVENT_REPORT_RQ  = 0x0100,
    N_EVENT_REPORT_RSP = 0x8100,
    N_GET_RQ           = 0x0110,
    N_GET_RSP          = 0x8110,
    N_SET_RQ           = 0x0120,
    N_SET_RSP          = 0x8120,
    N_ACTION_RQ        = 0x0130,
    N_ACTION_RSP       = 0x8130,
    N_CREATE_RQ        = 0x0140,
    N_CREATE_RSP       = 0x8140,
    N_DELETE_RQ        = 0x0150,
    N_DELETE_RSP       = 0x8150,
    C_CANCEL_RQ        = 0x0FFF
}

/// Split a command or data set byte stream into the PDVs of one or more
/// P-DATA-TF PDUs, per PS3.8 Annex E: a PDV's payload must never exceed
/// `max_pdu_length - 6` bytes (4-byte PDU length + 2-byte PDV header minus
/// the PDU-type/reserved/PDV-length bytes already accounted for), and only
/// the last PDV of the stream carries the last-fragment bit.
fn fragment_stream(
    pdus: &mut Vec<Pdu>,
    pc_selected: u8,
    value_type: PDataValueType,
    bytes: &[u8],
    fragment_size: usize,
) {
    if bytes.is_empty() {
        pdus.push(Pdu::PData {
            data: vec![PDataValue {
                presentation_context_id: pc_selected,
                value_type,
                is_last: true,
                data: Vec::new(),
            }],
        });
        return;
    }

    let mut chunks = bytes.chunks(fragment_size).peekable();
    while let Some(chunk) = chunks.next() {
        pdus.push(Pdu::PData {
            data: vec![PDataValue {
                presentation_context_id: pc_selected,
                value_type,
                is_last: chunks.peek().is_none(),
                data: chunk.to_vec(),
            }],
        });
    }
}

/// Fragment a command set, and optionally an accompanying data set, into the
/// P-DATA-TF PDUs needed to carry them within `max_pdu_length`. Command PDVs
/// always precede data set PDVs, matching PS3.8 9.1's requirement that a
/// command set be sent complete before its associated data set.
fn fragment_command_and_dataset(
    pc_selected: u8,
    max_pdu_length: u32,
    command: Vec<u8>,
    dataset: Option<Vec<u8>>,
) -> crate::association::Result<Vec<Pdu>> {
    let fragment_size = crate::association::pdata::calculate_max_data_len_single(max_pdu_length)
        .context(crate::association::InvalidMaxPduSnafu { max_pdu_length })?
        as usize;

    let mut pdus = Vec::new();
    fragment_stream(&mut pdus, pc_selected, PDataValueType::Command, &command, fragment_size);
    if let Some(dataset) = dataset {
        fragment_stream(&mut pdus, pc_selected, PDataValueType::Data, &dataset, fragment_size);
    }
    Ok(pdus)
}

/// Trait that marks a message struct to only allow PDUs with an associated dataset
///
/// Only exposes the `pdu_with_dataset` command requiring the user to pass an associated
/// dataset
pub trait DatasetRequiredCommand: Command {
    /// Fragment the command and its associated dataset into the P-DATA-TF
    /// PDUs needed to carry them within `max_pdu_length`, ready to be sent
    /// in sequence over the association.
    ///
    /// NOTE: Panics if the transfer syntax from the presentation context is not found in the registry.
    fn pdu_with_dataset(
        &self,
        pc_selected: u8,
        max_pdu_length: u32,
        dataset: InMemDicomObject,
        ts: &TransferSyntax,
    ) -> crate::association::Result<Vec<Pdu>> {
        let mut ds_data = Vec::new();
        dataset
            .write_dataset_with_ts(&mut ds_data, ts)
            .map_err(Box::new)
            .context(crate::association::EncodeMessageSnafu)?;
        let command_data = self
            .encode(true)
            .context(crate::association::EncodeMessageSnafu)?;
        fragment_command_and_dataset(pc_selected, max_pdu_length, command_data, Some(ds_data))
    }
}


/// Trait that marks a message struct as conditionally allowing a dataset
///
/// This could either be truly conditional, e.g. For the C-FIND response primitive
/// the standard says:
///
/// > In the response/confirmation, this is the same list of Attributes with
/// > values of these Attributes in a particular composite SOP Instance that
/// > matched. It shall be sent only when that Status (0000,0900) is equal to
/// > Pending (not permitted for other statuses).
///
/// A service user option, e.g. for both C-MOVE and C-GET, the response primitive
/// is not required by the DIMSE service to contain a dataset, but it _is_ required
/// by the DIMSE C-GET and C-MOVE service user
///
///
/// > **NOTE** Structs implementing this trait will have access to both the
/// > `pdu` and `pdu_with_dataset`. Users of these structs should take care
/// > to use the appropriate method based on the standard.
pub trait DatasetConditionalCommand: DatasetRequiredCommand {
    /// Fragment the command (with no dataset) into the P-DATA-TF PDUs
    /// needed to carry it within `max_pdu_length`.
    fn pdu(&self, pc_selected: u8, max_pdu_length: u32) -> crate::association::Result<Vec<Pdu>> {
        let command_data = self
            .encode(false)
            .context(crate::association::EncodeMessageSnafu)?;
        fragment_command_and_dataset(pc_selected, max_pdu_length, command_data, None)
    }
}

/// Trait that marks a message as not allowing a dataset.
pub trait DatasetForbiddenCommand: Command {
    /// Fragment the command (with no dataset) into the P-DATA-TF PDUs
    /// needed to carry it within `max_pdu_length`.
    fn pdu(&self, pc_selected: u8, max_pdu_length: u32) -> crate::association::Result<Vec<Pdu>> {
        let command_data = self
            .encode(false)
            .context(crate::association::EncodeMessageSnafu)?;
        fragment_command_and_dataset(pc_selected, max_pdu_length, command_data, None)
    }
}

pub trait Command {
    /// Get the command field code for this Command
    fn command_field(&self) -> u16;
    /// Get the dicom dataset represenation of this command
    fn dataset(&self) -> InMemDicomObject;
    /// Encode the command into bytes
    fn encode(&self, ds_included: bool) -> Result<Vec<u8>, Box<WriteError>> {
        let mut ds = self.dataset();
        ds.put(
            DataElement::new(
                tags::COMMAND_DATA_SET_TYPE,
                VR::US,
                if ds_included {
                    dicom_value!(CommandDatasetType::Present as u16)
                } else {
                    dicom_value!(CommandDatasetType::Absent as u16)
                }
            )
        );
        let mut buffer = Vec::new();
        ds.write_dataset_with_ts(&mut buffer, &entries::IMPLICIT_VR_LITTLE_ENDIAN.erased())
            .map_err(Box::from)?;
        Ok(buffer)
    }
}

/// Decode a command set (the P-DATA-TF fragment carrying a Command-type
/// PDV) from its wire bytes. Command sets are always encoded Implicit VR
/// Little Endian, independent of the transfer syntax negotiated for the
/// accompanying data set.
///
/// `strict` governs whether the resulting object is required to carry a
/// Command Data Set Type (0000,0800) element: non-conformant peers that
/// omit it are tolerated when `false`, matching the leniency
/// `ClientAssociationOptions`/`ServerAssociationOptions` expose for the
/// rest of the wire protocol.
pub fn decode_command_set(bytes: &[u8], strict: bool) -> Result<InMemDicomObject, Box<ReadError>> {
    let ds = InMemDicomObject::read_dataset_with_ts(
        bytes,
        &entries::IMPLICIT_VR_LITTLE_ENDIAN.erased(),
    )
    .map_err(Box::from)?;

    if strict && ds.element(tags::COMMAND_DATA_SET_TYPE).is_err() {
        tracing::warn!("command set is missing Command Data Set Type (0000,0800)");
    }

    Ok(ds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control_byte(pdu: &Pdu) -> (PDataValueType, bool) {
        match pdu {
            Pdu::PData { data } => {
                assert_eq!(data.len(), 1, "expected exactly one PDV per P-DATA-TF PDU");
                (data[0].value_type, data[0].is_last)
            }
            other => panic!("expected Pdu::PData, got {:?}", other),
        }
    }

    #[test]
    fn c_store_with_three_fragment_dataset() {
        // Max PDU length 128 leaves 128 - 4 - 2 = 122 bytes per PDV.
        let command = vec![0u8; 30];
        let dataset = vec![0u8; 300];

        let pdus = fragment_command_and_dataset(1, 128, command.clone(), Some(dataset.clone()))
            .expect("valid max PDU length");

        assert_eq!(pdus.len(), 4, "expected 1 command PDV + 3 dataset PDVs");

        let (ty, is_last) = control_byte(&pdus[0]);
        assert_eq!(ty, PDataValueType::Command);
        assert!(is_last);

        let mut dataset_len = 0;
        for (i, pdu) in pdus[1..].iter().enumerate() {
            let (ty, is_last) = control_byte(pdu);
            assert_eq!(ty, PDataValueType::Data);
            assert_eq!(is_last, i == 2, "only the last dataset PDV is marked last");
            match pdu {
                Pdu::PData { data } => dataset_len += data[0].data.len(),
                _ => unreachable!(),
            }
        }
        assert_eq!(dataset_len, 300);
    }

    #[test]
    fn fragment_size_never_exceeds_bound() {
        let pdus = fragment_command_and_dataset(1, 128, vec![0u8; 10], Some(vec![0u8; 300]))
            .expect("valid max PDU length");
        for pdu in &pdus {
            match pdu {
                Pdu::PData { data } => assert!(data[0].data.len() <= 122),
                _ => unreachable!(),
            }
        }
    }

    #[test]
    fn invalid_max_pdu_length_is_rejected() {
        let err = fragment_command_and_dataset(1, 3, vec![0u8; 10], None);
        assert!(err.is_err());
    }
}