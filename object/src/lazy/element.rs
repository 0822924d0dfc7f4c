use std::collections::BTreeMap;

use super::{PositionToValue as PositionToValueSnafu, ReadValue as ReadValueSnafu, ReadFragment as ReadFragmentSnafu, UnloadedFragment as UnloadedFragmentSnafu};
use dicom_core::{DataDictionary, DataElementHeader, DicomValue, Length, Tag, header::HasLength};
use dicom_dictionary_std::StandardDataDictionary;
use dicom_parser::StatefulDecode;
use snafu::{OptionExt, ResultExt};
use smallvec::SmallVec;

use crate::{
    mem::{InMemElement, InMemFragment},
    util::ReadSeek,
    InMemDicomObject,
};

type Result<T, E = super::Error> = std::result::Result<T, E>;

/// A lazy element, which may be loaded in memory or not.
#[derive(Debug, Clone)]
pub struct LazyElement<D = StandardDataDictionary> {
    header: DataElementHeader,
    position: u64,
    value: MaybeValue<D>,
}

impl<D> LazyElement<D>
where
    D: DataDictionary,
    D: Clone,
{
    /// Create a new lazy element with the given properties,
    /// without loading its value in memory.
    pub fn new_unloaded(header: DataElementHeader, position: u64) -> Self {
        LazyElement {
            header,
            position,
            value: MaybeValue::Unloaded,
        }
    }

    /// Create a new lazy element with the given properties,
    /// already loaded with an in-memory value.
    pub fn new_loaded(header: DataElementHeader, position: u64, value: LoadedValue<D>) -> Self {
        LazyElement {
            header,
            position,
            value: MaybeValue::Loaded {
                value,
                dirty: false,
            },
        }
    }

    /// Ensure that the value is loaded in memory,
    /// fetching it from the given source if necessary.
    ///
    /// The operation is a no-op if the value is already loaded.
    pub fn load<S: ?Sized>(&mut self, source: &mut S) -> Result<()>
    where
        S: StatefulDecode,
        <S as StatefulDecode>::Reader: ReadSeek,
    {
        match &mut self.value {
            MaybeValue::Loaded { .. } => Ok(()),
            MaybeValue::PixelSequence { fragments, .. } => {
                // load each fragment individually
                for fragment in fragments {
                    if fragment.data.is_some() {
                        continue;
                    }
                    source.seek(fragment.position).context(PositionToValueSnafu)?;
                    let mut data = Vec::with_capacity(fragment.length as usize);
                    source.read_to_vec(fragment.length, &mut data).context(ReadFragmentSnafu)?;
                    fragment.data = Some(data);
                }
                Ok(())
            },
            MaybeValue::Unloaded => {
                source.seek(self.position).context(PositionToValueSnafu)?;
                let value = source
                    .read_value_preserved(&self.header)
                    .context(ReadValueSnafu)?;
                self.value = MaybeValue::Loaded {
                    value: DicomValue::from(value),
                    dirty: false,
                };
                Ok(())
            }
        }
    }

    /// Convert the lazy element into an in-memory element,
    /// loading it from the given source if necessary.
    pub fn into_mem<S: ?Sized>(mut self, source: &mut S) -> Result<InMemElement<D>>
    where
        S: StatefulDecode,
        <S as StatefulDecode>::Reader: ReadSeek,
    {
        self.load(source)?;

        let value = self.value.into_mem(source)?;

        Ok(InMemElement::new(self.header.tag, self.header.vr, value))
    }
}

/// A DICOM value which may be loaded in memory or not.
///
/// Loading the value can only be done through the respective [`LazyElement`].
///
#[derive(Debug, Clone)]
pub enum MaybeValue<D = StandardDataDictionary> {
    /// A DICOM value that is at least partially loaded in memory.
    ///
    ///
    /// Its nested DICOM data sets or fragments might not be all loaded
    /// in the case of sequences.
    Loaded {
        /// the value proper
        value: LoadedValue<D>,
        dirty: bool,
    },
    /// a DICOM value that is a pixel sequence,
    /// where each fragment can be loaded independently
    PixelSequence {
        /// the offset table for each pixel data frame
        offset_table: SmallVec<[u32; 2]>,
        /// the sequence of fragments
        fragments: SmallVec<[MaybeFragment; 2]>,
    },
    /// a DICOM value which is not loaded,
    /// and so is unreachable from here
    Unloaded,
}

impl<D> MaybeValue<D>
where
    D: DataDictionary,
    D: Clone,
{
    /// Return a reference to the loaded value,
    /// or `None` if the value is not loaded.
    pub fn value(&self) -> Option<&LoadedValue<D>> {
        match self {
            MaybeValue::Loaded { value, .. } => Some(value),
            MaybeValue::PixelSequence { fragments, .. } => todo!("retrieving pixel sequences"),
            MaybeValue::Unloaded => None,
        }
    }

    /// Check whether the element is loaded at this level.
    ///
    /// **Note:**
    /// this method does not check
    /// whether nested data sets or any pixel data fragments
    /// are fully loaded.
    pub fn is_loaded(&self) -> bool {
        match self {
            MaybeValue::Loaded { .. } => true,
            MaybeValue::PixelSequence { .. } => true,
            MaybeValue::Unloaded => false,
        }
    }

    /// **Pre-condition:** the value must be fully loaded.
    fn into_mem<S: ?Sized>(self, source: &mut S) -> Result<DicomValue<InMemDicomObject<D>, InMemFragment>>
    where
        S: StatefulDecode,
        <S as StatefulDecode>::Reader: ReadSeek,
    {
        match self {
            MaybeValue::Loaded { value, .. } => {
                match value {
                    DicomValue::Primitive(primitive) => {
                        // accept primitive value as is
                        Ok(DicomValue::from(primitive))
                    }
                    DicomValue::PixelSequence {
                        offset_table,
                        fragments,
                    } => {
                        let fragments: Result<SmallVec<_>> = fragments.into_iter()
                            .enumerate()
                            .map(|(i, f)| f.data.context(UnloadedFragmentSnafu { index: i as u32 }))
                            .collect();
                        // accept pixel sequence as is
                        Ok(DicomValue::PixelSequence {
                            offset_table,
                            fragments: fragments?,
                        })
                    }
                    DicomValue::Sequence { items, size } => {
                        // recursively turn each item into memory
                        let items: Result<_> = items
                            .into_iter()
                            .map(|item| item.into_mem(source))
                            .collect();
                        let items = items?;
                        Ok(DicomValue::Sequence { items, size })
                    }
                }
            }
            _ => panic!("Value should be loaded"),
        }
    }
}

/// A fragment of a pixel sequence,
/// which may be loaded in memory or not.
#[derive(Debug, Clone)]
pub struct MaybeFragment {
    /// The offset of the fragment data relative to the original source
    position: u64,
    /// The number of data bytes in this fragment
    length: u32,
    /// The actual data proper,
    /// which might not be loaded.
    data: Option<Vec<u8>>,
}

/// Type definition for a value which has been loaded into memory,
/// at least partially,
/// at one level.
///
/// If it is a primitive value,
/// then is sure to be all in memory.
/// In the case of a sequence,
/// the nested objects may or may not be loaded.
/// In the case of a pixel sequence,
/// each fragments may be loaded in memory or not.
pub type LoadedValue<D> = DicomValue<LazyNestedObject<D>, MaybeFragment>;

/// A DICOM object nested in a lazy DICOM object.
///
/// The type parameter `S` represents the borrowed stateful reader,
/// implementing `StatefulDecode`.
/// `D` is for the element dictionary.
#[derive(Debug, Clone)]
pub struct LazyNestedObject<D = StandardDataDictionary> {
    /// the element dictionary
    entries: BTreeMap<Tag, LazyElement<D>>,
    /// the data attribute dictionary
    dict: D,
    /// The length of the DICOM object in bytes.
    /// It is usually undefined, unless it is part of an item
    /// in a sequence with a specified length in its item header.
    len: Length,
}

impl<D> HasLength for LazyNestedObject<D> {
    fn length(&self) -> Length {
        self.len
    }
}

impl<D> LazyNestedObject<D>
where
    D: DataDictionary,
    D: Clone,
{
    /// Load each element in the object.
    pub fn load_all<S: ?Sized>(&mut self, source: &mut S) -> Result<()>
    where
        S: StatefulDecode,
        <S as StatefulDecode>::Reader: ReadSeek,
    {
        for elem in &mut self.entries.values_mut() {
            elem.load(&mut *source)?;
        }
        Ok(())
    }

    /// Load each element in the object and turn it into an in-memory object.
    pub fn into_mem<S: ?Sized>(mut self, source: &mut S) -> Result<InMemDicomObject<D>>
    where
        S: StatefulDecode,
        <S as StatefulDecode>::Reader: ReadSeek,
        D: DataDictionary,
        D: Clone,
    {
        self.load_all(&mut *source)?;

        let entries: Result<_> = self.entries.into_values()
            .map(|elem| elem.into_mem(&mut *source).map(|elem| (elem.header().tag, elem)))
            .collect();
        
        Ok(InMemDicomObject::from_parts(entries?, self.dict, self.len))
    }
}
