//! Macro sequences and the instruments built out of them

use super::InstrumentKind;
use crate::{
    document::{FieldReader, FieldWriter, ModuleError},
    name::Name,
};
use std::{
    collections::BTreeMap,
    fmt,
    io::{self, Read, Write},
};
use thiserror::Error;

/// The name of an instrument
pub type InstrumentName = Name<127>;

/// The parameter a sequence drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SequenceType {
    Volume,
    Arpeggio,
    Pitch,
    HiPitch,
    DutyCycle,
}

impl SequenceType {
    /// The number of sequence types
    pub const COUNT: usize = 5;

    /// All sequence types, in storage order
    pub const ALL: [SequenceType; Self::COUNT] = [
        SequenceType::Volume,
        SequenceType::Arpeggio,
        SequenceType::Pitch,
        SequenceType::HiPitch,
        SequenceType::DutyCycle,
    ];

    /// Look up a sequence type by its position in storage order
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The position of this type in storage order
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            SequenceType::Volume => "Volume",
            SequenceType::Arpeggio => "Arpeggio",
            SequenceType::Pitch => "Pitch",
            SequenceType::HiPitch => "Hi-pitch",
            SequenceType::DutyCycle => "Duty / Noise",
        };

        write!(f, "{name}")
    }
}

/// A macro sequence: a list of values stepped through once per frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sequence {
    items: Vec<i8>,
    loop_point: Option<usize>,
    release_point: Option<usize>,
    setting: u8,
}

impl Sequence {
    /// The maximum number of items in a sequence
    pub const MAX_ITEMS: usize = 252;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: &[i8]) -> Result<Self, SequenceError> {
        let mut sequence = Self::new();
        sequence.set_items(items)?;
        Ok(sequence)
    }

    pub fn items(&self) -> &[i8] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replace the items
    ///
    /// Loop and release points that no longer fall inside the sequence are removed.
    pub fn set_items(&mut self, items: &[i8]) -> Result<(), SequenceError> {
        if items.len() > Self::MAX_ITEMS {
            return Err(SequenceError::TooLong { len: items.len() });
        }

        self.items = items.to_vec();
        self.loop_point = self.loop_point.filter(|point| *point < items.len());
        self.release_point = self.release_point.filter(|point| *point < items.len());
        Ok(())
    }

    pub fn loop_point(&self) -> Option<usize> {
        self.loop_point
    }

    /// Set or remove the loop point; refused if it lies past the end
    pub fn set_loop_point(&mut self, point: Option<usize>) -> bool {
        if point.is_some_and(|point| point >= self.len()) {
            return false;
        }

        self.loop_point = point;
        true
    }

    pub fn release_point(&self) -> Option<usize> {
        self.release_point
    }

    /// Set or remove the release point; refused if it lies past the end
    pub fn set_release_point(&mut self, point: Option<usize>) -> bool {
        if point.is_some_and(|point| point >= self.len()) {
            return false;
        }

        self.release_point = point;
        true
    }

    /// A type-specific setting (the arpeggio mode, for example)
    pub fn setting(&self) -> u8 {
        self.setting
    }

    pub fn set_setting(&mut self, setting: u8) {
        self.setting = setting;
    }

    pub(crate) fn store<W: Write>(&self, writer: &mut FieldWriter<W>) -> io::Result<()> {
        let point = |point: Option<usize>| point.map_or(-1, |point| point as i32);

        writer.write_int(self.items.len() as i32)?;
        writer.write_int(point(self.loop_point))?;
        writer.write_int(point(self.release_point))?;
        writer.write_int(self.setting as i32)?;

        for item in &self.items {
            writer.write_char(*item)?;
        }

        Ok(())
    }

    pub(crate) fn load<R: Read>(reader: &mut FieldReader<R>) -> Result<Self, ModuleError> {
        let len = reader.read_int_range(0, Self::MAX_ITEMS as i32, "Sequence item count")?;
        let loop_point = reader.read_int_range(-1, len - 1, "Sequence loop point")?;
        let release_point = reader.read_int_range(-1, len - 1, "Sequence release point")?;
        let setting = reader.read_int_range(0, u8::MAX as i32, "Sequence setting")?;

        let items = (0..len)
            .map(|_| reader.read_char())
            .collect::<Result<Vec<_>, _>>()?;

        let point = |point: i32| usize::try_from(point).ok();
        Ok(Self {
            items,
            loop_point: point(loop_point),
            release_point: point(release_point),
            setting: setting as u8,
        })
    }
}

/// All sequences of a module, grouped by instrument kind and sequence type
///
/// Every kind and type has its own range of [`SequenceBank::MAX_SEQUENCES`] indices, which
/// instruments refer to through their [`SequenceSlot`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceBank {
    sequences: BTreeMap<(InstrumentKind, SequenceType, u8), Sequence>,
}

impl SequenceBank {
    /// The number of indices per instrument kind and sequence type
    pub const MAX_SEQUENCES: usize = 128;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: InstrumentKind, ty: SequenceType, index: u8) -> Option<&Sequence> {
        self.sequences.get(&(kind, ty, index))
    }

    pub fn get_mut(
        &mut self,
        kind: InstrumentKind,
        ty: SequenceType,
        index: u8,
    ) -> Option<&mut Sequence> {
        self.sequences.get_mut(&(kind, ty, index))
    }

    /// Store a sequence, returning the one it replaced
    pub fn insert(
        &mut self,
        kind: InstrumentKind,
        ty: SequenceType,
        index: u8,
        sequence: Sequence,
    ) -> Result<Option<Sequence>, SequenceError> {
        if index as usize >= Self::MAX_SEQUENCES {
            return Err(SequenceError::IndexOutOfRange { index });
        }

        Ok(self.sequences.insert((kind, ty, index), sequence))
    }

    pub fn remove(&mut self, kind: InstrumentKind, ty: SequenceType, index: u8) -> Option<Sequence> {
        self.sequences.remove(&(kind, ty, index))
    }

    /// The lowest index not holding a sequence yet
    pub fn first_free(&self, kind: InstrumentKind, ty: SequenceType) -> Option<u8> {
        (0..Self::MAX_SEQUENCES as u8).find(|index| self.get(kind, ty, *index).is_none())
    }

    /// The number of free indices for a kind and type
    pub fn free_count(&self, kind: InstrumentKind, ty: SequenceType) -> usize {
        let used = self
            .sequences
            .keys()
            .filter(|(k, t, _)| *k == kind && *t == ty)
            .count();

        Self::MAX_SEQUENCES - used
    }

    /// Iterate over all sequences, ordered by kind, type and index
    pub fn iter(&self) -> impl Iterator<Item = (InstrumentKind, SequenceType, u8, &Sequence)> {
        self.sequences
            .iter()
            .map(|((kind, ty, index), sequence)| (*kind, *ty, *index, sequence))
    }

    /// Iterate over the sequences used by one instrument kind
    pub fn iter_kind(
        &self,
        kind: InstrumentKind,
    ) -> impl Iterator<Item = (SequenceType, u8, &Sequence)> {
        self.iter()
            .filter(move |(k, ..)| *k == kind)
            .map(|(_, ty, index, sequence)| (ty, index, sequence))
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

/// Whether an instrument uses a sequence of a given type, and which one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceSlot {
    pub enabled: bool,
    pub index: u8,
}

/// The part every instrument shares: its kind, its name and its sequence slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqInstrument {
    kind: InstrumentKind,
    name: InstrumentName,
    slots: [SequenceSlot; SequenceType::COUNT],
}

impl SeqInstrument {
    pub fn new(kind: InstrumentKind) -> Self {
        Self {
            kind,
            name: InstrumentName::default(),
            slots: Default::default(),
        }
    }

    pub fn kind(&self) -> InstrumentKind {
        self.kind
    }

    pub fn name(&self) -> &InstrumentName {
        &self.name
    }

    pub fn set_name(&mut self, name: InstrumentName) {
        self.name = name;
    }

    pub fn slot(&self, ty: SequenceType) -> SequenceSlot {
        self.slots[ty.index()]
    }

    /// Point a slot at a sequence index; refused if the index is out of range
    pub fn set_slot(&mut self, ty: SequenceType, enabled: bool, index: u8) -> bool {
        if index as usize >= SequenceBank::MAX_SEQUENCES {
            return false;
        }

        self.slots[ty.index()] = SequenceSlot { enabled, index };
        true
    }

    /// Iterate over the slots that are switched on
    pub fn enabled_slots(&self) -> impl Iterator<Item = (SequenceType, u8)> + '_ {
        SequenceType::ALL
            .into_iter()
            .zip(self.slots.iter())
            .filter(|(_, slot)| slot.enabled)
            .map(|(ty, slot)| (ty, slot.index))
    }

    pub(crate) fn store<W: Write>(&self, writer: &mut FieldWriter<W>) -> io::Result<()> {
        writer.write_int(SequenceType::COUNT as i32)?;

        for slot in &self.slots {
            writer.write_char(slot.enabled as i8)?;
            writer.write_char(slot.index as i8)?;
        }

        Ok(())
    }

    pub(crate) fn load<R: Read>(
        kind: InstrumentKind,
        reader: &mut FieldReader<R>,
    ) -> Result<Self, ModuleError> {
        let mut instrument = Self::new(kind);
        let count =
            reader.read_int_range(0, SequenceType::COUNT as i32, "Instrument sequence count")?;

        for ty in &SequenceType::ALL[..count as usize] {
            let slot = load_slot(reader).map_err(|error| error.context(format!("At {ty} sequence")))?;
            instrument.slots[ty.index()] = slot;
        }

        Ok(instrument)
    }
}

fn load_slot<R: Read>(reader: &mut FieldReader<R>) -> Result<SequenceSlot, ModuleError> {
    let max_index = (SequenceBank::MAX_SEQUENCES - 1) as i8;

    let enabled = reader.read_char_range(0, 1, "Instrument sequence enabled flag")?;
    let index = reader.read_char_range(0, max_index, "Instrument sequence index")?;

    Ok(SequenceSlot {
        enabled: enabled == 1,
        index: index as u8,
    })
}

/// Errors that can result from editing a [`Sequence`] or [`SequenceBank`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("A sequence can't hold {len} items")]
    TooLong { len: usize },

    #[error("Sequence index {index} is out of range")]
    IndexOutOfRange { index: u8 },
}
