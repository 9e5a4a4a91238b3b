//! Instruments and the sequences they play

mod fti;
mod n163;
mod sequence;

pub use fti::{FTI_VERSION, MAX_FTI_VERSION, MIN_FTI_VERSION};
pub use n163::{N163Instrument, Wave, WaveSample};
pub use sequence::{
    InstrumentName, SeqInstrument, Sequence, SequenceBank, SequenceError, SequenceSlot,
    SequenceType,
};

use crate::{
    chip::SoundChip,
    document::{FieldReader, FieldWriter, ModuleError},
};
use std::{
    fmt,
    io::{self, Read, Write},
};

/// The kinds of instrument the module format knows about
///
/// The discriminants are the type bytes stored in modules and instrument files. VRC7 and FDS
/// instruments can be recognized, but not loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum InstrumentKind {
    Apu2A03 = 1,
    Vrc6 = 2,
    Vrc7 = 3,
    Fds = 4,
    N163 = 5,
    S5B = 6,
}

impl InstrumentKind {
    /// The kinds that can be loaded and stored
    pub const SUPPORTED: [InstrumentKind; 4] = [
        InstrumentKind::Apu2A03,
        InstrumentKind::Vrc6,
        InstrumentKind::N163,
        InstrumentKind::S5B,
    ];

    /// The chip an instrument of this kind plays on
    pub const fn chip(self) -> SoundChip {
        match self {
            InstrumentKind::Apu2A03 => SoundChip::Apu2A03,
            InstrumentKind::Vrc6 => SoundChip::Vrc6,
            InstrumentKind::Vrc7 => SoundChip::Vrc7,
            InstrumentKind::Fds => SoundChip::Fds,
            InstrumentKind::N163 => SoundChip::N163,
            InstrumentKind::S5B => SoundChip::S5B,
        }
    }

    /// Can instruments of this kind be loaded and stored?
    pub fn is_supported(self) -> bool {
        Self::SUPPORTED.contains(&self)
    }

    /// The name of the module block holding this kind's sequences
    pub const fn sequence_block(self) -> Option<&'static str> {
        match self {
            InstrumentKind::Apu2A03 => Some("SEQUENCES"),
            InstrumentKind::Vrc6 => Some("SEQUENCES_VRC6"),
            InstrumentKind::N163 => Some("SEQUENCES_N163"),
            InstrumentKind::S5B => Some("SEQUENCES_S5B"),
            InstrumentKind::Vrc7 | InstrumentKind::Fds => None,
        }
    }
}

impl From<InstrumentKind> for u8 {
    fn from(kind: InstrumentKind) -> Self {
        kind as u8
    }
}

impl TryFrom<u8> for InstrumentKind {
    type Error = ModuleError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(InstrumentKind::Apu2A03),
            2 => Ok(InstrumentKind::Vrc6),
            3 => Ok(InstrumentKind::Vrc7),
            4 => Ok(InstrumentKind::Fds),
            5 => Ok(InstrumentKind::N163),
            6 => Ok(InstrumentKind::S5B),
            kind => Err(ModuleError::UnsupportedInstrument { kind }),
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.chip())
    }
}

/// An instrument of any supported kind
///
/// 2A03, VRC6 and 5B instruments consist of nothing but sequences. N163 instruments add
/// a bank of waves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instrument {
    Sequence(SeqInstrument),
    N163(N163Instrument),
}

impl Instrument {
    /// Construct a default instrument of a kind
    ///
    /// Fails with [`ModuleError::UnsupportedInstrument`] for VRC7 and FDS.
    pub fn new(kind: InstrumentKind) -> Result<Self, ModuleError> {
        match kind {
            InstrumentKind::N163 => Ok(Self::N163(N163Instrument::new())),
            kind if kind.is_supported() => Ok(Self::Sequence(SeqInstrument::new(kind))),
            kind => Err(ModuleError::UnsupportedInstrument { kind: kind.into() }),
        }
    }

    pub fn kind(&self) -> InstrumentKind {
        self.base().kind()
    }

    pub fn name(&self) -> &InstrumentName {
        self.base().name()
    }

    pub fn set_name(&mut self, name: InstrumentName) {
        self.base_mut().set_name(name)
    }

    /// The kind, name and sequence slots
    pub fn base(&self) -> &SeqInstrument {
        match self {
            Self::Sequence(instrument) => instrument,
            Self::N163(instrument) => instrument.base(),
        }
    }

    pub fn base_mut(&mut self) -> &mut SeqInstrument {
        match self {
            Self::Sequence(instrument) => instrument,
            Self::N163(instrument) => instrument.base_mut(),
        }
    }

    pub fn as_n163(&self) -> Option<&N163Instrument> {
        match self {
            Self::N163(instrument) => Some(instrument),
            Self::Sequence(_) => None,
        }
    }

    pub fn as_n163_mut(&mut self) -> Option<&mut N163Instrument> {
        match self {
            Self::N163(instrument) => Some(instrument),
            Self::Sequence(_) => None,
        }
    }

    /// Write the instrument body, as it appears in a module
    pub(crate) fn store<W: Write>(&self, writer: &mut FieldWriter<W>) -> io::Result<()> {
        match self {
            Self::Sequence(instrument) => instrument.store(writer),
            Self::N163(instrument) => instrument.store(writer),
        }
    }

    /// Read an instrument body, as it appears in a module
    ///
    /// `block_version` is the version of the block the body is stored in.
    pub(crate) fn load<R: Read>(
        kind: InstrumentKind,
        reader: &mut FieldReader<R>,
        block_version: u32,
    ) -> Result<Self, ModuleError> {
        match kind {
            InstrumentKind::N163 => Ok(Self::N163(N163Instrument::load(
                reader,
                block_version >= 8,
            )?)),
            kind if kind.is_supported() => Ok(Self::Sequence(SeqInstrument::load(kind, reader)?)),
            kind => Err(ModuleError::UnsupportedInstrument { kind: kind.into() }),
        }
    }
}

impl From<N163Instrument> for Instrument {
    fn from(instrument: N163Instrument) -> Self {
        Self::N163(instrument)
    }
}
