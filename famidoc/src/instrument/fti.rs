//! Standalone instrument files (.fti)
//!
//! An instrument file holds a single instrument together with copies of the sequences it
//! uses, so it can be moved between modules.

use super::{
    Instrument, InstrumentKind, N163Instrument, SeqInstrument, Sequence, SequenceBank,
    SequenceType,
};
use crate::document::{Compatibility, FieldReader, FieldWriter, FromPathError, ModuleError};
use std::{
    fs::File,
    io::{self, Read, Write},
    path::Path,
};
use tracing::debug;

/// The identifier every instrument file starts with
const FTI_ID: &[u8; 3] = b"FTI";

/// The instrument file version that is written
pub const FTI_VERSION: u32 = 24;

/// The oldest instrument file version that can be read
pub const MIN_FTI_VERSION: u32 = 20;

/// The newest instrument file version that can be read
pub const MAX_FTI_VERSION: u32 = 25;

impl Instrument {
    /// Deserialize an instrument from an instrument file
    ///
    /// The sequences embedded in the file are added to `bank`, each at the first free index for
    /// its kind and type, and the instrument's slots are pointed at them. If loading fails, the
    /// bank is left untouched.
    pub fn from_fti_reader<R>(reader: R, bank: &mut SequenceBank) -> Result<Self, ModuleError>
    where
        R: Read,
    {
        let mut reader = FieldReader::new(reader, Compatibility::Extended);

        if reader.read_bytes(FTI_ID.len())? != FTI_ID {
            return Err(ModuleError::InvalidHeader);
        }

        let version = parse_version(&reader.read_bytes(3)?).ok_or(ModuleError::InvalidHeader)?;
        if !(MIN_FTI_VERSION..=MAX_FTI_VERSION).contains(&version) {
            return Err(ModuleError::UnsupportedFileVersion { version });
        }

        let kind = InstrumentKind::try_from(reader.read_byte()?)?;
        if !kind.is_supported() {
            return Err(ModuleError::UnsupportedInstrument { kind: kind.into() });
        }

        let mut base = SeqInstrument::new(kind);
        base.set_name(reader.read_name("Instrument name")?);

        let count =
            reader.read_char_range(0, SequenceType::COUNT as i8, "Instrument sequence count")?;
        let mut sequences = Vec::new();

        for ty in &SequenceType::ALL[..count as usize] {
            let sequence = load_sequence(&mut reader)
                .map_err(|error| error.context(format!("At {ty} sequence")))?;

            if let Some(sequence) = sequence {
                sequences.push((*ty, sequence));
            }
        }

        let mut instrument = match kind {
            InstrumentKind::N163 => {
                Instrument::N163(N163Instrument::load_waves(&mut reader, version >= 25)?)
            }
            _ => Instrument::Sequence(SeqInstrument::new(kind)),
        };

        // Pick all indices before touching the bank
        let mut indices = Vec::with_capacity(sequences.len());
        for (ty, _) in &sequences {
            let index = bank
                .first_free(kind, *ty)
                .ok_or(ModuleError::SequenceBankFull { kind, ty: *ty })?;
            indices.push(index);
        }

        for ((ty, sequence), index) in sequences.into_iter().zip(indices) {
            debug!(%ty, index, "Importing sequence");
            base.set_slot(ty, true, index);
            bank.insert(kind, ty, index, sequence)
                .map_err(|_| ModuleError::SequenceBankFull { kind, ty })?;
        }

        *instrument.base_mut() = base;
        Ok(instrument)
    }

    /// Deserialize an instrument from an instrument file on disk
    pub fn from_fti_path<P>(path: P, bank: &mut SequenceBank) -> Result<Self, FromPathError>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path)?;
        Ok(Self::from_fti_reader(file, bank)?)
    }

    /// Serialize the instrument to an instrument file
    ///
    /// The sequences the instrument has enabled are looked up in `bank` and embedded. An enabled
    /// slot pointing at an index without a sequence is written as an empty sequence.
    pub fn to_fti_writer<W>(&self, writer: W, bank: &SequenceBank) -> io::Result<()>
    where
        W: Write,
    {
        let mut writer = FieldWriter::new(writer);
        let base = self.base();
        let empty = Sequence::new();

        writer.write_bytes(FTI_ID)?;
        writer.write_bytes(&version_bytes(FTI_VERSION))?;
        writer.write_byte(base.kind().into())?;
        writer.write_name(base.name())?;

        writer.write_char(SequenceType::COUNT as i8)?;
        for ty in SequenceType::ALL {
            let slot = base.slot(ty);
            writer.write_char(slot.enabled as i8)?;

            if slot.enabled {
                let sequence = bank.get(base.kind(), ty, slot.index).unwrap_or(&empty);
                sequence.store(&mut writer)?;
            }
        }

        if let Instrument::N163(instrument) = self {
            instrument.store_waves(&mut writer)?;
        }

        Ok(())
    }

    /// Serialize the instrument to an instrument file on disk
    pub fn to_fti_path<P>(&self, path: P, bank: &SequenceBank) -> io::Result<()>
    where
        P: AsRef<Path>,
    {
        self.to_fti_writer(File::create(path)?, bank)
    }
}

fn load_sequence<R: Read>(reader: &mut FieldReader<R>) -> Result<Option<Sequence>, ModuleError> {
    match reader.read_char_range(0, 1, "Instrument sequence enabled flag")? {
        1 => Ok(Some(Sequence::load(reader)?)),
        _ => Ok(None),
    }
}

/// Parse a version like `2.4` into its number (24)
fn parse_version(bytes: &[u8]) -> Option<u32> {
    match bytes {
        [major @ b'0'..=b'9', b'.', minor @ b'0'..=b'9'] => {
            Some(u32::from(major - b'0') * 10 + u32::from(minor - b'0'))
        }
        _ => None,
    }
}

fn version_bytes(version: u32) -> [u8; 3] {
    [b'0' + (version / 10) as u8, b'.', b'0' + (version % 10) as u8]
}
