//! Sound driver packs and image assembly
//!
//! A [`DriverPack`] bundles the machine code of a sound driver with the tables needed to move
//! it to any load address: offsets of words that must be relocated, offsets of split low/high
//! address bytes, and offsets where pitch tables are to be written.

mod nsf;
mod pitch;
mod registry;

pub use nsf::{
    NSF_CALLER_BIN, NSF_CALLER_BIN_VRC6, NSF_HEADER_SIZE, NsfHeader, NsfRegion, caller_for,
};
pub use pitch::{NOTE_COUNT, NTSC_CLOCK, PAL_CLOCK, PitchTableKind, PitchTables, note_frequency};
pub use registry::DriverRegistry;

use crate::chip::{SoundChip, SoundChipSet};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::{
    fmt,
    fs::File,
    io::{self, BufReader, Read, Write},
    path::Path,
};
use thiserror::Error;
use tracing::trace;

/// The identifier of the driver version packs are built for
pub const DRIVER_ID: &[u8; 16] = b"NSF-driver v2.11";

/// The highest address an image may reach
const ADDRESS_SPACE: usize = 0x1_0000;

const PACK_MAGIC: &[u8; 4] = b"FTDP";
const PACK_FORMAT_VERSION: u8 = 1;

/// The chip configuration a driver is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum DriverKind {
    Apu2A03 = 0,
    Vrc6 = 1,
    Vrc7 = 2,
    Fds = 3,
    Mmc5 = 4,
    N163 = 5,
    S5B = 6,

    /// A driver that handles every expansion chip at once
    All = 7,
}

impl DriverKind {
    pub const ALL: [DriverKind; 8] = [
        DriverKind::Apu2A03,
        DriverKind::Vrc6,
        DriverKind::Vrc7,
        DriverKind::Fds,
        DriverKind::Mmc5,
        DriverKind::N163,
        DriverKind::S5B,
        DriverKind::All,
    ];

    /// The driver needed to play a chip set
    ///
    /// ```
    /// # use famidoc::{chip::{SoundChip, SoundChipSet}, driver::DriverKind};
    /// let chips = SoundChipSet::new();
    /// assert_eq!(DriverKind::for_chips(chips), DriverKind::Apu2A03);
    ///
    /// let chips = chips.with(SoundChip::N163);
    /// assert_eq!(DriverKind::for_chips(chips), DriverKind::N163);
    ///
    /// let chips = chips.with(SoundChip::Vrc6);
    /// assert_eq!(DriverKind::for_chips(chips), DriverKind::All);
    /// ```
    pub fn for_chips(chips: SoundChipSet) -> Self {
        let mut expansions = chips.expansions();

        match (expansions.next(), expansions.next()) {
            (None, _) => DriverKind::Apu2A03,
            (Some(chip), None) => DriverKind::for_chip(chip),
            _ => DriverKind::All,
        }
    }

    fn for_chip(chip: SoundChip) -> Self {
        match chip {
            SoundChip::Apu2A03 => DriverKind::Apu2A03,
            SoundChip::Vrc6 => DriverKind::Vrc6,
            SoundChip::Vrc7 => DriverKind::Vrc7,
            SoundChip::Fds => DriverKind::Fds,
            SoundChip::Mmc5 => DriverKind::Mmc5,
            SoundChip::N163 => DriverKind::N163,
            SoundChip::S5B => DriverKind::S5B,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            DriverKind::Apu2A03 => "2A03",
            DriverKind::Vrc6 => "VRC6",
            DriverKind::Vrc7 => "VRC7",
            DriverKind::Fds => "FDS",
            DriverKind::Mmc5 => "MMC5",
            DriverKind::N163 => "N163",
            DriverKind::S5B => "S5B",
            DriverKind::All => "All",
        }
    }

    /// The name of the pack file for this driver, like `drv_vrc6.bin`
    pub fn file_name(self) -> String {
        format!("drv_{}.bin", self.name().to_ascii_lowercase())
    }
}

impl From<DriverKind> for u8 {
    fn from(kind: DriverKind) -> Self {
        kind as u8
    }
}

impl TryFrom<u8> for DriverKind {
    type Error = FromReaderError;

    fn try_from(kind: u8) -> Result<Self, Self::Error> {
        DriverKind::ALL
            .get(kind as usize)
            .copied()
            .ok_or(FromReaderError::UnknownKind { kind })
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The machine code of a sound driver with its relocation and pitch tables
///
/// Packs are validated on construction: every offset in every table points inside the code,
/// so [`assemble()`](DriverPack::assemble) never writes out of bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverPack {
    kind: DriverKind,
    code: Vec<u8>,
    word_reloc: Vec<u16>,
    freq_table: Vec<u16>,
    adr_reloc: Vec<u16>,
}

impl DriverPack {
    /// Create a pack from its parts
    ///
    /// `freq_table` holds pairs of an offset and a [`PitchTableKind`] id, `adr_reloc` holds
    /// pairs of the offsets of a low and a high address byte.
    pub fn new(
        kind: DriverKind,
        code: Vec<u8>,
        word_reloc: Vec<u16>,
        freq_table: Vec<u16>,
        adr_reloc: Vec<u16>,
    ) -> Result<Self, DriverError> {
        let size = code.len();
        let check = |table: &'static str, offset: u16, len: usize| {
            if offset as usize + len > size {
                Err(DriverError::OffsetOutOfRange {
                    table,
                    offset,
                    size,
                })
            } else {
                Ok(())
            }
        };

        for offset in &word_reloc {
            check("word relocation", *offset, 2)?;
        }

        if freq_table.len() % 2 != 0 {
            return Err(DriverError::UnpairedTable {
                table: "frequency",
                len: freq_table.len(),
            });
        }
        for entry in freq_table.chunks_exact(2) {
            let table = PitchTableKind::try_from(entry[1])?;
            check("frequency", entry[0], table.byte_size())?;
        }

        if adr_reloc.len() % 2 != 0 {
            return Err(DriverError::UnpairedTable {
                table: "address relocation",
                len: adr_reloc.len(),
            });
        }
        for offset in &adr_reloc {
            check("address relocation", *offset, 1)?;
        }

        Ok(Self {
            kind,
            code,
            word_reloc,
            freq_table,
            adr_reloc,
        })
    }

    pub fn kind(&self) -> DriverKind {
        self.kind
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn code_size(&self) -> usize {
        self.code.len()
    }

    /// Offsets of little-endian words holding addresses relative to the load address
    pub fn word_reloc(&self) -> &[u16] {
        &self.word_reloc
    }

    pub fn word_reloc_size(&self) -> usize {
        self.word_reloc.len()
    }

    pub fn freq_table(&self) -> &[u16] {
        &self.freq_table
    }

    pub fn freq_table_size(&self) -> usize {
        self.freq_table.len()
    }

    /// The frequency table as pairs of offset and pitch table
    pub fn freq_entries(&self) -> impl Iterator<Item = (u16, PitchTableKind)> + '_ {
        self.freq_table.chunks_exact(2).filter_map(|entry| {
            PitchTableKind::try_from(entry[1])
                .ok()
                .map(|table| (entry[0], table))
        })
    }

    pub fn adr_reloc(&self) -> &[u16] {
        &self.adr_reloc
    }

    pub fn adr_reloc_size(&self) -> usize {
        self.adr_reloc.len()
    }

    /// The address relocation table as pairs of low and high byte offsets
    pub fn adr_pairs(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.adr_reloc
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
    }

    /// Produce a program image that runs at `load_address`
    ///
    /// The requested pitch tables are written first, then every relocated word and every split
    /// address pair has the load address added to it. Relocated values wrap around at 16 bits,
    /// like the 6502's address arithmetic.
    ///
    /// ```
    /// # use famidoc::driver::{DriverKind, DriverPack, PitchTables};
    /// // JMP $0003, followed by a split pointer to $0000
    /// let code = vec![0x4C, 0x03, 0x00, 0x00, 0x00];
    /// let pack = DriverPack::new(DriverKind::Apu2A03, code, vec![1], vec![], vec![3, 4])?;
    ///
    /// let image = pack.assemble(0x8000, &PitchTables::new())?;
    /// assert_eq!(image, [0x4C, 0x03, 0x80, 0x00, 0x80]);
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn assemble(&self, load_address: u16, pitch: &PitchTables) -> Result<Vec<u8>, DriverError> {
        if load_address as usize + self.code.len() > ADDRESS_SPACE {
            return Err(DriverError::ImageTooLarge {
                load_address,
                size: self.code.len(),
            });
        }

        let mut image = self.code.clone();

        for (offset, table) in self.freq_entries() {
            let values = pitch
                .get(table)
                .ok_or(DriverError::MissingPitchTable { table })?;
            table.patch(&mut image, offset as usize, values);
        }

        for offset in &self.word_reloc {
            let offset = *offset as usize;
            let value = u16::from_le_bytes([image[offset], image[offset + 1]]);
            let [lo, hi] = value.wrapping_add(load_address).to_le_bytes();
            image[offset] = lo;
            image[offset + 1] = hi;
        }

        for (lo_offset, hi_offset) in self.adr_pairs() {
            let (lo_offset, hi_offset) = (lo_offset as usize, hi_offset as usize);
            let value = u16::from_le_bytes([image[lo_offset], image[hi_offset]]);
            let [lo, hi] = value.wrapping_add(load_address).to_le_bytes();
            image[lo_offset] = lo;
            image[hi_offset] = hi;
        }

        trace!(kind = %self.kind, load_address, size = image.len(), "Assembled driver");
        Ok(image)
    }

    /// Read a pack from an arbitrary I/O reader
    pub fn from_reader<R>(mut reader: R) -> Result<Self, FromReaderError>
    where
        R: Read,
    {
        let mut magic = [0; 4];
        reader.read_exact(&mut magic)?;
        if &magic != PACK_MAGIC {
            return Err(FromReaderError::InvalidMagic);
        }

        let version = reader.read_u8()?;
        if version != PACK_FORMAT_VERSION {
            return Err(FromReaderError::UnsupportedFormatVersion { version });
        }

        let kind = DriverKind::try_from(reader.read_u8()?)?;

        let mut id = [0; 16];
        reader.read_exact(&mut id)?;
        if &id != DRIVER_ID {
            return Err(FromReaderError::DriverIdMismatch {
                found: String::from_utf8_lossy(&id).into_owned(),
            });
        }

        let len = reader.read_u32::<LittleEndian>()? as usize;
        if len > ADDRESS_SPACE {
            return Err(DriverError::ImageTooLarge {
                load_address: 0,
                size: len,
            }
            .into());
        }
        let mut code = vec![0; len];
        reader.read_exact(&mut code)?;

        let word_reloc = read_table(&mut reader)?;
        let freq_table = read_table(&mut reader)?;
        let adr_reloc = read_table(&mut reader)?;

        Ok(Self::new(kind, code, word_reloc, freq_table, adr_reloc)?)
    }

    /// Read a pack from a path on disk
    pub fn from_path<P>(path: P) -> Result<Self, FromPathError>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file))?)
    }

    /// Serialize the pack to an arbitrary I/O writer
    pub fn to_writer<W>(&self, mut writer: W) -> Result<(), io::Error>
    where
        W: Write,
    {
        writer.write_all(PACK_MAGIC)?;
        writer.write_u8(PACK_FORMAT_VERSION)?;
        writer.write_u8(self.kind.into())?;
        writer.write_all(DRIVER_ID)?;

        writer.write_u32::<LittleEndian>(self.code.len() as u32)?;
        writer.write_all(&self.code)?;

        write_table(&mut writer, &self.word_reloc)?;
        write_table(&mut writer, &self.freq_table)?;
        write_table(&mut writer, &self.adr_reloc)
    }

    /// Serialize the pack to a path on disk
    pub fn to_path<P>(&self, path: P) -> Result<(), io::Error>
    where
        P: AsRef<Path>,
    {
        self.to_writer(File::create(path)?)
    }
}

fn read_table<R: Read>(reader: &mut R) -> Result<Vec<u16>, FromReaderError> {
    let len = reader.read_u32::<LittleEndian>()? as usize;
    if len > ADDRESS_SPACE {
        return Err(FromReaderError::TableTooLarge { len });
    }

    let mut table = vec![0; len];
    reader.read_u16_into::<LittleEndian>(&mut table)?;
    Ok(table)
}

fn write_table<W: Write>(writer: &mut W, table: &[u16]) -> io::Result<()> {
    writer.write_u32::<LittleEndian>(table.len() as u32)?;
    for entry in table {
        writer.write_u16::<LittleEndian>(*entry)?;
    }

    Ok(())
}

/// Errors that might occur building or assembling a [`DriverPack`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("The {table} table has an odd number of entries ({len})")]
    UnpairedTable { table: &'static str, len: usize },

    #[error("Offset {offset:#06x} in the {table} table lies outside the {size}-byte driver")]
    OffsetOutOfRange {
        table: &'static str,
        offset: u16,
        size: usize,
    },

    #[error("Unknown pitch table {id}")]
    UnknownPitchTable { id: u16 },

    #[error("The {table} pitch table has {len} entries")]
    InvalidPitchTableLength { table: PitchTableKind, len: usize },

    #[error("The driver needs the {table} pitch table, which wasn't supplied")]
    MissingPitchTable { table: PitchTableKind },

    #[error("A {size}-byte image doesn't fit at {load_address:#06x}")]
    ImageTooLarge { load_address: u16, size: usize },
}

/// Errors that might be returned from [`DriverPack::from_reader()`]
#[derive(Debug, Error)]
pub enum FromReaderError {
    /// Reading from the I/O failed
    #[error("Reading the data failed")]
    Read(#[from] io::Error),

    #[error("The data is not a driver pack")]
    InvalidMagic,

    #[error("Pack format version {version} is not supported")]
    UnsupportedFormatVersion { version: u8 },

    #[error("Unknown driver kind {kind}")]
    UnknownKind { kind: u8 },

    #[error("The pack was built for {found:?}")]
    DriverIdMismatch { found: String },

    #[error("A table with {len} entries is too large")]
    TableTooLarge { len: usize },

    /// The pack's tables don't match its code
    #[error("The pack is invalid")]
    Pack(#[from] DriverError),
}

/// Errors that might be returned from [`DriverPack::from_path()`]
#[derive(Debug, Error)]
pub enum FromPathError {
    /// Opening the file itself failed
    #[error("Opening the file failed")]
    FileOpen(#[from] io::Error),

    /// Deserialization failed
    #[error("Reading the file failed")]
    Read(#[from] FromReaderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A small driver with one of every kind of table
    pub(super) fn pack(kind: DriverKind) -> DriverPack {
        let mut code = vec![0xEA; 8 + PitchTableKind::Ntsc.byte_size()];
        code[0..3].copy_from_slice(&[0x4C, 0x06, 0x00]); // JMP $0006
        code[3] = 0x34;
        code[5] = 0x12;

        DriverPack::new(kind, code, vec![1], vec![8, 0], vec![3, 5]).unwrap()
    }

    #[test]
    fn kinds() {
        assert_eq!(DriverKind::Apu2A03.file_name(), "drv_2a03.bin");
        assert_eq!(DriverKind::All.file_name(), "drv_all.bin");
        assert_eq!(DriverKind::try_from(5).unwrap(), DriverKind::N163);
        assert!(matches!(
            DriverKind::try_from(8),
            Err(FromReaderError::UnknownKind { kind: 8 })
        ));

        for kind in DriverKind::ALL {
            assert_eq!(DriverKind::try_from(u8::from(kind)).unwrap(), kind);
        }

        let chips = SoundChipSet::new().with(SoundChip::S5B);
        assert_eq!(DriverKind::for_chips(chips), DriverKind::S5B);
    }

    #[test]
    fn validation() {
        assert_eq!(
            DriverPack::new(DriverKind::Vrc6, vec![0; 4], vec![3], vec![], vec![]),
            Err(DriverError::OffsetOutOfRange {
                table: "word relocation",
                offset: 3,
                size: 4
            })
        );
        assert_eq!(
            DriverPack::new(DriverKind::Vrc6, vec![0; 4], vec![], vec![], vec![0, 1, 2]),
            Err(DriverError::UnpairedTable {
                table: "address relocation",
                len: 3
            })
        );
        assert_eq!(
            DriverPack::new(DriverKind::Vrc6, vec![0; 4], vec![], vec![], vec![0, 4]),
            Err(DriverError::OffsetOutOfRange {
                table: "address relocation",
                offset: 4,
                size: 4
            })
        );
        assert_eq!(
            DriverPack::new(DriverKind::Vrc6, vec![0; 200], vec![], vec![0, 9], vec![]),
            Err(DriverError::UnknownPitchTable { id: 9 })
        );

        // The table must fit entirely
        assert!(DriverPack::new(DriverKind::Vrc6, vec![0; 192], vec![], vec![0, 2], vec![]).is_ok());
        assert!(DriverPack::new(DriverKind::Vrc6, vec![0; 192], vec![], vec![1, 2], vec![]).is_err());
    }

    #[test]
    fn sizes() {
        let pack = pack(DriverKind::Apu2A03);
        assert_eq!(pack.code_size(), 200);
        assert_eq!(pack.word_reloc_size(), 1);
        assert_eq!(pack.freq_table_size(), 2);
        assert_eq!(pack.adr_reloc_size(), 2);
        assert_eq!(pack.freq_entries().collect::<Vec<_>>(), [(8, PitchTableKind::Ntsc)]);
        assert_eq!(pack.adr_pairs().collect::<Vec<_>>(), [(3, 5)]);
    }

    #[test]
    fn assemble() {
        let pack = pack(DriverKind::Apu2A03);
        let image = pack.assemble(0x8000, &PitchTables::ntsc()).unwrap();

        assert_eq!(image.len(), pack.code_size());
        assert_eq!(&image[0..3], &[0x4C, 0x06, 0x80]);
        assert_eq!((image[3], image[5]), (0x34, 0x92));
        assert_eq!(image[4], 0xEA);

        // A-4 at note 57
        let a4 = 8 + 57 * 2;
        assert_eq!(&image[a4..a4 + 2], &253u16.to_le_bytes());

        // The pack itself is untouched
        assert_eq!(pack.code()[2], 0x00);
    }

    #[test]
    fn assemble_wraps() {
        let pack = DriverPack::new(DriverKind::Mmc5, vec![0xFF, 0xFF], vec![0], vec![], vec![])
            .unwrap();
        assert_eq!(pack.assemble(2, &PitchTables::new()).unwrap(), [0x01, 0x00]);
    }

    #[test]
    fn assemble_errors() {
        let pack = pack(DriverKind::Apu2A03);
        assert_eq!(
            pack.assemble(0x8000, &PitchTables::new()),
            Err(DriverError::MissingPitchTable {
                table: PitchTableKind::Ntsc
            })
        );
        assert_eq!(
            pack.assemble(0xFF80, &PitchTables::ntsc()),
            Err(DriverError::ImageTooLarge {
                load_address: 0xFF80,
                size: 200
            })
        );
    }

    #[test]
    fn pack_file() {
        let pack = pack(DriverKind::Vrc6);

        let mut file = Vec::new();
        pack.to_writer(&mut file).unwrap();
        assert_eq!(&file[0..4], b"FTDP");
        assert_eq!(file[4..6], [1, 1]);
        assert_eq!(&file[6..22], b"NSF-driver v2.11");
        assert_eq!(&file[22..26], &200u32.to_le_bytes());

        assert_eq!(DriverPack::from_reader(file.as_slice()).unwrap(), pack);
    }

    #[test]
    fn invalid_pack_files() {
        let mut file = Vec::new();
        pack(DriverKind::N163).to_writer(&mut file).unwrap();

        let mut wrong_id = file.clone();
        wrong_id[21] = b'0';
        assert!(matches!(
            DriverPack::from_reader(wrong_id.as_slice()),
            Err(FromReaderError::DriverIdMismatch { found }) if found == "NSF-driver v2.10"
        ));

        let mut wrong_magic = file.clone();
        wrong_magic[0] = b'X';
        assert!(matches!(
            DriverPack::from_reader(wrong_magic.as_slice()),
            Err(FromReaderError::InvalidMagic)
        ));

        assert!(matches!(
            DriverPack::from_reader(&file[..file.len() - 1]),
            Err(FromReaderError::Read(_))
        ));

        // Point the word relocation past the end of the code
        let reloc = 26 + 200 + 4;
        let mut bad_offset = file.clone();
        bad_offset[reloc..reloc + 2].copy_from_slice(&[0xFF, 0x00]);
        assert!(matches!(
            DriverPack::from_reader(bad_offset.as_slice()),
            Err(FromReaderError::Pack(DriverError::OffsetOutOfRange { offset: 0xFF, .. }))
        ));
    }
}
