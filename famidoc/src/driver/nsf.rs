//! NSF headers and the caller stubs used to boot a driver from a cartridge image

use super::DriverKind;
use crate::{
    chip::SoundChipSet,
    document::{Document, Machine},
    name::Name,
};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Cursor, Write};

/// Boot code placed at `$FF80` that initializes the console and calls the driver
///
/// It calls `INIT` at `$8008` and `PLAY` at `$800B` from the NMI handler. The last six bytes
/// are the NMI, reset and IRQ vectors.
pub const NSF_CALLER_BIN: [u8; 128] = [
    0x78, 0xD8, 0xAD, 0x02, 0x20, 0x10, 0xFB, 0xAD, 0x02, 0x20, 0x10, 0xFB, 0xA2, 0x00, 0x8A, 0x9D,
    0x00, 0x02, 0xE8, 0xD0, 0xFA, 0xA9, 0x0F, 0x8D, 0x15, 0x40, 0xA9, 0x0A, 0x8D, 0x10, 0x40, 0xA9,
    0x00, 0xA2, 0x00, 0xA0, 0x00, 0x20, 0x08, 0x80, 0xA9, 0x80, 0x8D, 0x00, 0x20, 0xA9, 0x00, 0x8D,
    0x01, 0x20, 0x4C, 0xB2, 0xFF, 0x20, 0x0B, 0x80, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xB5, 0xFF, 0x80, 0xFF, 0xB8, 0xFF,
];

/// [`NSF_CALLER_BIN`] for VRC6 cartridges, which also sets up the VRC6 bank registers
pub const NSF_CALLER_BIN_VRC6: [u8; 128] = [
    0x78, 0xD8, 0xAD, 0x02, 0x20, 0x10, 0xFB, 0xAD, 0x02, 0x20, 0x10, 0xFB, 0xA2, 0x00, 0x8A, 0x9D,
    0x00, 0x02, 0xE8, 0xD0, 0xFA, 0xA9, 0x00, 0x8D, 0x00, 0x80, 0xA9, 0x02, 0x8D, 0x00, 0xC0, 0xA9,
    0x0F, 0x8D, 0x15, 0x40, 0xA9, 0x0A, 0x8D, 0x10, 0x40, 0xA9, 0x00, 0xA2, 0x00, 0xA0, 0x00, 0x20,
    0x00, 0x80, 0xA9, 0x80, 0x8D, 0x00, 0x20, 0xA9, 0x00, 0x8D, 0x01, 0x20, 0x4C, 0xBC, 0xFF, 0x20,
    0x03, 0x80, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xBF, 0xFF, 0x80, 0xFF, 0xC2, 0xFF,
];

/// The caller stub a driver needs
pub fn caller_for(kind: DriverKind) -> &'static [u8; 128] {
    match kind {
        DriverKind::Vrc6 => &NSF_CALLER_BIN_VRC6,
        _ => &NSF_CALLER_BIN,
    }
}

const NSF_ID: &[u8; 5] = b"NESM\x1A";
const NSF_VERSION: u8 = 1;

/// The size of a serialized [`NsfHeader`]
pub const NSF_HEADER_SIZE: usize = 128;

const DEFAULT_NTSC_SPEED: u16 = 16639;
const DEFAULT_PAL_SPEED: u16 = 19997;

/// The machines an NSF can play on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NsfRegion {
    #[default]
    Ntsc,
    Pal,
    Dual,
}

impl NsfRegion {
    fn flags(self) -> u8 {
        match self {
            NsfRegion::Ntsc => 0,
            NsfRegion::Pal => 1,
            NsfRegion::Dual => 2,
        }
    }
}

impl From<Machine> for NsfRegion {
    fn from(machine: Machine) -> Self {
        match machine {
            Machine::Ntsc => NsfRegion::Ntsc,
            Machine::Pal => NsfRegion::Pal,
        }
    }
}

/// The 128-byte header of a version 1 NSF file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsfHeader {
    pub song_count: u8,

    /// The song played first, starting at 1
    pub first_song: u8,

    pub load_address: u16,
    pub init_address: u16,
    pub play_address: u16,

    pub title: Name<31>,
    pub artist: Name<31>,
    pub copyright: Name<31>,

    /// The NTSC play rate, in microseconds per call
    pub ntsc_speed: u16,

    /// The PAL play rate, in microseconds per call
    pub pal_speed: u16,

    /// Initial bank values, all zero when bankswitching isn't used
    pub bankswitch: [u8; 8],

    pub region: NsfRegion,
    pub chips: SoundChipSet,
}

impl NsfHeader {
    /// A header for a single NTSC song without expansion chips
    pub fn new(load_address: u16, init_address: u16, play_address: u16) -> Self {
        Self {
            song_count: 1,
            first_song: 1,
            load_address,
            init_address,
            play_address,
            title: Name::default(),
            artist: Name::default(),
            copyright: Name::default(),
            ntsc_speed: DEFAULT_NTSC_SPEED,
            pal_speed: DEFAULT_PAL_SPEED,
            bankswitch: [0; 8],
            region: NsfRegion::default(),
            chips: SoundChipSet::new(),
        }
    }

    /// A header describing a module: its tracks, machine, engine speed and chips
    pub fn for_document(
        document: &Document,
        load_address: u16,
        init_address: u16,
        play_address: u16,
    ) -> Self {
        let mut header = Self::new(load_address, init_address, play_address);
        header.song_count = document.tracks().len().min(u8::MAX as usize) as u8;
        header.region = document.machine.into();
        header.chips = document.chips();

        if document.engine_speed > 0 {
            let speed = u16::try_from(1_000_000 / document.engine_speed as u32).unwrap_or(u16::MAX);
            header.ntsc_speed = speed;
            header.pal_speed = speed;
        }

        header
    }

    pub fn to_bytes(&self) -> Result<[u8; NSF_HEADER_SIZE], io::Error> {
        let mut bytes = [0; NSF_HEADER_SIZE];
        self.to_writer(Cursor::new(bytes.as_mut_slice()))?;

        Ok(bytes)
    }

    /// Serialize the header to an arbitrary I/O writer
    pub fn to_writer<W>(&self, mut writer: W) -> Result<(), io::Error>
    where
        W: Write,
    {
        writer.write_all(NSF_ID)?;
        writer.write_u8(NSF_VERSION)?;
        writer.write_u8(self.song_count)?;
        writer.write_u8(self.first_song)?;
        writer.write_u16::<LittleEndian>(self.load_address)?;
        writer.write_u16::<LittleEndian>(self.init_address)?;
        writer.write_u16::<LittleEndian>(self.play_address)?;

        for name in [&self.title, &self.artist, &self.copyright] {
            let mut field = [0; 32];
            field[..name.len()].copy_from_slice(name.bytes());
            writer.write_all(&field)?;
        }

        writer.write_u16::<LittleEndian>(self.ntsc_speed)?;
        writer.write_all(&self.bankswitch)?;
        writer.write_u16::<LittleEndian>(self.pal_speed)?;
        writer.write_u8(self.region.flags())?;
        writer.write_u8(self.chips.expansion_flags())?;
        writer.write_all(&[0; 4])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::SoundChip;
    use std::str::FromStr;

    #[test]
    fn caller_vectors() {
        assert_eq!(&NSF_CALLER_BIN[122..], &[0xB5, 0xFF, 0x80, 0xFF, 0xB8, 0xFF]);
        assert_eq!(&NSF_CALLER_BIN_VRC6[122..], &[0xBF, 0xFF, 0x80, 0xFF, 0xC2, 0xFF]);

        // JSR $8008 / JSR $8000
        assert_eq!(&NSF_CALLER_BIN[37..40], &[0x20, 0x08, 0x80]);
        assert_eq!(&NSF_CALLER_BIN_VRC6[47..50], &[0x20, 0x00, 0x80]);

        assert_eq!(caller_for(DriverKind::Vrc6), &NSF_CALLER_BIN_VRC6);
        assert_eq!(caller_for(DriverKind::All), &NSF_CALLER_BIN);
    }

    #[test]
    fn header_layout() {
        let mut header = NsfHeader::new(0x8000, 0x8008, 0x800B);
        header.title = Name::from_str("Overworld").unwrap();
        header.chips = SoundChipSet::new().with(SoundChip::Vrc6).with(SoundChip::N163);
        header.region = NsfRegion::Dual;

        let bytes = header.to_bytes().unwrap();
        assert_eq!(&bytes[0..5], b"NESM\x1A");
        assert_eq!(bytes[5..8], [1, 1, 1]);
        assert_eq!(bytes[8..14], [0x00, 0x80, 0x08, 0x80, 0x0B, 0x80]);
        assert_eq!(&bytes[0x0E..0x17], b"Overworld");
        assert!(bytes[0x17..0x6E].iter().all(|byte| *byte == 0));
        assert_eq!(&bytes[0x6E..0x70], &16639u16.to_le_bytes());
        assert_eq!(&bytes[0x78..0x7A], &19997u16.to_le_bytes());
        assert_eq!(bytes[0x7A], 2);
        assert_eq!(bytes[0x7B], 0x11);

        let mut written = Vec::new();
        header.to_writer(&mut written).unwrap();
        assert_eq!(written, bytes);

        let mut short = [0; 64];
        assert!(header.to_writer(&mut short[..]).is_err());
    }

    #[test]
    fn from_document() {
        let mut document = Document::new();
        document.add_track();
        document.machine = Machine::Pal;
        document.engine_speed = 100;

        let header = NsfHeader::for_document(&document, 0x8000, 0x8008, 0x800B);
        assert_eq!(header.song_count, 2);
        assert_eq!(header.region, NsfRegion::Pal);
        assert_eq!(header.ntsc_speed, 10000);
        assert_eq!(header.pal_speed, 10000);
        assert_eq!(header.chips, SoundChipSet::new());
    }

    #[test]
    fn slow_engine_speed() {
        let mut document = Document::new();

        for speed in [1, 15] {
            document.engine_speed = speed;
            let header = NsfHeader::for_document(&document, 0x8000, 0x8008, 0x800B);
            assert_eq!(header.ntsc_speed, u16::MAX);
            assert_eq!(header.pal_speed, u16::MAX);
        }

        document.engine_speed = 16;
        let header = NsfHeader::for_document(&document, 0x8000, 0x8008, 0x800B);
        assert_eq!(header.ntsc_speed, 62500);
    }
}
