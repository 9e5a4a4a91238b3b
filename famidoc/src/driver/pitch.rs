//! Pitch tables patched into driver images

use super::DriverError;
use std::{collections::BTreeMap, fmt};

/// The number of notes in a period table (eight octaves)
pub const NOTE_COUNT: usize = 96;

/// The note that plays at 440 Hz (A-4)
const A4_NOTE: i32 = 57;
const A4_FREQUENCY: f64 = 440.0;

/// The CPU clock of NTSC consoles, in Hz
pub const NTSC_CLOCK: f64 = 1_789_773.0;

/// The CPU clock of PAL consoles, in Hz
pub const PAL_CLOCK: f64 = 1_662_607.0;

/// The pitch tables a driver can ask for
///
/// The discriminants are the ids used in a driver's frequency table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum PitchTableKind {
    /// 2A03 periods at the NTSC clock
    Ntsc = 0,

    /// 2A03 periods at the PAL clock
    Pal = 1,

    /// VRC6 sawtooth periods
    Saw = 2,

    /// VRC7 frequency numbers for a single octave
    Vrc7 = 3,

    /// FDS frequencies
    Fds = 4,

    /// N163 frequencies
    N163 = 5,
}

impl PitchTableKind {
    /// The number of entries in a table of this kind
    pub const fn len(self) -> usize {
        match self {
            PitchTableKind::Vrc7 => 13,
            _ => NOTE_COUNT,
        }
    }

    /// The number of bytes the table takes up in a driver image
    pub const fn byte_size(self) -> usize {
        self.len() * 2
    }

    /// Write a table into an image at `offset`
    ///
    /// Most tables are stored as little-endian words. The VRC7 table stores all low bytes
    /// first, followed by all high bytes.
    pub(crate) fn patch(self, image: &mut [u8], offset: usize, values: &[u16]) {
        let len = self.len();

        for (index, value) in values.iter().take(len).enumerate() {
            let [lo, hi] = value.to_le_bytes();

            match self {
                PitchTableKind::Vrc7 => {
                    image[offset + index] = lo;
                    image[offset + index + len] = hi;
                }
                _ => {
                    image[offset + 2 * index] = lo;
                    image[offset + 2 * index + 1] = hi;
                }
            }
        }
    }
}

impl TryFrom<u16> for PitchTableKind {
    type Error = DriverError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        match id {
            0 => Ok(PitchTableKind::Ntsc),
            1 => Ok(PitchTableKind::Pal),
            2 => Ok(PitchTableKind::Saw),
            3 => Ok(PitchTableKind::Vrc7),
            4 => Ok(PitchTableKind::Fds),
            5 => Ok(PitchTableKind::N163),
            id => Err(DriverError::UnknownPitchTable { id }),
        }
    }
}

impl fmt::Display for PitchTableKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PitchTableKind::Ntsc => "NTSC",
            PitchTableKind::Pal => "PAL",
            PitchTableKind::Saw => "Sawtooth",
            PitchTableKind::Vrc7 => "VRC7",
            PitchTableKind::Fds => "FDS",
            PitchTableKind::N163 => "N163",
        };

        write!(f, "{name}")
    }
}

/// A set of pitch tables to patch into a driver
///
/// ```
/// # use famidoc::driver::{PitchTableKind, PitchTables};
/// let tables = PitchTables::ntsc();
///
/// // A-4
/// assert_eq!(tables.get(PitchTableKind::Ntsc).unwrap()[57], 253);
/// assert!(tables.get(PitchTableKind::Fds).is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PitchTables {
    tables: BTreeMap<PitchTableKind, Vec<u16>>,
}

impl PitchTables {
    /// An empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables for an NTSC machine
    ///
    /// Both 2A03 tables are present, since a driver may support both machines. The sawtooth
    /// table is computed for the NTSC clock.
    pub fn ntsc() -> Self {
        Self::for_clock(NTSC_CLOCK)
    }

    /// Tables for a PAL machine, with the sawtooth table computed for the PAL clock
    pub fn pal() -> Self {
        Self::for_clock(PAL_CLOCK)
    }

    fn for_clock(clock: f64) -> Self {
        let mut tables = BTreeMap::new();
        tables.insert(PitchTableKind::Ntsc, periods(NTSC_CLOCK, 16.0, 0x7FF));
        tables.insert(PitchTableKind::Pal, periods(PAL_CLOCK, 16.0, 0x7FF));
        tables.insert(PitchTableKind::Saw, periods(clock, 14.0, 0xFFF));

        Self { tables }
    }

    /// Add or replace a table
    ///
    /// Fails if the table doesn't have [`PitchTableKind::len()`] entries.
    pub fn with(mut self, kind: PitchTableKind, values: Vec<u16>) -> Result<Self, DriverError> {
        if values.len() != kind.len() {
            return Err(DriverError::InvalidPitchTableLength {
                table: kind,
                len: values.len(),
            });
        }

        self.tables.insert(kind, values);
        Ok(self)
    }

    pub fn get(&self, kind: PitchTableKind) -> Option<&[u16]> {
        self.tables.get(&kind).map(Vec::as_slice)
    }

    /// Iterate over the tables that are present
    pub fn kinds(&self) -> impl Iterator<Item = PitchTableKind> + '_ {
        self.tables.keys().copied()
    }
}

/// The frequency of a note in equal temperament
pub fn note_frequency(note: usize) -> f64 {
    A4_FREQUENCY * 2f64.powf((note as i32 - A4_NOTE) as f64 / 12.0)
}

/// Periods for a timer that divides `clock` by `divider` per step, clamped to `max`
fn periods(clock: f64, divider: f64, max: u16) -> Vec<u16> {
    (0..NOTE_COUNT)
        .map(|note| {
            let period = (clock / (divider * note_frequency(note)) - 1.0).round();
            period.clamp(0.0, max as f64) as u16
        })
        .collect()
}
