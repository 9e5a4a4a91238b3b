//! Sound chips and the channels they provide

use std::fmt;
use thiserror::Error;

/// A sound chip the tracker can write music for
///
/// The 2A03 is the console's built-in APU and is always present. All other chips are
/// expansion chips found on cartridges or the Famicom Disk System.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SoundChip {
    Apu2A03,
    Vrc6,
    Mmc5,
    N163,
    Fds,
    Vrc7,
    S5B,
}

impl SoundChip {
    /// All chips, in canonical channel order
    pub const ALL: [SoundChip; 7] = [
        SoundChip::Apu2A03,
        SoundChip::Vrc6,
        SoundChip::Mmc5,
        SoundChip::N163,
        SoundChip::Fds,
        SoundChip::Vrc7,
        SoundChip::S5B,
    ];

    /// The flag this chip occupies in a [`SoundChipSet`], empty for the built-in 2A03
    pub const fn expansion_flag(self) -> SoundChipSet {
        match self {
            SoundChip::Apu2A03 => SoundChipSet::empty(),
            SoundChip::Vrc6 => SoundChipSet::VRC6,
            SoundChip::Vrc7 => SoundChipSet::VRC7,
            SoundChip::Fds => SoundChipSet::FDS,
            SoundChip::Mmc5 => SoundChipSet::MMC5,
            SoundChip::N163 => SoundChipSet::N163,
            SoundChip::S5B => SoundChipSet::S5B,
        }
    }

    /// Every channel the chip can provide, in canonical order
    ///
    /// The N163 has a variable number of channels; this lists all eight.
    pub const fn channels(self) -> &'static [ChannelId] {
        use ChannelId::*;

        match self {
            SoundChip::Apu2A03 => &[Square1, Square2, Triangle, Noise, Dpcm],
            SoundChip::Vrc6 => &[Vrc6Pulse1, Vrc6Pulse2, Vrc6Sawtooth],
            SoundChip::Mmc5 => &[Mmc5Square1, Mmc5Square2],
            SoundChip::N163 => &[
                N163Ch1, N163Ch2, N163Ch3, N163Ch4, N163Ch5, N163Ch6, N163Ch7, N163Ch8,
            ],
            SoundChip::Fds => &[Fds],
            SoundChip::Vrc7 => &[Vrc7Ch1, Vrc7Ch2, Vrc7Ch3, Vrc7Ch4, Vrc7Ch5, Vrc7Ch6],
            SoundChip::S5B => &[S5BCh1, S5BCh2, S5BCh3],
        }
    }

    /// A short display name
    pub const fn name(self) -> &'static str {
        match self {
            SoundChip::Apu2A03 => "2A03",
            SoundChip::Vrc6 => "VRC6",
            SoundChip::Mmc5 => "MMC5",
            SoundChip::N163 => "N163",
            SoundChip::Fds => "FDS",
            SoundChip::Vrc7 => "VRC7",
            SoundChip::S5B => "5B",
        }
    }
}

impl fmt::Display for SoundChip {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

bitflags::bitflags! {
    /// The set of chips a module is written for
    ///
    /// The 2A03 is part of every set and has no flag of its own. The expansion chips are stored
    /// as the flags byte used by both the module format and the NSF header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SoundChipSet: u8 {
        const VRC6 = 0x01;
        const VRC7 = 0x02;
        const FDS = 0x04;
        const MMC5 = 0x08;
        const N163 = 0x10;
        const S5B = 0x20;
    }
}

impl Default for SoundChipSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl SoundChipSet {
    /// A set containing only the 2A03
    pub const fn new() -> Self {
        Self::empty()
    }

    /// Build a set from the expansion flags byte
    pub fn from_expansion_flags(flags: u8) -> Result<Self, UnknownChipFlags> {
        Self::from_bits(flags).ok_or(UnknownChipFlags { flags })
    }

    /// The expansion flags byte
    pub const fn expansion_flags(self) -> u8 {
        self.bits()
    }

    /// This set with a chip added
    pub const fn with(self, chip: SoundChip) -> Self {
        self.union(chip.expansion_flag())
    }

    /// This set with a chip removed (the 2A03 can't be removed)
    pub const fn without(self, chip: SoundChip) -> Self {
        self.difference(chip.expansion_flag())
    }

    /// Is a chip part of the set?
    pub const fn contains_chip(self, chip: SoundChip) -> bool {
        match chip {
            SoundChip::Apu2A03 => true,
            chip => self.contains(chip.expansion_flag()),
        }
    }

    /// Does the set contain any expansion chips?
    pub const fn has_expansion(self) -> bool {
        !self.is_empty()
    }

    /// The number of expansion chips in the set
    pub const fn expansion_count(self) -> u32 {
        self.bits().count_ones()
    }

    /// Iterate over the chips in the set, in canonical channel order
    pub fn iter_chips(self) -> impl Iterator<Item = SoundChip> {
        SoundChip::ALL
            .into_iter()
            .filter(move |chip| self.contains_chip(*chip))
    }

    /// Iterate over the expansion chips in the set, in canonical channel order
    pub fn expansions(self) -> impl Iterator<Item = SoundChip> {
        self.iter_chips().filter(|chip| *chip != SoundChip::Apu2A03)
    }
}

impl FromIterator<SoundChip> for SoundChipSet {
    fn from_iter<I: IntoIterator<Item = SoundChip>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), Self::with)
    }
}

impl fmt::Display for SoundChipSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names: Vec<_> = self.iter_chips().map(SoundChip::name).collect();
        write!(f, "{}", names.join(" + "))
    }
}

/// The expansion flags byte had bits set that don't belong to any chip
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown expansion chip flags {flags:#04X}")]
pub struct UnknownChipFlags {
    pub flags: u8,
}

/// Identifies a single sound channel
///
/// The discriminants are the ids stored in the module format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ChannelId {
    Square1 = 0,
    Square2 = 1,
    Triangle = 2,
    Noise = 3,
    Dpcm = 4,
    Vrc6Pulse1 = 5,
    Vrc6Pulse2 = 6,
    Vrc6Sawtooth = 7,
    Mmc5Square1 = 8,
    Mmc5Square2 = 9,
    N163Ch1 = 11,
    N163Ch2 = 12,
    N163Ch3 = 13,
    N163Ch4 = 14,
    N163Ch5 = 15,
    N163Ch6 = 16,
    N163Ch7 = 17,
    N163Ch8 = 18,
    Fds = 19,
    Vrc7Ch1 = 20,
    Vrc7Ch2 = 21,
    Vrc7Ch3 = 22,
    Vrc7Ch4 = 23,
    Vrc7Ch5 = 24,
    Vrc7Ch6 = 25,
    S5BCh1 = 26,
    S5BCh2 = 27,
    S5BCh3 = 28,
}

impl ChannelId {
    /// The chip this channel belongs to
    pub const fn chip(self) -> SoundChip {
        use ChannelId::*;

        match self {
            Square1 | Square2 | Triangle | Noise | Dpcm => SoundChip::Apu2A03,
            Vrc6Pulse1 | Vrc6Pulse2 | Vrc6Sawtooth => SoundChip::Vrc6,
            Mmc5Square1 | Mmc5Square2 => SoundChip::Mmc5,
            N163Ch1 | N163Ch2 | N163Ch3 | N163Ch4 | N163Ch5 | N163Ch6 | N163Ch7 | N163Ch8 => {
                SoundChip::N163
            }
            Fds => SoundChip::Fds,
            Vrc7Ch1 | Vrc7Ch2 | Vrc7Ch3 | Vrc7Ch4 | Vrc7Ch5 | Vrc7Ch6 => SoundChip::Vrc7,
            S5BCh1 | S5BCh2 | S5BCh3 => SoundChip::S5B,
        }
    }

    /// The position of this channel within its chip
    pub fn subindex(self) -> usize {
        self.chip()
            .channels()
            .iter()
            .position(|id| *id == self)
            .unwrap_or_default()
    }
}

impl From<ChannelId> for u8 {
    fn from(id: ChannelId) -> Self {
        id as u8
    }
}

impl TryFrom<u8> for ChannelId {
    type Error = UnknownChannelId;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        SoundChip::ALL
            .iter()
            .flat_map(|chip| chip.channels())
            .find(|id| **id as u8 == value)
            .copied()
            .ok_or(UnknownChannelId { id: value })
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ChannelId::*;

        let name = match self {
            Square1 => "Pulse 1",
            Square2 => "Pulse 2",
            Triangle => "Triangle",
            Noise => "Noise",
            Dpcm => "DPCM",
            Vrc6Pulse1 => "VRC6 Pulse 1",
            Vrc6Pulse2 => "VRC6 Pulse 2",
            Vrc6Sawtooth => "Sawtooth",
            Mmc5Square1 => "MMC5 Pulse 1",
            Mmc5Square2 => "MMC5 Pulse 2",
            Fds => "FDS",
            id => {
                return write!(f, "{} {}", id.chip().name(), id.subindex() + 1);
            }
        };

        write!(f, "{name}")
    }
}

/// A byte that doesn't identify any channel
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown channel id {id}")]
pub struct UnknownChannelId {
    pub id: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion_flags() {
        let chips = SoundChipSet::from_expansion_flags(0x11).unwrap();
        assert!(chips.contains_chip(SoundChip::Apu2A03));
        assert!(chips.contains_chip(SoundChip::Vrc6));
        assert!(chips.contains_chip(SoundChip::N163));
        assert!(!chips.contains_chip(SoundChip::Fds));
        assert_eq!(chips.expansion_count(), 2);
        assert_eq!(chips, SoundChipSet::VRC6 | SoundChipSet::N163);
        assert_eq!(SoundChipSet::all().expansion_flags(), 0x3F);

        assert_eq!(
            SoundChipSet::from_expansion_flags(0x40),
            Err(UnknownChipFlags { flags: 0x40 })
        );
    }

    #[test]
    fn canonical_order() {
        let chips: SoundChipSet = [SoundChip::S5B, SoundChip::Vrc6, SoundChip::Fds]
            .into_iter()
            .collect();

        let order: Vec<_> = chips.iter_chips().collect();
        assert_eq!(
            order,
            [
                SoundChip::Apu2A03,
                SoundChip::Vrc6,
                SoundChip::Fds,
                SoundChip::S5B
            ]
        );
        assert_eq!(chips.to_string(), "2A03 + VRC6 + FDS + 5B");

        let chips = chips.without(SoundChip::Vrc6).without(SoundChip::Apu2A03);
        assert_eq!(chips.expansions().collect::<Vec<_>>(), [SoundChip::Fds, SoundChip::S5B]);
    }

    #[test]
    fn channel_ids() {
        for chip in SoundChip::ALL {
            for (index, id) in chip.channels().iter().enumerate() {
                assert_eq!(id.chip(), chip);
                assert_eq!(id.subindex(), index);
                assert_eq!(ChannelId::try_from(u8::from(*id)), Ok(*id));
            }
        }

        assert_eq!(ChannelId::try_from(10), Err(UnknownChannelId { id: 10 }));
        assert_eq!(ChannelId::N163Ch3.to_string(), "N163 3");
        assert_eq!(ChannelId::Vrc6Sawtooth.to_string(), "Sawtooth");
    }
}
