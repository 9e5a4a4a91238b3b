//! The registry of active channels for a chip configuration

use crate::chip::{ChannelId, SoundChip, SoundChipSet};
use thiserror::Error;

/// Something that plays on a single channel
///
/// Anything that knows its [`ChannelId`] can be registered in a [`ChannelMap`]. A bare
/// [`ChannelId`] is a channel too, which is handy when only the layout matters.
pub trait TrackerChannel {
    /// The id of the channel this object drives
    fn id(&self) -> ChannelId;
}

impl TrackerChannel for ChannelId {
    fn id(&self) -> ChannelId {
        *self
    }
}

/// Translates between channel ids, sequential channel indices and channel objects
///
/// The map is built for a set of chips and an N163 channel count. It works out which
/// channels those chips provide, in canonical order: 2A03, VRC6, MMC5, N163, FDS, VRC7
/// and 5B. Every one of those channels must be registered exactly once.
///
/// ```
/// # use famidoc::{channel_map::ChannelMap, chip::{ChannelId, SoundChip, SoundChipSet}};
/// let chips = SoundChipSet::new().with(SoundChip::Vrc6);
/// let map = ChannelMap::from_chips(chips, 0)?;
///
/// assert_eq!(map.channel_count(), 8);
/// assert_eq!(map.channel_index(ChannelId::Vrc6Pulse1), Some(5));
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMap<C> {
    channels: Vec<C>,
    chips: SoundChipSet,
    n163_channels: usize,
}

impl<C> ChannelMap<C>
where
    C: TrackerChannel,
{
    /// The maximum number of N163 channels
    pub const MAX_N163_CHANNELS: usize = 8;

    /// Build a map for a chip configuration and register the channel objects that go with it
    ///
    /// `n163_channels` is only looked at if the N163 is part of `chips`, in which case it has to
    /// be in `1..=8`. The channels may be passed in any order; they are stored in canonical order.
    pub fn new<I>(
        chips: SoundChipSet,
        n163_channels: usize,
        channels: I,
    ) -> Result<Self, ChannelMapError>
    where
        I: IntoIterator<Item = C>,
    {
        let n163_channels = if chips.contains_chip(SoundChip::N163) {
            if !(1..=Self::MAX_N163_CHANNELS).contains(&n163_channels) {
                return Err(ChannelMapError::InvalidN163ChannelCount {
                    count: n163_channels,
                });
            }
            n163_channels
        } else {
            0
        };

        let order = expected_channels(chips, n163_channels);
        let mut slots: Vec<Option<C>> = order.iter().map(|_| None).collect();

        for channel in channels {
            let id = channel.id();
            let index = order
                .iter()
                .position(|expected| *expected == id)
                .ok_or(ChannelMapError::Unsupported { id })?;

            if slots[index].is_some() {
                return Err(ChannelMapError::Duplicate { id });
            }
            slots[index] = Some(channel);
        }

        let registered = slots.iter().filter(|slot| slot.is_some()).count();
        let channels: Option<Vec<C>> = slots.into_iter().collect();

        match channels {
            Some(channels) => Ok(Self {
                channels,
                chips,
                n163_channels,
            }),
            None => Err(ChannelMapError::CountMismatch {
                expected: order.len(),
                registered,
            }),
        }
    }

    /// The number of registered channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Retrieve a channel by its sequential index
    pub fn channel(&self, index: usize) -> Option<&C> {
        self.channels.get(index)
    }

    /// Retrieve a channel by its sequential index for modification
    pub fn channel_mut(&mut self, index: usize) -> Option<&mut C> {
        self.channels.get_mut(index)
    }

    /// Retrieve the channel registered for an id
    pub fn find_channel(&self, id: ChannelId) -> Option<&C> {
        self.channel(self.channel_index(id)?)
    }

    /// The sequential index of a channel id
    pub fn channel_index(&self, id: ChannelId) -> Option<usize> {
        self.channels.iter().position(|channel| channel.id() == id)
    }

    /// Is a channel with this id registered?
    pub fn has_channel(&self, id: ChannelId) -> bool {
        self.channel_index(id).is_some()
    }

    /// Would this channel object belong in the map?
    pub fn supports_channel(&self, channel: &C) -> bool {
        self.has_channel(channel.id())
    }

    /// The id of the channel at a sequential index
    pub fn channel_type(&self, index: usize) -> Option<ChannelId> {
        self.channel(index).map(TrackerChannel::id)
    }

    /// The chip of the channel at a sequential index
    pub fn chip_type(&self, index: usize) -> Option<SoundChip> {
        self.channel_type(index).map(ChannelId::chip)
    }

    /// The chips this map was built for
    pub fn expansion_chips(&self) -> SoundChipSet {
        self.chips
    }

    /// Is a chip part of the configuration?
    pub fn has_expansion_chip(&self, chip: SoundChip) -> bool {
        self.chips.contains_chip(chip)
    }

    /// The number of channels a chip contributes, or 0 if it isn't active
    pub fn chip_channel_count(&self, chip: SoundChip) -> usize {
        match chip {
            _ if !self.chips.contains_chip(chip) => 0,
            SoundChip::N163 => self.n163_channels,
            chip => chip.channels().len(),
        }
    }

    /// Iterate over the channel ids in registration order
    pub fn channel_types(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.channels.iter().map(TrackerChannel::id)
    }

    /// Call `f` with every channel id in registration order
    pub fn for_each_channel<F>(&self, f: F)
    where
        F: FnMut(ChannelId),
    {
        self.channel_types().for_each(f)
    }

    /// Iterate over the registered channel objects
    pub fn iter(&self) -> impl Iterator<Item = &C> {
        self.channels.iter()
    }
}

impl ChannelMap<ChannelId> {
    /// Build a map that registers the bare channel ids of a chip configuration
    pub fn from_chips(chips: SoundChipSet, n163_channels: usize) -> Result<Self, ChannelMapError> {
        let n163 = if chips.contains_chip(SoundChip::N163) {
            n163_channels
        } else {
            0
        };

        let channels = expected_channels(chips, n163.min(Self::MAX_N163_CHANNELS));
        Self::new(chips, n163_channels, channels)
    }
}

impl Default for ChannelMap<ChannelId> {
    /// The five channels of the 2A03
    fn default() -> Self {
        Self {
            channels: SoundChip::Apu2A03.channels().to_vec(),
            chips: SoundChipSet::new(),
            n163_channels: 0,
        }
    }
}

/// The channels a chip configuration provides, in canonical order
pub fn expected_channels(chips: SoundChipSet, n163_channels: usize) -> Vec<ChannelId> {
    chips
        .iter_chips()
        .flat_map(|chip| match chip {
            SoundChip::N163 => &chip.channels()[..n163_channels.min(chip.channels().len())],
            chip => chip.channels(),
        })
        .copied()
        .collect()
}

/// Errors that might be returned from [`ChannelMap::new()`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelMapError {
    /// The N163 must have between 1 and 8 channels
    #[error("{count} is not a valid number of N163 channels")]
    InvalidN163ChannelCount { count: usize },

    /// A channel was registered that the chip configuration doesn't provide
    #[error("Channel {id} is not provided by the active chips")]
    Unsupported { id: ChannelId },

    /// A channel was registered twice
    #[error("Channel {id} was registered more than once")]
    Duplicate { id: ChannelId },

    /// Not every channel of the configuration was registered
    #[error("Expected {expected} channels, but {registered} were registered")]
    CountMismatch { expected: usize, registered: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Channel {
        id: ChannelId,
        volume: u8,
    }

    impl TrackerChannel for Channel {
        fn id(&self) -> ChannelId {
            self.id
        }
    }

    #[test]
    fn default_layout() {
        let map = ChannelMap::default();
        assert_eq!(map.channel_count(), 5);
        assert_eq!(map.expansion_chips(), SoundChipSet::new());
        assert_eq!(map.channel_types().collect::<Vec<_>>(), SoundChip::Apu2A03.channels());
    }

    #[test]
    fn two_chips() {
        let chips = SoundChipSet::new().with(SoundChip::Vrc6);
        let map = ChannelMap::from_chips(chips, 0).unwrap();

        assert_eq!(map.channel_count(), 8);
        assert_eq!(map.channel_type(0), Some(ChannelId::Square1));
        assert_eq!(map.channel_type(4), Some(ChannelId::Dpcm));
        assert_eq!(map.channel_type(5), Some(ChannelId::Vrc6Pulse1));
        assert_eq!(map.channel_type(7), Some(ChannelId::Vrc6Sawtooth));
        assert_eq!(map.channel_type(8), None);

        assert_eq!(map.chip_type(6), Some(SoundChip::Vrc6));
        assert_eq!(map.chip_channel_count(SoundChip::Apu2A03), 5);
        assert_eq!(map.chip_channel_count(SoundChip::Vrc6), 3);
        assert_eq!(map.chip_channel_count(SoundChip::Fds), 0);
        assert!(!map.has_channel(ChannelId::Fds));
        assert!(map.has_expansion_chip(SoundChip::Vrc6));
    }

    #[test]
    fn n163_channel_count() {
        let chips = SoundChipSet::new()
            .with(SoundChip::N163)
            .with(SoundChip::S5B);
        let map = ChannelMap::from_chips(chips, 3).unwrap();

        assert_eq!(map.channel_count(), 5 + 3 + 3);
        assert_eq!(map.chip_channel_count(SoundChip::N163), 3);
        assert!(map.has_channel(ChannelId::N163Ch3));
        assert!(!map.has_channel(ChannelId::N163Ch4));
        assert_eq!(map.channel_index(ChannelId::S5BCh1), Some(8));

        assert_eq!(
            ChannelMap::from_chips(chips, 0).unwrap_err(),
            ChannelMapError::InvalidN163ChannelCount { count: 0 }
        );
        assert_eq!(
            ChannelMap::from_chips(chips, 9).unwrap_err(),
            ChannelMapError::InvalidN163ChannelCount { count: 9 }
        );

        // Without the N163 the count is ignored
        let map = ChannelMap::from_chips(SoundChipSet::new(), 9).unwrap();
        assert_eq!(map.channel_count(), 5);
    }

    #[test]
    fn registration() {
        let chips = SoundChipSet::new().with(SoundChip::Fds);
        let channels = [
            ChannelId::Fds,
            ChannelId::Dpcm,
            ChannelId::Noise,
            ChannelId::Triangle,
            ChannelId::Square2,
            ChannelId::Square1,
        ]
        .into_iter()
        .enumerate()
        .map(|(volume, id)| Channel {
            id,
            volume: volume as u8,
        });

        let map = ChannelMap::new(chips, 0, channels).unwrap();
        let order: Vec<_> = map.channel_types().collect();
        assert_eq!(
            order,
            [
                ChannelId::Square1,
                ChannelId::Square2,
                ChannelId::Triangle,
                ChannelId::Noise,
                ChannelId::Dpcm,
                ChannelId::Fds
            ]
        );

        assert_eq!(map.find_channel(ChannelId::Fds).map(|c| c.volume), Some(0));
        assert_eq!(map.channel(0).map(|c| c.volume), Some(5));
        assert!(map.supports_channel(&Channel {
            id: ChannelId::Noise,
            volume: 0
        }));

        let mut visited = Vec::new();
        map.for_each_channel(|id| visited.push(id));
        assert_eq!(visited, order);
    }

    #[test]
    fn registration_errors() {
        let chips = SoundChipSet::new();

        assert_eq!(
            ChannelMap::new(chips, 0, [ChannelId::Fds]).unwrap_err(),
            ChannelMapError::Unsupported { id: ChannelId::Fds }
        );

        assert_eq!(
            ChannelMap::new(chips, 0, [ChannelId::Noise, ChannelId::Noise]).unwrap_err(),
            ChannelMapError::Duplicate {
                id: ChannelId::Noise
            }
        );

        assert_eq!(
            ChannelMap::new(chips, 0, [ChannelId::Square1, ChannelId::Square2]).unwrap_err(),
            ChannelMapError::CountMismatch {
                expected: 5,
                registered: 2
            }
        );
    }
}
