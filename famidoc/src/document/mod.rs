//! Modules: everything a song file holds, and how it is stored
//!
//! A [`Document`] owns the module's parameters, tracks, instruments, sequences and grooves.
//! Editors borrow it and commit their changes through its mutators.
//!
//! ```no_run
//! # use famidoc::document::Document;
//! let mut document = Document::from_path("song.ftm")?;
//! println!("{} tracks", document.tracks().len());
//!
//! if let Some(track) = document.track_mut(0) {
//!     track.set_speed(4);
//! }
//! document.to_path("song.ftm")?;
//! # Ok::<(), anyhow::Error>(())
//! ```

mod blocks;
mod container;
mod error;
mod field;

pub use container::{Block, FILE_VERSION, MIN_FILE_VERSION, read_blocks, write_blocks};
pub use error::{FromPathError, ModuleError, assert_range};
pub use field::{Compatibility, FieldReader, FieldWriter};

use crate::{
    channel_map::{ChannelMap, ChannelMapError},
    chip::{ChannelId, SoundChip, SoundChipSet},
    groove::GrooveTable,
    instrument::{Instrument, SequenceBank},
    name::Name,
};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, Read, Write},
    path::Path,
};
use thiserror::Error;

/// The title of a track
pub type TrackTitle = Name<63>;

/// The TV system a module is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Machine {
    #[default]
    Ntsc,
    Pal,
}

/// How vibrato effects bend the pitch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VibratoStyle {
    /// Vibrato only bends the pitch upwards
    Old,
    #[default]
    New,
}

/// The row highlight intervals of the pattern editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlight {
    pub first: u8,
    pub second: u8,
}

impl Default for Highlight {
    fn default() -> Self {
        Self {
            first: 4,
            second: 16,
        }
    }
}

/// A single song within a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub title: TrackTitle,
    speed: u8,
    tempo: u8,
    rows: u16,
    uses_groove: bool,
    effect_columns: Vec<u8>,
}

impl Track {
    pub const DEFAULT_SPEED: u8 = 6;
    pub const DEFAULT_TEMPO: u8 = 150;
    pub const DEFAULT_ROWS: u16 = 64;

    pub const MIN_TEMPO: u8 = 21;
    pub const MAX_ROWS: u16 = 256;
    pub const MAX_EFFECT_COLUMNS: u8 = 4;

    /// Construct a track with default settings for a number of channels
    pub fn new(channels: usize) -> Self {
        Self {
            title: TrackTitle::default(),
            speed: Self::DEFAULT_SPEED,
            tempo: Self::DEFAULT_TEMPO,
            rows: Self::DEFAULT_ROWS,
            uses_groove: false,
            effect_columns: vec![1; channels],
        }
    }

    /// The speed, or the groove index if the track plays a groove
    pub fn speed(&self) -> u8 {
        self.speed
    }

    /// Play at a fixed speed; refused for a speed of 0
    pub fn set_speed(&mut self, speed: u8) -> bool {
        if speed == 0 {
            return false;
        }

        self.speed = speed;
        self.uses_groove = false;
        true
    }

    /// The groove this track plays, if any
    pub fn groove(&self) -> Option<usize> {
        self.uses_groove.then_some(self.speed as usize)
    }

    /// Play a groove instead of a fixed speed; refused for indices past the groove table
    pub fn set_groove(&mut self, index: usize) -> bool {
        if index >= GrooveTable::SLOTS {
            return false;
        }

        self.speed = index as u8;
        self.uses_groove = true;
        true
    }

    /// Stop playing a groove and fall back to the default speed
    pub fn clear_groove(&mut self) {
        self.speed = Self::DEFAULT_SPEED;
        self.uses_groove = false;
    }

    pub fn tempo(&self) -> u8 {
        self.tempo
    }

    pub fn set_tempo(&mut self, tempo: u8) -> bool {
        if tempo < Self::MIN_TEMPO {
            return false;
        }

        self.tempo = tempo;
        true
    }

    /// The number of rows in each pattern
    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn set_rows(&mut self, rows: u16) -> bool {
        if !(1..=Self::MAX_ROWS).contains(&rows) {
            return false;
        }

        self.rows = rows;
        true
    }

    /// The number of effect columns shown for a channel
    pub fn effect_columns(&self, channel: usize) -> Option<u8> {
        self.effect_columns.get(channel).copied()
    }

    pub fn set_effect_columns(&mut self, channel: usize, count: u8) -> bool {
        if !(1..=Self::MAX_EFFECT_COLUMNS).contains(&count) {
            return false;
        }

        match self.effect_columns.get_mut(channel) {
            Some(columns) => {
                *columns = count;
                true
            }
            None => false,
        }
    }
}

/// A complete module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    channels: ChannelMap<ChannelId>,

    /// The TV system
    pub machine: Machine,

    /// The engine refresh rate in Hz, or 0 for the machine's default
    pub engine_speed: u16,

    /// How vibrato bends the pitch
    pub vibrato: VibratoStyle,

    /// The row highlights of the pattern editor
    pub highlight: Highlight,

    /// Speed effects below this value set the speed, the others set the tempo
    pub speed_split: u8,

    tracks: Vec<Track>,
    instruments: BTreeMap<u8, Instrument>,
    sequences: SequenceBank,
    grooves: GrooveTable,
}

impl Document {
    /// The maximum number of tracks
    pub const MAX_TRACKS: usize = 64;

    /// The maximum number of instruments
    pub const MAX_INSTRUMENTS: usize = 64;

    /// The highest engine speed in Hz
    pub const MAX_ENGINE_SPEED: u16 = 800;

    pub const DEFAULT_SPEED_SPLIT: u8 = 32;

    /// Construct an empty 2A03 module with a single track
    pub fn new() -> Self {
        let channels = ChannelMap::default();

        Self {
            tracks: vec![Track::new(channels.channel_count())],
            channels,
            machine: Machine::default(),
            engine_speed: 0,
            vibrato: VibratoStyle::default(),
            highlight: Highlight::default(),
            speed_split: Self::DEFAULT_SPEED_SPLIT,
            instruments: BTreeMap::new(),
            sequences: SequenceBank::new(),
            grooves: GrooveTable::new(),
        }
    }

    /// Deserialize a module from an arbitrary I/O reader
    ///
    /// Values outside of the official tracker's limits are accepted with a warning.
    pub fn from_reader<R>(reader: R) -> Result<Self, ModuleError>
    where
        R: Read,
    {
        Self::from_reader_with(reader, Compatibility::default())
    }

    /// Deserialize a module, choosing how strictly official limits are enforced
    pub fn from_reader_with<R>(reader: R, compatibility: Compatibility) -> Result<Self, ModuleError>
    where
        R: Read,
    {
        let (_, blocks) = read_blocks(reader)?;
        blocks::load(&blocks, compatibility)
    }

    /// Deserialize a module from a path on disk
    pub fn from_path<P>(path: P) -> Result<Self, FromPathError>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path)?;
        Ok(Self::from_reader(io::BufReader::new(file))?)
    }

    /// Serialize the module to an arbitrary I/O writer
    pub fn to_writer<W>(&self, writer: W) -> io::Result<()>
    where
        W: Write,
    {
        write_blocks(writer, &blocks::store(self)?)
    }

    /// Serialize the module to a path on disk
    pub fn to_path<P>(&self, path: P) -> io::Result<()>
    where
        P: AsRef<Path>,
    {
        self.to_writer(File::create(path)?)
    }

    /// The channels of the module, in canonical order
    pub fn channel_map(&self) -> &ChannelMap<ChannelId> {
        &self.channels
    }

    /// The chips the module is written for
    pub fn chips(&self) -> SoundChipSet {
        self.channels.expansion_chips()
    }

    /// The number of N163 channels, or 0 without the N163
    pub fn n163_channels(&self) -> usize {
        self.channels.chip_channel_count(SoundChip::N163)
    }

    /// Change the chip configuration
    ///
    /// Effect column counts are kept for channels present before and after the change.
    pub fn set_chips(
        &mut self,
        chips: SoundChipSet,
        n163_channels: usize,
    ) -> Result<(), DocumentError> {
        let channels = ChannelMap::from_chips(chips, n163_channels)?;

        for track in &mut self.tracks {
            track.effect_columns = channels
                .channel_types()
                .map(|id| {
                    self.channels
                        .channel_index(id)
                        .and_then(|index| track.effect_columns(index))
                        .unwrap_or(1)
                })
                .collect();
        }

        self.channels = channels;
        Ok(())
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn track_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    /// Append a track with default settings, if there's room for one
    pub fn add_track(&mut self) -> Option<&mut Track> {
        if self.tracks.len() >= Self::MAX_TRACKS {
            return None;
        }

        self.tracks.push(Track::new(self.channels.channel_count()));
        self.tracks.last_mut()
    }

    /// Remove a track; the last remaining track can't be removed
    pub fn remove_track(&mut self, index: usize) -> Option<Track> {
        if self.tracks.len() <= 1 || index >= self.tracks.len() {
            return None;
        }

        Some(self.tracks.remove(index))
    }

    pub fn instrument(&self, index: u8) -> Option<&Instrument> {
        self.instruments.get(&index)
    }

    pub fn instrument_mut(&mut self, index: u8) -> Option<&mut Instrument> {
        self.instruments.get_mut(&index)
    }

    /// Iterate over the instruments and their indices, in order
    pub fn instruments(&self) -> impl Iterator<Item = (u8, &Instrument)> {
        self.instruments
            .iter()
            .map(|(index, instrument)| (*index, instrument))
    }

    pub fn instrument_count(&self) -> usize {
        self.instruments.len()
    }

    /// The lowest index not holding an instrument
    pub fn first_free_instrument(&self) -> Option<u8> {
        (0..Self::MAX_INSTRUMENTS as u8).find(|index| !self.instruments.contains_key(index))
    }

    /// Put an instrument at an index, returning the one it replaced
    pub fn insert_instrument(
        &mut self,
        index: u8,
        instrument: Instrument,
    ) -> Result<Option<Instrument>, DocumentError> {
        if index as usize >= Self::MAX_INSTRUMENTS {
            return Err(DocumentError::InstrumentIndexOutOfRange { index });
        }

        Ok(self.instruments.insert(index, instrument))
    }

    /// Put an instrument at the first free index, returning that index
    pub fn add_instrument(&mut self, instrument: Instrument) -> Option<u8> {
        let index = self.first_free_instrument()?;
        self.instruments.insert(index, instrument);
        Some(index)
    }

    pub fn remove_instrument(&mut self, index: u8) -> Option<Instrument> {
        self.instruments.remove(&index)
    }

    pub fn sequences(&self) -> &SequenceBank {
        &self.sequences
    }

    pub fn sequences_mut(&mut self) -> &mut SequenceBank {
        &mut self.sequences
    }

    pub fn grooves(&self) -> &GrooveTable {
        &self.grooves
    }

    /// Edit the grooves in place
    ///
    /// Nothing is checked here; prefer [`Document::set_grooves()`] to commit edits.
    pub fn grooves_mut(&mut self) -> &mut GrooveTable {
        &mut self.grooves
    }

    /// Replace the groove table
    ///
    /// A table that doesn't fit the driver's groove bank is refused. Tracks that played a groove
    /// that is now empty fall back to the default speed.
    pub fn set_grooves(&mut self, grooves: GrooveTable) -> Result<(), DocumentError> {
        let size = grooves.total_compiled_size();
        if size > GrooveTable::BANK_BUDGET {
            return Err(DocumentError::GrooveBankFull { size });
        }

        for track in &mut self.tracks {
            if let Some(index) = track.groove() {
                if !grooves.is_used(index) {
                    track.clear_groove();
                }
            }
        }

        self.grooves = grooves;
        Ok(())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can result from editing a [`Document`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    /// The chip configuration doesn't produce a valid channel layout
    #[error("Invalid channel configuration")]
    Channels(#[from] ChannelMapError),

    #[error("Instrument index {index} is out of range")]
    InstrumentIndexOutOfRange { index: u8 },

    /// The grooves would take up more than the driver's groove bank
    #[error("The grooves take up {size} bytes, which does not fit the groove bank")]
    GrooveBankFull { size: usize },
}
