//! Wave-table instruments for the N163

use super::{InstrumentKind, SeqInstrument};
use crate::document::{FieldReader, FieldWriter, ModuleError};
use std::io::{self, Read, Write};
use ux::u4;

/// A single sample of an N163 wave
///
/// The N163 plays back 4-bit samples, ranging from 0 to 15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WaveSample(u4);

impl WaveSample {
    /// The lowest sample value
    pub const MIN: Self = Self(u4::new(0x0));

    /// The highest sample value
    pub const MAX: Self = Self(u4::new(0xF));

    /// Construct a sample, if the value fits in four bits
    pub fn new(value: u8) -> Option<Self> {
        (value <= 0xF).then(|| Self(u4::new(value)))
    }
}

impl From<u4> for WaveSample {
    fn from(value: u4) -> Self {
        Self(value)
    }
}

impl From<WaveSample> for u8 {
    fn from(sample: WaveSample) -> Self {
        u8::from(sample.0)
    }
}

/// A single wave of samples
pub type Wave = [WaveSample; N163Instrument::MAX_WAVE_SIZE];

/// An N163 instrument: sequences plus a bank of waves in the chip's sample RAM
///
/// The instrument holds `wave_count` waves of `wave_size` samples each. The player copies the
/// selected wave into sample RAM at `wave_pos`, so the position has to leave room for a full
/// wave; every mutator keeps `wave_pos + wave_size <= MAX_WAVE_SIZE`.
///
/// ```
/// # use famidoc::instrument::N163Instrument;
/// let mut instrument = N163Instrument::new();
/// assert!(instrument.set_wave_size(200));
///
/// instrument.set_wave_pos(100);
/// assert_eq!(instrument.wave_pos(), 40);
/// ```
#[derive(Debug, Clone)]
pub struct N163Instrument {
    base: SeqInstrument,
    samples: Box<[Wave; N163Instrument::MAX_WAVE_COUNT]>,
    wave_size: usize,
    wave_pos: usize,
    wave_count: usize,
}

impl N163Instrument {
    /// The number of samples that fit in sample RAM
    pub const MAX_WAVE_SIZE: usize = 240;

    /// The maximum number of waves in one instrument
    pub const MAX_WAVE_COUNT: usize = 64;

    /// The smallest wave size
    pub const MIN_WAVE_SIZE: usize = 4;

    /// The highest wave position the official tracker accepts
    pub const OFFICIAL_MAX_WAVE_POS: usize = 0x7F;

    /// The highest wave count the official tracker accepts
    pub const OFFICIAL_MAX_WAVE_COUNT: usize = 0x10;

    const DEFAULT_WAVE_SIZE: usize = 32;

    /// Construct an instrument holding a single 32-sample triangle wave
    pub fn new() -> Self {
        let mut samples = Box::new([[WaveSample::MIN; Self::MAX_WAVE_SIZE]; Self::MAX_WAVE_COUNT]);

        let half = Self::DEFAULT_WAVE_SIZE / 2;
        for index in 0..Self::DEFAULT_WAVE_SIZE {
            let value = if index < half {
                index
            } else {
                Self::DEFAULT_WAVE_SIZE - 1 - index
            };
            samples[0][index] = WaveSample(u4::new(value as u8));
        }

        Self {
            base: SeqInstrument::new(InstrumentKind::N163),
            samples,
            wave_size: Self::DEFAULT_WAVE_SIZE,
            wave_pos: 0,
            wave_count: 1,
        }
    }

    pub fn base(&self) -> &SeqInstrument {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut SeqInstrument {
        &mut self.base
    }

    pub fn wave_size(&self) -> usize {
        self.wave_size
    }

    /// Change the number of samples per wave
    ///
    /// Sizes outside of `4..=240` are refused. The position is clamped again afterwards.
    pub fn set_wave_size(&mut self, size: usize) -> bool {
        if !(Self::MIN_WAVE_SIZE..=Self::MAX_WAVE_SIZE).contains(&size) {
            return false;
        }

        self.wave_size = size;
        self.set_wave_pos(self.wave_pos);
        true
    }

    pub fn wave_pos(&self) -> usize {
        self.wave_pos
    }

    /// Move the wave in sample RAM, clamping so the whole wave still fits
    pub fn set_wave_pos(&mut self, pos: usize) {
        self.wave_pos = pos.min(Self::MAX_WAVE_SIZE - self.wave_size);
    }

    pub fn wave_count(&self) -> usize {
        self.wave_count
    }

    /// Change the number of waves; counts outside of `1..=64` are refused
    pub fn set_wave_count(&mut self, count: usize) -> bool {
        if !(1..=Self::MAX_WAVE_COUNT).contains(&count) {
            return false;
        }

        self.wave_count = count;
        true
    }

    /// Retrieve a sample from the full grid
    pub fn sample(&self, wave: usize, index: usize) -> Option<WaveSample> {
        self.samples.get(wave)?.get(index).copied()
    }

    /// Change a sample in the full grid; refused for positions outside of it
    pub fn set_sample(&mut self, wave: usize, index: usize, sample: WaveSample) -> bool {
        match self.samples.get_mut(wave).and_then(|wave| wave.get_mut(index)) {
            Some(slot) => {
                *slot = sample;
                true
            }
            None => false,
        }
    }

    /// The samples of a wave that are in use
    pub fn wave(&self, wave: usize) -> Option<&[WaveSample]> {
        if wave >= self.wave_count {
            return None;
        }

        Some(&self.samples[wave][..self.wave_size])
    }

    /// Insert an empty wave at `index`, moving later waves up
    pub fn insert_new_wave(&mut self, index: usize) -> bool {
        if self.wave_count >= Self::MAX_WAVE_COUNT
            || index > self.wave_count
            || index >= Self::MAX_WAVE_COUNT
        {
            return false;
        }

        self.samples.copy_within(index..self.wave_count, index + 1);
        self.samples[index] = [WaveSample::MIN; Self::MAX_WAVE_SIZE];
        self.wave_count += 1;
        true
    }

    /// Remove the wave at `index`, moving later waves down
    pub fn remove_wave(&mut self, index: usize) -> bool {
        if self.wave_count <= 1 || index >= self.wave_count {
            return false;
        }

        self.samples.copy_within(index + 1..self.wave_count, index);
        self.wave_count -= 1;
        true
    }

    /// Do both instruments hold the same waves?
    ///
    /// Only the waves and samples in use are compared.
    pub fn is_wave_equal(&self, other: &Self) -> bool {
        self.wave_count == other.wave_count
            && self.wave_size == other.wave_size
            && (0..self.wave_count).all(|wave| self.wave(wave) == other.wave(wave))
    }

    pub(crate) fn store<W: Write>(&self, writer: &mut FieldWriter<W>) -> io::Result<()> {
        self.base.store(writer)?;
        self.store_waves(writer)
    }

    /// Write the wave block, without the auto-position flag
    pub(crate) fn store_waves<W: Write>(&self, writer: &mut FieldWriter<W>) -> io::Result<()> {
        writer.write_int(self.wave_size as i32)?;
        writer.write_int(self.wave_pos as i32)?;
        writer.write_int(self.wave_count as i32)?;

        for wave in 0..self.wave_count {
            for sample in &self.samples[wave][..self.wave_size] {
                writer.write_char(u8::from(*sample) as i8)?;
            }
        }

        Ok(())
    }

    pub(crate) fn load<R: Read>(
        reader: &mut FieldReader<R>,
        has_auto_pos: bool,
    ) -> Result<Self, ModuleError> {
        let base = SeqInstrument::load(InstrumentKind::N163, reader)?;
        let mut instrument = Self::load_waves(reader, has_auto_pos)?;
        instrument.base = base;
        Ok(instrument)
    }

    /// Read the wave block
    ///
    /// `has_auto_pos` says whether the auto-position flag is present. It is read and dropped.
    pub(crate) fn load_waves<R: Read>(
        reader: &mut FieldReader<R>,
        has_auto_pos: bool,
    ) -> Result<Self, ModuleError> {
        let mut instrument = Self::new();

        let size = reader.read_int_range(
            Self::MIN_WAVE_SIZE as i32,
            Self::MAX_WAVE_SIZE as i32,
            "N163 wave size",
        )?;

        let pos = reader.read_int_range(
            0,
            (Self::MAX_WAVE_SIZE - 1) as i32,
            "N163 wave position",
        )?;
        reader.check_official(pos, 0, Self::OFFICIAL_MAX_WAVE_POS as i32, "N163 wave position")?;

        if has_auto_pos {
            reader.read_int()?;
        }

        let count =
            reader.read_int_range(1, Self::MAX_WAVE_COUNT as i32, "N163 wave count")?;
        reader.check_official(
            count,
            1,
            Self::OFFICIAL_MAX_WAVE_COUNT as i32,
            "N163 wave count",
        )?;

        instrument.wave_size = size as usize;
        instrument.wave_count = count as usize;
        instrument.samples[0] = [WaveSample::MIN; Self::MAX_WAVE_SIZE];

        for wave in 0..instrument.wave_count {
            for index in 0..instrument.wave_size {
                let value = reader
                    .read_char_range(0, 0xF, "N163 wave sample")
                    .map_err(|error| error.context(format!("At wave {wave}, sample {index}")))?;
                instrument.samples[wave][index] = WaveSample(u4::new(value as u8));
            }
        }

        instrument.set_wave_pos(pos as usize);
        Ok(instrument)
    }
}

impl Default for N163Instrument {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for N163Instrument {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base && self.wave_pos == other.wave_pos && self.is_wave_equal(other)
    }
}

impl Eq for N163Instrument {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Compatibility;

    fn sample(value: u8) -> WaveSample {
        WaveSample::new(value).unwrap()
    }

    fn fill_wave(instrument: &mut N163Instrument, wave: usize, value: u8) {
        for index in 0..N163Instrument::MAX_WAVE_SIZE {
            instrument.set_sample(wave, index, sample(value));
        }
    }

    #[test]
    fn default_triangle() {
        let instrument = N163Instrument::new();
        assert_eq!(instrument.wave_size(), 32);
        assert_eq!(instrument.wave_count(), 1);
        assert_eq!(instrument.wave_pos(), 0);

        let wave: Vec<u8> = instrument.wave(0).unwrap().iter().map(|s| u8::from(*s)).collect();
        let expected: Vec<u8> = (0..16).chain((0..16).rev()).collect();
        assert_eq!(wave, expected);
    }

    #[test]
    fn wave_pos_clamp() {
        let mut instrument = N163Instrument::new();
        assert!(instrument.set_wave_size(200));
        instrument.set_wave_pos(100);
        assert_eq!(instrument.wave_pos(), 40);

        instrument.set_wave_pos(10);
        assert_eq!(instrument.wave_pos(), 10);

        // Growing the wave pulls the position back
        assert!(instrument.set_wave_size(240));
        assert_eq!(instrument.wave_pos(), 0);

        assert!(!instrument.set_wave_size(3));
        assert!(!instrument.set_wave_size(241));
        assert_eq!(instrument.wave_size(), 240);
    }

    #[test]
    fn wave_count() {
        let mut instrument = N163Instrument::new();
        assert!(!instrument.set_wave_count(0));
        assert!(!instrument.set_wave_count(65));
        assert!(instrument.set_wave_count(64));
        assert_eq!(instrument.wave_count(), 64);
    }

    #[test]
    fn insert_remove() {
        let mut instrument = N163Instrument::new();
        instrument.set_wave_count(3);
        fill_wave(&mut instrument, 0, 1);
        fill_wave(&mut instrument, 1, 2);
        fill_wave(&mut instrument, 2, 3);

        assert!(instrument.insert_new_wave(1));
        assert_eq!(instrument.wave_count(), 4);
        assert_eq!(instrument.sample(0, 0), Some(sample(1)));
        assert_eq!(instrument.sample(1, 0), Some(sample(0)));
        assert_eq!(instrument.sample(2, 0), Some(sample(2)));
        assert_eq!(instrument.sample(3, 0), Some(sample(3)));

        assert!(instrument.remove_wave(0));
        assert_eq!(instrument.wave_count(), 3);
        assert_eq!(instrument.sample(0, 0), Some(sample(0)));
        assert_eq!(instrument.sample(1, 0), Some(sample(2)));
        assert_eq!(instrument.sample(2, 0), Some(sample(3)));

        assert!(!instrument.remove_wave(3));
        assert!(!instrument.insert_new_wave(4));
        assert!(instrument.insert_new_wave(3));
    }

    #[test]
    fn insert_then_remove_same_index() {
        let mut instrument = N163Instrument::new();
        instrument.set_wave_count(3);
        for (wave, value) in [(0, 5), (1, 10), (2, 15)] {
            fill_wave(&mut instrument, wave, value);
        }
        let original = instrument.clone();

        for index in [0, 1, 3] {
            assert!(instrument.insert_new_wave(index));
            assert_eq!(instrument.wave_count(), 4);
            assert!(instrument.wave(index).unwrap().iter().all(|s| *s == WaveSample::MIN));

            assert!(instrument.remove_wave(index));
            assert_eq!(instrument.wave_count(), 3);
            assert!(instrument.is_wave_equal(&original));
        }
    }

    #[test]
    fn insert_remove_limits() {
        let mut instrument = N163Instrument::new();
        assert!(!instrument.remove_wave(0));

        instrument.set_wave_count(64);
        assert!(!instrument.insert_new_wave(0));
        assert!(!instrument.insert_new_wave(64));
        assert!(instrument.remove_wave(63));
    }

    #[test]
    fn clone_is_deep() {
        let original = N163Instrument::new();
        let mut copy = original.clone();
        copy.set_sample(0, 0, WaveSample::MAX);

        assert_eq!(original.sample(0, 0), Some(WaveSample::MIN));
        assert!(!original.is_wave_equal(&copy));
    }

    #[test]
    fn wave_equality() {
        let mut a = N163Instrument::new();
        let mut b = N163Instrument::new();
        assert!(a.is_wave_equal(&b));

        // Samples past the wave size don't count
        a.set_sample(0, 100, WaveSample::MAX);
        assert!(a.is_wave_equal(&b));

        b.set_wave_size(16);
        assert!(!a.is_wave_equal(&b));
    }

    #[test]
    fn store_load() {
        let mut instrument = N163Instrument::new();
        instrument.set_wave_size(8);
        instrument.set_wave_count(2);
        instrument.set_wave_pos(16);
        fill_wave(&mut instrument, 1, 9);

        let mut writer = FieldWriter::new(Vec::new());
        instrument.store_waves(&mut writer).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 12 + 2 * 8);

        let mut reader = FieldReader::new(bytes.as_slice(), Compatibility::default());
        let loaded = N163Instrument::load_waves(&mut reader, false).unwrap();
        assert_eq!(loaded, instrument);
    }

    #[test]
    fn store_load_three_waves() {
        let mut instrument = N163Instrument::new();
        assert!(instrument.set_wave_size(16));
        assert!(instrument.set_wave_count(3));
        instrument.set_wave_pos(230);
        assert_eq!(instrument.wave_pos(), 224);

        for wave in 0..3 {
            for index in 0..16 {
                instrument.set_sample(wave, index, sample(((wave * 7 + index * 3) % 16) as u8));
            }
        }

        let mut writer = FieldWriter::new(Vec::new());
        instrument.store_waves(&mut writer).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 12 + 3 * 16);

        let mut reader = FieldReader::new(bytes.as_slice(), Compatibility::default());
        let loaded = N163Instrument::load_waves(&mut reader, false).unwrap();
        assert_eq!(loaded.wave_size(), 16);
        assert_eq!(loaded.wave_count(), 3);
        assert_eq!(loaded.wave_pos(), 224);
        assert!(loaded.is_wave_equal(&instrument));
        assert_eq!(reader.remaining(), 0);
    }

    fn wave_block(size: i32, pos: i32, auto_pos: Option<i32>, count: i32, samples: &[i8]) -> Vec<u8> {
        let mut writer = FieldWriter::new(Vec::new());
        writer.write_int(size).unwrap();
        writer.write_int(pos).unwrap();
        if let Some(flag) = auto_pos {
            writer.write_int(flag).unwrap();
        }
        writer.write_int(count).unwrap();
        for sample in samples {
            writer.write_char(*sample).unwrap();
        }
        writer.into_inner()
    }

    #[test]
    fn load_clamps_position() {
        let bytes = wave_block(200, 100, None, 1, &[0; 200]);
        let mut reader = FieldReader::new(bytes.as_slice(), Compatibility::default());

        let loaded = N163Instrument::load_waves(&mut reader, false).unwrap();
        assert_eq!(loaded.wave_pos(), 40);
    }

    #[test]
    fn load_auto_pos() {
        let bytes = wave_block(4, 0, Some(1), 1, &[1, 2, 3, 4]);
        let mut reader = FieldReader::new(bytes.as_slice(), Compatibility::default());

        let loaded = N163Instrument::load_waves(&mut reader, true).unwrap();
        assert_eq!(loaded.sample(0, 3), Some(sample(4)));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn load_invalid_sample() {
        let bytes = wave_block(4, 0, None, 1, &[1, 2, 16, 4]);
        let mut reader = FieldReader::new(bytes.as_slice(), Compatibility::default());

        let error = N163Instrument::load_waves(&mut reader, false).unwrap_err();
        assert_eq!(
            error.report(),
            "At wave 0, sample 2: N163 wave sample is out of range: expected 0 to 15, got 16"
        );
        assert!(matches!(error.root(), ModuleError::OutOfRange { value: 16, .. }));
    }

    #[test]
    fn load_official_range() {
        let samples = vec![0i8; 4 * 17];
        let bytes = wave_block(4, 0, None, 17, &samples);

        let mut reader = FieldReader::new(bytes.as_slice(), Compatibility::Extended);
        assert_eq!(
            N163Instrument::load_waves(&mut reader, false).unwrap().wave_count(),
            17
        );

        let mut reader = FieldReader::new(bytes.as_slice(), Compatibility::Official);
        assert!(matches!(
            N163Instrument::load_waves(&mut reader, false),
            Err(ModuleError::OutOfOfficialRange {
                field: "N163 wave count",
                ..
            })
        ));
    }
}
