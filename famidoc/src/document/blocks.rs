//! Loading and storing the blocks that make up a module

use super::{
    Block, Compatibility, Document, FieldReader, FieldWriter, Machine, ModuleError, Track,
    VibratoStyle, assert_range,
};
use crate::{
    channel_map::ChannelMap,
    chip::{ChannelId, SoundChip, SoundChipSet},
    groove::{Groove, GrooveTable},
    instrument::{Instrument, InstrumentKind, Sequence, SequenceBank, SequenceType},
};
use std::io::{self, Read, Write};
use tracing::{debug, warn};

const PARAMS: &str = "PARAMS";
const HEADER: &str = "HEADER";
const INSTRUMENTS: &str = "INSTRUMENTS";
const GROOVES: &str = "GROOVES";

const PARAMS_VERSION: u32 = 6;
const HEADER_VERSION: u32 = 3;
const INSTRUMENTS_VERSION: u32 = 6;
const SEQUENCES_VERSION: u32 = 6;
const GROOVES_VERSION: u32 = 1;

/// The newest instruments block that can be read; version 8 adds the N163 auto-position flag
const MAX_INSTRUMENTS_VERSION: u32 = 8;

/// The speed split point of modules that predate the setting
const OLD_SPEED_SPLIT: u8 = 21;

/// Turn a list of blocks into a document
///
/// Blocks are handled in file order. The parameters have to come before the header, since
/// they decide which channels the header describes.
pub(super) fn load(blocks: &[Block], compatibility: Compatibility) -> Result<Document, ModuleError> {
    let mut document = Document::new();
    let mut has_params = false;

    for block in blocks {
        let mut reader = block.fields(compatibility);

        debug!(block = %block.name, version = block.version, "Loading block");
        load_block(&mut document, block, &mut reader, has_params)
            .map_err(|error| error.context(format!("In block {}", block.name)))?;

        has_params |= block.name == PARAMS;

        if reader.remaining() > 0 {
            warn!(
                block = %block.name,
                bytes = reader.remaining(),
                "Block holds more data than was read"
            );
        }
    }

    if !has_params {
        return Err(ModuleError::MissingBlock { block: PARAMS });
    }

    for (index, track) in document.tracks.iter().enumerate() {
        if !track.uses_groove {
            assert_range(track.speed, 1, u8::MAX, "Track speed")
                .map_err(|error| error.context(format!("At track {index}")))?;
        }
    }

    Ok(document)
}

fn load_block(
    document: &mut Document,
    block: &Block,
    reader: &mut FieldReader<&[u8]>,
    has_params: bool,
) -> Result<(), ModuleError> {
    match block.name.as_str() {
        PARAMS => load_params(document, block.check_version(PARAMS, PARAMS_VERSION)?, reader),
        HEADER => {
            if !has_params {
                return Err(ModuleError::MissingBlock { block: PARAMS });
            }
            load_header(document, block.check_version(HEADER, HEADER_VERSION)?, reader)
        }
        INSTRUMENTS => {
            let version = block.check_version(INSTRUMENTS, MAX_INSTRUMENTS_VERSION)?;
            load_instruments(document, version, reader)
        }
        GROOVES => {
            block.check_version(GROOVES, GROOVES_VERSION)?;
            load_grooves(document, reader)
        }
        name => match sequence_block_kind(name) {
            Some((kind, block_name)) => {
                block.check_version(block_name, SEQUENCES_VERSION)?;
                load_sequences(document, kind, reader)
            }
            None => {
                warn!(block = name, "Skipping unknown block");
                Ok(())
            }
        },
    }
}

fn sequence_block_kind(name: &str) -> Option<(InstrumentKind, &'static str)> {
    InstrumentKind::SUPPORTED.into_iter().find_map(|kind| {
        let block = kind.sequence_block()?;
        (block == name).then_some((kind, block))
    })
}

/// Turn a document into a list of blocks
pub(super) fn store(document: &Document) -> io::Result<Vec<Block>> {
    let mut blocks = vec![
        Block::build(PARAMS, PARAMS_VERSION, |writer| store_params(document, writer))?,
        Block::build(HEADER, HEADER_VERSION, |writer| store_header(document, writer))?,
        Block::build(INSTRUMENTS, INSTRUMENTS_VERSION, |writer| {
            store_instruments(document, writer)
        })?,
    ];

    for kind in InstrumentKind::SUPPORTED {
        if let Some(name) = kind.sequence_block() {
            blocks.push(Block::build(name, SEQUENCES_VERSION, |writer| {
                store_sequences(&document.sequences, kind, writer)
            })?);
        }
    }

    blocks.push(Block::build(GROOVES, GROOVES_VERSION, |writer| {
        store_grooves(document, writer)
    })?);

    Ok(blocks)
}

fn load_params<R: Read>(
    document: &mut Document,
    version: u32,
    reader: &mut FieldReader<R>,
) -> Result<(), ModuleError> {
    let chips = SoundChipSet::from_expansion_flags(reader.read_byte()?)?;
    let channel_count = reader.read_int()?;

    document.machine = match reader.read_int_range(0, 1, "Machine")? {
        0 => Machine::Ntsc,
        _ => Machine::Pal,
    };
    document.engine_speed =
        reader.read_int_range(0, Document::MAX_ENGINE_SPEED as i32, "Engine speed")? as u16;

    document.vibrato = if version >= 3 {
        match reader.read_int_range(0, 1, "Vibrato style")? {
            0 => VibratoStyle::Old,
            _ => VibratoStyle::New,
        }
    } else {
        VibratoStyle::Old
    };

    if version >= 4 {
        document.highlight.first = reader.read_int_range(0, 255, "First highlight")? as u8;
        document.highlight.second = reader.read_int_range(0, 255, "Second highlight")? as u8;
    }

    let max_n163 = ChannelMap::<ChannelId>::MAX_N163_CHANNELS as i32;
    let n163_channels = match chips.contains_chip(SoundChip::N163) {
        true if version >= 5 => reader.read_int_range(1, max_n163, "N163 channel count")?,
        true => max_n163,
        false => 0,
    };

    document.speed_split = if version >= 6 {
        reader.read_int_range(0, 255, "Speed split point")? as u8
    } else {
        OLD_SPEED_SPLIT
    };

    let channels = ChannelMap::from_chips(chips, n163_channels as usize)?;
    let expected = channels.channel_count() as i32;
    assert_range(channel_count, expected, expected, "Channel count")?;

    document.tracks = vec![Track::new(channels.channel_count())];
    document.channels = channels;
    Ok(())
}

fn store_params<W: Write>(document: &Document, writer: &mut FieldWriter<W>) -> io::Result<()> {
    let chips = document.chips();

    writer.write_byte(chips.expansion_flags())?;
    writer.write_int(document.channels.channel_count() as i32)?;
    writer.write_int(match document.machine {
        Machine::Ntsc => 0,
        Machine::Pal => 1,
    })?;
    writer.write_int(document.engine_speed as i32)?;
    writer.write_int(match document.vibrato {
        VibratoStyle::Old => 0,
        VibratoStyle::New => 1,
    })?;
    writer.write_int(document.highlight.first as i32)?;
    writer.write_int(document.highlight.second as i32)?;

    if chips.contains_chip(SoundChip::N163) {
        writer.write_int(document.n163_channels() as i32)?;
    }

    writer.write_int(document.speed_split as i32)
}

fn load_header<R: Read>(
    document: &mut Document,
    version: u32,
    reader: &mut FieldReader<R>,
) -> Result<(), ModuleError> {
    let channels: Vec<ChannelId> = document.channels.channel_types().collect();

    let track_count = if version >= 2 {
        reader.read_int_range(1, Document::MAX_TRACKS as i32, "Track count")? as usize
    } else {
        1
    };

    let mut tracks: Vec<Track> = (0..track_count).map(|_| Track::new(channels.len())).collect();

    if version >= 2 {
        for (index, track) in tracks.iter_mut().enumerate() {
            track.title = reader
                .read_name("Track title")
                .map_err(|error| error.context(format!("At track {index}")))?;
        }
    }

    for (index, track) in tracks.iter_mut().enumerate() {
        load_track_timing(track, reader)
            .map_err(|error| error.context(format!("At track {index}")))?;
    }

    for (channel, expected) in channels.iter().enumerate() {
        let found = reader.read_byte()?;
        if found != u8::from(*expected) {
            return Err(ModuleError::ChannelMismatch {
                expected: *expected,
                found,
            });
        }

        for track in &mut tracks {
            track.effect_columns[channel] = reader.read_byte_range(
                1,
                Track::MAX_EFFECT_COLUMNS,
                "Effect column count",
            )?;
        }
    }

    document.tracks = tracks;
    Ok(())
}

fn load_track_timing<R: Read>(track: &mut Track, reader: &mut FieldReader<R>) -> Result<(), ModuleError> {
    // A speed of 0 is only valid for tracks playing groove 0, which the grooves block decides
    track.speed = reader.read_int_range(0, 255, "Track speed")? as u8;
    track.tempo = reader.read_int_range(Track::MIN_TEMPO as i32, 255, "Track tempo")? as u8;
    track.rows = reader.read_int_range(1, Track::MAX_ROWS as i32, "Track rows")? as u16;
    Ok(())
}

fn store_header<W: Write>(document: &Document, writer: &mut FieldWriter<W>) -> io::Result<()> {
    writer.write_int(document.tracks.len() as i32)?;

    for track in &document.tracks {
        writer.write_name(&track.title)?;
    }

    for track in &document.tracks {
        writer.write_int(track.speed as i32)?;
        writer.write_int(track.tempo as i32)?;
        writer.write_int(track.rows as i32)?;
    }

    for (channel, id) in document.channels.channel_types().enumerate() {
        writer.write_byte(id.into())?;

        for track in &document.tracks {
            writer.write_byte(track.effect_columns[channel])?;
        }
    }

    Ok(())
}

fn load_instruments<R: Read>(
    document: &mut Document,
    version: u32,
    reader: &mut FieldReader<R>,
) -> Result<(), ModuleError> {
    let max = Document::MAX_INSTRUMENTS as i32;
    let count = reader.read_int_range(0, max, "Instrument count")?;

    for _ in 0..count {
        let index = reader.read_int_range(0, max - 1, "Instrument index")?;
        let instrument = load_instrument(reader, version)
            .map_err(|error| error.context(format!("At instrument {index}")))?;

        document.instruments.insert(index as u8, instrument);
    }

    Ok(())
}

fn load_instrument<R: Read>(reader: &mut FieldReader<R>, version: u32) -> Result<Instrument, ModuleError> {
    let kind = InstrumentKind::try_from(reader.read_byte()?)?;
    let mut instrument = Instrument::load(kind, reader, version)?;
    instrument.set_name(reader.read_name("Instrument name")?);
    Ok(instrument)
}

fn store_instruments<W: Write>(document: &Document, writer: &mut FieldWriter<W>) -> io::Result<()> {
    writer.write_int(document.instruments.len() as i32)?;

    for (index, instrument) in &document.instruments {
        writer.write_int(*index as i32)?;
        writer.write_byte(instrument.kind().into())?;
        instrument.store(writer)?;
        writer.write_name(instrument.name())?;
    }

    Ok(())
}

fn load_sequences<R: Read>(
    document: &mut Document,
    kind: InstrumentKind,
    reader: &mut FieldReader<R>,
) -> Result<(), ModuleError> {
    let max_count = (SequenceBank::MAX_SEQUENCES * SequenceType::COUNT) as i32;
    let count = reader.read_int_range(0, max_count, "Sequence count")?;

    for _ in 0..count {
        let index = reader.read_int_range(
            0,
            SequenceBank::MAX_SEQUENCES as i32 - 1,
            "Sequence index",
        )?;
        let ty = reader.read_int_range(0, SequenceType::COUNT as i32 - 1, "Sequence type")?;
        let ty = SequenceType::ALL[ty as usize];

        let sequence = Sequence::load(reader)
            .map_err(|error| error.context(format!("At {ty} sequence {index}")))?;
        document.sequences.insert(kind, ty, index as u8, sequence)?;
    }

    Ok(())
}

fn store_sequences<W: Write>(
    sequences: &SequenceBank,
    kind: InstrumentKind,
    writer: &mut FieldWriter<W>,
) -> io::Result<()> {
    writer.write_int(sequences.iter_kind(kind).count() as i32)?;

    for (ty, index, sequence) in sequences.iter_kind(kind) {
        writer.write_int(index as i32)?;
        writer.write_int(ty.index() as i32)?;
        sequence.store(writer)?;
    }

    Ok(())
}

fn load_grooves<R: Read>(document: &mut Document, reader: &mut FieldReader<R>) -> Result<(), ModuleError> {
    let slots = GrooveTable::SLOTS as u8;
    let count = reader.read_byte_range(0, slots, "Groove count")?;

    for _ in 0..count {
        let index = reader.read_byte_range(0, slots - 1, "Groove index")?;
        let groove =
            load_groove(reader).map_err(|error| error.context(format!("At groove {index}")))?;

        document.grooves.set(index as usize, groove)?;
    }

    let track_count = reader.read_byte_range(0, document.tracks.len() as u8, "Groove track count")?;
    for (index, track) in document.tracks.iter_mut().take(track_count as usize).enumerate() {
        let flag = reader.read_byte_range(0, 1, "Track groove flag")?;
        if flag == 1 {
            assert_range(track.speed, 0, slots - 1, "Track groove index")
                .map_err(|error| error.context(format!("At track {index}")))?;
            track.uses_groove = true;
        }
    }

    Ok(())
}

fn load_groove<R: Read>(reader: &mut FieldReader<R>) -> Result<Groove, ModuleError> {
    let len = reader.read_byte_range(1, Groove::MAX_LEN as u8, "Groove size")?;
    let entries = (0..len)
        .map(|_| reader.read_byte_range(1, u8::MAX, "Groove entry"))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Groove::from_entries(&entries)?)
}

fn store_grooves<W: Write>(document: &Document, writer: &mut FieldWriter<W>) -> io::Result<()> {
    let grooves: Vec<_> = document
        .grooves
        .iter()
        .enumerate()
        .filter_map(|(index, groove)| Some((index, groove?)))
        .collect();

    writer.write_byte(grooves.len() as u8)?;
    for (index, groove) in grooves {
        writer.write_byte(index as u8)?;
        writer.write_byte(groove.len() as u8)?;
        writer.write_bytes(groove.as_slice())?;
    }

    writer.write_byte(document.tracks.len() as u8)?;
    for track in &document.tracks {
        writer.write_byte(track.uses_groove as u8)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        document::{read_blocks, write_blocks},
        instrument::{InstrumentName, N163Instrument, WaveSample},
    };
    use std::{io::Cursor, str::FromStr};

    fn module(blocks: &[Block]) -> Vec<u8> {
        let mut bytes = Vec::new();
        write_blocks(&mut bytes, blocks).unwrap();
        bytes
    }

    /// A PARAMS block of the given version for a plain 2A03 module
    fn params(version: u32) -> Block {
        Block::build(PARAMS, version, |writer| {
            writer.write_byte(0)?;
            writer.write_int(5)?;
            writer.write_int(1)?;
            writer.write_int(0)?;

            if version >= 3 {
                writer.write_int(1)?;
            }
            if version >= 4 {
                writer.write_int(8)?;
                writer.write_int(32)?;
            }
            if version >= 6 {
                writer.write_int(40)?;
            }
            Ok(())
        })
        .unwrap()
    }

    fn sample_document() -> Document {
        let mut document = Document::new();
        let chips = SoundChipSet::new()
            .with(SoundChip::Vrc6)
            .with(SoundChip::N163);
        document.set_chips(chips, 4).unwrap();
        document.machine = Machine::Pal;
        document.engine_speed = 120;
        document.highlight.first = 3;

        let track = document.add_track().unwrap();
        track.title = "Boss".parse().unwrap();
        track.set_tempo(125);
        track.set_rows(128);
        track.set_effect_columns(6, 3);
        track.set_groove(0);

        let mut sequence = Sequence::from_items(&[15, 10, 5]).unwrap();
        sequence.set_release_point(Some(1));
        document
            .sequences_mut()
            .insert(InstrumentKind::Vrc6, SequenceType::Volume, 4, sequence)
            .unwrap();

        let mut pulse = Instrument::new(InstrumentKind::Vrc6).unwrap();
        pulse.set_name(InstrumentName::from_str("Pulse").unwrap());
        pulse.base_mut().set_slot(SequenceType::Volume, true, 4);
        document.insert_instrument(3, pulse).unwrap();

        let mut wave = N163Instrument::new();
        wave.set_wave_count(2);
        wave.set_sample(1, 0, WaveSample::MAX);
        document.insert_instrument(7, wave.into()).unwrap();

        let mut grooves = GrooveTable::new();
        grooves.set(0, Groove::from_entries(&[6, 5]).unwrap()).unwrap();
        document.set_grooves(grooves).unwrap();

        document
    }

    #[test]
    fn round_trip() {
        let document = sample_document();

        let mut bytes = Vec::new();
        document.to_writer(&mut bytes).unwrap();

        let loaded = Document::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(loaded, document);
        assert_eq!(loaded.tracks()[1].groove(), Some(0));
        assert_eq!(loaded.n163_channels(), 4);
    }

    #[test]
    fn written_blocks() {
        let blocks = store(&Document::new()).unwrap();
        let names: Vec<_> = blocks.iter().map(|block| block.name.as_str()).collect();

        assert_eq!(
            names,
            [
                "PARAMS",
                "HEADER",
                "INSTRUMENTS",
                "SEQUENCES",
                "SEQUENCES_VRC6",
                "SEQUENCES_N163",
                "SEQUENCES_S5B",
                "GROOVES"
            ]
        );
    }

    #[test]
    fn unknown_blocks_are_skipped() {
        let mut blocks = store(&sample_document()).unwrap();
        blocks.insert(
            2,
            Block::build("PATTERNS", 5, |writer| writer.write_bytes(&[0xFF; 12])).unwrap(),
        );

        let loaded = Document::from_reader(module(&blocks).as_slice()).unwrap();
        assert_eq!(loaded, sample_document());
    }

    #[test]
    fn old_params() {
        let document = Document::from_reader(module(&[params(1)]).as_slice()).unwrap();
        assert_eq!(document.machine, Machine::Pal);
        assert_eq!(document.vibrato, VibratoStyle::Old);
        assert_eq!(document.highlight, Default::default());
        assert_eq!(document.speed_split, OLD_SPEED_SPLIT);

        let document = Document::from_reader(module(&[params(6)]).as_slice()).unwrap();
        assert_eq!(document.vibrato, VibratoStyle::New);
        assert_eq!(document.highlight.first, 8);
        assert_eq!(document.speed_split, 40);
    }

    #[test]
    fn old_header() {
        let header = Block::build(HEADER, 1, |writer| {
            writer.write_int(4)?;
            writer.write_int(150)?;
            writer.write_int(32)?;
            for id in 0..5 {
                writer.write_byte(id)?;
                writer.write_byte(2)?;
            }
            Ok(())
        })
        .unwrap();

        let document = Document::from_reader(module(&[params(6), header]).as_slice()).unwrap();
        assert_eq!(document.tracks().len(), 1);
        assert!(document.tracks()[0].title.is_empty());
        assert_eq!(document.tracks()[0].speed(), 4);
        assert_eq!(document.tracks()[0].rows(), 32);
        assert_eq!(document.tracks()[0].effect_columns(4), Some(2));
    }

    #[test]
    fn channel_mismatch() {
        let header = Block::build(HEADER, 3, |writer| {
            writer.write_int(1)?;
            writer.write_int(0)?;
            for value in [6, 150, 64] {
                writer.write_int(value)?;
            }
            writer.write_byte(0)?;
            writer.write_byte(1)?;
            writer.write_byte(7)
        })
        .unwrap();

        let error = Document::from_reader(module(&[params(6), header]).as_slice()).unwrap_err();
        assert!(matches!(
            error.root(),
            ModuleError::ChannelMismatch {
                expected: ChannelId::Square2,
                found: 7
            }
        ));
    }

    #[test]
    fn structural_errors() {
        let error = Document::from_reader(module(&[]).as_slice()).unwrap_err();
        assert!(matches!(error, ModuleError::MissingBlock { block: "PARAMS" }));

        let header = store(&Document::new()).unwrap().remove(1);
        let error = Document::from_reader(module(&[header, params(6)]).as_slice()).unwrap_err();
        assert!(matches!(
            error.root(),
            ModuleError::MissingBlock { block: "PARAMS" }
        ));

        let error = Document::from_reader(module(&[params(7)]).as_slice()).unwrap_err();
        assert_eq!(
            error.report(),
            "In block PARAMS: Version 7 of block PARAMS is not supported (up to 6)"
        );
    }

    #[test]
    fn instrument_error_context() {
        let instruments = Block::build(INSTRUMENTS, 6, |writer| {
            writer.write_int(1)?;
            writer.write_int(3)?;
            writer.write_byte(InstrumentKind::N163.into())?;
            write_empty_slots(writer)?;
            for value in [4, 0, 1] {
                writer.write_int(value)?;
            }
            writer.write_bytes(&[1, 20, 3, 4])
        })
        .unwrap();

        let error =
            Document::from_reader(module(&[params(6), instruments]).as_slice()).unwrap_err();
        assert_eq!(
            error.report(),
            "In block INSTRUMENTS: At instrument 3: At wave 0, sample 1: \
             N163 wave sample is out of range: expected 0 to 15, got 20"
        );
    }

    #[test]
    fn auto_position_flag() {
        let instruments = Block::build(INSTRUMENTS, 8, |writer| {
            writer.write_int(1)?;
            writer.write_int(0)?;
            writer.write_byte(InstrumentKind::N163.into())?;
            write_empty_slots(writer)?;
            for value in [4, 0, 1, 1] {
                writer.write_int(value)?;
            }
            writer.write_bytes(&[1, 2, 3, 4])?;
            writer.write_name(&InstrumentName::from_str("Auto").unwrap())
        })
        .unwrap();

        let document =
            Document::from_reader(module(&[params(6), instruments]).as_slice()).unwrap();
        let instrument = document.instrument(0).unwrap();
        assert_eq!(instrument.name().as_str(), "Auto");
        assert_eq!(
            instrument.as_n163().unwrap().sample(0, 3),
            WaveSample::new(4)
        );
    }

    #[test]
    fn official_compatibility() {
        let mut document = Document::new();
        let mut instrument = N163Instrument::new();
        instrument.set_wave_count(20);
        document.add_instrument(instrument.into());

        let mut bytes = Vec::new();
        document.to_writer(&mut bytes).unwrap();

        assert!(Document::from_reader(bytes.as_slice()).is_ok());

        let error =
            Document::from_reader_with(bytes.as_slice(), Compatibility::Official).unwrap_err();
        assert!(matches!(
            error.root(),
            ModuleError::OutOfOfficialRange {
                field: "N163 wave count",
                value: 20,
                ..
            }
        ));
    }

    #[test]
    fn invalid_groove_flag() {
        let mut document = Document::new();
        document.track_mut(0).unwrap().set_speed(40);

        let mut blocks = store(&document).unwrap();
        let grooves = blocks.last_mut().unwrap();
        *grooves.payload.last_mut().unwrap() = 1;

        let error = Document::from_reader(module(&blocks).as_slice()).unwrap_err();
        assert_eq!(
            error.report(),
            "In block GROOVES: At track 0: Track groove index is out of range: expected 0 to 31, got 40"
        );
    }

    #[test]
    fn trailing_bytes_are_tolerated() {
        let mut blocks = store(&Document::new()).unwrap();
        blocks[0].payload.extend([0; 4]);

        let (_, read) = read_blocks(module(&blocks).as_slice()).unwrap();
        assert_eq!(read[0].payload.len(), blocks[0].payload.len());
        assert!(Document::from_reader(module(&blocks).as_slice()).is_ok());
    }

    /// The sequence slots of an instrument that uses no sequences
    fn write_empty_slots<W: Write>(writer: &mut FieldWriter<W>) -> io::Result<()> {
        writer.write_int(SequenceType::COUNT as i32)?;
        writer.write_bytes(&[0; SequenceType::COUNT * 2])
    }
}
