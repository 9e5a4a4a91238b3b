//! The chunked container every module is stored in
//!
//! A module starts with an 18-byte identifier and a 32-bit file version. What follows is
//! a list of blocks, each made of a 16-byte null-padded name, a version, a payload size and
//! the payload itself. The three bytes `END` mark the end of the list.

use super::{
    error::ModuleError,
    field::{Compatibility, FieldReader, FieldWriter},
};
use std::io::{self, Read, Write};
use tracing::trace;

/// The identifier every module starts with
const FILE_ID: &[u8; 18] = b"FamiTracker Module";

/// The file version that is written
pub const FILE_VERSION: u32 = 0x0440;

/// The oldest file version that can be read
pub const MIN_FILE_VERSION: u32 = 0x0200;

const END_MARKER: &[u8; 3] = b"END";
const BLOCK_NAME_LEN: usize = 16;
const MAX_BLOCK_SIZE: i32 = 0x100_0000;

/// A single block, with its payload still encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub name: String,
    pub version: u32,
    pub payload: Vec<u8>,
}

impl Block {
    /// Build a block by writing its payload field by field
    pub fn build<F>(name: &str, version: u32, f: F) -> io::Result<Self>
    where
        F: FnOnce(&mut FieldWriter<&mut Vec<u8>>) -> io::Result<()>,
    {
        let mut payload = Vec::new();
        f(&mut FieldWriter::new(&mut payload))?;

        Ok(Self {
            name: name.to_owned(),
            version,
            payload,
        })
    }

    /// A reader over the payload
    pub fn fields(&self, compatibility: Compatibility) -> FieldReader<&[u8]> {
        FieldReader::new(self.payload.as_slice(), compatibility)
    }

    /// Check the block version against the newest one understood
    pub fn check_version(&self, block: &'static str, max: u32) -> Result<u32, ModuleError> {
        if self.version > max {
            return Err(ModuleError::UnsupportedBlockVersion {
                block,
                version: self.version,
                max,
            });
        }

        Ok(self.version)
    }
}

/// Read the file version and all blocks of a module
pub fn read_blocks<R>(reader: R) -> Result<(u32, Vec<Block>), ModuleError>
where
    R: Read,
{
    let mut reader = FieldReader::new(reader, Compatibility::default());

    if reader.read_bytes(FILE_ID.len())? != FILE_ID {
        return Err(ModuleError::InvalidHeader);
    }

    let version = reader.read_int()? as u32;
    if !(MIN_FILE_VERSION..=FILE_VERSION).contains(&version) {
        return Err(ModuleError::UnsupportedFileVersion { version });
    }

    let mut blocks = Vec::new();
    loop {
        let mut name = reader.read_bytes(END_MARKER.len())?;
        if name == END_MARKER {
            break;
        }

        name.extend(reader.read_bytes(BLOCK_NAME_LEN - END_MARKER.len())?);
        let name = parse_block_name(name)?;

        let version = reader.read_int_range(1, i32::MAX, "Block version")? as u32;
        let size = reader.read_int_range(0, MAX_BLOCK_SIZE, "Block size")?;
        let payload = reader
            .read_bytes(size as usize)
            .map_err(|error| error.context(format!("In block {name}")))?;

        trace!(block = %name, version, size, "Read block");
        blocks.push(Block {
            name,
            version,
            payload,
        });
    }

    Ok((version, blocks))
}

/// Write the file header, the blocks and the end marker
pub fn write_blocks<W>(writer: W, blocks: &[Block]) -> io::Result<()>
where
    W: Write,
{
    let mut writer = FieldWriter::new(writer);

    writer.write_bytes(FILE_ID)?;
    writer.write_int(FILE_VERSION as i32)?;

    for block in blocks {
        let mut name = [0; BLOCK_NAME_LEN];
        let len = block.name.len().min(BLOCK_NAME_LEN);
        name[..len].copy_from_slice(&block.name.as_bytes()[..len]);

        writer.write_bytes(&name)?;
        writer.write_int(block.version as i32)?;
        writer.write_int(block.payload.len() as i32)?;
        writer.write_bytes(&block.payload)?;
    }

    writer.write_bytes(END_MARKER)
}

fn parse_block_name(mut bytes: Vec<u8>) -> Result<String, ModuleError> {
    let len = bytes.iter().position(|byte| *byte == 0).unwrap_or(bytes.len());
    bytes.truncate(len);

    if !bytes.iter().all(|byte| byte.is_ascii_graphic()) {
        return Err(ModuleError::InvalidBlockName { name: bytes });
    }

    String::from_utf8(bytes).map_err(|error| ModuleError::InvalidBlockName {
        name: error.into_bytes(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(blocks: &[Block]) -> Vec<u8> {
        let mut bytes = Vec::new();
        write_blocks(&mut bytes, blocks).unwrap();
        bytes
    }

    #[test]
    fn layout() {
        let block = Block::build("PARAMS", 6, |writer| writer.write_int(7)).unwrap();
        let bytes = container(&[block.clone()]);

        assert_eq!(&bytes[..18], b"FamiTracker Module");
        assert_eq!(&bytes[18..22], &[0x40, 0x04, 0, 0]);
        assert_eq!(&bytes[22..38], b"PARAMS\0\0\0\0\0\0\0\0\0\0");
        assert_eq!(&bytes[38..42], &[6, 0, 0, 0]);
        assert_eq!(&bytes[42..46], &[4, 0, 0, 0]);
        assert_eq!(&bytes[46..50], &[7, 0, 0, 0]);
        assert_eq!(&bytes[50..], b"END");

        let (version, blocks) = read_blocks(bytes.as_slice()).unwrap();
        assert_eq!(version, FILE_VERSION);
        assert_eq!(blocks, [block]);
    }

    #[test]
    fn invalid_header() {
        let mut bytes = container(&[]);
        bytes[0] = b'X';
        assert!(matches!(
            read_blocks(bytes.as_slice()),
            Err(ModuleError::InvalidHeader)
        ));

        let mut bytes = container(&[]);
        bytes[19] = 0x05;
        assert!(matches!(
            read_blocks(bytes.as_slice()),
            Err(ModuleError::UnsupportedFileVersion { version: 0x0540 })
        ));
    }

    #[test]
    fn truncated() {
        let block = Block::build("HEADER", 3, |writer| writer.write_bytes(&[1; 10])).unwrap();
        let bytes = container(&[block]);

        let error = read_blocks(&bytes[..bytes.len() - 8]).unwrap_err();
        assert_eq!(error.report(), "In block HEADER: The data ended unexpectedly");

        // Without the end marker
        assert!(matches!(
            read_blocks(&bytes[..bytes.len() - 3]),
            Err(ModuleError::UnexpectedEnd)
        ));
    }

    #[test]
    fn version_check() {
        let block = Block::build("GROOVES", 2, |_| Ok(())).unwrap();
        assert_eq!(block.check_version("GROOVES", 2).unwrap(), 2);
        assert!(matches!(
            block.check_version("GROOVES", 1),
            Err(ModuleError::UnsupportedBlockVersion { version: 2, max: 1, .. })
        ));
    }
}
