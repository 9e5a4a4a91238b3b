//! Primitive fields of the module and instrument formats
//!
//! Every multi-byte value is little-endian. The format talks about "ints" (32 bits), "shorts"
//! (16 bits), "chars" (signed bytes) and plain bytes. Strings are an int length followed by
//! that many bytes.

use super::error::{ModuleError, assert_range};
use crate::name::Name;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use tracing::warn;

/// How strictly values outside of the official tracker's limits are treated
///
/// Some fields have a range this crate can represent, and a narrower range the official
/// tracker accepts (the N163 wave position and count, for example). Extended files may
/// go beyond the official range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compatibility {
    /// Values outside of the official range are accepted with a warning
    #[default]
    Extended,

    /// Values outside of the official range are an error
    Official,
}

/// Reads primitive fields from a module or instrument file
pub struct FieldReader<R> {
    reader: R,
    compatibility: Compatibility,
}

impl<R> FieldReader<R>
where
    R: Read,
{
    pub fn new(reader: R, compatibility: Compatibility) -> Self {
        Self {
            reader,
            compatibility,
        }
    }

    pub fn compatibility(&self) -> Compatibility {
        self.compatibility
    }

    pub fn read_int(&mut self) -> Result<i32, ModuleError> {
        Ok(self.reader.read_i32::<LittleEndian>()?)
    }

    pub fn read_short(&mut self) -> Result<i16, ModuleError> {
        Ok(self.reader.read_i16::<LittleEndian>()?)
    }

    pub fn read_char(&mut self) -> Result<i8, ModuleError> {
        Ok(self.reader.read_i8()?)
    }

    pub fn read_byte(&mut self) -> Result<u8, ModuleError> {
        Ok(self.reader.read_u8()?)
    }

    /// Read an int and check that it lies within `min..=max`
    pub fn read_int_range(
        &mut self,
        min: i32,
        max: i32,
        field: &'static str,
    ) -> Result<i32, ModuleError> {
        assert_range(self.read_int()?, min, max, field)
    }

    /// Read a char and check that it lies within `min..=max`
    pub fn read_char_range(
        &mut self,
        min: i8,
        max: i8,
        field: &'static str,
    ) -> Result<i8, ModuleError> {
        assert_range(self.read_char()?, min, max, field)
    }

    /// Read a byte and check that it lies within `min..=max`
    pub fn read_byte_range(
        &mut self,
        min: u8,
        max: u8,
        field: &'static str,
    ) -> Result<u8, ModuleError> {
        assert_range(self.read_byte()?, min, max, field)
    }

    /// Read a fixed number of raw bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, ModuleError> {
        let mut bytes = vec![0; len];
        self.reader.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// Read a length-prefixed string
    pub fn read_name<const N: usize>(&mut self, field: &'static str) -> Result<Name<N>, ModuleError> {
        let len = self.read_int_range(0, N as i32, field)?;
        let bytes = self.read_bytes(len as usize)?;
        Ok(Name::from_bytes(&bytes)?)
    }

    /// Check a value against the limits of the official tracker
    ///
    /// Depending on the [`Compatibility`] a value outside of the range is either logged or
    /// results in [`ModuleError::OutOfOfficialRange`].
    pub fn check_official<T>(
        &self,
        value: T,
        min: T,
        max: T,
        field: &'static str,
    ) -> Result<(), ModuleError>
    where
        T: Copy + PartialOrd + Into<i64>,
    {
        if value >= min && value <= max {
            return Ok(());
        }

        let (value, min, max) = (value.into(), min.into(), max.into());
        match self.compatibility {
            Compatibility::Extended => {
                warn!(field, value, min, max, "Value lies outside of the official range");
                Ok(())
            }
            Compatibility::Official => Err(ModuleError::OutOfOfficialRange {
                field,
                value,
                min,
                max,
            }),
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl FieldReader<&[u8]> {
    /// The number of bytes that haven't been read yet
    pub fn remaining(&self) -> usize {
        self.reader.len()
    }
}

/// Writes primitive fields to a module or instrument file
pub struct FieldWriter<W> {
    writer: W,
}

impl<W> FieldWriter<W>
where
    W: Write,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_int(&mut self, value: i32) -> io::Result<()> {
        self.writer.write_i32::<LittleEndian>(value)
    }

    pub fn write_short(&mut self, value: i16) -> io::Result<()> {
        self.writer.write_i16::<LittleEndian>(value)
    }

    pub fn write_char(&mut self, value: i8) -> io::Result<()> {
        self.writer.write_i8(value)
    }

    pub fn write_byte(&mut self, value: u8) -> io::Result<()> {
        self.writer.write_u8(value)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)
    }

    /// Write a length-prefixed string
    pub fn write_name<const N: usize>(&mut self, name: &Name<N>) -> io::Result<()> {
        self.write_int(name.len() as i32)?;
        self.write_bytes(name.bytes())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn little_endian() {
        let mut writer = FieldWriter::new(Vec::new());
        writer.write_int(0x01020304).unwrap();
        writer.write_short(-2).unwrap();
        writer.write_char(-1).unwrap();
        writer.write_byte(0xAB).unwrap();

        let bytes = writer.into_inner();
        assert_eq!(bytes, [0x04, 0x03, 0x02, 0x01, 0xFE, 0xFF, 0xFF, 0xAB]);

        let mut reader = FieldReader::new(bytes.as_slice(), Compatibility::default());
        assert_eq!(reader.read_int().unwrap(), 0x01020304);
        assert_eq!(reader.read_short().unwrap(), -2);
        assert_eq!(reader.read_char().unwrap(), -1);
        assert_eq!(reader.remaining(), 1);
        assert_eq!(reader.read_byte().unwrap(), 0xAB);
        assert!(matches!(reader.read_byte(), Err(ModuleError::UnexpectedEnd)));
    }

    #[test]
    fn names() {
        let mut writer = FieldWriter::new(Vec::new());
        writer.write_name(&Name::<16>::from_str("Bass").unwrap()).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes, [4, 0, 0, 0, b'B', b'a', b's', b's']);

        let mut reader = FieldReader::new(bytes.as_slice(), Compatibility::default());
        let name: Name<16> = reader.read_name("Instrument name").unwrap();
        assert_eq!(name.as_str(), "Bass");

        let mut reader = FieldReader::new(bytes.as_slice(), Compatibility::default());
        let error = reader.read_name::<2>("Instrument name").unwrap_err();
        assert!(matches!(error, ModuleError::OutOfRange { value: 4, max: 2, .. }));
    }

    #[test]
    fn official_range() {
        let extended = FieldReader::new(&[][..], Compatibility::Extended);
        assert!(extended.check_official(0x90, 0, 0x7F, "N163 wave position").is_ok());

        let official = FieldReader::new(&[][..], Compatibility::Official);
        assert!(official.check_official(0x7F, 0, 0x7F, "N163 wave position").is_ok());
        assert!(matches!(
            official.check_official(0x90, 0, 0x7F, "N163 wave position"),
            Err(ModuleError::OutOfOfficialRange { value: 0x90, .. })
        ));
    }
}
