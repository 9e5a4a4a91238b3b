//! A length-restricted string based on printable ASCII
use std::{
    fmt,
    str::{self, FromStr},
};
use thiserror::Error;

/// A length-restricted string based on printable ASCII
///
/// Instruments and tracks carry names that are stored as a length-prefixed run of bytes
/// in the module format. The tracker only ever displays printable ASCII, so that is the
/// subset accepted here.
///
/// The maximum length differs between instruments and tracks, which is why this struct is
/// generic over its length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name<const N: usize> {
    bytes: [u8; N],
    len: usize,
}

impl<const N: usize> Name<N> {
    /// Try to convert a byte slice to a name
    ///
    /// This function fails if the bytes are longer than the allowed length, or a byte outside
    /// of printable ASCII is found. A zero byte ends the name early.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NameFromBytesError> {
        let mut dest = [0; N];
        let mut len = 0;

        for (index, byte) in bytes.iter().enumerate() {
            match *byte {
                0 => break,
                _ if index >= N => return Err(NameFromBytesError::TooLong),
                byte if Self::is_byte_allowed(byte) => {
                    dest[index] = byte;
                    len += 1;
                }
                _ => return Err(NameFromBytesError::DisallowedByte { byte: *byte, index }),
            }
        }

        Ok(Self { bytes: dest, len })
    }

    /// Access the bytes that make up the name, excluding unused capacity
    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// The maximal number of characters allowed in the name
    pub const fn capacity(&self) -> usize {
        N
    }

    /// The number of characters in the name
    pub fn len(&self) -> usize {
        self.len
    }

    /// Are there _any_ characters in the name string?
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Convert to a [`prim@str`] slice
    pub fn as_str(&self) -> &str {
        // SAFETY: from_bytes only accepts printable ASCII, which is valid UTF-8
        unsafe { str::from_utf8_unchecked(self.bytes()) }
    }

    /// Is a specific byte usable in a name?
    pub fn is_byte_allowed(byte: u8) -> bool {
        (0x20..=0x7E).contains(&byte)
    }
}

impl<const N: usize> Default for Name<N> {
    fn default() -> Self {
        Self {
            bytes: [0; N],
            len: 0,
        }
    }
}

impl<const N: usize> fmt::Display for Name<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<'a, const N: usize> TryFrom<&'a [u8]> for Name<N> {
    type Error = NameFromBytesError;

    #[inline]
    fn try_from(bytes: &'a [u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl<'a, const N: usize> TryFrom<&'a str> for Name<N> {
    type Error = NameFromBytesError;

    #[inline]
    fn try_from(str: &'a str) -> Result<Self, Self::Error> {
        str.as_bytes().try_into()
    }
}

impl<const N: usize> FromStr for Name<N> {
    type Err = NameFromBytesError;

    #[inline]
    fn from_str(str: &str) -> Result<Self, Self::Err> {
        str.try_into()
    }
}

/// Errors that can result from trying to convert a byte slice to a [`Name`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameFromBytesError {
    /// The source slice is too big to fit in the [`Name`] string
    #[error("The name is longer than its maximum length")]
    TooLong,

    /// Only printable ASCII characters are allowed in [`Name`] strings
    #[error("Byte {byte} at position {index} is not allowed as a name character")]
    DisallowedByte { byte: u8, index: usize },
}
