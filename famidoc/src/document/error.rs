use crate::{
    channel_map::ChannelMapError,
    chip::{ChannelId, UnknownChipFlags},
    groove::GrooveError,
    instrument::{InstrumentKind, SequenceError, SequenceType},
    name::NameFromBytesError,
};
use std::io;
use thiserror::Error;

/// Check that a value read from persisted bytes lies within `min..=max`
///
/// The value is returned unchanged when it fits. Otherwise this fails with
/// [`ModuleError::OutOfRange`], which names the field and its bounds.
pub fn assert_range<T>(value: T, min: T, max: T, field: &'static str) -> Result<T, ModuleError>
where
    T: Copy + PartialOrd + Into<i64>,
{
    if value < min || value > max {
        return Err(ModuleError::OutOfRange {
            field,
            value: value.into(),
            min: min.into(),
            max: max.into(),
        });
    }

    Ok(value)
}

/// Everything that can go wrong loading a module or instrument
///
/// Errors raised deep inside a load are wrapped in [`ModuleError::Context`] as they travel
/// back up, so the outermost error reads like "In block INSTRUMENTS: At instrument 3: At wave
/// 2, sample 17: N163 wave sample is out of range ...". Use [`ModuleError::root()`] to get at
/// the innermost cause.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// A field read from persisted bytes lies outside of its valid range
    #[error("{field} is out of range: expected {min} to {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// A field lies within the valid range, but outside of what the official tracker accepts
    ///
    /// This is only raised when loading with [`Compatibility::Official`](super::Compatibility).
    #[error("{field} is outside of the official range: expected {min} to {max}, got {value}")]
    OutOfOfficialRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// The data ended before all fields were read
    #[error("The data ended unexpectedly")]
    UnexpectedEnd,

    /// The file doesn't start with the expected identifier
    #[error("The file is not a module or instrument file")]
    InvalidHeader,

    /// The file was written by an unsupported version of the format
    #[error("File version {version:#06X} is not supported")]
    UnsupportedFileVersion { version: u32 },

    /// A block was written with a newer schema than this crate understands
    #[error("Version {version} of block {block} is not supported (up to {max})")]
    UnsupportedBlockVersion {
        block: &'static str,
        version: u32,
        max: u32,
    },

    /// A block name contains bytes that aren't ASCII
    #[error("Invalid block name {name:?}")]
    InvalidBlockName { name: Vec<u8> },

    /// A block that has to be present wasn't found
    #[error("Block {block} is missing")]
    MissingBlock { block: &'static str },

    /// An instrument of a kind this crate does not model
    #[error("Instruments of type {kind} are not supported")]
    UnsupportedInstrument { kind: u8 },

    /// The channel layout stored in the module doesn't match its chip configuration
    #[error("Expected channel {expected}, found channel id {found}")]
    ChannelMismatch { expected: ChannelId, found: u8 },

    /// There's no free sequence slot left to import a sequence into
    #[error("No free {ty:?} sequence left for {kind:?} instruments")]
    SequenceBankFull {
        kind: InstrumentKind,
        ty: SequenceType,
    },

    /// A stored name contains invalid characters
    #[error("Invalid name")]
    Name(#[from] NameFromBytesError),

    /// The expansion chip flags contain unknown bits
    #[error("Invalid expansion chip flags")]
    Chips(#[from] UnknownChipFlags),

    /// The chip configuration doesn't produce a valid channel map
    #[error("Invalid channel configuration")]
    ChannelMap(#[from] ChannelMapError),

    /// A stored groove can't be placed in the groove table
    #[error("Invalid groove")]
    Groove(#[from] GrooveError),

    /// A stored sequence can't be placed in the sequence bank
    #[error("Invalid sequence")]
    Sequence(#[from] SequenceError),

    /// Any other failure that has to do with I/O
    #[error("Something failed with I/O")]
    Io(#[source] io::Error),

    /// Where in the file another error happened
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: Box<ModuleError>,
    },
}

impl ModuleError {
    /// Wrap the error with information on where it happened
    pub fn context<S>(self, message: S) -> Self
    where
        S: Into<String>,
    {
        Self::Context {
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with all context stripped off
    pub fn root(&self) -> &ModuleError {
        match self {
            Self::Context { source, .. } => source.root(),
            error => error,
        }
    }

    /// The full chain of context and cause as a single line
    pub fn report(&self) -> String {
        match self {
            Self::Context { message, source } => format!("{message}: {}", source.report()),
            error => error.to_string(),
        }
    }
}

impl From<io::Error> for ModuleError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::UnexpectedEof => Self::UnexpectedEnd,
            _ => Self::Io(error),
        }
    }
}

/// Errors that might be returned from the `from_path()` functions
#[derive(Debug, Error)]
pub enum FromPathError {
    /// Opening the file itself failed
    #[error("Opening the file failed")]
    FileOpen(#[from] io::Error),

    /// Deserialization failed
    #[error("Reading the file failed")]
    Read(#[from] ModuleError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds() {
        assert_eq!(assert_range(4, 4, 240, "N163 wave size").unwrap(), 4);
        assert_eq!(assert_range(240, 4, 240, "N163 wave size").unwrap(), 240);

        let error = assert_range(3, 4, 240, "N163 wave size").unwrap_err();
        assert!(matches!(
            error,
            ModuleError::OutOfRange {
                field: "N163 wave size",
                value: 3,
                min: 4,
                max: 240
            }
        ));

        assert!(assert_range(241, 4, 240, "N163 wave size").is_err());
        assert!(assert_range(-1i8, 0, 15, "N163 wave sample").is_err());
    }

    #[test]
    fn context() {
        let error = assert_range(16, 0, 15, "N163 wave sample")
            .unwrap_err()
            .context("At wave 0, sample 3")
            .context("At instrument 2");

        assert!(matches!(error.root(), ModuleError::OutOfRange { value: 16, .. }));
        assert_eq!(
            error.report(),
            "At instrument 2: At wave 0, sample 3: N163 wave sample is out of range: expected 0 to 15, got 16"
        );
    }

    #[test]
    fn eof() {
        let error = ModuleError::from(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(matches!(error, ModuleError::UnexpectedEnd));
    }
}
