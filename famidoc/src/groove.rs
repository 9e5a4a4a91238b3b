//! Grooves: cyclic tempo patterns of per-row speeds

use std::{fmt, slice};
use thiserror::Error;

/// A cyclic tempo pattern, expressed as a sequence of per-row speed values
///
/// Instead of a fixed speed, a track can play through a groove: row `n` lasts as many
/// ticks as entry `n % len` of the groove. The driver stores grooves as run-length
/// speed-change commands, which is what [`Groove::compiled_size()`] accounts for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Groove {
    entries: Vec<u8>,
}

impl Groove {
    /// The maximum number of entries in a single groove
    pub const MAX_LEN: usize = 128;

    /// Construct an empty groove
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a groove from a list of speeds
    pub fn from_entries(entries: &[u8]) -> Result<Self, GrooveError> {
        if entries.len() > Self::MAX_LEN {
            return Err(GrooveError::TooLong { len: entries.len() });
        }

        Ok(Self {
            entries: entries.to_vec(),
        })
    }

    /// Parse a space-separated list of speeds the way the groove editor's text field does
    ///
    /// Each entry is the number at the start of what's left of the text, clamped to `1..=255`,
    /// with `1` standing in for anything that doesn't start with a number. The text is consumed
    /// up to and including the next space, so doubled spaces repeat the following number. Parsing
    /// stops when no digits remain, when no space remains, or at [`Groove::MAX_LEN`] entries.
    pub fn parse_lenient(text: &str) -> Self {
        let mut entries = Vec::new();
        let mut rest = text;

        while !rest.is_empty() {
            entries.push(leading_speed(rest));

            if entries.len() == Self::MAX_LEN || !rest.contains(|c: char| c.is_ascii_digit()) {
                break;
            }

            match rest.find(' ') {
                Some(space) => rest = &rest[space + 1..],
                None => break,
            }
        }

        Self { entries }
    }

    /// The number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Does the groove have no entries at all?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Truncate or extend the groove
    ///
    /// New entries are 0 and must be set before the groove is used.
    pub fn resize(&mut self, len: usize) -> Result<(), GrooveError> {
        if len > Self::MAX_LEN {
            return Err(GrooveError::TooLong { len });
        }

        self.entries.resize(len, 0);
        Ok(())
    }

    /// Remove all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Retrieve the speed at an index
    pub fn entry(&self, index: usize) -> Result<u8, GrooveError> {
        self.entries
            .get(index)
            .copied()
            .ok_or(GrooveError::OutOfRange {
                index,
                len: self.len(),
            })
    }

    /// Change the speed at an index
    pub fn set_entry(&mut self, index: usize, speed: u8) -> Result<(), GrooveError> {
        let len = self.len();
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(GrooveError::OutOfRange { index, len })?;

        *entry = speed;
        Ok(())
    }

    /// Swap two entries, as the editor's up/down buttons do
    pub fn swap(&mut self, a: usize, b: usize) -> Result<(), GrooveError> {
        let len = self.len();
        for index in [a, b] {
            if index >= len {
                return Err(GrooveError::OutOfRange { index, len });
            }
        }

        self.entries.swap(a, b);
        Ok(())
    }

    /// Iterate over the entries
    pub fn iter(&self) -> slice::Iter<'_, u8> {
        self.entries.iter()
    }

    /// Access the entries as a slice
    pub fn as_slice(&self) -> &[u8] {
        &self.entries
    }

    /// The average number of ticks per row, or 0 for an empty groove
    pub fn average(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }

        let sum: u32 = self.entries.iter().map(|entry| *entry as u32).sum();
        sum as f64 / self.entries.len() as f64
    }

    /// The speed-change command each row needs when the groove is written out as speed effects
    ///
    /// The first row always needs one, every other row only when its speed differs from the
    /// previous row.
    pub fn speed_commands(&self) -> impl Iterator<Item = Option<u8>> + '_ {
        self.entries.iter().enumerate().map(|(index, entry)| {
            if index == 0 || self.entries[index - 1] != *entry {
                Some(*entry)
            } else {
                None
            }
        })
    }

    /// The number of bytes the groove takes up in the driver's groove bank
    ///
    /// Every speed-change command costs 2 bytes, plus 2 bytes to terminate the groove.
    /// An empty groove isn't compiled at all.
    pub fn compiled_size(&self) -> usize {
        match self.speed_commands().flatten().count() {
            0 => 0,
            commands => (commands + 1) * 2,
        }
    }

    /// Double the length, splitting every entry in two halves
    ///
    /// The remainder of an odd entry goes to the first half. Refuses if the result wouldn't
    /// fit, or if any entry is below 2 (which would produce a zero speed).
    pub fn expand(&mut self) -> bool {
        if self.len() > Self::MAX_LEN / 2 || self.entries.iter().any(|entry| *entry < 2) {
            return false;
        }

        let old = std::mem::take(&mut self.entries);
        self.entries = (0..old.len() * 2)
            .map(|i| {
                let source = old[i / 2];
                source / 2 + if i % 2 == 0 { source % 2 } else { 0 }
            })
            .collect();

        true
    }

    /// Halve the length, summing adjacent pairs of entries
    ///
    /// Refuses for odd lengths, and for pairs that would not fit in a single speed value.
    pub fn shrink(&mut self) -> bool {
        if self.len() % 2 == 1 {
            return false;
        }

        let Some(entries) = self
            .entries
            .chunks_exact(2)
            .map(|pair| pair[0].checked_add(pair[1]))
            .collect::<Option<Vec<_>>>()
        else {
            return false;
        };

        self.entries = entries;
        true
    }

    /// Replace the groove with an even distribution of `num` ticks over `denom` rows
    ///
    /// Rows are filled back to front; the longer rows end up at the start of the groove.
    /// Refuses if `denom` is outside `1..=MAX_LEN`, or `num` is outside `denom..=denom * 255`.
    pub fn generate(&mut self, num: usize, denom: usize) -> bool {
        if !(1..=Self::MAX_LEN).contains(&denom) || num < denom || num > denom * 255 {
            return false;
        }

        let mut entries = vec![0; denom];
        for i in (0..num * denom).step_by(num) {
            entries[denom - i / num - 1] = ((i + num) / denom - i / denom) as u8;
        }

        self.entries = entries;
        true
    }

    /// Double the length by splitting every entry into `entry - amount` followed by `amount`
    ///
    /// Refuses if the result wouldn't fit, `amount` is 0, or any entry isn't bigger than `amount`.
    pub fn pad(&mut self, amount: u8) -> bool {
        if self.len() > Self::MAX_LEN / 2
            || amount == 0
            || self.entries.iter().any(|entry| *entry <= amount)
        {
            return false;
        }

        self.entries = self
            .entries
            .iter()
            .flat_map(|entry| [entry - amount, amount])
            .collect();

        true
    }
}

impl fmt::Display for Groove {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (index, entry) in self.entries.iter().enumerate() {
            if index > 0 {
                write!(f, " ")?;
            }
            write!(f, "{entry}")?;
        }

        Ok(())
    }
}

impl<'a> IntoIterator for &'a Groove {
    type Item = &'a u8;
    type IntoIter = slice::Iter<'a, u8>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The fixed set of groove slots in a module
///
/// All grooves share one bank in the driver, so the sum of their compiled sizes may not
/// exceed [`GrooveTable::BANK_BUDGET`]. Editors are expected to check [`GrooveTable::fits_bank()`]
/// before committing a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrooveTable {
    slots: [Option<Groove>; Self::SLOTS],
}

impl GrooveTable {
    /// The number of groove slots
    pub const SLOTS: usize = 32;

    /// The number of bytes available for compiled grooves
    pub const BANK_BUDGET: usize = 255;

    /// Construct a table with all slots empty
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve the groove in a slot, if any
    pub fn get(&self, index: usize) -> Option<&Groove> {
        self.slots.get(index)?.as_ref()
    }

    /// Retrieve the groove in a slot for editing, if any
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Groove> {
        self.slots.get_mut(index)?.as_mut()
    }

    /// Put a groove in a slot, returning the old one
    ///
    /// Empty grooves are stored as an empty slot.
    pub fn set(&mut self, index: usize, groove: Groove) -> Result<Option<Groove>, GrooveError> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(GrooveError::SlotOutOfRange { index })?;

        let groove = if groove.is_empty() { None } else { Some(groove) };
        Ok(std::mem::replace(slot, groove))
    }

    /// Empty a slot, returning the groove it held
    pub fn clear(&mut self, index: usize) -> Option<Groove> {
        self.slots.get_mut(index)?.take()
    }

    /// Empty all slots
    pub fn clear_all(&mut self) {
        self.slots = Default::default();
    }

    /// Swap the contents of two slots
    pub fn swap(&mut self, a: usize, b: usize) -> Result<(), GrooveError> {
        for index in [a, b] {
            if index >= Self::SLOTS {
                return Err(GrooveError::SlotOutOfRange { index });
            }
        }

        self.slots.swap(a, b);
        Ok(())
    }

    /// Is a slot holding a groove?
    pub fn is_used(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Iterate over all slots
    pub fn iter(&self) -> impl Iterator<Item = Option<&Groove>> {
        self.slots.iter().map(Option::as_ref)
    }

    /// The number of bytes all grooves take up together
    pub fn total_compiled_size(&self) -> usize {
        self.iter().flatten().map(Groove::compiled_size).sum()
    }

    /// Do all grooves fit in the driver's groove bank?
    pub fn fits_bank(&self) -> bool {
        self.total_compiled_size() <= Self::BANK_BUDGET
    }
}

/// Errors that can result from accessing a [`Groove`] or [`GrooveTable`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GrooveError {
    /// An entry index past the end of the groove
    #[error("Groove entry {index} is out of range (the groove has {len} entries)")]
    OutOfRange { index: usize, len: usize },

    /// A groove can not hold more than [`Groove::MAX_LEN`] entries
    #[error("A groove of {len} entries exceeds the maximum of {}", Groove::MAX_LEN)]
    TooLong { len: usize },

    /// A slot index past the end of the groove table
    #[error("Groove slot {index} is out of range")]
    SlotOutOfRange { index: usize },
}

/// The speed written at the start of `text`, after any leading whitespace and sign
fn leading_speed(text: &str) -> u8 {
    let text = text.trim_start_matches(|c: char| c.is_ascii_whitespace());
    let (negative, text) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let end = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
    let digits = &text[..end];

    if negative || digits.is_empty() {
        return 1;
    }

    digits
        .parse::<u32>()
        .map_or(u8::MAX, |speed| speed.clamp(1, u8::MAX as u32) as u8)
}
