//! Reading, editing and writing NES tracker modules (.ftm), standalone instrument files (.fti)
//! and sound driver packs.
//!
//! A [`Document`](document::Document) holds the module: its chip configuration and channel
//! layout, tracks, instruments, sequences and grooves. Driver packs bundle a sound driver with
//! the tables needed to relocate it, and [`DriverPack::assemble()`](driver::DriverPack::assemble)
//! produces a program image for a given load address.
//!
//! This crate does not play music or compile pattern data.
//!
//! # Compatibility
//!
//! Modules use the tracker's block container and field encoding, but the contents of the
//! `HEADER` and 2A03 instrument blocks are a reduced layout of their own. Files written by the
//! tracker itself can't be opened, and files written here can't be opened by the tracker.
//! Standalone `.fti` instruments follow the tracker's layout.

pub mod channel_map;
pub mod chip;
pub mod document;
pub mod driver;
pub mod groove;
pub mod instrument;
pub mod name;

pub use ux::u4;
