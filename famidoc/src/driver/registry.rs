use super::{DriverKind, DriverPack, FromPathError};
use crate::chip::SoundChipSet;
use std::{collections::BTreeMap, path::Path};
use tracing::debug;

/// The driver packs available for assembly, one per [`DriverKind`]
#[derive(Debug, Clone, Default)]
pub struct DriverRegistry {
    packs: BTreeMap<DriverKind, DriverPack>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `drv_<kind>.bin` file found in a directory
    ///
    /// Missing files are skipped. A file that exists but can't be read is an error.
    pub fn from_dir<P>(dir: P) -> Result<Self, FromPathError>
    where
        P: AsRef<Path>,
    {
        let mut registry = Self::new();

        for kind in DriverKind::ALL {
            let path = dir.as_ref().join(kind.file_name());
            if !path.is_file() {
                debug!(%kind, path = %path.display(), "No driver pack");
                continue;
            }

            registry.insert(DriverPack::from_path(&path)?);
        }

        Ok(registry)
    }

    /// Add a pack, replacing and returning the one of the same kind
    pub fn insert(&mut self, pack: DriverPack) -> Option<DriverPack> {
        self.packs.insert(pack.kind(), pack)
    }

    pub fn get(&self, kind: DriverKind) -> Option<&DriverPack> {
        self.packs.get(&kind)
    }

    /// Select the pack that plays a chip set
    ///
    /// When there's no dedicated pack for a single expansion, the all-chip pack is used.
    pub fn select(&self, chips: SoundChipSet) -> Option<&DriverPack> {
        let kind = DriverKind::for_chips(chips);

        self.get(kind).or_else(|| match kind {
            DriverKind::Apu2A03 => None,
            _ => self.get(DriverKind::All),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &DriverPack> {
        self.packs.values()
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }
}
