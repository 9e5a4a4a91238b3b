//! The `export` subcommand

use crate::utils::{check_for_overwrite, file_stem};
use anyhow::{Context, Result};
use clap::Args;
use famidoc::{
    document::Document,
    instrument::{Instrument, N163Instrument},
};
use std::{env::current_dir, fs::create_dir_all, path::PathBuf};
use tracing::debug;

/// Export instruments from a module as .fti files
#[derive(Args)]
#[clap(author, version)]
pub struct ExportArgs {
    /// The path to the module to export from
    path: PathBuf,

    /// Indices of the instruments that should be exported. No indices means all instruments.
    index: Vec<u8>,

    /// The destination folder to place the instruments
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Prepend the instrument index to the start of the filename
    #[clap(short = 'p', long)]
    output_pos: bool,

    /// Skip N163 instruments whose waves match an instrument that was already exported
    #[clap(short, long)]
    unique_waves: bool,
}

pub fn export(args: ExportArgs) -> Result<()> {
    let document = Document::from_path(&args.path)
        .with_context(|| format!("Could not read module {}", args.path.display()))?;

    let folder = match args.output {
        Some(folder) => folder,
        None => current_dir().context("Could not fetch current working directory")?,
    };
    create_dir_all(&folder).context("Could not create output directory")?;

    let mut exported_waves = ExportedWaves::default();

    for (index, instrument) in document.instruments() {
        if !args.index.is_empty() && !args.index.contains(&index) {
            continue;
        }

        if args.unique_waves && exported_waves.contains(instrument) {
            debug!(index, "Skipping instrument with duplicate waves");
            continue;
        }

        let mut filename = String::new();
        if args.output_pos {
            filename.push_str(&format!("{:02X}_", index));
        }
        filename.push_str(&file_stem(instrument.name().as_str(), "instrument"));

        let path = folder.join(filename).with_extension("fti");

        if !check_for_overwrite(&path)? {
            continue;
        }

        instrument
            .to_fti_path(&path, document.sequences())
            .with_context(|| format!("Could not write {}", path.display()))?;
        exported_waves.record(instrument);

        println!(
            "{:02X}. {:<16} => {}",
            index,
            instrument.name().as_str(),
            path.to_string_lossy()
        );
    }

    Ok(())
}

/// The N163 instruments written so far, for skipping ones with the same waves
#[derive(Default)]
struct ExportedWaves<'a> {
    written: Vec<&'a N163Instrument>,
}

impl<'a> ExportedWaves<'a> {
    fn contains(&self, instrument: &Instrument) -> bool {
        match instrument.as_n163() {
            Some(n163) => self.written.iter().any(|other| other.is_wave_equal(n163)),
            None => false,
        }
    }

    fn record(&mut self, instrument: &'a Instrument) {
        if let Some(n163) = instrument.as_n163() {
            self.written.push(n163);
        }
    }
}
