//! The `import` subcommand

use crate::utils::{check_for_overwrite, iter_files};
use anyhow::{Context, Error, Result};
use clap::Args;
use famidoc::{document::Document, instrument::Instrument};
use std::path::PathBuf;
use tracing::warn;

/// Arguments for the `import` subcommand
#[derive(Args)]
#[clap(author, version, about = "Import .fti's into a module", long_about = None)]
pub struct ImportArgs {
    /// The module to import into
    module: PathBuf,

    /// Paths to the instruments that should be imported, or folders containing them
    instrument: Vec<PathBuf>,

    /// The output path. Defaults to overwriting the module.
    #[clap(short, long)]
    output: Option<PathBuf>,
}

/// Import .fti's into a module
pub fn import(args: ImportArgs) -> Result<()> {
    let mut document = Document::from_path(&args.module)
        .with_context(|| format!("Could not read module {}", args.module.display()))?;

    for entry in iter_files(&args.instrument, true, &["fti"]) {
        let path = entry.path();

        if document.first_free_instrument().is_none() {
            return Err(Error::msg(
                "Reached the maximum instrument count. Aborting import.",
            ));
        }

        let instrument = Instrument::from_fti_path(path, document.sequences_mut())
            .with_context(|| format!("Could not import {}", path.display()))?;

        let chip = instrument.kind().chip();
        if !document.chips().contains_chip(chip) {
            warn!(%chip, path = %path.display(), "The module doesn't use this instrument's chip");
        }

        let index = document
            .add_instrument(instrument)
            .context("No free instrument slot")?;

        println!("{:02X} => {}", index, path.to_string_lossy());
    }

    let output = args.output.as_ref().unwrap_or(&args.module);
    if check_for_overwrite(output)? {
        document
            .to_path(output)
            .with_context(|| format!("Could not write module to {}", output.display()))?;

        println!("Wrote {}", output.to_string_lossy());
    }

    Ok(())
}
