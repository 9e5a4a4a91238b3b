//! The `assemble` subcommand

use crate::utils::check_for_overwrite;
use anyhow::{Context, Error, Result};
use clap::Args;
use famidoc::{
    document::{Document, Machine},
    driver::{DriverKind, DriverRegistry, NsfHeader, PitchTables},
};
use std::{fs, num::ParseIntError, path::PathBuf};
use tracing::info;

/// Arguments for the `assemble` subcommand
#[derive(Args)]
#[clap(
    author,
    version,
    about = "Select the driver for a module's chips and write the relocated image",
    long_about = None
)]
pub struct AssembleArgs {
    /// The module whose chips decide the driver
    module: PathBuf,

    /// The folder containing the drv_<kind>.bin driver packs
    #[clap(short, long)]
    drivers: PathBuf,

    /// The output path
    #[clap(short, long)]
    output: PathBuf,

    /// The address the driver is loaded at, in hexadecimal
    #[clap(short, long, default_value = "8000", parse(try_from_str = parse_address))]
    load_address: u16,

    /// Prepend an NSF header
    #[clap(long)]
    nsf: bool,

    /// Offset of the driver's init routine from the load address, in hexadecimal
    #[clap(long, default_value = "0", parse(try_from_str = parse_address))]
    init_offset: u16,

    /// Offset of the driver's play routine from the load address, in hexadecimal
    #[clap(long, default_value = "3", parse(try_from_str = parse_address))]
    play_offset: u16,
}

pub fn assemble(args: AssembleArgs) -> Result<()> {
    let document = Document::from_path(&args.module)
        .with_context(|| format!("Could not read module {}", args.module.display()))?;

    let registry = DriverRegistry::from_dir(&args.drivers)
        .with_context(|| format!("Could not load drivers from {}", args.drivers.display()))?;
    info!(count = registry.len(), "Loaded driver packs");

    let chips = document.chips();
    let pack = registry.select(chips).ok_or_else(|| {
        Error::msg(format!(
            "No {} driver pack found for {chips}",
            DriverKind::for_chips(chips).file_name()
        ))
    })?;

    let pitch = match document.machine {
        Machine::Ntsc => PitchTables::ntsc(),
        Machine::Pal => PitchTables::pal(),
    };

    let image = pack
        .assemble(args.load_address, &pitch)
        .with_context(|| format!("Could not assemble the {} driver", pack.kind()))?;

    let mut output = Vec::new();
    if args.nsf {
        let header = NsfHeader::for_document(
            &document,
            args.load_address,
            args.load_address.wrapping_add(args.init_offset),
            args.load_address.wrapping_add(args.play_offset),
        );
        header.to_writer(&mut output)?;
    }
    output.extend_from_slice(&image);

    if check_for_overwrite(&args.output)? {
        fs::write(&args.output, &output)
            .with_context(|| format!("Could not write {}", args.output.display()))?;

        println!(
            "{} driver, {} bytes at ${:04X} => {}",
            pack.kind(),
            image.len(),
            args.load_address,
            args.output.to_string_lossy()
        );
    }

    Ok(())
}

fn parse_address(text: &str) -> Result<u16, ParseIntError> {
    let digits = text.trim_start_matches('$').trim_start_matches("0x");
    u16::from_str_radix(digits, 16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses() {
        assert_eq!(parse_address("8000").unwrap(), 0x8000);
        assert_eq!(parse_address("$C000").unwrap(), 0xC000);
        assert_eq!(parse_address("0x3").unwrap(), 3);
        assert!(parse_address("10000").is_err());
        assert!(parse_address("zz").is_err());
    }
}
