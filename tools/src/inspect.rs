//! The `inspect` subcommand

use crate::utils::{has_extension, iter_files};
use anyhow::{Context, Result};
use clap::Args;
use famidoc::{
    document::Document,
    driver::DriverPack,
    groove::GrooveTable,
    instrument::{Instrument, SequenceBank, SequenceType},
};
use std::path::{Path, PathBuf};

/// Arguments for the `inspect` subcommand
#[derive(Args)]
#[clap(
    author,
    version,
    about = "Inspect .ftm, .fti and driver pack files, or even entire directories for their contents",
    long_about = None
)]
pub struct InspectArgs {
    /// The path(s) to inspect
    path: Vec<PathBuf>,

    /// Search the folder recursively
    #[clap(short, long)]
    recursive: bool,
}

pub fn inspect(args: &InspectArgs) -> Result<()> {
    let paths: Vec<_> = iter_files(&args.path, args.recursive, &["ftm", "fti", "bin"])
        .map(|entry| entry.into_path())
        .collect();

    if let Some((last, rest)) = paths.split_last() {
        for path in rest {
            print(path)?;
            println!();
        }

        print(last)?;
    }

    Ok(())
}

fn print(path: &Path) -> Result<()> {
    let file_name = path.file_name().unwrap_or_default().to_string_lossy();

    if has_extension(path, "ftm") {
        let document = Document::from_path(path)
            .with_context(|| format!("Could not read module {}", path.display()))?;
        print_module(&file_name, &document);
    } else if has_extension(path, "fti") {
        let mut bank = SequenceBank::new();
        let instrument = Instrument::from_fti_path(path, &mut bank)
            .with_context(|| format!("Could not read instrument {}", path.display()))?;
        print_instrument(&file_name, &instrument);
    } else {
        let pack = DriverPack::from_path(path)
            .with_context(|| format!("Could not read driver pack {}", path.display()))?;
        print_driver(&file_name, &pack);
    }

    Ok(())
}

fn print_module(file_name: &str, document: &Document) {
    println!(
        "{:<32}{} | {} channels | {:?}",
        file_name,
        document.chips(),
        document.channel_map().channel_count(),
        document.machine
    );

    for (index, track) in document.tracks().iter().enumerate() {
        let speed = match track.groove() {
            Some(groove) => format!("G{groove:02}"),
            None => format!("{:>3}", track.speed()),
        };

        println!(
            "  T{index:02} | {:<16} | {speed} | {:>3} BPM | {:>3} rows",
            track.title.as_str(),
            track.tempo(),
            track.rows()
        );
    }

    for (index, instrument) in document.instruments() {
        println!(
            "  I{index:02} | {:<4} | {}",
            instrument.kind().to_string(),
            instrument.name().as_str()
        );
    }

    let grooves = document.grooves();
    for (index, groove) in grooves.iter().enumerate() {
        if let Some(groove) = groove {
            println!("  G{index:02} | {groove}");
        }
    }

    println!(
        "  Sequences {} | Grooves {}/{}",
        document.sequences().len(),
        grooves.total_compiled_size(),
        GrooveTable::BANK_BUDGET
    );
}

fn print_instrument(file_name: &str, instrument: &Instrument) {
    println!(
        "{:<32}{} | {}",
        file_name,
        instrument.kind(),
        instrument.name().as_str()
    );

    let base = instrument.base();
    for ty in SequenceType::ALL {
        if base.slot(ty).enabled {
            println!("  {ty}");
        }
    }

    if let Some(n163) = instrument.as_n163() {
        println!(
            "  {} waves of {} samples at {}",
            n163.wave_count(),
            n163.wave_size(),
            n163.wave_pos()
        );
    }
}

fn print_driver(file_name: &str, pack: &DriverPack) {
    println!(
        "{:<32}{} driver | {} bytes | {} words, {} pitch tables, {} addresses",
        file_name,
        pack.kind(),
        pack.code_size(),
        pack.word_reloc_size(),
        pack.freq_table_size() / 2,
        pack.adr_reloc_size() / 2
    );

    for (offset, table) in pack.freq_entries() {
        println!("  {offset:#06x} | {table}");
    }
}
