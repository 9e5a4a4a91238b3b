use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use famidoc_tools::assemble::{assemble, AssembleArgs};
use famidoc_tools::export::{export, ExportArgs};
use famidoc_tools::import::{import, ImportArgs};
use famidoc_tools::inspect::{inspect, InspectArgs};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
enum Cli {
    Inspect(InspectArgs),
    Export(ExportArgs),
    Import(ImportArgs),
    Assemble(AssembleArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse_from(wild::args()) {
        Cli::Inspect(args) => inspect(&args),
        Cli::Export(args) => export(args),
        Cli::Import(args) => import(args),
        Cli::Assemble(args) => assemble(args),
    }
}
