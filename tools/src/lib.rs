//! # famidoc tools
//!
//! A command-line utility for NES tracker modules (`.ftm`), instrument files (`.fti`) and sound
//! driver packs (`drv_<kind>.bin`). Set `RUST_LOG` to change how much is logged (`info` by
//! default).
//!
//! ## Inspect
//!
//! ```console
//! USAGE:
//!     famidoc-tools inspect [OPTIONS] [PATH]...
//!
//! ARGS:
//!     <PATH>...    The path(s) to inspect
//!
//! OPTIONS:
//!     -h, --help         Print help information
//!     -r, --recursive    Search the folder recursively
//!     -V, --version      Print version information
//! ```
//!
//! ### Example
//!
//! ```console
//! > famidoc-tools inspect castle.ftm
//! castle.ftm                      2A03 + N163 | 9 channels | Ntsc
//!   T00 | Castle           | G00 | 150 BPM |  64 rows
//!   I00 | 2A03 | Bass
//!   I01 | N163 | Organ
//!   G00 | 6 5
//!   Sequences 3 | Grooves 6/255
//! ```
//!
//! ## Export
//!
//! ```console
//! USAGE:
//!     famidoc-tools export [OPTIONS] <PATH> [INDEX]...
//!
//! ARGS:
//!     <PATH>        The path to the module to export from
//!     <INDEX>...    Indices of the instruments that should be exported. No indices means all
//!                   instruments
//!
//! OPTIONS:
//!     -h, --help               Print help information
//!     -o, --output <OUTPUT>    The destination folder to place the instruments
//!     -p, --output-pos         Prepend the instrument index to the start of the filename
//!     -u, --unique-waves       Skip N163 instruments whose waves match an instrument that was
//!                              already exported
//!     -V, --version            Print version information
//! ```
//!
//! ## Import
//!
//! ```console
//! USAGE:
//!     famidoc-tools import [OPTIONS] <MODULE> [INSTRUMENT]...
//!
//! ARGS:
//!     <MODULE>           The module to import into
//!     <INSTRUMENT>...    Paths to the instruments that should be imported, or folders
//!                        containing them
//!
//! OPTIONS:
//!     -h, --help               Print help information
//!     -o, --output <OUTPUT>    The output path. Defaults to overwriting the module
//!     -V, --version            Print version information
//! ```
//!
//! ## Assemble
//!
//! ```console
//! USAGE:
//!     famidoc-tools assemble [OPTIONS] --drivers <DRIVERS> --output <OUTPUT> <MODULE>
//!
//! ARGS:
//!     <MODULE>    The module whose chips decide the driver
//!
//! OPTIONS:
//!     -d, --drivers <DRIVERS>              The folder containing the drv_<kind>.bin driver packs
//!     -h, --help                           Print help information
//!         --init-offset <INIT_OFFSET>      Offset of the driver's init routine [default: 0]
//!     -l, --load-address <LOAD_ADDRESS>    The address the driver is loaded at [default: 8000]
//!         --nsf                            Prepend an NSF header
//!     -o, --output <OUTPUT>                The output path
//!         --play-offset <PLAY_OFFSET>      Offset of the driver's play routine [default: 3]
//!     -V, --version                        Print version information
//! ```

pub mod assemble;
pub mod export;
pub mod import;
pub mod inspect;
pub(crate) mod utils;
