//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use mdec::symbols::parse_address;

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "mdec")]
#[command(about = "Emotion Engine MIPS decompiler - raw images to typed pseudo-code")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (sets RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Raw memory image and its load address.
#[derive(Args, Clone, Debug)]
pub struct ImageArgs {
    /// Raw little-endian image
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// Address of the first byte of the image
    #[arg(long, value_parser = address_arg)]
    pub base: u32,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Disassemble a range of the image
    Disasm {
        #[command(flatten)]
        image: ImageArgs,

        /// First address (defaults to the base)
        #[arg(long, value_parser = address_arg)]
        start: Option<u32>,

        /// End address, exclusive (defaults to the end of the image)
        #[arg(long, value_parser = address_arg)]
        end: Option<u32>,
    },
    /// Decompile functions declared in a symbol file
    Decompile {
        #[command(flatten)]
        image: ImageArgs,

        /// JSON file declaring structures and functions
        #[arg(long, value_name = "FILE")]
        symbols: PathBuf,

        /// Function name or address
        #[arg(short, long, required_unless_present = "all", conflicts_with = "all")]
        function: Option<String>,

        /// Decompile every declared function
        #[arg(long)]
        all: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Analyzer rounds before giving up
        #[arg(long, default_value_t = mdec::DEFAULT_MAX_ANALYSIS_ROUNDS)]
        max_rounds: usize,

        /// Keep every lifted assignment (no copy propagation or inlining)
        #[arg(long)]
        no_propagation: bool,

        /// Keep register spills and stack pointer adjustment
        #[arg(long)]
        keep_frame: bool,

        /// Number of parallel jobs (0 = auto)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,
    },
}

/// Output format for decompile command.
#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// C-like pseudo-code (default)
    #[default]
    Text,
    /// Serialized decompilation artifact
    Json,
}

fn address_arg(s: &str) -> Result<u32, String> {
    parse_address(s).ok_or_else(|| format!("invalid address: {s}"))
}
