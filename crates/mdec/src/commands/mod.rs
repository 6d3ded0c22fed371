//! Command implementations.

mod decompile;
mod disasm;

use std::path::Path;

use mdec::MemoryImage;
use tracing::error;

use crate::cli::{Cli, Commands, ImageArgs};

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    match &cli.command {
        Commands::Disasm { image, start, end } => disasm::cmd_disasm(image, *start, *end),
        Commands::Decompile {
            image,
            symbols,
            function,
            all,
            format,
            max_rounds,
            no_propagation,
            keep_frame,
            jobs,
        } => {
            let options = mdec::DecompilerConfig::new()
                .with_max_analysis_rounds(*max_rounds)
                .with_propagate_expressions(!*no_propagation)
                .with_elide_frame(!*keep_frame)
                .with_jobs(*jobs);
            decompile::cmd_decompile(
                image,
                symbols,
                function.as_deref(),
                *all,
                *format,
                options,
            )
        }
    }
}

/// Load the raw image named by `args`.
fn load_image(args: &ImageArgs) -> Option<MemoryImage> {
    match read_image(&args.image, args.base) {
        Ok(image) => Some(image),
        Err(e) => {
            error!(path = %args.image.display(), error = %e, "failed to read image");
            None
        }
    }
}

fn read_image(path: &Path, base: u32) -> std::io::Result<MemoryImage> {
    Ok(MemoryImage::new(base, std::fs::read(path)?))
}
