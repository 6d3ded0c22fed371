//! Disasm command.

use tracing::{error, info};

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS, ImageArgs};

/// Handle the `disasm` command.
pub fn cmd_disasm(args: &ImageArgs, start: Option<u32>, end: Option<u32>) -> i32 {
    let Some(image) = super::load_image(args) else {
        return EXIT_FAILURE;
    };
    let start = start.unwrap_or_else(|| image.base());
    let end = end.unwrap_or_else(|| image.end());
    if start % 4 != 0 || end <= start {
        error!(
            start = format_args!("{start:#x}"),
            end = format_args!("{end:#x}"),
            "invalid range"
        );
        return EXIT_FAILURE;
    }
    info!(
        start = format_args!("{start:#x}"),
        end = format_args!("{end:#x}"),
        "disassembling"
    );

    for instr in mdec::MemoryReader::decode_range(&image, start, end) {
        println!("{:08x}:  {:08x}  {instr}", instr.address, instr.word);
    }
    EXIT_SUCCESS
}
