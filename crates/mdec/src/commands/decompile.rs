//! Decompile command.

use std::path::Path;
use std::sync::Arc;

use mdec::symbols::parse_address;
use mdec::{DecompileOutcome, DecompilerConfig, FunctionId, FunctionResolver, Session};
use tracing::{error, info};

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS, ImageArgs, OutputFormat};

/// Handle the `decompile` command.
pub fn cmd_decompile(
    args: &ImageArgs,
    symbols: &Path,
    function: Option<&str>,
    all: bool,
    format: OutputFormat,
    options: DecompilerConfig,
) -> i32 {
    let Some(image) = super::load_image(args) else {
        return EXIT_FAILURE;
    };
    let session = Session::new(Arc::new(image)).with_config(options);
    if let Err(e) = session.load_symbols(symbols) {
        error!(path = %symbols.display(), error = %e, "failed to load symbols");
        return EXIT_FAILURE;
    }

    let ids: Vec<FunctionId> = if all {
        session.registry().functions().iter().map(|f| f.id).collect()
    } else {
        let Some(selector) = function else {
            error!("no function selected");
            return EXIT_FAILURE;
        };
        match find_function(&session, selector) {
            Some(id) => vec![id],
            None => {
                error!(function = selector, "function not declared");
                return EXIT_FAILURE;
            }
        }
    };
    info!(functions = ids.len(), "decompiling");

    let outcomes = session.decompile_functions(&ids);
    let failures = outcomes.iter().filter(|o| !o.is_success()).count();
    if let Err(e) = print_outcomes(&session, &ids, &outcomes, format, all) {
        error!(error = %e, "failed to write output");
        return EXIT_FAILURE;
    }

    info!(succeeded = outcomes.len() - failures, failed = failures, "done");
    if failures == 0 {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

/// Look up a function by name, then by start address.
fn find_function(session: &Session, selector: &str) -> Option<FunctionId> {
    let registry = session.registry();
    registry
        .find_function_by_name(selector)
        .or_else(|| parse_address(selector).and_then(|address| registry.find_function_by_address(address)))
        .map(|function| function.id)
}

fn print_outcomes(
    session: &Session,
    ids: &[FunctionId],
    outcomes: &[DecompileOutcome],
    format: OutputFormat,
    all: bool,
) -> serde_json::Result<()> {
    match format {
        OutputFormat::Json if all => println!("{}", serde_json::to_string_pretty(outcomes)?),
        OutputFormat::Json => {
            for outcome in outcomes {
                println!("{}", serde_json::to_string_pretty(outcome)?);
            }
        }
        OutputFormat::Text => {
            for (id, outcome) in ids.iter().zip(outcomes) {
                match outcome {
                    DecompileOutcome::Success(decompilation) => {
                        println!("{}", mdec::render(decompilation));
                    }
                    DecompileOutcome::Failure { error } => {
                        let name = session
                            .registry()
                            .find_function_by_id(*id)
                            .map_or_else(|| id.to_string(), |f| f.name.clone());
                        println!("// {name}: {error}\n");
                    }
                }
            }
        }
    }
    Ok(())
}
