use mdec_types::FunctionId;
use thiserror::Error;

/// Decompiler errors. Every variant is reported per function.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Decode error: {0}")]
    Decode(#[from] mdec_isa::DecodeError),
    #[error("Type error: {0}")]
    Type(#[from] mdec_types::TypeError),
    #[error("Control flow error: {0}")]
    Cfg(#[from] mdec_cfg::CfgError),
    #[error("Analysis did not converge after {rounds} rounds")]
    AnalysisDidNotConverge { rounds: usize },
    #[error("Unknown function {0}")]
    UnknownFunction(FunctionId),
    #[error("Invalid symbol file: {0}")]
    Symbols(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
