//! Error types for the guest host shim.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ShimError {
    #[error("failed to read module {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("engine creation failed: {0}")]
    EngineCreation(String),
    #[error("module compilation failed: {0}")]
    Compile(String),
    #[error("host call registration failed: {0}")]
    Link(String),
    #[error("instantiation failed: {0}")]
    Instantiate(String),
    #[error("export '{name}' not found (expected {kind})")]
    MissingExport { name: String, kind: &'static str },
    #[error("entry function '{name}' must take no parameters, found {params}")]
    EntrySignature { name: String, params: usize },
    #[error("failed to write status output: {0}")]
    Output(#[from] std::io::Error),
}

pub type ShimResult<T> = Result<T, ShimError>;
