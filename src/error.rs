//! Failure taxonomy for a pipeline run.
//!
//! Every failure surfaces as a single [`PipelineError`] at the point it is
//! detected. Nothing is retried: the orchestrator releases the stage modules
//! it holds and hands the error straight back to its caller.

use crate::module::FactoryShape;
use crate::stage::StageKind;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used by the orchestration layer.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The input directory, or a directory the verifier needs, is absent.
    #[error("directory not found: {}", path.display())]
    MissingDirectory { path: PathBuf },

    /// The input directory holds no regular files.
    #[error("no files found to process in {}", path.display())]
    EmptyInput { path: PathBuf },

    /// An input file carries the name reserved for the success marker.
    #[error(
        "input directory {} holds `{name}`, a name reserved for the success marker",
        path.display()
    )]
    ReservedInputName { path: PathBuf, name: String },

    /// The dynamic unit could not be opened.
    #[error("cannot load module {}: {reason}", path.display())]
    ModuleLoad { path: PathBuf, reason: String },

    /// The entry point is absent or does not have the requested factory shape.
    #[error("cannot resolve `{symbol}` as {expected} in {}: {reason}", path.display())]
    SymbolResolution {
        path: PathBuf,
        symbol: String,
        expected: FactoryShape,
        reason: String,
    },

    /// A stage failed while being constructed or run, or produced no output.
    #[error("{stage} stage failed: {source:#}")]
    StageExecution {
        stage: StageKind,
        #[source]
        source: anyhow::Error,
    },

    /// Input and final output directories hold different file sets.
    #[error(
        "final output in {} does not match the input (missing: [{}], unexpected: [{}])",
        output_dir.display(),
        missing.join(", "),
        unexpected.join(", ")
    )]
    IncompleteResult {
        output_dir: PathBuf,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn stage(stage: StageKind, source: anyhow::Error) -> Self {
        Self::StageExecution { stage, source }
    }

    /// Short machine-friendly name of the failure kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingDirectory { .. } => "missing_directory",
            Self::EmptyInput { .. } => "empty_input",
            Self::ReservedInputName { .. } => "reserved_input_name",
            Self::ModuleLoad { .. } => "module_load",
            Self::SymbolResolution { .. } => "symbol_resolution",
            Self::StageExecution { .. } => "stage_execution",
            Self::IncompleteResult { .. } => "incomplete_result",
            Self::Config(_) => "config",
            Self::Io { .. } => "io",
        }
    }
}
