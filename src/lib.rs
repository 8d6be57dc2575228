//! # dirflow
//!
//! A **local Map-Reduce engine** over a directory of files. Every stage of the
//! job is a separately loaded module, and the run only counts as successful
//! once the final output has been checked against the input.
//!
//! ## Key Features
//!
//! - **Seven pluggable stages** - input reader, mapper, shuffler, reducer, and three
//!   output writers
//! - **Type-checked entry points** - every resolved factory must match a known signature
//! - **Scoped teardown** - instances are destroyed and modules unloaded exactly once
//! - **Consistency check** - a success marker is written only when input and output
//!   file names match
//! - **Two loaders** - a built-in registry, or shared objects opened at runtime (`dylib` feature)
//! - **Observers** - structured `tracing` output and optional metrics
//!
//! ## Quick Start
//!
//! ```no_run
//! use dirflow::*;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let config = PipelineConfig::default().with_work_dir("./output");
//! let orchestrator = Orchestrator::from_config(config)?;
//!
//! let report = orchestrator.run("./input")?;
//! println!("results in {}", report.final_output_dir.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Stages
//!
//! A [`Stage`] is constructed from its input by a create factory, run once,
//! and then asked for its output. Stages are chained in a fixed order:
//!
//! ```text
//! input dir → InputReader → Mapper → MapOutputWriter → Shuffler
//!           → ShuffleOutputWriter → Reducer → FinalOutputWriter → final dir
//! ```
//!
//! ### Modules
//!
//! A module exports one create factory and one destroy factory under
//! configurable symbol names. A [`ModuleLoader`] opens modules by path; the
//! resolved symbols come back as a [`Factory`] whose variant is checked
//! against the stage before use. [`StageModule`] owns the module and the
//! instance and releases both in the right order.
//!
//! ### Runs
//!
//! [`Orchestrator::run`] creates a fresh run directory named by a UUID under
//! the configured work directory. Intermediate outputs are JSON Lines; the
//! final output is one CSV per input file with a `key,count` header.
//!
//! ## Module Overview
//!
//! - [`orchestrator`] - Drives a run from input checks to the success marker
//! - [`module`] - Loaders, factory shapes, and the stage module guard
//! - [`stage`] - The stage trait, stage kinds, and typed stage roles
//! - [`plugins`] - Built-in word-count stages
//! - [`verify`] - File name reconciliation and the success marker
//! - [`config`] - TOML configuration
//! - [`observer`] - Run events and their consumers
//! - [`io`] - JSON Lines, CSV, and directory helpers
//! - [`testing`] - Fixtures, fault injection, and assertions for tests

pub mod config;
pub mod error;
pub mod io;
#[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod module;
pub mod observer;
pub mod orchestrator;
pub mod plugins;
pub mod stage;
pub mod testing;
pub mod types;
pub mod verify;

// Re-exports
pub use config::{PipelineConfig, StageModuleConfig, StageModules};
pub use error::{PipelineError, PipelineResult};
pub use module::{
    BuiltinLoader, Factory, FactoryShape, LoadedModule, LoaderKind, ModuleLoader, ModuleStack,
    ModuleTable, StageModule, Teardown,
};
pub use observer::{Observers, PipelineEvent, PipelineObserver, TracingObserver};
pub use orchestrator::{Orchestrator, RunReport};
pub use stage::{Stage, StageBox, StageContext, StageKind, StageRole};
pub use types::{
    DirectoryContents, KeyCount, LineRecords, MapRecord, MapperOutput, RecordChunk, ReducedOutput,
    ShuffleGroup, ShuffledOutput,
};
pub use verify::{ConsistencyReport, reconcile, verify, write_success_marker};

#[cfg(feature = "dylib")]
pub use module::DylibLoader;

#[cfg(feature = "metrics")]
pub use metrics::{MetricsCollector, MetricsObserver};
