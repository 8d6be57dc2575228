//! Testing utilities for dirflow runs.
//!
//! This module gives tests everything they need to drive the orchestrator
//! end to end against the built-in loader:
//!
//! - **Fixtures**: temporary input directories and ready-made configs
//! - **Recording**: an observer that keeps every [`PipelineEvent`](crate::PipelineEvent)
//! - **Faults**: stage factories that fail or produce incomplete output
//! - **Assertions**: checks on final output files and teardown order
//!
//! # Quick Start
//!
//! ```no_run
//! use dirflow::testing::*;
//! use dirflow::{BuiltinLoader, Orchestrator};
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let input = write_input_dir(&[("a.txt", "cat dog cat")])?;
//! let work = tempfile::tempdir()?;
//! let config = test_config(work.path());
//! let recorder = Arc::new(RecordingObserver::new());
//!
//! let report = Orchestrator::new(config.clone(), BuiltinLoader::standard(&config.stages))
//!     .with_observer(recorder.clone())
//!     .run(input.path())?;
//!
//! assert_final_counts(&report.final_output_dir, "a.txt", &[("cat", 2), ("dog", 1)]);
//! assert_balanced_teardown(&recorder.events(), 7);
//! # Ok(())
//! # }
//! ```
//!
//! # Fault injection
//!
//! [`loader_with_stage`] builds the standard registry and then swaps one
//! stage's module for a table exporting a different create factory, such as
//! [`failing_reducer_at_run`] or [`dropping_final_writer`].

pub mod assertions;
pub mod faults;
pub mod fixtures;
pub mod recorder;

pub use assertions::*;
pub use faults::*;
pub use fixtures::*;
pub use recorder::*;
