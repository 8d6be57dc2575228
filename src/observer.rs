//! Pipeline observers: hooks for logging, metrics, and tests.
//!
//! The orchestrator reports what it is doing as [`PipelineEvent`]s at fixed
//! checkpoints and never writes to the console itself. Observers decide what
//! to do with them: [`TracingObserver`] turns them into `tracing` events,
//! `MetricsObserver` aggregates them, and the recording observer in
//! [`testing`](crate::testing) keeps them for assertions.

use crate::stage::StageKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A checkpoint reached during a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineEvent {
    RunStarted {
        run_id: String,
        input_dir: PathBuf,
    },
    ModuleLoaded {
        stage: StageKind,
        path: PathBuf,
    },
    StageStarted {
        stage: StageKind,
    },
    StageCompleted {
        stage: StageKind,
        elapsed: Duration,
    },
    /// A stage could not be opened, constructed, or run.
    StageFailed {
        stage: StageKind,
        error: String,
    },
    /// A writer stage finished; `dir` is what it wrote.
    OutputWritten {
        stage: StageKind,
        dir: PathBuf,
    },
    InstanceDestroyed {
        stage: StageKind,
    },
    ModuleUnloaded {
        stage: StageKind,
        path: PathBuf,
    },
    ConsistencyChecked {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    RunCompleted {
        final_dir: PathBuf,
        marker: PathBuf,
    },
    RunFailed {
        error: String,
    },
}

pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// Default observer: forwards events to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::RunStarted { run_id, input_dir } => {
                info!(%run_id, input = %input_dir.display(), "kicking off MapReduce operations");
            }
            PipelineEvent::ModuleLoaded { stage, path } => {
                debug!(%stage, path = %path.display(), "module loaded");
            }
            PipelineEvent::StageStarted { stage } => debug!(%stage, "stage started"),
            PipelineEvent::StageCompleted { stage, elapsed } => {
                info!(%stage, elapsed_ms = elapsed.as_millis() as u64, "stage completed");
            }
            PipelineEvent::StageFailed { stage, error } => warn!(%stage, %error, "stage failed"),
            PipelineEvent::OutputWritten { stage, dir } => {
                info!(%stage, "results have been written to {}", dir.display());
            }
            PipelineEvent::InstanceDestroyed { stage } => debug!(%stage, "instance destroyed"),
            PipelineEvent::ModuleUnloaded { stage, path } => {
                debug!(%stage, path = %path.display(), "module unloaded");
            }
            PipelineEvent::ConsistencyChecked {
                missing,
                unexpected,
            } => {
                if missing.is_empty() && unexpected.is_empty() {
                    info!("input and final output hold the same files");
                } else {
                    warn!(?missing, ?unexpected, "input and final output differ");
                }
            }
            PipelineEvent::RunCompleted { final_dir, marker } => {
                info!(
                    final_dir = %final_dir.display(),
                    marker = %marker.display(),
                    "run succeeded"
                );
            }
            PipelineEvent::RunFailed { error } => warn!(%error, "run failed"),
        }
    }
}

/// Fan-out to several observers, in registration order.
#[derive(Clone, Default)]
pub struct Observers {
    inner: Vec<Arc<dyn PipelineObserver>>,
}

impl Observers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.inner.push(observer);
        self
    }

    pub fn push(&mut self, observer: Arc<dyn PipelineObserver>) {
        self.inner.push(observer);
    }
}

impl PipelineObserver for Observers {
    fn on_event(&self, event: &PipelineEvent) {
        for observer in &self.inner {
            observer.on_event(event);
        }
    }
}
