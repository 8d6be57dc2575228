//! An observer that remembers every event.

use crate::observer::{PipelineEvent, PipelineObserver};
use crate::stage::StageKind;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Keeps each [`PipelineEvent`] in arrival order.
///
/// Share it with the orchestrator through an `Arc` and inspect it after the
/// run returns.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PipelineEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.lock().clone()
    }

    /// Stages that reported `StageCompleted`, in order.
    #[must_use]
    pub fn completed_stages(&self) -> Vec<StageKind> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::StageCompleted { stage, .. } => Some(*stage),
                _ => None,
            })
            .collect()
    }

    /// Stages whose module was unloaded, in unload order.
    #[must_use]
    pub fn unloaded_stages(&self) -> Vec<StageKind> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::ModuleUnloaded { stage, .. } => Some(*stage),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded events matching `pred`.
    pub fn count(&self, pred: impl Fn(&PipelineEvent) -> bool) -> usize {
        self.lock().iter().filter(|e| pred(e)).count()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        self.lock().push(event.clone());
    }
}
