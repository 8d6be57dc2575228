//! Scoped ownership of a loaded stage module and the instance created from it.
//!
//! A [`StageModule`] owns the module handle, both factories, and (once
//! constructed) the stage instance. Releasing it always destroys the
//! instance through the module's own destroy factory first and unloads the
//! module second. Release happens either explicitly through [`Teardown`],
//! which consumes the guard, or implicitly on drop, so a second release
//! cannot be expressed.

use super::{LoadedModule, ModuleLoader};
use crate::config::StageModuleConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::observer::{PipelineEvent, PipelineObserver};
use crate::stage::{CreateFn, DestroyFn, StageBox, StageContext, StageKind, StageRole};
use anyhow::anyhow;
use std::path::{Path, PathBuf};

pub struct StageModule<R: StageRole> {
    path: PathBuf,
    create: CreateFn<R::Input, R::Output>,
    destroy: DestroyFn<R::Output>,
    instance: Option<StageBox<R::Output>>,
    module: Option<Box<dyn LoadedModule>>,
}

impl<R: StageRole> StageModule<R> {
    /// Load the module described by `spec` and resolve both of its factories.
    ///
    /// # Errors
    /// `ModuleLoad` if the module cannot be opened, `SymbolResolution` if
    /// either factory is missing or has the wrong shape. A module that was
    /// opened is unloaded again before the error is returned.
    pub fn open(loader: &dyn ModuleLoader, spec: &StageModuleConfig) -> PipelineResult<Self> {
        let module = loader.load(&spec.path)?;

        let create_shape = R::KIND.create_shape();
        let create = module
            .resolve(&spec.create_symbol, create_shape)
            .and_then(|f| {
                R::create_fn(f).ok_or_else(|| {
                    shape_mismatch(module.path(), &spec.create_symbol, f.shape(), create_shape)
                })
            })?;

        let destroy_shape = R::KIND.destroy_shape();
        let destroy = module
            .resolve(&spec.destroy_symbol, destroy_shape)
            .and_then(|f| {
                R::destroy_fn(f).ok_or_else(|| {
                    shape_mismatch(module.path(), &spec.destroy_symbol, f.shape(), destroy_shape)
                })
            })?;

        Ok(Self {
            path: spec.path.clone(),
            create,
            destroy,
            instance: None,
            module: Some(module),
        })
    }

    #[must_use]
    pub fn kind(&self) -> StageKind {
        R::KIND
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an instance currently exists.
    #[must_use]
    pub fn is_constructed(&self) -> bool {
        self.instance.is_some()
    }

    /// Construct the instance from `input`, run it once, and take its output.
    ///
    /// The instance stays alive inside the guard until teardown.
    ///
    /// # Errors
    /// `StageExecution` if construction or `run` fails, if the stage exposes
    /// no output, or if the guard already executed.
    pub fn execute(&mut self, input: R::Input, ctx: &StageContext) -> PipelineResult<R::Output> {
        if self.instance.is_some() {
            return Err(PipelineError::stage(
                R::KIND,
                anyhow!("stage instance was already executed"),
            ));
        }
        let created = (self.create)(input, ctx).map_err(detached::<R>)?;
        let instance = self.instance.insert(created);
        instance.run().map_err(detached::<R>)?;
        instance.take_output().ok_or_else(|| {
            PipelineError::stage(R::KIND, anyhow!("stage finished without exposing output"))
        })
    }

    /// Destroy the instance, then unload the module.
    fn release(&mut self) {
        if let Some(instance) = self.instance.take() {
            (self.destroy)(instance);
        }
        self.module.take();
    }
}

/// Copy a stage error into host-owned memory.
///
/// An error raised by module code may carry a vtable that lives inside the
/// module, so it must not outlive the module. Only the rendered chain is kept
/// and the original is dropped here, while the module is still loaded.
fn detached<R: StageRole>(err: anyhow::Error) -> PipelineError {
    let message = format!("{err:#}");
    drop(err);
    PipelineError::stage(R::KIND, anyhow::Error::msg(message))
}

fn shape_mismatch(
    path: &Path,
    symbol: &str,
    found: super::FactoryShape,
    expected: super::FactoryShape,
) -> PipelineError {
    PipelineError::SymbolResolution {
        path: path.to_path_buf(),
        symbol: symbol.to_string(),
        expected,
        reason: format!("resolved as {found}"),
    }
}

impl<R: StageRole> Drop for StageModule<R> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Type-erased release of a [`StageModule`].
pub trait Teardown {
    fn kind(&self) -> StageKind;

    /// Destroy the instance and unload the module, reporting each step.
    fn teardown(self: Box<Self>, observer: &dyn PipelineObserver);
}

impl<R: StageRole> Teardown for StageModule<R> {
    fn kind(&self) -> StageKind {
        R::KIND
    }

    fn teardown(mut self: Box<Self>, observer: &dyn PipelineObserver) {
        let stage = R::KIND;
        if let Some(instance) = self.instance.take() {
            (self.destroy)(instance);
            observer.on_event(&PipelineEvent::InstanceDestroyed { stage });
        }
        if let Some(module) = self.module.take() {
            drop(module);
            observer.on_event(&PipelineEvent::ModuleUnloaded {
                stage,
                path: self.path.clone(),
            });
        }
    }
}

/// Guards of one run, released together once the run stops.
#[derive(Default)]
pub struct ModuleStack {
    guards: Vec<Box<dyn Teardown>>,
}

impl ModuleStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, guard: Box<dyn Teardown>) {
        self.guards.push(guard);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Release every guard, most recently opened first.
    pub fn teardown(&mut self, observer: &dyn PipelineObserver) {
        while let Some(guard) = self.guards.pop() {
            guard.teardown(observer);
        }
    }
}
