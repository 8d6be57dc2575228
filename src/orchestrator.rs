//! The pipeline orchestrator.
//!
//! A run checks the input directory, then drives the seven stage instances
//! in order, feeding each stage the output of the one before it:
//!
//! ```text
//! input dir → InputReader → Mapper → MapOutputWriter → Shuffler
//!           → ShuffleOutputWriter → Reducer → FinalOutputWriter → final dir
//! ```
//!
//! Every opened stage module is pushed onto a [`ModuleStack`]. Whether the
//! stages all succeed or one of them fails, the stack is torn down before
//! anything else happens, so each instance is destroyed and each module
//! unloaded exactly once. Only then is the final directory reconciled
//! against the input and the success marker written.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::io::files::regular_file_names;
use crate::module::{BuiltinLoader, LoaderKind, ModuleLoader, ModuleStack, StageModule};
use crate::observer::{PipelineEvent, PipelineObserver, TracingObserver};
use crate::stage::roles::{
    Map, ReadInput, Reduce, Shuffle, WriteFinalOutput, WriteMapOutput, WriteShuffleOutput,
};
use crate::stage::{StageContext, StageKind, StageRole};
use crate::verify::{verify, write_success_marker};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Where a successful run left its results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub map_output_dir: PathBuf,
    pub shuffle_output_dir: PathBuf,
    pub final_output_dir: PathBuf,
    pub marker: PathBuf,
    /// Number of input files processed.
    pub files: usize,
}

struct StageDirs {
    map_output_dir: PathBuf,
    shuffle_output_dir: PathBuf,
    final_output_dir: PathBuf,
}

pub struct Orchestrator {
    config: PipelineConfig,
    loader: Box<dyn ModuleLoader>,
    observer: Arc<dyn PipelineObserver>,
}

impl Orchestrator {
    /// Orchestrator over an explicit loader, reporting to `tracing`.
    pub fn new(config: PipelineConfig, loader: impl ModuleLoader + 'static) -> Self {
        Self {
            config,
            loader: Box::new(loader),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Orchestrator with the loader selected by `config.loader`.
    ///
    /// # Errors
    /// `Config` if the configuration is invalid or asks for a loader this
    /// build does not include.
    pub fn from_config(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        let orchestrator = match config.loader {
            LoaderKind::Builtin => {
                let loader = BuiltinLoader::standard(&config.stages);
                Self::new(config, loader)
            }
            #[cfg(feature = "dylib")]
            LoaderKind::Dylib => Self::new(config, crate::module::DylibLoader::new()),
            #[cfg(not(feature = "dylib"))]
            LoaderKind::Dylib => {
                return Err(PipelineError::Config(
                    "the `dylib` loader is not available in this build".into(),
                ));
            }
        };
        Ok(orchestrator)
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run the whole pipeline over `input_dir`.
    ///
    /// # Errors
    /// Any [`PipelineError`]; by the time it is returned every module opened
    /// during the run has been released and no success marker exists.
    pub fn run(&self, input_dir: impl AsRef<Path>) -> PipelineResult<RunReport> {
        let input_dir = input_dir.as_ref();
        let run_id = Uuid::new_v4().to_string();
        self.emit(PipelineEvent::RunStarted {
            run_id: run_id.clone(),
            input_dir: input_dir.to_path_buf(),
        });

        let result = self.run_inner(input_dir, run_id);
        match &result {
            Ok(report) => self.emit(PipelineEvent::RunCompleted {
                final_dir: report.final_output_dir.clone(),
                marker: report.marker.clone(),
            }),
            Err(e) => self.emit(PipelineEvent::RunFailed {
                error: e.to_string(),
            }),
        }
        result
    }

    fn run_inner(&self, input_dir: &Path, run_id: String) -> PipelineResult<RunReport> {
        self.config.validate()?;
        let files = self.check_input(input_dir)?;

        let run_dir = self.config.work_dir.join(&run_id);
        let ctx = StageContext::new(run_id.clone(), run_dir.clone(), self.config.map_buffer_size);

        let mut stack = ModuleStack::new();
        let dirs = self.run_stages(input_dir, &ctx, &mut stack);
        stack.teardown(self.observer.as_ref());
        let dirs = dirs?;

        let report = verify(input_dir, &dirs.final_output_dir)?;
        self.emit(PipelineEvent::ConsistencyChecked {
            missing: report.missing.iter().cloned().collect(),
            unexpected: report.unexpected.iter().cloned().collect(),
        });
        report.into_result(&dirs.final_output_dir)?;

        let marker = write_success_marker(&dirs.final_output_dir, &self.config.success_marker)?;
        Ok(RunReport {
            run_id,
            run_dir,
            map_output_dir: dirs.map_output_dir,
            shuffle_output_dir: dirs.shuffle_output_dir,
            final_output_dir: dirs.final_output_dir,
            marker,
            files,
        })
    }

    /// The input must be an existing directory with at least one regular file,
    /// none of them named like the success marker.
    fn check_input(&self, input_dir: &Path) -> PipelineResult<usize> {
        if !input_dir.is_dir() {
            return Err(PipelineError::MissingDirectory {
                path: input_dir.to_path_buf(),
            });
        }
        let names = regular_file_names(input_dir)
            .map_err(|e| PipelineError::io(input_dir, std::io::Error::other(format!("{e:#}"))))?;
        if names.is_empty() {
            return Err(PipelineError::EmptyInput {
                path: input_dir.to_path_buf(),
            });
        }
        if names.contains(&self.config.success_marker) {
            return Err(PipelineError::ReservedInputName {
                path: input_dir.to_path_buf(),
                name: self.config.success_marker.clone(),
            });
        }
        Ok(names.len())
    }

    fn run_stages(
        &self,
        input_dir: &Path,
        ctx: &StageContext,
        stack: &mut ModuleStack,
    ) -> PipelineResult<StageDirs> {
        let contents = self.stage::<ReadInput>(input_dir.to_path_buf(), ctx, stack)?;
        let mapped = self.stage::<Map>(contents, ctx, stack)?;
        let map_output_dir = self.written::<WriteMapOutput>(mapped, ctx, stack)?;
        let shuffled = self.stage::<Shuffle>(map_output_dir.clone(), ctx, stack)?;
        let shuffle_output_dir = self.written::<WriteShuffleOutput>(shuffled, ctx, stack)?;
        let reduced = self.stage::<Reduce>(shuffle_output_dir.clone(), ctx, stack)?;
        let final_output_dir = self.written::<WriteFinalOutput>(reduced, ctx, stack)?;
        Ok(StageDirs {
            map_output_dir,
            shuffle_output_dir,
            final_output_dir,
        })
    }

    /// Open, construct, and run one stage; its guard always lands on `stack`.
    fn stage<R: StageRole>(
        &self,
        input: R::Input,
        ctx: &StageContext,
        stack: &mut ModuleStack,
    ) -> PipelineResult<R::Output> {
        let stage = R::KIND;
        let spec = self.config.stages.get(stage);
        let mut module = StageModule::<R>::open(self.loader.as_ref(), spec)
            .inspect_err(|e| self.stage_failed(stage, e))?;
        self.emit(PipelineEvent::ModuleLoaded {
            stage,
            path: module.path().to_path_buf(),
        });

        self.emit(PipelineEvent::StageStarted { stage });
        let started = Instant::now();
        let result = module.execute(input, ctx);
        stack.push(Box::new(module));
        match &result {
            Ok(_) => self.emit(PipelineEvent::StageCompleted {
                stage,
                elapsed: started.elapsed(),
            }),
            Err(e) => self.stage_failed(stage, e),
        }
        result
    }

    /// A writer stage; reports the directory it produced.
    fn written<R: StageRole<Output = PathBuf>>(
        &self,
        input: R::Input,
        ctx: &StageContext,
        stack: &mut ModuleStack,
    ) -> PipelineResult<PathBuf> {
        let dir = self.stage::<R>(input, ctx, stack)?;
        self.emit(PipelineEvent::OutputWritten {
            stage: R::KIND,
            dir: dir.clone(),
        });
        Ok(dir)
    }

    fn stage_failed(&self, stage: StageKind, error: &PipelineError) {
        self.emit(PipelineEvent::StageFailed {
            stage,
            error: error.to_string(),
        });
    }

    fn emit(&self, event: PipelineEvent) {
        self.observer.on_event(&event);
    }
}
