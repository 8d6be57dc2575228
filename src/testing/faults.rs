//! Stage factories that misbehave on purpose, and a loader to plug them in.

use crate::config::StageModules;
use crate::module::{BuiltinLoader, Factory, ModuleTable};
use crate::plugins::{builtin_factories, create_final_writer};
use crate::stage::{Stage, StageBox, StageContext, StageKind};
use crate::types::ReducedOutput;
use anyhow::{Result, bail};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// File name [`padded_final_writer`] adds to the final output.
pub const UNEXPECTED_OUTPUT: &str = "not-from-input.txt";

/// Standard built-in registry, except that `kind`'s module exports `create`
/// as its create symbol. The destroy symbol keeps the built-in factory.
///
/// # Example
///
/// ```
/// use dirflow::testing::{failing_reducer_at_run, loader_with_stage};
/// use dirflow::{Factory, StageKind, StageModules};
///
/// let loader = loader_with_stage(
///     &StageModules::default(),
///     StageKind::Reducer,
///     Factory::CreateReducer(failing_reducer_at_run),
/// );
/// assert_eq!(loader.live_modules(), 0);
/// ```
#[must_use]
pub fn loader_with_stage(stages: &StageModules, kind: StageKind, create: Factory) -> BuiltinLoader {
    let mut loader = BuiltinLoader::standard(stages);
    let spec = stages.get(kind);
    let (_, destroy) = builtin_factories(kind);
    loader.replace(
        &spec.path,
        ModuleTable::new()
            .export(&spec.create_symbol, create)
            .export(&spec.destroy_symbol, destroy),
    );
    loader
}

/// Reducer whose `run` always fails.
pub struct FailingReducer;

impl Stage for FailingReducer {
    type Output = ReducedOutput;

    fn run(&mut self) -> Result<()> {
        bail!("reducer failed on purpose")
    }

    fn take_output(&mut self) -> Option<ReducedOutput> {
        None
    }
}

/// Reducer that runs cleanly but never exposes an output.
pub struct SilentReducer;

impl Stage for SilentReducer {
    type Output = ReducedOutput;

    fn run(&mut self) -> Result<()> {
        Ok(())
    }

    fn take_output(&mut self) -> Option<ReducedOutput> {
        None
    }
}

/// Reducer create factory that refuses to construct.
///
/// # Errors
/// Always.
pub fn failing_reducer_at_create(
    _dir: PathBuf,
    _ctx: &StageContext,
) -> Result<StageBox<ReducedOutput>> {
    bail!("reducer construction failed on purpose")
}

/// Reducer create factory returning a [`FailingReducer`].
///
/// # Errors
/// Never fails; the instance fails when run.
pub fn failing_reducer_at_run(
    _dir: PathBuf,
    _ctx: &StageContext,
) -> Result<StageBox<ReducedOutput>> {
    Ok(Box::new(FailingReducer))
}

/// Reducer create factory returning a [`SilentReducer`].
///
/// # Errors
/// Never fails.
pub fn silent_reducer(_dir: PathBuf, _ctx: &StageContext) -> Result<StageBox<ReducedOutput>> {
    Ok(Box::new(SilentReducer))
}

/// Final writer that leaves out the last source file.
///
/// # Errors
/// As the built-in final writer.
pub fn dropping_final_writer(
    mut input: ReducedOutput,
    ctx: &StageContext,
) -> Result<StageBox<PathBuf>> {
    input.pop_last();
    create_final_writer(input, ctx)
}

/// Final writer that adds a file named [`UNEXPECTED_OUTPUT`].
///
/// # Errors
/// As the built-in final writer.
pub fn padded_final_writer(
    mut input: ReducedOutput,
    ctx: &StageContext,
) -> Result<StageBox<PathBuf>> {
    input.insert(UNEXPECTED_OUTPUT.to_string(), BTreeMap::new());
    create_final_writer(input, ctx)
}
