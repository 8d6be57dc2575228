//! Module loading: opening stage modules and resolving their factories.
//!
//! A module is any unit that exports a create/destroy pair of factories for
//! one stage. Loaders hide where modules come from (the built-in registry or
//! shared objects on disk) behind [`ModuleLoader`], and every resolved entry
//! point is checked against the closed set of [`FactoryShape`]s before the
//! orchestrator can call it.

use crate::error::PipelineResult;
use crate::stage::{CreateFn, DestroyFn};
use crate::types::{DirectoryContents, MapperOutput, ReducedOutput, ShuffledOutput};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub mod builtin;
#[cfg_attr(docsrs, doc(cfg(feature = "dylib")))]
#[cfg(feature = "dylib")]
pub mod dylib;
pub mod guard;

pub use builtin::{BuiltinLoader, ModuleTable};
#[cfg(feature = "dylib")]
pub use dylib::DylibLoader;
pub use guard::{ModuleStack, StageModule, Teardown};

/// Opens modules by path.
pub trait ModuleLoader {
    /// Map the module at `path` into the process.
    ///
    /// Dropping the returned handle unloads the module.
    ///
    /// # Errors
    /// [`PipelineError::ModuleLoad`](crate::PipelineError::ModuleLoad) if the
    /// module cannot be opened.
    fn load(&self, path: &Path) -> PipelineResult<Box<dyn LoadedModule>>;
}

/// A module that is currently loaded.
pub trait LoadedModule {
    fn path(&self) -> &Path;

    /// Look up `symbol` and return it typed as `expected`.
    ///
    /// # Errors
    /// [`PipelineError::SymbolResolution`](crate::PipelineError::SymbolResolution)
    /// if the symbol is absent or has another shape.
    fn resolve(&self, symbol: &str, expected: FactoryShape) -> PipelineResult<Factory>;
}

/// Which loader backs a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    /// In-process registry of compiled-in modules.
    #[default]
    Builtin,
    /// Shared objects opened from disk.
    Dylib,
}

/// Every factory signature a module may export.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FactoryShape {
    CreateInputReader,
    CreateMapper,
    CreateMapOutputWriter,
    CreateShuffler,
    CreateShuffleOutputWriter,
    CreateReducer,
    CreateFinalOutputWriter,
    DestroyInputReader,
    DestroyMapper,
    DestroyShuffler,
    DestroyReducer,
    DestroyOutputWriter,
}

impl fmt::Display for FactoryShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FactoryShape::CreateInputReader => "create(input reader)",
            FactoryShape::CreateMapper => "create(mapper)",
            FactoryShape::CreateMapOutputWriter => "create(map output writer)",
            FactoryShape::CreateShuffler => "create(shuffler)",
            FactoryShape::CreateShuffleOutputWriter => "create(shuffle output writer)",
            FactoryShape::CreateReducer => "create(reducer)",
            FactoryShape::CreateFinalOutputWriter => "create(final output writer)",
            FactoryShape::DestroyInputReader => "destroy(input reader)",
            FactoryShape::DestroyMapper => "destroy(mapper)",
            FactoryShape::DestroyShuffler => "destroy(shuffler)",
            FactoryShape::DestroyReducer => "destroy(reducer)",
            FactoryShape::DestroyOutputWriter => "destroy(output writer)",
        };
        f.write_str(name)
    }
}

/// A resolved, correctly typed factory.
#[derive(Clone, Copy)]
pub enum Factory {
    CreateInputReader(CreateFn<PathBuf, DirectoryContents>),
    CreateMapper(CreateFn<DirectoryContents, MapperOutput>),
    CreateMapOutputWriter(CreateFn<MapperOutput, PathBuf>),
    CreateShuffler(CreateFn<PathBuf, ShuffledOutput>),
    CreateShuffleOutputWriter(CreateFn<ShuffledOutput, PathBuf>),
    CreateReducer(CreateFn<PathBuf, ReducedOutput>),
    CreateFinalOutputWriter(CreateFn<ReducedOutput, PathBuf>),
    DestroyInputReader(DestroyFn<DirectoryContents>),
    DestroyMapper(DestroyFn<MapperOutput>),
    DestroyShuffler(DestroyFn<ShuffledOutput>),
    DestroyReducer(DestroyFn<ReducedOutput>),
    DestroyOutputWriter(DestroyFn<PathBuf>),
}

impl Factory {
    #[must_use]
    pub fn shape(&self) -> FactoryShape {
        match self {
            Factory::CreateInputReader(_) => FactoryShape::CreateInputReader,
            Factory::CreateMapper(_) => FactoryShape::CreateMapper,
            Factory::CreateMapOutputWriter(_) => FactoryShape::CreateMapOutputWriter,
            Factory::CreateShuffler(_) => FactoryShape::CreateShuffler,
            Factory::CreateShuffleOutputWriter(_) => FactoryShape::CreateShuffleOutputWriter,
            Factory::CreateReducer(_) => FactoryShape::CreateReducer,
            Factory::CreateFinalOutputWriter(_) => FactoryShape::CreateFinalOutputWriter,
            Factory::DestroyInputReader(_) => FactoryShape::DestroyInputReader,
            Factory::DestroyMapper(_) => FactoryShape::DestroyMapper,
            Factory::DestroyShuffler(_) => FactoryShape::DestroyShuffler,
            Factory::DestroyReducer(_) => FactoryShape::DestroyReducer,
            Factory::DestroyOutputWriter(_) => FactoryShape::DestroyOutputWriter,
        }
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Factory").field(&self.shape()).finish()
    }
}

/// Default destroy factory: drop the instance.
pub fn destroy_stage<O: 'static>(stage: crate::stage::StageBox<O>) {
    drop(stage);
}
