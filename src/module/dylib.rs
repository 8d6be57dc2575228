//! Shared-object modules opened with `libloading`.
//!
//! A plugin library exports its factories as plain Rust functions whose
//! signatures are exactly the [`CreateFn`]/[`DestroyFn`] types of one stage,
//! for example:
//!
//! ```ignore
//! #[unsafe(no_mangle)]
//! pub fn createInputObj(
//!     input: DirectoryContents,
//!     ctx: &StageContext,
//! ) -> anyhow::Result<StageBox<MapperOutput>> { .. }
//!
//! #[unsafe(no_mangle)]
//! pub fn removeInputObj(stage: StageBox<MapperOutput>) { drop(stage) }
//! ```
//!
//! Rust has no stable ABI, so a plugin must be built with the same compiler
//! and the same version of this crate as the host. Symbol *names* are looked
//! up dynamically; symbol *types* come from the requested [`FactoryShape`].

use super::{Factory, FactoryShape, LoadedModule, ModuleLoader};
use crate::error::{PipelineError, PipelineResult};
use crate::stage::{CreateFn, DestroyFn};
use crate::types::{DirectoryContents, MapperOutput, ReducedOutput, ShuffledOutput};
use libloading::Library;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loader over shared objects on disk.
#[derive(Clone, Copy, Debug, Default)]
pub struct DylibLoader;

impl DylibLoader {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ModuleLoader for DylibLoader {
    fn load(&self, path: &Path) -> PipelineResult<Box<dyn LoadedModule>> {
        if !path.is_file() {
            return Err(PipelineError::ModuleLoad {
                path: path.to_path_buf(),
                reason: "file does not exist".to_string(),
            });
        }
        // SAFETY: initialisers of the library run here; plugins are trusted
        // code built against this crate.
        let library = unsafe { Library::new(path) }.map_err(|e| PipelineError::ModuleLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "shared object loaded");
        Ok(Box::new(DylibModule {
            path: path.to_path_buf(),
            library,
        }))
    }
}

struct DylibModule {
    path: PathBuf,
    library: Library,
}

impl DylibModule {
    /// Read `symbol` as a value of type `T`.
    ///
    /// # Safety
    /// `T` must be the exact type of the exported item.
    unsafe fn symbol<T: Copy>(&self, symbol: &str, expected: FactoryShape) -> PipelineResult<T> {
        // SAFETY: forwarded to the caller.
        let item = unsafe { self.library.get::<T>(symbol.as_bytes()) };
        item.map(|s| *s).map_err(|e| PipelineError::SymbolResolution {
            path: self.path.clone(),
            symbol: symbol.to_string(),
            expected,
            reason: e.to_string(),
        })
    }
}

impl LoadedModule for DylibModule {
    fn path(&self) -> &Path {
        &self.path
    }

    fn resolve(&self, symbol: &str, expected: FactoryShape) -> PipelineResult<Factory> {
        // SAFETY: every arm reads the symbol as the function type named by
        // `expected`, which is the documented export contract for plugins.
        let factory = unsafe {
            match expected {
                FactoryShape::CreateInputReader => Factory::CreateInputReader(
                    self.symbol::<CreateFn<PathBuf, DirectoryContents>>(symbol, expected)?,
                ),
                FactoryShape::CreateMapper => Factory::CreateMapper(
                    self.symbol::<CreateFn<DirectoryContents, MapperOutput>>(symbol, expected)?,
                ),
                FactoryShape::CreateMapOutputWriter => Factory::CreateMapOutputWriter(
                    self.symbol::<CreateFn<MapperOutput, PathBuf>>(symbol, expected)?,
                ),
                FactoryShape::CreateShuffler => Factory::CreateShuffler(
                    self.symbol::<CreateFn<PathBuf, ShuffledOutput>>(symbol, expected)?,
                ),
                FactoryShape::CreateShuffleOutputWriter => Factory::CreateShuffleOutputWriter(
                    self.symbol::<CreateFn<ShuffledOutput, PathBuf>>(symbol, expected)?,
                ),
                FactoryShape::CreateReducer => Factory::CreateReducer(
                    self.symbol::<CreateFn<PathBuf, ReducedOutput>>(symbol, expected)?,
                ),
                FactoryShape::CreateFinalOutputWriter => Factory::CreateFinalOutputWriter(
                    self.symbol::<CreateFn<ReducedOutput, PathBuf>>(symbol, expected)?,
                ),
                FactoryShape::DestroyInputReader => Factory::DestroyInputReader(
                    self.symbol::<DestroyFn<DirectoryContents>>(symbol, expected)?,
                ),
                FactoryShape::DestroyMapper => Factory::DestroyMapper(
                    self.symbol::<DestroyFn<MapperOutput>>(symbol, expected)?,
                ),
                FactoryShape::DestroyShuffler => Factory::DestroyShuffler(
                    self.symbol::<DestroyFn<ShuffledOutput>>(symbol, expected)?,
                ),
                FactoryShape::DestroyReducer => Factory::DestroyReducer(
                    self.symbol::<DestroyFn<ReducedOutput>>(symbol, expected)?,
                ),
                FactoryShape::DestroyOutputWriter => Factory::DestroyOutputWriter(
                    self.symbol::<DestroyFn<PathBuf>>(symbol, expected)?,
                ),
            }
        };
        Ok(factory)
    }
}

impl Drop for DylibModule {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "unloading shared object");
    }
}
