//! In-process module registry.
//!
//! Modules are symbol tables registered under a path. Loading one hands out
//! a handle that shares the table; dropping the handle counts as unloading.
//! The loader keeps a live-handle count so callers can check that every
//! module a run opened was released again.

use super::{Factory, FactoryShape, LoadedModule, ModuleLoader};
use crate::config::StageModules;
use crate::error::{PipelineError, PipelineResult};
use crate::plugins;
use crate::stage::StageKind;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

/// Exported symbols of one built-in module.
#[derive(Clone, Debug, Default)]
pub struct ModuleTable {
    symbols: HashMap<String, Factory>,
}

impl ModuleTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Export `factory` under `symbol`, replacing any previous export.
    #[must_use]
    pub fn export(mut self, symbol: impl Into<String>, factory: Factory) -> Self {
        self.symbols.insert(symbol.into(), factory);
        self
    }

    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<Factory> {
        self.symbols.get(symbol).copied()
    }

    pub fn merge(&mut self, other: ModuleTable) {
        self.symbols.extend(other.symbols);
    }
}

/// Loader over modules compiled into the binary.
#[derive(Clone, Default)]
pub struct BuiltinLoader {
    modules: HashMap<PathBuf, Arc<ModuleTable>>,
    live: Arc<AtomicUsize>,
    loads: Arc<AtomicUsize>,
}

impl BuiltinLoader {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in word-count plugins at the configured paths.
    #[must_use]
    pub fn standard(stages: &StageModules) -> Self {
        let mut loader = Self::new();
        for kind in StageKind::ALL {
            let spec = stages.get(kind);
            let (create, destroy) = plugins::builtin_factories(kind);
            loader.register(
                &spec.path,
                ModuleTable::new()
                    .export(&spec.create_symbol, create)
                    .export(&spec.destroy_symbol, destroy),
            );
        }
        loader
    }

    /// Register `table` under `path`. Symbols of an existing module at the
    /// same path are kept unless `table` exports the same name.
    pub fn register(&mut self, path: impl AsRef<Path>, table: ModuleTable) -> &mut Self {
        let path = path.as_ref().to_path_buf();
        let mut merged = self
            .modules
            .remove(&path)
            .map(|t| (*t).clone())
            .unwrap_or_default();
        merged.merge(table);
        self.modules.insert(path, Arc::new(merged));
        self
    }

    /// Replace whatever is registered under `path`.
    pub fn replace(&mut self, path: impl AsRef<Path>, table: ModuleTable) -> &mut Self {
        self.modules.insert(path.as_ref().to_path_buf(), Arc::new(table));
        self
    }

    /// Handles currently loaded and not yet dropped.
    #[must_use]
    pub fn live_modules(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Total successful loads since the registry was created.
    #[must_use]
    pub fn total_loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModuleLoader for BuiltinLoader {
    fn load(&self, path: &Path) -> PipelineResult<Box<dyn LoadedModule>> {
        let table = self
            .modules
            .get(path)
            .cloned()
            .ok_or_else(|| PipelineError::ModuleLoad {
                path: path.to_path_buf(),
                reason: "no built-in module is registered at this path".to_string(),
            })?;
        self.live.fetch_add(1, Ordering::SeqCst);
        self.loads.fetch_add(1, Ordering::SeqCst);
        trace!(path = %path.display(), "built-in module loaded");
        Ok(Box::new(BuiltinModule {
            path: path.to_path_buf(),
            table,
            live: Arc::clone(&self.live),
        }))
    }
}

struct BuiltinModule {
    path: PathBuf,
    table: Arc<ModuleTable>,
    live: Arc<AtomicUsize>,
}

impl LoadedModule for BuiltinModule {
    fn path(&self) -> &Path {
        &self.path
    }

    fn resolve(&self, symbol: &str, expected: FactoryShape) -> PipelineResult<Factory> {
        let factory = self
            .table
            .get(symbol)
            .ok_or_else(|| PipelineError::SymbolResolution {
                path: self.path.clone(),
                symbol: symbol.to_string(),
                expected,
                reason: "symbol not exported".to_string(),
            })?;
        if factory.shape() != expected {
            return Err(PipelineError::SymbolResolution {
                path: self.path.clone(),
                symbol: symbol.to_string(),
                expected,
                reason: format!("exported as {}", factory.shape()),
            });
        }
        Ok(factory)
    }
}

impl Drop for BuiltinModule {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        trace!(path = %self.path.display(), "built-in module unloaded");
    }
}
