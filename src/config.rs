//! Run configuration, loadable from TOML.
//!
//! ```toml
//! work_dir = "./output"
//! success_marker = "SUCCESS.ind"
//! map_buffer_size = 64
//! loader = "builtin"
//!
//! [stages.reducer]
//! path = "./libs/reduce/ReducerImpl.so"
//! create_symbol = "createInputObj"
//! destroy_symbol = "removeInputObj"
//! ```
//!
//! Every key is optional; stages not listed keep their default module.

use crate::error::{PipelineError, PipelineResult};
use crate::module::LoaderKind;
use crate::stage::StageKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const DEFAULT_CREATE_SYMBOL: &str = "createInputObj";
pub const DEFAULT_DESTROY_SYMBOL: &str = "removeInputObj";
pub const DEFAULT_SUCCESS_MARKER: &str = "SUCCESS.ind";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Parent of every run directory.
    pub work_dir: PathBuf,
    /// Zero-byte file written into the final output directory on success.
    pub success_marker: String,
    /// Max records per innermost map-record group.
    pub map_buffer_size: usize,
    pub loader: LoaderKind,
    pub stages: StageModules,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("./output"),
            success_marker: DEFAULT_SUCCESS_MARKER.to_string(),
            map_buffer_size: 64,
            loader: LoaderKind::default(),
            stages: StageModules::default(),
        }
    }
}

impl PipelineConfig {
    /// Read and validate a TOML configuration file.
    ///
    /// # Errors
    /// `Io` if the file cannot be read, `Config` if it does not parse or
    /// fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let config = Self::from_toml(&text)
            .map_err(|e| PipelineError::Config(format!("{}: {e}", path.display())))?;
        Ok(config)
    }

    /// Parse and validate TOML text.
    ///
    /// # Errors
    /// `Config` on parse or validation failure.
    pub fn from_toml(text: &str) -> PipelineResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// # Errors
    /// `Config` describing the first invalid setting.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.map_buffer_size == 0 {
            return Err(PipelineError::Config(
                "map_buffer_size must be greater than zero".into(),
            ));
        }
        let marker = Path::new(&self.success_marker);
        if self.success_marker.is_empty() || marker.file_name() != Some(marker.as_os_str()) {
            return Err(PipelineError::Config(format!(
                "success_marker must be a bare file name, got {:?}",
                self.success_marker
            )));
        }
        let mut exports = HashSet::new();
        for kind in StageKind::ALL {
            let spec = self.stages.get(kind);
            if spec.path.as_os_str().is_empty() {
                return Err(PipelineError::Config(format!("stages.{kind}.path is empty")));
            }
            if spec.create_symbol.is_empty() || spec.destroy_symbol.is_empty() {
                return Err(PipelineError::Config(format!(
                    "stages.{kind} needs non-empty create and destroy symbols"
                )));
            }
            if spec.create_symbol == spec.destroy_symbol {
                return Err(PipelineError::Config(format!(
                    "stages.{kind} uses `{}` for both create and destroy",
                    spec.create_symbol
                )));
            }
            if !exports.insert((spec.path.clone(), spec.create_symbol.clone())) {
                return Err(PipelineError::Config(format!(
                    "stages.{kind} shares module {} and symbol `{}` with another stage",
                    spec.path.display(),
                    spec.create_symbol
                )));
            }
        }
        Ok(())
    }
}

/// Module location and entry points of one stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageModuleConfig {
    pub path: PathBuf,
    #[serde(default = "default_create_symbol")]
    pub create_symbol: String,
    #[serde(default = "default_destroy_symbol")]
    pub destroy_symbol: String,
}

fn default_create_symbol() -> String {
    DEFAULT_CREATE_SYMBOL.to_string()
}

fn default_destroy_symbol() -> String {
    DEFAULT_DESTROY_SYMBOL.to_string()
}

impl StageModuleConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create_symbol: default_create_symbol(),
            destroy_symbol: default_destroy_symbol(),
        }
    }
}

/// One module per stage instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageModules {
    pub input_reader: StageModuleConfig,
    pub mapper: StageModuleConfig,
    pub map_output_writer: StageModuleConfig,
    pub shuffler: StageModuleConfig,
    pub shuffle_output_writer: StageModuleConfig,
    pub reducer: StageModuleConfig,
    pub final_output_writer: StageModuleConfig,
}

impl Default for StageModules {
    fn default() -> Self {
        Self {
            input_reader: StageModuleConfig::new("./libs/fp/FileProcessorInput.so"),
            mapper: StageModuleConfig::new("./libs/map/MapperImpl.so"),
            map_output_writer: StageModuleConfig::new("./libs/fp/FileProcessorMapOutput.so"),
            shuffler: StageModuleConfig::new("./libs/shuffle/ShufflerImpl.so"),
            shuffle_output_writer: StageModuleConfig::new("./libs/fp/FileProcessorShufOutput.so"),
            reducer: StageModuleConfig::new("./libs/reduce/ReducerImpl.so"),
            final_output_writer: StageModuleConfig::new("./libs/fp/FileProcessorRedOutput.so"),
        }
    }
}

impl StageModules {
    #[must_use]
    pub fn get(&self, kind: StageKind) -> &StageModuleConfig {
        match kind {
            StageKind::InputReader => &self.input_reader,
            StageKind::Mapper => &self.mapper,
            StageKind::MapOutputWriter => &self.map_output_writer,
            StageKind::Shuffler => &self.shuffler,
            StageKind::ShuffleOutputWriter => &self.shuffle_output_writer,
            StageKind::Reducer => &self.reducer,
            StageKind::FinalOutputWriter => &self.final_output_writer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.stages.reducer.path, PathBuf::from("./libs/reduce/ReducerImpl.so"));
        assert_eq!(config.stages.mapper.create_symbol, "createInputObj");
        assert_eq!(config.stages.mapper.destroy_symbol, "removeInputObj");
    }

    #[test]
    fn partial_stage_override_keeps_default_symbols() {
        let config = PipelineConfig::from_toml(
            r#"
            map_buffer_size = 8
            [stages.reducer]
            path = "/opt/plugins/libreducer.so"
            "#,
        )
        .unwrap();
        assert_eq!(config.map_buffer_size, 8);
        assert_eq!(config.stages.reducer.path, PathBuf::from("/opt/plugins/libreducer.so"));
        assert_eq!(config.stages.reducer.create_symbol, DEFAULT_CREATE_SYMBOL);
        assert_eq!(config.stages.mapper, StageModules::default().mapper);
        assert_eq!(config.loader, LoaderKind::Builtin);
    }

    #[test]
    fn loader_kind_parses_lowercase() {
        let config = PipelineConfig::from_toml(r#"loader = "dylib""#).unwrap();
        assert_eq!(config.loader, LoaderKind::Dylib);
    }

    #[test]
    fn rejects_marker_with_directory() {
        let err =
            PipelineConfig::from_toml(r#"success_marker = "nested/SUCCESS.ind""#).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn rejects_zero_buffer_and_unknown_keys() {
        assert!(PipelineConfig::from_toml("map_buffer_size = 0").is_err());
        assert!(PipelineConfig::from_toml("mystery = 1").is_err());
    }

    #[test]
    fn rejects_two_stages_sharing_an_export() {
        let mut config = PipelineConfig::default();
        config.stages.reducer.path = config.stages.mapper.path.clone();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("reducer"));
    }
}
