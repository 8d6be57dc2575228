//! The stage contract shared by every plugin.
//!
//! A stage instance is created by a factory with its stage-specific input,
//! run exactly once, asked for its output, and finally handed back to the
//! destroy factory of the module that created it. The orchestrator only ever
//! sees the trait objects defined here, never a concrete plugin type.
//!
//! | Kind                  | Input               | Output              |
//! |-----------------------|---------------------|---------------------|
//! | Input Reader          | directory path      | [`DirectoryContents`] |
//! | Mapper                | `DirectoryContents` | [`MapperOutput`]    |
//! | Map-Output Writer     | `MapperOutput`      | written directory   |
//! | Shuffler              | map-output dir      | [`ShuffledOutput`]  |
//! | Shuffle-Output Writer | `ShuffledOutput`    | written directory   |
//! | Reducer               | shuffle-output dir  | [`ReducedOutput`]   |
//! | Final-Output Writer   | `ReducedOutput`     | written directory   |

use crate::module::{Factory, FactoryShape};
use crate::types::{DirectoryContents, MapperOutput, ReducedOutput, ShuffledOutput};
use anyhow::Result;
use std::fmt;
use std::path::{Path, PathBuf};

/// Lifecycle every stage instance supports.
pub trait Stage {
    type Output;

    /// Perform the stage's transformation. Called exactly once.
    ///
    /// # Errors
    /// Any internal failure of the stage.
    fn run(&mut self) -> Result<()>;

    /// Hand the produced output over to the caller.
    ///
    /// Returns `None` if `run` has not completed or the output was already taken.
    fn take_output(&mut self) -> Option<Self::Output>;
}

/// Owned stage instance as returned by a create factory.
pub type StageBox<O> = Box<dyn Stage<Output = O>>;

/// Create factory: builds an instance from its input.
pub type CreateFn<I, O> = fn(I, &StageContext) -> Result<StageBox<O>>;

/// Destroy factory: releases an instance built by the matching create factory.
pub type DestroyFn<O> = fn(StageBox<O>);

pub type InputReader = dyn Stage<Output = DirectoryContents>;
pub type Mapper = dyn Stage<Output = MapperOutput>;
pub type Shuffler = dyn Stage<Output = ShuffledOutput>;
pub type Reducer = dyn Stage<Output = ReducedOutput>;
/// All three output writers share one contract: they expose the directory they wrote.
pub type OutputWriter = dyn Stage<Output = PathBuf>;

/// The seven stage instances of a run, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageKind {
    InputReader,
    Mapper,
    MapOutputWriter,
    Shuffler,
    ShuffleOutputWriter,
    Reducer,
    FinalOutputWriter,
}

impl StageKind {
    pub const ALL: [StageKind; 7] = [
        StageKind::InputReader,
        StageKind::Mapper,
        StageKind::MapOutputWriter,
        StageKind::Shuffler,
        StageKind::ShuffleOutputWriter,
        StageKind::Reducer,
        StageKind::FinalOutputWriter,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            StageKind::InputReader => "input_reader",
            StageKind::Mapper => "mapper",
            StageKind::MapOutputWriter => "map_output_writer",
            StageKind::Shuffler => "shuffler",
            StageKind::ShuffleOutputWriter => "shuffle_output_writer",
            StageKind::Reducer => "reducer",
            StageKind::FinalOutputWriter => "final_output_writer",
        }
    }

    /// Shape the create symbol of this stage's module must have.
    #[must_use]
    pub fn create_shape(self) -> FactoryShape {
        match self {
            StageKind::InputReader => FactoryShape::CreateInputReader,
            StageKind::Mapper => FactoryShape::CreateMapper,
            StageKind::MapOutputWriter => FactoryShape::CreateMapOutputWriter,
            StageKind::Shuffler => FactoryShape::CreateShuffler,
            StageKind::ShuffleOutputWriter => FactoryShape::CreateShuffleOutputWriter,
            StageKind::Reducer => FactoryShape::CreateReducer,
            StageKind::FinalOutputWriter => FactoryShape::CreateFinalOutputWriter,
        }
    }

    /// Shape the destroy symbol of this stage's module must have.
    #[must_use]
    pub fn destroy_shape(self) -> FactoryShape {
        match self {
            StageKind::InputReader => FactoryShape::DestroyInputReader,
            StageKind::Mapper => FactoryShape::DestroyMapper,
            StageKind::Shuffler => FactoryShape::DestroyShuffler,
            StageKind::Reducer => FactoryShape::DestroyReducer,
            StageKind::MapOutputWriter
            | StageKind::ShuffleOutputWriter
            | StageKind::FinalOutputWriter => FactoryShape::DestroyOutputWriter,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-run settings visible to every factory.
#[derive(Clone, Debug)]
pub struct StageContext {
    run_id: String,
    run_dir: PathBuf,
    map_buffer_size: usize,
}

impl StageContext {
    pub fn new(
        run_id: impl Into<String>,
        run_dir: impl Into<PathBuf>,
        map_buffer_size: usize,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            run_dir: run_dir.into(),
            map_buffer_size: map_buffer_size.max(1),
        }
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Directory under which writers create their output directories.
    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    #[must_use]
    pub fn map_buffer_size(&self) -> usize {
        self.map_buffer_size
    }
}

/// Type-level description of one stage position in the pipeline.
///
/// Ties a [`StageKind`] to its input/output types and picks the matching
/// variants out of a resolved [`Factory`].
pub trait StageRole: 'static {
    type Input: 'static;
    type Output: 'static;
    const KIND: StageKind;

    fn create_fn(factory: Factory) -> Option<CreateFn<Self::Input, Self::Output>>;
    fn destroy_fn(factory: Factory) -> Option<DestroyFn<Self::Output>>;
}

macro_rules! stage_role {
    (
        $(#[$doc:meta])*
        $role:ident, $kind:ident, $input:ty, $output:ty, $create:ident, $destroy:ident
    ) => {
        $(#[$doc])*
        pub struct $role;

        impl StageRole for $role {
            type Input = $input;
            type Output = $output;
            const KIND: StageKind = StageKind::$kind;

            fn create_fn(factory: Factory) -> Option<CreateFn<$input, $output>> {
                match factory {
                    Factory::$create(f) => Some(f),
                    _ => None,
                }
            }

            fn destroy_fn(factory: Factory) -> Option<DestroyFn<$output>> {
                match factory {
                    Factory::$destroy(f) => Some(f),
                    _ => None,
                }
            }
        }
    };
}

pub mod roles {
    use super::*;

    stage_role!(
        /// Reads the input directory into memory.
        ReadInput, InputReader, PathBuf, DirectoryContents, CreateInputReader, DestroyInputReader
    );
    stage_role!(Map, Mapper, DirectoryContents, MapperOutput, CreateMapper, DestroyMapper);
    stage_role!(
        WriteMapOutput,
        MapOutputWriter,
        MapperOutput,
        PathBuf,
        CreateMapOutputWriter,
        DestroyOutputWriter
    );
    stage_role!(Shuffle, Shuffler, PathBuf, ShuffledOutput, CreateShuffler, DestroyShuffler);
    stage_role!(
        WriteShuffleOutput, ShuffleOutputWriter, ShuffledOutput, PathBuf, CreateShuffleOutputWriter,
        DestroyOutputWriter
    );
    stage_role!(Reduce, Reducer, PathBuf, ReducedOutput, CreateReducer, DestroyReducer);
    stage_role!(
        /// Writes the pipeline's final result directory.
        WriteFinalOutput, FinalOutputWriter, ReducedOutput, PathBuf, CreateFinalOutputWriter,
        DestroyOutputWriter
    );
}
