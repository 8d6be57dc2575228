//! Built-in stage implementations: a word count over a directory of text files.
//!
//! Each stage is an ordinary type implementing [`Stage`](crate::stage::Stage)
//! plus a `create` function with the factory signature of its stage kind.
//! [`builtin_factories`] exposes them as the symbol pair the
//! [`BuiltinLoader`](crate::module::BuiltinLoader) registers for a stage.

use crate::module::{Factory, destroy_stage};
use crate::stage::StageKind;
use crate::types::{DirectoryContents, MapperOutput, ReducedOutput, ShuffledOutput};

pub mod input;
pub mod mapper;
pub mod reducer;
pub mod shuffler;
pub mod writers;

pub use input::DirectoryReader;
pub use mapper::WordMapper;
pub use reducer::SumReducer;
pub use shuffler::KeyShuffler;
pub use writers::{
    DirectoryWriter, FINAL_OUTPUT_DIR, MAP_OUTPUT_DIR, SHUFFLE_OUTPUT_DIR, create_final_writer,
    create_map_writer, create_shuffle_writer,
};

/// Create and destroy factories of the built-in module for `kind`.
#[must_use]
pub fn builtin_factories(kind: StageKind) -> (Factory, Factory) {
    match kind {
        StageKind::InputReader => (
            Factory::CreateInputReader(DirectoryReader::create),
            Factory::DestroyInputReader(destroy_stage::<DirectoryContents>),
        ),
        StageKind::Mapper => (
            Factory::CreateMapper(WordMapper::create),
            Factory::DestroyMapper(destroy_stage::<MapperOutput>),
        ),
        StageKind::MapOutputWriter => (
            Factory::CreateMapOutputWriter(create_map_writer),
            Factory::DestroyOutputWriter(destroy_stage),
        ),
        StageKind::Shuffler => (
            Factory::CreateShuffler(KeyShuffler::create),
            Factory::DestroyShuffler(destroy_stage::<ShuffledOutput>),
        ),
        StageKind::ShuffleOutputWriter => (
            Factory::CreateShuffleOutputWriter(create_shuffle_writer),
            Factory::DestroyOutputWriter(destroy_stage),
        ),
        StageKind::Reducer => (
            Factory::CreateReducer(SumReducer::create),
            Factory::DestroyReducer(destroy_stage::<ReducedOutput>),
        ),
        StageKind::FinalOutputWriter => (
            Factory::CreateFinalOutputWriter(create_final_writer),
            Factory::DestroyOutputWriter(destroy_stage),
        ),
    }
}
