//! Shared-object stage module used by `tests/dylib.rs`.
//!
//! Exports every factory shape under its own symbol, backed by the built-in
//! word-count stages, plus reducers that fail at construction or at run.
//! The mapper pair uses the default `createInputObj`/`removeInputObj` names.

#![allow(non_snake_case)]

use dirflow::module::destroy_stage;
use dirflow::plugins::{
    DirectoryReader, KeyShuffler, SumReducer, WordMapper, create_final_writer, create_map_writer,
    create_shuffle_writer,
};
use dirflow::testing::{failing_reducer_at_create, failing_reducer_at_run};
use dirflow::{
    DirectoryContents, MapperOutput, ReducedOutput, ShuffledOutput, StageBox, StageContext,
};
use std::path::PathBuf;

#[unsafe(no_mangle)]
pub fn create_reader(
    dir: PathBuf,
    ctx: &StageContext,
) -> anyhow::Result<StageBox<DirectoryContents>> {
    DirectoryReader::create(dir, ctx)
}

#[unsafe(no_mangle)]
pub fn destroy_reader(stage: StageBox<DirectoryContents>) {
    destroy_stage(stage);
}

#[unsafe(no_mangle)]
pub fn createInputObj(
    contents: DirectoryContents,
    ctx: &StageContext,
) -> anyhow::Result<StageBox<MapperOutput>> {
    WordMapper::create(contents, ctx)
}

#[unsafe(no_mangle)]
pub fn removeInputObj(stage: StageBox<MapperOutput>) {
    destroy_stage(stage);
}

#[unsafe(no_mangle)]
pub fn create_map_output(
    mapped: MapperOutput,
    ctx: &StageContext,
) -> anyhow::Result<StageBox<PathBuf>> {
    create_map_writer(mapped, ctx)
}

#[unsafe(no_mangle)]
pub fn create_shuffler(
    dir: PathBuf,
    ctx: &StageContext,
) -> anyhow::Result<StageBox<ShuffledOutput>> {
    KeyShuffler::create(dir, ctx)
}

#[unsafe(no_mangle)]
pub fn destroy_shuffler(stage: StageBox<ShuffledOutput>) {
    destroy_stage(stage);
}

#[unsafe(no_mangle)]
pub fn create_shuffle_output(
    shuffled: ShuffledOutput,
    ctx: &StageContext,
) -> anyhow::Result<StageBox<PathBuf>> {
    create_shuffle_writer(shuffled, ctx)
}

#[unsafe(no_mangle)]
pub fn create_reducer(dir: PathBuf, ctx: &StageContext) -> anyhow::Result<StageBox<ReducedOutput>> {
    SumReducer::create(dir, ctx)
}

#[unsafe(no_mangle)]
pub fn create_broken_reducer(
    dir: PathBuf,
    ctx: &StageContext,
) -> anyhow::Result<StageBox<ReducedOutput>> {
    failing_reducer_at_create(dir, ctx)
}

#[unsafe(no_mangle)]
pub fn create_crashing_reducer(
    dir: PathBuf,
    ctx: &StageContext,
) -> anyhow::Result<StageBox<ReducedOutput>> {
    failing_reducer_at_run(dir, ctx)
}

#[unsafe(no_mangle)]
pub fn destroy_reducer(stage: StageBox<ReducedOutput>) {
    destroy_stage(stage);
}

#[unsafe(no_mangle)]
pub fn create_final_output(
    reduced: ReducedOutput,
    ctx: &StageContext,
) -> anyhow::Result<StageBox<PathBuf>> {
    create_final_writer(reduced, ctx)
}

/// Shared by the three writers.
#[unsafe(no_mangle)]
pub fn destroy_writer(stage: StageBox<PathBuf>) {
    destroy_stage(stage);
}
