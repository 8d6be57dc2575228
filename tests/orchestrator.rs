//! End-to-end runs over the built-in loader.

use dirflow::plugins::SumReducer;
use dirflow::testing::*;
use dirflow::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn orchestrator(
    config: &PipelineConfig,
    loader: &BuiltinLoader,
) -> (Orchestrator, Arc<RecordingObserver>) {
    let recorder = Arc::new(RecordingObserver::new());
    let orchestrator =
        Orchestrator::new(config.clone(), loader.clone()).with_observer(recorder.clone());
    (orchestrator, recorder)
}

/// The single run directory a run left under `work_dir`.
fn only_run_dir(work_dir: &Path) -> anyhow::Result<PathBuf> {
    let runs: Vec<PathBuf> = fs::read_dir(work_dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    assert_eq!(runs.len(), 1, "expected one run directory, got {runs:?}");
    Ok(runs[0].clone())
}

#[test]
fn word_count_single_file() -> anyhow::Result<()> {
    let input = write_input_dir(&[("a.txt", "cat dog cat")])?;
    let work = TempDir::new()?;
    let config = test_config(work.path());
    let loader = BuiltinLoader::standard(&config.stages);
    let (orchestrator, recorder) = orchestrator(&config, &loader);

    let report = orchestrator.run(input.path())?;

    assert_eq!(report.files, 1);
    assert_eq!(report.run_dir, work.path().join(&report.run_id));
    assert_eq!(report.final_output_dir, report.run_dir.join("final_output"));
    assert_eq!(
        fs::read_to_string(report.final_output_dir.join("a.txt"))?,
        "key,count\ncat,2\ndog,1\n"
    );

    assert_eq!(report.marker, report.final_output_dir.join("SUCCESS.ind"));
    assert_eq!(fs::metadata(&report.marker)?.len(), 0);

    assert_eq!(loader.total_loads(), 7);
    assert_eq!(loader.live_modules(), 0);
    assert_eq!(recorder.completed_stages(), StageKind::ALL.to_vec());
    assert_balanced_teardown(&recorder.events(), 7);
    Ok(())
}

#[test]
fn word_count_several_files() -> anyhow::Result<()> {
    let input = write_input_dir(&word_count_files())?;
    let work = TempDir::new()?;
    let config = test_config(work.path());
    let loader = BuiltinLoader::standard(&config.stages);
    let (orchestrator, _) = orchestrator(&config, &loader);

    let report = orchestrator.run(input.path())?;

    assert_eq!(report.files, 3);
    assert_same_file_names(&report.map_output_dir, input.path());
    assert_same_file_names(&report.shuffle_output_dir, input.path());

    let mut final_names = file_names(&report.final_output_dir)?;
    assert!(final_names.remove("SUCCESS.ind"));
    assert_eq!(final_names, file_names(input.path())?);

    assert_final_counts(
        &report.final_output_dir,
        "alpha.txt",
        &[("hello", 2), ("world", 1), ("rust", 1)],
    );
    assert_final_counts(
        &report.final_output_dir,
        "beta.txt",
        &[("world", 1), ("of", 1), ("data", 1), ("rust", 1), ("programming", 1)],
    );
    assert_final_counts(
        &report.final_output_dir,
        "gamma.txt",
        &[("hello", 1), ("data", 1), ("world", 1)],
    );
    Ok(())
}

#[test]
fn empty_input_file_still_gets_a_final_file() -> anyhow::Result<()> {
    let input = write_input_dir(&[("empty.txt", ""), ("words.txt", "Ab ab")])?;
    let work = TempDir::new()?;
    let config = test_config(work.path());
    let (orchestrator, _) = orchestrator(&config, &BuiltinLoader::standard(&config.stages));

    let report = orchestrator.run(input.path())?;

    assert_eq!(
        fs::read_to_string(report.final_output_dir.join("empty.txt"))?,
        "key,count\n"
    );
    assert_final_counts(&report.final_output_dir, "words.txt", &[("ab", 2)]);
    Ok(())
}

#[test]
fn subdirectories_are_not_input() -> anyhow::Result<()> {
    let input = write_input_dir(&[("top.txt", "one")])?;
    fs::create_dir(input.path().join("nested"))?;
    fs::write(input.path().join("nested").join("deep.txt"), "two")?;
    let work = TempDir::new()?;
    let config = test_config(work.path());
    let (orchestrator, _) = orchestrator(&config, &BuiltinLoader::standard(&config.stages));

    let report = orchestrator.run(input.path())?;

    assert_eq!(report.files, 1);
    assert!(report.final_output_dir.join("top.txt").is_file());
    assert!(!report.final_output_dir.join("deep.txt").exists());
    Ok(())
}

#[test]
fn runs_get_distinct_directories() -> anyhow::Result<()> {
    let input = write_input_dir(&[("a.txt", "x")])?;
    let work = TempDir::new()?;
    let config = test_config(work.path());
    let (orchestrator, _) = orchestrator(&config, &BuiltinLoader::standard(&config.stages));

    let first = orchestrator.run(input.path())?;
    let second = orchestrator.run(input.path())?;

    assert_ne!(first.run_dir, second.run_dir);
    assert!(first.marker.is_file());
    assert!(second.marker.is_file());
    Ok(())
}

#[test]
fn missing_input_directory_loads_nothing() -> anyhow::Result<()> {
    let scratch = TempDir::new()?;
    let work = TempDir::new()?;
    let config = test_config(work.path().join("out"));
    let loader = BuiltinLoader::standard(&config.stages);
    let (orchestrator, recorder) = orchestrator(&config, &loader);

    let err = orchestrator.run(scratch.path().join("absent")).unwrap_err();

    assert!(matches!(err, PipelineError::MissingDirectory { .. }), "{err}");
    assert_eq!(loader.total_loads(), 0);
    assert!(!work.path().join("out").exists());
    assert_eq!(
        recorder.count(|e| matches!(e, PipelineEvent::RunFailed { .. })),
        1
    );
    Ok(())
}

#[test]
fn empty_input_directory_is_rejected() -> anyhow::Result<()> {
    let input = write_input_dir(&[])?;
    fs::create_dir(input.path().join("only_a_dir"))?;
    let work = TempDir::new()?;
    let config = test_config(work.path().join("out"));
    let loader = BuiltinLoader::standard(&config.stages);
    let (orchestrator, _) = orchestrator(&config, &loader);

    let err = orchestrator.run(input.path()).unwrap_err();

    assert!(matches!(err, PipelineError::EmptyInput { .. }), "{err}");
    assert_eq!(loader.total_loads(), 0);
    assert!(!work.path().join("out").exists());
    Ok(())
}

#[test]
fn input_holding_the_marker_name_is_rejected() -> anyhow::Result<()> {
    let input = write_input_dir(&[("a.txt", "x"), ("SUCCESS.ind", "")])?;
    let work = TempDir::new()?;
    let config = test_config(work.path());
    let loader = BuiltinLoader::standard(&config.stages);
    let (orchestrator, _) = orchestrator(&config, &loader);

    let err = orchestrator.run(input.path()).unwrap_err();

    match &err {
        PipelineError::ReservedInputName { path, name } => {
            assert_eq!(path, input.path());
            assert_eq!(name, "SUCCESS.ind");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.kind(), "reserved_input_name");
    assert!(err.to_string().contains("SUCCESS.ind"), "{err}");
    assert_eq!(loader.total_loads(), 0);
    Ok(())
}

#[cfg(target_os = "linux")]
#[test]
fn non_utf8_input_name_fails_before_any_stage() -> anyhow::Result<()> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let input = write_input_dir(&[("good.txt", "cat")])?;
    fs::write(input.path().join(OsStr::from_bytes(b"bad\xFF.txt")), "dog")?;
    let work = TempDir::new()?;
    let config = test_config(work.path());
    let loader = BuiltinLoader::standard(&config.stages);
    let (orchestrator, recorder) = orchestrator(&config, &loader);

    let err = orchestrator.run(input.path()).unwrap_err();

    assert!(err.to_string().contains("not valid UTF-8"), "{err}");
    assert_eq!(loader.total_loads(), 0);
    assert!(recorder.completed_stages().is_empty());
    assert_eq!(fs::read_dir(work.path())?.count(), 0);
    Ok(())
}

#[test]
fn reducer_failing_at_run_tears_everything_down() -> anyhow::Result<()> {
    let input = write_input_dir(&[("a.txt", "cat dog")])?;
    let work = TempDir::new()?;
    let config = test_config(work.path());
    let loader = loader_with_stage(
        &config.stages,
        StageKind::Reducer,
        Factory::CreateReducer(failing_reducer_at_run),
    );
    let (orchestrator, recorder) = orchestrator(&config, &loader);

    let err = orchestrator.run(input.path()).unwrap_err();

    match &err {
        PipelineError::StageExecution { stage, .. } => assert_eq!(*stage, StageKind::Reducer),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("failed on purpose"));

    let run_dir = only_run_dir(work.path())?;
    assert!(run_dir.join("map_output").is_dir());
    assert!(run_dir.join("shuffle_output").is_dir());
    assert!(!run_dir.join("final_output").exists());

    assert_eq!(loader.total_loads(), 6);
    assert_eq!(loader.live_modules(), 0);
    assert_eq!(
        recorder.count(|e| matches!(e, PipelineEvent::InstanceDestroyed { .. })),
        6
    );
    assert_eq!(recorder.unloaded_stages().first(), Some(&StageKind::Reducer));
    assert_balanced_teardown(&recorder.events(), 6);
    Ok(())
}

#[test]
fn reducer_failing_at_construction_is_not_destroyed() -> anyhow::Result<()> {
    let input = write_input_dir(&[("a.txt", "cat dog")])?;
    let work = TempDir::new()?;
    let config = test_config(work.path());
    let loader = loader_with_stage(
        &config.stages,
        StageKind::Reducer,
        Factory::CreateReducer(failing_reducer_at_create),
    );
    let (orchestrator, recorder) = orchestrator(&config, &loader);

    let err = orchestrator.run(input.path()).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::StageExecution {
            stage: StageKind::Reducer,
            ..
        }
    ));
    assert_eq!(loader.live_modules(), 0);
    assert_eq!(
        recorder.count(|e| matches!(e, PipelineEvent::InstanceDestroyed { .. })),
        5
    );
    assert_eq!(
        recorder.count(|e| matches!(e, PipelineEvent::ModuleUnloaded { .. })),
        6
    );
    assert_balanced_teardown(&recorder.events(), 6);
    Ok(())
}

#[test]
fn stage_without_output_fails() -> anyhow::Result<()> {
    let input = write_input_dir(&[("a.txt", "cat")])?;
    let work = TempDir::new()?;
    let config = test_config(work.path());
    let loader = loader_with_stage(
        &config.stages,
        StageKind::Reducer,
        Factory::CreateReducer(silent_reducer),
    );
    let (orchestrator, _) = orchestrator(&config, &loader);

    let err = orchestrator.run(input.path()).unwrap_err();

    assert!(err.to_string().contains("without exposing output"), "{err}");
    assert_eq!(loader.live_modules(), 0);
    Ok(())
}

#[test]
fn missing_final_file_blocks_the_marker() -> anyhow::Result<()> {
    let input = write_input_dir(&[("a.txt", "cat"), ("b.txt", "dog")])?;
    let work = TempDir::new()?;
    let config = test_config(work.path());
    let loader = loader_with_stage(
        &config.stages,
        StageKind::FinalOutputWriter,
        Factory::CreateFinalOutputWriter(dropping_final_writer),
    );
    let (orchestrator, recorder) = orchestrator(&config, &loader);

    let err = orchestrator.run(input.path()).unwrap_err();

    match &err {
        PipelineError::IncompleteResult {
            missing,
            unexpected,
            ..
        } => {
            assert_eq!(missing, &vec!["b.txt".to_string()]);
            assert!(unexpected.is_empty());
        }
        other => panic!("unexpected error: {other}"),
    }
    let final_dir = only_run_dir(work.path())?.join("final_output");
    assert!(final_dir.join("a.txt").is_file());
    assert!(!final_dir.join("SUCCESS.ind").exists());

    // Every module is released before the check runs.
    let events = recorder.events();
    let checked = events
        .iter()
        .position(|e| matches!(e, PipelineEvent::ConsistencyChecked { .. }))
        .expect("consistency check reported");
    let last_unload = events
        .iter()
        .rposition(|e| matches!(e, PipelineEvent::ModuleUnloaded { .. }))
        .expect("modules unloaded");
    assert!(last_unload < checked);
    assert_balanced_teardown(&events, 7);
    Ok(())
}

#[test]
fn unexpected_final_file_blocks_the_marker() -> anyhow::Result<()> {
    let input = write_input_dir(&[("a.txt", "cat")])?;
    let work = TempDir::new()?;
    let config = test_config(work.path());
    let loader = loader_with_stage(
        &config.stages,
        StageKind::FinalOutputWriter,
        Factory::CreateFinalOutputWriter(padded_final_writer),
    );
    let (orchestrator, _) = orchestrator(&config, &loader);

    let err = orchestrator.run(input.path()).unwrap_err();

    match err {
        PipelineError::IncompleteResult {
            missing,
            unexpected,
            ..
        } => {
            assert!(missing.is_empty());
            assert_eq!(unexpected, vec![UNEXPECTED_OUTPUT.to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[test]
fn unloadable_module_releases_earlier_stages() -> anyhow::Result<()> {
    let input = write_input_dir(&[("a.txt", "cat")])?;
    let work = TempDir::new()?;
    let mut config = test_config(work.path());
    let loader = BuiltinLoader::standard(&config.stages);
    config.stages.shuffler.path = PathBuf::from("./libs/nowhere/Missing.so");
    let (orchestrator, recorder) = orchestrator(&config, &loader);

    let err = orchestrator.run(input.path()).unwrap_err();

    match &err {
        PipelineError::ModuleLoad { path, .. } => {
            assert_eq!(path, Path::new("./libs/nowhere/Missing.so"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(loader.total_loads(), 3);
    assert_eq!(loader.live_modules(), 0);
    assert_balanced_teardown(&recorder.events(), 3);
    assert_eq!(
        recorder.count(|e| matches!(
            e,
            PipelineEvent::StageFailed {
                stage: StageKind::Shuffler,
                ..
            }
        )),
        1
    );
    Ok(())
}

#[test]
fn mismatched_factory_shape_is_refused() -> anyhow::Result<()> {
    let input = write_input_dir(&[("a.txt", "cat")])?;
    let work = TempDir::new()?;
    let config = test_config(work.path());
    let loader = loader_with_stage(
        &config.stages,
        StageKind::Shuffler,
        Factory::CreateReducer(SumReducer::create),
    );
    let (orchestrator, _) = orchestrator(&config, &loader);

    let err = orchestrator.run(input.path()).unwrap_err();

    match &err {
        PipelineError::SymbolResolution {
            symbol, expected, ..
        } => {
            assert_eq!(symbol, "createInputObj");
            assert_eq!(*expected, FactoryShape::CreateShuffler);
        }
        other => panic!("unexpected error: {other}"),
    }
    // The shuffler module was opened, then released along with the three before it.
    assert_eq!(loader.total_loads(), 4);
    assert_eq!(loader.live_modules(), 0);
    Ok(())
}

#[test]
fn config_from_toml_drives_a_run() -> anyhow::Result<()> {
    let input = write_input_dir(&[("a.txt", "one two two")])?;
    let work = TempDir::new()?;
    let config = PipelineConfig::from_toml(&format!(
        r#"
        work_dir = {:?}
        success_marker = "DONE"
        map_buffer_size = 1

        [stages.reducer]
        path = "/plugins/reduce.so"
        create_symbol = "makeReducer"
        destroy_symbol = "dropReducer"
        "#,
        work.path().display().to_string()
    ))?;

    let report = Orchestrator::from_config(config)?.run(input.path())?;

    assert_eq!(report.marker.file_name().and_then(|n| n.to_str()), Some("DONE"));
    assert_final_counts(&report.final_output_dir, "a.txt", &[("one", 1), ("two", 2)]);
    Ok(())
}
