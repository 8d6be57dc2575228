//! Assertion functions for checking run results.
//!
//! These panic with a descriptive message, so they read naturally inside
//! `#[test]` functions.

use crate::io::csv::read_csv_vec;
use crate::io::files::regular_file_names;
use crate::observer::PipelineEvent;
use crate::stage::StageKind;
use crate::types::KeyCount;
use std::collections::BTreeMap;
use std::path::Path;

/// Assert that two directories hold regular files with the same base names.
///
/// # Panics
///
/// Panics if either directory cannot be listed or the name sets differ.
pub fn assert_same_file_names(actual: &Path, expected: &Path) {
    let a = regular_file_names(actual)
        .unwrap_or_else(|e| panic!("cannot list {}: {e:#}", actual.display()));
    let e = regular_file_names(expected)
        .unwrap_or_else(|err| panic!("cannot list {}: {err:#}", expected.display()));
    assert_eq!(
        a,
        e,
        "File names differ:\n  {}: {a:?}\n  {}: {e:?}",
        actual.display(),
        expected.display()
    );
}

/// Assert that the final CSV for `file` holds exactly `expected` key counts.
///
/// Order of `expected` does not matter.
///
/// # Panics
///
/// Panics if the file cannot be read or the counts differ.
pub fn assert_final_counts(final_dir: &Path, file: &str, expected: &[(&str, u64)]) {
    let path = final_dir.join(file);
    let rows: Vec<KeyCount> = read_csv_vec(&path, true)
        .unwrap_or_else(|e| panic!("cannot read {}: {e:#}", path.display()));
    let actual: BTreeMap<String, u64> = rows.into_iter().map(|r| (r.key, r.count)).collect();
    let expected: BTreeMap<String, u64> = expected
        .iter()
        .map(|(k, c)| ((*k).to_string(), *c))
        .collect();
    assert_eq!(
        actual,
        expected,
        "Counts mismatch in {}:\n  Expected: {expected:?}\n  Actual: {actual:?}",
        path.display()
    );
}

/// Assert that `stages` modules were torn down, each instance destroyed
/// before its module was unloaded, in reverse order of loading.
///
/// # Panics
///
/// Panics if the lifecycle events are unbalanced or out of order.
pub fn assert_balanced_teardown(events: &[PipelineEvent], stages: usize) {
    let loaded: Vec<StageKind> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::ModuleLoaded { stage, .. } => Some(*stage),
            _ => None,
        })
        .collect();

    let mut teardown = Vec::new();
    for event in events {
        match event {
            PipelineEvent::InstanceDestroyed { stage } => teardown.push((*stage, false)),
            PipelineEvent::ModuleUnloaded { stage, .. } => teardown.push((*stage, true)),
            _ => {}
        }
    }
    let unloaded: Vec<StageKind> = teardown
        .iter()
        .filter(|(_, unload)| *unload)
        .map(|(s, _)| *s)
        .collect();

    assert_eq!(
        loaded.len(),
        stages,
        "Expected {stages} modules loaded, got {loaded:?}"
    );
    assert_eq!(
        unloaded.len(),
        stages,
        "Expected {stages} modules unloaded, got {unloaded:?}"
    );
    let mut reversed = loaded.clone();
    reversed.reverse();
    assert_eq!(
        unloaded, reversed,
        "Modules were not unloaded in reverse load order"
    );

    // Each unload is immediately preceded by destroying that stage's
    // instance, unless the instance was never constructed.
    for (i, (stage, unload)) in teardown.iter().enumerate() {
        if !*unload {
            assert!(
                matches!(teardown.get(i + 1), Some((next, true)) if next == stage),
                "Instance of {stage} destroyed without its module unloading next: {teardown:?}"
            );
        }
    }
}
