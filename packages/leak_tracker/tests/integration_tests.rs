//! Integration tests for `leak_tracker` driving the real C heap allocator.
//!
//! These tests exercise the full pipeline: tracked allocation calls, the
//! registry bookkeeping, and the report artifact written at teardown, exactly
//! as a consuming harness would observe it.

use std::fs;
use std::path::PathBuf;

use leak_tracker::{LeakEntry, Session};
use tempfile::TempDir;

fn session_with_artifact() -> (TempDir, PathBuf, Session) {
    let dir = tempfile::tempdir().expect("creating temp dir for report artifacts");
    let path = dir.path().join("leak_info.txt");
    let session = Session::builder().report_path(&path).build();
    (dir, path, session)
}

#[test]
fn matched_pairs_produce_no_leak() {
    let (_dir, path, mut session) = session_with_artifact();

    let first = session.allocate(10);
    let second = session.allocate(20);
    assert!(!first.is_null());
    assert!(!second.is_null());

    // SAFETY: both pointers came from this session's allocator and are freed
    // exactly once.
    unsafe { session.deallocate(first) };
    // SAFETY: as above.
    unsafe { session.deallocate(second) };

    let report = session.finalize().expect("destination is writable");
    assert!(report.is_empty());

    let artifact = fs::read_to_string(&path).expect("artifact exists");
    assert_eq!(artifact, "no leak\n");
}

#[test]
fn single_leak_is_reported_with_size_file_and_line() {
    let (_dir, path, mut session) = session_with_artifact();

    let leaked = session.allocate(20); let leak_line = line!();

    let report = session.finalize().expect("destination is writable");
    assert_eq!(report.len(), 1);

    let artifact = fs::read_to_string(&path).expect("artifact exists");
    assert!(artifact.starts_with("Memory Leak Summary\n"));
    assert!(artifact.contains(&format!("address : {:#x}", leaked.addr())));
    assert!(artifact.contains("size    : 20 bytes"));
    assert!(artifact.contains(&format!("line    : {leak_line}")));
    assert!(
        artifact
            .lines()
            .any(|line| line.starts_with("file    : ") && line.ends_with("integration_tests.rs"))
    );
}

#[test]
fn only_the_unfreed_allocation_is_reported() {
    let (_dir, path, mut session) = session_with_artifact();

    let first = session.allocate(10);
    let second = session.allocate(20); let second_line = line!();
    assert!(!second.is_null());

    // SAFETY: `first` came from this session's allocator and is freed once.
    unsafe { session.deallocate(first) };

    let report = session.finalize().expect("destination is writable");
    assert_eq!(report.len(), 1);

    let entry = report.entries().next().expect("one entry present");
    assert_eq!(entry.size(), 20);
    assert_eq!(entry.line(), second_line);
    assert!(entry.file().ends_with("integration_tests.rs"));

    let artifact = fs::read_to_string(&path).expect("artifact exists");
    assert!(artifact.contains("size    : 20 bytes"));
    assert!(!artifact.contains("size    : 10 bytes"));
}

#[test]
fn reallocation_preserves_identity() {
    let (_dir, path, mut session) = session_with_artifact();

    let original = session.allocate(10);
    assert!(!original.is_null());

    // SAFETY: `original` came from this session's allocator; `reallocate`
    // invalidates it in favor of the returned pointer.
    let grown = unsafe { session.reallocate(original, 20) };
    assert!(!grown.is_null());
    assert_eq!(session.tracked_count(), 1);

    // SAFETY: `grown` is the live handle and is freed exactly once.
    unsafe { session.deallocate(grown) };

    let report = session.finalize().expect("destination is writable");
    assert!(report.is_empty());

    let artifact = fs::read_to_string(&path).expect("artifact exists");
    assert_eq!(artifact, "no leak\n");
}

#[test]
fn zeroed_allocation_is_usable_and_tracked() {
    let (_dir, _path, mut session) = session_with_artifact();

    let array = session.allocate_zeroed(4, 8);
    assert!(!array.is_null());
    assert_eq!(session.tracked_bytes(), 32);

    for offset in 0..32 {
        // SAFETY: `offset` is within the 32-byte allocation above.
        let byte_ptr = unsafe { array.add(offset) };
        // SAFETY: `calloc` memory is initialized, so the read is valid.
        let byte = unsafe { byte_ptr.read() };
        assert_eq!(byte, 0);
    }

    // SAFETY: `array` came from this session's allocator and is freed once.
    unsafe { session.deallocate(array) };
    assert!(session.is_empty());
}

#[test]
fn overflowing_zeroed_allocation_is_rejected() {
    let (_dir, _path, mut session) = session_with_artifact();

    let rejected = session.allocate_zeroed(usize::MAX, usize::MAX);

    assert!(rejected.is_null());
    assert!(session.is_empty());
}

#[test]
fn allocation_predating_tracking_is_an_untracked_free() {
    let (_dir, _path, mut session) = session_with_artifact();

    // Allocated behind the session's back, so no record exists for it.
    // SAFETY: `malloc` has no preconditions.
    let outside = unsafe { libc::malloc(8) }.cast::<u8>();
    assert!(!outside.is_null());

    // SAFETY: `outside` is a live C heap allocation and is freed once; the
    // session forwards the real free even without a record.
    unsafe { session.deallocate(outside) };

    assert_eq!(session.untracked_frees(), 1);
    assert!(session.is_empty());
}

#[test]
fn second_finalize_is_empty_and_keeps_the_artifact() {
    let (_dir, path, mut session) = session_with_artifact();

    let leaked = session.allocate(16);
    assert!(!leaked.is_null());

    let first = session.finalize().expect("destination is writable");
    assert_eq!(first.len(), 1);
    let artifact = fs::read_to_string(&path).expect("artifact exists");

    let second = session.finalize().expect("second finalize is a no-op");
    assert!(second.is_empty());
    let unchanged = fs::read_to_string(&path).expect("artifact still exists");
    assert_eq!(artifact, unchanged);
}

#[test]
fn independent_sessions_report_independently() {
    let dir = tempfile::tempdir().expect("creating temp dir for report artifacts");
    let leaky_path = dir.path().join("leaky.txt");
    let clean_path = dir.path().join("clean.txt");

    let mut leaky = Session::builder().report_path(&leaky_path).build();
    let mut clean = Session::builder().report_path(&clean_path).build();

    let leaked = leaky.allocate(12);
    assert!(!leaked.is_null());

    let held = clean.allocate(12);
    // SAFETY: `held` came from `clean`'s allocator and is freed once.
    unsafe { clean.deallocate(held) };

    let leaky_report = leaky.finalize().expect("destination is writable");
    let clean_report = clean.finalize().expect("destination is writable");

    assert_eq!(leaky_report.len(), 1);
    assert!(clean_report.is_empty());

    let leaky_artifact = fs::read_to_string(&leaky_path).expect("artifact exists");
    let clean_artifact = fs::read_to_string(&clean_path).expect("artifact exists");
    assert!(leaky_artifact.contains("size    : 12 bytes"));
    assert_eq!(clean_artifact, "no leak\n");
}

#[test]
fn entries_appear_in_allocation_order() {
    let (_dir, _path, mut session) = session_with_artifact();

    for size in [1_usize, 2, 3] {
        let ptr = session.allocate(size);
        assert!(!ptr.is_null());
    }

    let report = session.finalize().expect("destination is writable");
    let sizes: Vec<usize> = report.entries().map(LeakEntry::size).collect();
    assert_eq!(sizes, vec![1, 2, 3]);
}

#[test]
fn environment_variable_names_the_destination() {
    let dir = tempfile::tempdir().expect("creating temp dir for report artifacts");
    let path = dir.path().join("env_leak_info.txt");

    // SAFETY: set before any session in this process resolves a default
    // destination, and no other test in this binary reads the environment.
    unsafe { std::env::set_var(leak_tracker::REPORT_PATH_ENV, &path) };

    let mut session = Session::new();
    assert_eq!(session.report_path(), path);

    let report = session.finalize().expect("destination is writable");
    assert!(report.is_empty());
    assert_eq!(
        fs::read_to_string(&path).expect("artifact exists"),
        "no leak\n"
    );
}
