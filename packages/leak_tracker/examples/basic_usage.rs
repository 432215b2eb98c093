//! Example demonstrating basic usage of `leak_tracker`.
//!
//! Shows a session tracking allocations the way an instrumented program
//! would, followed by the teardown step that produces the report artifact.

use leak_tracker::Session;

fn main() {
    let report_path = std::env::temp_dir().join("leak_tracker_basic_usage.txt");
    let mut session = Session::builder().report_path(&report_path).build();

    println!("=== Leak Tracker Example ===\n");

    // A well-behaved allocation: matched by a deallocation.
    let buffer = session.allocate(128);
    assert!(!buffer.is_null());
    println!("allocated 128 bytes at {buffer:p}");

    // SAFETY: `buffer` came from this session's allocator and is freed once.
    unsafe { session.deallocate(buffer) };
    println!("freed the buffer again; {} allocations outstanding", session.tracked_count());

    // A zero-initialized array, grown once.
    let array = session.allocate_zeroed(16, 4);
    assert!(!array.is_null());
    println!("allocated a zeroed 16 x 4 byte array at {array:p}");

    // SAFETY: `array` is the live handle; `reallocate` replaces it.
    let grown = unsafe { session.reallocate(array, 256) };
    assert!(!grown.is_null());
    println!("grew it to 256 bytes at {grown:p}");

    // SAFETY: `grown` replaced `array` and is freed exactly once.
    unsafe { session.deallocate(grown) };

    match session.finalize() {
        Ok(report) => {
            println!(
                "\nteardown complete: {} surviving allocations ({} bytes)",
                report.len(),
                report.total_bytes()
            );
            println!("artifact written to {}", report_path.display());
        }
        Err(error) => println!("\nreport could not be written: {error}"),
    }

    _ = std::fs::remove_file(&report_path);
}
