//! Example of a deliberately leaky program and the artifact it produces.
//!
//! This mirrors what a grading harness sees when a submitted program forgets
//! to free an allocation: the teardown step writes one report entry per
//! surviving allocation, tagged with the call site that created it.

use leak_tracker::Session;

fn main() {
    let report_path = std::env::temp_dir().join("leak_tracker_leaky_program.txt");
    let mut session = Session::builder().report_path(&report_path).build();

    // Freed correctly.
    let released = session.allocate(10);
    // SAFETY: `released` came from this session's allocator and is freed once.
    unsafe { session.deallocate(released) };

    // Never freed - these two survive until teardown.
    let _leak_a = session.allocate(20);
    let _leak_b = session.allocate_zeroed(8, 4);

    let report = session
        .finalize()
        .expect("temp dir destination is writable");

    println!("surviving allocations: {}", report.len());
    for entry in report.entries() {
        println!(
            "  {} bytes allocated at {}:{}",
            entry.size(),
            entry.file(),
            entry.line()
        );
    }

    println!("\nartifact content:");
    match std::fs::read_to_string(&report_path) {
        Ok(artifact) => print!("{artifact}"),
        Err(error) => println!("could not read artifact: {error}"),
    }

    _ = std::fs::remove_file(&report_path);
}
