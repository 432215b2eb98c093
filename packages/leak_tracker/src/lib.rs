//! Heap allocation tracking and leak reporting for instrumented test
//! programs.
//!
//! This package provides the instrumentation layer an automated grading or
//! testing harness links into submitted programs to detect memory leaks
//! without attaching an external profiler. Instrumented code calls the
//! tracked equivalents of the raw allocation primitives; each call records
//! the allocation's size and call site, and every allocation still
//! outstanding at teardown is written to a report artifact the harness
//! parses.
//!
//! The core pieces:
//! - [`Session`] - owns the registry of outstanding allocations and exposes
//!   the tracked operations (allocate / allocate zeroed / reallocate /
//!   deallocate)
//! - [`RawAllocator`] - the seam to the real allocator, implemented for the
//!   C heap by [`CMalloc`]
//! - [`LeakReport`] - the ordered snapshot of surviving allocations and the
//!   report artifact it renders to
//!
//! This package is a development and grading tool, not production
//! infrastructure.
//!
//! # Simple usage
//!
//! ```
//! use leak_tracker::Session;
//!
//! let report_path = std::env::temp_dir().join("lib_doc_example.txt");
//! let mut session = Session::builder().report_path(&report_path).build();
//!
//! let buffer = session.allocate(128);
//! assert!(!buffer.is_null());
//!
//! // SAFETY: `buffer` came from this session's allocator and is freed once.
//! unsafe { session.deallocate(buffer) };
//!
//! // Every allocation was matched by a deallocation, so the artifact
//! // contains the literal "no leak" line.
//! let report = session.finalize()?;
//! assert!(report.is_empty());
//! # std::fs::remove_file(&report_path).ok();
//! # Ok::<(), leak_tracker::ReportError>(())
//! ```
//!
//! # Call sites
//!
//! Tracked operations are annotated with `#[track_caller]`, so each record
//! carries the file and line of the call expression in the instrumented
//! program. Wrappers that forward to a tracked operation must themselves be
//! `#[track_caller]`, or the wrapper becomes the apparent call site. Call
//! sites resolving into toolchain or dependency code are excluded from
//! tracking entirely.
//!
//! # The report artifact
//!
//! [`Session::finalize()`] writes a text file: the literal `no leak` line
//! when nothing survived, otherwise one entry per surviving allocation with
//! address, size, file, and line, delimited by a fixed separator line. The
//! destination is the builder's `report_path`, else the `LEAK_REPORT_FILE`
//! environment variable (read once), else `leak_info.txt`. Dropping a
//! session without finalizing runs the same guarded teardown.
//!
//! # Session management
//!
//! Sessions are independent: each owns its registry outright, so multiple
//! trackers can coexist and tear down deterministically. Sessions are
//! single-threaded by design and are neither `Send` nor `Sync`.

mod allocator;
mod call_site;
mod errors;
mod registry;
mod report;
mod session;

pub use allocator::*;
pub use call_site::*;
pub use errors::*;
pub use report::*;
pub use session::*;
