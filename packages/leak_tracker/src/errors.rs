//! Error types for leak report emission.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors arising while emitting the leak report artifact.
///
/// Allocation-level failures are not represented here: the tracked
/// operations return sentinel null pointers, matching the allocator contract
/// instrumented programs are written against.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportError {
    /// The report destination could not be created or written.
    ///
    /// Non-fatal: by the time this is returned the registry has already been
    /// cleared, so a failed report never retains tracked memory.
    #[error("failed to write leak report to {}: {}", .path.display(), .source)]
    Unwritable {
        /// The destination the report could not be written to.
        path: PathBuf,

        /// The underlying I/O failure.
        source: io::Error,
    },
}
