//! Call-site capture for tracked allocation operations.

use std::fmt;
use std::panic::Location;

/// Maximum number of bytes of a source file name preserved in an allocation
/// record. Longer names are truncated at a character boundary.
pub const MAX_FILE_NAME_BYTES: usize = 256;

/// The source location of the expression that invoked a tracked allocation
/// operation.
///
/// Capture relies on `#[track_caller]` propagation, so the recorded location
/// is the call expression in the instrumented program, not a helper the call
/// was routed through. Call sites that resolve into toolchain or dependency
/// code are marked foreign and excluded from tracking, so records are never
/// tagged with a location the instrumented program does not contain.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CallSite {
    file: String,
    line: u32,
    foreign: bool,
}

impl CallSite {
    /// Captures the location of the current function's caller.
    ///
    /// Functions that forward to this one must themselves be annotated with
    /// `#[track_caller]`, otherwise the forwarding function becomes the
    /// apparent call site.
    #[must_use]
    #[track_caller]
    pub fn caller() -> Self {
        Self::from_location(Location::caller())
    }

    fn from_location(location: &Location<'_>) -> Self {
        let file = location.file();

        Self {
            file: truncate_file_name(file),
            line: location.line(),
            foreign: is_foreign_file(file),
        }
    }

    /// The source file name, truncated to [`MAX_FILE_NAME_BYTES`].
    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// The 1-based source line of the call expression.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Whether this call site resolves into toolchain or dependency code
    /// rather than the instrumented program itself.
    pub(crate) fn is_foreign(&self) -> bool {
        self.foreign
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Source files belonging to the standard library distribution or to crates
/// resolved out of the Cargo registry. Allocations attributed to these are
/// not application code and are excluded from tracking.
fn is_foreign_file(file: &str) -> bool {
    file.starts_with("/rustc/")
        || file.contains("/.cargo/registry/")
        || file.contains("\\.cargo\\registry\\")
}

fn truncate_file_name(file: &str) -> String {
    if file.len() <= MAX_FILE_NAME_BYTES {
        return file.to_owned();
    }

    let mut end = MAX_FILE_NAME_BYTES;
    while !file.is_char_boundary(end) {
        // Cannot pass zero - index 0 is always a character boundary.
        end = end.wrapping_sub(1);
    }

    file.get(..end)
        .expect("end is a verified character boundary within the string")
        .to_owned()
}
