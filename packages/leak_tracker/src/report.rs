//! Leak report construction and emission.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::ReportError;
use crate::registry::Registry;

/// Fixed name of the report artifact, used when neither the session builder
/// nor the environment configures a destination.
pub const DEFAULT_REPORT_FILE: &str = "leak_info.txt";

/// Environment variable naming the report destination.
///
/// Read once, the first time a destination is resolved; a harness sets it
/// before launching the instrumented program, never mid-run.
pub const REPORT_PATH_ENV: &str = "LEAK_REPORT_FILE";

/// Literal artifact content when no allocations survived. The harness keys
/// its pass verdict off this line.
const NO_LEAK: &str = "no leak";

/// Separator line between report entries.
const SEPARATOR: &str = "-----------------------------------";

static ENV_REPORT_PATH: LazyLock<Option<PathBuf>> =
    LazyLock::new(|| env::var_os(REPORT_PATH_ENV).map(PathBuf::from));

pub(crate) fn default_report_path() -> PathBuf {
    ENV_REPORT_PATH
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_FILE))
}

/// One surviving allocation in a [`LeakReport`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeakEntry {
    address: usize,
    size: usize,
    file: String,
    line: u32,
}

impl LeakEntry {
    /// The allocation's address. Diagnostic only; never dereferenced.
    #[must_use]
    pub fn address(&self) -> usize {
        self.address
    }

    /// Requested size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Source file of the call site, truncated to
    /// [`MAX_FILE_NAME_BYTES`](crate::MAX_FILE_NAME_BYTES).
    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Source line of the call site.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }
}

/// The allocations still outstanding when a session was finalized, in
/// insertion order.
///
/// Rendering via [`Display`](fmt::Display) produces the exact artifact shape
/// the consuming harness parses: the literal `no leak` line when empty,
/// otherwise a `Memory Leak Summary` header followed by one
/// separator-delimited entry per surviving allocation with address, size,
/// file, and line in fixed order.
///
/// # Examples
///
/// ```
/// use leak_tracker::Session;
///
/// let report_path = std::env::temp_dir().join("leak_report_doc.txt");
/// let mut session = Session::builder().report_path(&report_path).build();
///
/// let data = session.allocate(64);
/// // SAFETY: `data` came from this session's allocator and is freed once.
/// unsafe { session.deallocate(data) };
///
/// let report = session.finalize()?;
/// assert!(report.is_empty());
/// assert_eq!(std::fs::read_to_string(&report_path)?, "no leak\n");
/// # std::fs::remove_file(&report_path).ok();
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct LeakReport {
    entries: Vec<LeakEntry>,
}

impl LeakReport {
    pub(crate) fn from_registry(registry: &Registry) -> Self {
        Self {
            entries: registry
                .records()
                .map(|record| LeakEntry {
                    address: record.address(),
                    size: record.size(),
                    file: record.site().file().to_owned(),
                    line: record.site().line(),
                })
                .collect(),
        }
    }

    /// Whether no allocations survived.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of surviving allocations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Total bytes across all surviving allocations.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.entries
            .iter()
            .map(LeakEntry::size)
            .fold(0, usize::wrapping_add)
    }

    /// The surviving allocations in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = &LeakEntry> {
        self.entries.iter()
    }

    /// Writes the rendered report to `path`, creating or truncating the
    /// file.
    pub fn write_to_path(&self, path: &Path) -> Result<(), ReportError> {
        fs::write(path, self.to_string()).map_err(|source| ReportError::Unwritable {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl fmt::Display for LeakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return writeln!(f, "{NO_LEAK}");
        }

        writeln!(f, "Memory Leak Summary")?;
        writeln!(f, "{SEPARATOR}")?;

        for entry in &self.entries {
            writeln!(f, "address : {:#x}", entry.address)?;
            writeln!(f, "size    : {} bytes", entry.size)?;
            writeln!(f, "file    : {}", entry.file)?;
            writeln!(f, "line    : {}", entry.line)?;
            writeln!(f, "{SEPARATOR}")?;
        }

        Ok(())
    }
}
