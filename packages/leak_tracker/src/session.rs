//! Allocation tracking sessions.

use std::path::{Path, PathBuf};
use std::process;
use std::ptr;

use crate::ReportError;
use crate::allocator::{CMalloc, RawAllocator};
use crate::call_site::CallSite;
use crate::registry::{AllocationRecord, Registry};
use crate::report::{LeakReport, default_report_path};

/// How a session responds when the underlying allocator returns null for a
/// nonzero request.
///
/// A zeroed-allocation size computation that overflows is rejected before
/// delegating and follows the same policy, since it behaves as an allocation
/// failure.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum ExhaustionPolicy {
    /// Return null to the caller and record nothing.
    ///
    /// The default; this matches the allocator contract instrumented
    /// programs are written against, leaving failure handling to them.
    #[default]
    Propagate,

    /// Log a diagnostic and abort the process.
    ///
    /// For harnesses that treat allocator exhaustion as an unrecoverable
    /// grading failure rather than a condition the program may handle.
    Abort,
}

/// An allocation tracking session.
///
/// The session owns the registry of outstanding allocations and exposes the
/// tracked equivalents of the raw allocation primitives. Instrumented code
/// calls these instead of allocating directly; each call is implicitly
/// tagged with the file and line of the call expression via
/// `#[track_caller]`. When the session is finalized (explicitly via
/// [`finalize()`][Self::finalize], or implicitly when dropped), every
/// allocation still outstanding is written to the leak report artifact the
/// consuming harness parses.
///
/// Sessions are independent of each other: each owns its registry outright,
/// so multiple trackers can coexist and tear down deterministically.
///
/// # Examples
///
/// ```
/// use leak_tracker::Session;
///
/// let report_path = std::env::temp_dir().join("session_doc_example.txt");
/// let mut session = Session::builder().report_path(&report_path).build();
///
/// let data = session.allocate(64);
/// assert!(!data.is_null());
///
/// // SAFETY: `data` came from this session's allocator and is freed once.
/// unsafe { session.deallocate(data) };
///
/// let report = session.finalize()?;
/// assert!(report.is_empty());
/// # std::fs::remove_file(&report_path).ok();
/// # Ok::<(), leak_tracker::ReportError>(())
/// ```
///
/// # Thread safety
///
/// Sessions are single-threaded by design and are neither `Send` nor
/// `Sync`; the registry chain is unsafe under concurrent mutation, and the
/// type system enforces that instead of a lock.
#[derive(Debug)]
pub struct Session<A: RawAllocator = CMalloc> {
    allocator: A,
    registry: Registry,
    policy: ExhaustionPolicy,
    report_path: PathBuf,
    reported: bool,
    untracked_frees: u64,
}

impl Session<CMalloc> {
    /// Creates a session tracking the C heap allocator with the default
    /// configuration.
    #[expect(
        clippy::new_without_default,
        reason = "a 'default session' would suggest sessions are interchangeable; creating one is a deliberate act"
    )]
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for customizing the session configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use leak_tracker::{ExhaustionPolicy, Session};
    ///
    /// let mut session = Session::builder()
    ///     .report_path(std::env::temp_dir().join("builder_doc_example.txt"))
    ///     .exhaustion_policy(ExhaustionPolicy::Propagate)
    ///     .build();
    /// # let _report = session.finalize();
    /// ```
    #[must_use]
    pub fn builder() -> SessionBuilder<CMalloc> {
        SessionBuilder::new()
    }
}

impl<A: RawAllocator> Session<A> {
    /// Allocates `size` bytes through the underlying allocator and records
    /// the allocation against the caller's file and line.
    ///
    /// The pointer is returned unchanged. A null return for a nonzero
    /// request is allocator exhaustion, handled per the session's
    /// [`ExhaustionPolicy`]; a null return for a zero-size request is not a
    /// failure and is never tracked.
    #[must_use = "the pointer is the only handle to the allocation; losing it is itself a leak"]
    #[track_caller]
    pub fn allocate(&mut self, size: usize) -> *mut u8 {
        let site = CallSite::caller();

        let allocated = self.allocator.allocate(size);
        if allocated.is_null() {
            if size == 0 {
                return allocated;
            }
            log::warn!("allocation of {size} bytes returned null at {site}");
            return self.fail_allocation("allocation");
        }

        self.track(allocated, size, site);
        allocated
    }

    /// Allocates a zero-initialized array of `count` elements of `elem_size`
    /// bytes each, recording the total size against the caller's file and
    /// line.
    ///
    /// The total size is computed with an explicit overflow check before
    /// delegating. An overflowing request is rejected as an allocation
    /// failure rather than passed through with a truncated size, which
    /// would under-report true memory usage.
    #[must_use = "the pointer is the only handle to the allocation; losing it is itself a leak"]
    #[track_caller]
    pub fn allocate_zeroed(&mut self, count: usize, elem_size: usize) -> *mut u8 {
        let site = CallSite::caller();

        let Some(total_size) = count.checked_mul(elem_size) else {
            log::warn!(
                "zeroed allocation of {count} x {elem_size} bytes overflows usize at {site}; rejecting"
            );
            return self.fail_allocation("zeroed allocation");
        };

        let allocated = self.allocator.allocate_zeroed(count, elem_size);
        if allocated.is_null() {
            if total_size == 0 {
                return allocated;
            }
            log::warn!("zeroed allocation of {total_size} bytes returned null at {site}");
            return self.fail_allocation("zeroed allocation");
        }

        self.track(allocated, total_size, site);
        allocated
    }

    /// Resizes the allocation at `ptr` to `new_size` bytes, updating the
    /// record to the new address, size, and call site on success.
    ///
    /// A null `ptr` behaves as a fresh allocation. On failure the original
    /// allocation is untouched and its record stays exactly as it was;
    /// only a successful reallocation updates tracking.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a pointer previously returned by one of this
    /// session's allocation operations and not yet deallocated.
    #[must_use = "the old pointer may have been invalidated; the returned pointer is the live handle"]
    #[track_caller]
    pub unsafe fn reallocate(&mut self, ptr: *mut u8, new_size: usize) -> *mut u8 {
        let site = CallSite::caller();

        // SAFETY: forwarding the caller's contract.
        let moved = unsafe { self.allocator.reallocate(ptr, new_size) };
        if moved.is_null() {
            // Only success updates tracking; the record for `ptr`, if any,
            // stays exactly as it was.
            if new_size == 0 {
                return moved;
            }
            log::warn!("reallocation to {new_size} bytes returned null at {site}");
            return self.fail_allocation("reallocation");
        }

        if !ptr.is_null() && self.registry.remove(ptr.addr()).is_none() {
            log::debug!("reallocated {ptr:p}, which was not tracked");
        }

        self.track(moved, new_size, site);
        moved
    }

    /// Releases the allocation at `ptr`, removing its record.
    ///
    /// Null is forwarded without a diagnostic; freeing null is defined to do
    /// nothing in the contract instrumented programs rely on. An address
    /// with no matching record (a double free, or an allocation predating
    /// tracking) is logged and counted as an untracked free - and the real
    /// deallocation is still performed, honoring the caller's expectation of
    /// normal freeing semantics regardless of tracking state.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a pointer previously returned by one of this
    /// session's allocation operations and not yet deallocated.
    pub unsafe fn deallocate(&mut self, ptr: *mut u8) {
        if !ptr.is_null() && self.registry.remove(ptr.addr()).is_none() {
            // Never going to overflow u64 within one process lifetime.
            self.untracked_frees = self.untracked_frees.wrapping_add(1);
            log::warn!("untracked free of {ptr:p} (double free or allocation predating tracking)");
        }

        // SAFETY: forwarding the caller's contract; the allocator accepts
        // null.
        unsafe { self.allocator.deallocate(ptr) };
    }

    /// Number of allocations currently tracked.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.registry.len()
    }

    /// Whether no allocations are currently tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Total bytes across currently tracked allocations.
    #[must_use]
    pub fn tracked_bytes(&self) -> usize {
        self.registry
            .records()
            .map(AllocationRecord::size)
            .fold(0, usize::wrapping_add)
    }

    /// Number of deallocation calls whose address had no matching record.
    #[must_use]
    pub fn untracked_frees(&self) -> u64 {
        self.untracked_frees
    }

    /// The destination the leak report will be written to.
    #[must_use]
    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    /// Snapshots the currently tracked allocations, in insertion order.
    #[must_use]
    pub fn to_report(&self) -> LeakReport {
        LeakReport::from_registry(&self.registry)
    }

    /// Emits the leak report artifact and clears the registry.
    ///
    /// This is the deterministic teardown step the host invokes once at
    /// shutdown. Dropping the session runs the same guarded path, so
    /// whichever of the two happens second is a no-op: the artifact is not
    /// rewritten, no released record is re-walked, and the returned report
    /// is empty.
    ///
    /// The registry is cleared even when the destination cannot be written,
    /// so a failed report never retains tracked memory.
    pub fn finalize(&mut self) -> Result<LeakReport, ReportError> {
        if self.reported {
            return Ok(LeakReport::default());
        }
        self.reported = true;

        let report = self.to_report();
        self.registry.clear();

        match report.write_to_path(&self.report_path) {
            Ok(()) => Ok(report),
            Err(error) => {
                log::error!("{error}");
                Err(error)
            }
        }
    }

    fn track(&mut self, ptr: *mut u8, size: usize, site: CallSite) {
        // Records tagged with a toolchain or dependency location would point
        // reviewers at code the instrumented program does not contain.
        if site.is_foreign() {
            return;
        }

        self.registry
            .insert(AllocationRecord::new(ptr.addr(), size, site));
    }

    #[cfg_attr(test, mutants::skip)] // The abort arm cannot run inside the test process - manually verified.
    fn fail_allocation(&self, request: &str) -> *mut u8 {
        match self.policy {
            ExhaustionPolicy::Propagate => ptr::null_mut(),
            ExhaustionPolicy::Abort => {
                log::error!("{request} failed and the exhaustion policy is Abort; aborting");
                process::abort()
            }
        }
    }
}

impl<A: RawAllocator> Drop for Session<A> {
    #[cfg_attr(test, mutants::skip)] // The guarded path is exercised via finalize tests.
    fn drop(&mut self) {
        // Failures are already logged inside finalize.
        _ = self.finalize();
    }
}

/// Builder for a [`Session`].
///
/// Needed only to customize the report destination, the exhaustion policy,
/// or the underlying allocator; [`Session::new()`] covers the common case.
#[derive(Debug)]
#[must_use]
pub struct SessionBuilder<A: RawAllocator = CMalloc> {
    allocator: A,
    policy: ExhaustionPolicy,
    report_path: Option<PathBuf>,
}

impl SessionBuilder<CMalloc> {
    pub(crate) fn new() -> Self {
        Self {
            allocator: CMalloc::new(),
            policy: ExhaustionPolicy::default(),
            report_path: None,
        }
    }
}

impl<A: RawAllocator> SessionBuilder<A> {
    /// Substitutes the allocator the session delegates to.
    pub fn allocator<B: RawAllocator>(self, allocator: B) -> SessionBuilder<B> {
        SessionBuilder {
            allocator,
            policy: self.policy,
            report_path: self.report_path,
        }
    }

    /// Sets the response to allocator exhaustion. See [`ExhaustionPolicy`].
    pub fn exhaustion_policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the report destination, overriding the
    /// [`LEAK_REPORT_FILE`][crate::REPORT_PATH_ENV] environment variable and
    /// the fixed default name.
    pub fn report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    /// Builds the session.
    ///
    /// The report destination falls back to the
    /// [`LEAK_REPORT_FILE`][crate::REPORT_PATH_ENV] environment variable
    /// (read once) and then to the fixed
    /// [`leak_info.txt`][crate::DEFAULT_REPORT_FILE] name.
    #[must_use]
    pub fn build(self) -> Session<A> {
        Session {
            allocator: self.allocator,
            registry: Registry::default(),
            policy: self.policy,
            report_path: self.report_path.unwrap_or_else(default_report_path),
            reported: false,
            untracked_frees: 0,
        }
    }
}
