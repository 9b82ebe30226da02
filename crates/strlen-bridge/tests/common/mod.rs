//! Shared test utilities: library source doubles wired to the real native exports

#![allow(dead_code, unused_imports)]

use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strlen_bridge::ffi::{InProcessLibrarySource, LibrarySource, NativeLibrary};
use strlen_bridge::{BridgeError, BridgeResult};

// Re-export testing utilities
pub use pretty_assertions::{assert_eq, assert_ne};

pub const LIBRARY: &str = "string_length";
pub const SYMBOL: &str = "calculate_string_length_from_rust";

/// Route `tracing` output through the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// The native crate's exports, linked into the test binary
pub fn native_exports() -> InProcessLibrarySource {
    InProcessLibrarySource::new(LIBRARY)
        .with_symbol(
            SYMBOL,
            string_length::calculate_string_length_from_rust as *const c_void,
        )
        .with_symbol(
            "calculate_string_length_from_rust_signature",
            string_length::calculate_string_length_from_rust_signature as *const c_void,
        )
}

/// Library source that counts opens and can fail or stall on demand
pub struct CountingSource {
    inner: InProcessLibrarySource,
    opens: Arc<AtomicUsize>,
    failures_left: AtomicUsize,
    open_delay: Duration,
}

impl CountingSource {
    pub fn new(inner: InProcessLibrarySource) -> Self {
        Self {
            inner,
            opens: Arc::new(AtomicUsize::new(0)),
            failures_left: AtomicUsize::new(0),
            open_delay: Duration::ZERO,
        }
    }

    /// Reject the first `count` opens with `LibraryLoad`
    pub fn failing_first(mut self, count: usize) -> Self {
        self.failures_left = AtomicUsize::new(count);
        self
    }

    /// Sleep inside every open to widen race windows
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Shared counter of open attempts, readable after the source is moved
    pub fn open_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.opens)
    }
}

impl LibrarySource for CountingSource {
    fn locate(&self, library: &str) -> BridgeResult<PathBuf> {
        self.inner.locate(library)
    }

    fn open(&self, path: &Path) -> BridgeResult<Box<dyn NativeLibrary>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.open_delay.is_zero() {
            std::thread::sleep(self.open_delay);
        }

        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(BridgeError::LibraryLoad {
                path: path.to_path_buf(),
                reason: "injected failure".to_string(),
            });
        }

        self.inner.open(path)
    }
}
