//! Dynamic library loading for FFI
//!
//! Provides cross-platform dynamic library loading using `libloading`.
//! Handles platform-specific library naming conventions and search paths,
//! and caches the loaded library so it is opened exactly once.
//!
//! # Initialization barrier
//!
//! `NativeLibraryLoader::ensure_loaded` reads a `OnceLock` without locking.
//! Only when it is empty does a caller take `init_lock`; the first caller
//! through performs the load while the rest block on the mutex and then find
//! the cached handle. A failed load leaves the `OnceLock` empty, so the next
//! call retries.
//!
//! # One handle per path
//!
//! Opened libraries are also recorded in a process-wide registry keyed by
//! resolved path. A loader whose library resolves to a path already in the
//! registry reuses that handle instead of opening the file again, so any
//! number of loaders share at most one live handle per library path.
//! Entries are never removed; libraries stay resident until the process
//! exits.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use libloading::Library;
use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::{debug, info, warn};

/// A library resident in the process
///
/// Addresses returned by `symbol` must stay valid for as long as the
/// implementing value is alive.
pub trait NativeLibrary: Send + Sync {
    /// File the library was opened from
    fn path(&self) -> &Path;

    /// Address of an exported symbol, `None` when it is not exported
    fn symbol(&self, name: &str) -> Option<*const c_void>;
}

/// Where libraries are found and how they are opened
pub trait LibrarySource: Send + Sync {
    /// Resolve a library base name to the file that would be opened
    fn locate(&self, library: &str) -> BridgeResult<PathBuf>;

    /// Open a located library
    fn open(&self, path: &Path) -> BridgeResult<Box<dyn NativeLibrary>>;
}

/// Process state of the library owned by one loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoadState {
    Unloaded = 0,
    Loading = 1,
    Loaded = 2,
    Failed = 3,
}

impl LoadState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LoadState::Loading,
            2 => LoadState::Loaded,
            3 => LoadState::Failed,
            _ => LoadState::Unloaded,
        }
    }
}

/// Shared reference to a loaded library
///
/// Cloning copies the reference; the library itself is opened once and
/// stays resident while any clone is alive.
#[derive(Clone)]
pub struct LibraryHandle {
    inner: Arc<dyn NativeLibrary>,
}

impl LibraryHandle {
    fn new(library: Box<dyn NativeLibrary>) -> Self {
        Self {
            inner: Arc::from(library),
        }
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Lookup a symbol address in the library
    pub fn symbol(&self, name: &str) -> Option<*const c_void> {
        self.inner.symbol(name)
    }

    /// Whether two handles refer to the same loaded library
    pub fn ptr_eq(&self, other: &LibraryHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryHandle")
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}

static OPEN_LIBRARIES: OnceLock<Mutex<HashMap<PathBuf, LibraryHandle>>> = OnceLock::new();

fn open_libraries() -> MutexGuard<'static, HashMap<PathBuf, LibraryHandle>> {
    OPEN_LIBRARIES
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Registry key for a located library: the canonical path when the file
/// exists, the located path otherwise
fn registry_key(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Library loader with a once-only cache and platform-specific path resolution
pub struct NativeLibraryLoader {
    library: String,
    source: Box<dyn LibrarySource>,
    handle: OnceLock<LibraryHandle>,
    init_lock: Mutex<()>,
    state: AtomicU8,
}

impl NativeLibraryLoader {
    /// Create a loader for `library` (base name, e.g. `string_length`)
    pub fn new(library: impl Into<String>, source: impl LibrarySource + 'static) -> Self {
        Self {
            library: library.into(),
            source: Box::new(source),
            handle: OnceLock::new(),
            init_lock: Mutex::new(()),
            state: AtomicU8::new(LoadState::Unloaded as u8),
        }
    }

    /// Return the cached handle, loading the library on first use
    ///
    /// Loading a dynamic library executes its initialization code, so the
    /// configured search locations must only contain trusted libraries.
    pub fn ensure_loaded(&self) -> BridgeResult<LibraryHandle> {
        if let Some(handle) = self.handle.get() {
            return Ok(handle.clone());
        }

        // The guarded data is (), so a poisoned lock carries no broken state.
        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = self.handle.get() {
            return Ok(handle.clone());
        }

        self.set_state(LoadState::Loading);
        match self.load() {
            Ok(handle) => {
                let handle = self.handle.get_or_init(|| handle).clone();
                self.set_state(LoadState::Loaded);
                info!(
                    library = %self.library,
                    path = %handle.path().display(),
                    "native library loaded"
                );
                Ok(handle)
            }
            Err(err) => {
                self.set_state(LoadState::Failed);
                warn!(library = %self.library, error = %err, "native library load failed");
                Err(err)
            }
        }
    }

    fn load(&self) -> BridgeResult<LibraryHandle> {
        let path = self.source.locate(&self.library)?;
        let key = registry_key(&path);

        // Held across `open` so two loaders cannot open the same path at once.
        let mut open = open_libraries();
        if let Some(handle) = open.get(&key) {
            debug!(path = %path.display(), "reusing process-wide library handle");
            return Ok(handle.clone());
        }

        let handle = LibraryHandle::new(self.source.open(&path)?);
        open.insert(key, handle.clone());
        Ok(handle)
    }

    pub fn state(&self) -> LoadState {
        LoadState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: LoadState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Base name of the library this loader owns
    pub fn library(&self) -> &str {
        &self.library
    }

    /// Path of the loaded library, if loaded
    pub fn loaded_path(&self) -> Option<&Path> {
        self.handle.get().map(LibraryHandle::path)
    }
}

impl fmt::Debug for NativeLibraryLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibraryLoader")
            .field("library", &self.library)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Library opened through the platform dynamic loader
struct DynamicLibrary {
    library: Library,
    path: PathBuf,
}

impl NativeLibrary for DynamicLibrary {
    fn path(&self) -> &Path {
        &self.path
    }

    fn symbol(&self, name: &str) -> Option<*const c_void> {
        // Safety: the symbol is read as an address only; callers give it a
        // type after checking the signature.
        let symbol = unsafe { self.library.get::<*const c_void>(name.as_bytes()) }.ok()?;
        let address = *symbol;
        (!address.is_null()).then_some(address)
    }
}

/// Finds libraries on disk and opens them with `libloading`
#[derive(Debug, Clone)]
pub struct SystemLibrarySource {
    search_paths: Vec<PathBuf>,
}

impl SystemLibrarySource {
    /// Search `extra_paths` first, then the executable's directories, then
    /// (when `system_paths` is set) the platform library path variable and
    /// the standard system directories
    pub fn new(extra_paths: Vec<PathBuf>, system_paths: bool) -> Self {
        let (env_paths, default_paths) = if system_paths {
            (Self::env_search_paths(), Self::default_search_paths())
        } else {
            (Vec::new(), Vec::new())
        };

        Self {
            search_paths: Self::ordered([
                extra_paths,
                Self::executable_paths(),
                env_paths,
                default_paths,
            ]),
        }
    }

    /// Concatenate path groups in priority order, keeping only the first
    /// occurrence of each path
    fn ordered(groups: [Vec<PathBuf>; 4]) -> Vec<PathBuf> {
        let mut search_paths: Vec<PathBuf> = Vec::new();
        for path in groups.into_iter().flatten() {
            if !search_paths.contains(&path) {
                search_paths.push(path);
            }
        }
        search_paths
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.search_paths.clone(), config.system_search_paths)
    }

    /// Directory of the running executable, plus its parent when the
    /// executable lives in Cargo's `deps` directory
    fn executable_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            if dir.file_name().is_some_and(|name| name == "deps") {
                if let Some(parent) = dir.parent() {
                    paths.push(parent.to_path_buf());
                }
            }
            paths.insert(0, dir);
        }
        paths
    }

    /// Entries of the platform's library path variable
    fn env_search_paths() -> Vec<PathBuf> {
        let var = if cfg!(target_os = "windows") {
            "PATH"
        } else if cfg!(target_os = "macos") {
            "DYLD_LIBRARY_PATH"
        } else {
            "LD_LIBRARY_PATH"
        };

        std::env::var_os(var)
            .map(|value| {
                std::env::split_paths(&value)
                    .filter(|p| !p.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get platform-specific default library search paths
    ///
    /// - Linux: /usr/local/lib, /usr/lib, /lib (+ lib64 variants)
    /// - macOS: /usr/local/lib, /usr/lib, /opt/homebrew/lib
    /// - Windows: %SystemRoot%\System32
    fn default_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        #[cfg(target_os = "linux")]
        {
            paths.push(PathBuf::from("/usr/local/lib"));
            paths.push(PathBuf::from("/usr/lib"));
            paths.push(PathBuf::from("/lib"));

            if cfg!(target_pointer_width = "64") {
                paths.push(PathBuf::from("/usr/lib64"));
                paths.push(PathBuf::from("/lib64"));
            }
        }

        #[cfg(target_os = "macos")]
        {
            paths.push(PathBuf::from("/usr/local/lib"));
            paths.push(PathBuf::from("/usr/lib"));
            paths.push(PathBuf::from("/opt/homebrew/lib"));
        }

        #[cfg(target_os = "windows")]
        {
            if let Ok(system_root) = std::env::var("SystemRoot") {
                paths.push(PathBuf::from(format!("{}\\System32", system_root)));
            } else {
                paths.push(PathBuf::from("C:\\Windows\\System32"));
            }
        }

        paths
    }

    /// Search locations in priority order
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl LibrarySource for SystemLibrarySource {
    /// `lib<name>.so`, `lib<name>.dylib` or `<name>.dll`, whichever the
    /// platform's native build produces
    fn locate(&self, library: &str) -> BridgeResult<PathBuf> {
        let file_name = libloading::library_filename(library);
        let mut searched = Vec::with_capacity(self.search_paths.len());

        for dir in &self.search_paths {
            let candidate = dir.join(&file_name);
            debug!(candidate = %candidate.display(), "probing for native library");
            if candidate.is_file() {
                return Ok(candidate);
            }
            searched.push(candidate);
        }

        Err(BridgeError::LibraryNotFound {
            library: library.to_string(),
            searched,
        })
    }

    fn open(&self, path: &Path) -> BridgeResult<Box<dyn NativeLibrary>> {
        // Safety: opening runs the library's initializers; the search
        // locations are trusted by configuration.
        let library = unsafe { Library::new(path) }.map_err(|e| BridgeError::LibraryLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(Box::new(DynamicLibrary {
            library,
            path: path.to_path_buf(),
        }))
    }
}

static NEXT_IN_PROCESS_ID: AtomicUsize = AtomicUsize::new(0);

/// Serves symbols linked into the current binary
///
/// Used when the native code is linked statically instead of shipped as a
/// shared library. Addresses are registered up front by name.
///
/// Each source built with `new` gets its own `<in-process:N>` location, so
/// clones of one source share a registry entry and separate sources never do.
#[derive(Debug, Clone)]
pub struct InProcessLibrarySource {
    id: usize,
    library: String,
    symbols: HashMap<String, usize>,
}

impl InProcessLibrarySource {
    pub fn new(library: impl Into<String>) -> Self {
        Self {
            id: NEXT_IN_PROCESS_ID.fetch_add(1, Ordering::Relaxed),
            library: library.into(),
            symbols: HashMap::new(),
        }
    }

    /// Register an exported symbol
    ///
    /// `address` must be a function or static that lives for the whole
    /// process, such as a `#[no_mangle] extern "C" fn` item.
    pub fn with_symbol(mut self, name: impl Into<String>, address: *const c_void) -> Self {
        self.symbols.insert(name.into(), address as usize);
        self
    }

    fn path_for(&self, library: &str) -> PathBuf {
        let location = format!("<in-process:{}>", self.id);
        Path::new(&location).join(libloading::library_filename(library))
    }
}

impl LibrarySource for InProcessLibrarySource {
    fn locate(&self, library: &str) -> BridgeResult<PathBuf> {
        if library == self.library {
            Ok(self.path_for(library))
        } else {
            Err(BridgeError::LibraryNotFound {
                library: library.to_string(),
                searched: vec![self.path_for(library)],
            })
        }
    }

    fn open(&self, path: &Path) -> BridgeResult<Box<dyn NativeLibrary>> {
        Ok(Box::new(InProcessLibrary {
            path: path.to_path_buf(),
            symbols: self.symbols.clone(),
        }))
    }
}

struct InProcessLibrary {
    path: PathBuf,
    symbols: HashMap<String, usize>,
}

impl NativeLibrary for InProcessLibrary {
    fn path(&self) -> &Path {
        &self.path
    }

    fn symbol(&self, name: &str) -> Option<*const c_void> {
        self.symbols
            .get(name)
            .map(|address| *address as *const c_void)
    }
}
