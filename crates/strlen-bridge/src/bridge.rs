//! Bridge facade
//!
//! `Bridge::calculate_string_length` runs the whole chain: ensure the library
//! is loaded, resolve the binding, marshal the text, call, unmarshal. Loading
//! and resolution happen on the first successful call only; after that a call
//! is two lock-free `OnceLock` reads, one buffer copy and the native call.
//!
//! The process-wide instance behind [`calculate_string_length`] is created on
//! first use by [`Bridge::global`] with the default configuration.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::ffi::binding::{NativeSymbolBinding, SymbolReference};
use crate::ffi::loader::{LibrarySource, LoadState, NativeLibraryLoader, SystemLibrarySource};
use crate::ffi::marshal::Marshaller;
use crate::ffi::types::CallStatus;
use std::fmt;
use std::sync::{Mutex, OnceLock, PoisonError};
use tracing::{info, trace, warn};

static GLOBAL: OnceLock<Bridge> = OnceLock::new();

/// Length of `text` in Unicode scalar values, measured by the native library
///
/// Uses the process-wide [`Bridge::global`].
pub fn calculate_string_length(text: &str) -> BridgeResult<i64> {
    Bridge::global().calculate_string_length(text)
}

/// Loader, binding and marshaller for one native library
pub struct Bridge {
    loader: NativeLibraryLoader,
    binding: NativeSymbolBinding,
    marshaller: Marshaller,
    symbol: OnceLock<SymbolReference>,
    bind_lock: Mutex<()>,
}

impl Bridge {
    /// Bridge that finds the library on disk
    pub fn new(config: BridgeConfig) -> Self {
        let source = SystemLibrarySource::from_config(&config);
        Self::with_source(config, source)
    }

    /// Bridge over any library source
    pub fn with_source(config: BridgeConfig, source: impl LibrarySource + 'static) -> Self {
        Self {
            loader: NativeLibraryLoader::new(config.library, source),
            binding: NativeSymbolBinding::string_length(config.symbol),
            marshaller: Marshaller::new(),
            symbol: OnceLock::new(),
            bind_lock: Mutex::new(()),
        }
    }

    /// The process-wide bridge, built with `BridgeConfig::default()`
    pub fn global() -> &'static Bridge {
        GLOBAL.get_or_init(|| Bridge::new(BridgeConfig::default()))
    }

    /// Length of `text` in Unicode scalar values
    ///
    /// Safe to call from many threads at once; only the first successful
    /// call loads and resolves.
    pub fn calculate_string_length(&self, text: &str) -> BridgeResult<i64> {
        let symbol = self.resolved()?;
        let argument = self.marshaller.to_native(text)?;

        let raw = symbol.invoke(&argument);
        drop(argument);

        if let Some(status) = CallStatus::from_raw(raw) {
            warn!(symbol = symbol.name(), %status, "native call failed");
            return Err(BridgeError::Invocation {
                symbol: symbol.name().to_string(),
                status,
            });
        }

        let length = self.marshaller.from_native(raw);
        trace!(symbol = symbol.name(), bytes = text.len(), length, "native call");
        Ok(length)
    }

    fn resolved(&self) -> BridgeResult<&SymbolReference> {
        if let Some(symbol) = self.symbol.get() {
            return Ok(symbol);
        }

        let handle = self.loader.ensure_loaded()?;

        let _guard = self.bind_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(symbol) = self.symbol.get() {
            return Ok(symbol);
        }

        match self.binding.bind(&handle) {
            Ok(symbol) => {
                info!(
                    symbol = symbol.name(),
                    signature = %symbol.signature(),
                    "native symbol bound"
                );
                Ok(self.symbol.get_or_init(|| symbol))
            }
            Err(err) => {
                warn!(symbol = self.binding.name(), error = %err, "symbol resolution failed");
                Err(err)
            }
        }
    }

    pub fn load_state(&self) -> LoadState {
        self.loader.state()
    }

    /// Whether the symbol has been resolved and cached
    pub fn is_bound(&self) -> bool {
        self.symbol.get().is_some()
    }

    pub fn loader(&self) -> &NativeLibraryLoader {
        &self.loader
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("loader", &self.loader)
            .field("binding", &self.binding)
            .field("bound", &self.is_bound())
            .finish()
    }
}
