//! Bridge error taxonomy
//!
//! Every failure on the call path surfaces to the caller as a `BridgeError`.
//! Nothing here is retried automatically; a failed load or resolve is simply
//! not cached, so the next call starts over.

use crate::ffi::marshal::MarshalError;
use crate::ffi::types::CallStatus;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, binding or calling the native library
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// No candidate file exists in any search location
    #[error("native library '{library}' not found ({} locations searched)", .searched.len())]
    LibraryNotFound {
        library: String,
        searched: Vec<PathBuf>,
    },

    /// The file exists but the dynamic loader rejected it
    #[error("failed to load native library {}: {reason}", .path.display())]
    LibraryLoad { path: PathBuf, reason: String },

    /// The library does not export the requested name
    #[error("symbol '{symbol}' not found in {}", .path.display())]
    SymbolNotFound { symbol: String, path: PathBuf },

    /// The declared signature cannot be reconciled with the export
    #[error("signature mismatch for '{symbol}': declared {declared}, found {actual}")]
    SignatureMismatch {
        symbol: String,
        declared: String,
        actual: String,
    },

    /// The argument could not be marshalled; no native call was made
    #[error(transparent)]
    Marshal(#[from] MarshalError),

    /// The native call reported abnormal termination
    #[error("native call to '{symbol}' failed: {status}")]
    Invocation { symbol: String, status: CallStatus },
}

/// Result alias used throughout the crate
pub type BridgeResult<T> = Result<T, BridgeError>;
