//! Foreign Function Interface (FFI) infrastructure
//!
//! The pieces the bridge composes, leaves first:
//! - Type marshaling (text → NUL-terminated UTF-8, `i64` back)
//! - Dynamic library loading, once per process
//! - Typed symbol binding with bind-time signature checks
//!
//! # Safety
//!
//! FFI operations involve `unsafe` code and careful memory management.
//! All unsafe code is isolated in this module with safe wrappers.

pub mod binding;
pub mod loader;
pub mod marshal;
pub mod types;

pub use binding::{NativeSymbolBinding, SymbolReference};
pub use loader::{
    InProcessLibrarySource, LibraryHandle, LibrarySource, LoadState, NativeLibrary,
    NativeLibraryLoader, SystemLibrarySource,
};
pub use marshal::{MarshalError, MarshalledArgument, Marshaller, TextEncoding};
pub use types::{CallStatus, ExternType, Signature};
