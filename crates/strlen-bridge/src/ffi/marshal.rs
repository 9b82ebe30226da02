//! Argument marshaling - Rust text ↔ native buffers
//!
//! - `Marshaller::to_native()`: copy caller text into a NUL-terminated UTF-8 buffer
//! - `Marshaller::from_native()`: hand the native `i64` back unchanged
//!
//! # Memory Safety
//!
//! - The native side receives a copy, never the caller's `&str`
//! - The copy is owned by `MarshalledArgument` and freed on `Drop`
//! - Pointers handed out borrow the argument, so it cannot be dropped mid-call

use std::ffi::CString;
use std::os::raw::c_char;
use thiserror::Error;

/// Marshal error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarshalError {
    /// The text cannot be expressed as a NUL-terminated buffer
    #[error("text contains an interior NUL byte at offset {position}")]
    InteriorNul { position: usize },
}

/// Encoding of every buffer the marshaller produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8 bytes followed by a single NUL terminator
    Utf8NulTerminated,
}

/// Native copy of the caller's text for a single call
///
/// Lives on the calling thread for the duration of one invocation. The
/// explicit byte length excludes the terminator.
#[derive(Debug)]
pub struct MarshalledArgument {
    buffer: CString,
}

impl MarshalledArgument {
    /// Pointer to the NUL-terminated buffer, valid while `self` is alive
    pub fn as_ptr(&self) -> *const c_char {
        self.buffer.as_ptr()
    }

    /// Byte length without the terminator
    pub fn len(&self) -> usize {
        self.buffer.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffer contents including the terminator
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        self.buffer.as_bytes_with_nul()
    }

    pub fn encoding(&self) -> TextEncoding {
        TextEncoding::Utf8NulTerminated
    }
}

/// Converts values across the native boundary
#[derive(Debug, Clone, Copy, Default)]
pub struct Marshaller;

impl Marshaller {
    pub fn new() -> Self {
        Self
    }

    /// Copy `text` into an owned NUL-terminated UTF-8 buffer
    ///
    /// Fails when `text` contains a NUL, which the terminator convention
    /// cannot represent.
    pub fn to_native(&self, text: &str) -> Result<MarshalledArgument, MarshalError> {
        let buffer = CString::new(text).map_err(|e| MarshalError::InteriorNul {
            position: e.nul_position(),
        })?;
        Ok(MarshalledArgument { buffer })
    }

    /// Identity on the native 64-bit return value
    pub fn from_native(&self, raw: i64) -> i64 {
        raw
    }
}
