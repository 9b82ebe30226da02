//! strlen-bridge - calls the native string-length library across the C ABI
//!
//! The bridge locates the `string_length` shared library, loads it once per
//! process, binds `calculate_string_length_from_rust` to a typed function
//! pointer, and calls it with a NUL-terminated UTF-8 copy of the caller's
//! text.
//!
//! ```no_run
//! let length = strlen_bridge::calculate_string_length("hello")?;
//! assert_eq!(length, 5);
//! # Ok::<(), strlen_bridge::BridgeError>(())
//! ```
//!
//! Lengths are counted in Unicode scalar values: `"héllo"` is 5 and `"😀"`
//! is 1. For ASCII text the length equals the byte length, except that text
//! containing a NUL byte cannot cross the NUL-terminated C boundary and is
//! rejected with [`BridgeError::Marshal`] before any native call.

/// Bridge crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod bridge;
pub mod config;
pub mod error;
pub mod ffi;

pub use bridge::{calculate_string_length, Bridge};
pub use config::{BridgeConfig, ConfigError, ConfigResult};
pub use error::{BridgeError, BridgeResult};
pub use ffi::LoadState;
