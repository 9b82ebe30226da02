//! FFI type system - C types and signatures at the native boundary
//!
//! Defines:
//! - `ExternType`: the C types a native signature is declared with
//! - `Signature`: parameter and return types of one exported function
//! - `CallStatus`: negative status values reported by the native function
//!
//! Signatures render as descriptors such as `(c_char_ptr)->c_int64`. The
//! native library may export the same text next to a function so the
//! binding can compare them before the first call.

use std::fmt;
use std::os::raw::c_char;

/// Callable shape of the string-length export
pub type StringLengthFn = unsafe extern "C" fn(*const c_char) -> i64;

/// Callable shape of a signature descriptor export
pub type SignatureDescriptorFn = unsafe extern "C" fn() -> *const c_char;

/// Suffix appended to an exported name to find its signature descriptor
pub const SIGNATURE_SUFFIX: &str = "_signature";

/// C-compatible extern types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternType {
    /// C int (i32)
    CInt,
    /// int64_t
    CInt64,
    /// C char* (NUL-terminated UTF-8)
    CCharPtr,
    /// C void (no value)
    CVoid,
}

impl ExternType {
    /// Get a display name for this extern type
    pub fn display_name(&self) -> &'static str {
        match self {
            ExternType::CInt => "c_int",
            ExternType::CInt64 => "c_int64",
            ExternType::CCharPtr => "c_char_ptr",
            ExternType::CVoid => "c_void",
        }
    }

    /// Inverse of [`ExternType::display_name`]
    pub fn from_display_name(name: &str) -> Option<Self> {
        match name {
            "c_int" => Some(ExternType::CInt),
            "c_int64" => Some(ExternType::CInt64),
            "c_char_ptr" => Some(ExternType::CCharPtr),
            "c_void" => Some(ExternType::CVoid),
            _ => None,
        }
    }
}

/// Declared signature of an exported function
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    params: Vec<ExternType>,
    return_type: ExternType,
}

impl Signature {
    pub fn new(params: Vec<ExternType>, return_type: ExternType) -> Self {
        Self {
            params,
            return_type,
        }
    }

    /// `(c_char_ptr)->c_int64`, the only shape the bridge can call
    pub fn string_length() -> Self {
        Self::new(vec![ExternType::CCharPtr], ExternType::CInt64)
    }

    /// Parse a descriptor such as `(c_char_ptr)->c_int64`
    pub fn parse(descriptor: &str) -> Option<Self> {
        let rest = descriptor.trim().strip_prefix('(')?;
        let (params, ret) = rest.split_once(")->")?;
        let params = if params.trim().is_empty() {
            Vec::new()
        } else {
            params
                .split(',')
                .map(|p| ExternType::from_display_name(p.trim()))
                .collect::<Option<Vec<_>>>()?
        };
        let return_type = ExternType::from_display_name(ret.trim())?;
        Some(Self::new(params, return_type))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<&str> = self.params.iter().map(ExternType::display_name).collect();
        write!(f, "({})->{}", params.join(","), self.return_type.display_name())
    }
}

/// Abnormal outcome reported by the native function through a negative return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    /// -1: the argument pointer was null
    NullArgument,
    /// -2: the buffer was not valid UTF-8
    InvalidEncoding,
    /// -3: the native side panicked and caught it at the boundary
    Panicked,
    /// Any other negative value
    Unknown(i64),
}

impl CallStatus {
    /// Classify a raw return value; `None` for non-negative lengths
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            r if r >= 0 => None,
            -1 => Some(CallStatus::NullArgument),
            -2 => Some(CallStatus::InvalidEncoding),
            -3 => Some(CallStatus::Panicked),
            other => Some(CallStatus::Unknown(other)),
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallStatus::NullArgument => write!(f, "null argument (status -1)"),
            CallStatus::InvalidEncoding => write!(f, "argument is not valid UTF-8 (status -2)"),
            CallStatus::Panicked => write!(f, "native function panicked (status -3)"),
            CallStatus::Unknown(code) => write!(f, "unknown status {}", code),
        }
    }
}
