//! Native string-length library
//!
//! Built as `cdylib` under the library name `string_length`, so the dynamic
//! loader sees `libstring_length.so`, `libstring_length.dylib` or
//! `string_length.dll`. The `rlib` output lets Rust code link the same
//! exports statically.
//!
//! # Exported symbols
//!
//! - `calculate_string_length_from_rust(*const c_char) -> i64`
//! - `calculate_string_length_from_rust_signature() -> *const c_char`
//!
//! # Length unit
//!
//! The argument is a NUL-terminated UTF-8 buffer. The returned length is the
//! number of Unicode scalar values, so `"héllo"` measures 5 and `"😀"`
//! measures 1. Negative return values are status codes, never lengths.

use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic;

/// Status returned when the argument pointer is null
pub const STATUS_NULL_ARGUMENT: i64 = -1;

/// Status returned when the buffer is not valid UTF-8
pub const STATUS_INVALID_UTF8: i64 = -2;

/// Status returned when the measurement panicked
pub const STATUS_PANICKED: i64 = -3;

/// Signature descriptor of [`calculate_string_length_from_rust`]
///
/// Must match the bridge's rendering of `(c_char_ptr)->c_int64`.
pub const SIGNATURE_DESCRIPTOR: &str = "(c_char_ptr)->c_int64";

static SIGNATURE_DESCRIPTOR_NUL: &[u8] = b"(c_char_ptr)->c_int64\0";

/// Count the Unicode scalar values of a UTF-8 byte buffer
///
/// Returns [`STATUS_INVALID_UTF8`] if `bytes` is not UTF-8.
pub fn measure(bytes: &[u8]) -> i64 {
    match std::str::from_utf8(bytes) {
        Ok(text) => i64::try_from(text.chars().count()).unwrap_or(i64::MAX),
        Err(_) => STATUS_INVALID_UTF8,
    }
}

/// Length of a NUL-terminated UTF-8 string, in Unicode scalar values
///
/// # Safety
///
/// `text` must be null or point to a NUL-terminated buffer that stays valid
/// and unmodified for the duration of the call. The buffer is only read, and
/// no reference to it survives the return.
#[no_mangle]
pub unsafe extern "C" fn calculate_string_length_from_rust(text: *const c_char) -> i64 {
    if text.is_null() {
        return STATUS_NULL_ARGUMENT;
    }

    let bytes = CStr::from_ptr(text).to_bytes();

    // Never unwind into the caller's frames.
    panic::catch_unwind(|| measure(bytes)).unwrap_or(STATUS_PANICKED)
}

/// Signature descriptor checked by the bridge at bind time
///
/// The returned pointer refers to static storage and must not be freed.
#[no_mangle]
pub extern "C" fn calculate_string_length_from_rust_signature() -> *const c_char {
    SIGNATURE_DESCRIPTOR_NUL.as_ptr().cast::<c_char>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::ffi::CString;

    fn call(text: &str) -> i64 {
        let c_text = CString::new(text).unwrap();
        unsafe { calculate_string_length_from_rust(c_text.as_ptr()) }
    }

    #[rstest]
    #[case("", 0)]
    #[case("hello", 5)]
    #[case("héllo", 5)]
    #[case("日本語", 3)]
    #[case("😀", 1)]
    #[case("e\u{301}", 2)]
    fn test_counts_scalar_values(#[case] text: &str, #[case] expected: i64) {
        assert_eq!(call(text), expected);
    }

    #[test]
    fn test_null_argument() {
        let result = unsafe { calculate_string_length_from_rust(std::ptr::null()) };
        assert_eq!(result, STATUS_NULL_ARGUMENT);
    }

    #[test]
    fn test_invalid_utf8() {
        let bytes: &[u8] = &[0x66, 0xff, 0x6f, 0x00];
        let result = unsafe { calculate_string_length_from_rust(bytes.as_ptr().cast()) };
        assert_eq!(result, STATUS_INVALID_UTF8);
    }

    #[test]
    fn test_signature_descriptor_is_nul_terminated() {
        let descriptor =
            unsafe { CStr::from_ptr(calculate_string_length_from_rust_signature()) };
        assert_eq!(descriptor.to_str().unwrap(), SIGNATURE_DESCRIPTOR);
    }

    #[test]
    fn test_status_codes_are_negative_and_distinct() {
        let codes = [STATUS_NULL_ARGUMENT, STATUS_INVALID_UTF8, STATUS_PANICKED];
        assert!(codes.iter().all(|code| *code < 0));
        assert_eq!(codes.len(), 3);
        assert_ne!(codes[0], codes[1]);
        assert_ne!(codes[1], codes[2]);
        assert_ne!(codes[0], codes[2]);
    }
}
