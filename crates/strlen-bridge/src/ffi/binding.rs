//! Typed symbol binding
//!
//! Exported functions are looked up by name exactly once and turned into a
//! `SymbolReference` carrying a typed function pointer. The declared
//! signature is checked at bind time:
//!
//! 1. it must be the shape the bridge knows how to call, and
//! 2. if the library exports `<name>_signature`, its descriptor must agree.
//!
//! Libraries without a descriptor are trusted on the first check alone.

use crate::error::{BridgeError, BridgeResult};
use crate::ffi::loader::LibraryHandle;
use crate::ffi::marshal::MarshalledArgument;
use crate::ffi::types::{Signature, SignatureDescriptorFn, StringLengthFn, SIGNATURE_SUFFIX};
use std::ffi::{c_void, CStr};
use std::fmt;
use tracing::debug;

/// Declaration of an exported function: its name and expected signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeSymbolBinding {
    name: String,
    signature: Signature,
}

impl NativeSymbolBinding {
    pub fn new(name: impl Into<String>, signature: Signature) -> Self {
        Self {
            name: name.into(),
            signature,
        }
    }

    /// `name` with the `(c_char_ptr)->c_int64` signature
    pub fn string_length(name: impl Into<String>) -> Self {
        Self::new(name, Signature::string_length())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Bind this declaration against a loaded library
    pub fn bind(&self, handle: &LibraryHandle) -> BridgeResult<SymbolReference> {
        Self::resolve(handle, &self.name, &self.signature)
    }

    /// Look up `name` in `handle` and check it against `signature`
    pub fn resolve(
        handle: &LibraryHandle,
        name: &str,
        signature: &Signature,
    ) -> BridgeResult<SymbolReference> {
        let address = handle
            .symbol(name)
            .ok_or_else(|| BridgeError::SymbolNotFound {
                symbol: name.to_string(),
                path: handle.path().to_path_buf(),
            })?;

        let callable = Signature::string_length();
        if *signature != callable {
            return Err(BridgeError::SignatureMismatch {
                symbol: name.to_string(),
                declared: signature.to_string(),
                actual: format!("{} (the only callable shape)", callable),
            });
        }

        if let Some(exported) = Self::exported_descriptor(handle, name) {
            if Signature::parse(&exported).as_ref() != Some(signature) {
                return Err(BridgeError::SignatureMismatch {
                    symbol: name.to_string(),
                    declared: signature.to_string(),
                    actual: exported,
                });
            }
            debug!(symbol = name, signature = %signature, "signature descriptor verified");
        } else {
            debug!(symbol = name, "no signature descriptor exported");
        }

        // Safety: the address is non-null and the signature check above
        // established the `(c_char_ptr)->c_int64` shape.
        let function =
            unsafe { std::mem::transmute::<*const c_void, StringLengthFn>(address) };

        Ok(SymbolReference {
            handle: handle.clone(),
            name: name.to_string(),
            signature: signature.clone(),
            function,
        })
    }

    fn exported_descriptor(handle: &LibraryHandle, name: &str) -> Option<String> {
        let address = handle.symbol(&format!("{}{}", name, SIGNATURE_SUFFIX))?;

        // Safety: descriptor exports are `extern "C" fn() -> *const c_char`
        // returning static NUL-terminated text.
        let describe =
            unsafe { std::mem::transmute::<*const c_void, SignatureDescriptorFn>(address) };
        let raw = unsafe { describe() };
        if raw.is_null() {
            return Some("<null descriptor>".to_string());
        }
        Some(unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned())
    }
}

/// Exported function resolved to a typed callable
///
/// Holds a clone of its `LibraryHandle`, so the library stays resident for
/// as long as the reference exists.
#[derive(Clone)]
pub struct SymbolReference {
    handle: LibraryHandle,
    name: String,
    signature: Signature,
    function: StringLengthFn,
}

impl SymbolReference {
    /// Call the native function with a marshalled argument
    ///
    /// Returns the raw `i64`, status codes included. The argument is
    /// borrowed for the duration of the call only.
    pub fn invoke(&self, argument: &MarshalledArgument) -> i64 {
        // Safety: the pointer is NUL-terminated and outlives this synchronous
        // call; the function type was checked in `resolve`.
        unsafe { (self.function)(argument.as_ptr()) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn handle(&self) -> &LibraryHandle {
        &self.handle
    }
}

impl fmt::Debug for SymbolReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolReference")
            .field("name", &self.name)
            .field("signature", &self.signature.to_string())
            .field("library", &self.handle.path())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::loader::{InProcessLibrarySource, NativeLibraryLoader};
    use crate::ffi::marshal::Marshaller;
    use crate::ffi::types::ExternType;
    use std::os::raw::c_char;

    unsafe extern "C" fn byte_len(text: *const c_char) -> i64 {
        CStr::from_ptr(text).to_bytes().len() as i64
    }

    extern "C" fn good_descriptor() -> *const c_char {
        b"(c_char_ptr)->c_int64\0".as_ptr().cast()
    }

    extern "C" fn bad_descriptor() -> *const c_char {
        b"(c_char_ptr)->c_int\0".as_ptr().cast()
    }

    fn handle_with(source: InProcessLibrarySource) -> LibraryHandle {
        NativeLibraryLoader::new("demo", source)
            .ensure_loaded()
            .unwrap()
    }

    #[test]
    fn test_resolve_and_invoke() {
        let handle = handle_with(
            InProcessLibrarySource::new("demo").with_symbol("len", byte_len as *const c_void),
        );
        let symbol = NativeSymbolBinding::string_length("len").bind(&handle).unwrap();
        let arg = Marshaller::new().to_native("héllo").unwrap();
        assert_eq!(symbol.invoke(&arg), 6);
        assert_eq!(symbol.name(), "len");
        assert!(symbol.handle().ptr_eq(&handle));
    }

    #[test]
    fn test_symbol_not_found() {
        let handle = handle_with(InProcessLibrarySource::new("demo"));
        let err = NativeSymbolBinding::string_length("len").bind(&handle).unwrap_err();
        assert!(matches!(err, BridgeError::SymbolNotFound { ref symbol, .. } if symbol == "len"));
    }

    #[test]
    fn test_unsupported_declared_signature() {
        let handle = handle_with(
            InProcessLibrarySource::new("demo").with_symbol("len", byte_len as *const c_void),
        );
        let declared = Signature::new(vec![ExternType::CCharPtr], ExternType::CInt);
        let err = NativeSymbolBinding::resolve(&handle, "len", &declared).unwrap_err();
        match err {
            BridgeError::SignatureMismatch { declared, .. } => {
                assert_eq!(declared, "(c_char_ptr)->c_int");
            }
            other => panic!("expected SignatureMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_matching_descriptor_accepted() {
        let handle = handle_with(
            InProcessLibrarySource::new("demo")
                .with_symbol("len", byte_len as *const c_void)
                .with_symbol("len_signature", good_descriptor as *const c_void),
        );
        assert!(NativeSymbolBinding::string_length("len").bind(&handle).is_ok());
    }

    #[test]
    fn test_conflicting_descriptor_rejected() {
        let handle = handle_with(
            InProcessLibrarySource::new("demo")
                .with_symbol("len", byte_len as *const c_void)
                .with_symbol("len_signature", bad_descriptor as *const c_void),
        );
        let err = NativeSymbolBinding::string_length("len").bind(&handle).unwrap_err();
        assert_eq!(
            err,
            BridgeError::SignatureMismatch {
                symbol: "len".to_string(),
                declared: "(c_char_ptr)->c_int64".to_string(),
                actual: "(c_char_ptr)->c_int".to_string(),
            }
        );
    }
}
