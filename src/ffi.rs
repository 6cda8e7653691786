//! FFI bindings for activity insights
//!
//! This module provides C-compatible functions for calling the pipeline from
//! the host application. Requests and responses are JSON in the tagged
//! `Request`/`Response` format. All functions use C strings (null-terminated)
//! and return allocated memory that must be freed by the caller using
//! `insights_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::PipelineConfig;
use crate::error::ComputeError;
use crate::pipeline::{process_json, InsightsProcessor, Request};
use crate::request::RequestTicket;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Process a JSON request with the default configuration and return the JSON
/// response.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `insights_free_string`.
/// - Returns NULL on error; call `insights_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn insights_process(json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match process_json(&json_str) {
        Ok(response) => string_to_cstr(&response),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to an InsightsProcessor
pub struct InsightsProcessorHandle {
    processor: InsightsProcessor,
}

/// Create a new InsightsProcessor from a JSON configuration.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string, or NULL for the
///   default configuration.
/// - Returns a pointer to a newly allocated InsightsProcessor.
/// - Must be freed with `insights_processor_free`.
/// - Returns NULL on error; call `insights_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn insights_processor_new(
    config_json: *const c_char,
) -> *mut InsightsProcessorHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        PipelineConfig::default()
    } else {
        let json_str = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match PipelineConfig::from_json(&json_str) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match InsightsProcessor::with_config(config) {
        Ok(processor) => Box::into_raw(Box::new(InsightsProcessorHandle { processor })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an InsightsProcessor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `insights_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn insights_processor_free(processor: *mut InsightsProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Start a new request, superseding every request started before it.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `insights_processor_new`.
/// - Returns the request ticket, or 0 for a NULL processor.
#[no_mangle]
pub unsafe extern "C" fn insights_processor_begin(processor: *const InsightsProcessorHandle) -> u64 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return 0;
    }

    (*processor).processor.begin().id()
}

/// Process a JSON request for the given ticket.
///
/// Returns the JSON response, or the JSON literal `null` when a newer request
/// has been started since `ticket` was issued.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `insights_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `insights_free_string`.
/// - Returns NULL on error; call `insights_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn insights_processor_complete(
    processor: *const InsightsProcessorHandle,
    ticket: u64,
    json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let request: Request = match serde_json::from_str(&json_str) {
        Ok(request) => request,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let outcome = handle
        .processor
        .complete(RequestTicket::from_id(ticket), &request)
        .and_then(|response| serde_json::to_string(&response).map_err(ComputeError::from));

    match outcome {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by insights functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an insights function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn insights_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next insights function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn insights_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn insights_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn comparison_request() -> CString {
        CString::new(
            r#"{
                "kind": "comparison",
                "current": {"categories": [
                    {"name": "Work", "duration": 3600},
                    {"name": "Chat", "duration": 600}
                ]},
                "combined": {"categories": [
                    {"name": "Work", "duration": 5400},
                    {"name": "Chat", "duration": 1800}
                ]}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_ffi_process() {
        let json = comparison_request();

        unsafe {
            let result = insights_process(json.as_ptr());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            let value: serde_json::Value = serde_json::from_str(result_str).unwrap();
            assert_eq!(value["kind"], "comparison");
            assert_eq!(value["rows"][0]["name"], "Work");

            insights_free_string(result);
        }
    }

    #[test]
    fn test_ffi_processor_lifecycle() {
        unsafe {
            let config = CString::new(r#"{"category_count": 1}"#).unwrap();
            let processor = insights_processor_new(config.as_ptr());
            assert!(!processor.is_null());

            let json = comparison_request();
            let stale = insights_processor_begin(processor);
            let latest = insights_processor_begin(processor);
            assert!(latest > stale);

            let dropped = insights_processor_complete(processor, stale, json.as_ptr());
            assert!(!dropped.is_null());
            assert_eq!(CStr::from_ptr(dropped).to_str().unwrap(), "null");
            insights_free_string(dropped);

            let result = insights_processor_complete(processor, latest, json.as_ptr());
            assert!(!result.is_null());
            let value: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(result).to_str().unwrap()).unwrap();
            // category_count 1 puts Chat into Other
            assert_eq!(value["rows"][1]["name"], "Other");
            insights_free_string(result);

            insights_processor_free(processor);
        }
    }

    #[test]
    fn test_ffi_processor_invalid_config() {
        unsafe {
            let config = CString::new(r#"{"category_count": 0}"#).unwrap();
            let processor = insights_processor_new(config.as_ptr());
            assert!(processor.is_null());
            assert!(!insights_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid_json = CString::new("not json").unwrap();
            let result = insights_process(invalid_json.as_ptr());

            assert!(result.is_null());

            let error = insights_last_error();
            assert!(!error.is_null());

            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.starts_with("Invalid JSON"));
        }
    }

    #[test]
    fn test_ffi_null_pointer() {
        unsafe {
            assert!(insights_process(ptr::null()).is_null());
            assert_eq!(insights_processor_begin(ptr::null()), 0);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = insights_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, env!("CARGO_PKG_VERSION"));
        }
    }
}
