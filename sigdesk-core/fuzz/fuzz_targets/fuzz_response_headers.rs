#![no_main]

//! Fuzz target for signing-service response parsing
//!
//! Exercises Content-Disposition filename extraction and error-body message
//! extraction with arbitrary service output.
//!
//! Run with: cargo +nightly fuzz run fuzz_response_headers

use libfuzzer_sys::fuzz_target;
use sigdesk_core::client::{extract_error_message, filename_from_disposition, sanitize_filename};

fuzz_target!(|data: &[u8]| {
    let _ = extract_error_message(data, "Failed to sign document.");

    if let Ok(header) = std::str::from_utf8(data) {
        if let Some(name) = filename_from_disposition(header) {
            let cleaned = sanitize_filename(&name);
            assert!(!cleaned.is_empty());
            assert!(!cleaned.contains('/') && !cleaned.contains('\\'));
        }
    }
});
