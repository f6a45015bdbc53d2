#![no_main]

//! Fuzz target for measure_pages()
//!
//! Uploaded PDFs are untrusted. Malformed page trees, boxes and rotations
//! must produce an error or fallback metrics, never a panic.
//!
//! Run with: cargo +nightly fuzz run fuzz_measure_pages

use libfuzzer_sys::fuzz_target;
use sigdesk_core::render::measure_pages;

fuzz_target!(|data: &[u8]| {
    let _ = measure_pages(data);
});
