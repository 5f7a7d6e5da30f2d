//! Pipeline stages for DDR generation.
//!
//! Each submodule implements one transformation step and is independently
//! testable; [`crate::report`] sequences them and persists the artifacts.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──┬──────────────▶ analyze ──▶ synthesize
//! (%PDF)   (pdfium)   └─▶ encode ─▶ ocr ─┘   (×2)       (×1)
//!                        (PNG)   (per page)
//! ```
//!
//! 1. [`input`]      : reject missing, unreadable, and non-PDF paths early
//! 2. [`extract`]    : page text or page images via pdfium in `spawn_blocking`
//! 3. [`encode`]     : PNG-encode rendered pages
//! 4. [`ocr`]        : transcribe page images when the text layer is unusable
//! 5. [`analyze`]    : one completion call per domain
//! 6. [`synthesize`] : one completion call combining both summaries

pub mod analyze;
pub mod encode;
pub mod extract;
pub mod input;
pub mod ocr;
pub mod synthesize;
