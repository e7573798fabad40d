#![deny(rust_2024_compatibility)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_lossless,            // Infallible casts are clear enough with `as`
    clippy::cast_possible_truncation, // Durations and counters stay far below the limits
    clippy::cast_possible_wrap,       // Epoch nanoseconds fit in i64 until 2262
    clippy::cast_precision_loss,      // Acceptable for metrics/display
    clippy::cast_sign_loss,           // Safe where values are known non-negative
    clippy::missing_errors_doc,       // Internal API
    clippy::missing_panics_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. BufferError in buffer module
    clippy::must_use_candidate,       // Annotated selectively on critical APIs
    clippy::doc_markdown              // Internal API
)]

pub mod app;
pub mod buffer;
pub mod domain;
pub mod protocol;
pub mod reliability;
pub mod sender;
pub mod transform;
pub mod units;

pub use app::{App, Config, Forwarder, SubmitHandle, SubmitOutcome};
pub use domain::{Binding, FormattedPoint, Record, TagSet, Timestamp};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
