//! Upload validation for drafter-da

pub mod format;

pub use format::FormatValidator;
