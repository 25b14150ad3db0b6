//! Display helpers shared by front ends.

pub mod format;

pub use format::{format_age_verbose, format_thousands, truncate_string};
