//! Rewrite passes. Each takes a sealed generation and the run's settings and
//! returns the next generation.
pub mod expand_strings;

pub use expand_strings::{expand_strings, should_be_enum};
