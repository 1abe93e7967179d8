#![doc = include_str!("../README.md")]

// Supporting modules
pub mod files;
pub mod reporting;
pub mod source;

// Intermediate languages
pub mod edl;
pub mod plan;

// Passes
pub mod pass;

// Top level driver
mod driver;

// Public exports
pub use driver::{Driver, Status};
