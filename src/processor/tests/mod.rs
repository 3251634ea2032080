//! Integration tests for the processor module
//!
//! Runs the complete pipeline against temporary logging roots built with
//! the helpers in `fixtures`.

pub mod fixtures;
