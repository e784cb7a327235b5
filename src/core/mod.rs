//! Core types: errors, configuration, path conventions.

pub mod config;
pub mod errors;
pub mod paths;
