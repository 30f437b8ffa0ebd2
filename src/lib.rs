//! Magic Formula stock screener.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod listing;
pub mod universe;
pub mod provider;
pub mod engine;
pub mod storage;
