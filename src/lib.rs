//! SETTLEBOARD — Result Declaration & Statement Core
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod settlement;
pub mod gate;
pub mod declare;
pub mod statement;
pub mod storage;
