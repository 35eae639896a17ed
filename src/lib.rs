//! DAILYBET: Office betting game on who gets drawn today
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod ports;
pub mod engine;
pub mod console;
pub mod storage;
pub mod dashboard;
