//! API module
//!
//! Contains HTTP request handlers for the orchestrator endpoints

pub mod orchestrator;
