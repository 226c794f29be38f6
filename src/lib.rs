//! Plan-Execute Agent Library
//!
//! A minimal plan-execute-synthesize agent orchestrator. This library exposes
//! the orchestrator core, the generation providers, and the HTTP harness
//! pieces for testing and external use. The server binary is in `src/main.rs`.

pub mod api;
pub mod config;
pub mod error;
pub mod generation;
pub mod orchestrator;
/// Application state management
///
/// Holds the generation service, live configuration and recent run traces.
pub mod state;
