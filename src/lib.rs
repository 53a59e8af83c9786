//! Payment Agent
//!
//! Turns bill photos and spoken or typed transfer requests into
//! structured payment messages:
//! - Reads bill images with a vision model
//! - Parses bill text and transfer descriptions into payment fields
//! - Stamps the result with currency, status and creation time
//! - Drives all of it from a bounded tool-calling loop
//!
//! LOOP:
//! INPUT → MODEL → (CAPABILITY CALLS → MODEL)* → ANSWER | CEILING

pub mod agent;
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod extraction;
pub mod formatter;
pub mod llm;
pub mod models;
pub mod speech;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use models::*;
