//! Data Transfer Objects
//!
//! Request parameters and response envelopes shared by the orchestrator API,
//! the HTTP client and the CLI.

pub mod notification;
pub mod task;
