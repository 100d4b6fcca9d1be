//! Service Module
//!
//! Business logic layer for the orchestrator.
//! The task orchestrator runs engines against resolved dependencies and
//! owns every read and write of the result store.

pub mod orchestrator;
pub mod resolver;
pub mod schema;

pub use orchestrator::{PipelineSettings, TaskError, TaskOrchestrator};
