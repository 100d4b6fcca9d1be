//! Core domain types
//!
//! This module contains the structures that flow between the engines and the
//! orchestrator. Engines build them per call; the orchestrator persists them
//! as task result payloads.

pub mod cashflow;
pub mod notification;
pub mod pricing;
pub mod sales;
pub mod segment;
pub mod task;
pub mod trigger;
pub mod validation;
