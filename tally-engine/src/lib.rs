//! Tally Engine
//!
//! Computation stages of the analytics pipeline. Engines are stateless: each
//! call builds its output from the inputs it is given and never touches
//! persistence. The orchestrator owns loading inputs and storing results.
//!
//! Statistical internals sit behind traits so they can be swapped:
//! - [`segmentation::ClusteringStrategy`] groups customers
//! - [`cashflow::CashFlowStrategy`] produces time-bucketed rollups
//! - [`pricing::DemandModel`] predicts demand at a candidate price
//! - [`dispatch::MessageTransport`] delivers rendered messages

pub mod cashflow;
pub mod dispatch;
pub mod error;
pub mod notification;
pub mod pricing;
pub mod segmentation;
pub mod threshold;

pub use error::{EngineError, Result};
