//! Tally Core
//!
//! Core types and abstractions for the Tally analytics pipeline.
//!
//! This crate contains:
//! - Domain types: task results, sales records, segments, cash-flow buckets,
//!   triggers and notifications
//! - DTOs: task parameters and API envelopes shared by the orchestrator,
//!   the client and the CLI

pub mod domain;
pub mod dto;
