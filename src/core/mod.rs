//! core
//!
//! Core domain types and configuration.
//!
//! # Modules
//!
//! - [`types`] - Project, CloneOutcome, BatchResult
//! - [`config`] - Run configuration, retry policy, config file loading
//!
//! # Design Principles
//!
//! - Closed enums for every state, matched exhaustively
//! - Configuration is complete and validated before a run starts

pub mod config;
pub mod types;
