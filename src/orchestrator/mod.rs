//! Fetch Orchestrator Module
//!
//! The batch pipeline that talks to the upstream catalog, reports progress and
//! persists the resulting snapshot. Invoked directly for single-series refreshes
//! and once per claimed item by the queue worker.

pub mod core;
pub mod pacing;

pub use self::core::{FetchOrchestrator, FetchOutcome};
pub use pacing::{Pacer, TokioPacer};
