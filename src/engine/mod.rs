#![allow(dead_code)]
//! Quote Lifecycle & Reconciliation Engine
//!
//! Tick math, the flip order model, durable engine state, reconciliation
//! against authoritative chain lookups, the transaction budget, and the
//! orchestrator that sequences them.

pub mod budget;
pub mod flip;
pub mod orchestrator;
pub mod reconcile;
pub mod state;
pub mod ticks;

pub use orchestrator::{EngineStatus, QuoteEngine};
pub use state::{EngineState, StateStore};
