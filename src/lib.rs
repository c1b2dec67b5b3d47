//! keiba-ingest: Fixed-width horse-racing telemetry ingestion
//!
//! This library provides the core components for:
//! - Decoding fixed-width JV-Data odds and race-info records
//! - Assembling per-race, per-announcement snapshots
//! - Temporal odds features (implied-probability shifts, odds gaps)
//! - Deduplicated, bounded-concurrency uploads to object storage
//! - Adaptive polling around post times
//! - Record sources, configuration and observability

pub mod cli;
pub mod collector;
pub mod config;
pub mod features;
pub mod pipeline;
pub mod record;
pub mod scheduler;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod telemetry;
