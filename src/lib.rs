//! Core library for the course portal backend.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Postgres persistence.
pub mod db;
/// Upload validation and text extraction.
pub mod extraction;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion and removal counters.
pub mod metrics;
/// Domain records.
pub mod models;
/// Full-text search integration.
pub mod search;
/// Coordinators enforcing the portal's invariants.
pub mod services;
/// Blob storage backends.
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;
