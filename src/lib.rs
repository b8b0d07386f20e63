//! godeye - OSINT aggregation orchestrator
//!
//! This crate fans a single lookup (username, email, domain, IP, whois) out
//! to a registry of intelligence providers, normalizes whatever comes back,
//! and aggregates it into one deterministic result with a risk score. EXIF
//! extraction runs locally against uploaded image bytes.
//!
//! ## Call chain
//! Validate -> Dispatch (concurrent, deadline-bounded) -> Normalize ->
//! Aggregate + Score -> History append -> Wire response
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use godeye::config::Config;
//! use godeye::service::OsintService;
//!
//! # async fn run() -> godeye::error::Result<()> {
//! let service = OsintService::from_config(&Config::default())?;
//! let response = service.lookup_username("octocat").await?;
//! println!("found on {} platforms", response.found_on.len());
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Domain types shared across the pipeline
pub mod model;

// Environment-driven configuration
pub mod config;

// Provider trait, registry and the concrete adapters
pub mod providers;

// Concurrent fan-out with deadlines and retries
pub mod dispatch;

// Raw payload -> NormalizedRecord translation
pub mod normalize;

// Deterministic merge and statistics
pub mod aggregate;

// Risk scoring formulas
pub mod risk;

// Append-only search history
pub mod history;

// Report generation and retrieval
pub mod report;

// Local EXIF metadata extraction
pub mod exif;

// The orchestration facade the server binary sits on
pub mod service;

pub use error::{OsintError, Result};
pub use model::{AggregatedResult, Query, QueryKind, RiskLevel, Statistics};
pub use service::OsintService;
