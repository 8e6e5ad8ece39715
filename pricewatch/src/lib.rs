#![warn(missing_docs)]

//! Browser-driven retail price capture.
//!
//! Pricewatch walks a browser tab through product pages handed out by a
//! collection service, reads the price off each page and posts it back.
//!
//! # How it fits together
//!
//! - A [`job_source::JobSource`] hands out the next job for a set of stores.
//! - The [`orchestrator::Orchestrator`] owns the capture session. It binds a
//!   tab, navigates it to each job page and waits for the capture.
//! - A [`agent::PageAgent`] samples the loaded page on a schedule and reports
//!   one [`protocol::CaptureMessage`] per load.
//! - Successful captures go to an [`ingest::IngestClient`].
//!
//! The browser side is behind the `chrome` feature ([`features::chrome`]).
//!
//! # Basic usage
//!
//! ```rust,no_run
//! use pricewatch::configuration::Configuration;
//! use pricewatch::ingest::HttpIngestClient;
//! use pricewatch::job_source::HttpJobSource;
//! use pricewatch::orchestrator::Orchestrator;
//! use pricewatch::utils::build_client;
//! use std::sync::Arc;
//!
//! # async fn run(tabs: Arc<dyn pricewatch::tab::TabDriver>) -> pricewatch::error::Result<()> {
//! let config = Configuration::from_env();
//! let client = build_client(&config)?;
//!
//! let handle = Orchestrator::new(
//!     config.clone(),
//!     Arc::new(HttpJobSource::new(client.clone(), &config)),
//!     Arc::new(HttpIngestClient::new(client, &config)),
//!     tabs,
//! )
//! .spawn();
//!
//! handle.start(None, None).await?;
//! handle.wait_until_idle().await;
//! # Ok(())
//! # }
//! ```

extern crate log;
pub extern crate rust_decimal;
pub extern crate tokio;
pub extern crate url;

/// The page agent.
pub mod agent;
/// Configuration for a capture run.
pub mod configuration;
/// Error types.
pub mod error;
/// Optional integrations.
pub mod features;
/// Capture ingestion.
pub mod ingest;
/// Jobs.
pub mod job;
/// Job sources.
pub mod job_source;
/// The orchestrator task and its handle.
pub mod orchestrator;
/// Capture protocol types.
pub mod protocol;
/// The capture session state machine.
pub mod session;
/// Stores and store modes.
pub mod store;
/// Tab control.
pub mod tab;
/// Application utils.
pub mod utils;

pub use configuration::Configuration;
pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, OrchestratorHandle};
