use crate::protocol::TabId;
use thiserror::Error;

/// Errors from the job source.
#[derive(Debug, Error)]
pub enum JobSourceError {
    /// Transport level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The service replied with a non-success status.
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
    /// The reply body was neither a job nor a done marker.
    #[error("malformed job reply: {0}")]
    Malformed(String),
}

/// Errors from the capture ingestion client.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Transport level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The service rejected the capture.
    #[error("capture rejected with status {0}")]
    Status(reqwest::StatusCode),
}

/// Errors from the tab driver.
#[derive(Debug, Error)]
pub enum TabError {
    /// No tab could be found or opened.
    #[error("no active tab")]
    NoActiveTab,
    /// The tab no longer exists.
    #[error("tab {0} not found")]
    NotFound(TabId),
    /// Browser level failure.
    #[error("browser error: {0}")]
    Browser(String),
}

/// Errors from the orchestrator handle.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The orchestrator task has shut down.
    #[error("orchestrator is not running")]
    Closed,
    /// The session could not bind a tab.
    #[error(transparent)]
    Tab(#[from] TabError),
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Job source error.
    #[error(transparent)]
    JobSource(#[from] JobSourceError),
    /// Ingestion error.
    #[error(transparent)]
    Ingest(#[from] IngestError),
    /// Tab driver error.
    #[error(transparent)]
    Tab(#[from] TabError),
    /// Orchestrator error.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    /// HTTP client setup error.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result type with the crate error.
pub type Result<T> = std::result::Result<T, Error>;
