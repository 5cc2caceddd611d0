//! # sqlshare - SQLite sessions you can load from anywhere and share
//!
//! sqlshare provides:
//! - Source classification for files, URLs, binary images, SQL scripts and stored ids
//! - Sessions owning a live SQLite handle plus its remote identity
//! - A portable SQL dumper (schema + data) independent of the storage backend
//! - Change fingerprints that skip redundant network writes
//! - Gist-like storage providers behind a router that picks create vs update

pub mod source;
pub mod fingerprint;
pub mod storage;
pub mod dump;
pub mod fetch;
pub mod provider;
pub mod session;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use source::{SourceDescriptor, SourceKind, SourceValue};
pub use storage::{Database, ResultSet};
pub use provider::{Gist, ProviderRouter, StorageProvider};
pub use session::{SaveOutcome, Session, SessionManager};

/// Result type alias for sqlshare operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for sqlshare operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{provider} responded with {status}: {message}")]
    Provider {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Failed to load {label}: {reason}")]
    LoadFailed { label: String, reason: String },

    #[error("Config error: {0}")]
    Config(String),
}
