//! Remote storage providers
//!
//! Each provider talks to one gist-like backend and adapts its payloads
//! into the shared [`Gist`] shape, so sessions never branch on backend
//! identity. The [`ProviderRouter`] picks the active provider and routes
//! stored ids to the provider that issued them.

pub mod gist;
pub mod kv;
pub mod router;

pub use gist::GistProvider;
pub use kv::KvProvider;
pub use router::ProviderRouter;

use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A saved database as returned by any provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gist {
    pub id: String,
    pub id_prefix: String,
    pub name: String,
    pub owner: String,
    pub schema: String,
    pub query: String,
}

impl Gist {
    /// Shareable `<prefix>:<id>` reference
    pub fn reference(&self) -> String {
        format!("{}:{}", self.id_prefix, self.id)
    }
}

/// A remote backend that can store and fetch databases.
///
/// Credentials are refreshed explicitly with `load_credentials`; callers
/// that make decisions on them reload first.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Tag prefixed to ids issued by this provider
    fn id_prefix(&self) -> &str;

    /// Account that owns copies created through this provider
    fn current_user_id(&self) -> Option<String>;

    /// Whether the last loaded credentials allow writing
    fn has_credentials(&self) -> bool;

    /// Re-read credentials from persisted settings
    fn load_credentials(&self) -> Result<()>;

    /// Public web view of a stored copy, `""` when the backend has none
    fn public_url_for(&self, id: &str) -> String;

    /// Fetch a stored copy; `None` when missing or malformed
    async fn fetch_by_id(&self, id: &str) -> Result<Option<Gist>>;

    async fn create(&self, name: &str, schema: &str, query: &str) -> Result<Gist>;

    async fn update(&self, id: &str, name: &str, schema: &str, query: &str) -> Result<Gist>;
}

/// Turn a non-2xx response into a provider error carrying the body
pub(crate) async fn check_status(provider: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(Error::Provider {
        provider: provider.to_string(),
        status: status.as_u16(),
        message,
    })
}
