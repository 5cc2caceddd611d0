//! Provider selection and id routing

use super::{Gist, GistProvider, KvProvider, StorageProvider};
use crate::config::CredentialSource;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Ordered set of providers, most specific first.
///
/// Writes go to the active provider; id lookups go to whichever provider
/// issued the id.
#[derive(Clone)]
pub struct ProviderRouter {
    providers: Vec<Arc<dyn StorageProvider>>,
}

impl ProviderRouter {
    /// Create a router from providers in preference order.
    ///
    /// The last provider is the fallback and is expected to always report
    /// credentials.
    pub fn new(providers: Vec<Arc<dyn StorageProvider>>) -> Self {
        Self { providers }
    }

    /// GitHub gists when credentials exist, the key/value store otherwise
    pub fn with_default_providers(source: CredentialSource) -> Result<Self> {
        let gist: Arc<dyn StorageProvider> = Arc::new(GistProvider::new(source.clone())?);
        let kv: Arc<dyn StorageProvider> = Arc::new(KvProvider::new(source));
        Ok(Self::new(vec![gist, kv]))
    }

    /// Provider registered under `prefix`
    pub fn provider(&self, prefix: &str) -> Option<Arc<dyn StorageProvider>> {
        self.providers.iter().find(|p| p.id_prefix() == prefix).cloned()
    }

    /// The most preferred provider whose freshly loaded credentials are present
    pub fn active_provider(&self) -> Result<Arc<dyn StorageProvider>> {
        let (fallback, preferred) = self
            .providers
            .split_last()
            .ok_or_else(|| Error::Config("no storage providers configured".to_string()))?;

        for provider in preferred {
            provider.load_credentials()?;
            if provider.has_credentials() {
                debug!(provider = provider.id_prefix(), "Active provider");
                return Ok(provider.clone());
            }
        }

        fallback.load_credentials()?;
        debug!(provider = fallback.id_prefix(), "Falling back to provider");
        Ok(fallback.clone())
    }

    /// Fetch a stored `<prefix>:<id>` from the provider that issued it,
    /// regardless of which provider is active.
    pub async fn resolve_by_id(&self, stored_id: &str) -> Result<Option<Gist>> {
        let Some((prefix, id)) = stored_id.split_once(':') else {
            warn!(id = %stored_id, "Stored id has no provider prefix");
            return Ok(None);
        };
        let Some(provider) = self.provider(prefix) else {
            warn!(prefix = %prefix, "No provider for stored id");
            return Ok(None);
        };
        provider.load_credentials()?;
        provider.fetch_by_id(id).await
    }

    pub fn has_credentials(&self) -> Result<bool> {
        Ok(self.active_provider()?.has_credentials())
    }

    pub fn current_user_id(&self) -> Result<Option<String>> {
        Ok(self.active_provider()?.current_user_id())
    }

    /// Public URL of `id` on the active provider
    pub fn url_for(&self, id: &str) -> Result<String> {
        Ok(self.active_provider()?.public_url_for(id))
    }

    pub async fn create(&self, name: &str, schema: &str, query: &str) -> Result<Gist> {
        self.active_provider()?.create(name, schema, query).await
    }

    pub async fn update(&self, id: &str, name: &str, schema: &str, query: &str) -> Result<Gist> {
        self.active_provider()?.update(id, name, schema, query).await
    }
}

impl std::fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefixes: Vec<&str> = self.providers.iter().map(|p| p.id_prefix()).collect();
        f.debug_struct("ProviderRouter").field("providers", &prefixes).finish()
    }
}
