//! Anonymous key/value document store backend
//!
//! Documents are flat JSON objects `{id, owner, name, schema, query}`
//! served under a single collection URL. No account is needed, so this
//! provider always reports credentials and serves as the fallback.

use super::{Gist, StorageProvider, check_status};
use crate::config::{CredentialSource, KvConfig};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const ID_PREFIX: &str = "kv";

const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Deserialize)]
struct KvDocument {
    id: String,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    query: Option<String>,
}

impl KvDocument {
    fn into_gist(self) -> Option<Gist> {
        if self.schema.is_none() && self.query.is_none() {
            return None;
        }
        Some(Gist {
            id: self.id,
            id_prefix: ID_PREFIX.to_string(),
            name: self.name.unwrap_or_default(),
            owner: self.owner.unwrap_or_default(),
            schema: self.schema.unwrap_or_default(),
            query: self.query.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Serialize)]
struct KvWrite<'a> {
    owner: &'a str,
    name: &'a str,
    schema: &'a str,
    query: &'a str,
}

/// Provider backed by a plain JSON document store
pub struct KvProvider {
    client: reqwest::Client,
    source: CredentialSource,
    config: RwLock<Option<KvConfig>>,
}

impl KvProvider {
    pub fn new(source: CredentialSource) -> Self {
        Self {
            client: reqwest::Client::new(),
            source,
            config: RwLock::new(None),
        }
    }

    fn collection_url(&self) -> Result<String> {
        self.config
            .read()
            .as_ref()
            .map(|c| c.url.trim_end_matches('/').to_string())
            .ok_or_else(|| Error::Config("kv.url is not configured".to_string()))
    }

    async fn send_document(&self, request: reqwest::RequestBuilder) -> Result<Gist> {
        let response = check_status(ID_PREFIX, request.send().await?).await?;
        let document: KvDocument = response.json().await?;
        let id = document.id.clone();
        document.into_gist().ok_or_else(|| Error::Provider {
            provider: ID_PREFIX.to_string(),
            status: 200,
            message: format!("document {} has no database content", id),
        })
    }
}

#[async_trait]
impl StorageProvider for KvProvider {
    fn id_prefix(&self) -> &str {
        ID_PREFIX
    }

    fn current_user_id(&self) -> Option<String> {
        let owner = self.config.read().as_ref().and_then(|c| c.owner.clone());
        Some(owner.unwrap_or_else(|| ANONYMOUS.to_string()))
    }

    fn has_credentials(&self) -> bool {
        true
    }

    fn load_credentials(&self) -> Result<()> {
        let config = self.source.load()?;
        *self.config.write() = config.kv;
        Ok(())
    }

    fn public_url_for(&self, id: &str) -> String {
        self.config
            .read()
            .as_ref()
            .and_then(|c| c.share_url.as_ref())
            .map(|template| template.replace("{id}", id))
            .unwrap_or_default()
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<Gist>> {
        let url = format!("{}/{}", self.collection_url()?, id);
        info!(url = %url, "Fetching document");
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(ID_PREFIX, response).await?;
        match response.json::<KvDocument>().await {
            Ok(document) => Ok(document.into_gist()),
            Err(e) => {
                debug!(error = %e, "Malformed document");
                Ok(None)
            }
        }
    }

    async fn create(&self, name: &str, schema: &str, query: &str) -> Result<Gist> {
        let url = self.collection_url()?;
        let owner = self.current_user_id().unwrap_or_default();
        info!(url = %url, name = %name, "Creating document");
        let body = KvWrite { owner: &owner, name, schema, query };
        self.send_document(self.client.post(&url).json(&body)).await
    }

    async fn update(&self, id: &str, name: &str, schema: &str, query: &str) -> Result<Gist> {
        let url = format!("{}/{}", self.collection_url()?, id);
        let owner = self.current_user_id().unwrap_or_default();
        info!(url = %url, name = %name, "Updating document");
        let body = KvWrite { owner: &owner, name, schema, query };
        self.send_document(self.client.put(&url).json(&body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SqlshareConfig;

    #[test]
    fn test_document_without_content_is_none() {
        let document = KvDocument {
            id: "1".to_string(),
            owner: None,
            name: Some("x.db".to_string()),
            schema: None,
            query: None,
        };
        assert!(document.into_gist().is_none());
    }

    #[test]
    fn test_anonymous_defaults() {
        let kv = KvProvider::new(CredentialSource::Inline(SqlshareConfig::default()));
        kv.load_credentials().unwrap();
        assert!(kv.has_credentials());
        assert_eq!(kv.current_user_id().as_deref(), Some("anonymous"));
        assert_eq!(kv.public_url_for("1"), "");
    }

    #[test]
    fn test_share_url_template() {
        let config = SqlshareConfig {
            kv: Some(KvConfig {
                url: "https://kv.test/docs/".to_string(),
                owner: Some("me".to_string()),
                share_url: Some("https://kv.test/s/{id}".to_string()),
            }),
            ..Default::default()
        };
        let kv = KvProvider::new(CredentialSource::Inline(config));
        kv.load_credentials().unwrap();
        assert_eq!(kv.collection_url().unwrap(), "https://kv.test/docs");
        assert_eq!(kv.public_url_for("7"), "https://kv.test/s/7");
        assert_eq!(kv.current_user_id().as_deref(), Some("me"));
    }
}
