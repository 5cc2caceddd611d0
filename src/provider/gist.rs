//! GitHub Gists backend
//!
//! A saved database is a private gist with two files, `schema.sql`
//! (the portable dump) and `query.sql` (the pending query). The gist
//! description holds the display name.

use super::{Gist, StorageProvider, check_status};
use crate::config::{CredentialSource, GithubCredentials};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use tracing::{debug, info};

pub const ID_PREFIX: &str = "gist";

const SCHEMA_FILE: &str = "schema.sql";
const QUERY_FILE: &str = "query.sql";
const PUBLIC_URL: &str = "https://gist.github.com";
const USER_AGENT: &str = concat!("sqlshare/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct GistPayload {
    id: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    owner: Option<GistOwner>,
    #[serde(default)]
    files: HashMap<String, Option<GistFile>>,
}

#[derive(Debug, Deserialize)]
struct GistOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    #[serde(default)]
    raw_url: Option<String>,
}

#[derive(Debug, Default)]
struct GistState {
    credentials: Option<GithubCredentials>,
    api_url: String,
}

/// Provider backed by the GitHub Gists REST API
pub struct GistProvider {
    client: reqwest::Client,
    source: CredentialSource,
    state: RwLock<GistState>,
}

impl GistProvider {
    pub fn new(source: CredentialSource) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            source,
            state: RwLock::new(GistState::default()),
        })
    }

    fn api_url(&self) -> String {
        self.state.read().api_url.trim_end_matches('/').to_string()
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("Accept", "application/vnd.github+json");
        match &self.state.read().credentials {
            Some(credentials) => builder.bearer_auth(&credentials.token),
            None => builder,
        }
    }

    /// Adapt a GitHub payload; `None` when neither file is present
    async fn into_gist(&self, payload: GistPayload) -> Result<Option<Gist>> {
        let mut files = payload.files;
        let schema = self.file_content(files.remove(SCHEMA_FILE).flatten()).await?;
        let query = self.file_content(files.remove(QUERY_FILE).flatten()).await?;
        if schema.is_none() && query.is_none() {
            return Ok(None);
        }

        Ok(Some(Gist {
            id: payload.id,
            id_prefix: ID_PREFIX.to_string(),
            name: payload.description.unwrap_or_default(),
            owner: payload.owner.map(|o| o.login).unwrap_or_default(),
            schema: schema.unwrap_or_default(),
            query: query.unwrap_or_default(),
        }))
    }

    /// File content, following `raw_url` when GitHub truncated it
    async fn file_content(&self, file: Option<GistFile>) -> Result<Option<String>> {
        let Some(file) = file else {
            return Ok(None);
        };
        match (file.truncated, file.raw_url) {
            (true, Some(raw_url)) => {
                debug!(url = %raw_url, "Following truncated gist file");
                let response = self.request(reqwest::Method::GET, &raw_url).send().await?;
                let response = check_status(ID_PREFIX, response).await?;
                Ok(Some(response.text().await?))
            }
            _ => Ok(file.content),
        }
    }

    fn require_credentials(&self) -> Result<()> {
        if self.has_credentials() {
            Ok(())
        } else {
            Err(Error::Config("GitHub user and token are required to save gists".to_string()))
        }
    }

    async fn send_gist(&self, request: reqwest::RequestBuilder) -> Result<Gist> {
        let response = check_status(ID_PREFIX, request.send().await?).await?;
        let payload: GistPayload = response.json().await?;
        let id = payload.id.clone();
        self.into_gist(payload)
            .await?
            .ok_or_else(|| Error::Provider {
                provider: ID_PREFIX.to_string(),
                status: 200,
                message: format!("gist {} has no database files", id),
            })
    }
}

/// `files` object for a create or update request.
///
/// GitHub rejects blank files: on create they are omitted, on update they
/// are deleted by sending `null`.
fn files_body(schema: &str, query: &str, is_update: bool) -> Value {
    let mut files = Map::new();
    for (name, content) in [(SCHEMA_FILE, schema), (QUERY_FILE, query)] {
        if !content.is_empty() {
            files.insert(name.to_string(), json!({ "content": content }));
        } else if is_update {
            files.insert(name.to_string(), Value::Null);
        }
    }
    Value::Object(files)
}

#[async_trait]
impl StorageProvider for GistProvider {
    fn id_prefix(&self) -> &str {
        ID_PREFIX
    }

    fn current_user_id(&self) -> Option<String> {
        self.state.read().credentials.as_ref().map(|c| c.user.clone())
    }

    fn has_credentials(&self) -> bool {
        self.state.read().credentials.is_some()
    }

    fn load_credentials(&self) -> Result<()> {
        let config = self.source.load()?;
        let mut state = self.state.write();
        state.credentials = config.github_credentials();
        state.api_url = config.github_api_url();
        Ok(())
    }

    fn public_url_for(&self, id: &str) -> String {
        match self.current_user_id() {
            Some(user) => format!("{}/{}/{}", PUBLIC_URL, user, id),
            None => format!("{}/{}", PUBLIC_URL, id),
        }
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<Gist>> {
        let url = format!("{}/gists/{}", self.api_url(), id);
        info!(url = %url, "Fetching gist");
        let response = self.request(reqwest::Method::GET, &url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(ID_PREFIX, response).await?;
        let payload: GistPayload = match response.json().await {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, "Malformed gist payload");
                return Ok(None);
            }
        };
        self.into_gist(payload).await
    }

    async fn create(&self, name: &str, schema: &str, query: &str) -> Result<Gist> {
        self.require_credentials()?;
        let url = format!("{}/gists", self.api_url());
        info!(url = %url, name = %name, "Creating gist");
        let body = json!({
            "description": name,
            "public": false,
            "files": files_body(schema, query, false),
        });
        self.send_gist(self.request(reqwest::Method::POST, &url).json(&body)).await
    }

    async fn update(&self, id: &str, name: &str, schema: &str, query: &str) -> Result<Gist> {
        self.require_credentials()?;
        let url = format!("{}/gists/{}", self.api_url(), id);
        info!(url = %url, name = %name, "Updating gist");
        let body = json!({
            "description": name,
            "files": files_body(schema, query, true),
        });
        self.send_gist(self.request(reqwest::Method::PATCH, &url).json(&body)).await
    }
}
