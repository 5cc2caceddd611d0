//! Content fetching for local and remote sources

use crate::source::{SourceDescriptor, SourceKind};
use crate::{Error, Result};
use tracing::{debug, info};

/// Reads local files and downloads remote URLs.
#[derive(Debug, Clone, Default)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the raw bytes behind a local or remote descriptor
    pub async fn fetch_bytes(&self, source: &SourceDescriptor) -> Result<Vec<u8>> {
        let location = source
            .as_text()
            .ok_or_else(|| Error::InvalidSource(source.to_label()))?;

        match source.kind() {
            SourceKind::Local => {
                debug!(path = %location, "Reading local file");
                Ok(tokio::fs::read(location).await?)
            }
            SourceKind::Remote => {
                info!(url = %location, "Downloading");
                let response = self.client.get(location).send().await?.error_for_status()?;
                Ok(response.bytes().await?.to_vec())
            }
            _ => Err(Error::InvalidSource(format!(
                "cannot fetch {}",
                source.to_label()
            ))),
        }
    }

    /// Fetch the text behind a local or remote descriptor
    pub async fn fetch_text(&self, source: &SourceDescriptor) -> Result<String> {
        let bytes = self.fetch_bytes(source).await?;
        String::from_utf8(bytes)
            .map_err(|e| Error::InvalidSource(format!("{} is not valid UTF-8: {}", source.to_label(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_local_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("init.sql");
        std::fs::write(&path, "create table t(x);").unwrap();

        let source = SourceDescriptor::text(path.to_string_lossy());
        let text = Fetcher::new().fetch_text(&source).await.unwrap();
        assert_eq!(text, "create table t(x);");
    }

    #[tokio::test]
    async fn test_fetch_missing_file_fails() {
        let source = SourceDescriptor::text("/definitely/not/here.db");
        assert!(Fetcher::new().fetch_bytes(&source).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_location() {
        let source = SourceDescriptor::bytes(vec![1, 2, 3]);
        assert!(matches!(
            Fetcher::new().fetch_bytes(&source).await,
            Err(Error::InvalidSource(_))
        ));
    }
}
