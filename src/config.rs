use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const GITHUB_USER_ENV: &str = "SQLSHARE_GITHUB_USER";
pub const GITHUB_TOKEN_ENV: &str = "SQLSHARE_GITHUB_TOKEN";

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SqlshareConfig {
    pub github: Option<GithubConfig>,
    pub kv: Option<KvConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GithubConfig {
    pub user: Option<String>,
    pub token: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct KvConfig {
    pub url: String,
    pub owner: Option<String>,
    /// Public view of a stored document, `{id}` is replaced by its id
    pub share_url: Option<String>,
}

/// GitHub credentials, present only when both user and token are set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubCredentials {
    pub user: String,
    pub token: String,
}

impl SqlshareConfig {
    /// GitHub credentials from the file, overridden by the environment
    pub fn github_credentials(&self) -> Option<GithubCredentials> {
        let github = self.github.clone().unwrap_or_default();
        let user = std::env::var(GITHUB_USER_ENV).ok().or(github.user);
        let token = std::env::var(GITHUB_TOKEN_ENV).ok().or(github.token);
        match (user, token) {
            (Some(user), Some(token)) if !user.is_empty() && !token.is_empty() => {
                Some(GithubCredentials { user, token })
            }
            _ => None,
        }
    }

    pub fn github_api_url(&self) -> String {
        self.github
            .as_ref()
            .and_then(|g| g.api_url.clone())
            .unwrap_or_else(|| DEFAULT_GITHUB_API.to_string())
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("sqlshare.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<SqlshareConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: SqlshareConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &SqlshareConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Where provider credentials are re-read from on every reload
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Re-read the config file each time
    File(PathBuf),
    /// Fixed configuration
    Inline(SqlshareConfig),
}

impl CredentialSource {
    pub fn load(&self) -> crate::Result<SqlshareConfig> {
        match self {
            CredentialSource::File(path) => load_config(Some(path))
                .map(Option::unwrap_or_default)
                .map_err(|e| crate::Error::Config(e.to_string())),
            CredentialSource::Inline(config) => Ok(config.clone()),
        }
    }
}

/// Config written by `sqlshare init`
pub fn template_config() -> SqlshareConfig {
    SqlshareConfig {
        github: Some(GithubConfig {
            user: Some(String::new()),
            token: Some(String::new()),
            api_url: None,
        }),
        kv: None,
    }
}
