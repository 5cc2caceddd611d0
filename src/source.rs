//! Source descriptors - where a session's database comes from
//!
//! A raw input is classified purely by its shape:
//! - `bytes` → `binary`
//! - `scheme://...` → `remote`
//! - `<prefix>:<id>` → `id`
//! - any other non-empty text → `local`
//! - nothing or `""` → `empty`
//!
//! The `sql` kind is never inferred. Callers set it explicitly when they
//! already know a payload came from a SQL script.

use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

static URL_SCHEME: OnceLock<Regex> = OnceLock::new();

fn url_scheme() -> &'static Regex {
    URL_SCHEME.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("static pattern"))
}

/// Kind of source a database is loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Fresh database without schema
    Empty,
    /// Path on the local filesystem
    Local,
    /// URL fetched over the network
    Remote,
    /// In-memory database image
    Binary,
    /// SQL script executed into an empty database
    Sql,
    /// Previously saved copy, `<provider>:<id>`
    Id,
}

impl SourceKind {
    /// Get the string representation of the source kind
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Empty => "empty",
            SourceKind::Local => "local",
            SourceKind::Remote => "remote",
            SourceKind::Binary => "binary",
            SourceKind::Sql => "sql",
            SourceKind::Id => "id",
        }
    }

    /// Get all source kinds
    pub fn all() -> &'static [SourceKind] {
        &[
            SourceKind::Empty,
            SourceKind::Local,
            SourceKind::Remote,
            SourceKind::Binary,
            SourceKind::Sql,
            SourceKind::Id,
        ]
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "empty" | "new" => Ok(SourceKind::Empty),
            "local" | "file" | "path" => Ok(SourceKind::Local),
            "remote" | "url" => Ok(SourceKind::Remote),
            "binary" | "bytes" => Ok(SourceKind::Binary),
            "sql" | "script" => Ok(SourceKind::Sql),
            "id" | "gist" => Ok(SourceKind::Id),
            _ => Err(Error::InvalidSource(format!("Unknown source kind: {}", s))),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw payload behind a source descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl From<&str> for SourceValue {
    fn from(value: &str) -> Self {
        SourceValue::Text(value.to_string())
    }
}

impl From<String> for SourceValue {
    fn from(value: String) -> Self {
        SourceValue::Text(value)
    }
}

impl From<Vec<u8>> for SourceValue {
    fn from(value: Vec<u8>) -> Self {
        SourceValue::Bytes(value)
    }
}

/// Classify a raw value into a source kind.
///
/// Never fails: anything unrecognized is either `empty` or `local`.
pub fn classify(value: Option<&SourceValue>) -> SourceKind {
    match value {
        None => SourceKind::Empty,
        Some(SourceValue::Bytes(_)) => SourceKind::Binary,
        Some(SourceValue::Text(text)) if text.is_empty() => SourceKind::Empty,
        Some(SourceValue::Text(text)) if url_scheme().is_match(text) => SourceKind::Remote,
        Some(SourceValue::Text(text)) if looks_like_id(text) => SourceKind::Id,
        Some(SourceValue::Text(_)) => SourceKind::Local,
    }
}

/// `<prefix>:<id>`, excluding Windows drive letters such as `C:\data.db`.
fn looks_like_id(text: &str) -> bool {
    match text.split_once(':') {
        Some((prefix, _)) => prefix.len() > 1,
        None => false,
    }
}

/// Typed classification of an opaque location or content reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    value: Option<SourceValue>,
    kind: SourceKind,
}

impl SourceDescriptor {
    /// Create a descriptor, inferring the kind from the value's shape
    pub fn new(value: Option<SourceValue>) -> Self {
        let kind = classify(value.as_ref());
        Self { value, kind }
    }

    /// Descriptor for a fresh, empty database
    pub fn empty() -> Self {
        Self::new(None)
    }

    /// Descriptor from a text reference (path, URL or stored id)
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(Some(SourceValue::Text(value.into())))
    }

    /// Descriptor for an in-memory database image
    pub fn bytes(value: Vec<u8>) -> Self {
        Self::new(Some(SourceValue::Bytes(value)))
    }

    /// Descriptor for a stored id on the given provider
    pub fn stored(prefix: &str, id: &str) -> Self {
        Self {
            value: Some(SourceValue::Text(format!("{}:{}", prefix, id))),
            kind: SourceKind::Id,
        }
    }

    /// Override the inferred kind
    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn value(&self) -> Option<&SourceValue> {
        self.value.as_ref()
    }

    /// Text value, if the payload is text
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            Some(SourceValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Release the payload, keeping the kind.
    pub fn take_value(&mut self) -> Option<SourceValue> {
        self.value.take()
    }

    /// Whether the reference points at a `.sql` script
    pub fn is_sql_script(&self) -> bool {
        self.as_text()
            .map(|text| strip_query(text).to_lowercase().ends_with(".sql"))
            .unwrap_or(false)
    }

    /// Split an id reference into `(provider prefix, remote id)`
    pub fn split_id(&self) -> Option<(&str, &str)> {
        if self.kind != SourceKind::Id {
            return None;
        }
        self.as_text()?.split_once(':')
    }

    /// Value suitable for a shareable URL fragment.
    ///
    /// Binary, SQL and empty sources cannot be re-fetched from a reference
    /// alone and render as `""`.
    pub fn to_shareable_reference(&self) -> String {
        match self.kind {
            SourceKind::Local | SourceKind::Remote | SourceKind::Id => {
                self.as_text().unwrap_or_default().to_string()
            }
            SourceKind::Binary | SourceKind::Sql | SourceKind::Empty => String::new(),
        }
    }

    /// Human-readable description for status and error messages
    pub fn to_label(&self) -> String {
        let text = self.as_text().unwrap_or_default();
        match self.kind {
            SourceKind::Local | SourceKind::Remote => format!("URL {}", text),
            SourceKind::Binary => "binary value".to_string(),
            SourceKind::Sql => "sql script".to_string(),
            SourceKind::Id => format!("ID {}", text),
            SourceKind::Empty => "empty value".to_string(),
        }
    }

    /// Last path segment of a local or remote reference, `""` otherwise
    pub fn extract_default_name(&self) -> String {
        match self.kind {
            SourceKind::Local | SourceKind::Remote => {
                let text = self.as_text().unwrap_or_default();
                let path = if self.kind == SourceKind::Remote {
                    url::Url::parse(text)
                        .map(|url| url.path().to_string())
                        .unwrap_or_else(|_| strip_query(text).to_string())
                } else {
                    text.to_string()
                };
                path.rsplit(['/', '\\'])
                    .next()
                    .unwrap_or_default()
                    .to_string()
            }
            _ => String::new(),
        }
    }
}

impl Default for SourceDescriptor {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_label())
    }
}

fn strip_query(text: &str) -> &str {
    let end = text.find(['?', '#']).unwrap_or(text.len());
    &text[..end]
}
