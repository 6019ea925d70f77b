use std::fmt::Display;

use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Identifier of an ActivityStreams node.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Iri(String);

pub const PUBLIC_NS: &str = "https://www.w3.org/ns/activitystreams#Public";

impl Iri {
    pub fn new(iri: impl Into<String>) -> Iri {
        Iri(iri.into())
    }
    pub fn public() -> Iri {
        Iri(PUBLIC_NS.to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    /// Compact and bare forms of the public namespace are accepted too.
    pub fn is_public(&self) -> bool {
        matches!(self.0.as_str(), PUBLIC_NS | "as:Public" | "Public")
    }
    /// Absolute IRI with a scheme and a host
    pub fn is_valid(&self) -> bool {
        Url::parse(&self.0).is_ok_and(|url| url.has_host())
    }
    pub fn join(&self, segment: &str) -> Iri {
        Iri(format!("{}/{}", self.0.trim_end_matches('/'), segment))
    }
    pub fn parent(&self) -> Option<Iri> {
        let trimmed = self.0.trim_end_matches('/');
        let (parent, last) = trimmed.rsplit_once('/')?;
        if last.is_empty() || parent.ends_with('/') {
            return None;
        }
        Some(Iri(parent.to_string()))
    }
    pub fn last_segment(&self) -> &str {
        let trimmed = self.0.trim_end_matches('/');
        trimmed.rsplit_once('/').map_or(trimmed, |(_, last)| last)
    }
}

impl From<&str> for Iri {
    fn from(value: &str) -> Self {
        Iri(value.to_string())
    }
}

impl From<String> for Iri {
    fn from(value: String) -> Self {
        Iri(value)
    }
}

impl From<&Iri> for Iri {
    fn from(value: &Iri) -> Self {
        value.clone()
    }
}

impl From<Iri> for String {
    fn from(value: Iri) -> Self {
        value.0
    }
}

impl AsRef<str> for Iri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Iri {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Iri {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Display for Iri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
