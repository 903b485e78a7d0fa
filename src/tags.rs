//! Tag registry for location-independent links.
//!
//! Every source directory owns exactly one tag: the string in its
//! `tag.yaml`, or a SHA-256 fingerprint of its source-relative path when it
//! declares none. During the build pass each directory registers its tag once
//! per working language against that language's output path. Links are
//! resolved only after the whole tree has been visited, so a page may link to
//! directories that come later in the traversal.
//!
//! Registrations are keyed by `(tag, language)`. Registering the same pair
//! twice keeps the second URL; the collision is logged, not rejected.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LinkError {
    #[error("unknown tag `{tag}` for language `{language}` referenced by {page}")]
    UnknownTag {
        tag: String,
        language: String,
        page: String,
    },
}

/// Canonical output-relative URLs by `(tag, language)`.
#[derive(Debug, Default, Clone)]
pub struct TagRegistry {
    urls: HashMap<(String, String), String>,
    static_url: Option<String>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the canonical URL of `tag` in `language`, replacing any earlier one.
    pub fn register(&mut self, tag: &str, language: &str, url: &str) {
        let key = (tag.to_string(), language.to_string());
        if let Some(previous) = self.urls.insert(key, url.to_string())
            && previous != url
        {
            tracing::warn!(
                tag = %tag,
                language = %language,
                previous = %previous,
                url = %url,
                "Duplicate tag, keeping the later registration"
            );
        }
    }

    /// Record the static asset base, shared by every language.
    pub fn register_static(&mut self, url: &str) {
        self.static_url = Some(url.to_string());
    }

    /// Canonical URL of `tag` in `language`.
    pub fn resolve(&self, tag: &str, language: &str) -> Option<&str> {
        self.urls
            .get(&(tag.to_string(), language.to_string()))
            .map(String::as_str)
    }

    pub fn resolve_static(&self) -> Option<&str> {
        self.static_url.as_deref()
    }

    /// Number of `(tag, language)` registrations.
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Tag used for a directory that declares none: hex SHA-256 of its source-relative path.
pub fn fingerprint_tag(relative_path: &str) -> String {
    let digest = Sha256::digest(relative_path.as_bytes());
    format!("{:x}", digest)
}
