//! Location model: where a data source lives and how to identify it.
//!
//! A [`Location`] pairs a URL string with a [`SourceKind`] describing how
//! it must be reached. The kind is inferred from the string when not
//! declared explicitly, and never changes after construction. Locations
//! also provide the canonical, secret-free identity string used to key
//! cache entries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GridfetchError;

/// How a location is reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// An absolute or relative path on the local filesystem.
    LocalPath,
    /// A network URL reachable without credentials.
    PublicNetwork,
    /// A network URL requiring secret query-string parameters at open time.
    PrivateNetwork,
}

/// Identifier of a data source: a URL string plus its source kind.
///
/// The string never carries secrets; credentials are merged in only at
/// open time by the credential resolver and never stored here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    url: String,
    kind: SourceKind,
}

impl Location {
    /// Create a location, inferring the source kind from the string.
    ///
    /// `http://` and `https://` URLs become [`SourceKind::PublicNetwork`];
    /// a `file://` prefix is stripped and everything else is treated as a
    /// local path. Use [`Location::private`] for URLs that require secrets.
    pub fn new(input: &str) -> Result<Self, GridfetchError> {
        if is_network_url(input) {
            Self::with_kind(input, SourceKind::PublicNetwork)
        } else {
            let path = input.strip_prefix("file://").unwrap_or(input);
            Self::with_kind(path, SourceKind::LocalPath)
        }
    }

    /// Create a private-network location (secrets required at open time).
    pub fn private(input: &str) -> Result<Self, GridfetchError> {
        Self::with_kind(input, SourceKind::PrivateNetwork)
    }

    /// Create a location with an explicit source kind.
    pub fn with_kind(input: &str, kind: SourceKind) -> Result<Self, GridfetchError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(GridfetchError::LocationParse {
                input: input.to_string(),
                message: "empty location string".to_string(),
            });
        }

        match kind {
            SourceKind::LocalPath => Ok(Self {
                url: trimmed.to_string(),
                kind,
            }),
            SourceKind::PublicNetwork | SourceKind::PrivateNetwork => {
                if !is_network_url(trimmed) {
                    return Err(GridfetchError::LocationParse {
                        input: input.to_string(),
                        message: "network locations must start with http:// or https://"
                            .to_string(),
                    });
                }
                let parsed =
                    url::Url::parse(trimmed).map_err(|source| GridfetchError::LocationParse {
                        input: input.to_string(),
                        message: format!("invalid URL: {source}"),
                    })?;
                if parsed.host_str().is_none() {
                    return Err(GridfetchError::LocationParse {
                        input: input.to_string(),
                        message: "URL is missing a host".to_string(),
                    });
                }
                Ok(Self {
                    url: parsed.to_string(),
                    kind,
                })
            }
        }
    }

    /// The location string (normalized for network URLs, verbatim for paths).
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn is_network(&self) -> bool {
        matches!(
            self.kind,
            SourceKind::PublicNetwork | SourceKind::PrivateNetwork
        )
    }

    /// Canonical identity string used to key cache entries.
    ///
    /// Secrets are never part of a `Location`, so the stored URL is
    /// already secret-free; this is the normalized form of it.
    pub fn cache_key(&self) -> &str {
        &self.url
    }

    /// Last path segment of the URL, used to give cache entries a
    /// readable file name. Empty when the URL has no usable tail.
    pub(crate) fn tail_segment(&self) -> &str {
        self.url
            .split(['?', '#'])
            .next()
            .unwrap_or("")
            .rsplit('/')
            .next()
            .unwrap_or("")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

fn is_network_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_public_network_from_scheme() {
        let loc = Location::new("https://example.org/data/file.nc").expect("parse");
        assert_eq!(loc.kind(), SourceKind::PublicNetwork);
        assert!(loc.is_network());
    }

    #[test]
    fn infers_local_path_by_default() {
        let loc = Location::new("/data/file.nc").expect("parse");
        assert_eq!(loc.kind(), SourceKind::LocalPath);
        assert_eq!(loc.url(), "/data/file.nc");
    }

    #[test]
    fn strips_file_scheme() {
        let loc = Location::new("file:///data/file.nc").expect("parse");
        assert_eq!(loc.kind(), SourceKind::LocalPath);
        assert_eq!(loc.url(), "/data/file.nc");
    }

    #[test]
    fn private_requires_network_url() {
        let err = Location::private("/not/a/url").expect_err("should fail");
        match err {
            GridfetchError::LocationParse { message, .. } => {
                assert!(message.contains("http"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_hostless_url() {
        assert!(Location::new("https:///no-host").is_err());
    }

    #[test]
    fn cache_key_is_normalized_and_stable() {
        let a = Location::new("https://example.org/a/file.nc").expect("parse");
        let b = Location::new("https://example.org/a/file.nc").expect("parse");
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn tail_segment_ignores_query_and_fragment() {
        let loc = Location::new("https://example.org/a/file.nc?foo=1#frag").expect("parse");
        assert_eq!(loc.tail_segment(), "file.nc");
    }

    #[test]
    fn kind_survives_serde() {
        let loc = Location::private("https://example.org/file.nc").expect("parse");
        let json = serde_json::to_string(&loc).expect("serialize");
        let back: Location = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, loc);
        assert_eq!(back.kind(), SourceKind::PrivateNetwork);
    }
}
