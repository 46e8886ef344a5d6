//! Credential resolver: applies secret query-string parameters at open
//! time only.
//!
//! Secrets live in a [`SecretBundle`] and are merged into the URL when a
//! live connection is about to be established. The merged form, the
//! [`EffectiveTarget`], is transient by design: it is never serialized,
//! never stored on a handle, and never part of a cache key.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::GridfetchError;
use crate::location::{Location, SourceKind};
use crate::opener::OpenOptions;

/// Secret query-string parameters applied only when constructing a live
/// connection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecretBundle {
    params: BTreeMap<String, String>,
}

impl SecretBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a secret query parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SecretBundle {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

/// The transient result of credential resolution: the URL (or path) to
/// actually open, with secrets merged in, plus non-secret transport
/// options. Deliberately not serializable.
#[derive(Clone, Debug)]
pub struct EffectiveTarget {
    pub url: String,
    pub timeout: Option<Duration>,
    pub headers: Vec<(String, String)>,
}

/// Resolve a location and optional secret bundle into the effective open
/// target.
///
/// For network locations the secret parameters are appended to the URL's
/// query string. A private-network location with no secrets fails with a
/// credential error; local paths ignore secrets entirely.
pub fn resolve(
    location: &Location,
    secrets: Option<&SecretBundle>,
    options: &OpenOptions,
) -> Result<EffectiveTarget, GridfetchError> {
    let timeout = options.timeout_secs.map(Duration::from_secs);
    let headers: Vec<(String, String)> = options
        .headers
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    if !location.is_network() {
        return Ok(EffectiveTarget {
            url: location.url().to_string(),
            timeout,
            headers,
        });
    }

    if location.kind() == SourceKind::PrivateNetwork
        && secrets.map(SecretBundle::is_empty).unwrap_or(true)
    {
        return Err(GridfetchError::Credential {
            location: location.to_string(),
            message: "private location requires query-string secrets".to_string(),
        });
    }

    let mut url =
        url::Url::parse(location.url()).map_err(|source| GridfetchError::LocationParse {
            input: location.url().to_string(),
            message: format!("invalid URL: {source}"),
        })?;

    if let Some(bundle) = secrets {
        let mut query = url.query_pairs_mut();
        for (name, value) in bundle.iter() {
            query.append_pair(name, value);
        }
    }

    Ok(EffectiveTarget {
        url: url.to_string(),
        timeout,
        headers,
    })
}
