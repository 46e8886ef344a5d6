//! URL opener: resolves a location into a serializable, reopenable
//! handle, populating the cache on first access when one is supplied.
//!
//! An [`OpenFile`] is an immutable descriptor, not a live connection.
//! The actual byte stream is acquired only inside [`OpenFile::open`] and
//! released when the returned reader drops, so a handle can cross
//! process or worker boundaries (via serde) and still reopen to
//! byte-identical content on the other side.

use std::fs::File;
use std::io::Read;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::DiskCache;
use crate::error::GridfetchError;
use crate::location::Location;
use crate::secrets::{resolve, EffectiveTarget, SecretBundle};

/// Non-secret transport options applied at open time.
///
/// Serde-serializable so it can ride inside a handle; secrets never
/// belong here.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOptions {
    /// Global timeout for network opens, in whole seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Extra request headers for network opens (name, value).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
}

/// Open a location into a reopenable handle.
///
/// With no cache the handle binds directly to the live transport. With a
/// cache, an existing entry is served as-is; otherwise the live source is
/// streamed through [`DiskCache::write_through`] once and the handle
/// binds to the now-populated entry (secrets are irrelevant from then
/// on). A second call on a populated cache never touches the transport.
pub fn open_url(
    location: &Location,
    secrets: Option<&SecretBundle>,
    cache: Option<&DiskCache>,
    options: Option<&OpenOptions>,
) -> Result<OpenFile, GridfetchError> {
    let options = options.cloned().unwrap_or_default();

    let Some(cache) = cache else {
        // Secrets stay with the in-memory handle for reopening, but are
        // excluded from any serialized form of it.
        return Ok(OpenFile {
            location: location.clone(),
            options,
            cache: None,
            secrets: secrets.cloned(),
        });
    };

    if cache.exists(location) {
        debug!(location = %location, "cache hit");
    } else {
        debug!(location = %location, "cache miss, populating");
        let target = resolve(location, secrets, &options)?;
        let live = live_reader(location, &target)?;
        cache.write_through(location, live)?;
    }

    Ok(OpenFile {
        location: location.clone(),
        options,
        cache: Some(cache.clone()),
        secrets: None,
    })
}

/// Serializable descriptor of an openable source.
///
/// Carries only reconstructible state: the location, non-secret open
/// options, and an optional cache reference. A secret bundle may ride
/// along in memory for the direct-transport path but is skipped during
/// serialization; use [`OpenFile::with_secrets`] to re-attach one after
/// deserialization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpenFile {
    location: Location,
    options: OpenOptions,
    cache: Option<DiskCache>,
    #[serde(skip)]
    secrets: Option<SecretBundle>,
}

impl OpenFile {
    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn options(&self) -> &OpenOptions {
        &self.options
    }

    pub fn cache(&self) -> Option<&DiskCache> {
        self.cache.as_ref()
    }

    /// Re-attach a secret bundle (e.g. after deserialization) for the
    /// direct-transport path. Cache-bound handles never need this.
    pub fn with_secrets(mut self, secrets: SecretBundle) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Scoped acquisition: derive a fresh byte stream for this handle.
    ///
    /// Cache-bound handles read the cache entry; direct handles
    /// re-resolve credentials and reconnect to the live transport. The
    /// stream is released when the returned reader drops.
    pub fn open(&self) -> Result<ByteReader, GridfetchError> {
        if let Some(cache) = &self.cache {
            return Ok(ByteReader::File(cache.open(&self.location)?));
        }
        let target = resolve(&self.location, self.secrets.as_ref(), &self.options)?;
        live_reader(&self.location, &target)
    }

    /// Convenience: open and read the full content.
    pub fn read_all(&self) -> Result<Vec<u8>, GridfetchError> {
        let mut reader = self.open()?;
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .map_err(|source| GridfetchError::SourceUnavailable {
                location: self.location.to_string(),
                message: format!("read failed: {source}"),
            })?;
        Ok(data)
    }
}

/// A scoped byte stream bound to one open acquisition. Dropping it
/// releases the underlying file or connection.
pub enum ByteReader {
    File(File),
    Http(Box<dyn Read + Send>),
}

impl Read for ByteReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            ByteReader::File(file) => file.read(buf),
            ByteReader::Http(body) => body.read(buf),
        }
    }
}

impl std::fmt::Debug for ByteReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ByteReader::File(_) => f.write_str("ByteReader::File"),
            ByteReader::Http(_) => f.write_str("ByteReader::Http"),
        }
    }
}

/// Open the live transport for an already-resolved target.
fn live_reader(
    location: &Location,
    target: &EffectiveTarget,
) -> Result<ByteReader, GridfetchError> {
    if !location.is_network() {
        debug!(location = %location, "opening local file");
        let file =
            File::open(&target.url).map_err(|source| GridfetchError::SourceUnavailable {
                location: location.to_string(),
                message: source.to_string(),
            })?;
        return Ok(ByteReader::File(file));
    }

    debug!(location = %location, "opening network stream");
    let config = ureq::Agent::config_builder()
        .timeout_global(target.timeout)
        .build();
    let agent: ureq::Agent = config.into();

    let mut request = agent.get(&target.url);
    for (name, value) in &target.headers {
        request = request.header(name.as_str(), value.as_str());
    }

    let response = request.call().map_err(|source| match source {
        ureq::Error::StatusCode(code) if code == 401 || code == 403 => {
            GridfetchError::Credential {
                location: location.to_string(),
                message: format!("transport rejected credentials (HTTP {code})"),
            }
        }
        other => GridfetchError::SourceUnavailable {
            location: location.to_string(),
            message: other.to_string(),
        },
    })?;

    Ok(ByteReader::Http(Box::new(
        response.into_body().into_reader(),
    )))
}
