//! Disk-backed cache store keyed by location identity.
//!
//! The cache sits strictly between the transport and the consumer. It is
//! addressed by the canonical (secret-free) location string, not by
//! content hash: two locations with identical bytes get two entries.
//! Entries are never implicitly invalidated; freshness is the caller's
//! responsibility.
//!
//! Write-through goes via a uniquely named temp file in the cache root
//! followed by an atomic rename, so a crash mid-write never leaves a
//! partial entry visible to `exists` or `open`. Concurrent populators of
//! the same key each write a private temp file; the rename is atomic and
//! the entries are byte-identical, so readers are safe either way.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::GridfetchError;
use crate::location::Location;

/// Longest sanitized tail segment kept in an entry file name.
const MAX_TAIL_LEN: usize = 64;

/// A cache of file contents on a local disk directory, keyed by the
/// canonical location string.
///
/// Cheap to clone and serde-serializable so it can ride inside an
/// [`OpenFile`](crate::opener::OpenFile) across process boundaries. The
/// backing directory may be shared by multiple worker processes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    /// Open (creating if needed) a cache rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, GridfetchError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry for `location`, whether or not it exists.
    pub fn entry_path(&self, location: &Location) -> PathBuf {
        self.root.join(entry_file_name(location))
    }

    /// True iff a cache entry for the canonical key is present.
    pub fn exists(&self, location: &Location) -> bool {
        self.entry_path(location).is_file()
    }

    /// Scoped read acquisition of an entry. Fails with a cache-miss error
    /// when the entry is absent; the returned file is released on drop.
    pub fn open(&self, location: &Location) -> Result<File, GridfetchError> {
        let path = self.entry_path(location);
        if !path.is_file() {
            return Err(GridfetchError::CacheMiss {
                location: location.to_string(),
                key: location.cache_key().to_string(),
            });
        }
        File::open(&path).map_err(GridfetchError::Io)
    }

    /// Consume `source` fully and persist it as the entry for `location`.
    ///
    /// Atomic with respect to partial writes: bytes stream into a private
    /// temp file which is renamed into place only once the source is
    /// exhausted. Any failure leaves the cache untouched.
    pub fn write_through(
        &self,
        location: &Location,
        mut source: impl Read,
    ) -> Result<(), GridfetchError> {
        let mut populate = || -> Result<u64, String> {
            let mut tmp =
                NamedTempFile::new_in(&self.root).map_err(|source| source.to_string())?;
            let written =
                std::io::copy(&mut source, tmp.as_file_mut()).map_err(|e| e.to_string())?;
            tmp.persist(self.entry_path(location))
                .map_err(|e| e.to_string())?;
            Ok(written)
        };

        match populate() {
            Ok(written) => {
                debug!(location = %location, bytes = written, "cache entry populated");
                Ok(())
            }
            Err(message) => Err(GridfetchError::CachePopulation {
                location: location.to_string(),
                key: location.cache_key().to_string(),
                message,
            }),
        }
    }
}

/// File name for a cache entry: a crc32c of the canonical key plus a
/// sanitized tail of the URL, so a populated directory is readable by eye.
fn entry_file_name(location: &Location) -> String {
    let digest = crc32c::crc32c(location.cache_key().as_bytes());
    let tail = sanitize_tail(location.tail_segment());
    if tail.is_empty() {
        format!("{digest:08x}")
    } else {
        format!("{digest:08x}-{tail}")
    }
}

fn sanitize_tail(tail: &str) -> String {
    tail.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_TAIL_LEN)
        .collect()
}
