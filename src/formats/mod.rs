//! Format loaders: decode a handle's bytes into a [`Dataset`].
//!
//! Dispatch is a closed tagged enum: each [`FileType`] maps to exactly
//! one decode strategy in a fixed table, all satisfying the single
//! "decode bytes into named variables" capability. Unknown string tags
//! fail with [`GridfetchError::UnsupportedFormat`] before any byte is
//! read.

pub mod json_grid;
pub mod netcdf3;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dataset::{ArrayValues, DataType, Dataset};
use crate::error::GridfetchError;
use crate::location::Location;
use crate::opener::{open_url, OpenFile};

/// Enumerated tag selecting a decode strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileType {
    /// Classic netCDF (CDF-1 and CDF-2 64-bit offset).
    Netcdf3,
    /// JSON container of named arrays.
    JsonGrid,
}

impl FromStr for FileType {
    type Err = GridfetchError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.to_ascii_lowercase().as_str() {
            "netcdf" | "netcdf3" | "nc" => Ok(FileType::Netcdf3),
            "json-grid" | "json" => Ok(FileType::JsonGrid),
            other => Err(GridfetchError::UnsupportedFormat(format!(
                "'{}' (supported: netcdf, json-grid)",
                other
            ))),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Netcdf3 => f.write_str("netcdf"),
            FileType::JsonGrid => f.write_str("json-grid"),
        }
    }
}

/// The single capability every decode strategy provides.
pub trait FormatReader: Sync {
    /// Decode the handle's content into a dataset. When `load` is true
    /// every variable is materialized before return; when false every
    /// variable is a deferred reference.
    fn read_dataset(&self, source: &OpenFile, load: bool) -> Result<Dataset, GridfetchError>;
}

/// Fixed dispatch table from tag to strategy.
fn reader_for(file_type: FileType) -> &'static dyn FormatReader {
    match file_type {
        FileType::Netcdf3 => &netcdf3::Netcdf3Reader,
        FileType::JsonGrid => &json_grid::JsonGridReader,
    }
}

/// What to load a dataset from: an already-built handle, or a raw
/// location opened directly (bypassing any cache).
#[derive(Clone, Debug)]
pub enum DatasetSource {
    Handle(OpenFile),
    Raw(Location),
}

impl From<OpenFile> for DatasetSource {
    fn from(handle: OpenFile) -> Self {
        DatasetSource::Handle(handle)
    }
}

impl From<&OpenFile> for DatasetSource {
    fn from(handle: &OpenFile) -> Self {
        DatasetSource::Handle(handle.clone())
    }
}

impl From<Location> for DatasetSource {
    fn from(location: Location) -> Self {
        DatasetSource::Raw(location)
    }
}

/// Load a dataset from a handle or raw location.
///
/// `load=true` materializes every variable before return; `load=false`
/// leaves every variable as a lazy reference whose later access reads
/// from the bound handle (or its cache). The materialization state of
/// the result matches `load` exactly.
pub fn open_dataset(
    source: impl Into<DatasetSource>,
    file_type: FileType,
    load: bool,
) -> Result<Dataset, GridfetchError> {
    let handle = match source.into() {
        DatasetSource::Handle(handle) => handle,
        DatasetSource::Raw(location) => open_url(&location, None, None, None)?,
    };

    let dataset = reader_for(file_type).read_dataset(&handle, load)?;
    debug_assert!(
        dataset.check_materialization(load).is_ok(),
        "format reader violated the materialization contract"
    );
    Ok(dataset)
}

/// Format-specific recipe for fetching one deferred variable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) enum DeferredFetch {
    /// Fixed-size netCDF variable: `count` elements at `offset`.
    Netcdf3Fixed {
        offset: u64,
        dtype: DataType,
        count: usize,
    },
    /// netCDF record variable: `count_per_record` elements per record,
    /// records laid out `stride` bytes apart starting at `offset`.
    Netcdf3Record {
        offset: u64,
        dtype: DataType,
        count_per_record: usize,
        numrecs: usize,
        stride: u64,
    },
    /// One named variable of a JSON grid document.
    JsonGridVariable { name: String },
}

/// Fetch a deferred slab through a fresh scoped open of its handle.
pub(crate) fn fetch_deferred(
    source: &OpenFile,
    fetch: &DeferredFetch,
) -> Result<ArrayValues, GridfetchError> {
    match fetch {
        DeferredFetch::Netcdf3Fixed { .. } | DeferredFetch::Netcdf3Record { .. } => {
            netcdf3::fetch_slab(source, fetch)
        }
        DeferredFetch::JsonGridVariable { name } => json_grid::fetch_variable(source, name),
    }
}
