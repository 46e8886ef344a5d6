//! Gridfetch: caching URL opener and dataset loader for gridded array
//! data.
//!
//! Gridfetch opens remote or local data files through one uniform
//! interface, optionally caches their bytes on local disk, and loads
//! them into a named-variable dataset either eagerly or lazily. The
//! handle returned by [`open_url`] is a serializable descriptor rather
//! than a live connection, so it can cross process or worker boundaries
//! and reopen to byte-identical content on the other side.
//!
//! # Modules
//!
//! - [`location`]: where a source lives ([`Location`], [`SourceKind`])
//! - [`secrets`]: credential resolution applied at open time only
//! - [`cache`]: identity-keyed disk cache with atomic write-through
//! - [`opener`]: [`open_url`] and the serializable [`OpenFile`] handle
//! - [`dataset`]: the named-variable [`Dataset`] model
//! - [`formats`]: [`FileType`]-dispatched decode strategies and
//!   [`open_dataset`]
//! - [`error`]: error types for gridfetch operations
//!
//! # Example
//!
//! ```no_run
//! use gridfetch::{open_dataset, open_url, DiskCache, FileType, Location};
//!
//! # fn main() -> Result<(), gridfetch::GridfetchError> {
//! let location = Location::new("https://example.org/data/file.nc")?;
//! let cache = DiskCache::new("/tmp/gridfetch-cache")?;
//!
//! // First open populates the cache; later opens never touch the network.
//! let handle = open_url(&location, None, Some(&cache), None)?;
//!
//! // Lazy load: variables fetch on demand through the cached handle.
//! let dataset = open_dataset(handle, FileType::Netcdf3, false)?;
//! for (name, variable) in &dataset.variables {
//!     println!("{name}: {:?} {:?}", variable.dtype, variable.shape);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod dataset;
pub mod error;
pub mod formats;
pub mod location;
pub mod opener;
pub mod secrets;

pub use cache::DiskCache;
pub use dataset::{ArrayValues, AttrValue, DataType, Dataset, Variable, VariableData};
pub use error::GridfetchError;
pub use formats::{open_dataset, DatasetSource, FileType, FormatReader};
pub use location::{Location, SourceKind};
pub use opener::{open_url, ByteReader, OpenFile, OpenOptions};
pub use secrets::SecretBundle;
