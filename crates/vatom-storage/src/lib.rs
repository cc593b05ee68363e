//! Locator resolution for pipeline inputs.
//!
//! A locator is either an `http(s)://` URL or a local filesystem path.
//! Transcripts are read as text; source media is materialized as a local
//! file, downloading remote media into a temporary directory that lives as
//! long as the returned [`ResolvedSource`].

pub mod error;
pub mod resolver;

pub use error::{StorageError, StorageResult};
pub use resolver::{is_remote, ResolvedSource, SourceResolver};
