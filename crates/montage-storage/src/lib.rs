//! Local storage for montage.
//!
//! This crate provides:
//! - A media store resolving resource ids to files on disk
//! - An output store publishing finished renders by task id

pub mod error;
pub mod media_store;
pub mod output_store;

pub use error::{StorageError, StorageResult};
pub use media_store::{LocalMediaStore, LocalStoreConfig};
pub use output_store::OutputStore;
