//! Prism Storage Library
//!
//! The `ObjectStore` trait the pipeline reads sources from and writes
//! derivatives to, with an S3 backend and a local filesystem backend.
//!
//! # Object addressing
//!
//! Objects are addressed by `(bucket, key)` exactly as the trigger reported
//! them. The local backend maps that to `<root>/<bucket>/<key>` and rejects
//! keys that would escape the root.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_store;
#[cfg(feature = "storage-local")]
pub use local::LocalStore;
pub use prism_core::{AccessPolicy, StorageBackend};
#[cfg(feature = "storage-s3")]
pub use s3::S3Store;
pub use traits::{ObjectStore, PutOptions, StorageError, StorageResult};
