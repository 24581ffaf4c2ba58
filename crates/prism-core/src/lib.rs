//! Prism Core Library
//!
//! Domain types shared by every prism component: the variant catalog, the key
//! policy that gates and names derivatives, trigger parsing, configuration and
//! the bounded fan-out used by both pipeline stages.

pub mod catalog;
pub mod config;
pub mod constants;
pub mod fanout;
pub mod key_policy;
pub mod models;
pub mod storage_types;
pub mod trigger;

// Re-export commonly used types
pub use catalog::{CatalogError, VariantCatalog, VariantSpec};
pub use config::{ConfigError, LogFormat, WorkerConfig};
pub use fanout::{JoinPolicy, TaskError, TaskGroup, TaskResult};
pub use key_policy::{classify, Classification, ClassifiedSource, ProcessingDecision};
pub use models::{DerivativeArtifact, DerivativeJob, SourceDescriptor, SourceFormat, TargetFormat};
pub use storage_types::{AccessPolicy, StorageBackend};
pub use trigger::{decode_object_key, parse_event, TriggerError};
