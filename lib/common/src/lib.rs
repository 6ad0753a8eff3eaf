#![doc(test(attr(deny(warnings))))]

//! Shared infrastructure for [RDF Bedrock](../../rdf-bedrock): the storage
//! error type, space/table naming and validation, engine configuration, the
//! signal sink interface and a small bounded LRU map.

pub mod config;
pub mod error;
pub mod lru;
pub mod naming;
pub mod signals;

pub use config::{BedrockConfig, PoolSettings};
pub use error::{StorageError, StorageResult};
pub use lru::LruMap;
pub use naming::{
    validate_global_prefix, validate_space_id, SpaceTables, MAX_IDENTIFIER_LEN,
};
pub use signals::{channels, signal_types, NoopSignalSink, SignalSink, TracingSignalSink};
