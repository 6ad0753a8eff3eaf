#![doc(test(attr(deny(warnings))))]

//! PostgreSQL-backed quad storage for [RDF Bedrock](../../rdf-bedrock).
//!
//! The engine persists named-graph RDF data in per-space table sets, with a
//! deterministic term identity scheme, streaming pattern matching over a
//! server-side cursor, transactional batch writes, and a bulk-ingest pipeline
//! that stages data in scratch relations and publishes it by partition
//! attachment.

pub mod bulk;
mod datatypes;
mod engine;
mod graphs;
mod namespaces;
mod pattern;
mod pool;
mod quads;
mod schema;
mod space;
mod terms;
mod transaction;

pub use bulk::{BulkLoadStats, ImportSession, PublishMode};
pub use datatypes::CacheStats;
pub use engine::BedrockEngine;
pub use graphs::{CountUpdate, GraphRecord};
pub use namespaces::NamespaceRecord;
pub use pattern::{ContextIter, QuadMatch, QuadStream};
pub use pool::{PoolStats, PoolUsage};
pub use schema::SpaceSchema;
pub use transaction::{SpaceTransaction, TransactionStats};
