#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]

pub mod common {
    pub use rdf_bedrock_common::*;
}

pub mod model {
    pub use rdf_bedrock_model::*;
}

pub mod storage {
    pub use rdf_bedrock_storage::*;
}

// The types most hosts touch, at the crate root.
pub use rdf_bedrock_common::{BedrockConfig, SignalSink, StorageError, StorageResult};
pub use rdf_bedrock_storage::{BedrockEngine, QuadStream, SpaceTransaction};
