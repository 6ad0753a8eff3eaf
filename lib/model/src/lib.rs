#![doc(test(attr(deny(warnings))))]

//! This crate contains the RDF Bedrock data model: term kinds, the row-shaped
//! term encoding, the deterministic term identity function, and quad patterns
//! used by the pattern iterator.
//!
//! Large portions of the available types are re-exported from
//! [Oxigraph](https://github.com/oxigraph/oxigraph)'s `oxrdf` crate.

mod datatypes;
mod error;
mod identity;
mod pattern;
mod term_kind;
mod term_value;

pub use datatypes::{StandardDatatype, STANDARD_DATATYPES};
pub use error::*;
pub use identity::{term_uuid, TERM_UUID_NAMESPACE};
pub use pattern::{graph_pattern, QuadPattern, RegexTerm, TermPattern};
pub use term_kind::TermKind;
pub use term_value::{
    decode_graph_name, decode_term, literal_from_bytes, literal_from_datetime, TermValue,
    DEFAULT_GRAPH_URI,
};

// Re-export some oxrdf types.
pub use oxrdf::vocab;
pub use oxrdf::{
    BlankNode, BlankNodeRef, GraphName, GraphNameRef, IriParseError, Literal,
    LiteralRef, NamedNode, NamedNodeRef, NamedOrBlankNode, NamedOrBlankNodeRef, Quad,
    QuadRef, Subject, SubjectRef, Term, TermParseError, TermRef, Variable,
};
