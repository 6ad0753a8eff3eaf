use crate::identity::term_uuid;
use crate::{TermKind, TermModelError};
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use oxrdf::vocab::xsd;
use oxrdf::{BlankNode, GraphName, GraphNameRef, Literal, NamedNode, Term, TermRef};
use uuid::Uuid;

/// The sentinel graph URI used when a quad is written without an explicit
/// named graph. The default graph is addressable under this name.
pub const DEFAULT_GRAPH_URI: &str = "urn:___GLOBAL";

/// The row-shaped encoding of an RDF term: exactly the fields the term table
/// stores, with the datatype still in URI form (the storage layer swaps it
/// for a `datatype_id` before writing).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct TermValue {
    /// Lexical form: the IRI, the blank node identifier, or the literal value.
    pub text: String,
    pub kind: TermKind,
    /// Language tag, only ever present on literals.
    pub lang: Option<String>,
    /// Datatype URI, only ever present on literals without a language tag.
    pub datatype: Option<String>,
}

impl TermValue {
    /// Encodes an RDF term into its row fields.
    ///
    /// A language-tagged literal is `rdf:langString` by definition, so the
    /// language wins and no datatype is recorded for it.
    pub fn encode(term: TermRef<'_>) -> Self {
        match term {
            TermRef::NamedNode(node) => Self {
                text: node.as_str().to_owned(),
                kind: TermKind::Uri,
                lang: None,
                datatype: None,
            },
            TermRef::BlankNode(node) => Self {
                text: node.as_str().to_owned(),
                kind: TermKind::Blank,
                lang: None,
                datatype: None,
            },
            TermRef::Literal(literal) => match literal.language() {
                Some(lang) => Self {
                    text: literal.value().to_owned(),
                    kind: TermKind::Literal,
                    lang: Some(lang.to_owned()),
                    datatype: None,
                },
                None => Self {
                    text: literal.value().to_owned(),
                    kind: TermKind::Literal,
                    lang: None,
                    datatype: Some(literal.datatype().as_str().to_owned()),
                },
            },
        }
    }

    /// Encodes a graph name into its row fields. The default graph is stored
    /// under [DEFAULT_GRAPH_URI].
    pub fn encode_graph(graph: GraphNameRef<'_>) -> Self {
        match graph {
            GraphNameRef::NamedNode(node) => Self {
                text: node.as_str().to_owned(),
                kind: TermKind::Uri,
                lang: None,
                datatype: None,
            },
            GraphNameRef::BlankNode(node) => Self {
                text: node.as_str().to_owned(),
                kind: TermKind::Blank,
                lang: None,
                datatype: None,
            },
            GraphNameRef::DefaultGraph => Self {
                text: DEFAULT_GRAPH_URI.to_owned(),
                kind: TermKind::Uri,
                lang: None,
                datatype: None,
            },
        }
    }

    /// Assigns the deterministic term UUID for this value, given the resolved
    /// datatype id (if any).
    pub fn uuid_with(&self, datatype_id: Option<i64>) -> Uuid {
        term_uuid(&self.text, self.kind, self.lang.as_deref(), datatype_id)
    }
}

/// Decodes stored row fields back into an RDF term.
///
/// The inverse of [TermValue::encode]; `datatype` carries the URI resolved
/// from the stored `datatype_id`.
pub fn decode_term(
    text: &str,
    kind: TermKind,
    lang: Option<&str>,
    datatype: Option<&str>,
) -> Result<Term, TermModelError> {
    match kind {
        TermKind::Uri | TermKind::Graph => {
            let node = NamedNode::new(text).map_err(|_| TermModelError::MalformedTerm {
                kind: "IRI",
                text: text.to_owned(),
            })?;
            Ok(Term::NamedNode(node))
        }
        TermKind::Blank => {
            let node = BlankNode::new(text).map_err(|_| TermModelError::MalformedTerm {
                kind: "blank node identifier",
                text: text.to_owned(),
            })?;
            Ok(Term::BlankNode(node))
        }
        TermKind::Literal => {
            let literal = if let Some(lang) = lang {
                Literal::new_language_tagged_literal(text, lang).map_err(|_| {
                    TermModelError::MalformedTerm {
                        kind: "language tag",
                        text: lang.to_owned(),
                    }
                })?
            } else if let Some(datatype) = datatype {
                let datatype =
                    NamedNode::new(datatype).map_err(|_| TermModelError::MalformedTerm {
                        kind: "datatype IRI",
                        text: datatype.to_owned(),
                    })?;
                Literal::new_typed_literal(text, datatype)
            } else {
                Literal::new_simple_literal(text)
            };
            Ok(Term::Literal(literal))
        }
    }
}

/// Decodes the context position of a quad row into a graph name.
pub fn decode_graph_name(text: &str, kind: TermKind) -> Result<GraphName, TermModelError> {
    match kind {
        TermKind::Blank => {
            let node = BlankNode::new(text).map_err(|_| TermModelError::MalformedTerm {
                kind: "blank node identifier",
                text: text.to_owned(),
            })?;
            Ok(GraphName::BlankNode(node))
        }
        _ => {
            let node = NamedNode::new(text).map_err(|_| TermModelError::MalformedTerm {
                kind: "IRI",
                text: text.to_owned(),
            })?;
            Ok(GraphName::NamedNode(node))
        }
    }
}

/// Builds an `xsd:dateTime` literal from a native timestamp.
pub fn literal_from_datetime(value: &DateTime<Utc>) -> Literal {
    Literal::new_typed_literal(
        value.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        xsd::DATE_TIME,
    )
}

/// Builds an `xsd:base64Binary` literal from raw bytes.
pub fn literal_from_bytes(value: &[u8]) -> Literal {
    Literal::new_typed_literal(
        base64::engine::general_purpose::STANDARD.encode(value),
        xsd::BASE_64_BINARY,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::vocab::xsd;

    #[test]
    fn encode_named_node() {
        let node = NamedNode::new("http://example.org/alice").unwrap();
        let value = TermValue::encode(node.as_ref().into());
        assert_eq!(value.text, "http://example.org/alice");
        assert_eq!(value.kind, TermKind::Uri);
        assert_eq!(value.lang, None);
        assert_eq!(value.datatype, None);
    }

    #[test]
    fn encode_language_literal_drops_datatype() {
        let literal = Literal::new_language_tagged_literal("Alice", "en").unwrap();
        let value = TermValue::encode(literal.as_ref().into());
        assert_eq!(value.kind, TermKind::Literal);
        assert_eq!(value.lang.as_deref(), Some("en"));
        assert_eq!(value.datatype, None);
    }

    #[test]
    fn encode_typed_literal() {
        let literal = Literal::new_typed_literal("30", xsd::INTEGER);
        let value = TermValue::encode(literal.as_ref().into());
        assert_eq!(value.text, "30");
        assert_eq!(
            value.datatype.as_deref(),
            Some("http://www.w3.org/2001/XMLSchema#integer")
        );
    }

    #[test]
    fn round_trip_terms() {
        let terms: Vec<Term> = vec![
            NamedNode::new("http://example.org/alice").unwrap().into(),
            BlankNode::new("b0").unwrap().into(),
            Literal::new_simple_literal("plain").into(),
            Literal::new_language_tagged_literal("Alice", "fr").unwrap().into(),
            Literal::new_typed_literal("30", xsd::INTEGER).into(),
        ];
        for term in terms {
            let value = TermValue::encode(term.as_ref());
            let decoded = decode_term(
                &value.text,
                value.kind,
                value.lang.as_deref(),
                value.datatype.as_deref(),
            )
            .unwrap();
            assert_eq!(decoded, term);
        }
    }

    #[test]
    fn default_graph_uses_sentinel_uri() {
        let value = TermValue::encode_graph(GraphNameRef::DefaultGraph);
        assert_eq!(value.text, DEFAULT_GRAPH_URI);
        assert_eq!(value.kind, TermKind::Uri);
    }

    #[test]
    fn scalar_literals_infer_xsd_datatypes() {
        assert_eq!(Literal::from(true).datatype(), xsd::BOOLEAN);
        assert_eq!(Literal::from(42_i64).datatype(), xsd::INTEGER);
        assert_eq!(Literal::from(1.5_f64).datatype(), xsd::DOUBLE);
        assert_eq!(literal_from_bytes(b"\x01\x02").datatype(), xsd::BASE_64_BINARY);
        let now = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(literal_from_datetime(&now).datatype(), xsd::DATE_TIME);
    }
}
