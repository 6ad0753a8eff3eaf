use crate::{TermModelError, TermValue};
use oxrdf::{GraphNameRef, NamedNode, Term, TermRef};
use regex::Regex;
use std::fmt;

/// A term-shaped pattern element requesting backend-side regex matching on
/// `term_text` instead of equality.
///
/// The pattern is compiled eagerly so that an invalid expression fails at
/// construction time rather than in the middle of a streaming query, and so
/// that callers can also match candidate text locally.
#[derive(Clone, Debug)]
pub struct RegexTerm {
    pattern: String,
    regex: Regex,
}

impl RegexTerm {
    /// Compiles `pattern` into a regex term.
    pub fn new(pattern: impl Into<String>) -> Result<Self, TermModelError> {
        let pattern = pattern.into();
        let regex = Regex::new(&pattern)?;
        Ok(Self { pattern, regex })
    }

    /// The pattern string sent to the backend's `~` operator.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Matches `text` against the compiled pattern locally.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for RegexTerm {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for RegexTerm {}

impl fmt::Display for RegexTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "~/{}/", self.pattern)
    }
}

/// One position of a quad pattern.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub enum TermPattern {
    /// Unbound: no constraint on this position.
    #[default]
    Any,
    /// A concrete term: equality constraint on text, kind and language.
    Term(Term),
    /// Backend-side regex match on the term text.
    Regex(RegexTerm),
}

impl TermPattern {
    pub fn is_bound(&self) -> bool {
        !matches!(self, TermPattern::Any)
    }

    /// The row-field encoding of a bound concrete term, if this is one.
    pub fn as_term_value(&self) -> Option<TermValue> {
        match self {
            TermPattern::Term(term) => Some(TermValue::encode(term.as_ref())),
            _ => None,
        }
    }
}

impl From<Term> for TermPattern {
    fn from(term: Term) -> Self {
        TermPattern::Term(term)
    }
}

impl From<TermRef<'_>> for TermPattern {
    fn from(term: TermRef<'_>) -> Self {
        TermPattern::Term(term.into_owned())
    }
}

impl From<RegexTerm> for TermPattern {
    fn from(regex: RegexTerm) -> Self {
        TermPattern::Regex(regex)
    }
}

impl From<Option<Term>> for TermPattern {
    fn from(term: Option<Term>) -> Self {
        term.map_or(TermPattern::Any, TermPattern::Term)
    }
}

/// Converts a concrete graph name into the equality pattern its context row
/// matches. The default graph binds to its sentinel URI term.
pub fn graph_pattern(graph: GraphNameRef<'_>) -> TermPattern {
    let value = TermValue::encode_graph(graph);
    match crate::decode_term(&value.text, value.kind, None, None) {
        Ok(term) => TermPattern::Term(term),
        // Graph names always encode as IRIs or blank node ids.
        Err(_) => TermPattern::Term(Term::NamedNode(NamedNode::new_unchecked(value.text))),
    }
}

/// A four-position quad pattern for the streaming iterator.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct QuadPattern {
    pub subject: TermPattern,
    pub predicate: TermPattern,
    pub object: TermPattern,
    pub graph: TermPattern,
}

impl QuadPattern {
    /// A fully unbound pattern matching every quad.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_subject(mut self, subject: impl Into<TermPattern>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_predicate(mut self, predicate: impl Into<TermPattern>) -> Self {
        self.predicate = predicate.into();
        self
    }

    pub fn with_object(mut self, object: impl Into<TermPattern>) -> Self {
        self.object = object.into();
        self
    }

    pub fn with_graph(mut self, graph: impl Into<TermPattern>) -> Self {
        self.graph = graph.into();
        self
    }

    /// Binds the graph position to a concrete graph name.
    pub fn in_graph(mut self, graph: GraphNameRef<'_>) -> Self {
        self.graph = graph_pattern(graph);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::NamedNode;

    #[test]
    fn regex_term_compiles_and_matches() {
        let term = RegexTerm::new("^http://ex/[ab]").unwrap();
        assert!(term.is_match("http://ex/alice"));
        assert!(term.is_match("http://ex/bob"));
        assert!(!term.is_match("http://ex/carol"));
        assert_eq!(term.pattern(), "^http://ex/[ab]");
    }

    #[test]
    fn invalid_regex_is_rejected() {
        assert!(RegexTerm::new("(unclosed").is_err());
    }

    #[test]
    fn builder_binds_positions() {
        let subject: Term = NamedNode::new("http://ex/alice").unwrap().into();
        let pattern = QuadPattern::any()
            .with_subject(subject.clone())
            .with_object(RegexTerm::new("X").unwrap());
        assert_eq!(pattern.subject, TermPattern::Term(subject));
        assert!(pattern.predicate == TermPattern::Any);
        assert!(matches!(pattern.object, TermPattern::Regex(_)));
    }

    #[test]
    fn default_graph_binds_to_sentinel() {
        let pattern = QuadPattern::any().in_graph(GraphNameRef::DefaultGraph);
        match pattern.graph {
            TermPattern::Term(Term::NamedNode(node)) => {
                assert_eq!(node.as_str(), crate::DEFAULT_GRAPH_URI);
            }
            other => panic!("unexpected pattern: {other:?}"),
        }
    }
}
