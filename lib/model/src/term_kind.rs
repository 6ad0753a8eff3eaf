use crate::TermModelError;
use std::fmt;

/// The storage classification of an RDF term.
///
/// The single-character codes are what the `term_kind` column stores.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TermKind {
    /// A URI / IRI reference (`U`).
    Uri,
    /// A literal, possibly language-tagged or datatyped (`L`).
    Literal,
    /// A blank node (`B`).
    Blank,
    /// A named-graph identifier (`G`).
    Graph,
}

impl TermKind {
    /// Returns the single-character column code for this kind.
    pub fn as_char(self) -> char {
        match self {
            TermKind::Uri => 'U',
            TermKind::Literal => 'L',
            TermKind::Blank => 'B',
            TermKind::Graph => 'G',
        }
    }

    /// Returns the code as a one-character string slice for SQL parameters.
    pub fn as_str(self) -> &'static str {
        match self {
            TermKind::Uri => "U",
            TermKind::Literal => "L",
            TermKind::Blank => "B",
            TermKind::Graph => "G",
        }
    }

    /// Parses a column code back into a [TermKind].
    pub fn from_char(code: char) -> Result<Self, TermModelError> {
        match code {
            'U' => Ok(TermKind::Uri),
            'L' => Ok(TermKind::Literal),
            'B' => Ok(TermKind::Blank),
            'G' => Ok(TermKind::Graph),
            other => Err(TermModelError::UnknownKind(other)),
        }
    }

    /// Parses the first character of a column value.
    pub fn from_code(code: &str) -> Result<Self, TermModelError> {
        let first = code.chars().next().unwrap_or('\0');
        Self::from_char(first)
    }
}

impl fmt::Display for TermKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for kind in [TermKind::Uri, TermKind::Literal, TermKind::Blank, TermKind::Graph] {
            assert_eq!(TermKind::from_char(kind.as_char()).unwrap(), kind);
            assert_eq!(TermKind::from_code(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert!(TermKind::from_char('X').is_err());
        assert!(TermKind::from_code("").is_err());
    }
}
