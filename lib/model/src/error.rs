/// An error raised when converting between stored rows and RDF terms.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TermModelError {
    /// The stored `term_kind` column contains an unknown code.
    #[error("unknown term kind code '{0}'")]
    UnknownKind(char),
    /// The stored text is not a valid IRI or blank node identifier.
    #[error("stored term text is not a valid {kind}: {text}")]
    MalformedTerm { kind: &'static str, text: String },
    /// A regex pattern failed to compile.
    #[error(transparent)]
    Regex(#[from] regex::Error),
}
