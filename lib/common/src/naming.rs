use crate::{StorageError, StorageResult};

/// PostgreSQL truncates identifiers beyond this many bytes, which silently
/// collides generated index names. Validation keeps every generated name
/// under the limit instead.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Name suffix applied to every per-space table when the space is created
/// with unlogged tables.
const UNLOGGED_SUFFIX: &str = "_unlogged";

/// The longest index-name suffix the schema generates (on the term table).
const LONGEST_INDEX_SUFFIX: &str = "_term_text_gist_trgm";

fn is_valid_identifier_part(value: &str) -> bool {
    !value.is_empty()
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Validates the global table prefix shared by all spaces.
pub fn validate_global_prefix(global_prefix: &str) -> StorageResult<()> {
    if !is_valid_identifier_part(global_prefix) {
        return Err(StorageError::validation(
            "Global prefix must be a non-empty string of alphanumeric characters, hyphens and underscores",
        ));
    }
    if global_prefix.contains("__") {
        return Err(StorageError::validation(
            "Global prefix cannot contain double underscores '__'",
        ));
    }
    if !global_prefix.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return Err(StorageError::validation(
            "Global prefix must start with a letter",
        ));
    }
    Ok(())
}

/// Validates a space id against the naming grammar and the identifier-length
/// limit for `global_prefix`.
///
/// The double-underscore ban keeps `{prefix}__{space}__{base}` parseable; the
/// length bound guarantees the longest generated index name
/// (`idx_{prefix}__{space}___unlogged_term_text_gist_trgm` in the worst case)
/// still fits the backend's identifier limit.
pub fn validate_space_id(global_prefix: &str, space_id: &str) -> StorageResult<()> {
    validate_global_prefix(global_prefix)?;
    if !is_valid_identifier_part(space_id) {
        return Err(StorageError::validation(
            "Space ID must be a non-empty string of alphanumeric characters, hyphens and underscores",
        ));
    }
    if space_id.contains("__") {
        return Err(StorageError::validation(
            "Space ID cannot contain double underscores '__'",
        ));
    }

    // "idx_" + "{prefix}__{space}__" + "_unlogged" + longest index suffix
    let fixed = "idx_".len()
        + global_prefix.len()
        + "__".len()
        + "__".len()
        + UNLOGGED_SUFFIX.len()
        + LONGEST_INDEX_SUFFIX.len();
    let max_space_id_len = MAX_IDENTIFIER_LEN.saturating_sub(fixed);
    if space_id.len() > max_space_id_len {
        return Err(StorageError::Validation(format!(
            "Space ID '{space_id}' is too long ({} characters). Maximum length is \
             {max_space_id_len} characters so that generated index names stay within \
             the backend's {MAX_IDENTIFIER_LEN}-character identifier limit.",
            space_id.len(),
        )));
    }
    Ok(())
}

/// The per-space table set: `{global_prefix}__{space_id}__{base}` with an
/// optional `_unlogged` suffix on every table.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SpaceTables {
    global_prefix: String,
    space_id: String,
    unlogged: bool,
    term: String,
    rdf_quad: String,
    namespace: String,
    graph: String,
    datatype: String,
}

impl SpaceTables {
    pub fn new(
        global_prefix: impl Into<String>,
        space_id: impl Into<String>,
        unlogged: bool,
    ) -> StorageResult<Self> {
        let global_prefix = global_prefix.into();
        let space_id = space_id.into();
        validate_space_id(&global_prefix, &space_id)?;

        let suffix = if unlogged { UNLOGGED_SUFFIX } else { "" };
        let base = |name: &str| format!("{global_prefix}__{space_id}__{name}{suffix}");
        Ok(Self {
            term: base("term"),
            rdf_quad: base("rdf_quad"),
            namespace: base("namespace"),
            graph: base("graph"),
            datatype: base("datatype"),
            global_prefix,
            space_id,
            unlogged,
        })
    }

    pub fn global_prefix(&self) -> &str {
        &self.global_prefix
    }

    pub fn space_id(&self) -> &str {
        &self.space_id
    }

    pub fn unlogged(&self) -> bool {
        self.unlogged
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn rdf_quad(&self) -> &str {
        &self.rdf_quad
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn graph(&self) -> &str {
        &self.graph
    }

    pub fn datatype(&self) -> &str {
        &self.datatype
    }

    /// The list partition of `table` holding live (non-import) rows.
    pub fn primary_partition(table: &str) -> String {
        format!("{table}_primary")
    }

    /// Tables in creation dependency order.
    pub fn in_create_order(&self) -> [&str; 5] {
        [
            self.datatype(),
            self.term(),
            self.rdf_quad(),
            self.namespace(),
            self.graph(),
        ]
    }

    /// Tables in drop order (reverse of creation).
    pub fn in_drop_order(&self) -> [&str; 5] {
        [
            self.graph(),
            self.namespace(),
            self.rdf_quad(),
            self.term(),
            self.datatype(),
        ]
    }

    /// Generates an index name for this space, e.g. `index_name("quad_subject")`.
    pub fn index_name(&self, suffix: &str) -> String {
        let unlogged = if self.unlogged { UNLOGGED_SUFFIX } else { "" };
        format!(
            "idx_{}__{}__{}_{suffix}",
            self.global_prefix, self.space_id, unlogged
        )
    }

    /// The `LIKE` pattern matching every quad table under `global_prefix`,
    /// used by space listing.
    pub fn quad_table_pattern(global_prefix: &str, unlogged: bool) -> String {
        let suffix = if unlogged { UNLOGGED_SUFFIX } else { "" };
        format!("{global_prefix}\\_\\_%\\_\\_rdf\\_quad{suffix}")
    }

    /// Extracts the space id out of a quad table name, if it has the expected
    /// shape.
    pub fn space_id_from_quad_table(global_prefix: &str, table: &str) -> Option<String> {
        let rest = table.strip_prefix(global_prefix)?.strip_prefix("__")?;
        let rest = rest
            .strip_suffix(UNLOGGED_SUFFIX)
            .unwrap_or(rest);
        let space_id = rest.strip_suffix("rdf_quad")?.strip_suffix("__")?;
        if space_id.is_empty() {
            None
        } else {
            Some(space_id.to_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_follow_the_grammar() {
        let tables = SpaceTables::new("bedrock", "sales", false).unwrap();
        assert_eq!(tables.term(), "bedrock__sales__term");
        assert_eq!(tables.rdf_quad(), "bedrock__sales__rdf_quad");
        assert_eq!(tables.datatype(), "bedrock__sales__datatype");
        assert_eq!(tables.graph(), "bedrock__sales__graph");
        assert_eq!(tables.namespace(), "bedrock__sales__namespace");
    }

    #[test]
    fn unlogged_suffix_is_applied() {
        let tables = SpaceTables::new("bedrock", "sales", true).unwrap();
        assert_eq!(tables.term(), "bedrock__sales__term_unlogged");
    }

    #[test]
    fn index_names_fit_the_identifier_limit() {
        let longest_space = "a".repeat(26 - "bedrock".len());
        let tables = SpaceTables::new("bedrock", longest_space, true).unwrap();
        let name = tables.index_name("term_text_gist_trgm");
        assert!(name.len() <= MAX_IDENTIFIER_LEN, "{name} is too long");
    }

    #[test]
    fn over_long_space_id_is_rejected() {
        let too_long = "a".repeat(40);
        let error = SpaceTables::new("bedrock", too_long, false).unwrap_err();
        assert!(error.to_string().contains("too long"));
    }

    #[test]
    fn double_underscores_are_rejected() {
        assert!(validate_space_id("bedrock", "bad__space").is_err());
        assert!(validate_global_prefix("bad__prefix").is_err());
    }

    #[test]
    fn invalid_characters_are_rejected() {
        assert!(validate_space_id("bedrock", "space;drop").is_err());
        assert!(validate_space_id("bedrock", "").is_err());
        assert!(validate_space_id("bedrock", "ok-space_1").is_ok());
    }

    #[test]
    fn space_id_round_trips_through_quad_table_name() {
        let tables = SpaceTables::new("bedrock", "sales", false).unwrap();
        assert_eq!(
            SpaceTables::space_id_from_quad_table("bedrock", tables.rdf_quad()),
            Some("sales".to_owned())
        );
        let tables = SpaceTables::new("bedrock", "sales", true).unwrap();
        assert_eq!(
            SpaceTables::space_id_from_quad_table("bedrock", tables.rdf_quad()),
            Some("sales".to_owned())
        );
        assert_eq!(
            SpaceTables::space_id_from_quad_table("bedrock", "bedrock__x__term"),
            None
        );
    }
}
