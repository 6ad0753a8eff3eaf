use crate::engine::BedrockEngine;
use deadpool_postgres::Object;
use futures::Stream;
use rdf_bedrock_common::{SpaceTables, StorageError, StorageResult};
use rdf_bedrock_model::{
    decode_graph_name, GraphName, Quad, QuadPattern, Subject, Term, TermKind, TermPattern,
};
use std::collections::VecDeque;
use uuid::Uuid;

/// One pattern-match result: the quad plus a one-shot iterator over its
/// context, matching the convention of RDF library triple iterators.
#[derive(Debug)]
pub struct QuadMatch {
    pub quad: Quad,
    pub contexts: ContextIter,
}

/// Yields the matched quad's context exactly once.
#[derive(Debug)]
pub struct ContextIter(Option<GraphName>);

impl Iterator for ContextIter {
    type Item = GraphName;

    fn next(&mut self) -> Option<GraphName> {
        self.0.take()
    }
}

/// Builds the four-join pattern statement and its parameters.
///
/// Each bound position constrains its term-table alias on text and kind (and
/// language where the bound term carries one); regex positions use the
/// backend's `~` operator on `term_text`, which the trigram indexes
/// accelerate for many patterns.
fn build_pattern_sql(tables: &SpaceTables, pattern: &QuadPattern) -> (String, Vec<String>) {
    let quad = tables.rdf_quad();
    let term = tables.term();
    let mut sql = format!(
        "SELECT \
         s_term.term_text AS subject_text, s_term.term_kind AS subject_kind, \
         s_term.lang AS subject_lang, s_term.datatype_id AS subject_datatype_id, \
         p_term.term_text AS predicate_text, p_term.term_kind AS predicate_kind, \
         o_term.term_text AS object_text, o_term.term_kind AS object_kind, \
         o_term.lang AS object_lang, o_term.datatype_id AS object_datatype_id, \
         c_term.term_text AS context_text, c_term.term_kind AS context_kind \
         FROM {quad} quad \
         JOIN {term} s_term ON quad.subject_uuid = s_term.term_uuid \
         JOIN {term} p_term ON quad.predicate_uuid = p_term.term_uuid \
         JOIN {term} o_term ON quad.object_uuid = o_term.term_uuid \
         JOIN {term} c_term ON quad.context_uuid = c_term.term_uuid"
    );

    let mut conditions: Vec<String> = Vec::new();
    let mut params: Vec<String> = Vec::new();
    let positions = [
        ("s_term", &pattern.subject),
        ("p_term", &pattern.predicate),
        ("o_term", &pattern.object),
        ("c_term", &pattern.graph),
    ];
    for (alias, position) in positions {
        match position {
            TermPattern::Any => {}
            TermPattern::Regex(regex) => {
                params.push(regex.pattern().to_owned());
                conditions.push(format!("({alias}.term_text ~ ${})", params.len()));
            }
            TermPattern::Term(term) => {
                let value = rdf_bedrock_model::TermValue::encode(term.as_ref());
                params.push(value.text);
                let text_param = params.len();
                params.push(value.kind.as_str().to_owned());
                let kind_param = params.len();
                let mut condition = format!(
                    "({alias}.term_text = ${text_param} AND {alias}.term_kind = ${kind_param}"
                );
                if let Some(lang) = value.lang {
                    params.push(lang);
                    condition.push_str(&format!(" AND {alias}.lang = ${}", params.len()));
                }
                condition.push(')');
                conditions.push(condition);
            }
        }
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    (sql, params)
}

/// A streaming pattern-match result set backed by a server-side cursor.
///
/// Rows are fetched in pages of `fetch_page_size`; the cursor and its
/// enclosing transaction are released deterministically on exhaustion or
/// [QuadStream::close], and a dropped stream rolls its connection back in the
/// background so it never returns to the pool mid-transaction.
pub struct QuadStream {
    engine: BedrockEngine,
    space_id: String,
    conn: Option<Object>,
    cursor: String,
    page_size: usize,
    buffer: VecDeque<tokio_postgres::Row>,
    exhausted: bool,
}

impl BedrockEngine {
    /// Opens a streaming iterator over every quad matching `pattern`.
    pub async fn match_quads(
        &self,
        space_id: &str,
        pattern: &QuadPattern,
    ) -> StorageResult<QuadStream> {
        let tables = self.tables_for(space_id)?;
        let (sql, params) = build_pattern_sql(&tables, pattern);
        let cursor = format!("quads_cursor_{}", &Uuid::new_v4().simple().to_string()[..8]);

        let conn = self.read_conn().await?;
        conn.batch_execute("BEGIN")
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?;
        let declare = format!("DECLARE {cursor} CURSOR FOR {sql}");
        let param_refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> =
            params.iter().map(|p| p as _).collect();
        if let Err(error) = conn.execute(declare.as_str(), &param_refs).await {
            // Leave the connection clean before it returns to the pool.
            let _ = conn.batch_execute("ROLLBACK").await;
            return Err(StorageError::for_space(space_id, error));
        }
        tracing::debug!(space_id, cursor = cursor.as_str(), "pattern cursor declared");

        Ok(QuadStream {
            engine: self.clone(),
            space_id: space_id.to_owned(),
            conn: Some(conn),
            cursor,
            page_size: self.config().fetch_page_size.max(1),
            buffer: VecDeque::new(),
            exhausted: false,
        })
    }

    /// Number of quads in the space, optionally restricted to the graph term
    /// identified by `context_uuid`.
    pub async fn count_quads(
        &self,
        space_id: &str,
        context_uuid: Option<Uuid>,
    ) -> StorageResult<u64> {
        let tables = self.tables_for(space_id)?;
        let conn = self.read_conn().await?;
        let row = match context_uuid {
            Some(context) => {
                let sql = format!(
                    "SELECT COUNT(*) FROM {} WHERE context_uuid = $1",
                    tables.rdf_quad()
                );
                conn.query_one(sql.as_str(), &[&context]).await
            }
            None => {
                let sql = format!("SELECT COUNT(*) FROM {}", tables.rdf_quad());
                conn.query_one(sql.as_str(), &[]).await
            }
        }
        .map_err(|e| StorageError::for_space(space_id, e))?;
        let count: i64 = row.get(0);
        Ok(count.unsigned_abs())
    }

    /// [BedrockEngine::count_quads] with the graph given by URI; `None`
    /// counts the whole space.
    pub async fn count_quads_by_graph_uri(
        &self,
        space_id: &str,
        graph_uri: Option<&str>,
    ) -> StorageResult<u64> {
        let context =
            graph_uri.map(|uri| rdf_bedrock_model::term_uuid(uri, TermKind::Uri, None, None));
        self.count_quads(space_id, context).await
    }
}

impl QuadStream {
    /// Fetches the next matching quad, or `None` once the cursor is
    /// exhausted (at which point the cursor is already closed).
    pub async fn next(&mut self) -> Option<StorageResult<QuadMatch>> {
        loop {
            if let Some(row) = self.buffer.pop_front() {
                return Some(self.decode_row(&row).await);
            }
            if self.exhausted {
                return None;
            }
            match self.fetch_page().await {
                Ok(()) => {}
                Err(error) => {
                    self.exhausted = true;
                    return Some(Err(error));
                }
            }
            if self.buffer.is_empty() {
                self.exhausted = true;
                if let Err(error) = self.close().await {
                    return Some(Err(error));
                }
                return None;
            }
        }
    }

    async fn fetch_page(&mut self) -> StorageResult<()> {
        let conn = self.conn.as_ref().ok_or_else(|| {
            StorageError::other("pattern cursor already closed")
        })?;
        let fetch = format!("FETCH FORWARD {} FROM {}", self.page_size, self.cursor);
        let rows = conn
            .query(fetch.as_str(), &[])
            .await
            .map_err(StorageError::Backend)?;
        self.buffer.extend(rows);
        Ok(())
    }

    async fn decode_row(&self, row: &tokio_postgres::Row) -> StorageResult<QuadMatch> {
        let engine = &self.engine;
        let space_id = &self.space_id;

        let subject_text: &str = row.try_get("subject_text")?;
        let subject_kind: &str = row.try_get("subject_kind")?;
        let subject_lang: Option<&str> = row.try_get("subject_lang")?;
        let subject_datatype: Option<i64> = row.try_get("subject_datatype_id")?;
        let subject = engine
            .decode_term_row(space_id, subject_text, subject_kind, subject_lang, subject_datatype)
            .await?;
        let subject = match subject {
            Term::NamedNode(node) => Subject::from(node),
            Term::BlankNode(node) => Subject::from(node),
            Term::Literal(_) => {
                return Err(StorageError::other("literal stored in subject position"));
            }
        };

        let predicate_text: &str = row.try_get("predicate_text")?;
        let predicate_kind: &str = row.try_get("predicate_kind")?;
        let predicate = engine
            .decode_term_row(space_id, predicate_text, predicate_kind, None, None)
            .await?;
        let Term::NamedNode(predicate) = predicate else {
            return Err(StorageError::other("non-IRI stored in predicate position"));
        };

        let object_text: &str = row.try_get("object_text")?;
        let object_kind: &str = row.try_get("object_kind")?;
        let object_lang: Option<&str> = row.try_get("object_lang")?;
        let object_datatype: Option<i64> = row.try_get("object_datatype_id")?;
        let object = engine
            .decode_term_row(space_id, object_text, object_kind, object_lang, object_datatype)
            .await?;

        let context_text: &str = row.try_get("context_text")?;
        let context_kind: &str = row.try_get("context_kind")?;
        let graph = decode_graph_name(context_text, TermKind::from_code(context_kind)?)?;

        let quad = Quad::new(subject, predicate, object, graph.clone());
        Ok(QuadMatch {
            quad,
            contexts: ContextIter(Some(graph)),
        })
    }

    /// Closes the cursor and ends the read transaction, returning the
    /// connection to the pool. Safe to call more than once.
    pub async fn close(&mut self) -> StorageResult<()> {
        if let Some(conn) = self.conn.take() {
            let end = format!("CLOSE {}; COMMIT", self.cursor);
            conn.batch_execute(end.as_str())
                .await
                .map_err(StorageError::Backend)?;
            tracing::debug!(cursor = self.cursor.as_str(), "pattern cursor closed");
        }
        Ok(())
    }

    /// Adapts the iterator into a [futures] stream.
    pub fn into_stream(self) -> impl Stream<Item = StorageResult<QuadMatch>> {
        futures::stream::unfold(self, |mut quads| async move {
            quads.next().await.map(|item| (item, quads))
        })
    }
}

impl Drop for QuadStream {
    fn drop(&mut self) {
        // Early termination: the transaction is still open on the pooled
        // connection, so roll it back before the pool can hand it out again.
        if let Some(conn) = self.conn.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(error) = conn.batch_execute("ROLLBACK").await {
                        tracing::warn!(%error, "rollback of abandoned pattern cursor failed");
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdf_bedrock_model::{Literal, NamedNode, RegexTerm};

    fn tables() -> SpaceTables {
        SpaceTables::new("bedrock", "s1", false).unwrap()
    }

    #[test]
    fn unbound_pattern_has_no_where_clause() {
        let (sql, params) = build_pattern_sql(&tables(), &QuadPattern::any());
        assert!(!sql.contains("WHERE"));
        assert!(params.is_empty());
        assert!(sql.contains("JOIN bedrock__s1__term s_term"));
        assert!(sql.contains("JOIN bedrock__s1__term c_term"));
    }

    #[test]
    fn bound_subject_constrains_text_and_kind() {
        let pattern = QuadPattern::any()
            .with_subject(Term::from(NamedNode::new("http://ex/alice").unwrap()));
        let (sql, params) = build_pattern_sql(&tables(), &pattern);
        assert!(sql.contains("s_term.term_text = $1 AND s_term.term_kind = $2"));
        assert_eq!(params, vec!["http://ex/alice".to_owned(), "U".to_owned()]);
    }

    #[test]
    fn language_literal_adds_lang_constraint() {
        let literal = Literal::new_language_tagged_literal("Alice", "en").unwrap();
        let pattern = QuadPattern::any().with_object(Term::from(literal));
        let (sql, params) = build_pattern_sql(&tables(), &pattern);
        assert!(sql.contains("o_term.lang = $3"));
        assert_eq!(params, vec!["Alice".to_owned(), "L".to_owned(), "en".to_owned()]);
    }

    #[test]
    fn regex_positions_use_the_regex_operator() {
        let pattern = QuadPattern::any()
            .with_subject(RegexTerm::new("^http://ex/[ab]").unwrap())
            .with_predicate(Term::from(NamedNode::new("http://ex/name").unwrap()));
        let (sql, params) = build_pattern_sql(&tables(), &pattern);
        assert!(sql.contains("s_term.term_text ~ $1"));
        assert!(sql.contains("p_term.term_text = $2"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn parameters_number_sequentially_across_positions() {
        let pattern = QuadPattern::any()
            .with_subject(Term::from(NamedNode::new("http://ex/alice").unwrap()))
            .with_graph(Term::from(NamedNode::new("http://ex/g").unwrap()));
        let (sql, params) = build_pattern_sql(&tables(), &pattern);
        assert!(sql.contains("c_term.term_text = $3 AND c_term.term_kind = $4"));
        assert_eq!(params.len(), 4);
    }
}
