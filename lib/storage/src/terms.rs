use crate::engine::BedrockEngine;
use rdf_bedrock_common::{StorageError, StorageResult};
use rdf_bedrock_model::{decode_term, Term, TermKind, TermRef, TermValue};
use rustc_hash::{FxHashMap, FxHashSet};
use tokio_postgres::GenericClient;
use uuid::Uuid;

impl BedrockEngine {
    /// Resolves datatype ids and deterministic UUIDs for `values` and inserts
    /// the terms that are not stored yet, all in one conflict-skipped
    /// statement on `client` (a pooled connection or a transaction's
    /// connection). Returns the identity map.
    ///
    /// Idempotent: terms that already exist are skipped, which is what makes
    /// the two-phase batch writers safe to retry.
    pub(crate) async fn resolve_and_insert_terms<C: GenericClient>(
        &self,
        space_id: &str,
        client: &C,
        values: &FxHashSet<TermValue>,
    ) -> StorageResult<FxHashMap<TermValue, Uuid>> {
        let tables = self.tables_for(space_id)?;
        if values.is_empty() {
            return Ok(FxHashMap::default());
        }

        // Datatype ids resolve on their own pooled connection so the registry
        // row survives even if the caller's transaction rolls back.
        let datatype_uris: FxHashSet<String> = values
            .iter()
            .filter_map(|value| value.datatype.clone())
            .collect();
        let datatype_ids = self.resolve_datatype_ids(space_id, &datatype_uris).await?;

        let mut uuids = FxHashMap::default();
        for value in values {
            let datatype_id = value
                .datatype
                .as_deref()
                .and_then(|uri| datatype_ids.get(uri).copied());
            uuids.insert(value.clone(), value.uuid_with(datatype_id));
        }

        let mut term_uuids = Vec::with_capacity(values.len());
        let mut texts = Vec::with_capacity(values.len());
        let mut kinds = Vec::with_capacity(values.len());
        let mut langs = Vec::with_capacity(values.len());
        let mut ids = Vec::with_capacity(values.len());
        for (value, uuid) in &uuids {
            term_uuids.push(*uuid);
            texts.push(value.text.as_str());
            kinds.push(value.kind.as_str());
            langs.push(value.lang.as_deref());
            ids.push(
                value
                    .datatype
                    .as_deref()
                    .and_then(|uri| datatype_ids.get(uri).copied()),
            );
        }

        let insert = format!(
            "INSERT INTO {} (term_uuid, term_text, term_kind, lang, datatype_id) \
             SELECT * FROM UNNEST($1::uuid[], $2::text[], $3::text[], $4::varchar[], $5::bigint[]) \
             ON CONFLICT (term_uuid, dataset) DO NOTHING",
            tables.term()
        );
        client
            .execute(
                insert.as_str(),
                &[&term_uuids, &texts, &kinds, &langs, &ids],
            )
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?;
        tracing::debug!(space_id, terms = values.len(), "terms resolved and inserted");
        Ok(uuids)
    }

    /// Inserts a single term (if missing) and returns its UUID.
    pub async fn add_term(&self, space_id: &str, term: TermRef<'_>) -> StorageResult<Uuid> {
        let value = TermValue::encode(term);
        let mut values = FxHashSet::default();
        values.insert(value.clone());
        let conn = self.write_conn().await?;
        let client: &tokio_postgres::Client = &conn;
        let uuids = self
            .resolve_and_insert_terms(space_id, client, &values)
            .await?;
        uuids
            .get(&value)
            .copied()
            .ok_or_else(|| StorageError::other("term uuid missing after insert"))
    }

    /// Looks up the stored UUID of a term, without inserting it.
    pub async fn get_term_uuid(
        &self,
        space_id: &str,
        term: TermRef<'_>,
    ) -> StorageResult<Option<Uuid>> {
        let tables = self.tables_for(space_id)?;
        let value = TermValue::encode(term);
        let conn = self.read_conn().await?;
        let select = format!(
            "SELECT term_uuid FROM {} \
             WHERE term_text = $1 AND term_kind = $2 \
             AND lang IS NOT DISTINCT FROM $3 LIMIT 1",
            tables.term()
        );
        let row = conn
            .query_opt(
                select.as_str(),
                &[&value.text, &value.kind.as_str(), &value.lang],
            )
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?;
        Ok(row.map(|row| row.get(0)))
    }

    /// Batch text-based UUID lookup, used by the delete-by-subject paths.
    ///
    /// Text matching (rather than recomputing identity hashes) deliberately
    /// reflects what is stored, so rows written by older processes with a
    /// different datatype id assignment are still found.
    pub async fn batch_lookup_term_uuids(
        &self,
        space_id: &str,
        texts: &[String],
        kind: TermKind,
    ) -> StorageResult<FxHashMap<String, Vec<Uuid>>> {
        let tables = self.tables_for(space_id)?;
        if texts.is_empty() {
            return Ok(FxHashMap::default());
        }
        let conn = self.read_conn().await?;
        let select = format!(
            "SELECT term_text, term_uuid FROM {} \
             WHERE term_text = ANY($1) AND term_kind = $2",
            tables.term()
        );
        let rows = conn
            .query(select.as_str(), &[&texts, &kind.as_str()])
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?;
        let mut found: FxHashMap<String, Vec<Uuid>> = FxHashMap::default();
        for row in &rows {
            found.entry(row.get(0)).or_default().push(row.get(1));
        }
        Ok(found)
    }

    /// Decodes one stored term row back into an RDF term, resolving the
    /// datatype id through the cache.
    pub(crate) async fn decode_term_row(
        &self,
        space_id: &str,
        text: &str,
        kind_code: &str,
        lang: Option<&str>,
        datatype_id: Option<i64>,
    ) -> StorageResult<Term> {
        let kind = TermKind::from_code(kind_code)?;
        let datatype = match datatype_id {
            Some(id) => self.datatype_uri(space_id, id).await?,
            None => None,
        };
        Ok(decode_term(text, kind, lang, datatype.as_deref())?)
    }
}
