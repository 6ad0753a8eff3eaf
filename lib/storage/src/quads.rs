use crate::engine::BedrockEngine;
use crate::transaction::SpaceTransaction;
use rdf_bedrock_common::{StorageError, StorageResult};
use rdf_bedrock_model::{QuadRef, TermKind, TermValue};
use rustc_hash::FxHashSet;
use tokio_postgres::GenericClient;
use uuid::Uuid;

/// The four row-encoded positions of one quad, in s/p/o/c order.
fn encode_quad(quad: QuadRef<'_>) -> [TermValue; 4] {
    [
        TermValue::encode(quad.subject.into()),
        TermValue::encode(quad.predicate.into()),
        TermValue::encode(quad.object),
        TermValue::encode_graph(quad.graph_name),
    ]
}

/// Graph URIs referenced by the context positions (only URI graphs are
/// registry-backed).
fn referenced_graphs<'a>(encoded: impl Iterator<Item = &'a [TermValue; 4]>) -> FxHashSet<String> {
    encoded
        .filter(|values| values[3].kind == TermKind::Uri)
        .map(|values| values[3].text.clone())
        .collect()
}

impl BedrockEngine {
    /// Adds one quad. Duplicates are allowed; every call inserts a row.
    pub async fn add_quad(
        &self,
        space_id: &str,
        quad: QuadRef<'_>,
        tx: Option<&SpaceTransaction>,
    ) -> StorageResult<bool> {
        let owned = quad.into_owned();
        let inserted = self
            .add_quads_batch(space_id, std::slice::from_ref(&owned), tx, true, false)
            .await?;
        Ok(inserted > 0)
    }

    /// Removes at most one instance of the quad, matching the convention of
    /// RDF stores under duplicate rows. Returns `false` when any of the four
    /// terms (or the row) is not stored.
    pub async fn remove_quad(
        &self,
        space_id: &str,
        quad: QuadRef<'_>,
        tx: Option<&SpaceTransaction>,
    ) -> StorageResult<bool> {
        let tables = self.tables_for(space_id)?;
        let encoded = encode_quad(quad);

        let delete = format!(
            "DELETE FROM {quad} WHERE quad_uuid IN (\
             SELECT quad_uuid FROM {quad} \
             WHERE subject_uuid = $1 AND predicate_uuid = $2 \
             AND object_uuid = $3 AND context_uuid = $4 LIMIT 1)",
            quad = tables.rdf_quad()
        );

        let removed = match tx {
            Some(tx) => {
                let guard = tx.connection().await;
                let conn = guard.as_ref().ok_or_else(|| {
                    StorageError::Transaction("transaction already finished".to_owned())
                })?;
                let client: &tokio_postgres::Client = conn;
                let Some(uuids) = self.lookup_quad_uuids(space_id, client, &encoded).await? else {
                    return Ok(false);
                };
                client
                    .execute(
                        delete.as_str(),
                        &[&uuids[0], &uuids[1], &uuids[2], &uuids[3]],
                    )
                    .await
                    .map_err(|e| StorageError::for_space(space_id, e))?
            }
            None => {
                let conn = self.write_conn().await?;
                let client: &tokio_postgres::Client = &conn;
                let Some(uuids) = self.lookup_quad_uuids(space_id, client, &encoded).await? else {
                    return Ok(false);
                };
                client
                    .execute(
                        delete.as_str(),
                        &[&uuids[0], &uuids[1], &uuids[2], &uuids[3]],
                    )
                    .await
                    .map_err(|e| StorageError::for_space(space_id, e))?
            }
        };
        if removed > 0 {
            if let Some(tx) = tx {
                tx.record_quads_removed(removed);
            }
        }
        Ok(removed > 0)
    }

    /// Looks up the stored UUIDs of the four quad positions; `None` when any
    /// of them has never been written.
    async fn lookup_quad_uuids<C: GenericClient>(
        &self,
        space_id: &str,
        client: &C,
        encoded: &[TermValue; 4],
    ) -> StorageResult<Option<[Uuid; 4]>> {
        let tables = self.tables_for(space_id)?;
        let select = format!(
            "SELECT t.term_uuid FROM {term} t \
             LEFT JOIN {datatype} d ON t.datatype_id = d.datatype_id \
             WHERE t.term_text = $1 AND t.term_kind = $2 \
             AND t.lang IS NOT DISTINCT FROM $3 \
             AND d.datatype_uri IS NOT DISTINCT FROM $4 \
             LIMIT 1",
            term = tables.term(),
            datatype = tables.datatype()
        );
        let mut uuids = [Uuid::nil(); 4];
        for (slot, value) in uuids.iter_mut().zip(encoded.iter()) {
            let row = client
                .query_opt(
                    select.as_str(),
                    &[
                        &value.text,
                        &value.kind.as_str(),
                        &value.lang,
                        &value.datatype,
                    ],
                )
                .await
                .map_err(|e| StorageError::for_space(space_id, e))?;
            match row {
                Some(row) => *slot = row.get(0),
                None => return Ok(None),
            }
        }
        Ok(Some(uuids))
    }

    /// Two-phase batch insert: all unique terms first (conflict-skipped),
    /// then one many-row quad insert. Returns the number of quads inserted.
    ///
    /// Graphs referenced by the batch are implicitly registered. With no
    /// transaction handle, the two phases run in their own transaction which
    /// commits per `auto_commit` (passing `false` turns the call into a dry
    /// run that rolls back).
    pub async fn add_quads_batch(
        &self,
        space_id: &str,
        quads: &[rdf_bedrock_model::Quad],
        tx: Option<&SpaceTransaction>,
        auto_commit: bool,
        verify_count: bool,
    ) -> StorageResult<u64> {
        self.tables_for(space_id)?;
        if quads.is_empty() {
            return Ok(0);
        }

        let encoded: Vec<[TermValue; 4]> =
            quads.iter().map(|quad| encode_quad(quad.as_ref())).collect();
        let unique_terms: FxHashSet<TermValue> =
            encoded.iter().flat_map(|values| values.iter().cloned()).collect();

        // Register unknown graphs before any row references them.
        let graphs = referenced_graphs(encoded.iter());
        self.ensure_graphs_exist(space_id, &graphs).await?;

        let (inserted, term_count) = match tx {
            Some(tx) => {
                let guard = tx.connection().await;
                let conn = guard.as_ref().ok_or_else(|| {
                    StorageError::Transaction("transaction already finished".to_owned())
                })?;
                let client: &tokio_postgres::Client = conn;
                let result = self
                    .insert_terms_and_quads(space_id, client, &unique_terms, &encoded, verify_count)
                    .await?;
                drop(guard);
                tx.record_quads_added(result.0);
                tx.record_terms_added(result.1 as u64);
                result
            }
            None => {
                let mut conn = self.write_conn().await?;
                let client: &mut tokio_postgres::Client = &mut conn;
                let txn = client
                    .transaction()
                    .await
                    .map_err(|e| StorageError::for_space(space_id, e))?;
                let result = self
                    .insert_terms_and_quads(space_id, &txn, &unique_terms, &encoded, verify_count)
                    .await?;
                if auto_commit {
                    txn.commit().await.map_err(StorageError::Backend)?;
                } else {
                    txn.rollback().await.map_err(StorageError::Backend)?;
                }
                result
            }
        };
        tracing::debug!(
            space_id,
            quads = quads.len(),
            unique_terms = term_count,
            inserted,
            "batch insert finished"
        );
        Ok(inserted)
    }

    async fn insert_terms_and_quads<C: GenericClient>(
        &self,
        space_id: &str,
        client: &C,
        unique_terms: &FxHashSet<TermValue>,
        encoded: &[[TermValue; 4]],
        verify_count: bool,
    ) -> StorageResult<(u64, usize)> {
        let tables = self.tables_for(space_id)?;
        let uuids = self
            .resolve_and_insert_terms(space_id, client, unique_terms)
            .await?;

        let resolve = |value: &TermValue| -> StorageResult<Uuid> {
            uuids
                .get(value)
                .copied()
                .ok_or_else(|| StorageError::other("term uuid missing after batch resolve"))
        };
        let mut subjects = Vec::with_capacity(encoded.len());
        let mut predicates = Vec::with_capacity(encoded.len());
        let mut objects = Vec::with_capacity(encoded.len());
        let mut contexts = Vec::with_capacity(encoded.len());
        for values in encoded {
            subjects.push(resolve(&values[0])?);
            predicates.push(resolve(&values[1])?);
            objects.push(resolve(&values[2])?);
            contexts.push(resolve(&values[3])?);
        }

        let insert = format!(
            "INSERT INTO {} (subject_uuid, predicate_uuid, object_uuid, context_uuid) \
             SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::uuid[], $4::uuid[])",
            tables.rdf_quad()
        );
        let inserted = client
            .execute(
                insert.as_str(),
                &[&subjects, &predicates, &objects, &contexts],
            )
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?;

        if verify_count {
            let count_sql = format!("SELECT COUNT(*) FROM {}", tables.rdf_quad());
            let row = client
                .query_one(count_sql.as_str(), &[])
                .await
                .map_err(|e| StorageError::for_space(space_id, e))?;
            let total: i64 = row.get(0);
            tracing::debug!(space_id, total, "post-insert verification count");
        }
        Ok((inserted, unique_terms.len()))
    }

    /// Deletes every row matching any of the given quads, in chunks. Returns
    /// the total number of rows removed (duplicates included).
    pub async fn remove_quads_batch(
        &self,
        space_id: &str,
        quads: &[rdf_bedrock_model::Quad],
        tx: Option<&SpaceTransaction>,
    ) -> StorageResult<u64> {
        let tables = self.tables_for(space_id)?;
        if quads.is_empty() {
            return Ok(0);
        }

        let encoded: Vec<[TermValue; 4]> =
            quads.iter().map(|quad| encode_quad(quad.as_ref())).collect();

        // Identity is deterministic, so the tuples can be rebuilt without a
        // single term lookup; only datatype ids need resolution.
        let datatype_uris: FxHashSet<String> = encoded
            .iter()
            .flat_map(|values| values.iter())
            .filter_map(|value| value.datatype.clone())
            .collect();
        let datatype_ids = self.resolve_datatype_ids(space_id, &datatype_uris).await?;
        let uuid_of = |value: &TermValue| {
            let datatype_id = value
                .datatype
                .as_deref()
                .and_then(|uri| datatype_ids.get(uri).copied());
            value.uuid_with(datatype_id)
        };

        let delete = format!(
            "DELETE FROM {} q \
             USING UNNEST($1::uuid[], $2::uuid[], $3::uuid[], $4::uuid[]) AS t(s, p, o, c) \
             WHERE q.subject_uuid = t.s AND q.predicate_uuid = t.p \
             AND q.object_uuid = t.o AND q.context_uuid = t.c",
            tables.rdf_quad()
        );

        let chunk_size = self.config().remove_batch_chunk.max(1);
        let mut total_removed = 0_u64;
        for chunk in encoded.chunks(chunk_size) {
            let subjects: Vec<Uuid> = chunk.iter().map(|v| uuid_of(&v[0])).collect();
            let predicates: Vec<Uuid> = chunk.iter().map(|v| uuid_of(&v[1])).collect();
            let objects: Vec<Uuid> = chunk.iter().map(|v| uuid_of(&v[2])).collect();
            let contexts: Vec<Uuid> = chunk.iter().map(|v| uuid_of(&v[3])).collect();
            let removed = match tx {
                Some(tx) => {
                    let guard = tx.connection().await;
                    let conn = guard.as_ref().ok_or_else(|| {
                        StorageError::Transaction("transaction already finished".to_owned())
                    })?;
                    conn.execute(
                        delete.as_str(),
                        &[&subjects, &predicates, &objects, &contexts],
                    )
                    .await
                    .map_err(|e| StorageError::for_space(space_id, e))?
                }
                None => {
                    let conn = self.write_conn().await?;
                    conn.execute(
                        delete.as_str(),
                        &[&subjects, &predicates, &objects, &contexts],
                    )
                    .await
                    .map_err(|e| StorageError::for_space(space_id, e))?
                }
            };
            total_removed += removed;
        }
        if let Some(tx) = tx {
            tx.record_quads_removed(total_removed);
        }
        tracing::debug!(space_id, removed = total_removed, "batch remove finished");
        Ok(total_removed)
    }

    /// Deletes every quad whose subject is one of `subject_uris`, optionally
    /// restricted to one graph. Subjects are matched by stored text rather
    /// than recomputed identity, so rows predating cache state are found.
    pub async fn remove_quads_by_subjects(
        &self,
        space_id: &str,
        subject_uris: &[String],
        graph_uri: Option<&str>,
        tx: Option<&SpaceTransaction>,
    ) -> StorageResult<u64> {
        let tables = self.tables_for(space_id)?;
        if subject_uris.is_empty() {
            return Ok(0);
        }

        let mut delete = format!(
            "DELETE FROM {quad} WHERE subject_uuid IN (\
             SELECT term_uuid FROM {term} \
             WHERE term_text = ANY($1) AND term_kind = 'U')",
            quad = tables.rdf_quad(),
            term = tables.term()
        );
        let context = graph_uri.map(|uri| rdf_bedrock_model::term_uuid(uri, TermKind::Uri, None, None));
        if context.is_some() {
            delete.push_str(" AND context_uuid = $2");
        }

        let removed = match tx {
            Some(tx) => {
                let guard = tx.connection().await;
                let conn = guard.as_ref().ok_or_else(|| {
                    StorageError::Transaction("transaction already finished".to_owned())
                })?;
                match &context {
                    Some(context) => conn.execute(delete.as_str(), &[&subject_uris, context]).await,
                    None => conn.execute(delete.as_str(), &[&subject_uris]).await,
                }
                .map_err(|e| StorageError::for_space(space_id, e))?
            }
            None => {
                let conn = self.write_conn().await?;
                match &context {
                    Some(context) => conn.execute(delete.as_str(), &[&subject_uris, context]).await,
                    None => conn.execute(delete.as_str(), &[&subject_uris]).await,
                }
                .map_err(|e| StorageError::for_space(space_id, e))?
            }
        };
        if let Some(tx) = tx {
            tx.record_quads_removed(removed);
        }
        tracing::debug!(
            space_id,
            subjects = subject_uris.len(),
            removed,
            "remove by subject finished"
        );
        Ok(removed)
    }
}
