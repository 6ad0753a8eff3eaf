//! Bulk N-Triples ingest: parse → stage → dedupe → publish → analyze.
//!
//! The pipeline trades transactional isolation for throughput while still
//! publishing atomically: readers never see a partial batch, only the
//! before/after of the partition attach (or of the fallback insert's
//! transaction).

mod parse;
mod publish;
mod session;

pub use publish::PublishMode;
pub use session::ImportSession;

use crate::engine::BedrockEngine;
use crate::graphs::CountUpdate;
use bytes::Bytes;
use futures::SinkExt;
use rdf_bedrock_common::{StorageError, StorageResult};
use rdf_bedrock_model::NamedNodeRef;
use rustc_hash::FxHashSet;
use std::io::Read;
use std::path::Path;

/// Outcome of one bulk load.
#[derive(Clone, Debug)]
pub struct BulkLoadStats {
    pub import_id: String,
    pub dataset_value: String,
    /// Statements parsed out of the input.
    pub total_triples: u64,
    /// Rows landed in the staging quad table by COPY.
    pub loaded_rows: u64,
    /// Distinct terms extracted into the staging term table.
    pub terms_inserted: u64,
    pub mode: PublishMode,
}

impl BedrockEngine {
    /// Runs the whole bulk pipeline for an N-Triples `input` targeted at
    /// `graph_uri`. On any failure after staging begins, the staging
    /// relations are dropped before the error is returned.
    pub async fn bulk_load_ntriples<R: Read>(
        &self,
        space_id: &str,
        input: R,
        graph_uri: NamedNodeRef<'_>,
    ) -> StorageResult<BulkLoadStats> {
        let session = self.setup_import_session(space_id).await?;
        match self.run_bulk_load(&session, input, graph_uri).await {
            Ok(stats) => Ok(stats),
            Err(error) => {
                if let Err(cleanup_error) = self.cleanup_import_session(&session).await {
                    tracing::warn!(%cleanup_error, "staging cleanup after failed import also failed");
                }
                Err(error)
            }
        }
    }

    /// [BedrockEngine::bulk_load_ntriples] reading from a file path.
    pub async fn bulk_load_ntriples_file(
        &self,
        space_id: &str,
        path: impl AsRef<Path>,
        graph_uri: NamedNodeRef<'_>,
    ) -> StorageResult<BulkLoadStats> {
        let file = std::fs::File::open(path.as_ref())?;
        self.bulk_load_ntriples(space_id, std::io::BufReader::new(file), graph_uri)
            .await
    }

    async fn run_bulk_load<R: Read>(
        &self,
        session: &ImportSession,
        input: R,
        graph_uri: NamedNodeRef<'_>,
    ) -> StorageResult<BulkLoadStats> {
        // Phase 2: parse to CSV with parse-time UUID assignment.
        let (csv_file, total_triples) = parse::convert_ntriples_to_csv(
            input,
            graph_uri.as_str(),
            &session.dataset_value,
            self.config().parse_uuid_cache_capacity,
        )?;

        // Phase 3: bulk-copy the CSV into the staging quad table.
        let loaded_rows = self.copy_csv_into_stage(session, csv_file.path()).await?;
        drop(csv_file);

        // Phase 4: extract and deduplicate terms, no join needed.
        let terms_inserted = self.extract_stage_terms(session).await?;

        // Register the target graph and bump its approximate count before the
        // rows become visible.
        let mut graphs = FxHashSet::default();
        graphs.insert(graph_uri.as_str().to_owned());
        self.ensure_graphs_exist(&session.space_id, &graphs).await?;
        self.update_graph_triple_count(
            &session.space_id,
            graph_uri.as_str(),
            CountUpdate::Delta(i64::try_from(loaded_rows).unwrap_or(i64::MAX)),
        )
        .await?;

        // Phases 5–6: publish and refresh statistics.
        let mode = self.publish_import_session(session).await?;

        Ok(BulkLoadStats {
            import_id: session.import_id.clone(),
            dataset_value: session.dataset_value.clone(),
            total_triples,
            loaded_rows,
            terms_inserted,
            mode,
        })
    }

    /// Phase 3: streams the CSV file into the staging quad table with the
    /// backend's bulk-copy facility. Durability is relaxed for the copy;
    /// the staging table is unlogged anyway.
    async fn copy_csv_into_stage(
        &self,
        session: &ImportSession,
        csv_path: &Path,
    ) -> StorageResult<u64> {
        let mut conn = self.write_conn().await?;
        let client: &mut tokio_postgres::Client = &mut conn;
        let txn = client.transaction().await.map_err(StorageError::Backend)?;
        txn.batch_execute("SET LOCAL synchronous_commit = OFF")
            .await
            .map_err(StorageError::Backend)?;

        let copy_sql = format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT CSV, DELIMITER ',', QUOTE '\"', ESCAPE '\"', NULL '')",
            session.stage_quad_table,
            parse::CSV_COLUMNS
        );
        let sink = txn
            .copy_in(copy_sql.as_str())
            .await
            .map_err(StorageError::Backend)?;
        futures::pin_mut!(sink);

        let mut file = std::fs::File::open(csv_path)?;
        let mut buffer = vec![0_u8; 64 * 1024];
        loop {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            sink.send(Bytes::copy_from_slice(&buffer[..read]))
                .await
                .map_err(StorageError::Backend)?;
        }
        let loaded = sink
            .as_mut()
            .finish()
            .await
            .map_err(StorageError::Backend)?;
        txn.commit().await.map_err(StorageError::Backend)?;
        tracing::info!(
            import_id = session.import_id.as_str(),
            loaded,
            "staging CSV copied"
        );
        Ok(loaded)
    }

    /// Phase 4: one UNION-ALL pass over the staging quad table. UUIDs were
    /// fixed at parse time, so deduplication is a single sort-and-hash with
    /// no join back to the live term table.
    async fn extract_stage_terms(&self, session: &ImportSession) -> StorageResult<u64> {
        let conn = self.write_conn().await?;
        let extract = format!(
            "INSERT INTO {stage_term} (term_uuid, term_text, term_kind, dataset) \
             SELECT DISTINCT term_uuid, term_text, term_kind, '{dataset}' AS dataset FROM (\
             SELECT subject_uuid AS term_uuid, subject_text AS term_text, 'U' AS term_kind FROM {stage_quad} \
             UNION ALL \
             SELECT predicate_uuid, predicate_text, 'U' FROM {stage_quad} \
             UNION ALL \
             SELECT object_uuid, object_text, CASE WHEN is_literal THEN 'L' ELSE 'U' END FROM {stage_quad} \
             UNION ALL \
             SELECT context_uuid, graph_text, 'U' FROM {stage_quad}\
             ) t \
             WHERE term_uuid IS NOT NULL \
             ON CONFLICT (term_uuid, dataset) DO NOTHING",
            stage_term = session.stage_term_table,
            stage_quad = session.stage_quad_table,
            dataset = session.dataset_value,
        );
        let inserted = conn
            .execute(extract.as_str(), &[])
            .await
            .map_err(StorageError::Backend)?;
        tracing::info!(
            import_id = session.import_id.as_str(),
            inserted,
            "distinct terms extracted"
        );
        Ok(inserted)
    }
}
