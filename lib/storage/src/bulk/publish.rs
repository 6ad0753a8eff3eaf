use super::session::ImportSession;
use crate::engine::BedrockEngine;
use crate::schema::SpaceSchema;
use rdf_bedrock_common::{StorageError, StorageResult};

/// How a bulk load was made visible under the live tables.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PublishMode {
    /// Staging tables were attached as partitions (metadata-only).
    PartitionAttach,
    /// Rows were copied into the live tables between an index drop/recreate
    /// cycle (live tables were not partitioned).
    InsertFallback,
}

/// Raw text/bookkeeping columns the staging quad table carries beyond the
/// live layout; dropped before attach.
const STAGE_ONLY_COLUMNS: [&str; 9] = [
    "subject_text",
    "predicate_text",
    "object_text",
    "object_datatype",
    "object_language",
    "is_literal",
    "graph_text",
    "import_batch_id",
    "processing_status",
];

impl BedrockEngine {
    /// Phase 5/6: publishes the staged rows, preferring partition attach and
    /// falling back to insert when the live tables are not partitioned.
    ///
    /// ANALYZE of the new partitions and their parents runs inside the
    /// publishing transaction; `VACUUM ANALYZE` runs afterwards on a fresh
    /// autocommit connection. Statistics failures are logged, never raised:
    /// the data is already live.
    pub async fn publish_import_session(
        &self,
        session: &ImportSession,
    ) -> StorageResult<PublishMode> {
        let conn = self.write_conn().await?;
        let partitioned_sql =
            "SELECT partrelid FROM pg_partitioned_table WHERE partrelid = to_regclass($1)";
        let term_partitioned = conn
            .query_opt(partitioned_sql, &[&session.tables.term()])
            .await
            .map_err(|e| StorageError::for_space(&session.space_id, e))?
            .is_some();
        let quad_partitioned = conn
            .query_opt(partitioned_sql, &[&session.tables.rdf_quad()])
            .await
            .map_err(|e| StorageError::for_space(&session.space_id, e))?
            .is_some();
        drop(conn);

        if term_partitioned && quad_partitioned {
            self.attach_partitions(session).await?;
            Ok(PublishMode::PartitionAttach)
        } else {
            tracing::warn!(
                import_id = session.import_id.as_str(),
                "live tables are not partitioned; falling back to insert publication"
            );
            self.insert_fallback(session).await?;
            Ok(PublishMode::InsertFallback)
        }
    }

    /// Partition-attach publication. The dataset CHECK constraints are
    /// already in place and validated rows are all that the staging tables
    /// can contain, so both attaches are catalog updates without a scan.
    async fn attach_partitions(&self, session: &ImportSession) -> StorageResult<()> {
        let stage_term = &session.stage_term_table;
        let stage_quad = &session.stage_quad_table;
        let term = session.tables.term();
        let quad = session.tables.rdf_quad();
        let dataset = &session.dataset_value;

        let mut conn = self.write_conn().await?;
        let client: &mut tokio_postgres::Client = &mut conn;
        let txn = client.transaction().await.map_err(StorageError::Backend)?;

        for column in STAGE_ONLY_COLUMNS {
            txn.batch_execute(
                format!("ALTER TABLE {stage_quad} DROP COLUMN {column}").as_str(),
            )
            .await
            .map_err(StorageError::Backend)?;
        }

        txn.batch_execute(format!("ALTER TABLE {stage_term} SET LOGGED").as_str())
            .await
            .map_err(StorageError::Backend)?;
        txn.batch_execute(format!("ALTER TABLE {stage_quad} SET LOGGED").as_str())
            .await
            .map_err(StorageError::Backend)?;

        txn.batch_execute(
            format!(
                "ALTER TABLE {term} ATTACH PARTITION {stage_term} FOR VALUES IN ('{dataset}')"
            )
            .as_str(),
        )
        .await
        .map_err(StorageError::Backend)?;
        txn.batch_execute(
            format!(
                "ALTER TABLE {quad} ATTACH PARTITION {stage_quad} FOR VALUES IN ('{dataset}')"
            )
            .as_str(),
        )
        .await
        .map_err(StorageError::Backend)?;

        // Planner statistics for the new partitions and the parents, while
        // the attach is still invisible to other sessions.
        for table in [stage_term.as_str(), stage_quad.as_str(), term, quad] {
            txn.batch_execute(format!("ANALYZE {table}").as_str())
                .await
                .map_err(StorageError::Backend)?;
        }
        txn.commit().await.map_err(StorageError::Backend)?;
        tracing::info!(
            import_id = session.import_id.as_str(),
            "staging tables attached as partitions"
        );

        self.vacuum_analyze(&[stage_term, stage_quad]).await;
        Ok(())
    }

    /// Insert publication: amortizes index maintenance over the whole batch
    /// by dropping the term/quad indexes, copying the staged rows, and
    /// rebuilding the indexes inside the same transaction.
    async fn insert_fallback(&self, session: &ImportSession) -> StorageResult<()> {
        let schema = SpaceSchema::new(session.tables.clone());
        let stage_term = &session.stage_term_table;
        let stage_quad = &session.stage_quad_table;
        let term = session.tables.term();
        let quad = session.tables.rdf_quad();

        let mut conn = self.write_conn().await?;
        let client: &mut tokio_postgres::Client = &mut conn;
        let txn = client.transaction().await.map_err(StorageError::Backend)?;

        for statement in schema.drop_indexes() {
            txn.batch_execute(statement.as_str())
                .await
                .map_err(StorageError::Backend)?;
        }

        txn.batch_execute(
            format!(
                "INSERT INTO {term} (term_uuid, term_text, term_kind, lang, datatype_id, created_time, dataset) \
                 SELECT term_uuid, term_text, term_kind, NULLIF(lang, ''), NULLIF(datatype_id, 0), created_time, 'primary' \
                 FROM {stage_term} \
                 ON CONFLICT (term_uuid, dataset) DO NOTHING"
            )
            .as_str(),
        )
        .await
        .map_err(StorageError::Backend)?;

        txn.batch_execute(
            format!(
                "INSERT INTO {quad} (subject_uuid, predicate_uuid, object_uuid, context_uuid, quad_uuid, created_time, dataset) \
                 SELECT subject_uuid, predicate_uuid, object_uuid, context_uuid, quad_uuid, created_time, 'primary' \
                 FROM {stage_quad}"
            )
            .as_str(),
        )
        .await
        .map_err(StorageError::Backend)?;

        // Concurrent builds cannot run in a transaction block.
        for statement in schema.recreate_indexes(false) {
            txn.batch_execute(statement.as_str())
                .await
                .map_err(StorageError::Backend)?;
        }

        txn.batch_execute(
            format!("DROP TABLE {stage_quad}; DROP TABLE {stage_term}").as_str(),
        )
        .await
        .map_err(StorageError::Backend)?;
        txn.commit().await.map_err(StorageError::Backend)?;
        tracing::info!(
            import_id = session.import_id.as_str(),
            "staged rows inserted into live tables"
        );

        self.vacuum_analyze(&[term, quad]).await;
        Ok(())
    }

    /// Best-effort `VACUUM ANALYZE` on a dedicated autocommit connection
    /// (VACUUM cannot run inside a transaction block).
    async fn vacuum_analyze(&self, tables: &[&str]) {
        let conn = match self.write_conn().await {
            Ok(conn) => conn,
            Err(error) => {
                tracing::warn!(%error, "skipping VACUUM ANALYZE: no connection");
                return;
            }
        };
        for table in tables {
            if let Err(error) = conn
                .batch_execute(format!("VACUUM ANALYZE {table}").as_str())
                .await
            {
                tracing::warn!(table, %error, "VACUUM ANALYZE failed; statistics may lag");
            }
        }
    }
}
