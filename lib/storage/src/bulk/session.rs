use crate::engine::BedrockEngine;
use rdf_bedrock_common::{SpaceTables, StorageError, StorageResult};
use uuid::Uuid;

/// One bulk-ingest session: a private `dataset` value and the two staging
/// relations carrying it.
///
/// The staging tables are unlogged (COPY skips the write-ahead log) and carry
/// a `CHECK (dataset = ...)` constraint marked NOT VALID, which is what lets
/// the later partition attach skip re-scanning the rows.
#[derive(Clone, Debug)]
pub struct ImportSession {
    pub(crate) import_id: String,
    pub(crate) dataset_value: String,
    pub(crate) stage_term_table: String,
    pub(crate) stage_quad_table: String,
    pub(crate) space_id: String,
    pub(crate) tables: SpaceTables,
}

impl ImportSession {
    pub fn import_id(&self) -> &str {
        &self.import_id
    }

    pub fn dataset_value(&self) -> &str {
        &self.dataset_value
    }

    pub fn space_id(&self) -> &str {
        &self.space_id
    }
}

impl BedrockEngine {
    /// Phase 1: creates the staging relations for a new import session.
    pub async fn setup_import_session(&self, space_id: &str) -> StorageResult<ImportSession> {
        let tables = self.tables_for(space_id)?;
        // Short id: staging table names must stay inside the identifier limit.
        let import_id = Uuid::new_v4().simple().to_string()[..8].to_owned();
        let dataset_value = format!("import-{import_id}");
        let stage_term_table = format!("stage_term_{import_id}");
        let stage_quad_table = format!("stage_quad_{import_id}");

        let conn = self.write_conn().await?;

        // Staging quad table: the live columns plus the raw text columns the
        // CSV carries. The text columns are dropped again before attach, and
        // the primary key mirrors the live table so the attach finds a
        // matching local unique index instead of building one.
        let create_quad = format!(
            "CREATE UNLOGGED TABLE {stage_quad_table} (\n\
             \x20   subject_text TEXT NOT NULL,\n\
             \x20   predicate_text TEXT NOT NULL,\n\
             \x20   object_text TEXT NOT NULL,\n\
             \x20   object_datatype TEXT NOT NULL DEFAULT '',\n\
             \x20   object_language VARCHAR(20) NOT NULL DEFAULT '',\n\
             \x20   is_literal BOOLEAN NOT NULL,\n\
             \x20   graph_text TEXT NOT NULL,\n\
             \x20   import_batch_id TEXT NOT NULL DEFAULT 'batch_0',\n\
             \x20   subject_uuid UUID NOT NULL,\n\
             \x20   predicate_uuid UUID NOT NULL,\n\
             \x20   object_uuid UUID NOT NULL,\n\
             \x20   context_uuid UUID NOT NULL,\n\
             \x20   processing_status TEXT NOT NULL DEFAULT 'processed',\n\
             \x20   dataset VARCHAR(50) NOT NULL DEFAULT '{dataset_value}',\n\
             \x20   quad_uuid UUID NOT NULL DEFAULT gen_random_uuid(),\n\
             \x20   created_time TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,\n\
             \x20   PRIMARY KEY (subject_uuid, predicate_uuid, object_uuid, context_uuid, quad_uuid, dataset)\n\
             )"
        );
        conn.batch_execute(create_quad.as_str())
            .await
            .map_err(StorageError::Backend)?;
        conn.batch_execute(
            format!(
                "ALTER TABLE {stage_quad_table} \
                 ADD CONSTRAINT {stage_quad_table}_dataset_check \
                 CHECK (dataset = '{dataset_value}') NOT VALID"
            )
            .as_str(),
        )
        .await
        .map_err(StorageError::Backend)?;

        let create_term = format!(
            "CREATE UNLOGGED TABLE {stage_term_table} (\n\
             \x20   term_uuid UUID NOT NULL,\n\
             \x20   term_text TEXT NOT NULL,\n\
             \x20   term_kind CHAR(1) NOT NULL,\n\
             \x20   lang VARCHAR(20),\n\
             \x20   datatype_id BIGINT,\n\
             \x20   created_time TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,\n\
             \x20   dataset VARCHAR(50) NOT NULL DEFAULT '{dataset_value}',\n\
             \x20   PRIMARY KEY (term_uuid, dataset)\n\
             )"
        );
        conn.batch_execute(create_term.as_str())
            .await
            .map_err(StorageError::Backend)?;
        conn.batch_execute(
            format!(
                "ALTER TABLE {stage_term_table} \
                 ADD CONSTRAINT {stage_term_table}_dataset_check \
                 CHECK (dataset = '{dataset_value}') NOT VALID"
            )
            .as_str(),
        )
        .await
        .map_err(StorageError::Backend)?;

        // Constraints matching the live tables, so attach needs no row scan
        // to prove them.
        conn.batch_execute(
            format!(
                "ALTER TABLE {stage_term_table} \
                 ADD CONSTRAINT {stage_term_table}_term_kind_check \
                 CHECK (term_kind IN ('U', 'L', 'B', 'G'))"
            )
            .as_str(),
        )
        .await
        .map_err(StorageError::Backend)?;

        conn.batch_execute(
            format!(
                "CREATE INDEX idx_{import_id}_stage_quad_dataset ON {stage_quad_table} (dataset); \
                 CREATE INDEX idx_{import_id}_stage_term_dataset ON {stage_term_table} (dataset)"
            )
            .as_str(),
        )
        .await
        .map_err(StorageError::Backend)?;

        tracing::info!(
            space_id,
            import_id = import_id.as_str(),
            dataset = dataset_value.as_str(),
            "import session staged"
        );
        Ok(ImportSession {
            import_id,
            dataset_value,
            stage_term_table,
            stage_quad_table,
            space_id: space_id.to_owned(),
            tables,
        })
    }

    /// Phase 7 (failure path): drops the staging relations. Safe to call when
    /// they are already gone.
    pub async fn cleanup_import_session(&self, session: &ImportSession) -> StorageResult<()> {
        let conn = self.write_conn().await?;
        conn.batch_execute(
            format!(
                "DROP TABLE IF EXISTS {}; DROP TABLE IF EXISTS {}",
                session.stage_quad_table, session.stage_term_table
            )
            .as_str(),
        )
        .await
        .map_err(StorageError::Backend)?;
        tracing::info!(import_id = session.import_id.as_str(), "import session cleaned up");
        Ok(())
    }
}
