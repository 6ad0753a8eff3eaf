use crate::engine::BedrockEngine;
use crate::schema::SpaceSchema;
use rdf_bedrock_common::{channels, signal_types, SpaceTables, StorageError, StorageResult};
use serde_json::json;

impl BedrockEngine {
    fn emit_space_signal(&self, signal_type: &str, space_id: &str) {
        let payload = json!({
            "type": signal_type,
            "space_id": space_id,
        });
        self.signals().emit(channels::SPACES, &payload);
        self.signals().emit(channels::SPACE, &payload);
    }

    /// Creates the full table set for `space_id` in dependency order and
    /// bootstraps the standard datatypes.
    pub async fn create_space_tables(&self, space_id: &str) -> StorageResult<()> {
        let tables = self.tables_for(space_id)?;
        let schema = SpaceSchema::new(tables);
        let conn = self.write_conn().await?;
        for statement in schema.create_all() {
            conn.batch_execute(statement.as_str())
                .await
                .map_err(StorageError::Backend)?;
        }
        drop(conn);
        self.bootstrap_standard_datatypes(space_id).await?;
        tracing::info!(space_id, "space tables created");
        self.emit_space_signal(signal_types::CREATED, space_id);
        Ok(())
    }

    /// Drops the space's tables in reverse dependency order and evicts its
    /// process-local caches.
    pub async fn delete_space_tables(&self, space_id: &str) -> StorageResult<()> {
        let tables = self.tables_for(space_id)?;
        let schema = SpaceSchema::new(tables);
        let conn = self.write_conn().await?;
        for statement in schema.drop_all() {
            conn.batch_execute(statement.as_str())
                .await
                .map_err(StorageError::Backend)?;
        }
        self.evict_space_caches(space_id);
        tracing::info!(space_id, "space tables deleted");
        self.emit_space_signal(signal_types::DELETED, space_id);
        Ok(())
    }

    /// Whether the space's tables exist. The quad table stands in for the
    /// whole set, since the tables are only ever created and dropped
    /// together.
    pub async fn space_exists(&self, space_id: &str) -> StorageResult<bool> {
        let tables = self.tables_for(space_id)?;
        let conn = self.read_conn().await?;
        let row = conn
            .query_one("SELECT to_regclass($1) IS NOT NULL", &[&tables.rdf_quad()])
            .await?;
        Ok(row.get(0))
    }

    /// Drops every term/quad index of the space, e.g. before a large manual
    /// load.
    pub async fn drop_space_indexes(&self, space_id: &str) -> StorageResult<()> {
        let schema = SpaceSchema::new(self.tables_for(space_id)?);
        let conn = self.write_conn().await?;
        for statement in schema.drop_indexes() {
            conn.batch_execute(statement.as_str())
                .await
                .map_err(|e| StorageError::for_space(space_id, e))?;
        }
        tracing::info!(space_id, "term/quad indexes dropped");
        Ok(())
    }

    /// Recreates the term/quad indexes. `concurrent` selects the non-blocking
    /// build for live production tables; pass `false` only where blocking the
    /// tables is acceptable.
    pub async fn recreate_space_indexes(
        &self,
        space_id: &str,
        concurrent: bool,
    ) -> StorageResult<()> {
        let schema = SpaceSchema::new(self.tables_for(space_id)?);
        let conn = self.write_conn().await?;
        for statement in schema.recreate_indexes(concurrent) {
            conn.batch_execute(statement.as_str())
                .await
                .map_err(|e| StorageError::for_space(space_id, e))?;
        }
        tracing::info!(space_id, concurrent, "term/quad indexes recreated");
        Ok(())
    }

    /// Reclusters the primary partitions (quads by subject order, terms by
    /// id order). Takes exclusive locks; a maintenance-window operation.
    pub async fn cluster_space_tables(&self, space_id: &str) -> StorageResult<()> {
        let schema = SpaceSchema::new(self.tables_for(space_id)?);
        let conn = self.write_conn().await?;
        for statement in schema.cluster() {
            conn.batch_execute(statement.as_str())
                .await
                .map_err(|e| StorageError::for_space(space_id, e))?;
        }
        tracing::info!(space_id, "primary partitions clustered");
        Ok(())
    }

    /// Lists the ids of every space under the engine's global prefix, by
    /// pattern-matching quad table names in the catalog.
    pub async fn list_spaces(&self) -> StorageResult<Vec<String>> {
        let prefix = &self.config().global_prefix;
        let pattern =
            SpaceTables::quad_table_pattern(prefix, self.config().unlogged_tables);
        let conn = self.read_conn().await?;
        let rows = conn
            .query(
                "SELECT tablename FROM pg_tables \
                 WHERE schemaname = current_schema() AND tablename LIKE $1 \
                 ORDER BY tablename",
                &[&pattern],
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                let table: &str = row.get(0);
                SpaceTables::space_id_from_quad_table(prefix, table)
            })
            .collect())
    }
}
