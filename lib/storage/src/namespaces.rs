use crate::engine::BedrockEngine;
use chrono::NaiveDateTime;
use rdf_bedrock_common::{StorageError, StorageResult};

/// One prefix mapping of a space's namespace registry.
#[derive(Clone, PartialEq, Debug)]
pub struct NamespaceRecord {
    pub namespace_id: i64,
    pub prefix: String,
    pub namespace_uri: String,
    pub created_time: Option<NaiveDateTime>,
}

fn record_from_row(row: &tokio_postgres::Row) -> NamespaceRecord {
    NamespaceRecord {
        namespace_id: row.get(0),
        prefix: row.get(1),
        namespace_uri: row.get(2),
        created_time: row.get(3),
    }
}

impl BedrockEngine {
    /// Upserts a prefix mapping; a changed URI is updated in place. Returns
    /// the namespace id.
    pub async fn add_namespace(
        &self,
        space_id: &str,
        prefix: &str,
        namespace_uri: &str,
    ) -> StorageResult<i64> {
        let tables = self.tables_for(space_id)?;
        let conn = self.write_conn().await?;
        let upsert = format!(
            "INSERT INTO {} (prefix, namespace_uri) VALUES ($1, $2) \
             ON CONFLICT (prefix) DO UPDATE SET namespace_uri = EXCLUDED.namespace_uri \
             RETURNING namespace_id",
            tables.namespace()
        );
        let row = conn
            .query_one(upsert.as_str(), &[&prefix, &namespace_uri])
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?;
        Ok(row.get(0))
    }

    /// Looks up the URI mapped to `prefix`.
    pub async fn get_namespace_uri(
        &self,
        space_id: &str,
        prefix: &str,
    ) -> StorageResult<Option<String>> {
        let tables = self.tables_for(space_id)?;
        let conn = self.read_conn().await?;
        let select = format!(
            "SELECT namespace_uri FROM {} WHERE prefix = $1",
            tables.namespace()
        );
        let row = conn
            .query_opt(select.as_str(), &[&prefix])
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?;
        Ok(row.map(|row| row.get(0)))
    }

    /// Lists every prefix mapping, ordered by prefix.
    pub async fn list_namespaces(&self, space_id: &str) -> StorageResult<Vec<NamespaceRecord>> {
        let tables = self.tables_for(space_id)?;
        let conn = self.read_conn().await?;
        let select = format!(
            "SELECT namespace_id, prefix, namespace_uri, created_time FROM {} ORDER BY prefix",
            tables.namespace()
        );
        let rows = conn
            .query(select.as_str(), &[])
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?;
        Ok(rows.iter().map(record_from_row).collect())
    }
}
