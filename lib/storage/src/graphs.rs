use crate::engine::BedrockEngine;
use chrono::NaiveDateTime;
use rdf_bedrock_common::{channels, signal_types, StorageError, StorageResult};
use rdf_bedrock_model::{term_uuid, TermKind};
use rustc_hash::FxHashSet;
use serde_json::json;
use tokio::sync::Mutex;

/// One row of the per-space graph registry.
#[derive(Clone, PartialEq, Debug)]
pub struct GraphRecord {
    pub graph_id: i64,
    pub graph_uri: String,
    pub graph_name: Option<String>,
    /// Best-effort counter; exact counts come from
    /// [BedrockEngine::count_quads_by_graph_uri].
    pub triple_count: i64,
    pub created_time: Option<NaiveDateTime>,
    pub updated_time: Option<NaiveDateTime>,
}

/// Triple-count maintenance mode for [BedrockEngine::update_graph_triple_count].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CountUpdate {
    /// Add the (possibly negative) delta, clamped at zero.
    Delta(i64),
    /// Overwrite with an absolute value, clamped at zero.
    Absolute(i64),
}

/// Per-space set of graph URIs known to exist, loaded lazily from the
/// registry table. Only ever grows during a process lifetime except on
/// explicit graph drops.
pub(crate) struct GraphCache {
    uris: Mutex<Option<FxHashSet<String>>>,
}

impl GraphCache {
    pub fn new() -> Self {
        Self {
            uris: Mutex::new(None),
        }
    }
}

const GRAPH_COLUMNS: &str =
    "graph_id, graph_uri, graph_name, triple_count, created_time, updated_time";

fn record_from_row(row: &tokio_postgres::Row) -> GraphRecord {
    GraphRecord {
        graph_id: row.get(0),
        graph_uri: row.get(1),
        graph_name: row.get(2),
        triple_count: row.get(3),
        created_time: row.get(4),
        updated_time: row.get(5),
    }
}

impl BedrockEngine {
    fn emit_graph_signal(&self, signal_type: &str, space_id: &str, graph_uri: &str) {
        let payload = json!({
            "type": signal_type,
            "space_id": space_id,
            "graph_uri": graph_uri,
        });
        self.signals().emit(channels::GRAPHS, &payload);
        self.signals().emit(channels::GRAPH, &payload);
    }

    /// Upserts a registry row for `graph_uri` and emits creation signals.
    pub async fn create_graph(
        &self,
        space_id: &str,
        graph_uri: &str,
        graph_name: Option<&str>,
    ) -> StorageResult<GraphRecord> {
        let tables = self.tables_for(space_id)?;
        let conn = self.write_conn().await?;
        let upsert = format!(
            "INSERT INTO {} (graph_uri, graph_name) VALUES ($1, $2) \
             ON CONFLICT (graph_uri) DO UPDATE SET \
             graph_name = COALESCE(EXCLUDED.graph_name, {0}.graph_name), \
             updated_time = CURRENT_TIMESTAMP \
             RETURNING {GRAPH_COLUMNS}",
            tables.graph()
        );
        let row = conn
            .query_one(upsert.as_str(), &[&graph_uri, &graph_name])
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?;

        let cache = self.graph_cache(space_id);
        let mut uris = cache.uris.lock().await;
        if let Some(uris) = uris.as_mut() {
            uris.insert(graph_uri.to_owned());
        }
        drop(uris);

        self.emit_graph_signal(signal_types::CREATED, space_id, graph_uri);
        Ok(record_from_row(&row))
    }

    /// Reads one registry row.
    pub async fn get_graph(
        &self,
        space_id: &str,
        graph_uri: &str,
    ) -> StorageResult<Option<GraphRecord>> {
        let tables = self.tables_for(space_id)?;
        let conn = self.read_conn().await?;
        let select = format!(
            "SELECT {GRAPH_COLUMNS} FROM {} WHERE graph_uri = $1",
            tables.graph()
        );
        let row = conn
            .query_opt(select.as_str(), &[&graph_uri])
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?;
        Ok(row.as_ref().map(record_from_row))
    }

    /// Lists every declared graph, ordered by URI.
    pub async fn list_graphs(&self, space_id: &str) -> StorageResult<Vec<GraphRecord>> {
        let tables = self.tables_for(space_id)?;
        let conn = self.read_conn().await?;
        let select = format!(
            "SELECT {GRAPH_COLUMNS} FROM {} ORDER BY graph_uri",
            tables.graph()
        );
        let rows = conn
            .query(select.as_str(), &[])
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?;
        Ok(rows.iter().map(record_from_row).collect())
    }

    /// Deletes every quad in the graph but preserves its registry row with a
    /// zeroed count. Returns whether the registry row existed.
    pub async fn clear_graph(&self, space_id: &str, graph_uri: &str) -> StorageResult<bool> {
        let tables = self.tables_for(space_id)?;
        let context = term_uuid(graph_uri, TermKind::Uri, None, None);
        let conn = self.write_conn().await?;
        let delete = format!("DELETE FROM {} WHERE context_uuid = $1", tables.rdf_quad());
        let removed = conn
            .execute(delete.as_str(), &[&context])
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?;
        let update = format!(
            "UPDATE {} SET triple_count = 0, updated_time = CURRENT_TIMESTAMP \
             WHERE graph_uri = $1",
            tables.graph()
        );
        let existed = conn
            .execute(update.as_str(), &[&graph_uri])
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?
            > 0;
        tracing::debug!(space_id, graph_uri, removed, "graph cleared");
        self.emit_graph_signal(signal_types::UPDATED, space_id, graph_uri);
        Ok(existed)
    }

    /// Deletes every quad in the graph and its registry row. Returns whether
    /// the registry row existed.
    pub async fn drop_graph(&self, space_id: &str, graph_uri: &str) -> StorageResult<bool> {
        let tables = self.tables_for(space_id)?;
        let context = term_uuid(graph_uri, TermKind::Uri, None, None);
        let conn = self.write_conn().await?;
        let delete_quads = format!("DELETE FROM {} WHERE context_uuid = $1", tables.rdf_quad());
        conn.execute(delete_quads.as_str(), &[&context])
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?;
        let delete_row = format!("DELETE FROM {} WHERE graph_uri = $1", tables.graph());
        let existed = conn
            .execute(delete_row.as_str(), &[&graph_uri])
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?
            > 0;

        let cache = self.graph_cache(space_id);
        let mut uris = cache.uris.lock().await;
        if let Some(uris) = uris.as_mut() {
            uris.remove(graph_uri);
        }
        drop(uris);

        self.emit_graph_signal(signal_types::DELETED, space_id, graph_uri);
        Ok(existed)
    }

    /// Creates registry rows for every graph in `graph_uris` that does not
    /// exist yet, atomically via conflict-skip, and refreshes the cache.
    /// Creation signals fire once per actually-created graph.
    pub async fn ensure_graphs_exist(
        &self,
        space_id: &str,
        graph_uris: &FxHashSet<String>,
    ) -> StorageResult<()> {
        if graph_uris.is_empty() {
            return Ok(());
        }
        let tables = self.tables_for(space_id)?;
        let cache = self.graph_cache(space_id);
        let mut cached = cache.uris.lock().await;

        // First use in this process: seed the cache from the registry.
        if cached.is_none() {
            let conn = self.read_conn().await?;
            let select = format!("SELECT graph_uri FROM {}", tables.graph());
            let rows = conn
                .query(select.as_str(), &[])
                .await
                .map_err(|e| StorageError::for_space(space_id, e))?;
            *cached = Some(rows.iter().map(|row| row.get(0)).collect());
        }
        let known = cached.as_mut().expect("cache seeded above");

        let missing: Vec<&str> = graph_uris
            .iter()
            .filter(|uri| !known.contains(*uri))
            .map(|uri| uri.as_str())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let conn = self.write_conn().await?;
        let insert = format!(
            "INSERT INTO {} (graph_uri) SELECT * FROM UNNEST($1::text[]) \
             ON CONFLICT (graph_uri) DO NOTHING RETURNING graph_uri",
            tables.graph()
        );
        let created = conn
            .query(insert.as_str(), &[&missing])
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?;

        for uri in &missing {
            known.insert((*uri).to_owned());
        }
        drop(cached);

        for row in &created {
            let uri: String = row.get(0);
            self.emit_graph_signal(signal_types::CREATED, space_id, &uri);
        }
        Ok(())
    }

    /// Best-effort maintenance of the registry's `triple_count`. Returns
    /// whether the registry row existed.
    pub async fn update_graph_triple_count(
        &self,
        space_id: &str,
        graph_uri: &str,
        update: CountUpdate,
    ) -> StorageResult<bool> {
        let tables = self.tables_for(space_id)?;
        let conn = self.write_conn().await?;
        let (sql, value) = match update {
            CountUpdate::Delta(delta) => (
                format!(
                    "UPDATE {} SET triple_count = GREATEST(triple_count + $2, 0), \
                     updated_time = CURRENT_TIMESTAMP WHERE graph_uri = $1",
                    tables.graph()
                ),
                delta,
            ),
            CountUpdate::Absolute(count) => (
                format!(
                    "UPDATE {} SET triple_count = GREATEST($2, 0), \
                     updated_time = CURRENT_TIMESTAMP WHERE graph_uri = $1",
                    tables.graph()
                ),
                count,
            ),
        };
        let updated = conn
            .execute(sql.as_str(), &[&graph_uri, &value])
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?;
        Ok(updated > 0)
    }
}
