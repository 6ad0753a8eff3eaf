use crate::engine::BedrockEngine;
use rdf_bedrock_common::{LruMap, StorageError, StorageResult};
use rdf_bedrock_model::STANDARD_DATATYPES;
use rustc_hash::{FxHashMap, FxHashSet};

/// Per-space bidirectional datatype map with LRU bounds and hit/miss
/// counters. Lives behind the engine's cache registry; all access goes
/// through the engine methods below.
pub(crate) struct DatatypeCache {
    by_uri: LruMap<String, i64>,
    by_id: LruMap<i64, String>,
}

impl DatatypeCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            by_uri: LruMap::new(capacity),
            by_id: LruMap::new(capacity),
        }
    }

    fn put(&mut self, uri: &str, id: i64) {
        self.by_uri.insert(uri.to_owned(), id);
        self.by_id.insert(id, uri.to_owned());
    }
}

/// Snapshot of one space's datatype cache counters.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
    pub capacity: usize,
}

/// Short label stored alongside a datatype URI, e.g. `integer` for
/// `http://www.w3.org/2001/XMLSchema#integer`.
fn datatype_label(uri: &str) -> &str {
    uri.rsplit(['#', '/']).next().unwrap_or(uri)
}

impl BedrockEngine {
    /// Inserts the canonical XSD/RDF datatype set into `space_id`'s datatype
    /// table. Idempotent: existing rows are conflict-skipped. Returns the
    /// number of rows actually inserted.
    pub async fn bootstrap_standard_datatypes(&self, space_id: &str) -> StorageResult<u64> {
        let tables = self.tables_for(space_id)?;
        let uris: Vec<&str> = STANDARD_DATATYPES.iter().map(|d| d.uri).collect();
        let names: Vec<&str> = STANDARD_DATATYPES.iter().map(|d| d.name).collect();

        let conn = self.write_conn().await?;
        let insert = format!(
            "INSERT INTO {} (datatype_uri, datatype_name) \
             SELECT * FROM UNNEST($1::text[], $2::text[]) \
             ON CONFLICT (datatype_uri) DO NOTHING",
            tables.datatype()
        );
        let inserted = conn
            .execute(insert.as_str(), &[&uris, &names])
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?;
        tracing::debug!(space_id, inserted, "standard datatypes bootstrapped");
        Ok(inserted)
    }

    /// Resolves every URI in `uris` to its datatype id, inserting the unknown
    /// ones. Cache-first; the database is consulted once for the misses and
    /// once more for rows created concurrently.
    pub async fn resolve_datatype_ids(
        &self,
        space_id: &str,
        uris: &FxHashSet<String>,
    ) -> StorageResult<FxHashMap<String, i64>> {
        let mut resolved = FxHashMap::default();
        if uris.is_empty() {
            return Ok(resolved);
        }
        let tables = self.tables_for(space_id)?;
        let cache = self.datatype_cache(space_id);
        let mut cache = cache.lock().await;

        let mut missing: Vec<&String> = Vec::new();
        for uri in uris {
            match cache.by_uri.get(uri) {
                Some(id) => {
                    resolved.insert(uri.clone(), *id);
                }
                None => missing.push(uri),
            }
        }
        if missing.is_empty() {
            return Ok(resolved);
        }

        let conn = self.write_conn().await?;
        let select = format!(
            "SELECT datatype_uri, datatype_id FROM {} WHERE datatype_uri = ANY($1)",
            tables.datatype()
        );
        let missing_vec: Vec<&str> = missing.iter().map(|s| s.as_str()).collect();
        let rows = conn
            .query(select.as_str(), &[&missing_vec])
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?;
        for row in &rows {
            let uri: String = row.get(0);
            let id: i64 = row.get(1);
            cache.put(&uri, id);
            resolved.insert(uri, id);
        }

        let still_missing: Vec<&str> = missing_vec
            .iter()
            .copied()
            .filter(|uri| !resolved.contains_key(*uri))
            .collect();
        if !still_missing.is_empty() {
            let labels: Vec<&str> = still_missing.iter().map(|uri| datatype_label(uri)).collect();
            let insert = format!(
                "INSERT INTO {} (datatype_uri, datatype_name) \
                 SELECT * FROM UNNEST($1::text[], $2::text[]) \
                 ON CONFLICT (datatype_uri) DO NOTHING",
                tables.datatype()
            );
            conn.execute(insert.as_str(), &[&still_missing, &labels])
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?;

            // Re-query instead of RETURNING: a concurrent writer may have won
            // the conflict, and its ids are just as good.
            let rows = conn
                .query(select.as_str(), &[&still_missing])
                .await
                .map_err(|e| StorageError::for_space(space_id, e))?;
            for row in &rows {
                let uri: String = row.get(0);
                let id: i64 = row.get(1);
                cache.put(&uri, id);
                resolved.insert(uri, id);
            }
        }
        Ok(resolved)
    }

    /// Single-URI convenience over [BedrockEngine::resolve_datatype_ids].
    pub async fn get_or_create_datatype_id(
        &self,
        space_id: &str,
        datatype_uri: &str,
    ) -> StorageResult<i64> {
        let mut uris = FxHashSet::default();
        uris.insert(datatype_uri.to_owned());
        let resolved = self.resolve_datatype_ids(space_id, &uris).await?;
        resolved.get(datatype_uri).copied().ok_or_else(|| {
            StorageError::other(format!(
                "datatype '{datatype_uri}' could not be resolved in space '{space_id}'"
            ))
        })
    }

    /// Loads the whole datatype table into the cache, for hosts that want the
    /// cache warm before serving reads. Returns the number of rows loaded
    /// (bounded by the cache capacity).
    pub async fn load_datatype_cache(&self, space_id: &str) -> StorageResult<usize> {
        let tables = self.tables_for(space_id)?;
        let conn = self.read_conn().await?;
        let select = format!(
            "SELECT datatype_uri, datatype_id FROM {} ORDER BY datatype_id",
            tables.datatype()
        );
        let rows = conn
            .query(select.as_str(), &[])
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?;
        let cache = self.datatype_cache(space_id);
        let mut cache = cache.lock().await;
        for row in &rows {
            let uri: String = row.get(0);
            cache.put(&uri, row.get(1));
        }
        tracing::debug!(space_id, loaded = rows.len(), "datatype cache preloaded");
        Ok(rows.len())
    }

    /// Reverse lookup for row decoding: the URI stored under `datatype_id`.
    pub async fn datatype_uri(
        &self,
        space_id: &str,
        datatype_id: i64,
    ) -> StorageResult<Option<String>> {
        let tables = self.tables_for(space_id)?;
        let cache = self.datatype_cache(space_id);
        let mut cache = cache.lock().await;
        if let Some(uri) = cache.by_id.get(&datatype_id) {
            return Ok(Some(uri.clone()));
        }
        let conn = self.read_conn().await?;
        let select = format!(
            "SELECT datatype_uri FROM {} WHERE datatype_id = $1",
            tables.datatype()
        );
        let row = conn
            .query_opt(select.as_str(), &[&datatype_id])
            .await
            .map_err(|e| StorageError::for_space(space_id, e))?;
        Ok(row.map(|row| {
            let uri: String = row.get(0);
            cache.put(&uri, datatype_id);
            uri
        }))
    }

    /// Counter snapshot of `space_id`'s datatype cache.
    ///
    /// Hits and misses are summed over both directions of the map: the
    /// uri→id side serves the write-path resolvers, the id→uri side serves
    /// every literal row the pattern iterator decodes.
    pub async fn datatype_cache_stats(&self, space_id: &str) -> CacheStats {
        let cache = self.datatype_cache(space_id);
        let cache = cache.lock().await;
        CacheStats {
            hits: cache.by_uri.hits() + cache.by_id.hits(),
            misses: cache.by_uri.misses() + cache.by_id.misses(),
            len: cache.by_uri.len().max(cache.by_id.len()),
            capacity: cache.by_uri.capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_derived_from_the_fragment_or_last_segment() {
        assert_eq!(
            datatype_label("http://www.w3.org/2001/XMLSchema#integer"),
            "integer"
        );
        assert_eq!(datatype_label("http://example.org/types/temperature"), "temperature");
        assert_eq!(datatype_label("opaque"), "opaque");
    }

    #[test]
    fn cache_round_trips_both_directions() {
        let mut cache = DatatypeCache::new(8);
        cache.put("http://www.w3.org/2001/XMLSchema#integer", 4);
        assert_eq!(
            cache.by_uri.get(&"http://www.w3.org/2001/XMLSchema#integer".to_owned()),
            Some(&4)
        );
        assert_eq!(
            cache.by_id.get(&4).map(String::as_str),
            Some("http://www.w3.org/2001/XMLSchema#integer")
        );
    }

    #[tokio::test]
    async fn stats_cover_both_directions() {
        let engine = crate::BedrockEngine::connect(rdf_bedrock_common::BedrockConfig::new(
            "host=localhost",
        ))
        .unwrap();
        let cache = engine.datatype_cache("s1");
        {
            let mut cache = cache.lock().await;
            cache.put("http://www.w3.org/2001/XMLSchema#integer", 4);
            let uri = "http://www.w3.org/2001/XMLSchema#integer".to_owned();
            assert!(cache.by_uri.get(&uri).is_some());
            assert!(cache.by_id.get(&4).is_some());
            assert!(cache.by_id.get(&99).is_none());
        }
        let stats = engine.datatype_cache_stats("s1").await;
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.len, 1);
    }
}
