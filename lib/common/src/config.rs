use serde::Deserialize;

/// Sizing for one connection pool.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Upper bound on open connections.
    pub max_size: usize,
    /// Number of connections opened (and pinged) during warmup.
    pub warmup: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 16,
            warmup: 4,
        }
    }
}

/// Engine configuration. All state that the original system kept in
/// module-level singletons lives here and is injected into the components.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BedrockConfig {
    /// PostgreSQL connection string, e.g. `host=localhost user=bedrock dbname=rdf`.
    pub connection_string: String,
    /// Global prefix for all per-space table names.
    pub global_prefix: String,
    /// Create per-space tables `UNLOGGED` (throughput-first deployments that
    /// can afford to lose the tables on a crash).
    pub unlogged_tables: bool,
    /// Pool used by write and bulk paths.
    pub write_pool: PoolSettings,
    /// Pool used by streaming read paths.
    pub read_pool: PoolSettings,
    /// Rows fetched per `FETCH FORWARD` page of the pattern iterator.
    pub fetch_page_size: usize,
    /// Entry bound of the per-space datatype cache.
    pub datatype_cache_capacity: usize,
    /// Entry bound of the bulk loader's parse-time term UUID memo.
    pub parse_uuid_cache_capacity: usize,
    /// Quads per `DELETE ... = ANY` statement in batch removes.
    pub remove_batch_chunk: usize,
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            global_prefix: "bedrock".to_owned(),
            unlogged_tables: false,
            write_pool: PoolSettings::default(),
            read_pool: PoolSettings::default(),
            fetch_page_size: 1000,
            datatype_cache_capacity: 1000,
            parse_uuid_cache_capacity: 100_000,
            remove_batch_chunk: 1000,
        }
    }
}

impl BedrockConfig {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            ..Self::default()
        }
    }

    pub fn with_global_prefix(mut self, global_prefix: impl Into<String>) -> Self {
        self.global_prefix = global_prefix.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_tuning() {
        let config = BedrockConfig::default();
        assert_eq!(config.fetch_page_size, 1000);
        assert_eq!(config.datatype_cache_capacity, 1000);
        assert_eq!(config.remove_batch_chunk, 1000);
        assert_eq!(config.global_prefix, "bedrock");
        assert!(!config.unlogged_tables);
    }

    #[test]
    fn deserializes_with_partial_fields() {
        let config: BedrockConfig = serde_json::from_str(
            r#"{"connection_string": "host=db", "global_prefix": "vg", "write_pool": {"max_size": 8}}"#,
        )
        .unwrap();
        assert_eq!(config.global_prefix, "vg");
        assert_eq!(config.write_pool.max_size, 8);
        assert_eq!(config.write_pool.warmup, 4);
        assert_eq!(config.fetch_page_size, 1000);
    }
}
