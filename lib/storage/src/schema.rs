use rdf_bedrock_common::SpaceTables;

/// DDL generator for one space's table set.
///
/// The term and quad tables are list-partitioned by the `dataset` column so
/// that bulk ingest can publish a staged batch as a new partition; ordinary
/// traffic lives in the `*_primary` partitions (`dataset = 'primary'`).
pub struct SpaceSchema {
    tables: SpaceTables,
}

impl SpaceSchema {
    pub fn new(tables: SpaceTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &SpaceTables {
        &self.tables
    }

    fn partition_keyword(&self) -> &'static str {
        if self.tables.unlogged() {
            "UNLOGGED TABLE"
        } else {
            "TABLE"
        }
    }

    /// All statements creating the space, in dependency order.
    pub fn create_all(&self) -> Vec<String> {
        let mut statements = vec![
            // Trigram indexes on term_text need the extension.
            "CREATE EXTENSION IF NOT EXISTS pg_trgm".to_owned(),
        ];
        statements.extend(self.create_datatype_table());
        statements.extend(self.create_term_table());
        statements.extend(self.create_quad_table());
        statements.extend(self.create_namespace_table());
        statements.extend(self.create_graph_table());
        statements
    }

    fn create_datatype_table(&self) -> Vec<String> {
        let table = self.tables.datatype();
        vec![
            format!(
                "CREATE {} {table} (\n\
                 \x20   datatype_id BIGSERIAL PRIMARY KEY,\n\
                 \x20   datatype_uri TEXT NOT NULL UNIQUE,\n\
                 \x20   datatype_name TEXT,\n\
                 \x20   created_time TIMESTAMP DEFAULT CURRENT_TIMESTAMP\n\
                 )",
                self.partition_keyword()
            ),
            format!(
                "CREATE INDEX {} ON {table} (datatype_name)",
                self.tables.index_name("datatype_name")
            ),
        ]
    }

    fn create_term_table(&self) -> Vec<String> {
        let table = self.tables.term();
        let primary = SpaceTables::primary_partition(table);
        let mut statements = vec![
            format!(
                "CREATE TABLE {table} (\n\
                 \x20   term_uuid UUID NOT NULL,\n\
                 \x20   term_text TEXT NOT NULL,\n\
                 \x20   term_kind CHAR(1) NOT NULL CHECK (term_kind IN ('U', 'L', 'B', 'G')),\n\
                 \x20   lang VARCHAR(20),\n\
                 \x20   datatype_id BIGINT,\n\
                 \x20   created_time TIMESTAMP DEFAULT CURRENT_TIMESTAMP,\n\
                 \x20   dataset VARCHAR(50) NOT NULL DEFAULT 'primary',\n\
                 \x20   PRIMARY KEY (term_uuid, dataset)\n\
                 ) PARTITION BY LIST (dataset)"
            ),
            format!(
                "CREATE {} {primary} PARTITION OF {table} FOR VALUES IN ('primary')",
                self.partition_keyword()
            ),
        ];
        statements.extend(self.term_index_sql(false));
        statements
    }

    fn create_quad_table(&self) -> Vec<String> {
        let table = self.tables.rdf_quad();
        let primary = SpaceTables::primary_partition(table);
        let mut statements = vec![
            format!(
                "CREATE TABLE {table} (\n\
                 \x20   subject_uuid UUID NOT NULL,\n\
                 \x20   predicate_uuid UUID NOT NULL,\n\
                 \x20   object_uuid UUID NOT NULL,\n\
                 \x20   context_uuid UUID NOT NULL,\n\
                 \x20   quad_uuid UUID NOT NULL DEFAULT gen_random_uuid(),\n\
                 \x20   created_time TIMESTAMP DEFAULT CURRENT_TIMESTAMP,\n\
                 \x20   dataset VARCHAR(50) NOT NULL DEFAULT 'primary',\n\
                 \x20   PRIMARY KEY (subject_uuid, predicate_uuid, object_uuid, context_uuid, quad_uuid, dataset)\n\
                 ) PARTITION BY LIST (dataset)"
            ),
            format!(
                "CREATE {} {primary} PARTITION OF {table} FOR VALUES IN ('primary')",
                self.partition_keyword()
            ),
        ];
        statements.extend(self.quad_index_sql(false));
        statements
    }

    fn create_namespace_table(&self) -> Vec<String> {
        let table = self.tables.namespace();
        vec![format!(
            "CREATE {} {table} (\n\
             \x20   namespace_id BIGSERIAL PRIMARY KEY,\n\
             \x20   prefix VARCHAR(50) NOT NULL UNIQUE,\n\
             \x20   namespace_uri TEXT NOT NULL UNIQUE,\n\
             \x20   created_time TIMESTAMP DEFAULT CURRENT_TIMESTAMP\n\
             )",
            self.partition_keyword()
        )]
    }

    fn create_graph_table(&self) -> Vec<String> {
        let table = self.tables.graph();
        vec![format!(
            "CREATE {} {table} (\n\
             \x20   graph_id BIGSERIAL PRIMARY KEY,\n\
             \x20   graph_uri TEXT NOT NULL UNIQUE,\n\
             \x20   graph_name VARCHAR(255),\n\
             \x20   triple_count BIGINT DEFAULT 0,\n\
             \x20   created_time TIMESTAMP DEFAULT CURRENT_TIMESTAMP,\n\
             \x20   updated_time TIMESTAMP DEFAULT CURRENT_TIMESTAMP\n\
             )",
            self.partition_keyword()
        )]
    }

    fn term_index_sql(&self, concurrent: bool) -> Vec<String> {
        let keyword = if concurrent { "CONCURRENTLY " } else { "" };
        let table = self.tables.term();
        vec![
            format!(
                "CREATE INDEX {keyword}{} ON {table} (term_text)",
                self.tables.index_name("term_text")
            ),
            format!(
                "CREATE INDEX {keyword}{} ON {table} (term_kind)",
                self.tables.index_name("term_kind")
            ),
            format!(
                "CREATE INDEX {keyword}{} ON {table} (term_text, term_kind)",
                self.tables.index_name("term_text_kind")
            ),
            format!(
                "CREATE INDEX {keyword}{} ON {table} USING gin (term_text gin_trgm_ops)",
                self.tables.index_name("term_text_gin_trgm")
            ),
            format!(
                "CREATE INDEX {keyword}{} ON {table} USING gist (term_text gist_trgm_ops)",
                self.tables.index_name("term_text_gist_trgm")
            ),
        ]
    }

    fn quad_index_sql(&self, concurrent: bool) -> Vec<String> {
        let keyword = if concurrent { "CONCURRENTLY " } else { "" };
        let table = self.tables.rdf_quad();
        vec![
            format!(
                "CREATE INDEX {keyword}{} ON {table} (subject_uuid)",
                self.tables.index_name("quad_subject")
            ),
            format!(
                "CREATE INDEX {keyword}{} ON {table} (predicate_uuid)",
                self.tables.index_name("quad_predicate")
            ),
            format!(
                "CREATE INDEX {keyword}{} ON {table} (object_uuid)",
                self.tables.index_name("quad_object")
            ),
            format!(
                "CREATE INDEX {keyword}{} ON {table} (context_uuid)",
                self.tables.index_name("quad_context")
            ),
            format!(
                "CREATE INDEX {keyword}{} ON {table} (quad_uuid)",
                self.tables.index_name("quad_uuid")
            ),
            format!(
                "CREATE INDEX {keyword}{} ON {table} (subject_uuid, predicate_uuid, object_uuid, context_uuid)",
                self.tables.index_name("quad_spoc")
            ),
        ]
    }

    /// Index names on the term and quad tables, for the drop pass before a
    /// bulk load.
    fn index_names(&self) -> Vec<String> {
        [
            "term_text",
            "term_kind",
            "term_text_kind",
            "term_text_gin_trgm",
            "term_text_gist_trgm",
            "quad_subject",
            "quad_predicate",
            "quad_object",
            "quad_context",
            "quad_uuid",
            "quad_spoc",
        ]
        .iter()
        .map(|suffix| self.tables.index_name(suffix))
        .collect()
    }

    /// Statements dropping every term/quad index before a bulk load.
    pub fn drop_indexes(&self) -> Vec<String> {
        self.index_names()
            .into_iter()
            .map(|name| format!("DROP INDEX IF EXISTS {name}"))
            .collect()
    }

    /// Statements recreating the term/quad indexes.
    ///
    /// `concurrent` selects the non-blocking build for live tables; the bulk
    /// insert-fallback recreates inside its transaction and must pass
    /// `false` (a concurrent build cannot run in a transaction block).
    pub fn recreate_indexes(&self, concurrent: bool) -> Vec<String> {
        let mut statements = self.term_index_sql(concurrent);
        statements.extend(self.quad_index_sql(concurrent));
        statements
    }

    /// Statements clustering the primary partitions.
    ///
    /// The quad primary key leads with `subject_uuid` and the term primary
    /// key is `(term_uuid, dataset)`, so clustering each primary partition on
    /// its `_pkey` index realizes subject-order for quads and id-order for
    /// terms with deterministic index names.
    pub fn cluster(&self) -> Vec<String> {
        let term_primary = SpaceTables::primary_partition(self.tables.term());
        let quad_primary = SpaceTables::primary_partition(self.tables.rdf_quad());
        vec![
            format!("CLUSTER {term_primary} USING {term_primary}_pkey"),
            format!("CLUSTER {quad_primary} USING {quad_primary}_pkey"),
        ]
    }

    /// Statements dropping the whole space, in reverse dependency order.
    pub fn drop_all(&self) -> Vec<String> {
        self.tables
            .in_drop_order()
            .iter()
            .map(|table| format!("DROP TABLE IF EXISTS {table} CASCADE"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> SpaceSchema {
        SpaceSchema::new(SpaceTables::new("bedrock", "s1", false).unwrap())
    }

    #[test]
    fn create_all_covers_every_table_in_order() {
        let statements = schema().create_all();
        let joined = statements.join(";\n");
        let datatype = joined.find("bedrock__s1__datatype").unwrap();
        let term = joined.find("CREATE TABLE bedrock__s1__term").unwrap();
        let quad = joined.find("CREATE TABLE bedrock__s1__rdf_quad").unwrap();
        let namespace = joined.find("bedrock__s1__namespace").unwrap();
        let graph = joined.find("bedrock__s1__graph").unwrap();
        assert!(datatype < term && term < quad && quad < namespace && namespace < graph);
    }

    #[test]
    fn term_and_quad_tables_are_partitioned_by_dataset() {
        let statements = schema().create_all();
        let term = statements
            .iter()
            .find(|s| s.starts_with("CREATE TABLE bedrock__s1__term"))
            .unwrap();
        assert!(term.contains("PARTITION BY LIST (dataset)"));
        assert!(statements.iter().any(|s| {
            s.contains("bedrock__s1__term_primary PARTITION OF bedrock__s1__term")
                && s.contains("FOR VALUES IN ('primary')")
        }));
        let quad = statements
            .iter()
            .find(|s| s.starts_with("CREATE TABLE bedrock__s1__rdf_quad"))
            .unwrap();
        assert!(quad.contains("PARTITION BY LIST (dataset)"));
        assert!(quad.contains(
            "PRIMARY KEY (subject_uuid, predicate_uuid, object_uuid, context_uuid, quad_uuid, dataset)"
        ));
    }

    #[test]
    fn trigram_indexes_are_created_on_term_text() {
        let statements = schema().create_all();
        assert!(statements.iter().any(|s| s.contains("gin (term_text gin_trgm_ops)")));
        assert!(statements.iter().any(|s| s.contains("gist (term_text gist_trgm_ops)")));
        assert_eq!(statements[0], "CREATE EXTENSION IF NOT EXISTS pg_trgm");
    }

    #[test]
    fn drop_and_recreate_cover_the_same_indexes() {
        let schema = schema();
        let dropped = schema.drop_indexes();
        let recreated = schema.recreate_indexes(false);
        assert_eq!(dropped.len(), recreated.len());
        for statement in &dropped {
            assert!(statement.starts_with("DROP INDEX IF EXISTS idx_bedrock__s1__"));
        }
    }

    #[test]
    fn concurrent_flag_switches_index_builds() {
        let schema = schema();
        assert!(schema
            .recreate_indexes(true)
            .iter()
            .all(|s| s.starts_with("CREATE INDEX CONCURRENTLY ")));
        assert!(schema
            .recreate_indexes(false)
            .iter()
            .all(|s| !s.contains("CONCURRENTLY")));
    }

    #[test]
    fn cluster_targets_the_primary_partitions() {
        let statements = schema().cluster();
        assert_eq!(
            statements[0],
            "CLUSTER bedrock__s1__term_primary USING bedrock__s1__term_primary_pkey"
        );
        assert_eq!(
            statements[1],
            "CLUSTER bedrock__s1__rdf_quad_primary USING bedrock__s1__rdf_quad_primary_pkey"
        );
    }

    #[test]
    fn drop_all_reverses_creation_order() {
        let statements = schema().drop_all();
        assert!(statements[0].contains("graph"));
        assert!(statements[4].contains("datatype"));
        assert!(statements.iter().all(|s| s.ends_with("CASCADE")));
    }

    #[test]
    fn unlogged_schema_marks_partitions_unlogged() {
        let tables = SpaceTables::new("bedrock", "s1", true).unwrap();
        let statements = SpaceSchema::new(tables).create_all();
        assert!(statements.iter().any(|s| {
            s.contains("CREATE UNLOGGED TABLE bedrock__s1__term_unlogged_primary")
        }));
    }
}
