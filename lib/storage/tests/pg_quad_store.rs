//! Integration tests against a live PostgreSQL.
//!
//! These are ignored by default; point `BEDROCK_TEST_DSN` at a scratch
//! database and run with `cargo test -- --ignored` to exercise them.

use rdf_bedrock_common::{BedrockConfig, SignalSink};
use rdf_bedrock_model::{
    vocab::xsd, GraphName, Literal, NamedNode, Quad, QuadPattern, RegexTerm, Term,
};
use rdf_bedrock_storage::{BedrockEngine, CountUpdate};
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

fn test_config() -> BedrockConfig {
    let dsn = std::env::var("BEDROCK_TEST_DSN")
        .unwrap_or_else(|_| "host=localhost user=postgres dbname=bedrock_test".to_owned());
    BedrockConfig::new(dsn).with_global_prefix("bedrockit")
}

fn engine() -> BedrockEngine {
    BedrockEngine::connect(test_config()).unwrap()
}

async fn fresh_space(engine: &BedrockEngine, space_id: &str) {
    engine.delete_space_tables(space_id).await.unwrap();
    engine.create_space_tables(space_id).await.unwrap();
}

fn graph() -> GraphName {
    GraphName::NamedNode(NamedNode::new("http://ex/g").unwrap())
}

fn age_quad() -> Quad {
    Quad::new(
        NamedNode::new("http://ex/alice").unwrap(),
        NamedNode::new("http://ex/age").unwrap(),
        Literal::new_typed_literal("30", xsd::INTEGER),
        graph(),
    )
}

fn name_quad(subject: &str, name: &str, lang: Option<&str>) -> Quad {
    let object = match lang {
        Some(lang) => Literal::new_language_tagged_literal(name, lang).unwrap(),
        None => Literal::new_simple_literal(name),
    };
    Quad::new(
        NamedNode::new(subject).unwrap(),
        NamedNode::new("http://ex/name").unwrap(),
        object,
        graph(),
    )
}

async fn collect_quads(engine: &BedrockEngine, space_id: &str, pattern: &QuadPattern) -> Vec<Quad> {
    let mut stream = engine.match_quads(space_id, pattern).await.unwrap();
    let mut quads = Vec::new();
    while let Some(item) = stream.next().await {
        quads.push(item.unwrap().quad);
    }
    quads
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (set BEDROCK_TEST_DSN)"]
async fn single_add_and_remove_with_typed_literal() {
    let engine = engine();
    fresh_space(&engine, "it1").await;

    let quad = age_quad();
    assert!(engine.add_quad("it1", quad.as_ref(), None).await.unwrap());
    assert_eq!(engine.count_quads("it1", None).await.unwrap(), 1);
    assert_eq!(
        engine
            .count_quads_by_graph_uri("it1", Some("http://ex/g"))
            .await
            .unwrap(),
        1
    );

    let pattern = QuadPattern::any()
        .with_subject(Term::from(NamedNode::new("http://ex/alice").unwrap()));
    let found = collect_quads(&engine, "it1", &pattern).await;
    assert_eq!(found, vec![quad.clone()]);

    assert!(engine.remove_quad("it1", quad.as_ref(), None).await.unwrap());
    assert_eq!(engine.count_quads("it1", None).await.unwrap(), 0);
    // Removing again reports false, not an error.
    assert!(!engine.remove_quad("it1", quad.as_ref(), None).await.unwrap());
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (set BEDROCK_TEST_DSN)"]
async fn language_tagged_literals_are_distinct_terms() {
    let engine = engine();
    fresh_space(&engine, "it2").await;

    let english = name_quad("http://ex/alice", "Alice", Some("en"));
    let french = name_quad("http://ex/alice", "Alice", Some("fr"));
    let inserted = engine
        .add_quads_batch("it2", &[english.clone(), french.clone()], None, true, false)
        .await
        .unwrap();
    assert_eq!(inserted, 2);
    assert_eq!(engine.count_quads("it2", None).await.unwrap(), 2);

    let pattern = QuadPattern::any().with_object(Term::from(
        Literal::new_language_tagged_literal("Alice", "en").unwrap(),
    ));
    let found = collect_quads(&engine, "it2", &pattern).await;
    assert_eq!(found, vec![english]);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (set BEDROCK_TEST_DSN)"]
async fn regex_subject_pattern_matches_backend_side() {
    let engine = engine();
    fresh_space(&engine, "it3").await;

    let quads: Vec<Quad> = ["alice", "bob", "carol"]
        .iter()
        .map(|name| name_quad(&format!("http://ex/{name}"), "X", None))
        .collect();
    engine
        .add_quads_batch("it3", &quads, None, true, false)
        .await
        .unwrap();

    let pattern =
        QuadPattern::any().with_subject(RegexTerm::new("^http://ex/[ab]").unwrap());
    let found = collect_quads(&engine, "it3", &pattern).await;
    assert_eq!(found.len(), 2);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (set BEDROCK_TEST_DSN)"]
async fn duplicates_are_kept_and_removed_one_at_a_time() {
    let engine = engine();
    fresh_space(&engine, "it4").await;

    let quad = age_quad();
    engine.add_quad("it4", quad.as_ref(), None).await.unwrap();
    engine.add_quad("it4", quad.as_ref(), None).await.unwrap();
    assert_eq!(engine.count_quads("it4", None).await.unwrap(), 2);

    assert!(engine.remove_quad("it4", quad.as_ref(), None).await.unwrap());
    assert_eq!(engine.count_quads("it4", None).await.unwrap(), 1);
}

#[derive(Default)]
struct RecordingSink {
    emitted: Mutex<Vec<(String, Value)>>,
}

impl SignalSink for RecordingSink {
    fn emit(&self, channel: &str, payload: &Value) {
        self.emitted
            .lock()
            .unwrap()
            .push((channel.to_owned(), payload.clone()));
    }
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (set BEDROCK_TEST_DSN)"]
async fn implicit_graph_creation_emits_one_signal() {
    let sink = Arc::new(RecordingSink::default());
    let engine =
        BedrockEngine::connect_with_signals(test_config(), Arc::clone(&sink) as Arc<dyn SignalSink>)
            .unwrap();
    fresh_space(&engine, "it5").await;
    sink.emitted.lock().unwrap().clear();

    let quad = Quad::new(
        NamedNode::new("http://ex/alice").unwrap(),
        NamedNode::new("http://ex/name").unwrap(),
        Literal::new_simple_literal("Alice"),
        GraphName::NamedNode(NamedNode::new("http://ex/new").unwrap()),
    );
    engine
        .add_quads_batch("it5", &[quad.clone()], None, true, false)
        .await
        .unwrap();

    assert!(engine.get_graph("it5", "http://ex/new").await.unwrap().is_some());
    let created: Vec<_> = sink
        .emitted
        .lock()
        .unwrap()
        .iter()
        .filter(|(channel, payload)| channel == "graph" && payload["type"] == "created")
        .cloned()
        .collect();
    assert_eq!(created.len(), 1);

    // A second write to the same graph creates nothing new.
    engine
        .add_quads_batch("it5", &[quad], None, true, false)
        .await
        .unwrap();
    let created = sink
        .emitted
        .lock()
        .unwrap()
        .iter()
        .filter(|(channel, payload)| channel == "graph" && payload["type"] == "created")
        .count();
    assert_eq!(created, 1);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (set BEDROCK_TEST_DSN)"]
async fn datatype_bootstrap_is_idempotent() {
    let engine = engine();
    fresh_space(&engine, "it6").await;

    // Space creation already bootstrapped; the second run inserts nothing.
    let inserted = engine.bootstrap_standard_datatypes("it6").await.unwrap();
    assert_eq!(inserted, 0);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (set BEDROCK_TEST_DSN)"]
async fn batch_insert_is_equivalent_to_single_inserts() {
    let engine = engine();
    fresh_space(&engine, "it7a").await;
    fresh_space(&engine, "it7b").await;

    let quads = vec![
        age_quad(),
        name_quad("http://ex/alice", "Alice", Some("en")),
        name_quad("http://ex/bob", "Bob", None),
    ];
    engine
        .add_quads_batch("it7a", &quads, None, true, false)
        .await
        .unwrap();
    for quad in &quads {
        engine.add_quad("it7b", quad.as_ref(), None).await.unwrap();
    }

    let mut via_batch = collect_quads(&engine, "it7a", &QuadPattern::any()).await;
    let mut via_single = collect_quads(&engine, "it7b", &QuadPattern::any()).await;
    via_batch.sort_by_key(|quad| quad.to_string());
    via_single.sort_by_key(|quad| quad.to_string());
    assert_eq!(via_batch, via_single);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (set BEDROCK_TEST_DSN)"]
async fn writes_to_one_space_leave_others_untouched() {
    let engine = engine();
    fresh_space(&engine, "it8a").await;
    fresh_space(&engine, "it8b").await;

    engine.add_quad("it8a", age_quad().as_ref(), None).await.unwrap();
    assert_eq!(engine.count_quads("it8a", None).await.unwrap(), 1);
    assert_eq!(engine.count_quads("it8b", None).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (set BEDROCK_TEST_DSN)"]
async fn clear_preserves_the_registry_row_and_drop_removes_it() {
    let engine = engine();
    fresh_space(&engine, "it9").await;

    engine.add_quad("it9", age_quad().as_ref(), None).await.unwrap();
    engine
        .update_graph_triple_count("it9", "http://ex/g", CountUpdate::Absolute(1))
        .await
        .unwrap();

    assert!(engine.clear_graph("it9", "http://ex/g").await.unwrap());
    assert_eq!(engine.count_quads("it9", None).await.unwrap(), 0);
    let record = engine.get_graph("it9", "http://ex/g").await.unwrap().unwrap();
    assert_eq!(record.triple_count, 0);

    assert!(engine.drop_graph("it9", "http://ex/g").await.unwrap());
    assert!(engine.get_graph("it9", "http://ex/g").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (set BEDROCK_TEST_DSN)"]
async fn remove_by_subject_uris_honors_the_graph_filter() {
    let engine = engine();
    fresh_space(&engine, "it10").await;

    let other_graph = Quad::new(
        NamedNode::new("http://ex/alice").unwrap(),
        NamedNode::new("http://ex/name").unwrap(),
        Literal::new_simple_literal("Alice"),
        GraphName::NamedNode(NamedNode::new("http://ex/other").unwrap()),
    );
    engine
        .add_quads_batch(
            "it10",
            &[age_quad(), name_quad("http://ex/bob", "Bob", None), other_graph],
            None,
            true,
            false,
        )
        .await
        .unwrap();

    let removed = engine
        .remove_quads_by_subjects(
            "it10",
            &["http://ex/alice".to_owned()],
            Some("http://ex/g"),
            None,
        )
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(engine.count_quads("it10", None).await.unwrap(), 2);

    let removed = engine
        .remove_quads_by_subjects("it10", &["http://ex/alice".to_owned()], None, None)
        .await
        .unwrap();
    assert_eq!(removed, 1);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (set BEDROCK_TEST_DSN)"]
async fn transactions_accumulate_stats_and_roll_back() {
    let engine = engine();
    fresh_space(&engine, "it11").await;

    let tx = engine.begin_transaction().await.unwrap();
    engine
        .add_quads_batch("it11", &[age_quad()], Some(&tx), true, false)
        .await
        .unwrap();
    let stats = tx.stats();
    assert_eq!(stats.quads_added, 1);
    assert!(stats.terms_added >= 4);
    tx.rollback().await.unwrap();
    assert_eq!(engine.count_quads("it11", None).await.unwrap(), 0);

    let tx = engine.begin_transaction().await.unwrap();
    engine
        .add_quads_batch("it11", &[age_quad()], Some(&tx), true, false)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(engine.count_quads("it11", None).await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (set BEDROCK_TEST_DSN)"]
async fn namespaces_upsert_by_prefix() {
    let engine = engine();
    fresh_space(&engine, "it12").await;

    let first = engine
        .add_namespace("it12", "ex", "http://example.org/")
        .await
        .unwrap();
    let second = engine
        .add_namespace("it12", "ex", "http://example.org/v2/")
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(
        engine.get_namespace_uri("it12", "ex").await.unwrap().as_deref(),
        Some("http://example.org/v2/")
    );
    assert_eq!(engine.list_namespaces("it12").await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (set BEDROCK_TEST_DSN)"]
async fn bulk_ingest_round_trips_and_counts_match() -> anyhow::Result<()> {
    let engine = engine();
    fresh_space(&engine, "it13").await;

    // 1,000 statements over 100 subjects and 2 predicates.
    let mut ntriples = String::new();
    for i in 0..1000 {
        let subject = i % 100;
        let predicate = if i % 2 == 0 { "p0" } else { "p1" };
        writeln!(
            ntriples,
            "<http://ex/s{subject}> <http://ex/{predicate}> \"v{i}\" ."
        )?;
    }

    let before = engine.count_quads("it13", None).await?;
    let target = NamedNode::new("http://ex/bulk")?;
    let stats = engine
        .bulk_load_ntriples("it13", ntriples.as_bytes(), target.as_ref())
        .await?;
    assert_eq!(stats.total_triples, 1000);
    assert_eq!(stats.loaded_rows, 1000);

    // Partition attach conservation: everything staged is now visible.
    let after = engine.count_quads("it13", None).await?;
    assert_eq!(after, before + 1000);

    let pattern = QuadPattern::any()
        .with_predicate(Term::from(NamedNode::new("http://ex/p0")?));
    let found = collect_quads(&engine, "it13", &pattern).await;
    assert_eq!(found.len(), 500);

    assert!(engine.get_graph("it13", "http://ex/bulk").await?.is_some());
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (set BEDROCK_TEST_DSN)"]
async fn space_lifecycle_listing_and_existence() -> anyhow::Result<()> {
    let engine = engine();
    fresh_space(&engine, "it14").await;

    assert!(engine.space_exists("it14").await?);
    assert!(engine.list_spaces().await?.contains(&"it14".to_owned()));

    engine.delete_space_tables("it14").await?;
    assert!(!engine.space_exists("it14").await?);

    let error = engine.count_quads("it14", None).await.unwrap_err();
    assert_eq!(error.to_string(), "Invalid space 'it14' does not exist");
    Ok(())
}
