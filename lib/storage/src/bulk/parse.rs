use oxttl::ntriples::NTriplesParser;
use oxttl::TurtleParseError;
use rdf_bedrock_common::{LruMap, StorageError, StorageResult};
use rdf_bedrock_model::{term_uuid, Term, TermKind};
use std::io::Read;
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Triples per `import_batch_id` bucket in the staging table.
const PARSE_BATCH_SIZE: u64 = 50_000;

/// The staging CSV column order. The COPY column list must match exactly.
pub(crate) const CSV_COLUMNS: &str = "subject_text, predicate_text, object_text, \
     object_datatype, object_language, is_literal, graph_text, import_batch_id, \
     subject_uuid, predicate_uuid, object_uuid, context_uuid, processing_status, dataset";

fn map_parse_error(error: TurtleParseError) -> StorageError {
    match error {
        TurtleParseError::Syntax(syntax) => StorageError::Parse {
            line: syntax.location().start.line + 1,
            message: syntax.to_string(),
        },
        TurtleParseError::Io(io) => StorageError::Io(io),
    }
}

/// Phase 2: stream-parses N-Triples into the staging CSV, assigning the
/// final term UUIDs during parsing.
///
/// UUID assignment is memoized by `(text, kind, lang)` in a bounded LRU;
/// repeated subjects and predicates dominate real datasets, so the memo
/// carries most of the hashing cost. No database round trip happens here.
pub(crate) fn convert_ntriples_to_csv<R: Read>(
    input: R,
    graph_uri: &str,
    dataset_value: &str,
    memo_capacity: usize,
) -> StorageResult<(NamedTempFile, u64)> {
    let file = NamedTempFile::new()?;
    // Every field is quoted so that empty strings survive the COPY's
    // `NULL ''` setting as empty strings, not NULLs.
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(file);

    let mut memo: LruMap<(String, TermKind, Option<String>), Uuid> =
        LruMap::new(memo_capacity);
    let mut uuid_for = move |text: &str, kind: TermKind, lang: Option<&str>| -> Uuid {
        let key = (text.to_owned(), kind, lang.map(str::to_owned));
        if let Some(uuid) = memo.get(&key) {
            return *uuid;
        }
        let uuid = term_uuid(text, kind, lang, None);
        memo.insert(key, uuid);
        uuid
    };

    let context_uuid = uuid_for(graph_uri, TermKind::Uri, None).to_string();
    let mut total: u64 = 0;

    for triple in NTriplesParser::new().for_reader(input) {
        let triple = triple.map_err(map_parse_error)?;

        let subject_text = match &triple.subject {
            rdf_bedrock_model::Subject::NamedNode(node) => node.as_str().to_owned(),
            rdf_bedrock_model::Subject::BlankNode(node) => node.as_str().to_owned(),
            #[allow(unreachable_patterns)]
            other => other.to_string(),
        };
        let predicate_text = triple.predicate.as_str().to_owned();

        let (object_text, object_datatype, object_language, is_literal) = match &triple.object
        {
            Term::Literal(literal) => match literal.language() {
                Some(lang) => (
                    literal.value().to_owned(),
                    String::new(),
                    lang.to_owned(),
                    true,
                ),
                None => (
                    literal.value().to_owned(),
                    literal.datatype().as_str().to_owned(),
                    String::new(),
                    true,
                ),
            },
            Term::NamedNode(node) => (node.as_str().to_owned(), String::new(), String::new(), false),
            other => (other.to_string(), String::new(), String::new(), false),
        };

        let subject_uuid = uuid_for(&subject_text, TermKind::Uri, None).to_string();
        let predicate_uuid = uuid_for(&predicate_text, TermKind::Uri, None).to_string();
        let object_kind = if is_literal { TermKind::Literal } else { TermKind::Uri };
        let object_lang = if object_language.is_empty() {
            None
        } else {
            Some(object_language.as_str())
        };
        let object_uuid = uuid_for(&object_text, object_kind, object_lang).to_string();

        let import_batch_id = format!("batch_{}", total / PARSE_BATCH_SIZE);
        writer
            .write_record([
            subject_text.as_str(),
            predicate_text.as_str(),
            object_text.as_str(),
            object_datatype.as_str(),
            object_language.as_str(),
            if is_literal { "true" } else { "false" },
            graph_uri,
            import_batch_id.as_str(),
            subject_uuid.as_str(),
            predicate_uuid.as_str(),
            object_uuid.as_str(),
            context_uuid.as_str(),
            "processed",
            dataset_value,
        ])
            .map_err(StorageError::other)?;
        total += 1;
        if total % 100_000 == 0 {
            tracing::debug!(total, "triples converted to staging CSV");
        }
    }

    let file = writer
        .into_inner()
        .map_err(|error| StorageError::other(error.to_string()))?;
    tracing::info!(total, "N-Triples converted to staging CSV");
    Ok((file, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    const SAMPLE: &str = "\
<http://ex/alice> <http://ex/name> \"Alice\"@en .\n\
<http://ex/alice> <http://ex/age> \"30\"^^<http://www.w3.org/2001/XMLSchema#integer> .\n\
<http://ex/bob> <http://ex/knows> <http://ex/alice> .\n";

    fn read_csv(file: &mut NamedTempFile) -> String {
        use std::io::Seek as _;
        let file = file.as_file_mut();
        file.rewind().unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        content
    }

    #[test]
    fn converts_each_statement_to_one_row() {
        let (mut file, total) =
            convert_ntriples_to_csv(SAMPLE.as_bytes(), "http://ex/g", "import-abc", 1024)
                .unwrap();
        assert_eq!(total, 3);
        let content = read_csv(&mut file);
        assert_eq!(content.lines().count(), 3);
        assert!(content.contains("\"Alice\""));
        assert!(content.contains("\"en\""));
        assert!(content.contains("\"http://www.w3.org/2001/XMLSchema#integer\""));
        assert!(content.contains("\"import-abc\""));
    }

    #[test]
    fn literal_and_uri_objects_are_discriminated() {
        let (mut file, _) =
            convert_ntriples_to_csv(SAMPLE.as_bytes(), "http://ex/g", "import-abc", 1024)
                .unwrap();
        let content = read_csv(&mut file);
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines[0].contains("\"true\""));
        assert!(lines[2].contains("\"false\""));
    }

    #[test]
    fn uuids_match_the_identity_function() {
        let (mut file, _) =
            convert_ntriples_to_csv(SAMPLE.as_bytes(), "http://ex/g", "import-abc", 1024)
                .unwrap();
        let content = read_csv(&mut file);
        let expected = term_uuid("http://ex/alice", TermKind::Uri, None, None).to_string();
        assert!(content.contains(&expected));
        let tagged = term_uuid("Alice", TermKind::Literal, Some("en"), None).to_string();
        assert!(content.contains(&tagged));
    }

    #[test]
    fn syntax_errors_carry_the_line_number() {
        let bad = "<http://ex/a> <http://ex/b> .\n";
        let error =
            convert_ntriples_to_csv(bad.as_bytes(), "http://ex/g", "import-abc", 16).unwrap_err();
        match error {
            StorageError::Parse { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {other}"),
        }
    }
}
