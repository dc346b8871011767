use paperdex_core::persist::SnapshotPaths;
use paperdex_core::{ContextTag, Corpus, QueryRequest, RagConfig, RagError, RankBy, Strategy};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn open(dir: &Path) -> Corpus {
    Corpus::open(RagConfig::new(dir))
}

fn meta(v: Value) -> Option<Map<String, Value>> {
    v.as_object().cloned()
}

fn two_papers(corpus: &Corpus) {
    assert!(corpus.ingest("paper1", "graphs algorithms sorting", None).unwrap().is_persisted());
    assert!(corpus.ingest("paper2", "neural networks training data", None).unwrap().is_persisted());
}

#[test]
fn keyword_query_ranks_matching_paper_only() {
    let dir = tempdir().unwrap();
    let corpus = open(dir.path());
    two_papers(&corpus);

    let results = corpus.query(&QueryRequest::new("sorting algorithms", 5).strategy(Strategy::Keyword));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].doc_id, "paper1");
    assert_eq!(results[0].keyword_score, Some(7 + 10));
    assert_eq!(results[0].similarity, None);
    assert_eq!(results[0].excerpt, "graphs algorithms sorting");
}

#[test]
fn hybrid_query_orders_by_requested_signal() {
    let dir = tempdir().unwrap();
    let corpus = open(dir.path());
    two_papers(&corpus);

    let results = corpus.query(&QueryRequest::new("sorting algorithms", 5));
    assert_eq!(results[0].doc_id, "paper1");
    assert!(results[0].similarity.unwrap() > 0.1);
    assert!(results[0].keyword_score.unwrap() > 0);
    // positional vectors give paper2 a similarity too, but no keyword score
    assert!(results.iter().skip(1).all(|r| r.keyword_score.is_none()));

    let results = corpus.query(&QueryRequest::new("sorting algorithms", 1).rank_by(RankBy::KeywordFirst));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].doc_id, "paper1");

    assert!(corpus.query(&QueryRequest::new("sorting", 0)).is_empty());
    assert!(corpus.query(&QueryRequest::new("", 5)).is_empty());
}

#[test]
fn every_document_finds_itself() {
    let dir = tempdir().unwrap();
    let corpus = open(dir.path());
    let docs = [
        ("a", "alpha beta gamma"),
        ("b", "delta epsilon"),
        ("c", "transformers attention attention heads layers"),
    ];
    for (id, body) in docs {
        let _ = corpus.ingest(id, body, None).unwrap();
    }
    for (id, body) in docs {
        let hits = corpus.query(&QueryRequest::new(body, 10).strategy(Strategy::Vector));
        let top = hits[0].similarity.unwrap();
        let own = hits.iter().find(|h| h.doc_id == id).expect("document missing from its own query");
        assert!(own.similarity.unwrap() > 0.1);
        assert!((own.similarity.unwrap() - top).abs() < 1e-9);
    }
}

#[test]
fn reload_reproduces_list_and_overview() {
    let dir = tempdir().unwrap();
    let (list, overview) = {
        let corpus = open(dir.path());
        two_papers(&corpus);
        let _ = corpus.ingest("refs.ris", "AU - Smith, J.\nPY - 2020", meta(json!({"source": "upload"}))).unwrap();
        (corpus.list(), corpus.overview())
    };

    let reopened = open(dir.path());
    assert_eq!(reopened.list(), list);
    assert_eq!(reopened.overview(), overview);
    assert_eq!(reopened.meta("refs.ris").unwrap().extra.get("source"), Some(&json!("upload")));
    let top = reopened.query(&QueryRequest::new("sorting algorithms", 1).rank_by(RankBy::KeywordFirst));
    assert_eq!(top[0].doc_id, "paper1");
}

#[test]
fn reingest_is_idempotent() {
    let dir = tempdir().unwrap();
    let corpus = open(dir.path());
    let _ = corpus.ingest("p", "same text twice", meta(json!({"pages": 3}))).unwrap();
    let first = corpus.meta("p").unwrap();
    let _ = corpus.ingest("p", "same text twice", meta(json!({"pages": 3}))).unwrap();
    let second = corpus.meta("p").unwrap();

    assert_eq!(corpus.len(), 1);
    assert_eq!(first.content_length, second.content_length);
    assert_eq!(first.word_count, second.word_count);
    assert_eq!(first.extra, second.extra);
    assert_eq!(corpus.query(&QueryRequest::new("same text twice", 10).strategy(Strategy::Vector)).len(), 1);
}

#[test]
fn replacing_content_updates_both_indexes() {
    let dir = tempdir().unwrap();
    let corpus = open(dir.path());
    let _ = corpus.ingest("p", "quantum chromodynamics lattice", None).unwrap();
    let _ = corpus.ingest("p", "protein folding", None).unwrap();

    assert!(corpus.query(&QueryRequest::new("quantum", 5).strategy(Strategy::Keyword)).is_empty());
    let hits = corpus.query(&QueryRequest::new("protein folding", 5));
    assert_eq!(hits.len(), 1);
    assert!(hits[0].keyword_score.is_some() && hits[0].similarity.is_some());
}

#[test]
fn remove_and_clear() {
    let dir = tempdir().unwrap();
    let corpus = open(dir.path());
    two_papers(&corpus);

    let before = corpus.overview();
    assert!(corpus.remove("no-such-paper").is_persisted());
    assert_eq!(corpus.len(), 2);
    assert_eq!(corpus.overview(), before);

    assert!(corpus.remove("paper1").is_persisted());
    assert!(matches!(corpus.get("paper1"), Err(RagError::NotFound { .. })));
    assert!(corpus.query(&QueryRequest::new("graphs algorithms sorting", 5)).iter().all(|r| r.doc_id != "paper1"));

    assert!(corpus.clear().is_persisted());
    assert!(corpus.is_empty());
    assert!(open(dir.path()).is_empty());
}

#[test]
fn blank_doc_id_is_rejected() {
    let dir = tempdir().unwrap();
    let corpus = open(dir.path());
    assert!(matches!(corpus.ingest("  ", "text", None), Err(RagError::InvalidInput(_))));
    assert!(corpus.is_empty());
}

#[test]
fn failed_snapshot_keeps_memory_state() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, b"occupied").unwrap();

    let corpus = open(&blocker);
    let durability = corpus.ingest("p", "kept in memory", None).unwrap();
    assert!(!durability.is_persisted());
    assert_eq!(durability.errors().len(), 2);
    assert!(durability.errors().iter().all(RagError::is_persistence));
    assert_eq!(corpus.get("p").unwrap(), "kept in memory");
}

#[test]
fn missing_vectors_are_rebuilt_on_open() {
    let dir = tempdir().unwrap();
    {
        let corpus = open(dir.path());
        two_papers(&corpus);
    }
    let paths = SnapshotPaths::new(dir.path());
    fs::remove_file(paths.vectors()).unwrap();

    let corpus = open(dir.path());
    let hits = corpus.query(&QueryRequest::new("graphs algorithms sorting", 5).strategy(Strategy::Vector));
    assert_eq!(hits[0].doc_id, "paper1");
    assert!(paths.vectors().exists());
}

#[test]
fn corrupt_snapshot_starts_empty() {
    let dir = tempdir().unwrap();
    let paths = SnapshotPaths::new(dir.path());
    fs::write(paths.documents(), b"{\"documents\": [").unwrap();
    let corpus = open(dir.path());
    assert!(corpus.is_empty());
    assert!(corpus.ingest("p", "fresh start", None).unwrap().is_persisted());
}

#[test]
fn damaged_snapshot_is_set_aside_not_overwritten() {
    let dir = tempdir().unwrap();
    {
        let corpus = open(dir.path());
        assert!(corpus.ingest("paper1", "graphs algorithms sorting", None).unwrap().is_persisted());
    }
    let paths = SnapshotPaths::new(dir.path());
    let mut bytes = fs::read(paths.documents()).unwrap();
    bytes.truncate(bytes.len() - 2);
    fs::write(paths.documents(), &bytes).unwrap();
    let vectors_before = fs::read(paths.vectors()).unwrap();

    let corpus = open(dir.path());
    assert!(corpus.is_empty());
    let aside = dir.path().join("metadata.json.corrupt");
    assert_eq!(fs::read(&aside).unwrap(), bytes);
    // nothing was written back on open
    assert!(!paths.documents().exists());
    assert_eq!(fs::read(paths.vectors()).unwrap(), vectors_before);
}

#[test]
fn context_is_tagged_for_prompting() {
    let dir = tempdir().unwrap();
    let corpus = open(dir.path());
    let _ = corpus.ingest("refs.ris", "AU - Smith, J.\nTI - Graph sorting\nJO - Journal of Algorithms", None).unwrap();
    let _ = corpus.ingest("scan.pdf", "partial extraction of graph sorting results", None).unwrap();

    let ctx = corpus.retrieve_context("graph sorting", 1, 1000);
    assert_eq!(ctx.sources.len(), 1);
    let expected = if ctx.sources[0] == "refs.ris" { ContextTag::CitationMetadata } else { ContextTag::DegradedExtraction };
    assert_eq!(ctx.tag, expected);

    let results = corpus.query(&QueryRequest::new("graph sorting", 5).strategy(Strategy::Keyword));
    let ctx = corpus.assemble_context(&results, 20);
    assert!(ctx.text.chars().count() <= 20);
    assert!(ctx.truncated);
}

#[test]
fn readers_never_see_half_written_documents() {
    let dir = tempdir().unwrap();
    let corpus = open(dir.path());
    std::thread::scope(|s| {
        s.spawn(|| {
            for i in 0..20 {
                let _ = corpus.ingest(&format!("doc{i}"), &format!("shared topic number{i} words"), None).unwrap();
            }
        });
        for _ in 0..2 {
            s.spawn(|| {
                for _ in 0..20 {
                    for r in corpus.query(&QueryRequest::new("shared topic words", 50)) {
                        assert!(r.similarity.is_some() && r.keyword_score.is_some(), "{} seen in one index only", r.doc_id);
                    }
                }
            });
        }
    });
    assert_eq!(corpus.len(), 20);
}
