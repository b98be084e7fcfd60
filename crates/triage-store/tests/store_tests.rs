use std::sync::Arc;

use triage_core::data_processor::SourceRecord;
use triage_core::traits::DocumentStore;
use triage_core::types::{Category, Document, Fusion, RetrievalMode, SparseVector, TopicFilter};
use triage_embed::FakeEmbedder;
use triage_store::{InMemoryDocumentStore, Ingestor};
use triage_text::LexicalEncoder;

const DIM: usize = 256;

fn record(content: &str, category: Category) -> SourceRecord {
    SourceRecord { content: content.to_string(), category }
}

fn corpus() -> Vec<SourceRecord> {
    vec![
        record("The password reset email never arrived.", Category::Feedbacks),
        record("Dark mode looks great on the new dashboard.", Category::Feedbacks),
        record("Search is slow when many filters are applied.", Category::Feedbacks),
        record("Login page crashes after entering the password.", Category::Bugs),
        record("Export to CSV drops the last row.", Category::Bugs),
    ]
}

async fn seeded(mode: RetrievalMode) -> InMemoryDocumentStore {
    let dense = Arc::new(FakeEmbedder::new(DIM));
    let sparse = Arc::new(LexicalEncoder::new());
    let store = InMemoryDocumentStore::new(dense.clone(), sparse.clone()).with_mode(mode);
    let count = Ingestor::new(dense, sparse).ingest(&store, &corpus()).await.expect("ingest");
    assert_eq!(count, 5);
    store
}

#[tokio::test]
async fn filter_restricts_to_selected_category() {
    let store = seeded(RetrievalMode::Hybrid).await;
    let filter = TopicFilter::new(false, true, "crash report");
    let docs = store.search("password crash", &filter, 10, Fusion::RankSum).await.unwrap();
    assert_eq!(docs.len(), 2);
    assert!(docs.iter().all(|d| d.category == Category::Bugs));
    assert_eq!(docs[0].content, "Login page crashes after entering the password.");
}

#[tokio::test]
async fn both_false_matches_both_true_candidates() {
    let store = seeded(RetrievalMode::Hybrid).await;
    let none = TopicFilter::new(false, false, "unclear");
    let all = TopicFilter::new(true, true, "both");
    assert_eq!(store.candidates(&none.scope()).await, store.candidates(&all.scope()).await);
    assert_eq!(store.candidates(&none.scope()).await.len(), 5);

    for fusion in [Fusion::RankSum, Fusion::ReciprocalRank] {
        let a = store.search("password", &none, 5, fusion).await.unwrap();
        let b = store.search("password", &all, 5, fusion).await.unwrap();
        assert_eq!(a, b);
    }
}

#[tokio::test]
async fn result_never_exceeds_k() {
    let store = seeded(RetrievalMode::Hybrid).await;
    let filter = TopicFilter::new(true, true, "all");
    for k in 0..7 {
        let docs =
            store.search("dashboard search", &filter, k, Fusion::ReciprocalRank).await.unwrap();
        assert_eq!(docs.len(), k.min(5));
    }
}

#[tokio::test]
async fn exact_text_ranks_first_under_both_fusions() {
    for mode in [RetrievalMode::Hybrid, RetrievalMode::Dense] {
        let store = seeded(mode).await;
        let filter = TopicFilter::new(true, false, "feedback");
        for fusion in [Fusion::RankSum, Fusion::ReciprocalRank] {
            let docs = store
                .search("Dark mode looks great on the new dashboard.", &filter, 3, fusion)
                .await
                .unwrap();
            assert_eq!(
                docs[0].content, "Dark mode looks great on the new dashboard.",
                "{mode:?} {fusion}"
            );
        }
    }
}

#[tokio::test]
async fn ties_keep_insertion_order() {
    let dense = Arc::new(FakeEmbedder::new(DIM));
    let sparse = Arc::new(LexicalEncoder::new());
    let store = InMemoryDocumentStore::new(dense.clone(), sparse.clone());
    let records = vec![
        record("same words here", Category::Bugs),
        record("same words here", Category::Bugs),
        record("same words here", Category::Bugs),
    ];
    let docs = Ingestor::new(dense, sparse).build_documents(&records).unwrap();
    let ids: Vec<String> = docs.iter().map(|d| d.id().to_string()).collect();
    store.ingest(docs).await.unwrap();

    let filter = TopicFilter::new(false, true, "bugs");
    for fusion in [Fusion::RankSum, Fusion::ReciprocalRank] {
        let got: Vec<String> = store
            .search("words", &filter, 3, fusion)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(got, ids);
    }
}

#[tokio::test]
async fn empty_store_returns_nothing() {
    let dense = Arc::new(FakeEmbedder::new(DIM));
    let store = InMemoryDocumentStore::new(dense, Arc::new(LexicalEncoder::new()));
    let docs =
        store.search("anything", &TopicFilter::degraded(), 5, Fusion::RankSum).await.unwrap();
    assert!(docs.is_empty());
    assert_eq!(store.len().await.unwrap(), 0);
}

#[tokio::test]
async fn rejects_duplicate_ids_and_wrong_dims() {
    let store =
        InMemoryDocumentStore::new(Arc::new(FakeEmbedder::new(4)), Arc::new(LexicalEncoder::new()));
    let sparse = SparseVector::from_pairs([(1, 1.0)]).unwrap();
    let doc =
        Document::new("a", "x", Category::Bugs, vec![1.0, 0.0, 0.0, 0.0], sparse.clone()).unwrap();
    store.ingest(vec![doc.clone()]).await.unwrap();

    let err = store.ingest(vec![doc]).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_document");

    let short = Document::new("b", "y", Category::Bugs, vec![1.0, 0.0], sparse).unwrap();
    let err = store.ingest(vec![short]).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_document");
    assert_eq!(store.len().await.unwrap(), 1);
}
