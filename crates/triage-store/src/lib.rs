//! Document stores for filtered hybrid retrieval.
//!
//! [`InMemoryDocumentStore`] scans and fuses locally; with the `qdrant` feature,
//! [`qdrant::QdrantDocumentStore`] delegates both to a Qdrant server.

mod embed;
pub mod fusion;
pub mod ingest;
pub mod memory;
#[cfg(feature = "qdrant")]
pub mod qdrant;

use std::sync::Arc;

use triage_core::config::{Settings, StoreBackend};
use triage_core::traits::{DenseEmbedder, DocumentStore, SparseEncoder};
use triage_core::Result;

pub use ingest::Ingestor;
pub use memory::InMemoryDocumentStore;

/// A store ready for queries, plus whether it still has to be seeded.
pub struct OpenedStore {
    pub store: Arc<dyn DocumentStore>,
    pub needs_seed: bool,
}

pub async fn open_store(
    settings: &Settings,
    dense: Arc<dyn DenseEmbedder>,
    sparse: Arc<dyn SparseEncoder>,
) -> Result<OpenedStore> {
    match settings.store.backend {
        StoreBackend::Memory => Ok(OpenedStore {
            store: Arc::new(InMemoryDocumentStore::from_settings(
                &settings.retrieval,
                dense,
                sparse,
            )),
            needs_seed: true,
        }),
        StoreBackend::Qdrant => open_qdrant(settings, dense, sparse).await,
    }
}

#[cfg(feature = "qdrant")]
async fn open_qdrant(
    settings: &Settings,
    dense: Arc<dyn DenseEmbedder>,
    sparse: Arc<dyn SparseEncoder>,
) -> Result<OpenedStore> {
    let store =
        qdrant::QdrantDocumentStore::new(&settings.store, &settings.retrieval, dense, sparse)?;
    let needs_seed = store.ensure_collection().await?;
    Ok(OpenedStore { store: Arc::new(store), needs_seed })
}

#[cfg(not(feature = "qdrant"))]
async fn open_qdrant(
    _settings: &Settings,
    _dense: Arc<dyn DenseEmbedder>,
    _sparse: Arc<dyn SparseEncoder>,
) -> Result<OpenedStore> {
    Err(triage_core::Error::InvalidConfig(
        "store.backend = \"qdrant\" requires the `qdrant` feature".into(),
    ))
}
