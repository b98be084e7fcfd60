use std::sync::Arc;

use triage_core::traits::DenseEmbedder;
use triage_core::{Error, Result};

/// Runs query embedding on the blocking pool, where an enclosing timeout can
/// abandon it.
pub(crate) async fn embed_query(dense: &Arc<dyn DenseEmbedder>, query: &str) -> Result<Vec<f32>> {
    let dense = Arc::clone(dense);
    let query = query.to_string();
    tokio::task::spawn_blocking(move || dense.embed_query(&query))
        .await
        .map_err(|e| Error::upstream("dense-embedder", format!("embedding task failed: {e}")))?
}
