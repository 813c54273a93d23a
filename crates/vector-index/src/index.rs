use crate::embedder::Embedder;
use crate::error::{Result, VectorIndexError};
use crate::types::{IndexedChunk, SearchHit};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

struct IndexedRow {
    vector: Vec<f32>,
    chunk: IndexedChunk,
}

/// Namespaced brute-force cosine index.
///
/// Each table belongs to exactly one processing run; creating a table with an
/// existing name overwrites it.
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    tables: RwLock<HashMap<String, Vec<IndexedRow>>>,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Create (or overwrite) a table with batch-embedded chunks
    pub async fn create_table(&self, name: &str, chunks: Vec<IndexedChunk>) -> Result<()> {
        log::info!("Embedding {} chunks for table {name}", chunks.len());

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let expected = self.embedder.dimension();
        for vector in &vectors {
            if vector.len() != expected {
                return Err(VectorIndexError::InvalidDimension {
                    expected,
                    actual: vector.len(),
                });
            }
        }

        let rows = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedRow { vector, chunk })
            .collect();

        self.tables.write().await.insert(name.to_string(), rows);
        log::info!("Table {name} created");
        Ok(())
    }

    /// Search a table for the `top_k` nearest chunks by cosine distance
    pub async fn search(&self, name: &str, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let query_vector = self.embedder.embed(query).await?;

        let tables = self.tables.read().await;
        let rows = tables
            .get(name)
            .ok_or_else(|| VectorIndexError::TableNotFound(name.to_string()))?;

        let mut hits: Vec<SearchHit> = rows
            .iter()
            .map(|row| SearchHit {
                text: row.chunk.text.clone(),
                page_number: row.chunk.page_number,
                source_ref: row.chunk.source_ref.clone(),
                distance: 1.0 - cosine_similarity(&query_vector, &row.vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);

        log::debug!("Search in {name} returned {} hits", hits.len());
        Ok(hits)
    }

    /// Drop a table; unknown names are ignored
    pub async fn drop_table(&self, name: &str) {
        self.tables.write().await.remove(name);
    }

    /// Number of rows in a table, if it exists
    pub async fn table_len(&self, name: &str) -> Option<usize> {
        self.tables.read().await.get(name).map(Vec::len)
    }
}

/// Cosine similarity of two equal-length vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
