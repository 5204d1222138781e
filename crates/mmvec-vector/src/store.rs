use std::sync::Arc;

use mmvec_core::traits::VectorIndexService;
use mmvec_core::types::{IndexSpec, Meta, QueryMatch, StoredVector};
use mmvec_core::{Error, Result};

/// Writer/reader bound to one bucket and index of a vector service.
///
/// Vectors are checked against the index dimension before anything is sent,
/// so a mismatched vector never reaches the service.
#[derive(Clone)]
pub struct VectorStore {
    service: Arc<dyn VectorIndexService>,
    spec: IndexSpec,
}

impl VectorStore {
    pub fn new(service: Arc<dyn VectorIndexService>, spec: IndexSpec) -> Self {
        Self { service, spec }
    }

    pub fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    pub fn dimension(&self) -> usize {
        self.spec.dimension
    }

    /// Create the bucket and index, accepting ones that already exist with
    /// the same dimension. Returns `true` when the index was newly created.
    pub async fn ensure_index(&self) -> Result<bool> {
        match self.service.create_bucket(&self.spec.bucket).await {
            Ok(()) | Err(Error::AlreadyExists(_)) => {}
            Err(e) => return Err(e),
        }
        match self.service.create_index(&self.spec).await {
            Ok(()) => Ok(true),
            Err(Error::AlreadyExists(_)) => {
                let existing = self.service.describe_index(&self.spec.bucket, &self.spec.index).await?;
                if existing.dimension != self.spec.dimension {
                    return Err(Error::DimensionMismatch { expected: existing.dimension, actual: self.spec.dimension });
                }
                if existing.metric != self.spec.metric {
                    tracing::warn!(
                        index = %self.spec.index,
                        existing = existing.metric.as_str(),
                        configured = self.spec.metric.as_str(),
                        "index exists with a different metric; keeping the existing one"
                    );
                }
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn check(&self, key: &str, vector: &[f32]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::Operation("vector key must not be empty".to_string()));
        }
        if vector.len() != self.spec.dimension {
            return Err(Error::DimensionMismatch { expected: self.spec.dimension, actual: vector.len() });
        }
        Ok(())
    }

    pub async fn put(&self, key: &str, vector: Vec<f32>, metadata: Option<Meta>) -> Result<()> {
        self.check(key, &vector)?;
        let item = StoredVector { key: key.to_string(), vector, metadata };
        self.service.put_vectors(&self.spec.bucket, &self.spec.index, std::slice::from_ref(&item)).await?;
        tracing::info!(key, index = %self.spec.index, "stored vector");
        Ok(())
    }

    /// All-or-nothing: one bad vector rejects the whole batch.
    pub async fn put_many(&self, vectors: &[StoredVector]) -> Result<()> {
        for v in vectors {
            self.check(&v.key, &v.vector)?;
        }
        self.service.put_vectors(&self.spec.bucket, &self.spec.index, vectors).await
    }

    pub async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        if vector.len() != self.spec.dimension {
            return Err(Error::DimensionMismatch { expected: self.spec.dimension, actual: vector.len() });
        }
        self.service.query_vectors(&self.spec.bucket, &self.spec.index, vector, top_k).await
    }

    pub async fn delete(&self, keys: &[String]) -> Result<()> {
        self.service.delete_vectors(&self.spec.bucket, &self.spec.index, keys).await
    }
}
