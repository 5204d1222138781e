use async_trait::async_trait;

use crate::error::Result;
use crate::location::ObjectLocation;
use crate::records::EmbeddingResponse;
use crate::request::EmbeddingRequest;
use crate::types::{IndexSpec, JobHandle, JobSnapshot, QueryMatch, StoredVector};

/// Remote embedding model reachable synchronously or as an async job.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Run the request and wait for the inline result.
    async fn invoke(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse>;
    /// Submit the request as a background job writing its results under `output`.
    async fn start_async(&self, request: &EmbeddingRequest, output: &ObjectLocation) -> Result<JobHandle>;
    /// Current state of a previously submitted job.
    async fn job_status(&self, job: &JobHandle) -> Result<JobSnapshot>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, location: &ObjectLocation) -> Result<Vec<u8>>;
}

/// A service hosting buckets of keyed vector indexes.
#[async_trait]
pub trait VectorIndexService: Send + Sync {
    async fn create_bucket(&self, bucket: &str) -> Result<()>;
    async fn create_index(&self, spec: &IndexSpec) -> Result<()>;
    async fn describe_index(&self, bucket: &str, index: &str) -> Result<IndexSpec>;
    /// Insert or overwrite vectors by key.
    async fn put_vectors(&self, bucket: &str, index: &str, vectors: &[StoredVector]) -> Result<()>;
    /// Up to `top_k` nearest neighbours, nearest first.
    async fn query_vectors(&self, bucket: &str, index: &str, query: &[f32], top_k: usize) -> Result<Vec<QueryMatch>>;
    async fn delete_vectors(&self, bucket: &str, index: &str, keys: &[String]) -> Result<()>;
}
