use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use mmvec_core::traits::VectorIndexService;
use mmvec_core::types::{DistanceMetric, IndexSpec, Meta, QueryMatch, StoredVector};
use mmvec_core::{Error, Result};

use crate::validate_name;

struct MemoryIndex {
    spec: IndexSpec,
    vectors: BTreeMap<String, (Vec<f32>, Option<Meta>)>,
}

/// Exhaustive-search index service held in process memory.
#[derive(Default)]
pub struct MemoryVectorIndex {
    buckets: Mutex<HashMap<String, HashMap<String, MemoryIndex>>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, bucket: &str, index: &str) -> usize {
        let buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        buckets.get(bucket).and_then(|b| b.get(index)).map_or(0, |i| i.vectors.len())
    }

    fn with_index<T>(&self, bucket: &str, index: &str, f: impl FnOnce(&mut MemoryIndex) -> Result<T>) -> Result<T> {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let b = buckets.get_mut(bucket).ok_or_else(|| Error::NotFound(format!("vector bucket '{bucket}'")))?;
        let i = b.get_mut(index).ok_or_else(|| Error::NotFound(format!("vector index '{bucket}/{index}'")))?;
        f(i)
    }
}

pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    1.0 - dot / (na * nb)
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

#[async_trait]
impl VectorIndexService for MemoryVectorIndex {
    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        validate_name("bucket", bucket)?;
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        if buckets.contains_key(bucket) {
            return Err(Error::AlreadyExists(format!("vector bucket '{bucket}'")));
        }
        buckets.insert(bucket.to_string(), HashMap::new());
        Ok(())
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        validate_name("index", &spec.index)?;
        if spec.dimension == 0 {
            return Err(Error::InvalidConfig("index dimension must be positive".to_string()));
        }
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let b = buckets
            .get_mut(&spec.bucket)
            .ok_or_else(|| Error::NotFound(format!("vector bucket '{}'", spec.bucket)))?;
        if b.contains_key(&spec.index) {
            return Err(Error::AlreadyExists(format!("vector index '{}/{}'", spec.bucket, spec.index)));
        }
        b.insert(spec.index.clone(), MemoryIndex { spec: spec.clone(), vectors: BTreeMap::new() });
        Ok(())
    }

    async fn describe_index(&self, bucket: &str, index: &str) -> Result<IndexSpec> {
        self.with_index(bucket, index, |i| Ok(i.spec.clone()))
    }

    async fn put_vectors(&self, bucket: &str, index: &str, vectors: &[StoredVector]) -> Result<()> {
        self.with_index(bucket, index, |i| {
            let expected = i.spec.dimension;
            if let Some(bad) = vectors.iter().find(|v| v.vector.len() != expected) {
                return Err(Error::DimensionMismatch { expected, actual: bad.vector.len() });
            }
            for v in vectors {
                i.vectors.insert(v.key.clone(), (v.vector.clone(), v.metadata.clone()));
            }
            Ok(())
        })
    }

    async fn query_vectors(&self, bucket: &str, index: &str, query: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        self.with_index(bucket, index, |i| {
            let expected = i.spec.dimension;
            if query.len() != expected {
                return Err(Error::DimensionMismatch { expected, actual: query.len() });
            }
            let distance: fn(&[f32], &[f32]) -> f32 = match i.spec.metric {
                DistanceMetric::Cosine => cosine_distance,
                DistanceMetric::Euclidean => euclidean_distance,
            };
            let mut matches: Vec<QueryMatch> = i
                .vectors
                .iter()
                .map(|(key, (v, meta))| QueryMatch {
                    key: key.clone(),
                    distance: distance(query, v),
                    metadata: meta.clone(),
                })
                .collect();
            matches.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.key.cmp(&b.key)));
            matches.truncate(top_k);
            Ok(matches)
        })
    }

    async fn delete_vectors(&self, bucket: &str, index: &str, keys: &[String]) -> Result<()> {
        self.with_index(bucket, index, |i| {
            for k in keys {
                i.vectors.remove(k);
            }
            Ok(())
        })
    }
}
