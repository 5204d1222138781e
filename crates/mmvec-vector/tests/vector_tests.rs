use std::collections::BTreeMap;
use std::sync::Arc;

use mmvec_core::traits::VectorIndexService;
use mmvec_core::types::{DistanceMetric, IndexSpec, StoredVector};
use mmvec_core::Error;
use mmvec_vector::{LanceVectorIndex, MemoryVectorIndex, VectorStore};
use tempfile::TempDir;

fn unit(dim: usize, hot: usize) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    v[hot] = 1.0;
    v
}

async fn ready_store(service: Arc<dyn VectorIndexService>, dim: usize) -> VectorStore {
    let store = VectorStore::new(service, IndexSpec::new("vk-vector-store", "embeddings", dim, DistanceMetric::Cosine));
    assert!(store.ensure_index().await.expect("ensure"));
    store
}

async fn put_then_query_returns_key(service: Arc<dyn VectorIndexService>) {
    let store = ready_store(service, 8).await;
    let mut meta = BTreeMap::new();
    meta.insert("modality".to_string(), "text".to_string());
    store.put("k1", unit(8, 0), Some(meta.clone())).await.expect("put k1");
    store.put("k2", unit(8, 3), None).await.expect("put k2");

    let hits = store.query(&unit(8, 0), 1).await.expect("query");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key, "k1");
    assert!(hits[0].distance.abs() < 1e-5);
    assert_eq!(hits[0].metadata.as_ref(), Some(&meta));
}

async fn mismatch_writes_nothing(service: Arc<dyn VectorIndexService>) {
    let store = ready_store(service, 8).await;
    let err = store.put("bad", vec![0.5; 7], None).await;
    assert!(matches!(err, Err(Error::DimensionMismatch { expected: 8, actual: 7 })));
    assert!(store.query(&unit(8, 0), 10).await.expect("query").is_empty());

    let batch = vec![
        StoredVector { key: "ok".into(), vector: unit(8, 1), metadata: None },
        StoredVector { key: "short".into(), vector: vec![1.0], metadata: None },
    ];
    assert!(matches!(store.put_many(&batch).await, Err(Error::DimensionMismatch { .. })));
    assert!(store.query(&unit(8, 1), 10).await.expect("query").is_empty());
}

async fn upsert_overwrites_and_orders_nearest_first(service: Arc<dyn VectorIndexService>) {
    let store = ready_store(service, 4).await;
    store.put("a", vec![1.0, 0.0, 0.0, 0.0], None).await.unwrap();
    store.put("b", vec![0.7, 0.7, 0.0, 0.0], None).await.unwrap();
    store.put("c", vec![0.0, 0.0, 1.0, 0.0], None).await.unwrap();
    // move "a" away from the query
    store.put("a", vec![0.0, 0.0, 0.0, 1.0], None).await.unwrap();

    let hits = store.query(&[1.0, 0.1, 0.0, 0.0], 3).await.unwrap();
    let keys: Vec<&str> = hits.iter().map(|h| h.key.as_str()).collect();
    assert_eq!(keys.len(), 3);
    assert_eq!(keys[0], "b");
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));

    store.delete(&["b".to_string()]).await.unwrap();
    let hits = store.query(&[1.0, 0.1, 0.0, 0.0], 10).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.key != "b"));
}

async fn reopening_is_idempotent(service: Arc<dyn VectorIndexService>) {
    let first = ready_store(service.clone(), 16).await;
    first.put("x", unit(16, 2), None).await.unwrap();
    let again = VectorStore::new(service.clone(), first.spec().clone());
    assert!(!again.ensure_index().await.expect("second ensure"));
    assert_eq!(again.query(&unit(16, 2), 1).await.unwrap()[0].key, "x");

    let other_dim =
        VectorStore::new(service, IndexSpec::new("vk-vector-store", "embeddings", 32, DistanceMetric::Cosine));
    assert!(matches!(other_dim.ensure_index().await, Err(Error::DimensionMismatch { .. })));
}

#[tokio::test]
async fn memory_put_then_query() {
    put_then_query_returns_key(Arc::new(MemoryVectorIndex::new())).await;
}

#[tokio::test]
async fn memory_mismatch_writes_nothing() {
    mismatch_writes_nothing(Arc::new(MemoryVectorIndex::new())).await;
}

#[tokio::test]
async fn memory_upsert_and_order() {
    upsert_overwrites_and_orders_nearest_first(Arc::new(MemoryVectorIndex::new())).await;
}

#[tokio::test]
async fn memory_reopen() {
    reopening_is_idempotent(Arc::new(MemoryVectorIndex::new())).await;
}

#[tokio::test]
async fn lance_put_then_query() {
    let tmp = TempDir::new().expect("tmp");
    put_then_query_returns_key(Arc::new(LanceVectorIndex::new(tmp.path()))).await;
}

#[tokio::test]
async fn lance_mismatch_writes_nothing() {
    let tmp = TempDir::new().expect("tmp");
    mismatch_writes_nothing(Arc::new(LanceVectorIndex::new(tmp.path()))).await;
}

#[tokio::test]
async fn lance_upsert_and_order() {
    let tmp = TempDir::new().expect("tmp");
    upsert_overwrites_and_orders_nearest_first(Arc::new(LanceVectorIndex::new(tmp.path()))).await;
}

#[tokio::test]
async fn lance_reopen_and_describe() {
    let tmp = TempDir::new().expect("tmp");
    let service = Arc::new(LanceVectorIndex::new(tmp.path()));
    reopening_is_idempotent(service.clone()).await;

    let spec = service.describe_index("vk-vector-store", "embeddings").await.expect("describe");
    assert_eq!(spec.dimension, 16);
    assert_eq!(spec.metric, DistanceMetric::Cosine);
}

#[tokio::test]
async fn lance_euclidean_metric_is_remembered() {
    let tmp = TempDir::new().expect("tmp");
    let service = LanceVectorIndex::new(tmp.path());
    service.create_bucket("b").await.unwrap();
    service.create_index(&IndexSpec::new("b", "l2", 2, DistanceMetric::Euclidean)).await.unwrap();
    assert_eq!(service.describe_index("b", "l2").await.unwrap().metric, DistanceMetric::Euclidean);
    assert!(matches!(service.create_bucket("b").await, Err(Error::AlreadyExists(_))));
}

#[tokio::test]
async fn unknown_bucket_or_index_is_not_found() {
    let tmp = TempDir::new().expect("tmp");
    let lance = LanceVectorIndex::new(tmp.path());
    assert!(matches!(lance.describe_index("nope", "embeddings").await, Err(Error::NotFound(_))));
    let mem = MemoryVectorIndex::new();
    assert!(matches!(mem.query_vectors("nope", "embeddings", &[1.0], 1).await, Err(Error::NotFound(_))));
    assert!(matches!(mem.create_bucket("../escape").await, Err(Error::InvalidConfig(_))));
}
