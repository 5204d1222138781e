//! On-disk vector index service backed by LanceDB.
//!
//! Each bucket is a LanceDB database directory under `root`, each index is a
//! table inside it. The index metric is kept in the bucket's meta table since
//! Lance chooses the distance per query rather than per table.

use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use mmvec_core::traits::VectorIndexService;
use mmvec_core::types::{DistanceMetric, IndexSpec, Meta, QueryMatch, StoredVector};
use mmvec_core::{Error, Result};

use crate::schema::{build_vector_schema, vector_dimension, DISTANCE_COLUMN, KEY_COLUMN, METADATA_COLUMN};
use crate::table::{ensure_table, get_meta, open_db, quote, set_meta, table_exists, META_TABLE};
use crate::validate_name;

pub struct LanceVectorIndex {
    root: PathBuf,
}

impl LanceVectorIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf> {
        validate_name("bucket", bucket)?;
        Ok(self.root.join(bucket))
    }

    async fn connect_bucket(&self, bucket: &str) -> Result<Connection> {
        let dir = self.bucket_dir(bucket)?;
        if !dir.is_dir() {
            return Err(Error::NotFound(format!("vector bucket '{bucket}'")));
        }
        open_db(&dir.to_string_lossy()).await
    }

    async fn open_index(&self, bucket: &str, index: &str) -> Result<(Connection, Table)> {
        validate_name("index", index)?;
        let conn = self.connect_bucket(bucket).await?;
        if !table_exists(&conn, index).await? {
            return Err(Error::NotFound(format!("vector index '{bucket}/{index}'")));
        }
        let table = conn.open_table(index).execute().await.map_err(Error::storage)?;
        Ok((conn, table))
    }

    async fn spec_of(&self, conn: &Connection, table: &Table, bucket: &str, index: &str) -> Result<IndexSpec> {
        let schema = table.schema().await.map_err(Error::storage)?;
        let dimension = vector_dimension(&schema)
            .ok_or_else(|| Error::storage(format!("table '{index}' has no fixed-size vector column")))?;
        let metric = match get_meta(conn, &metric_key(index)).await? {
            Some(m) => DistanceMetric::parse(&m).ok_or_else(|| Error::storage(format!("unknown metric '{m}'")))?,
            None => DistanceMetric::default(),
        };
        Ok(IndexSpec::new(bucket, index, dimension, metric))
    }
}

fn metric_key(index: &str) -> String {
    format!("index.{index}.metric")
}

fn distance_type(metric: DistanceMetric) -> DistanceType {
    match metric {
        DistanceMetric::Cosine => DistanceType::Cosine,
        DistanceMetric::Euclidean => DistanceType::L2,
    }
}

fn check_dimension(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(Error::DimensionMismatch { expected, actual: vector.len() });
    }
    Ok(())
}

fn vectors_to_record_batch(dimension: usize, vectors: &[&StoredVector]) -> Result<RecordBatch> {
    let schema = build_vector_schema(dimension);
    let keys: Vec<&str> = vectors.iter().map(|v| v.key.as_str()).collect();
    let mut metadata: Vec<Option<String>> = Vec::with_capacity(vectors.len());
    for v in vectors {
        metadata.push(match &v.metadata {
            Some(m) => Some(serde_json::to_string(m).map_err(|e| Error::parse("vector metadata", e))?),
            None => None,
        });
    }
    let values = vectors.iter().map(|v| Some(v.vector.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(keys)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(
                values,
                dimension as i32,
            )),
            Arc::new(StringArray::from(metadata)),
        ],
    )
    .map_err(Error::storage)
}

fn batch_to_matches(batch: &RecordBatch, out: &mut Vec<QueryMatch>) -> Result<()> {
    let keys = batch
        .column_by_name(KEY_COLUMN)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| Error::storage("key column missing from search results"))?;
    let distances = batch
        .column_by_name(DISTANCE_COLUMN)
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| Error::storage("_distance column missing from search results"))?;
    let metadata = batch.column_by_name(METADATA_COLUMN).and_then(|c| c.as_any().downcast_ref::<StringArray>());
    for i in 0..batch.num_rows() {
        let meta = match metadata {
            Some(col) if !col.is_null(i) => {
                Some(serde_json::from_str::<Meta>(col.value(i)).map_err(|e| Error::parse("vector metadata", e))?)
            }
            _ => None,
        };
        out.push(QueryMatch { key: keys.value(i).to_string(), distance: distances.value(i), metadata: meta });
    }
    Ok(())
}

#[async_trait]
impl VectorIndexService for LanceVectorIndex {
    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let dir = self.bucket_dir(bucket)?;
        if dir.is_dir() {
            return Err(Error::AlreadyExists(format!("vector bucket '{bucket}'")));
        }
        tokio::fs::create_dir_all(&dir).await?;
        tracing::info!(bucket, path = %dir.display(), "created vector bucket");
        Ok(())
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        validate_name("index", &spec.index)?;
        if spec.index == META_TABLE {
            return Err(Error::InvalidConfig(format!("index name '{META_TABLE}' is reserved")));
        }
        if spec.dimension == 0 {
            return Err(Error::InvalidConfig("index dimension must be positive".to_string()));
        }
        let conn = self.connect_bucket(&spec.bucket).await?;
        if !ensure_table(&conn, &spec.index, build_vector_schema(spec.dimension)).await? {
            return Err(Error::AlreadyExists(format!("vector index '{}/{}'", spec.bucket, spec.index)));
        }
        set_meta(&conn, &metric_key(&spec.index), spec.metric.as_str()).await?;
        tracing::info!(
            bucket = %spec.bucket,
            index = %spec.index,
            dimension = spec.dimension,
            metric = spec.metric.as_str(),
            "created vector index"
        );
        Ok(())
    }

    async fn describe_index(&self, bucket: &str, index: &str) -> Result<IndexSpec> {
        let (conn, table) = self.open_index(bucket, index).await?;
        self.spec_of(&conn, &table, bucket, index).await
    }

    async fn put_vectors(&self, bucket: &str, index: &str, vectors: &[StoredVector]) -> Result<()> {
        if vectors.is_empty() {
            return Ok(());
        }
        let (conn, table) = self.open_index(bucket, index).await?;
        let spec = self.spec_of(&conn, &table, bucket, index).await?;
        for v in vectors {
            check_dimension(spec.dimension, &v.vector)?;
        }
        // merge_insert rejects duplicate source keys; the last one in the batch wins.
        let mut latest: BTreeMap<&str, &StoredVector> = BTreeMap::new();
        for v in vectors {
            latest.insert(v.key.as_str(), v);
        }
        let rows: Vec<&StoredVector> = latest.into_values().collect();
        let rb = vectors_to_record_batch(spec.dimension, &rows)?;
        let schema = rb.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), schema));
        let mut mi = table.merge_insert(&[KEY_COLUMN]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        mi.execute(reader).await.map_err(Error::storage)?;
        tracing::debug!(bucket, index, count = rows.len(), "upserted vectors");
        Ok(())
    }

    async fn query_vectors(&self, bucket: &str, index: &str, query: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        let (conn, table) = self.open_index(bucket, index).await?;
        let spec = self.spec_of(&conn, &table, bucket, index).await?;
        check_dimension(spec.dimension, query)?;
        if top_k == 0 || table.count_rows(None).await.map_err(Error::storage)? == 0 {
            return Ok(Vec::new());
        }
        let mut stream = table
            .vector_search(query.to_vec())
            .map_err(Error::storage)?
            .distance_type(distance_type(spec.metric))
            .limit(top_k)
            .execute()
            .await
            .map_err(Error::storage)?;
        let mut matches = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::storage)? {
            batch_to_matches(&batch, &mut matches)?;
        }
        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.key.cmp(&b.key)));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete_vectors(&self, bucket: &str, index: &str, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let (_conn, table) = self.open_index(bucket, index).await?;
        let list = keys.iter().map(|k| quote(k)).collect::<Vec<_>>().join(", ");
        table.delete(&format!("{KEY_COLUMN} IN ({list})")).await.map_err(Error::storage)?;
        tracing::debug!(bucket, index, count = keys.len(), "deleted vectors");
        Ok(())
    }
}
