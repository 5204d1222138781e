//! Domain types shared by the model, poller and vector engines.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::location::ObjectLocation;

pub type VectorKey = String;
pub type Meta = BTreeMap<String, String>;

/// Output sizes the embedding model accepts.
pub const SUPPORTED_DIMENSIONS: [usize; 4] = [256, 384, 1024, 3072];

/// Window used when the model splits audio/video into segments.
pub const SEGMENT_DURATION_SECONDS: u32 = 15;

/// Declared use of an embedding. Index-side vectors use `GenericIndex`,
/// query-side vectors use one of the retrieval purposes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmbeddingPurpose {
    GenericIndex,
    GenericRetrieval,
    TextRetrieval,
    ImageRetrieval,
    VideoRetrieval,
    DocumentRetrieval,
    AudioRetrieval,
    Classification,
    Clustering,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Audio,
    Video,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Image => "image",
            Modality::Audio => "audio",
            Modality::Video => "video",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier of an asynchronous invocation (an invocation ARN for Bedrock).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status values reported for an async job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    Submitted,
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Submitted => "Submitted",
            JobStatus::InProgress => "InProgress",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// One observation of a job's state.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub handle: JobHandle,
    pub status: JobStatus,
    /// Where the service wrote (or will write) its results.
    pub output: Option<ObjectLocation>,
    pub failure_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cosine" => Some(DistanceMetric::Cosine),
            "euclidean" => Some(DistanceMetric::Euclidean),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VectorDataType {
    #[default]
    Float32,
}

/// Shape of a vector index: where it lives and what it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub bucket: String,
    pub index: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub data_type: VectorDataType,
}

impl IndexSpec {
    pub fn new(bucket: impl Into<String>, index: impl Into<String>, dimension: usize, metric: DistanceMetric) -> Self {
        Self { bucket: bucket.into(), index: index.into(), dimension, metric, data_type: VectorDataType::Float32 }
    }
}

/// A keyed vector as written to an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVector {
    pub key: VectorKey,
    pub vector: Vec<f32>,
    pub metadata: Option<Meta>,
}

/// One nearest-neighbour hit. Lower `distance` is closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub key: VectorKey,
    pub distance: f32,
    pub metadata: Option<Meta>,
}
