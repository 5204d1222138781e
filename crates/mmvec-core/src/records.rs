//! Result records produced by the embedding model.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One vector from a synchronous invocation, tagged with what it embeds
/// (`TEXT`, `IMAGE`, `AUDIO_VIDEO_COMBINED`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Embedding {
    pub embedding_type: String,
    pub embedding: Vec<f32>,
}

/// Body of a synchronous invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub embeddings: Vec<Embedding>,
}

impl EmbeddingResponse {
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| Error::parse("embedding response", e))
    }

    /// The first returned vector; single-embedding tasks return exactly one.
    pub fn first_vector(&self) -> Result<&[f32]> {
        self.embeddings
            .first()
            .map(|e| e.embedding.as_slice())
            .ok_or_else(|| Error::parse("embedding response", "no embeddings returned"))
    }

    pub fn into_first_vector(self) -> Result<Vec<f32>> {
        self.embeddings
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or_else(|| Error::parse("embedding response", "no embeddings returned"))
    }
}

/// What to do with a result line that does not parse.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LinePolicy {
    /// Fail the whole fetch on the first bad line.
    #[default]
    Abort,
    /// Log the bad line and keep going.
    Skip,
}

pub const SEGMENT_STATUS_SUCCESS: &str = "SUCCESS";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentMetadata {
    pub segment_index: u32,
    pub segment_start_seconds: f64,
    pub segment_end_seconds: f64,
}

/// One line of an async job's JSONL result file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentEmbedding {
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub status: String,
    pub segment_metadata: SegmentMetadata,
}

impl SegmentEmbedding {
    pub fn is_success(&self) -> bool {
        self.status == SEGMENT_STATUS_SUCCESS
    }
}
