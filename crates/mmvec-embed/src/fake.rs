//! Offline stand-in for the embedding model.
//!
//! Vectors are derived from xxhash of the input so the same input always
//! yields the same unit-length vector. Async jobs stay `InProgress` for a
//! configurable number of polls, then write their JSONL result files into a
//! `MemoryObjectStore` under `<output>/<job-id>/`, mirroring where the real
//! service puts them.

use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};
use twox_hash::XxHash64;

use mmvec_core::object_store::MemoryObjectStore;
use mmvec_core::records::{Embedding, EmbeddingResponse, SegmentEmbedding, SegmentMetadata, SEGMENT_STATUS_SUCCESS};
use mmvec_core::request::EmbeddingRequest;
use mmvec_core::traits::EmbeddingModel;
use mmvec_core::types::{JobHandle, JobSnapshot, JobStatus, Modality, SEGMENT_DURATION_SECONDS};
use mmvec_core::{Error, ObjectLocation, Result};

struct FakeJob {
    request: EmbeddingRequest,
    output: ObjectLocation,
    pending_polls: u32,
    written: bool,
}

pub struct FakeEmbeddingModel {
    objects: Arc<MemoryObjectStore>,
    pending_polls: u32,
    segments: u32,
    jobs: Mutex<HashMap<JobHandle, FakeJob>>,
}

impl FakeEmbeddingModel {
    pub fn new(objects: Arc<MemoryObjectStore>) -> Self {
        Self { objects, pending_polls: 2, segments: 6, jobs: Mutex::new(HashMap::new()) }
    }

    pub fn with_pending_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    pub fn with_segments(mut self, segments: u32) -> Self {
        self.segments = segments;
        self
    }

    pub fn objects(&self) -> &Arc<MemoryObjectStore> {
        &self.objects
    }

    fn write_results(&self, job: &JobHandle, state: &FakeJob) -> Result<ObjectLocation> {
        let dir = state.output.join(job.as_str());
        let source = state.request.source_uri().unwrap_or_default();
        for file in state.request.result_file_names() {
            let mut body = String::new();
            for i in 0..self.segments {
                let rec = SegmentEmbedding {
                    embedding: hashed_vector(&format!("{source}#{file}#{i}"), state.request.dimension()),
                    status: SEGMENT_STATUS_SUCCESS.to_string(),
                    segment_metadata: SegmentMetadata {
                        segment_index: i,
                        segment_start_seconds: f64::from(i * SEGMENT_DURATION_SECONDS),
                        segment_end_seconds: f64::from((i + 1) * SEGMENT_DURATION_SECONDS),
                    },
                };
                body.push_str(&serde_json::to_string(&rec).map_err(|e| Error::parse("fake segment record", e))?);
                body.push('\n');
            }
            self.objects.put(dir.join(file), body);
        }
        Ok(dir)
    }
}

#[async_trait]
impl EmbeddingModel for FakeEmbeddingModel {
    async fn invoke(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse> {
        let (embedding_type, vector) = match request.modality() {
            Modality::Text => {
                let text = request.params().text.as_ref().map(|t| t.value.as_str()).unwrap_or_default();
                ("TEXT", text_vector(text, request.dimension()))
            }
            Modality::Image => ("IMAGE", hashed_vector(request.source_uri().unwrap_or_default(), request.dimension())),
            Modality::Audio | Modality::Video => {
                let message = format!("{} requests must be submitted as async jobs", request.modality());
                return Err(Error::Operation(message));
            }
        };
        let embedding = Embedding { embedding_type: embedding_type.to_string(), embedding: vector };
        Ok(EmbeddingResponse { embeddings: vec![embedding] })
    }

    async fn start_async(&self, request: &EmbeddingRequest, output: &ObjectLocation) -> Result<JobHandle> {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = JobHandle::new(format!("fake-job-{:04}", jobs.len() + 1));
        jobs.insert(
            handle.clone(),
            FakeJob {
                request: request.clone(),
                output: output.clone(),
                pending_polls: self.pending_polls,
                written: false,
            },
        );
        tracing::debug!(job = %handle, modality = %request.modality(), "fake async job submitted");
        Ok(handle)
    }

    async fn job_status(&self, job: &JobHandle) -> Result<JobSnapshot> {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let state = jobs.get_mut(job).ok_or_else(|| Error::NotFound(format!("async job {job}")))?;
        if state.pending_polls > 0 {
            state.pending_polls -= 1;
            return Ok(JobSnapshot {
                handle: job.clone(),
                status: JobStatus::InProgress,
                output: Some(state.output.clone()),
                failure_message: None,
            });
        }
        let dir = state.output.join(job.as_str());
        if !state.written {
            self.write_results(job, state)?;
            state.written = true;
        }
        Ok(JobSnapshot { handle: job.clone(), status: JobStatus::Completed, output: Some(dir), failure_message: None })
    }
}

/// Bag-of-tokens vector: texts sharing words land close together.
pub fn text_vector(text: &str, dim: usize) -> Vec<f32> {
    let mut v = vec![0f32; dim.max(1)];
    for (i, token) in text.split_whitespace().enumerate() {
        let token = token.to_lowercase();
        let h = hash_str(&token);
        let idx = (h as usize) % v.len();
        let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
        v[idx] += val + (i as f32 % 3.0) * 0.01;
    }
    normalize(v)
}

/// Pseudo-random unit vector seeded by `seed`.
pub fn hashed_vector(seed: &str, dim: usize) -> Vec<f32> {
    let base = hash_str(seed);
    let v = (0..dim.max(1))
        .map(|i| {
            let mut hasher = XxHash64::with_seed(base);
            i.hash(&mut hasher);
            let h = hasher.finish();
            ((h >> 32) as u32) as f32 / u32::MAX as f32 - 0.5
        })
        .collect();
    normalize(v)
}

fn hash_str(s: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    s.hash(&mut hasher);
    hasher.finish()
}

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
    for x in &mut v {
        *x /= norm;
    }
    v
}
