//! End-to-end embedding workflow: build a request, run it synchronously or as
//! an async job, and write the resulting vectors into a vector store.
//!
//! Text and images use the synchronous path and store one vector each. Audio
//! and video are submitted as async jobs; once the job completes, its JSONL
//! result files are read and every successful segment is stored as
//! `{name}_{i}`, with `i` counting result records from 1.

use std::path::Path;
use std::sync::Arc;

use mmvec_core::config::{MediaSettings, Settings};
use mmvec_core::corpus::load_text_documents;
use mmvec_core::records::{LinePolicy, SegmentEmbedding};
use mmvec_core::request::EmbeddingRequest;
use mmvec_core::traits::{EmbeddingModel, ObjectStore};
use mmvec_core::types::{EmbeddingPurpose, Meta, Modality, QueryMatch, StoredVector};
use mmvec_core::{Error, ObjectLocation, Result};
use mmvec_embed::{fetch_segments, CancellationListener, JobPoller, PollPolicy, StatusObserver};
use mmvec_vector::VectorStore;

const INLINE_SOURCE: &str = "inline";

/// Settings the pipeline reads on every call.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub dimension: usize,
    pub media: MediaSettings,
    pub poll: PollPolicy,
    pub line_policy: LinePolicy,
}

impl From<&Settings> for PipelineOptions {
    fn from(s: &Settings) -> Self {
        Self {
            dimension: s.model.dimension,
            media: s.media.clone(),
            poll: PollPolicy::from(&s.poll),
            line_policy: s.fetch.line_policy,
        }
    }
}

/// Outcome of storing one audio or video file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentedOutcome {
    pub job: String,
    pub keys: Vec<String>,
    /// Records whose status was not `SUCCESS`.
    pub skipped: usize,
}

pub struct EmbeddingPipeline {
    model: Arc<dyn EmbeddingModel>,
    objects: Arc<dyn ObjectStore>,
    store: VectorStore,
    options: PipelineOptions,
    cancel: CancellationListener,
    observer: Option<StatusObserver>,
}

impl EmbeddingPipeline {
    pub fn new(
        model: Arc<dyn EmbeddingModel>,
        objects: Arc<dyn ObjectStore>,
        store: VectorStore,
        options: PipelineOptions,
    ) -> Result<Self> {
        if store.dimension() != options.dimension {
            return Err(Error::InvalidConfig(format!(
                "vector index dimension {} does not match model dimension {}",
                store.dimension(),
                options.dimension
            )));
        }
        Ok(Self { model, objects, store, options, cancel: CancellationListener::never(), observer: None })
    }

    /// Async waits stop with `Error::Cancelled` once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationListener) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_poll_observer(mut self, observer: StatusObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Idempotent: an existing index with the same dimension is accepted.
    pub async fn create_bucket_and_index(&self) -> Result<bool> {
        let created = self.store.ensure_index().await?;
        let spec = self.store.spec();
        if created {
            tracing::info!(
                bucket = %spec.bucket,
                index = %spec.index,
                dimension = spec.dimension,
                "vector index ready"
            );
        } else {
            tracing::info!(bucket = %spec.bucket, index = %spec.index, "vector index already exists");
        }
        Ok(created)
    }

    pub async fn embed_text(&self, text: &str, purpose: EmbeddingPurpose) -> Result<Vec<f32>> {
        let request = EmbeddingRequest::text(purpose, self.options.dimension, text);
        self.model.invoke(&request).await?.into_first_vector()
    }

    pub async fn store_text(&self, text: &str, key: &str) -> Result<()> {
        let vector = self.embed_text(text, EmbeddingPurpose::GenericIndex).await?;
        self.store.put(key, vector, Some(source_meta(Modality::Text, INLINE_SOURCE))).await
    }

    /// Embed `<media prefix><name><ext>` and store it under `name`.
    pub async fn store_image(&self, name: &str) -> Result<String> {
        let media = &self.options.media;
        let location = media.media_location(name, media.image_format.extension())?;
        let dimension = self.options.dimension;
        let request = EmbeddingRequest::image(EmbeddingPurpose::GenericIndex, dimension, &location, media.image_format);
        let vector = self.model.invoke(&request).await?.into_first_vector()?;
        self.store.put(name, vector, Some(source_meta(Modality::Image, &location.uri()))).await?;
        Ok(name.to_string())
    }

    pub async fn store_audio(&self, name: &str) -> Result<SegmentedOutcome> {
        let media = &self.options.media;
        let location = media.media_location(name, media.audio_format.extension())?;
        let dimension = self.options.dimension;
        let request = EmbeddingRequest::audio(EmbeddingPurpose::GenericIndex, dimension, &location, media.audio_format);
        self.store_segmented(name, &request, &location).await
    }

    pub async fn store_video(&self, name: &str) -> Result<SegmentedOutcome> {
        let media = &self.options.media;
        let location = media.media_location(name, media.video_format.extension())?;
        let request = EmbeddingRequest::video(
            EmbeddingPurpose::GenericIndex,
            self.options.dimension,
            &location,
            media.video_format,
            media.video_mode,
        );
        self.store_segmented(name, &request, &location).await
    }

    async fn store_segmented(
        &self,
        name: &str,
        request: &EmbeddingRequest,
        source: &ObjectLocation,
    ) -> Result<SegmentedOutcome> {
        let output = self.options.media.output_location()?;
        let job = self.model.start_async(request, &output).await?;

        let mut poller = JobPoller::new(self.options.poll.clone(), self.cancel.clone());
        if let Some(observer) = &self.observer {
            poller = poller.with_observer(observer.clone());
        }
        let done = poller.wait(self.model.as_ref(), &job).await?;
        tracing::info!(job = %job, polls = done.polls, output = %done.output, "async job completed");

        // One slot per result line across all files; slot i is stored as `{name}_{i+1}`.
        let mut records: Vec<Option<SegmentEmbedding>> = Vec::new();
        for file in request.result_file_names() {
            records.extend(fetch_segments(self.objects.as_ref(), &done.output, file, self.options.line_policy).await?);
        }

        let modality = request.modality();
        let mut outcome = SegmentedOutcome { job: job.to_string(), ..Default::default() };
        let mut batch = Vec::with_capacity(records.len());
        for (i, record) in records.into_iter().enumerate() {
            let key = format!("{name}_{}", i + 1);
            let Some(record) = record else {
                tracing::warn!(%key, "skipping malformed segment line");
                outcome.skipped += 1;
                continue;
            };
            if !record.is_success() {
                tracing::warn!(%key, status = %record.status, "skipping segment that did not succeed");
                outcome.skipped += 1;
                continue;
            }
            let mut meta = source_meta(modality, &source.uri());
            let seg = record.segment_metadata;
            meta.insert("segment_index".to_string(), seg.segment_index.to_string());
            meta.insert("segment_start_seconds".to_string(), seg.segment_start_seconds.to_string());
            meta.insert("segment_end_seconds".to_string(), seg.segment_end_seconds.to_string());
            outcome.keys.push(key.clone());
            batch.push(StoredVector { key, vector: record.embedding, metadata: Some(meta) });
        }
        self.store.put_many(&batch).await?;
        tracing::info!(name, stored = outcome.keys.len(), skipped = outcome.skipped, "stored segment embeddings");
        Ok(outcome)
    }

    pub async fn search(&self, text: &str, top_k: usize) -> Result<Vec<QueryMatch>> {
        let vector = self.embed_text(text, EmbeddingPurpose::GenericRetrieval).await?;
        let matches = self.store.query(&vector, top_k).await?;
        tracing::info!(query = text, top_k, hits = matches.len(), "search finished");
        Ok(matches)
    }

    /// Store every `*.txt` under `dir`, keyed by file stem.
    pub async fn store_text_corpus(&self, dir: &Path) -> Result<Vec<String>> {
        let docs = load_text_documents(dir)?;
        let mut keys = Vec::with_capacity(docs.len());
        for doc in docs {
            let vector = self.embed_text(&doc.text, EmbeddingPurpose::GenericIndex).await?;
            let meta = source_meta(Modality::Text, &doc.path.to_string_lossy());
            self.store.put(&doc.key, vector, Some(meta)).await?;
            keys.push(doc.key);
        }
        Ok(keys)
    }
}

fn source_meta(modality: Modality, source: &str) -> Meta {
    let mut meta = Meta::new();
    meta.insert("modality".to_string(), modality.as_str().to_string());
    meta.insert("source".to_string(), source.to_string());
    meta
}
