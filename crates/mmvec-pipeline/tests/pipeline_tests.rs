use std::collections::VecDeque;
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mmvec_core::config::Settings;
use mmvec_core::object_store::MemoryObjectStore;
use mmvec_core::records::{EmbeddingResponse, LinePolicy};
use mmvec_core::request::{EmbeddingRequest, VideoEmbeddingMode};
use mmvec_core::traits::EmbeddingModel;
use mmvec_core::types::{DistanceMetric, IndexSpec, JobHandle, JobSnapshot, JobStatus};
use mmvec_core::{Error, ObjectLocation, Result};
use mmvec_embed::{FakeEmbeddingModel, PollPolicy};
use mmvec_pipeline::{EmbeddingPipeline, PipelineOptions};
use mmvec_vector::{LanceVectorIndex, MemoryVectorIndex, VectorStore};

const DIM: usize = 4;

/// Async-only model: replays statuses and records the submitted request.
struct ScriptedModel {
    statuses: Mutex<VecDeque<JobStatus>>,
    output: ObjectLocation,
    submitted: Mutex<Vec<EmbeddingRequest>>,
}

#[async_trait]
impl EmbeddingModel for ScriptedModel {
    async fn invoke(&self, _request: &EmbeddingRequest) -> Result<EmbeddingResponse> {
        Err(Error::Operation("sync path not scripted".into()))
    }

    async fn start_async(&self, request: &EmbeddingRequest, _output: &ObjectLocation) -> Result<JobHandle> {
        self.submitted.lock().unwrap().push(request.clone());
        Ok(JobHandle::new("arn:job/1"))
    }

    async fn job_status(&self, job: &JobHandle) -> Result<JobSnapshot> {
        let status = self.statuses.lock().unwrap().pop_front().unwrap_or(JobStatus::Completed);
        Ok(JobSnapshot { handle: job.clone(), status, output: Some(self.output.clone()), failure_message: None })
    }
}

fn segment_line(index: u32, status: &str, hot: usize) -> String {
    let mut v = vec![0.0f32; DIM];
    v[hot] = 1.0;
    serde_json::json!({
        "embedding": v,
        "status": status,
        "segmentMetadata": {
            "segmentIndex": index,
            "segmentStartSeconds": index * 15,
            "segmentEndSeconds": (index + 1) * 15
        }
    })
    .to_string()
}

fn options() -> PipelineOptions {
    let mut settings = Settings::default();
    settings.model.dimension = DIM;
    settings.media.uri_prefix = "s3://media/".into();
    settings.media.output_uri = "s3://media/embeddings-output/".into();
    let mut opts = PipelineOptions::from(&settings);
    opts.poll = PollPolicy::fixed(Duration::from_millis(2));
    opts
}

async fn memory_store() -> VectorStore {
    let store = VectorStore::new(
        Arc::new(MemoryVectorIndex::new()),
        IndexSpec::new("vk-vector-store", "embeddings", DIM, DistanceMetric::Cosine),
    );
    store.ensure_index().await.expect("index");
    store
}

#[tokio::test]
async fn async_video_stores_one_key_per_segment() {
    let objects = Arc::new(MemoryObjectStore::new());
    let output = ObjectLocation::parse("s3://media/embeddings-output/job1/").unwrap();
    objects.put(
        output.join("embedding-audio-video.jsonl"),
        format!("{}\n{}\n", segment_line(0, "SUCCESS", 0), segment_line(1, "SUCCESS", 1)),
    );
    let model = Arc::new(ScriptedModel {
        statuses: Mutex::new(VecDeque::from(vec![JobStatus::InProgress, JobStatus::InProgress, JobStatus::Completed])),
        output,
        submitted: Mutex::new(Vec::new()),
    });
    let store = memory_store().await;
    let pipeline = EmbeddingPipeline::new(model.clone(), objects, store.clone(), options()).expect("pipeline");

    let outcome = pipeline.store_video("video1").await.expect("store video");
    assert_eq!(outcome.keys, vec!["video1_1", "video1_2"]);
    assert_eq!(outcome.skipped, 0);

    let submitted = model.submitted.lock().unwrap();
    assert_eq!(submitted[0].source_uri(), Some("s3://media/video1.mp4"));
    assert_eq!(submitted[0].dimension(), DIM);

    let hits = store.query(&[0.0, 1.0, 0.0, 0.0], 1).await.unwrap();
    assert_eq!(hits[0].key, "video1_2");
    let meta = hits[0].metadata.as_ref().expect("metadata");
    assert_eq!(meta["modality"], "video");
    assert_eq!(meta["segment_index"], "1");
    assert_eq!(meta["segment_start_seconds"], "15");
}

#[tokio::test]
async fn failed_segments_are_skipped_but_keep_their_slot() {
    let objects = Arc::new(MemoryObjectStore::new());
    let output = ObjectLocation::parse("s3://media/embeddings-output/job2").unwrap();
    objects.put(
        output.join("embedding-audio.jsonl"),
        [segment_line(0, "SUCCESS", 0), segment_line(1, "FAILED", 1), segment_line(2, "SUCCESS", 2)].join("\r\n"),
    );
    let model = Arc::new(ScriptedModel {
        statuses: Mutex::new(VecDeque::from(vec![JobStatus::Completed])),
        output,
        submitted: Mutex::new(Vec::new()),
    });
    let pipeline = EmbeddingPipeline::new(model, objects, memory_store().await, options()).unwrap();

    let outcome = pipeline.store_audio("talk").await.expect("store audio");
    assert_eq!(outcome.keys, vec!["talk_1", "talk_3"]);
    assert_eq!(outcome.skipped, 1);
}

#[tokio::test]
async fn malformed_result_line_aborts_by_default() {
    let objects = Arc::new(MemoryObjectStore::new());
    let output = ObjectLocation::parse("s3://media/embeddings-output/job3").unwrap();
    objects.put(output.join("embedding-audio.jsonl"), format!("{}\n{{oops\n", segment_line(0, "SUCCESS", 0)));
    let model = Arc::new(ScriptedModel {
        statuses: Mutex::new(VecDeque::new()),
        output,
        submitted: Mutex::new(Vec::new()),
    });
    let store = memory_store().await;
    let pipeline = EmbeddingPipeline::new(model.clone(), objects.clone(), store.clone(), options()).unwrap();
    assert!(matches!(pipeline.store_audio("talk").await, Err(Error::MalformedRecord { line: 2, .. })));
    assert!(store.query(&[1.0, 0.0, 0.0, 0.0], 5).await.unwrap().is_empty());

    let mut skip = options();
    skip.line_policy = LinePolicy::Skip;
    let pipeline = EmbeddingPipeline::new(model, objects, store, skip).unwrap();
    assert_eq!(pipeline.store_audio("talk").await.unwrap().keys, vec!["talk_1"]);
}

#[tokio::test]
async fn skipped_malformed_line_keeps_its_slot() {
    let objects = Arc::new(MemoryObjectStore::new());
    let output = ObjectLocation::parse("s3://media/embeddings-output/job4").unwrap();
    objects.put(
        output.join("embedding-audio.jsonl"),
        format!("{}\n{{\"embedding\":\n{}\n", segment_line(0, "SUCCESS", 0), segment_line(2, "SUCCESS", 2)),
    );
    let model = Arc::new(ScriptedModel {
        statuses: Mutex::new(VecDeque::new()),
        output,
        submitted: Mutex::new(Vec::new()),
    });
    let store = memory_store().await;
    let mut opts = options();
    opts.line_policy = LinePolicy::Skip;
    let pipeline = EmbeddingPipeline::new(model, objects, store.clone(), opts).unwrap();

    let outcome = pipeline.store_audio("talk").await.expect("store audio");
    assert_eq!(outcome.keys, vec!["talk_1", "talk_3"]);
    assert_eq!(outcome.skipped, 1);
    let hits = store.query(&[0.0, 0.0, 1.0, 0.0], 1).await.unwrap();
    assert_eq!(hits[0].key, "talk_3");
    assert_eq!(hits[0].metadata.as_ref().expect("metadata")["segment_index"], "2");
}

#[tokio::test]
async fn separate_video_keys_continue_from_video_into_audio() {
    let objects = Arc::new(MemoryObjectStore::new());
    let output = ObjectLocation::parse("s3://media/embeddings-output/job5").unwrap();
    objects.put(
        output.join("embedding-video.jsonl"),
        format!("{}\n{}\n", segment_line(0, "SUCCESS", 0), segment_line(1, "SUCCESS", 1)),
    );
    objects.put(
        output.join("embedding-audio.jsonl"),
        format!("{}\n{}\n", segment_line(0, "SUCCESS", 2), segment_line(1, "SUCCESS", 3)),
    );
    let model = Arc::new(ScriptedModel {
        statuses: Mutex::new(VecDeque::from(vec![JobStatus::InProgress, JobStatus::Completed])),
        output,
        submitted: Mutex::new(Vec::new()),
    });
    let store = memory_store().await;
    let mut opts = options();
    opts.media.video_mode = VideoEmbeddingMode::AudioVideoSeparate;
    let pipeline = EmbeddingPipeline::new(model.clone(), objects, store.clone(), opts).unwrap();

    let outcome = pipeline.store_video("v").await.expect("store video");
    assert_eq!(outcome.keys, vec!["v_1", "v_2", "v_3", "v_4"]);
    assert_eq!(model.submitted.lock().unwrap()[0].result_file_names().len(), 2);

    // the first audio segment follows the last video segment
    let hits = store.query(&[0.0, 0.0, 1.0, 0.0], 1).await.unwrap();
    assert_eq!(hits[0].key, "v_3");
    assert_eq!(hits[0].metadata.as_ref().expect("metadata")["segment_index"], "0");
}

#[tokio::test]
async fn failed_job_stores_nothing() {
    let model = Arc::new(ScriptedModel {
        statuses: Mutex::new(VecDeque::from(vec![JobStatus::InProgress, JobStatus::Failed])),
        output: ObjectLocation::parse("s3://media/out").unwrap(),
        submitted: Mutex::new(Vec::new()),
    });
    let store = memory_store().await;
    let pipeline = EmbeddingPipeline::new(model, Arc::new(MemoryObjectStore::new()), store.clone(), options()).unwrap();
    assert!(matches!(pipeline.store_video("v").await, Err(Error::JobFailed { .. })));
    assert!(store.query(&[1.0, 0.0, 0.0, 0.0], 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn fake_model_flow_over_lance() {
    let tmp = tempfile::TempDir::new().unwrap();
    let objects = Arc::new(MemoryObjectStore::new());
    let model = Arc::new(FakeEmbeddingModel::new(objects.clone()).with_pending_polls(1).with_segments(6));
    let mut opts = options();
    opts.dimension = 256;
    let store = VectorStore::new(
        Arc::new(LanceVectorIndex::new(tmp.path())),
        IndexSpec::new("vk-vector-store", "embeddings", 256, DistanceMetric::Cosine),
    );
    let pipeline = EmbeddingPipeline::new(model, objects, store, opts).unwrap();

    assert!(pipeline.create_bucket_and_index().await.unwrap());
    assert!(!pipeline.create_bucket_and_index().await.unwrap());

    pipeline
        .store_text("AWS Lambda is a serverless compute service for running code", "AWS Lambda Definition")
        .await
        .unwrap();
    pipeline
        .store_text(
            "Azure Functions is a serverless solution that allows you to build robust apps",
            "Azure Functions Definition",
        )
        .await
        .unwrap();
    assert_eq!(pipeline.store_image("AWS-Lambda").await.unwrap(), "AWS-Lambda");
    let audio = pipeline.store_audio("AWS-Lambda-explained-audio").await.unwrap();
    assert_eq!(audio.keys.len(), 6);
    assert_eq!(audio.keys[0], "AWS-Lambda-explained-audio_1");

    let hits = pipeline.search("Azure Functions is a serverless solution", 3).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].key, "Azure Functions Definition");
}

#[tokio::test]
async fn text_corpus_is_keyed_by_file_stem() {
    let tmp = tempfile::TempDir::new().unwrap();
    fs::write(tmp.path().join("lambda.txt"), "AWS Lambda runs code without servers").unwrap();
    fs::write(tmp.path().join("life.txt"), "Life is the most beautiful thing ever").unwrap();
    let objects = Arc::new(MemoryObjectStore::new());
    let model = Arc::new(FakeEmbeddingModel::new(objects.clone()));
    let pipeline = EmbeddingPipeline::new(model, objects, memory_store().await, options()).unwrap();

    let keys = pipeline.store_text_corpus(tmp.path()).await.unwrap();
    assert_eq!(keys, vec!["lambda", "life"]);
    let hits = pipeline.search("Life is the most beautiful thing ever", 1).await.unwrap();
    assert_eq!(hits[0].key, "life");
}

#[tokio::test]
async fn mismatched_index_dimension_is_rejected_up_front() {
    let objects = Arc::new(MemoryObjectStore::new());
    let model = Arc::new(FakeEmbeddingModel::new(objects.clone()));
    let mut opts = options();
    opts.dimension = 384;
    let res = EmbeddingPipeline::new(model, objects, memory_store().await, opts);
    assert!(matches!(res, Err(Error::InvalidConfig(_))));
}
