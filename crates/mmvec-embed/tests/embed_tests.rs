use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use mmvec_core::object_store::MemoryObjectStore;
use mmvec_core::records::LinePolicy;
use mmvec_core::request::{AudioFormat, EmbeddingRequest, VideoEmbeddingMode, VideoFormat};
use mmvec_core::traits::EmbeddingModel;
use mmvec_core::types::{EmbeddingPurpose, JobHandle, JobStatus};
use mmvec_core::{Error, ObjectLocation};
use mmvec_embed::{
    fetch_segments, BedrockRuntimeClient, CancellationListener, FakeEmbeddingModel, JobPoller, PollPolicy,
};

const MODEL_ID: &str = "amazon.nova-2-multimodal-embeddings-v1:0";

fn client(server: &MockServer) -> BedrockRuntimeClient {
    BedrockRuntimeClient::new(&server.base_url(), MODEL_ID, Some("test-key".into()), Duration::from_secs(5))
        .expect("client")
}

fn loc(uri: &str) -> ObjectLocation {
    ObjectLocation::parse(uri).expect("location")
}

#[tokio::test]
async fn invoke_posts_model_input_and_reads_first_vector() {
    let server = MockServer::start();
    let m = server.mock(|when, then| {
        when.method(POST)
            .path(format!("/model/{MODEL_ID}/invoke"))
            .header_exists("authorization")
            .json_body_partial(r#"{"taskType":"SINGLE_EMBEDDING","singleEmbeddingParams":{"embeddingDimension":384}}"#);
        then.status(200).body(r#"{"embeddings":[{"embeddingType":"TEXT","embedding":[0.1,0.2,0.3]}]}"#);
    });

    let req = EmbeddingRequest::text(EmbeddingPurpose::GenericIndex, 384, "AWS Lambda");
    let res = client(&server).invoke(&req).await.expect("invoke");
    m.assert();
    assert_eq!(res.first_vector().unwrap(), &[0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn client_errors_surface_status_and_body() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(format!("/model/{MODEL_ID}/invoke"));
        then.status(400).body("ValidationException: embeddingDimension");
    });

    let req = EmbeddingRequest::text(EmbeddingPurpose::GenericIndex, 384, "x");
    match client(&server).invoke(&req).await {
        Err(Error::Remote { status, body, .. }) => {
            assert_eq!(status, 400);
            assert!(body.contains("ValidationException"));
        }
        other => panic!("expected Remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn start_async_sends_output_config_and_returns_arn() {
    let server = MockServer::start();
    let m = server.mock(|when, then| {
        when.method(POST).path("/async-invoke").json_body_partial(
            r#"{
                "modelId": "amazon.nova-2-multimodal-embeddings-v1:0",
                "modelInput": {"taskType": "SEGMENTED_EMBEDDING"},
                "outputDataConfig": {"s3OutputDataConfig": {"s3Uri": "s3://media/embeddings-output/"}}
            }"#,
        );
        then.status(200).body(r#"{"invocationArn":"arn:aws:bedrock:us-east-1:1:async-invoke/abc"}"#);
    });

    let media = loc("s3://media/talk.mp3");
    let req = EmbeddingRequest::audio(EmbeddingPurpose::GenericIndex, 384, &media, AudioFormat::Mp3);
    let job = client(&server).start_async(&req, &loc("s3://media/embeddings-output/")).await.expect("start");
    m.assert();
    assert_eq!(job.as_str(), "arn:aws:bedrock:us-east-1:1:async-invoke/abc");
}

#[tokio::test]
async fn job_status_parses_output_location() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path_contains("/async-invoke/");
        then.status(200).body(
            r#"{"status":"Completed","outputDataConfig":{"s3OutputDataConfig":{"s3Uri":"s3://media/embeddings-output/abc"}}}"#,
        );
    });

    let job = JobHandle::new("arn:aws:bedrock:us-east-1:1:async-invoke/abc");
    let snap = client(&server).job_status(&job).await.expect("status");
    assert_eq!(snap.status, JobStatus::Completed);
    assert_eq!(snap.output, Some(loc("s3://media/embeddings-output/abc")));
    assert_eq!(snap.failure_message, None);
}

#[tokio::test]
async fn job_status_carries_failure_message() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path_contains("/async-invoke/");
        then.status(200).body(r#"{"status":"Failed","failureMessage":"media not readable"}"#);
    });

    let snap = client(&server).job_status(&JobHandle::new("arn:x/y")).await.expect("status");
    assert_eq!(snap.status, JobStatus::Failed);
    assert_eq!(snap.failure_message.as_deref(), Some("media not readable"));
}

#[tokio::test]
async fn fake_model_completes_and_writes_result_file() {
    let objects = Arc::new(MemoryObjectStore::new());
    let model = FakeEmbeddingModel::new(objects.clone()).with_pending_polls(2).with_segments(3);
    let req = EmbeddingRequest::video(
        EmbeddingPurpose::GenericIndex,
        256,
        &loc("s3://media/talk.mp4"),
        VideoFormat::Mp4,
        VideoEmbeddingMode::AudioVideoCombined,
    );
    let job = model.start_async(&req, &loc("s3://media/out/")).await.expect("start");

    let poller = JobPoller::new(PollPolicy::fixed(Duration::from_millis(1)), CancellationListener::never());
    let done = poller.wait(&model, &job).await.expect("done");
    assert_eq!(done.sleeps, 2);

    let segs = fetch_segments(objects.as_ref(), &done.output, "embedding-audio-video.jsonl", LinePolicy::Abort)
        .await
        .expect("fetch");
    let segs: Vec<_> = segs.into_iter().flatten().collect();
    assert_eq!(segs.len(), 3);
    assert!(segs.iter().all(|s| s.is_success() && s.embedding.len() == 256));
    let idx: Vec<u32> = segs.iter().map(|s| s.segment_metadata.segment_index).collect();
    assert_eq!(idx, vec![0, 1, 2]);
    assert_eq!(segs[1].segment_metadata.segment_start_seconds, 15.0);
}

#[tokio::test]
async fn fake_model_is_deterministic_for_text() {
    let model = FakeEmbeddingModel::new(Arc::new(MemoryObjectStore::new()));
    let req = EmbeddingRequest::text(EmbeddingPurpose::GenericRetrieval, 384, "hello world");
    let a = model.invoke(&req).await.unwrap().into_first_vector().unwrap();
    let b = model.invoke(&req).await.unwrap().into_first_vector().unwrap();
    assert_eq!(a.len(), 384);
    assert_eq!(a, b);
}

#[tokio::test]
async fn fetching_a_missing_result_file_is_not_found() {
    let objects = MemoryObjectStore::new();
    let res = fetch_segments(&objects, &loc("s3://media/out/job"), "embedding-audio.jsonl", LinePolicy::Abort).await;
    assert!(matches!(res, Err(Error::NotFound(_))));
}
