//! Wiring shared by the `mmvec` binary: turn settings into concrete services
//! and run the demo sequence.

use anyhow::{Context, Result};
use std::sync::Arc;

use mmvec_core::config::{expand_path, ModelBackend, ObjectBackend, Settings, VectorBackend};
use mmvec_core::object_store::{FsObjectStore, MemoryObjectStore};
use mmvec_core::traits::{EmbeddingModel, ObjectStore, VectorIndexService};
use mmvec_core::types::QueryMatch;
use mmvec_embed::{BedrockRuntimeClient, CancellationListener, FakeEmbeddingModel};
use mmvec_pipeline::{EmbeddingPipeline, PipelineOptions};
use mmvec_vector::{LanceVectorIndex, MemoryVectorIndex, VectorStore};

pub struct Services {
    pub model: Arc<dyn EmbeddingModel>,
    pub objects: Arc<dyn ObjectStore>,
    pub vectors: Arc<dyn VectorIndexService>,
}

pub fn build_services(settings: &Settings) -> Result<Services> {
    let (model, objects): (Arc<dyn EmbeddingModel>, Arc<dyn ObjectStore>) = match settings.model.effective_backend() {
        ModelBackend::Fake => {
            // The fake writes job results into memory, so it must also be the reader.
            let memory = Arc::new(MemoryObjectStore::new());
            let fake = FakeEmbeddingModel::new(memory.clone())
                .with_pending_polls(settings.model.fake_pending_polls)
                .with_segments(settings.model.fake_segments);
            tracing::info!("using fake embedding model");
            (Arc::new(fake), memory)
        }
        ModelBackend::Bedrock => {
            let client = BedrockRuntimeClient::from_settings(&settings.model).context("building Bedrock client")?;
            let objects: Arc<dyn ObjectStore> = match settings.objects.backend {
                ObjectBackend::Fs => Arc::new(FsObjectStore::new(expand_path(&settings.objects.root))),
                ObjectBackend::Memory => Arc::new(MemoryObjectStore::new()),
            };
            (Arc::new(client), objects)
        }
    };
    let vectors: Arc<dyn VectorIndexService> = match settings.vectors.backend {
        VectorBackend::Lance => Arc::new(LanceVectorIndex::new(expand_path(&settings.vectors.lance_root))),
        VectorBackend::Memory => Arc::new(MemoryVectorIndex::new()),
    };
    Ok(Services { model, objects, vectors })
}

pub fn build_pipeline(settings: &Settings, cancel: CancellationListener) -> Result<EmbeddingPipeline> {
    let services = build_services(settings)?;
    let store = VectorStore::new(services.vectors, settings.index_spec());
    let pipeline = EmbeddingPipeline::new(services.model, services.objects, store, PipelineOptions::from(settings))?;
    Ok(pipeline.with_cancellation(cancel))
}

pub const DEMO_TEXTS: [(&str, &str); 3] = [
    (
        "AWS Lambda Definition",
        "AWS Lambda is a serverless compute service for running code without having to provision or manage servers. You pay only for the compute time you consume.",
    ),
    (
        "Azure Functions Definition",
        "Azure Functions is a serverless solution that allows you to build robust apps while using less code, and with less infrastructure and lower costs.",
    ),
    ("Life  Definition", "Life is the most beautiful thing ever"),
];
pub const DEMO_IMAGES: [&str; 2] = ["AWS-Lambda", "Azure-Functions"];
pub const DEMO_AUDIO: [&str; 1] = ["AWS-Lambda-explained-in-90-seconds-audio"];
pub const DEMO_VIDEO: [&str; 1] = ["AWS-Lambda-explained-in-90-seconds-video"];
pub const DEMO_SEARCHES: [(&str, usize); 2] = [("Azure Functions", 5), ("AWS Lambda", 20)];

#[derive(Debug, Default)]
pub struct DemoReport {
    pub stored: Vec<String>,
    pub searches: Vec<(String, Vec<QueryMatch>)>,
}

/// Index texts, images, audio and video, then run the sample searches.
pub async fn run_demo(pipeline: &EmbeddingPipeline) -> Result<DemoReport> {
    let mut report = DemoReport::default();
    pipeline.create_bucket_and_index().await?;
    for (key, text) in DEMO_TEXTS {
        pipeline.store_text(text, key).await.with_context(|| format!("storing text '{key}'"))?;
        report.stored.push(key.to_string());
    }
    for name in DEMO_IMAGES {
        report.stored.push(pipeline.store_image(name).await.with_context(|| format!("storing image '{name}'"))?);
    }
    for name in DEMO_AUDIO {
        report.stored.extend(pipeline.store_audio(name).await.with_context(|| format!("storing audio '{name}'"))?.keys);
    }
    for name in DEMO_VIDEO {
        report.stored.extend(pipeline.store_video(name).await.with_context(|| format!("storing video '{name}'"))?.keys);
    }
    for (query, top_k) in DEMO_SEARCHES {
        let hits = pipeline.search(query, top_k).await?;
        report.searches.push((query.to_string(), hits));
    }
    Ok(report)
}
