use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use mmvec_core::config::Config;
use mmvec_core::types::{JobSnapshot, QueryMatch};
use mmvec_embed::cancellation;
use mmvec_pipeline::{EmbeddingPipeline, SegmentedOutcome};
use mmvec_cli::{build_pipeline, run_demo};

#[derive(Parser)]
#[command(name = "mmvec", version, about = "Multimodal embeddings into a vector index")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the vector bucket and index
    Init,
    /// Embed a text and store it under KEY
    Text { key: String, text: String },
    /// Embed every *.txt file under DIR, keyed by file stem
    TextDir { dir: PathBuf },
    /// Embed images from the media prefix (names without extension)
    Image {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Embed audio files as 15 second segments
    Audio {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Embed video files as 15 second segments
    Video {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Nearest stored vectors for a text query
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
    /// Run the full sample sequence
    Demo,
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn print_matches(query: &str, hits: &[QueryMatch]) {
    println!("🔎 '{}' -> {} hits", query, hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let source = hit.metadata.as_ref().and_then(|m| m.get("source")).map_or("-", String::as_str);
        println!("{:>3}. {:<48} distance={:.4}  {}", i + 1, hit.key, hit.distance, source);
    }
}

async fn store_segments<F, Fut>(names: &[String], pb: &ProgressBar, store: F) -> Result<()>
where
    F: Fn(String) -> Fut,
    Fut: std::future::Future<Output = mmvec_core::Result<SegmentedOutcome>>,
{
    for name in names {
        pb.set_message(format!("submitting {name}"));
        let outcome = store(name.clone()).await.with_context(|| format!("embedding '{name}'"))?;
        pb.println(format!(
            "✅ {name}: {} segments stored, {} skipped (job {})",
            outcome.keys.len(),
            outcome.skipped,
            outcome.job
        ));
    }
    Ok(())
}

async fn run(command: Command, pipeline: &EmbeddingPipeline, pb: &ProgressBar) -> Result<()> {
    match command {
        Command::Init => {
            let created = pipeline.create_bucket_and_index().await?;
            let spec = pipeline.store().spec();
            println!(
                "{} {}/{} (dimension {}, {})",
                if created { "Created" } else { "Using existing" },
                spec.bucket,
                spec.index,
                spec.dimension,
                spec.metric.as_str()
            );
        }
        Command::Text { key, text } => {
            pipeline.store_text(&text, &key).await?;
            println!("✅ stored '{key}'");
        }
        Command::TextDir { dir } => {
            let keys = pipeline.store_text_corpus(&dir).await.with_context(|| format!("indexing {}", dir.display()))?;
            println!("✅ stored {} documents from {}", keys.len(), dir.display());
        }
        Command::Image { names } => {
            for name in names {
                let key = pipeline.store_image(&name).await.with_context(|| format!("embedding image '{name}'"))?;
                println!("✅ stored '{key}'");
            }
        }
        Command::Audio { names } => {
            store_segments(&names, pb, |n| async move { pipeline.store_audio(&n).await }).await?
        }
        Command::Video { names } => {
            store_segments(&names, pb, |n| async move { pipeline.store_video(&n).await }).await?
        }
        Command::Search { query, top_k } => {
            let hits = pipeline.search(&query, top_k).await?;
            print_matches(&query, &hits);
        }
        Command::Demo => {
            let report = run_demo(pipeline).await?;
            println!("✅ stored {} vectors", report.stored.len());
            for (query, hits) in &report.searches {
                print_matches(query, hits);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let settings = Config::load().context("loading configuration")?.settings().context("reading settings")?;

    let (handle, listener) = cancellation();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("interrupt received, cancelling");
                handle.cancel();
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for Ctrl-C");
                // Keep the handle alive; dropping it would read as cancellation.
                std::future::pending::<()>().await;
                drop(handle);
            }
        }
    });

    let pb = spinner();
    let observer_pb = pb.clone();
    let pipeline = build_pipeline(&settings, listener)?.with_poll_observer(Arc::new(move |s: &JobSnapshot| {
        observer_pb.set_message(format!("job {} {}", s.handle, s.status));
    }));

    let result = run(cli.command, &pipeline, &pb).await;
    pb.finish_and_clear();
    result
}
