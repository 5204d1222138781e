//! Layered configuration.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_POLL__INTERVAL_SECS`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::location::ObjectLocation;
use crate::records::LinePolicy;
use crate::request::{AudioFormat, ImageFormat, VideoEmbeddingMode, VideoFormat};
use crate::types::{DistanceMetric, IndexSpec, SUPPORTED_DIMENSIONS};

pub const DEFAULT_MODEL_ID: &str = "amazon.nova-2-multimodal-embeddings-v1:0";
pub const DEFAULT_DIMENSION: usize = 384;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// The full typed settings tree, validated.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub model: ModelSettings,
    pub media: MediaSettings,
    pub poll: PollSettings,
    pub fetch: FetchSettings,
    pub objects: ObjectSettings,
    pub vectors: VectorSettings,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    #[default]
    Bedrock,
    Fake,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelSettings {
    pub backend: ModelBackend,
    pub model_id: String,
    pub region: String,
    /// Overrides the regional runtime endpoint (proxies, tests).
    pub endpoint: Option<String>,
    /// Environment variable holding the bearer API key.
    pub api_key_env: String,
    pub dimension: usize,
    pub request_timeout_secs: u64,
    /// Fake backend: polls a job stays in progress before completing.
    pub fake_pending_polls: u32,
    /// Fake backend: segments written per audio/video job.
    pub fake_segments: u32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            backend: ModelBackend::Bedrock,
            model_id: DEFAULT_MODEL_ID.to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            api_key_env: "AWS_BEARER_TOKEN_BEDROCK".to_string(),
            dimension: DEFAULT_DIMENSION,
            request_timeout_secs: 60,
            fake_pending_polls: 2,
            fake_segments: 6,
        }
    }
}

impl ModelSettings {
    /// `APP_USE_FAKE_EMBEDDINGS=1` wins over the configured backend.
    pub fn effective_backend(&self) -> ModelBackend {
        if fake_embeddings_forced() {
            ModelBackend::Fake
        } else {
            self.backend
        }
    }

    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(e) => e.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-runtime.{}.amazonaws.com", self.region),
        }
    }
}

pub fn fake_embeddings_forced() -> bool {
    env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MediaSettings {
    /// Prefix media names are resolved against: `<prefix><name><ext>`.
    pub uri_prefix: String,
    /// Where async jobs write their result files.
    pub output_uri: String,
    pub image_format: ImageFormat,
    pub audio_format: AudioFormat,
    pub video_format: VideoFormat,
    pub video_mode: VideoEmbeddingMode,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            uri_prefix: "s3://mmvec-media/".to_string(),
            output_uri: "s3://mmvec-media/embeddings-output/".to_string(),
            image_format: ImageFormat::Jpeg,
            audio_format: AudioFormat::Mp3,
            video_format: VideoFormat::Mp4,
            video_mode: VideoEmbeddingMode::AudioVideoCombined,
        }
    }
}

impl MediaSettings {
    pub fn media_location(&self, name: &str, extension: &str) -> Result<ObjectLocation> {
        ObjectLocation::parse(&format!("{}{}{}", self.uri_prefix, name, extension))
    }

    pub fn output_location(&self) -> Result<ObjectLocation> {
        ObjectLocation::parse(&self.output_uri)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollSettings {
    pub interval_secs: f64,
    /// Growth factor applied to the delay after each poll; 1.0 keeps it fixed.
    pub multiplier: f64,
    pub max_interval_secs: f64,
    pub timeout_secs: Option<f64>,
    pub max_polls: Option<u32>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: 20.0,
            multiplier: 1.0,
            max_interval_secs: 300.0,
            timeout_secs: Some(3600.0),
            max_polls: None,
        }
    }
}

impl PollSettings {
    pub fn interval(&self) -> Duration {
        secs(self.interval_secs)
    }

    pub fn max_interval(&self) -> Duration {
        secs(self.max_interval_secs.max(self.interval_secs))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(secs)
    }
}

/// Seconds to a `Duration`, saturating instead of panicking on values
/// that `Settings::validate` would reject.
fn secs(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchSettings {
    pub line_policy: LinePolicy,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectBackend {
    #[default]
    Fs,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObjectSettings {
    pub backend: ObjectBackend,
    /// Directory holding one sub-directory per bucket.
    pub root: String,
}

impl Default for ObjectSettings {
    fn default() -> Self {
        Self { backend: ObjectBackend::Fs, root: "~/.mmvec/objects".to_string() }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    #[default]
    Lance,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorSettings {
    pub backend: VectorBackend,
    /// Directory holding one LanceDB database per vector bucket.
    pub lance_root: String,
    pub bucket: String,
    pub index: String,
    pub metric: DistanceMetric,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Lance,
            lance_root: "~/.mmvec/vectors".to_string(),
            bucket: "mmvec-vector-store".to_string(),
            index: "embeddings".to_string(),
            metric: DistanceMetric::Cosine,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_DIMENSIONS.contains(&self.model.dimension) {
            return Err(Error::InvalidConfig(format!(
                "model.dimension must be one of {:?}, got {}",
                SUPPORTED_DIMENSIONS, self.model.dimension
            )));
        }
        if self.model.model_id.trim().is_empty() {
            return Err(Error::InvalidConfig("model.model_id is empty".to_string()));
        }
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.poll.interval_secs) {
            return Err(Error::InvalidConfig("poll.interval_secs must be positive and finite".to_string()));
        }
        if !positive(self.poll.max_interval_secs) {
            return Err(Error::InvalidConfig("poll.max_interval_secs must be positive and finite".to_string()));
        }
        if !(self.poll.multiplier.is_finite() && self.poll.multiplier >= 1.0) {
            return Err(Error::InvalidConfig("poll.multiplier must be finite and >= 1.0".to_string()));
        }
        if matches!(self.poll.timeout_secs, Some(t) if !positive(t)) {
            return Err(Error::InvalidConfig("poll.timeout_secs must be positive and finite".to_string()));
        }
        if self.vectors.bucket.is_empty() || self.vectors.index.is_empty() {
            return Err(Error::InvalidConfig("vectors.bucket and vectors.index are required".to_string()));
        }
        self.media.output_location().map_err(|e| Error::InvalidConfig(format!("media.output_uri: {e}")))?;
        ObjectLocation::parse(&self.media.uri_prefix)
            .map_err(|e| Error::InvalidConfig(format!("media.uri_prefix: {e}")))?;
        Ok(())
    }

    pub fn index_spec(&self) -> IndexSpec {
        IndexSpec::new(&self.vectors.bucket, &self.vectors.index, self.model.dimension, self.vectors.metric)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
