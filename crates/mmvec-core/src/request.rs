//! Embedding request construction.
//!
//! Requests serialize to the model's JSON input document: a `taskType` plus a
//! single params block (`singleEmbeddingParams` for text and image,
//! `segmentedEmbeddingParams` for audio and video) holding the purpose, the
//! output dimension and exactly one media payload.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::location::ObjectLocation;
use crate::types::{EmbeddingPurpose, Modality, SEGMENT_DURATION_SECONDS};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    SingleEmbedding,
    SegmentedEmbedding,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TruncationMode {
    Start,
    #[default]
    End,
    None,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    #[default]
    Jpeg,
    Gif,
    Webp,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
    Ogg,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    #[default]
    Mp4,
    Mov,
    Mkv,
    Webm,
    Flv,
    Mpeg,
    Mpg,
    Wmv,
    #[serde(rename = "3gp")]
    ThreeGp,
}

/// How a video's soundtrack is embedded relative to its frames.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoEmbeddingMode {
    #[default]
    AudioVideoCombined,
    AudioVideoSeparate,
}

impl ImageFormat {
    /// File extension conventionally used for this format (with the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => ".png",
            ImageFormat::Jpeg => ".jpg",
            ImageFormat::Gif => ".gif",
            ImageFormat::Webp => ".webp",
        }
    }
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => ".mp3",
            AudioFormat::Wav => ".wav",
            AudioFormat::Ogg => ".ogg",
        }
    }
}

impl VideoFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            VideoFormat::Mp4 => ".mp4",
            VideoFormat::Mov => ".mov",
            VideoFormat::Mkv => ".mkv",
            VideoFormat::Webm => ".webm",
            VideoFormat::Flv => ".flv",
            VideoFormat::Mpeg => ".mpeg",
            VideoFormat::Mpg => ".mpg",
            VideoFormat::Wmv => ".wmv",
            VideoFormat::ThreeGp => ".3gp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Location {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSource {
    pub s3_location: S3Location,
}

impl MediaSource {
    fn from_location(location: &ObjectLocation) -> Self {
        Self { s3_location: S3Location { uri: location.uri() } }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationConfig {
    pub duration_seconds: u32,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self { duration_seconds: SEGMENT_DURATION_SECONDS }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextInput {
    pub truncation_mode: TruncationMode,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInput {
    pub format: ImageFormat,
    pub source: MediaSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioInput {
    pub format: AudioFormat,
    pub source: MediaSource,
    pub segmentation_config: SegmentationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInput {
    pub format: VideoFormat,
    pub embedding_mode: VideoEmbeddingMode,
    pub source: MediaSource,
    pub segmentation_config: SegmentationConfig,
}

/// Purpose, dimension and the single media payload of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingParams {
    pub embedding_purpose: EmbeddingPurpose,
    pub embedding_dimension: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoInput>,
}

impl EmbeddingParams {
    fn empty(purpose: EmbeddingPurpose, dimension: usize) -> Self {
        Self {
            embedding_purpose: purpose,
            embedding_dimension: dimension,
            text: None,
            image: None,
            audio: None,
            video: None,
        }
    }
}

/// A model input document. The params block is serialized under the key
/// that matches `task_type`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRequest {
    task_type: TaskType,
    params: EmbeddingParams,
}

impl Serialize for EmbeddingRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let params_key = match self.task_type {
            TaskType::SingleEmbedding => "singleEmbeddingParams",
            TaskType::SegmentedEmbedding => "segmentedEmbeddingParams",
        };
        let mut doc = serializer.serialize_struct("EmbeddingRequest", 2)?;
        doc.serialize_field("taskType", &self.task_type)?;
        doc.serialize_field(params_key, &self.params)?;
        doc.end()
    }
}

impl EmbeddingRequest {
    pub fn text(purpose: EmbeddingPurpose, dimension: usize, value: impl Into<String>) -> Self {
        let mut params = EmbeddingParams::empty(purpose, dimension);
        params.text = Some(TextInput { truncation_mode: TruncationMode::End, value: value.into() });
        Self::single(params)
    }

    pub fn image(purpose: EmbeddingPurpose, dimension: usize, location: &ObjectLocation, format: ImageFormat) -> Self {
        let mut params = EmbeddingParams::empty(purpose, dimension);
        params.image = Some(ImageInput { format, source: MediaSource::from_location(location) });
        Self::single(params)
    }

    pub fn audio(purpose: EmbeddingPurpose, dimension: usize, location: &ObjectLocation, format: AudioFormat) -> Self {
        let mut params = EmbeddingParams::empty(purpose, dimension);
        params.audio = Some(AudioInput {
            format,
            source: MediaSource::from_location(location),
            segmentation_config: SegmentationConfig::default(),
        });
        Self::segmented(params)
    }

    pub fn video(
        purpose: EmbeddingPurpose,
        dimension: usize,
        location: &ObjectLocation,
        format: VideoFormat,
        mode: VideoEmbeddingMode,
    ) -> Self {
        let mut params = EmbeddingParams::empty(purpose, dimension);
        params.video = Some(VideoInput {
            format,
            embedding_mode: mode,
            source: MediaSource::from_location(location),
            segmentation_config: SegmentationConfig::default(),
        });
        Self::segmented(params)
    }

    fn single(params: EmbeddingParams) -> Self {
        Self { task_type: TaskType::SingleEmbedding, params }
    }

    fn segmented(params: EmbeddingParams) -> Self {
        Self { task_type: TaskType::SegmentedEmbedding, params }
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn params(&self) -> &EmbeddingParams {
        &self.params
    }

    pub fn purpose(&self) -> EmbeddingPurpose {
        self.params().embedding_purpose
    }

    pub fn dimension(&self) -> usize {
        self.params().embedding_dimension
    }

    pub fn modality(&self) -> Modality {
        let p = self.params();
        if p.video.is_some() {
            Modality::Video
        } else if p.audio.is_some() {
            Modality::Audio
        } else if p.image.is_some() {
            Modality::Image
        } else {
            Modality::Text
        }
    }

    /// The remote media this request points at, if any.
    pub fn source_uri(&self) -> Option<&str> {
        let p = self.params();
        let source = p
            .image
            .as_ref()
            .map(|i| &i.source)
            .or_else(|| p.audio.as_ref().map(|a| &a.source))
            .or_else(|| p.video.as_ref().map(|v| &v.source))?;
        Some(source.s3_location.uri.as_str())
    }

    /// Names of the JSONL files an async job for this request writes into its
    /// output location, in the order their records should be consumed.
    pub fn result_file_names(&self) -> Vec<&'static str> {
        let p = self.params();
        match self.modality() {
            Modality::Text => vec!["embedding-text.jsonl"],
            Modality::Image => vec!["embedding-image.jsonl"],
            Modality::Audio => vec!["embedding-audio.jsonl"],
            Modality::Video => match p.video.as_ref().map(|v| v.embedding_mode) {
                Some(VideoEmbeddingMode::AudioVideoSeparate) => vec!["embedding-video.jsonl", "embedding-audio.jsonl"],
                _ => vec!["embedding-audio-video.jsonl"],
            },
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| Error::parse("embedding request", e))
    }
}
