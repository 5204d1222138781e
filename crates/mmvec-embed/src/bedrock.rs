//! Bedrock runtime client for the multimodal embedding model.
//!
//! Talks to the runtime REST API directly:
//! - `POST /model/{modelId}/invoke` for synchronous embeddings
//! - `POST /async-invoke` to submit a segmented job
//! - `GET /async-invoke/{invocationArn}` to observe it
//!
//! Requests authenticate with a Bedrock API key sent as a bearer token.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use mmvec_core::config::ModelSettings;
use mmvec_core::records::EmbeddingResponse;
use mmvec_core::request::EmbeddingRequest;
use mmvec_core::traits::EmbeddingModel;
use mmvec_core::types::{JobHandle, JobSnapshot, JobStatus};
use mmvec_core::{Error, ObjectLocation, Result};

const SERVICE: &str = "bedrock-runtime";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S3OutputDataConfig {
    s3_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutputDataConfig {
    s3_output_data_config: S3OutputDataConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartAsyncInvokeRequest<'a> {
    model_id: &'a str,
    model_input: &'a EmbeddingRequest,
    output_data_config: OutputDataConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartAsyncInvokeResponse {
    invocation_arn: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetAsyncInvokeResponse {
    status: JobStatus,
    #[serde(default)]
    failure_message: Option<String>,
    #[serde(default)]
    output_data_config: Option<OutputDataConfig>,
}

pub struct BedrockRuntimeClient {
    client: Client,
    endpoint: Url,
    model_id: String,
    api_key: Option<String>,
}

impl BedrockRuntimeClient {
    pub fn new(
        endpoint: &str,
        model_id: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| Error::InvalidConfig(format!("bad endpoint '{endpoint}': {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport { service: SERVICE.to_string(), reason: e.to_string() })?;
        Ok(Self { client, endpoint, model_id: model_id.into(), api_key })
    }

    /// Build from settings, reading the API key from `settings.api_key_env`.
    pub fn from_settings(settings: &ModelSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!(var = %settings.api_key_env, "no Bedrock API key set; sending unauthenticated requests");
        }
        Self::new(
            &settings.endpoint_url(),
            settings.model_id.clone(),
            api_key,
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidConfig(format!("endpoint '{}' cannot take a path", self.endpoint)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        let req = req.header("Accept", "application/json");
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Vec<u8>> {
        let res = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| Error::Transport { service: SERVICE.to_string(), reason: e.to_string() })?;
        let status = res.status();
        let body = res
            .bytes()
            .await
            .map_err(|e| Error::Transport { service: SERVICE.to_string(), reason: e.to_string() })?;
        if !status.is_success() {
            return Err(Error::Remote {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).to_string(),
            });
        }
        Ok(body.to_vec())
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
        let body = self.send(req).await?;
        serde_json::from_slice(&body).map_err(|e| Error::parse(what, e))
    }
}

#[async_trait]
impl EmbeddingModel for BedrockRuntimeClient {
    async fn invoke(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse> {
        let url = self.url(&["model", &self.model_id, "invoke"])?;
        tracing::debug!(modality = %request.modality(), %url, "invoking model");
        let body = self.send(self.client.post(url).json(request)).await?;
        EmbeddingResponse::from_slice(&body)
    }

    async fn start_async(&self, request: &EmbeddingRequest, output: &ObjectLocation) -> Result<JobHandle> {
        let url = self.url(&["async-invoke"])?;
        let payload = StartAsyncInvokeRequest {
            model_id: &self.model_id,
            model_input: request,
            output_data_config: OutputDataConfig { s3_output_data_config: S3OutputDataConfig { s3_uri: output.uri() } },
        };
        let res: StartAsyncInvokeResponse =
            self.send_json(self.client.post(url).json(&payload), "start async invoke response").await?;
        tracing::info!(
            job = %res.invocation_arn,
            modality = %request.modality(),
            output = %output,
            "submitted async embedding job"
        );
        Ok(JobHandle::new(res.invocation_arn))
    }

    async fn job_status(&self, job: &JobHandle) -> Result<JobSnapshot> {
        let url = self.url(&["async-invoke", job.as_str()])?;
        let res: GetAsyncInvokeResponse = self.send_json(self.client.get(url), "get async invoke response").await?;
        let output = match res.output_data_config {
            Some(cfg) => Some(ObjectLocation::parse(&cfg.s3_output_data_config.s3_uri)?),
            None => None,
        };
        Ok(JobSnapshot { handle: job.clone(), status: res.status, output, failure_message: res.failure_message })
    }
}
