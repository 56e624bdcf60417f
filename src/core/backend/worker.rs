//! HTTP adapter for an out-of-process synthesis worker.
//!
//! The worker owns the actual models. The router talks to it over a small
//! JSON protocol:
//!
//! | Call | Request | Response |
//! |------|---------|----------|
//! | `POST /backends` | `{language, config_path?, ckpt_path?, device}` | `{id, language, speakers: [{name, id}]}` |
//! | `POST /backends/{id}/synthesize` | `{text, speaker_id, speed, format}` | audio bytes |
//! | `DELETE /backends/{id}` | | |
//! | `POST /classify` | `{text}` | `{language, confidence}` |

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{
    Backend, BackendBuilder, BackendLoadError, BackendLoadResult, BackendSpec, RenderRequest,
    SpeakerSet, SynthesisEngine, SynthesisError, SynthesisResult,
};
use crate::core::classifier::{
    ClassificationError, ClassificationResult, Detection, LanguageClassifier,
};
use crate::core::language::LanguageCode;

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
}

#[derive(Debug, Serialize)]
struct CreateBackendRequest<'a> {
    language: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_path: Option<&'a PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ckpt_path: Option<&'a PathBuf>,
    device: &'a str,
}

#[derive(Debug, Deserialize)]
struct WorkerSpeaker {
    name: String,
    id: u32,
}

#[derive(Debug, Deserialize)]
struct CreateBackendResponse {
    id: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    speakers: Vec<WorkerSpeaker>,
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    speaker_id: u32,
    speed: f32,
    format: &'a str,
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

/// Builds backends by asking the worker to load a model.
#[derive(Debug, Clone)]
pub struct WorkerBackendBuilder {
    client: Client,
    base_url: String,
}

impl WorkerBackendBuilder {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl BackendBuilder for WorkerBackendBuilder {
    async fn build(&self, spec: &BackendSpec) -> BackendLoadResult<Backend> {
        let target = spec.describe();
        let body = CreateBackendRequest {
            language: spec.language.as_str(),
            config_path: spec.config_path.as_ref(),
            ckpt_path: spec.ckpt_path.as_ref(),
            device: spec.device.as_str(),
        };

        debug!(spec = %target, device = %spec.device, "Requesting backend from worker");

        let response = self
            .client
            .post(endpoint(&self.base_url, "backends"))
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendLoadError::build(&target, e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendLoadError::build(
                &target,
                format!("worker returned {status}: {detail}"),
            ));
        }

        let created: CreateBackendResponse = response
            .json()
            .await
            .map_err(|e| BackendLoadError::build(&target, format!("invalid worker response: {e}")))?;

        let language_tag = created
            .language
            .unwrap_or_else(|| spec.language.as_str().to_string());
        let language = LanguageCode::from_canonical(&language_tag).unwrap_or(spec.language);
        let speakers: SpeakerSet = created
            .speakers
            .into_iter()
            .map(|s| (s.name, s.id))
            .collect();

        let engine = WorkerEngine {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            backend_id: created.id,
            released: AtomicBool::new(false),
        };

        info!(
            backend_id = %engine.backend_id,
            language = %language_tag,
            speakers = speakers.len(),
            "Worker backend loaded"
        );

        Backend::new(language, language_tag, spec.device, speakers, Box::new(engine))
    }
}

/// Rendering handle for one backend living in the worker.
///
/// Dropping the handle asks the worker to unload the model unless
/// [`SynthesisEngine::release`] already did.
#[derive(Debug)]
pub struct WorkerEngine {
    client: Client,
    base_url: String,
    backend_id: String,
    released: AtomicBool,
}

impl WorkerEngine {
    pub fn backend_id(&self) -> &str {
        &self.backend_id
    }

    fn release_url(&self) -> String {
        endpoint(&self.base_url, &format!("backends/{}", self.backend_id))
    }
}

async fn send_release(client: &Client, url: String, backend_id: &str) {
    match client.delete(url).send().await {
        Ok(response) if response.status().is_success() => {
            debug!(backend_id = %backend_id, "Worker backend released")
        }
        Ok(response) => warn!(
            backend_id = %backend_id,
            status = %response.status(),
            "Worker refused backend release"
        ),
        Err(e) => warn!(backend_id = %backend_id, "Failed to release worker backend: {e}"),
    }
}

#[async_trait]
impl SynthesisEngine for WorkerEngine {
    async fn render(&self, request: RenderRequest<'_>) -> SynthesisResult<Bytes> {
        let body = SynthesizeRequest {
            text: request.text,
            speaker_id: request.speaker_id,
            speed: request.speed,
            format: request.format.as_str(),
        };

        let url = endpoint(
            &self.base_url,
            &format!("backends/{}/synthesize", self.backend_id),
        );
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SynthesisError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Render(format!(
                "worker returned {status}: {detail}"
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Transport(e.to_string()))
    }

    async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        send_release(&self.client, self.release_url(), &self.backend_id).await;
    }
}

impl Drop for WorkerEngine {
    fn drop(&mut self) {
        if *self.released.get_mut() {
            return;
        }
        // Outside a runtime the worker reclaims the model when it exits
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let client = self.client.clone();
        let url = self.release_url();
        let backend_id = std::mem::take(&mut self.backend_id);
        handle.spawn(async move {
            send_release(&client, url, &backend_id).await;
        });
    }
}

/// Language classification served by the worker.
#[derive(Debug, Clone)]
pub struct WorkerClassifier {
    client: Client,
    base_url: String,
}

impl WorkerClassifier {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl LanguageClassifier for WorkerClassifier {
    async fn classify(&self, text: &str) -> ClassificationResult<Detection> {
        let response = self
            .client
            .post(endpoint(&self.base_url, "classify"))
            .json(&ClassifyRequest { text })
            .send()
            .await
            .map_err(|e| ClassificationError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassificationError::Unavailable(format!(
                "worker returned {status}"
            )));
        }

        let detection: Detection = response
            .json()
            .await
            .map_err(|e| ClassificationError::Unavailable(e.to_string()))?;
        Ok(Detection::new(detection.language, detection.confidence))
    }
}
