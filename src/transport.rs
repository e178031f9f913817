use async_trait::async_trait;
use reqwest::{multipart, Client};
use tokio_util::sync::CancellationToken;
use tracing::{info, error, debug};

use crate::{
    error::TransportError,
    models::{ApiEnvelope, ErrorBody, Generation, GenerationRequest, UploadedFile},
};

/// One attempt against a generation backend. Implementations must return
/// `TransportError::Cancelled` promptly once `cancel` fires.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &GenerationRequest, cancel: CancellationToken) -> Result<Generation, TransportError>;
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn perform_generate(&self, request: &GenerationRequest) -> Result<Generation, TransportError> {
        let url = format!("{}/api/generate", self.base_url);
        info!("🔗 POST {} ({})", url, request.style);

        let response = self.client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        debug!("📥 Response status: {}", status);

        let body = response.text().await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("Request failed").to_string());
            error!("❌ Generation request failed with status {}: {}", status, message);
            return Err(TransportError::from_status(status.as_u16(), message));
        }

        let envelope: ApiEnvelope = serde_json::from_str(&body)
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        envelope.into_result().map_err(|message| TransportError::Server { status: status.as_u16(), message })
    }

    pub async fn upload(&self, bytes: Vec<u8>, file_name: &str, mime_type: &str) -> Result<UploadedFile, TransportError> {
        let url = format!("{}/api/upload", self.base_url);
        info!("📤 Uploading {} ({} bytes)", file_name, bytes.len());

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| TransportError::Validation(e.to_string()))?;
        let form = multipart::Form::new().part("image", part);

        let response = self.client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.json::<ErrorBody>().await
                .map(|b| b.message)
                .unwrap_or_else(|_| "Upload failed".to_string());
            return Err(TransportError::from_status(status.as_u16(), message));
        }

        response.json::<UploadedFile>().await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &GenerationRequest, cancel: CancellationToken) -> Result<Generation, TransportError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("🛑 Generation request cancelled");
                Err(TransportError::Cancelled)
            }
            result = self.perform_generate(request) => result,
        }
    }
}
