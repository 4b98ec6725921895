//! Thin HTTP client for the sitegen API, used by the `sitegen-client` binary.

use crate::models::{FileEntry, FilesResponse, GenerateRequest, GenerateResponse, PublishRequest, PublishResponse};
use anyhow::{anyhow, Context, Result};
use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// `timeout` bounds a whole request; generation and deployment can take
    /// minutes, so callers should be generous.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn list_files(&self) -> Result<Vec<FileEntry>> {
        let response = self.client.get(self.url("/api/files")).send().await?;
        let body: FilesResponse = decode(response).await?;
        if !body.success {
            return Err(anyhow!(body.message.unwrap_or_else(|| "Failed to load files".to_string())));
        }
        Ok(body.files)
    }

    pub async fn generate(&self, prompt: &str, session_id: Option<&str>) -> Result<GenerateResponse> {
        let request = GenerateRequest {
            prompt: Some(prompt.to_string()),
            session_id: session_id.map(str::to_string),
        };
        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("generate failed with {}: {}", status, body));
        }
        decode(response).await
    }

    /// Publishing failures (404/500) come back as a response with
    /// `success: false` rather than an error.
    pub async fn publish(&self, folder_name: &str) -> Result<PublishResponse> {
        let request = PublishRequest {
            folder_name: Some(folder_name.to_string()),
        };
        let response = self
            .client
            .post(self.url("/api/publish"))
            .json(&request)
            .send()
            .await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let text = response.text().await?;
    debug!("Response {} ({} bytes)", status, text.len());
    serde_json::from_str(&text).with_context(|| format!("unexpected {} response: {}", status, text))
}
