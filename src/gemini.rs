//! Remote model service client.
//!
//! Three operations are consumed, nothing more: store a file and get back a
//! handle, generate text from a prompt plus optional file handles and a
//! system instruction, and delete a file by handle. The protocol belongs to
//! the remote service; this module is a consumer only. The [`RemoteModel`]
//! trait is the seam that lets the exam service run against a recording mock
//! in tests.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::models::RemoteFileHandle;

/// The operations the exam service needs from the hosted model API.
#[async_trait]
pub trait RemoteModel: Send + Sync {
    /// Store a local file on the remote service, returning its handle.
    async fn upload_file(&self, path: &Path, display_name: &str) -> Result<RemoteFileHandle>;

    /// Generate text from a prompt, a system instruction, and previously
    /// uploaded file handles.
    async fn generate(
        &self,
        system_instruction: &str,
        prompt: &str,
        files: &[RemoteFileHandle],
    ) -> Result<String>;

    /// Delete a remote file by handle.
    async fn delete_file(&self, handle: &RemoteFileHandle) -> Result<()>;

    fn provider_name(&self) -> &'static str;

    fn model_name(&self) -> &str;
}

/// Gemini REST client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiRequest {
    #[serde(rename = "systemInstruction")]
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "fileData", skip_serializing_if = "Option::is_none")]
    file_data: Option<GeminiFileData>,
}

impl GeminiPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            file_data: None,
        }
    }

    fn file(handle: &RemoteFileHandle) -> Self {
        Self {
            text: None,
            file_data: Some(GeminiFileData {
                file_uri: handle.uri.clone(),
                mime_type: handle.mime_type.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFileData {
    #[serde(rename = "fileUri")]
    file_uri: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "topK")]
    top_k: i32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: i32,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiFileResponse {
    file: GeminiFileInfo,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiFileInfo {
    name: String,
    uri: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            model: model.unwrap_or_else(|| "gemini-2.5-flash".to_string()),
        }
    }

    /// The file-storage endpoint lives under `/upload/v1beta` rather than
    /// `/v1beta`.
    fn upload_url(&self) -> String {
        format!(
            "{}/files?key={}",
            self.base_url.replace("/v1beta", "/upload/v1beta"),
            self.api_key
        )
    }
}

/// Map the recognized study-file extensions to MIME types; anything else is
/// submitted as an opaque byte stream.
pub fn mime_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl RemoteModel for GeminiClient {
    async fn upload_file(&self, path: &Path, display_name: &str) -> Result<RemoteFileHandle> {
        let bytes = tokio::fs::read(path).await?;
        let mime_type = mime_type_for(display_name);

        info!(
            provider = self.provider_name(),
            file_name = %display_name,
            size_bytes = bytes.len(),
            mime_type = mime_type,
            "Uploading study file to remote service"
        );

        let response = self
            .client
            .post(self.upload_url())
            .header("Content-Type", mime_type)
            .header("X-Goog-Upload-Protocol", "raw")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                provider = self.provider_name(),
                file_name = %display_name,
                status = %status,
                error = %error_text,
                "File upload failed"
            );
            return Err(anyhow::anyhow!("Gemini file upload failed: {}", error_text));
        }

        let file_response: GeminiFileResponse = response.json().await?;
        info!(
            provider = self.provider_name(),
            file_name = %display_name,
            remote_name = %file_response.file.name,
            "Study file uploaded"
        );

        Ok(RemoteFileHandle {
            name: file_response.file.name,
            uri: file_response.file.uri,
            mime_type: file_response.file.mime_type,
        })
    }

    async fn generate(
        &self,
        system_instruction: &str,
        prompt: &str,
        files: &[RemoteFileHandle],
    ) -> Result<String> {
        let mut parts = vec![GeminiPart::text(prompt)];
        parts.extend(files.iter().map(GeminiPart::file));

        let request_body = GeminiRequest {
            system_instruction: GeminiContent {
                parts: vec![GeminiPart::text(system_instruction)],
            },
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.7,
                top_k: 40,
                top_p: 0.9,
                max_output_tokens: 4096,
            },
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        info!(
            provider = self.provider_name(),
            model = %self.model,
            prompt_length = prompt.len(),
            file_count = files.len(),
            "Making remote model request"
        );

        let response = self.client.post(&url).json(&request_body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                provider = self.provider_name(),
                status = %status,
                error = %error_text,
                "Remote model request failed"
            );
            return Err(anyhow::anyhow!("Gemini API request failed: {}", error_text));
        }

        let gemini_response: GeminiResponse = response.json().await?;

        let text = gemini_response
            .candidates
            .first()
            .and_then(|candidate| candidate.content.parts.first())
            .and_then(|part| part.text.clone())
            .ok_or_else(|| anyhow::anyhow!("No text candidates in Gemini response"))?;

        info!(
            provider = self.provider_name(),
            response_length = text.len(),
            "Received remote model response"
        );

        Ok(text)
    }

    async fn delete_file(&self, handle: &RemoteFileHandle) -> Result<()> {
        let url = format!("{}/{}?key={}", self.base_url, handle.name, self.api_key);

        let response = self.client.delete(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(anyhow::anyhow!(
                "Gemini file deletion failed with status {}",
                status
            ));
        }

        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "Gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
