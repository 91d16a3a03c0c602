use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::core::certificates::{DocumentStore, StorageError};
use crate::infra::google::auth::AccessTokenProvider;

const DRIVE_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Minimal Drive v3 client. It deliberately exposes only the calls the
/// pipeline needs: copy a file, export it as PDF, delete it.
pub struct DriveClient {
    http: Client,
    auth: Arc<dyn AccessTokenProvider>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CopyResponse {
    id: String,
}

impl DriveClient {
    pub fn new(auth: Arc<dyn AccessTokenProvider>) -> Self {
        Self {
            http: Client::new(),
            auth,
            base_url: DRIVE_BASE.to_string(),
        }
    }

    async fn bearer(&self) -> Result<String, StorageError> {
        self.auth
            .access_token()
            .await
            .map_err(|e| StorageError::Api(format!("auth: {}", e)))
    }

    /// Maps a non-success Drive response onto the pipeline's failure kinds.
    fn classify(status: StatusCode, body: String) -> StorageError {
        match status {
            StatusCode::NOT_FOUND => StorageError::NotFound(body),
            StatusCode::FORBIDDEN => StorageError::PermissionDenied(body),
            _ => StorageError::Api(format!("Drive returned {}: {}", status, body)),
        }
    }

    async fn error_body(response: reqwest::Response) -> String {
        response.text().await.unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for DriveClient {
    async fn copy(
        &self,
        template_id: &str,
        title: &str,
        folder_id: Option<&str>,
    ) -> Result<String, StorageError> {
        let token = self.bearer().await?;

        let mut body = json!({ "name": title });
        if let Some(folder) = folder_id {
            body["parents"] = json!([folder]);
        }

        let response = self
            .http
            .post(format!("{}/files/{}/copy", self.base_url, template_id))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| StorageError::Api(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Self::classify(status, Self::error_body(response).await));
        }

        let copied: CopyResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Api(e.to_string()))?;
        Ok(copied.id)
    }

    async fn export_pdf(&self, file_id: &str) -> Result<Vec<u8>, StorageError> {
        let token = self.bearer().await?;

        let mut response = self
            .http
            .get(format!("{}/files/{}/export", self.base_url, file_id))
            .query(&[("mimeType", "application/pdf")])
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| StorageError::Api(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Self::classify(status, Self::error_body(response).await));
        }

        // The rendered PDF arrives in transport-sized chunks; keep reading
        // until the stream signals completion.
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| StorageError::Api(e.to_string()))?
        {
            bytes.extend_from_slice(&chunk);
        }

        Ok(bytes)
    }

    async fn delete(&self, file_id: &str) -> Result<(), StorageError> {
        let token = self.bearer().await?;

        let response = self
            .http
            .delete(format!("{}/files/{}", self.base_url, file_id))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| StorageError::Api(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Self::classify(status, Self::error_body(response).await));
        }

        Ok(())
    }
}
