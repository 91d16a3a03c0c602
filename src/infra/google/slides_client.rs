use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::sync::Arc;

use crate::core::certificates::{StorageError, TemplateEditor};
use crate::infra::google::auth::AccessTokenProvider;

const SLIDES_BASE: &str = "https://slides.googleapis.com/v1";

/// Slides v1 client exposing the single call the pipeline needs: a batched
/// text replacement against one presentation.
pub struct SlidesClient {
    http: Client,
    auth: Arc<dyn AccessTokenProvider>,
    base_url: String,
}

impl SlidesClient {
    pub fn new(auth: Arc<dyn AccessTokenProvider>) -> Self {
        Self {
            http: Client::new(),
            auth,
            base_url: SLIDES_BASE.to_string(),
        }
    }

    fn classify(status: StatusCode, body: String) -> StorageError {
        match status {
            StatusCode::NOT_FOUND => StorageError::NotFound(body),
            StatusCode::FORBIDDEN => StorageError::PermissionDenied(body),
            _ => StorageError::Api(format!("Slides returned {}: {}", status, body)),
        }
    }
}

#[async_trait]
impl TemplateEditor for SlidesClient {
    async fn replace_text(
        &self,
        presentation_id: &str,
        needle: &str,
        replacement: &str,
    ) -> Result<(), StorageError> {
        let token = self
            .auth
            .access_token()
            .await
            .map_err(|e| StorageError::Api(format!("auth: {}", e)))?;

        // One batchUpdate with a single replaceAllText request; matchCase
        // keeps the placeholder token case-sensitive.
        let body = json!({
            "requests": [{
                "replaceAllText": {
                    "containsText": {
                        "text": needle,
                        "matchCase": true
                    },
                    "replaceText": replacement
                }
            }]
        });

        let response = self
            .http
            .post(format!(
                "{}/presentations/{}:batchUpdate",
                self.base_url, presentation_id
            ))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| StorageError::Api(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Self::classify(status, text));
        }

        Ok(())
    }
}
