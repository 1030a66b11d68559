//! Live adapter for a hosted diffusion inference endpoint with hub-hosted LoRA adapters.

use std::sync::Mutex;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::error::StudioError;
use crate::ports::generation_service::{
    GeneratedImage, GenerationParams, GenerationService, ServiceFuture,
};

/// Generation service backed by the inference API.
///
/// With an adapter loaded, requests are routed to the adapter repository,
/// which the host serves on top of its declared base model.
pub struct InferenceService {
    client: Client,
    endpoint: String,
    hub: String,
    base_model: String,
    token: String,
    active_adapter: Mutex<Option<String>>,
}

impl InferenceService {
    /// Create a service for the given endpoints, base model and token.
    #[must_use]
    pub fn new(endpoint: &str, hub: &str, base_model: &str, token: String) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            hub: hub.trim_end_matches('/').to_string(),
            base_model: base_model.to_string(),
            token,
            active_adapter: Mutex::new(None),
        }
    }

    fn set_active(&self, adapter: Option<String>) {
        let mut guard = self.active_adapter.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = adapter;
    }

    fn target_model(&self) -> String {
        self.active_adapter
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| self.base_model.clone())
    }
}

impl GenerationService for InferenceService {
    fn load_adapter(&self, adapter: &str) -> ServiceFuture<'_, ()> {
        let adapter = adapter.to_string();
        Box::pin(async move {
            let url = format!("{}/api/models/{adapter}", self.hub);
            let load_error =
                |reason: String| StudioError::AdapterLoad { adapter: adapter.clone(), reason };

            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(|e| load_error(e.to_string()))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND || status == StatusCode::UNAUTHORIZED {
                return Err(load_error("not found on the model hub".into()));
            }
            if !status.is_success() {
                return Err(load_error(format!("model hub returned {status}")));
            }

            let info: HubModelInfo =
                response.json().await.map_err(|e| load_error(format!("unreadable model card: {e}")))?;

            if let Some(base) = info.declared_base_model() {
                if !base.eq_ignore_ascii_case(&self.base_model) {
                    return Err(load_error(format!(
                        "incompatible base model '{base}', expected '{}'",
                        self.base_model
                    )));
                }
            }

            tracing::debug!(adapter = %adapter, "adapter resolved on model hub");
            self.set_active(Some(adapter));
            Ok(())
        })
    }

    fn unload_adapter(&self) -> ServiceFuture<'_, ()> {
        self.set_active(None);
        Box::pin(async { Ok(()) })
    }

    fn generate(&self, params: &GenerationParams) -> ServiceFuture<'_, GeneratedImage> {
        let params = params.clone();
        Box::pin(async move {
            let url = format!("{}/models/{}", self.endpoint, self.target_model());

            let body = serde_json::json!({
                "inputs": params.prompt,
                "parameters": {
                    "width": params.width,
                    "height": params.height,
                    "num_inference_steps": params.num_inference_steps,
                    "guidance_scale": params.guidance_scale,
                    "seed": params.seed,
                },
                "options": { "wait_for_model": true }
            });

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.token)
                .header(reqwest::header::ACCEPT, "image/png")
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await?;
                return Err(StudioError::Api { status: status.as_u16(), message: truncate(&message) });
            }

            let mime_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map_or_else(|| "image/png".to_string(), |v| v.split(';').next().unwrap_or(v).trim().to_string());

            if !mime_type.starts_with("image/") {
                let message = response.text().await?;
                return Err(StudioError::Api {
                    status: status.as_u16(),
                    message: format!("Expected an image, got {mime_type}. Body: {}", truncate(&message)),
                });
            }

            let data = response.bytes().await?.to_vec();
            if data.is_empty() {
                return Err(StudioError::Api {
                    status: status.as_u16(),
                    message: "Empty image in response".into(),
                });
            }

            Ok(GeneratedImage { data, mime_type })
        })
    }
}

fn truncate(text: &str) -> String {
    if text.len() > 500 {
        let cut = (0..=500).rev().find(|i| text.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &text[..cut])
    } else {
        text.to_string()
    }
}

// --- Model hub response types ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HubModelInfo {
    #[serde(default)]
    card_data: Option<HubCardData>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct HubCardData {
    #[serde(default)]
    base_model: Option<BaseModel>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BaseModel {
    One(String),
    Many(Vec<String>),
}

impl HubModelInfo {
    /// The base model the adapter declares, from the card or a `base_model:` tag.
    fn declared_base_model(&self) -> Option<String> {
        let from_card = self.card_data.as_ref().and_then(|c| c.base_model.as_ref()).and_then(|b| match b {
            BaseModel::One(s) => Some(s.clone()),
            BaseModel::Many(v) => v.first().cloned(),
        });
        from_card.or_else(|| {
            self.tags.iter().find_map(|t| {
                let rest = t.strip_prefix("base_model:")?;
                // Relation tags look like `base_model:adapter:org/name`.
                let name = rest.rsplit_once(':').map_or(rest, |(_, n)| n);
                Some(name.to_string())
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(json: serde_json::Value) -> HubModelInfo {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn base_model_from_card() {
        let i = info(serde_json::json!({
            "cardData": {"base_model": "black-forest-labs/FLUX.1-dev"},
            "tags": []
        }));
        assert_eq!(i.declared_base_model().as_deref(), Some("black-forest-labs/FLUX.1-dev"));
    }

    #[test]
    fn base_model_list_from_card() {
        let i = info(serde_json::json!({
            "cardData": {"base_model": ["black-forest-labs/FLUX.1-dev", "other/model"]}
        }));
        assert_eq!(i.declared_base_model().as_deref(), Some("black-forest-labs/FLUX.1-dev"));
    }

    #[test]
    fn base_model_from_relation_tag() {
        let i = info(serde_json::json!({
            "tags": ["lora", "base_model:adapter:black-forest-labs/FLUX.1-dev"]
        }));
        assert_eq!(i.declared_base_model().as_deref(), Some("black-forest-labs/FLUX.1-dev"));
    }

    #[test]
    fn no_base_model_declared() {
        assert!(info(serde_json::json!({})).declared_base_model().is_none());
    }

    #[test]
    fn target_model_follows_adapter_state() {
        let service = InferenceService::new("https://inference/", "https://hub", "base/model", "t".into());
        assert_eq!(service.target_model(), "base/model");
        service.set_active(Some("someone/style".into()));
        assert_eq!(service.target_model(), "someone/style");
        service.set_active(None);
        assert_eq!(service.target_model(), "base/model");
        assert_eq!(service.endpoint, "https://inference");
    }

    #[test]
    fn truncate_long_bodies() {
        let long = "é".repeat(400);
        let t = truncate(&long);
        assert!(t.ends_with("..."));
        assert!(t.len() <= 503);
        assert_eq!(truncate("short"), "short");
    }
}
