//! Generation service port: the text-to-image backend with optional style adapters.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::StudioError;

/// Fully resolved parameters for a single generation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// The prompt, already prefixed with the style token.
    pub prompt: String,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Number of sampling iterations.
    pub num_inference_steps: u32,
    /// How strongly the output follows the prompt.
    pub guidance_scale: f32,
    /// Seed for the sampler's generator.
    pub seed: u32,
}

/// A single generated image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// Raw encoded image bytes.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// MIME type of the image (e.g., `"image/png"`).
    pub mime_type: String,
}

/// Boxed future returned by [`GenerationService`] methods.
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StudioError>> + Send + 'a>>;

/// A text-to-image model that can have one style adapter applied at a time.
///
/// Implementations hold adapter state internally; callers are expected to
/// serialize `load_adapter` / `generate` / `unload_adapter` sequences.
pub trait GenerationService: Send + Sync {
    /// Apply the named adapter. Fails with [`StudioError::AdapterLoad`] when
    /// the adapter is missing or incompatible with the base model.
    fn load_adapter(&self, adapter: &str) -> ServiceFuture<'_, ()>;

    /// Remove any applied adapter. Succeeds when nothing is loaded.
    fn unload_adapter(&self) -> ServiceFuture<'_, ()>;

    /// Produce one image. Deterministic for fixed params and adapter state.
    fn generate(&self, params: &GenerationParams) -> ServiceFuture<'_, GeneratedImage>;
}

/// Serde helper for serializing `Vec<u8>` as base64 strings in cassettes.
mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(data);
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_image_serializes_data_as_base64() {
        let image = GeneratedImage { data: vec![0x89, 0x50, 0x4E, 0x47], mime_type: "image/png".into() };
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["data"], "iVBORw==");
        let back: GeneratedImage = serde_json::from_value(json).unwrap();
        assert_eq!(back, image);
    }

    #[test]
    fn generated_image_rejects_bad_base64() {
        let json = serde_json::json!({"data": "not base64!!", "mime_type": "image/png"});
        assert!(serde_json::from_value::<GeneratedImage>(json).is_err());
    }
}
