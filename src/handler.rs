//! Request handler: turns one user action into one generation call.
//!
//! The handler owns the shared [`GenerationService`] handle. Every request
//! runs adapter load, generation and adapter unload inside a single gate so
//! adapter state never leaks between requests, even when the caller goes away.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::{AdapterMode, Config, OutputMode};
use crate::error::StudioError;
use crate::output::persist;
use crate::params::{styled_prompt, validate_guidance_scale, validate_steps, SizeSelection};
use crate::ports::{GeneratedImage, GenerationParams, GenerationService};
use crate::seed::{resolve_seed, validate_seed};

/// One user-initiated generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The user's prompt, without the style prefix.
    pub prompt: String,
    /// Seed to use when not randomizing.
    #[serde(default)]
    pub seed: u32,
    /// Draw a fresh seed instead of using `seed`.
    #[serde(default = "default_randomize")]
    pub randomize_seed: bool,
    /// Requested output size.
    pub size: SizeSelection,
    /// How strongly the output follows the prompt.
    pub guidance_scale: f32,
    /// Number of sampling iterations.
    pub num_inference_steps: u32,
    /// Adapter for this request. `None` uses the configured default; an empty
    /// string disables the adapter.
    #[serde(default)]
    pub adapter: Option<String>,
}

fn default_randomize() -> bool {
    true
}

impl GenerationRequest {
    /// Check numeric bounds and resolve the output size.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::InvalidArgument`] for any out-of-range value.
    pub fn validate(&self) -> Result<(u32, u32), StudioError> {
        if !self.randomize_seed {
            validate_seed(self.seed).map_err(StudioError::InvalidArgument)?;
        }
        validate_guidance_scale(self.guidance_scale).map_err(StudioError::InvalidArgument)?;
        validate_steps(self.num_inference_steps).map_err(StudioError::InvalidArgument)?;
        self.size.resolve().map_err(StudioError::InvalidArgument)
    }
}

/// Where a finished image ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// Returned directly.
    Image(GeneratedImage),
    /// Written to this path.
    File(PathBuf),
}

/// A successful generation.
#[derive(Debug, Clone)]
pub struct Generation {
    /// The seed actually used.
    pub seed: u32,
    /// Output width.
    pub width: u32,
    /// Output height.
    pub height: u32,
    /// The image or its path.
    pub artifact: Artifact,
}

/// A failed generation, with the seed when one had been resolved.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct GenerationFailure {
    /// The resolved seed, absent when the request failed before seed resolution.
    pub seed: Option<u32>,
    /// What went wrong.
    #[source]
    pub error: StudioError,
}

impl GenerationFailure {
    fn before_seed(error: StudioError) -> Self {
        Self { seed: None, error }
    }

    fn with_seed(seed: u32, error: StudioError) -> Self {
        Self { seed: Some(seed), error }
    }
}

/// Handler behaviour fixed at startup.
#[derive(Debug, Clone)]
pub struct HandlerOptions {
    /// Text prepended to every prompt.
    pub style_prefix: String,
    /// Adapter applied when a request names none.
    pub default_adapter: Option<String>,
    /// When adapters are loaded.
    pub adapter_mode: AdapterMode,
    /// Return images in memory or write them here.
    pub output: OutputTarget,
}

/// Where successful results go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Keep the image in memory.
    Memory,
    /// Write `<seed>.png` into this directory.
    Directory(PathBuf),
}

impl HandlerOptions {
    /// Build options from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let output = match config.output.mode {
            OutputMode::Memory => OutputTarget::Memory,
            OutputMode::Disk => OutputTarget::Directory(config.output.dir.clone()),
        };
        Self {
            style_prefix: config.style.prefix.clone(),
            default_adapter: config.style.adapter().map(str::to_string),
            adapter_mode: config.style.adapter_mode,
            output,
        }
    }
}

/// Serializes requests onto the shared generation service.
pub struct RequestHandler {
    service: Arc<dyn GenerationService>,
    options: Arc<HandlerOptions>,
    gate: Arc<Mutex<()>>,
}

impl RequestHandler {
    /// Create a handler over the given service.
    #[must_use]
    pub fn new(service: Arc<dyn GenerationService>, options: HandlerOptions) -> Self {
        Self { service, options: Arc::new(options), gate: Arc::new(Mutex::new(())) }
    }

    /// Options the handler was built with.
    #[must_use]
    pub fn options(&self) -> &HandlerOptions {
        &self.options
    }

    /// Load the startup adapter, if the handler is in startup mode.
    ///
    /// Must be called once before serving requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter cannot be loaded.
    pub async fn prepare(&self) -> Result<(), StudioError> {
        if self.options.adapter_mode != AdapterMode::Startup {
            return Ok(());
        }
        if let Some(adapter) = &self.options.default_adapter {
            let _guard = self.gate.lock().await;
            tracing::info!(adapter = %adapter, "loading style adapter for the process lifetime");
            self.service.load_adapter(adapter).await?;
        }
        Ok(())
    }

    /// Run one request to completion.
    ///
    /// Once the gate is taken the work runs on its own task, so dropping the
    /// returned future (a disconnected client) still unloads the adapter.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationFailure`] carrying the cause and, once resolved,
    /// the seed.
    pub async fn handle(&self, request: GenerationRequest) -> Result<Generation, GenerationFailure> {
        let (width, height) = request.validate().map_err(GenerationFailure::before_seed)?;
        let adapter = self.per_request_adapter(&request);

        let guard = Arc::clone(&self.gate).lock_owned().await;
        let job = Job {
            service: Arc::clone(&self.service),
            options: Arc::clone(&self.options),
            request,
            adapter,
            width,
            height,
        };
        let task = tokio::spawn(async move {
            let _guard = guard;
            job.run().await
        });

        task.await.map_err(|e| {
            tracing::error!(error = %e, "generation task failed");
            GenerationFailure::before_seed(StudioError::Worker(e.to_string()))
        })?
    }

    fn per_request_adapter(&self, request: &GenerationRequest) -> Option<String> {
        if self.options.adapter_mode != AdapterMode::PerRequest {
            if let Some(adapter) = &request.adapter {
                tracing::debug!(
                    requested = %adapter,
                    "ignoring request adapter, the startup adapter stays loaded"
                );
            }
            return None;
        }
        match request.adapter.as_deref().map(str::trim) {
            Some("") => None,
            Some(adapter) => Some(adapter.to_string()),
            None => self.options.default_adapter.clone(),
        }
    }
}

/// The gated part of one request: load, generate, unload, persist.
struct Job {
    service: Arc<dyn GenerationService>,
    options: Arc<HandlerOptions>,
    request: GenerationRequest,
    adapter: Option<String>,
    width: u32,
    height: u32,
}

impl Job {
    async fn run(self) -> Result<Generation, GenerationFailure> {
        let (width, height) = (self.width, self.height);

        if let Some(adapter) = &self.adapter {
            tracing::debug!(adapter = %adapter, "loading style adapter");
            if let Err(e) = self.service.load_adapter(adapter).await {
                tracing::warn!(adapter = %adapter, error = %e, "adapter load failed, skipping generation");
                return Err(GenerationFailure::before_seed(e));
            }
        }

        let seed = resolve_seed(self.request.seed, self.request.randomize_seed);
        let result = self.generate(seed).await;

        if let Some(adapter) = &self.adapter {
            if let Err(e) = self.service.unload_adapter().await {
                tracing::warn!(adapter = %adapter, error = %e, "adapter unload failed");
            }
        }

        let image = result.map_err(|e| {
            tracing::error!(seed, error = %e, "generation failed");
            GenerationFailure::with_seed(seed, e)
        })?;

        let artifact = match &self.options.output {
            OutputTarget::Memory => Artifact::Image(image),
            OutputTarget::Directory(dir) => {
                let dir = dir.clone();
                let path = tokio::task::spawn_blocking(move || persist(&image, &dir, seed))
                    .await
                    .map_err(|e| StudioError::Worker(e.to_string()))
                    .and_then(|written| written)
                    .map_err(|e| {
                        tracing::error!(seed, error = %e, "failed to write output");
                        GenerationFailure::with_seed(seed, e)
                    })?;
                Artifact::File(path)
            }
        };

        tracing::info!(seed, width, height, "generation finished");
        Ok(Generation { seed, width, height, artifact })
    }

    async fn generate(&self, seed: u32) -> Result<GeneratedImage, StudioError> {
        let params = GenerationParams {
            prompt: styled_prompt(&self.options.style_prefix, &self.request.prompt),
            width: self.width,
            height: self.height,
            num_inference_steps: self.request.num_inference_steps,
            guidance_scale: self.request.guidance_scale,
            seed,
        };
        tracing::info!(
            seed,
            width = self.width,
            height = self.height,
            steps = params.num_inference_steps,
            "generating"
        );
        self.service.generate(&params).await
    }
}
