//! Configuration file loading with environment variable overrides.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Environment variable holding the model host access token.
pub const TOKEN_ENV_VAR: &str = "HF_TOKEN";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// HTTP bind settings for `serve`.
    #[serde(default)]
    pub server: ServerConfig,

    /// Generation service connection.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Style adapter and prompt prefix.
    #[serde(default)]
    pub style: StyleConfig,

    /// Where results go.
    #[serde(default)]
    pub output: OutputConfig,

    /// Web page controls.
    #[serde(default)]
    pub ui: UiConfig,

    /// Default request parameters.
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// HTTP bind settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 7778 }
    }
}

/// Generation service connection settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Inference endpoint base URL.
    pub endpoint: String,
    /// Model hub base URL, used to look up adapters.
    pub hub: String,
    /// Base diffusion model identifier.
    pub base_model: String,
    /// Access token; the environment variable takes precedence.
    pub token: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api-inference.huggingface.co".to_string(),
            hub: "https://huggingface.co".to_string(),
            base_model: "black-forest-labs/FLUX.1-dev".to_string(),
            token: None,
        }
    }
}

/// When the style adapter is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterMode {
    /// Load before and unload after every request.
    #[default]
    PerRequest,
    /// Load the configured adapter once at startup and keep it.
    Startup,
}

/// Style adapter settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Default adapter identifier. Empty disables the adapter.
    pub adapter: Option<String>,
    /// Text prepended to every prompt.
    pub prefix: String,
    /// When the adapter is loaded.
    pub adapter_mode: AdapterMode,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            adapter: Some("davisbro/half_illustration".to_string()),
            prefix: "in the style of TOK, ".to_string(),
            adapter_mode: AdapterMode::PerRequest,
        }
    }
}

impl StyleConfig {
    /// The configured adapter, treating an empty string as none.
    #[must_use]
    pub fn adapter(&self) -> Option<&str> {
        self.adapter.as_deref().map(str::trim).filter(|a| !a.is_empty())
    }
}

/// Whether results are returned in memory or written to disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Return the encoded image directly.
    #[default]
    Memory,
    /// Write `<dir>/<seed>.png` and return the path.
    Disk,
}

/// Output settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Memory or disk.
    pub mode: OutputMode,
    /// Output directory for disk mode.
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { mode: OutputMode::Memory, dir: PathBuf::from("outputs") }
    }
}

/// Which size controls the page shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeControls {
    /// Width and height sliders.
    #[default]
    Sliders,
    /// Aspect-ratio radio presets with a custom panel.
    Presets,
}

/// Web page settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Size control style.
    pub size_controls: SizeControls,
}

/// Default request parameters.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Default width.
    pub width: u32,
    /// Default height.
    pub height: u32,
    /// Default preset.
    pub preset: String,
    /// Default guidance scale.
    pub guidance_scale: f32,
    /// Default inference step count.
    pub num_inference_steps: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            preset: "1024x1024".to_string(),
            guidance_scale: 3.5,
            num_inference_steps: 28,
        }
    }
}

impl Config {
    /// Load configuration from the given path, or return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
    }

    /// Get the access token, preferring the environment variable.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        std::env::var(TOKEN_ENV_VAR)
            .ok()
            .filter(|t| !t.is_empty())
            .or_else(|| self.service.token.clone())
    }
}

/// Discover the config file path using the resolution order:
/// 1. Explicit path (from `--config` flag)
/// 2. `LORA_STUDIO_CONFIG` environment variable
/// 3. `~/.config/lora-studio/config.toml`
#[must_use]
pub fn discover_config_path(explicit: Option<&str>) -> PathBuf {
    if let Some(p) = explicit {
        return PathBuf::from(p);
    }

    if let Ok(p) = std::env::var("LORA_STUDIO_CONFIG") {
        return PathBuf::from(p);
    }

    default_config_path()
}

fn default_config_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config/lora-studio/config.toml")
    } else {
        PathBuf::from("lora-studio.toml")
    }
}
