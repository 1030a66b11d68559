//! CLI argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::DefaultsConfig;
use crate::handler::GenerationRequest;
use crate::params::SizeSelection;

/// Prompt-to-image front-end for diffusion models with style adapters.
#[derive(Parser, Debug)]
#[command(name = "lora-studio", version, about)]
pub struct Cli {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate one image and save it as `<output-dir>/<seed>.png`.
    Generate(GenerateArgs),
    /// Serve the web page and JSON API.
    Serve(ServeArgs),
}

/// Arguments for `generate`.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Text prompt describing the desired image.
    #[arg(conflicts_with = "prompt_file")]
    pub prompt: Option<String>,

    /// Path to a file containing the prompt text.
    #[arg(short = 'p', long, conflicts_with = "prompt")]
    pub prompt_file: Option<String>,

    /// Seed; omit to draw a random one.
    #[arg(long)]
    pub seed: Option<u32>,

    /// Image width in pixels.
    #[arg(long, conflicts_with = "preset")]
    pub width: Option<u32>,

    /// Image height in pixels.
    #[arg(long, conflicts_with = "preset")]
    pub height: Option<u32>,

    /// Size preset `WIDTHxHEIGHT`, or `Custom` to use --custom-width/--custom-height.
    #[arg(long)]
    pub preset: Option<String>,

    /// Width used with `--preset Custom`.
    #[arg(long, requires = "preset")]
    pub custom_width: Option<u32>,

    /// Height used with `--preset Custom`.
    #[arg(long, requires = "preset")]
    pub custom_height: Option<u32>,

    /// Guidance scale (1.0 to 15.0).
    #[arg(short, long)]
    pub guidance_scale: Option<f32>,

    /// Number of inference steps (1 to 50).
    #[arg(short, long)]
    pub steps: Option<u32>,

    /// Style adapter to apply instead of the configured one.
    #[arg(long, conflicts_with = "no_lora")]
    pub lora: Option<String>,

    /// Generate without any style adapter.
    #[arg(long)]
    pub no_lora: bool,

    /// Directory to write the image into.
    #[arg(short, long, default_value = "outputs")]
    pub output_dir: PathBuf,
}

/// Arguments for `serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Host address to bind; defaults to the config value.
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind; defaults to the config value.
    #[arg(long)]
    pub port: Option<u16>,
}

impl GenerateArgs {
    /// Resolve the prompt from either the positional argument or the file flag.
    ///
    /// # Errors
    ///
    /// Returns an error if neither prompt nor prompt-file is provided,
    /// or if the file cannot be read.
    pub fn resolve_prompt(&self) -> Result<String, std::io::Error> {
        if let Some(ref text) = self.prompt {
            Ok(text.clone())
        } else if let Some(ref path) = self.prompt_file {
            std::fs::read_to_string(path)
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Provide a prompt string or use -p/--prompt-file",
            ))
        }
    }

    /// Build the request, filling unset values from the configured defaults.
    #[must_use]
    pub fn to_request(&self, prompt: String, defaults: &DefaultsConfig) -> GenerationRequest {
        let size = match &self.preset {
            Some(preset) => SizeSelection::Preset {
                preset: preset.clone(),
                custom_width: self.custom_width.unwrap_or(defaults.width),
                custom_height: self.custom_height.unwrap_or(defaults.height),
            },
            None => SizeSelection::Sliders {
                width: self.width.unwrap_or(defaults.width),
                height: self.height.unwrap_or(defaults.height),
            },
        };
        let adapter = if self.no_lora { Some(String::new()) } else { self.lora.clone() };
        GenerationRequest {
            prompt,
            seed: self.seed.unwrap_or_default(),
            randomize_seed: self.seed.is_none(),
            size,
            guidance_scale: self.guidance_scale.unwrap_or(defaults.guidance_scale),
            num_inference_steps: self.steps.unwrap_or(defaults.num_inference_steps),
            adapter,
        }
    }
}
