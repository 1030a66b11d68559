//! LoRA Studio - prompt-to-image front-end for diffusion models with style adapters.

mod adapters;
mod cassette;
mod cli;
mod config;
mod context;
mod error;
mod handler;
mod output;
mod params;
mod ports;
mod seed;
mod web;

use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, GenerateArgs, ServeArgs};
use crate::config::Config;
use crate::context::{RecordingSession, ServiceContext};
use crate::error::StudioError;
use crate::handler::{Artifact, HandlerOptions, OutputTarget, RequestHandler};
use crate::web::{AppState, UiSettings};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "lora_studio=debug,tower_http=debug" } else { "lora_studio=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(cli: Cli) -> Result<(), StudioError> {
    let config_path = config::discover_config_path(cli.config.as_deref());
    let config = Config::load(&config_path).map_err(StudioError::Config)?;
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    match cli.command {
        Command::Generate(args) => generate(&config, &args).await,
        Command::Serve(args) => serve(config, &args).await,
    }
}

async fn generate(config: &Config, args: &GenerateArgs) -> Result<(), StudioError> {
    let prompt = args.resolve_prompt()?;
    let request = args.to_request(prompt, &config.defaults);
    request.validate()?;

    let (ctx, recording) = ServiceContext::from_env(config)?;
    let mut options = HandlerOptions::from_config(config);
    options.output = OutputTarget::Directory(args.output_dir.clone());
    let handler = RequestHandler::new(ctx.service, options);

    let result = match handler.prepare().await {
        Ok(()) => handler.handle(request).await.map_err(|failure| {
            if let Some(seed) = failure.seed {
                eprintln!("Seed: {seed}");
            }
            failure.error
        }),
        Err(e) => Err(e),
    };
    finish_recording(recording);

    let generation = result?;
    eprintln!("Seed: {}", generation.seed);
    if let Artifact::File(path) = &generation.artifact {
        eprintln!("Saved: {}", path.display());
    }
    Ok(())
}

async fn serve(config: Config, args: &ServeArgs) -> Result<(), StudioError> {
    let (ctx, recording) = ServiceContext::from_env(&config)?;
    let handler = RequestHandler::new(ctx.service, HandlerOptions::from_config(&config));
    handler.prepare().await?;

    let host = args.host.clone().unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let state = Arc::new(AppState { handler, settings: UiSettings::from_config(&config) });

    let result = web::serve(state, &host, port).await;
    finish_recording(recording);
    result
}

fn finish_recording(recording: Option<RecordingSession>) {
    if let Some(session) = recording {
        match session.finish() {
            Ok(path) => eprintln!("Cassette saved: {}", path.display()),
            Err(e) => tracing::warn!(error = %e, "failed to save cassette"),
        }
    }
}
