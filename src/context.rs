//! Service context: picks the live, recording, or replaying generation service.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::adapters::live::inference::InferenceService;
use crate::adapters::recording::generation_service::RecordingService;
use crate::adapters::replaying::generation_service::ReplayingService;
use crate::cassette::config::load_cassette;
use crate::cassette::recorder::CassetteRecorder;
use crate::config::{Config, TOKEN_ENV_VAR};
use crate::error::StudioError;
use crate::ports::GenerationService;

/// Environment variable naming a cassette to replay instead of calling the live service.
pub const REPLAY_ENV_VAR: &str = "LORA_STUDIO_REPLAY";
/// Environment variable that enables recording when set to `1` or `true`.
pub const RECORD_ENV_VAR: &str = "LORA_STUDIO_REC";

/// The process-wide generation service handle.
pub struct ServiceContext {
    /// Generation service port.
    pub service: Arc<dyn GenerationService>,
}

/// Handle to a recording session that must be finished after use.
pub struct RecordingSession {
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingSession {
    /// Write the recorded cassette to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette file cannot be written.
    pub fn finish(self) -> Result<PathBuf, String> {
        let recorder = match Arc::try_unwrap(self.recorder) {
            Ok(mutex) => mutex.into_inner().map_err(|e| format!("Recorder lock poisoned: {e}"))?,
            // Still shared with a live service handle; write what has been recorded so far.
            Err(shared) => {
                let guard = shared.lock().map_err(|e| format!("Recorder lock poisoned: {e}"))?;
                guard.clone()
            }
        };
        recorder.finish().map_err(|e| format!("Failed to write cassette: {e}"))
    }
}

impl ServiceContext {
    /// Choose the service from the environment: replay, record, or live.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette cannot be loaded or no token is configured.
    pub fn from_env(config: &Config) -> Result<(Self, Option<RecordingSession>), StudioError> {
        if let Ok(cassette) = std::env::var(REPLAY_ENV_VAR) {
            tracing::info!(cassette = %cassette, "replaying generation service");
            return Ok((Self::replaying(Path::new(&cassette))?, None));
        }
        let recording = std::env::var(RECORD_ENV_VAR).is_ok_and(|v| v == "true" || v == "1");
        if recording {
            tracing::info!("recording generation service calls");
            let (ctx, session) = Self::recording(config)?;
            return Ok((ctx, Some(session)));
        }
        Ok((Self::live(config)?, None))
    }

    /// Create a live context against the configured inference endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if no access token is configured.
    pub fn live(config: &Config) -> Result<Self, StudioError> {
        let token = config
            .token()
            .ok_or_else(|| StudioError::MissingToken { env_var: TOKEN_ENV_VAR.into() })?;
        let service = InferenceService::new(
            &config.service.endpoint,
            &config.service.hub,
            &config.service.base_model,
            token,
        );
        Ok(Self { service: Arc::new(service) })
    }

    /// Create a recording context that wraps the live service with a recorder.
    ///
    /// # Errors
    ///
    /// Returns an error if the live service cannot be created.
    pub fn recording(config: &Config) -> Result<(Self, RecordingSession), StudioError> {
        let live = Self::live(config)?;

        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string();
        let path = PathBuf::from(".lora-studio/cassettes")
            .join(&timestamp)
            .join("generation_service.cassette.yaml");
        let recorder = Arc::new(Mutex::new(CassetteRecorder::new(
            path,
            format!("{timestamp}-generation_service"),
            get_commit_hash(),
        )));

        let service = RecordingService::new(live.service, Arc::clone(&recorder));
        Ok((Self { service: Arc::new(service) }, RecordingSession { recorder }))
    }

    /// Create a replaying context from a cassette file.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette file cannot be loaded.
    pub fn replaying(path: &Path) -> Result<Self, StudioError> {
        let replayer = load_cassette(path)
            .map_err(|e| StudioError::Config(format!("Failed to load cassette: {e}")))?;
        let service = ReplayingService::new(Arc::new(Mutex::new(replayer)));
        Ok(Self { service: Arc::new(service) })
    }
}

/// Get the current git commit hash, or "unknown" if unavailable.
fn get_commit_hash() -> String {
    std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map_or_else(|| "unknown".to_string(), |s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_requires_token() {
        std::env::remove_var(TOKEN_ENV_VAR);
        let config = Config::default();
        assert!(matches!(ServiceContext::live(&config), Err(StudioError::MissingToken { .. })));
    }

    #[test]
    fn live_uses_config_token() {
        let mut config = Config::default();
        config.service.token = Some("from-file".into());
        assert!(ServiceContext::live(&config).is_ok());
    }

    #[test]
    fn replaying_missing_cassette_is_config_error() {
        let result = ServiceContext::replaying(Path::new("/nonexistent/cassette.yaml"));
        assert!(matches!(result, Err(StudioError::Config(_))));
    }
}
