//! Records generation service calls into a cassette file.

use std::path::PathBuf;

use chrono::Utc;

use super::format::{Call, Cassette, Interaction, Outcome};

/// Accumulates calls and writes them as a YAML cassette.
#[derive(Debug, Clone)]
pub struct CassetteRecorder {
    path: PathBuf,
    name: String,
    commit: String,
    interactions: Vec<Interaction>,
}

impl CassetteRecorder {
    /// Create a recorder that will write to the given path.
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        commit: impl Into<String>,
    ) -> Self {
        Self { path: path.into(), name: name.into(), commit: commit.into(), interactions: Vec::new() }
    }

    /// Append a call and its outcome; sequence numbers follow call order.
    pub fn record(&mut self, call: Call, outcome: Outcome) {
        let seq = self.interactions.len() as u64;
        self.interactions.push(Interaction { seq, call, outcome });
    }

    /// Write the cassette to disk, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn finish(self) -> Result<PathBuf, std::io::Error> {
        let cassette = Cassette {
            name: self.name,
            recorded_at: Utc::now(),
            commit: self.commit,
            interactions: self.interactions,
        };
        let yaml = serde_yaml::to_string(&cassette).map_err(std::io::Error::other)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, yaml)?;
        Ok(self.path)
    }
}
