//! Replaying adapter for the `GenerationService` port.

use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;

use crate::cassette::format::Call;
use crate::cassette::replayer::CassetteReplayer;
use crate::error::StudioError;
use crate::ports::generation_service::{
    GeneratedImage, GenerationParams, GenerationService, ServiceFuture,
};

/// Serves recorded outcomes instead of calling a live service.
///
/// Recorded adapter load errors come back as [`StudioError::AdapterLoad`];
/// other recorded errors come back as [`StudioError::Api`]. Mismatches with
/// the cassette are [`StudioError::Cassette`].
pub struct ReplayingService {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingService {
    /// Create a replaying service backed by the given replayer.
    #[must_use]
    pub fn new(replayer: Arc<Mutex<CassetteReplayer>>) -> Self {
        Self { replayer }
    }

    fn replay<T: DeserializeOwned>(&self, call: &Call) -> Result<Result<T, String>, StudioError> {
        let mut guard = self
            .replayer
            .lock()
            .map_err(|e| StudioError::Cassette(format!("replayer lock poisoned: {e}")))?;
        guard.replay(call).map_err(StudioError::Cassette)
    }
}

impl GenerationService for ReplayingService {
    fn load_adapter(&self, adapter: &str) -> ServiceFuture<'_, ()> {
        let call = Call::LoadAdapter { adapter: adapter.to_string() };
        let result = self.replay::<()>(&call).and_then(|recorded| {
            recorded.map_err(|reason| StudioError::AdapterLoad { adapter: adapter.to_string(), reason })
        });
        Box::pin(async move { result })
    }

    fn unload_adapter(&self) -> ServiceFuture<'_, ()> {
        let result = self
            .replay::<()>(&Call::UnloadAdapter)
            .and_then(|recorded| recorded.map_err(|message| StudioError::Api { status: 0, message }));
        Box::pin(async move { result })
    }

    fn generate(&self, params: &GenerationParams) -> ServiceFuture<'_, GeneratedImage> {
        let call = Call::Generate { params: params.clone() };
        let result = self
            .replay::<GeneratedImage>(&call)
            .and_then(|recorded| recorded.map_err(|message| StudioError::Api { status: 0, message }));
        Box::pin(async move { result })
    }
}
