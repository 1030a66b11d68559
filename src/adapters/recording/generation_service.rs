//! Recording adapter for the `GenerationService` port.

use std::sync::{Arc, Mutex};

use super::record_result;
use crate::cassette::format::Call;
use crate::cassette::recorder::CassetteRecorder;
use crate::ports::generation_service::{
    GeneratedImage, GenerationParams, GenerationService, ServiceFuture,
};

/// Records every call while delegating to an inner service.
pub struct RecordingService {
    inner: Arc<dyn GenerationService>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingService {
    /// Wrap `inner`, recording into `recorder`.
    pub fn new(inner: Arc<dyn GenerationService>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

impl GenerationService for RecordingService {
    fn load_adapter(&self, adapter: &str) -> ServiceFuture<'_, ()> {
        let adapter = adapter.to_string();
        Box::pin(async move {
            let result = self.inner.load_adapter(&adapter).await;
            record_result(&self.recorder, Call::LoadAdapter { adapter }, &result);
            result
        })
    }

    fn unload_adapter(&self) -> ServiceFuture<'_, ()> {
        Box::pin(async move {
            let result = self.inner.unload_adapter().await;
            record_result(&self.recorder, Call::UnloadAdapter, &result);
            result
        })
    }

    fn generate(&self, params: &GenerationParams) -> ServiceFuture<'_, GeneratedImage> {
        let params = params.clone();
        Box::pin(async move {
            let result = self.inner.generate(&params).await;
            record_result(&self.recorder, Call::Generate { params }, &result);
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::generation_service::fake::FakeService;

    #[tokio::test]
    async fn records_calls_with_outcomes() {
        let dir = std::env::temp_dir().join("lora_studio_recording_adapter_test");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("generation_service.cassette.yaml");
        let recorder = Arc::new(Mutex::new(CassetteRecorder::new(&path, "t", "c")));

        let service = RecordingService::new(Arc::new(FakeService::failing_generate()), Arc::clone(&recorder));
        service.load_adapter("someone/style").await.unwrap();
        assert!(service.generate(&GenerationParams::default()).await.is_err());
        service.unload_adapter().await.unwrap();
        drop(service);

        let recorder = Arc::try_unwrap(recorder).unwrap().into_inner().unwrap();
        recorder.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("load_adapter"));
        assert!(content.contains("someone/style"));
        assert!(content.contains("model overloaded"));
        assert!(content.contains("unload_adapter"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
