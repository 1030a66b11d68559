//! HTTP surface: the generation page, its settings, and the generate endpoint.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::{Config, SizeControls};
use crate::error::StudioError;
use crate::handler::{Artifact, GenerationRequest, OutputTarget, RequestHandler};
use crate::output::data_url;
use crate::params;
use crate::seed::MAX_SEED;

const INDEX_HTML: &str = include_str!("index.html");

/// Shared state for all routes.
pub struct AppState {
    /// The single request handler.
    pub handler: RequestHandler,
    /// Settings served to the page.
    pub settings: UiSettings,
}

/// Bounds, presets and defaults the page builds its controls from.
#[derive(Debug, Clone, Serialize)]
pub struct UiSettings {
    /// Slider or preset size controls.
    pub size_controls: SizeControls,
    /// Available presets, including `"Custom"`.
    pub presets: Vec<String>,
    /// Preset selected initially.
    pub default_preset: String,
    /// Smallest image edge.
    pub min_size: u32,
    /// Largest image edge.
    pub max_size: u32,
    /// Slider step for image edges.
    pub size_step: u32,
    /// Initial width.
    pub default_width: u32,
    /// Initial height.
    pub default_height: u32,
    /// Largest seed.
    pub max_seed: u32,
    /// Guidance scale bounds.
    pub min_guidance_scale: f32,
    /// Upper guidance scale bound.
    pub max_guidance_scale: f32,
    /// Initial guidance scale.
    pub default_guidance_scale: f32,
    /// Inference step bounds.
    pub min_inference_steps: u32,
    /// Upper inference step bound.
    pub max_inference_steps: u32,
    /// Initial inference step count.
    pub default_inference_steps: u32,
    /// Adapter applied by default, if any.
    pub adapter: Option<String>,
}

impl UiSettings {
    /// Build page settings from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            size_controls: config.ui.size_controls,
            presets: params::PRESETS.iter().map(ToString::to_string).collect(),
            default_preset: config.defaults.preset.clone(),
            min_size: params::MIN_IMAGE_SIZE,
            max_size: params::MAX_IMAGE_SIZE,
            size_step: params::SIZE_STEP,
            default_width: config.defaults.width,
            default_height: config.defaults.height,
            max_seed: MAX_SEED,
            min_guidance_scale: params::MIN_GUIDANCE_SCALE,
            max_guidance_scale: params::MAX_GUIDANCE_SCALE,
            default_guidance_scale: config.defaults.guidance_scale,
            min_inference_steps: params::MIN_INFERENCE_STEPS,
            max_inference_steps: params::MAX_INFERENCE_STEPS,
            default_inference_steps: config.defaults.num_inference_steps,
            adapter: config.style.adapter().map(str::to_string),
        }
    }
}

/// Body of `POST /api/generate`, for successes and failures alike.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    /// Seed used, when one was resolved.
    pub seed: Option<u32>,
    /// Output width.
    pub width: Option<u32>,
    /// Output height.
    pub height: Option<u32>,
    /// `data:` URL in memory mode.
    pub image: Option<String>,
    /// `/outputs/...` URL in disk mode.
    pub path: Option<String>,
    /// Failure message.
    pub error: Option<String>,
}

/// Build the router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/", get(index))
        .route("/api/settings", get(settings))
        .route("/api/generate", post(generate));

    if let OutputTarget::Directory(dir) = &state.handler.options().output {
        app = app.nest_service("/outputs", ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Bind and serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> Result<(), StudioError> {
    let app = router(state);
    let listener = TcpListener::bind((host, port)).await?;
    tracing::info!(address = %listener.local_addr()?, "listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn settings(State(state): State<Arc<AppState>>) -> Json<UiSettings> {
    Json(state.settings.clone())
}

async fn generate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<GenerationRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "rejected generate request body");
            let error = StudioError::InvalidArgument(rejection.body_text());
            return failure_response(StatusCode::BAD_REQUEST, None, &error);
        }
    };

    match state.handler.handle(request).await {
        Ok(generation) => {
            let (image, path) = match &generation.artifact {
                Artifact::Image(image) => (Some(data_url(image)), None),
                Artifact::File(file) => (None, Some(public_path(file))),
            };
            Json(GenerateResponse {
                seed: Some(generation.seed),
                width: Some(generation.width),
                height: Some(generation.height),
                image,
                path,
                error: None,
            })
            .into_response()
        }
        Err(failure) => {
            let status = if failure.error.is_invalid_argument() {
                StatusCode::BAD_REQUEST
            } else if failure.error.is_local() {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::BAD_GATEWAY
            };
            failure_response(status, failure.seed, &failure.error)
        }
    }
}

fn failure_response(status: StatusCode, seed: Option<u32>, error: &StudioError) -> Response {
    let body = GenerateResponse {
        seed,
        width: None,
        height: None,
        image: None,
        path: None,
        error: Some(error.to_string()),
    };
    (status, Json(body)).into_response()
}

/// URL under `/outputs` for a persisted file.
fn public_path(file: &std::path::Path) -> String {
    let name = file.file_name().map(PathBuf::from).unwrap_or_default();
    format!("/outputs/{}", name.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerOptions;
    use crate::ports::generation_service::fake::FakeService;
    use crate::ports::{GeneratedImage, GenerationService};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(service: FakeService, output: OutputTarget) -> Router {
        let config = Config::default();
        let mut options = HandlerOptions::from_config(&config);
        options.output = output;
        let service: Arc<dyn GenerationService> = Arc::new(service);
        let state = AppState {
            handler: RequestHandler::new(service, options),
            settings: UiSettings::from_config(&config),
        };
        router(Arc::new(state))
    }

    fn generate_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/generate")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn body(seed: u32) -> serde_json::Value {
        serde_json::json!({
            "prompt": "a paper boat",
            "seed": seed,
            "randomize_seed": false,
            "size": {"mode": "preset", "preset": "1024x576", "custom_width": 0, "custom_height": 0},
            "guidance_scale": 3.5,
            "num_inference_steps": 28
        })
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn index_serves_page() {
        let response = app(FakeService::default(), OutputTarget::Memory)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Advanced Settings"));
    }

    #[tokio::test]
    async fn settings_expose_bounds() {
        let response = app(FakeService::default(), OutputTarget::Memory)
            .oneshot(Request::get("/api/settings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = json_body(response).await;
        assert_eq!(json["size_controls"], "sliders");
        assert_eq!(json["max_seed"], 2_147_483_647);
        assert_eq!(json["max_size"], 2048);
        assert!(json["presets"].as_array().unwrap().iter().any(|p| p == "Custom"));
    }

    #[tokio::test]
    async fn generate_in_memory_returns_data_url_and_seed() {
        let image = GeneratedImage { data: vec![1, 2, 3], mime_type: "image/png".into() };
        let response = app(FakeService::returning(image), OutputTarget::Memory)
            .oneshot(generate_request(body(321)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["seed"], 321);
        assert_eq!(json["width"], 1024);
        assert_eq!(json["height"], 576);
        assert_eq!(json["image"], "data:image/png;base64,AQID");
        assert!(json["path"].is_null());
        assert!(json["error"].is_null());
    }

    #[tokio::test]
    async fn generate_to_disk_returns_output_url() {
        let dir = std::env::temp_dir().join("lora_studio_web_disk_test");
        let _ = std::fs::remove_dir_all(&dir);
        let app = app(FakeService::default(), OutputTarget::Directory(dir.clone()));

        let response = app.clone().oneshot(generate_request(body(77))).await.unwrap();
        let json = json_body(response).await;
        assert_eq!(json["path"], "/outputs/77.png");
        assert!(json["image"].is_null());

        let response = app
            .oneshot(Request::get("/outputs/77.png").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn generation_failure_keeps_seed_and_message() {
        let response = app(FakeService::failing_generate(), OutputTarget::Memory)
            .oneshot(generate_request(body(5)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = json_body(response).await;
        assert_eq!(json["seed"], 5);
        assert!(json["image"].is_null());
        assert!(json["error"].as_str().unwrap().contains("model overloaded"));
    }

    #[tokio::test]
    async fn adapter_failure_reports_message_without_seed() {
        let response = app(FakeService::failing_load(), OutputTarget::Memory)
            .oneshot(generate_request(body(5)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = json_body(response).await;
        assert!(json["seed"].is_null());
        assert!(json["error"].as_str().unwrap().starts_with("Failed to load LoRA model"));
    }

    #[tokio::test]
    async fn malformed_body_keeps_response_shape() {
        let mut request = body(5);
        request["seed"] = serde_json::json!(-1);
        let response = app(FakeService::default(), OutputTarget::Memory)
            .oneshot(generate_request(request))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert!(json["seed"].is_null());
        assert!(json["image"].is_null());
        assert!(json["error"].as_str().unwrap().starts_with("Invalid argument"));
    }

    #[tokio::test]
    async fn unwritable_output_is_server_error_with_seed() {
        let blocker = std::env::temp_dir().join("lora_studio_web_output_is_file");
        let _ = std::fs::remove_dir_all(&blocker);
        std::fs::write(&blocker, b"not a directory").unwrap();

        let response = app(FakeService::default(), OutputTarget::Directory(blocker.clone()))
            .oneshot(generate_request(body(44)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["seed"], 44);
        assert!(json["path"].is_null());
        assert!(json["error"].is_string());

        let _ = std::fs::remove_file(&blocker);
    }

    #[tokio::test]
    async fn invalid_size_is_bad_request() {
        let mut request = body(5);
        request["size"] = serde_json::json!({"mode": "sliders", "width": 4096, "height": 512});
        let response = app(FakeService::default(), OutputTarget::Memory)
            .oneshot(generate_request(request))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
