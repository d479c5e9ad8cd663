use std::sync::atomic::AtomicI64;
use std::sync::Arc;

use axum::Router;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use easel_api::config::ServerConfig;
use easel_api::engine::{start_dispatcher, SimulatedExecutor};
use easel_api::router::build_app_router;
use easel_api::state::AppState;
use easel_api::ws::SessionRegistry;
use easel_core::executor::GraphExecutor;
use easel_queue::JobQueue;
use easel_store::{AssetStore, StoreRoots};
use easel_styles::StyleCatalog;

/// A fully wired application over a temporary directory, with the
/// dispatcher running against the simulated engine.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub dispatcher_cancel: CancellationToken,
    // Held so the asset roots and catalog live as long as the app.
    _dir: tempfile::TempDir,
}

/// Build a test `ServerConfig` rooted at `dir`.
pub fn test_config(dir: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        input_root: dir.join("input"),
        output_root: dir.join("output"),
        temp_root: dir.join("temp"),
        styles_config: dir.join("styles_config.json"),
        history_limit: None,
    }
}

/// Write a two-group style catalog plus workflow templates into `dir`.
pub fn write_fixture_catalog(dir: &std::path::Path) {
    let swap = serde_json::json!({
        "2": {"class_type": "LoadImage", "inputs": {"image": "placeholder.png"}},
        "3": {"class_type": "LoadImage", "inputs": {"image": "placeholder.png"}},
        "9": {"class_type": "SaveImage", "inputs": {"images": ["3", 0]}}
    });
    std::fs::write(dir.join("swap.json"), swap.to_string()).unwrap();

    let painting = serde_json::json!({
        "3": {"class_type": "KSampler", "inputs": {"seed": 0, "latent": ["12", 0]}},
        "12": {"class_type": "LoadImage", "inputs": {"image": "placeholder.png"}},
        "30": {"class_type": "LoadImage", "inputs": {"image": "placeholder.png"}},
        "31": {"class_type": "SaveImage", "inputs": {"images": ["3", 0]}}
    });
    std::fs::write(dir.join("painting.json"), painting.to_string()).unwrap();

    std::fs::write(dir.join("thumb.png"), test_png()).unwrap();

    let catalog = serde_json::json!([
        {
            "name": "Portraits",
            "style": "style-image-swap",
            "items": [
                {"name": "renaissance", "thumbnail": "thumb.png",
                 "image": "styles/renaissance.png", "workflow": "swap.json"}
            ]
        },
        {
            "name": "Paintings",
            "style": "seed-randomized-painting",
            "items": [
                {"name": "impasto", "thumbnail": "missing-thumb.png",
                 "image": "styles/impasto.png", "workflow": "painting.json"}
            ]
        }
    ]);
    std::fs::write(dir.join("styles_config.json"), catalog.to_string()).unwrap();
}

/// A small valid PNG for uploads.
pub fn test_png() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(16, 16, image::Rgba([120, 10, 200, 255]));
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Build the full application router with all middleware layers over a
/// fresh temporary directory, mirroring the wiring in `main.rs`.
pub async fn build_test_app() -> TestApp {
    build_test_app_with(|store| Arc::new(SimulatedExecutor::new(store))).await
}

/// Like [`build_test_app`], with a caller-supplied execution engine.
pub async fn build_test_app_with<F>(make_executor: F) -> TestApp
where
    F: FnOnce(Arc<AssetStore>) -> Arc<dyn GraphExecutor>,
{
    let dir = tempfile::tempdir().unwrap();
    write_fixture_catalog(dir.path());

    let config = test_config(dir.path());
    let store = Arc::new(
        AssetStore::open(StoreRoots {
            input: config.input_root.clone(),
            output: config.output_root.clone(),
            temp: config.temp_root.clone(),
        })
        .await
        .unwrap(),
    );
    let styles = StyleCatalog::load(&config.styles_config).unwrap();

    let state = AppState {
        config: Arc::new(config.clone()),
        queue: Arc::new(JobQueue::new()),
        sessions: Arc::new(SessionRegistry::new()),
        store: Arc::clone(&store),
        styles: Arc::new(RwLock::new(styles)),
        executor: make_executor(store),
        submission_counter: Arc::new(AtomicI64::new(0)),
    };

    let dispatcher_cancel = CancellationToken::new();
    let _dispatcher = start_dispatcher(state.clone(), dispatcher_cancel.clone());

    let router = build_app_router(state.clone(), &config);
    TestApp {
        router,
        state,
        dispatcher_cancel,
        _dir: dir,
    }
}

/// Encode multipart form fields with a fixed boundary.
///
/// Each part is `(name, filename, content_type, bytes)`; text fields
/// pass `None` for filename and content type.
pub const MULTIPART_BOUNDARY: &str = "easel-test-boundary";

pub fn multipart_body(parts: &[(&str, Option<&str>, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, content_type, bytes) in parts {
        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n")
                    .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n").as_bytes(),
            ),
        }
        if let Some(content_type) = content_type {
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}
