//! HTTP surface of the runtime child.

use super::route_module::RouteModules;
use super::runtime::Runtime;
use axum::{
    Router,
    body::Body,
    extract::{Path, Request, State},
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response, Sse, sse::Event, sse::KeepAlive},
    routing::get,
};
use rust_embed::RustEmbed;
use std::convert::Infallible;
use std::path::{Component, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

/// Change-notification event stream.
pub const HMR_EVENTS_PATH: &str = "/@nova/hmr";
/// Browser client script.
pub const HMR_CLIENT_PATH: &str = "/@nova/hmr.js";
/// Prefix of vendored external packages.
pub const NODE_MODULES_PREFIX: &str = "/@node_modules/";

#[derive(RustEmbed)]
#[folder = "assets/hmr"]
struct HmrAssets;

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<Runtime>,
    pub modules: RouteModules,
    pub vendor_dir: PathBuf,
    /// Ends open event streams on shutdown
    pub shutdown: CancellationToken,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route(HMR_EVENTS_PATH, get(handle_events))
        .route(HMR_CLIENT_PATH, get(handle_client))
        .route("/@node_modules/{*path}", get(handle_node_module))
        .fallback(handle_request)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn handle_events(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let mut subscription = state.runtime.hub.subscribe();
    let shutdown = state.shutdown.clone();

    let stream = async_stream::stream! {
        loop {
            let data = tokio::select! {
                _ = shutdown.cancelled() => break,
                data = subscription.recv() => data,
            };
            match data {
                Some(data) => yield Ok(Event::default().event("change").data(data)),
                None => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

async fn handle_client() -> Response {
    match HmrAssets::get("hmr.js") {
        Some(asset) => (
            [
                (header::CONTENT_TYPE, "application/javascript"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            asset.data.into_owned(),
        )
            .into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "Missing embedded HMR client").into_response(),
    }
}

async fn handle_node_module(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let rel = std::path::Path::new(&path);
    if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
        return not_found(&path);
    }

    let file = state.vendor_dir.join(rel);
    match tokio::fs::read(&file).await {
        Ok(contents) => file_response(&path, contents.into()),
        Err(_) => not_found(&path),
    }
}

async fn handle_request(State(state): State<AppState>, req: Request) -> Response {
    let target = state
        .runtime
        .router
        .mux()
        .lookup(req.method().as_str(), req.uri().path())
        .cloned();

    if let Some(target) = target {
        return match state.modules.serve(&target, req).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("{}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        };
    }

    if req.method() != Method::GET && req.method() != Method::HEAD {
        return (StatusCode::METHOD_NOT_ALLOWED, "405 method not allowed").into_response();
    }

    let path = req.uri().path();
    match state.runtime.fs.lookup(path) {
        Some((name, contents)) => file_response(&name, contents),
        None => not_found(path),
    }
}

fn file_response(name: &str, contents: bytes::Bytes) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type(name)),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from(contents),
    )
        .into_response()
}

fn not_found(path: &str) -> Response {
    (StatusCode::NOT_FOUND, format!("404 page not found: {}", path)).into_response()
}

/// Content type by file extension.
pub fn content_type(path: &str) -> &'static str {
    let extension = std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    match extension {
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "html" => "text/html; charset=utf-8",
        "css" => "text/css",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "wasm" => "application/wasm",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmr::Message;
    use axum::http::Request;
    use tempfile::TempDir;
    use tokio_stream::StreamExt;
    use tower::ServiceExt;

    fn state(root: &std::path::Path, go: &str) -> AppState {
        AppState {
            runtime: Arc::new(Runtime::new()),
            modules: RouteModules::new(go, root.to_path_buf(), root.join(".nova/pages"), 2),
            vendor_dir: root.join("node_modules/.nova"),
            shutdown: CancellationToken::new(),
        }
    }

    fn request(method: &str, uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body))
            .unwrap()
    }

    async fn text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_events_stream_change_frames() {
        let temp = TempDir::new().unwrap();
        let state = state(temp.path(), "go");
        let response = app(state.clone())
            .oneshot(request("GET", HMR_EVENTS_PATH, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(state.runtime.hub.client_count(), 1);

        state.runtime.apply(Message::create_file("app.js", "export {}"));

        let mut frames = response.into_body().into_data_stream();
        let mut event = String::new();
        while !event.ends_with("\n\n") {
            let frame = tokio::time::timeout(Duration::from_secs(5), frames.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            event.push_str(&String::from_utf8_lossy(&frame));
        }
        assert_eq!(
            event,
            "event: change\ndata: {\"created\":[\"app.js\"],\"updated\":[],\"deleted\":[]}\n\n"
        );
    }

    #[tokio::test]
    async fn test_unrouted_requests_fall_back_to_files() {
        let temp = TempDir::new().unwrap();
        let state = state(temp.path(), "go");
        state.runtime.apply(Message::create_file("blog/index.html", "<h1>blog</h1>"));

        let hit = app(state.clone()).oneshot(request("GET", "/blog", "")).await.unwrap();
        assert_eq!(hit.status(), StatusCode::OK);
        assert_eq!(hit.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(text(hit).await, "<h1>blog</h1>");

        let miss = app(state.clone()).oneshot(request("GET", "/app.js", "")).await.unwrap();
        assert_eq!(miss.status(), StatusCode::NOT_FOUND);
        assert_eq!(text(miss).await, "404 page not found: /app.js");

        let post = app(state).oneshot(request("POST", "/blog", "")).await.unwrap();
        assert_eq!(post.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_routed_requests_reach_the_route_module() {
        let temp = TempDir::new().unwrap();
        // Stands in for `go`: `sh run <program>` runs this script with the
        // program path as $1.
        std::fs::write(
            temp.path().join("run"),
            r#"read -r head
case "$head" in
*'"pattern":"POST /api/users"'*) ;;
*) exit 1 ;;
esac
printf '{"headers":{"Content-Type":["text/plain"]},"statusCode":201}\n'
printf '%s|' "$1"
cat
"#,
        )
        .unwrap();
        let state = state(temp.path(), "sh");
        state.runtime.apply(Message::create_route("POST /api/users", "users"));

        let response = app(state.clone())
            .oneshot(request("POST", "/api/users", "hello"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        let program = state.modules.program("users");
        assert_eq!(text(response).await, format!("{}|hello", program.display()));
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type("index.html"), "text/html; charset=utf-8");
        assert_eq!(content_type("pages/app.mjs"), "application/javascript");
        assert_eq!(content_type("font.woff2"), "font/woff2");
        assert_eq!(content_type("LICENSE"), "application/octet-stream");
    }

    #[test]
    fn test_client_script_is_embedded() {
        let asset = HmrAssets::get("hmr.js").unwrap();
        let source = String::from_utf8_lossy(&asset.data);
        assert!(source.contains(HMR_EVENTS_PATH));
    }
}
