//! Per-request execution of route modules.
//!
//! Each matched request starts `go run <pages>/<module>/main.go`, writes the
//! request head as one JSON line and then the body to its stdin, and streams
//! back a JSON response head line followed by the raw body. The child is
//! killed when the response body is dropped, so a client disconnect ends it.

use super::router::Target;
use crate::error::RuntimeError;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, Response, StatusCode, Version};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio_stream::StreamExt;
use tokio_util::io::ReaderStream;

/// Request head handed to the route module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestHead {
    pub method: String,
    pub raw_url: String,
    pub proto: String,
    pub proto_major: u8,
    pub proto_minor: u8,
    pub headers: BTreeMap<String, Vec<String>>,
    /// -1 when unknown
    pub content_length: i64,
    pub host: String,
    pub remote_addr: String,
    pub request_uri: String,
    pub pattern: String,
}

/// Response head written by the route module before its body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResponseHead {
    pub headers: BTreeMap<String, Vec<String>>,
    /// 0 means 200
    pub status_code: u16,
}

fn proto(version: Version) -> (&'static str, u8, u8) {
    match version {
        Version::HTTP_09 => ("HTTP/0.9", 0, 9),
        Version::HTTP_10 => ("HTTP/1.0", 1, 0),
        Version::HTTP_2 => ("HTTP/2.0", 2, 0),
        Version::HTTP_3 => ("HTTP/3.0", 3, 0),
        _ => ("HTTP/1.1", 1, 1),
    }
}

impl RequestHead {
    pub fn from_request<B>(req: &Request<B>, pattern: &str) -> Self {
        let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in req.headers() {
            headers
                .entry(canonical_header(name.as_str()))
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        let content_length = req
            .headers()
            .get(axum::http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(if req.method() == "GET" || req.method() == "HEAD" { 0 } else { -1 });

        let host = req
            .headers()
            .get(axum::http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| req.uri().authority().map(|a| a.to_string()))
            .unwrap_or_default();

        let remote_addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_default();

        let request_uri = req
            .uri()
            .path_and_query()
            .map(|pq| pq.to_string())
            .unwrap_or_else(|| "/".to_string());

        let (proto, proto_major, proto_minor) = proto(req.version());

        RequestHead {
            method: req.method().to_string(),
            raw_url: req.uri().to_string(),
            proto: proto.to_string(),
            proto_major,
            proto_minor,
            headers,
            content_length,
            host,
            remote_addr,
            request_uri,
            pattern: pattern.to_string(),
        }
    }
}

/// `content-type` to `Content-Type`, the form Go handlers expect.
pub fn canonical_header(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

impl ResponseHead {
    pub fn status(&self) -> StatusCode {
        match self.status_code {
            0 => StatusCode::OK,
            code => StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    pub fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, values) in &self.headers {
            let Ok(name) = HeaderName::try_from(name.as_str()) else {
                continue;
            };
            for value in values {
                if let Ok(value) = HeaderValue::try_from(value.as_str()) {
                    map.append(name.clone(), value);
                }
            }
        }
        map
    }
}

/// Launches route modules with bounded concurrency.
#[derive(Debug, Clone)]
pub struct RouteModules {
    go: String,
    root: PathBuf,
    pages_dir: PathBuf,
    limit: Arc<Semaphore>,
}

impl RouteModules {
    pub fn new(go: impl Into<String>, root: PathBuf, pages_dir: PathBuf, concurrency: usize) -> Self {
        Self {
            go: go.into(),
            root,
            pages_dir,
            limit: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Source of the route module serving `module`.
    pub fn program(&self, module: &str) -> PathBuf {
        let dir = if module.is_empty() {
            self.pages_dir.clone()
        } else {
            self.pages_dir.join(module)
        };
        dir.join("main.go")
    }

    /// Run the route module for `target` against `req`.
    pub async fn serve(&self, target: &Target, req: Request<Body>) -> Result<Response<Body>, RuntimeError> {
        let bad = |message: String| RuntimeError::BadResponse {
            module: target.module.clone(),
            message,
        };

        let permit = Arc::clone(&self.limit)
            .acquire_owned()
            .await
            .map_err(|e| bad(e.to_string()))?;

        let program = self.program(&target.module);
        let mut child = Command::new(&self.go)
            .arg("run")
            .arg(&program)
            .current_dir(&self.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| bad(format!("failed to run {}: {}", program.display(), e)))?;

        let (Some(mut stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(bad("child pipes unavailable".to_string()));
        };

        let head = RequestHead::from_request(&req, &target.pattern);
        let mut line = serde_json::to_vec(&head).map_err(|e| bad(e.to_string()))?;
        line.push(b'\n');

        let writer = tokio::spawn(async move {
            stdin.write_all(&line).await?;
            let mut body = req.into_body().into_data_stream();
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(std::io::Error::other)?;
                stdin.write_all(&chunk).await?;
            }
            stdin.shutdown().await
        });

        let mut reader = BufReader::new(stdout);
        let mut head_line = String::new();
        let read = reader
            .read_line(&mut head_line)
            .await
            .map_err(|e| bad(e.to_string()))?;
        if read == 0 || !head_line.trim_start().starts_with('{') {
            let _ = child.kill().await;
            return Err(bad(format!("bad data: {}", head_line.trim_end())));
        }
        let response: ResponseHead =
            serde_json::from_str(&head_line).map_err(|e| bad(e.to_string()))?;

        let body = async_stream::stream! {
            let _permit = permit;
            let mut child = child;
            let mut chunks = ReaderStream::new(reader);
            while let Some(chunk) = chunks.next().await {
                yield chunk;
            }
            if let Err(e) = writer.await {
                tracing::debug!("route module stdin writer failed: {}", e);
            }
            match child.wait().await {
                Ok(status) if !status.success() => {
                    tracing::debug!("route module exited with {}", status);
                }
                Err(e) => tracing::debug!("route module wait failed: {}", e),
                _ => {}
            }
        };

        let mut res = Response::new(Body::from_stream(body));
        *res.status_mut() = response.status();
        *res.headers_mut() = response.header_map();
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_head() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/users?x=1")
            .header("host", "localhost:8080")
            .header("content-type", "application/json")
            .header("content-length", "2")
            .header("x-trace", "a")
            .header("x-trace", "b")
            .body(())
            .unwrap();

        let head = RequestHead::from_request(&req, "POST /api/users");
        assert_eq!(head.method, "POST");
        assert_eq!(head.request_uri, "/api/users?x=1");
        assert_eq!(head.host, "localhost:8080");
        assert_eq!(head.content_length, 2);
        assert_eq!(head.proto, "HTTP/1.1");
        assert_eq!(head.headers["Content-Type"], vec!["application/json"]);
        assert_eq!(head.headers["X-Trace"], vec!["a", "b"]);
        assert_eq!(head.pattern, "POST /api/users");

        let json = serde_json::to_value(&head).unwrap();
        assert!(json.get("rawUrl").is_some());
        assert!(json.get("protoMajor").is_some());
    }

    #[test]
    fn test_response_head() {
        let head: ResponseHead = serde_json::from_str(
            r#"{"headers":{"Content-Type":["text/html"]},"statusCode":0}"#,
        )
        .unwrap();
        assert_eq!(head.status(), StatusCode::OK);
        assert_eq!(head.header_map()["content-type"], "text/html");

        let head: ResponseHead = serde_json::from_str(r#"{"statusCode":404}"#).unwrap();
        assert_eq!(head.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_program_path() {
        let modules = RouteModules::new("go", "/p".into(), "/p/.nova/pages".into(), 2);
        assert_eq!(modules.program(""), PathBuf::from("/p/.nova/pages/main.go"));
        assert_eq!(modules.program("users"), PathBuf::from("/p/.nova/pages/users/main.go"));
    }

    #[test]
    fn test_canonical_header() {
        assert_eq!(canonical_header("content-type"), "Content-Type");
        assert_eq!(canonical_header("x-request-id"), "X-Request-Id");
    }

    #[tokio::test]
    async fn test_missing_go_is_bad_response() {
        let modules = RouteModules::new("nova-no-such-go-binary", "/".into(), "/tmp".into(), 1);
        let target = Target {
            pattern: "GET /x".to_string(),
            module: "x".to_string(),
        };
        let req = Request::builder().uri("/x").body(Body::empty()).unwrap();
        assert!(matches!(
            modules.serve(&target, req).await,
            Err(RuntimeError::BadResponse { .. })
        ));
    }
}
