//! Web adapter — HTTP backend for the browser chat UI.
//!
//! Routes:
//!
//! | Route | |
//! |---|---|
//! | `GET /api/status` | readiness |
//! | `POST /api/chat` | run to completion |
//! | `POST /api/stream` | NDJSON event stream (multipart form) |
//! | `POST /api/stream/sse` | same events, SSE framing |
//! | `POST /api/upload` | store files |
//! | `POST /api/reset` | clear agent memory |
//! | `GET /api/files`, `POST /api/files/clear` | generated files |
//! | `GET /download?path=` | download a known file |
//! | `GET /`, `/static/*` | frontend assets |

pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::Notify;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agent::AgentRuntime;
use crate::config::Config;
use crate::Result;
use super::Channel;

/// Shared handler state. `runtime` is `None` when the agent could not be
/// built (for example without an API key); agent routes then answer 503.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Option<Arc<AgentRuntime>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, runtime: Option<AgentRuntime>) -> Self {
        Self {
            runtime: runtime.map(Arc::new),
            config: Arc::new(config),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let frontend = &state.config.server.frontend_dir;

    let api = Router::new()
        .route("/api/status", get(handlers::status_handler))
        .route("/api/chat", post(handlers::chat_handler))
        .route("/api/stream", post(handlers::stream_handler))
        .route("/api/stream/sse", post(handlers::stream_sse_handler))
        .route("/api/upload", post(handlers::upload_handler))
        .route("/api/reset", post(handlers::reset_handler))
        .route("/api/files", get(handlers::files_handler))
        .route("/api/files/clear", post(handlers::clear_files_handler))
        .route("/download", get(handlers::download_handler));

    api.route_service("/", ServeFile::new(frontend.join("index.html")))
        .nest_service("/static", ServeDir::new(frontend.join("static")))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP server channel.
pub struct WebChannel {
    state: AppState,
    shutdown: Arc<Notify>,
}

impl WebChannel {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            shutdown: Arc::new(Notify::new()),
        }
    }

    fn address(&self) -> String {
        let server = &self.state.config.server;
        format!("{}:{}", server.host, server.port)
    }
}

impl Channel for WebChannel {
    fn name(&self) -> &str {
        "web"
    }

    async fn start(&self) -> Result<()> {
        let addr = self.address();
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("Listening on http://{}", addr);

        let shutdown = self.shutdown.clone();
        axum::serve(listener, router(self.state.clone()))
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Ctrl+C received, shutting down"),
                    _ = shutdown.notified() => info!("Shutdown requested"),
                }
            })
            .await?;

        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.shutdown.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::llm::FakeLlmClient;
    use crate::agent::{Context, LlmResponse, ToolCallRequest};
    use crate::stream::{MessageKind, StreamEvent};
    use crate::tools::{MarkdownExcelTool, ToolRunner};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "agency-test-boundary";

    fn test_config(tmp: &TempDir) -> Config {
        let mut config = Config {
            workspace: tmp.path().join("workspace"),
            upload_dir: tmp.path().join("data"),
            output_dir: tmp.path().join("data").join("output"),
            ..Config::default()
        };
        config.server.frontend_dir = tmp.path().join("frontend");
        config
    }

    fn app_with(tmp: &TempDir, client: Option<FakeLlmClient>) -> Router {
        let runtime = client.map(|c| AgentRuntime::new(Box::new(c), Context::with_tools(ToolRunner::new()), 5));
        router(AppState::new(test_config(tmp), runtime))
    }

    fn multipart_body(message: Option<&str>, files: &[(&str, &str)]) -> Body {
        let mut body = String::new();
        if let Some(message) = message {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"message\"\r\n\r\n{message}\r\n"
            ));
        }
        for (name, content) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        Body::from(body)
    }

    fn multipart_request(uri: &str, body: Body) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(body)
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        serde_json::from_str(&body_string(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_status_ready_and_uninitialized() {
        let tmp = TempDir::new().unwrap();

        let response = app_with(&tmp, Some(FakeLlmClient::new(vec![])))
            .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "ready", "message": "Agent is ready"}));

        let response = app_with(&tmp, None)
            .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["status"], "error");
    }

    #[tokio::test]
    async fn test_chat() {
        let tmp = TempDir::new().unwrap();
        let client = FakeLlmClient::scripted(vec![LlmResponse::text("Hola").with_usage(50, 5)]);

        let response = app_with(&tmp, Some(client))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/chat")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"message": "Hi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"response": "Hola", "input_tokens": 50, "output_tokens": 5, "files_generated": false})
        );
    }

    #[tokio::test]
    async fn test_agent_routes_unavailable_without_runtime() {
        let tmp = TempDir::new().unwrap();
        let response = app_with(&tmp, None)
            .oneshot(Request::builder().method("POST").uri("/api/reset").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["code"], "UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_stream_ndjson() {
        let tmp = TempDir::new().unwrap();
        let client = FakeLlmClient::scripted(vec![
            LlmResponse::tool_calls(vec![ToolCallRequest::new("tc_1", "final_answer", json!({"answer": "Done"}))])
                .with_usage(100, 10),
        ]);

        let response = app_with(&tmp, Some(client))
            .oneshot(multipart_request(
                "/api/stream",
                multipart_body(Some("Summarize"), &[("notes.txt", "some notes")]),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");

        let body = body_string(response).await;
        assert!(body.ends_with('\n'));
        let events: Vec<StreamEvent> = body.lines().map(|l| serde_json::from_str(l).unwrap()).collect();

        assert_eq!(events[0].kind, MessageKind::StepNumber);
        assert!(events.iter().any(|e| e.kind == MessageKind::ToolStart
            && e.tool_name.as_deref() == Some("final_answer")));
        let last = events.last().unwrap();
        assert_eq!(last.content, "**Final answer:**\nDone\n");
        assert_eq!(last.input_tokens, Some(100));

        // the attached file was stored under the upload dir
        assert!(tmp.path().join("data").join("notes.txt").is_file());
    }

    #[tokio::test]
    async fn test_stream_error_event() {
        let tmp = TempDir::new().unwrap();

        let response = app_with(&tmp, Some(FakeLlmClient::new(vec![])))
            .oneshot(multipart_request("/api/stream", multipart_body(Some("Hi"), &[])))
            .await
            .unwrap();

        let body = body_string(response).await;
        let event: Value = serde_json::from_str(body.trim()).unwrap();
        assert_eq!(event["type"], "error");
        assert!(event["content"].as_str().unwrap().contains("No more fake responses"));
    }

    #[tokio::test]
    async fn test_stream_requires_message() {
        let tmp = TempDir::new().unwrap();
        let response = app_with(&tmp, Some(FakeLlmClient::new(vec![])))
            .oneshot(multipart_request("/api/stream", multipart_body(None, &[])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stream_sse_framing() {
        let tmp = TempDir::new().unwrap();
        let response = app_with(&tmp, Some(FakeLlmClient::new(vec!["Fine"])))
            .oneshot(multipart_request("/api/stream/sse", multipart_body(Some("How are you?"), &[])))
            .await
            .unwrap();

        let body = body_string(response).await;
        assert!(body.contains("event: message\ndata: {\"type\":\"step_number\""));
        assert!(body.contains("Final answer:"));
    }

    #[tokio::test]
    async fn test_upload_reports_each_file() {
        let tmp = TempDir::new().unwrap();
        let response = app_with(&tmp, None)
            .oneshot(multipart_request(
                "/api/upload",
                multipart_body(None, &[("report 1.csv", "a,b"), ("tool.exe", "MZ")]),
            ))
            .await
            .unwrap();

        let results = body_json(response).await;
        assert_eq!(results[0]["filename"], "report 1.csv");
        assert_eq!(results[0]["status"], "success");
        assert_eq!(results[0]["size"], 3);
        assert!(results[0]["path"].as_str().unwrap().ends_with("report_1.csv"));
        assert_eq!(results[1]["status"], "error");
        assert!(results[1].get("path").is_none());
    }

    #[tokio::test]
    async fn test_generated_file_link_downloads() {
        let tmp = TempDir::new().unwrap();
        let mut config = test_config(&tmp);
        config.output_dir = tmp.path().join("R&D #1");

        let mut tools = ToolRunner::new();
        tools.register(MarkdownExcelTool::new(config.output_dir.clone()));
        let client = FakeLlmClient::with_tool_call(
            "markdown_to_excel",
            json!({"markdown_content": "| a |\n|---|\n| 1 |\n", "filename_prefix": "q+1"}),
            "Exported",
        );
        let runtime = AgentRuntime::new(Box::new(client), Context::with_tools(tools), 5);
        let app = router(AppState::new(config, Some(runtime)));

        let response = app
            .clone()
            .oneshot(multipart_request("/api/stream", multipart_body(Some("Export it"), &[])))
            .await
            .unwrap();
        let body = body_string(response).await;
        let logs = body
            .lines()
            .map(|l| serde_json::from_str::<StreamEvent>(l).unwrap())
            .find(|e| e.content.contains("generated-files"))
            .expect("conversion logs event");

        let href = regex::Regex::new(r#"href="(/download\?path=[^"]+)""#)
            .unwrap()
            .captures(&logs.content)
            .unwrap()[1]
            .to_string();
        assert!(href.contains("R%26D%20%231"));

        let response = app
            .oneshot(Request::builder().uri(href).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn test_files_download_and_clear() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);
        std::fs::create_dir_all(&config.output_dir).unwrap();
        let csv = config.output_dir.join("table_1.csv");
        std::fs::write(&csv, "x,y\n").unwrap();
        std::fs::write(tmp.path().join("secret.txt"), "nope").unwrap();
        let app = app_with(&tmp, None);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/files").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let files = body_json(response).await;
        assert_eq!(files.as_array().unwrap().len(), 1);
        assert_eq!(files[0]["name"], "table_1.csv");
        assert_eq!(files[0]["icon"], "📋");

        let uri = format!("/download?path={}", csv.display());
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        assert_eq!(body_string(response).await, "x,y\n");

        let uri = format!("/download?path={}", tmp.path().join("secret.txt").display());
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(Request::builder().method("POST").uri("/api/files/clear").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["cleared"], 1);
        assert!(!csv.exists());
    }

    #[tokio::test]
    async fn test_index_served() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("frontend").join("static")).unwrap();
        std::fs::write(tmp.path().join("frontend").join("index.html"), "<html>chat</html>").unwrap();
        std::fs::write(tmp.path().join("frontend").join("static").join("ui.js"), "// ui").unwrap();
        let app = app_with(&tmp, None);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "<html>chat</html>");

        let response = app
            .oneshot(Request::builder().uri("/static/ui.js").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_task_with_files() {
        assert_eq!(handlers::task_with_files("Hi", &[]), "Hi");
        assert_eq!(
            handlers::task_with_files("Hi", &["data/a.txt".into(), "data/b.csv".into()]),
            "Hi\n\nYou have been provided with these files, which might be helpful or not: ['data/a.txt', 'data/b.csv']"
        );
    }
}
