//! Web server implementation

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Json, Router,
};
use serde::Deserialize;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use superlists_common::{Error, ItemStore, ItemText, ListId};

use crate::config::WebConfig;
use crate::render;

/// Error returned by request handlers, rendered as an HTML page
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct AppError(#[from] Error);

impl AppError {
    pub fn inner(&self) -> &Error {
        &self.0
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self.0 {
            Error::NotFound { .. } => {
                (StatusCode::NOT_FOUND, Html(render::not_found_page())).into_response()
            }
            Error::Validation(msg) => {
                (StatusCode::BAD_REQUEST, Html(render::home_page(Some(&msg)))).into_response()
            }
            other => {
                error!("request failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, Html(render::error_page())).into_response()
            }
        }
    }
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    store: ItemStore,
}

/// Web server
#[derive(Clone)]
pub struct WebServer {
    state: AppState,
}

#[derive(Debug, Deserialize)]
struct NewItemForm {
    #[serde(default)]
    item_text: String,
}

/// Open the configured store and serve until SIGINT or SIGTERM
pub async fn serve(cfg: WebConfig) -> anyhow::Result<()> {
    let server = WebServer::from_config(&cfg)?;
    let listener = TcpListener::bind(cfg.listen).await?;
    server
        .serve_with_shutdown(listener, async {
            wait_for_shutdown_signal().await;
            info!("Received shutdown signal");
        })
        .await
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                error!("cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

impl WebServer {
    /// Create a web server over an existing store
    pub fn new(store: ItemStore) -> Self {
        Self {
            state: AppState { store },
        }
    }

    /// Create a web server over the store described by `cfg`
    pub fn from_config(cfg: &WebConfig) -> anyhow::Result<Self> {
        Ok(Self::new(cfg.open_store()?))
    }

    pub fn store(&self) -> &ItemStore {
        &self.state.store
    }

    /// Create router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(home_page_handler).post(new_list_handler))
            .route("/lists/:list_id/", get(view_list_handler).post(add_item_handler))
            .route("/lists/:list_id", get(append_slash_handler))
            .route("/health", get(health_handler))
            .fallback(not_found_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the web server
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_with_shutdown(listener, std::future::pending()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Superlists listening on http://{}", listener.local_addr()?);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

/// Run blocking store work off the async executor
async fn run_blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> superlists_common::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError(Error::Internal(format!("store task failed: {}", e))))?
        .map_err(AppError::from)
}

// ============================================================================
// Handlers
// ============================================================================

async fn home_page_handler() -> Html<String> {
    Html(render::home_page(None))
}

async fn new_list_handler(
    State(state): State<AppState>,
    Form(form): Form<NewItemForm>,
) -> Result<Response, AppError> {
    let text = match ItemText::parse(&form.item_text) {
        Ok(text) => text,
        Err(Error::Validation(msg)) => {
            debug!("rejected new list: {}", msg);
            return Ok((StatusCode::BAD_REQUEST, Html(render::home_page(Some(&msg)))).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let store = state.store.clone();
    let item = run_blocking(move || store.start_list(&text)).await?;
    Ok(Redirect::to(&item.list_id.url()).into_response())
}

async fn view_list_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Html<String>, AppError> {
    let list_id: ListId = raw_id.parse()?;
    let store = state.store.clone();
    let view = run_blocking(move || store.view(list_id)).await?;
    Ok(Html(render::list_page(&view, None)))
}

async fn add_item_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Form(form): Form<NewItemForm>,
) -> Result<Response, AppError> {
    let list_id: ListId = raw_id.parse()?;
    let store = state.store.clone();

    match ItemText::parse(&form.item_text) {
        Ok(text) => {
            let item = run_blocking(move || store.append_item(list_id, &text)).await?;
            Ok(Redirect::to(&item.list_id.url()).into_response())
        }
        Err(Error::Validation(msg)) => {
            debug!("rejected item for list {}: {}", list_id, msg);
            let view = run_blocking(move || store.view(list_id)).await?;
            Ok((StatusCode::BAD_REQUEST, Html(render::list_page(&view, Some(&msg)))).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

async fn append_slash_handler(Path(raw_id): Path<String>) -> Result<Redirect, AppError> {
    let list_id: ListId = raw_id.parse()?;
    Ok(Redirect::permanent(&list_id.url()))
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "superlists-web"
    }))
}

async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html(render::not_found_page()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn test_server() -> WebServer {
        WebServer::new(ItemStore::open_memory().unwrap())
    }

    async fn send(server: &WebServer, req: Request<Body>) -> (StatusCode, Option<String>, String) {
        let resp = server.router().oneshot(req).await.unwrap();
        let status = resp.status();
        let location = resp
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, location, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_item(uri: &str, encoded_text: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("item_text={}", encoded_text)))
            .unwrap()
    }

    #[tokio::test]
    async fn test_home_page() {
        let server = test_server();
        let (status, _, body) = send(&server, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("To-Do"));
        assert!(body.contains(r#"placeholder="Enter a to-do item""#));
    }

    #[tokio::test]
    async fn test_new_list_redirects_to_canonical_url() {
        let server = test_server();
        let (status, location, _) = send(&server, post_item("/", "Buy+peacock+feathers")).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/lists/1/"));

        let (status, _, body) = send(&server, get("/lists/1/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<td>1: Buy peacock feathers</td>"));
    }

    #[tokio::test]
    async fn test_add_items_to_existing_list() {
        let server = test_server();
        send(&server, post_item("/", "Buy+peacock+feathers")).await;
        let (status, location, _) =
            send(&server, post_item("/lists/1/", "Use+peacock+feathers+to+make+a+fly")).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/lists/1/"));

        let (_, _, body) = send(&server, get("/lists/1/")).await;
        let first = body.find("1: Buy peacock feathers").unwrap();
        let second = body.find("2: Use peacock feathers to make a fly").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn test_second_list_gets_new_url_and_own_items() {
        let server = test_server();
        send(&server, post_item("/", "Buy+peacock+feathers")).await;
        let (_, location, _) = send(&server, post_item("/", "Buy+milk")).await;
        assert_eq!(location.as_deref(), Some("/lists/2/"));

        let (_, _, body) = send(&server, get("/lists/2/")).await;
        assert!(body.contains("1: Buy milk"));
        assert!(!body.contains("peacock"));
    }

    #[tokio::test]
    async fn test_unknown_list_is_not_found() {
        let server = test_server();
        for uri in ["/lists/42/", "/lists/abc/", "/lists/0/", "/nowhere"] {
            let (status, _, _) = send(&server, get(uri)).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        }

        let (status, _, _) = send(&server, post_item("/lists/42/", "orphan")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(server.store().list_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_item_on_home_page_creates_nothing() {
        let server = test_server();
        for encoded in ["", "+++", "%09%0A"] {
            let (status, location, body) = send(&server, post_item("/", encoded)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(location.is_none());
            assert!(body.contains("You can&#x27;t have an empty list item"));
            assert!(body.contains(r#"id="id_new_item""#));
        }
        assert_eq!(server.store().list_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_item_on_list_page_keeps_items() {
        let server = test_server();
        send(&server, post_item("/", "Buy+milk")).await;
        let (status, _, body) = send(&server, post_item("/lists/1/", "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("1: Buy milk"));
        assert!(body.contains("has-error"));
        assert_eq!(server.store().items(ListId::new(1)).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_slash_redirects() {
        let server = test_server();
        let (status, location, _) = send(&server, get("/lists/7")).await;
        assert_eq!(status, StatusCode::PERMANENT_REDIRECT);
        assert_eq!(location.as_deref(), Some("/lists/7/"));
    }

    #[tokio::test]
    async fn test_health() {
        let server = test_server();
        let (status, _, body) = send(&server, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }
}
