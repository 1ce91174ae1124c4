use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use spaces_core::{AuthContext, SessionId, SpacesBackend};

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::health::health_check;
use crate::protocol;
use crate::rpc::{self, RpcResponse};
use crate::session::{InboundCall, SessionError, SessionGuard, SessionRegistry};

const SESSION_NOT_FOUND: &str = "Session not found. Please establish SSE connection first.";
const MISSING_SESSION_ID: &str = "Missing sessionId parameter";

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<SessionRegistry>,
    /// Process-wide credential, used when a call brings none of its own.
    pub default_auth: AuthContext,
    pub started_at: Instant,
    pub shutdown: CancellationToken,
    pub session_queue_size: usize,
}

impl AppState {
    /// Query token, then the stream-open token, then the process default.
    pub fn resolve_auth(&self, query_token: Option<&str>, session: Option<&AuthContext>) -> AuthContext {
        let query = AuthContext::from_raw(query_token);
        let session = session.cloned().unwrap_or_default();
        AuthContext::first_with_token([&query, &session, &self.default_auth])
    }
}

#[derive(Debug, Default, Deserialize)]
struct TokenQuery {
    huggingface_api_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MessagesQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
    huggingface_api_token: Option<String>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/sse", get(sse_handler))
        .route("/messages", post(messages_handler))
        .route("/mcp", post(mcp_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind the listener and serve until the handle is shut down.
pub async fn start(
    config: ServerConfig,
    backend: Arc<dyn SpacesBackend>,
    default_auth: AuthContext,
) -> Result<ServerHandle, std::io::Error> {
    let shutdown = CancellationToken::new();
    let sessions = Arc::new(SessionRegistry::new());
    let dispatcher = Arc::new(Dispatcher::new(backend, config.backend_timeout()));

    let state = AppState {
        dispatcher: Arc::clone(&dispatcher),
        sessions: Arc::clone(&sessions),
        default_auth,
        started_at: Instant::now(),
        shutdown: shutdown.clone(),
        session_queue_size: config.session_queue_size.max(1),
    };

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    let local_addr = listener.local_addr()?;

    info!(
        addr = %local_addr,
        operations = dispatcher.catalog().len(),
        "Spaces MCP server started"
    );

    let router = build_router(state);
    let stop = shutdown.clone();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move { stop.cancelled().await })
            .await;
        if let Err(e) = result {
            error!(error = %e, "server terminated");
        }
    });

    Ok(ServerHandle {
        addr: local_addr,
        port: local_addr.port(),
        sessions,
        shutdown,
        server,
    })
}

/// Handle returned by `start()`.
pub struct ServerHandle {
    pub addr: SocketAddr,
    pub port: u16,
    sessions: Arc<SessionRegistry>,
    shutdown: CancellationToken,
    server: JoinHandle<()>,
}

impl ServerHandle {
    pub fn active_sessions(&self) -> usize {
        self.sessions.count()
    }

    /// Stop accepting, end open streams, and wait up to `timeout` for the
    /// server task before aborting it.
    pub async fn shutdown(mut self, timeout: Duration) {
        self.shutdown.cancel();
        if tokio::time::timeout(timeout, &mut self.server).await.is_err() {
            warn!("shutdown timed out after {timeout:?}, aborting server task");
            self.server.abort();
        }
        info!("Spaces MCP server stopped");
    }
}

/// `GET /sse`: open a session and stream its responses.
async fn sse_handler(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream_auth = AuthContext::from_raw(query.huggingface_api_token.as_deref());
    let (inbound_tx, inbound_rx) = mpsc::channel(state.session_queue_size);
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<RpcResponse>(state.session_queue_size);

    let session = state.sessions.register(inbound_tx, stream_auth);
    let session_id = session.id().clone();
    let guard = SessionGuard::new(Arc::clone(&state.sessions), session_id.clone());
    info!(
        session_id = %session_id,
        active = state.sessions.count(),
        "session opened"
    );

    tokio::spawn(session_worker(
        Arc::clone(&state.dispatcher),
        session_id.clone(),
        session.closed(),
        inbound_rx,
        outbound_tx,
    ));

    let endpoint = format!("/messages?sessionId={session_id}");
    let shutdown = state.shutdown.clone();
    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok::<Event, Infallible>(Event::default().event("endpoint").data(endpoint));
        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => None,
                message = outbound_rx.recv() => message,
            };
            let Some(response) = next else { break };
            match serde_json::to_string(&response) {
                Ok(json) => yield Ok(Event::default().event("message").data(json)),
                Err(e) => warn!(error = %e, "failed to encode response"),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Serves one session's calls in arrival order. Exits as soon as the session
/// is closed or its stream is gone, without dispatching anything still queued.
async fn session_worker(
    dispatcher: Arc<Dispatcher>,
    session_id: SessionId,
    closed: CancellationToken,
    mut inbound: mpsc::Receiver<InboundCall>,
    outbound: mpsc::Sender<RpcResponse>,
) {
    loop {
        let call = tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            _ = outbound.closed() => break,
            call = inbound.recv() => match call {
                Some(call) => call,
                None => break,
            },
        };
        debug!(session_id = %session_id, method = %call.request.method, "handling message");
        let Some(response) = protocol::handle(&dispatcher, call.request, &call.auth).await else {
            continue;
        };
        if outbound.send(response).await.is_err() {
            debug!(session_id = %session_id, "stream closed, dropping response");
            break;
        }
    }
    debug!(session_id = %session_id, "session worker stopped");
}

/// `POST /messages?sessionId=<id>`: hand one message to an open session.
async fn messages_handler(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
    body: String,
) -> Response {
    let Some(raw_id) = query.session_id.filter(|id| !id.is_empty()) else {
        return error_body(StatusCode::BAD_REQUEST, MISSING_SESSION_ID);
    };
    let session_id = SessionId::from_raw(raw_id);

    let session = match state.sessions.lookup(&session_id) {
        Ok(session) => session,
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "message for unknown session");
            return error_body(StatusCode::NOT_FOUND, SESSION_NOT_FOUND);
        }
    };

    let request = match rpc::parse_message(&body) {
        Ok(request) => request,
        Err(response) => {
            warn!(session_id = %session_id, "malformed message");
            return (StatusCode::BAD_REQUEST, Json(response)).into_response();
        }
    };

    let auth = state.resolve_auth(query.huggingface_api_token.as_deref(), Some(session.auth()));
    match session.deliver(InboundCall { request, auth }) {
        Ok(()) => (StatusCode::ACCEPTED, "Accepted").into_response(),
        Err(SessionError::NotFound(_)) => error_body(StatusCode::NOT_FOUND, SESSION_NOT_FOUND),
        Err(e @ SessionError::Busy(_)) => {
            warn!(session_id = %session_id, error = %e, "session queue full");
            error_body(StatusCode::SERVICE_UNAVAILABLE, "Session is busy, retry later")
        }
    }
}

/// `POST /mcp`: synchronous JSON-RPC over plain HTTP.
async fn mcp_handler(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    body: String,
) -> Response {
    let request = match rpc::parse_message(&body) {
        Ok(request) => request,
        Err(response) => return (StatusCode::BAD_REQUEST, Json(response)).into_response(),
    };
    let auth = state.resolve_auth(query.huggingface_api_token.as_deref(), None);
    match protocol::handle(&state.dispatcher, request, &auth).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Health check HTTP endpoint.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(health_check(state.started_at, state.sessions.count()))
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
