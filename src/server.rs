//! HTTP surface for the query pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer `{ "query": ... }` with `{ "answer": ... }` |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! `/ask` always answers 200 once the body parses: pipeline failures are
//! reported through the answer sentinels, not HTTP status codes. A body that
//! is not a JSON object is rejected with
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "..." } }
//! ```
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::db;
use crate::respond::Responder;
use crate::sqlite_store::SqliteStore;

/// Start the server on `[server].bind` over the configured database.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let store = Arc::new(SqliteStore::new(pool));
    let responder = Responder::from_config(config, store.clone(), store)?;

    let app = router(responder);
    let bind_addr = config.server.bind.clone();
    println!("recall server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router around a shared [`Responder`].
pub fn router(responder: Responder) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(Arc::new(responder))
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

// ============ POST /ask ============

#[derive(Serialize)]
struct AskResponse {
    answer: String,
}

/// The `query` member may hold any JSON value; non-strings and a missing
/// member get the error sentinel from the pipeline.
async fn handle_ask(
    State(responder): State<Arc<Responder>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Json(body) = body.map_err(|e| bad_request(e.body_text()))?;
    let Value::Object(fields) = body else {
        return Err(bad_request("request body must be a JSON object"));
    };

    let query = fields.get("query").unwrap_or(&Value::Null);
    let answer = responder.generate_refined_response_json(query).await;
    Ok(Json(AskResponse { answer }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
