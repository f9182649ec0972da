//! HTTP surface: chat query, health probe and admin ingestion.
//!
//! The chat route always answers 200; admin routes report failures as 400.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rag::{DocumentBatch, NewDocument, Service, TaxSection, FALLBACK_MESSAGE};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub const HEALTH_TEXT: &str = "RAG Assistant is running";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub subsection: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub section: Option<String>,
    pub subsection: Option<String>,
}

pub fn router(service: Service) -> Router {
    Router::new()
        .route("/api/chat/query", post(chat_query))
        .route("/api/chat/health", get(health))
        .route("/api/admin/documents", post(add_document))
        .route("/api/admin/documents/batch", post(add_documents_batch))
        .route("/api/admin/tax-section", post(add_tax_section))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

async fn chat_query(
    State(service): State<Service>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Json<ChatResponse> {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "unreadable chat request");
            return Json(ChatResponse {
                response: FALLBACK_MESSAGE.to_string(),
                section: None,
                subsection: None,
            });
        }
    };
    let response = service
        .assistant
        .answer(&req.query, req.section.as_deref(), req.subsection.as_deref())
        .await;
    Json(ChatResponse {
        response,
        section: req.section,
        subsection: req.subsection,
    })
}

async fn health() -> &'static str {
    HEALTH_TEXT
}

async fn add_document(
    State(service): State<Service>,
    body: Result<Json<NewDocument>, JsonRejection>,
) -> Response {
    const FAILURE: &str = "Failed to add document";
    let Json(doc) = match body {
        Ok(body) => body,
        Err(rejection) => return admin_failure(FAILURE, rejection),
    };
    match service.ingestor.add_document(doc).await {
        Ok(()) => (StatusCode::OK, "Document added successfully").into_response(),
        Err(err) => admin_failure(FAILURE, err),
    }
}

async fn add_documents_batch(
    State(service): State<Service>,
    body: Result<Json<DocumentBatch>, JsonRejection>,
) -> Response {
    const FAILURE: &str = "Failed to add documents";
    let Json(batch) = match body {
        Ok(body) => body,
        Err(rejection) => return admin_failure(FAILURE, rejection),
    };
    let count = batch.contents.len();
    match service.ingestor.add_documents_batch(batch).await {
        Ok(()) => (StatusCode::OK, format!("{count} documents added successfully in batch")).into_response(),
        Err(err) => admin_failure(FAILURE, err),
    }
}

async fn add_tax_section(
    State(service): State<Service>,
    body: Result<Json<TaxSection>, JsonRejection>,
) -> Response {
    const FAILURE: &str = "Failed to add tax section";
    let Json(section) = match body {
        Ok(body) => body,
        Err(rejection) => return admin_failure(FAILURE, rejection),
    };
    match service.ingestor.add_tax_section(section).await {
        Ok(units) => (StatusCode::OK, format!("Tax section added successfully ({units} entries)")).into_response(),
        Err(err) => admin_failure(FAILURE, err),
    }
}

fn admin_failure(what: &str, err: impl std::fmt::Display) -> Response {
    tracing::error!(error = %err, "{what}");
    (StatusCode::BAD_REQUEST, format!("{what}: {err}")).into_response()
}
