use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::config::LeadRequest;
use crate::export::{export_filename, leads_to_csv};
use crate::lead::Lead;
use crate::pipeline::{LeadPipeline, RunSummary};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<LeadPipeline>,
}

impl AppState {
    pub fn new(pipeline: LeadPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/leads", get(get_leads))
        .route("/api/leads.csv", get(get_leads_csv))
        .route("/debug/last-run", get(debug_last_run))
        .route("/debug/sources", get(debug_sources))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Raw strings on purpose: malformed numbers fall back to defaults instead of a 400.
#[derive(Debug, Default, Deserialize)]
pub struct LeadsQuery {
    pub limit: Option<String>,
    pub days: Option<String>,
}

impl LeadsQuery {
    pub fn to_request(&self) -> LeadRequest {
        LeadRequest::from_query(self.limit.as_deref(), self.days.as_deref())
    }
}

#[derive(Serialize)]
struct LeadsResp {
    leads: Vec<Lead>,
}

#[derive(Serialize)]
struct ErrorResp {
    error: String,
}

/// Number of sources skipped in the run that produced the response.
pub const SOURCE_FAILURES_HEADER: &str = "x-leads-source-failures";

fn failure(e: anyhow::Error) -> Response {
    let msg = format!("{e:#}");
    let msg = if msg.is_empty() { "failed".to_string() } else { msg };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResp { error: msg })).into_response()
}

async fn get_leads(State(state): State<AppState>, Query(q): Query<LeadsQuery>) -> Response {
    match state.pipeline.run(q.to_request()).await {
        Ok(report) => (
            [(SOURCE_FAILURES_HEADER, report.summary.source_failures.len().to_string())],
            Json(LeadsResp {
                leads: report.leads,
            }),
        )
            .into_response(),
        Err(e) => failure(e),
    }
}

async fn get_leads_csv(State(state): State<AppState>, Query(q): Query<LeadsQuery>) -> Response {
    match state.pipeline.run(q.to_request()).await {
        Ok(report) => {
            let disposition = format!(
                "attachment; filename=\"{}\"",
                export_filename(chrono::Utc::now())
            );
            let skipped = report.summary.source_failures.len().to_string();
            (
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                    (header::HeaderName::from_static(SOURCE_FAILURES_HEADER), skipped),
                ],
                leads_to_csv(&report.leads),
            )
                .into_response()
        }
        Err(e) => failure(e),
    }
}

async fn debug_last_run(State(state): State<AppState>) -> Json<Option<RunSummary>> {
    Json(state.pipeline.last_run())
}

#[derive(Serialize)]
struct SourcesOut {
    sources: Vec<String>,
    max_pages: u32,
    concurrency: usize,
    strict: bool,
}

async fn debug_sources(State(state): State<AppState>) -> Json<SourcesOut> {
    let cfg = state.pipeline.config();
    Json(SourcesOut {
        sources: state.pipeline.source_names(),
        max_pages: cfg.max_pages,
        concurrency: cfg.concurrency,
        strict: cfg.source_policy == crate::config::SourcePolicy::Strict,
    })
}
