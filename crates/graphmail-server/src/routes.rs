//! Route handlers

use crate::{ApiError, ApiResult};
use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::{Json, Router};
use graphmail_auth::{TokenManager, TokenStatus};
use graphmail_core::models::{EmailSummary, SendEmailRequest};
use graphmail_core::{MailService, SchedulerCommand};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

const DEFAULT_LIST_LIMIT: i64 = 50;

/// Shared handles for every request
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenManager>,
    pub mail: Arc<MailService>,
    /// Retrieval scheduler, asked for a run once authorization completes
    pub scheduler: Option<mpsc::Sender<SchedulerCommand>>,
}

impl AppState {
    pub fn new(tokens: Arc<TokenManager>, mail: Arc<MailService>) -> Self {
        Self {
            tokens,
            mail,
            scheduler: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: mpsc::Sender<SchedulerCommand>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/login", get(login))
        .route("/api/auth/callback", get(callback))
        .route("/api/auth/status", get(status))
        .route("/api/email/send", post(send_email))
        .route("/api/email/retrieve", get(retrieve_emails))
        .route("/api/emails", get(list_emails))
        .with_state(state)
}

async fn login(State(state): State<AppState>) -> Redirect {
    Redirect::temporary(&state.tokens.authorization_url())
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> ApiResult<Json<Value>> {
    if let Some(error) = params.error {
        let description = params.error_description.unwrap_or(error);
        warn!("Authorization denied by provider: {}", description);
        return Err(ApiError::BadRequest(description));
    }

    let code = params
        .code
        .ok_or_else(|| ApiError::BadRequest("missing authorization code".to_string()))?;

    state
        .tokens
        .complete_authorization(&code)
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    info!("Authorization callback completed");
    if let Some(scheduler) = &state.scheduler {
        if let Err(e) = scheduler.try_send(SchedulerCommand::RunNow) {
            warn!("Could not request initial retrieval: {}", e);
        }
    }
    Ok(Json(json!({ "message": "Authorization successful" })))
}

async fn status(State(state): State<AppState>) -> Json<TokenStatus> {
    Json(state.tokens.status().await)
}

async fn send_email(
    State(state): State<AppState>,
    Json(request): Json<SendEmailRequest>,
) -> ApiResult<Json<Value>> {
    state.mail.send_email(&request).await?;
    Ok(Json(json!({ "message": "Email sent successfully" })))
}

async fn retrieve_emails(State(state): State<AppState>) -> ApiResult<Json<Vec<EmailSummary>>> {
    Ok(Json(state.mail.retrieve_emails().await?))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_emails(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<EmailSummary>>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let offset = params.offset.unwrap_or(0);
    if limit <= 0 || offset < 0 {
        return Err(ApiError::BadRequest(
            "limit must be positive and offset non-negative".to_string(),
        ));
    }
    Ok(Json(state.mail.list_stored(limit, offset).await?))
}
