//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! HTTP surface of the relay
//!
//! `POST /ask` runs the whole pipeline for one request:
//! validation, cooldown gate, persona lookup, conversation assembly, provider
//! selection, sanitizing and directive extraction.

use crate::context::RelayContext;
use crate::conversation::ConversationContext;
use crate::directive;
use crate::gate::wait_seconds;
use crate::models::{LLMError, ModelFamily, ProviderChoice, SelectionError};
use crate::sanitize::sanitize;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics::counter;
use mita_relay_common::{AskRequest, AskResponse, ErrorBody};
use std::any::Any;
use std::net::SocketAddr;
use thiserror::Error;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Text returned by the liveness probe
pub const LIVENESS_MESSAGE: &str = "AI Mita is running.";

/// Reply surfaced when the model produced nothing but directives
pub const EMPTY_REPLY: &str = "...";

const MAX_BODY_SIZE_1MB: usize = 1024 * 1024;

/// Request failures and their HTTP mapping
#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing or malformed input; no provider was called
    #[error("{0}")]
    BadRequest(String),

    /// The caller is inside its cooldown window; no provider was called
    #[error("Too many requests, retry in {retry_after}s")]
    CoolingDown { cooldown: u64, retry_after: u64 },

    /// No candidate plan could be built for the request
    #[error("Routing failed: {0}")]
    Routing(#[from] LLMError),

    /// The fallback chain ended without an answer
    #[error(transparent)]
    Selection(#[from] SelectionError),
}

impl RelayError {
    fn outcome(&self) -> &'static str {
        match self {
            RelayError::BadRequest(_) => "bad_request",
            RelayError::CoolingDown { .. } => "cooling_down",
            RelayError::Routing(_) => "routing_error",
            RelayError::Selection(error) => error.kind(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        counter!("relay.requests", "outcome" => self.outcome()).increment(1);

        match self {
            RelayError::BadRequest(message) => {
                tracing::debug!("Rejected request: {}", message);
                (StatusCode::BAD_REQUEST, Json(ErrorBody::new(message))).into_response()
            }
            RelayError::CoolingDown {
                cooldown,
                retry_after,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorBody::cooling_down(
                    "Too many requests",
                    cooldown,
                    retry_after,
                )),
            )
                .into_response(),
            RelayError::Routing(error) => {
                tracing::error!("Failed to route request: {}", error);
                internal_error("Internal server error")
            }
            RelayError::Selection(SelectionError::AllProvidersExhausted { attempts, last }) => {
                tracing::error!(
                    "All providers exhausted after {} attempt(s), last error: {}",
                    attempts,
                    last
                );
                internal_error("All providers exhausted")
            }
            RelayError::Selection(error) => {
                tracing::error!("Provider error: {}", error);
                internal_error("Internal server error")
            }
        }
    }
}

fn internal_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new(message)),
    )
        .into_response()
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Request handler panicked: {}", detail);
    counter!("relay.requests", "outcome" => "panic").increment(1);
    internal_error("Internal server error")
}

/// Build the relay router
pub fn create_router(context: RelayContext) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/ask", post(ask))
        .with_state(context)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE_1MB))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

/// Liveness probe
pub async fn home() -> &'static str {
    LIVENESS_MESSAGE
}

/// Answer one conversational turn
pub async fn ask(
    State(context): State<RelayContext>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, RelayError> {
    let request_id = Uuid::new_v4();
    let Json(request) = payload.map_err(|rejection| {
        RelayError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    if request.events.is_empty() && request.trimmed_prompt().is_none() {
        return Err(RelayError::BadRequest("No prompt provided".to_string()));
    }
    let family = requested_family(&request, context.defaults().model)?;

    context.ledger().check(peer.ip()).map_err(|remaining| {
        tracing::debug!("{} is cooling down for {:?}", peer.ip(), remaining);
        RelayError::CoolingDown {
            cooldown: context.ledger().cooldown().as_secs(),
            retry_after: wait_seconds(remaining),
        }
    })?;

    let defaults = context.defaults();
    let character = non_blank(request.character.as_deref()).unwrap_or(&defaults.character);
    let language = non_blank(request.lang.as_deref())
        .unwrap_or(&defaults.language)
        .to_ascii_uppercase();

    let persona = context.personas().resolve(character, &language).await;
    let conversation = ConversationContext::assemble(
        &persona,
        &request.history,
        &request.events,
        request.trimmed_prompt(),
    );

    let choice = ProviderChoice::new(family, request.credential());
    let plan = context.routes().plan(&choice, context.backends())?;
    tracing::debug!(
        %request_id,
        "Routing {} request for '{}' ({} turn(s), {} mode)",
        family,
        character,
        conversation.len(),
        plan.mode
    );

    let selection = context.selector().select(&plan, &conversation).await?;
    let (directive, cleaned) = directive::extract(&sanitize(&selection.answer));
    let response = if cleaned.is_empty() {
        EMPTY_REPLY.to_string()
    } else {
        cleaned
    };

    tracing::info!(
        %request_id,
        "Prompt: {} | Model: {} | Response: {}",
        prompt_label(&request),
        selection.model,
        response
    );
    counter!("relay.requests", "outcome" => "success").increment(1);

    Ok(Json(AskResponse {
        response,
        directive,
        model_used: Some(selection.model),
    }))
}

fn requested_family(request: &AskRequest, default: ModelFamily) -> Result<ModelFamily, RelayError> {
    match non_blank(request.model.as_deref()) {
        Some(model) => model.parse().map_err(|_| {
            RelayError::BadRequest(format!("Invalid model choice: {}", model))
        }),
        None => Ok(default),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn prompt_label(request: &AskRequest) -> String {
    if request.events.is_empty() {
        request.trimmed_prompt().unwrap_or_default().to_string()
    } else {
        format!("[{}]", request.events.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_bad_request_response() {
        let response = RelayError::BadRequest("No prompt provided".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "error": "No prompt provided" })
        );
    }

    #[tokio::test]
    async fn test_cooldown_response() {
        let response = RelayError::CoolingDown {
            cooldown: 3,
            retry_after: 2,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(body["cooldown"], 3);
        assert_eq!(body["retry_after"], 2);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_provider_error_hides_detail() {
        let error = SelectionError::Provider {
            backend: "relay".to_string(),
            model: "gemini-2.5-flash".to_string(),
            source: LLMError::AuthError("key sk-secret rejected".to_string()),
        };
        let response = RelayError::from(error).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
        assert!(!body.to_string().contains("sk-secret"));
    }

    #[tokio::test]
    async fn test_exhausted_response() {
        let error = SelectionError::AllProvidersExhausted {
            attempts: 3,
            last: LLMError::QuotaExceeded("quota".to_string()),
        };
        let response = RelayError::from(error).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "All providers exhausted");
    }

    #[test]
    fn test_requested_family() {
        let mut request = AskRequest::default();
        assert_eq!(
            requested_family(&request, ModelFamily::Gemini).unwrap(),
            ModelFamily::Gemini
        );

        request.model = Some(" OpenAI ".to_string());
        assert_eq!(
            requested_family(&request, ModelFamily::Gemini).unwrap(),
            ModelFamily::OpenAi
        );

        request.model = Some("claude".to_string());
        assert!(matches!(
            requested_family(&request, ModelFamily::Gemini),
            Err(RelayError::BadRequest(_))
        ));
    }

    #[test]
    fn test_prompt_label() {
        let mut request = AskRequest {
            prompt: Some(" hi ".to_string()),
            ..AskRequest::default()
        };
        assert_eq!(prompt_label(&request), "hi");

        request.events = vec!["door opened".to_string(), "lights off".to_string()];
        assert_eq!(prompt_label(&request), "[door opened; lights off]");
    }
}
