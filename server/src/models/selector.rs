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

//! Provider selection and fallback
//!
//! Walks a [`CandidatePlan`] one candidate at a time:
//!
//! 1. non-tripped primary candidates, in priority order
//! 2. primary candidates whose quota breaker is tripped
//! 3. the static fallback, once
//!
//! A transient failure advances the chain. Any other failure ends it
//! immediately; it is never retried on another provider.

use super::routing::{Candidate, CandidatePlan};
use super::types::{LLMError, LLMRequest};
use crate::conversation::ConversationContext;
use dashmap::DashSet;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Process-wide quota flags of premium model variants
///
/// A flag is set when a variant reports quota exhaustion and cleared by its
/// next success. There is no timed reset.
#[derive(Debug, Default)]
pub struct QuotaBreaker {
    tripped: DashSet<String>,
}

impl QuotaBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_tripped(&self, key: &str) -> bool {
        self.tripped.contains(key)
    }

    /// Mark a variant exhausted; returns `true` if it was not already tripped
    pub fn trip(&self, key: &str) -> bool {
        self.tripped.insert(key.to_string())
    }

    /// Mark a variant available again; returns `true` if it was tripped
    pub fn reset(&self, key: &str) -> bool {
        self.tripped.remove(key).is_some()
    }

    /// Currently tripped variants, sorted
    pub fn tripped(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.tripped.iter().map(|k| k.key().clone()).collect();
        keys.sort();
        keys
    }
}

/// Outcome of a successful selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Raw model output, not yet sanitized
    pub answer: String,
    /// Name of the backend that answered
    pub backend: String,
    /// Model that answered
    pub model: String,
    /// Number of candidates tried, the successful one included
    pub attempts: usize,
}

/// Selection failures
#[derive(Debug, Error)]
pub enum SelectionError {
    /// Every candidate failed transiently
    #[error("All providers exhausted after {attempts} attempt(s): {last}")]
    AllProvidersExhausted { attempts: usize, last: LLMError },

    /// A candidate failed with a non-transient error
    #[error("Provider '{backend}' failed for model '{model}': {source}")]
    Provider {
        backend: String,
        model: String,
        #[source]
        source: LLMError,
    },
}

impl SelectionError {
    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            SelectionError::AllProvidersExhausted { .. } => "exhausted",
            SelectionError::Provider { .. } => "provider_error",
        }
    }
}

/// Fallback state machine over a candidate plan
#[derive(Debug, Clone)]
pub struct ProviderSelector {
    breaker: Arc<QuotaBreaker>,
}

impl ProviderSelector {
    pub fn new(breaker: Arc<QuotaBreaker>) -> Self {
        Self { breaker }
    }

    pub fn breaker(&self) -> &Arc<QuotaBreaker> {
        &self.breaker
    }

    /// Try candidates in order until one answers
    pub async fn select(
        &self,
        plan: &CandidatePlan,
        context: &ConversationContext,
    ) -> Result<Selection, SelectionError> {
        let (ready, deferred): (Vec<&Candidate>, Vec<&Candidate>) =
            plan.primary.iter().partition(|candidate| {
                !candidate
                    .breaker_key
                    .as_deref()
                    .is_some_and(|key| self.breaker.is_tripped(key))
            });

        if !deferred.is_empty() {
            tracing::debug!(
                "Deferring {} tripped candidate(s) in {} mode",
                deferred.len(),
                plan.mode
            );
        }

        let mut attempts = 0;
        let mut last = None;

        for candidate in ready.into_iter().chain(deferred).chain(plan.fallback.iter()) {
            attempts += 1;
            match self.attempt(candidate, context).await {
                Ok(answer) => {
                    if let Some(key) = candidate.breaker_key.as_deref() {
                        if self.breaker.reset(key) {
                            tracing::info!("Quota breaker for '{}' cleared", key);
                        }
                    }
                    return Ok(Selection {
                        answer,
                        backend: candidate.backend.name().to_string(),
                        model: candidate.model.clone(),
                        attempts,
                    });
                }
                Err(error) if error.is_transient() => {
                    tracing::warn!(
                        "Candidate '{}' via '{}' failed transiently: {}",
                        candidate.model,
                        candidate.backend.name(),
                        error
                    );
                    if let (Some(key), LLMError::QuotaExceeded(_)) =
                        (candidate.breaker_key.as_deref(), &error)
                    {
                        if self.breaker.trip(key) {
                            tracing::warn!("Quota breaker for '{}' tripped", key);
                            counter!("relay.breaker.trips", "model" => key.to_string())
                                .increment(1);
                        }
                    }
                    last = Some(error);
                }
                Err(error) => {
                    tracing::error!(
                        "Candidate '{}' via '{}' failed: {}",
                        candidate.model,
                        candidate.backend.name(),
                        error
                    );
                    return Err(SelectionError::Provider {
                        backend: candidate.backend.name().to_string(),
                        model: candidate.model.clone(),
                        source: error,
                    });
                }
            }
        }

        Err(SelectionError::AllProvidersExhausted {
            attempts,
            last: last.unwrap_or_else(|| {
                LLMError::ConfigError("No candidates in plan".to_string())
            }),
        })
    }

    async fn attempt(
        &self,
        candidate: &Candidate,
        context: &ConversationContext,
    ) -> Result<String, LLMError> {
        let request = LLMRequest::new(candidate.model.as_str())
            .with_messages(context.turns().iter().cloned())
            .with_sampling(candidate.sampling);

        let started = Instant::now();
        let result = candidate.backend.complete(request).await;
        histogram!("relay.provider.duration", "model" => candidate.model.clone())
            .record(started.elapsed().as_secs_f64());

        let outcome = match &result {
            Ok(_) => "success",
            Err(error) => error.kind(),
        };
        counter!(
            "relay.provider.attempts",
            "model" => candidate.model.clone(),
            "outcome" => outcome
        )
        .increment(1);

        result.map(|response| {
            tracing::debug!(
                "Model '{}' finished ({:?}), tokens in/out: {:?}/{:?}",
                response.model,
                response.finish_reason,
                response.prompt_tokens,
                response.completion_tokens
            );
            response.content
        })
    }
}
