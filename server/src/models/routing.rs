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

//! Candidate planning
//!
//! A [`RoutingTable`] maps each model family to a priority-ordered list of
//! models and names one static fallback. Combined with a [`ProviderChoice`]
//! and a [`BackendFactory`] it yields the [`CandidatePlan`] the selector walks.
//!
//! Two mutually exclusive modes exist:
//! - **relay**: every candidate, the fallback included, goes through the shared
//!   intermediary using the service token.
//! - **custom**: every candidate goes straight to the family's provider using
//!   the caller's credential. A credential only unlocks its own family, so the
//!   static fallback is kept only when it belongs to that family.

use super::providers::{GeminiProvider, LlmProvider, OpenAiProvider};
use super::types::{LLMConfig, LLMError, ModelFamily, SamplingConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One model a family can be served by
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRoute {
    /// Provider model identifier
    pub model: String,

    /// Premium variants are guarded by the quota breaker
    #[serde(default)]
    pub premium: bool,
}

impl ModelRoute {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            premium: false,
        }
    }

    pub fn premium(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            premium: true,
        }
    }
}

/// Ordered candidates and sampling constants of one family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyRoutes {
    pub candidates: Vec<ModelRoute>,

    #[serde(default)]
    pub sampling: SamplingConfig,
}

/// The single last-resort model tried after every primary candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackRoute {
    pub family: ModelFamily,
    pub model: String,
}

/// Per-family routing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingTable {
    #[serde(default = "default_gemini_routes")]
    pub gemini: FamilyRoutes,

    #[serde(default = "default_openai_routes")]
    pub openai: FamilyRoutes,

    #[serde(default = "default_mistral_routes")]
    pub mistral: FamilyRoutes,

    /// Set to `null` to disable the static fallback
    #[serde(default = "default_fallback")]
    pub fallback: Option<FallbackRoute>,
}

fn default_gemini_routes() -> FamilyRoutes {
    FamilyRoutes {
        candidates: vec![
            ModelRoute::premium("gemini-2.5-flash"),
            ModelRoute::new("gemini-2.0-flash"),
        ],
        sampling: SamplingConfig {
            max_tokens: 2048,
            ..SamplingConfig::default()
        },
    }
}

fn default_openai_routes() -> FamilyRoutes {
    FamilyRoutes {
        candidates: vec![ModelRoute::new("gpt-4o-mini")],
        sampling: SamplingConfig::default(),
    }
}

fn default_mistral_routes() -> FamilyRoutes {
    FamilyRoutes {
        candidates: vec![ModelRoute::new("mistral-small-latest")],
        sampling: SamplingConfig::default(),
    }
}

fn default_fallback() -> Option<FallbackRoute> {
    Some(FallbackRoute {
        family: ModelFamily::OpenAi,
        model: "gpt-4o-mini".to_string(),
    })
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self {
            gemini: default_gemini_routes(),
            openai: default_openai_routes(),
            mistral: default_mistral_routes(),
            fallback: default_fallback(),
        }
    }
}

/// Requested family plus the optional caller credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderChoice<'a> {
    pub family: ModelFamily,
    pub credential: Option<&'a str>,
}

impl<'a> ProviderChoice<'a> {
    pub fn new(family: ModelFamily, credential: Option<&'a str>) -> Self {
        Self { family, credential }
    }

    pub fn mode(&self) -> CredentialMode {
        if self.credential.is_some() {
            CredentialMode::Custom
        } else {
            CredentialMode::Relay
        }
    }
}

/// How backends are reached for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    /// Shared intermediary with the service token
    Relay,
    /// Family provider with the caller's credential
    Custom,
}

impl fmt::Display for CredentialMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialMode::Relay => write!(f, "relay"),
            CredentialMode::Custom => write!(f, "custom"),
        }
    }
}

/// A concrete backend and model to attempt
#[derive(Clone)]
pub struct Candidate {
    pub backend: Arc<dyn LlmProvider>,
    pub model: String,
    pub sampling: SamplingConfig,
    /// Quota breaker key; set only for premium candidates in relay mode
    pub breaker_key: Option<String>,
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("backend", &self.backend.name())
            .field("model", &self.model)
            .field("breaker_key", &self.breaker_key)
            .finish()
    }
}

/// Everything the selector needs for one request
#[derive(Debug, Clone)]
pub struct CandidatePlan {
    pub mode: CredentialMode,
    pub primary: Vec<Candidate>,
    pub fallback: Option<Candidate>,
}

/// Source of provider instances
///
/// The HTTP implementation builds reqwest-backed providers; tests substitute
/// scripted ones.
pub trait BackendFactory: Send + Sync {
    /// Shared intermediary reached with the service token
    fn relay(&self) -> Result<Arc<dyn LlmProvider>, LLMError>;

    /// Direct provider of `family` using the caller's credential
    fn direct(
        &self,
        family: ModelFamily,
        credential: &str,
    ) -> Result<Arc<dyn LlmProvider>, LLMError>;
}

impl RoutingTable {
    /// Routes configured for a family
    pub fn routes(&self, family: ModelFamily) -> &FamilyRoutes {
        match family {
            ModelFamily::Gemini => &self.gemini,
            ModelFamily::OpenAi => &self.openai,
            ModelFamily::Mistral => &self.mistral,
        }
    }

    /// Build the ordered candidate plan for one request
    pub fn plan(
        &self,
        choice: &ProviderChoice<'_>,
        backends: &dyn BackendFactory,
    ) -> Result<CandidatePlan, LLMError> {
        let mode = choice.mode();
        let routes = self.routes(choice.family);
        if routes.candidates.is_empty() {
            return Err(LLMError::ConfigError(format!(
                "No models configured for family '{}'",
                choice.family
            )));
        }

        let backend = match choice.credential {
            Some(credential) => backends.direct(choice.family, credential)?,
            None => backends.relay()?,
        };

        let primary: Vec<Candidate> = routes
            .candidates
            .iter()
            .map(|route| Candidate {
                backend: Arc::clone(&backend),
                model: route.model.clone(),
                sampling: routes.sampling,
                breaker_key: (route.premium && mode == CredentialMode::Relay)
                    .then(|| route.model.clone()),
            })
            .collect();

        let fallback = match &self.fallback {
            Some(route) if primary.iter().any(|c| c.model == route.model) => None,
            Some(route) if mode == CredentialMode::Relay => Some(Candidate {
                backend: Arc::clone(&backend),
                model: route.model.clone(),
                sampling: self.routes(route.family).sampling,
                breaker_key: None,
            }),
            Some(route) if route.family == choice.family => Some(Candidate {
                backend: Arc::clone(&backend),
                model: route.model.clone(),
                sampling: routes.sampling,
                breaker_key: None,
            }),
            _ => None,
        };

        Ok(CandidatePlan {
            mode,
            primary,
            fallback,
        })
    }
}

/// Direct endpoints of each family, used in custom credential mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectEndpoints {
    #[serde(default = "default_gemini_endpoint")]
    pub gemini: String,
    #[serde(default = "default_openai_endpoint")]
    pub openai: String,
    #[serde(default = "default_mistral_endpoint")]
    pub mistral: String,
}

fn default_gemini_endpoint() -> String {
    LLMConfig::gemini("").endpoint
}

fn default_openai_endpoint() -> String {
    LLMConfig::openai("").endpoint
}

fn default_mistral_endpoint() -> String {
    LLMConfig::mistral("").endpoint
}

impl Default for DirectEndpoints {
    fn default() -> Self {
        Self {
            gemini: default_gemini_endpoint(),
            openai: default_openai_endpoint(),
            mistral: default_mistral_endpoint(),
        }
    }
}

/// Reqwest-backed provider factory
///
/// Holds one HTTP client for every provider it creates so connection pools
/// are shared across requests. The per-call timeout lives on that client.
pub struct HttpBackends {
    client: reqwest::Client,
    relay: Option<Arc<dyn LlmProvider>>,
    endpoints: DirectEndpoints,
}

impl HttpBackends {
    /// Create the factory; `relay` is `None` when no service token is configured
    pub fn new(
        relay: Option<LLMConfig>,
        endpoints: DirectEndpoints,
        timeout_seconds: u64,
    ) -> Result<Self, LLMError> {
        let client = super::providers::http_client(timeout_seconds)?;
        let relay = match relay {
            Some(config) => Some(Arc::new(OpenAiProvider::with_client(
                config,
                client.clone(),
            )?) as Arc<dyn LlmProvider>),
            None => None,
        };
        Ok(Self {
            client,
            relay,
            endpoints,
        })
    }
}

impl BackendFactory for HttpBackends {
    fn relay(&self) -> Result<Arc<dyn LlmProvider>, LLMError> {
        self.relay.clone().ok_or_else(|| {
            LLMError::ConfigError("No relay service token configured".to_string())
        })
    }

    fn direct(
        &self,
        family: ModelFamily,
        credential: &str,
    ) -> Result<Arc<dyn LlmProvider>, LLMError> {
        let provider: Arc<dyn LlmProvider> = match family {
            ModelFamily::Gemini => Arc::new(GeminiProvider::with_client(
                LLMConfig::gemini(credential)
                    .with_endpoint(self.endpoints.gemini.as_str()),
                self.client.clone(),
            )?),
            ModelFamily::OpenAi => Arc::new(OpenAiProvider::with_client(
                LLMConfig::openai(credential)
                    .with_endpoint(self.endpoints.openai.as_str()),
                self.client.clone(),
            )?),
            ModelFamily::Mistral => Arc::new(OpenAiProvider::with_client(
                LLMConfig::mistral(credential)
                    .with_endpoint(self.endpoints.mistral.as_str()),
                self.client.clone(),
            )?),
        };
        Ok(provider)
    }
}
