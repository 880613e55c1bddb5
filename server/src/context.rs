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

use crate::config::Configuration;
use crate::gate::CooldownLedger;
use crate::models::{
    BackendFactory, HttpBackends, LLMError, ModelFamily, ProviderSelector, QuotaBreaker,
    RoutingTable,
};
use crate::persona::PersonaStore;
use std::sync::Arc;
use std::time::Duration;

/// Values applied when a request leaves a field out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDefaults {
    pub character: String,
    pub language: String,
    pub model: ModelFamily,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            character: "Crazy Mita".to_string(),
            language: "RU".to_string(),
            model: ModelFamily::Gemini,
        }
    }
}

/// Relay context shared by every request handler
///
/// Owns the only process-wide mutable state: the cooldown ledger and the
/// quota breaker. Everything else is read-only after startup. Cloning is
/// cheap; all fields are reference counted.
#[derive(Clone)]
pub struct RelayContext {
    ledger: Arc<CooldownLedger>,
    personas: PersonaStore,
    routes: Arc<RoutingTable>,
    selector: ProviderSelector,
    backends: Arc<dyn BackendFactory>,
    defaults: Arc<RequestDefaults>,
}

impl RelayContext {
    /// Create a context with a fresh quota breaker
    pub fn new(
        ledger: CooldownLedger,
        personas: PersonaStore,
        routes: RoutingTable,
        backends: Arc<dyn BackendFactory>,
        defaults: RequestDefaults,
    ) -> Self {
        Self {
            ledger: Arc::new(ledger),
            personas,
            routes: Arc::new(routes),
            selector: ProviderSelector::new(Arc::new(QuotaBreaker::new())),
            backends,
            defaults: Arc::new(defaults),
        }
    }

    /// Build the context described by a configuration file
    pub fn from_config(config: &Configuration) -> Result<Self, LLMError> {
        let relay = config.providers.relay.to_llm_config();
        if relay.is_none() {
            tracing::warn!("No relay token configured; only requests with customAPI will succeed");
        }
        let backends = HttpBackends::new(
            relay,
            config.providers.endpoints.clone(),
            config.providers.timeout_seconds,
        )?;

        Ok(Self::new(
            CooldownLedger::new(Duration::from_secs(config.gate.cooldown_seconds)),
            PersonaStore::new(
                config.prompts.directory.as_str(),
                Duration::from_secs(config.prompts.cache_ttl_seconds),
            ),
            config.providers.routes.clone(),
            Arc::new(backends),
            RequestDefaults {
                character: config.prompts.default_character.clone(),
                language: config.prompts.default_language.clone(),
                model: config.providers.default_model,
            },
        ))
    }

    pub fn ledger(&self) -> &Arc<CooldownLedger> {
        &self.ledger
    }

    pub fn personas(&self) -> &PersonaStore {
        &self.personas
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    pub fn selector(&self) -> &ProviderSelector {
        &self.selector
    }

    pub fn breaker(&self) -> &Arc<QuotaBreaker> {
        self.selector.breaker()
    }

    pub fn backends(&self) -> &dyn BackendFactory {
        self.backends.as_ref()
    }

    pub fn defaults(&self) -> &RequestDefaults {
        &self.defaults
    }
}
