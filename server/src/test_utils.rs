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

//! Test utilities for provider and router testing
//!
//! Scripted providers answer from a queue instead of the network and record
//! every request they receive.

use crate::models::{BackendFactory, LLMError, LLMRequest, LLMResponse, LlmProvider, ModelFamily};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Provider that replays scripted outcomes
///
/// Queued outcomes are consumed first; once the queue is empty the standing
/// answer is returned, or [`LLMError::Unavailable`] when there is none.
#[derive(Debug)]
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<Result<String, LLMError>>>,
    standing: Option<String>,
    requests: Mutex<Vec<LLMRequest>>,
}

impl ScriptedProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            standing: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every unscripted call with `answer`
    pub fn answering(mut self, answer: impl Into<String>) -> Self {
        self.standing = Some(answer.into());
        self
    }

    /// Queue a successful answer
    pub fn push_ok(&self, answer: impl Into<String>) {
        lock(&self.script).push_back(Ok(answer.into()));
    }

    /// Queue a failure
    pub fn push_err(&self, error: LLMError) {
        lock(&self.script).push_back(Err(error));
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<LLMRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse, LLMError> {
        let model = request.model.clone();
        lock(&self.requests).push(request);

        let next = lock(&self.script).pop_front();
        let outcome = match next {
            Some(outcome) => outcome,
            None => self.standing.clone().ok_or_else(|| {
                LLMError::Unavailable(format!("{} has no scripted answer", self.name))
            }),
        };
        outcome.map(|answer| LLMResponse::new(answer, model))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Backend factory handing out scripted providers
///
/// The relay provider is named `relay`; direct providers are named after
/// their family and created on first use.
#[derive(Debug)]
pub struct ScriptedBackends {
    relay: Arc<ScriptedProvider>,
    direct: DashMap<ModelFamily, Arc<ScriptedProvider>>,
    credentials: Mutex<Vec<String>>,
}

impl ScriptedBackends {
    pub fn new(relay: ScriptedProvider) -> Self {
        Self {
            relay: Arc::new(relay),
            direct: DashMap::new(),
            credentials: Mutex::new(Vec::new()),
        }
    }

    pub fn relay_provider(&self) -> Arc<ScriptedProvider> {
        Arc::clone(&self.relay)
    }

    /// Direct provider of `family`, created if needed
    pub fn direct_provider(&self, family: ModelFamily) -> Arc<ScriptedProvider> {
        Arc::clone(
            self.direct
                .entry(family)
                .or_insert_with(|| Arc::new(ScriptedProvider::new(family.as_str())))
                .value(),
        )
    }

    /// Credentials passed to [`BackendFactory::direct`], in call order
    pub fn direct_credentials(&self) -> Vec<String> {
        lock(&self.credentials).clone()
    }
}

impl Default for ScriptedBackends {
    fn default() -> Self {
        Self::new(ScriptedProvider::new("relay"))
    }
}

impl BackendFactory for ScriptedBackends {
    fn relay(&self) -> Result<Arc<dyn LlmProvider>, LLMError> {
        Ok(self.relay_provider())
    }

    fn direct(
        &self,
        family: ModelFamily,
        credential: &str,
    ) -> Result<Arc<dyn LlmProvider>, LLMError> {
        lock(&self.credentials).push(credential.to_string());
        Ok(self.direct_provider(family))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LLMMessage;

    #[tokio::test]
    async fn test_script_then_standing_answer() {
        let provider = ScriptedProvider::new("relay").answering("standing");
        provider.push_err(LLMError::QuotaExceeded("quota".to_string()));
        provider.push_ok("scripted");

        let request = LLMRequest::new("m").with_message(LLMMessage::user("hi"));
        assert!(provider.complete(request.clone()).await.is_err());
        assert_eq!(provider.complete(request.clone()).await.unwrap().content, "scripted");
        assert_eq!(provider.complete(request).await.unwrap().content, "standing");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_unscripted_provider_is_unavailable() {
        let provider = ScriptedProvider::new("relay");
        let result = provider.complete(LLMRequest::new("m")).await;
        assert!(matches!(result, Err(LLMError::Unavailable(_))));
    }

    #[test]
    fn test_direct_providers_are_shared_per_family() {
        let backends = ScriptedBackends::default();
        backends.direct(ModelFamily::Gemini, "k1").unwrap();
        backends.direct(ModelFamily::Gemini, "k2").unwrap();
        assert_eq!(backends.direct_credentials(), vec!["k1", "k2"]);
        assert!(Arc::ptr_eq(
            &backends.direct_provider(ModelFamily::Gemini),
            &backends.direct_provider(ModelFamily::Gemini)
        ));
        assert_eq!(backends.direct_provider(ModelFamily::Mistral).name(), "mistral");
    }
}
