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

use super::{http_client, status_error};
use crate::models::{LLMConfig, LLMError, LLMMessage, LLMRequest, LLMResponse, LlmProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// OpenAI-compatible chat completions provider
///
/// Serves OpenAI, Mistral and the shared relay; they differ only in endpoint
/// and credential.
pub struct OpenAiProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Create a new chat completions provider
    pub fn new(config: LLMConfig) -> Result<Self, LLMError> {
        if config.api_key.is_none() {
            return Err(LLMError::ConfigError(format!(
                "{} requires an API key",
                config.provider
            )));
        }

        let client = http_client(config.timeout_seconds)?;
        Ok(Self { config, client })
    }

    /// Create a provider that reuses an existing HTTP client
    pub fn with_client(config: LLMConfig, client: reqwest::Client) -> Result<Self, LLMError> {
        if config.api_key.is_none() {
            return Err(LLMError::ConfigError(format!(
                "{} requires an API key",
                config.provider
            )));
        }
        Ok(Self { config, client })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse, LLMError> {
        #[derive(Serialize)]
        struct ChatRequest {
            model: String,
            messages: Vec<LLMMessage>,
            #[serde(skip_serializing_if = "Option::is_none")]
            temperature: Option<f32>,
            #[serde(skip_serializing_if = "Option::is_none")]
            max_tokens: Option<u32>,
            #[serde(skip_serializing_if = "Option::is_none")]
            top_p: Option<f32>,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<ChatChoice>,
            usage: Option<ChatUsage>,
            #[serde(default)]
            model: Option<String>,
        }

        #[derive(Deserialize)]
        struct ChatChoice {
            message: ChatMessage,
            finish_reason: Option<String>,
        }

        #[derive(Deserialize)]
        struct ChatMessage {
            #[serde(default)]
            content: Option<String>,
        }

        #[derive(Deserialize)]
        struct ChatUsage {
            prompt_tokens: u32,
            completion_tokens: u32,
        }

        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| LLMError::AuthError("No API key configured".to_string()))?;

        let chat_request = ChatRequest {
            model: request.model.clone(),
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&chat_request)
            .send()
            .await
            .map_err(LLMError::from_transport)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Unavailable(format!("Failed to parse response: {}", e)))?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::Unavailable("No choices in response".to_string()))?;

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default().trim().to_string(),
            model: chat_response.model.unwrap_or(request.model),
            prompt_tokens: chat_response.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: chat_response.usage.as_ref().map(|u| u.completion_tokens),
            finish_reason: choice.finish_reason,
        })
    }

    fn name(&self) -> &str {
        &self.config.provider
    }
}
