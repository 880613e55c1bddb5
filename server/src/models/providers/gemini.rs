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
use crate::models::{LLMConfig, LLMError, LLMRequest, LLMResponse, LLMRole, LlmProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Google Gemini provider using the REST `generateContent` method
pub struct GeminiProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    pub fn new(config: LLMConfig) -> Result<Self, LLMError> {
        let client = http_client(config.timeout_seconds)?;
        Self::with_client(config, client)
    }

    /// Create a provider that reuses an existing HTTP client
    pub fn with_client(config: LLMConfig, client: reqwest::Client) -> Result<Self, LLMError> {
        if config.api_key.is_none() {
            return Err(LLMError::ConfigError(
                "Gemini requires an API key".to_string(),
            ));
        }
        Ok(Self { config, client })
    }

    /// Translate a role-tagged request into Gemini's content layout
    ///
    /// System turns move to `systemInstruction`; assistant turns use the
    /// `model` role.
    fn to_generate_request(request: &LLMRequest) -> GenerateContentRequest {
        let system_instruction = request.system_instruction().map(|text| Content {
            role: None,
            parts: vec![Part { text }],
        });

        let contents = request
            .messages
            .iter()
            .filter_map(|message| {
                let role = match message.role {
                    LLMRole::System => return None,
                    LLMRole::User => "user",
                    LLMRole::Assistant => "model",
                };
                Some(Content {
                    role: Some(role.to_string()),
                    parts: vec![Part {
                        text: message.content.clone(),
                    }],
                })
            })
            .collect();

        GenerateContentRequest {
            system_instruction,
            contents,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                top_p: request.top_p,
                max_output_tokens: request.max_tokens,
            },
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse, LLMError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| LLMError::AuthError("No API key configured".to_string()))?;

        let url = format!(
            "{}/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            request.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key.as_str())
            .json(&Self::to_generate_request(&request))
            .send()
            .await
            .map_err(LLMError::from_transport)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let generated: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Unavailable(format!("Failed to parse response: {}", e)))?;

        // A blocked or empty candidate is an empty reply, not an error.
        let (content, finish_reason) = match generated.candidates.into_iter().next() {
            Some(candidate) => (
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<String>(),
                candidate.finish_reason,
            ),
            None => (String::new(), None),
        };

        Ok(LLMResponse {
            content: content.trim().to_string(),
            model: request.model,
            prompt_tokens: generated
                .usage_metadata
                .as_ref()
                .and_then(|u| u.prompt_token_count),
            completion_tokens: generated
                .usage_metadata
                .as_ref()
                .and_then(|u| u.candidates_token_count),
            finish_reason,
        })
    }

    fn name(&self) -> &str {
        &self.config.provider
    }
}
