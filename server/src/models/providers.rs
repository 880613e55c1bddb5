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

//! LLM provider implementations

mod gemini;
mod openai;

pub use self::gemini::GeminiProvider;
pub use self::openai::OpenAiProvider;

use super::types::{LLMError, LLMRequest, LLMResponse};
use async_trait::async_trait;

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a request to the LLM
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse, LLMError>;

    /// Get provider name
    fn name(&self) -> &str;
}

/// Build the shared HTTP client for a provider
///
/// The timeout bounds the whole call, connect through body.
pub(crate) fn http_client(timeout_seconds: u64) -> Result<reqwest::Client, LLMError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|e| LLMError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Read a failed response into a classified error
pub(crate) async fn status_error(response: reqwest::Response) -> LLMError {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    LLMError::from_status(status, &error_text)
}

#[cfg(test)]
mod tests {
    use crate::models::{GeminiProvider, LLMConfig, OpenAiProvider};

    #[test]
    fn test_openai_provider_creation() {
        let config = LLMConfig::openai("test-key");
        let provider = OpenAiProvider::new(config);
        assert!(provider.is_ok());
    }

    #[test]
    fn test_openai_provider_requires_api_key() {
        let mut config = LLMConfig::openai("test-key");
        config.api_key = None;
        let provider = OpenAiProvider::new(config);
        assert!(provider.is_err());
    }

    #[test]
    fn test_gemini_provider_creation() {
        let provider = GeminiProvider::new(LLMConfig::gemini("test-key"));
        assert!(provider.is_ok());
    }

    #[test]
    fn test_gemini_provider_requires_api_key() {
        let mut config = LLMConfig::gemini("test-key");
        config.api_key = None;
        assert!(GeminiProvider::new(config).is_err());
    }

    #[test]
    fn test_relay_provider_creation() {
        let config = LLMConfig::relay("http://localhost:8000/v1/chat/completions", "token");
        let provider = OpenAiProvider::new(config);
        assert!(provider.is_ok());
    }
}
