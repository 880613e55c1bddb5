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

//! Common types for LLM integration
//!
//! Messages, requests and responses exchanged with completion providers, the
//! provider error taxonomy, and the model families the relay can route to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Role of a message in an LLM conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMRole {
    /// Persona and behaviour instructions
    System,
    /// Player speech or tagged game events
    User,
    /// Earlier replies of the character
    Assistant,
}

impl fmt::Display for LLMRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LLMRole::System => write!(f, "system"),
            LLMRole::User => write!(f, "user"),
            LLMRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LLMMessage {
    pub role: LLMRole,
    pub content: String,
}

impl LLMMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: LLMRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: LLMRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: LLMRole::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling parameters sent with every completion
///
/// These are per-family constants taken from configuration, never from the
/// calling client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Temperature (0.0 - 2.0, higher = more random)
    pub temperature: f32,
    /// Nucleus sampling threshold
    pub top_p: f32,
    /// Maximum tokens to generate
    pub max_tokens: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_p: 0.9,
            max_tokens: 400,
        }
    }
}

/// LLM request parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLMRequest {
    /// Conversation history
    pub messages: Vec<LLMMessage>,
    /// Model to use (provider-specific)
    pub model: String,
    /// Temperature (0.0 - 2.0, higher = more random)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Top-p sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl LLMRequest {
    /// Create a new LLM request
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
            top_p: None,
        }
    }

    /// Add a message to the request
    pub fn with_message(mut self, message: LLMMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Add multiple messages
    pub fn with_messages(mut self, messages: impl IntoIterator<Item = LLMMessage>) -> Self {
        self.messages.extend(messages);
        self
    }

    /// Apply all sampling parameters at once
    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.temperature = Some(sampling.temperature);
        self.top_p = Some(sampling.top_p);
        self.max_tokens = Some(sampling.max_tokens);
        self
    }

    /// Leading system messages joined into one instruction block
    ///
    /// Providers without a system role in their message list take persona
    /// text through a separate field.
    pub fn system_instruction(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == LLMRole::System)
            .map(|m| m.content.as_str())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}

/// LLM response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLMResponse {
    /// Generated content
    pub content: String,
    /// Model used
    pub model: String,
    /// Tokens used in prompt
    pub prompt_tokens: Option<u32>,
    /// Tokens generated
    pub completion_tokens: Option<u32>,
    /// Finish reason
    pub finish_reason: Option<String>,
}

impl LLMResponse {
    /// Create a new response
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            prompt_tokens: None,
            completion_tokens: None,
            finish_reason: None,
        }
    }
}

/// Errors reported by completion providers
///
/// Only [`LLMError::QuotaExceeded`] and [`LLMError::Timeout`] are transient; the
/// fallback chain advances on those and stops on everything else.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LLMError {
    /// The provider refused the call because of rate or usage limits
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The provider rejected the request as malformed
    #[error("Invalid request: {0}")]
    RequestInvalid(String),

    /// The provider could not be reached or failed internally
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// The per-call timeout elapsed
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The credential was rejected
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// The provider is misconfigured
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl LLMError {
    /// Whether the fallback chain may advance past this failure
    pub fn is_transient(&self) -> bool {
        matches!(self, LLMError::QuotaExceeded(_) | LLMError::Timeout(_))
    }

    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            LLMError::QuotaExceeded(_) => "quota",
            LLMError::RequestInvalid(_) => "invalid",
            LLMError::Unavailable(_) => "unavailable",
            LLMError::Timeout(_) => "timeout",
            LLMError::AuthError(_) => "auth",
            LLMError::ConfigError(_) => "config",
        }
    }

    /// Classify a transport-level failure
    pub fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            LLMError::Timeout(error.to_string())
        } else {
            LLMError::Unavailable(format!("Request failed: {}", error))
        }
    }

    /// Classify a non-success HTTP status and its body
    ///
    /// Providers signal quota exhaustion with 429 and, for Gemini, with a
    /// `RESOURCE_EXHAUSTED` status string that may arrive under other codes.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = format!("API returned {}: {}", status, body);
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || body.contains("RESOURCE_EXHAUSTED")
            || body.contains("ResourceExhausted")
        {
            LLMError::QuotaExceeded(message)
        } else if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            LLMError::AuthError(message)
        } else if status == reqwest::StatusCode::REQUEST_TIMEOUT
            || status == reqwest::StatusCode::GATEWAY_TIMEOUT
        {
            LLMError::Timeout(message)
        } else if status.is_client_error() {
            LLMError::RequestInvalid(message)
        } else {
            LLMError::Unavailable(message)
        }
    }
}

/// Connection settings of one provider backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Backend label used in logs and `model_used` reporting
    pub provider: String,
    /// API endpoint URL (full chat-completions URL, or the Gemini models base URL)
    pub endpoint: String,
    /// API key or service token
    pub api_key: Option<String>,
    /// Per-call timeout in seconds; elapsing it is a transient failure
    pub timeout_seconds: u64,
}

impl LLMConfig {
    /// OpenAI chat completions
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            provider: "openai".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: Some(api_key.into()),
            timeout_seconds: 20,
        }
    }

    /// Mistral chat completions (OpenAI-compatible)
    pub fn mistral(api_key: impl Into<String>) -> Self {
        Self {
            provider: "mistral".to_string(),
            endpoint: "https://api.mistral.ai/v1/chat/completions".to_string(),
            api_key: Some(api_key.into()),
            timeout_seconds: 20,
        }
    }

    /// Google Gemini `generateContent`
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self {
            provider: "gemini".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            api_key: Some(api_key.into()),
            timeout_seconds: 20,
        }
    }

    /// Shared OpenAI-compatible intermediary reached with a service token
    pub fn relay(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            provider: "relay".to_string(),
            endpoint: endpoint.into(),
            api_key: Some(token.into()),
            timeout_seconds: 20,
        }
    }

    /// Override the endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Override the per-call timeout
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }
}

/// Family of models a client can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    Gemini,
    OpenAi,
    Mistral,
}

impl ModelFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::Gemini => "gemini",
            ModelFamily::OpenAi => "openai",
            ModelFamily::Mistral => "mistral",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ModelFamily::Gemini),
            "openai" => Ok(ModelFamily::OpenAi),
            "mistral" => Ok(ModelFamily::Mistral),
            other => Err(format!("Invalid model choice: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_message_creation() {
        let system_msg = LLMMessage::system("You are Mita");
        assert_eq!(system_msg.role, LLMRole::System);

        let user_msg = LLMMessage::user("Hello!");
        assert_eq!(user_msg.role, LLMRole::User);

        let assistant_msg = LLMMessage::assistant("Hi there!");
        assert_eq!(assistant_msg.role, LLMRole::Assistant);
    }

    #[test]
    fn test_llm_request_builder() {
        let request = LLMRequest::new("gpt-4o-mini")
            .with_message(LLMMessage::system("You are Mita"))
            .with_message(LLMMessage::user("Hello"))
            .with_sampling(SamplingConfig {
                temperature: 0.7,
                top_p: 0.9,
                max_tokens: 100,
            });

        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.top_p, Some(0.9));
        assert_eq!(request.max_tokens, Some(100));
    }

    #[test]
    fn test_system_instruction_joins_system_turns() {
        let request = LLMRequest::new("gemini-2.0-flash")
            .with_message(LLMMessage::system("First"))
            .with_message(LLMMessage::user("Hello"))
            .with_message(LLMMessage::system("Second"));
        assert_eq!(request.system_instruction().as_deref(), Some("First\n\nSecond"));

        let bare = LLMRequest::new("gemini-2.0-flash").with_message(LLMMessage::user("Hello"));
        assert!(bare.system_instruction().is_none());
    }

    #[test]
    fn test_status_classification() {
        use reqwest::StatusCode;

        assert!(matches!(
            LLMError::from_status(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            LLMError::QuotaExceeded(_)
        ));
        assert!(matches!(
            LLMError::from_status(
                StatusCode::SERVICE_UNAVAILABLE,
                r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#
            ),
            LLMError::QuotaExceeded(_)
        ));
        assert!(matches!(
            LLMError::from_status(StatusCode::BAD_REQUEST, "bad"),
            LLMError::RequestInvalid(_)
        ));
        assert!(matches!(
            LLMError::from_status(StatusCode::UNAUTHORIZED, "who"),
            LLMError::AuthError(_)
        ));
        assert!(matches!(
            LLMError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "oops"),
            LLMError::Unavailable(_)
        ));
    }

    #[test]
    fn test_transient_errors() {
        assert!(LLMError::QuotaExceeded(String::new()).is_transient());
        assert!(LLMError::Timeout(String::new()).is_transient());
        assert!(!LLMError::RequestInvalid(String::new()).is_transient());
        assert!(!LLMError::Unavailable(String::new()).is_transient());
        assert!(!LLMError::AuthError(String::new()).is_transient());
    }

    #[test]
    fn test_llm_config() {
        let openai = LLMConfig::openai("sk-test");
        assert_eq!(openai.provider, "openai");
        assert!(openai.api_key.is_some());

        let relay = LLMConfig::relay("http://localhost:8000/v1/chat/completions", "token")
            .with_timeout(5);
        assert_eq!(relay.provider, "relay");
        assert_eq!(relay.timeout_seconds, 5);
    }

    #[test]
    fn test_model_family_parsing() {
        assert_eq!("gemini".parse::<ModelFamily>(), Ok(ModelFamily::Gemini));
        assert_eq!("OpenAI".parse::<ModelFamily>(), Ok(ModelFamily::OpenAi));
        assert_eq!(" Mistral ".parse::<ModelFamily>(), Ok(ModelFamily::Mistral));
        assert!("claude".parse::<ModelFamily>().is_err());
    }
}
