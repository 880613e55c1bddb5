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

//! `/ask` request and response bodies

use crate::directive::Directive;
use serde::{Deserialize, Deserializer, Serialize};

/// Body of a `POST /ask` request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AskRequest {
    /// New user utterance; may be omitted when events are supplied
    #[serde(default)]
    pub prompt: Option<String>,

    /// Prior turns of the conversation, oldest first
    #[serde(default, deserialize_with = "null_as_default")]
    pub history: Vec<HistoryEntry>,

    /// System-originated notifications that replace the prompt for this request
    #[serde(default, deserialize_with = "null_as_default")]
    pub events: Vec<String>,

    /// Language code of the persona prompt (case-insensitive)
    #[serde(default)]
    pub lang: Option<String>,

    /// Model family to route to (`gemini`, `openai`, `mistral`)
    #[serde(default)]
    pub model: Option<String>,

    /// Persona name
    #[serde(default)]
    pub character: Option<String>,

    /// Caller-supplied provider credential; enables direct-provider mode
    #[serde(default, rename = "customAPI")]
    pub custom_api: Option<String>,
}

impl AskRequest {
    /// The prompt with surrounding whitespace removed, if any text remains
    pub fn trimmed_prompt(&self) -> Option<&str> {
        self.prompt
            .as_deref()
            .map(str::trim)
            .filter(|prompt| !prompt.is_empty())
    }

    /// The custom credential, ignoring blank strings
    pub fn credential(&self) -> Option<&str> {
        self.custom_api
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// One entry of the client-kept conversation history
///
/// Clients send either a paired exchange or a single role-tagged message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HistoryEntry {
    /// A single message tagged with its role (`user`, `assistant`, `system`, `event`)
    Message { role: String, content: String },
    /// One exchange; either side may be missing
    Exchange {
        #[serde(default)]
        user: Option<String>,
        #[serde(default)]
        assistant: Option<String>,
    },
}

impl HistoryEntry {
    /// Create a paired exchange
    pub fn exchange(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        HistoryEntry::Exchange {
            user: Some(user.into()),
            assistant: Some(assistant.into()),
        }
    }

    /// Create a role-tagged message
    pub fn message(role: impl Into<String>, content: impl Into<String>) -> Self {
        HistoryEntry::Message {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Body of a successful `POST /ask` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    /// Human-readable reply with directives removed
    pub response: String,

    /// Directive fields, flattened into the top-level object
    #[serde(flatten)]
    pub directive: Directive,

    /// Model that produced the reply
    #[serde(default)]
    pub model_used: Option<String>,
}

/// Error envelope returned with every non-2xx status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error message
    pub error: String,

    /// Cooldown window in seconds, set on 429 responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<u64>,

    /// Seconds left until the caller is admitted again, set on 429 responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            cooldown: None,
            retry_after: None,
        }
    }

    /// Body of a throttled request
    pub fn cooling_down(error: impl Into<String>, cooldown: u64, retry_after: u64) -> Self {
        Self {
            error: error.into(),
            cooldown: Some(cooldown),
            retry_after: Some(retry_after),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
