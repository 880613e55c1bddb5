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

//! Mita Relay Server Library
//!
//! This library provides the relay between game clients and LLM providers,
//! including provider fallback, persona lookup, request cooldown and
//! extraction of the directives models embed in their replies.

pub mod config;
pub mod context;
pub mod conversation;
pub mod directive;
pub mod gate;
pub mod models;
pub mod persona;
pub mod relay;
pub mod sanitize;
pub mod test_utils;

// Re-export commonly used types
pub use context::{RelayContext, RequestDefaults};
pub use conversation::ConversationContext;
pub use gate::CooldownLedger;
pub use persona::PersonaStore;
pub use relay::{RelayError, create_router};
