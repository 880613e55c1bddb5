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

//! Conversation assembly
//!
//! Turns the client-kept history plus the new prompt or pending events into the
//! ordered, role-tagged message list every provider consumes. The context is
//! built fresh for each request and never stored.

use crate::models::{LLMMessage, LLMRole};
use mita_relay_common::HistoryEntry;

/// Prefix marking a user turn as a game event rather than player speech
pub const EVENT_TAG: &str = "[EVENT]";

/// Ordered turns sent to a provider for one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationContext {
    turns: Vec<LLMMessage>,
}

impl ConversationContext {
    /// Assemble the context for one request
    ///
    /// Order: persona (if any), history, then either the tagged events or the
    /// new prompt. Events take precedence; when any are present the prompt is
    /// dropped.
    pub fn assemble(
        persona: &str,
        history: &[HistoryEntry],
        events: &[String],
        prompt: Option<&str>,
    ) -> Self {
        let mut turns = Vec::with_capacity(history.len() * 2 + events.len() + 2);

        if !persona.trim().is_empty() {
            turns.push(LLMMessage::system(persona));
        }

        for entry in history {
            match entry {
                HistoryEntry::Exchange { user, assistant } => {
                    if let Some(user) = user {
                        turns.push(LLMMessage::user(user.as_str()));
                    }
                    if let Some(assistant) = assistant {
                        turns.push(LLMMessage::assistant(assistant.as_str()));
                    }
                }
                HistoryEntry::Message { role, content } => {
                    match role.trim().to_ascii_lowercase().as_str() {
                        "user" => turns.push(LLMMessage::user(content.as_str())),
                        "assistant" | "model" => {
                            turns.push(LLMMessage::assistant(content.as_str()))
                        }
                        "system" => turns.push(LLMMessage::system(content.as_str())),
                        "event" => turns.push(event_turn(content)),
                        other => {
                            tracing::debug!("Skipping history entry with unknown role '{}'", other)
                        }
                    }
                }
            }
        }

        if !events.is_empty() {
            turns.extend(events.iter().map(|event| event_turn(event)));
        } else if let Some(prompt) = prompt.map(str::trim).filter(|p| !p.is_empty()) {
            turns.push(LLMMessage::user(prompt));
        }

        Self { turns }
    }

    /// All turns in order
    pub fn turns(&self) -> &[LLMMessage] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Whether the context ends with a new user-role turn
    pub fn has_pending_user_turn(&self) -> bool {
        self.turns
            .last()
            .is_some_and(|turn| turn.role == LLMRole::User)
    }
}

fn event_turn(event: &str) -> LLMMessage {
    LLMMessage::user(format!("{} {}", EVENT_TAG, event.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(context: &ConversationContext) -> Vec<LLMRole> {
        context.turns().iter().map(|t| t.role).collect()
    }

    #[test]
    fn test_persona_history_and_prompt() {
        let history = vec![
            HistoryEntry::exchange("Hi", "Hello, player!"),
            HistoryEntry::exchange("Where am I?", "In my house."),
        ];
        let context =
            ConversationContext::assemble("You are Mita", &history, &[], Some("  Let me out "));

        assert_eq!(
            roles(&context),
            vec![
                LLMRole::System,
                LLMRole::User,
                LLMRole::Assistant,
                LLMRole::User,
                LLMRole::Assistant,
                LLMRole::User,
            ]
        );
        assert_eq!(context.turns()[0].content, "You are Mita");
        assert_eq!(context.turns()[5].content, "Let me out");
        assert!(context.has_pending_user_turn());
    }

    #[test]
    fn test_empty_persona_is_omitted() {
        let context = ConversationContext::assemble("   ", &[], &[], Some("Hi"));
        assert_eq!(context.len(), 1);
        assert_eq!(context.turns()[0], LLMMessage::user("Hi"));
    }

    #[test]
    fn test_partial_history_entries() {
        let history = vec![
            HistoryEntry::Exchange {
                user: Some("Only user".to_string()),
                assistant: None,
            },
            HistoryEntry::Exchange {
                user: None,
                assistant: Some("Only assistant".to_string()),
            },
            HistoryEntry::Exchange {
                user: None,
                assistant: None,
            },
        ];
        let context = ConversationContext::assemble("", &history, &[], None);
        assert_eq!(
            context.turns(),
            &[
                LLMMessage::user("Only user"),
                LLMMessage::assistant("Only assistant"),
            ]
        );
    }

    #[test]
    fn test_events_take_precedence_over_prompt() {
        let events = vec!["Player picked up the key".to_string(), "Door opened".to_string()];
        let context = ConversationContext::assemble("", &[], &events, Some("Hello?"));

        assert_eq!(
            context.turns(),
            &[
                LLMMessage::user("[EVENT] Player picked up the key"),
                LLMMessage::user("[EVENT] Door opened"),
            ]
        );
        assert!(context.turns().iter().all(|t| !t.content.contains("Hello?")));
    }

    #[test]
    fn test_neither_events_nor_prompt() {
        let history = vec![HistoryEntry::exchange("Hi", "Hello")];
        let context = ConversationContext::assemble("", &history, &[], None);
        assert_eq!(context.len(), 2);
        assert!(!context.has_pending_user_turn());

        let blank = ConversationContext::assemble("", &history, &[], Some("   "));
        assert_eq!(blank, context);
    }

    #[test]
    fn test_role_tagged_history() {
        let history = vec![
            HistoryEntry::message("user", "Hi"),
            HistoryEntry::message("Assistant", "Hello"),
            HistoryEntry::message("event", "Lights went out"),
            HistoryEntry::message("narrator", "ignored"),
        ];
        let context = ConversationContext::assemble("", &history, &[], Some("Scary"));
        assert_eq!(
            context.turns(),
            &[
                LLMMessage::user("Hi"),
                LLMMessage::assistant("Hello"),
                LLMMessage::user("[EVENT] Lights went out"),
                LLMMessage::user("Scary"),
            ]
        );
    }
}
