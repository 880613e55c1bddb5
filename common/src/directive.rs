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

//! Directive data types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Action requested by the model
///
/// Serialized untagged so clients see either a bare string or a list, the same
/// shape the model wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Action {
    /// A single action token
    Single(String),
    /// An ordered list of actions
    ///
    /// Lists written by the model as JSON arrays are kept verbatim, so elements
    /// are not guaranteed to be strings.
    Sequence(Vec<Value>),
}

impl Action {
    /// Build a sequence from plain string tokens
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Action::Sequence(
            tokens
                .into_iter()
                .map(|token| Value::String(token.into()))
                .collect(),
        )
    }
}

/// Structured control payload embedded by a model in its reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    /// Action(s) the character should perform
    pub action: Option<Action>,
    /// Facial expression of the character
    pub face: Option<String>,
    /// Facial expression imposed on the player
    pub player_face: Option<String>,
    /// Navigation target
    pub goto: Option<String>,
}

impl Directive {
    /// True when no field was captured
    pub fn is_empty(&self) -> bool {
        self.action.is_none()
            && self.face.is_none()
            && self.player_face.is_none()
            && self.goto.is_none()
    }
}
