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

//! Mita Relay Common Types
//!
//! This crate defines the wire types exchanged between game clients and the relay:
//! - The `/ask` request body, including conversation history and events
//! - The `/ask` response body and the error envelope
//! - The directive a model embeds in its reply (action, facial expressions, navigation)

pub mod ask;
pub mod directive;

pub use ask::{AskRequest, AskResponse, ErrorBody, HistoryEntry};
pub use directive::{Action, Directive};
