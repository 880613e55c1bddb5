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

//! LLM provider integration, candidate routing and fallback selection

mod providers;
mod routing;
mod selector;
mod types;

pub use providers::{GeminiProvider, LlmProvider, OpenAiProvider};
pub use routing::{
    BackendFactory, Candidate, CandidatePlan, CredentialMode, DirectEndpoints, FallbackRoute,
    FamilyRoutes, HttpBackends, ModelRoute, ProviderChoice, RoutingTable,
};
pub use selector::{ProviderSelector, QuotaBreaker, Selection, SelectionError};
pub use types::{
    LLMConfig, LLMError, LLMMessage, LLMRequest, LLMResponse, LLMRole, ModelFamily,
    SamplingConfig,
};
