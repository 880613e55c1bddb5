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

use crate::models::{DirectEndpoints, LLMConfig, ModelFamily, RoutingTable};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_env_field::EnvField;
use std::net::{AddrParseError, IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Arguments {
    #[arg(
        short = 'c',
        long = "config",
        help = "Path to configuration file",
        default_value = "server/config.yaml"
    )]
    pub config_file: String,

    #[arg(
        short = 'e',
        long = "env",
        help = "Path to environment file",
        default_value = "server/.env"
    )]
    pub env_file: Option<String>,
}

impl Default for Arguments {
    fn default() -> Self {
        Self {
            config_file: "config.yaml".to_string(),
            env_file: Some(".env".to_string()),
        }
    }
}

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to open config file: {0}")]
    Open(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub listener: ListenerConfig,

    #[serde(default)]
    pub gate: GateConfig,

    #[serde(default)]
    pub prompts: PromptConfig,

    #[serde(default)]
    pub providers: ProviderConfig,
}

impl Configuration {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        tracing::debug!("Loading configuration from file: {}", path);
        let file = std::fs::File::open(path)?;
        let conf = serde_yaml::from_reader(file)?;
        Ok(conf)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default)]
    pub addr: EnvField<ListenerBinding>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListenerBinding(SocketAddr);

impl ListenerBinding {
    pub fn to_addr(&self) -> SocketAddr {
        self.0
    }
    pub fn to_ip(&self) -> IpAddr {
        self.0.ip()
    }
    pub fn to_port(&self) -> u16 {
        self.0.port()
    }
}

impl FromStr for ListenerBinding {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        tracing::debug!("Parsing listener binding from string: {}", s);
        Ok(Self(SocketAddr::from_str(s)?))
    }
}

impl Default for ListenerBinding {
    fn default() -> Self {
        Self(SocketAddr::V4(SocketAddrV4::new(
            Ipv4Addr::new(0, 0, 0, 0),
            25005,
        )))
    }
}

impl std::fmt::Display for ListenerBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request gate settings
#[derive(Debug, Serialize, Deserialize)]
pub struct GateConfig {
    /// Minimum seconds between two accepted requests of one address (default: 3)
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,

    /// Seconds between sweeps of expired ledger entries (default: 60)
    #[serde(default = "default_purge_interval_seconds")]
    pub purge_interval_seconds: u64,
}

fn default_cooldown_seconds() -> u64 {
    3
}

fn default_purge_interval_seconds() -> u64 {
    60
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: default_cooldown_seconds(),
            purge_interval_seconds: default_purge_interval_seconds(),
        }
    }
}

/// Persona prompt settings
#[derive(Debug, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default)]
    pub directory: EnvField<PromptDirectory>,

    /// Seconds a resolved prompt stays cached (default: 300)
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,

    #[serde(default = "default_character")]
    pub default_character: String,

    #[serde(default = "default_language")]
    pub default_language: String,
}

fn default_cache_ttl_seconds() -> u64 {
    300
}

fn default_character() -> String {
    "Crazy Mita".to_string()
}

fn default_language() -> String {
    "RU".to_string()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            directory: Default::default(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
            default_character: default_character(),
            default_language: default_language(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptDirectory(String);

impl PromptDirectory {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for PromptDirectory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl Default for PromptDirectory {
    fn default() -> Self {
        Self(String::from("prompts"))
    }
}

impl std::fmt::Display for PromptDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provider backends and routing
#[derive(Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Per-call ceiling in seconds; elapsing it advances the fallback chain (default: 20)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Family used when a request names none (default: gemini)
    #[serde(default = "default_model")]
    pub default_model: ModelFamily,

    #[serde(default)]
    pub relay: RelayConfig,

    /// Direct provider endpoints used with caller credentials
    #[serde(default)]
    pub endpoints: DirectEndpoints,

    #[serde(default)]
    pub routes: RoutingTable,
}

fn default_timeout_seconds() -> u64 {
    20
}

fn default_model() -> ModelFamily {
    ModelFamily::Gemini
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            default_model: default_model(),
            relay: RelayConfig::default(),
            endpoints: DirectEndpoints::default(),
            routes: RoutingTable::default(),
        }
    }
}

/// Shared intermediary used when a request carries no credential
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub endpoint: EnvField<RelayEndpoint>,

    /// Service token; empty disables relay mode
    #[serde(default)]
    pub token: EnvField<RelayToken>,
}

impl RelayConfig {
    /// Connection settings, or `None` when no token is configured
    pub fn to_llm_config(&self) -> Option<LLMConfig> {
        let token = self.token.as_str().trim();
        if token.is_empty() {
            None
        } else {
            Some(LLMConfig::relay(self.endpoint.as_str(), token))
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RelayEndpoint(String);

impl RelayEndpoint {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for RelayEndpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl Default for RelayEndpoint {
    fn default() -> Self {
        Self(String::from("http://127.0.0.1:8080/v1/chat/completions"))
    }
}

impl std::fmt::Display for RelayEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default, Serialize, Deserialize)]
pub struct RelayToken(String);

impl RelayToken {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for RelayToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl FromStr for RelayToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl std::fmt::Debug for RelayToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RelayToken({})", self)
    }
}

impl std::fmt::Display for RelayToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            write!(f, "<unset>")
        } else {
            write!(f, "<redacted>")
        }
    }
}
