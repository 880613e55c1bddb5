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

//! Persona prompt resolution
//!
//! Prompts live on disk as `<directory>/<character>/<LANG>.txt`. A missing
//! language falls back to `EN.txt`; a missing character yields an empty
//! persona and a warning, never an error.

use metrics::counter;
use moka::future::Cache;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Language used when the requested one has no prompt file
pub const FALLBACK_LANGUAGE: &str = "EN";

/// Cached lookup of persona prompts
#[derive(Clone)]
pub struct PersonaStore {
    directory: PathBuf,
    cache: Cache<(String, String), Arc<str>>,
}

impl std::fmt::Debug for PersonaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonaStore")
            .field("directory", &self.directory)
            .field("cache", &"Cache<(String, String), Arc<str>>")
            .finish()
    }
}

impl PersonaStore {
    /// Create a store over `directory`; resolved prompts live for `ttl`
    pub fn new(directory: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            directory: directory.into(),
            cache: Cache::builder().max_capacity(256).time_to_live(ttl).build(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Persona text for a character in a language, or `""` when none exists
    pub async fn resolve(&self, character: &str, language: &str) -> Arc<str> {
        let character = character.trim();
        let language = language.trim().to_ascii_uppercase();
        let key = (character.to_string(), language.clone());

        if let Some(cached) = self.cache.get(&key).await {
            counter!("persona.cache.hits").increment(1);
            return cached;
        }
        counter!("persona.cache.misses").increment(1);

        let persona: Arc<str> = match self.load(character, &language).await {
            Some(text) => Arc::from(text),
            None => {
                tracing::warn!(
                    "No persona prompt for '{}' in '{}' or '{}', continuing without one",
                    character,
                    language,
                    FALLBACK_LANGUAGE
                );
                Arc::from("")
            }
        };

        self.cache.insert(key, Arc::clone(&persona)).await;
        persona
    }

    async fn load(&self, character: &str, language: &str) -> Option<String> {
        if !is_plain_name(character) {
            tracing::warn!("Rejected persona character name '{}'", character);
            return None;
        }
        let character_dir = self.directory.join(character);

        if is_plain_name(language) {
            if let Some(text) = read_prompt(&character_dir.join(format!("{}.txt", language))).await {
                return Some(text);
            }
        }
        if language != FALLBACK_LANGUAGE {
            tracing::debug!(
                "No '{}' prompt for '{}', trying '{}'",
                language,
                character,
                FALLBACK_LANGUAGE
            );
            return read_prompt(&character_dir.join(format!("{}.txt", FALLBACK_LANGUAGE))).await;
        }
        None
    }
}

/// A single path segment with no separators or parent references
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\', '\0'])
        && !name.contains("..")
        && Path::new(name).is_relative()
}

async fn read_prompt(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Some(text),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!("Failed to read persona prompt {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn prompts() -> TempDir {
        let dir = TempDir::new().unwrap();
        let mita = dir.path().join("Crazy Mita");
        fs::create_dir_all(&mita).unwrap();
        fs::write(mita.join("RU.txt"), "Ты Мита.").unwrap();
        fs::write(mita.join("EN.txt"), "You are Mita.").unwrap();

        let kind = dir.path().join("Kind Mita");
        fs::create_dir_all(&kind).unwrap();
        fs::write(kind.join("RU.txt"), "Ты добрая Мита.").unwrap();
        dir
    }

    fn store(dir: &TempDir) -> PersonaStore {
        PersonaStore::new(dir.path(), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_resolves_requested_language() {
        let dir = prompts();
        let store = store(&dir);
        assert_eq!(&*store.resolve("Crazy Mita", "ru").await, "Ты Мита.");
        assert_eq!(&*store.resolve("Crazy Mita", "EN").await, "You are Mita.");
    }

    #[tokio::test]
    async fn test_falls_back_to_english() {
        let dir = prompts();
        let store = store(&dir);
        assert_eq!(&*store.resolve("Crazy Mita", "DE").await, "You are Mita.");
    }

    #[tokio::test]
    async fn test_missing_prompt_is_empty() {
        let dir = prompts();
        let store = store(&dir);
        assert_eq!(&*store.resolve("Kind Mita", "DE").await, "");
        assert_eq!(&*store.resolve("Nobody", "RU").await, "");
    }

    #[tokio::test]
    async fn test_path_traversal_is_missing() {
        let dir = prompts();
        fs::write(dir.path().join("EN.txt"), "outside").unwrap();
        let store = store(&dir);
        assert_eq!(&*store.resolve("..", "EN").await, "");
        assert_eq!(&*store.resolve("Crazy Mita/..", "EN").await, "");
        assert_eq!(&*store.resolve("Crazy Mita", "../../EN").await, "You are Mita.");
    }

    #[tokio::test]
    async fn test_resolved_prompts_are_cached() {
        let dir = prompts();
        let store = store(&dir);
        assert_eq!(&*store.resolve("Crazy Mita", "RU").await, "Ты Мита.");

        fs::write(dir.path().join("Crazy Mita").join("RU.txt"), "Changed").unwrap();
        assert_eq!(&*store.resolve("Crazy Mita", "RU").await, "Ты Мита.");
    }

    #[test]
    fn test_plain_names() {
        assert!(is_plain_name("Crazy Mita"));
        assert!(is_plain_name("EN"));
        assert!(!is_plain_name(""));
        assert!(!is_plain_name("a/b"));
        assert!(!is_plain_name("a\\b"));
        assert!(!is_plain_name(".."));
        assert!(!is_plain_name("/etc"));
    }
}
