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

//! Model output cleanup applied before directive extraction

use once_cell::sync::Lazy;
use regex::Regex;

/// Emoji sequences: a pictographic base or regional indicator with any
/// trailing presentation selectors, skin-tone modifiers, keycap marks and
/// ZWJ-joined continuations. Keycap digits and stray selectors are matched
/// on their own.
static EMOJI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?:\p{Extended_Pictographic}|[\x{1F1E6}-\x{1F1FF}])",
        r"(?:[\x{FE0F}\x{20E3}\p{Emoji_Modifier}]|\x{200D}\p{Extended_Pictographic})*",
        r"|[#*0-9]\x{FE0F}?\x{20E3}",
        r"|[\x{FE0F}\x{20E3}]",
    ))
    .expect("emoji regex")
});

/// Markdown fence delimiter with an optional language tag
static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[A-Za-z0-9_+\-]*").expect("fence regex"));

/// Strip emoji and Markdown code fences from raw model output
///
/// Fenced content is kept, so a directive wrapped in a ```` ```json ```` block
/// is still found by the extractor.
pub fn sanitize(raw: &str) -> String {
    let without_emoji = EMOJI.replace_all(raw, "");
    FENCE.replace_all(&without_emoji, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fences_removed() {
        let cleaned = sanitize("```json\n{\"a\":1}\n```");
        assert_eq!(cleaned, "\n{\"a\":1}\n");
        assert_eq!(cleaned.trim(), "{\"a\":1}");
    }

    #[test]
    fn test_bare_fence_removed() {
        assert_eq!(sanitize("```\nplain\n```"), "\nplain\n");
    }

    #[test]
    fn test_emoji_removed_exactly() {
        assert_eq!(sanitize("hi😀there"), "hithere");
        assert_eq!(sanitize("Hello 👋 world"), "Hello  world");
    }

    #[test]
    fn test_emoji_sequences_removed_whole() {
        assert_eq!(sanitize("a👍🏽b"), "ab");
        assert_eq!(sanitize("a👩\u{200D}💻b"), "ab");
        assert_eq!(sanitize("a❤\u{FE0F}b"), "ab");
        assert_eq!(sanitize("a🇺🇦b"), "ab");
        assert_eq!(sanitize("a1\u{FE0F}\u{20E3}b"), "ab");
    }

    #[test]
    fn test_other_scripts_untouched() {
        let text = "Привет, игрок! Ты 2 раза #1 {\"face\":\"smile\"}";
        assert_eq!(sanitize(text), text);
    }

    #[test]
    fn test_fenced_directive_with_emoji() {
        let raw = "Come here 😈\n```json\n{\"action\":\"wave\"}\n```";
        assert_eq!(sanitize(raw), "Come here \n\n{\"action\":\"wave\"}\n");
    }
}
