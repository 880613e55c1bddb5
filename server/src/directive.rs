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

//! Directive extraction
//!
//! Models are instructed to embed small JSON objects such as
//! `{"action":"wave","face":"smile"}` inside their free-text replies. This
//! module finds those fragments, folds them into a single [`Directive`] and
//! returns the reply with the fragments cut out.
//!
//! Merge rules across fragments, in text order:
//! - `action` is replaced whenever a fragment has the key; `null` clears it.
//!   Strings split on commas; blank pieces are dropped, a lone token stays a
//!   single token and a string with no tokens leaves the action as it was.
//! - `face`, `player_face` and `goto` are replaced only by a non-empty string.
//!
//! Fragments that are not valid JSON objects, or that carry none of the
//! directive keys, are left in the text untouched.

use mita_relay_common::{Action, Directive};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Shortest brace pair with no brace inside; `[^{}]` also spans line breaks.
static FRAGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^{}]*\}").expect("fragment regex"));

const HORIZONTAL_SPACE: [char; 2] = [' ', '\t'];

const DIRECTIVE_KEYS: [&str; 5] = ["action", "face", "facial expression", "player_face", "goto"];

/// Split raw model output into its directive and the user-facing text
///
/// Never fails. The returned text is trimmed and may be empty.
pub fn extract(raw: &str) -> (Directive, String) {
    let mut directive = Directive::default();
    let mut cleaned = raw.to_string();

    for fragment in FRAGMENT.find_iter(raw) {
        let fragment = fragment.as_str();
        let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(fragment) else {
            continue;
        };
        if !DIRECTIVE_KEYS.iter().any(|key| fields.contains_key(*key)) {
            continue;
        }
        merge(&mut directive, &fields);
        cleaned = remove_first(&cleaned, fragment);
    }

    (directive, cleaned.trim().to_string())
}

fn merge(directive: &mut Directive, fields: &Map<String, Value>) {
    if let Some(action) = fields.get("action") {
        match action {
            Value::String(text) => {
                let tokens: Vec<&str> = text
                    .split(',')
                    .map(str::trim)
                    .filter(|token| !token.is_empty())
                    .collect();
                match tokens.len() {
                    0 => {}
                    1 => directive.action = Some(Action::Single(tokens[0].to_string())),
                    _ => directive.action = Some(Action::from_tokens(tokens)),
                }
            }
            Value::Array(items) => directive.action = Some(Action::Sequence(items.clone())),
            Value::Null => directive.action = None,
            Value::Bool(_) | Value::Number(_) => {
                directive.action = Some(Action::Single(action.to_string()))
            }
            Value::Object(_) => {}
        }
    }

    if let Some(face) = non_empty(fields, "face").or_else(|| non_empty(fields, "facial expression")) {
        directive.face = Some(face);
    }
    if let Some(player_face) = non_empty(fields, "player_face") {
        directive.player_face = Some(player_face);
    }
    if let Some(goto) = non_empty(fields, "goto") {
        directive.goto = Some(goto);
    }
}

fn non_empty(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Cut the first occurrence of `fragment`, leaving one space at the seam when
/// it sat between two words on the same line
fn remove_first(text: &str, fragment: &str) -> String {
    let Some(start) = text.find(fragment) else {
        return text.to_string();
    };
    let before = &text[..start];
    let after = &text[start + fragment.len()..];
    let head = before.trim_end_matches(HORIZONTAL_SPACE);
    let tail = after.trim_start_matches(HORIZONTAL_SPACE);

    let had_space = head.len() != before.len() || tail.len() != after.len();
    let same_line = !head.is_empty()
        && !tail.is_empty()
        && !head.ends_with(['\n', '\r'])
        && !tail.starts_with(['\n', '\r']);

    let mut joined = String::with_capacity(head.len() + tail.len() + 1);
    joined.push_str(head);
    if had_space && same_line {
        joined.push(' ');
    }
    joined.push_str(tail);
    joined
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_fragments() {
        let (directive, text) = extract("  Just talking, nothing else.  ");
        assert!(directive.is_empty());
        assert_eq!(text, "Just talking, nothing else.");
    }

    #[test]
    fn test_comma_action_and_face() {
        let (directive, text) =
            extract(r#"Hi! {"action":"wave,smile","face":"happy"} bye"#);
        assert_eq!(directive.action, Some(Action::from_tokens(["wave", "smile"])));
        assert_eq!(directive.face.as_deref(), Some("happy"));
        assert_eq!(directive.player_face, None);
        assert_eq!(directive.goto, None);
        assert_eq!(text, "Hi! bye");
    }

    #[test]
    fn test_sequential_fragments_keep_earlier_face() {
        let (directive, text) = extract(r#"{"face":"happy"}{"action":"cry"}"#);
        assert_eq!(directive.face.as_deref(), Some("happy"));
        assert_eq!(directive.action, Some(Action::Single("cry".to_string())));
        assert_eq!(text, "");
    }

    #[test]
    fn test_array_action_kept_verbatim() {
        let (directive, _) = extract(r#"{"action":[1,2]}"#);
        assert_eq!(directive.action, Some(Action::Sequence(vec![json!(1), json!(2)])));
    }

    #[test]
    fn test_unterminated_fragment_is_kept() {
        let (directive, text) = extract(r#"Oh no {"face":"sad""#);
        assert!(directive.is_empty());
        assert_eq!(text, r#"Oh no {"face":"sad""#);
    }

    #[test]
    fn test_invalid_and_non_object_fragments_ignored() {
        let (directive, text) = extract(r#"A set {1, 2} and {"goto":"kitchen"} done"#);
        assert_eq!(directive.goto.as_deref(), Some("kitchen"));
        assert_eq!(text, "A set {1, 2} and done");
    }

    #[test]
    fn test_later_fragment_overrides_only_with_value() {
        let (directive, _) = extract(
            r#"{"face":"happy","goto":"hall"} {"face":"angry","goto":""} {"player_face":"scared"}"#,
        );
        assert_eq!(directive.face.as_deref(), Some("angry"));
        assert_eq!(directive.goto.as_deref(), Some("hall"));
        assert_eq!(directive.player_face.as_deref(), Some("scared"));
    }

    #[test]
    fn test_facial_expression_alias() {
        let (directive, _) = extract(r#"{"facial expression":"smirk"}"#);
        assert_eq!(directive.face.as_deref(), Some("smirk"));

        let (directive, _) = extract(r#"{"face":"","facial expression":"smirk"}"#);
        assert_eq!(directive.face.as_deref(), Some("smirk"));
    }

    #[test]
    fn test_last_action_wins_and_null_clears() {
        let (directive, _) = extract(r#"{"action":"wave"} {"action":"jump, run"}"#);
        assert_eq!(directive.action, Some(Action::from_tokens(["jump", "run"])));

        let (directive, _) = extract(r#"{"action":"wave"} {"action":null}"#);
        assert_eq!(directive.action, None);
    }

    #[test]
    fn test_comma_action_drops_blank_pieces() {
        let (directive, _) = extract(r#"{"action":"wave,"}"#);
        assert_eq!(directive.action, Some(Action::Single("wave".to_string())));

        let (directive, text) = extract(r#"Hm {"action":","} ok"#);
        assert_eq!(directive.action, None);
        assert_eq!(text, "Hm ok");

        let (directive, _) = extract(r#"{"action":"wave"} {"action":" , "}"#);
        assert_eq!(directive.action, Some(Action::Single("wave".to_string())));
    }

    #[test]
    fn test_nested_payload_is_left_in_text() {
        let raw = r#"Sure {"action":"wave","extra":{"k":1}} ok"#;
        let (directive, text) = extract(raw);
        assert!(directive.is_empty());
        assert_eq!(text, raw);
    }

    #[test]
    fn test_object_without_directive_keys_is_kept() {
        let (directive, text) = extract(r#"Config {"volume":3} and {"face":"calm"} done"#);
        assert_eq!(directive.face.as_deref(), Some("calm"));
        assert_eq!(text, r#"Config {"volume":3} and done"#);
    }

    #[test]
    fn test_scalar_action_becomes_token() {
        let (directive, _) = extract(r#"{"action":3}"#);
        assert_eq!(directive.action, Some(Action::Single("3".to_string())));
    }

    #[test]
    fn test_multiline_fragment() {
        let (directive, text) = extract("Look!\n{\n  \"action\": \"point\"\n}\nThere.");
        assert_eq!(directive.action, Some(Action::Single("point".to_string())));
        assert_eq!(text, "Look!\n\nThere.");
    }

    #[test]
    fn test_only_first_occurrence_removed() {
        let raw = r#"{"goto":"door"} and {"goto":"door"}"#;
        let (_, text) = extract(raw);
        assert_eq!(text, "and");

        assert_eq!(remove_first("x {a} y {a}", "{a}"), "x y {a}");
    }

    #[test]
    fn test_seam_without_space_is_not_padded() {
        assert_eq!(remove_first("ab{x}cd", "{x}"), "abcd");
        assert_eq!(remove_first("line\n{x} next", "{x}"), "line\nnext");
    }
}
