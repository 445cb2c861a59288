// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! TAG value escaping.
//!
//! Inside `{...}` the query parser treats punctuation and whitespace as token
//! separators, so every such character is prefixed with a single backslash.

/// Characters escaped inside a TAG clause.
pub const TAG_SPECIAL_CHARS: &[char] = &[
    ',', '.', '<', '>', '{', '}', '[', ']', '"', '\'', ':', ';', '!', '@', '#', '$', '%', '^', '&',
    '*', '(', ')', '-', '+', '=', '~', '|', '/', '\\', '?', ' ',
];

/// Escape a value for insertion into a TAG clause.
pub fn escape_tag(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if TAG_SPECIAL_CHARS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Reverse of [`escape_tag`]: drop one backslash before each escaped character.
pub fn unescape_tag(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_value_untouched() {
        assert_eq!(escape_tag("rust"), "rust");
        assert_eq!(escape_tag("über"), "über");
    }

    #[test]
    fn test_email() {
        assert_eq!(escape_tag("user@example.com"), "user\\@example\\.com");
    }

    #[test]
    fn test_space_and_colon() {
        assert_eq!(escape_tag("12:30 pm"), "12\\:30\\ pm");
    }

    #[test]
    fn test_backslash_escaped_once() {
        assert_eq!(escape_tag("a\\b"), "a\\\\b");
        assert_eq!(unescape_tag("a\\\\b"), "a\\b");
    }

    #[test]
    fn test_every_special_char() {
        let all: String = TAG_SPECIAL_CHARS.iter().collect();
        let escaped = escape_tag(&all);
        assert_eq!(escaped.chars().count(), all.chars().count() * 2);
        assert_eq!(unescape_tag(&escaped), all);
    }
}
