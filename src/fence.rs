// src/fence.rs
//! Best-effort removal of markdown code fences around model output.
//!
//! This is a normalization step, not a markdown parser: malformed fences may
//! pass through partially cleaned.

use regex::Regex;
use std::sync::LazyLock;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[\w+#.-]*[ \t]*\r?\n(.*?)```").expect("fenced block pattern is valid")
});

static OPENING_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^```[\w+#.-]*[ \t]*(?:\r?\n|$)").expect("opening fence pattern is valid")
});

const FENCE: &str = "```";

/// Strips a leading and trailing code fence from `text`, trimming the result.
///
/// A complete fenced block anywhere in the text wins, so prose the model
/// wrapped around the code is dropped as well.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();

    if let Some(caps) = FENCED_BLOCK.captures(trimmed) {
        return caps[1].trim().to_string();
    }

    let mut cleaned = if let Some(m) = OPENING_FENCE.find(trimmed) {
        trimmed[m.end()..].trim()
    } else if let Some(rest) = trimmed.strip_prefix(FENCE) {
        rest.trim()
    } else {
        trimmed
    };

    if let Some(rest) = cleaned.strip_suffix(FENCE) {
        cleaned = rest.trim();
    }

    cleaned.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_code_is_only_trimmed() {
        assert_eq!(
            strip_code_fence("  let a = 1;\nconsole.log(a);\n"),
            "let a = 1;\nconsole.log(a);"
        );
    }

    #[test]
    fn test_language_tagged_fences() {
        let text = "```javascript\nlet total = 0;\nconsole.log(total);\n```";
        assert_eq!(strip_code_fence(text), "let total = 0;\nconsole.log(total);");

        let text = "```js\nconsole.log(1);\n```\n";
        assert_eq!(strip_code_fence(text), "console.log(1);");

        let text = "```typescript\nconsole.log(2);\n```";
        assert_eq!(strip_code_fence(text), "console.log(2);");
    }

    #[test]
    fn test_bare_fence() {
        assert_eq!(strip_code_fence("```\nconsole.log(3);\n```"), "console.log(3);");
    }

    #[test]
    fn test_prose_around_block_is_dropped() {
        let text = "Here is your snippet:\n```js\nlet x = 2;\nconsole.log(x * 2);\n```\nEnjoy!";
        assert_eq!(strip_code_fence(text), "let x = 2;\nconsole.log(x * 2);");
    }

    #[test]
    fn test_unterminated_opening_fence() {
        assert_eq!(strip_code_fence("```js\nconsole.log(4);"), "console.log(4);");
    }

    #[test]
    fn test_inline_fences_without_newline() {
        assert_eq!(strip_code_fence("```console.log(5);```"), "console.log(5);");
    }

    #[test]
    fn test_trailing_fence_only() {
        assert_eq!(strip_code_fence("console.log(6);\n```"), "console.log(6);");
    }
}
