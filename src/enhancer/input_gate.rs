//! Input Gate - validation and markup stripping for user-supplied ideas

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

/// Maximum idea length in characters, measured after trimming
pub const MAX_INPUT_CHARS: usize = 1000;

/// Elements removed together with everything inside them
const SCRIPT_CAPABLE_ELEMENTS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "template",
];

/// Why an input was refused before reaching the provider
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("input is missing or not a string")]
    NotAString,

    #[error("input is empty")]
    Empty,

    #[error("input is {actual} characters, limit is {limit}")]
    TooLong { actual: usize, limit: usize },

    #[error("input contains no text once markup is removed")]
    OnlyMarkup,
}

impl ValidationError {
    /// Text returned to the client for every validation failure
    pub const CLIENT_MESSAGE: &'static str = "Invalid input";
}

/// Strips HTML markup and script-capable content from plain text
#[derive(Debug)]
pub struct HtmlSanitizer {
    blocks: Vec<Regex>,
    comment: Regex,
    tag: Regex,
}

impl HtmlSanitizer {
    pub fn new() -> Result<Self, regex::Error> {
        let blocks = SCRIPT_CAPABLE_ELEMENTS
            .iter()
            .map(|name| Regex::new(&format!(r"(?is)<{name}\b[^>]*>.*?(?:</{name}\s*>|\z)")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            blocks,
            comment: Regex::new(r"(?s)<!--.*?(?:-->|\z)")?,
            // An unterminated trailing tag is still a tag
            tag: Regex::new(r"<(?:[a-zA-Z]|/[a-zA-Z]|[!?])[^>]*(?:>|\z)")?,
        })
    }

    /// Remove markup until the text is stable, then trim
    pub fn sanitize(&self, input: &str) -> String {
        let mut current = input.to_string();
        loop {
            let mut next = current.clone();
            for block in &self.blocks {
                next = block.replace_all(&next, "").into_owned();
            }
            next = self.comment.replace_all(&next, "").into_owned();
            next = self.tag.replace_all(&next, "").into_owned();

            // Every replacement deletes text, so this converges
            if next == current {
                return next.trim().to_string();
            }
            current = next;
        }
    }
}

/// Validates shape and length, then sanitizes
#[derive(Debug)]
pub struct InputGate {
    sanitizer: HtmlSanitizer,
    max_chars: usize,
}

impl InputGate {
    pub fn new() -> Result<Self, regex::Error> {
        Self::with_max_chars(MAX_INPUT_CHARS)
    }

    pub fn with_max_chars(max_chars: usize) -> Result<Self, regex::Error> {
        Ok(Self {
            sanitizer: HtmlSanitizer::new()?,
            max_chars,
        })
    }

    /// Admit the untyped `input` field of a request body
    pub fn admit(&self, input: Option<&Value>) -> Result<String, ValidationError> {
        match input {
            Some(Value::String(raw)) => self.admit_str(raw),
            _ => {
                warn!("Rejected input: {}", ValidationError::NotAString);
                Err(ValidationError::NotAString)
            }
        }
    }

    /// Admit a raw string
    pub fn admit_str(&self, raw: &str) -> Result<String, ValidationError> {
        let result = self.validate(raw).and_then(|trimmed| {
            let sanitized = self.sanitizer.sanitize(trimmed);
            if sanitized.is_empty() {
                Err(ValidationError::OnlyMarkup)
            } else {
                Ok(sanitized)
            }
        });

        match &result {
            Ok(sanitized) => info!("Accepted idea: {}", sanitized),
            Err(e) => warn!("Rejected input: {}", e),
        }
        result
    }

    fn validate<'a>(&self, raw: &'a str) -> Result<&'a str, ValidationError> {
        let trimmed = raw.trim();
        let chars = trimmed.chars().count();

        if chars == 0 {
            return Err(ValidationError::Empty);
        }
        if chars > self.max_chars {
            return Err(ValidationError::TooLong {
                actual: chars,
                limit: self.max_chars,
            });
        }
        Ok(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    fn gate() -> InputGate {
        InputGate::new().unwrap()
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    /// Run `f` with a subscriber writing into a buffer, return what was logged
    fn capture_logs<F: FnOnce()>(f: F) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        logs.text()
    }

    #[test]
    fn test_plain_idea_unchanged() {
        let idea = "A portfolio website for a photographer";
        assert_eq!(gate().admit_str(idea).unwrap(), idea);
    }

    #[test]
    fn test_trims_surrounding_whitespace() {
        assert_eq!(gate().admit_str("  \n a blog \t").unwrap(), "a blog");
    }

    #[test]
    fn test_empty_and_whitespace_rejected() {
        assert_eq!(gate().admit_str(""), Err(ValidationError::Empty));
        assert_eq!(gate().admit_str("   \n\t"), Err(ValidationError::Empty));
    }

    #[test]
    fn test_length_boundaries() {
        let at_limit = "a".repeat(MAX_INPUT_CHARS);
        assert!(gate().admit_str(&at_limit).is_ok());

        let over = "a".repeat(MAX_INPUT_CHARS + 1);
        assert_eq!(
            gate().admit_str(&over),
            Err(ValidationError::TooLong {
                actual: 1001,
                limit: 1000
            })
        );
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 1000 three-byte characters is within the limit
        let cjk = "站".repeat(MAX_INPUT_CHARS);
        assert!(gate().admit_str(&cjk).is_ok());
    }

    #[test]
    fn test_length_measured_after_trim() {
        let padded = format!("   {}   ", "a".repeat(MAX_INPUT_CHARS));
        assert!(gate().admit_str(&padded).is_ok());
    }

    #[test]
    fn test_non_string_rejected() {
        let gate = gate();
        assert_eq!(gate.admit(None), Err(ValidationError::NotAString));
        assert_eq!(gate.admit(Some(&json!(42))), Err(ValidationError::NotAString));
        assert_eq!(gate.admit(Some(&json!(null))), Err(ValidationError::NotAString));
        assert_eq!(
            gate.admit(Some(&json!(["a", "b"]))),
            Err(ValidationError::NotAString)
        );
        assert_eq!(gate.admit(Some(&json!("a shop"))).unwrap(), "a shop");
    }

    #[test]
    fn test_script_removed_with_content() {
        let out = gate()
            .admit_str("A bakery site<script>alert('x')</script> with menus")
            .unwrap();
        assert_eq!(out, "A bakery site with menus");
    }

    #[test]
    fn test_tags_stripped_text_kept() {
        let out = gate()
            .admit_str("<b>Bold</b> idea <img src=x onerror=alert(1)>for <a href=\"javascript:x\">pets</a>")
            .unwrap();
        assert_eq!(out, "Bold idea for pets");
    }

    #[test]
    fn test_nested_tag_trick_does_not_reassemble() {
        let out = gate()
            .admit_str("site <scr<script>ipt>alert(1)</scr</script>ipt> done")
            .unwrap();
        assert_eq!(out, "site  done");
    }

    #[test]
    fn test_unterminated_tag_stripped() {
        let out = gate().admit_str("recipes <img src=x onerror=alert(1)").unwrap();
        assert_eq!(out, "recipes");
    }

    #[test]
    fn test_comments_and_style_removed() {
        let out = gate()
            .admit_str("a <!-- hidden --> gym <style>body{display:none}</style>site")
            .unwrap();
        assert_eq!(out, "a  gym site");
    }

    #[test]
    fn test_plain_angle_brackets_kept() {
        assert_eq!(gate().admit_str("I <3 cats & 2 > 1").unwrap(), "I <3 cats & 2 > 1");
    }

    #[test]
    fn test_only_markup_rejected() {
        assert_eq!(
            gate().admit_str("<script>alert(1)</script>"),
            Err(ValidationError::OnlyMarkup)
        );
    }

    #[test]
    fn test_uppercase_script_removed() {
        let out = gate().admit_str("x<SCRIPT type=\"text/javascript\">evil()</SCRIPT >y").unwrap();
        assert_eq!(out, "xy");
    }

    #[test]
    fn test_logs_sanitized_idea_only() {
        let logs = capture_logs(|| {
            assert_eq!(gate().admit_str("a<script>steal()</script> shop").unwrap(), "a shop");
        });
        assert!(logs.contains("Accepted idea: a shop"));
        assert!(!logs.contains("steal"));
        assert!(!logs.contains("<script"));
    }

    #[test]
    fn test_rejection_log_omits_raw_input() {
        let logs = capture_logs(|| {
            assert!(gate().admit_str("<script>steal()</script>").is_err());
            assert!(gate().admit_str(&format!("{}secret", "x".repeat(MAX_INPUT_CHARS))).is_err());
        });
        assert!(logs.contains("Rejected input"));
        assert!(!logs.contains("steal"));
        assert!(!logs.contains("secret"));
    }
}
