//! Response payload boundary.
//!
//! Turns the text returned by the generative service into one ingestible
//! batch. The service wraps its JSON unpredictably, so fenced-code markers
//! are stripped first and a bare list of catalog picks is accepted as a
//! fallback shape.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PayloadError;
use crate::merge::{CatalogPick, GeneratedComponentDefinition};

lazy_static! {
    static ref OPENING_FENCE: Regex = Regex::new(r"^\s*```[A-Za-z0-9_+-]*[ \t]*\r?\n").unwrap();
    static ref CLOSING_FENCE: Regex = Regex::new(r"\r?\n?[ \t]*```\s*$").unwrap();
}

/// One ingestible batch, as produced by the generative service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPayload {
    #[serde(default)]
    pub components: Vec<CatalogPick>,
    #[serde(default)]
    pub generated_components: Vec<GeneratedComponentDefinition>,
}

impl BatchPayload {
    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.generated_components.is_empty()
    }
}

/// Remove a leading ```` ```lang ```` line and a trailing ```` ``` ````.
///
/// Text without an opening fence is returned trimmed but otherwise untouched.
pub fn strip_code_fences(text: &str) -> &str {
    let Some(open) = OPENING_FENCE.find(text) else {
        return text.trim();
    };
    let body = &text[open.end()..];
    match CLOSING_FENCE.find(body) {
        Some(close) => body[..close.start()].trim(),
        None => body.trim(),
    }
}

/// Parse a service response into a batch.
///
/// Accepts `{ components, generatedComponents }` or, failing that, a bare
/// list of catalog picks.
pub fn parse_batch_payload(raw: &str) -> Result<BatchPayload, PayloadError> {
    let text = strip_code_fences(raw);
    if text.is_empty() {
        return Err(PayloadError::Empty);
    }

    let object_err = match serde_json::from_str::<BatchPayload>(text) {
        Ok(payload) => return Ok(payload),
        Err(e) => e,
    };

    match serde_json::from_str::<Vec<CatalogPick>>(text) {
        Ok(components) => {
            tracing::debug!(count = components.len(), "payload parsed as bare component list");
            Ok(BatchPayload {
                components,
                generated_components: Vec::new(),
            })
        }
        Err(_) => Err(PayloadError::Unrecognized(object_err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\nfunction A() {}\n```\n"), "function A() {}");
        assert_eq!(strip_code_fences("  function A() {}  "), "function A() {}");
        // an unterminated fence still loses its opening line
        assert_eq!(strip_code_fences("```jsx\nconst x = 1;"), "const x = 1;");
    }

    #[test]
    fn test_inner_backticks_survive() {
        let code = "```jsx\nconst s = `hi ${name}`;\n```";
        assert_eq!(strip_code_fences(code), "const s = `hi ${name}`;");
    }

    #[test]
    fn test_parse_object_payload() {
        let payload = parse_batch_payload(
            r#"```json
            {
              "components": [{"type": "navbar", "category": "navigation", "props": {"brand": "X"}}],
              "generatedComponents": [{"type": "Promo", "category": "content", "props": {}, "code": "function Promo() { return <Box />; }"}]
            }
            ```"#,
        )
        .unwrap();
        assert_eq!(payload.components.len(), 1);
        assert_eq!(payload.generated_components[0].type_id, "Promo");
    }

    #[test]
    fn test_parse_bare_list_fallback() {
        let payload = parse_batch_payload(r#"[{"type": "card", "props": {"title": "A"}}]"#).unwrap();
        assert_eq!(payload.components.len(), 1);
        assert!(payload.generated_components.is_empty());
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(parse_batch_payload("   "), Err(PayloadError::Empty)));
        assert!(matches!(
            parse_batch_payload("not json at all"),
            Err(PayloadError::Unrecognized(_))
        ));
    }
}
