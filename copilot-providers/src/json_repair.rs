//! Strict-then-loose JSON recovery for LLM text output (§4.11 step 7, §9: "never
//! eval, only regex-guided slicing into strict decoders").

use copilot_core::CopilotError;

/// Parse `raw` as JSON. On a strict-parse failure, try two repair passes in
/// order: strip a ```` ```json ```` / ```` ``` ```` fence, then slice the
/// substring between the first `{`/`[` and the last matching `}`/`]`. Each
/// repair attempt is itself a strict parse; the first one that succeeds wins.
/// If nothing parses, returns `BadModelOutput` carrying the original text.
pub fn parse_loose(raw: &str) -> Result<serde_json::Value, CopilotError> {
    if let Ok(value) = serde_json::from_str(raw) {
        return Ok(value);
    }
    let unfenced = strip_code_fence(raw);
    if unfenced != raw {
        if let Ok(value) = serde_json::from_str(&unfenced) {
            return Ok(value);
        }
    }
    if let Some(sliced) = slice_outermost(&unfenced) {
        if let Ok(value) = serde_json::from_str(&sliced) {
            return Ok(value);
        }
    }
    Err(CopilotError::BadModelOutput {
        raw: raw.to_string(),
    })
}

fn strip_code_fence(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return raw.to_string();
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\n', '\r']);
    rest.strip_suffix("```").unwrap_or(rest).trim().to_string()
}

/// Slice between the first `{`/`[` and the last matching `}`/`]`.
fn slice_outermost(text: &str) -> Option<String> {
    let start = text.find(['{', '['])?;
    let opener = text.as_bytes()[start];
    let closer = if opener == b'{' { '}' } else { ']' };
    let end = text.rfind(closer)?;
    if end < start {
        return None;
    }
    Some(text[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strict_json_parses_directly() {
        let value = parse_loose(r#"{"price": 1.5}"#).unwrap();
        assert_eq!(value, json!({"price": 1.5}));
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let raw = "```json\n{\"price\": 2.0}\n```";
        let value = parse_loose(raw).unwrap();
        assert_eq!(value, json!({"price": 2.0}));
    }

    #[test]
    fn surrounding_prose_is_sliced_away() {
        let raw = "Sure, here you go: {\"price\": 3.25, \"currency\": \"USD\"} Hope that helps!";
        let value = parse_loose(raw).unwrap();
        assert_eq!(value, json!({"price": 3.25, "currency": "USD"}));
    }

    #[test]
    fn arrays_are_sliced_too() {
        let raw = "the list is [1, 2, 3] as requested";
        let value = parse_loose(raw).unwrap();
        assert_eq!(value, json!([1, 2, 3]));
    }

    #[test]
    fn unrecoverable_text_raises_bad_model_output() {
        let err = parse_loose("not json at all, sorry").unwrap_err();
        assert!(matches!(err, CopilotError::BadModelOutput { .. }));
    }
}
