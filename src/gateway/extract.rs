//! Payload extraction from generation responses
//!
//! Generation services wrap the model output in a completion envelope, and
//! models like to wrap JSON in prose or code fences. Extraction runs in two
//! steps: unwrap the envelope to the model text, then take the first
//! balanced `{...}` span out of that text and parse it.

use serde_json::Value;

use crate::error::GatewayError;

/// Pull the model text out of a completion envelope
///
/// Recognizes `choices[0].message.content`, `choices[0].text`,
/// `content[0].text`, and top-level `text` / `output` strings. Any other body
/// (including bare JSON content and plain prose) is returned unchanged.
pub fn unwrap_envelope(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };

    let candidates = [
        value.pointer("/choices/0/message/content"),
        value.pointer("/choices/0/text"),
        value.pointer("/content/0/text"),
        value.get("text"),
        value.get("output"),
    ];

    candidates
        .into_iter()
        .flatten()
        .find_map(Value::as_str)
        .map_or_else(|| body.to_string(), str::to_string)
}

/// Find the first balanced `{...}` span in `text`
///
/// Braces inside JSON strings (including escaped quotes) are ignored. If the
/// span opened by one `{` never closes, scanning resumes at the next `{`.
pub fn first_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(&bytes[start..]) {
            return Some(&text[start..start + end]);
        }
        search_from = start + 1;
    }

    None
}

/// Length of the balanced object starting at `bytes[0] == b'{'`
fn balanced_end(bytes: &[u8]) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, &byte) in bytes.iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx + 1);
                }
            }
            _ => {}
        }
    }

    None
}

/// Extract and parse the JSON object carried by a response body
pub fn parse_payload(body: &str) -> Result<Value, GatewayError> {
    let text = unwrap_envelope(body);

    let span = first_json_object(&text).ok_or_else(|| GatewayError::Malformed {
        reason: "no JSON object found in response".to_string(),
    })?;

    let value: Value = serde_json::from_str(span).map_err(|e| GatewayError::Malformed {
        reason: format!("invalid JSON payload: {e}"),
    })?;

    Ok(value)
}
