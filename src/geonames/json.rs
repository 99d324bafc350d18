//! JSON decoding for GeoNames payloads with readable failure messages.

use anyhow::Result;

/// Characters of the offending line shown on each side of the error column.
const SNIPPET_RADIUS: usize = 12;

/// Deserialize `body`, and on failure report the JSON path, the type mismatch
/// and a short excerpt around the error position.
pub fn parse_json_with_context<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    let jd = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(jd).map_err(|err| {
        let inner = err.inner();
        let (line, column) = (inner.line(), inner.column());
        let path = err.path().to_string();

        let msg = inner.to_string();
        let loc = format!(" at line {line} column {column}");
        let reason = describe_mismatch(msg.strip_suffix(&loc).unwrap_or(&msg));
        let snippet = excerpt(body, line, column);

        if path.is_empty() || path == "." {
            anyhow::anyhow!("{reason} (line {line} col {column}): {snippet}")
        } else {
            anyhow::anyhow!("at path '{path}': {reason} (line {line} col {column}): {snippet}")
        }
    })
}

/// Rewrite serde's `invalid type: X, expected Y` as `expected Y, got X`.
fn describe_mismatch(msg: &str) -> String {
    if let Some(rest) = msg.strip_prefix("invalid type: ")
        && let Some((actual, expected)) = rest.split_once(", expected ")
    {
        return format!("expected {expected}, got {actual}");
    }
    msg.to_string()
}

/// Up to `SNIPPET_RADIUS` characters either side of the 1-based `column`.
fn excerpt(body: &str, line: usize, column: usize) -> String {
    let target: Vec<char> = body
        .lines()
        .nth(line.saturating_sub(1))
        .unwrap_or("")
        .chars()
        .collect();
    if target.is_empty() {
        return "(empty)".to_string();
    }

    let idx = column.saturating_sub(1).min(target.len());
    let start = idx.saturating_sub(SNIPPET_RADIUS);
    let end = (idx + SNIPPET_RADIUS).min(target.len());
    let slice: String = target[start..end].iter().collect();
    format!("`{}`", slice.trim())
}
