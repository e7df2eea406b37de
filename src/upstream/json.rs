//! JSON decoding for upstream responses with readable error locations.

use anyhow::Result;

/// Decode `body`, and on failure report the serde path, the type mismatch, and a
/// snippet of the offending line.
pub fn decode_with_context<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(body);
    let err = match serde_path_to_error::deserialize(de) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    let inner = err.inner();
    let (line, column) = (inner.line(), inner.column());
    let path = err.path().to_string();

    let msg = inner.to_string();
    let loc = format!(" at line {line} column {column}");
    let bare = msg.strip_suffix(&loc).unwrap_or(&msg);

    let mut out = String::new();
    if !path.is_empty() && path != "." {
        out.push_str(&format!("at path '{path}': "));
    }
    out.push_str(&format!(
        "{} (line {line} col {column})\n{}",
        describe_mismatch(bare),
        snippet(body, line, column, 20)
    ));

    Err(anyhow::anyhow!(out))
}

/// Rewrite "invalid type: X, expected Y" as "expected Y, got X".
fn describe_mismatch(msg: &str) -> String {
    if let Some(rest) = msg.split_once("invalid type: ").map(|(_, r)| r)
        && let Some((actual, expected)) = rest.split_once(", expected ")
    {
        let expected = expected.split(" at line ").next().unwrap_or(expected).trim();
        return format!("expected {expected}, got {actual}");
    }

    if msg.starts_with("expected ")
        && let Some(head) = msg.split(" at line ").next()
    {
        return head.to_string();
    }

    msg.to_string()
}

fn snippet(body: &str, line: usize, column: usize, width: usize) -> String {
    let text = body.lines().nth(line.saturating_sub(1)).unwrap_or("");
    if text.is_empty() {
        return "(empty line)".to_string();
    }

    let at = column.saturating_sub(1).min(text.len());
    let half = width / 2;
    let mut start = at.saturating_sub(half);
    let mut end = (at + half).min(text.len());
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    while !text.is_char_boundary(end) {
        end += 1;
    }

    let caret = " ".repeat(at - start) + "^";
    format!("...{}...\n   {caret}", &text[start..end])
}
