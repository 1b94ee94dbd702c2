use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use shared::domain::Fields;

/// Parses a `field=value` argument. The value is read as JSON when it is
/// valid JSON (`5`, `null`, `"5"`) and as a plain string otherwise.
pub fn parse_edit(raw: &str) -> Result<(String, Value)> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected field=value, got '{raw}'"))?;
    let field = field.trim();
    if field.is_empty() {
        bail!("missing field name in '{raw}'");
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((field.to_string(), value))
}

/// Reads a bulk upload file: a JSON array of student objects.
pub fn parse_bulk_rows(raw: &str) -> Result<Vec<Fields>> {
    let rows: Vec<Value> = serde_json::from_str(raw).context("bulk file must be a JSON array")?;
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| match row {
            Value::Object(fields) => Ok(fields),
            other => Err(anyhow!("row {index} is not an object: {other}")),
        })
        .collect()
}

pub fn guess_mime_type(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => return None,
    };
    Some(mime.to_string())
}

#[cfg(test)]
#[path = "tests/edits_tests.rs"]
mod tests;
