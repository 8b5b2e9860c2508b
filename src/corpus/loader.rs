// Corpus files on disk.
//
// One file per user, named after the handle (`@alice.json`). Each file is a
// JSON array of rows: `[text, date]` for raw corpora, `[text, date, embedding]`
// once embedded. Files whose names don't start with '@' are ignored.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::{debug, info};

use super::{Dataset, Record, Sample};

/// List `(user, path)` pairs for every `@*.json` file in `dir`, sorted by user.
pub fn user_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read corpus directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with('@') || !path.is_file() {
            continue;
        }
        let user = name.split('.').next().unwrap_or(name).to_string();
        files.push((user, path));
    }
    files.sort();
    Ok(files)
}

/// Read one user's corpus file.
pub fn read_user_file(path: &Path) -> Result<Vec<Sample>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let rows: Vec<Value> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of rows", path.display()))?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            parse_row(row).with_context(|| format!("Bad row {} in {}", i, path.display()))
        })
        .collect()
}

/// Write one user's corpus file as `[text, date]` or `[text, date, embedding]` rows.
pub fn write_user_file(path: &Path, samples: &[Sample]) -> Result<()> {
    let rows: Vec<Value> = samples.iter().map(sample_to_row).collect();
    let json = serde_json::to_string(&rows)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!(path = %path.display(), rows = rows.len(), "Wrote corpus file");
    Ok(())
}

/// Load every user file in `dir` into one dataset, users in sorted order.
pub fn load_directory(dir: &Path) -> Result<Dataset> {
    let mut records = Vec::new();
    let files = user_files(dir)?;
    for (user, path) in &files {
        for sample in read_user_file(path)? {
            records.push(Record {
                user: user.clone(),
                sample,
            });
        }
    }

    if records.is_empty() {
        anyhow::bail!(
            "No samples found in {} (expected @handle.json files)",
            dir.display()
        );
    }

    info!(
        dir = %dir.display(),
        users = files.len(),
        samples = records.len(),
        "Loaded corpus directory"
    );
    Ok(Dataset::new(records))
}

fn parse_row(row: &Value) -> Result<Sample> {
    let fields = row
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("row is not an array"))?;

    let text = fields
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("first field must be the text"))?
        .to_string();

    let timestamp = fields.get(1).and_then(parse_date);

    let embedding = match fields.get(2) {
        None | Some(Value::Null) => None,
        Some(Value::Array(values)) => Some(
            values
                .iter()
                .map(|v| {
                    v.as_f64()
                        .ok_or_else(|| anyhow::anyhow!("embedding values must be numbers"))
                })
                .collect::<Result<Vec<f64>>>()?,
        ),
        Some(_) => anyhow::bail!("third field must be an embedding array"),
    };

    Ok(Sample {
        text,
        timestamp,
        embedding,
    })
}

/// Dates arrive either as strings or as epoch milliseconds. Anything we
/// can't read becomes `None`; a missing date never rejects a sample.
fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|d| d.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|d| d.and_utc())
            }),
        _ => None,
    }
}

fn sample_to_row(sample: &Sample) -> Value {
    let date = sample
        .timestamp
        .map(|t| Value::String(t.to_rfc3339()))
        .unwrap_or(Value::Null);
    let mut row = vec![Value::String(sample.text.clone()), date];
    if let Some(embedding) = &sample.embedding {
        row.push(Value::from(embedding.clone()));
    }
    Value::Array(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_row_with_embedding() {
        let row: Value = serde_json::json!(["hello world", "2019-06-01 12:30:00", [0.5, 0.5]]);
        let sample = parse_row(&row).unwrap();
        assert_eq!(sample.text, "hello world");
        assert_eq!(sample.embedding, Some(vec![0.5, 0.5]));
        assert!(sample.timestamp.is_some());
    }

    #[test]
    fn test_parse_row_epoch_millis() {
        let row: Value = serde_json::json!(["hi", 1559391000000_i64]);
        let sample = parse_row(&row).unwrap();
        assert_eq!(sample.timestamp.unwrap().timestamp(), 1559391000);
        assert!(sample.embedding.is_none());
    }

    #[test]
    fn test_unreadable_date_is_none() {
        let row: Value = serde_json::json!(["hi", "last tuesday"]);
        assert!(parse_row(&row).unwrap().timestamp.is_none());
    }

    #[test]
    fn test_non_numeric_embedding_rejected() {
        let row: Value = serde_json::json!(["hi", null, ["a"]]);
        assert!(parse_row(&row).is_err());
    }
}
