//! Newline-delimited JSON output.
//!
//! One compact object per line, flushed per record so an interrupted batch
//! can resume from whatever made it to disk. The error stream mirrors the
//! result stream, keyed by repository identifier.

use std::collections::HashSet;
use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use apiscan_core::types::RepositoryRecord;

/// One entry on the error stream: a repository whose archive could not be
/// opened or enumerated at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub name: String,
    pub error: String,
}

/// Append one repository record as a single compact JSON line.
pub fn write_record<W: Write>(writer: &mut W, record: &RepositoryRecord) -> Result<()> {
    let line = serde_json::to_string(record).context("failed to serialize repository record")?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Append one error entry as a single compact JSON line.
pub fn write_error<W: Write>(writer: &mut W, name: &str, error: &str) -> Result<()> {
    let entry = ErrorEntry {
        name: name.to_string(),
        error: error.to_string(),
    };
    let line = serde_json::to_string(&entry).context("failed to serialize error entry")?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Repository identifiers already present in a result stream, for restart.
/// Unparseable lines (a truncated tail from a killed run) are skipped.
pub fn completed_names<R: BufRead>(reader: R) -> HashSet<String> {
    let mut names = HashSet::new();
    for line in reader.lines() {
        let Ok(line) = line else { break };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&line) else {
            continue;
        };
        if let Some(name) = value.get("name").and_then(|v| v.as_str()) {
            names.insert(name.to_string());
        }
    }
    names
}
