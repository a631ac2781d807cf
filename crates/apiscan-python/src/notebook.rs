//! Notebook-to-script transcoding.
//!
//! A notebook analyzes exactly like a plain script once its code cells are
//! concatenated in document order. Markdown and raw cells are kept aside as
//! commentary rather than discarded.

use serde::Deserialize;
use thiserror::Error;

/// Why notebook bytes could not be turned into a script.
#[derive(Debug, Error)]
pub enum NotebookError {
    #[error("notebook is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("notebook has no cell list")]
    MissingCells,
}

/// The script rendering of a notebook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookScript {
    /// Code cells concatenated in document order, magic and shell lines
    /// commented out.
    pub code: String,
    /// Markdown and raw cell text, in document order.
    pub commentary: Vec<String>,
}

#[derive(Deserialize)]
struct RawNotebook {
    cells: Option<Vec<RawCell>>,
}

#[derive(Deserialize)]
struct RawCell {
    #[serde(default)]
    cell_type: String,
    #[serde(default)]
    source: CellSource,
}

/// Cell sources appear both as one string and as a list of lines.
#[derive(Deserialize)]
#[serde(untagged)]
enum CellSource {
    Joined(String),
    Lines(Vec<String>),
}

impl Default for CellSource {
    fn default() -> Self {
        CellSource::Joined(String::new())
    }
}

impl CellSource {
    fn into_text(self) -> String {
        match self {
            CellSource::Joined(text) => text,
            CellSource::Lines(lines) => lines.concat(),
        }
    }
}

/// Transcode notebook bytes into an equivalent script, or fail. Notebooks
/// predating the v4 cell list (and anything else malformed) fail here and
/// are reported exactly like a source file that did not parse.
pub fn to_script(bytes: &[u8]) -> Result<NotebookScript, NotebookError> {
    let notebook: RawNotebook = serde_json::from_slice(bytes)?;
    let cells = notebook.cells.ok_or(NotebookError::MissingCells)?;

    let mut code = String::new();
    let mut commentary = Vec::new();
    for cell in cells {
        let text = cell.source.into_text();
        match cell.cell_type.as_str() {
            "code" => {
                if !code.is_empty() {
                    code.push_str("\n\n");
                }
                push_escaped_code(&mut code, &text);
            }
            "markdown" | "raw" => commentary.push(text),
            _ => {}
        }
    }
    Ok(NotebookScript { code, commentary })
}

/// Append a code cell, commenting out IPython magic (`%`) and shell (`!`)
/// lines so the result stays parseable Python.
fn push_escaped_code(code: &mut String, text: &str) {
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('%') || trimmed.starts_with('!') {
            code.push_str("# ");
        }
        code.push_str(line);
        code.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notebook_json(cells: &str) -> Vec<u8> {
        format!(r#"{{"nbformat": 4, "nbformat_minor": 5, "cells": [{cells}]}}"#).into_bytes()
    }

    #[test]
    fn test_code_cells_concatenate_in_document_order() {
        let bytes = notebook_json(
            r##"{"cell_type": "code", "source": ["import numba\n"]},
               {"cell_type": "markdown", "source": ["# About\n", "notes"]},
               {"cell_type": "code", "source": "x = numba.njit(f)"}"##,
        );
        let script = to_script(&bytes).unwrap();
        assert_eq!(script.code, "import numba\n\n\nx = numba.njit(f)\n");
        assert_eq!(script.commentary, vec!["# About\nnotes"]);
    }

    #[test]
    fn test_magic_and_shell_lines_are_commented_out() {
        let bytes = notebook_json(
            r#"{"cell_type": "code", "source": ["%matplotlib inline\n", "!ls\n", "x = 1\n"]}"#,
        );
        let script = to_script(&bytes).unwrap();
        assert_eq!(script.code, "# %matplotlib inline\n# !ls\nx = 1\n");
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            to_script(b"{not json"),
            Err(NotebookError::Json(_))
        ));
    }

    #[test]
    fn test_missing_cell_list_is_an_error() {
        assert!(matches!(
            to_script(br#"{"worksheets": []}"#),
            Err(NotebookError::MissingCells)
        ));
    }

    #[test]
    fn test_unknown_cell_types_are_ignored() {
        let bytes = notebook_json(r#"{"cell_type": "widget", "source": ["zzz"]}"#);
        let script = to_script(&bytes).unwrap();
        assert!(script.code.is_empty());
        assert!(script.commentary.is_empty());
    }
}
