//! Python usage analysis: resolve import aliases to canonical names, collect
//! every reference to the target library, and fold the result into a per-file
//! summary.

pub mod notebook;

mod alias;
mod resolver;

pub use notebook::{to_script, NotebookError, NotebookScript};

use std::collections::{BTreeMap, HashMap, HashSet};

use thiserror::Error;
use tree_sitter::{Language, Node, Parser};

use apiscan_core::config::LibraryConfig;
use apiscan_core::types::{PythonAnalysis, Reference};

/// Why a Python file produced no analysis. Propagated as a value; only at
/// the file-record boundary does it collapse to a serialized `null`.
#[derive(Debug, Error)]
pub enum PythonError {
    #[error("source failed to parse")]
    Syntax,
    #[error("expression nesting exceeded the traversal depth limit")]
    NestingLimit,
    #[error("notebook transcoding failed: {0}")]
    Notebook(#[from] NotebookError),
    #[error("python grammar unavailable: {0}")]
    Language(#[from] tree_sitter::LanguageError),
}

/// Analyzer for Python sources, configured once per target library and
/// shareable across worker threads.
pub struct PythonAnalyzer {
    language: Language,
    library: String,
    entry_points: HashSet<String>,
}

impl PythonAnalyzer {
    pub fn new(library: &LibraryConfig) -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
            library: library.name.clone(),
            entry_points: library.entry_points.iter().cloned().collect(),
        }
    }

    /// Analyze one Python source text.
    pub fn analyze_source(&self, source: &str) -> Result<PythonAnalysis, PythonError> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        let tree = parser.parse(source, None).ok_or(PythonError::Syntax)?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(PythonError::Syntax);
        }

        let module = alias::collect_module_imports(root, source, &self.library);
        let mut walk = resolver::ReferenceWalk::new(source, &module.aliases, &self.entry_points);
        walk.run(root).map_err(|_| PythonError::NestingLimit)?;

        Ok(aggregate(
            module.top_imports,
            walk.all_imports,
            &walk.references,
        ))
    }

    /// Transcode a notebook and analyze its concatenated code cells. A
    /// transcode failure is reported exactly like a parse failure.
    pub fn analyze_notebook(&self, bytes: &[u8]) -> Result<PythonAnalysis, PythonError> {
        let script = notebook::to_script(bytes)?;
        self.analyze_source(&script.code)
    }
}

/// Fold the walk output into the per-file summary. Pure and total: any
/// upstream failure is already an error value before this runs.
///
/// `nested_imports` holds names imported exclusively inside nested scopes; a
/// name also imported at module level is excluded outright.
fn aggregate(
    top_imports: HashMap<String, u64>,
    all_imports: HashMap<String, u64>,
    references: &[Reference],
) -> PythonAnalysis {
    let mut nested_imports = BTreeMap::new();
    for (name, total) in &all_imports {
        if top_imports.contains_key(name) {
            continue;
        }
        if *total != 0 {
            nested_imports.insert(name.clone(), *total);
        }
    }

    let mut histogram: BTreeMap<String, u64> = BTreeMap::new();
    for reference in references {
        *histogram.entry(reference.render()).or_insert(0) += 1;
    }

    PythonAnalysis {
        top_imports: top_imports.into_iter().collect(),
        nested_imports,
        references: histogram,
    }
}

pub(crate) fn node_text(node: Node, source: &str) -> String {
    source[node.byte_range()].to_string()
}

pub(crate) fn root_package(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}
