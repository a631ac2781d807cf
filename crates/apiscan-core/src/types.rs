use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A module-level import binding: the locally visible name and the fully
/// qualified name it stands for (e.g. `nb` -> `numba`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasBinding {
    pub canonical: String,
    pub local: String,
}

impl AliasBinding {
    pub fn new(canonical: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            canonical: canonical.into(),
            local: local.into(),
        }
    }
}

/// One resolved reference to the target library, in traversal order.
///
/// `call_args` is only populated for entry-point calls and holds the verbatim
/// argument-list text of the call, parentheses included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub canonical: String,
    pub is_decorator: bool,
    pub call_args: Option<String>,
}

impl Reference {
    pub fn new(canonical: impl Into<String>) -> Self {
        Self {
            canonical: canonical.into(),
            is_decorator: false,
            call_args: None,
        }
    }

    /// A reference that has not yet been decorator-tagged or had call
    /// arguments attached. Only plain references are eligible for
    /// entry-point argument capture.
    pub fn is_plain(&self) -> bool {
        !self.is_decorator && self.call_args.is_none()
    }

    /// The histogram key: `@` marks decorator usage, captured argument text
    /// is appended verbatim. `@numba.njit` and `numba.njit` are distinct
    /// keys on purpose.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(
            self.canonical.len()
                + self.call_args.as_ref().map_or(0, String::len)
                + usize::from(self.is_decorator),
        );
        if self.is_decorator {
            out.push('@');
        }
        out.push_str(&self.canonical);
        if let Some(args) = &self.call_args {
            out.push_str(args);
        }
        out
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// Per-file summary for a Python source.
///
/// `BTreeMap` keeps key order stable so the same inputs always serialize to
/// the same bytes. An empty analysis means the file parsed but referenced
/// nothing; a missing analysis (at the record level) means it did not parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PythonAnalysis {
    /// Root package name -> count, module-level imports only.
    pub top_imports: BTreeMap<String, u64>,
    /// Root package name -> count, for names imported exclusively inside
    /// nested scopes (never at module level).
    pub nested_imports: BTreeMap<String, u64>,
    /// Rendered reference string -> count.
    pub references: BTreeMap<String, u64>,
}

/// Per-file summary for a C/C++/CUDA source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CFamilyAnalysis {
    /// Include targets whose final path component is another archive member.
    pub local_includes: BTreeMap<String, u64>,
    /// All other include targets.
    pub external_includes: BTreeMap<String, u64>,
    /// Whether the directive-stripped text parsed as strict C. Weak signal:
    /// C++ routinely fails this and some C does too.
    pub is_strict_c: bool,
    /// Lexical `<<< ... >>>` occurrences in the unmodified text.
    pub kernel_launches: u64,
}

/// One archive member routed to a content analyzer.
/// `analysis: None` records a parse or transcode failure, which is distinct
/// from an analysis whose maps are merely empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord<A> {
    pub path: String,
    pub suffix: String,
    pub analysis: Option<A>,
}

/// The aggregate produced for one repository archive, serialized as a single
/// JSON object on its own line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub name: String,
    pub num_files: usize,
    pub python: Vec<FileRecord<PythonAnalysis>>,
    pub c: Vec<FileRecord<CFamilyAnalysis>>,
    pub other_language: BTreeMap<String, u64>,
}

impl RepositoryRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
