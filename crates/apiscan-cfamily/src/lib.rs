//! C-family classification: include extraction, a strict-C parse attempt,
//! and a lexical detector for CUDA kernel-launch syntax.
//!
//! None of this aborts a file. The strict-C verdict is a weak signal: C++
//! routinely fails the C grammar and some C does too.

use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result};
use regex::Regex;
use tree_sitter::{Language, Parser};

use apiscan_core::types::CFamilyAnalysis;

/// Classifier for C/C++/CUDA sources, shareable across worker threads.
pub struct CFamilyAnalyzer {
    language: Language,
    include: Regex,
    directive: Regex,
    kernel_launch: Regex,
}

impl CFamilyAnalyzer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            language: tree_sitter_c::LANGUAGE.into(),
            include: Regex::new(r#"#include [<"](.*)[>"]"#)
                .context("failed to compile include pattern")?,
            directive: Regex::new(r"\s*#.*").context("failed to compile directive pattern")?,
            kernel_launch: Regex::new(r"<<<.*>>>")
                .context("failed to compile kernel-launch pattern")?,
        })
    }

    /// Classify one source text. `member_basenames` holds the final path
    /// component of every member in the same archive, for local-include
    /// detection.
    pub fn analyze(&self, text: &str, member_basenames: &HashSet<String>) -> CFamilyAnalysis {
        let mut local_includes: BTreeMap<String, u64> = BTreeMap::new();
        let mut external_includes: BTreeMap<String, u64> = BTreeMap::new();
        for captures in self.include.captures_iter(text) {
            let target = &captures[1];
            let basename = target.rsplit('/').next().unwrap_or(target);
            let bucket = if member_basenames.contains(basename) {
                &mut local_includes
            } else {
                &mut external_includes
            };
            *bucket.entry(target.to_string()).or_insert(0) += 1;
        }

        // Directives are stripped before the parse attempt; the kernel count
        // runs on the unmodified text.
        let stripped = self.directive.replace_all(text, "");
        let is_strict_c = self.parses_as_strict_c(&stripped);
        let kernel_launches = self.kernel_launch.find_iter(text).count() as u64;

        CFamilyAnalysis {
            local_includes,
            external_includes,
            is_strict_c,
            kernel_launches,
        }
    }

    /// A parse with error nodes, or no parse at all, is a rejection.
    fn parses_as_strict_c(&self, source: &str) -> bool {
        let mut parser = Parser::new();
        if parser.set_language(&self.language).is_err() {
            return false;
        }
        match parser.parse(source, None) {
            Some(tree) => !tree.root_node().has_error(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basenames(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_local_include_matches_archive_member_basename() {
        let analyzer = CFamilyAnalyzer::new().unwrap();
        let analysis = analyzer.analyze(
            "#include \"local.h\"\n#include <stdio.h>\nint main(){return 0;}\n",
            &basenames(&["local.h", "util.c"]),
        );
        assert_eq!(analysis.local_includes["local.h"], 1);
        assert_eq!(analysis.external_includes["stdio.h"], 1);
        assert!(!analysis.external_includes.contains_key("local.h"));
    }

    #[test]
    fn test_local_include_keyed_by_full_target_path() {
        let analyzer = CFamilyAnalyzer::new().unwrap();
        let analysis = analyzer.analyze(
            "#include \"sub/dir/local.h\"\n",
            &basenames(&["local.h"]),
        );
        assert_eq!(analysis.local_includes["sub/dir/local.h"], 1);
    }

    #[test]
    fn test_repeated_includes_are_counted() {
        let analyzer = CFamilyAnalyzer::new().unwrap();
        let analysis = analyzer.analyze(
            "#include <math.h>\n#include <math.h>\n",
            &basenames(&[]),
        );
        assert_eq!(analysis.external_includes["math.h"], 2);
    }

    #[test]
    fn test_include_without_space_is_not_matched() {
        let analyzer = CFamilyAnalyzer::new().unwrap();
        let analysis = analyzer.analyze("#include<stdio.h>\n", &basenames(&[]));
        assert!(analysis.external_includes.is_empty());
    }

    #[test]
    fn test_plain_c_parses_as_strict_c() {
        let analyzer = CFamilyAnalyzer::new().unwrap();
        let analysis = analyzer.analyze(
            "#include <stdio.h>\nint main(){return 0;}\n",
            &basenames(&[]),
        );
        assert!(analysis.is_strict_c);
        assert_eq!(analysis.kernel_launches, 0);
    }

    #[test]
    fn test_cpp_template_fails_strict_c() {
        let analyzer = CFamilyAnalyzer::new().unwrap();
        let analysis = analyzer.analyze(
            "template <typename T>\nT add(T a, T b) { return a + b; }\n",
            &basenames(&[]),
        );
        assert!(!analysis.is_strict_c);
    }

    #[test]
    fn test_directives_are_stripped_before_parsing() {
        let analyzer = CFamilyAnalyzer::new().unwrap();
        let analysis = analyzer.analyze(
            "#define ANSWER 42\nint answer(void) { return ANSWER; }\n",
            &basenames(&[]),
        );
        assert!(analysis.is_strict_c);
    }

    #[test]
    fn test_kernel_launch_is_counted_lexically() {
        let analyzer = CFamilyAnalyzer::new().unwrap();
        let analysis = analyzer.analyze(
            "__global__ void k(int *x);\nint main(){ k<<<32,64>>>(d); }\n",
            &basenames(&[]),
        );
        assert_eq!(analysis.kernel_launches, 1);
    }

    #[test]
    fn test_kernel_launches_counted_per_line() {
        let analyzer = CFamilyAnalyzer::new().unwrap();
        let analysis = analyzer.analyze(
            "a<<<1,2>>>(x);\nb<<<3,4>>>(y);\n",
            &basenames(&[]),
        );
        assert_eq!(analysis.kernel_launches, 2);
    }

    #[test]
    fn test_gibberish_fails_strict_c_without_erroring() {
        let analyzer = CFamilyAnalyzer::new().unwrap();
        let analysis = analyzer.analyze("%%% not a program %%%\n", &basenames(&[]));
        assert!(!analysis.is_strict_c);
    }
}
