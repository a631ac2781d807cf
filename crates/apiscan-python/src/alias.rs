//! Module-scope import scanning.
//!
//! Alias bindings come only from the module's top-level statements; an import
//! inside a function or conditional never establishes an alias. The same scan
//! counts every top-level import's root package for the per-file summary.

use std::collections::HashMap;

use tree_sitter::Node;

use apiscan_core::types::AliasBinding;

use crate::{node_text, root_package};

/// Output of the module-scope scan.
#[derive(Debug, Default)]
pub(crate) struct ModuleImports {
    /// Local name -> canonical name bindings for the target library, in
    /// source order. Earlier bindings win during resolution.
    pub aliases: Vec<AliasBinding>,
    /// Root package name -> count over top-level imports of any library.
    pub top_imports: HashMap<String, u64>,
}

impl ModuleImports {
    fn bump(&mut self, root: &str) {
        *self.top_imports.entry(root.to_string()).or_insert(0) += 1;
    }
}

/// Scan the top-level statements of a parsed module.
pub(crate) fn collect_module_imports(module: Node, source: &str, library: &str) -> ModuleImports {
    let mut out = ModuleImports::default();
    let mut cursor = module.walk();
    for statement in module.named_children(&mut cursor) {
        match statement.kind() {
            "import_statement" => collect_plain_import(statement, source, library, &mut out),
            "import_from_statement" => collect_from_import(statement, source, library, &mut out),
            "future_import_statement" => out.bump("__future__"),
            _ => {}
        }
    }
    out
}

/// `import X[.Y] [as Z]`, one count (and possibly one binding) per listed name.
fn collect_plain_import(statement: Node, source: &str, library: &str, out: &mut ModuleImports) {
    let mut cursor = statement.walk();
    for item in statement.named_children(&mut cursor) {
        let (name_node, alias_node) = match item.kind() {
            "dotted_name" => (Some(item), None),
            "aliased_import" => (
                item.child_by_field_name("name"),
                item.child_by_field_name("alias"),
            ),
            _ => (None, None),
        };
        let Some(name_node) = name_node else { continue };
        let full = node_text(name_node, source);
        let root = root_package(&full);
        out.bump(root);
        if root == library {
            let local = alias_node
                .map(|alias| node_text(alias, source))
                .unwrap_or_else(|| full.clone());
            out.aliases.push(AliasBinding::new(full, local));
        }
    }
}

/// `from M import N [as Z]`, absolute module paths only; counted once per
/// statement regardless of how many names it pulls in.
fn collect_from_import(statement: Node, source: &str, library: &str, out: &mut ModuleImports) {
    let Some(module_node) = statement.child_by_field_name("module_name") else {
        return;
    };
    if module_node.kind() != "dotted_name" {
        // relative import
        return;
    }
    let module_path = node_text(module_node, source);
    let root = root_package(&module_path);
    out.bump(root);
    if root != library {
        return;
    }

    let mut cursor = statement.walk();
    for item in statement.named_children(&mut cursor) {
        if item.id() == module_node.id() {
            continue;
        }
        match item.kind() {
            "dotted_name" => {
                let name = node_text(item, source);
                out.aliases
                    .push(AliasBinding::new(format!("{module_path}.{name}"), name));
            }
            "aliased_import" => {
                let (Some(name_node), Some(alias_node)) = (
                    item.child_by_field_name("name"),
                    item.child_by_field_name("alias"),
                ) else {
                    continue;
                };
                let name = node_text(name_node, source);
                out.aliases.push(AliasBinding::new(
                    format!("{module_path}.{name}"),
                    node_text(alias_node, source),
                ));
            }
            "wildcard_import" => {
                out.aliases
                    .push(AliasBinding::new(format!("{module_path}.*"), "*"));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> ModuleImports {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .unwrap();
        let tree = parser.parse(source, None).unwrap();
        collect_module_imports(tree.root_node(), source, "numba")
    }

    #[test]
    fn test_plain_import_binds_full_dotted_name() {
        let imports = scan("import numba.cuda\n");
        assert_eq!(
            imports.aliases,
            vec![AliasBinding::new("numba.cuda", "numba.cuda")]
        );
        assert_eq!(imports.top_imports["numba"], 1);
    }

    #[test]
    fn test_aliased_import_binds_local_name() {
        let imports = scan("import numba as nb\n");
        assert_eq!(imports.aliases, vec![AliasBinding::new("numba", "nb")]);
    }

    #[test]
    fn test_from_import_joins_module_and_name() {
        let imports = scan("from numba import njit\nfrom numba.core import types as t\n");
        assert_eq!(
            imports.aliases,
            vec![
                AliasBinding::new("numba.njit", "njit"),
                AliasBinding::new("numba.core.types", "t"),
            ]
        );
        // one count per from-statement
        assert_eq!(imports.top_imports["numba"], 2);
    }

    #[test]
    fn test_multiple_names_in_one_from_import() {
        let imports = scan("from numba import jit, njit as fast\n");
        assert_eq!(
            imports.aliases,
            vec![
                AliasBinding::new("numba.jit", "jit"),
                AliasBinding::new("numba.njit", "fast"),
            ]
        );
        assert_eq!(imports.top_imports["numba"], 1);
    }

    #[test]
    fn test_relative_imports_are_ignored() {
        let imports = scan("from . import numba\nfrom ..pkg import thing\n");
        assert!(imports.aliases.is_empty());
        assert!(imports.top_imports.is_empty());
    }

    #[test]
    fn test_other_packages_counted_but_not_bound() {
        let imports = scan("import os, numpy.linalg\nfrom sys import path\n");
        assert!(imports.aliases.is_empty());
        assert_eq!(imports.top_imports["os"], 1);
        assert_eq!(imports.top_imports["numpy"], 1);
        assert_eq!(imports.top_imports["sys"], 1);
    }

    #[test]
    fn test_nested_imports_do_not_bind_aliases() {
        let imports = scan("def f():\n    import numba\n");
        assert!(imports.aliases.is_empty());
        assert!(imports.top_imports.is_empty());
    }

    #[test]
    fn test_future_import_counts_as_dunder_future() {
        let imports = scan("from __future__ import annotations\n");
        assert_eq!(imports.top_imports["__future__"], 1);
        assert!(imports.aliases.is_empty());
    }

    #[test]
    fn test_wildcard_import_records_star_binding() {
        let imports = scan("from numba import *\n");
        assert_eq!(imports.aliases, vec![AliasBinding::new("numba.*", "*")]);
    }
}
