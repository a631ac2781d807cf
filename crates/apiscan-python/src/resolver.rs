//! Full-tree reference resolution.
//!
//! One pass over every node, with an explicit accumulator instead of shared
//! counters so a file's analysis is fully isolated. Only load-context names
//! are matched: written names bind, they do not reference. There is no real
//! scope tracking — a local variable that shadows an alias name is still
//! reported, which is an accepted approximation.

use std::collections::{HashMap, HashSet};

use tree_sitter::Node;

use apiscan_core::types::{AliasBinding, Reference};

use crate::{node_text, root_package};

/// Nodes nested deeper than this abort the file's analysis; the file is then
/// reported as unparseable rather than hanging a worker on pathological input.
pub(crate) const MAX_NODE_DEPTH: usize = 500;

/// The traversal went past [`MAX_NODE_DEPTH`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DepthExceeded;

pub(crate) struct ReferenceWalk<'a> {
    source: &'a str,
    aliases: &'a [AliasBinding],
    entry_points: &'a HashSet<String>,
    /// Resolved references in visit order.
    pub references: Vec<Reference>,
    /// Root package -> count over import statements at any depth.
    pub all_imports: HashMap<String, u64>,
}

impl<'a> ReferenceWalk<'a> {
    pub(crate) fn new(
        source: &'a str,
        aliases: &'a [AliasBinding],
        entry_points: &'a HashSet<String>,
    ) -> Self {
        Self {
            source,
            aliases,
            entry_points,
            references: Vec::new(),
            all_imports: HashMap::new(),
        }
    }

    pub(crate) fn run(&mut self, root: Node) -> Result<(), DepthExceeded> {
        self.visit(root, 0)
    }

    fn visit(&mut self, node: Node, depth: usize) -> Result<(), DepthExceeded> {
        if depth >= MAX_NODE_DEPTH {
            return Err(DepthExceeded);
        }
        match node.kind() {
            "identifier" => {
                let name = node_text(node, self.source);
                self.check(&name);
            }
            // An attribute chain is matched as one dotted path and never
            // descended into; a chain not rooted at a bare name matches
            // nothing.
            "attribute" => {
                if let Some(path) = dotted_path(node, self.source) {
                    self.check(&path);
                }
            }
            "call" => self.visit_call(node, depth)?,
            "decorated_definition" => self.visit_decorated(node, depth)?,
            "function_definition" => {
                // parameters, then return annotation, then body
                if let Some(parameters) = node.child_by_field_name("parameters") {
                    self.visit_parameters(parameters, depth + 1)?;
                }
                if let Some(return_type) = node.child_by_field_name("return_type") {
                    self.visit(return_type, depth + 1)?;
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit(body, depth + 1)?;
                }
            }
            "class_definition" => {
                if let Some(superclasses) = node.child_by_field_name("superclasses") {
                    self.visit(superclasses, depth + 1)?;
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit(body, depth + 1)?;
                }
            }
            "lambda" => {
                if let Some(parameters) = node.child_by_field_name("parameters") {
                    self.visit_parameters(parameters, depth + 1)?;
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit(body, depth + 1)?;
                }
            }
            "assignment" | "augmented_assignment" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.visit_store(left, depth + 1)?;
                }
                if let Some(annotation) = node.child_by_field_name("type") {
                    self.visit(annotation, depth + 1)?;
                }
                if let Some(right) = node.child_by_field_name("right") {
                    self.visit(right, depth + 1)?;
                }
            }
            "named_expression" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.visit(value, depth + 1)?;
                }
            }
            "for_statement" | "for_in_clause" => {
                let left = node.child_by_field_name("left");
                if let Some(left) = left {
                    self.visit_store(left, depth + 1)?;
                }
                let left_id = left.map(|n| n.id());
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if Some(child.id()) == left_id {
                        continue;
                    }
                    self.visit(child, depth + 1)?;
                }
            }
            "delete_statement" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.visit_store(child, depth + 1)?;
                }
            }
            "keyword_argument" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.visit(value, depth + 1)?;
                }
            }
            "as_pattern" => {
                // `with open(f) as g`, `except E as e`: the bound name is a
                // store, the guarded expression is a load.
                if let Some(value) = node.named_child(0) {
                    self.visit(value, depth + 1)?;
                }
            }
            "except_clause" => {
                let mut previous_was_as = false;
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    if !child.is_named() {
                        previous_was_as = child.kind() == "as";
                        continue;
                    }
                    if !previous_was_as {
                        self.visit(child, depth + 1)?;
                    }
                    previous_was_as = false;
                }
            }
            "global_statement" | "nonlocal_statement" => {}
            "import_statement" => self.count_plain_import(node),
            "import_from_statement" => self.count_from_import(node),
            "future_import_statement" => self.bump_import("__future__"),
            _ => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.visit(child, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    /// Callee first; when that appended references and the last one is still
    /// plain and names an entry point, capture the argument list verbatim.
    /// Arguments are visited afterwards, so references inside them can never
    /// be mistaken for the callee.
    fn visit_call(&mut self, node: Node, depth: usize) -> Result<(), DepthExceeded> {
        let before = self.references.len();
        if let Some(function) = node.child_by_field_name("function") {
            self.visit(function, depth + 1)?;
        }
        if self.references.len() > before {
            if let Some(last) = self.references.last_mut() {
                if last.is_plain() && self.entry_points.contains(&last.canonical) {
                    if let Some(arguments) = node.child_by_field_name("arguments") {
                        last.call_args = Some(node_text(arguments, self.source));
                    }
                }
            }
        }
        if let Some(arguments) = node.child_by_field_name("arguments") {
            self.visit(arguments, depth + 1)?;
        }
        Ok(())
    }

    /// Decorators are visited before the definition they wrap. When a
    /// decorator on a function definition appended references, the last one
    /// is the decorator itself and gets tagged; class decorators are visited
    /// without tagging.
    fn visit_decorated(&mut self, node: Node, depth: usize) -> Result<(), DepthExceeded> {
        let definition = node.child_by_field_name("definition");
        let tags_decorators = definition
            .map(|d| d.kind() == "function_definition")
            .unwrap_or(false);

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() != "decorator" {
                continue;
            }
            let before = self.references.len();
            let mut decorator_cursor = child.walk();
            for expression in child.named_children(&mut decorator_cursor) {
                self.visit(expression, depth + 1)?;
            }
            if tags_decorators && self.references.len() > before {
                if let Some(last) = self.references.last_mut() {
                    last.is_decorator = true;
                }
            }
        }
        if let Some(definition) = definition {
            self.visit(definition, depth + 1)?;
        }
        Ok(())
    }

    /// Parameter names bind; only their defaults and annotations are loads.
    fn visit_parameters(&mut self, node: Node, depth: usize) -> Result<(), DepthExceeded> {
        if depth >= MAX_NODE_DEPTH {
            return Err(DepthExceeded);
        }
        let mut cursor = node.walk();
        for parameter in node.named_children(&mut cursor) {
            match parameter.kind() {
                "identifier"
                | "list_splat_pattern"
                | "dictionary_splat_pattern"
                | "tuple_pattern"
                | "positional_separator"
                | "keyword_separator" => {}
                "default_parameter" => {
                    if let Some(value) = parameter.child_by_field_name("value") {
                        self.visit(value, depth + 1)?;
                    }
                }
                "typed_parameter" => {
                    if let Some(annotation) = parameter.child_by_field_name("type") {
                        self.visit(annotation, depth + 1)?;
                    }
                }
                "typed_default_parameter" => {
                    if let Some(annotation) = parameter.child_by_field_name("type") {
                        self.visit(annotation, depth + 1)?;
                    }
                    if let Some(value) = parameter.child_by_field_name("value") {
                        self.visit(value, depth + 1)?;
                    }
                }
                _ => self.visit(parameter, depth + 1)?,
            }
        }
        Ok(())
    }

    /// Assignment-target position. Written names and attribute targets are
    /// skipped outright; a subscript target still reads its base and index.
    fn visit_store(&mut self, node: Node, depth: usize) -> Result<(), DepthExceeded> {
        if depth >= MAX_NODE_DEPTH {
            return Err(DepthExceeded);
        }
        match node.kind() {
            "identifier" | "attribute" => Ok(()),
            "subscript" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.visit(child, depth + 1)?;
                }
                Ok(())
            }
            "pattern_list" | "tuple_pattern" | "list_pattern" | "expression_list"
            | "list_splat_pattern" | "parenthesized_expression" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.visit_store(child, depth + 1)?;
                }
                Ok(())
            }
            _ => self.visit(node, depth),
        }
    }

    /// Match a dotted name against the alias table; first binding wins.
    fn check(&mut self, name: &str) {
        for binding in self.aliases {
            let local = binding.local.as_str();
            let matched = name == local
                || (name.len() > local.len()
                    && name.starts_with(local)
                    && name.as_bytes()[local.len()] == b'.');
            if matched {
                let canonical = format!("{}{}", binding.canonical, &name[local.len()..]);
                self.references.push(Reference::new(canonical));
                break;
            }
        }
    }

    fn count_plain_import(&mut self, node: Node) {
        let mut cursor = node.walk();
        for item in node.named_children(&mut cursor) {
            let name_node = match item.kind() {
                "dotted_name" => Some(item),
                "aliased_import" => item.child_by_field_name("name"),
                _ => None,
            };
            if let Some(name_node) = name_node {
                let full = node_text(name_node, self.source);
                self.bump_import(root_package(&full));
            }
        }
    }

    fn count_from_import(&mut self, node: Node) {
        let Some(module_node) = node.child_by_field_name("module_name") else {
            return;
        };
        if module_node.kind() != "dotted_name" {
            // relative imports are not tallied
            return;
        }
        let module_path = node_text(module_node, self.source);
        self.bump_import(root_package(&module_path));
    }

    fn bump_import(&mut self, root: &str) {
        *self.all_imports.entry(root.to_string()).or_insert(0) += 1;
    }
}

/// Rebuild `a.b.c` from the innermost identifier outward. `None` when the
/// chain is rooted in something other than a bare name (a call, a literal).
fn dotted_path(node: Node, source: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    let mut current = node;
    while current.kind() == "attribute" {
        let attr = current.child_by_field_name("attribute")?;
        parts.push(&source[attr.byte_range()]);
        current = current.child_by_field_name("object")?;
    }
    if current.kind() != "identifier" {
        return None;
    }
    parts.push(&source[current.byte_range()]);
    parts.reverse();
    Some(parts.join("."))
}
