use crate::error::ScanError;
use crate::model::{EdgeKind, EdgeRecord, NodeKind, NodeRecord, member_id};
use crate::scanner::dialect::{ExtractedFile, SourceDialect};
use anyhow::Result;
use tree_sitter::{Node, Parser};

/// Imports of these modules never become edges.
pub const IGNORED_IMPORTS: &[&str] = &[
    "os", "sys", "json", "typing", "logging", "pathlib", "datetime", "ast",
];

pub struct PythonDialect {
    parser: Parser,
}

impl PythonDialect {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_python::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }
}

impl SourceDialect for PythonDialect {
    fn name(&self) -> &'static str {
        "python"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn extract(&mut self, rel_path: &str, source: &str) -> Result<ExtractedFile, ScanError> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| ScanError::NoTree {
                path: rel_path.to_string(),
            })?;
        let root = tree.root_node();
        if let Some(bad) = first_error(root) {
            let pos = bad.start_position();
            return Err(ScanError::Syntax {
                path: rel_path.to_string(),
                line: pos.row + 1,
                column: pos.column + 1,
            });
        }

        let mut walk = Walk {
            rel_path,
            source,
            output: ExtractedFile::default(),
        };
        walk_node(root, None, &mut walk);
        Ok(walk.output)
    }
}

struct Walk<'a> {
    rel_path: &'a str,
    source: &'a str,
    output: ExtractedFile,
}

/// `class_scope` is set only for statements sitting directly in a class body.
/// Anything deeper (including functions nested in methods) is file-scoped.
fn walk_node(node: Node<'_>, class_scope: Option<&str>, walk: &mut Walk<'_>) {
    match node.kind() {
        "class_definition" => handle_class(node, walk),
        "function_definition" => handle_function(node, class_scope, walk),
        "decorated_definition" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if child.kind() == "decorator" {
                    walk_node(child, None, walk);
                } else {
                    walk_node(child, class_scope, walk);
                }
            }
        }
        "import_statement" | "import_from_statement" | "future_import_statement" => {
            if let Some(module) = imported_module(node, walk.source) {
                if !IGNORED_IMPORTS.contains(&module.as_str()) {
                    walk.output.edges.push(EdgeRecord::new(
                        walk.rel_path,
                        module,
                        EdgeKind::Imports,
                    ));
                }
            }
        }
        _ => walk_children(node, walk),
    }
}

fn walk_children(node: Node<'_>, walk: &mut Walk<'_>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_node(child, None, walk);
    }
}

fn handle_class(node: Node<'_>, walk: &mut Walk<'_>) {
    let Some(name_node) = node.child_by_field_name("name") else {
        walk_children(node, walk);
        return;
    };
    let name = node_text(name_node, walk.source);
    let class_id = member_id(walk.rel_path, &name);
    walk.output
        .nodes
        .push(NodeRecord::member(walk.rel_path, NodeKind::Class, &name));
    walk.output.edges.push(EdgeRecord::new(
        walk.rel_path,
        class_id.clone(),
        EdgeKind::Contains,
    ));

    if let Some(superclasses) = node.child_by_field_name("superclasses") {
        let mut cursor = superclasses.walk();
        for base in superclasses.named_children(&mut cursor) {
            // Dotted bases and keyword arguments (metaclass=...) are skipped.
            if base.kind() == "identifier" {
                walk.output.edges.push(EdgeRecord::new(
                    class_id.clone(),
                    node_text(base, walk.source),
                    EdgeKind::Inherits,
                ));
            }
        }
    }

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            walk_node(child, Some(&class_id), walk);
        }
    }
}

fn handle_function(node: Node<'_>, class_scope: Option<&str>, walk: &mut Walk<'_>) {
    let Some(name_node) = node.child_by_field_name("name") else {
        walk_children(node, walk);
        return;
    };
    let name = node_text(name_node, walk.source);
    let function_id = member_id(walk.rel_path, &name);
    walk.output
        .nodes
        .push(NodeRecord::member(walk.rel_path, NodeKind::Function, &name));
    let edge = match class_scope {
        Some(class_id) => EdgeRecord::new(class_id, function_id, EdgeKind::MethodOf),
        None => EdgeRecord::new(walk.rel_path, function_id, EdgeKind::Contains),
    };
    walk.output.edges.push(edge);

    if let Some(body) = node.child_by_field_name("body") {
        walk_children(body, walk);
    }
}

/// Top-level package of an import statement. For `import a.b, c` only the
/// first name counts; `from . import x` has no module.
fn imported_module(node: Node<'_>, source: &str) -> Option<String> {
    let target = match node.kind() {
        "future_import_statement" => return Some("__future__".to_string()),
        "import_statement" => {
            let first = node.child_by_field_name("name")?;
            if first.kind() == "aliased_import" {
                first.child_by_field_name("name")?
            } else {
                first
            }
        }
        "import_from_statement" => {
            let module = node.child_by_field_name("module_name")?;
            if module.kind() == "relative_import" {
                let mut cursor = module.walk();
                let dotted = module
                    .named_children(&mut cursor)
                    .find(|child| child.kind() == "dotted_name");
                dotted?
            } else {
                module
            }
        }
        _ => return None,
    };
    let text = node_text(target, source);
    let top = text.split('.').next().unwrap_or("").trim();
    if top.is_empty() {
        None
    } else {
        Some(top.to_string())
    }
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error(child) {
            return Some(found);
        }
    }
    // has_error without a located child: report the node itself.
    Some(node)
}

fn node_text(node: Node<'_>, source: &str) -> String {
    let start = node.start_byte();
    let end = node.end_byte();
    source.get(start..end).unwrap_or("").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> ExtractedFile {
        let mut dialect = PythonDialect::new().unwrap();
        dialect.extract("pkg/mod.py", source).unwrap()
    }

    fn has_edge(file: &ExtractedFile, source: &str, target: &str, kind: EdgeKind) -> bool {
        file.edges
            .iter()
            .any(|e| e.source == source && e.target == target && e.kind == kind)
    }

    #[test]
    fn decorated_method_stays_on_class() {
        let file = extract(
            r#"
class Service:
    @staticmethod
    def build():
        pass

    @property
    def name(self):
        return "x"
"#,
        );
        assert!(has_edge(
            &file,
            "pkg/mod.py::Service",
            "pkg/mod.py::build",
            EdgeKind::MethodOf
        ));
        assert!(has_edge(
            &file,
            "pkg/mod.py::Service",
            "pkg/mod.py::name",
            EdgeKind::MethodOf
        ));
    }

    #[test]
    fn function_under_class_conditional_is_file_scoped() {
        let file = extract(
            r#"
class Compat:
    if True:
        def shim(self):
            pass
"#,
        );
        assert!(has_edge(
            &file,
            "pkg/mod.py",
            "pkg/mod.py::shim",
            EdgeKind::Contains
        ));
        assert!(!file.edges.iter().any(|e| e.kind == EdgeKind::MethodOf));
    }

    #[test]
    fn import_variants() {
        let file = extract(
            r#"
from __future__ import annotations
import numpy.linalg as la, scipy
from .relative import thing
from . import sibling
from collections.abc import Mapping
import os
"#,
        );
        let imports: Vec<_> = file
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Imports)
            .map(|e| e.target.as_str())
            .collect();
        assert_eq!(imports, vec!["__future__", "numpy", "relative", "collections"]);
    }

    #[test]
    fn syntax_error_reports_position() {
        let mut dialect = PythonDialect::new().unwrap();
        let err = dialect
            .extract("broken.py", "def ok():\n    pass\n\ndef broken(:\n")
            .unwrap_err();
        assert!(matches!(err, ScanError::Syntax { .. }));
    }
}
