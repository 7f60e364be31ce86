//! TypeScript/JavaScript source parsing with tree-sitter.
//!
//! Each file yields a `file` entity plus one entity per top-level
//! declaration and class member. Relationships point either at an entity in
//! the same file, at a bare symbol, or at a module specifier; symbols and
//! modules are resolved later against the stored graph.

use std::{collections::HashSet, path::Path};

use tree_sitter::{Language, Node, Parser};

use crate::{
    error::{CairnError, Result},
    models::{CodeEntity, CodeEntityKind, CodeRelationKind, ParsedRelationship, RelationTarget},
};

/// Grammar used for a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    TypeScript,
    /// TSX grammar, also used for plain JavaScript and JSX
    Tsx,
}

impl Dialect {
    pub fn for_path(path: &str) -> Option<Self> {
        let extension = Path::new(path).extension()?.to_str()?;
        match extension {
            "ts" | "mts" | "cts" => Some(Dialect::TypeScript),
            "tsx" | "js" | "jsx" | "mjs" | "cjs" => Some(Dialect::Tsx),
            _ => None,
        }
    }
}

/// Entities and relationships found in one file.
#[derive(Debug, Default)]
pub struct FileGraph {
    pub entities: Vec<CodeEntity>,
    pub relationships: Vec<ParsedRelationship>,
}

/// Reusable parsers for both grammars.
pub struct SourceParser {
    typescript: Parser,
    tsx: Parser,
}

impl SourceParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            typescript: parser_for(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())?,
            tsx: parser_for(tree_sitter_typescript::LANGUAGE_TSX.into())?,
        })
    }

    /// Parse one file of `package`. `file_path` is relative to the package
    /// root and becomes part of every entity id.
    pub fn parse_file(
        &mut self,
        package: &str,
        file_path: &str,
        source: &str,
    ) -> Result<FileGraph> {
        let dialect = Dialect::for_path(file_path).ok_or_else(|| CairnError::Parse {
            path: file_path.to_string(),
            reason: "unsupported file extension".to_string(),
        })?;
        let parser = match dialect {
            Dialect::TypeScript => &mut self.typescript,
            Dialect::Tsx => &mut self.tsx,
        };
        let tree = parser.parse(source, None).ok_or_else(|| CairnError::Parse {
            path: file_path.to_string(),
            reason: "parser returned no tree".to_string(),
        })?;

        let root = tree.root_node();
        if root.has_error() {
            log::debug!("Syntax errors in {package}:{file_path}; indexing what parsed");
        }

        let mut visitor = FileVisitor::new(package, file_path, source.as_bytes());
        let file_scope = Scope {
            owner: visitor.file_id.clone(),
            top_level: true,
        };
        visitor.visit_children(root, &file_scope);
        visitor.apply_export_clauses();
        Ok(visitor.finish())
    }
}

fn parser_for(language: Language) -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| CairnError::Configuration {
            message: format!("Failed to load tree-sitter grammar: {e}"),
        })?;
    Ok(parser)
}

/// The entity that owns calls found below a node.
#[derive(Clone)]
struct Scope {
    owner: String,
    top_level: bool,
}

impl Scope {
    fn nested(owner: String) -> Self {
        Self {
            owner,
            top_level: false,
        }
    }
}

struct FileVisitor<'a> {
    package: &'a str,
    file_path: &'a str,
    source: &'a [u8],
    file_id: String,
    entities: Vec<CodeEntity>,
    entity_ids: HashSet<String>,
    relationships: Vec<ParsedRelationship>,
    edge_keys: HashSet<(String, RelationTarget, CodeRelationKind)>,
    /// Names listed in `export { a, b }` clauses, applied after the walk
    exported_names: Vec<(String, u32)>,
}

impl<'a> FileVisitor<'a> {
    fn new(package: &'a str, file_path: &'a str, source: &'a [u8]) -> Self {
        let file_entity = CodeEntity::new(package, file_path, file_path, CodeEntityKind::File, 1);
        let file_id = file_entity.id.clone();

        Self {
            package,
            file_path,
            source,
            entity_ids: HashSet::from([file_id.clone()]),
            entities: vec![file_entity],
            file_id,
            relationships: Vec::new(),
            edge_keys: HashSet::new(),
            exported_names: Vec::new(),
        }
    }

    fn finish(self) -> FileGraph {
        FileGraph {
            entities: self.entities,
            relationships: self.relationships,
        }
    }

    fn text(&self, node: Node<'_>) -> Option<&'a str> {
        node.utf8_text(self.source).ok()
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> Option<&'a str> {
        node.child_by_field_name(field).and_then(|n| self.text(n))
    }

    fn visit_children(&mut self, node: Node<'_>, scope: &Scope) {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child, scope);
        }
    }

    fn visit(&mut self, node: Node<'_>, scope: &Scope) {
        match node.kind() {
            "export_statement" => self.visit_export(node, scope),
            "import_statement" => self.visit_import(node),
            "call_expression" => {
                if let Some(callee) = node.child_by_field_name("function") {
                    self.record_call(callee, node, scope);
                }
                self.visit_children(node, scope);
            }
            "new_expression" => {
                if let Some(constructor) = node.child_by_field_name("constructor") {
                    self.record_call(constructor, node, scope);
                }
                self.visit_children(node, scope);
            }
            _ if scope.top_level && self.visit_declaration(node, false) => {}
            _ => self.visit_children(node, scope),
        }
    }

    /// Declares a top-level entity for `node` if it is a declaration, and
    /// walks its body. Returns false for anything else.
    fn visit_declaration(&mut self, node: Node<'_>, exported: bool) -> bool {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                let Some(name) = self.field_text(node, "name") else {
                    return true;
                };
                let id = self.declare(name, CodeEntityKind::Function, node, exported, None);
                self.visit_children(node, &Scope::nested(id));
                true
            }
            "class_declaration" | "abstract_class_declaration" => {
                self.visit_class(node, exported);
                true
            }
            "interface_declaration" => {
                let Some(name) = self.field_text(node, "name") else {
                    return true;
                };
                let id = self.declare(name, CodeEntityKind::Interface, node, exported, None);
                let mut cursor = node.walk();
                let clauses: Vec<Node<'_>> = node
                    .named_children(&mut cursor)
                    .filter(|child| child.kind() == "extends_type_clause")
                    .collect();
                for clause in clauses {
                    self.record_type_refs(&id, clause, CodeRelationKind::Extends);
                }
                true
            }
            "type_alias_declaration" | "enum_declaration" => {
                if let Some(name) = self.field_text(node, "name") {
                    self.declare(name, CodeEntityKind::Type, node, exported, None);
                }
                true
            }
            "lexical_declaration" | "variable_declaration" => {
                let mut cursor = node.walk();
                let declarators: Vec<Node<'_>> = node
                    .named_children(&mut cursor)
                    .filter(|child| child.kind() == "variable_declarator")
                    .collect();
                for declarator in declarators {
                    self.visit_declarator(declarator, exported);
                }
                true
            }
            _ => false,
        }
    }

    fn visit_declarator(&mut self, declarator: Node<'_>, exported: bool) {
        let value = declarator.child_by_field_name("value");
        let name_node = declarator.child_by_field_name("name");

        // Destructuring patterns declare nothing we can name.
        let Some(name) = name_node
            .filter(|n| n.kind() == "identifier")
            .and_then(|n| self.text(n))
        else {
            if let Some(value) = value {
                self.visit(value, &Scope::nested(self.file_id.clone()));
            }
            return;
        };

        let kind = match value.map(|v| v.kind()) {
            Some("arrow_function" | "function_expression" | "function" | "generator_function") => {
                CodeEntityKind::Function
            }
            Some("class") => CodeEntityKind::Class,
            _ => CodeEntityKind::Variable,
        };
        let id = self.declare(name, kind, declarator, exported, None);
        if let Some(value) = value {
            self.visit(value, &Scope::nested(id));
        }
    }

    fn visit_class(&mut self, node: Node<'_>, exported: bool) {
        let Some(class_name) = self.field_text(node, "name") else {
            return;
        };
        let class_id = self.declare(class_name, CodeEntityKind::Class, node, exported, None);

        let mut cursor = node.walk();
        let heritage: Vec<Node<'_>> = node
            .named_children(&mut cursor)
            .filter(|child| child.kind() == "class_heritage")
            .collect();
        for clause_parent in heritage {
            let mut inner = clause_parent.walk();
            let clauses: Vec<Node<'_>> = clause_parent.named_children(&mut inner).collect();
            for clause in clauses {
                match clause.kind() {
                    "extends_clause" => {
                        let mut values = clause.walk();
                        let bases: Vec<Node<'_>> = clause
                            .children_by_field_name("value", &mut values)
                            .collect();
                        for base in bases {
                            if let Some(name) = expression_name(base, self.source) {
                                self.add_edge(
                                    &class_id,
                                    RelationTarget::Symbol(name),
                                    CodeRelationKind::Extends,
                                    base,
                                );
                            }
                        }
                    }
                    "implements_clause" => {
                        self.record_type_refs(&class_id, clause, CodeRelationKind::Implements)
                    }
                    _ => {}
                }
            }
        }

        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let mut body_cursor = body.walk();
        let members: Vec<Node<'_>> = body.named_children(&mut body_cursor).collect();
        for member in members {
            match member.kind() {
                "method_definition" | "abstract_method_signature" => {
                    let Some(method) = self.field_text(member, "name") else {
                        continue;
                    };
                    let qualified = format!("{class_name}.{method}");
                    let method_id = self.declare(
                        &qualified,
                        CodeEntityKind::Function,
                        member,
                        false,
                        Some(&class_id),
                    );
                    self.visit_children(member, &Scope::nested(method_id));
                }
                "public_field_definition" => {
                    let value = member.child_by_field_name("value");
                    let is_function = value.is_some_and(|v| {
                        matches!(v.kind(), "arrow_function" | "function_expression")
                    });
                    match (is_function, self.field_text(member, "name")) {
                        (true, Some(field)) => {
                            let qualified = format!("{class_name}.{field}");
                            let method_id = self.declare(
                                &qualified,
                                CodeEntityKind::Function,
                                member,
                                false,
                                Some(&class_id),
                            );
                            self.visit_children(member, &Scope::nested(method_id));
                        }
                        _ => self.visit_children(member, &Scope::nested(class_id.clone())),
                    }
                }
                _ => self.visit_children(member, &Scope::nested(class_id.clone())),
            }
        }
    }

    fn visit_export(&mut self, node: Node<'_>, scope: &Scope) {
        if let Some(source) = node.child_by_field_name("source") {
            // Re-export: `export { a } from './a'` or `export * from './a'`.
            if let Some(specifier) = string_literal(source, self.source) {
                let file_id = self.file_id.clone();
                self.add_edge(
                    &file_id,
                    RelationTarget::Module(specifier),
                    CodeRelationKind::Imports,
                    node,
                );
            }
            return;
        }

        if let Some(declaration) = node.child_by_field_name("declaration") {
            if !self.visit_declaration(declaration, true) {
                self.visit(declaration, scope);
            }
            return;
        }

        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "export_clause" => {
                    let mut inner = child.walk();
                    let specifiers: Vec<Node<'_>> = child.named_children(&mut inner).collect();
                    for specifier in specifiers {
                        if let Some(name) = self.field_text(specifier, "name") {
                            self.exported_names
                                .push((name.to_string(), line_of(specifier)));
                        }
                    }
                }
                // `export default foo;`
                "identifier" => {
                    if let Some(name) = self.text(child) {
                        self.exported_names.push((name.to_string(), line_of(child)));
                    }
                }
                _ => {
                    if !(scope.top_level && self.visit_declaration(child, true)) {
                        self.visit(child, scope);
                    }
                }
            }
        }
    }

    fn visit_import(&mut self, node: Node<'_>) {
        let Some(specifier) = node
            .child_by_field_name("source")
            .and_then(|source| string_literal(source, self.source))
        else {
            return;
        };
        let file_id = self.file_id.clone();
        self.add_edge(&file_id, RelationTarget::Module(specifier), CodeRelationKind::Imports, node);
    }

    fn record_call(&mut self, callee: Node<'_>, call: Node<'_>, scope: &Scope) {
        if let Some(name) = expression_name(callee, self.source) {
            self.add_edge(
                &scope.owner,
                RelationTarget::Symbol(name),
                CodeRelationKind::Calls,
                call,
            );
        }
    }

    fn record_type_refs(&mut self, from_id: &str, clause: Node<'_>, kind: CodeRelationKind) {
        let mut cursor = clause.walk();
        let types: Vec<Node<'_>> = clause.named_children(&mut cursor).collect();
        for type_node in types {
            if let Some(name) = type_name(type_node, self.source) {
                self.add_edge(from_id, RelationTarget::Symbol(name), kind, type_node);
            }
        }
    }

    /// Adds an entity unless an identical id was already declared (interface
    /// merging, overload signatures). Returns the entity id either way.
    fn declare(
        &mut self,
        name: &str,
        kind: CodeEntityKind,
        node: Node<'_>,
        exported: bool,
        parent: Option<&str>,
    ) -> String {
        let mut entity = CodeEntity::new(self.package, self.file_path, name, kind, line_of(node));
        entity.exported = exported;
        let id = entity.id.clone();

        if self.entity_ids.insert(id.clone()) {
            self.entities.push(entity);
        } else if exported {
            if let Some(existing) = self.entities.iter_mut().find(|e| e.id == id) {
                existing.exported = true;
            }
        }

        let owner = parent.map(str::to_string).unwrap_or_else(|| self.file_id.clone());
        self.add_edge(&owner, RelationTarget::Entity(id.clone()), CodeRelationKind::Defines, node);
        if exported {
            let file_id = self.file_id.clone();
            self.add_edge(
                &file_id,
                RelationTarget::Entity(id.clone()),
                CodeRelationKind::Exports,
                node,
            );
        }
        id
    }

    fn apply_export_clauses(&mut self) {
        let exported = std::mem::take(&mut self.exported_names);
        for (name, line) in exported {
            let mut matched = Vec::new();
            for entity in self.entities.iter_mut() {
                if entity.kind != CodeEntityKind::File && entity.name == name {
                    entity.exported = true;
                    matched.push(entity.id.clone());
                }
            }
            for id in matched {
                let key = (
                    self.file_id.clone(),
                    RelationTarget::Entity(id.clone()),
                    CodeRelationKind::Exports,
                );
                if self.edge_keys.insert(key) {
                    self.relationships.push(ParsedRelationship {
                        from_id: self.file_id.clone(),
                        target: RelationTarget::Entity(id),
                        kind: CodeRelationKind::Exports,
                        file_path: self.file_path.to_string(),
                        line_number: line,
                    });
                }
            }
        }
    }

    fn add_edge(
        &mut self,
        from_id: &str,
        target: RelationTarget,
        kind: CodeRelationKind,
        at: Node<'_>,
    ) {
        let key = (from_id.to_string(), target.clone(), kind);
        if !self.edge_keys.insert(key) {
            return;
        }
        self.relationships.push(ParsedRelationship {
            from_id: from_id.to_string(),
            target,
            kind,
            file_path: self.file_path.to_string(),
            line_number: line_of(at),
        });
    }
}

fn line_of(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

/// The symbol a call or heritage expression names: `foo` for `foo()`, `bar`
/// for `a.b.bar()`.
fn expression_name(node: Node<'_>, source: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" | "type_identifier" => node.utf8_text(source).ok().map(str::to_string),
        "member_expression" => node
            .child_by_field_name("property")
            .and_then(|p| p.utf8_text(source).ok())
            .map(str::to_string),
        "parenthesized_expression" | "non_null_expression" => node
            .named_child(0)
            .and_then(|inner| expression_name(inner, source)),
        _ => None,
    }
}

/// The name a type reference points at: `Base` for `Base<T>` or `ns.Base`.
fn type_name(node: Node<'_>, source: &[u8]) -> Option<String> {
    match node.kind() {
        "type_identifier" | "identifier" => node.utf8_text(source).ok().map(str::to_string),
        "generic_type" | "nested_type_identifier" => node
            .child_by_field_name("name")
            .and_then(|name| type_name(name, source)),
        "member_expression" => expression_name(node, source),
        _ => None,
    }
}

/// The unquoted contents of a string literal node.
fn string_literal(node: Node<'_>, source: &[u8]) -> Option<String> {
    let raw = node.utf8_text(source).ok()?;
    let trimmed = raw.trim_matches(|c| c == '"' || c == '\'' || c == '`');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(file_path: &str, source: &str) -> FileGraph {
        SourceParser::new()
            .unwrap()
            .parse_file("app", file_path, source)
            .unwrap()
    }

    fn names(graph: &FileGraph, kind: CodeEntityKind) -> Vec<&str> {
        graph
            .entities
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.name.as_str())
            .collect()
    }

    fn has_edge(
        graph: &FileGraph,
        from_suffix: &str,
        target: &RelationTarget,
        kind: CodeRelationKind,
    ) -> bool {
        graph
            .relationships
            .iter()
            .any(|r| r.from_id.ends_with(from_suffix) && &r.target == target && r.kind == kind)
    }

    #[test]
    fn test_dialect_for_path() {
        assert_eq!(Dialect::for_path("src/a.ts"), Some(Dialect::TypeScript));
        assert_eq!(Dialect::for_path("src/a.tsx"), Some(Dialect::Tsx));
        assert_eq!(Dialect::for_path("src/a.mjs"), Some(Dialect::Tsx));
        assert_eq!(Dialect::for_path("README.md"), None);
    }

    #[test]
    fn test_functions_and_calls() {
        let graph = parse(
            "src/math.ts",
            "export function foo() {\n  return bar(1);\n}\n\nfunction bar(x: number) {\n  return x;\n}\n",
        );

        assert_eq!(names(&graph, CodeEntityKind::File), vec!["src/math.ts"]);
        assert_eq!(names(&graph, CodeEntityKind::Function), vec!["foo", "bar"]);

        let foo = graph.entities.iter().find(|e| e.name == "foo").unwrap();
        assert_eq!(foo.id, "app:src/math.ts#function:foo");
        assert_eq!(foo.line_number, 1);
        assert!(foo.exported);
        let bar = graph.entities.iter().find(|e| e.name == "bar").unwrap();
        assert!(!bar.exported);
        assert_eq!(bar.line_number, 5);

        assert!(has_edge(
            &graph,
            "#function:foo",
            &RelationTarget::Symbol("bar".to_string()),
            CodeRelationKind::Calls
        ));
        assert!(has_edge(
            &graph,
            "#file:src/math.ts",
            &RelationTarget::Entity(foo.id.clone()),
            CodeRelationKind::Exports
        ));
    }

    #[test]
    fn test_classes_methods_and_heritage() {
        let graph = parse(
            "src/store.ts",
            "import { Base, Closeable } from './base';\n\
             export class Store extends Base implements Closeable {\n\
             \x20 open() { this.connect(); }\n\
             \x20 close = () => { release(); };\n\
             }\n",
        );

        assert_eq!(names(&graph, CodeEntityKind::Class), vec!["Store"]);
        assert_eq!(
            names(&graph, CodeEntityKind::Function),
            vec!["Store.open", "Store.close"]
        );
        assert!(has_edge(
            &graph,
            "#class:Store",
            &RelationTarget::Symbol("Base".to_string()),
            CodeRelationKind::Extends
        ));
        assert!(has_edge(
            &graph,
            "#class:Store",
            &RelationTarget::Symbol("Closeable".to_string()),
            CodeRelationKind::Implements
        ));
        assert!(has_edge(
            &graph,
            "#function:Store.open",
            &RelationTarget::Symbol("connect".to_string()),
            CodeRelationKind::Calls
        ));
        assert!(has_edge(
            &graph,
            "#file:src/store.ts",
            &RelationTarget::Module("./base".to_string()),
            CodeRelationKind::Imports
        ));
        assert!(has_edge(
            &graph,
            "#class:Store",
            &RelationTarget::Entity("app:src/store.ts#function:Store.open".to_string()),
            CodeRelationKind::Defines
        ));
    }

    #[test]
    fn test_types_variables_and_export_clause() {
        let graph = parse(
            "src/types.ts",
            "interface Options { a: number }\n\
             interface Options { b: string }\n\
             type Id = string;\n\
             enum Color { Red }\n\
             const limit = 10;\n\
             const handler = (x: Id) => log(x);\n\
             export { limit, handler };\n",
        );

        assert_eq!(names(&graph, CodeEntityKind::Interface), vec!["Options"]);
        assert_eq!(names(&graph, CodeEntityKind::Type), vec!["Id", "Color"]);
        assert_eq!(names(&graph, CodeEntityKind::Variable), vec!["limit"]);
        assert_eq!(names(&graph, CodeEntityKind::Function), vec!["handler"]);

        let exported: Vec<&str> = graph
            .entities
            .iter()
            .filter(|e| e.exported)
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(exported, vec!["limit", "handler"]);
        assert!(has_edge(
            &graph,
            "#function:handler",
            &RelationTarget::Symbol("log".to_string()),
            CodeRelationKind::Calls
        ));
    }

    #[test]
    fn test_repeated_calls_are_deduplicated() {
        let graph = parse("a.js", "function run() { step(); step(); step(); }\n");
        let calls = graph
            .relationships
            .iter()
            .filter(|r| r.kind == CodeRelationKind::Calls)
            .count();
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_top_level_calls_belong_to_the_file() {
        let graph = parse("main.mjs", "import { start } from 'server';\nstart();\n");
        assert!(has_edge(
            &graph,
            "#file:main.mjs",
            &RelationTarget::Symbol("start".to_string()),
            CodeRelationKind::Calls
        ));
        assert!(has_edge(
            &graph,
            "#file:main.mjs",
            &RelationTarget::Module("server".to_string()),
            CodeRelationKind::Imports
        ));
    }

    #[test]
    fn test_same_content_yields_same_ids() {
        let source = "export const a = () => b();\nfunction b() {}\n";
        let first = parse("x.ts", source);
        let second = parse("x.ts", source);
        assert_eq!(first.entities, second.entities);
        assert_eq!(first.relationships, second.relationships);
    }
}
