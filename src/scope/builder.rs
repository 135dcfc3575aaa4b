//! Symbol table construction
//!
//! Walks a tree-sitter syntax tree and records bindings, references and
//! import statements following Python's scoping rules:
//!
//! - Functions and lambdas open a new scope; parameter defaults and
//!   annotations evaluate in the enclosing scope.
//! - Class bodies open a scope that nested functions cannot see through.
//! - Comprehensions open their own scope; the first iterable evaluates in
//!   the enclosing scope, and comprehension variables do not leak.
//! - `global` and `nonlocal` redirect where assignments land.
//! - A walrus (`:=`) inside a comprehension binds in the nearest enclosing
//!   non-comprehension scope.
//!
//! References are recorded unresolved during the walk and resolved in one
//! pass at the end, so uses that precede their definition in source order
//! still bind (e.g. a call above the `def` it targets).

use tree_sitter::Node;

use crate::modules::{ImportPath, ImportRecord};
use crate::syntax::{self, SourceSpan};
use crate::Result;

use super::table::{BindingId, BindingKind, ScopeId, ScopeKind, SymbolTable};

/// Everything the analysis pass produces for one file.
#[derive(Debug)]
pub struct FileAnalysis {
    pub table: SymbolTable,
    pub imports: Vec<ImportRecord>,
    /// Syntax-error subtrees skipped during the walk.
    pub skipped: u32,
}

/// Builds a [`SymbolTable`] from Python source.
pub struct SymbolTableBuilder<'a> {
    source: &'a str,
    table: SymbolTable,
    imports: Vec<ImportRecord>,
    skipped: u32,
}

impl<'a> SymbolTableBuilder<'a> {
    /// Parse `source` and build its symbol table.
    pub fn analyze(source: &'a str) -> Result<FileAnalysis> {
        let tree = syntax::parse(source)?;
        let mut builder = Self {
            source,
            table: SymbolTable::new(),
            imports: Vec::new(),
            skipped: 0,
        };
        builder.walk(tree.root_node(), ScopeId::MODULE);
        let mut table = builder.table;
        table.resolve_references();
        Ok(FileAnalysis {
            table,
            imports: builder.imports,
            skipped: builder.skipped,
        })
    }

    fn text(&self, node: Node) -> &'a str {
        syntax::node_text(node, self.source)
    }

    /// Main dispatch; statements and expressions share one walker. The
    /// default arm recurses, so node kinds without binding behavior (loops,
    /// conditionals, operators, subscripts) need no cases of their own.
    fn walk(&mut self, node: Node, scope: ScopeId) {
        match node.kind() {
            "identifier" => {
                self.table.add_reference(scope, self.text(node), SourceSpan::of(node));
            }
            "attribute" => {
                // Only the object position names a variable; attribute
                // members are out of scope for name resolution.
                if let Some(object) = node.child_by_field_name("object") {
                    self.walk(object, scope);
                }
            }
            "keyword_argument" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.walk(value, scope);
                }
            }
            "string" => {
                // f-string interpolations are the only expressions inside
                // string literals.
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    if child.kind() == "interpolation" {
                        self.walk(child, scope);
                    }
                }
            }
            "function_definition" => self.function_definition(node, scope),
            "decorated_definition" => self.decorated_definition(node, scope),
            "class_definition" => self.class_definition(node, scope),
            "lambda" => self.lambda(node, scope),
            "assignment" => self.assignment(node, scope),
            "augmented_assignment" => self.augmented_assignment(node, scope),
            "named_expression" => self.named_expression(node, scope),
            "for_statement" => self.for_statement(node, scope),
            "as_pattern" => self.as_pattern(node, scope),
            "list_comprehension" | "set_comprehension" | "dictionary_comprehension"
            | "generator_expression" => self.comprehension(node, scope),
            "import_statement" => self.import_statement(node, scope),
            "import_from_statement" => self.import_from_statement(node, scope),
            "future_import_statement" => {}
            "global_statement" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.table.declare_global(scope, self.text(child));
                }
            }
            "nonlocal_statement" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.table.declare_nonlocal(scope, self.text(child));
                }
            }
            "ERROR" => {
                self.skipped += 1;
            }
            _ => {
                if node.is_missing() {
                    self.skipped += 1;
                    return;
                }
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.walk(child, scope);
                }
            }
        }
    }

    fn function_definition(&mut self, node: Node, scope: ScopeId) {
        let Some(name) = node.child_by_field_name("name") else {
            self.skipped += 1;
            return;
        };
        let binding = self.bind(scope, self.text(name), BindingKind::Function, SourceSpan::of(name));
        if let Some(body) = node.child_by_field_name("body") {
            self.table.binding_mut(binding).docstring = syntax::docstring(body, self.source);
        }
        // Defaults, annotations and the return type evaluate where the
        // `def` appears, not inside the new scope.
        if let Some(params) = node.child_by_field_name("parameters") {
            self.parameter_expressions(params, scope);
        }
        if let Some(return_type) = node.child_by_field_name("return_type") {
            self.walk(return_type, scope);
        }

        let func_scope = self.table.push_scope(scope, ScopeKind::Function);
        if let Some(params) = node.child_by_field_name("parameters") {
            self.bind_parameters(params, func_scope);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, func_scope);
        }
    }

    fn decorated_definition(&mut self, node: Node, scope: ScopeId) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "decorator" {
                self.walk(child, scope);
            }
        }
        if let Some(definition) = node.child_by_field_name("definition") {
            self.walk(definition, scope);
        }
    }

    fn class_definition(&mut self, node: Node, scope: ScopeId) {
        let Some(name) = node.child_by_field_name("name") else {
            self.skipped += 1;
            return;
        };
        let binding = self.bind(scope, self.text(name), BindingKind::Class, SourceSpan::of(name));
        if let Some(body) = node.child_by_field_name("body") {
            self.table.binding_mut(binding).docstring = syntax::docstring(body, self.source);
        }
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            self.walk(superclasses, scope);
        }

        let class_scope = self.table.push_scope(scope, ScopeKind::Class);
        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, class_scope);
        }
    }

    fn lambda(&mut self, node: Node, scope: ScopeId) {
        if let Some(params) = node.child_by_field_name("parameters") {
            self.parameter_expressions(params, scope);
        }
        let lambda_scope = self.table.push_scope(scope, ScopeKind::Function);
        if let Some(params) = node.child_by_field_name("parameters") {
            self.bind_parameters(params, lambda_scope);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, lambda_scope);
        }
    }

    /// Walk default values and annotations of a parameter list in the
    /// scope enclosing the function.
    fn parameter_expressions(&mut self, params: Node, scope: ScopeId) {
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            match param.kind() {
                "default_parameter" | "typed_default_parameter" => {
                    if let Some(value) = param.child_by_field_name("value") {
                        self.walk(value, scope);
                    }
                    if let Some(ty) = param.child_by_field_name("type") {
                        self.walk(ty, scope);
                    }
                }
                "typed_parameter" => {
                    if let Some(ty) = param.child_by_field_name("type") {
                        self.walk(ty, scope);
                    }
                }
                _ => {}
            }
        }
    }

    fn bind_parameters(&mut self, params: Node, scope: ScopeId) {
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let name = match param.kind() {
                "identifier" => Some(param),
                "typed_parameter" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                    param.named_child(0).filter(|n| n.kind() == "identifier")
                }
                "default_parameter" | "typed_default_parameter" => param
                    .child_by_field_name("name")
                    .filter(|n| n.kind() == "identifier"),
                // Bare `*` and `/` separators.
                _ => None,
            };
            if let Some(name) = name {
                self.bind(scope, self.text(name), BindingKind::Parameter, SourceSpan::of(name));
            }
        }
    }

    fn assignment(&mut self, node: Node, scope: ScopeId) {
        if let Some(right) = node.child_by_field_name("right") {
            self.walk(right, scope);
        }
        if let Some(ty) = node.child_by_field_name("type") {
            self.walk(ty, scope);
        }
        if let Some(left) = node.child_by_field_name("left") {
            self.bind_target(left, scope);
        }
    }

    fn augmented_assignment(&mut self, node: Node, scope: ScopeId) {
        if let Some(right) = node.child_by_field_name("right") {
            self.walk(right, scope);
        }
        if let Some(left) = node.child_by_field_name("left") {
            self.bind_target(left, scope);
        }
    }

    fn named_expression(&mut self, node: Node, scope: ScopeId) {
        if let Some(value) = node.child_by_field_name("value") {
            self.walk(value, scope);
        }
        if let Some(name) = node.child_by_field_name("name") {
            // A walrus binds past any comprehension scopes.
            let mut target = scope;
            while self.table.scope(target).kind == ScopeKind::Comprehension {
                match self.table.scope(target).parent {
                    Some(parent) => target = parent,
                    None => break,
                }
            }
            self.bind_target(name, target);
        }
    }

    fn for_statement(&mut self, node: Node, scope: ScopeId) {
        if let Some(right) = node.child_by_field_name("right") {
            self.walk(right, scope);
        }
        if let Some(left) = node.child_by_field_name("left") {
            self.bind_target(left, scope);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, scope);
        }
        if let Some(alternative) = node.child_by_field_name("alternative") {
            self.walk(alternative, scope);
        }
    }

    /// `expr as name`, as found in `with` items and `except` clauses.
    fn as_pattern(&mut self, node: Node, scope: ScopeId) {
        if let Some(value) = node.named_child(0) {
            self.walk(value, scope);
        }
        if let Some(alias) = node.child_by_field_name("alias") {
            if let Some(name) = alias.named_child(0).or(Some(alias)) {
                self.bind_target(name, scope);
            }
        }
    }

    fn comprehension(&mut self, node: Node, scope: ScopeId) {
        let comp_scope = self.table.push_scope(scope, ScopeKind::Comprehension);
        let mut cursor = node.walk();
        let mut first_clause = true;
        let mut body = Vec::new();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "for_in_clause" => {
                    if let Some(right) = child.child_by_field_name("right") {
                        // The leftmost iterable evaluates outside the
                        // comprehension.
                        self.walk(right, if first_clause { scope } else { comp_scope });
                    }
                    if let Some(left) = child.child_by_field_name("left") {
                        self.bind_target(left, comp_scope);
                    }
                    first_clause = false;
                }
                "if_clause" => {
                    if let Some(condition) = child.named_child(0) {
                        self.walk(condition, comp_scope);
                    }
                }
                // The element expression (or key/value pair) comes first in
                // source but evaluates inside the comprehension scope, so
                // walk it after the clauses that bind its variables.
                _ => body.push(child),
            }
        }
        for child in body {
            self.walk(child, comp_scope);
        }
    }

    /// Bind an assignment target, honoring `global`/`nonlocal` and
    /// destructuring. Attribute and subscript targets name no new variable
    /// and walk as plain expressions.
    fn bind_target(&mut self, node: Node, scope: ScopeId) {
        match node.kind() {
            "identifier" => {
                let name = self.text(node);
                let target = self.table.binding_scope(scope, name);
                self.table
                    .add_binding(target, name, BindingKind::Variable, SourceSpan::of(node));
            }
            "tuple_pattern" | "list_pattern" | "pattern_list" | "tuple" | "list" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.bind_target(child, scope);
                }
            }
            "list_splat_pattern" | "parenthesized_expression" => {
                if let Some(inner) = node.named_child(0) {
                    self.bind_target(inner, scope);
                }
            }
            _ => self.walk(node, scope),
        }
    }

    fn bind(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: BindingKind,
        span: SourceSpan,
    ) -> BindingId {
        let target = self.table.binding_scope(scope, name);
        self.table.add_binding(target, name, kind, span)
    }

    /// `import a.b [as alias]`
    fn import_statement(&mut self, node: Node, scope: ScopeId) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "dotted_name" => {
                    // `import a.b` binds the top-level package name `a`.
                    let Some(first) = child.named_child(0) else { continue };
                    self.bind_import(
                        scope,
                        self.text(first),
                        BindingKind::Module,
                        SourceSpan::of(first),
                        ImportPath::absolute(self.text(child)),
                        None,
                        false,
                    );
                }
                "aliased_import" => {
                    let (Some(name), Some(alias)) = (
                        child.child_by_field_name("name"),
                        child.child_by_field_name("alias"),
                    ) else {
                        continue;
                    };
                    self.bind_import(
                        scope,
                        self.text(alias),
                        BindingKind::Module,
                        SourceSpan::of(alias),
                        ImportPath::absolute(self.text(name)),
                        None,
                        false,
                    );
                }
                _ => {}
            }
        }
    }

    /// `from [.]*m import name [as alias], ... | *`
    fn import_from_statement(&mut self, node: Node, scope: ScopeId) {
        let Some(module_node) = node.child_by_field_name("module_name") else {
            self.skipped += 1;
            return;
        };
        let module = self.import_path(module_node);

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.id() == module_node.id() {
                continue;
            }
            match child.kind() {
                "wildcard_import" => {
                    self.imports.push(ImportRecord {
                        module: module.clone(),
                        imported: None,
                        binding: None,
                        wildcard: true,
                    });
                }
                "dotted_name" => {
                    self.bind_import(
                        scope,
                        self.text(child),
                        BindingKind::ImportAlias,
                        SourceSpan::of(child),
                        module.clone(),
                        Some(self.text(child).to_string()),
                        false,
                    );
                }
                "aliased_import" => {
                    let (Some(name), Some(alias)) = (
                        child.child_by_field_name("name"),
                        child.child_by_field_name("alias"),
                    ) else {
                        continue;
                    };
                    self.bind_import(
                        scope,
                        self.text(alias),
                        BindingKind::ImportAlias,
                        SourceSpan::of(alias),
                        module.clone(),
                        Some(self.text(name).to_string()),
                        false,
                    );
                }
                _ => {}
            }
        }
    }

    /// Dotted or relative module path of a `from` clause.
    fn import_path(&self, node: Node) -> ImportPath {
        if node.kind() == "relative_import" {
            let mut level = 0;
            let mut dotted = String::new();
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                match child.kind() {
                    "import_prefix" => {
                        level = self.text(child).chars().filter(|c| *c == '.').count() as u32;
                    }
                    "dotted_name" => dotted = self.text(child).to_string(),
                    _ => {}
                }
            }
            ImportPath { level, dotted }
        } else {
            ImportPath::absolute(self.text(node))
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn bind_import(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: BindingKind,
        span: SourceSpan,
        module: ImportPath,
        imported: Option<String>,
        wildcard: bool,
    ) {
        let index = self.imports.len();
        let binding = self.bind(scope, name, kind, span);
        self.table.binding_mut(binding).import = Some(index);
        self.imports.push(ImportRecord {
            module,
            imported,
            binding: Some(binding),
            wildcard,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::table::Resolution;

    fn analyze(source: &str) -> FileAnalysis {
        SymbolTableBuilder::analyze(source).unwrap()
    }

    fn resolved(analysis: &FileAnalysis, name: &str) -> Vec<Option<BindingId>> {
        analysis
            .table
            .references()
            .iter()
            .filter(|r| r.name == name)
            .map(|r| match r.resolution {
                Resolution::Local(b) => Some(b),
                Resolution::Unresolved => None,
            })
            .collect()
    }

    #[test]
    fn test_module_level_binding_and_reference() {
        let analysis = analyze("x = 1\nprint(x)\n");
        let (id, binding) = analysis
            .table
            .bindings()
            .find(|(_, b)| b.name == "x")
            .unwrap();
        assert_eq!(binding.kind, BindingKind::Variable);
        assert_eq!(resolved(&analysis, "x"), vec![Some(id)]);
        assert_eq!(resolved(&analysis, "print"), vec![None]);
    }

    #[test]
    fn test_use_before_def_resolves() {
        let analysis = analyze("def caller():\n    target()\n\ndef target():\n    pass\n");
        let (id, _) = analysis
            .table
            .bindings()
            .find(|(_, b)| b.name == "target")
            .unwrap();
        assert_eq!(resolved(&analysis, "target"), vec![Some(id)]);
    }

    #[test]
    fn test_rebinding_shadows_earlier_binding() {
        let analysis = analyze("x = 1\nx = 2\ny = x\n");
        let bindings: Vec<_> = analysis
            .table
            .bindings()
            .filter(|(_, b)| b.name == "x")
            .map(|(id, _)| id)
            .collect();
        assert_eq!(bindings.len(), 2);
        assert_eq!(resolved(&analysis, "x"), vec![Some(bindings[1])]);
    }

    #[test]
    fn test_function_scope_does_not_leak() {
        let analysis = analyze("def f():\n    local = 1\n\nother = local\n");
        assert_eq!(resolved(&analysis, "local"), vec![None]);
    }

    #[test]
    fn test_class_scope_skipped_from_methods() {
        let source = "\
class C:
    attr = 1
    def method(self):
        return attr
";
        let analysis = analyze(source);
        // `attr` inside the method must not see the class-body binding.
        assert_eq!(resolved(&analysis, "attr"), vec![None]);
    }

    #[test]
    fn test_nested_function_sees_enclosing_function() {
        let source = "\
def outer():
    captured = 1
    def inner():
        return captured
";
        let analysis = analyze(source);
        let (id, _) = analysis
            .table
            .bindings()
            .find(|(_, b)| b.name == "captured")
            .unwrap();
        assert_eq!(resolved(&analysis, "captured"), vec![Some(id)]);
    }

    #[test]
    fn test_parameters_bind_in_function_scope() {
        let analysis = analyze("def f(a, b=fallback, *args, **kwargs):\n    return a + b\n");
        let kinds: Vec<_> = analysis
            .table
            .bindings()
            .filter(|(_, b)| b.kind == BindingKind::Parameter)
            .map(|(_, b)| b.name.clone())
            .collect();
        assert_eq!(kinds, vec!["a", "b", "args", "kwargs"]);
        // The default expression evaluates outside the function.
        assert_eq!(resolved(&analysis, "fallback"), vec![None]);
        assert!(resolved(&analysis, "a").iter().all(Option::is_some));
    }

    #[test]
    fn test_comprehension_variable_does_not_leak() {
        let analysis = analyze("values = [i for i in source]\nafter = i\n");
        // The right-hand side walks first, so the comprehension variable is
        // the file's first binding. The trailing use of `i` is outside the
        // comprehension and stays unresolved.
        assert_eq!(resolved(&analysis, "i"), vec![Some(BindingId(0)), None]);
        // The first iterable resolves in module scope.
        assert_eq!(resolved(&analysis, "source"), vec![None]);
    }

    #[test]
    fn test_first_iterable_in_outer_scope() {
        let source = "items = []\npairs = [x for x in items for y in x]\n";
        let analysis = analyze(source);
        let (items, _) = analysis
            .table
            .bindings()
            .find(|(_, b)| b.name == "items")
            .unwrap();
        assert_eq!(resolved(&analysis, "items"), vec![Some(items)]);
    }

    #[test]
    fn test_walrus_escapes_comprehension() {
        let analysis = analyze("found = [y for x in data if (y := x)]\nuse = y\n");
        let y_bindings: Vec<_> = analysis
            .table
            .bindings()
            .filter(|(_, b)| b.name == "y")
            .map(|(id, b)| (id, b.scope))
            .collect();
        assert_eq!(y_bindings.len(), 1);
        assert_eq!(y_bindings[0].1, ScopeId::MODULE);
        // Both the comprehension body and the trailing use see it.
        assert_eq!(
            resolved(&analysis, "y"),
            vec![Some(y_bindings[0].0), Some(y_bindings[0].0)]
        );
    }

    #[test]
    fn test_global_redirects_assignment() {
        let source = "\
counter = 0
def bump():
    global counter
    counter = 1
";
        let analysis = analyze(source);
        let scopes: Vec<_> = analysis
            .table
            .bindings()
            .filter(|(_, b)| b.name == "counter")
            .map(|(_, b)| b.scope)
            .collect();
        assert_eq!(scopes, vec![ScopeId::MODULE, ScopeId::MODULE]);
    }

    #[test]
    fn test_imports_recorded() {
        let source = "\
import os
import collections.abc as abc
from pkg.mod import name, other as alias
from ..rel import thing
from pkg import *
";
        let analysis = analyze(source);
        let imports = &analysis.imports;
        assert_eq!(imports.len(), 6);

        assert_eq!(imports[0].module, ImportPath::absolute("os"));
        assert_eq!(imports[0].imported, None);

        assert_eq!(imports[1].module, ImportPath::absolute("collections.abc"));
        let abc = imports[1].binding.unwrap();
        assert_eq!(analysis.table.binding(abc).name, "abc");
        assert_eq!(analysis.table.binding(abc).kind, BindingKind::Module);

        assert_eq!(imports[2].imported.as_deref(), Some("name"));
        assert_eq!(imports[3].imported.as_deref(), Some("other"));
        let alias = imports[3].binding.unwrap();
        assert_eq!(analysis.table.binding(alias).name, "alias");

        assert_eq!(imports[4].module.level, 2);
        assert_eq!(imports[4].module.dotted, "rel");

        assert!(imports[5].wildcard);
        assert!(imports[5].binding.is_none());
    }

    #[test]
    fn test_with_and_except_targets_bind() {
        let source = "\
with open(path) as handle:
    handle.read()
try:
    pass
except ValueError as err:
    print(err)
";
        let analysis = analyze(source);
        assert!(analysis.table.bindings().any(|(_, b)| b.name == "handle"));
        assert!(analysis.table.bindings().any(|(_, b)| b.name == "err"));
        assert!(resolved(&analysis, "handle").iter().all(Option::is_some));
        assert!(resolved(&analysis, "err").iter().all(Option::is_some));
    }

    #[test]
    fn test_attribute_object_only() {
        let analysis = analyze("obj = make()\nobj.field.method()\n");
        // `field` and `method` never appear as references.
        assert!(resolved(&analysis, "field").is_empty());
        assert!(resolved(&analysis, "method").is_empty());
        assert_eq!(resolved(&analysis, "obj").len(), 1);
    }

    #[test]
    fn test_docstrings_attach_to_defs() {
        let source = "\
def documented():
    \"\"\"Does a thing.\"\"\"
    pass

class Holder:
    '''Holds things.'''
";
        let analysis = analyze(source);
        let func = analysis
            .table
            .bindings()
            .find(|(_, b)| b.name == "documented")
            .unwrap()
            .1;
        assert_eq!(func.docstring.as_deref(), Some("Does a thing."));
        let class = analysis
            .table
            .bindings()
            .find(|(_, b)| b.name == "Holder")
            .unwrap()
            .1;
        assert_eq!(class.docstring.as_deref(), Some("Holds things."));
    }
}
