//! Symbol table for a single file
//!
//! The table tracks:
//! - Scope hierarchy (parent/child relationships)
//! - Bindings within each scope (last write wins)
//! - References and their resolution state

use std::collections::{HashMap, HashSet};

use crate::syntax::SourceSpan;

/// Unique identifier for a scope within one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl ScopeId {
    /// The module (root) scope.
    pub const MODULE: ScopeId = ScopeId(0);
}

/// Unique identifier for a binding within one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub u32);

/// The kind of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Module/file level scope
    Module,
    /// Class body scope
    Class,
    /// Function or lambda scope
    Function,
    /// Comprehension or generator expression scope
    Comprehension,
}

/// The kind of a binding occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Variable,
    Function,
    Class,
    Parameter,
    /// `from m import name [as alias]`
    ImportAlias,
    /// `import m [as alias]`
    Module,
}

/// A lexical scope.
#[derive(Debug)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub kind: ScopeKind,
    /// Final binding per name; rebinding in the same scope shadows.
    names: HashMap<String, BindingId>,
    /// Names declared `global` in this scope.
    globals: HashSet<String>,
    /// Names declared `nonlocal` in this scope.
    nonlocals: HashSet<String>,
}

/// A definition occurrence of a name.
#[derive(Debug)]
pub struct Binding {
    pub scope: ScopeId,
    pub name: String,
    pub kind: BindingKind,
    pub span: SourceSpan,
    /// Index into the file's import records, for import bindings.
    pub import: Option<usize>,
    /// Docstring for function/class bindings, used for hover tooltips.
    pub docstring: Option<String>,
}

/// Resolution state of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Bound to a definition in this file.
    Local(BindingId),
    /// No local binding; candidate for cross-file resolution.
    Unresolved,
}

/// A name-use occurrence.
#[derive(Debug)]
pub struct Reference {
    pub scope: ScopeId,
    pub name: String,
    pub span: SourceSpan,
    pub resolution: Resolution,
}

/// Scope tree, bindings and references for one file.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    bindings: Vec<Binding>,
    references: Vec<Reference>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Create a table with a root module scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                parent: None,
                kind: ScopeKind::Module,
                names: HashMap::new(),
                globals: HashSet::new(),
                nonlocals: HashSet::new(),
            }],
            bindings: Vec::new(),
            references: Vec::new(),
        }
    }

    /// Create a new child scope.
    pub fn push_scope(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent: Some(parent),
            kind,
            names: HashMap::new(),
            globals: HashSet::new(),
            nonlocals: HashSet::new(),
        });
        id
    }

    /// Record a binding occurrence; shadows any prior binding of the same
    /// name in the scope.
    pub fn add_binding(
        &mut self,
        scope: ScopeId,
        name: impl Into<String>,
        kind: BindingKind,
        span: SourceSpan,
    ) -> BindingId {
        let name = name.into();
        let id = BindingId(self.bindings.len() as u32);
        self.scopes[scope.0 as usize].names.insert(name.clone(), id);
        self.bindings.push(Binding {
            scope,
            name,
            kind,
            span,
            import: None,
            docstring: None,
        });
        id
    }

    /// Record a name-use occurrence; resolution happens after the walk.
    pub fn add_reference(&mut self, scope: ScopeId, name: impl Into<String>, span: SourceSpan) {
        self.references.push(Reference {
            scope,
            name: name.into(),
            span,
            resolution: Resolution::Unresolved,
        });
    }

    pub fn declare_global(&mut self, scope: ScopeId, name: impl Into<String>) {
        self.scopes[scope.0 as usize].globals.insert(name.into());
    }

    pub fn declare_nonlocal(&mut self, scope: ScopeId, name: impl Into<String>) {
        self.scopes[scope.0 as usize].nonlocals.insert(name.into());
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.bindings[id.0 as usize]
    }

    pub fn binding_mut(&mut self, id: BindingId) -> &mut Binding {
        &mut self.bindings[id.0 as usize]
    }

    /// All bindings in source order.
    pub fn bindings(&self) -> impl Iterator<Item = (BindingId, &Binding)> {
        self.bindings
            .iter()
            .enumerate()
            .map(|(i, b)| (BindingId(i as u32), b))
    }

    /// All references in source order.
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// Final binding of `name` directly in `scope` (no chain walk).
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<BindingId> {
        self.scope(scope).names.get(name).copied()
    }

    /// The scope a binding of `name` written in `scope` actually lands in,
    /// honoring `global` and `nonlocal` declarations.
    pub fn binding_scope(&self, scope: ScopeId, name: &str) -> ScopeId {
        let s = self.scope(scope);
        if s.globals.contains(name) {
            return ScopeId::MODULE;
        }
        if s.nonlocals.contains(name) {
            if let Some(target) = self.enclosing_function(scope) {
                return target;
            }
        }
        scope
    }

    /// Nearest enclosing function scope, excluding `scope` itself.
    fn enclosing_function(&self, scope: ScopeId) -> Option<ScopeId> {
        let mut current = self.scope(scope).parent;
        while let Some(id) = current {
            if self.scope(id).kind == ScopeKind::Function {
                return Some(id);
            }
            current = self.scope(id).parent;
        }
        None
    }

    /// Resolve a name used in `scope` by walking the scope chain outward.
    ///
    /// Class scopes are skipped unless the use occurs directly in the class
    /// body: Python excludes class bodies from the enclosing-scope chain of
    /// nested functions (and comprehensions).
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<BindingId> {
        let start = self.binding_scope(scope, name);
        let mut current = Some(start);
        while let Some(id) = current {
            let s = self.scope(id);
            if id == start || s.kind != ScopeKind::Class {
                if let Some(binding) = s.names.get(name) {
                    return Some(*binding);
                }
            }
            current = s.parent;
        }
        None
    }

    /// Resolve every recorded reference against the completed scope tree.
    pub fn resolve_references(&mut self) {
        for i in 0..self.references.len() {
            let (scope, name) = {
                let r = &self.references[i];
                (r.scope, r.name.clone())
            };
            if let Some(binding) = self.lookup(scope, &name) {
                self.references[i].resolution = Resolution::Local(binding);
            }
        }
    }

    /// Names bound at module scope, for the cross-file export index.
    pub fn module_exports(&self) -> impl Iterator<Item = (&str, BindingId)> {
        self.scopes[0]
            .names
            .iter()
            .map(|(name, id)| (name.as_str(), *id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(line: u32) -> SourceSpan {
        SourceSpan {
            line,
            start_col: 0,
            end_col: 1,
        }
    }

    #[test]
    fn test_scope_hierarchy() {
        let mut table = SymbolTable::new();
        let class_scope = table.push_scope(ScopeId::MODULE, ScopeKind::Class);
        let method_scope = table.push_scope(class_scope, ScopeKind::Function);

        assert_eq!(table.scope(method_scope).parent, Some(class_scope));
        assert_eq!(table.scope(class_scope).parent, Some(ScopeId::MODULE));
        assert_eq!(table.scope(ScopeId::MODULE).parent, None);
    }

    #[test]
    fn test_chain_lookup() {
        let mut table = SymbolTable::new();
        let func = table.push_scope(ScopeId::MODULE, ScopeKind::Function);
        let global = table.add_binding(ScopeId::MODULE, "g", BindingKind::Variable, span(0));
        let local = table.add_binding(func, "x", BindingKind::Variable, span(1));

        assert_eq!(table.lookup(func, "x"), Some(local));
        assert_eq!(table.lookup(func, "g"), Some(global));
        assert_eq!(table.lookup(ScopeId::MODULE, "x"), None);
    }

    #[test]
    fn test_rebinding_shadows() {
        let mut table = SymbolTable::new();
        table.add_binding(ScopeId::MODULE, "x", BindingKind::Variable, span(0));
        let second = table.add_binding(ScopeId::MODULE, "x", BindingKind::Variable, span(1));
        assert_eq!(table.lookup(ScopeId::MODULE, "x"), Some(second));
        // Both occurrences are still recorded.
        assert_eq!(table.bindings().count(), 2);
    }

    #[test]
    fn test_class_scope_skipped_from_nested_function() {
        let mut table = SymbolTable::new();
        let class_scope = table.push_scope(ScopeId::MODULE, ScopeKind::Class);
        let method_scope = table.push_scope(class_scope, ScopeKind::Function);
        table.add_binding(class_scope, "attr", BindingKind::Variable, span(1));

        // Visible in the class body itself, not from the method.
        assert!(table.lookup(class_scope, "attr").is_some());
        assert_eq!(table.lookup(method_scope, "attr"), None);
    }

    #[test]
    fn test_global_declaration_redirects() {
        let mut table = SymbolTable::new();
        let func = table.push_scope(ScopeId::MODULE, ScopeKind::Function);
        let module_x = table.add_binding(ScopeId::MODULE, "x", BindingKind::Variable, span(0));
        table.declare_global(func, "x");

        assert_eq!(table.binding_scope(func, "x"), ScopeId::MODULE);
        assert_eq!(table.lookup(func, "x"), Some(module_x));
    }

    #[test]
    fn test_resolution_marks_unresolved() {
        let mut table = SymbolTable::new();
        table.add_reference(ScopeId::MODULE, "missing", span(0));
        table.resolve_references();
        assert_eq!(table.references()[0].resolution, Resolution::Unresolved);
    }
}
