//! Per-file scope and binding analysis.
//!
//! `table` holds the scope tree, bindings and references for one file;
//! `builder` populates it from a tree-sitter syntax tree following
//! Python's scoping rules. Both live only for the duration of a single
//! file's analysis pass.

pub mod builder;
pub mod table;

pub use builder::{FileAnalysis, SymbolTableBuilder};
pub use table::{
    Binding, BindingId, BindingKind, Reference, Resolution, Scope, ScopeId, ScopeKind, SymbolTable,
};
