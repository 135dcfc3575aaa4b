//! Import and module resolution
//!
//! Maps the import statements recorded during per-file analysis onto files
//! inside the workspace, or marks them external. The resulting table is
//! built once after the analysis pass and never mutated afterwards.

use std::collections::BTreeMap;

use crate::scope::BindingId;
use crate::workspace::{FileId, Workspace, WorkspaceFile};

/// A dotted import path, possibly relative (`level` leading dots).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPath {
    /// Number of leading dots; zero for absolute imports.
    pub level: u32,
    /// Dotted module path after the dots; may be empty for `from . import x`.
    pub dotted: String,
}

impl ImportPath {
    pub fn absolute(dotted: impl Into<String>) -> Self {
        Self {
            level: 0,
            dotted: dotted.into(),
        }
    }
}

/// One name introduced by an import statement.
#[derive(Debug, Clone)]
pub struct ImportRecord {
    pub module: ImportPath,
    /// `Some(name)` for `from m import name`; `None` when the module
    /// itself is bound (`import m`).
    pub imported: Option<String>,
    /// The alias binding this import produced, if any.
    pub binding: Option<BindingId>,
    /// `from m import *`
    pub wildcard: bool,
}

/// Where an import path leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleTarget {
    /// A file inside the workspace.
    File(FileId),
    /// Outside the workspace (standard library, third-party, unknown).
    External,
}

/// Workspace-wide dotted-module index.
#[derive(Debug)]
pub struct ModuleResolver {
    /// Candidates per dotted name, ordered by shortest relative path then
    /// lexicographic path, so ambiguous names resolve deterministically.
    by_module: BTreeMap<String, Vec<FileId>>,
}

impl ModuleResolver {
    pub fn new(workspace: &Workspace) -> Self {
        let mut by_module: BTreeMap<String, Vec<FileId>> = BTreeMap::new();
        for (id, file) in workspace.files() {
            by_module.entry(file.module_name()).or_default().push(id);
        }
        for candidates in by_module.values_mut() {
            candidates.sort_by_key(|id| {
                let rel = &workspace.file(*id).rel;
                (rel.split('/').count(), rel.clone())
            });
        }
        Self { by_module }
    }

    /// Resolve an import path as seen from `importer`.
    ///
    /// Returns the target and whether the dotted name was ambiguous.
    pub fn resolve(&self, importer: &WorkspaceFile, path: &ImportPath) -> (ModuleTarget, bool) {
        let key = match self.dotted_key(importer, path) {
            Some(key) => key,
            None => return (ModuleTarget::External, false),
        };
        match self.by_module.get(&key) {
            Some(candidates) if candidates.len() == 1 => (ModuleTarget::File(candidates[0]), false),
            Some(candidates) => (ModuleTarget::File(candidates[0]), true),
            None => (ModuleTarget::External, false),
        }
    }

    fn dotted_key(&self, importer: &WorkspaceFile, path: &ImportPath) -> Option<String> {
        if path.level == 0 {
            return (!path.dotted.is_empty()).then(|| path.dotted.clone());
        }
        // Relative import: start from the importer's package.
        let mut base = importer.module.clone();
        if !importer.is_package {
            base.pop();
        }
        for _ in 1..path.level {
            base.pop()?;
        }
        if !path.dotted.is_empty() {
            base.extend(path.dotted.split('.').map(str::to_string));
        }
        (!base.is_empty()).then(|| base.join("."))
    }
}

/// Resolved import targets for every file, indexed in parallel with each
/// file's import records. Immutable after construction.
#[derive(Debug)]
pub struct ModuleTable {
    targets: Vec<Vec<ModuleTarget>>,
    /// Count of imports whose dotted name matched more than one file.
    pub ambiguous: usize,
}

impl ModuleTable {
    pub fn build<'a, I>(workspace: &Workspace, imports_per_file: I) -> Self
    where
        I: Iterator<Item = (FileId, &'a [ImportRecord])>,
    {
        let resolver = ModuleResolver::new(workspace);
        let mut targets = vec![Vec::new(); workspace.len()];
        let mut ambiguous = 0;
        for (file, imports) in imports_per_file {
            let importer = workspace.file(file);
            let resolved = imports
                .iter()
                .map(|record| {
                    let (target, was_ambiguous) = resolver.resolve(importer, &record.module);
                    if was_ambiguous {
                        ambiguous += 1;
                        tracing::warn!(
                            "ambiguous import in {}: {} matches multiple files",
                            importer.rel,
                            record.module.dotted
                        );
                    }
                    target
                })
                .collect();
            targets[file.0 as usize] = resolved;
        }
        Self { targets, ambiguous }
    }

    pub fn target(&self, file: FileId, import: usize) -> ModuleTarget {
        self.targets[file.0 as usize][import]
    }
}
