//! Cross-file linking
//!
//! Connects import aliases and wildcard-satisfied references to the
//! module-scope definitions they name in other workspace files. Runs once
//! after every file has been analyzed and the module table is built.
//!
//! Aliases that re-export another import are chased through the chain
//! until a real definition is found; a visited set stops cyclic re-export
//! chains. Anything that cannot be chased to a workspace definition is
//! treated as external.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::modules::{ModuleTable, ModuleTarget};
use crate::scope::{BindingId, FileAnalysis, Resolution};
use crate::workspace::{FileId, Workspace};

/// Workspace-wide identity of a module-scope definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

/// A definition reachable from other files.
#[derive(Debug)]
pub struct GlobalSymbol {
    pub file: FileId,
    pub binding: BindingId,
    pub name: String,
    /// Dotted module name of the defining file.
    pub module: String,
}

/// Linking results, indexed in parallel with the workspace file list.
#[derive(Debug)]
pub struct LinkOutcome {
    /// Symbols actually reached from another file, in first-resolution
    /// order (files in order, bindings then references within a file), so
    /// numbering is stable across runs.
    pub symbols: Vec<GlobalSymbol>,
    /// Per file: canonical module-scope binding -> its symbol.
    pub canonical: Vec<HashMap<BindingId, SymbolId>>,
    /// Per file: import-alias binding -> the symbol it ultimately names.
    pub alias_targets: Vec<HashMap<BindingId, SymbolId>>,
    /// Per file: index of an unresolved reference -> the symbol a wildcard
    /// import supplies for it.
    pub ref_targets: Vec<HashMap<usize, SymbolId>>,
    pub stats: LinkStats,
}

impl LinkOutcome {
    pub fn symbol(&self, id: SymbolId) -> &GlobalSymbol {
        &self.symbols[id.0 as usize]
    }
}

/// Counters reported after linking.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkStats {
    pub symbols: usize,
    pub linked_aliases: usize,
    pub external_aliases: usize,
    pub wildcard_references: usize,
}

impl fmt::Display for LinkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} symbols, {} aliases linked, {} external, {} references via wildcard imports",
            self.symbols, self.linked_aliases, self.external_aliases, self.wildcard_references
        )
    }
}

/// Runs the linking pass.
pub struct Linker<'a> {
    workspace: &'a Workspace,
    analyses: &'a [Option<&'a FileAnalysis>],
    modules: &'a ModuleTable,
    /// Per file: final module-scope binding per exported name.
    exports: Vec<HashMap<String, BindingId>>,
    symbol_of: HashMap<(usize, BindingId), SymbolId>,
    symbols: Vec<GlobalSymbol>,
}

impl<'a> Linker<'a> {
    pub fn link(
        workspace: &'a Workspace,
        analyses: &'a [Option<&'a FileAnalysis>],
        modules: &'a ModuleTable,
    ) -> LinkOutcome {
        let mut linker = Self {
            workspace,
            analyses,
            modules,
            exports: Vec::new(),
            symbols: Vec::new(),
            symbol_of: HashMap::new(),
        };
        linker.collect_exports();
        linker.resolve()
    }

    fn collect_exports(&mut self) {
        self.exports = self
            .analyses
            .iter()
            .map(|analysis| match analysis {
                Some(analysis) => analysis
                    .table
                    .module_exports()
                    .map(|(name, id)| (name.to_string(), id))
                    .collect(),
                None => HashMap::new(),
            })
            .collect();
    }

    /// Get or create the symbol for a canonical definition. Symbols are
    /// created only when something in another file resolves to them, so a
    /// binding referenced purely within its own file never gets one.
    fn intern(&mut self, file_idx: usize, binding: BindingId, name: &str) -> SymbolId {
        if let Some(&symbol) = self.symbol_of.get(&(file_idx, binding)) {
            return symbol;
        }
        let id = SymbolId(self.symbols.len() as u32);
        let file = FileId(file_idx as u32);
        self.symbols.push(GlobalSymbol {
            file,
            binding,
            name: name.to_string(),
            module: self.workspace.file(file).module_name(),
        });
        self.symbol_of.insert((file_idx, binding), id);
        id
    }

    fn resolve(mut self) -> LinkOutcome {
        let file_count = self.analyses.len();
        let mut alias_targets = vec![HashMap::new(); file_count];
        let mut ref_targets = vec![HashMap::new(); file_count];
        let mut stats = LinkStats::default();

        for file_idx in 0..file_count {
            let Some(analysis) = self.analyses[file_idx] else { continue };

            for (binding_id, binding) in analysis.table.bindings() {
                if binding.import.is_none() {
                    continue;
                }
                let mut visited = HashSet::new();
                match self.resolve_alias(file_idx, binding_id, &mut visited) {
                    Some(symbol) => {
                        alias_targets[file_idx].insert(binding_id, symbol);
                        stats.linked_aliases += 1;
                    }
                    None => stats.external_aliases += 1,
                }
            }

            for (ref_idx, reference) in analysis.table.references().iter().enumerate() {
                if reference.resolution != Resolution::Unresolved {
                    continue;
                }
                let mut visited = HashSet::new();
                if let Some(symbol) =
                    self.resolve_via_wildcards(file_idx, &reference.name, &mut visited)
                {
                    ref_targets[file_idx].insert(ref_idx, symbol);
                    stats.wildcard_references += 1;
                }
            }
        }

        stats.symbols = self.symbols.len();
        let canonical = {
            let mut per_file = vec![HashMap::new(); file_count];
            for (&(file_idx, binding), &symbol) in &self.symbol_of {
                per_file[file_idx].insert(binding, symbol);
            }
            per_file
        };

        tracing::debug!("linked workspace: {stats}");
        LinkOutcome {
            symbols: self.symbols,
            canonical,
            alias_targets,
            ref_targets,
            stats,
        }
    }

    /// Chase an import-alias binding to the definition it names.
    fn resolve_alias(
        &mut self,
        file_idx: usize,
        binding: BindingId,
        visited: &mut HashSet<(usize, String)>,
    ) -> Option<SymbolId> {
        let analysis = self.analyses[file_idx]?;
        let import_idx = analysis.table.binding(binding).import?;
        // `import m` binds a module object, not a definition; treated like
        // an external name.
        let imported = analysis.imports[import_idx].imported.clone()?;
        let target = match self.modules.target(FileId(file_idx as u32), import_idx) {
            ModuleTarget::File(file) => file,
            ModuleTarget::External => return None,
        };
        self.resolve_name(target.0 as usize, &imported, visited)
    }

    /// Find the definition `name` denotes in `file_idx`'s module scope,
    /// chasing re-exports and falling back to wildcard imports.
    fn resolve_name(
        &mut self,
        file_idx: usize,
        name: &str,
        visited: &mut HashSet<(usize, String)>,
    ) -> Option<SymbolId> {
        if !visited.insert((file_idx, name.to_string())) {
            return None;
        }
        if let Some(&binding) = self.exports[file_idx].get(name) {
            let analysis = self.analyses[file_idx]?;
            if analysis.table.binding(binding).import.is_some() {
                return self.resolve_alias(file_idx, binding, visited);
            }
            return Some(self.intern(file_idx, binding, name));
        }
        self.resolve_via_wildcards(file_idx, name, visited)
    }

    fn resolve_via_wildcards(
        &mut self,
        file_idx: usize,
        name: &str,
        visited: &mut HashSet<(usize, String)>,
    ) -> Option<SymbolId> {
        let analysis = self.analyses[file_idx]?;
        for (import_idx, record) in analysis.imports.iter().enumerate() {
            if !record.wildcard {
                continue;
            }
            let target = match self.modules.target(FileId(file_idx as u32), import_idx) {
                ModuleTarget::File(file) => file,
                ModuleTarget::External => continue,
            };
            if let Some(symbol) = self.resolve_name(target.0 as usize, name, visited) {
                return Some(symbol);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::scope::SymbolTableBuilder;
    use crate::workspace::WorkspaceFile;

    fn build(files: &[(&str, &str)]) -> (Workspace, Vec<FileAnalysis>, ModuleTable) {
        let workspace_files = files
            .iter()
            .map(|(rel, _)| {
                let module: Vec<String> = rel
                    .trim_end_matches(".py")
                    .split('/')
                    .map(str::to_string)
                    .collect();
                WorkspaceFile {
                    path: PathBuf::from(format!("/w/{rel}")),
                    rel: rel.to_string(),
                    module,
                    is_package: false,
                }
            })
            .collect();
        let workspace = Workspace::from_files(PathBuf::from("/w"), workspace_files);
        let analyses: Vec<FileAnalysis> = files
            .iter()
            .map(|(_, source)| SymbolTableBuilder::analyze(source).unwrap())
            .collect();
        let modules = ModuleTable::build(
            &workspace,
            analyses
                .iter()
                .enumerate()
                .map(|(i, a)| (FileId(i as u32), a.imports.as_slice())),
        );
        (workspace, analyses, modules)
    }

    fn link(
        workspace: &Workspace,
        analyses: &[FileAnalysis],
        modules: &ModuleTable,
    ) -> LinkOutcome {
        let refs: Vec<Option<&FileAnalysis>> = analyses.iter().map(Some).collect();
        Linker::link(workspace, &refs, modules)
    }

    fn alias_of<'a>(
        outcome: &'a LinkOutcome,
        analyses: &[FileAnalysis],
        file: usize,
        name: &str,
    ) -> Option<&'a GlobalSymbol> {
        let binding = analyses[file].table.lookup_local(
            crate::scope::ScopeId::MODULE,
            name,
        )?;
        let symbol = outcome.alias_targets[file].get(&binding)?;
        Some(outcome.symbol(*symbol))
    }

    #[test]
    fn test_from_import_links_to_definition() {
        let (ws, analyses, modules) = build(&[
            ("a.py", "from b import helper\nhelper()\n"),
            ("b.py", "def helper():\n    pass\n"),
        ]);
        let outcome = link(&ws, &analyses, &modules);

        let symbol = alias_of(&outcome, &analyses, 0, "helper").unwrap();
        assert_eq!(symbol.file, FileId(1));
        assert_eq!(symbol.name, "helper");
        assert_eq!(symbol.module, "b");
        assert_eq!(outcome.stats.linked_aliases, 1);
    }

    #[test]
    fn test_reexport_chain_is_chased() {
        let (ws, analyses, modules) = build(&[
            ("a.py", "from c import thing\n"),
            ("b.py", "thing = 1\n"),
            ("c.py", "from b import thing\n"),
        ]);
        let outcome = link(&ws, &analyses, &modules);

        let symbol = alias_of(&outcome, &analyses, 0, "thing").unwrap();
        assert_eq!(symbol.file, FileId(1));
        // Both aliases point at the same canonical symbol.
        let via_c = alias_of(&outcome, &analyses, 2, "thing").unwrap();
        assert_eq!(via_c.file, symbol.file);
        assert_eq!(outcome.stats.linked_aliases, 2);
    }

    #[test]
    fn test_cyclic_reexports_resolve_external() {
        let (ws, analyses, modules) = build(&[
            ("a.py", "from b import x\n"),
            ("b.py", "from a import x\n"),
        ]);
        let outcome = link(&ws, &analyses, &modules);
        assert_eq!(outcome.stats.linked_aliases, 0);
        assert_eq!(outcome.stats.external_aliases, 2);
    }

    #[test]
    fn test_wildcard_import_satisfies_reference() {
        let (ws, analyses, modules) = build(&[
            ("a.py", "from b import *\nshared()\n"),
            ("b.py", "def shared():\n    pass\n"),
        ]);
        let outcome = link(&ws, &analyses, &modules);

        assert_eq!(outcome.stats.wildcard_references, 1);
        let (&ref_idx, &symbol) = outcome.ref_targets[0].iter().next().unwrap();
        assert_eq!(analyses[0].table.references()[ref_idx].name, "shared");
        assert_eq!(outcome.symbol(symbol).file, FileId(1));
    }

    #[test]
    fn test_plain_module_import_is_external() {
        let (ws, analyses, modules) = build(&[
            ("a.py", "import b\nb.helper()\n"),
            ("b.py", "def helper():\n    pass\n"),
        ]);
        let outcome = link(&ws, &analyses, &modules);
        assert_eq!(outcome.stats.linked_aliases, 0);
        assert_eq!(outcome.stats.external_aliases, 1);
    }

    #[test]
    fn test_local_only_definitions_get_no_symbols() {
        let (ws, analyses, modules) = build(&[(
            "a.py",
            "def only_local():\n    pass\nonly_local()\n",
        )]);
        let outcome = link(&ws, &analyses, &modules);
        assert!(outcome.symbols.is_empty());
        assert_eq!(outcome.stats.symbols, 0);
        assert!(outcome.canonical[0].is_empty());
    }

    #[test]
    fn test_only_imported_definitions_get_symbols() {
        let (ws, analyses, modules) = build(&[
            ("a.py", "from b import zeta\n"),
            ("b.py", "alpha = 1\nzeta = 2\n"),
        ]);
        let outcome = link(&ws, &analyses, &modules);
        // `alpha` is never reached from another file.
        let names: Vec<_> = outcome.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["zeta"]);
        assert_eq!(outcome.canonical[1].len(), 1);
    }

    #[test]
    fn test_symbol_numbering_follows_resolution_order() {
        let (ws, analyses, modules) = build(&[
            ("a.py", "from b import zeta\nfrom b import alpha\n"),
            ("b.py", "alpha = 1\nzeta = 2\n"),
        ]);
        let outcome = link(&ws, &analyses, &modules);
        // Aliases resolve in binding order within a.py, so `zeta` is
        // interned first regardless of its position in b.py.
        let names: Vec<_> = outcome.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }
}
