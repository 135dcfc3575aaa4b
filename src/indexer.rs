//! Two-pass indexing orchestrator
//!
//! Pass one analyzes every workspace file in parallel and produces one
//! [`FileIndex`] per file. Pass two resolves imports, links symbols across
//! files and streams the dump in a fixed phase order:
//!
//! 1. `metaData` and `project`
//! 2. every `document` vertex, in file order
//! 3. per file, every definition: result set, hover, range, `definitionResult`
//! 4. per file, import aliases and references, wired to the result sets
//!    phase 3 created (safe under import cycles, no topological order needed)
//! 5. per symbol, the `referenceResult` and its `item` edges
//! 6. `contains` edges, documents last into the project
//!
//! Every vertex therefore precedes the edges that mention it, and two runs
//! over the same tree produce byte-identical dumps.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::emitter::Emitter;
use crate::graph::{HoverContent, HoverContents, Id, ItemProperty, MonikerKind, Position};
use crate::linker::{Linker, LinkStats, LinkOutcome};
use crate::modules::ModuleTable;
use crate::scope::{Binding, BindingId, FileAnalysis, Resolution, SymbolTableBuilder};
use crate::workspace::{FileId, Workspace};
use crate::{IndexMessage, Result};

/// Analysis output for a single file, kept until emission.
#[derive(Debug)]
pub struct FileIndex {
    pub file: FileId,
    pub source: String,
    pub analysis: FileAnalysis,
}

/// Knobs for a single indexing run.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    /// Leave base64 file contents out of document vertices.
    pub exclude_content: bool,
}

/// Counters reported after an indexing run.
#[derive(Debug, Default)]
pub struct IndexStats {
    pub files: usize,
    pub skipped_files: usize,
    pub definitions: usize,
    pub references: usize,
    pub ambiguous_imports: usize,
    pub records: u64,
    pub link: LinkStats,
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files indexed ({} skipped), {} definitions, {} references, {} records; {}",
            self.files,
            self.skipped_files,
            self.definitions,
            self.references,
            self.records,
            self.link
        )?;
        if self.ambiguous_imports > 0 {
            write!(f, "; {} ambiguous imports", self.ambiguous_imports)?;
        }
        Ok(())
    }
}

/// Bookkeeping for one result set: which ranges feed its
/// `referenceResult`, grouped by document so `item` edges batch per file.
#[derive(Debug, Default)]
struct DefinitionMeta {
    result_set: Id,
    definition_items: BTreeMap<Id, Vec<Id>>,
    reference_items: BTreeMap<Id, Vec<Id>>,
}

/// Drives both passes over a workspace.
pub struct Indexer<'a> {
    workspace: &'a Workspace,
    options: IndexOptions,
}

impl<'a> Indexer<'a> {
    pub fn new(workspace: &'a Workspace, options: IndexOptions) -> Self {
        Self { workspace, options }
    }

    /// Index the workspace and stream the dump into `emitter`.
    ///
    /// `on_file` is invoked with each file's relative path as its analysis
    /// completes, for progress reporting.
    pub fn run<W: Write>(
        &self,
        emitter: &mut Emitter<W>,
        mut on_file: impl FnMut(&str),
    ) -> Result<IndexStats> {
        let mut stats = IndexStats::default();
        let indexes = self.analyze_files(&mut on_file, &mut stats);

        let modules = ModuleTable::build(
            self.workspace,
            indexes.iter().enumerate().map(|(i, index)| {
                let imports = index
                    .as_ref()
                    .map(|index| index.analysis.imports.as_slice())
                    .unwrap_or(&[]);
                (FileId(i as u32), imports)
            }),
        );
        let analyses: Vec<Option<&FileAnalysis>> = indexes
            .iter()
            .map(|index| index.as_ref().map(|index| &index.analysis))
            .collect();
        stats.ambiguous_imports = modules.ambiguous;
        let outcome = Linker::link(self.workspace, &analyses, &modules);
        stats.link = outcome.stats;

        self.emit(emitter, &indexes, &outcome, &mut stats)?;
        stats.records = emitter.count();
        Ok(stats)
    }

    /// Parallel analysis pass. Workers claim files off a shared counter
    /// and report through a channel; the results land in workspace file
    /// order regardless of completion order.
    fn analyze_files(
        &self,
        on_file: &mut impl FnMut(&str),
        stats: &mut IndexStats,
    ) -> Vec<Option<FileIndex>> {
        let total = self.workspace.len();
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .min(total.max(1));
        let next = AtomicUsize::new(0);
        let (tx, rx) = crossbeam::channel::unbounded();

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                let workspace = self.workspace;
                scope.spawn(move || loop {
                    let i = next.fetch_add(1, Ordering::SeqCst);
                    if i >= total {
                        break;
                    }
                    let file = FileId(i as u32);
                    let message = match analyze_one(workspace, file) {
                        Ok(index) => IndexMessage::Analyzed {
                            file,
                            index: Box::new(index),
                        },
                        Err(e) => IndexMessage::Skipped {
                            file,
                            reason: e.to_string(),
                        },
                    };
                    if tx.send(message).is_err() {
                        break;
                    }
                });
            }
            drop(tx);

            let mut indexes: Vec<Option<FileIndex>> = (0..total).map(|_| None).collect();
            for message in rx {
                match message {
                    IndexMessage::Analyzed { file, index } => {
                        let rel = &self.workspace.file(file).rel;
                        if index.analysis.skipped > 0 {
                            tracing::warn!(
                                "{rel}: skipped {} unparseable subtrees",
                                index.analysis.skipped
                            );
                        }
                        on_file(rel);
                        stats.files += 1;
                        indexes[file.0 as usize] = Some(*index);
                    }
                    IndexMessage::Skipped { file, reason } => {
                        let rel = &self.workspace.file(file).rel;
                        tracing::warn!("skipping {rel}: {reason}");
                        on_file(rel);
                        stats.skipped_files += 1;
                    }
                }
            }
            indexes
        })
    }

    fn emit<W: Write>(
        &self,
        em: &mut Emitter<W>,
        indexes: &[Option<FileIndex>],
        outcome: &LinkOutcome,
        stats: &mut IndexStats,
    ) -> Result<()> {
        em.emit_meta_data(&self.workspace.root_uri())?;
        let project = em.emit_project()?;

        // Phase 2: documents.
        let mut documents: Vec<Option<Id>> = vec![None; indexes.len()];
        for (i, index) in indexes.iter().enumerate() {
            let Some(index) = index else { continue };
            let uri = format!("{}/{}", self.workspace.root_uri(), self.workspace.file(index.file).rel);
            let contents =
                (!self.options.exclude_content).then(|| BASE64.encode(index.source.as_bytes()));
            documents[i] = Some(em.emit_document(&uri, contents)?);
        }

        let mut metas: Vec<DefinitionMeta> = Vec::new();
        let mut meta_of: HashMap<(usize, BindingId), usize> = HashMap::new();
        let mut doc_ranges: Vec<Vec<Id>> = vec![Vec::new(); indexes.len()];

        // Phase 3: definitions. Import-alias bindings wait for phase 4;
        // everything else gets its result set, hover, range and
        // definitionResult here.
        for (f, index) in indexes.iter().enumerate() {
            let Some(index) = index else { continue };
            let doc = documents[f].unwrap_or_default();
            for (binding_id, binding) in index.analysis.table.bindings() {
                if binding.import.is_some() {
                    continue;
                }
                stats.definitions += 1;

                let hover = hover_for(index, binding).map(|h| em.emit_hover_result(h)).transpose()?;
                let result_set = em.emit_result_set()?;
                if let Some(hover) = hover {
                    em.emit_text_document_hover(result_set, hover)?;
                }
                if let Some(&symbol) = outcome.canonical[f].get(&binding_id) {
                    let symbol = outcome.symbol(symbol);
                    let identifier = format!("{}:{}", symbol.module, symbol.name);
                    let moniker = em.emit_moniker(MonikerKind::Export, &identifier)?;
                    em.emit_moniker_edge(result_set, moniker)?;
                }

                let range = emit_span_range(em, &binding.span)?;
                doc_ranges[f].push(range);
                em.emit_next(range, result_set)?;

                let definition_result = em.emit_definition_result()?;
                em.emit_text_document_definition(result_set, definition_result)?;
                em.emit_item(
                    definition_result,
                    vec![range],
                    doc,
                    Some(ItemProperty::Definitions),
                )?;

                let meta_idx = metas.len();
                let mut meta = DefinitionMeta {
                    result_set,
                    ..DefinitionMeta::default()
                };
                meta.definition_items.entry(doc).or_default().push(range);
                metas.push(meta);
                meta_of.insert((f, binding_id), meta_idx);
            }
        }

        // Phase 4: import aliases, then references. All canonical result
        // sets exist by now, so cross-file (and cyclic) wiring is just a
        // lookup.
        for (f, index) in indexes.iter().enumerate() {
            let Some(index) = index else { continue };
            let doc = documents[f].unwrap_or_default();

            for (binding_id, binding) in index.analysis.table.bindings() {
                if binding.import.is_none() {
                    continue;
                }
                let meta_idx = match outcome.alias_targets[f].get(&binding_id) {
                    Some(&symbol) => {
                        let symbol = outcome.symbol(symbol);
                        meta_of[&(symbol.file.0 as usize, symbol.binding)]
                    }
                    // External import: its own result set, no definition.
                    None => {
                        let result_set = em.emit_result_set()?;
                        let meta_idx = metas.len();
                        metas.push(DefinitionMeta {
                            result_set,
                            ..DefinitionMeta::default()
                        });
                        meta_of.insert((f, binding_id), meta_idx);
                        meta_idx
                    }
                };
                let range = emit_span_range(em, &binding.span)?;
                doc_ranges[f].push(range);
                em.emit_next(range, metas[meta_idx].result_set)?;
                metas[meta_idx].reference_items.entry(doc).or_default().push(range);
                stats.references += 1;
            }

            for (ref_idx, reference) in index.analysis.table.references().iter().enumerate() {
                let meta_idx = match reference.resolution {
                    Resolution::Local(binding_id) => {
                        let binding = index.analysis.table.binding(binding_id);
                        if binding.import.is_some() {
                            match outcome.alias_targets[f].get(&binding_id) {
                                Some(&symbol) => {
                                    let symbol = outcome.symbol(symbol);
                                    meta_of[&(symbol.file.0 as usize, symbol.binding)]
                                }
                                None => meta_of[&(f, binding_id)],
                            }
                        } else {
                            meta_of[&(f, binding_id)]
                        }
                    }
                    Resolution::Unresolved => match outcome.ref_targets[f].get(&ref_idx) {
                        Some(&symbol) => {
                            let symbol = outcome.symbol(symbol);
                            meta_of[&(symbol.file.0 as usize, symbol.binding)]
                        }
                        // Orphan: a result set whose referenceResult will
                        // list only this occurrence.
                        None => {
                            let result_set = em.emit_result_set()?;
                            let meta_idx = metas.len();
                            metas.push(DefinitionMeta {
                                result_set,
                                ..DefinitionMeta::default()
                            });
                            meta_idx
                        }
                    },
                };
                let range = emit_span_range(em, &reference.span)?;
                doc_ranges[f].push(range);
                em.emit_next(range, metas[meta_idx].result_set)?;
                metas[meta_idx].reference_items.entry(doc).or_default().push(range);
                stats.references += 1;
            }
        }

        // Phase 5: reference results, in result-set creation order.
        for meta in &metas {
            let reference_result = em.emit_reference_result()?;
            em.emit_text_document_references(meta.result_set, reference_result)?;
            for (&doc, ranges) in &meta.definition_items {
                em.emit_item(
                    reference_result,
                    ranges.clone(),
                    doc,
                    Some(ItemProperty::Definitions),
                )?;
            }
            for (&doc, ranges) in &meta.reference_items {
                em.emit_item(
                    reference_result,
                    ranges.clone(),
                    doc,
                    Some(ItemProperty::References),
                )?;
            }
        }

        // Phase 6: containment.
        for (f, document) in documents.iter().enumerate() {
            if let Some(document) = document {
                em.emit_contains(*document, std::mem::take(&mut doc_ranges[f]))?;
            }
        }
        em.emit_contains(project, documents.iter().flatten().copied().collect())?;
        em.flush()?;
        Ok(())
    }
}

fn analyze_one(workspace: &Workspace, file: FileId) -> Result<FileIndex> {
    let source = std::fs::read_to_string(&workspace.file(file).path)?;
    let analysis = SymbolTableBuilder::analyze(&source)?;
    Ok(FileIndex {
        file,
        source,
        analysis,
    })
}

fn emit_span_range<W: Write>(
    em: &mut Emitter<W>,
    span: &crate::syntax::SourceSpan,
) -> Result<Id> {
    em.emit_range(
        Position {
            line: span.line,
            character: span.start_col,
        },
        Position {
            line: span.line,
            character: span.end_col,
        },
    )
}

/// Hover tooltip for a definition: the trimmed source line as a code
/// snippet, followed by the docstring when there is one.
fn hover_for(index: &FileIndex, binding: &Binding) -> Option<HoverContents> {
    let line = index
        .source
        .lines()
        .nth(binding.span.line as usize)?
        .trim();
    if line.is_empty() {
        return None;
    }
    let mut contents = vec![HoverContent::snippet(line)];
    if let Some(docstring) = &binding.docstring {
        if !docstring.is_empty() {
            contents.push(HoverContent::Raw(docstring.clone()));
        }
    }
    Some(HoverContents { contents })
}
