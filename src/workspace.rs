//! Workspace discovery
//!
//! Produces the finite, ordered list of Python files to analyze. The list
//! is sorted by relative path so every later stage (and therefore the
//! emitted dump) is deterministic.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::ignore::IgnoreFilter;
use crate::{Error, Result};

/// Index of a file in the workspace's sorted file list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

/// A Python file discovered in the workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the workspace root, `/`-separated.
    pub rel: String,
    /// Dotted-module components (`pkg/mod.py` -> `["pkg", "mod"]`).
    pub module: Vec<String>,
    /// Whether this file is a package `__init__.py`.
    pub is_package: bool,
}

impl WorkspaceFile {
    /// Dotted module name, e.g. `pkg.mod`.
    pub fn module_name(&self) -> String {
        self.module.join(".")
    }
}

/// The set of files under analysis, fixed before any analysis begins.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    files: Vec<WorkspaceFile>,
}

impl Workspace {
    /// Walk `root` and collect every non-ignored `*.py` file.
    pub fn discover(root: &Path, filter: &IgnoreFilter) -> Result<Self> {
        let root = root
            .canonicalize()
            .map_err(|e| Error::Workspace(format!("{}: {e}", root.display())))?;
        if !root.is_dir() {
            return Err(Error::Workspace(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&root).into_iter().filter_entry(|entry| {
            entry.path() == root || !filter.is_ignored(entry.path(), entry.file_type().is_dir())
        });
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("py") {
                continue;
            }
            let rel = match path.strip_prefix(&root) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            let rel_str = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let (module, is_package) = module_components(&rel_str);
            files.push(WorkspaceFile {
                path: path.to_path_buf(),
                rel: rel_str,
                module,
                is_package,
            });
        }

        files.sort_by(|a, b| a.rel.cmp(&b.rel));
        Ok(Self { root, files })
    }

    /// Workspace for a pre-assembled file list (tests).
    #[cfg(test)]
    pub(crate) fn from_files(root: PathBuf, files: Vec<WorkspaceFile>) -> Self {
        Self { root, files }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `file://` URI of the workspace root.
    pub fn root_uri(&self) -> String {
        format!("file://{}", self.root.display())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn file(&self, id: FileId) -> &WorkspaceFile {
        &self.files[id.0 as usize]
    }

    pub fn files(&self) -> impl Iterator<Item = (FileId, &WorkspaceFile)> {
        self.files
            .iter()
            .enumerate()
            .map(|(i, f)| (FileId(i as u32), f))
    }
}

/// Dotted-module components of a relative path, and whether the file is a
/// package `__init__.py`.
fn module_components(rel: &str) -> (Vec<String>, bool) {
    let mut parts: Vec<String> = rel
        .trim_end_matches(".py")
        .split('/')
        .map(str::to_string)
        .collect();
    let is_package = parts.last().map(String::as_str) == Some("__init__");
    if is_package {
        parts.pop();
    }
    (parts, is_package)
}
