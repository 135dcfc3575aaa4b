use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// Gitignore-style filter applied during workspace traversal.
pub struct IgnoreFilter {
    inner: Gitignore,
}

impl IgnoreFilter {
    pub fn new(root: &Path, extra_excludes: Option<&[String]>) -> Self {
        let mut builder = GitignoreBuilder::new(root);

        // 1. Load from .gitignore and .ignore
        builder.add(root.join(".gitignore"));
        builder.add(root.join(".ignore"));

        // 2. Add defaults (global)
        let defaults = [
            // Noise directories
            ".git/",
            ".hg/",
            ".tox/",
            ".mypy_cache/",
            ".pytest_cache/",
            "__pycache__/",
            "venv/",
            ".venv/",
            "node_modules/",
            "*.egg-info/",
            // Byte-compiled files
            "*.pyc",
            "*.pyo",
            "*.pyd",
        ];

        for pattern in defaults {
            // These are static valid patterns
            builder.add_line(None, pattern).ok();
        }

        // 3. Add caller-supplied excludes
        if let Some(excludes) = extra_excludes {
            for pattern in excludes {
                if builder.add_line(None, pattern).is_err() {
                    tracing::warn!("invalid exclude pattern: {pattern}");
                }
            }
        }

        Self {
            inner: builder.build().unwrap_or_else(|_| Gitignore::empty()),
        }
    }

    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.inner.matched(path, is_dir).is_ignore()
    }
}
