//! # lsif-py - LSIF indexer for Python
//!
//! Indexes a Python workspace and writes an LSIF dump that code-navigation
//! tooling can answer "go to definition", "find references" and "hover"
//! queries from, without a live language server.
//!
//! lsif-py provides:
//! - Per-file scope and binding analysis over tree-sitter ASTs
//! - Workspace-wide import resolution and cross-file symbol linking
//! - Streaming, ordered emission of LSIF vertices and edges

pub mod config;
pub mod emitter;
pub mod graph;
pub mod ignore;
pub mod indexer;
pub mod linker;
pub mod modules;
pub mod scope;
pub mod syntax;
pub mod workspace;

// Re-exports for convenient access
pub use emitter::Emitter;
pub use indexer::{IndexOptions, IndexStats, Indexer};
pub use workspace::{FileId, Workspace};

/// Result type alias for lsif-py operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for lsif-py operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid workspace: {0}")]
    Workspace(String),
}

/// Message sent from parallel analysis workers to the coordinator
#[derive(Debug)]
pub enum IndexMessage {
    Analyzed {
        file: FileId,
        index: Box<indexer::FileIndex>,
    },
    Skipped {
        file: FileId,
        reason: String,
    },
}
