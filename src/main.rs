//! lsif-py CLI - writes an LSIF dump for a Python workspace

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lsif_py::config;
use lsif_py::ignore::IgnoreFilter;
use lsif_py::{Emitter, IndexOptions, Indexer, Workspace};

#[derive(Parser)]
#[command(name = "lsif-py")]
#[command(version)]
#[command(about = "LSIF indexer for Python workspaces")]
#[command(long_about = r#"
lsif-py walks a Python workspace, resolves definitions and references
across files, and writes an LSIF dump that editors and code hosts can
answer "go to definition", "find references" and hover queries from.

Example usage:
  lsif-py .
  lsif-py path/to/project -o project.lsif --exclude-content
"#)]
struct Cli {
    /// Workspace root to index
    #[arg(default_value = ".")]
    workspace: PathBuf,

    /// Output dump path (default: data.lsif)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Omit base64 file contents from document vertices
    #[arg(long)]
    exclude_content: bool,

    /// Extra directory or glob patterns to skip
    #[arg(long = "exclude", value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    run(cli)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    // Command-line flags win over lsif-py.toml.
    let config = config::load_config(&config::default_config_path(&cli.workspace))?
        .unwrap_or_default();
    let output = cli
        .output
        .or_else(|| config.output.map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("data.lsif"));
    let exclude_content = cli.exclude_content || config.exclude_content.unwrap_or(false);
    let mut exclude = cli.exclude;
    exclude.extend(config.exclude.unwrap_or_default());

    let ignore = IgnoreFilter::new(&cli.workspace, Some(&exclude));
    let workspace = Workspace::discover(&cli.workspace, &ignore)?;
    // An empty workspace still gets a minimal valid dump.
    if workspace.is_empty() {
        println!("No files found to index");
    } else {
        println!(
            "Indexing {} ({} files)",
            workspace.root().display(),
            workspace.len()
        );
    }

    let bar = ProgressBar::new(workspace.len() as u64);
    bar.set_style(ProgressStyle::with_template(
        "{bar:40} {pos}/{len} {wide_msg}",
    )?);

    let file = File::create(&output)?;
    let mut emitter = Emitter::new(BufWriter::new(file));
    let indexer = Indexer::new(&workspace, IndexOptions { exclude_content });

    let started = Instant::now();
    let stats = indexer.run(&mut emitter, |rel| {
        bar.set_message(rel.to_string());
        bar.inc(1);
    })?;
    bar.finish_and_clear();

    println!(
        "Processed {} files in {}",
        stats.files,
        HumanDuration(started.elapsed())
    );
    println!("{stats}");
    println!("Wrote {}", output.display());
    Ok(())
}
