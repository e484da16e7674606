use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use mdasm::config::{AppConfig, OutputConfig, TreeConfig};
use mdasm::error::{AppError, Result};
use mdasm::event::{channel_reporter, ProgressUpdate};
use mdasm::fs::host::{FileSystem, LocalFs};
use mdasm::fs::ignore::read_ignore_file;
use mdasm::fs::tree::{BuildOptions, Tree};
use mdasm::output::{Generator, TokioYield};

/// Assemble a directory into a single Markdown context document.
#[derive(Parser, Debug)]
#[command(name = "mdasm", version, about)]
struct Cli {
    /// Root directory (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Output mode: minimal, compact or full
    #[arg(short, long)]
    mode: Option<String>,

    /// Write the document to this file
    #[arg(short, long, conflicts_with = "stdout")]
    output: Option<PathBuf>,

    /// Write the document to stdout
    #[arg(long)]
    stdout: bool,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not read .gitignore from the root
    #[arg(long)]
    no_gitignore: bool,

    /// Extra ignore pattern (repeatable)
    #[arg(long = "ignore", value_name = "PATTERN")]
    ignore: Vec<String>,

    /// Enumerate collapsed directories up front
    #[arg(long)]
    full_load: bool,

    /// Select every node before applying other selections
    #[arg(long, conflicts_with = "none")]
    all: bool,

    /// Deselect every node before applying other selections
    #[arg(long)]
    none: bool,

    /// Load and expand a deferred directory (repeatable)
    #[arg(long, value_name = "PATH")]
    expand: Vec<String>,

    /// Select a node and its loaded descendants (repeatable)
    #[arg(long, value_name = "PATH")]
    select: Vec<String>,

    /// Deselect a node and its loaded descendants (repeatable)
    #[arg(long, value_name = "PATH")]
    deselect: Vec<String>,

    /// Print the selection tree instead of generating
    #[arg(long)]
    tree: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Partial config holding only the values given on the command line.
    fn overrides(&self) -> AppConfig {
        AppConfig {
            tree: TreeConfig {
                full_load: self.full_load.then_some(true),
                use_gitignore: self.no_gitignore.then_some(false),
                ignore: None,
            },
            output: OutputConfig {
                mode: self.mode.clone(),
                ..Default::default()
            },
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Some(mode) = &cli.mode {
        if let Err(e) = mode.parse::<mdasm::output::OutputMode>() {
            return Err(AppError::Config(e));
        }
    }

    let config = AppConfig::load(cli.config.as_deref(), Some(&cli.overrides()))?;

    let fs = LocalFs;
    let root = fs.root(&cli.path)?;

    let mut patterns = if config.use_gitignore() {
        read_ignore_file(&fs, &root)
    } else {
        Vec::new()
    };
    patterns.extend(config.extra_ignore().iter().cloned());
    patterns.extend(cli.ignore.iter().cloned());

    let mut tree = Tree::build(
        &fs,
        root,
        &patterns,
        BuildOptions {
            full_load: config.full_load(),
        },
    );
    let stats = tree.stats();
    info!(
        files = stats.files,
        folders = stats.folders,
        deferred = stats.deferred,
        "tree built"
    );

    apply_selection(&cli, &fs, &mut tree)?;

    if cli.tree {
        print!("{}", tree.render_listing());
        return Ok(());
    }

    let files = tree.collect_selected_files();
    if files.is_empty() {
        warn!("no files selected");
    }

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let reporter = tokio::spawn(report_progress(rx));

    let generator = Generator::new(&fs, tree.root_name())
        .with_options(config.output_options())
        .with_cancel(cancel);
    let result = generator
        .generate(config.mode(), files, channel_reporter(tx), &mut TokioYield)
        .await;
    // sender dropped with the callback; the reporter drains and exits
    let _ = reporter.await;
    let document = result?;

    if cli.stdout {
        std::io::stdout().write_all(document.as_bytes())?;
        return Ok(());
    }

    let target = match &cli.output {
        Some(path) => path.clone(),
        None => default_output_path(&config.output_dir(), tree.root_name()),
    };
    std::fs::write(&target, &document)?;
    eprintln!("Wrote {} ({} bytes)", target.display(), document.len());
    Ok(())
}

/// Bulk selection, then expansion, then individual toggles.
fn apply_selection<F: FileSystem>(cli: &Cli, fs: &F, tree: &mut Tree) -> Result<()> {
    if cli.all {
        tree.select_all(true);
    } else if cli.none {
        tree.select_all(false);
    }

    for path in &cli.expand {
        tree.expand_path(fs, path)?;
    }

    for path in &cli.select {
        tree.set_selected_path(path, true)?;
    }
    for path in &cli.deselect {
        tree.set_selected_path(path, false)?;
    }
    Ok(())
}

async fn report_progress(mut rx: mpsc::UnboundedReceiver<ProgressUpdate>) {
    while let Some(update) = rx.recv().await {
        eprint!(
            "\r[{:>3}%] {}/{} {:<40}",
            update.percent(),
            update.current,
            update.total,
            update.current_file
        );
    }
    eprintln!();
}

fn default_output_path(dir: &Path, root_name: &str) -> PathBuf {
    dir.join(format!("{}_context.md", root_name))
}
