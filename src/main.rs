// c4 command line tool
// Prints C4 IDs for files, directory trees, or standard input

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use indicatif::ProgressBar;

use c4id::c4::{
    bar_callback, collect_files, stdout_progress, BatchConfig, C4Hasher, C4Queue, CancelToken,
    ConsoleReporter, FileC4Id, FormatOptions, FormatOrder, WalkOptions, DEFAULT_BAR_LENGTH,
    DEFAULT_CHUNK_SIZE,
};
use c4id::version_string;

/// Exit status after Ctrl-C, following the shell convention of 128 + SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Formatting {
    /// Identifier first, path nested
    Id,
    /// Path first, identifier nested
    Path,
}

impl From<Formatting> for FormatOrder {
    fn from(formatting: Formatting) -> Self {
        match formatting {
            Formatting::Id => FormatOrder::Id,
            Formatting::Path => FormatOrder::Path,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "c4", about = "Generate C4 IDs for files and folders", disable_version_flag = true)]
struct Cli {
    /// Output absolute paths, instead of relative paths
    #[arg(short, long)]
    absolute: bool,

    /// Only output ids for files 'depth' directories deep
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    depth: i64,

    /// Output formatting
    #[arg(short, long, value_enum, default_value_t = Formatting::Id)]
    formatting: Formatting,

    /// Follow all symbolic links
    #[arg(short, long)]
    links: bool,

    /// Include file system metadata
    #[arg(short, long)]
    metadata: bool,

    /// Recursively identify all files for the given paths
    #[arg(short = 'R', long)]
    recursive: bool,

    /// Show progress while generating each c4 id
    #[arg(short, long)]
    progress: bool,

    /// Number of threads used to generate hashes (0 or 1 hashes sequentially)
    #[arg(short = 'T', long, env = "C4_THREADS", default_value_t = 0)]
    threads: usize,

    /// Bytes read per chunk while hashing
    #[arg(long, env = "C4_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Display running logs on stderr
    #[arg(short = 'L', long)]
    logs: bool,

    /// Print one JSON object per file instead of text
    #[arg(short, long)]
    json: bool,

    /// Show version information
    #[arg(short = 'v', long)]
    version: bool,

    /// Files or folders to identify; '-' or nothing reads standard input
    files: Vec<PathBuf>,
}

impl Cli {
    fn format_options(&self) -> FormatOptions {
        let show_path = self.recursive || self.files.len() > 1;
        FormatOptions::new()
            .with_path(show_path)
            .with_metadata(self.metadata)
            .with_absolute(self.absolute)
            .with_order(self.formatting.into())
    }

    fn render(&self, id: &FileC4Id, options: &FormatOptions) -> Result<String> {
        if self.json {
            id.to_json(options).context("Failed to serialize result")
        } else {
            Ok(id.format(options))
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    if cli.version {
        println!("{}", version_string());
        return Ok(ExitCode::SUCCESS);
    }
    init_logging(cli.logs);

    let token = CancelToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received, cancelling");
            signal_token.cancel();
        }
    });

    // Hashing is blocking file IO; keep it off the async workers
    tokio::task::spawn_blocking(move || run(&cli, &token))
        .await
        .context("Hashing task failed")?
}

fn run(cli: &Cli, token: &CancelToken) -> Result<ExitCode> {
    let options = cli.format_options();
    let read_stdin = cli.files.is_empty() || cli.files.iter().any(|f| f.as_os_str() == "-");
    let paths: Vec<&PathBuf> = cli.files.iter().filter(|f| f.as_os_str() != "-").collect();

    let walk = WalkOptions::new()
        .with_follow_links(cli.links)
        .with_depth(cli.depth);
    let files = collect_files(&paths, &walk);
    debug!(files = files.len(), "collected input files");

    let mut failed = 0;
    if read_stdin {
        hash_stdin(cli, token)?;
    }
    if !token.is_cancelled() {
        failed += if cli.threads <= 1 {
            run_sequential(cli, &files, &options, token)?
        } else {
            run_batch(cli, files, options, token)?
        };
    }

    if token.is_cancelled() {
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }
    Ok(if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Piped data is always printed as a bare identifier.
fn hash_stdin(cli: &Cli, token: &CancelToken) -> Result<()> {
    let mut hasher = C4Hasher::with_chunk_size(cli.chunk_size)?;
    match hasher.hash_reader(io::stdin().lock(), "-", Some(token)) {
        Ok(id) => {
            let output = cli.render(&id, &FormatOptions::new())?;
            println!("{}", output);
            Ok(())
        }
        Err(e) if e.is_incomplete() => Ok(()),
        Err(e) => Err(e).context("Failed to read standard input"),
    }
}

fn run_sequential(cli: &Cli, files: &[PathBuf], options: &FormatOptions, token: &CancelToken) -> Result<usize> {
    let mut hasher = C4Hasher::with_chunk_size(cli.chunk_size)?;
    let pb = cli.progress.then(|| stdout_progress(DEFAULT_BAR_LENGTH));
    if let Some(pb) = &pb {
        hasher = hasher.with_progress_callback(bar_callback(pb));
    }

    let mut failed = 0;
    for path in files {
        if let Some(pb) = &pb {
            pb.reset();
        }
        match hasher.hash_file_until(path, token) {
            Ok(id) => print_result(cli, &id, options, pb.as_ref())?,
            Err(e) if e.is_incomplete() => break,
            Err(e) => {
                warn!(path = %path.display(), "{}", e);
                failed += 1;
            }
        }
    }
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    Ok(failed)
}

fn print_result(cli: &Cli, id: &FileC4Id, options: &FormatOptions, pb: Option<&ProgressBar>) -> Result<()> {
    let output = cli.render(id, options)?;
    let write = || -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", output)?;
        out.flush()
    };
    match pb {
        Some(pb) => pb.suspend(write)?,
        None => write()?,
    }
    Ok(())
}

fn run_batch(cli: &Cli, files: Vec<PathBuf>, options: FormatOptions, token: &CancelToken) -> Result<usize> {
    let config = BatchConfig::new()
        .with_max_workers(cli.threads)
        .with_chunk_size(cli.chunk_size);

    let mut reporter = ConsoleReporter::new(io::stdout(), options).with_json(cli.json);
    if cli.progress {
        reporter = reporter.with_progress(files.len());
    }
    let reporter = Arc::new(reporter);
    let sink = Arc::clone(&reporter);

    let mut queue = C4Queue::with_config(config)?
        .with_cancel_token(token.clone())
        .with_finished_callback(move |id| {
            if let Err(e) = sink.report(id) {
                warn!("failed to write result: {}", e);
            }
        });

    queue.submit(files)?;
    queue.start()?;
    let stats = queue.join()?;
    reporter.finish().context("Failed to write to stdout")?;

    if cli.logs {
        let summary = serde_json::to_string(&stats).context("Failed to serialize batch summary")?;
        debug!("batch summary: {}", summary);
    }
    Ok(stats.files_failed)
}
