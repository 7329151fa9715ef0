//! apiref: extract, enrich and index the API of a MATLAB source tree.
//!
//! - `apiref parse +mr/*.m` prints the raw extraction as JSON
//! - `apiref process --path pulseq/matlab --recursive` runs the full pipeline
//! - `apiref reembed` recomputes stored embeddings from descriptions

mod batch;
mod config;
mod embed;
mod enrich;
mod logging;
mod prompt;
mod reembed;
mod store;
mod verify;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

const SOURCE_EXTENSION: &str = "m";
const BACKUP_DIR: &str = "backups";

#[derive(Parser)]
#[command(name = "apiref", about = "Extract, enrich and index the API of a MATLAB source tree")]
struct Cli {
    /// Debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    settings: config::Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the extracted records of files as JSON
    Parse {
        /// Input files, directories or glob patterns
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Extract, enrich, persist and verify a source directory
    Process(ProcessArgs),
    /// Recompute stored embeddings from descriptions
    Reembed(ReembedArgs),
    /// List stored functions
    List {
        /// Only functions of this type (main, helper, class, ...)
        #[arg(long = "type")]
        function_type: Option<String>,
    },
    /// Stored functions whose embeddings are closest to a stored function
    Related {
        name: String,

        #[arg(short = 'k', long, default_value_t = 5)]
        top_k: usize,
    },
}

#[derive(clap::Args)]
struct ProcessArgs {
    /// Directory of MATLAB sources
    #[arg(long, env = "MATLAB_FUNCTIONS_PATH")]
    path: PathBuf,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Write JSON output only; nothing is stored
    #[arg(long)]
    dry_run: bool,

    /// Only verify the stored reference
    #[arg(long)]
    verify_only: bool,

    /// Process test* files too
    #[arg(long)]
    include_tests: bool,

    /// Additional file-name prefixes to skip
    #[arg(long, num_args = 1..)]
    skip_patterns: Vec<String>,

    /// Directory for per-file JSON and the processing summary
    #[arg(short, long, default_value = config::DEFAULT_OUTPUT_DIR)]
    output: PathBuf,

    /// Never call the enrichment or embedding API
    #[arg(long)]
    offline: bool,

    /// Function checked by verification. Can be given multiple times.
    #[arg(long)]
    sample: Vec<String>,
}

#[derive(clap::Args)]
struct ReembedArgs {
    /// Compute embeddings without writing them
    #[arg(long)]
    dry_run: bool,

    /// Rows between extra pauses
    #[arg(long, default_value_t = 10)]
    batch_size: usize,

    /// First row id to process, for resuming
    #[arg(long)]
    start_from: Option<i64>,

    /// Process only the first N rows
    #[arg(long)]
    test_run: Option<usize>,

    /// Skip writing the id/name backup
    #[arg(long)]
    no_backup: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match &cli.command {
        Command::Parse { files } => parse(files),
        Command::Process(args) => process(&cli.settings, args),
        Command::Reembed(args) => reembed(&cli.settings, args),
        Command::List { function_type } => list(&cli.settings, function_type.as_deref()),
        Command::Related { name, top_k } => related(&cli.settings, name, *top_k),
    }
}

fn parse(patterns: &[String]) -> Result<()> {
    let files = expand_globs(patterns)?;
    let mut results = Vec::new();
    for path in &files {
        match matlab_syntax::parse_path(path) {
            Ok(result) => results.push(result),
            Err(e) => tracing::warn!("skipping {}: {}", path.display(), e),
        }
    }
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

fn process(settings: &config::Settings, args: &ProcessArgs) -> Result<()> {
    let origin = store::Origin {
        language: settings.language.clone(),
        source_id: config::SOURCE_ID.to_string(),
        library_version: settings.library_version.clone(),
    };

    if args.verify_only {
        let store = store::SqliteStore::open(&settings.db)?;
        return print_verification(&store, settings, &args.sample);
    }

    if !args.path.is_dir() {
        anyhow::bail!("path not found: {}", args.path.display());
    }

    let llm = settings.llm(args.offline);
    if llm.is_none() {
        tracing::info!("no API key or --offline: using fallback enrichment");
    }
    let embedder = settings.embedder(args.offline);
    let mut store = if args.dry_run {
        None
    } else {
        Some(store::SqliteStore::open(&settings.db)?)
    };

    let summary = batch::Pipeline {
        root: args.path.clone(),
        recursive: args.recursive,
        skip: batch::SkipRules {
            include_tests: args.include_tests,
            patterns: args.skip_patterns.clone(),
        },
        output_dir: args.output.clone(),
        enricher: enrich::Enricher::new(llm.as_deref()),
        embedder: embedder.as_ref(),
        origin,
        store: store.as_mut(),
    }
    .run()?;

    println!("Processing summary:");
    println!("  Total files: {}", summary.total_files);
    println!("  Processed:   {}", summary.processed);
    println!("  Failed:      {}", summary.failed);
    println!("  Skipped:     {}", summary.skipped);
    for (file, errors) in &summary.failed_details {
        println!("  ✗ {}: {}", file, errors.join("; "));
    }
    println!("Output written to {}", args.output.join(batch::SUMMARY_FILE).display());

    match &store {
        Some(store) => print_verification(store, settings, &args.sample),
        None => Ok(()),
    }
}

fn print_verification(store: &store::SqliteStore, settings: &config::Settings, samples: &[String]) -> Result<()> {
    let samples: Vec<String> = if samples.is_empty() {
        verify::DEFAULT_SAMPLES.iter().map(|s| s.to_string()).collect()
    } else {
        samples.to_vec()
    };
    let report = verify::verify(store, &samples, &settings.language, &settings.library_version)?;
    println!("\nVerification:\n{}", report);
    let missing: Vec<&str> = report.missing().collect();
    if !missing.is_empty() {
        tracing::warn!("sample functions missing from the store: {}", missing.join(", "));
    }
    Ok(())
}

fn list(settings: &config::Settings, function_type: Option<&str>) -> Result<()> {
    let store = store::SqliteStore::open(&settings.db)?;
    let rows = store.list(&settings.language, &settings.library_version, function_type)?;
    for row in &rows {
        let nargin = if row.has_nargin_pattern { " [nargin]" } else { "" };
        println!("{:>5}  {:<11} {}{}  {}", row.id, row.function_type, row.name, nargin, row.description);
    }
    println!("{} functions", rows.len());
    Ok(())
}

fn related(settings: &config::Settings, name: &str, top_k: usize) -> Result<()> {
    let store = store::SqliteStore::open(&settings.db)?;
    let function = store
        .get(name, &settings.language, &settings.library_version)?
        .with_context(|| format!("{} not found in database", name))?;
    let query = store
        .embedding(function.id)?
        .with_context(|| format!("{} has no stored embedding", name))?;

    let ranked = store.similar(&query, &settings.language, top_k + 1)?;
    for (other, score) in ranked.iter().filter(|(other, _)| other != name).take(top_k) {
        println!("{:.4}  {}", score, other);
    }
    Ok(())
}

fn reembed(settings: &config::Settings, args: &ReembedArgs) -> Result<()> {
    let embedder = settings.remote_embedder()?;
    let store = store::SqliteStore::open(&settings.db)?;

    if !args.no_backup && !args.dry_run {
        if let Some(path) = reembed::write_backup(&store, &settings.language, Path::new(BACKUP_DIR))? {
            println!("Backup written to {}", path.display());
        }
    }

    let options = reembed::ReembedOptions {
        dry_run: args.dry_run,
        batch_size: args.batch_size,
        start_from: args.start_from,
        test_run: args.test_run,
        ..Default::default()
    };
    let mut limiter = reembed::RateLimiter::per_minute(reembed::REQUESTS_PER_MINUTE);
    let stats = reembed::reembed(&store, embedder.as_ref(), &mut limiter, &settings.language, &options)?;

    println!("Re-embedding summary{}:", if args.dry_run { " (dry run)" } else { "" });
    println!("  Total:     {}", stats.total);
    println!("  Processed: {}", stats.processed);
    println!("  Updated:   {}", stats.updated);
    println!("  Skipped:   {}", stats.skipped);
    println!("  Failed:    {}", stats.failed);
    if stats.failed > 0 {
        if let Some(id) = stats.last_id {
            println!("Resume with --start-from {}", id);
        }
    }
    Ok(())
}

/// Files named directly, `.m` files of named directories, and glob matches.
fn expand_globs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_file() {
            files.push(path.to_path_buf());
            continue;
        }
        if path.is_dir() {
            let entries = fs::read_dir(path)
                .with_context(|| format!("failed to read directory: {}", path.display()))?;
            for entry in entries.flatten() {
                let p = entry.path();
                if p.is_file() && p.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION) {
                    files.push(p);
                }
            }
            continue;
        }
        let matches: Vec<_> = glob::glob(pattern)
            .with_context(|| format!("invalid glob pattern: {}", pattern))?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();
        if matches.is_empty() {
            tracing::warn!("no files matched: {}", pattern);
        }
        files.extend(matches);
    }
    files.sort();
    files.dedup();
    Ok(files)
}
