//! codeatlas CLI: map functions, imports and call graphs of a source tree.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use codeatlas_core::cache::DEFAULT_CACHE_FILE;
use codeatlas_core::config::{ScanConfig, WorkspaceTable};
use codeatlas_core::output::{write_output, ScanResult};
use codeatlas_core::pipeline;

#[derive(Parser)]
#[command(
    name = "codeatlas",
    version,
    about = "codeatlas - Structural maps of multi-language source trees"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a source tree and write its structural map as JSON
    Scan {
        /// Root of the tree to scan
        path: PathBuf,

        /// Output JSON file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Extraction worker count (0 = one per core)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Skip files larger than this many bytes (0 = unlimited)
        #[arg(long)]
        max_file_size: Option<u64>,

        /// Only analyse the first N lines of each file (0 = unlimited)
        #[arg(long)]
        max_lines: Option<usize>,

        /// Cache store location (default: <path>/.codeatlas-cache.json)
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Run without reading or writing a cache store
        #[arg(long, conflicts_with = "cache")]
        no_cache: bool,

        /// Workspace dependency table produced by a manifest scanner
        #[arg(long)]
        workspaces: Option<PathBuf>,

        /// JSON scan configuration; flags override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Additional file or directory names to skip
        #[arg(long)]
        exclude: Vec<String>,

        /// Show per-phase timing breakdown and debug logs
        #[arg(long)]
        verbose: bool,

        /// Suppress all output except errors
        #[arg(long, conflicts_with = "verbose")]
        quiet: bool,
    },
}

struct ScanArgs {
    config: ScanConfig,
    output_path: PathBuf,
    cache_path: Option<PathBuf>,
    workspaces: Option<WorkspaceTable>,
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            path,
            output,
            jobs,
            max_file_size,
            max_lines,
            cache,
            no_cache,
            workspaces,
            config,
            exclude,
            verbose,
            quiet,
        } => {
            init_logging(verbose, quiet);

            let root = path.canonicalize().unwrap_or(path);
            let mut scan_config = match config {
                Some(file) => ScanConfig::from_json_file(&file).unwrap_or_else(|e| fail("Invalid config", e)),
                None => ScanConfig::default(),
            };
            scan_config.root = root.clone();
            if let Some(jobs) = jobs {
                scan_config.jobs = jobs;
            }
            if let Some(size) = max_file_size {
                scan_config.max_file_size = size;
            }
            if let Some(lines) = max_lines {
                scan_config.max_lines = lines;
            }
            scan_config.exclude_names.extend(exclude);

            let workspaces = workspaces.map(|file| {
                WorkspaceTable::from_json_file(&file)
                    .unwrap_or_else(|e| fail("Invalid workspace table", e))
            });

            let repo_name = root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "repo".to_string());
            let output_path =
                output.unwrap_or_else(|| PathBuf::from(format!("{repo_name}.codeatlas.json")));
            let cache_path = if no_cache {
                None
            } else {
                Some(cache.unwrap_or_else(|| root.join(DEFAULT_CACHE_FILE)))
            };

            let args = ScanArgs {
                config: scan_config,
                output_path,
                cache_path,
                workspaces,
                verbose,
            };
            if quiet {
                run_quiet(&args);
            } else {
                run_with_progress(&args);
            }
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn fail(context: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("{context}: {err}");
    std::process::exit(1);
}

fn run_scan(args: &ScanArgs, progress: Option<pipeline::ProgressCallback>) -> ScanResult {
    pipeline::scan(
        &args.config,
        args.cache_path.as_deref(),
        args.workspaces.as_ref(),
        progress,
    )
    .unwrap_or_else(|e| fail("Scan failed", e))
}

fn run_quiet(args: &ScanArgs) {
    let result = run_scan(args, None);
    if let Err(e) = write_output(&result, &args.output_path) {
        fail("Error writing output", e);
    }
}

fn run_with_progress(args: &ScanArgs) {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(spinner.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message("Initialising...");
    pb.enable_steady_tick(std::time::Duration::from_millis(80));

    let progress: pipeline::ProgressCallback = {
        let pb = pb.clone();
        Box::new(move |_name: &str, label: &str| {
            pb.set_message(label.to_string());
        })
    };

    let start = Instant::now();
    let result = run_scan(args, Some(progress));
    pb.finish_and_clear();

    print_summary(&args.config.root, &result, start.elapsed().as_secs_f64(), args.verbose);

    if let Err(e) = write_output(&result, &args.output_path) {
        fail("Error writing output", e);
    }
    println!(
        "\n  {} {}",
        style("Output written to:").green(),
        args.output_path.display()
    );
}

fn print_summary(root: &Path, result: &ScanResult, seconds: f64, verbose: bool) {
    println!(
        "\n{}  codeatlas scan: {}",
        style("✓").green().bold(),
        style(
            root.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        )
        .bold()
    );

    let stats = &result.stats;
    println!("  {:<18} {}", "Files:", stats.files);
    println!("  {:<18} {}", "Functions:", stats.functions);
    println!("  {:<18} {}", "Import edges:", stats.import_edges);
    println!("  {:<18} {}", "Call edges:", stats.call_edges);
    println!(
        "  {:<18} {} hit / {} parsed",
        "Cache:", stats.cache_hits, stats.cache_misses
    );

    let cycles = result.circular_imports.len() + result.call_graph.circular_calls.len();
    let cycle_text = format!(
        "{} import / {} call",
        result.circular_imports.len(),
        result.call_graph.circular_calls.len()
    );
    println!(
        "  {:<18} {}",
        "Cycles:",
        if cycles == 0 {
            style(cycle_text).green()
        } else {
            style(cycle_text).yellow()
        }
    );
    println!(
        "  {:<18} {}",
        "Dead functions:",
        result.call_graph.dead_functions.len()
    );
    println!(
        "  {:<18} {}",
        "High complexity:",
        result.complexity.summary.high_risk
    );
    if let Some(ws) = &result.workspaces {
        println!(
            "  {:<18} {} ({} circular)",
            "Workspaces:", ws.stats.total_workspaces, ws.stats.circular_dependency_count
        );
    }
    if !result.warnings.is_empty() {
        println!(
            "  {:<18} {}",
            "Warnings:",
            style(result.warnings.len()).yellow()
        );
    }
    println!("  {:<18} {:.1}ms", "Duration:", seconds * 1000.0);

    if verbose {
        println!("\n  Phase Timings:");
        for (phase, secs) in &result.phase_timings {
            println!("    {:<14} {:.1}ms", phase, secs * 1000.0);
        }
        for warning in &result.warnings {
            println!(
                "  {} [{}] {}{}",
                style("!").yellow(),
                warning.kind,
                warning
                    .path
                    .as_deref()
                    .map(|p| format!("{p}: "))
                    .unwrap_or_default(),
                warning.message
            );
        }
    }
}
