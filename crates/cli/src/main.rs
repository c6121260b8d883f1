// netsieve CLI - clean, validate and centralize network-asset feature files

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use serde::Serialize;

use netsieve_cli::exit_codes::{
    fatal_exit_code, run_exit_code, EXIT_CONFIG, EXIT_FATAL_IO, EXIT_SUCCESS, EXIT_USAGE,
};
use netsieve_cli::{CancelFlag, Orchestrator, RunRequest};
use netsieve_config::{load_catalog_source, RunSettings};
use netsieve_engine::{Catalog, ModelStatus, RunStatus, RunSummary};

#[derive(Parser)]
#[command(name = "netsieve")]
#[command(about = "Validate, deduplicate and centralize network-asset GeoJSON files")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// More log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every matching file under INPUT and write model outputs to OUTPUT
    #[command(after_help = "\
Examples:
  netsieve run ./export ./centralized
  netsieve run ./export ./out --models case,camereta
  netsieve run ./export ./out --no-duplicates --jobs 4
  netsieve run ./export ./out --json > summary.json

Exit codes:
  0  success          1  some model failed    2  usage error
  3  input/output I/O 4  catalog/settings     5  nothing processed
  130 interrupted")]
    Run {
        /// Directory searched recursively for input files
        input: PathBuf,

        /// Directory receiving the outputs (created if missing)
        output: PathBuf,

        /// Only run these models (comma-separated ids)
        #[arg(long, value_delimiter = ',', value_name = "IDS")]
        models: Vec<String>,

        /// Keep records even if an identical one was already emitted
        #[arg(long)]
        no_duplicates: bool,

        /// Model catalog (TOML). Defaults to the built-in catalog.
        #[arg(long, env = "NETSIEVE_CATALOG")]
        catalog: Option<PathBuf>,

        /// Run settings (TOML)
        #[arg(long, env = "NETSIEVE_SETTINGS")]
        settings: Option<PathBuf>,

        /// Worker threads (0 = one per CPU)
        #[arg(long, short = 'j')]
        jobs: Option<usize>,

        /// Print the run summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// List models in detection priority order
    #[command(after_help = "\
Examples:
  netsieve models
  netsieve models --catalog ./my-models.toml")]
    Models {
        /// Model catalog (TOML). Defaults to the built-in catalog.
        #[arg(long, env = "NETSIEVE_CATALOG")]
        catalog: Option<PathBuf>,
    },

    /// Show which model each file name routes to
    #[command(after_help = "\
Examples:
  netsieve detect CASE_BARLAD.geojson ZONA_PON_VS.geojson")]
    Detect {
        /// File names to route
        #[arg(required = true)]
        names: Vec<String>,

        /// Model catalog (TOML). Defaults to the built-in catalog.
        #[arg(long, env = "NETSIEVE_CATALOG")]
        catalog: Option<PathBuf>,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("NETSIEVE_COMMIT"), ")",
        "\nengine:  netsieve-engine ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("NETSIEVE_TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            input,
            output,
            models,
            no_duplicates,
            catalog,
            settings,
            jobs,
            json,
        } => cmd_run(input, output, models, no_duplicates, catalog, settings, jobs, json),
        Commands::Models { catalog } => cmd_models(catalog),
        Commands::Detect { names, catalog } => cmd_detect(names, catalog),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { code: EXIT_CONFIG, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_FATAL_IO, message: msg.into(), hint: None }
    }

    /// Non-zero exit without a message; the summary already explains it.
    pub fn silent(code: u8) -> Self {
        Self { code, message: String::new(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn load_catalog(path: Option<&Path>) -> Result<Catalog, CliError> {
    let source = load_catalog_source(path).map_err(|e| CliError::config(e.to_string()))?;
    Catalog::from_toml(&source).map_err(|e| {
        CliError::config(e.to_string()).with_hint("check the [[models]] array in the catalog file")
    })
}

// ============================================================================
// run
// ============================================================================

#[derive(Serialize)]
struct RunReport<'a> {
    run_at: String,
    engine_version: &'static str,
    input: &'a Path,
    output: &'a Path,
    #[serde(flatten)]
    summary: &'a RunSummary,
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    input: PathBuf,
    output: PathBuf,
    models: Vec<String>,
    no_duplicates: bool,
    catalog: Option<PathBuf>,
    settings: Option<PathBuf>,
    jobs: Option<usize>,
    json: bool,
) -> Result<(), CliError> {
    let mut settings = RunSettings::load(settings.as_deref()).map_err(|e| CliError::config(e.to_string()))?;
    if no_duplicates {
        settings.duplicate_detection = false;
    }
    if let Some(jobs) = jobs {
        settings.workers = jobs;
    }
    let catalog = load_catalog(catalog.as_deref())?;

    let models: Vec<String> = models.into_iter().filter(|m| !m.trim().is_empty()).collect();
    let request = RunRequest {
        input,
        output,
        models: (!models.is_empty()).then_some(models),
    };

    let cancel = CancelFlag::new();
    install_interrupt_handler(cancel.clone());

    let summary = Orchestrator::new(catalog, settings)
        .with_cancel(cancel)
        .run(&request)
        .map_err(|e| {
            let code = fatal_exit_code(&e);
            let err = CliError { code, message: e.to_string(), hint: None };
            if code == EXIT_USAGE {
                err.with_hint("run `netsieve models` to list model ids")
            } else {
                err
            }
        })?;

    if json {
        let report = RunReport {
            run_at: chrono::Utc::now().to_rfc3339(),
            engine_version: env!("CARGO_PKG_VERSION"),
            input: &request.input,
            output: &request.output,
            summary: &summary,
        };
        let text = serde_json::to_string_pretty(&report).map_err(|e| CliError::io(e.to_string()))?;
        println!("{}", text);
    } else {
        print_summary(&summary);
    }

    match run_exit_code(summary.status) {
        EXIT_SUCCESS => Ok(()),
        code => Err(CliError::silent(code)),
    }
}

/// Set the cancel flag on the first Ctrl-C; in-flight files still finish.
fn install_interrupt_handler(cancel: CancelFlag) {
    let spawned = std::thread::Builder::new()
        .name("netsieve-interrupt".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(e) => {
                    log::warn!("interrupt handling unavailable: {e}");
                    return;
                }
            };
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("interrupted; finishing files in flight");
                    cancel.cancel();
                }
            });
        });
    if let Err(e) = spawned {
        log::warn!("interrupt handling unavailable: {e}");
    }
}

fn print_summary(summary: &RunSummary) {
    let t = &summary.totals;
    eprintln!("netsieve run: {}", summary.status);
    eprintln!(
        "  files:   {} found, {} processed, {} skipped, {} unmatched",
        t.files_discovered, t.files_processed, t.files_skipped, t.files_unrouted
    );
    eprintln!(
        "  records: {} accepted, {} rejected, {} duplicate(s) skipped",
        t.records_accepted, t.records_rejected, t.duplicates_skipped
    );

    let active: Vec<_> = summary
        .models
        .iter()
        .filter(|m| m.files_matched > 0 || m.status == ModelStatus::Failed)
        .collect();
    if active.is_empty() {
        return;
    }

    eprintln!();
    eprintln!(
        "  {:<22} {:<10} {:>7} {:>9} {:>9} {:>6}",
        "MODEL", "STATUS", "FILES", "ACCEPTED", "REJECTED", "DUPES"
    );
    for m in &active {
        eprintln!(
            "  {:<22} {:<10} {:>7} {:>9} {:>9} {:>6}",
            m.model,
            m.status.to_string(),
            format!("{}/{}", m.files_processed, m.files_matched),
            m.records_accepted,
            m.records_rejected,
            m.duplicates_skipped
        );
        for err in &m.errors {
            eprintln!("      ! {}", err);
        }
    }

    let outputs: Vec<&PathBuf> = active.iter().flat_map(|m| &m.outputs).collect();
    if !outputs.is_empty() {
        eprintln!();
        eprintln!("  outputs:");
        for path in outputs {
            eprintln!("    {}", path.display());
        }
    }

    if summary.status == RunStatus::Cancelled {
        eprintln!();
        eprintln!("  run was interrupted; models with unprocessed files wrote nothing");
    }
}

// ============================================================================
// models
// ============================================================================

fn cmd_models(catalog: Option<PathBuf>) -> Result<(), CliError> {
    let catalog = load_catalog(catalog.as_deref())?;
    for (index, entry) in catalog.entries().iter().enumerate() {
        let patterns = entry
            .route
            .as_ref()
            .map(|r| r.patterns.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(" "))
            .unwrap_or_else(|| "-".to_string());
        match &entry.model {
            Ok(model) => println!(
                "{:>3}. {:<22} {:<8} {:<12} {}",
                index + 1,
                model.id,
                model.layer.to_string(),
                model.output.to_string(),
                patterns
            ),
            Err(err) => println!("{:>3}. {:<22} BROKEN   {}", index + 1, entry.id, err),
        }
    }
    for shadow in catalog.shadowed() {
        eprintln!("warning: {}", shadow);
    }
    Ok(())
}

// ============================================================================
// detect
// ============================================================================

fn cmd_detect(names: Vec<String>, catalog: Option<PathBuf>) -> Result<(), CliError> {
    let catalog = load_catalog(catalog.as_deref())?;
    if catalog.entries().is_empty() {
        return Err(CliError::usage("catalog has no models"));
    }
    for name in &names {
        let file_name = Path::new(name)
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());
        println!("{}", name);
        for decision in catalog.route(&file_name) {
            println!(
                "  {:<20} {}",
                decision.group,
                decision.model.as_deref().unwrap_or("-")
            );
        }
    }
    Ok(())
}
