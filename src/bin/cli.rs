use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use gantt_leveler::{
    DateId, FileGanttStore, GanttService, LevelerConfig, LevelingResult, RunOptions, SourceKind,
    StructureConfig, format_duration, level_structure, save_results_to_csv, save_results_to_json,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "gantt-leveler")]
#[command(version, about = "Set resource-leveling delays on Gantt structures")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, short = 'c', global = true, env = "GANTT_LEVELER_CONFIG", default_value = "leveler.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Level one structure, or every configured structure
    Run {
        /// Structure name from the configuration (default: all)
        #[arg(long, short = 's')]
        structure: Option<String>,

        /// Level from this date (YYYYMMDD) instead of today
        #[arg(long)]
        today: Option<DateId>,

        /// Compute delays without writing them back
        #[arg(long)]
        dry_run: bool,

        /// Export computed delays to a .csv or .json file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Working time between two dates (YYYYMMDD, finish exclusive) in a structure's calendar
    Duration {
        #[arg(long, short = 's')]
        structure: String,
        start: DateId,
        finish: DateId,
    },
}

enum Store {
    Json(FileGanttStore),
    #[cfg(feature = "sqlite")]
    Sqlite(gantt_leveler::SqliteGanttStore),
}

impl Store {
    fn open(config: &LevelerConfig) -> Result<Self> {
        let path = &config.source.path;
        match config.source.kind {
            SourceKind::Json => Ok(Store::Json(
                FileGanttStore::open(path)
                    .with_context(|| format!("failed to open snapshot {}", path.display()))?,
            )),
            #[cfg(feature = "sqlite")]
            SourceKind::Sqlite => Ok(Store::Sqlite(
                gantt_leveler::SqliteGanttStore::new(path)
                    .with_context(|| format!("failed to open database {}", path.display()))?,
            )),
            #[cfg(not(feature = "sqlite"))]
            SourceKind::Sqlite => bail!("rebuild with the `sqlite` feature to use sqlite sources"),
        }
    }

    fn service(&mut self) -> &mut dyn GanttService {
        match self {
            Store::Json(store) => store,
            #[cfg(feature = "sqlite")]
            Store::Sqlite(store) => store,
        }
    }

    /// Persist writes that only live in memory.
    fn flush(&self) -> Result<()> {
        match self {
            Store::Json(store) => store.save().context("failed to save snapshot"),
            #[cfg(feature = "sqlite")]
            Store::Sqlite(_) => Ok(()),
        }
    }
}

fn init_logging() {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn export_results(path: &Path, results: &[LevelingResult]) -> Result<()> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("csv") => save_results_to_csv(results, path)?,
        Some("json") => save_results_to_json(results, path)?,
        _ => bail!("export path must end in .csv or .json: {}", path.display()),
    }
    Ok(())
}

fn run(
    config: &LevelerConfig,
    structure: Option<&str>,
    options: RunOptions,
    export: Option<&Path>,
) -> Result<()> {
    let selected: Vec<(&String, &StructureConfig)> = match structure {
        Some(name) => {
            let (name, structure) = config
                .structures
                .get_key_value(name)
                .with_context(|| format!("no structure named '{name}' in configuration"))?;
            vec![(name, structure)]
        }
        None => config.structures.iter().collect(),
    };

    let mut store = Store::open(config)?;
    let mut exported = Vec::new();
    for (name, structure) in selected {
        info!(structure = %name, "leveling structure");
        let outcome = level_structure(store.service(), structure, options);
        if !options.dry_run {
            store.flush()?;
        }
        let summary =
            outcome.with_context(|| format!("failed to level structure '{name}'"))?;

        println!("{name}: {}", summary.to_cli_summary());
        for result in &summary.results {
            let note = if result.pinned { " (pinned)" } else { "" };
            println!(
                "  {:<16} row={:<8} delay={}{}",
                result.issue_key,
                result.row_id,
                format_duration(result.delay),
                note
            );
        }
        for key in &summary.skipped {
            println!("  {key:<16} skipped (not in structure)");
        }
        exported.extend(summary.results);
    }

    if let Some(path) = export {
        export_results(path, &exported)?;
        println!("Exported {} results to {}", exported.len(), path.display());
    }
    Ok(())
}

fn duration(config: &LevelerConfig, structure: &str, start: DateId, finish: DateId) -> Result<()> {
    let structure = config.structure(structure)?;
    let mut store = Store::open(config)?;
    let meta = store
        .service()
        .gantt_meta(structure.id)
        .context("failed to fetch gantt meta")?;
    let total = meta.calendar.working_duration_between(start, finish);
    println!(
        "{} working time in [{start}, {finish}) ({} calendar)",
        format_duration(total),
        meta.calendar.name()
    );
    Ok(())
}

fn execute(cli: Cli) -> Result<()> {
    let config = LevelerConfig::load(&cli.config)
        .with_context(|| format!("failed to load configuration {}", cli.config.display()))?;

    match cli.command {
        Commands::Run {
            structure,
            today,
            dry_run,
            export,
        } => run(
            &config,
            structure.as_deref(),
            RunOptions {
                today_override: today,
                dry_run,
            },
            export.as_deref(),
        ),
        Commands::Duration {
            structure,
            start,
            finish,
        } => duration(&config, &structure, start, finish),
    }
}

fn main() -> ExitCode {
    init_logging();
    if let Err(e) = execute(Cli::parse()) {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
