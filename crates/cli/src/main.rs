//! Education <-> LMS sync command-line tool.
//!
//! Fires lifecycle events at the sync hooks against a local SQLite document
//! store, seeds documents, and shows the audit trail and error log.
//! Also generates and validates configuration files.

mod console;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use edulms_sync_core::config::AppConfig;
use edulms_sync_core::db::Database;
use edulms_sync_core::dispatch::{DocEvent, HookTable};
use edulms_sync_core::errors::DispatchError;
use edulms_sync_core::models::{Document, Entity};
use edulms_sync_core::runner::EventRunner;
use edulms_sync_core::store::RecordStore;

use crate::console::ConsoleReporter;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Education <-> LMS sync command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "edulms-sync",
    version,
    about = "Mirror enrollments and courses between Education and LMS"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(
        short,
        long,
        global = true,
        default_value = "/etc/edulms-sync/config.toml"
    )]
    config: PathBuf,

    /// Log filter (overrides `logging.level`; `RUST_LOG` wins over both).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./edulms-sync.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,

    /// Dispatch a lifecycle event for a JSON document.
    Fire {
        /// Entity name, e.g. "Program Enrollment" or "lms_course".
        entity: String,

        /// Event name: after_insert or on_trash.
        event: String,

        /// JSON file holding the document.
        file: PathBuf,
    },

    /// Insert a document into the store without firing any hook.
    Put {
        /// Entity name.
        entity: String,

        /// JSON file holding the document.
        file: PathBuf,
    },

    /// List stored documents of one entity.
    Records {
        /// Entity name.
        entity: String,

        /// Maximum number of documents to show.
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Show recent audit log entries.
    Audit {
        /// Maximum number of entries to show.
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Show recent error reports.
    Errors {
        /// Maximum number of entries to show.
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"));
            cmd_init(&output)
        }
        Commands::Validate => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"));
            cmd_validate(&cli.config)
        }
        command => {
            // Everything else needs the config and the database
            let config = load_config(&cli.config)?;
            init_logging(cli.log_level.as_deref().unwrap_or(&config.logging.level));
            let db = open_database(&config)?;

            match command {
                Commands::Fire {
                    entity,
                    event,
                    file,
                } => cmd_fire(&db, &config, &entity, &event, &file),
                Commands::Put { entity, file } => cmd_put(&db, &entity, &file),
                Commands::Records { entity, limit } => cmd_records(&db, &entity, limit),
                Commands::Audit { limit } => cmd_audit(&db, limit),
                Commands::Errors { limit } => cmd_errors(&db, limit),
                Commands::Init { .. } | Commands::Validate => unreachable!(),
            }
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load_and_resolve(path).context("failed to load configuration file")
}

fn open_database(config: &AppConfig) -> Result<Database> {
    let db = Database::new(config.store.db_path()).context("failed to open database")?;
    db.initialize().context("failed to initialize database")?;
    Ok(db)
}

fn parse_entity(name: &str) -> Result<Entity> {
    let known: Vec<_> = Entity::ALL.iter().map(|e| e.as_str()).collect();
    Entity::from_str_val(name)
        .ok_or_else(|| DispatchError::UnknownEntity(name.to_string()))
        .with_context(|| format!("expected one of: {}", known.join(", ")))
}

fn parse_event(name: &str) -> Result<DocEvent> {
    DocEvent::from_str_val(name)
        .ok_or_else(|| DispatchError::UnknownEvent(name.to_string()))
        .context("expected after_insert or on_trash")
}

fn read_document(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let doc: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    if !doc.is_object() {
        anyhow::bail!("{} must hold a JSON object", path.display());
    }
    Ok(doc)
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# Education <-> LMS sync configuration

[store]
data_dir = "/var/lib/edulms-sync"
db_file = "edulms.db"

[logging]
level = "info"

[sync]
# Handlers bound to lifecycle events. Remove entries to disable them.
enabled_handlers = [
    "enrollment_created",
    "enrollment_deleted",
    "course_enrollment_created",
    "education_course_created",
    "education_course_deleted",
    "lms_course_created",
    "lms_course_deleted",
]
persist_error_reports = true
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Point [store] data_dir at a writable directory (or set EDULMS_DATA_DIR)");
    println!(
        "  2. Validate with: edulms-sync validate --config {}",
        output.display()
    );
    println!(
        "  3. Seed documents with: edulms-sync put <entity> <file> --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    config.apply_env_overrides();
    println!("  [OK] Environment overrides applied");

    match config.validate() {
        Ok(()) => println!("  [OK] All fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    println!("  Database      : {}", config.store.db_path().display());
    println!("  Log level     : {}", config.logging.level);
    println!(
        "  Error reports : {}",
        if config.sync.persist_error_reports {
            "persisted"
        } else {
            "logged only"
        }
    );
    println!("  Handlers      :");
    for handler in &config.sync.enabled_handlers {
        let (entity, event) = handler.trigger();
        println!("    {:<28} {} / {}", handler.as_str(), entity, event);
    }
    println!();
    println!("Configuration is valid.");

    Ok(())
}

fn cmd_fire(
    db: &Database,
    config: &AppConfig,
    entity: &str,
    event: &str,
    file: &Path,
) -> Result<()> {
    let entity = parse_entity(entity)?;
    let event = parse_event(event)?;
    let doc = read_document(file)?;

    let hooks = HookTable::new(&config.sync.enabled_handlers);
    let runner = EventRunner::new(db, &hooks, &ConsoleReporter)
        .persist_error_reports(config.sync.persist_error_reports);

    let fired = runner
        .run(entity, event, &doc)
        .with_context(|| format!("failed to dispatch {} {}", entity, event))?;

    let Some(fired) = fired else {
        println!("No handler bound to {} / {}.", entity, event);
        return Ok(());
    };

    let title = format!("{} ({} / {})", fired.handler.as_str(), entity, event);
    println!("{}", console::header(&title));
    console::print_outcome(&fired.outcome);
    if !fired.error_reports.is_empty() {
        println!();
        for report in &fired.error_reports {
            println!("{}", console::failure(&report.title));
        }
    }

    Ok(())
}

fn cmd_put(db: &Database, entity: &str, file: &Path) -> Result<()> {
    let entity = parse_entity(entity)?;
    let doc = read_document(file)?;

    let document = Document::from_record(entity, &doc).context("invalid document")?;
    let name = db.insert(document).context("failed to insert document")?;
    db.commit().context("failed to commit")?;

    println!("{}", console::success(&format!("{} '{}' stored", entity, name)));
    Ok(())
}

fn cmd_records(db: &Database, entity: &str, limit: u32) -> Result<()> {
    let entity = parse_entity(entity)?;
    let documents = db
        .list_documents(entity, limit)
        .context("failed to list documents")?;

    if documents.is_empty() {
        println!("No {} documents found.", entity);
        return Ok(());
    }

    println!("{:<28} FIELDS", "NAME");
    println!("{}", "-".repeat(80));

    for doc in &documents {
        let fields = serde_json::to_string(&doc.fields).unwrap_or_default();
        println!(
            "{:<28} {}",
            doc.name.as_deref().unwrap_or("-"),
            truncate(&fields, 50)
        );
    }

    println!();
    println!(
        "{} of {} document(s) shown",
        documents.len(),
        db.count_documents(entity).context("failed to count documents")?
    );

    Ok(())
}

fn cmd_audit(db: &Database, limit: u32) -> Result<()> {
    let entries = db
        .list_audit_log(limit)
        .context("failed to list audit entries")?;

    if entries.is_empty() {
        println!("No audit log entries found.");
        return Ok(());
    }

    println!(
        "{:<22} {:<28} {:<6} {:<16} DETAILS",
        "TIMESTAMP", "ACTION", "OK", "DOCUMENT"
    );
    println!("{}", "-".repeat(100));

    for entry in &entries {
        println!(
            "{:<22} {:<28} {:<6} {:<16} {}",
            entry.created_at,
            entry.action,
            if entry.success { "yes" } else { "no" },
            truncate(entry.document.as_deref().unwrap_or("-"), 16),
            truncate(entry.details.as_deref().unwrap_or(""), 40),
        );
    }

    println!();
    println!(
        "{} entries shown, {} failure(s) in total",
        entries.len(),
        db.count_failures().context("failed to count failures")?
    );

    Ok(())
}

fn cmd_errors(db: &Database, limit: u32) -> Result<()> {
    let entries = db
        .list_error_log(limit)
        .context("failed to list error reports")?;

    if entries.is_empty() {
        println!("No error reports found.");
        return Ok(());
    }

    for entry in &entries {
        println!("{} {}", console::dim(&entry.created_at), console::header(&entry.title));
        for line in entry.message.lines() {
            println!("    {}", line);
        }
        println!();
    }

    println!("{} report(s) shown", entries.len());
    Ok(())
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
