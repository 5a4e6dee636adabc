// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Dermascan: skin lesion classification with analysis history
//!
//! Command line front end for classifying images, browsing and pruning the
//! analysis history, exporting reports and running the web UI.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use dermascan::config::AppConfig;
use dermascan::db::{Database, FileCleanup};
use dermascan::inference::{Classifier, ServingClassifier};
use dermascan::report::{build_export, render_pdf};
use dermascan::uploads::{discard_upload, store_upload};
use dermascan::web::{start_server, AppState};
use dermascan::{DermaError, Result};

/// Dermascan CLI - skin lesion classification and analysis history
#[derive(Parser, Debug)]
#[command(name = "dermascan")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version = "1.0.0")]
#[command(about = "Skin lesion classification with analysis history", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the web UI and JSON API
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Classify an image and record the result
    Classify {
        /// Image file to classify
        image: PathBuf,
    },

    /// History operations
    History {
        #[command(subcommand)]
        action: HistoryCommands,
    },

    /// Export an analysis report
    Export {
        /// Analysis id
        id: String,

        /// Write a PDF report to this file instead of printing JSON
        #[arg(long)]
        pdf: Option<PathBuf>,
    },

    /// Show disease reference information
    Disease {
        /// Disease name (lists all when omitted)
        name: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show model server and database status
    Status,

    /// Initialize a new Dermascan project
    Init {
        /// Directory to initialize (default: current)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryCommands {
    /// List recent analyses
    List {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },

    /// Delete one analysis and its image
    Delete {
        /// Analysis id
        id: String,
    },

    /// Delete every analysis and image
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Load configuration
    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Some(Commands::Serve { host, port }) => run_serve(config, host, port).await,
        Some(Commands::Classify { image }) => run_classify(config, &image).await,
        Some(Commands::History { action }) => run_history_command(config, action),
        Some(Commands::Export { id, pdf }) => run_export(config, &id, pdf.as_deref()),
        Some(Commands::Disease { name }) => run_disease(config, name.as_deref()),
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config),
        Some(Commands::Status) => run_status(config).await,
        Some(Commands::Init { dir, force }) => run_init(dir, force),
        None => run_serve(config, None, None).await,
    }
}

/// Start the web server
async fn run_serve(mut config: AppConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.web.host = host;
    }
    if let Some(port) = port {
        config.web.port = port;
    }

    let db = Database::open(&config.database.path)?;
    info!("Database: {}", config.database.path);

    let classifier: Arc<dyn Classifier> = Arc::new(ServingClassifier::new(&config.model)?);
    let state = AppState::new(db, config, classifier)?;
    start_server(state).await
}

/// Copy an image into the uploads directory, classify it and record the result
async fn run_classify(config: AppConfig, image: &Path) -> Result<()> {
    let db = Database::open(&config.database.path)?;
    let classifier = ServingClassifier::new(&config.model)?;

    let data = tokio::fs::read(image).await?;
    let name = image.to_string_lossy();
    let stored = store_upload(&config.uploads, &name, &data).await?;

    let recorded = match classifier.classify(&stored).await {
        Ok(prediction) => db
            .create_analysis(&stored.to_string_lossy(), &prediction.disease_class, prediction.confidence)
            .map(|id| (id, prediction)),
        Err(e) => Err(e),
    };
    let (id, prediction) = match recorded {
        Ok(recorded) => recorded,
        Err(e) => {
            discard_upload(&stored).await;
            return Err(e);
        }
    };

    println!("Analysis {}", id);
    println!("  Class:      {}", prediction.disease_class);
    println!("  Confidence: {:.2}%", prediction.confidence);
    match db.lookup_disease(&prediction.disease_class)? {
        Some(info) => println!("  {}", info.description),
        None => warn!("No catalog entry for {:?}", prediction.disease_class),
    }

    Ok(())
}

fn describe_cleanup(cleanup: &FileCleanup) -> String {
    match cleanup {
        FileCleanup::Removed => "image removed".to_string(),
        FileCleanup::Missing => "image was already missing".to_string(),
        FileCleanup::Failed { reason } => format!("image could not be removed: {}", reason),
    }
}

/// Run history commands
fn run_history_command(config: AppConfig, action: HistoryCommands) -> Result<()> {
    let db = Database::open(&config.database.path)?;

    match action {
        HistoryCommands::List { count } => {
            let records = db.list_recent(count)?;
            if records.is_empty() {
                println!("No analyses recorded");
                return Ok(());
            }
            println!("Recent analyses:");
            for record in records {
                println!("  {} {} {:<28} {:>6.2}%",
                    record.timestamp.format("%Y-%m-%d %H:%M"),
                    record.id,
                    record.disease_class,
                    record.confidence
                );
            }
        }
        HistoryCommands::Delete { id } => {
            let cleanup = db.delete_analysis(&id)?;
            println!("Deleted {} ({})", id, describe_cleanup(&cleanup));
        }
        HistoryCommands::Clear { force } => {
            if !force {
                eprintln!("Use --force to confirm clearing history");
                return Ok(());
            }
            let summary = db.clear_history()?;
            println!("Removed {} analyses", summary.records_removed);
            println!("  Images removed: {}", summary.files_removed);
            println!("  Images missing: {}", summary.files_missing);
            for failure in &summary.failures {
                println!("  Failed: {}", failure);
            }
        }
    }

    Ok(())
}

/// Print a JSON export or write a PDF report
fn run_export(config: AppConfig, id: &str, pdf: Option<&Path>) -> Result<()> {
    let db = Database::open(&config.database.path)?;
    let export = build_export(&db, id)?;

    match pdf {
        Some(output) => {
            std::fs::write(output, render_pdf(&export)?)?;
            println!("Wrote report to {:?}", output);
        }
        None => println!("{}", serde_json::to_string_pretty(&export)?),
    }
    Ok(())
}

/// Show one catalog entry or list them all
fn run_disease(config: AppConfig, name: Option<&str>) -> Result<()> {
    let db = Database::open(&config.database.path)?;

    match name {
        Some(name) => {
            let info = db
                .lookup_disease(name)?
                .ok_or_else(|| DermaError::InvalidInput(format!("Unknown disease: {}", name)))?;
            println!("{}", info.name);
            println!("  Description: {}", info.description);
            println!("  Symptoms:    {}", info.symptoms);
            println!("  Treatments:  {}", info.treatments);
            println!("  Prevention:  {}", info.prevention);
        }
        None => {
            for info in db.list_diseases()? {
                println!("  {}", info.name);
            }
        }
    }
    Ok(())
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Model URL: {}", config.model.url);
            println!("  Uploads:   {}", config.uploads.dir);
            println!("  Database:  {}", config.database.path);
        }
    }

    Ok(())
}

/// Run status check
async fn run_status(config: AppConfig) -> Result<()> {
    println!("Dermascan v1.0.0 Status");
    println!("=======================");

    let classifier = ServingClassifier::new(&config.model)?;
    match classifier.health_check().await {
        Ok(()) => println!("Model server: Running ({})", config.model.url),
        Err(e) => println!("Model server: Error - {}", e),
    }

    match Database::open(&config.database.path) {
        Ok(db) => {
            println!("\nDatabase ({}):", config.database.path);
            println!("  Analyses: {}", db.count_analyses()?);
            println!("  Catalog entries: {}", db.list_diseases()?.len());
        }
        Err(e) => println!("\nDatabase: Error - {}", e),
    }

    println!("\nLabels: {}", config.model.labels.join(", "));
    Ok(())
}

/// Initialize a new Dermascan project
fn run_init(dir: Option<PathBuf>, force: bool) -> Result<()> {
    let target = dir.unwrap_or_else(|| PathBuf::from("."));
    let config_path = target.join("config.json");

    if config_path.exists() && !force {
        return Err(DermaError::Config(
            "config.json already exists. Use --force to overwrite".to_string()
        ));
    }

    let mut config = AppConfig::default();
    let uploads = target.join(&config.uploads.dir);
    std::fs::create_dir_all(&uploads)?;
    config.uploads.dir = uploads.to_string_lossy().to_string();
    config.database.path = target.join(&config.database.path).to_string_lossy().to_string();
    config.save(&config_path)?;

    Database::open(&config.database.path)?;

    println!("Dermascan initialized in {:?}", target);
    println!("\nCreated:");
    println!("  - config.json");
    println!("  - {}", config.uploads.dir);
    println!("  - {}", config.database.path);
    println!("\nNext steps:");
    println!("  1. Start the model server with the exported classifier");
    println!("  2. Start the web UI: dermascan serve");

    Ok(())
}
