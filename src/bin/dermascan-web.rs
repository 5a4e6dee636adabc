// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Dermascan Web Server
//!
//! Standalone server for the upload form, history pages and JSON API.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use dermascan::config::AppConfig;
use dermascan::db::Database;
use dermascan::inference::{Classifier, ServingClassifier};
use dermascan::web::{start_server, AppState};
use dermascan::Result;

#[derive(Parser, Debug)]
#[command(name = "dermascan-web")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version = "1.0.0")]
#[command(about = "Dermascan Web Server")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Host to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Skip the model server reachability check on startup
    #[arg(long)]
    skip_health_check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Dermascan Web Server v1.0.0");

    // Load config
    let mut config = AppConfig::load(&args.config)?;

    // Apply CLI overrides
    if let Some(host) = args.host {
        config.web.host = host;
    }
    if let Some(port) = args.port {
        config.web.port = port;
    }

    // Initialize database
    let db = Database::open(&config.database.path)?;
    info!("Database: {}", config.database.path);

    // The classifier is built once and shared by every request
    let classifier = ServingClassifier::new(&config.model)?;
    if !args.skip_health_check {
        if let Err(e) = classifier.health_check().await {
            warn!("{}; uploads will fail until the model server is up", e);
        }
    }
    let classifier: Arc<dyn Classifier> = Arc::new(classifier);

    let state = AppState::new(db, config, classifier)?;
    start_server(state).await
}
