//! CohortLens - comparative survey analytics
//!
//! A CLI tool that loads a survey response export, narrows it to a cohort
//! (type, attribute filters, map picks, a drawn region), compares a target
//! response against that cohort and writes a Markdown or JSON report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (unreadable export, bad config, invalid selection, etc.)
//!   2 - --require-peers was set and the target has no peers in the cohort

mod analysis;
mod cli;
mod config;
mod geo;
mod models;
mod registry;
mod report;
mod selection;
mod store;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use registry::ScoreRegistry;
use report::{Report, ReportMetadata};
use selection::{AnalysisOptions, SelectionStateManager};
use std::path::PathBuf;
use store::JsonFileStore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Standalone actions (no logging needed)
    if args.init_config {
        return handle_init_config();
    }
    if args.list_categories {
        handle_list_categories(&ScoreRegistry::standard());
        return Ok(());
    }

    // Load configuration before logging so [general] verbose applies
    let config = match load_config(&args) {
        Ok(mut config) => {
            config.merge_with_args(&args);
            config
        }
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(config.log_level(args.quiet));

    info!("CohortLens v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .cohortlens.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize aggregation, grouping, map view and report output.");
    Ok(())
}

/// Handle --list-categories: print the score catalog.
fn handle_list_categories(registry: &ScoreRegistry) {
    for response_type in models::ResponseType::ALL {
        println!("{} ({})", response_type, response_type.as_str());
        match registry.categories_for(response_type) {
            Ok(categories) => {
                for category in categories {
                    println!("  - {} ({})", category.label(), category.key());
                }
            }
            Err(e) => println!("  {}", e),
        }
    }
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete analysis workflow. Returns the exit code (0 or 2).
async fn run(args: Args, config: Config) -> Result<i32> {
    let selection = args.selection().context("Invalid selection")?;

    let responses_path = args
        .responses
        .clone()
        .context("No responses file given (use --responses)")?;

    // Step 1: Acquire responses
    println!("📥 Loading responses: {}", responses_path.display());
    let store = JsonFileStore::open(&responses_path).await?;
    let source = store.path().display().to_string();
    info!("{} response records in export", store.record_count());

    // Step 2: Build the cohort
    let options = AnalysisOptions {
        aggregation: config.analysis.aggregation,
        categories: config.analysis.categories.clone(),
        group_by: config.analysis.group_by.clone(),
        default_view: Some(config.map.default_view()),
    };

    let manager = SelectionStateManager::new(store, ScoreRegistry::standard(), options, selection)
        .context("Failed to compute cohort")?;
    let snapshot = manager.snapshot();

    if snapshot.target_inserted {
        warn!("Target does not match the selection; it was added to the cohort");
    }

    // Step 3: Build and save the report
    println!("📝 Generating report...");

    let report = Report {
        metadata: ReportMetadata {
            source,
            generated_at: Utc::now(),
            total_responses: manager.responses().len(),
        },
        snapshot: (*snapshot).clone(),
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, &config.report),
    };

    let output_path = output_path(&args, &config);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Print summary
    println!("\n📊 Cohort Summary:");
    println!(
        "   Responses: {} loaded, {} in cohort",
        manager.responses().len(),
        snapshot.cohort_ids.len()
    );
    println!("   Countries: {}", snapshot.distribution.len());
    if let Some(ref comparison) = snapshot.comparison {
        println!(
            "   Target vs {} peers over {} categories: {} strengths | {} to improve | {} equal",
            snapshot.peer_count,
            comparison.compared_count(),
            comparison.strength_areas.len(),
            comparison.improvement_areas.len(),
            comparison.equal_count
        );
    }
    println!("\n✅ Report saved to: {}", output_path.display());

    // Check --require-peers
    if args.require_peers && !snapshot.comparison_possible() {
        eprintln!("\n⛔ The target has no peers in this cohort. Failing (exit code 2).");
        return Ok(2);
    }

    Ok(0)
}

/// Resolve the report path, switching the default extension for JSON output.
fn output_path(args: &Args, config: &Config) -> PathBuf {
    let path = PathBuf::from(&config.general.output);
    if args.output.is_none()
        && args.format == OutputFormat::Json
        && path.extension().is_some_and(|ext| ext == "md")
    {
        path.with_extension("json")
    } else {
        path
    }
}

/// Load configuration from file or use defaults.
///
/// Runs before the subscriber is installed, so problems go to stderr directly.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            if !args.quiet {
                eprintln!("⚠️  Failed to load {}: {:#}", CONFIG_FILE_NAME, e);
            }
            Ok(Config::default())
        }
    }
}
