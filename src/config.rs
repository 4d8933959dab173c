//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.cohortlens.toml` files.

use crate::analysis::AggregationKind;
use crate::geo::BoundingRegion;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".cohortlens.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Cohort summary settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Map settings.
    #[serde(default)]
    pub map: MapConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "cohort_report.md".to_string()
}

/// Cohort summary settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Reduction used for the cohort summary.
    #[serde(default)]
    pub aggregation: AggregationKind,

    /// Category keys to summarize (empty = all categories of the selected type).
    #[serde(default)]
    pub categories: Vec<String>,

    /// Attribute to group the cohort summary by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
}

/// Default map view, used when no cohort member is geocoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(default = "default_south")]
    pub south: f64,

    #[serde(default = "default_west")]
    pub west: f64,

    #[serde(default = "default_north")]
    pub north: f64,

    #[serde(default = "default_east")]
    pub east: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            south: default_south(),
            west: default_west(),
            north: default_north(),
            east: default_east(),
        }
    }
}

fn default_south() -> f64 {
    -60.0
}

fn default_west() -> f64 {
    -180.0
}

fn default_north() -> f64 {
    75.0
}

fn default_east() -> f64 {
    180.0
}

impl MapConfig {
    pub fn default_view(&self) -> BoundingRegion {
        BoundingRegion::new(self.south, self.west, self.north, self.east)
    }
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Decimal places for scores and differences.
    #[serde(default = "default_score_decimals")]
    pub score_decimals: usize,

    /// Decimal places for country shares.
    #[serde(default = "default_share_decimals")]
    pub share_decimals: usize,

    /// Include the geographic distribution section.
    #[serde(default = "default_true")]
    pub include_distribution: bool,

    /// Include the grouped summary section.
    #[serde(default = "default_true")]
    pub include_grouped: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            score_decimals: default_score_decimals(),
            share_decimals: default_share_decimals(),
            include_distribution: true,
            include_grouped: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_score_decimals() -> usize {
    2
}

fn default_share_decimals() -> usize {
    3
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load configuration from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        if let Some(aggregation) = args.aggregation {
            self.analysis.aggregation = aggregation;
        }
        if let Some(ref categories) = args.categories {
            self.analysis.categories = categories.clone();
        }
        if let Some(ref group_by) = args.group_by {
            self.analysis.group_by = Some(group_by.clone());
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Log level after merging: quiet wins, then verbose from either source.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
