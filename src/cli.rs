//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and conversion into a [`Selection`].

use crate::analysis::AggregationKind;
use crate::models::{GeoPoint, Region, ResponseType, Selection, SelectionError};
use clap::Parser;
use std::path::PathBuf;

/// CohortLens - comparative survey analytics
///
/// Summarize survey scores across a filtered cohort, compare one response
/// against its peers, and restrict the cohort to a circle on the map.
///
/// Examples:
///   cohortlens --responses export.json --target r-104
///   cohortlens --responses export.json --target r-104 --filter country=Kenya
///   cohortlens --responses export.json --region-center -1.29,36.82 --region-radius 50000
///   cohortlens --responses export.json --aggregation median --group-by ageGroup --format json
///   cohortlens --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// JSON export of survey responses (an array of response records)
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "COHORTLENS_RESPONSES",
        required_unless_present_any = ["init_config", "list_categories"]
    )]
    pub responses: Option<PathBuf>,

    /// Id of the response to compare against its cohort
    #[arg(short, long, value_name = "ID")]
    pub target: Option<String>,

    /// Restrict the cohort to one response type
    #[arg(long = "type", default_value = "all", value_name = "TYPE")]
    pub response_type: TypeFilter,

    /// Attribute filter as key=value (repeatable, all must match)
    ///
    /// Example: --filter country=Kenya --filter ageGroup=18-25
    #[arg(short, long = "filter", value_name = "KEY=VALUE")]
    pub filters: Vec<String>,

    /// Explicit response ids picked on the map (comma-separated)
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub map_subset: Option<Vec<String>>,

    /// Center of the drawn region as "lat,lng"
    #[arg(
        long,
        value_name = "LAT,LNG",
        allow_hyphen_values = true,
        requires = "region_radius"
    )]
    pub region_center: Option<String>,

    /// Radius of the drawn region in meters
    #[arg(long, value_name = "METERS", requires = "region_center")]
    pub region_radius: Option<f64>,

    /// Reduction for the cohort summary (overrides config)
    #[arg(short, long, value_name = "KIND")]
    pub aggregation: Option<AggregationKind>,

    /// Score categories to summarize, comma-separated (overrides config)
    ///
    /// Unknown categories are reported and skipped.
    #[arg(long, value_name = "KEYS", value_delimiter = ',')]
    pub categories: Option<Vec<String>>,

    /// Attribute to group the cohort summary by (overrides config)
    #[arg(short, long, value_name = "ATTR")]
    pub group_by: Option<String>,

    /// Output file path for the report (overrides config)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .cohortlens.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Exit with code 2 when the target has no peers to be compared with
    #[arg(long, requires = "target")]
    pub require_peers: bool,

    /// Print the score categories of every response type and exit
    #[arg(long)]
    pub list_categories: bool,

    /// Generate a default .cohortlens.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Response type restriction as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TypeFilter {
    #[default]
    All,
    Church,
    Institution,
    NonFormal,
}

impl From<TypeFilter> for Option<ResponseType> {
    fn from(filter: TypeFilter) -> Self {
        match filter {
            TypeFilter::All => None,
            TypeFilter::Church => Some(ResponseType::Church),
            TypeFilter::Institution => Some(ResponseType::Institution),
            TypeFilter::NonFormal => Some(ResponseType::NonFormal),
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for standalone actions
        if self.init_config || self.list_categories {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref subset) = self.map_subset {
            if subset.iter().all(|id| id.trim().is_empty()) {
                return Err("--map-subset needs at least one response id".to_string());
            }
        }

        if let Some(ref path) = self.responses {
            if !path.is_file() {
                return Err(format!("Responses file does not exist: {}", path.display()));
            }
        }

        // Region and filters must form a valid selection
        self.selection().map(|_| ()).map_err(|e| e.to_string())
    }

    /// Build the selection described by the arguments.
    pub fn selection(&self) -> Result<Selection, SelectionError> {
        let mut selection = Selection {
            response_type: self.response_type.into(),
            target_id: self.target.clone(),
            map_subset: self.map_subset.as_ref().map(|ids| {
                ids.iter()
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .collect()
            }),
            ..Selection::default()
        };

        for filter in &self.filters {
            selection.add_filter_arg(filter)?;
        }

        if let (Some(center), Some(radius)) = (&self.region_center, self.region_radius) {
            selection.region = Some(Region::new(parse_center(center)?, radius)?);
        }

        Ok(selection)
    }
}

/// Parse a "lat,lng" pair.
fn parse_center(value: &str) -> Result<GeoPoint, SelectionError> {
    let invalid = || {
        SelectionError::InvalidRegion(format!("center must be \"lat,lng\", got \"{}\"", value))
    };

    let (lat, lng) = value.split_once(',').ok_or_else(invalid)?;
    let latitude = lat.trim().parse::<f64>().map_err(|_| invalid())?;
    let longitude = lng.trim().parse::<f64>().map_err(|_| invalid())?;

    Ok(GeoPoint::new(latitude, longitude))
}
