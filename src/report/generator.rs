//! Markdown and JSON report generation.
//!
//! This module renders a cohort snapshot for people. All rounding of
//! computed values happens here; the snapshot itself keeps full precision.

use crate::analysis::ranked_countries;
use crate::config::ReportConfig;
use crate::geo::BoundingRegion;
use crate::models::{
    AggregateResult, AreaEntry, ComparisonResult, GeographicDistribution, GroupedAggregateResult,
    Selection,
};
use crate::selection::CohortSnapshot;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata about a generated report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Where the responses were loaded from.
    pub source: String,
    /// Date and time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Number of responses ingested from the source.
    pub total_responses: usize,
}

/// A complete report: metadata plus the snapshot it renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    #[serde(flatten)]
    pub snapshot: CohortSnapshot,
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, config: &ReportConfig) -> String {
    let snapshot = &report.snapshot;
    let mut output = String::new();

    // Title
    output.push_str("# CohortLens Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata, snapshot));
    output.push_str(&generate_selection_section(&snapshot.selection));
    output.push_str(&generate_summary_section(snapshot, config));

    if config.include_grouped {
        if let Some(ref grouped) = snapshot.grouped {
            output.push_str(&generate_grouped_section(grouped, config));
        }
    }

    if let Some(ref comparison) = snapshot.comparison {
        output.push_str(&generate_comparison_section(snapshot, comparison, config));
    }

    if config.include_distribution {
        output.push_str(&generate_distribution_section(&snapshot.distribution, config));
    }

    output.push_str(&generate_bounds_section(&snapshot.bounds));
    output.push_str(&generate_footer());

    output
}

fn fmt_value(value: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, value)
}

fn fmt_signed(value: f64, decimals: usize) -> String {
    format!("{:+.*}", decimals, value)
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata, snapshot: &CohortSnapshot) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** `{}`\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Responses Loaded:** {}\n",
        metadata.total_responses
    ));
    section.push_str(&format!(
        "- **Cohort Size:** {}\n",
        snapshot.cohort_ids.len()
    ));
    section.push_str(&format!("- **Aggregation:** {}\n", snapshot.aggregation));
    section.push('\n');

    section
}

/// Generate the selection section.
fn generate_selection_section(selection: &Selection) -> String {
    let mut section = String::new();

    section.push_str("## Selection\n\n");

    let response_type = selection
        .response_type
        .map(|rt| rt.to_string())
        .unwrap_or_else(|| "All".to_string());
    section.push_str(&format!("- **Response Type:** {}\n", response_type));

    if let Some(ref target) = selection.target_id {
        section.push_str(&format!("- **Target:** `{}`\n", target));
    }

    if selection.field_filters.is_empty() {
        section.push_str("- **Filters:** none\n");
    } else {
        let filters: Vec<String> = selection
            .field_filters
            .iter()
            .map(|(k, v)| format!("{} = {}", k, v))
            .collect();
        section.push_str(&format!("- **Filters:** {}\n", filters.join(", ")));
    }

    if let Some(ref subset) = selection.map_subset {
        section.push_str(&format!(
            "- **Map Selection:** {} response(s)\n",
            subset.len()
        ));
    }

    if let Some(ref region) = selection.region {
        section.push_str(&format!(
            "- **Region:** {:.4}, {:.4} within {:.0} m\n",
            region.center.latitude, region.center.longitude, region.radius_meters
        ));
    }

    section.push('\n');
    section
}

/// Generate the cohort summary table.
fn generate_summary_section(snapshot: &CohortSnapshot, config: &ReportConfig) -> String {
    let mut section = String::new();

    section.push_str("## Cohort Summary\n\n");

    if snapshot.aggregate.is_empty() {
        section.push_str("No score data for this selection.\n\n");
        return section;
    }

    section.push_str(&format!(
        "| Category | {} |\n",
        capitalize(&snapshot.aggregation.to_string())
    ));
    section.push_str("|:---|:---:|\n");
    section.push_str(&aggregate_rows(&snapshot.aggregate, config.score_decimals));
    section.push('\n');

    section
}

fn aggregate_rows(aggregate: &AggregateResult, decimals: usize) -> String {
    aggregate
        .iter()
        .map(|(category, value)| {
            format!("| {} | {} |\n", category.label(), fmt_value(*value, decimals))
        })
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Generate the grouped summary section.
fn generate_grouped_section(grouped: &GroupedAggregateResult, config: &ReportConfig) -> String {
    let mut section = String::new();

    section.push_str("## Grouped Summary\n\n");

    if grouped.is_empty() {
        section.push_str("No groups for this selection.\n\n");
        return section;
    }

    for (group, aggregate) in grouped {
        section.push_str(&format!("### {}\n\n", group));
        if aggregate.is_empty() {
            section.push_str("No score data.\n\n");
            continue;
        }
        section.push_str("| Category | Value |\n");
        section.push_str("|:---|:---:|\n");
        section.push_str(&aggregate_rows(aggregate, config.score_decimals));
        section.push('\n');
    }

    section
}

/// Generate the comparison section.
fn generate_comparison_section(
    snapshot: &CohortSnapshot,
    comparison: &ComparisonResult,
    config: &ReportConfig,
) -> String {
    let mut section = String::new();

    section.push_str("## Comparison\n\n");

    if snapshot.target_inserted {
        section.push_str(
            "*The target does not match the current filters and was added to the cohort.*\n\n",
        );
    }

    if !snapshot.comparison_possible() {
        section.push_str("No peers in this cohort; no comparison is possible.\n\n");
        return section;
    }

    section.push_str(&format!(
        "Compared against {} peer(s): {} strength(s), {} area(s) for improvement, {} equal.\n\n",
        snapshot.peer_count,
        comparison.strength_areas.len(),
        comparison.improvement_areas.len(),
        comparison.equal_count
    ));

    section.push_str(&generate_area_table(
        "Strengths",
        &comparison.strength_areas,
        config.score_decimals,
    ));
    section.push_str(&generate_area_table(
        "Areas for Improvement",
        &comparison.improvement_areas,
        config.score_decimals,
    ));

    section
}

/// Generate one table of classified areas.
fn generate_area_table(title: &str, areas: &[AreaEntry], decimals: usize) -> String {
    let mut table = String::new();

    table.push_str(&format!("### {}\n\n", title));

    if areas.is_empty() {
        table.push_str("None.\n\n");
        return table;
    }

    table.push_str("| Category | Target | Cohort | Difference |\n");
    table.push_str("|:---|:---:|:---:|:---:|\n");
    for area in areas {
        table.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            area.category.label(),
            fmt_value(area.target_score, decimals),
            fmt_value(area.cohort_score, decimals),
            fmt_signed(area.difference, decimals)
        ));
    }
    table.push('\n');

    table
}

/// Generate the geographic distribution section.
fn generate_distribution_section(
    distribution: &GeographicDistribution,
    config: &ReportConfig,
) -> String {
    let mut section = String::new();

    section.push_str("## Geographic Distribution\n\n");

    if distribution.is_empty() {
        section.push_str("No responses in this selection.\n\n");
        return section;
    }

    section.push_str("| Country | Responses | Share | Cities |\n");
    section.push_str("|:---|:---:|:---:|:---|\n");
    for (country, bucket) in ranked_countries(distribution) {
        let cities: Vec<&str> = bucket.cities.iter().map(String::as_str).collect();
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            country,
            bucket.count,
            fmt_value(bucket.share, config.share_decimals),
            cities.join(", ")
        ));
    }
    section.push('\n');

    section
}

/// Generate the map bounds section.
fn generate_bounds_section(bounds: &BoundingRegion) -> String {
    let center = bounds.center();
    format!(
        "## Map Bounds\n\n- **South-West:** {:.4}, {:.4}\n- **North-East:** {:.4}, {:.4}\n- **Center:** {:.4}, {:.4}\n\n",
        bounds.south, bounds.west, bounds.north, bounds.east, center.latitude, center.longitude
    )
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by CohortLens*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
