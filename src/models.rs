//! Data models for the analytics engine.
//!
//! This module contains the core data structures shared by every stage of
//! the pipeline: survey responses, the selection that drives recomputation,
//! and the result values produced from a cohort.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Bucket key used whenever an attribute needed for grouping is missing.
pub const UNKNOWN_BUCKET: &str = "Unknown";

/// Kind of survey a response was collected with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseType {
    /// Congregation survey
    Church,
    /// Theological institution survey
    Institution,
    /// Non-formal training programme survey
    NonFormal,
}

impl ResponseType {
    /// All response types, in catalog order.
    pub const ALL: [ResponseType; 3] = [
        ResponseType::Church,
        ResponseType::Institution,
        ResponseType::NonFormal,
    ];

    /// The tag used in exports and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Church => "church",
            ResponseType::Institution => "institution",
            ResponseType::NonFormal => "non-formal",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseType::Church => write!(f, "Church"),
            ResponseType::Institution => write!(f, "Institution"),
            ResponseType::NonFormal => write!(f, "Non-formal"),
        }
    }
}

impl FromStr for ResponseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "church" => Ok(ResponseType::Church),
            "institution" => Ok(ResponseType::Institution),
            "non-formal" | "nonformal" => Ok(ResponseType::NonFormal),
            other => Err(format!("unknown response type: {}", other)),
        }
    }
}

/// A numeric score category.
///
/// The set is closed; which categories apply to a response depends on its
/// [`ResponseType`] and is recorded in the score registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCategory {
    Accessibility,
    CommunityEngagement,
    ContentRelevance,
    Curriculum,
    Discipleship,
    Evangelism,
    Facilitation,
    Faculty,
    Governance,
    Leadership,
    Outcomes,
    Prayer,
    Preaching,
    Resources,
    Stewardship,
    StudentFormation,
    Worship,
}

impl ScoreCategory {
    /// Every category known to the engine.
    pub const ALL: [ScoreCategory; 17] = [
        ScoreCategory::Accessibility,
        ScoreCategory::CommunityEngagement,
        ScoreCategory::ContentRelevance,
        ScoreCategory::Curriculum,
        ScoreCategory::Discipleship,
        ScoreCategory::Evangelism,
        ScoreCategory::Facilitation,
        ScoreCategory::Faculty,
        ScoreCategory::Governance,
        ScoreCategory::Leadership,
        ScoreCategory::Outcomes,
        ScoreCategory::Prayer,
        ScoreCategory::Preaching,
        ScoreCategory::Resources,
        ScoreCategory::Stewardship,
        ScoreCategory::StudentFormation,
        ScoreCategory::Worship,
    ];

    /// The key this category is stored under in response exports.
    pub fn key(&self) -> &'static str {
        match self {
            ScoreCategory::Accessibility => "accessibility",
            ScoreCategory::CommunityEngagement => "community_engagement",
            ScoreCategory::ContentRelevance => "content_relevance",
            ScoreCategory::Curriculum => "curriculum",
            ScoreCategory::Discipleship => "discipleship",
            ScoreCategory::Evangelism => "evangelism",
            ScoreCategory::Facilitation => "facilitation",
            ScoreCategory::Faculty => "faculty",
            ScoreCategory::Governance => "governance",
            ScoreCategory::Leadership => "leadership",
            ScoreCategory::Outcomes => "outcomes",
            ScoreCategory::Prayer => "prayer",
            ScoreCategory::Preaching => "preaching",
            ScoreCategory::Resources => "resources",
            ScoreCategory::Stewardship => "stewardship",
            ScoreCategory::StudentFormation => "student_formation",
            ScoreCategory::Worship => "worship",
        }
    }

    /// Resolve an export key (case-insensitive, `-` or `_` separated).
    pub fn from_key(key: &str) -> Option<Self> {
        let normalized = key.trim().to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|c| c.key() == normalized)
    }

    /// Human-readable label for reports.
    pub fn label(&self) -> String {
        self.key()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// Ordered by key so every map keyed by category iterates lexicographically.
impl Ord for ScoreCategory {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(other.key())
    }
}

impl PartialOrd for ScoreCategory {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ScoreCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// A geocoded position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether the coordinates are finite and within the valid lat/lng ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A raw response record as handed over by a response store.
///
/// Scores are still string-keyed here; the score registry turns a record
/// into a [`Response`] at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub id: String,
    pub response_type: ResponseType,
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// One completed survey instance, validated against the score registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Stable identifier, never reused.
    pub id: String,
    pub response_type: ResponseType,
    /// Answered categories only; a missing key means "unanswered".
    pub scores: BTreeMap<ScoreCategory, f64>,
    pub location: Option<GeoPoint>,
    /// Categorical metadata (country, city, ageGroup, ...).
    pub attributes: BTreeMap<String, String>,
}

impl Response {
    /// Returns the attribute value, treating empty strings as absent.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn score(&self, category: ScoreCategory) -> Option<f64> {
        self.scores.get(&category).copied()
    }
}

/// A circular geofence drawn on the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub center: GeoPoint,
    pub radius_meters: f64,
}

impl Region {
    /// Build a region, rejecting invalid centers and negative radii.
    pub fn new(center: GeoPoint, radius_meters: f64) -> Result<Self, SelectionError> {
        if !center.is_valid() {
            return Err(SelectionError::InvalidRegion(format!(
                "center ({}, {}) is not a valid coordinate",
                center.latitude, center.longitude
            )));
        }
        if !radius_meters.is_finite() || radius_meters < 0.0 {
            return Err(SelectionError::InvalidRegion(format!(
                "radius must be a non-negative number of meters, got {}",
                radius_meters
            )));
        }
        Ok(Self {
            center,
            radius_meters,
        })
    }
}

/// Errors raised when a selection is built from host input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SelectionError {
    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Invalid field filter '{0}': expected key=value")]
    InvalidFilter(String),
}

/// The complete description of what the cohort is made of.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// `None` selects every response type.
    pub response_type: Option<ResponseType>,
    /// Attribute key -> required value (AND semantics).
    pub field_filters: BTreeMap<String, String>,
    /// Explicit id allow-list from a marker pick.
    pub map_subset: Option<Vec<String>>,
    pub region: Option<Region>,
    pub target_id: Option<String>,
}

impl Selection {
    /// Parse a `key=value` filter argument into the selection.
    pub fn add_filter_arg(&mut self, arg: &str) -> Result<(), SelectionError> {
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| SelectionError::InvalidFilter(arg.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(SelectionError::InvalidFilter(arg.to_string()));
        }
        self.field_filters
            .insert(key.to_string(), value.trim().to_string());
        Ok(())
    }
}

/// Category -> summary value.
pub type AggregateResult = BTreeMap<ScoreCategory, f64>;

/// Group key -> per-category summary.
pub type GroupedAggregateResult = BTreeMap<String, AggregateResult>;

/// One classified category in a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaEntry {
    pub category: ScoreCategory,
    pub target_score: f64,
    pub cohort_score: f64,
    pub difference: f64,
}

/// The target's standing against its cohort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub target_scores: BTreeMap<ScoreCategory, f64>,
    pub cohort_averages: AggregateResult,
    pub strength_areas: Vec<AreaEntry>,
    pub improvement_areas: Vec<AreaEntry>,
    pub equal_count: usize,
}

impl ComparisonResult {
    /// Number of categories that were actually compared.
    pub fn compared_count(&self) -> usize {
        self.strength_areas.len() + self.improvement_areas.len() + self.equal_count
    }
}

/// Per-country bucket of a geographic distribution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountryBucket {
    pub count: usize,
    pub cities: BTreeSet<String>,
    pub share: f64,
}

/// Country -> bucket.
pub type GeographicDistribution = BTreeMap<String, CountryBucket>;
