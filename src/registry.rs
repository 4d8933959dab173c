//! Score category catalog.
//!
//! The registry records which [`ScoreCategory`] values apply to each
//! [`ResponseType`] and validates raw store records against that catalog
//! at ingestion, so later stages only ever see known categories.

use crate::models::{Response, ResponseRecord, ResponseType, ScoreCategory};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

/// Configuration bugs surfaced by the registry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// A response type has no entry in the catalog.
    #[error("Response type '{0}' is not registered in the score registry")]
    UnknownResponseType(ResponseType),
}

/// Static catalog of score categories per response type.
#[derive(Debug, Clone)]
pub struct ScoreRegistry {
    catalog: BTreeMap<ResponseType, Vec<ScoreCategory>>,
}

impl Default for ScoreRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl ScoreRegistry {
    /// The catalog shipped with the surveys.
    pub fn standard() -> Self {
        use ScoreCategory::*;

        let mut catalog = BTreeMap::new();
        catalog.insert(
            ResponseType::Church,
            vec![
                Preaching,
                Worship,
                Discipleship,
                Evangelism,
                Prayer,
                Leadership,
                Stewardship,
                CommunityEngagement,
            ],
        );
        catalog.insert(
            ResponseType::Institution,
            vec![
                Curriculum,
                Faculty,
                Governance,
                StudentFormation,
                Resources,
                CommunityEngagement,
            ],
        );
        catalog.insert(
            ResponseType::NonFormal,
            vec![
                Accessibility,
                ContentRelevance,
                Facilitation,
                Outcomes,
                CommunityEngagement,
            ],
        );

        Self { catalog }
    }

    /// Build a registry from an explicit catalog.
    #[allow(dead_code)] // Custom survey catalogs
    pub fn with_catalog(catalog: BTreeMap<ResponseType, Vec<ScoreCategory>>) -> Self {
        Self { catalog }
    }

    /// Categories that apply to a response type.
    pub fn categories_for(
        &self,
        response_type: ResponseType,
    ) -> Result<&[ScoreCategory], RegistryError> {
        self.catalog
            .get(&response_type)
            .map(Vec::as_slice)
            .ok_or(RegistryError::UnknownResponseType(response_type))
    }

    /// Union of the categories of the given type, or of every type when `None`.
    pub fn categories(
        &self,
        response_type: Option<ResponseType>,
    ) -> Result<Vec<ScoreCategory>, RegistryError> {
        let mut categories: Vec<ScoreCategory> = match response_type {
            Some(rt) => self.categories_for(rt)?.to_vec(),
            None => self.catalog.values().flatten().copied().collect(),
        };
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    /// Resolve caller-supplied category keys.
    ///
    /// Unknown keys are logged and skipped; they never fail the computation.
    pub fn resolve_keys<S: AsRef<str>>(&self, keys: &[S]) -> Vec<ScoreCategory> {
        let mut resolved = Vec::new();
        for key in keys {
            match ScoreCategory::from_key(key.as_ref()) {
                Some(category) if !resolved.contains(&category) => resolved.push(category),
                Some(_) => {}
                None => warn!("Ignoring unknown score category '{}'", key.as_ref()),
            }
        }
        resolved
    }

    /// Validate a raw record and turn it into a [`Response`].
    ///
    /// Score keys that are unknown, or not registered for the record's type,
    /// are dropped with a warning, as are non-finite values. Invalid
    /// coordinates are treated as "never geocoded".
    pub fn ingest(&self, record: ResponseRecord) -> Result<Response, RegistryError> {
        let allowed = self.categories_for(record.response_type)?;

        let mut scores = BTreeMap::new();
        for (key, value) in record.scores {
            let Some(category) = ScoreCategory::from_key(&key) else {
                warn!(
                    "Response {}: ignoring unknown score category '{}'",
                    record.id, key
                );
                continue;
            };
            if !allowed.contains(&category) {
                warn!(
                    "Response {}: category '{}' does not apply to {} surveys",
                    record.id,
                    key,
                    record.response_type.as_str()
                );
                continue;
            }
            if !value.is_finite() {
                warn!(
                    "Response {}: ignoring non-finite value for '{}'",
                    record.id, key
                );
                continue;
            }
            scores.insert(category, value);
        }

        let location = match record.location {
            Some(point) if point.is_valid() => Some(point),
            Some(point) => {
                warn!(
                    "Response {}: discarding invalid location ({}, {})",
                    record.id, point.latitude, point.longitude
                );
                None
            }
            None => None,
        };

        Ok(Response {
            id: record.id,
            response_type: record.response_type,
            scores,
            location,
            attributes: record.attributes,
        })
    }
}
