//! Selection state and cohort recomputation.
//!
//! The [`SelectionStateManager`] owns the current [`Selection`], the
//! responses ingested from its store, and the latest published
//! [`CohortSnapshot`]. Every mutation of the selection runs one full,
//! deterministic recomputation and replaces the snapshot wholesale.

use crate::analysis::{aggregate, aggregate_grouped, compare, distribute, AggregationKind};
use crate::geo::{self, BoundingRegion};
use crate::models::{
    AggregateResult, ComparisonResult, GeographicDistribution, GroupedAggregateResult, Region,
    Response, ResponseType, Selection,
};
use crate::registry::{RegistryError, ScoreRegistry};
use crate::store::{ResponseStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that stop a load or a recomputation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// How the cohort summary is computed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    pub aggregation: AggregationKind,
    /// Category keys to summarize; empty means every category of the selected type.
    pub categories: Vec<String>,
    /// Attribute to partition the cohort summary by.
    pub group_by: Option<String>,
    /// Map view used when no cohort member has coordinates.
    pub default_view: Option<BoundingRegion>,
}

/// Immutable result of one recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortSnapshot {
    /// The selection this snapshot was computed from.
    pub selection: Selection,
    pub aggregation: AggregationKind,
    /// Ids of the final cohort, in cohort order (target first when inserted).
    pub cohort_ids: Vec<String>,
    /// Cohort members other than the target, counted before target inclusion.
    pub peer_count: usize,
    /// Whether the target had to be inserted after filtering.
    pub target_inserted: bool,
    pub aggregate: AggregateResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grouped: Option<GroupedAggregateResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonResult>,
    pub distribution: GeographicDistribution,
    pub bounds: BoundingRegion,
}

impl CohortSnapshot {
    /// A target exists but there is nobody to compare it with.
    pub fn comparison_possible(&self) -> bool {
        self.comparison.is_some() && self.peer_count > 0
    }
}

/// The wide map view used when nothing else is configured.
pub fn world_view() -> BoundingRegion {
    BoundingRegion::new(-60.0, -180.0, 75.0, 180.0)
}

/// Orchestrates filtering, target inclusion and downstream statistics.
pub struct SelectionStateManager<S: ResponseStore> {
    store: S,
    registry: ScoreRegistry,
    options: AnalysisOptions,
    responses: Vec<Response>,
    selection: Selection,
    snapshot: Arc<CohortSnapshot>,
}

impl<S: ResponseStore> SelectionStateManager<S> {
    /// Load every response from the store and compute the initial snapshot.
    pub fn new(
        store: S,
        registry: ScoreRegistry,
        options: AnalysisOptions,
        selection: Selection,
    ) -> Result<Self, EngineError> {
        let responses = load_responses(&store, &registry)?;
        let snapshot = Arc::new(recompute(&responses, &selection, &registry, &options)?);

        Ok(Self {
            store,
            registry,
            options,
            responses,
            selection,
            snapshot,
        })
    }

    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<CohortSnapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Run the recomputation for the current state without publishing.
    pub fn recompute(&self) -> Result<CohortSnapshot, EngineError> {
        recompute(&self.responses, &self.selection, &self.registry, &self.options)
    }

    fn publish(&mut self) -> Result<Arc<CohortSnapshot>, EngineError> {
        let snapshot = Arc::new(self.recompute()?);
        self.snapshot = Arc::clone(&snapshot);
        Ok(snapshot)
    }
}

// Selection mutations. The CLI applies a single selection up front; interactive
// hosts drive the cohort through these.
#[allow(dead_code)]
impl<S: ResponseStore> SelectionStateManager<S> {
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Re-fetch from the store, discarding previously ingested responses.
    pub fn reload(&mut self) -> Result<Arc<CohortSnapshot>, EngineError> {
        self.responses = load_responses(&self.store, &self.registry)?;
        self.publish()
    }

    /// Apply several mutations and recompute once.
    pub fn update<F>(&mut self, mutate: F) -> Result<Arc<CohortSnapshot>, EngineError>
    where
        F: FnOnce(&mut Selection),
    {
        mutate(&mut self.selection);
        self.publish()
    }

    pub fn set_response_type(
        &mut self,
        response_type: Option<ResponseType>,
    ) -> Result<Arc<CohortSnapshot>, EngineError> {
        self.update(|s| s.response_type = response_type)
    }

    /// Set or clear (`None`) one field filter.
    pub fn set_field_filter(
        &mut self,
        key: &str,
        value: Option<String>,
    ) -> Result<Arc<CohortSnapshot>, EngineError> {
        self.update(|s| match value {
            Some(value) => {
                s.field_filters.insert(key.to_string(), value);
            }
            None => {
                s.field_filters.remove(key);
            }
        })
    }

    pub fn clear_field_filters(&mut self) -> Result<Arc<CohortSnapshot>, EngineError> {
        self.update(|s| s.field_filters.clear())
    }

    pub fn set_map_subset(
        &mut self,
        ids: Option<Vec<String>>,
    ) -> Result<Arc<CohortSnapshot>, EngineError> {
        self.update(|s| s.map_subset = ids)
    }

    pub fn set_region(
        &mut self,
        region: Option<Region>,
    ) -> Result<Arc<CohortSnapshot>, EngineError> {
        self.update(|s| s.region = region)
    }

    pub fn set_target(
        &mut self,
        target_id: Option<String>,
    ) -> Result<Arc<CohortSnapshot>, EngineError> {
        self.update(|s| s.target_id = target_id)
    }
}

/// Fetch and ingest all records, keeping the first occurrence of each id.
fn load_responses<S: ResponseStore>(
    store: &S,
    registry: &ScoreRegistry,
) -> Result<Vec<Response>, EngineError> {
    let records = store.list_responses(None)?;
    let mut seen = HashSet::new();
    let mut responses = Vec::with_capacity(records.len());

    for record in records {
        if !seen.insert(record.id.clone()) {
            warn!("Skipping duplicate response id {}", record.id);
            continue;
        }
        responses.push(registry.ingest(record)?);
    }

    info!("Ingested {} responses", responses.len());
    Ok(responses)
}

/// Narrow the full response set down to the selected cohort (target not yet included).
pub fn filter_cohort(responses: &[Response], selection: &Selection) -> Vec<Response> {
    let mut cohort: Vec<&Response> = responses
        .iter()
        .filter(|r| selection.response_type.map_or(true, |rt| r.response_type == rt))
        .collect();
    debug!("Type filter: {} responses", cohort.len());

    if let Some(ref subset) = selection.map_subset {
        let allowed: HashSet<&str> = subset.iter().map(String::as_str).collect();
        cohort.retain(|r| allowed.contains(r.id.as_str()));
        debug!("Map subset: {} responses", cohort.len());
    }

    let active_filters: Vec<(&String, &String)> = selection
        .field_filters
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .collect();
    if !active_filters.is_empty() {
        cohort.retain(|r| {
            active_filters
                .iter()
                .all(|(key, value)| r.attribute(key) == Some(value.trim()))
        });
        debug!("Field filters: {} responses", cohort.len());
    }

    if let Some(ref region) = selection.region {
        cohort.retain(|r| geo::contains(r.location.as_ref(), region));
        debug!("Region filter: {} responses", cohort.len());
    }

    cohort.into_iter().cloned().collect()
}

/// Ensure the target is in the cohort exactly once, prepending it if filtering
/// removed it. Returns whether it was inserted.
///
/// The target is inserted even when it has no coordinates and a region is
/// active; that exception applies to the target only.
pub fn include_target(cohort: &mut Vec<Response>, target: &Response) -> bool {
    if cohort.iter().any(|r| r.id == target.id) {
        return false;
    }
    cohort.insert(0, target.clone());
    true
}

/// Run the whole pipeline for one selection.
pub fn recompute(
    responses: &[Response],
    selection: &Selection,
    registry: &ScoreRegistry,
    options: &AnalysisOptions,
) -> Result<CohortSnapshot, EngineError> {
    let mut cohort = filter_cohort(responses, selection);

    let target = match selection.target_id.as_deref() {
        Some(id) => {
            let found = responses.iter().find(|r| r.id == id);
            if found.is_none() {
                warn!("Target response {} not found; comparison skipped", id);
            }
            found
        }
        None => None,
    };

    let peer_count = match target {
        Some(t) => cohort.iter().filter(|r| r.id != t.id).count(),
        None => cohort.len(),
    };

    let target_inserted = match target {
        Some(t) => include_target(&mut cohort, t),
        None => false,
    };

    let categories = if options.categories.is_empty() {
        registry.categories(selection.response_type)?
    } else {
        registry.resolve_keys(&options.categories)
    };
    let aggregate = aggregate(&cohort, &categories, options.aggregation);
    let grouped = options
        .group_by
        .as_deref()
        .map(|attribute| aggregate_grouped(&cohort, &categories, options.aggregation, attribute));

    let comparison = match target {
        Some(t) => Some(compare(t, &cohort, registry)?),
        None => None,
    };

    let distribution = distribute(&cohort);
    let bounds = geo::fit_region(
        cohort.iter().map(|r| r.location.as_ref()),
        options.default_view.unwrap_or_else(world_view),
    );

    debug!(
        "Recomputed cohort: {} members, {} peers, target inserted: {}",
        cohort.len(),
        peer_count,
        target_inserted
    );

    Ok(CohortSnapshot {
        selection: selection.clone(),
        aggregation: options.aggregation,
        cohort_ids: cohort.iter().map(|r| r.id.clone()).collect(),
        peer_count,
        target_inserted,
        aggregate,
        grouped,
        comparison,
        distribution,
        bounds,
    })
}
