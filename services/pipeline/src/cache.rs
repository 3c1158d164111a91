//! Explicit dataset cache, owned by the hosting application.
//!
//! One slot per dataset. A slot is filled at most once per load cycle and
//! holds an immutable `Arc`; readers never see a partially built value.
//! Every write is guarded by the requester's [`Liveness`]: a load whose
//! requester has gone away is dropped without touching the cache.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use serde_json::Value;
use tracing::{debug, info};

use crate::collector::Collector;
use crate::error::{Dataset, PipelineError};
use crate::index::CountryYearIndex;
use crate::parser::TimeSeriesPoint;

/// Held by whoever asked for a load. Dropping it abandons the request.
#[derive(Debug, Default)]
pub struct RequestScope {
    alive: Arc<()>,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn liveness(&self) -> Liveness {
        Liveness(Arc::downgrade(&self.alive))
    }
}

/// Weak handle on a [`RequestScope`], safe to move into a background task.
#[derive(Debug, Clone)]
pub struct Liveness(Weak<()>);

impl Liveness {
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

/// Outcome of a cache load: `None` when the requester went away first.
pub type Loaded<T> = Result<Option<Arc<T>>, PipelineError>;

#[derive(Debug)]
struct Slot<T> {
    dataset: Dataset,
    value: RwLock<Option<Arc<T>>>,
}

impl<T> Slot<T> {
    fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            value: RwLock::new(None),
        }
    }

    fn get(&self) -> Option<Arc<T>> {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clear(&self) {
        self.value
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    async fn get_or_load<F>(&self, liveness: &Liveness, load: F) -> Loaded<T>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        if let Some(hit) = self.get() {
            debug!(dataset = %self.dataset, "cache hit");
            return Ok(Some(hit));
        }

        let value = load.await?;

        if !liveness.is_alive() {
            debug!(dataset = %self.dataset, "requester gone, discarding loaded data");
            return Ok(None);
        }

        let mut slot = self.value.write().unwrap_or_else(PoisonError::into_inner);
        // A concurrent load may have published first; the first one stays.
        let published = slot.get_or_insert_with(|| Arc::new(value)).clone();
        info!(dataset = %self.dataset, "published to cache");
        Ok(Some(published))
    }
}

#[derive(Debug)]
pub struct DatasetCache {
    series: Slot<Vec<TimeSeriesPoint>>,
    countries: Slot<CountryYearIndex>,
    boundaries: Slot<Value>,
}

impl Default for DatasetCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetCache {
    pub fn new() -> Self {
        Self {
            series: Slot::new(Dataset::Series),
            countries: Slot::new(Dataset::CountryTable),
            boundaries: Slot::new(Dataset::Boundaries),
        }
    }

    pub fn series(&self) -> Option<Arc<Vec<TimeSeriesPoint>>> {
        self.series.get()
    }

    pub fn country_index(&self) -> Option<Arc<CountryYearIndex>> {
        self.countries.get()
    }

    pub fn boundaries(&self) -> Option<Arc<Value>> {
        self.boundaries.get()
    }

    /// Drop every cached dataset. The next request reloads.
    pub fn invalidate(&self) {
        self.series.clear();
        self.countries.clear();
        self.boundaries.clear();
        info!("dataset cache invalidated");
    }

    pub async fn series_or_load<F>(&self, liveness: &Liveness, load: F) -> Loaded<Vec<TimeSeriesPoint>>
    where
        F: Future<Output = Result<Vec<TimeSeriesPoint>, PipelineError>>,
    {
        self.series.get_or_load(liveness, load).await
    }

    pub async fn country_index_or_load<F>(&self, liveness: &Liveness, load: F) -> Loaded<CountryYearIndex>
    where
        F: Future<Output = Result<CountryYearIndex, PipelineError>>,
    {
        self.countries.get_or_load(liveness, load).await
    }

    pub async fn boundaries_or_load<F>(&self, liveness: &Liveness, load: F) -> Loaded<Value>
    where
        F: Future<Output = Result<Value, PipelineError>>,
    {
        self.boundaries.get_or_load(liveness, load).await
    }

    pub async fn load_series(&self, collector: &Collector, liveness: &Liveness) -> Loaded<Vec<TimeSeriesPoint>> {
        self.series_or_load(liveness, collector.fetch_series()).await
    }

    pub async fn load_country_index(&self, collector: &Collector, liveness: &Liveness) -> Loaded<CountryYearIndex> {
        self.country_index_or_load(liveness, collector.fetch_country_index())
            .await
    }

    pub async fn load_boundaries(&self, collector: &Collector, liveness: &Liveness) -> Loaded<Value> {
        self.boundaries_or_load(liveness, collector.fetch_boundaries())
            .await
    }
}
