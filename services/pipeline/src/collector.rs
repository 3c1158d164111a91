//! Collector - Fetches the static inputs over plain HTTP GET
//!
//! Each fetch either yields validated content or fails. Failures are not
//! retried; transport problems and empty payloads stay distinguishable.

use serde_json::Value;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::{Dataset, PipelineError};
use crate::index::CountryYearIndex;
use crate::parser::{parse_country_table, parse_series, TimeSeriesPoint};

#[derive(Debug, Clone)]
pub struct Collector {
    client: reqwest::Client,
    config: PipelineConfig,
}

impl Collector {
    pub fn new(config: PipelineConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent(concat!("co2-atlas/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    async fn fetch_text(&self, dataset: Dataset, url: &str) -> Result<String, PipelineError> {
        let fetch_error = |source| PipelineError::Fetch {
            dataset,
            url: url.to_string(),
            source,
        };

        info!(%dataset, url, "fetching");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fetch_error)?;

        let body = resp.text().await.map_err(fetch_error)?;
        info!(%dataset, bytes = body.len(), "downloaded");
        Ok(body)
    }

    /// Fetch and validate the atmospheric series, sorted by date.
    pub async fn fetch_series(&self) -> Result<Vec<TimeSeriesPoint>, PipelineError> {
        let body = self.fetch_text(Dataset::Series, &self.config.series_url).await?;
        parse_series(&body, &self.config.series_field)
    }

    /// Fetch the per-country table and index it by country and year.
    pub async fn fetch_country_index(&self) -> Result<CountryYearIndex, PipelineError> {
        let body = self
            .fetch_text(Dataset::CountryTable, &self.config.emissions_csv_url)
            .await?;
        let index = CountryYearIndex::from_records(parse_country_table(&body)?);
        info!(
            countries = index.country_count(),
            years = index.years().len(),
            "indexed per-country table"
        );
        Ok(index)
    }

    /// Fetch the boundary collection with `iso3` and `display_name` filled in.
    pub async fn fetch_boundaries(&self) -> Result<Value, PipelineError> {
        let body = self
            .fetch_text(Dataset::Boundaries, &self.config.boundaries_url)
            .await?;
        crate::geo::normalize_boundaries(&body)
    }

    /// Fetch the series and the country table concurrently. The two results
    /// are independent; one failing does not affect the other.
    pub async fn fetch_both(
        &self,
    ) -> (
        Result<Vec<TimeSeriesPoint>, PipelineError>,
        Result<CountryYearIndex, PipelineError>,
    ) {
        tokio::join!(self.fetch_series(), self.fetch_country_index())
    }
}
