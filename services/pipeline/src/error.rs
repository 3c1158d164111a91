use std::fmt;

use thiserror::Error;

/// The static inputs the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Series,
    CountryTable,
    Boundaries,
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dataset::Series => "atmospheric CO2 series",
            Dataset::CountryTable => "per-country emissions table",
            Dataset::Boundaries => "country boundaries",
        };
        f.write_str(name)
    }
}

/// Failures that escape the pipeline. Malformed rows never end up here.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transport or HTTP status failure. Not retried.
    #[error("failed to fetch {dataset} from {url}: {source}")]
    Fetch {
        dataset: Dataset,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The payload arrived but yields no usable rows.
    #[error("{dataset} has no usable data: {reason}")]
    EmptyDataset { dataset: Dataset, reason: String },
}

impl PipelineError {
    pub(crate) fn empty(dataset: Dataset, reason: impl Into<String>) -> Self {
        PipelineError::EmptyDataset {
            dataset,
            reason: reason.into(),
        }
    }

    pub fn dataset(&self) -> Dataset {
        match self {
            PipelineError::Fetch { dataset, .. } | PipelineError::EmptyDataset { dataset, .. } => {
                *dataset
            }
        }
    }
}
