use std::io;

/// Failures surfaced by the pipeline.
///
/// Undefined statistics in correlation and regression are not errors: they are reported as
/// `NaN` coefficients or [`crate::correlation::RegressionFit::Undefined`]. A scaled field without
/// spread is reported per field as [`Error::DegenerateStatistic`] by
/// [`crate::normalize::StandardScaler::degenerate`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to ingest {source_name}: {reason}")]
    Ingestion { source_name: String, reason: String },

    #[error("{source_name} is missing required column `{column}`")]
    Schema { source_name: String, column: String },

    #[error("{statistic} is undefined for `{variable}`: {reason}")]
    DegenerateStatistic {
        statistic: &'static str,
        variable: String,
        reason: String,
    },

    #[error("unknown name `{0}`")]
    UnknownName(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn ingestion(source_name: &str, reason: impl Into<String>) -> Self {
        Self::Ingestion {
            source_name: source_name.to_owned(),
            reason: reason.into(),
        }
    }
}
