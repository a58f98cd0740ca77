use thiserror::Error;

/// Failures raised while fetching or aligning market data.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("no usable {dataset} data for {security_id}: {detail}")]
    DataUnavailable {
        security_id: String,
        dataset: &'static str,
        detail: String,
    },

    #[error("no overlapping trade dates between daily bars and adjustment factors")]
    EmptyAlignment,

    #[error("market data provider error: {0:#}")]
    Provider(#[from] anyhow::Error),
}

impl DataError {
    pub fn unavailable(
        security_id: &str,
        dataset: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        Self::DataUnavailable {
            security_id: security_id.to_string(),
            dataset,
            detail: detail.into(),
        }
    }
}

/// The single error surfaced by an analytics run.
#[derive(Debug, Clone, Error)]
#[error("analytics for {security_id} failed at {stage}: {cause}")]
pub struct PipelineFailure {
    pub security_id: String,
    pub stage: &'static str,
    pub cause: String,
}

impl PipelineFailure {
    pub fn new(security_id: &str, stage: &'static str, err: &DataError) -> Self {
        Self {
            security_id: security_id.to_string(),
            stage,
            cause: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed message: {reason}")]
pub struct MalformedMessage {
    pub reason: String,
}

impl MalformedMessage {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
