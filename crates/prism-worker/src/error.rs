use prism_core::DerivativeJob;
use prism_processing::EncodeError;
use prism_storage::StorageError;
use thiserror::Error;

/// Why an invocation failed. Skips are not errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to fetch {bucket}/{key}: {source}")]
    FetchFailed {
        bucket: String,
        key: String,
        #[source]
        source: StorageError,
    },

    /// `job` is `None` when the source itself could not be decoded.
    #[error("failed to encode {}: {source}", job_label(.job))]
    EncodeFailed {
        job: Option<DerivativeJob>,
        #[source]
        source: EncodeError,
    },

    #[error("failed to write {key} ({failed} of {total} writes failed): {source}")]
    PersistFailed {
        job: DerivativeJob,
        key: String,
        failed: usize,
        total: usize,
        #[source]
        source: StorageError,
    },

    #[error("cancelled during {stage}")]
    Cancelled { stage: &'static str },
}

impl PipelineError {
    /// Variant name of the failing job, if the failure is tied to one.
    pub fn variant(&self) -> Option<&str> {
        match self {
            PipelineError::EncodeFailed { job: Some(job), .. }
            | PipelineError::PersistFailed { job, .. } => Some(job.variant.name.as_str()),
            _ => None,
        }
    }
}

fn job_label(job: &Option<DerivativeJob>) -> String {
    match job {
        Some(job) => job.to_string(),
        None => "source".to_string(),
    }
}
