//! Derivative engine
//!
//! Decodes a source once, then encodes every job of the matrix in parallel on
//! the blocking pool. All jobs read the same decoded image; each produces its
//! own resized copy only when it has to shrink.

use bytes::Bytes;
use image::{DynamicImage, GenericImageView};
use prism_core::{DerivativeJob, JoinPolicy, SourceFormat, TaskGroup, TaskResult};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::codec::ImageCodec;
use crate::compression::OutputFormat;
use crate::error::EncodeError;

/// Result of one job, paired with the job that produced it.
pub type JobOutcome = (DerivativeJob, TaskResult<Bytes, EncodeError>);

#[derive(Clone)]
pub struct DerivativeEngine {
    codec: Arc<dyn ImageCodec>,
    max_concurrency: usize,
    max_source_pixels: u64,
}

impl DerivativeEngine {
    pub fn new(
        codec: Arc<dyn ImageCodec>,
        max_concurrency: usize,
        max_source_pixels: u64,
    ) -> Self {
        Self {
            codec,
            max_concurrency: max_concurrency.max(1),
            max_source_pixels,
        }
    }

    #[cfg(feature = "native-codec")]
    pub fn native(max_concurrency: usize, max_source_pixels: u64) -> Self {
        Self::new(
            Arc::new(crate::codec::NativeCodec),
            max_concurrency,
            max_source_pixels,
        )
    }

    /// Decode `source` and encode every job.
    ///
    /// The outer error is a decode failure, which fails every job at once.
    /// Otherwise one outcome per job comes back in job order; under
    /// [`JoinPolicy::FailFast`] jobs still running after the first failure
    /// report [`prism_core::TaskError::Aborted`].
    pub async fn encode(
        &self,
        source: Bytes,
        format: SourceFormat,
        jobs: &[DerivativeJob],
        policy: JoinPolicy,
        cancel: &CancellationToken,
    ) -> Result<Vec<JobOutcome>, EncodeError> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let image = Arc::new(self.decode(source, format).await?);

        let mut group: TaskGroup<DerivativeJob, Bytes, EncodeError> =
            TaskGroup::new(self.max_concurrency).with_cancellation(cancel.clone());

        for job in jobs {
            let codec = self.codec.clone();
            let image = image.clone();
            let output = OutputFormat::for_job(format, job);
            let target_width = job.variant.target_width;
            let label = job.to_string();

            group.spawn_blocking(job.clone(), move || {
                let start = Instant::now();
                let resized = codec.resize(&image, target_width)?;
                let encoded = codec.encode(&resized, &output)?;

                tracing::debug!(
                    job = %label,
                    width = resized.width(),
                    height = resized.height(),
                    quality = output.quality(),
                    size_bytes = encoded.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Derivative encoded"
                );
                Ok(encoded)
            });
        }

        Ok(group.join(policy).await)
    }

    async fn decode(
        &self,
        source: Bytes,
        format: SourceFormat,
    ) -> Result<DynamicImage, EncodeError> {
        let codec = self.codec.clone();
        let start = Instant::now();

        let image = tokio::task::spawn_blocking(move || codec.decode(&source, format))
            .await
            .map_err(|e| EncodeError::Codec(format!("decode task failed: {}", e)))??;

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(EncodeError::DegenerateDimensions { width, height });
        }
        let pixels = u64::from(width) * u64::from(height);
        if pixels > self.max_source_pixels {
            return Err(EncodeError::ResolutionTooLarge {
                width,
                height,
                max_pixels: self.max_source_pixels,
            });
        }

        tracing::debug!(
            format = %format,
            width,
            height,
            duration_ms = start.elapsed().as_millis() as u64,
            "Source decoded"
        );
        Ok(image)
    }
}
