//! Derivative pipeline orchestration
//!
//! One invocation runs four stages for a single source object:
//!
//! 1. classify the key; anything but `Proceed` ends the invocation quietly,
//! 2. fetch the source bytes,
//! 3. encode the whole job matrix (fail-fast: one failure means nothing is written),
//! 4. write every artifact concurrently (join-all: one failed write does not stop the others).
//!
//! Every stage observes the caller's cancellation token.

use bytes::Bytes;
use prism_core::{
    classify, DerivativeArtifact, DerivativeJob, JoinPolicy, ProcessingDecision,
    SourceDescriptor, TaskError, TaskGroup, VariantCatalog, WorkerConfig,
};
use prism_processing::{DerivativeEngine, EncodeError, JobOutcome};
use prism_storage::{ObjectStore, PutOptions, StorageError};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;

/// Successful end of an invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The key was rejected by the key policy; nothing was fetched or written.
    Skipped { decision: ProcessingDecision },
    /// Every derivative was written. Keys follow job order.
    Completed { keys: Vec<String> },
}

pub struct Orchestrator {
    store: Arc<dyn ObjectStore>,
    engine: DerivativeEngine,
    catalog: Arc<VariantCatalog>,
    put_options: PutOptions,
    max_concurrent_uploads: usize,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        engine: DerivativeEngine,
        catalog: VariantCatalog,
    ) -> Self {
        Self {
            store,
            engine,
            catalog: Arc::new(catalog),
            put_options: PutOptions::default(),
            max_concurrent_uploads: prism_core::constants::DEFAULT_MAX_CONCURRENT_UPLOADS,
        }
    }

    /// Production wiring: native codec, limits and cache hint from `config`.
    pub fn from_config(
        config: &WorkerConfig,
        store: Arc<dyn ObjectStore>,
        catalog: VariantCatalog,
    ) -> Self {
        let engine =
            DerivativeEngine::native(config.max_concurrent_encodes, config.max_source_pixels);
        Self::new(store, engine, catalog)
            .with_cache_control(config.cache_control.clone())
            .with_max_concurrent_uploads(config.max_concurrent_uploads)
    }

    pub fn with_cache_control(mut self, cache_control: impl Into<String>) -> Self {
        self.put_options = PutOptions::derivative(cache_control);
        self
    }

    pub fn with_max_concurrent_uploads(mut self, limit: usize) -> Self {
        self.max_concurrent_uploads = limit.max(1);
        self
    }

    /// Run the pipeline for one source object.
    pub async fn process(
        &self,
        source: &SourceDescriptor,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutcome, PipelineError> {
        let start = Instant::now();
        let classification = classify(&source.key, &self.catalog);
        let decision = classification.decision;

        let Some(classified) = classification.into_source() else {
            tracing::info!(
                bucket = %source.bucket,
                key = %source.key,
                reason = %decision,
                "Skipping object"
            );
            return Ok(ProcessOutcome::Skipped { decision });
        };

        let jobs = DerivativeJob::matrix(&self.catalog);
        let destinations: Vec<String> =
            jobs.iter().map(|job| classified.destination_key(job)).collect();

        let body = self.fetch(source, cancel).await?;

        let outcomes = self
            .engine
            .encode(body, classified.format, &jobs, JoinPolicy::FailFast, cancel)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %source.bucket,
                    key = %source.key,
                    "Source could not be decoded"
                );
                PipelineError::EncodeFailed {
                    job: None,
                    source: e,
                }
            })?;
        let artifacts = self.collect_artifacts(source, outcomes, destinations, cancel)?;

        let keys = self.persist(source, artifacts, cancel).await?;

        tracing::info!(
            bucket = %source.bucket,
            key = %source.key,
            derivatives = keys.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Derivatives written"
        );

        Ok(ProcessOutcome::Completed { keys })
    }

    /// Run every source in order. A failed source does not stop the rest.
    pub async fn process_all(
        &self,
        sources: &[SourceDescriptor],
        cancel: &CancellationToken,
    ) -> Vec<Result<ProcessOutcome, PipelineError>> {
        let mut results = Vec::with_capacity(sources.len());
        for source in sources {
            results.push(self.process(source, cancel).await);
        }
        results
    }

    async fn fetch(
        &self,
        source: &SourceDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Bytes, PipelineError> {
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled { stage: "fetch" }),
            fetched = self.store.get(&source.bucket, &source.key) => fetched,
        };

        fetched.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %source.bucket,
                key = %source.key,
                "Failed to fetch source"
            );
            PipelineError::FetchFailed {
                bucket: source.bucket.clone(),
                key: source.key.clone(),
                source: e,
            }
        })
    }

    /// Turn encode outcomes into artifacts, or report the first real failure.
    fn collect_artifacts(
        &self,
        source: &SourceDescriptor,
        outcomes: Vec<JobOutcome>,
        destinations: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<Vec<DerivativeArtifact>, PipelineError> {
        let mut artifacts = Vec::with_capacity(outcomes.len());
        let mut aborted = false;
        let mut failure: Option<(DerivativeJob, EncodeError)> = None;

        for ((job, result), destination_key) in outcomes.into_iter().zip(destinations) {
            match result {
                Ok(bytes) => artifacts.push(DerivativeArtifact {
                    job,
                    destination_key,
                    bytes,
                    content_type: self.put_options.content_type.clone(),
                }),
                Err(TaskError::Aborted) => aborted = true,
                Err(err) if failure.is_none() => {
                    let err = match err {
                        TaskError::Failed(e) => e,
                        TaskError::Panicked(msg) => {
                            EncodeError::Codec(format!("encoder panicked: {}", msg))
                        }
                        TaskError::Aborted => continue,
                    };
                    failure = Some((job, err));
                }
                Err(_) => {}
            }
        }

        if let Some((job, err)) = failure {
            tracing::error!(
                error = %err,
                bucket = %source.bucket,
                key = %source.key,
                variant = %job.variant.name,
                job = %job,
                "Derivative encoding failed"
            );
            return Err(PipelineError::EncodeFailed {
                job: Some(job),
                source: err,
            });
        }
        if aborted || cancel.is_cancelled() {
            return Err(PipelineError::Cancelled { stage: "encode" });
        }

        Ok(artifacts)
    }

    /// Write every artifact. All writes are attempted even when some fail.
    async fn persist(
        &self,
        source: &SourceDescriptor,
        artifacts: Vec<DerivativeArtifact>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, PipelineError> {
        let total = artifacts.len();
        let mut group: TaskGroup<(DerivativeJob, String), (), StorageError> =
            TaskGroup::new(self.max_concurrent_uploads).with_cancellation(cancel.clone());

        for artifact in artifacts {
            let DerivativeArtifact {
                job,
                destination_key,
                bytes,
                content_type,
            } = artifact;
            let store = self.store.clone();
            let bucket = source.bucket.clone();
            let options = PutOptions {
                content_type,
                ..self.put_options.clone()
            };
            let key = destination_key.clone();

            group.spawn((job, destination_key), async move {
                store.put(&bucket, &key, bytes, &options).await
            });
        }

        let results = group.join(JoinPolicy::All).await;

        let mut keys = Vec::with_capacity(total);
        let mut failures: Vec<(DerivativeJob, String, StorageError)> = Vec::new();
        let mut aborted = false;

        for ((job, key), result) in results {
            match result {
                Ok(()) => keys.push(key),
                Err(TaskError::Failed(e)) => failures.push((job, key, e)),
                Err(TaskError::Panicked(msg)) => failures.push((
                    job,
                    key,
                    StorageError::UploadFailed(format!("upload task panicked: {}", msg)),
                )),
                Err(TaskError::Aborted) => aborted = true,
            }
        }

        for (job, key, err) in &failures {
            tracing::error!(
                error = %err,
                bucket = %source.bucket,
                key = %source.key,
                destination = %key,
                variant = %job.variant.name,
                "Derivative write failed"
            );
        }

        let failed = failures.len();
        if let Some((job, key, err)) = failures.into_iter().next() {
            return Err(PipelineError::PersistFailed {
                job,
                key,
                failed,
                total,
                source: err,
            });
        }
        if aborted {
            return Err(PipelineError::Cancelled { stage: "persist" });
        }

        Ok(keys)
    }
}
