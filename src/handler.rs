use crate::{
    classifier::{ClassificationMatch, Classifier},
    counters::ProcessedCounters,
    decoder::decode_rgb,
    error::UploadError,
    validation::{RequestValidator, UploadRequest},
};
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;

/// Runs one upload through validation, decoding and classification.
///
/// Decoding and inference happen on the blocking pool. A panic in either
/// only fails the current request.
#[derive(Clone)]
pub struct UploadHandler {
    validator: RequestValidator,
    classifier: Arc<dyn Classifier>,
    inference_timeout: Option<Duration>,
}

impl UploadHandler {
    pub fn new(
        validator: RequestValidator,
        classifier: Arc<dyn Classifier>,
        inference_timeout: Option<Duration>,
    ) -> Self {
        Self {
            validator,
            classifier,
            inference_timeout,
        }
    }

    /// A handler sharing this classifier that skips the extension
    /// allow-list. The health self-test runs through it.
    pub fn without_extension_filter(&self) -> Self {
        Self {
            validator: self.validator.without_extension_filter(),
            ..self.clone()
        }
    }

    /// Handles an upload and records its outcome in `counters`, exactly once.
    pub async fn handle(
        &self,
        upload: Option<UploadRequest>,
        counters: &ProcessedCounters,
    ) -> Result<Vec<ClassificationMatch>, UploadError> {
        let result = self.process(upload).await;
        match &result {
            Ok(_) => counters.record_success(),
            Err(_) => counters.record_failure(),
        }
        result
    }

    async fn process(
        &self,
        upload: Option<UploadRequest>,
    ) -> Result<Vec<ClassificationMatch>, UploadError> {
        let upload = self.validator.validate(upload)?;
        tracing::debug!(
            filename = %upload.filename,
            content_type = ?upload.content_type,
            bytes = upload.content.len(),
            "Upload passed validation"
        );

        let classifier = self.classifier.clone();
        let task = tokio::task::spawn_blocking(move || {
            let image = decode_rgb(&upload.content)?;
            let matches = classifier.classify(&image)?;
            Ok::<_, UploadError>(matches)
        });

        let joined = match self.inference_timeout {
            Some(limit) => timeout(limit, task)
                .await
                .map_err(|_| UploadError::internal("classification timed out", "timeout"))?,
            None => task.await,
        };

        joined.map_err(|e| UploadError::internal("classification task aborted", e))?
    }
}
