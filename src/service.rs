//! Feedback lifecycle rules
//!
//! [`FeedbackService`] sits between the HTTP handlers and its two
//! collaborators, the document store and the sentiment client. Both are
//! injected as trait objects so the rules can be exercised against fakes.

use crate::error::{FeedbackError, Result};
use crate::sentiment::SentimentService;
use crate::storage::DocumentStore;
use crate::types::{
    AnalysisResult, AnalyzeAllReport, AverageScore, Document, DocumentId, SkipReason,
    SkippedDocument, UploadOutcome, NATIVE_ID_FIELD, SCORE_FIELD,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Documents fetched per round trip by analyze-all
const SCAN_PAGE_SIZE: usize = 100;

/// Feedback operations over a store and a sentiment client
#[derive(Clone)]
pub struct FeedbackService {
    store: Arc<dyn DocumentStore>,
    sentiment: Arc<dyn SentimentService>,
}

impl FeedbackService {
    pub fn new(store: Arc<dyn DocumentStore>, sentiment: Arc<dyn SentimentService>) -> Self {
        Self { store, sentiment }
    }

    /// All documents in store order
    pub async fn list(&self) -> Result<Vec<Document>> {
        self.store.find_all().await
    }

    /// Insert one document and return its native identity
    pub async fn create(&self, doc: Document) -> Result<DocumentId> {
        doc.native_id()?;
        let id = self.store.insert_one(doc).await?;
        info!("Created feedback {}", id);
        Ok(id)
    }

    /// Shallow-merge `patch` into the document identified by `id`
    ///
    /// Returns the modified count: 0 when the patch changed nothing.
    pub async fn update(&self, id: &str, patch: Document) -> Result<u64> {
        let id = DocumentId::parse(id)?;
        let outcome = self.store.update_by_id(&id, patch).await?;
        if outcome.matched_count == 0 {
            return Err(FeedbackError::NotFound(format!("feedback {}", id)));
        }
        debug!("Updated feedback {} (modified: {})", id, outcome.modified_count);
        Ok(outcome.modified_count)
    }

    /// Delete by native identity; returns the deleted count (0 or 1)
    pub async fn delete(&self, id: &str) -> Result<u64> {
        let id = DocumentId::parse(id)?;
        let deleted = self.store.delete_by_id(&id).await?;
        if deleted > 0 {
            info!("Deleted feedback {}", id);
        }
        Ok(deleted)
    }

    /// Ingest an upload body
    ///
    /// A non-empty JSON array is inserted as an unordered batch where
    /// duplicate keys are counted, not fatal. Anything else must be a single
    /// JSON object, for which a duplicate key means "already present".
    pub async fn bulk_upload(&self, body: &[u8]) -> Result<UploadOutcome> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| FeedbackError::Validation(format!("invalid JSON: {}", e)))?;

        match value {
            Value::Array(items) if !items.is_empty() => {
                let docs = items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| -> Result<Document> {
                        let doc = Document::from_value(item).map_err(|e| {
                            FeedbackError::Validation(format!("element {}: {}", i, e))
                        })?;
                        doc.native_id().map_err(|e| {
                            FeedbackError::Validation(format!("element {}: {}", i, e))
                        })?;
                        Ok(doc)
                    })
                    .collect::<Result<Vec<_>>>()?;

                let submitted = docs.len();
                let outcome = self.store.insert_many_unordered(docs).await?;
                info!(
                    "Upload batch: {} of {} inserted, {} duplicates skipped",
                    outcome.inserted_ids.len(),
                    submitted,
                    outcome.duplicate_count
                );

                Ok(UploadOutcome::Batch {
                    inserted_count: outcome.inserted_ids.len(),
                    duplicate_count: outcome.duplicate_count,
                })
            }
            other => {
                let doc = Document::from_value(other)?;
                doc.native_id()?;
                match self.store.insert_one(doc).await {
                    Ok(id) => {
                        info!("Uploaded feedback {}", id);
                        Ok(UploadOutcome::Single(id))
                    }
                    Err(e) if e.is_duplicate_key() => {
                        debug!("Uploaded feedback already present: {}", e);
                        Ok(UploadOutcome::Duplicate)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Score the document whose application `id` is `app_id`
    ///
    /// The document is only written when scoring succeeds.
    pub async fn analyze_one(&self, app_id: &str) -> Result<AnalysisResult> {
        let doc = self
            .store
            .find_by_app_id(app_id)
            .await?
            .ok_or_else(|| FeedbackError::NotFound(format!("feedback with id '{}'", app_id)))?;

        let text = doc
            .text()
            .ok_or_else(|| FeedbackError::Validation("feedback has no text to analyze".into()))?;

        let score = self.sentiment.score(text).await?;
        self.write_score(app_id, score).await?;

        info!("Analyzed feedback '{}': score {}", app_id, score);
        Ok(AnalysisResult {
            id: app_id.to_string(),
            score,
        })
    }

    /// Score every document carrying a string `id` and `text`
    ///
    /// The collection is walked page by page. Only a failure to read a page
    /// aborts; every per-document failure is recorded as a skip and the scan
    /// moves on.
    pub async fn analyze_all(&self) -> Result<AnalyzeAllReport> {
        let mut report = AnalyzeAllReport::default();
        let mut total = 0;
        let mut cursor = None;

        loop {
            let page = self.store.scan_page(cursor, SCAN_PAGE_SIZE).await?;
            total += page.documents.len();

            for row in page.documents {
                match self.analyze_row(row).await {
                    Ok(()) => report.updated_count += 1,
                    Err(skipped) => {
                        warn!(
                            "Skipping feedback {}: {}",
                            skipped.native_id.as_deref().unwrap_or("<unknown>"),
                            skipped.reason
                        );
                        report.skipped.push(skipped);
                    }
                }
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(
            "Analyze-all finished: {} of {} updated, {} skipped",
            report.updated_count,
            total,
            report.skipped.len()
        );
        Ok(report)
    }

    async fn analyze_row(&self, row: Result<Document>) -> std::result::Result<(), SkippedDocument> {
        let doc = row.map_err(|e| SkippedDocument {
            native_id: None,
            reason: SkipReason::Undecodable(e.to_string()),
        })?;

        let skip = |reason: SkipReason| SkippedDocument {
            native_id: doc
                .get(NATIVE_ID_FIELD)
                .and_then(Value::as_str)
                .map(str::to_string),
            reason,
        };

        let app_id = doc.app_id().ok_or_else(|| skip(SkipReason::MissingAppId))?;
        let text = doc.text().ok_or_else(|| skip(SkipReason::MissingText))?;

        let score = self
            .sentiment
            .score(text)
            .await
            .map_err(|e| skip(SkipReason::Analysis(e.to_string())))?;

        self.write_score(app_id, score)
            .await
            .map_err(|e| skip(SkipReason::Store(e.to_string())))
    }

    async fn write_score(&self, app_id: &str, score: f64) -> Result<()> {
        let mut patch = Document::new();
        patch.insert(SCORE_FIELD, score);

        let outcome = self.store.update_by_app_id(app_id, patch).await?;
        if outcome.matched_count == 0 {
            return Err(FeedbackError::NotFound(format!(
                "feedback with id '{}' disappeared before scoring",
                app_id
            )));
        }
        Ok(())
    }

    /// Mean score over scored documents; 0 with `scored_count == 0` when none
    pub async fn average_score(&self) -> Result<AverageScore> {
        let avg = self.store.average(SCORE_FIELD).await?;
        Ok(AverageScore {
            average_score: avg.average.unwrap_or(0.0),
            scored_count: avg.count,
        })
    }

    /// Round trip to the store; returns the number of stored documents
    pub async fn health(&self) -> Result<u64> {
        self.store.count().await
    }

    /// Close the underlying store
    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }
}
