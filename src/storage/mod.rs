//! Storage layer for feedback documents
//!
//! [`DocumentStore`] is the collection contract the service depends on;
//! [`libsql::LibsqlStore`] implements it over libSQL with documents kept as
//! JSON text.

pub mod libsql;

use crate::error::Result;
use crate::types::{
    Document, DocumentId, FieldAverage, InsertManyOutcome, ScanCursor, ScanPage, UpdateOutcome,
};
use async_trait::async_trait;

pub use self::libsql::{ConnectionMode, LibsqlStore};

/// Document collection operations required by the feedback service
///
/// Documents returned by reads carry their native identity under `_id`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every stored document in natural order; the first undecodable row
    /// fails the call
    async fn find_all(&self) -> Result<Vec<Document>>;

    /// Up to `limit` documents following `after`, in natural order
    ///
    /// Each row decodes independently, so an inner error is one document
    /// that could not be materialized. `next` is `None` once the collection
    /// is exhausted.
    async fn scan_page(&self, after: Option<ScanCursor>, limit: usize) -> Result<ScanPage>;

    /// Look up by native identity
    async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Document>>;

    /// First document whose application `id` equals `app_id`
    async fn find_by_app_id(&self, app_id: &str) -> Result<Option<Document>>;

    /// Insert one document, assigning a native identity unless `_id` is given
    async fn insert_one(&self, doc: Document) -> Result<DocumentId>;

    /// Insert documents independently, continuing past duplicate-key conflicts
    ///
    /// Any other failure stops the batch and is returned; documents inserted
    /// before it stay inserted.
    async fn insert_many_unordered(&self, docs: Vec<Document>) -> Result<InsertManyOutcome>;

    /// Shallow-merge `patch` into the document with this native identity
    async fn update_by_id(&self, id: &DocumentId, patch: Document) -> Result<UpdateOutcome>;

    /// Shallow-merge `patch` into the first document with this application `id`
    async fn update_by_app_id(&self, app_id: &str, patch: Document) -> Result<UpdateOutcome>;

    /// Remove a document; returns the number deleted (0 or 1)
    async fn delete_by_id(&self, id: &DocumentId) -> Result<u64>;

    /// Mean of a numeric field, skipping documents where it is absent or non-numeric
    async fn average(&self, field: &str) -> Result<FieldAverage>;

    /// Number of stored documents; also serves as the health round trip
    async fn count(&self) -> Result<u64>;

    /// Release connections; later calls fail with `StoreUnavailable`
    async fn close(&self) -> Result<()>;
}
