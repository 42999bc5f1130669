//! Core data types for the feedback service
//!
//! A feedback record is a free-form JSON object. Two of its keys carry
//! identity and must not be confused:
//!
//! - `_id` is the native identity, assigned by the store at insertion and
//!   used by update and delete.
//! - `id` is the application correlation key supplied by callers and used
//!   only by the analysis endpoints.

use crate::error::{FeedbackError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Key holding the native identity
pub const NATIVE_ID_FIELD: &str = "_id";

/// Key holding the application correlation id
pub const APP_ID_FIELD: &str = "id";

/// Key holding the text to analyze
pub const TEXT_FIELD: &str = "text";

/// Key written by the analysis workflow
pub const SCORE_FIELD: &str = "score";

/// Store-assigned identifier for feedback documents
///
/// Wraps a UUID so native identities cannot be mixed up with the free-form
/// application `id` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    /// Create a new random document ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a native identity token
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| FeedbackError::InvalidIdentity(format!("'{}' is not a valid id", s)))
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A semi-structured feedback document
///
/// Values are `serde_json::Value`, a tagged union over null, bool, number,
/// string, array and nested object, so documents round-trip without loss.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Parse a request body that must be a single JSON object
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| FeedbackError::Validation(format!("body is not a JSON object: {}", e)))
    }

    /// Build a document from a JSON value, rejecting non-objects
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(FeedbackError::Validation(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// The `text` field, only when it is a string
    pub fn text(&self) -> Option<&str> {
        self.0.get(TEXT_FIELD).and_then(Value::as_str)
    }

    /// The application `id` field, only when it is a string
    pub fn app_id(&self) -> Option<&str> {
        self.0.get(APP_ID_FIELD).and_then(Value::as_str)
    }

    /// The `score` field, only when it is numeric
    pub fn score(&self) -> Option<f64> {
        self.0.get(SCORE_FIELD).and_then(Value::as_f64)
    }

    /// The native identity carried in `_id`, if any
    ///
    /// A present `_id` must be a well-formed identity string; anything else
    /// is a validation failure on the document.
    pub fn native_id(&self) -> Result<Option<DocumentId>> {
        match self.0.get(NATIVE_ID_FIELD) {
            None => Ok(None),
            Some(Value::String(s)) => DocumentId::parse(s)
                .map(Some)
                .map_err(|e| FeedbackError::Validation(e.to_string())),
            Some(other) => Err(FeedbackError::Validation(format!(
                "_id must be a string, got {}",
                json_type_name(other)
            ))),
        }
    }

    /// Shallow `$set` merge: each patch key replaces the existing value wholesale
    ///
    /// Returns true when any value actually changed.
    pub fn merge(&mut self, patch: Document) -> bool {
        let mut changed = false;
        for (key, value) in patch.0 {
            if self.0.get(&key) != Some(&value) {
                self.0.insert(key, value);
                changed = true;
            }
        }
        changed
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Result of a single-document update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Documents matching the filter (0 or 1)
    pub matched_count: u64,
    /// Documents whose content changed (0 or 1)
    pub modified_count: u64,
}

/// Result of an unordered multi-document insert
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertManyOutcome {
    /// Identities of the documents actually inserted
    pub inserted_ids: Vec<DocumentId>,
    /// Documents rejected by a uniqueness constraint
    pub duplicate_count: usize,
}

/// Result of a grouping average over one field
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldAverage {
    /// Mean of the numeric values, `None` when no document has one
    pub average: Option<f64>,
    /// Number of documents that contributed
    pub count: u64,
}

/// Keyset position: the natural-order key of the last row already seen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCursor(pub i64);

/// One page of a natural-order scan
#[derive(Debug, Default)]
pub struct ScanPage {
    /// Documents in order; an error is a row that could not be decoded
    pub documents: Vec<Result<Document>>,
    /// Where the following page starts, `None` when nothing is left
    pub next: Option<ScanCursor>,
}

/// Outcome of `POST /feedbacks/upload`
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// Array body: documents inserted and duplicates skipped
    Batch {
        inserted_count: usize,
        duplicate_count: usize,
    },
    /// Single object body inserted
    Single(DocumentId),
    /// Single object body already present; nothing inserted
    Duplicate,
}

/// Score written for one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: String,
    pub score: f64,
}

/// Why analyze-all skipped a document
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Stored row could not be decoded into a document
    Undecodable(String),
    /// `text` missing or not a string
    MissingText,
    /// Application `id` missing or not a string
    MissingAppId,
    /// Sentiment service call failed
    Analysis(String),
    /// Score write failed or matched nothing
    Store(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Undecodable(e) => write!(f, "undecodable document: {}", e),
            SkipReason::MissingText => write!(f, "missing text"),
            SkipReason::MissingAppId => write!(f, "missing id"),
            SkipReason::Analysis(e) => write!(f, "analysis failed: {}", e),
            SkipReason::Store(e) => write!(f, "score update failed: {}", e),
        }
    }
}

/// A document analyze-all did not update
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedDocument {
    /// Native identity, when the row decoded far enough to tell
    pub native_id: Option<String>,
    pub reason: SkipReason,
}

/// Fold result of analyze-all
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyzeAllReport {
    pub updated_count: usize,
    pub skipped: Vec<SkippedDocument>,
}

/// Average score over all scored feedback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AverageScore {
    /// Mean score; 0 when nothing is scored
    pub average_score: f64,
    /// Number of documents carrying a score; 0 means "no data"
    pub scored_count: u64,
}
