//! LibSQL document store
//!
//! Each collection is one table holding the native identity and the document
//! body as JSON text. Field queries and the score aggregation go through the
//! SQLite JSON functions, so no per-field columns are needed.

use crate::config::StoreConfig;
use crate::error::{FeedbackError, Result};
use crate::storage::DocumentStore;
use crate::types::{
    Document, DocumentId, FieldAverage, InsertManyOutcome, ScanCursor, ScanPage, UpdateOutcome,
    APP_ID_FIELD, NATIVE_ID_FIELD,
};
use async_trait::async_trait;
use libsql::{params, Builder, Connection, Database, TransactionBehavior};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT_MS: u64 = 5000;

/// Database connection mode
#[derive(Debug, Clone)]
pub enum ConnectionMode {
    /// Local file-based database
    Local(String),
    /// Remote database (Turso Cloud)
    Remote { url: String, token: String },
}

impl ConnectionMode {
    /// Parse the configured connection string
    ///
    /// - `libsql://...` → Remote (token from config or `TURSO_AUTH_TOKEN`)
    /// - anything else → Local file path
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        if config.url.starts_with("libsql://") {
            let token = config
                .auth_token
                .clone()
                .or_else(|| std::env::var("TURSO_AUTH_TOKEN").ok())
                .ok_or_else(|| {
                    FeedbackError::StoreUnavailable(
                        "remote store requires store.auth_token or TURSO_AUTH_TOKEN".into(),
                    )
                })?;
            Ok(ConnectionMode::Remote {
                url: config.url.clone(),
                token,
            })
        } else {
            Ok(ConnectionMode::Local(config.url.clone()))
        }
    }
}

/// JSON path addressing a top-level key
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field)
}

/// Materialize the `(_id, body)` columns starting at `offset` into a
/// document carrying its `_id`
fn row_to_document(row: &libsql::Row, offset: i32) -> Result<Document> {
    let id: String = row
        .get(offset)
        .map_err(|e| FeedbackError::Decode(format!("unreadable _id column: {}", e)))?;
    let body: String = row
        .get(offset + 1)
        .map_err(|e| FeedbackError::Decode(format!("document {}: unreadable body: {}", id, e)))?;

    let mut doc: Document = serde_json::from_str(&body)
        .map_err(|e| FeedbackError::Decode(format!("document {}: {}", id, e)))?;
    doc.insert(NATIVE_ID_FIELD, id);
    Ok(doc)
}

/// LibSQL-backed feedback collection
pub struct LibsqlStore {
    /// `None` once closed
    db: RwLock<Option<Database>>,
    table: String,
    local: bool,
}

impl LibsqlStore {
    /// Open the store described by configuration
    ///
    /// Fails when the database cannot be reached or the schema cannot be
    /// created; callers treat that as fatal at startup.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let mode = ConnectionMode::from_config(config)?;
        Self::connect(mode, config.table_name(), config.unique_app_id).await
    }

    /// Connect, verify health and bootstrap the collection table
    pub async fn connect(mode: ConnectionMode, table: String, unique_app_id: bool) -> Result<Self> {
        match &mode {
            ConnectionMode::Local(path) => info!("Connecting to local document store: {}", path),
            ConnectionMode::Remote { url, .. } => info!("Connecting to remote document store: {}", url),
        }

        let db = match &mode {
            ConnectionMode::Local(path) => {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            FeedbackError::StoreUnavailable(format!(
                                "Failed to create database directory {}: {}",
                                parent.display(),
                                e
                            ))
                        })?;
                    }
                }

                Builder::new_local(path).build().await.map_err(|e| {
                    FeedbackError::StoreUnavailable(format!("Failed to open local database: {}", e))
                })?
            }
            ConnectionMode::Remote { url, token } => Builder::new_remote(url.clone(), token.clone())
                .build()
                .await
                .map_err(|e| {
                    FeedbackError::StoreUnavailable(format!("Failed to open remote database: {}", e))
                })?,
        };

        let store = Self {
            db: RwLock::new(Some(db)),
            table,
            local: matches!(mode, ConnectionMode::Local(_)),
        };

        store.verify_database_health().await?;
        store.bootstrap_schema(unique_app_id).await?;

        info!("Document store ready (collection table '{}')", store.table);
        Ok(store)
    }

    /// Get a connection from the database
    async fn get_conn(&self) -> Result<Connection> {
        let guard = self.db.read().await;
        let db = guard
            .as_ref()
            .ok_or_else(|| FeedbackError::StoreUnavailable("store is closed".into()))?;
        let conn = db
            .connect()
            .map_err(|e| FeedbackError::StoreUnavailable(format!("Failed to get connection: {}", e)))?;

        if self.local {
            // PRAGMA returns a row, so it goes through query()
            if let Err(e) = conn
                .query(&format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS), ())
                .await
            {
                debug!("Could not set busy timeout: {}", e);
            }
        }

        Ok(conn)
    }

    /// Verify the database answers reads and accepts writes
    async fn verify_database_health(&self) -> Result<()> {
        let conn = self.get_conn().await?;

        conn.query("SELECT 1", ()).await.map_err(|e| {
            FeedbackError::StoreUnavailable(format!(
                "Database corruption detected or invalid database file: {}",
                e
            ))
        })?;

        let write_test = r#"
            CREATE TABLE IF NOT EXISTS _health_check (id INTEGER PRIMARY KEY);
            DROP TABLE IF EXISTS _health_check;
        "#;
        if let Err(e) = conn.execute_batch(write_test).await {
            let error_msg = e.to_string().to_lowercase();
            if error_msg.contains("readonly") || error_msg.contains("permission") {
                return Err(FeedbackError::StoreUnavailable(format!(
                    "Database is read-only or lacks write permissions: {}",
                    e
                )));
            }
            return Err(FeedbackError::StoreUnavailable(format!(
                "Database write test failed: {}",
                e
            )));
        }

        debug!("Database health check passed");
        Ok(())
    }

    /// Create the collection table and its application-id index
    async fn bootstrap_schema(&self, unique_app_id: bool) -> Result<()> {
        let conn = self.get_conn().await?;

        if self.local {
            if let Err(e) = conn.query("PRAGMA journal_mode=WAL", ()).await {
                warn!("Could not enable WAL mode: {}", e);
            }
        }

        conn.execute(
            &format!(
                r#"CREATE TABLE IF NOT EXISTS "{}" (
                    _id TEXT PRIMARY KEY NOT NULL,
                    body TEXT NOT NULL
                )"#,
                self.table
            ),
            (),
        )
        .await
        .map_err(|e| FeedbackError::StoreUnavailable(format!("Failed to create collection: {}", e)))?;

        let index_sql = if unique_app_id {
            format!(
                r#"CREATE UNIQUE INDEX IF NOT EXISTS "{t}_app_id" ON "{t}" (json_extract(body, '{p}'))
                   WHERE json_type(body, '{p}') = 'text'"#,
                t = self.table,
                p = json_path(APP_ID_FIELD)
            )
        } else {
            format!(r#"DROP INDEX IF EXISTS "{}_app_id""#, self.table)
        };
        conn.execute(&index_sql, ()).await.map_err(|e| {
            FeedbackError::StoreUnavailable(format!(
                "Failed to prepare application id index (existing duplicates?): {}",
                e
            ))
        })?;

        debug!("Collection schema ready (unique application id: {})", unique_app_id);
        Ok(())
    }

    /// Insert on an existing connection
    async fn insert_with(&self, conn: &Connection, mut doc: Document) -> Result<DocumentId> {
        let id = doc.native_id()?.unwrap_or_default();
        doc.remove(NATIVE_ID_FIELD);
        let body = serde_json::to_string(&doc)?;

        conn.execute(
            &format!(r#"INSERT INTO "{}" (_id, body) VALUES (?1, ?2)"#, self.table),
            params![id.to_string(), body],
        )
        .await?;

        Ok(id)
    }

    /// Read-merge-write of the first row matching `filter`, inside one
    /// immediate transaction so concurrent merges cannot interleave
    async fn merge_first(&self, filter: &str, value: String, mut patch: Document) -> Result<UpdateOutcome> {
        let conn = self.get_conn().await?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await?;

        let mut rows = tx
            .query(
                &format!(
                    r#"SELECT _id, body FROM "{}" WHERE {} ORDER BY rowid LIMIT 1"#,
                    self.table, filter
                ),
                params![value],
            )
            .await?;

        let row = rows.next().await?;
        drop(rows);

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(UpdateOutcome::default());
        };
        let mut doc = row_to_document(&row, 0)?;

        let native_id = match doc.remove(NATIVE_ID_FIELD) {
            Some(Value::String(id)) => id,
            _ => return Err(FeedbackError::Decode("row without _id".into())),
        };

        if let Some(requested) = patch.remove(NATIVE_ID_FIELD) {
            if requested.as_str() != Some(native_id.as_str()) {
                tx.rollback().await?;
                return Err(FeedbackError::Validation("_id is immutable".into()));
            }
        }

        let changed = doc.merge(patch);
        if changed {
            let body = serde_json::to_string(&doc)?;
            tx.execute(
                &format!(r#"UPDATE "{}" SET body = ?1 WHERE _id = ?2"#, self.table),
                params![body, native_id],
            )
            .await?;
        }
        tx.commit().await?;

        Ok(UpdateOutcome {
            matched_count: 1,
            modified_count: u64::from(changed),
        })
    }
}

#[async_trait]
impl DocumentStore for LibsqlStore {
    async fn find_all(&self) -> Result<Vec<Document>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!(r#"SELECT _id, body FROM "{}" ORDER BY rowid"#, self.table),
                (),
            )
            .await?;

        let mut docs = Vec::new();
        while let Some(row) = rows.next().await? {
            docs.push(row_to_document(&row, 0)?);
        }

        debug!("Loaded {} documents", docs.len());
        Ok(docs)
    }

    async fn scan_page(&self, after: Option<ScanCursor>, limit: usize) -> Result<ScanPage> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    r#"SELECT rowid, _id, body FROM "{}" WHERE rowid > ?1 ORDER BY rowid LIMIT ?2"#,
                    self.table
                ),
                params![after.map_or(0, |cursor| cursor.0), limit as i64],
            )
            .await?;

        let mut page = ScanPage::default();
        let mut last = None;
        while let Some(row) = rows.next().await? {
            let rowid: i64 = row
                .get(0)
                .map_err(|e| FeedbackError::Decode(format!("unreadable rowid: {}", e)))?;
            last = Some(ScanCursor(rowid));
            page.documents.push(row_to_document(&row, 1));
        }

        // A short page means the collection is exhausted
        if page.documents.len() == limit {
            page.next = last;
        }

        debug!("Scanned page of {} documents", page.documents.len());
        Ok(page)
    }

    async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Document>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!(r#"SELECT _id, body FROM "{}" WHERE _id = ?1"#, self.table),
                params![id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => row_to_document(&row, 0).map(Some),
            None => Ok(None),
        }
    }

    async fn find_by_app_id(&self, app_id: &str) -> Result<Option<Document>> {
        let conn = self.get_conn().await?;
        let path = json_path(APP_ID_FIELD);
        let mut rows = conn
            .query(
                &format!(
                    r#"SELECT _id, body FROM "{}"
                       WHERE json_type(body, ?1) = 'text' AND json_extract(body, ?1) = ?2
                       ORDER BY rowid LIMIT 1"#,
                    self.table
                ),
                params![path, app_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => row_to_document(&row, 0).map(Some),
            None => Ok(None),
        }
    }

    async fn insert_one(&self, doc: Document) -> Result<DocumentId> {
        let conn = self.get_conn().await?;
        let id = self.insert_with(&conn, doc).await?;
        debug!("Inserted document {}", id);
        Ok(id)
    }

    async fn insert_many_unordered(&self, docs: Vec<Document>) -> Result<InsertManyOutcome> {
        let conn = self.get_conn().await?;
        let submitted = docs.len();
        let mut outcome = InsertManyOutcome::default();

        for doc in docs {
            match self.insert_with(&conn, doc).await {
                Ok(id) => outcome.inserted_ids.push(id),
                Err(e) if e.is_duplicate_key() => {
                    debug!("Skipping duplicate document: {}", e);
                    outcome.duplicate_count += 1;
                }
                Err(e) => {
                    warn!(
                        "Batch insert aborted after {} of {} documents: {}",
                        outcome.inserted_ids.len(),
                        submitted,
                        e
                    );
                    return Err(e);
                }
            }
        }

        debug!(
            "Batch insert: {} inserted, {} duplicates",
            outcome.inserted_ids.len(),
            outcome.duplicate_count
        );
        Ok(outcome)
    }

    async fn update_by_id(&self, id: &DocumentId, patch: Document) -> Result<UpdateOutcome> {
        self.merge_first("_id = ?1", id.to_string(), patch).await
    }

    async fn update_by_app_id(&self, app_id: &str, patch: Document) -> Result<UpdateOutcome> {
        let filter = format!(
            "json_type(body, '{p}') = 'text' AND json_extract(body, '{p}') = ?1",
            p = json_path(APP_ID_FIELD)
        );
        self.merge_first(&filter, app_id.to_string(), patch).await
    }

    async fn delete_by_id(&self, id: &DocumentId) -> Result<u64> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute(
                &format!(r#"DELETE FROM "{}" WHERE _id = ?1"#, self.table),
                params![id.to_string()],
            )
            .await?;
        debug!("Deleted {} document(s) with _id {}", deleted, id);
        Ok(deleted)
    }

    async fn average(&self, field: &str) -> Result<FieldAverage> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    r#"SELECT AVG(json_extract(body, ?1)), COUNT(*) FROM "{}"
                       WHERE json_type(body, ?1) IN ('integer', 'real')"#,
                    self.table
                ),
                params![json_path(field)],
            )
            .await?;

        let row = rows
            .next()
            .await?
            .ok_or_else(|| FeedbackError::Decode("aggregation returned no row".into()))?;
        let average: Option<f64> = row
            .get(0)
            .map_err(|e| FeedbackError::Decode(format!("average is not numeric: {}", e)))?;
        let count: i64 = row
            .get(1)
            .map_err(|e| FeedbackError::Decode(format!("count is not an integer: {}", e)))?;

        Ok(FieldAverage {
            average,
            count: count.max(0) as u64,
        })
    }

    async fn count(&self) -> Result<u64> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(&format!(r#"SELECT COUNT(*) FROM "{}""#, self.table), ())
            .await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row
                .get(0)
                .map_err(|e| FeedbackError::Decode(format!("count is not an integer: {}", e)))?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }

    async fn close(&self) -> Result<()> {
        if self.db.write().await.take().is_some() {
            info!("Document store closed");
        }
        Ok(())
    }
}
