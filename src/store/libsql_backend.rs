//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{DEFAULT_CATEGORY, Database, EmailStatus, TrackedEmail};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

const EMAIL_COLUMNS: &str = "id, recipient, subject, body, status, category";

/// Map a libsql Row to a TrackedEmail.
///
/// Text columns are nullable in the schema; NULL reads back as empty.
/// Status text outside `EmailStatus` (adopted tables) reads back as the
/// column default, `Scheduled`.
fn row_to_email(row: &libsql::Row) -> Result<TrackedEmail, DatabaseError> {
    let id: i64 = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("row parse id: {e}")))?;
    let status_str = row.get::<String>(4).unwrap_or_default();
    let status = if status_str.is_empty() {
        EmailStatus::Scheduled
    } else {
        status_str.parse().unwrap_or_else(|e| {
            warn!(id, "{e}, reading as Scheduled");
            EmailStatus::Scheduled
        })
    };

    Ok(TrackedEmail {
        id,
        recipient: row.get::<String>(1).unwrap_or_default(),
        subject: row.get::<String>(2).unwrap_or_default(),
        body: row.get::<String>(3).unwrap_or_default(),
        status,
        category: row
            .get::<String>(5)
            .unwrap_or_else(|_| DEFAULT_CATEGORY.to_string()),
    })
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn record_sent(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<TrackedEmail, DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO sent_emails (recipient, subject, body, status) VALUES (?1, ?2, ?3, ?4)",
            params![recipient, subject, body, EmailStatus::Sent.as_str()],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("record_sent: {e}")))?;

        let id = conn.last_insert_rowid();
        debug!(id, recipient, "Sent email recorded");

        Ok(TrackedEmail {
            id,
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            status: EmailStatus::Sent,
            category: DEFAULT_CATEGORY.to_string(),
        })
    }

    async fn find_by_recipient(
        &self,
        recipient: &str,
    ) -> Result<Option<TrackedEmail>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {EMAIL_COLUMNS} FROM sent_emails WHERE recipient = ?1 ORDER BY id ASC LIMIT 1"
                ),
                params![recipient],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_by_recipient: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_email(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("find_by_recipient: {e}"))),
        }
    }

    async fn set_status_for_recipient(
        &self,
        recipient: &str,
        status: EmailStatus,
    ) -> Result<u64, DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE sent_emails SET status = ?1 WHERE recipient = ?2",
                params![status.as_str(), recipient],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_status_for_recipient: {e}")))?;

        debug!(recipient, status = %status, changed, "Status updated");
        Ok(changed)
    }

    async fn list_emails(&self) -> Result<Vec<TrackedEmail>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {EMAIL_COLUMNS} FROM sent_emails ORDER BY id ASC"),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_emails: {e}")))?;

        let mut emails = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_email(&row) {
                Ok(email) => emails.push(email),
                Err(e) => warn!("Skipping sent_emails row: {e}"),
            }
        }
        Ok(emails)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
