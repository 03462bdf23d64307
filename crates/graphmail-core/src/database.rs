//! Email storage using SQLite

use crate::models::EmailRecord;
use crate::{CoreError, CoreResult};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::path::Path;
use tracing::{debug, info, warn};

/// Database email record
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DbEmail {
    pub id: i64,
    pub email_id: String,
    pub subject: String,
    pub sender: String,
    /// JSON array of addresses
    pub recipients: String,
    pub cc_recipients: String,
    pub bcc_recipients: String,
    pub body: String,
    pub is_html: bool,
    /// RFC 3339
    pub received_at: String,
    /// Unix timestamp for proper date sorting
    pub received_epoch: i64,
    pub created_at: String,
}

impl TryFrom<DbEmail> for EmailRecord {
    type Error = CoreError;

    fn try_from(row: DbEmail) -> CoreResult<Self> {
        Ok(EmailRecord {
            email_id: row.email_id,
            subject: row.subject,
            sender: row.sender,
            recipients: decode_addresses(&row.recipients)?,
            cc_recipients: decode_addresses(&row.cc_recipients)?,
            bcc_recipients: decode_addresses(&row.bcc_recipients)?,
            body: row.body,
            is_html: row.is_html,
            received_at: decode_time(&row.received_at)?,
            created_at: decode_time(&row.created_at)?,
        })
    }
}

fn encode_addresses(addresses: &[String]) -> CoreResult<String> {
    serde_json::to_string(addresses).map_err(|e| CoreError::DatabaseError(e.to_string()))
}

fn decode_addresses(raw: &str) -> CoreResult<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| CoreError::DatabaseError(e.to_string()))
}

fn encode_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode_time(raw: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CoreError::DatabaseError(format!("bad timestamp {:?}: {}", raw, e)))
}

const EMAIL_COLUMNS: &str = "id, email_id, subject, sender, recipients, cc_recipients, \
     bcc_recipients, body, is_html, received_at, received_epoch, created_at";

/// Database connection pool
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open or create a database at the given path
    pub async fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db_url = format!("sqlite:{}?mode=rwc", path.display());
        info!("Opening database at {}", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let db = Self { pool };
        db.initialize().await?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub async fn open_memory() -> CoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.initialize().await?;

        Ok(db)
    }

    /// Initialize the database schema
    async fn initialize(&self) -> CoreResult<()> {
        debug!("Initializing database schema");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS emails (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email_id TEXT NOT NULL UNIQUE,
                subject TEXT NOT NULL DEFAULT '',
                sender TEXT NOT NULL DEFAULT '',
                recipients TEXT NOT NULL DEFAULT '[]',
                cc_recipients TEXT NOT NULL DEFAULT '[]',
                bcc_recipients TEXT NOT NULL DEFAULT '[]',
                body TEXT NOT NULL DEFAULT '',
                is_html INTEGER NOT NULL DEFAULT 0,
                received_at TEXT NOT NULL,
                received_epoch INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_emails_received ON emails(received_epoch DESC);
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database schema initialized");
        Ok(())
    }

    /// Insert emails not stored yet, in one transaction.
    ///
    /// Emails whose `email_id` already exists are skipped. Returns how many
    /// rows were actually inserted.
    pub async fn store_emails(&self, emails: &[EmailRecord]) -> CoreResult<usize> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for email in emails {
            let result = sqlx::query(
                r#"
                INSERT INTO emails (
                    email_id, subject, sender, recipients, cc_recipients,
                    bcc_recipients, body, is_html, received_at, received_epoch, created_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(email_id) DO NOTHING
                "#,
            )
            .bind(&email.email_id)
            .bind(&email.subject)
            .bind(&email.sender)
            .bind(encode_addresses(&email.recipients)?)
            .bind(encode_addresses(&email.cc_recipients)?)
            .bind(encode_addresses(&email.bcc_recipients)?)
            .bind(&email.body)
            .bind(email.is_html)
            .bind(encode_time(&email.received_at))
            .bind(email.received_at.timestamp())
            .bind(encode_time(&email.created_at))
            .execute(&mut *tx)
            .await;

            match result {
                Ok(done) if done.rows_affected() > 0 => inserted += 1,
                Ok(_) => debug!("Email {} already stored, skipping", email.email_id),
                Err(e) => {
                    warn!("Failed to store email {}: {}", email.email_id, e);
                    return Err(e.into());
                }
            }
        }

        tx.commit().await?;
        info!(
            "Stored {} new emails ({} already present)",
            inserted,
            emails.len() - inserted
        );
        Ok(inserted)
    }

    /// Find a stored email by provider message id
    #[cfg(test)]
    pub(crate) async fn get_email(&self, email_id: &str) -> CoreResult<Option<EmailRecord>> {
        let query = format!("SELECT {} FROM emails WHERE email_id = ?", EMAIL_COLUMNS);
        let row = sqlx::query_as::<_, DbEmail>(&query)
            .bind(email_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(EmailRecord::try_from).transpose()
    }

    /// Stored emails, most recently received first
    pub async fn list_emails(&self, limit: i64, offset: i64) -> CoreResult<Vec<EmailRecord>> {
        let query = format!(
            "SELECT {} FROM emails ORDER BY received_epoch DESC, id DESC LIMIT ? OFFSET ?",
            EMAIL_COLUMNS
        );
        let rows = sqlx::query_as::<_, DbEmail>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(EmailRecord::try_from).collect()
    }

    /// Total number of stored emails
    pub async fn count_emails(&self) -> CoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM emails")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get::<i64, _>("count"))
    }
}
