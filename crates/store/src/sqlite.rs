//! SQLite relational store.
//!
//! One database file with three tables — `customers`, `chat_sessions`,
//! `chat_messages` — created by in-code migrations. WAL journal, foreign
//! keys ON. Timestamps are stored as RFC 3339 text, calendar dates as
//! `YYYY-MM-DD` text.

use async_trait::async_trait;
use careline_core::domain::{ChatMessage, ChatSession, Customer, NewCustomer, Role};
use careline_core::error::StoreError;
use careline_core::store::ChatStore;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

const DATE_FMT: &str = "%Y-%m-%d";

/// The production relational store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new store from a SQLite URL or path.
    ///
    /// The database and all tables/indexes are created automatically.
    /// Pass `":memory:"` for an in-process ephemeral database (useful for
    /// tests; pinned to one connection so every query sees the same data).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let max_connections = if path.contains(":memory:") { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Run schema migrations — creates tables and indexes.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS customers (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                phone_number      TEXT UNIQUE NOT NULL,
                name              TEXT,
                birth_date        TEXT,
                is_member         INTEGER NOT NULL DEFAULT 0,
                current_plan      TEXT,
                subscription_date TEXT,
                created_at        TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("customers table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_sessions (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                customer_id INTEGER NOT NULL REFERENCES customers(id),
                started_at  TEXT NOT NULL,
                ended_at    TEXT,
                summary     TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("chat_sessions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_messages (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL REFERENCES chat_sessions(id),
                role       TEXT NOT NULL,
                content    TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("chat_messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_customers_phone ON customers(phone_number)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("phone index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sessions_customer ON chat_sessions(customer_id, started_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("session index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_session ON chat_messages(session_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("message index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    // ── Row mapping ───────────────────────────────────────────────────────

    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::QueryFailed(format!("timestamp '{s}': {e}")))
    }

    fn parse_date(s: Option<String>) -> Result<Option<NaiveDate>, StoreError> {
        s.map(|s| {
            NaiveDate::parse_from_str(&s, DATE_FMT)
                .map_err(|e| StoreError::QueryFailed(format!("date '{s}': {e}")))
        })
        .transpose()
    }

    fn row_to_customer(row: &sqlx::sqlite::SqliteRow) -> Result<Customer, StoreError> {
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;
        Ok(Customer {
            id: row
                .try_get("id")
                .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?,
            phone_number: row
                .try_get("phone_number")
                .map_err(|e| StoreError::QueryFailed(format!("phone_number column: {e}")))?,
            name: row
                .try_get("name")
                .map_err(|e| StoreError::QueryFailed(format!("name column: {e}")))?,
            birth_date: Self::parse_date(
                row.try_get("birth_date")
                    .map_err(|e| StoreError::QueryFailed(format!("birth_date column: {e}")))?,
            )?,
            is_member: row
                .try_get::<i64, _>("is_member")
                .map_err(|e| StoreError::QueryFailed(format!("is_member column: {e}")))?
                != 0,
            current_plan: row
                .try_get("current_plan")
                .map_err(|e| StoreError::QueryFailed(format!("current_plan column: {e}")))?,
            subscription_date: Self::parse_date(
                row.try_get("subscription_date")
                    .map_err(|e| StoreError::QueryFailed(format!("subscription_date column: {e}")))?,
            )?,
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }

    fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<ChatSession, StoreError> {
        let started_at: String = row
            .try_get("started_at")
            .map_err(|e| StoreError::QueryFailed(format!("started_at column: {e}")))?;
        let ended_at: Option<String> = row
            .try_get("ended_at")
            .map_err(|e| StoreError::QueryFailed(format!("ended_at column: {e}")))?;
        Ok(ChatSession {
            id: row
                .try_get("id")
                .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?,
            customer_id: row
                .try_get("customer_id")
                .map_err(|e| StoreError::QueryFailed(format!("customer_id column: {e}")))?,
            started_at: Self::parse_timestamp(&started_at)?,
            ended_at: ended_at.as_deref().map(Self::parse_timestamp).transpose()?,
            summary: row
                .try_get("summary")
                .map_err(|e| StoreError::QueryFailed(format!("summary column: {e}")))?,
        })
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<ChatMessage, StoreError> {
        let role: String = row
            .try_get("role")
            .map_err(|e| StoreError::QueryFailed(format!("role column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;
        Ok(ChatMessage {
            id: row
                .try_get("id")
                .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?,
            session_id: row
                .try_get("session_id")
                .map_err(|e| StoreError::QueryFailed(format!("session_id column: {e}")))?,
            role: role.parse::<Role>().map_err(StoreError::QueryFailed)?,
            content: row
                .try_get("content")
                .map_err(|e| StoreError::QueryFailed(format!("content column: {e}")))?,
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }

    async fn customer_by_id(&self, id: i64) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query("SELECT * FROM customers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("customer by id: {e}")))?;
        row.as_ref().map(Self::row_to_customer).transpose()
    }
}

#[async_trait]
impl ChatStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn find_customer_by_phone(
        &self,
        phone_number: &str,
    ) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query("SELECT * FROM customers WHERE phone_number = ?")
            .bind(phone_number)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("customer by phone: {e}")))?;
        row.as_ref().map(Self::row_to_customer).transpose()
    }

    async fn find_customer(&self, customer_id: i64) -> Result<Option<Customer>, StoreError> {
        self.customer_by_id(customer_id).await
    }

    async fn create_customer(
        &self,
        phone_number: &str,
        name: Option<&str>,
    ) -> Result<Customer, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO customers (phone_number, name, is_member, created_at)
            VALUES (?, ?, 0, ?)
            "#,
        )
        .bind(phone_number)
        .bind(name)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("insert customer: {e}")))?;

        self.customer_by_id(result.last_insert_rowid())
            .await?
            .ok_or_else(|| StoreError::QueryFailed("inserted customer row vanished".into()))
    }

    async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO customers
                (phone_number, name, birth_date, is_member, current_plan, subscription_date, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&customer.phone_number)
        .bind(&customer.name)
        .bind(customer.birth_date.map(|d| d.format(DATE_FMT).to_string()))
        .bind(customer.is_member as i64)
        .bind(&customer.current_plan)
        .bind(customer.subscription_date.map(|d| d.format(DATE_FMT).to_string()))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("insert customer: {e}")))?;

        self.customer_by_id(result.last_insert_rowid())
            .await?
            .ok_or_else(|| StoreError::QueryFailed("inserted customer row vanished".into()))
    }

    async fn create_session(&self, customer_id: i64) -> Result<ChatSession, StoreError> {
        let result = sqlx::query(
            "INSERT INTO chat_sessions (customer_id, started_at) VALUES (?, ?)",
        )
        .bind(customer_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("insert session: {e}")))?;

        self.find_session(result.last_insert_rowid())
            .await?
            .ok_or_else(|| StoreError::QueryFailed("inserted session row vanished".into()))
    }

    async fn find_session(&self, session_id: i64) -> Result<Option<ChatSession>, StoreError> {
        let row = sqlx::query("SELECT * FROM chat_sessions WHERE id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("session by id: {e}")))?;
        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn sessions_for_customer(
        &self,
        customer_id: i64,
    ) -> Result<Vec<ChatSession>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM chat_sessions WHERE customer_id = ? ORDER BY started_at DESC, id DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("sessions for customer: {e}")))?;
        rows.iter().map(Self::row_to_session).collect()
    }

    async fn close_session(
        &self,
        session_id: i64,
        ended_at: DateTime<Utc>,
        summary: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE chat_sessions SET ended_at = ?, summary = ? WHERE id = ?")
            .bind(ended_at.to_rfc3339())
            .bind(summary)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("close session: {e}")))?;
        Ok(())
    }

    async fn append_message(
        &self,
        session_id: i64,
        role: Role,
        content: &str,
    ) -> Result<ChatMessage, StoreError> {
        let result = sqlx::query(
            "INSERT INTO chat_messages (session_id, role, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(role.as_str())
        .bind(content)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("append message: {e}")))?;

        let row = sqlx::query("SELECT * FROM chat_messages WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("appended message fetch: {e}")))?;
        Self::row_to_message(&row)
    }

    async fn list_messages(&self, session_id: i64) -> Result<Vec<ChatMessage>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM chat_messages WHERE session_id = ? ORDER BY created_at, id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("list messages: {e}")))?;
        rows.iter().map(Self::row_to_message).collect()
    }

    async fn recent_messages(
        &self,
        session_id: i64,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM chat_messages WHERE session_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("recent messages: {e}")))?;

        // Fetched newest-first; the caller wants chronological order.
        let mut messages: Vec<ChatMessage> = rows
            .iter()
            .map(Self::row_to_message)
            .collect::<Result<_, _>>()?;
        messages.reverse();
        Ok(messages)
    }

    async fn count_messages(&self, session_id: i64) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM chat_messages WHERE session_id = ?")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("count messages: {e}")))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| StoreError::QueryFailed(format!("count column: {e}")))?;
        Ok(n as usize)
    }
}
