//! SQLite-backed TranscriptStore and QueryExecutor.
//!
//! One pool serves both: the transcript tables are owned by this module,
//! while the query executor runs model-authored SELECTs against the same
//! database (products plus the transcript tables themselves).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::info;

use colloquy_core::{
    validate_read_only, Conversation, QueryError, QueryExecutor, QueryRow, Role, StoreError,
    TranscriptStore, Turn,
};

/// SQLite transcript store
pub struct SqliteTranscriptStore {
    pool: SqlitePool,
}

impl SqliteTranscriptStore {
    /// Connect to a SQLite database URL and create the schema
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory database on a single pinned connection, for tests and
    /// development (separate pool connections would each get their own
    /// empty memory database)
    pub async fn connect_in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Handle to the underlying pool, shared with the query executor
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                api_key TEXT
            )",
            "CREATE TABLE IF NOT EXISTS turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                text TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_turns_conversation ON turns(conversation_id)",
            "CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                price REAL NOT NULL,
                description TEXT NOT NULL
            )",
        ];
        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        Ok(())
    }

    /// Seed demo products, once
    pub async fn seed_demo_products(&self) -> Result<(), StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        if count > 0 {
            return Ok(());
        }

        let demo_products = [
            ("basic widget", 9.99, "a simple widget for everyday use."),
            ("premium widget", 29.99, "fancier widget, allegedly worth it."),
            ("mystery box", 49.99, "you probably shouldn't buy this."),
        ];
        for (name, price, description) in demo_products {
            sqlx::query("INSERT INTO products (name, price, description) VALUES (?, ?, ?)")
                .bind(name)
                .bind(price)
                .bind(description)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        info!(count = demo_products.len(), "seeded demo products");
        Ok(())
    }
}

fn conversation_from_row(row: &SqliteRow) -> Result<Conversation, StoreError> {
    Ok(Conversation {
        id: row
            .try_get("id")
            .map_err(|e| StoreError::Internal(e.to_string()))?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(|e| StoreError::Internal(e.to_string()))?,
        credential_override: row
            .try_get::<Option<String>, _>("api_key")
            .map_err(|e| StoreError::Internal(e.to_string()))?,
    })
}

fn turn_from_row(row: &SqliteRow) -> Result<Turn, StoreError> {
    let role: String = row
        .try_get("role")
        .map_err(|e| StoreError::Internal(e.to_string()))?;
    let role = Role::parse(&role)
        .ok_or_else(|| StoreError::Serialization(format!("unknown role '{}'", role)))?;
    Ok(Turn {
        id: row
            .try_get("id")
            .map_err(|e| StoreError::Internal(e.to_string()))?,
        conversation_id: row
            .try_get("conversation_id")
            .map_err(|e| StoreError::Internal(e.to_string()))?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(|e| StoreError::Internal(e.to_string()))?,
        role,
        text: row
            .try_get("text")
            .map_err(|e| StoreError::Internal(e.to_string()))?,
    })
}

#[async_trait]
impl TranscriptStore for SqliteTranscriptStore {
    async fn create_conversation(&self) -> Result<Conversation, StoreError> {
        let conversation = Conversation::new();
        sqlx::query("INSERT INTO conversations (id, created_at) VALUES (?, ?)")
            .bind(&conversation.id)
            .bind(conversation.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(conversation)
    }

    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, StoreError> {
        let row = sqlx::query("SELECT id, created_at, api_key FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        row.as_ref().map(conversation_from_row).transpose()
    }

    async fn set_credential_override(
        &self,
        conversation_id: &str,
        credential: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE conversations SET api_key = ? WHERE id = ?")
            .bind(credential)
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(conversation_id.to_string()));
        }
        Ok(())
    }

    async fn append_turn(
        &self,
        conversation_id: &str,
        role: Role,
        text: &str,
    ) -> Result<Turn, StoreError> {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        if exists == 0 {
            return Err(StoreError::NotFound(conversation_id.to_string()));
        }

        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO turns (conversation_id, created_at, role, text) VALUES (?, ?, ?, ?)",
        )
        .bind(conversation_id)
        .bind(created_at)
        .bind(role.as_str())
        .bind(text)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;

        Ok(Turn {
            id: result.last_insert_rowid(),
            conversation_id: conversation_id.to_string(),
            created_at,
            role,
            text: text.to_string(),
        })
    }

    async fn turns(&self, conversation_id: &str) -> Result<Vec<Turn>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, conversation_id, created_at, role, text \
             FROM turns WHERE conversation_id = ? ORDER BY id ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        rows.iter().map(turn_from_row).collect()
    }

    async fn latest_turn(&self, conversation_id: &str) -> Result<Option<Turn>, StoreError> {
        let row = sqlx::query(
            "SELECT id, conversation_id, created_at, role, text \
             FROM turns WHERE conversation_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        row.as_ref().map(turn_from_row).transpose()
    }

    async fn latest_turn_with_role(
        &self,
        conversation_id: &str,
        role: Role,
    ) -> Result<Option<Turn>, StoreError> {
        let row = sqlx::query(
            "SELECT id, conversation_id, created_at, role, text \
             FROM turns WHERE conversation_id = ? AND role = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(conversation_id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?;
        row.as_ref().map(turn_from_row).transpose()
    }
}

/// Read-only query executor over a SQLite pool.
///
/// The lexical gate runs before the pool is touched; past it, the statement
/// executes as written and rows come back as ordered column -> value maps.
pub struct SqliteQueryExecutor {
    pool: SqlitePool,
}

impl SqliteQueryExecutor {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryExecutor for SqliteQueryExecutor {
    async fn execute(&self, query: &str) -> Result<Vec<QueryRow>, QueryError> {
        validate_read_only(query)?;

        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| QueryError::Execution(e.to_string()))?;

        rows.iter().map(row_to_map).collect()
    }
}

fn row_to_map(row: &SqliteRow) -> Result<QueryRow, QueryError> {
    let mut map = QueryRow::new();
    for column in row.columns() {
        let value = column_value(row, column.ordinal())
            .map_err(|e| QueryError::Execution(e.to_string()))?;
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

fn column_value(row: &SqliteRow, index: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_ascii_uppercase();
    drop(raw);

    let value = match type_name.as_str() {
        "INTEGER" | "INT" | "INT4" | "INT8" | "BIGINT" | "BOOLEAN" => {
            Value::from(row.try_get::<i64, _>(index)?)
        }
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => {
            serde_json::Number::from_f64(row.try_get::<f64, _>(index)?)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }
        "BLOB" => {
            let bytes: Vec<u8> = row.try_get(index)?;
            Value::String(format!("<blob {} bytes>", bytes.len()))
        }
        _ => Value::String(row.try_get::<String, _>(index)?),
    };
    Ok(value)
}
