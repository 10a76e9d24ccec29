// Credential storage
// Single source of truth for the current access token

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::{Mutex, RwLock};

/// Well-known key the access token is stored under
const ACCESS_TOKEN_KEY: &str = "auth.access_token";

/// Holds the current access token and persists it across restarts.
///
/// The token lives in memory so the request path never touches disk;
/// every mutation is written through to a SQLite key/value table so a
/// restart does not require re-authentication.
pub struct TokenStore {
    /// Current token, read on every outgoing request
    current: RwLock<Option<String>>,

    /// Durable backing storage; locked only for short synchronous operations
    db: Mutex<Connection>,
}

impl TokenStore {
    /// Open the store at the given path, recovering any persisted token
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create credential directory: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open credential database: {}", path.display()))?;
        let current = Self::init(&conn)?;

        if current.is_some() {
            tracing::debug!("Recovered persisted access token");
        }

        Ok(Self {
            current: RwLock::new(current),
            db: Mutex::new(conn),
        })
    }

    /// Create a store backed by an in-memory database (no persistence)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let current = Self::init(&conn)?;

        Ok(Self {
            current: RwLock::new(current),
            db: Mutex::new(conn),
        })
    }

    /// Create the schema if needed and load any stored token
    fn init(conn: &Connection) -> Result<Option<String>> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS auth_kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to initialize credential schema")?;

        let token = conn
            .query_row(
                "SELECT value FROM auth_kv WHERE key = ?1",
                [ACCESS_TOKEN_KEY],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
            .context("Failed to load stored token")?;

        Ok(token)
    }

    /// Current token, if any. Never fails.
    pub async fn get(&self) -> Option<String> {
        self.current.read().await.clone()
    }

    /// Overwrite the stored token. Idempotent.
    pub async fn set(&self, token: &str) {
        {
            let mut current = self.current.write().await;
            *current = Some(token.to_string());
        }

        let db = self.db.lock().await;
        let result = db.execute(
            "INSERT INTO auth_kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![ACCESS_TOKEN_KEY, token, Utc::now().to_rfc3339()],
        );

        if let Err(e) = result {
            // The in-memory token stays authoritative for this process
            tracing::warn!("Failed to persist access token: {}", e);
        }
    }

    /// Remove the stored token. Idempotent, safe when already empty.
    pub async fn clear(&self) {
        {
            let mut current = self.current.write().await;
            *current = None;
        }

        let db = self.db.lock().await;
        let result = db.execute(
            "DELETE FROM auth_kv WHERE key = ?1",
            [ACCESS_TOKEN_KEY],
        );

        if let Err(e) = result {
            tracing::warn!("Failed to clear persisted access token: {}", e);
        }
    }

    /// When the token was last written, from the durable storage
    pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
        let db = self.db.lock().await;
        let stamp: Option<String> = db
            .query_row(
                "SELECT updated_at FROM auth_kv WHERE key = ?1",
                [ACCESS_TOKEN_KEY],
                |row| row.get(0),
            )
            .ok();

        stamp.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        })
    }
}
