//! User Storage
//! Mission: Securely store and manage user accounts with SQLite

use crate::auth::models::User;
use anyhow::{Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};
use rusqlite::{params, Connection, ErrorCode};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Failure classes surfaced by the store
#[derive(Debug)]
pub enum StoreError {
    /// An account with the same email or username already exists
    Duplicate,
    /// Anything else (I/O, schema, hashing)
    Internal(anyhow::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Duplicate => write!(f, "account already exists"),
            StoreError::Internal(e) => write!(f, "store error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Internal(err)
    }
}

/// User storage with SQLite backend
pub struct UserStore {
    db_path: String,
}

impl UserStore {
    /// Create a new user store and initialize database
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    /// Initialize database schema.
    ///
    /// Uniqueness lives in the schema: `UNIQUE` on username and on email
    /// (email compared case-insensitively), so two concurrent registrations
    /// with the same email cannot both insert.
    fn init_db(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                email TEXT UNIQUE COLLATE NOCASE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        // Writers from concurrent requests wait instead of failing with SQLITE_BUSY
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Create a new account. The plaintext password is hashed before it
    /// touches the database; it is never logged.
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, StoreError> {
        let password_hash = hash(password, DEFAULT_COST)
            .context("Failed to hash password")
            .map_err(StoreError::Internal)?;

        let user = User::new(username, email, password_hash);

        let conn = self.open()?;
        let inserted = conn.execute(
            "INSERT INTO users (id, username, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id.to_string(),
                user.username,
                user.email,
                user.password_hash,
                user.created_at,
            ],
        );

        match inserted {
            Ok(_) => {
                info!("Created account: {} <{}>", user.username, user.email);
                Ok(user)
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Duplicate)
            }
            Err(e) => Err(StoreError::Internal(e.into())),
        }
    }

    /// Look up an account by email (case-insensitive)
    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, username, email, password_hash, created_at
             FROM users WHERE email = ?1 COLLATE NOCASE",
        )?;
        let user = stmt.query_row(params![email], row_to_user);
        Self::optional(user)
    }

    /// Look up an account by its id
    pub fn find_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, username, email, password_hash, created_at
             FROM users WHERE id = ?1",
        )?;
        let user = stmt.query_row(params![id.to_string()], row_to_user);
        Self::optional(user)
    }

    fn optional(
        result: Result<User, rusqlite::Error>,
    ) -> Result<Option<User>> {
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<User, rusqlite::Error> {
    let id_str: String = row.get(0)?;
    Ok(User {
        id: Uuid::parse_str(&id_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Check a plaintext password against a stored bcrypt hash.
///
/// Free function on purpose: the store persists hashes, it does not decide
/// what "verify" means. Returns false on any bcrypt failure rather than
/// leaking hash-format details to callers.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    verify(password, password_hash).unwrap_or(false)
}
