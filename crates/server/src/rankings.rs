//! Thread-safe user store: names, salted password hashes, rankings, and
//! login state over a local SQLite file.

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

pub const DEFAULT_RANKING: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginResult {
    Ok,
    NoUser,
    WrongPassword,
    AlreadyLoggedIn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: Vec<u8>,
    pub ranking: f64,
}

/// All methods are serializable under a single writer lock; contention is
/// low since callers are the matchmaker task and the janitors.
pub struct RankingStore {
    conn: Mutex<Connection>,
}

impl RankingStore {
    /// Open (creating if needed) the database at `path`. Any stale
    /// logged-in state from a previous run is cleared. `":memory:"` is
    /// accepted for tests.
    pub fn open(path: &str) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                 username TEXT PRIMARY KEY,
                 password_hash BLOB,
                 ranking REAL,
                 logged_in BOOLEAN
             );
             UPDATE users SET logged_in = 0;",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a new user with the default ranking, logged out. Silently
    /// does nothing if the user already exists.
    pub fn set(&self, username: &str, password_hash: &[u8]) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().expect("ranking store lock poisoned");
        conn.execute(
            "INSERT OR IGNORE INTO users (username, password_hash, ranking, logged_in)
             VALUES (?1, ?2, ?3, 0)",
            params![username, password_hash, DEFAULT_RANKING],
        )?;
        Ok(())
    }

    /// Atomic check-and-set of the logged-in flag.
    pub fn login(
        &self,
        username: &str,
        password_hash: &[u8],
    ) -> Result<LoginResult, rusqlite::Error> {
        let mut conn = self.conn.lock().expect("ranking store lock poisoned");
        let tx = conn.transaction()?;

        let row: Option<(Vec<u8>, bool)> = tx
            .query_row(
                "SELECT password_hash, logged_in FROM users WHERE username = ?1",
                [username],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let result = match row {
            None => LoginResult::NoUser,
            Some((stored, _)) if stored != password_hash => LoginResult::WrongPassword,
            Some((_, true)) => LoginResult::AlreadyLoggedIn,
            Some(_) => {
                tx.execute(
                    "UPDATE users SET logged_in = 1 WHERE username = ?1",
                    [username],
                )?;
                LoginResult::Ok
            }
        };

        tx.commit()?;
        Ok(result)
    }

    /// Clear the logged-in flag. Idempotent; unknown users are a no-op.
    pub fn logoff(&self, username: &str) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().expect("ranking store lock poisoned");
        conn.execute(
            "UPDATE users SET logged_in = 0 WHERE username = ?1",
            [username],
        )?;
        Ok(())
    }

    /// Bulk fetch. Unknown names are simply absent from the result.
    pub fn get_multi(&self, usernames: &[String]) -> Result<Vec<UserRecord>, rusqlite::Error> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().expect("ranking store lock poisoned");
        let placeholders = vec!["?"; usernames.len()].join(", ");
        let sql = format!(
            "SELECT username, password_hash, ranking FROM users WHERE username IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(usernames.iter()), |row| {
            Ok(UserRecord {
                username: row.get(0)?,
                password_hash: row.get(1)?,
                ranking: row.get(2)?,
            })
        })?;
        rows.collect()
    }

    /// Adjust a user's ranking by `delta`.
    pub fn update_ranking(&self, username: &str, delta: f64) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().expect("ranking store lock poisoned");
        conn.execute(
            "UPDATE users SET ranking = ranking + ?1 WHERE username = ?2",
            params![delta, username],
        )?;
        Ok(())
    }
}
