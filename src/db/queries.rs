use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::DeskResult;

pub fn get_value(conn: &Connection, key: &str) -> DeskResult<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(value)
}

/// Replaces any existing value in a single statement.
pub fn set_value(conn: &Connection, key: &str, value: &str) -> DeskResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
        params![key, value, Utc::now().timestamp_millis()],
    )?;
    Ok(())
}

pub fn delete_value(conn: &Connection, key: &str) -> DeskResult<()> {
    conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
    Ok(())
}
