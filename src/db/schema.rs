use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn initialize_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );
        ",
    )
    .context("Failed to create kv table")?;

    Ok(())
}

pub fn open_db() -> Result<Connection> {
    let db_path = crate::config::settings::db_path();
    crate::config::settings::ensure_lexdesk_dir()?;
    let conn = Connection::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    initialize_db(&conn)?;
    Ok(conn)
}
