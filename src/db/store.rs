use std::collections::HashMap;
use std::sync::Mutex;

use rusqlite::Connection;

use super::queries;
use crate::error::{DeskError, DeskResult};

/// Fixed key under which the signed-in session is persisted.
pub const SESSION_KEY: &str = "saas-session";

/// Local key-value persistence for client state.
pub trait SessionStore {
    fn load(&self, key: &str) -> DeskResult<Option<String>>;
    fn save(&self, key: &str, value: &str) -> DeskResult<()>;
    fn remove(&self, key: &str) -> DeskResult<()>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open_default() -> anyhow::Result<Self> {
        Ok(Self::new(super::schema::open_db()?))
    }
}

impl SessionStore for SqliteStore {
    fn load(&self, key: &str) -> DeskResult<Option<String>> {
        queries::get_value(&self.conn, key)
    }

    fn save(&self, key: &str, value: &str) -> DeskResult<()> {
        queries::set_value(&self.conn, key, value)
    }

    fn remove(&self, key: &str) -> DeskResult<()> {
        queries::delete_value(&self.conn, key)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> DeskResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| DeskError::Storage("memory store poisoned".to_string()))
    }
}

impl SessionStore for MemoryStore {
    fn load(&self, key: &str) -> DeskResult<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> DeskResult<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> DeskResult<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

impl<T: SessionStore + ?Sized> SessionStore for &T {
    fn load(&self, key: &str) -> DeskResult<Option<String>> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> DeskResult<()> {
        (**self).save(key, value)
    }

    fn remove(&self, key: &str) -> DeskResult<()> {
        (**self).remove(key)
    }
}

impl<T: SessionStore + ?Sized> SessionStore for Box<T> {
    fn load(&self, key: &str) -> DeskResult<Option<String>> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> DeskResult<()> {
        (**self).save(key, value)
    }

    fn remove(&self, key: &str) -> DeskResult<()> {
        (**self).remove(key)
    }
}
