//! Key-value persistence for preferences.

use crate::db::migrations::latest_version;
use crate::db::{DbError, DbResult};
use crate::repo::entity_repo::table_exists;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

/// Raw JSON key-value contract behind `SettingsService`.
pub trait SettingsStore {
    fn get_raw(&self, key: &str) -> DbResult<Option<String>>;
    /// Writes every entry in one transaction.
    fn set_raw_many(&self, entries: &[(&'static str, String)]) -> DbResult<()>;
    fn remove(&self, key: &str) -> DbResult<()>;

    fn set_raw(&self, key: &'static str, value_json: String) -> DbResult<()> {
        self.set_raw_many(&[(key, value_json)])
    }
}

/// SQLite-backed preferences table.
pub struct SqliteSettingsStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSettingsStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> DbResult<Self> {
        let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(DbError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        if !table_exists(conn, "settings")? {
            return Err(DbError::MissingRequiredTable("settings"));
        }
        Ok(Self { conn })
    }
}

impl SettingsStore for SqliteSettingsStore<'_> {
    fn get_raw(&self, key: &str) -> DbResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value_json FROM settings WHERE setting_key = ?1;",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_raw_many(&self, entries: &[(&'static str, String)]) -> DbResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for (key, value_json) in entries {
            tx.execute(
                "INSERT INTO settings (setting_key, value_json)
                 VALUES (?1, ?2)
                 ON CONFLICT (setting_key) DO UPDATE SET
                     value_json = excluded.value_json,
                     updated_at = (strftime('%s', 'now') * 1000);",
                params![key, value_json],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> DbResult<()> {
        self.conn
            .execute("DELETE FROM settings WHERE setting_key = ?1;", [key])?;
        Ok(())
    }
}
