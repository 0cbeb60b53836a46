// src/db/models.rs

//! Data models for layoutkit database entities

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value;

/// A stored preference: one JSON value under a unique key
#[derive(Debug, Clone, PartialEq)]
pub struct Preference {
    pub key: String,
    pub value: Value,
    pub updated_at: String,
}

impl Preference {
    /// Find a preference by key
    pub fn find(conn: &Connection, key: &str) -> Result<Option<Self>> {
        let mut stmt =
            conn.prepare("SELECT key, value, updated_at FROM preferences WHERE key = ?1")?;

        let preference = stmt.query_row([key], Self::from_row).optional()?;

        Ok(preference)
    }

    /// Insert or replace the value stored under `key`
    pub fn upsert(conn: &Connection, key: &str, value: &Value) -> Result<()> {
        let encoded = serde_json::to_string(value)?;
        let updated_at = chrono::Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO preferences (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, encoded, updated_at],
        )?;

        Ok(())
    }

    /// Delete a preference by key
    pub fn delete(conn: &Connection, key: &str) -> Result<()> {
        conn.execute("DELETE FROM preferences WHERE key = ?1", [key])?;
        Ok(())
    }

    /// List all preferences ordered by key
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT key, value, updated_at FROM preferences ORDER BY key")?;

        let preferences = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(preferences)
    }

    /// Convert a database row to a Preference
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let encoded: String = row.get(1)?;
        let value = serde_json::from_str(&encoded).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Self {
            key: row.get(0)?,
            value,
            updated_at: row.get(2)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use serde_json::json;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn test_preference_crud() {
        let conn = create_test_db();

        assert!(Preference::find(&conn, "layout.dynamic-installed").unwrap().is_none());

        Preference::upsert(&conn, "layout.dynamic-installed", &json!(["de"])).unwrap();
        let found = Preference::find(&conn, "layout.dynamic-installed").unwrap().unwrap();
        assert_eq!(found.value, json!(["de"]));
        assert!(!found.updated_at.is_empty());

        // Upsert replaces rather than duplicating
        Preference::upsert(&conn, "layout.dynamic-installed", &json!(["de", "fr"])).unwrap();
        let all = Preference::list_all(&conn).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].value, json!(["de", "fr"]));

        Preference::delete(&conn, "layout.dynamic-installed").unwrap();
        assert!(Preference::find(&conn, "layout.dynamic-installed").unwrap().is_none());
    }

    #[test]
    fn test_list_all_sorted_by_key() {
        let conn = create_test_db();

        Preference::upsert(&conn, "b", &json!(1)).unwrap();
        Preference::upsert(&conn, "a", &json!(false)).unwrap();

        let keys: Vec<String> = Preference::list_all(&conn)
            .unwrap()
            .into_iter()
            .map(|p| p.key)
            .collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_corrupt_value_is_an_error() {
        let conn = create_test_db();

        conn.execute(
            "INSERT INTO preferences (key, value, updated_at) VALUES ('k', 'not json', 'now')",
            [],
        )
        .unwrap();

        let result = Preference::find(&conn, "k");
        assert!(result.is_err());
        assert!(result.unwrap_err().is_store_error());
    }
}
