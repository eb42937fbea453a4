//! SQL DDL for the vector index tables.
//!
//! Defines `insights` (one row per indexed record, embedding stored as a
//! sqlite-vec float32 blob) and `schema_meta`. All DDL uses `IF NOT EXISTS`
//! for idempotent initialization.

use rusqlite::Connection;

/// The schema version that the current binary writes.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS insights (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    source_type TEXT NOT NULL CHECK(source_type IN ('message','image')),
    source_ref TEXT NOT NULL,
    item TEXT NOT NULL,
    context TEXT NOT NULL,
    message TEXT NOT NULL,
    embedding BLOB NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_insights_owner_type ON insights(owner_id, source_type);
CREATE INDEX IF NOT EXISTS idx_insights_source_ref ON insights(source_ref);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// Get the current schema version from the database.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

/// Get the stored embedding model identifier, if any.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    match conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'embedding_model'",
        [],
        |row| row.get::<_, String>(0),
    ) {
        Ok(val) => Ok(Some(val)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Record the embedding model the stored vectors were produced with.
/// Keeps the first recorded value; returns it.
pub fn record_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<String> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        [model],
    )?;
    Ok(get_embedding_model(conn)?.unwrap_or_else(|| model.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn schema_creates_all_tables() {
        let conn = test_conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"insights".to_string()));
        assert!(tables.contains(&"schema_meta".to_string()));

        let version: String = conn
            .query_row("SELECT vec_version()", [], |r| r.get(0))
            .unwrap();
        assert!(!version.is_empty());
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = test_conn();
        init_schema(&conn).unwrap(); // second call should not error
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn first_recorded_embedding_model_wins() {
        let conn = test_conn();
        assert!(get_embedding_model(&conn).unwrap().is_none());
        assert_eq!(
            record_embedding_model(&conn, "clip-vit-base-patch32").unwrap(),
            "clip-vit-base-patch32"
        );
        assert_eq!(
            record_embedding_model(&conn, "other-model").unwrap(),
            "clip-vit-base-patch32"
        );
    }

    #[test]
    fn source_type_check_rejects_unknown_values() {
        let conn = test_conn();
        let result = conn.execute(
            "INSERT INTO insights (id, owner_id, source_type, source_ref, item, context, message, embedding, created_at, updated_at) \
             VALUES ('x', 'u', 'video', 'r', 'i', 'c', 'm', x'00', 't', 't')",
            [],
        );
        assert!(result.is_err());
    }
}
