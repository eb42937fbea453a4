//! Vector index: upsert, filtered cosine KNN, and global clear.
//!
//! [`SqliteVecIndex`] keeps one row per [`IndexEntry`] in the `insights`
//! table. Filters are applied in SQL before ranking, so a query scoped to one
//! owner and source type can never return rows outside that scope.

use std::sync::Mutex;

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::{ServiceError, ServiceResult};
use crate::memory::types::{
    EvidenceMatch, EvidenceResult, IndexEntry, InsightRecord, SourceType,
};

/// Equality constraints applied to every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexFilter {
    pub owner_id: String,
    pub source_type: SourceType,
}

impl IndexFilter {
    pub fn new(owner_id: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            owner_id: owner_id.into(),
            source_type,
        }
    }
}

/// Trait for the vector store the pipeline writes to and reads from.
///
/// All methods are synchronous; async callers should use
/// `tokio::task::spawn_blocking`.
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite entries by id. A batch is applied atomically.
    fn upsert(&self, entries: &[IndexEntry]) -> ServiceResult<()>;

    /// Drop every entry of one owner's source, then write `entries`, atomically.
    /// Returns the number of entries removed.
    fn replace_source(
        &self,
        owner_id: &str,
        source_type: SourceType,
        source_ref: &str,
        entries: &[IndexEntry],
    ) -> ServiceResult<usize>;

    /// Up to `top_k` entries matching `filter`, by descending cosine similarity.
    fn query(&self, vector: &[f32], top_k: usize, filter: &IndexFilter)
        -> ServiceResult<EvidenceResult>;

    /// Remove every entry for every owner. Returns the number removed.
    fn clear_all(&self) -> ServiceResult<usize>;

    fn count(&self) -> ServiceResult<usize>;

    fn dimensions(&self) -> usize;
}

/// sqlite-vec backed [`VectorIndex`].
pub struct SqliteVecIndex {
    conn: Mutex<Connection>,
    dimensions: usize,
}

impl SqliteVecIndex {
    /// Wrap a connection whose schema has already been initialized
    /// (see [`crate::db::open_database`]).
    pub fn new(conn: Connection, dimensions: usize) -> Self {
        Self {
            conn: Mutex::new(conn),
            dimensions,
        }
    }

    fn lock(&self) -> ServiceResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ServiceError::Poisoned(format!("index connection: {e}")))
    }

    fn check_dimensions(&self, vector: &[f32]) -> ServiceResult<()> {
        if vector.len() != self.dimensions {
            return Err(ServiceError::Dimension {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl VectorIndex for SqliteVecIndex {
    fn upsert(&self, entries: &[IndexEntry]) -> ServiceResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        for entry in entries {
            self.check_dimensions(&entry.vector)?;
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        write_entries(&tx, entries)?;
        tx.commit()?;

        tracing::debug!(entries = entries.len(), "upserted index entries");
        Ok(())
    }

    fn replace_source(
        &self,
        owner_id: &str,
        source_type: SourceType,
        source_ref: &str,
        entries: &[IndexEntry],
    ) -> ServiceResult<usize> {
        for entry in entries {
            self.check_dimensions(&entry.vector)?;
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM insights WHERE owner_id = ?1 AND source_type = ?2 AND source_ref = ?3",
            params![owner_id, source_type.as_str(), source_ref],
        )?;
        write_entries(&tx, entries)?;
        tx.commit()?;

        tracing::debug!(
            source_ref = %source_ref,
            removed,
            written = entries.len(),
            "replaced source entries"
        );
        Ok(removed)
    }

    fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &IndexFilter,
    ) -> ServiceResult<EvidenceResult> {
        self.check_dimensions(vector)?;
        if top_k == 0 {
            return Ok(EvidenceResult::default());
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, source_type, source_ref, item, context, message, \
                    vec_distance_cosine(embedding, ?1) AS distance \
             FROM insights \
             WHERE owner_id = ?2 AND source_type = ?3 \
             ORDER BY distance ASC, id ASC \
             LIMIT ?4",
        )?;

        let matches = stmt
            .query_map(
                params![
                    super::embedding_to_bytes(vector),
                    filter.owner_id,
                    filter.source_type.as_str(),
                    top_k as i64,
                ],
                |row| {
                    let distance: f64 = row.get(7)?;
                    Ok(EvidenceMatch {
                        id: row.get(0)?,
                        score: 1.0 - distance,
                        metadata: InsightRecord {
                            owner_id: row.get(1)?,
                            // Constrained by the WHERE clause and the table CHECK.
                            source_type: filter.source_type,
                            source_ref: row.get(3)?,
                            item: row.get(4)?,
                            context: row.get(5)?,
                            source_message: row.get(6)?,
                        },
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            owner = %filter.owner_id,
            source_type = %filter.source_type,
            hits = matches.len(),
            "index query"
        );
        Ok(EvidenceResult { matches })
    }

    fn clear_all(&self) -> ServiceResult<usize> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM insights", [])?;
        tracing::warn!(removed, "cleared all index entries");
        Ok(removed)
    }

    fn count(&self) -> ServiceResult<usize> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM insights", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn write_entries(tx: &rusqlite::Transaction<'_>, entries: &[IndexEntry]) -> ServiceResult<()> {
    let now = chrono::Utc::now().to_rfc3339();
    let mut stmt = tx.prepare(
        "INSERT INTO insights (id, owner_id, source_type, source_ref, item, context, message, embedding, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9) \
         ON CONFLICT(id) DO UPDATE SET \
            owner_id = excluded.owner_id, \
            source_type = excluded.source_type, \
            source_ref = excluded.source_ref, \
            item = excluded.item, \
            context = excluded.context, \
            message = excluded.message, \
            embedding = excluded.embedding, \
            updated_at = excluded.updated_at",
    )?;
    for entry in entries {
        let meta = &entry.metadata;
        stmt.execute(params![
            entry.id,
            meta.owner_id,
            meta.source_type.as_str(),
            meta.source_ref,
            meta.item,
            meta.context,
            meta.source_message,
            super::embedding_to_bytes(&entry.vector),
            now,
        ])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::entry_id;

    const DIM: usize = 8;

    fn test_index() -> SqliteVecIndex {
        SqliteVecIndex::new(crate::db::open_memory_database().unwrap(), DIM)
    }

    fn axis(i: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; DIM];
        v[i] = 1.0;
        v
    }

    fn entry(source_ref: &str, seq: usize, owner: &str, st: SourceType, item: &str, v: Vec<f32>) -> IndexEntry {
        IndexEntry {
            id: entry_id(source_ref, seq),
            vector: v,
            metadata: InsightRecord {
                item: item.into(),
                context: "somewhere".into(),
                source_message: format!("where is my {item}"),
                owner_id: owner.into(),
                source_type: st,
                source_ref: source_ref.into(),
            },
        }
    }

    #[test]
    fn query_ranks_by_cosine_similarity() {
        let index = test_index();
        let mut close = axis(0);
        close[1] = 0.2;
        index
            .upsert(&[
                entry("c1", 0, "u1", SourceType::Message, "far", axis(3)),
                entry("c1", 1, "u1", SourceType::Message, "exact", axis(0)),
                entry("c1", 2, "u1", SourceType::Message, "close", close),
            ])
            .unwrap();

        let result = index
            .query(&axis(0), 3, &IndexFilter::new("u1", SourceType::Message))
            .unwrap();
        let items: Vec<&str> = result.records().map(|r| r.item.as_str()).collect();
        assert_eq!(items, vec!["exact", "close", "far"]);
        assert!((result.matches[0].score - 1.0).abs() < 1e-6);
        assert!(result.matches[0].score >= result.matches[1].score);
    }

    #[test]
    fn query_respects_top_k() {
        let index = test_index();
        let entries: Vec<_> = (0..5)
            .map(|i| entry("c", i, "u1", SourceType::Message, "x", axis(i)))
            .collect();
        index.upsert(&entries).unwrap();
        let result = index
            .query(&axis(0), 2, &IndexFilter::new("u1", SourceType::Message))
            .unwrap();
        assert_eq!(result.len(), 2);
        assert!(index
            .query(&axis(0), 0, &IndexFilter::new("u1", SourceType::Message))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let index = test_index();
        let err = index
            .upsert(&[entry("c", 0, "u1", SourceType::Message, "x", vec![1.0; DIM + 1])])
            .unwrap_err();
        assert!(matches!(err, ServiceError::Dimension { expected: DIM, actual: 9 }));
        assert!(index
            .query(&[1.0, 0.0], 1, &IndexFilter::new("u1", SourceType::Image))
            .is_err());
    }

    #[test]
    fn clear_all_removes_every_owner() {
        let index = test_index();
        index
            .upsert(&[
                entry("a", 0, "u1", SourceType::Message, "x", axis(0)),
                entry("b", 0, "u2", SourceType::Image, "y", axis(1)),
            ])
            .unwrap();
        assert_eq!(index.count().unwrap(), 2);
        assert_eq!(index.clear_all().unwrap(), 2);
        assert_eq!(index.count().unwrap(), 0);
    }

    #[test]
    fn replace_source_drops_stale_entries_of_that_source_only() {
        let index = test_index();
        index
            .upsert(&[
                entry("c1", 0, "u1", SourceType::Message, "keys", axis(0)),
                entry("c1", 1, "u1", SourceType::Message, "wallet", axis(1)),
                entry("c2", 0, "u1", SourceType::Message, "phone", axis(2)),
            ])
            .unwrap();

        let removed = index
            .replace_source(
                "u1",
                SourceType::Message,
                "c1",
                &[entry("c1", 0, "u1", SourceType::Message, "keys", axis(3))],
            )
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(index.count().unwrap(), 2);

        let items: Vec<String> = index
            .query(&axis(1), 10, &IndexFilter::new("u1", SourceType::Message))
            .unwrap()
            .records()
            .map(|r| r.item.clone())
            .collect();
        assert!(!items.contains(&"wallet".to_string()));
        assert!(items.contains(&"phone".to_string()));
    }
}
