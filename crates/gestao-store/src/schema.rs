// gestao-store/src/schema.rs
// ============================================================================
// Module: Live Schema Inspection
// Description: Column discovery and the process-wide schema cache.
// Purpose: Answer "which columns exist on table T right now?".
// Dependencies: rusqlite, tracing
// ============================================================================

//! ## Overview
//! [`columns_of`] reads a table's columns through `SQLite`'s own metadata
//! (`pragma_table_info`). A missing table is not an error here: it yields an
//! empty [`LiveSchema`] and callers decide what absence means.
//!
//! [`SchemaCache`] keeps the last observed schema per table behind a
//! read-write lock. It is only invalidated explicitly (administrative
//! migrations), never on a timer, and never stores empty schemas so that a
//! table created later is picked up on the next read.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use rusqlite::Connection;
use rusqlite::params;

use crate::error::StoreError;

// ============================================================================
// SECTION: Live Schema
// ============================================================================

/// Column set of a storage table at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSchema {
    /// Table name.
    table: String,
    /// Existing column names.
    columns: BTreeSet<String>,
}

impl LiveSchema {
    /// Creates a schema from an explicit column list.
    #[must_use]
    pub fn new<I, S>(table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates the empty schema reported for a missing table.
    #[must_use]
    pub fn empty(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: BTreeSet::new(),
        }
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the column names.
    #[must_use]
    pub const fn columns(&self) -> &BTreeSet<String> {
        &self.columns
    }

    /// Returns true when `column` exists.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    /// Returns the names from `fields` that exist, preserving their order.
    pub fn intersect<'a, I>(&self, fields: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        fields.into_iter().filter(|field| self.columns.contains(*field)).collect()
    }

    /// Returns true when no column exists (missing table).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// ============================================================================
// SECTION: Inspector
// ============================================================================

/// Returns the columns currently present on `table`.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] for an empty table name and
/// [`StoreError::Db`] when the metadata query itself fails. A missing table is
/// reported as an empty schema.
pub fn columns_of(connection: &Connection, table: &str) -> Result<LiveSchema, StoreError> {
    if table.trim().is_empty() {
        return Err(StoreError::Invalid("table name must not be empty".to_string()));
    }
    let mut statement = connection
        .prepare("SELECT name FROM pragma_table_info(?1)")
        .map_err(|err| StoreError::Db(err.to_string()))?;
    let rows = statement
        .query_map(params![table], |row| row.get::<_, String>(0))
        .map_err(|err| StoreError::Db(err.to_string()))?;
    let mut columns = BTreeSet::new();
    for row in rows {
        columns.insert(row.map_err(|err| StoreError::Db(err.to_string()))?);
    }
    Ok(LiveSchema {
        table: table.to_string(),
        columns,
    })
}

/// Returns true when `table` exists in `sqlite_master`.
///
/// # Errors
///
/// Returns [`StoreError::Db`] when the lookup fails.
pub fn table_exists(connection: &Connection, table: &str) -> Result<bool, StoreError> {
    let count: i64 = connection
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )
        .map_err(|err| StoreError::Db(err.to_string()))?;
    Ok(count > 0)
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Process-wide cache of live schemas keyed by table name.
///
/// # Invariants
/// - Concurrent readers never block each other.
/// - Entries change only through [`SchemaCache::insert`] and the explicit
///   invalidation methods.
/// - Empty schemas are never cached.
#[derive(Debug, Default)]
pub struct SchemaCache {
    /// Cached schemas.
    entries: RwLock<HashMap<String, Arc<LiveSchema>>>,
}

impl SchemaCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached schema for `table`.
    #[must_use]
    pub fn get(&self, table: &str) -> Option<Arc<LiveSchema>> {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(table).cloned()
    }

    /// Stores `schema` and returns the shared handle. Empty schemas are
    /// returned without being stored.
    pub fn insert(&self, schema: LiveSchema) -> Arc<LiveSchema> {
        let schema = Arc::new(schema);
        if schema.is_empty() {
            return schema;
        }
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(schema.table.clone(), Arc::clone(&schema));
        schema
    }

    /// Drops the cached schema for `table`. Returns true when an entry existed.
    pub fn invalidate(&self, table: &str) -> bool {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        guard.remove(table).is_some()
    }

    /// Drops every cached schema and returns how many were removed.
    pub fn invalidate_all(&self) -> usize {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let removed = guard.len();
        guard.clear();
        removed
    }

    /// Returns the number of cached tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::panic,
        reason = "Test assertions use unwrap/panic for clarity."
    )]

    use std::sync::Arc;
    use std::thread;

    use rusqlite::Connection;

    use super::LiveSchema;
    use super::SchemaCache;
    use super::columns_of;
    use super::table_exists;
    use crate::error::StoreError;

    #[test]
    fn columns_of_reports_existing_columns() {
        let connection = Connection::open_in_memory().unwrap();
        connection.execute_batch("CREATE TABLE teams (id INTEGER PRIMARY KEY, nome TEXT);").unwrap();
        let schema = columns_of(&connection, "teams").unwrap();
        assert!(schema.contains("id"));
        assert!(schema.contains("nome"));
        assert_eq!(schema.columns().len(), 2);
        assert_eq!(schema.intersect(["nome", "ativo", "id"]), vec!["nome", "id"]);
    }

    #[test]
    fn columns_of_missing_table_is_empty() {
        let connection = Connection::open_in_memory().unwrap();
        let schema = columns_of(&connection, "nonexistent_table").unwrap();
        assert!(schema.is_empty());
        assert!(!table_exists(&connection, "nonexistent_table").unwrap());
    }

    #[test]
    fn columns_of_treats_hostile_name_as_data() {
        let connection = Connection::open_in_memory().unwrap();
        connection.execute_batch("CREATE TABLE teams (id INTEGER PRIMARY KEY);").unwrap();
        let schema = columns_of(&connection, "teams); DROP TABLE teams; --").unwrap();
        assert!(schema.is_empty());
        assert!(table_exists(&connection, "teams").unwrap());
    }

    #[test]
    fn columns_of_rejects_blank_name() {
        let connection = Connection::open_in_memory().unwrap();
        assert!(matches!(columns_of(&connection, "  "), Err(StoreError::Invalid(_))));
    }

    #[test]
    fn cache_skips_empty_schemas_and_invalidates_explicitly() {
        let cache = SchemaCache::new();
        cache.insert(LiveSchema::empty("ghost"));
        assert!(cache.get("ghost").is_none());
        cache.insert(LiveSchema::new("teams", ["id", "nome"]));
        cache.insert(LiveSchema::new("areas", ["id"]));
        assert_eq!(cache.len(), 2);
        assert!(cache.invalidate("teams"));
        assert!(!cache.invalidate("teams"));
        assert_eq!(cache.invalidate_all(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_serves_concurrent_readers() {
        let cache = Arc::new(SchemaCache::new());
        cache.insert(LiveSchema::new("teams", ["id", "nome"]));
        let handles: Vec<_> = (0 .. 8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get("teams").map(|schema| schema.columns().len()))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some(2));
        }
    }
}
