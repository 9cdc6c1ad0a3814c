// gestao-store/src/store.rs
// ============================================================================
// Module: SQLite Record Store
// Description: Executes schema-tolerant statements against SQLite.
// Purpose: Wire inspector, builder, and normalizer to a live connection.
// Dependencies: base64, rusqlite, serde, serde_json, time, tracing
// ============================================================================

//! ## Overview
//! [`SqliteRecordStore`] runs the inspect → build → execute → normalize
//! pipeline for each call. Reads consult the [`SchemaCache`]; writes re-read
//! the live schema when `fresh_on_write` is set so that a column added by a
//! migration is never silently skipped.
//!
//! Updates, deletes, and flag toggles probe the key and execute inside one
//! transaction; a key that does not resolve to exactly one row leaves
//! storage untouched.
//!
//! Security posture: database contents are untrusted; only identifiers from
//! the live schema or a validated descriptor are ever interpolated into SQL.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::Row;
use rusqlite::ToSql;
use rusqlite::params_from_iter;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Number;
use serde_json::Value;
use time::OffsetDateTime;

use crate::Record;
use crate::builder;
use crate::builder::BindValue;
use crate::builder::SelectStatement;
use crate::builder::SkipReport;
use crate::builder::Statement;
use crate::builder::UpdatePlan;
use crate::defaults;
use crate::defaults::WriteKind;
use crate::descriptor::EntityDescriptor;
use crate::diagnostics::DiagnosticEvent;
use crate::diagnostics::DiagnosticKind;
use crate::diagnostics::DiagnosticSink;
use crate::error::StoreError;
use crate::normalizer;
use crate::schema;
use crate::schema::LiveSchema;
use crate::schema::SchemaCache;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default `SQLite` busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Live schema cache policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaCacheConfig {
    /// Serve reads from the cache.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Force a fresh schema read before every write.
    #[serde(default = "default_true")]
    pub fresh_on_write: bool,
}

impl Default for SchemaCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fresh_on_write: true,
        }
    }
}

/// Configuration for the `SQLite` record store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Live schema cache policy.
    #[serde(default)]
    pub schema_cache: SchemaCacheConfig,
    /// Backfill declared defaults on insert.
    #[serde(default = "default_true")]
    pub insert_defaults: bool,
}

impl SqliteStoreConfig {
    /// Returns a configuration for `path` with default settings.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
            schema_cache: SchemaCacheConfig::default(),
            insert_defaults: true,
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns `true` for serde boolean defaults.
const fn default_true() -> bool {
    true
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Result of a successful insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertOutcome {
    /// Primary key of the new row.
    pub id: Value,
    /// Fields dropped by the live schema.
    pub skip_report: SkipReport,
}

/// Result of an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    /// False when nothing persistable was requested (no-op).
    pub updated: bool,
    /// Fields dropped by the live schema.
    pub skip_report: SkipReport,
}

/// Row count for one distinct value of a grouped column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupCount {
    /// Column value.
    pub value: Value,
    /// Number of rows with that value.
    pub count: u64,
}

/// Aggregate counts for an entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySummary {
    /// Logical entity name.
    pub entity: String,
    /// Total rows.
    pub total: u64,
    /// Rows with the active flag set, when the flag column exists.
    pub active: Option<u64>,
    /// Rows with the active flag cleared, when the flag column exists.
    pub inactive: Option<u64>,
    /// Counts per grouping column that exists on the table.
    pub groups: BTreeMap<String, Vec<GroupCount>>,
}

/// Differences between a descriptor and its live table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDrift {
    /// Logical entity name.
    pub entity: String,
    /// Backing table name.
    pub table: String,
    /// Whether the table exists.
    pub table_exists: bool,
    /// Known fields absent from the table.
    pub missing_fields: Vec<String>,
    /// Passthrough columns absent from the table.
    pub missing_passthrough: Vec<String>,
    /// Table columns the descriptor does not declare.
    pub unmanaged_columns: Vec<String>,
}

impl SchemaDrift {
    /// Returns true when the table exists with every expected column.
    #[must_use]
    pub fn is_aligned(&self) -> bool {
        self.table_exists && self.missing_fields.is_empty() && self.missing_passthrough.is_empty()
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Schema-tolerant record store backed by `SQLite`.
///
/// # Invariants
/// - Statements bind only fields present in the live schema.
/// - A key-addressed write never touches storage unless the key resolves to
///   exactly one row.
#[derive(Clone)]
pub struct SqliteRecordStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared connection.
    connection: Arc<Mutex<Connection>>,
    /// Process-wide live schema cache.
    cache: Arc<SchemaCache>,
    /// Diagnostic sink.
    sink: Arc<dyn DiagnosticSink>,
}

impl fmt::Debug for SqliteRecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteRecordStore")
            .field("config", &self.config)
            .field("cached_tables", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl SqliteRecordStore {
    /// Opens an `SQLite`-backed record store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the path is unsafe or the database cannot
    /// be opened.
    pub fn open(config: SqliteStoreConfig, sink: Arc<dyn DiagnosticSink>) -> Result<Self, StoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let connection = open_connection(&config)?;
        tracing::info!(path = %config.path.display(), "record store opened");
        Ok(Self::from_connection(config, connection, sink))
    }

    /// Opens an existing database for inspection only.
    ///
    /// A missing file is an error instead of a fresh empty database, and any
    /// write through the returned handle fails with [`StoreError::Db`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the database file does not exist and
    /// [`StoreError::Db`] when it cannot be opened.
    pub fn open_read_only(config: SqliteStoreConfig, sink: Arc<dyn DiagnosticSink>) -> Result<Self, StoreError> {
        validate_store_path(&config.path)?;
        if !config.path.is_file() {
            return Err(StoreError::Io(format!("store database not found: {}", config.path.display())));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let connection = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
        connection
            .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
            .map_err(db_error)?;
        tracing::info!(path = %config.path.display(), "record store opened read-only");
        Ok(Self::from_connection(config, connection, sink))
    }

    /// Opens a private in-memory store (used by tests and dry runs).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Db`] when `SQLite` cannot allocate the database.
    pub fn in_memory(sink: Arc<dyn DiagnosticSink>) -> Result<Self, StoreError> {
        let config = SqliteStoreConfig::new(":memory:");
        let connection = Connection::open_in_memory().map_err(|err| StoreError::Db(err.to_string()))?;
        apply_pragmas(&connection, &config)?;
        Ok(Self::from_connection(config, connection, sink))
    }

    /// Wraps an opened connection.
    fn from_connection(
        config: SqliteStoreConfig,
        connection: Connection,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
            cache: Arc::new(SchemaCache::new()),
            sink,
        }
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Returns the shared schema cache.
    #[must_use]
    pub fn schema_cache(&self) -> &SchemaCache {
        &self.cache
    }

    // ------------------------------------------------------------------------
    // Schema
    // ------------------------------------------------------------------------

    /// Returns the live columns of `table`, consulting the cache.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the metadata query fails.
    pub fn columns_of(&self, table: &str) -> Result<Arc<LiveSchema>, StoreError> {
        let guard = self.lock()?;
        self.live_schema(&guard, table, false)
    }

    /// Returns true when `table` exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    pub fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        let guard = self.lock()?;
        schema::table_exists(&guard, table)
    }

    /// Drops cached schemas for `table`, or for every table when `None`.
    /// Returns the number of entries removed.
    pub fn invalidate_schema(&self, table: Option<&str>) -> usize {
        let removed = match table {
            Some(table) => usize::from(self.cache.invalidate(table)),
            None => self.cache.invalidate_all(),
        };
        let scope = table.unwrap_or("*");
        tracing::info!(scope, removed, "schema cache invalidated");
        self.emit(
            DiagnosticEvent::new(DiagnosticKind::SchemaInvalidated, scope, Vec::new())
                .with_detail(format!("removed {removed}")),
        );
        removed
    }

    /// Executes an administrative migration batch in one transaction and
    /// invalidates every cached schema. Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Db`] when the batch fails; nothing is applied.
    pub fn apply_migration(&self, sql: &str) -> Result<usize, StoreError> {
        if sql.trim().is_empty() {
            return Err(StoreError::Invalid("migration must not be empty".to_string()));
        }
        {
            let mut guard = self.lock()?;
            let tx = guard.transaction().map_err(db_error)?;
            tx.execute_batch(sql).map_err(db_error)?;
            tx.commit().map_err(db_error)?;
        }
        Ok(self.invalidate_schema(None))
    }

    /// Reports how `descriptor` differs from its live table (uncached).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the metadata query fails.
    pub fn drift(&self, descriptor: &EntityDescriptor) -> Result<SchemaDrift, StoreError> {
        let live = {
            let guard = self.lock()?;
            schema::columns_of(&guard, descriptor.table())?
        };
        let missing_fields = descriptor
            .known_fields()
            .iter()
            .map(|field| field.name().to_string())
            .filter(|name| !live.contains(name))
            .collect();
        let missing_passthrough = descriptor
            .passthrough_columns()
            .iter()
            .filter(|name| !live.contains(name))
            .cloned()
            .collect();
        let expected = descriptor.expected_columns();
        let unmanaged_columns = live
            .columns()
            .iter()
            .filter(|column| !expected.contains(&column.as_str()))
            .cloned()
            .collect();
        Ok(SchemaDrift {
            entity: descriptor.name().to_string(),
            table: descriptor.table().to_string(),
            table_exists: !live.is_empty(),
            missing_fields,
            missing_passthrough,
            unmanaged_columns,
        })
    }

    /// Verifies the connection can execute a trivial statement.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the connection is unusable.
    pub fn readiness(&self) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).map_err(db_error)?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Lists normalized records matching `filters`.
    ///
    /// Filter keys absent from the table are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownTable`] when the table is missing.
    pub fn list(&self, descriptor: &EntityDescriptor, filters: &Record) -> Result<Vec<Record>, StoreError> {
        let guard = self.lock()?;
        let live = self.live_schema(&guard, descriptor.table(), false)?;
        self.require_table(descriptor, &live)?;
        self.report_missing_columns(descriptor, &live);
        let select = builder::build_select(descriptor, &live, filters)?;
        if !select.ignored_filters.is_empty() {
            self.emit(
                DiagnosticEvent::new(
                    DiagnosticKind::FieldsSkipped,
                    descriptor.name(),
                    select.ignored_filters.clone(),
                )
                .with_detail("filter"),
            );
        }
        let rows = query_records(&guard, &select)?;
        drop(guard);
        Ok(rows.into_iter().map(|row| self.normalize_row(descriptor, row)).collect())
    }

    /// Fetches one normalized record by primary key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RecordNotFound`] when no row matches and
    /// [`StoreError::UnknownTable`] when the table is missing.
    pub fn get(&self, descriptor: &EntityDescriptor, key: &Value) -> Result<Record, StoreError> {
        let guard = self.lock()?;
        let live = self.live_schema(&guard, descriptor.table(), false)?;
        self.require_table(descriptor, &live)?;
        self.report_missing_columns(descriptor, &live);
        let select = builder::build_select_by_key(descriptor, &live, key)?;
        let row = query_records(&guard, &select)?.into_iter().next();
        drop(guard);
        row.map(|row| self.normalize_row(descriptor, row))
            .ok_or_else(|| not_found(descriptor, key))
    }

    /// Counts rows and groups them by the descriptor's grouping columns.
    ///
    /// Missing flag or grouping columns are skipped, not errors.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownTable`] when the table is missing.
    pub fn summarize(&self, descriptor: &EntityDescriptor) -> Result<EntitySummary, StoreError> {
        let guard = self.lock()?;
        let live = self.live_schema(&guard, descriptor.table(), false)?;
        self.require_table(descriptor, &live)?;
        let total = query_count(&guard, &builder::build_count(descriptor, None))?;
        let (active, inactive) = match descriptor.active_flag().filter(|flag| live.contains(flag)) {
            Some(flag) => {
                let active =
                    query_count(&guard, &builder::build_count(descriptor, Some((flag, BindValue::Integer(1)))))?;
                (Some(active), Some(total.saturating_sub(active)))
            }
            None => (None, None),
        };
        let mut groups = BTreeMap::new();
        let mut missing = Vec::new();
        for column in descriptor.group_fields() {
            if !live.contains(column) {
                missing.push(column.clone());
                continue;
            }
            let counts = query_groups(&guard, &builder::build_group_count(descriptor, column))?;
            groups.insert(column.clone(), counts);
        }
        drop(guard);
        if !missing.is_empty() {
            self.emit(
                DiagnosticEvent::new(DiagnosticKind::ColumnMissing, descriptor.name(), missing)
                    .with_detail("summary"),
            );
        }
        Ok(EntitySummary {
            entity: descriptor.name().to_string(),
            total,
            active,
            inactive,
            groups,
        })
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Inserts `record`, persisting only fields the table has.
    ///
    /// Declared defaults are backfilled for live columns the caller left out
    /// when `insert_defaults` is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownTable`] when the table is missing and
    /// [`StoreError::NoPersistableFields`] when no requested field exists.
    pub fn insert(&self, descriptor: &EntityDescriptor, record: Record) -> Result<InsertOutcome, StoreError> {
        let guard = self.lock()?;
        let live = self.live_schema(&guard, descriptor.table(), self.config.schema_cache.fresh_on_write)?;
        self.require_table(descriptor, &live)?;
        let skip_report = builder::insert_skip_report(&live, &record);
        if skip_report.persisted_field_count == 0 {
            self.report_skips(descriptor, &skip_report);
            return Err(StoreError::NoPersistableFields {
                entity: descriptor.name().to_string(),
                requested: record.keys().cloned().collect(),
            });
        }
        let mut prepared = record;
        if self.config.insert_defaults {
            defaults::backfill_insert_defaults(descriptor, &live, &mut prepared);
        }
        defaults::stamp_timestamps(descriptor, &live, &mut prepared, OffsetDateTime::now_utc(), WriteKind::Insert)?;
        let (statement, _) = builder::build_insert(descriptor, &live, &prepared)?;
        execute(&guard, &statement)?;
        let id = prepared
            .get(descriptor.primary_key())
            .filter(|value| !value.is_null())
            .cloned()
            .unwrap_or_else(|| Value::from(guard.last_insert_rowid()));
        drop(guard);
        self.report_skips(descriptor, &skip_report);
        Ok(InsertOutcome {
            id,
            skip_report,
        })
    }

    /// Updates the row identified by `key` with the persistable part of
    /// `record`.
    ///
    /// A request with no persistable field is a no-op (`updated == false`),
    /// still subject to the key existing. The primary key is never rewritten
    /// and `null` values leave their columns untouched; both are reported as
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RecordNotFound`] when `key` does not resolve to
    /// exactly one row and [`StoreError::UnknownTable`] when the table is
    /// missing. Storage is untouched in both cases.
    pub fn update(
        &self,
        descriptor: &EntityDescriptor,
        key: &Value,
        record: Record,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut guard = self.lock()?;
        let live = self.live_schema(&guard, descriptor.table(), self.config.schema_cache.fresh_on_write)?;
        self.require_table(descriptor, &live)?;
        require_primary_key(descriptor, &live)?;
        let skip_report = builder::update_skip_report(descriptor, &live, &record);
        let updated = {
            let tx = guard.transaction().map_err(db_error)?;
            probe_single_row(&tx, descriptor, key)?;
            let mut prepared = record;
            defaults::stamp_timestamps(
                descriptor,
                &live,
                &mut prepared,
                OffsetDateTime::now_utc(),
                WriteKind::Update,
            )?;
            match builder::build_update(descriptor, &live, key, &prepared)? {
                UpdatePlan::Execute {
                    statement, ..
                } => {
                    execute(&tx, &statement)?;
                    tx.commit().map_err(db_error)?;
                    true
                }
                UpdatePlan::Noop {
                    ..
                } => false,
            }
        };
        drop(guard);
        self.report_skips(descriptor, &skip_report);
        if !updated {
            self.emit(DiagnosticEvent::new(
                DiagnosticKind::NoopUpdate,
                descriptor.name(),
                skip_report.skipped_field_names.iter().cloned().collect(),
            ));
        }
        Ok(UpdateOutcome {
            updated,
            skip_report,
        })
    }

    /// Deletes the row identified by `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RecordNotFound`] when `key` does not resolve to
    /// exactly one row.
    pub fn delete(&self, descriptor: &EntityDescriptor, key: &Value) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let live = self.live_schema(&guard, descriptor.table(), self.config.schema_cache.fresh_on_write)?;
        self.require_table(descriptor, &live)?;
        require_primary_key(descriptor, &live)?;
        let tx = guard.transaction().map_err(db_error)?;
        probe_single_row(&tx, descriptor, key)?;
        execute(&tx, &builder::build_delete(descriptor, key)?)?;
        tx.commit().map_err(db_error)?;
        Ok(())
    }

    /// Flips the descriptor's active flag on the row identified by `key` and
    /// returns the new value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the entity has no active flag,
    /// [`StoreError::MissingColumn`] when the flag column is absent, and
    /// [`StoreError::RecordNotFound`] when the key does not resolve.
    pub fn toggle_flag(&self, descriptor: &EntityDescriptor, key: &Value) -> Result<bool, StoreError> {
        let Some(flag) = descriptor.active_flag() else {
            return Err(StoreError::Invalid(format!("{} has no active flag", descriptor.name())));
        };
        let mut guard = self.lock()?;
        let live = self.live_schema(&guard, descriptor.table(), self.config.schema_cache.fresh_on_write)?;
        self.require_table(descriptor, &live)?;
        require_primary_key(descriptor, &live)?;
        if !live.contains(flag) {
            return Err(StoreError::MissingColumn {
                table: descriptor.table().to_string(),
                column: flag.to_string(),
            });
        }
        let tx = guard.transaction().map_err(db_error)?;
        probe_single_row(&tx, descriptor, key)?;
        let mut filters = Record::new();
        filters.insert(descriptor.primary_key().to_string(), key.clone());
        let select = builder::build_select(descriptor, &live, &filters)?;
        let current = query_records(&tx, &select)?
            .into_iter()
            .next()
            .and_then(|mut row| row.remove(flag))
            .and_then(|value| truthy(&value))
            .or_else(|| descriptor.field(flag).and_then(|field| field.default_value().as_bool()))
            .unwrap_or(true);
        let mut change = Record::new();
        change.insert(flag.to_string(), Value::Bool(!current));
        defaults::stamp_timestamps(descriptor, &live, &mut change, OffsetDateTime::now_utc(), WriteKind::Update)?;
        if let UpdatePlan::Execute {
            statement, ..
        } = builder::build_update(descriptor, &live, key, &change)?
        {
            execute(&tx, &statement)?;
        }
        tx.commit().map_err(db_error)?;
        Ok(!current)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection.lock().map_err(|_| StoreError::Io("sqlite mutex poisoned".to_string()))
    }

    /// Returns the live schema, from the cache unless `fresh` is requested.
    fn live_schema(
        &self,
        connection: &Connection,
        table: &str,
        fresh: bool,
    ) -> Result<Arc<LiveSchema>, StoreError> {
        let policy = self.config.schema_cache;
        if policy.enabled
            && !fresh
            && let Some(cached) = self.cache.get(table)
        {
            return Ok(cached);
        }
        let live = schema::columns_of(connection, table)?;
        if policy.enabled {
            Ok(self.cache.insert(live))
        } else {
            Ok(Arc::new(live))
        }
    }

    /// Fails with [`StoreError::UnknownTable`] for an empty live schema.
    fn require_table(&self, descriptor: &EntityDescriptor, live: &LiveSchema) -> Result<(), StoreError> {
        if !live.is_empty() {
            return Ok(());
        }
        self.emit(DiagnosticEvent::new(
            DiagnosticKind::TableMissing,
            descriptor.name(),
            vec![descriptor.table().to_string()],
        ));
        Err(StoreError::UnknownTable(descriptor.table().to_string()))
    }

    /// Emits `column_missing` for known fields the table lacks.
    fn report_missing_columns(&self, descriptor: &EntityDescriptor, live: &LiveSchema) {
        let missing: Vec<String> = descriptor
            .known_fields()
            .iter()
            .map(|field| field.name().to_string())
            .filter(|name| !live.contains(name))
            .collect();
        if !missing.is_empty() {
            self.emit(DiagnosticEvent::new(DiagnosticKind::ColumnMissing, descriptor.name(), missing));
        }
    }

    /// Emits `fields_skipped` when a write dropped fields.
    fn report_skips(&self, descriptor: &EntityDescriptor, report: &SkipReport) {
        if report.has_skips() {
            self.emit(DiagnosticEvent::new(
                DiagnosticKind::FieldsSkipped,
                descriptor.name(),
                report.skipped_field_names.iter().cloned().collect(),
            ));
        }
    }

    /// Normalizes a raw row and emits its decode degradations.
    fn normalize_row(&self, descriptor: &EntityDescriptor, row: Record) -> Record {
        let normalized = normalizer::normalize(descriptor, row);
        for warning in normalized.warnings {
            self.emit(
                DiagnosticEvent::new(DiagnosticKind::DecodeDegraded, warning.entity, vec![warning.field])
                    .with_detail(warning.reason),
            );
        }
        normalized.record
    }

    /// Forwards an event to the diagnostic sink.
    fn emit(&self, event: DiagnosticEvent) {
        self.sink.record(&event);
    }
}

// ============================================================================
// SECTION: Execution Helpers
// ============================================================================

impl ToSql for BindValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Self::Integer(value) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*value)),
            Self::Real(value) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*value)),
            Self::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
        })
    }
}

/// Executes a write statement and returns the affected row count.
fn execute(connection: &Connection, statement: &Statement) -> Result<usize, StoreError> {
    tracing::debug!(sql = %statement.sql, fields = %statement.bound_fields.join(","), "executing statement");
    connection.execute(&statement.sql, params_from_iter(statement.params.iter())).map_err(db_error)
}

/// Runs a select and maps rows by the projected column order.
fn query_records(connection: &Connection, select: &SelectStatement) -> Result<Vec<Record>, StoreError> {
    tracing::debug!(sql = %select.statement.sql, "executing select");
    let mut prepared = connection.prepare(&select.statement.sql).map_err(db_error)?;
    let rows = prepared
        .query_map(params_from_iter(select.statement.params.iter()), |row| {
            let mut record = Record::new();
            for (index, column) in select.field_order.iter().enumerate() {
                record.insert(column.clone(), read_value(row, index)?);
            }
            Ok(record)
        })
        .map_err(db_error)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(db_error)
}

/// Runs a `COUNT(*)` statement.
fn query_count(connection: &Connection, statement: &Statement) -> Result<u64, StoreError> {
    let count: i64 = connection
        .query_row(&statement.sql, params_from_iter(statement.params.iter()), |row| row.get(0))
        .map_err(db_error)?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Runs a grouped count statement.
fn query_groups(connection: &Connection, statement: &Statement) -> Result<Vec<GroupCount>, StoreError> {
    let mut prepared = connection.prepare(&statement.sql).map_err(db_error)?;
    let rows = prepared
        .query_map(params_from_iter(statement.params.iter()), |row| {
            let count: i64 = row.get(1)?;
            Ok(GroupCount {
                value: read_value(row, 0)?,
                count: u64::try_from(count).unwrap_or(0),
            })
        })
        .map_err(db_error)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(db_error)
}

/// Fails unless `key` resolves to exactly one row.
fn probe_single_row(connection: &Connection, descriptor: &EntityDescriptor, key: &Value) -> Result<(), StoreError> {
    let probe = builder::build_count_by_key(descriptor, key)?;
    if query_count(connection, &probe)? == 1 {
        Ok(())
    } else {
        Err(not_found(descriptor, key))
    }
}

/// Reads a column as JSON; blobs become base64 text.
fn read_value(row: &Row<'_>, index: usize) -> rusqlite::Result<Value> {
    Ok(match row.get_ref(index)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(value) => Value::from(value),
        ValueRef::Real(value) => Number::from_f64(value).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(STANDARD.encode(bytes)),
    })
}

/// Interprets a stored flag value.
fn truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_i64().map(|value| value != 0),
        Value::String(text) => match text.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Fails with [`StoreError::MissingColumn`] when the primary key is absent.
fn require_primary_key(descriptor: &EntityDescriptor, live: &LiveSchema) -> Result<(), StoreError> {
    if live.contains(descriptor.primary_key()) {
        Ok(())
    } else {
        Err(StoreError::MissingColumn {
            table: descriptor.table().to_string(),
            column: descriptor.primary_key().to_string(),
        })
    }
}

/// Builds a [`StoreError::RecordNotFound`] for `key`.
fn not_found(descriptor: &EntityDescriptor, key: &Value) -> StoreError {
    let key = match key {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    StoreError::RecordNotFound {
        entity: descriptor.name().to_string(),
        key,
    }
}

/// Maps a `rusqlite` error into [`StoreError::Db`].
fn db_error(err: rusqlite::Error) -> StoreError {
    StoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Connection Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), StoreError> {
    let Some(parent) = path.parent() else {
        return Err(StoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| StoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), StoreError> {
    if path.as_os_str().is_empty() {
        return Err(StoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(StoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(StoreError::Invalid("store path contains an overlong component".to_string()));
        }
    }
    if path.is_dir() {
        return Err(StoreError::Invalid("store path must be a file, not a directory".to_string()));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, StoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies connection pragmas.
fn apply_pragmas(connection: &Connection, config: &SqliteStoreConfig) -> Result<(), StoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(db_error)?;
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
