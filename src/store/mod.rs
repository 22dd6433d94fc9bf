//! File-backed embedding store.
//!
//! [`VectorDb`] owns a single connection to a `SQLite` database with the
//! sqlite-vec extension registered, and maintains one `vec0` virtual table
//! per embedding model. Writes run in short-lived transactions that commit
//! fully or roll back fully; reads decode the engine's packed little-endian
//! f32 blobs.

mod connection;

pub use connection::{acquire_lock, configure_connection, register_vec_extension};

use crate::vector::Vector;
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;
use tracing::instrument;

/// Prefix for model-derived table names.
const TABLE_PREFIX: &str = "vec_";

/// Meta table recording which model and dimension own each derived table.
///
/// Two distinct model names can collapse to the same cleaned table name,
/// and a table's vector width is fixed at creation; this table turns both
/// hazards into explicit errors at `create_table_idempotent` time.
const META_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS vec_models (
    table_name TEXT PRIMARY KEY,
    model TEXT NOT NULL,
    dimension INTEGER NOT NULL
)";

/// Derives the storage table name for a model.
///
/// Strips every character that is not an ASCII letter or digit, then
/// prefixes `vec_`: `llama3.2` becomes `vec_llama32`. The derivation is
/// lossy; collisions between distinct models are caught by the meta table
/// at creation time, not here.
#[must_use]
pub fn table_name(model: &str) -> String {
    let cleaned: String = model.chars().filter(char::is_ascii_alphanumeric).collect();
    format!("{TABLE_PREFIX}{cleaned}")
}

/// A file-backed store of identifier→embedding mappings for one model.
///
/// Owns exactly one connection for its entire lifetime. Operations are
/// synchronous; concurrent use from multiple threads is serialized by the
/// internal mutex. After [`VectorDb::close`], every operation (including a
/// second `close`) fails with [`Error::UseAfterClose`].
pub struct VectorDb {
    /// Path to the backing file (None for in-memory).
    path: Option<PathBuf>,
    /// Name of the embedding model this store serves.
    model: String,
    /// Derived table name; ASCII-alphanumeric plus the fixed prefix,
    /// safe to interpolate into SQL (identifiers cannot be bound).
    table: String,
    /// Vector width, fixed at table creation.
    dimension: OnceLock<usize>,
    /// The owned connection; `None` after close.
    conn: Mutex<Option<Connection>>,
}

impl VectorDb {
    /// Opens the database at `path`, creating the file if absent.
    ///
    /// Safe to call repeatedly against the same file. Establishes the owned
    /// connection immediately; the model's table is created separately by
    /// [`Self::create_table_idempotent`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::OpenFailure`] if the file cannot be attached or
    /// created.
    pub fn open(path: impl Into<PathBuf>, model: impl Into<String>) -> Result<Self> {
        let path = path.into();
        register_vec_extension();
        let conn = Connection::open(&path).map_err(|e| Error::OpenFailure {
            path: path.clone(),
            cause: e.to_string(),
        })?;
        configure_connection(&conn)?;

        Ok(Self::from_connection(conn, Some(path), model.into()))
    }

    /// Opens an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns [`Error::OpenFailure`] if the in-memory database cannot be
    /// created.
    pub fn in_memory(model: impl Into<String>) -> Result<Self> {
        register_vec_extension();
        let conn = Connection::open_in_memory().map_err(|e| Error::OpenFailure {
            path: PathBuf::from(":memory:"),
            cause: e.to_string(),
        })?;
        configure_connection(&conn)?;

        Ok(Self::from_connection(conn, None, model.into()))
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>, model: String) -> Self {
        let table = table_name(&model);
        let dimension = OnceLock::new();

        // Prime the dimension from a previous run's meta row, if any.
        // The meta table may not exist yet; that is not an error here.
        if let Ok(dim) = conn.query_row(
            "SELECT dimension FROM vec_models WHERE table_name = ?1",
            params![table],
            |row| row.get::<_, i64>(0),
        ) {
            if let Ok(dim) = usize::try_from(dim) {
                let _ = dimension.set(dim);
            }
        }

        Self {
            path,
            model,
            table,
            dimension,
            conn: Mutex::new(Some(conn)),
        }
    }

    /// Returns the path to the backing file (None for in-memory).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the model name this store serves.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the derived table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the vector width, if the table has been created.
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    /// Creates (or confirms) the model's vector table at `dimension`.
    ///
    /// Safe to invoke on every startup: repeat calls with the same
    /// dimension produce no error and no schema change.
    ///
    /// # Errors
    ///
    /// - [`Error::DimensionConflict`] if the table exists at a different
    ///   width.
    /// - [`Error::ModelCollision`] if the table name is already claimed by
    ///   a different model string.
    /// - [`Error::SchemaFailure`] if a schema statement is rejected.
    #[instrument(skip(self), fields(operation = "create_table", table = %self.table))]
    pub fn create_table_idempotent(&self, dimension: usize) -> Result<()> {
        let start = Instant::now();
        let result = (|| {
            let guard = acquire_lock(&self.conn);
            let conn = guard.as_ref().ok_or(Error::UseAfterClose)?;

            conn.execute(META_TABLE_SQL, [])
                .map_err(|e| Error::SchemaFailure {
                    operation: "create_meta_table".to_string(),
                    cause: e.to_string(),
                })?;

            Self::begin(conn)?;
            let result = self.create_table_in_txn(conn, dimension);
            Self::finish(conn, result)
        })();

        if result.is_ok() {
            let _ = self.dimension.set(dimension);
        }
        record_operation_metrics("create_table", start, &result);
        result
    }

    fn create_table_in_txn(&self, conn: &Connection, dimension: usize) -> Result<()> {
        let existing = conn
            .query_row(
                "SELECT model, dimension FROM vec_models WHERE table_name = ?1",
                params![self.table],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()
            .map_err(|e| Error::OperationFailed {
                operation: "read_meta_row".to_string(),
                cause: e.to_string(),
            })?;

        if let Some((owner, dim)) = existing {
            if owner != self.model {
                return Err(Error::ModelCollision {
                    table: self.table.clone(),
                    existing_model: owner,
                    model: self.model.clone(),
                });
            }
            let dim = usize::try_from(dim).unwrap_or(0);
            if dim != dimension {
                return Err(Error::DimensionConflict {
                    table: self.table.clone(),
                    existing: dim,
                    requested: dimension,
                });
            }
        } else {
            #[allow(clippy::cast_possible_wrap)]
            let dim_i64 = dimension as i64;
            conn.execute(
                "INSERT INTO vec_models (table_name, model, dimension) VALUES (?1, ?2, ?3)",
                params![self.table, self.model, dim_i64],
            )
            .map_err(|e| Error::SchemaFailure {
                operation: "record_meta_row".to_string(),
                cause: e.to_string(),
            })?;
        }

        conn.execute(
            &format!(
                "CREATE VIRTUAL TABLE IF NOT EXISTS {} USING vec0(
                    id TEXT PRIMARY KEY,
                    embedding FLOAT[{dimension}]
                )",
                self.table
            ),
            [],
        )
        .map_err(|e| Error::SchemaFailure {
            operation: "create_vector_table".to_string(),
            cause: e.to_string(),
        })?;

        Ok(())
    }

    /// Inserts `(id, vector)` into the model's table.
    ///
    /// Runs in a single transaction: after a successful return the row is
    /// fully visible to subsequent [`Self::get`] calls; on any failure no
    /// partial write is observable.
    ///
    /// # Errors
    ///
    /// - [`Error::ConstraintViolation`] if `id` already has a stored row
    ///   (the previous row is left unchanged).
    /// - [`Error::DimensionConflict`] if the vector width does not match
    ///   the table.
    #[instrument(skip(self, vector), fields(operation = "insert", table = %self.table))]
    pub fn insert(&self, id: &str, vector: &Vector) -> Result<()> {
        let start = Instant::now();
        let result = (|| {
            self.check_dimension(vector)?;
            let guard = acquire_lock(&self.conn);
            let conn = guard.as_ref().ok_or(Error::UseAfterClose)?;

            Self::begin(conn)?;
            let result = (|| {
                if self.row_exists(conn, id)? {
                    return Err(Error::ConstraintViolation { id: id.to_string() });
                }
                self.insert_row(conn, id, vector)
            })();
            Self::finish(conn, result)
        })();

        record_operation_metrics("insert", start, &result);
        result
    }

    /// Looks up the vector stored under `id`.
    ///
    /// A missing identifier is a normal outcome: returns `Ok(None)`, never
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DecodeFailure`] if the stored blob is malformed, or
    /// [`Error::OperationFailed`] if the query cannot be executed.
    #[instrument(skip(self), fields(operation = "get", table = %self.table))]
    pub fn get(&self, id: &str) -> Result<Option<Vector>> {
        let start = Instant::now();
        let result = (|| {
            let guard = acquire_lock(&self.conn);
            let conn = guard.as_ref().ok_or(Error::UseAfterClose)?;

            let blob: Option<Vec<u8>> = conn
                .query_row(
                    &format!("SELECT embedding FROM {} WHERE id = ?1", self.table),
                    params![id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| Error::OperationFailed {
                    operation: "get_embedding".to_string(),
                    cause: e.to_string(),
                })?;

            blob.map(|bytes| Vector::from_le_bytes(&bytes)).transpose()
        })();

        record_operation_metrics("get", start, &result);
        result
    }

    /// Replaces the vector stored under `id`.
    ///
    /// Transactional: the old value is never observed mixed with the new.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if `id` has no stored row.
    /// - [`Error::DimensionConflict`] if the vector width does not match
    ///   the table.
    #[instrument(skip(self, vector), fields(operation = "update", table = %self.table))]
    pub fn update(&self, id: &str, vector: &Vector) -> Result<()> {
        let start = Instant::now();
        let result = (|| {
            self.check_dimension(vector)?;
            let guard = acquire_lock(&self.conn);
            let conn = guard.as_ref().ok_or(Error::UseAfterClose)?;

            Self::begin(conn)?;
            let result = (|| {
                if !self.row_exists(conn, id)? {
                    return Err(Error::NotFound { id: id.to_string() });
                }
                // vec0 replace is delete + reinsert under the same id,
                // atomic within the surrounding transaction
                conn.execute(
                    &format!("DELETE FROM {} WHERE id = ?1", self.table),
                    params![id],
                )
                .map_err(|e| Error::OperationFailed {
                    operation: "delete_embedding".to_string(),
                    cause: e.to_string(),
                })?;
                self.insert_row(conn, id, vector)
            })();
            Self::finish(conn, result)
        })();

        record_operation_metrics("update", start, &result);
        result
    }

    /// Releases the owned connection.
    ///
    /// Safe to call at most once; a second `close`, like any other
    /// operation after close, fails with [`Error::UseAfterClose`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the engine reports a failure
    /// while closing.
    #[instrument(skip(self), fields(operation = "close", table = %self.table))]
    pub fn close(&self) -> Result<()> {
        let mut guard = acquire_lock(&self.conn);
        let conn = guard.take().ok_or(Error::UseAfterClose)?;
        conn.close().map_err(|(_conn, e)| Error::OperationFailed {
            operation: "close".to_string(),
            cause: e.to_string(),
        })
    }

    fn check_dimension(&self, vector: &Vector) -> Result<()> {
        if let Some(&dim) = self.dimension.get() {
            if vector.len() != dim {
                return Err(Error::DimensionConflict {
                    table: self.table.clone(),
                    existing: dim,
                    requested: vector.len(),
                });
            }
        }
        Ok(())
    }

    fn row_exists(&self, conn: &Connection, id: &str) -> Result<bool> {
        conn.query_row(
            &format!("SELECT 1 FROM {} WHERE id = ?1", self.table),
            params![id],
            |_| Ok(()),
        )
        .optional()
        .map(|row| row.is_some())
        .map_err(|e| Error::OperationFailed {
            operation: "check_row_exists".to_string(),
            cause: e.to_string(),
        })
    }

    fn insert_row(&self, conn: &Connection, id: &str, vector: &Vector) -> Result<()> {
        conn.execute(
            &format!(
                "INSERT INTO {} (id, embedding) VALUES (?1, ?2)",
                self.table
            ),
            params![id, vector.to_le_bytes()],
        )
        .map_err(|e| map_insert_error(e, id))?;
        Ok(())
    }

    fn begin(conn: &Connection) -> Result<()> {
        conn.execute("BEGIN IMMEDIATE", [])
            .map_err(|e| Error::OperationFailed {
                operation: "begin_transaction".to_string(),
                cause: e.to_string(),
            })?;
        Ok(())
    }

    /// Commits on success, rolls back on any error, passing the result
    /// through. Every write path ends here, so no failed transaction is
    /// left open.
    fn finish<T>(conn: &Connection, result: Result<T>) -> Result<T> {
        if result.is_ok() {
            conn.execute("COMMIT", [])
                .map_err(|e| Error::OperationFailed {
                    operation: "commit_transaction".to_string(),
                    cause: e.to_string(),
                })?;
        } else {
            let _ = conn.execute("ROLLBACK", []);
        }
        result
    }
}

/// Maps an engine-level insert failure, classifying uniqueness violations.
///
/// The existence pre-check already catches duplicates deterministically;
/// this keeps the classification if the engine reports one anyway.
fn map_insert_error(e: rusqlite::Error, id: &str) -> Error {
    if let rusqlite::Error::SqliteFailure(ref code, ref message) = e {
        let unique = code.code == rusqlite::ErrorCode::ConstraintViolation
            || message
                .as_deref()
                .is_some_and(|m| m.contains("UNIQUE constraint"));
        if unique {
            return Error::ConstraintViolation { id: id.to_string() };
        }
    }
    Error::OperationFailed {
        operation: "insert_embedding".to_string(),
        cause: e.to_string(),
    }
}

fn record_operation_metrics<T>(operation: &'static str, start: Instant, result: &Result<T>) {
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::counter!(
        "vectordb_operations_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "vectordb_operation_duration_ms",
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("llama3.2", "vec_llama32" ; "dots stripped")]
    #[test_case("llama-3.2", "vec_llama32" ; "dashes stripped")]
    #[test_case("nomic-embed-text", "vec_nomicembedtext" ; "multiple dashes")]
    #[test_case("Qwen2.5:7b", "vec_Qwen257b" ; "colon stripped, case kept")]
    #[test_case("", "vec_" ; "empty model")]
    fn test_table_name(model: &str, expected: &str) {
        assert_eq!(table_name(model), expected);
    }

    fn store_with_table(dimension: usize) -> VectorDb {
        let db = VectorDb::in_memory("llama3.2").unwrap();
        db.create_table_idempotent(dimension).unwrap();
        db
    }

    #[test]
    fn test_insert_get_round_trip() {
        let db = store_with_table(3);
        let v = Vector::new(vec![0.0, 1.0, -1.0]);
        db.insert("foo", &v).unwrap();
        assert_eq!(db.get("foo").unwrap(), Some(v));
    }

    #[test]
    fn test_get_missing_id_is_none() {
        let db = store_with_table(3);
        assert_eq!(db.get("never-inserted").unwrap(), None);
    }

    #[test]
    fn test_duplicate_insert_keeps_first_row() {
        let db = store_with_table(3);
        let first = Vector::new(vec![1.0, 2.0, 3.0]);
        db.insert("foo", &first).unwrap();

        let err = db
            .insert("foo", &Vector::new(vec![9.0, 9.0, 9.0]))
            .unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation { ref id } if id == "foo"));
        assert_eq!(db.get("foo").unwrap(), Some(first));
    }

    #[test]
    fn test_create_table_is_idempotent() {
        let db = VectorDb::in_memory("llama3.2").unwrap();
        db.create_table_idempotent(4).unwrap();
        db.create_table_idempotent(4).unwrap();
        assert_eq!(db.dimension(), Some(4));
    }

    #[test]
    fn test_create_table_dimension_conflict() {
        let db = store_with_table(3);
        let err = db.create_table_idempotent(4).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionConflict {
                existing: 3,
                requested: 4,
                ..
            }
        ));
        // the original table is still usable at its original width
        db.insert("foo", &Vector::new(vec![1.0, 2.0, 3.0])).unwrap();
    }

    #[test]
    fn test_insert_wrong_width_vector() {
        let db = store_with_table(3);
        let err = db.insert("foo", &Vector::new(vec![1.0])).unwrap_err();
        assert!(matches!(err, Error::DimensionConflict { .. }));
        assert_eq!(db.get("foo").unwrap(), None);
    }

    #[test]
    fn test_update_replaces_vector() {
        let db = store_with_table(2);
        db.insert("foo", &Vector::new(vec![1.0, 2.0])).unwrap();
        db.update("foo", &Vector::new(vec![3.0, 4.0])).unwrap();
        assert_eq!(db.get("foo").unwrap(), Some(Vector::new(vec![3.0, 4.0])));
    }

    #[test]
    fn test_update_missing_id_is_not_found() {
        let db = store_with_table(2);
        let err = db.update("foo", &Vector::new(vec![1.0, 2.0])).unwrap_err();
        assert!(matches!(err, Error::NotFound { ref id } if id == "foo"));
        assert_eq!(db.get("foo").unwrap(), None);
    }

    #[test]
    fn test_use_after_close() {
        let db = store_with_table(2);
        db.close().unwrap();

        assert!(matches!(db.get("foo"), Err(Error::UseAfterClose)));
        assert!(matches!(
            db.insert("foo", &Vector::new(vec![1.0, 2.0])),
            Err(Error::UseAfterClose)
        ));
        assert!(matches!(db.close(), Err(Error::UseAfterClose)));
    }

    #[test]
    fn test_round_trip_preserves_bits() {
        let db = store_with_table(4);
        let v = Vector::new(vec![-0.0, f32::MIN_POSITIVE, 1.0e-38, 3.402e38]);
        db.insert("edge", &v).unwrap();
        assert_eq!(db.get("edge").unwrap(), Some(v));
    }
}
