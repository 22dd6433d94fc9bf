//! # git-llama
//!
//! Turn natural-language prompts into git commands using a local Ollama
//! model, and keep a file-backed store of prompt embeddings alongside the
//! repository.
//!
//! The core of the crate is the embedding store ([`store::VectorDb`]): a
//! SQLite database extended with the sqlite-vec virtual-table extension,
//! holding one fixed-width vector table per embedding model. The
//! [`vector::Vector`] type carries the embeddings and their codec; the
//! [`llm::OllamaClient`] supplies generated commands and embedding vectors.
//!
//! ## Example
//!
//! ```rust,ignore
//! use git_llama::store::VectorDb;
//! use git_llama::vector::Vector;
//!
//! let db = VectorDb::open(".git-llama.db", "llama3.2")?;
//! db.create_table_idempotent(3)?;
//! db.insert("foo", &Vector::new(vec![0.0, 1.0, -1.0]))?;
//! let back = db.get("foo")?;
//! db.close()?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod llm;
pub mod observability;
pub mod store;
pub mod vector;

// Re-exports for convenience
pub use config::OllamaConfig;
pub use llm::OllamaClient;
pub use store::VectorDb;
pub use vector::Vector;

/// Error type for git-llama operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `OpenFailure` | The backing database file cannot be attached or created |
/// | `SchemaFailure` | A schema statement (table or meta-table creation) is rejected |
/// | `DimensionConflict` | A model table already exists at a different vector width |
/// | `ModelCollision` | Two distinct model names collapse to the same table name |
/// | `ConstraintViolation` | Inserting a duplicate identifier |
/// | `NotFound` | Updating an identifier that has no stored row |
/// | `DecodeFailure` | A stored blob is not a well-formed packed f32 vector |
/// | `UseAfterClose` | Any store operation after `close`, including a second `close` |
/// | `DimensionMismatch` | Vector arithmetic over operands of unequal length |
/// | `OperationFailed` | Query execution, transaction control, or HTTP failures |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The backing database file could not be attached or created.
    #[error("cannot open vector database at '{}': {cause}", path.display())]
    OpenFailure {
        /// Path to the backing file.
        path: PathBuf,
        /// The underlying cause.
        cause: String,
    },

    /// A schema statement was rejected by the engine.
    #[error("schema operation '{operation}' failed: {cause}")]
    SchemaFailure {
        /// The schema operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The model's table already exists at a different vector width.
    ///
    /// Raised at table-creation time instead of silently corrupting the
    /// table with mixed-width vectors.
    #[error("table '{table}' holds {existing}-dimensional vectors, requested {requested}")]
    DimensionConflict {
        /// The derived table name.
        table: String,
        /// Dimension the table was created with.
        existing: usize,
        /// Dimension requested now.
        requested: usize,
    },

    /// Two distinct model names collapse to the same cleaned table name.
    ///
    /// Table names strip non-alphanumeric characters, so `llama3.2` and
    /// `llama-3.2` both map to `vec_llama32`. Sharing one table across two
    /// models is never safe; this is raised at table-creation time.
    #[error("table '{table}' already belongs to model '{existing_model}', not '{model}'")]
    ModelCollision {
        /// The derived table name.
        table: String,
        /// Model that created the table.
        existing_model: String,
        /// Model requesting it now.
        model: String,
    },

    /// An identifier is already present in the model's table.
    ///
    /// Insert is not an upsert; the previously stored row is left unchanged.
    #[error("identifier '{id}' already has a stored embedding")]
    ConstraintViolation {
        /// The duplicate identifier.
        id: String,
    },

    /// The target identifier has no stored row.
    ///
    /// Raised by `update`. A missing identifier on `get` is `Ok(None)`,
    /// never this error.
    #[error("no embedding stored under identifier '{id}'")]
    NotFound {
        /// The missing identifier.
        id: String,
    },

    /// A stored blob could not be decoded into a vector.
    #[error("stored embedding is malformed: {cause}")]
    DecodeFailure {
        /// The underlying cause.
        cause: String,
    },

    /// A store operation was attempted after `close`.
    #[error("vector database used after close")]
    UseAfterClose,

    /// Vector arithmetic over operands of unequal (or zero) length.
    #[error("vector dimension mismatch: {left} vs {right}")]
    DimensionMismatch {
        /// Length of the left operand.
        left: usize,
        /// Length of the right operand.
        right: usize,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` query execution or transaction control fails
    /// - The Ollama HTTP API returns an error or unparseable response
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for git-llama operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::ConstraintViolation {
            id: "foo".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "identifier 'foo' already has a stored embedding"
        );

        let err = Error::DimensionConflict {
            table: "vec_llama32".to_string(),
            existing: 3,
            requested: 4,
        };
        assert_eq!(
            err.to_string(),
            "table 'vec_llama32' holds 3-dimensional vectors, requested 4"
        );

        let err = Error::OperationFailed {
            operation: "insert".to_string(),
            cause: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'insert' failed: disk full");

        let err = Error::UseAfterClose;
        assert_eq!(err.to_string(), "vector database used after close");
    }
}
