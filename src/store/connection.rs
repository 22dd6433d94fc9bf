//! Connection handling for the `SQLite` store.
//!
//! Provides sqlite-vec extension registration, mutex handling with poison
//! recovery, and pragma configuration for the single owned connection.

use crate::Result;
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard, Once};

static VEC_EXTENSION: Once = Once::new();

/// Registers sqlite-vec as an auto extension, once per process.
///
/// Every connection opened afterwards has the `vec0` virtual-table module
/// available. Must run before [`Connection::open`].
#[allow(unsafe_code)]
pub fn register_vec_extension() {
    VEC_EXTENSION.call_once(|| {
        // SAFETY: sqlite3_vec_init has the sqlite3_auto_extension entry-point
        // signature; registration happens exactly once, before any connection
        // is opened.
        unsafe {
            rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
                sqlite_vec::sqlite3_vec_init as *const (),
            )));
        }
    });
}

/// Helper to acquire the connection mutex with poison recovery.
///
/// If the mutex is poisoned (a panic in a previous critical section), we
/// recover the inner value and log a warning. The connection state is still
/// valid; every transactional operation rolls back on its own error paths.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a `SQLite` connection with the store's standard pragmas.
///
/// - **WAL mode**: better concurrent read performance
/// - **NORMAL synchronous**: balances durability with performance
/// - **`busy_timeout`**: waits up to 5 seconds on lock contention instead
///   of failing with `SQLITE_BUSY`
pub fn configure_connection(conn: &Connection) -> Result<()> {
    // pragma_update returns the pragma's result row, which we ignore -
    // journal_mode answers with a string like "wal"
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_acquire_lock_success() {
        let mutex = Mutex::new(42);
        let guard = acquire_lock(&mutex);
        assert_eq!(*guard, 42);
    }

    #[test]
    fn test_acquire_lock_concurrent() {
        let mutex = Arc::new(Mutex::new(0));
        let mut handles = vec![];

        for _ in 0..10 {
            let mutex_clone = Arc::clone(&mutex);
            let handle = thread::spawn(move || {
                let mut guard = acquire_lock(&mutex_clone);
                *guard += 1;
            });
            handles.push(handle);
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let guard = acquire_lock(&mutex);
        assert_eq!(*guard, 10);
    }

    #[test]
    fn test_configure_connection() {
        let conn = Connection::open_in_memory().unwrap();
        let result = configure_connection(&conn);
        assert!(result.is_ok());

        // In-memory databases cannot use WAL mode - they report "memory"
        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap();
        assert!(
            journal_mode.to_lowercase() == "wal" || journal_mode.to_lowercase() == "memory",
            "Expected 'wal' or 'memory' journal mode, got '{journal_mode}'"
        );

        let busy_timeout: i32 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .unwrap();
        assert_eq!(busy_timeout, 5000);
    }

    #[test]
    fn test_vec_extension_registers_vec0_module() {
        register_vec_extension();
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE VIRTUAL TABLE t USING vec0(id TEXT PRIMARY KEY, embedding FLOAT[2])",
            [],
        )
        .unwrap();
    }
}
