//! Content-group id allocation.

use crate::db::Database;
use crate::error::{Error, Result};
use tracing::debug;

/// Issues unique, increasing values from a named sequence.
///
/// Values of one sequence never repeat across calls, even when the caller's
/// write later fails.
pub trait SequenceAllocator: Send + Sync {
    fn next_value(&self, name: &str) -> Result<i64>;
}

impl SequenceAllocator for Database {
    fn next_value(&self, name: &str) -> Result<i64> {
        if name.trim().is_empty() {
            return Err(Error::Sequence {
                name: name.to_string(),
                reason: "sequence name is empty".to_string(),
            });
        }

        let conn = self.lock()?;
        let value: i64 = conn.query_row(
            "INSERT INTO content_sequences (name, value) VALUES (?1, 1)
             ON CONFLICT(name) DO UPDATE SET value = value + 1
             RETURNING value",
            [name],
            |row| row.get(0),
        )?;

        debug!(sequence = %name, value, "Allocated sequence value");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_values_increase_per_sequence() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.next_value("content_group_id").unwrap(), 1);
        assert_eq!(db.next_value("content_group_id").unwrap(), 2);
        assert_eq!(db.next_value("other").unwrap(), 1);
        assert_eq!(db.next_value("content_group_id").unwrap(), 3);
    }

    #[test]
    fn test_values_survive_reopen() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("seq.db");
        let path_str = db_path.to_str().unwrap();

        {
            let db = Database::open(path_str).unwrap();
            db.next_value("content_group_id").unwrap();
            db.next_value("content_group_id").unwrap();
        }

        let db = Database::open(path_str).unwrap();
        assert_eq!(db.next_value("content_group_id").unwrap(), 3);
    }

    #[test]
    fn test_empty_name_rejected() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.next_value("  "), Err(Error::Sequence { .. })));
    }
}
