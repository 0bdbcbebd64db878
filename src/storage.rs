// Durable key-value slots: file, SQLite and in-memory backends

use eyre::{Context, Result, eyre};
use fs2::FileExt;
use rusqlite::{Connection, OptionalExtension};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// A durable string slot store, keyed by name
pub trait Storage {
    /// Read the slot; `None` if it was never written
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace the slot's contents
    fn write(&mut self, key: &str, value: &str) -> Result<()>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(eyre!("Storage key cannot be empty"));
    }
    if key.len() > 64 {
        return Err(eyre!("Storage key too long: {} (max 64 chars)", key));
    }
    if !key
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(eyre!("Invalid storage key: {} (must be alphanumeric with _/-/.)", key));
    }
    Ok(())
}

// ============================================================================
// File backend
// ============================================================================

/// One JSON file per key inside a directory
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).context("Failed to create storage directory")?;
        Ok(Self { dir })
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        let path = self.slot_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).with_context(|| format!("Failed to read slot file {:?}", path))?;
        Ok(Some(content))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.slot_path(key);
        let tmp_path = self.dir.join(format!(".{}.json.tmp", key));
        let lock_path = self.dir.join(format!(".{}.lock", key));

        // Serialize writers on a stable lock file before the temp file is touched
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .context("Failed to open slot lock file")?;
        lock.lock_exclusive().context("Failed to acquire file lock")?;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .context("Failed to open slot file for writing")?;

        file.write_all(value.as_bytes())?;
        file.sync_all()?;

        fs::rename(&tmp_path, &path).with_context(|| format!("Failed to move slot file into place at {:?}", path))?;
        debug!(key, bytes = value.len(), "FileStorage::write: slot written");

        // Lock is released when `lock` is dropped
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

// ============================================================================
// SQLite backend
// ============================================================================

/// Slots kept as rows of a single SQLite table
pub struct SqliteStorage {
    db: Connection,
}

impl SqliteStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create storage directory")?;
        }
        let db = Connection::open(path).context("Failed to open SQLite database")?;
        let storage = Self { db };
        storage.create_schema()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let storage = Self { db };
        storage.create_schema()?;
        Ok(storage)
    }

    fn create_schema(&self) -> Result<()> {
        debug!("Creating slot schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS slots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }
}

impl Storage for SqliteStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        let value = self
            .db
            .query_row("SELECT value FROM slots WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        self.db.execute(
            "INSERT OR REPLACE INTO slots (key, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, value, crate::now_ms()],
        )?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Process-local slots. Clones share the same map, so a store rebuilt on a
/// clone sees what the previous one wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slots: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        Ok(self.slots.borrow().get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        self.slots.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_key() {
        // Valid
        assert!(validate_key("user-todos").is_ok());
        assert!(validate_key("user-todos.next_id").is_ok());

        // Invalid
        assert!(validate_key("").is_err());
        assert!(validate_key("../escape").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_file_storage_read_missing() {
        let temp = TempDir::new().unwrap();
        let storage = FileStorage::open(temp.path()).unwrap();
        assert_eq!(storage.read("user-todos").unwrap(), None);
    }

    #[test]
    fn test_file_storage_write_then_read() {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::open(temp.path().join("data")).unwrap();

        storage.write("user-todos", "[1,2,3]").unwrap();
        assert!(temp.path().join("data/user-todos.json").exists());
        assert_eq!(storage.read("user-todos").unwrap().as_deref(), Some("[1,2,3]"));

        // Overwrite replaces, not appends
        storage.write("user-todos", "[]").unwrap();
        assert_eq!(storage.read("user-todos").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_file_storage_concurrent_writers_never_tear() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        let temp = TempDir::new().unwrap();
        let dir = temp.path().to_path_buf();
        let writers = 4;
        let barrier = Arc::new(Barrier::new(writers));

        let handles: Vec<_> = (0..writers)
            .map(|i| {
                let dir = dir.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let mut storage = FileStorage::open(&dir).unwrap();
                    let payload = char::from(b'a' + i as u8).to_string().repeat(64 * 1024);
                    barrier.wait();
                    for _ in 0..25 {
                        storage.write("user-todos", &payload).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let storage = FileStorage::open(&dir).unwrap();
        let content = storage.read("user-todos").unwrap().unwrap();
        assert_eq!(content.len(), 64 * 1024);
        let first = content.chars().next().unwrap();
        assert!(content.chars().all(|c| c == first));
        assert!(!dir.join(".user-todos.json.tmp").exists());
        assert!(dir.join(".user-todos.lock").exists());
    }

    #[test]
    fn test_file_storage_rejects_bad_key() {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::open(temp.path()).unwrap();
        assert!(storage.write("../outside", "x").is_err());
    }

    #[test]
    fn test_sqlite_storage_persists_across_connections() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("todos.db");

        {
            let mut storage = SqliteStorage::open(&db_path).unwrap();
            storage.write("user-todos", "[\"a\"]").unwrap();
        }

        let storage = SqliteStorage::open(&db_path).unwrap();
        assert_eq!(storage.read("user-todos").unwrap().as_deref(), Some("[\"a\"]"));
        assert_eq!(storage.read("other").unwrap(), None);
    }

    #[test]
    fn test_sqlite_storage_overwrite() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();

        storage.write("k", "1").unwrap();
        storage.write("k", "2").unwrap();
        assert_eq!(storage.read("k").unwrap().as_deref(), Some("2"));
        assert_eq!(storage.read("other").unwrap(), None);
    }

    #[test]
    fn test_memory_storage_clones_share_slots() {
        let mut a = MemoryStorage::new();
        let b = a.clone();

        a.write("user-todos", "[]").unwrap();
        assert_eq!(b.read("user-todos").unwrap().as_deref(), Some("[]"));
        assert_eq!(b.name(), "memory");
    }
}
