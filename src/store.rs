//! Durable per-chat corpus rows in SQLite.

use crate::error::Error;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// One conversation's persisted state: the accumulated raw text and the
/// serialized chain, absent until a valid model has been built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    pub raw_text: String,
    pub chain: Option<String>,
}

/// Key-value persistence keyed by chat id. Rows are independent; `upsert`
/// replaces the whole row, so callers read-modify-write.
pub struct CorpusStore {
    conn: Mutex<Connection>,
}

impl CorpusStore {
    /// Open (or create) a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let conn = Connection::open(path.as_ref())?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        info!("opened corpus store at {:?}", path.as_ref());
        Ok(store)
    }

    /// Open an in-memory store.
    pub fn in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                chat_id INTEGER PRIMARY KEY,
                text TEXT NOT NULL,
                chain TEXT
            );
            "#,
        )?;
        Ok(())
    }

    pub fn read(&self, chat_id: i64) -> Result<Option<Corpus>, Error> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT text, chain FROM messages WHERE chat_id = ?1",
                params![chat_id],
                |row| {
                    Ok(Corpus { raw_text: row.get(0)?, chain: row.get(1)? })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Replace the row for `chat_id` wholesale.
    pub fn upsert(&self, chat_id: i64, raw_text: &str, chain: Option<&str>) -> Result<(), Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO messages (chat_id, text, chain) VALUES (?1, ?2, ?3)
             ON CONFLICT(chat_id) DO UPDATE SET text = ?2, chain = ?3",
            params![chat_id, raw_text, chain],
        )?;
        Ok(())
    }

    pub fn delete(&self, chat_id: i64) -> Result<(), Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM messages WHERE chat_id = ?1", params![chat_id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_absent_row() {
        let store = CorpusStore::in_memory().unwrap();
        assert_eq!(store.read(1).unwrap(), None);
    }

    #[test]
    fn test_upsert_and_read() {
        let store = CorpusStore::in_memory().unwrap();
        store.upsert(1, "hello world", Some("[]")).unwrap();

        let corpus = store.read(1).unwrap().unwrap();
        assert_eq!(corpus.raw_text, "hello world");
        assert_eq!(corpus.chain.as_deref(), Some("[]"));
    }

    #[test]
    fn test_upsert_replaces_whole_row() {
        let store = CorpusStore::in_memory().unwrap();
        store.upsert(1, "first", Some("[]")).unwrap();
        store.upsert(1, "second", None).unwrap();

        let corpus = store.read(1).unwrap().unwrap();
        assert_eq!(corpus.raw_text, "second");
        assert_eq!(corpus.chain, None);
    }

    #[test]
    fn test_rows_are_independent() {
        let store = CorpusStore::in_memory().unwrap();
        store.upsert(1, "one", None).unwrap();
        store.upsert(2, "two", None).unwrap();
        store.delete(1).unwrap();

        assert_eq!(store.read(1).unwrap(), None);
        assert_eq!(store.read(2).unwrap().unwrap().raw_text, "two");
    }

    #[test]
    fn test_delete_missing_row_is_ok() {
        let store = CorpusStore::in_memory().unwrap();
        store.delete(42).unwrap();
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.db");

        {
            let store = CorpusStore::open(&path).unwrap();
            store.upsert(7, "persisted line", Some("[]")).unwrap();
        }

        let store = CorpusStore::open(&path).unwrap();
        let corpus = store.read(7).unwrap().unwrap();
        assert_eq!(corpus.raw_text, "persisted line");
        assert_eq!(corpus.chain.as_deref(), Some("[]"));
    }
}
