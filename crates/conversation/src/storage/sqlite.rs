//! SQLite-based conversation storage
//!
//! Each record is stored as a JSON document next to the handful of columns
//! needed for indexing. Interactions get their logical sort id from an
//! AUTOINCREMENT primary key, so sort ids are never reused.

use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use rusqlite_migration::{M, Migrations};

use super::traits::{ConversationStore, EnumerationOrder, ReadTransaction, WriteTransaction};
use crate::error::ThreadError;
use crate::models::{
    DisappearingMessagesConfiguration, Interaction, InteractionId, Thread, ThreadId,
};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            CREATE TABLE threads (
                id TEXT PRIMARY KEY,
                document TEXT NOT NULL
            );

            CREATE TABLE interactions (
                sort_id INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                thread_id TEXT NOT NULL,
                document TEXT NOT NULL
            );

            CREATE INDEX idx_interactions_thread
                ON interactions(thread_id, sort_id);

            -- Keyed by the owning thread's id
            CREATE TABLE disappearing_messages_configurations (
                thread_id TEXT PRIMARY KEY,
                document TEXT NOT NULL
            );
            "#,
        ),
        // Migration 2: Denormalized unread flag for unread counts
        M::up(
            r#"
            ALTER TABLE interactions ADD COLUMN is_unread INTEGER NOT NULL DEFAULT 0;

            CREATE INDEX idx_interactions_unread
                ON interactions(thread_id, is_unread);
            "#,
        ),
    ])
}

/// SQLite-based conversation storage
pub struct SqliteConversationStore {
    conn: Mutex<Connection>,
}

impl SqliteConversationStore {
    /// Open (or create) the database at `db_path` and run migrations
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        // WAL lets readers proceed while a writer holds the database.
        // NORMAL sync is safe with WAL.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("sqlite connection lock poisoned"))
    }
}

impl ConversationStore for SqliteConversationStore {
    fn read_transaction(
        &self,
        block: &mut dyn FnMut(&dyn ReadTransaction) -> Result<()>,
    ) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let result = block(&SqliteTransaction { conn: &tx });
        // Nothing to keep; dropping rolls back.
        tx.finish()?;
        result
    }

    fn read_write_transaction(
        &self,
        block: &mut dyn FnMut(&mut dyn WriteTransaction) -> Result<()>,
    ) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut handle = SqliteTransaction { conn: &tx };
            block(&mut handle)?;
        }
        tx.commit().context("Failed to commit transaction")?;
        Ok(())
    }
}

/// Transaction handle over a connection with an open transaction
struct SqliteTransaction<'a> {
    conn: &'a Connection,
}

impl SqliteTransaction<'_> {
    /// Writes must never autocommit
    fn ensure_in_transaction(&self) -> Result<()> {
        if self.conn.is_autocommit() {
            return Err(ThreadError::MissingTransaction.into());
        }
        Ok(())
    }

    fn load_interactions(&self, sql: &str, thread_id: &ThreadId) -> Result<Vec<Interaction>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([thread_id.as_str()], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut result = Vec::new();
        for row in rows {
            let (sort_id, document) = row?;
            result.push(decode_interaction(sort_id, &document)?);
        }
        Ok(result)
    }
}

fn decode_interaction(sort_id: i64, document: &str) -> Result<Interaction> {
    let mut interaction: Interaction =
        serde_json::from_str(document).context("Failed to decode interaction document")?;
    // The column is authoritative
    interaction.sort_id = sort_id as u64;
    Ok(interaction)
}

impl ReadTransaction for SqliteTransaction<'_> {
    fn thread(&self, id: &ThreadId) -> Result<Option<Thread>> {
        let document: Option<String> = self
            .conn
            .query_row(
                "SELECT document FROM threads WHERE id = ?",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        document
            .map(|d| serde_json::from_str(&d).context("Failed to decode thread document"))
            .transpose()
    }

    fn threads(&self) -> Result<Vec<Thread>> {
        let mut stmt = self.conn.prepare("SELECT document FROM threads")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(serde_json::from_str(&row?).context("Failed to decode thread document")?);
        }
        Ok(result)
    }

    fn interaction(&self, id: &InteractionId) -> Result<Option<Interaction>> {
        let row: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT sort_id, document FROM interactions WHERE id = ?",
                [id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        row.map(|(sort_id, document)| decode_interaction(sort_id, &document))
            .transpose()
    }

    fn interactions(&self, thread_id: &ThreadId) -> Result<Vec<Interaction>> {
        self.load_interactions(
            "SELECT sort_id, document FROM interactions WHERE thread_id = ? ORDER BY sort_id ASC",
            thread_id,
        )
    }

    fn interaction_count(&self, thread_id: &ThreadId) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM interactions WHERE thread_id = ?",
            [thread_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn unread_interaction_count(&self, thread_id: &ThreadId) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM interactions WHERE thread_id = ? AND is_unread = 1",
            [thread_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn latest_interaction(&self, thread_id: &ThreadId) -> Result<Option<Interaction>> {
        let mut latest = self.load_interactions(
            "SELECT sort_id, document FROM interactions WHERE thread_id = ?
             ORDER BY sort_id DESC LIMIT 1",
            thread_id,
        )?;
        Ok(latest.pop())
    }

    fn enumerate_interactions(
        &self,
        thread_id: &ThreadId,
        order: EnumerationOrder,
        visitor: &mut dyn FnMut(&Interaction) -> ControlFlow<()>,
    ) -> Result<()> {
        let sql = match order {
            EnumerationOrder::OldestFirst => {
                "SELECT sort_id, document FROM interactions WHERE thread_id = ? ORDER BY sort_id ASC"
            }
            EnumerationOrder::NewestFirst => {
                "SELECT sort_id, document FROM interactions WHERE thread_id = ? ORDER BY sort_id DESC"
            }
        };
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([thread_id.as_str()])?;
        // Decode lazily so an early break skips the rest of the log
        while let Some(row) = rows.next()? {
            let interaction = decode_interaction(row.get(0)?, &row.get::<_, String>(1)?)?;
            if visitor(&interaction).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn latest_sort_id(&self) -> Result<u64> {
        let seq: Option<i64> = self
            .conn
            .query_row(
                "SELECT seq FROM sqlite_sequence WHERE name = 'interactions'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(seq.unwrap_or(0) as u64)
    }

    fn disappearing_configuration(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Option<DisappearingMessagesConfiguration>> {
        let document: Option<String> = self
            .conn
            .query_row(
                "SELECT document FROM disappearing_messages_configurations WHERE thread_id = ?",
                [thread_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        document
            .map(|d| {
                serde_json::from_str(&d).context("Failed to decode disappearing messages config")
            })
            .transpose()
    }
}

impl WriteTransaction for SqliteTransaction<'_> {
    fn as_read(&self) -> &dyn ReadTransaction {
        self
    }

    fn save_thread(&mut self, thread: &Thread) -> Result<()> {
        self.ensure_in_transaction()?;
        let document = serde_json::to_string(thread)?;
        self.conn.execute(
            "INSERT INTO threads (id, document) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET document = excluded.document",
            params![thread.id.as_str(), document],
        )?;
        Ok(())
    }

    fn remove_thread(&mut self, id: &ThreadId) -> Result<bool> {
        self.ensure_in_transaction()?;
        let removed = self
            .conn
            .execute("DELETE FROM threads WHERE id = ?", [id.as_str()])?;
        Ok(removed > 0)
    }

    fn save_interaction(&mut self, interaction: &mut Interaction) -> Result<()> {
        self.ensure_in_transaction()?;
        let document = serde_json::to_string(interaction)?;

        // ON CONFLICT DO UPDATE keeps the existing row (and its sort_id)
        self.conn.execute(
            "INSERT INTO interactions (id, thread_id, document, is_unread) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                thread_id = excluded.thread_id,
                document = excluded.document,
                is_unread = excluded.is_unread",
            params![
                interaction.id.as_str(),
                interaction.thread_id.as_str(),
                document,
                interaction.is_unread(),
            ],
        )?;

        let sort_id: i64 = self.conn.query_row(
            "SELECT sort_id FROM interactions WHERE id = ?",
            [interaction.id.as_str()],
            |row| row.get(0),
        )?;
        interaction.sort_id = sort_id as u64;
        Ok(())
    }

    fn remove_interaction(&mut self, id: &InteractionId) -> Result<bool> {
        self.ensure_in_transaction()?;
        let removed = self
            .conn
            .execute("DELETE FROM interactions WHERE id = ?", [id.as_str()])?;
        Ok(removed > 0)
    }

    fn remove_interactions_where(
        &mut self,
        thread_id: &ThreadId,
        predicate: &dyn Fn(&Interaction) -> bool,
    ) -> Result<usize> {
        self.ensure_in_transaction()?;
        let doomed: Vec<InteractionId> = self
            .interactions(thread_id)?
            .into_iter()
            .filter(|i| predicate(i))
            .map(|i| i.id)
            .collect();

        let mut stmt = self.conn.prepare("DELETE FROM interactions WHERE id = ?")?;
        for id in &doomed {
            stmt.execute([id.as_str()])?;
        }
        Ok(doomed.len())
    }

    fn save_disappearing_configuration(
        &mut self,
        config: &DisappearingMessagesConfiguration,
    ) -> Result<()> {
        self.ensure_in_transaction()?;
        let document = serde_json::to_string(config)?;
        self.conn.execute(
            "INSERT INTO disappearing_messages_configurations (thread_id, document) VALUES (?, ?)
             ON CONFLICT(thread_id) DO UPDATE SET document = excluded.document",
            params![config.thread_id.as_str(), document],
        )?;
        Ok(())
    }

    fn remove_disappearing_configuration(&mut self, thread_id: &ThreadId) -> Result<bool> {
        self.ensure_in_transaction()?;
        let removed = self.conn.execute(
            "DELETE FROM disappearing_messages_configurations WHERE thread_id = ?",
            [thread_id.as_str()],
        )?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ConversationStoreExt;
    use tempfile::tempdir;

    fn create_test_store() -> (SqliteConversationStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        // Use .test.sqlite extension to clearly distinguish from production databases
        let db_path = dir.path().join("conversation.test.sqlite");
        let store = SqliteConversationStore::new(&db_path).unwrap();
        (store, dir)
    }

    fn make_test_message(id: &str, thread: &Thread) -> Interaction {
        Interaction::builder(InteractionId::new(id), thread.id.clone())
            .incoming("+15550001111")
            .body("Test body")
            .build()
    }

    #[test]
    fn test_thread_crud() {
        let (store, _dir) = create_test_store();
        let thread = Thread::contact("+15550001111");

        store.read_write(|tx| tx.save_thread(&thread)).unwrap();
        let loaded = store.read(|tx| tx.thread(&thread.id)).unwrap();
        assert_eq!(loaded, Some(thread.clone()));

        assert!(store.read_write(|tx| tx.remove_thread(&thread.id)).unwrap());
        assert!(store.read(|tx| tx.thread(&thread.id)).unwrap().is_none());
    }

    #[test]
    fn test_interaction_order_and_counts() {
        let (store, _dir) = create_test_store();
        let thread = Thread::contact("+15550001111");

        store
            .read_write(|tx| {
                for id in ["m1", "m2", "m3"] {
                    tx.save_interaction(&mut make_test_message(id, &thread))?;
                }
                Ok(())
            })
            .unwrap();

        let all = store.read(|tx| tx.interactions(&thread.id)).unwrap();
        let ids: Vec<&str> = all.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
        assert!(all[0].sort_id < all[1].sort_id && all[1].sort_id < all[2].sort_id);

        assert_eq!(store.read(|tx| tx.interaction_count(&thread.id)).unwrap(), 3);
        assert_eq!(store.read(|tx| tx.unread_interaction_count(&thread.id)).unwrap(), 3);
        let latest = store.read(|tx| tx.latest_interaction(&thread.id)).unwrap();
        assert_eq!(latest.unwrap().id.as_str(), "m3");
        assert_eq!(store.read(|tx| tx.latest_sort_id()).unwrap(), all[2].sort_id);
    }

    #[test]
    fn test_update_keeps_sort_id_and_unread_flag() {
        let (store, _dir) = create_test_store();
        let thread = Thread::contact("+15550001111");

        let mut message = make_test_message("m1", &thread);
        store
            .read_write(|tx| tx.save_interaction(&mut message))
            .unwrap();
        let original = message.sort_id;

        message.is_read = true;
        store
            .read_write(|tx| tx.save_interaction(&mut message))
            .unwrap();

        assert_eq!(message.sort_id, original);
        assert_eq!(store.read(|tx| tx.unread_interaction_count(&thread.id)).unwrap(), 0);
    }

    #[test]
    fn test_sort_ids_not_reused_after_delete() {
        let (store, _dir) = create_test_store();
        let thread = Thread::contact("+15550001111");

        let mut first = make_test_message("m1", &thread);
        store.read_write(|tx| tx.save_interaction(&mut first)).unwrap();
        store
            .read_write(|tx| tx.remove_interaction(&first.id))
            .unwrap();

        let mut second = make_test_message("m2", &thread);
        store.read_write(|tx| tx.save_interaction(&mut second)).unwrap();
        assert!(second.sort_id > first.sort_id);
    }

    #[test]
    fn test_failed_block_rolls_back() {
        let (store, _dir) = create_test_store();
        let thread = Thread::contact("+15550001111");

        let result: Result<()> = store.read_write(|tx| {
            tx.save_thread(&thread)?;
            Err(anyhow!("boom"))
        });
        assert!(result.is_err());
        assert!(store.read(|tx| tx.thread(&thread.id)).unwrap().is_none());
    }

    #[test]
    fn test_disappearing_configuration_record() {
        let (store, _dir) = create_test_store();
        let thread_id = ThreadId::new("c+15550001111");
        let config = DisappearingMessagesConfiguration::new(thread_id.clone(), true, 30);

        store
            .read_write(|tx| tx.save_disappearing_configuration(&config))
            .unwrap();
        let loaded = store
            .read(|tx| tx.disappearing_configuration(&thread_id))
            .unwrap();
        assert_eq!(loaded, Some(config));
    }

    #[test]
    fn test_write_outside_transaction_fails() {
        // A bare connection is in autocommit mode
        let conn = Connection::open_in_memory().unwrap();
        let mut handle = SqliteTransaction { conn: &conn };
        let err = handle.save_thread(&Thread::contact("x")).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ThreadError>(),
            Some(&ThreadError::MissingTransaction)
        );
    }

    #[test]
    fn test_reopen_persists() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("conversation.test.sqlite");
        let thread = Thread::contact("+15550001111");

        {
            let store = SqliteConversationStore::new(&db_path).unwrap();
            store
                .read_write(|tx| {
                    tx.save_thread(&thread)?;
                    tx.save_interaction(&mut make_test_message("m1", &thread))
                })
                .unwrap();
        }

        let store = SqliteConversationStore::new(&db_path).unwrap();
        assert!(store.read(|tx| tx.thread(&thread.id)).unwrap().is_some());
        assert_eq!(store.read(|tx| tx.interaction_count(&thread.id)).unwrap(), 1);
    }
}
