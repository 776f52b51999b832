//! Item store and list resolution
//!
//! Items are appended to lists and read back in insertion order. Positions
//! are assigned on read by enumerating `items` in id order, so they are always
//! 1-based, gap-free and stable. Writers hold the connection lock for the
//! whole transaction, which serializes appends to the same list.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use tracing::{debug, info};

use crate::types::{Item, ItemText, List, ListId, ListView};
use crate::{Database, Error, Result};

/// Durable, ordered store of to-do items grouped by list
#[derive(Clone)]
pub struct ItemStore {
    db: Database,
}

impl ItemStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open a store backed by the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    /// Open a store backed by a private in-memory database
    pub fn open_memory() -> Result<Self> {
        Ok(Self::new(Database::open_memory()?))
    }

    // ========================================================================
    // Lists
    // ========================================================================

    /// Create an empty list with a fresh identity
    pub fn create_list(&self) -> Result<List> {
        let conn = self.db.connection();
        let conn = conn.lock();
        let list = insert_list(&conn)?;
        info!("Created list {}", list.id);
        Ok(list)
    }

    /// Look up a list by id
    pub fn get_list(&self, id: ListId) -> Result<Option<List>> {
        let conn = self.db.connection();
        let conn = conn.lock();
        select_list(&conn, id)
    }

    /// Resolve an id to an existing list, failing with `NotFound` otherwise
    pub fn resolve(&self, id: ListId) -> Result<List> {
        self.get_list(id)?.ok_or_else(|| Error::list_not_found(id))
    }

    /// Number of lists ever created
    pub fn list_count(&self) -> Result<usize> {
        let conn = self.db.connection();
        let conn = conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM lists", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ========================================================================
    // Items
    // ========================================================================

    /// Create a new list holding `text` as its first item.
    ///
    /// Both rows are written in one transaction; a failure leaves no list
    /// behind.
    pub fn start_list(&self, text: &ItemText) -> Result<Item> {
        let conn = self.db.connection();
        let mut conn = conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let list = insert_list(&tx)?;
        let item = insert_item(&tx, list.id, text)?;
        tx.commit()?;

        info!("Started list {} with first item", list.id);
        Ok(item)
    }

    /// Append `text` to an existing list and return the stored item with its
    /// position.
    pub fn append_item(&self, list_id: ListId, text: &ItemText) -> Result<Item> {
        let conn = self.db.connection();
        let mut conn = conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if select_list(&tx, list_id)?.is_none() {
            return Err(Error::list_not_found(list_id));
        }
        let item = insert_item(&tx, list_id, text)?;
        tx.commit()?;

        debug!("Appended item {} to list {}", item.position, list_id);
        Ok(item)
    }

    /// Items of a list in insertion order. An unknown list has no items.
    pub fn items(&self, list_id: ListId) -> Result<Vec<Item>> {
        let conn = self.db.connection();
        let conn = conn.lock();
        select_items(&conn, list_id)
    }

    /// A list and its items, read under one lock
    pub fn view(&self, list_id: ListId) -> Result<ListView> {
        let conn = self.db.connection();
        let conn = conn.lock();
        let list = select_list(&conn, list_id)?.ok_or_else(|| Error::list_not_found(list_id))?;
        let items = select_items(&conn, list_id)?;
        Ok(ListView { list, items })
    }
}

fn insert_list(conn: &Connection) -> Result<List> {
    let now = Utc::now().timestamp();
    conn.execute("INSERT INTO lists (created_at) VALUES (?1)", params![now])?;
    Ok(List {
        id: ListId::new(conn.last_insert_rowid()),
        created_at: now,
    })
}

fn select_list(conn: &Connection, id: ListId) -> Result<Option<List>> {
    let list = conn
        .query_row(
            "SELECT id, created_at FROM lists WHERE id = ?1",
            params![id.get()],
            |row| {
                Ok(List {
                    id: ListId::new(row.get(0)?),
                    created_at: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(list)
}

fn insert_item(conn: &Connection, list_id: ListId, text: &ItemText) -> Result<Item> {
    let now = Utc::now().timestamp();
    conn.execute(
        "INSERT INTO items (list_id, text, created_at) VALUES (?1, ?2, ?3)",
        params![list_id.get(), text.as_str(), now],
    )?;
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM items WHERE list_id = ?1",
        params![list_id.get()],
        |row| row.get(0),
    )?;
    Ok(Item {
        list_id,
        position: count as usize,
        text: text.as_str().to_string(),
        created_at: now,
    })
}

fn select_items(conn: &Connection, list_id: ListId) -> Result<Vec<Item>> {
    let mut stmt =
        conn.prepare("SELECT text, created_at FROM items WHERE list_id = ?1 ORDER BY id")?;
    let rows = stmt.query_map(params![list_id.get()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut items = Vec::new();
    for (idx, row) in rows.enumerate() {
        let (text, created_at) = row?;
        items.push(Item {
            list_id,
            position: idx + 1,
            text,
            created_at,
        });
    }
    Ok(items)
}
