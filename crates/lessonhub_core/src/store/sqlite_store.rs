//! SQLite-backed hierarchical store.
//!
//! # Responsibility
//! - Persist the JSON tree as one row per leaf (`store_nodes`).
//! - Reassemble objects on read and fan out change notifications.
//!
//! # Invariants
//! - A stored path is never both a leaf and the ancestor of another leaf.
//! - Objects and empty arrays are never stored as leaves; arrays are.
//! - Subtree scans use the `path > 'p/' AND path < 'p0'` range, never `LIKE`,
//!   because keys routinely contain `_`.

use super::listeners::{ListenerRegistry, SharedCallback};
use super::path::{self, ancestors, join, normalize, validate_key};
use super::{DataStore, Disposer, SnapshotCallback, StoreError, StoreResult};
use crate::db::{open_db, open_db_in_memory};
use log::{debug, warn};
use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// Local implementation of [`DataStore`] over one SQLite connection.
pub struct SqliteDataStore {
    conn: Connection,
    listeners: Rc<RefCell<ListenerRegistry>>,
}

impl SqliteDataStore {
    /// Wraps an already migrated connection (see [`crate::db::open_db`]).
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            listeners: ListenerRegistry::new_shared(),
        }
    }

    pub fn open(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::new(open_db(db_path)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    /// Number of live subscriptions currently registered.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn read_normalized(&self, target: &str) -> StoreResult<Option<Value>> {
        if !target.is_empty() {
            if let Some(json) = self.leaf_at(target)? {
                return decode_leaf(target, &json).map(Some);
            }
        }

        let rows = self.subtree_rows(target)?;
        if !rows.is_empty() {
            return assemble(target, rows).map(Some);
        }

        // Arrays are stored whole; a path inside one resolves through its leaf.
        for ancestor in ancestors(target) {
            if let Some(json) = self.leaf_at(ancestor)? {
                let value = decode_leaf(ancestor, &json)?;
                let rest = &target[ancestor.len() + 1..];
                return Ok(descend(&value, rest));
            }
        }
        Ok(None)
    }

    fn leaf_at(&self, leaf_path: &str) -> StoreResult<Option<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT value_json FROM store_nodes WHERE path = ?1;")?;
        let mut rows = stmt.query([leaf_path])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    fn subtree_rows(&self, root: &str) -> StoreResult<Vec<(String, String)>> {
        let mut out = Vec::new();
        if root.is_empty() {
            let mut stmt = self
                .conn
                .prepare_cached("SELECT path, value_json FROM store_nodes ORDER BY path;")?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                out.push((row.get(0)?, row.get(1)?));
            }
        } else {
            let (lower, upper) = subtree_bounds(root);
            let mut stmt = self.conn.prepare_cached(
                "SELECT path, value_json FROM store_nodes
                 WHERE path > ?1 AND path < ?2
                 ORDER BY path;",
            )?;
            let mut rows = stmt.query(params![lower, upper])?;
            while let Some(row) = rows.next()? {
                out.push((row.get(0)?, row.get(1)?));
            }
        }
        Ok(out)
    }

    /// Applies normalized `(path, value)` replacements atomically, then
    /// notifies affected listeners.
    fn apply(&self, writes: Vec<(String, Value)>) -> StoreResult<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let changed: Vec<String> = writes.iter().map(|(target, _)| target.clone()).collect();
        let tx = self.conn.unchecked_transaction()?;
        for (target, value) in writes {
            replace_subtree(&tx, &target, value)?;
        }
        tx.commit()?;

        debug!(
            "event=store_write module=store status=ok paths={}",
            changed.len()
        );
        self.notify(&changed);
        Ok(())
    }

    fn notify(&self, changed: &[String]) {
        let affected = self.listeners.borrow().affected_by(changed);
        for (id, listened, callback) in affected {
            // An earlier callback in this round may have released this one.
            if !self.listeners.borrow().is_registered(id) {
                continue;
            }
            match self.read_normalized(&listened) {
                Ok(value) => callback(value.as_ref()),
                Err(err) => warn!(
                    "event=subscription_deliver module=store status=error id={id} error={err}"
                ),
            }
        }
    }
}

impl DataStore for SqliteDataStore {
    fn read(&self, target: &str) -> StoreResult<Option<Value>> {
        let normalized = normalize(target)?;
        self.read_normalized(&normalized)
    }

    fn subscribe(&self, target: &str, callback: SnapshotCallback) -> StoreResult<Disposer> {
        let normalized = normalize(target)?;
        let callback: SharedCallback = Rc::from(callback);
        let (id, disposer) =
            ListenerRegistry::register(&self.listeners, normalized.clone(), Rc::clone(&callback));
        debug!("event=subscription_attach module=store status=ok id={id}");

        let current = self.read_normalized(&normalized)?;
        callback(current.as_ref());
        Ok(disposer)
    }

    fn write(&self, target: &str, value: Value) -> StoreResult<()> {
        let normalized = normalize(target)?;
        self.apply(vec![(normalized, value)])
    }

    fn patch(&self, target: &str, partial: Map<String, Value>) -> StoreResult<()> {
        let base = normalize(target)?;
        let mut writes = Vec::with_capacity(partial.len());
        for (key, value) in partial {
            let relative = normalize(&key)?;
            if relative.is_empty() {
                return Err(StoreError::InvalidPath(
                    "patch keys must not be empty".to_string(),
                ));
            }
            writes.push((join(&base, &relative), value));
        }
        self.apply(writes)
    }

    fn append(&self, target: &str, record: Value) -> StoreResult<String> {
        let base = normalize(target)?;
        let key = path::generate_push_key();
        self.apply(vec![(join(&base, &key), record)])?;
        Ok(key)
    }
}

fn subtree_bounds(root: &str) -> (String, String) {
    // '0' is the byte right after '/', so [root/, root0) is exactly the subtree.
    (format!("{root}/"), format!("{root}0"))
}

fn replace_subtree(conn: &Connection, target: &str, value: Value) -> StoreResult<()> {
    if target.is_empty() {
        conn.execute("DELETE FROM store_nodes;", [])?;
    } else {
        let (lower, upper) = subtree_bounds(target);
        conn.execute("DELETE FROM store_nodes WHERE path = ?1;", [target])?;
        conn.execute(
            "DELETE FROM store_nodes WHERE path > ?1 AND path < ?2;",
            params![lower, upper],
        )?;
    }

    let mut leaves = Vec::new();
    flatten(target, value, &mut leaves)?;
    if leaves.is_empty() {
        return Ok(());
    }

    // A leaf above the new subtree would violate the leaf/ancestor invariant.
    for ancestor in ancestors(target) {
        conn.execute("DELETE FROM store_nodes WHERE path = ?1;", [ancestor])?;
    }
    let mut insert = conn.prepare_cached(
        "INSERT INTO store_nodes (path, value_json) VALUES (?1, ?2);",
    )?;
    for (leaf_path, json) in leaves {
        insert.execute(params![leaf_path, json])?;
    }
    Ok(())
}

fn flatten(prefix: &str, value: Value, out: &mut Vec<(String, String)>) -> StoreResult<()> {
    match value {
        Value::Null => Ok(()),
        Value::Object(map) => {
            for (key, child) in map {
                validate_key(&key)?;
                flatten(&join(prefix, &key), child, out)?;
            }
            Ok(())
        }
        Value::Array(items) if items.is_empty() => Ok(()),
        leaf => {
            if prefix.is_empty() {
                return Err(StoreError::InvalidPath(
                    "the root can only hold an object".to_string(),
                ));
            }
            out.push((prefix.to_string(), serde_json::to_string(&leaf)?));
            Ok(())
        }
    }
}

fn decode_leaf(leaf_path: &str, json: &str) -> StoreResult<Value> {
    serde_json::from_str(json).map_err(|err| {
        StoreError::InvalidData(format!("leaf `{leaf_path}` is not valid JSON: {err}"))
    })
}

fn assemble(root: &str, rows: Vec<(String, String)>) -> StoreResult<Value> {
    let mut tree = Map::new();
    for (row_path, json) in rows {
        let value = decode_leaf(&row_path, &json)?;
        let relative = if root.is_empty() {
            row_path.as_str()
        } else {
            &row_path[root.len() + 1..]
        };
        insert_at(&mut tree, relative, value);
    }
    Ok(Value::Object(tree))
}

fn insert_at(tree: &mut Map<String, Value>, relative: &str, value: Value) {
    match relative.split_once('/') {
        None => {
            tree.insert(relative.to_string(), value);
        }
        Some((head, rest)) => {
            let child = tree
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                insert_at(map, rest, value);
            }
        }
    }
}

fn descend(value: &Value, rest: &str) -> Option<Value> {
    let mut current = value;
    for segment in rest.split('/') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if current.is_null() {
        None
    } else {
        Some(current.clone())
    }
}
