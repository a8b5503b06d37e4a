//! Per-user notification feed.
//!
//! # Responsibility
//! - Mirror `notifications/<uid>` into a local cache through one live
//!   subscription and keep the unread count current.
//! - Mark records read, individually or in one batched root patch.
//!
//! # Invariants
//! - Every cached record carries its store key as `id`.
//! - `read` only moves from `false` to `true`; no operation here clears it.
//! - Rendered lists are ordered by timestamp descending, ties by id
//!   descending, so output is deterministic for a given cache.

use crate::model::notification::{NotificationDraft, NotificationFilter, NotificationRecord};
use crate::model::{children, now_millis};
use crate::store::{path, DataStore, Disposer, StoreResult};
use log::{debug, info};
use serde_json::{json, Map};
use std::cell::RefCell;
use std::rc::Rc;

type ChangeHook = Rc<dyn Fn(usize)>;

#[derive(Debug, Default)]
struct FeedCache {
    user_id: Option<String>,
    records: Vec<NotificationRecord>,
    unread: usize,
}

impl FeedCache {
    fn replace(&mut self, records: Vec<NotificationRecord>) {
        self.unread = records.iter().filter(|record| !record.read).count();
        self.records = records;
    }
}

pub struct NotificationFeed {
    store: Rc<dyn DataStore>,
    cache: Rc<RefCell<FeedCache>>,
    on_change: Rc<RefCell<Option<ChangeHook>>>,
    subscription: RefCell<Option<Disposer>>,
}

impl NotificationFeed {
    pub fn new(store: Rc<dyn DataStore>) -> Self {
        Self {
            store,
            cache: Rc::new(RefCell::new(FeedCache::default())),
            on_change: Rc::new(RefCell::new(None)),
            subscription: RefCell::new(None),
        }
    }

    /// Hook invoked with the unread count after every cache replacement.
    pub fn set_on_change(&self, hook: impl Fn(usize) + 'static) {
        *self.on_change.borrow_mut() = Some(Rc::new(hook));
    }

    /// Starts mirroring `notifications/<user_id>`, replacing any previous
    /// subscription. The cache is filled before this returns.
    pub fn listen(&self, user_id: &str) -> StoreResult<()> {
        self.stop();
        self.cache.borrow_mut().user_id = Some(user_id.to_string());

        let cache = Rc::clone(&self.cache);
        let on_change = Rc::clone(&self.on_change);
        let disposer = self.store.subscribe(
            &path::notifications(user_id),
            Box::new(move |snapshot| {
                let records = children(snapshot)
                    .into_iter()
                    .map(|(id, record)| NotificationRecord::from_value(&id, record))
                    .collect();
                let unread = {
                    let mut cache = cache.borrow_mut();
                    cache.replace(records);
                    cache.unread
                };
                debug!("event=notifications_update module=feed status=ok unread={unread}");
                let hook = on_change.borrow().clone();
                if let Some(hook) = hook {
                    hook(unread);
                }
            }),
        )?;
        *self.subscription.borrow_mut() = Some(disposer);
        Ok(())
    }

    /// Detaches the subscription and empties the cache.
    pub fn stop(&self) {
        let previous = self.subscription.borrow_mut().take();
        if let Some(disposer) = previous {
            disposer.dispose();
        }
        *self.cache.borrow_mut() = FeedCache::default();
    }

    pub fn is_listening(&self) -> bool {
        self.subscription.borrow().is_some()
    }

    /// Cached records in store key order.
    pub fn records(&self) -> Vec<NotificationRecord> {
        self.cache.borrow().records.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.cache.borrow().unread
    }

    /// Records admitted by `filter`, newest first.
    pub fn render(&self, filter: NotificationFilter) -> Vec<NotificationRecord> {
        let mut records: Vec<NotificationRecord> = self
            .cache
            .borrow()
            .records
            .iter()
            .filter(|record| filter.admits(record))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.ts.cmp(&a.ts).then_with(|| b.id.cmp(&a.id)));
        records
    }

    /// Flags every cached unread record of `user_id` as read in one root
    /// patch. Returns how many records were included; `0` writes nothing.
    pub fn mark_all_read(&self, user_id: &str) -> StoreResult<usize> {
        let unread_ids: Vec<String> = {
            let cache = self.cache.borrow();
            if cache.user_id.as_deref() != Some(user_id) {
                Vec::new()
            } else {
                cache
                    .records
                    .iter()
                    .filter(|record| !record.read)
                    .map(|record| record.id.clone())
                    .collect()
            }
        };
        if unread_ids.is_empty() {
            debug!("event=notifications_mark_all_read module=feed status=skipped");
            return Ok(0);
        }

        let mut batch = Map::new();
        for id in &unread_ids {
            batch.insert(
                format!("{}/read", path::notification(user_id, id)),
                json!(true),
            );
        }
        self.store.patch("", batch)?;
        info!(
            "event=notifications_mark_all_read module=feed status=ok count={}",
            unread_ids.len()
        );
        Ok(unread_ids.len())
    }

    pub fn mark_read(&self, user_id: &str, id: &str) -> StoreResult<()> {
        let mut patch = Map::new();
        patch.insert("read".to_string(), json!(true));
        self.store.patch(&path::notification(user_id, id), patch)
    }

    /// Marks the record read if needed and returns the fragment to open.
    pub fn activate(&self, user_id: &str, id: &str) -> StoreResult<Option<String>> {
        let record = self
            .cache
            .borrow()
            .records
            .iter()
            .find(|record| record.id == id)
            .cloned();
        let Some(record) = record else {
            return Ok(None);
        };
        if !record.read {
            self.mark_read(user_id, id)?;
        }
        Ok(record.target_fragment())
    }
}

/// Appends a notification for `user_id`; returns the generated id.
pub fn create_notification(
    store: &dyn DataStore,
    user_id: &str,
    draft: &NotificationDraft,
) -> StoreResult<String> {
    let id = store.append(&path::notifications(user_id), draft.to_record(now_millis()))?;
    debug!(
        "event=notification_create module=feed status=ok type={}",
        draft.kind
    );
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::{create_notification, NotificationFeed};
    use crate::model::notification::{NotificationDraft, NotificationFilter};
    use crate::store::{DataStore, SqliteDataStore};
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    fn seeded() -> Rc<SqliteDataStore> {
        let store = SqliteDataStore::open_in_memory().expect("store");
        store
            .write(
                "notifications/u1",
                json!({
                    "n1": {"type": "comment", "message": "a", "read": false, "ts": 10},
                    "n2": {"type": "reaction", "message": "b", "read": true, "ts": 30},
                    "n3": {"message": "c", "read": false, "ts": 20, "link": "/feedback/p1"}
                }),
            )
            .expect("seed");
        Rc::new(store)
    }

    #[test]
    fn listen_fills_cache_and_notifies_hook() {
        let store = seeded();
        let feed = NotificationFeed::new(store.clone());
        let seen = Rc::new(Cell::new(usize::MAX));
        let sink = Rc::clone(&seen);
        feed.set_on_change(move |unread| sink.set(unread));

        feed.listen("u1").expect("listen");
        assert_eq!(feed.unread_count(), 2);
        assert_eq!(seen.get(), 2);
        let ids: Vec<String> = feed.records().into_iter().map(|record| record.id).collect();
        assert_eq!(ids, vec!["n1", "n2", "n3"]);

        let ordered: Vec<i64> = feed
            .render(NotificationFilter::All)
            .iter()
            .map(|record| record.ts)
            .collect();
        assert_eq!(ordered, vec![30, 20, 10]);
    }

    #[test]
    fn mark_all_read_is_a_single_idempotent_patch() {
        let store = seeded();
        let feed = NotificationFeed::new(store.clone());
        feed.listen("u1").expect("listen");

        assert_eq!(feed.mark_all_read("u1").expect("first"), 2);
        assert_eq!(feed.unread_count(), 0);
        assert_eq!(feed.mark_all_read("u1").expect("second"), 0);
        assert_eq!(
            store.read("notifications/u1/n1/read").expect("read"),
            Some(json!(true))
        );
    }

    #[test]
    fn activate_marks_read_and_normalizes_link() {
        let store = seeded();
        let feed = NotificationFeed::new(store.clone());
        feed.listen("u1").expect("listen");

        let fragment = feed.activate("u1", "n3").expect("activate");
        assert_eq!(fragment.as_deref(), Some("#/feedback/p1"));
        assert_eq!(feed.unread_count(), 1);
        assert_eq!(feed.activate("u1", "missing").expect("missing"), None);
    }

    #[test]
    fn created_notifications_reach_the_cache() {
        let store = seeded();
        let feed = NotificationFeed::new(store.clone());
        feed.listen("u1").expect("listen");
        create_notification(
            &*store,
            "u1",
            &NotificationDraft::new("new-lesson", "New lesson").with_link("#/lesson/1"),
        )
        .expect("create");
        assert_eq!(feed.unread_count(), 3);
        assert_eq!(feed.records().len(), 4);

        feed.stop();
        assert!(!feed.is_listening());
        assert!(feed.records().is_empty());
    }
}
