//! Per-view data binding.
//!
//! # Responsibility
//! - Attach a view's `once` reads and `live` subscriptions.
//! - Own the disposers of every live subscription until the view is replaced.
//!
//! # Invariants
//! - A combined binding renders only after every path has delivered once;
//!   afterwards each delivery re-renders from the latest snapshots.
//! - Disposing a scope releases all of its subscriptions; no callback of a
//!   disposed scope runs afterwards.

use crate::nav::ViewId;
use crate::store::{DataStore, Disposer, StoreResult};
use log::debug;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Render callback receiving one snapshot per bound path, in binding order.
pub type RenderFn = Rc<dyn Fn(&[Option<Value>])>;

/// Subscriptions and re-render hook owned by the displayed view.
pub struct ViewScope {
    view: ViewId,
    disposers: Vec<Disposer>,
    refresh: Option<Rc<dyn Fn()>>,
}

impl ViewScope {
    pub fn new(view: ViewId) -> Self {
        Self {
            view,
            disposers: Vec::new(),
            refresh: None,
        }
    }

    pub fn view(&self) -> &ViewId {
        &self.view
    }

    pub fn hold(&mut self, disposer: Disposer) {
        self.disposers.push(disposer);
    }

    pub fn live_count(&self) -> usize {
        self.disposers.len()
    }

    /// Installs the hook that re-renders from the cached snapshots.
    pub fn set_refresh(&mut self, refresh: Rc<dyn Fn()>) {
        self.refresh = Some(refresh);
    }

    pub fn refresher(&self) -> Option<Rc<dyn Fn()>> {
        self.refresh.clone()
    }

    /// Releases every live subscription; returns how many were released.
    pub fn dispose(self) -> usize {
        let released = self.disposers.len();
        for disposer in self.disposers {
            disposer.dispose();
        }
        debug!(
            "event=subscription_dispose module=render status=ok view={} released={released}",
            self.view.key()
        );
        released
    }
}

/// Latest snapshot per slot; `None` until a slot has delivered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotSet {
    slots: Vec<Option<Option<Value>>>,
}

impl SnapshotSet {
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    pub fn record(&mut self, slot: usize, value: Option<&Value>) {
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = Some(value.cloned());
        }
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// All snapshots, once every slot has delivered.
    pub fn snapshot(&self) -> Option<Vec<Option<Value>>> {
        self.slots.iter().cloned().collect()
    }
}

/// Live binding: `render` runs whenever any of `paths` changes, once all
/// of them have delivered.
pub fn bind_live(
    store: &dyn DataStore,
    scope: &mut ViewScope,
    paths: &[String],
    render: RenderFn,
) -> StoreResult<()> {
    let snapshots = Rc::new(RefCell::new(SnapshotSet::new(paths.len())));
    for (slot, path) in paths.iter().enumerate() {
        let snapshots = Rc::clone(&snapshots);
        let render = Rc::clone(&render);
        let disposer = store.subscribe(
            path,
            Box::new(move |value| {
                let ready = {
                    let mut snapshots = snapshots.borrow_mut();
                    snapshots.record(slot, value);
                    snapshots.snapshot()
                };
                if let Some(values) = ready {
                    render(&values);
                }
            }),
        )?;
        scope.hold(disposer);
    }

    scope.set_refresh(Rc::new(move || {
        let ready = snapshots.borrow().snapshot();
        if let Some(values) = ready {
            render(&values);
        }
    }));
    Ok(())
}

/// One-shot binding: reads every path now and renders once. Refreshing
/// re-renders the same snapshots without touching the store.
pub fn bind_once(
    store: &dyn DataStore,
    scope: &mut ViewScope,
    paths: &[String],
    render: RenderFn,
) -> StoreResult<()> {
    let values = paths
        .iter()
        .map(|path| store.read(path))
        .collect::<StoreResult<Vec<_>>>()?;
    render(&values);
    scope.set_refresh(Rc::new(move || render(&values)));
    Ok(())
}

/// Static view: renders once, refreshes by rendering again.
pub fn bind_static(scope: &mut ViewScope, render: Rc<dyn Fn()>) {
    render();
    scope.set_refresh(render);
}

#[cfg(test)]
mod tests {
    use super::{bind_live, bind_once, SnapshotSet, ViewScope};
    use crate::nav::ViewId;
    use crate::store::{DataStore, SqliteDataStore};
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn snapshot_set_waits_for_every_slot() {
        let mut set = SnapshotSet::new(2);
        set.record(1, Some(&json!(1)));
        assert!(set.snapshot().is_none());
        set.record(0, None);
        assert!(set.is_complete());
        assert_eq!(set.snapshot(), Some(vec![None, Some(json!(1))]));
    }

    #[test]
    fn live_binding_renders_combined_snapshots_until_disposed() {
        let store = SqliteDataStore::open_in_memory().expect("store");
        store.write("lessons/1/title", json!("Intro")).expect("seed");
        let renders: Rc<RefCell<Vec<Vec<Option<Value>>>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&renders);

        let mut scope = ViewScope::new(ViewId::Dashboard);
        bind_live(
            &store,
            &mut scope,
            &["lessons".to_string(), "students/u1/progress".to_string()],
            Rc::new(move |values| sink.borrow_mut().push(values.to_vec())),
        )
        .expect("bind");
        assert_eq!(renders.borrow().len(), 1);
        assert_eq!(scope.live_count(), 2);

        store
            .write("students/u1/progress/Intro", json!(100))
            .expect("progress write");
        assert_eq!(renders.borrow().len(), 2);
        assert_eq!(renders.borrow()[1][1], Some(json!({"Intro": 100})));

        scope.refresher().expect("refresh hook")();
        assert_eq!(renders.borrow().len(), 3);

        assert_eq!(scope.dispose(), 2);
        assert_eq!(store.listener_count(), 0);
        store.write("lessons/2/title", json!("More")).expect("write");
        assert_eq!(renders.borrow().len(), 3);
    }

    #[test]
    fn once_binding_detaches_immediately() {
        let store = SqliteDataStore::open_in_memory().expect("store");
        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        let mut scope = ViewScope::new(ViewId::Admin);
        bind_once(
            &store,
            &mut scope,
            &["adminSettings".to_string()],
            Rc::new(move |_| *sink.borrow_mut() += 1),
        )
        .expect("bind");
        store
            .write("adminSettings/currencySymbol", json!("$"))
            .expect("write");
        assert_eq!(*count.borrow(), 1);
        assert_eq!(scope.live_count(), 0);
        assert_eq!(store.listener_count(), 0);
    }
}
