//! Live-subscription bookkeeping shared by store implementations.

use super::path::affects;
use super::Disposer;
use log::debug;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

pub(crate) type SharedCallback = Rc<dyn Fn(Option<&Value>)>;

struct Listener {
    path: String,
    callback: SharedCallback,
}

/// Registry of live listeners keyed by a monotonically increasing id.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: u64,
    entries: BTreeMap<u64, Listener>,
}

impl ListenerRegistry {
    pub(crate) fn new_shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::default()))
    }

    /// Registers a listener and returns the disposer that removes it.
    pub(crate) fn register(
        registry: &Rc<RefCell<Self>>,
        path: String,
        callback: SharedCallback,
    ) -> (u64, Disposer) {
        let id = {
            let mut inner = registry.borrow_mut();
            inner.next_id += 1;
            let id = inner.next_id;
            inner.entries.insert(id, Listener { path, callback });
            id
        };

        let weak: Weak<RefCell<Self>> = Rc::downgrade(registry);
        let disposer = Disposer::new(move || {
            if let Some(registry) = weak.upgrade() {
                if registry.borrow_mut().entries.remove(&id).is_some() {
                    debug!("event=subscription_release module=store status=ok id={id}");
                }
            }
        });
        (id, disposer)
    }

    pub(crate) fn is_registered(&self, id: u64) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Listeners affected by any of `changed`, in registration order.
    pub(crate) fn affected_by(&self, changed: &[String]) -> Vec<(u64, String, SharedCallback)> {
        self.entries
            .iter()
            .filter(|(_, listener)| {
                changed
                    .iter()
                    .any(|changed_path| affects(changed_path, &listener.path))
            })
            .map(|(id, listener)| (*id, listener.path.clone(), Rc::clone(&listener.callback)))
            .collect()
    }
}
