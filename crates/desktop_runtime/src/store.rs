//! Reactive desktop state store.
//!
//! All window-manager state lives in a single [`DesktopState`] value owned by
//! the store. Mutations replace whole entries, never patch them in place, so
//! a snapshot handed to a subscriber is never mutated behind its back.
//! Notifications are batched: every mutation records the change under its
//! [`StatePath`] and delivery happens once per frame (or synchronously when
//! the outermost [`StateStore::batch`] call returns), with only the latest
//! change per path surviving a burst of writes.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use desktop_contract::{Scheduler, WindowId, WindowRecord};
use thiserror::Error;

use crate::model::DesktopState;

/// Addressable regions of the desktop state tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatePath {
    /// The whole window collection. Notified on insert, remove, and on any
    /// change to an individual window.
    Windows,
    /// A single window entry.
    Window(WindowId),
    ActiveWindow,
    HudVisible,
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => write!(f, "windows"),
            Self::Window(id) => write!(f, "windows.{id}"),
            Self::ActiveWindow => write!(f, "active_window"),
            Self::HudVisible => write!(f, "hud_visible"),
        }
    }
}

/// Change payload delivered to subscribers; carries both the new and the
/// replaced value.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    Windows {
        new: Vec<WindowRecord>,
        old: Vec<WindowRecord>,
    },
    Window {
        id: WindowId,
        new: Option<WindowRecord>,
        old: Option<WindowRecord>,
    },
    ActiveWindow {
        new: Option<WindowId>,
        old: Option<WindowId>,
    },
    HudVisible {
        new: bool,
        old: bool,
    },
}

impl StateChange {
    pub fn path(&self) -> StatePath {
        match self {
            Self::Windows { .. } => StatePath::Windows,
            Self::Window { id, .. } => StatePath::Window(*id),
            Self::ActiveWindow { .. } => StatePath::ActiveWindow,
            Self::HudVisible { .. } => StatePath::HudVisible,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("no window at `{0}`")]
    MissingWindow(StatePath),
    #[error("window already present at `{0}`")]
    DuplicateWindow(StatePath),
}

type SubscriberCallback = Rc<dyn Fn(&StateChange)>;

struct Subscriber {
    id: u64,
    callback: SubscriberCallback,
}

struct StoreShared {
    state: RefCell<DesktopState>,
    subscribers: RefCell<HashMap<StatePath, Vec<Subscriber>>>,
    next_subscriber: Cell<u64>,
    pending: RefCell<BTreeMap<StatePath, StateChange>>,
    flush_scheduled: Cell<bool>,
    batch_depth: Cell<u32>,
    scheduler: Rc<dyn Scheduler>,
}

/// Handle owning one subscription; dropping it (or calling
/// [`StoreSubscription::unsubscribe`]) stops delivery.
pub struct StoreSubscription {
    unregister: Rc<dyn Fn()>,
    active: Rc<Cell<bool>>,
}

impl StoreSubscription {
    pub fn unsubscribe(&self) {
        if self.active.get() {
            self.active.set(false);
            (self.unregister)();
        }
    }
}

impl Drop for StoreSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Shared-handle state store; clones observe and mutate the same state.
#[derive(Clone)]
pub struct StateStore {
    shared: Rc<StoreShared>,
}

impl StateStore {
    pub fn new(scheduler: Rc<dyn Scheduler>) -> Self {
        Self {
            shared: Rc::new(StoreShared {
                state: RefCell::new(DesktopState::default()),
                subscribers: RefCell::new(HashMap::new()),
                next_subscriber: Cell::new(0),
                pending: RefCell::new(BTreeMap::new()),
                flush_scheduled: Cell::new(false),
                batch_depth: Cell::new(0),
                scheduler,
            }),
        }
    }

    pub fn snapshot(&self) -> DesktopState {
        self.shared.state.borrow().clone()
    }

    pub fn windows(&self) -> Vec<WindowRecord> {
        self.shared.state.borrow().windows.clone()
    }

    pub fn window(&self, id: WindowId) -> Option<WindowRecord> {
        self.shared.state.borrow().window(id).cloned()
    }

    pub fn open_count(&self) -> usize {
        self.shared.state.borrow().windows.len()
    }

    pub fn active_window(&self) -> Option<WindowId> {
        self.shared.state.borrow().active_window
    }

    pub fn hud_visible(&self) -> bool {
        self.shared.state.borrow().hud_visible
    }

    /// Hands out the next window id and advances the counter.
    pub fn allocate_window_id(&self) -> WindowId {
        let mut state = self.shared.state.borrow_mut();
        let id = WindowId(state.next_window_id);
        state.next_window_id += 1;
        id
    }

    /// Registers `callback` for changes under `path`. Delivery order within a
    /// path follows registration order.
    pub fn subscribe(
        &self,
        path: StatePath,
        callback: impl Fn(&StateChange) + 'static,
    ) -> StoreSubscription {
        let id = self.shared.next_subscriber.get();
        self.shared.next_subscriber.set(id + 1);
        self.shared
            .subscribers
            .borrow_mut()
            .entry(path)
            .or_default()
            .push(Subscriber {
                id,
                callback: Rc::new(callback),
            });

        let weak = Rc::downgrade(&self.shared);
        let active = Rc::new(Cell::new(true));
        StoreSubscription {
            unregister: Rc::new(move || {
                if let Some(shared) = weak.upgrade() {
                    let mut subscribers = shared.subscribers.borrow_mut();
                    if let Some(entries) = subscribers.get_mut(&path) {
                        entries.retain(|subscriber| subscriber.id != id);
                    }
                }
            }),
            active,
        }
    }

    /// Runs `mutate` with notifications held back, then delivers one round of
    /// coalesced changes synchronously when the outermost batch returns.
    pub fn batch<R>(&self, mutate: impl FnOnce() -> R) -> R {
        self.shared.batch_depth.set(self.shared.batch_depth.get() + 1);
        let result = mutate();
        self.shared.batch_depth.set(self.shared.batch_depth.get() - 1);
        if self.shared.batch_depth.get() == 0 && !self.shared.pending.borrow().is_empty() {
            self.flush();
        }
        result
    }

    /// Inserts a window; fails if the id is already present.
    pub fn insert_window(&self, record: WindowRecord) -> Result<(), StateError> {
        let id = record.id;
        let (old_windows, new_windows) = {
            let mut state = self.shared.state.borrow_mut();
            if state.window(id).is_some() {
                return Err(StateError::DuplicateWindow(StatePath::Window(id)));
            }
            let old_windows = state.windows.clone();
            let mut windows = old_windows.clone();
            windows.push(record.clone());
            state.windows = windows.clone();
            (old_windows, windows)
        };
        self.record_change(StateChange::Window {
            id,
            new: Some(record),
            old: None,
        });
        self.record_change(StateChange::Windows {
            new: new_windows,
            old: old_windows,
        });
        Ok(())
    }

    /// Applies `mutate` to a copy of the window and swaps the copy in. A
    /// mutation that leaves the record identical is a silent no-op. Returns
    /// the record now in the store.
    pub fn update_window(
        &self,
        id: WindowId,
        mutate: impl FnOnce(&mut WindowRecord),
    ) -> Result<WindowRecord, StateError> {
        let (old_record, new_record, old_windows, new_windows) = {
            let mut state = self.shared.state.borrow_mut();
            let index = state
                .window_index(id)
                .ok_or(StateError::MissingWindow(StatePath::Window(id)))?;
            let old_record = state.windows[index].clone();
            let mut new_record = old_record.clone();
            mutate(&mut new_record);
            if new_record == old_record {
                return Ok(old_record);
            }
            let old_windows = state.windows.clone();
            let mut windows = old_windows.clone();
            windows[index] = new_record.clone();
            state.windows = windows.clone();
            (old_record, new_record, old_windows, windows)
        };
        self.record_change(StateChange::Window {
            id,
            new: Some(new_record.clone()),
            old: Some(old_record),
        });
        self.record_change(StateChange::Windows {
            new: new_windows,
            old: old_windows,
        });
        Ok(new_record)
    }

    /// Removes a window and returns the removed record.
    pub fn remove_window(&self, id: WindowId) -> Result<WindowRecord, StateError> {
        let (removed, old_windows, new_windows) = {
            let mut state = self.shared.state.borrow_mut();
            let index = state
                .window_index(id)
                .ok_or(StateError::MissingWindow(StatePath::Window(id)))?;
            let old_windows = state.windows.clone();
            let mut windows = old_windows.clone();
            let removed = windows.remove(index);
            state.windows = windows.clone();
            (removed, old_windows, windows)
        };
        self.record_change(StateChange::Window {
            id,
            new: None,
            old: Some(removed.clone()),
        });
        self.record_change(StateChange::Windows {
            new: new_windows,
            old: old_windows,
        });
        Ok(removed)
    }

    /// Replaces the whole collection, used when hydrating from storage. The
    /// id counter is advanced past the highest id present.
    pub fn replace_windows(&self, windows: Vec<WindowRecord>) {
        let old_windows = {
            let mut state = self.shared.state.borrow_mut();
            let old_windows = std::mem::replace(&mut state.windows, windows.clone());
            let max_id = state.windows.iter().map(|window| window.id.0).max();
            if let Some(max_id) = max_id {
                state.next_window_id = state.next_window_id.max(max_id + 1);
            }
            old_windows
        };
        if old_windows == windows {
            return;
        }
        for record in &old_windows {
            if !windows.iter().any(|window| window.id == record.id) {
                self.record_change(StateChange::Window {
                    id: record.id,
                    new: None,
                    old: Some(record.clone()),
                });
            }
        }
        for record in &windows {
            let old = old_windows
                .iter()
                .find(|window| window.id == record.id)
                .cloned();
            if old.as_ref() != Some(record) {
                self.record_change(StateChange::Window {
                    id: record.id,
                    new: Some(record.clone()),
                    old,
                });
            }
        }
        self.record_change(StateChange::Windows {
            new: windows,
            old: old_windows,
        });
    }

    pub fn set_active_window(&self, active: Option<WindowId>) {
        let old = {
            let mut state = self.shared.state.borrow_mut();
            if state.active_window == active {
                return;
            }
            std::mem::replace(&mut state.active_window, active)
        };
        self.record_change(StateChange::ActiveWindow { new: active, old });
    }

    pub fn set_hud_visible(&self, visible: bool) {
        let old = {
            let mut state = self.shared.state.borrow_mut();
            if state.hud_visible == visible {
                return;
            }
            std::mem::replace(&mut state.hud_visible, visible)
        };
        self.record_change(StateChange::HudVisible { new: visible, old });
    }

    fn record_change(&self, change: StateChange) {
        self.shared.pending.borrow_mut().insert(change.path(), change);
        if self.shared.batch_depth.get() == 0 {
            self.schedule_flush();
        }
    }

    fn schedule_flush(&self) {
        if self.shared.flush_scheduled.replace(true) {
            return;
        }
        let weak = Rc::downgrade(&self.shared);
        self.shared.scheduler.schedule_frame(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                StateStore { shared }.flush();
            }
        }));
    }

    /// Delivers the coalesced pending changes, one per path, in path order.
    /// Writes issued by a callback land in a fresh pending set and are
    /// delivered on a later flush.
    fn flush(&self) {
        self.shared.flush_scheduled.set(false);
        let pending = std::mem::take(&mut *self.shared.pending.borrow_mut());
        for (path, change) in pending {
            let callbacks: Vec<SubscriberCallback> = {
                let subscribers = self.shared.subscribers.borrow();
                subscribers
                    .get(&path)
                    .map(|entries| {
                        entries
                            .iter()
                            .map(|subscriber| subscriber.callback.clone())
                            .collect()
                    })
                    .unwrap_or_default()
            };
            for callback in callbacks {
                callback(&change);
            }
        }
    }
}
