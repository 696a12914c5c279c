//! Window lifecycle events and collaborator hooks.
//!
//! Events are broadcast facts, emitted after the state transition they
//! describe has been applied. Hooks are single-slot callbacks wired in by the
//! embedder; only [`LifecycleHooks::on_before_close`] can influence the
//! outcome of an operation.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use desktop_contract::{ApplicationId, WindowId, WindowRecord};
use serde::{Deserialize, Serialize};

use crate::model::CreateWindowOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic")]
pub enum WindowEvent {
    #[serde(rename = "window.created")]
    Created {
        window_id: WindowId,
        app_id: ApplicationId,
    },
    #[serde(rename = "window.closed")]
    Closed { window_id: WindowId },
    #[serde(rename = "window.focused")]
    Focused { window_id: WindowId },
    #[serde(rename = "window.minimized")]
    Minimized { window_id: WindowId },
    #[serde(rename = "window.restored")]
    Restored { window_id: WindowId },
    #[serde(rename = "window.maximized")]
    Maximized { window_id: WindowId },
    #[serde(rename = "window.moved")]
    Moved { window_id: WindowId, x: i32, y: i32 },
    #[serde(rename = "window.resized")]
    Resized {
        window_id: WindowId,
        width: i32,
        height: i32,
    },
}

impl WindowEvent {
    pub const fn topic(&self) -> &'static str {
        match self {
            Self::Created { .. } => "window.created",
            Self::Closed { .. } => "window.closed",
            Self::Focused { .. } => "window.focused",
            Self::Minimized { .. } => "window.minimized",
            Self::Restored { .. } => "window.restored",
            Self::Maximized { .. } => "window.maximized",
            Self::Moved { .. } => "window.moved",
            Self::Resized { .. } => "window.resized",
        }
    }

    pub const fn window_id(&self) -> WindowId {
        match self {
            Self::Created { window_id, .. }
            | Self::Closed { window_id }
            | Self::Focused { window_id }
            | Self::Minimized { window_id }
            | Self::Restored { window_id }
            | Self::Maximized { window_id }
            | Self::Moved { window_id, .. }
            | Self::Resized { window_id, .. } => *window_id,
        }
    }
}

type EventCallback = Rc<dyn Fn(&WindowEvent)>;

#[derive(Default)]
struct EventBusInner {
    next_id: Cell<u64>,
    subscribers: RefCell<Vec<(u64, EventCallback)>>,
}

/// Synchronous broadcast bus; clones share the subscriber list.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<EventBusInner>,
}

/// Handle owning one bus subscription; dropping it stops delivery.
pub struct EventSubscription {
    unregister: Rc<dyn Fn()>,
    active: Rc<Cell<bool>>,
}

impl EventSubscription {
    pub fn unsubscribe(&self) {
        if self.active.get() {
            self.active.set(false);
            (self.unregister)();
        }
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: impl Fn(&WindowEvent) + 'static) -> EventSubscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .subscribers
            .borrow_mut()
            .push((id, Rc::new(callback)));

        let weak = Rc::downgrade(&self.inner);
        EventSubscription {
            unregister: Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner
                        .subscribers
                        .borrow_mut()
                        .retain(|(entry_id, _)| *entry_id != id);
                }
            }),
            active: Rc::new(Cell::new(true)),
        }
    }

    /// Delivers `event` to a snapshot of the current subscribers, so a
    /// callback that subscribes or unsubscribes does not affect this round.
    pub fn emit(&self, event: &WindowEvent) {
        let callbacks: Vec<EventCallback> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }
}

/// Embedder callbacks consulted during window operations. All slots are
/// optional; `on_before_close` may veto by returning `false`.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    pub on_before_create: Option<Rc<dyn Fn(&ApplicationId, &CreateWindowOptions)>>,
    pub on_after_create: Option<Rc<dyn Fn(&WindowRecord)>>,
    pub on_before_close: Option<Rc<dyn Fn(&WindowRecord) -> bool>>,
    pub on_after_close: Option<Rc<dyn Fn(WindowId)>>,
    pub on_focus: Option<Rc<dyn Fn(&WindowRecord)>>,
    pub on_minimize: Option<Rc<dyn Fn(&WindowRecord)>>,
    pub on_restore: Option<Rc<dyn Fn(&WindowRecord)>>,
    pub on_resize: Option<Rc<dyn Fn(&WindowRecord)>>,
}
