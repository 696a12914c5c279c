//! Bundled collaborator services handed to the desktop runtime.

use std::rc::Rc;

use desktop_contract::{Clock, Renderer, Scheduler, WindowStore};

use crate::renderer::HeadlessRenderer;
use crate::scheduler::ManualScheduler;
use crate::storage::MemoryWindowStore;
use crate::time::FixedClock;

/// Epoch the headless clock starts at (2023-11-14T22:13:20Z); arbitrary but
/// realistic, so timestamp math in tests resembles production values.
pub const HEADLESS_EPOCH_MS: u64 = 1_700_000_000_000;

#[derive(Clone)]
/// The four collaborator capabilities the desktop runtime consumes, as shared
/// trait objects. Hosts assemble one bundle per desktop instance.
pub struct HostServices {
    /// Durable window-record storage.
    pub window_store: Rc<dyn WindowStore>,
    /// Visual-surface collaborator.
    pub renderer: Rc<dyn Renderer>,
    /// Frame and debounce scheduling.
    pub scheduler: Rc<dyn Scheduler>,
    /// Time source for record timestamps.
    pub clock: Rc<dyn Clock>,
}

impl HostServices {
    /// Fully in-memory services driven by a [`ManualScheduler`]; nothing flushes
    /// until the scheduler is ticked. Prefer [`HeadlessHost`] when the caller
    /// needs the concrete adapters back.
    pub fn headless() -> Self {
        HeadlessHost::new().services()
    }
}

#[derive(Clone)]
/// Concrete headless adapters plus accessors, for tests that drive frames,
/// virtual time, and storage directly while the runtime sees [`HostServices`].
pub struct HeadlessHost {
    /// In-memory gateway.
    pub window_store: MemoryWindowStore,
    /// Recording renderer.
    pub renderer: HeadlessRenderer,
    /// Manually ticked scheduler.
    pub scheduler: ManualScheduler,
    /// Pinned clock.
    pub clock: FixedClock,
}

impl HeadlessHost {
    /// Fresh adapters: empty store, default viewport, virtual time zero, clock at
    /// [`HEADLESS_EPOCH_MS`].
    pub fn new() -> Self {
        Self {
            window_store: MemoryWindowStore::default(),
            renderer: HeadlessRenderer::new(),
            scheduler: ManualScheduler::new(),
            clock: FixedClock::new(HEADLESS_EPOCH_MS),
        }
    }

    /// Service bundle sharing state with these adapters.
    pub fn services(&self) -> HostServices {
        HostServices {
            window_store: Rc::new(self.window_store.clone()),
            renderer: Rc::new(self.renderer.clone()),
            scheduler: Rc::new(self.scheduler.clone()),
            clock: Rc::new(self.clock.clone()),
        }
    }
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}
