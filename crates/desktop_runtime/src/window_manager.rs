//! Window lifecycle engine.
//!
//! Owns every window transition: creation against the app registry, focus and
//! stacking, minimize/restore, maximize toggling, geometry changes with
//! configurable durability, and close with veto support. State lives in the
//! [`StateStore`]; the renderer and the storage gateway are driven as
//! collaborators and never consulted for truth. Storage writes are
//! best-effort: a failed write is logged and in-memory state stays
//! authoritative.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use desktop_contract::{
    AppMountContext, ApplicationId, Clock, DebounceKey, PersistPolicy, Renderer, RendererFuture,
    Scheduler, SurfaceHandle, WindowGeometry, WindowId, WindowPatch, WindowRecord, WindowRect,
    WindowSize, WindowStore,
};
use platform_host::HostServices;
use thiserror::Error;

use crate::apps::AppRegistry;
use crate::config::DesktopConfig;
use crate::events::{EventBus, LifecycleHooks, WindowEvent};
use crate::model::CreateWindowOptions;
use crate::store::{StateError, StateStore};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowManagerError {
    #[error("window {0} is not open")]
    WindowNotFound(WindowId),
    #[error("application `{0}` is not registered")]
    UnknownApp(ApplicationId),
    #[error("window ceiling of {limit} reached")]
    WindowCeilingReached { limit: usize },
    #[error(transparent)]
    State(#[from] StateError),
}

/// Result of a close request.
pub enum CloseOutcome {
    /// The window left the live state; await the completion for surface
    /// teardown (close animations included).
    Closed(CloseCompletion),
    /// A before-close hook kept the window open.
    Vetoed,
}

impl CloseOutcome {
    pub fn is_vetoed(&self) -> bool {
        matches!(self, Self::Vetoed)
    }

    pub fn completion(self) -> Option<CloseCompletion> {
        match self {
            Self::Closed(completion) => Some(completion),
            Self::Vetoed => None,
        }
    }
}

/// Resolves once the renderer has finished tearing the closed surface down.
pub struct CloseCompletion {
    removal: RendererFuture<()>,
}

impl Future for CloseCompletion {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.removal.as_mut().poll(cx)
    }
}

struct ManagerShared {
    store: StateStore,
    registry: AppRegistry,
    config: DesktopConfig,
    gateway: Rc<dyn WindowStore>,
    renderer: Rc<dyn Renderer>,
    scheduler: Rc<dyn Scheduler>,
    clock: Rc<dyn Clock>,
    events: EventBus,
    hooks: RefCell<LifecycleHooks>,
    surfaces: RefCell<HashMap<WindowId, SurfaceHandle>>,
    /// Windows with a trailing-edge geometry write currently armed.
    debounce_armed: RefCell<HashSet<WindowId>>,
    last_timestamp_ms: Cell<u64>,
}

impl ManagerShared {
    fn surface(&self, id: WindowId) -> Option<SurfaceHandle> {
        self.surfaces.borrow().get(&id).copied()
    }

    fn persist_insert(&self, record: &WindowRecord) {
        if let Err(error) = self.gateway.insert_window(record) {
            log::warn!("persisting new window {} failed: {error}", record.id);
        }
    }

    fn persist_update(&self, id: WindowId, patch: &WindowPatch) {
        if let Err(error) = self.gateway.update_window(id, patch) {
            log::warn!("persisting update for window {id} failed: {error}");
        }
    }

    fn persist_delete(&self, id: WindowId) {
        if let Err(error) = self.gateway.delete_window(id) {
            log::warn!("deleting window {id} from storage failed: {error}");
        }
    }

    /// Writes the window's current geometry through the gateway; target of
    /// the debounce timer.
    fn flush_geometry(&self, id: WindowId) {
        self.debounce_armed.borrow_mut().remove(&id);
        if let Some(record) = self.store.window(id) {
            self.persist_update(
                id,
                &WindowPatch::geometry(record.geometry, record.updated_at_unix_ms),
            );
        }
    }
}

/// Shared-handle window manager; clones drive the same desktop.
#[derive(Clone)]
pub struct WindowManager {
    shared: Rc<ManagerShared>,
}

impl WindowManager {
    pub fn new(services: &HostServices, registry: AppRegistry, config: DesktopConfig) -> Self {
        let store = StateStore::new(services.scheduler.clone());
        Self {
            shared: Rc::new(ManagerShared {
                store,
                registry,
                config,
                gateway: services.window_store.clone(),
                renderer: services.renderer.clone(),
                scheduler: services.scheduler.clone(),
                clock: services.clock.clone(),
                events: EventBus::new(),
                hooks: RefCell::new(LifecycleHooks::default()),
                surfaces: RefCell::new(HashMap::new()),
                debounce_armed: RefCell::new(HashSet::new()),
                last_timestamp_ms: Cell::new(0),
            }),
        }
    }

    pub fn store(&self) -> StateStore {
        self.shared.store.clone()
    }

    pub fn events(&self) -> EventBus {
        self.shared.events.clone()
    }

    pub fn config(&self) -> &DesktopConfig {
        &self.shared.config
    }

    pub fn registry(&self) -> &AppRegistry {
        &self.shared.registry
    }

    pub fn viewport_rect(&self) -> WindowRect {
        self.shared.renderer.viewport_rect()
    }

    /// Replaces the whole hook set.
    pub fn set_hooks(&self, hooks: LifecycleHooks) {
        *self.shared.hooks.borrow_mut() = hooks;
    }

    pub fn window(&self, id: WindowId) -> Option<WindowRecord> {
        self.shared.store.window(id)
    }

    pub fn windows(&self) -> Vec<WindowRecord> {
        self.shared.store.windows()
    }

    pub fn windows_for_app(&self, app_id: &ApplicationId) -> Vec<WindowRecord> {
        self.shared
            .store
            .windows()
            .into_iter()
            .filter(|window| window.app_id == *app_id)
            .collect()
    }

    pub fn minimized_windows(&self) -> Vec<WindowRecord> {
        self.shared
            .store
            .windows()
            .into_iter()
            .filter(|window| window.minimized)
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.shared.store.open_count()
    }

    pub fn active_window_id(&self) -> Option<WindowId> {
        self.shared.store.active_window()
    }

    pub fn active_window(&self) -> Option<WindowRecord> {
        self.shared
            .store
            .active_window()
            .and_then(|id| self.shared.store.window(id))
    }

    pub(crate) fn scheduler(&self) -> Rc<dyn Scheduler> {
        self.shared.scheduler.clone()
    }

    /// Opens a window for `app_id`. For single-instance applications with a
    /// window already open (minimized counts) the existing window is focused
    /// and returned instead of opening a second one.
    pub fn create_window(
        &self,
        app_id: &ApplicationId,
        options: CreateWindowOptions,
    ) -> Result<WindowRecord, WindowManagerError> {
        let shared = &self.shared;
        let descriptor = shared
            .registry
            .descriptor(app_id)
            .cloned()
            .ok_or_else(|| WindowManagerError::UnknownApp(app_id.clone()))?;

        if shared.store.open_count() >= shared.config.max_open_windows {
            return Err(WindowManagerError::WindowCeilingReached {
                limit: shared.config.max_open_windows,
            });
        }

        if descriptor.single_instance {
            let existing = shared
                .store
                .windows()
                .into_iter()
                .find(|window| window.app_id == *app_id);
            if let Some(existing) = existing {
                self.focus_window(existing.id)?;
                return shared
                    .store
                    .window(existing.id)
                    .ok_or(WindowManagerError::WindowNotFound(existing.id));
            }
        }

        let hook = shared.hooks.borrow().on_before_create.clone();
        if let Some(hook) = hook {
            hook(app_id, &options);
        }

        let (estimate_width, estimate_height) = shared.config.auto_size_estimate();
        let size = match options.size.unwrap_or(descriptor.default_size) {
            WindowSize::Fixed { width, height } => {
                let (width, height) = shared.renderer.constrain_size(
                    shared.config.min_window_width,
                    shared.config.min_window_height,
                    width,
                    height,
                );
                WindowSize::fixed(width, height)
            }
            WindowSize::Auto => WindowSize::Auto,
        };
        let (footprint_width, footprint_height) = size.resolve(estimate_width, estimate_height);
        let (x, y) = match options.position {
            Some((x, y)) => shared.renderer.constrain_position(WindowRect {
                x,
                y,
                w: footprint_width,
                h: footprint_height,
            }),
            None => shared.renderer.cascade_position(
                footprint_width,
                footprint_height,
                shared.config.cascade_step,
                shared.store.open_count(),
            ),
        };

        let z_index = self.next_z_index()?;
        let now = self.next_timestamp_ms();
        let record = WindowRecord {
            id: shared.store.allocate_window_id(),
            app_id: app_id.clone(),
            title: options.title.unwrap_or(descriptor.title),
            icon: options.icon.unwrap_or(descriptor.icon),
            geometry: WindowGeometry::new(x, y, size),
            z_index,
            minimized: false,
            maximized: false,
            pre_maximize: None,
            launch_params: options.launch_params,
            created_at_unix_ms: now,
            updated_at_unix_ms: now,
        };

        shared.persist_insert(&record);

        let previous_active = shared.store.active_window();
        shared.store.batch(|| -> Result<(), StateError> {
            shared.store.insert_window(record.clone())?;
            shared.store.set_active_window(Some(record.id));
            Ok(())
        })?;

        let surface = shared.renderer.mount(&record);
        shared.surfaces.borrow_mut().insert(record.id, surface);
        shared.renderer.mount_content(
            surface,
            &AppMountContext {
                app_id: record.app_id.clone(),
                window_id: record.id,
                launch_params: record.launch_params.clone(),
            },
        );
        shared.renderer.set_active(surface, true);
        if let Some(previous) = previous_active {
            if let Some(surface) = shared.surface(previous) {
                shared.renderer.set_active(surface, false);
            }
        }

        shared.events.emit(&WindowEvent::Created {
            window_id: record.id,
            app_id: record.app_id.clone(),
        });
        let hook = shared.hooks.borrow().on_after_create.clone();
        if let Some(hook) = hook {
            hook(&record);
        }
        Ok(record)
    }

    /// Raises the window above every other open window, un-minimizing it if
    /// needed, and makes it active. Focusing the already-active window is a
    /// no-op.
    pub fn focus_window(&self, id: WindowId) -> Result<(), WindowManagerError> {
        let shared = &self.shared;
        let record = shared
            .store
            .window(id)
            .ok_or(WindowManagerError::WindowNotFound(id))?;
        if shared.store.active_window() == Some(id) && !record.minimized {
            return Ok(());
        }

        let z_index = self.next_z_index()?;
        let ts = self.next_timestamp_ms();
        let was_minimized = record.minimized;
        let previous_active = shared.store.active_window();

        let updated = shared.store.batch(|| -> Result<WindowRecord, StateError> {
            let updated = shared.store.update_window(id, |window| {
                window.z_index = z_index;
                window.minimized = false;
                window.updated_at_unix_ms = ts;
            })?;
            shared.store.set_active_window(Some(id));
            self.sync_hud_visibility();
            Ok(updated)
        })?;

        shared.persist_update(
            id,
            &WindowPatch {
                z_index: Some(z_index),
                minimized: Some(false),
                updated_at_unix_ms: Some(ts),
                ..WindowPatch::default()
            },
        );

        if let Some(surface) = shared.surface(id) {
            shared.renderer.update_z_index(surface, z_index);
            if was_minimized {
                shared.renderer.set_minimized(surface, false);
            }
            shared.renderer.set_active(surface, true);
        }
        if let Some(previous) = previous_active.filter(|previous| *previous != id) {
            if let Some(surface) = shared.surface(previous) {
                shared.renderer.set_active(surface, false);
            }
        }

        shared.events.emit(&WindowEvent::Focused { window_id: id });
        let hook = shared.hooks.borrow().on_focus.clone();
        if let Some(hook) = hook {
            hook(&updated);
        }
        Ok(())
    }

    /// Hides the window from top-level stacking; focus moves to the topmost
    /// remaining window, or clears when none is left.
    pub fn minimize_window(&self, id: WindowId) -> Result<(), WindowManagerError> {
        let shared = &self.shared;
        let record = shared
            .store
            .window(id)
            .ok_or(WindowManagerError::WindowNotFound(id))?;
        if record.minimized {
            return Ok(());
        }

        let ts = self.next_timestamp_ms();
        let was_active = shared.store.active_window() == Some(id);

        let updated = shared.store.batch(|| -> Result<WindowRecord, StateError> {
            let updated = shared.store.update_window(id, |window| {
                window.minimized = true;
                window.updated_at_unix_ms = ts;
            })?;
            if was_active {
                let next = shared.store.snapshot().top_non_minimized().map(|w| w.id);
                shared.store.set_active_window(next);
            }
            self.sync_hud_visibility();
            Ok(updated)
        })?;

        shared.persist_update(
            id,
            &WindowPatch {
                minimized: Some(true),
                updated_at_unix_ms: Some(ts),
                ..WindowPatch::default()
            },
        );

        if let Some(surface) = shared.surface(id) {
            shared.renderer.set_minimized(surface, true);
            shared.renderer.set_active(surface, false);
        }
        if was_active {
            if let Some(next) = shared.store.active_window() {
                if let Some(surface) = shared.surface(next) {
                    shared.renderer.set_active(surface, true);
                }
            }
        }

        shared.events.emit(&WindowEvent::Minimized { window_id: id });
        let hook = shared.hooks.borrow().on_minimize.clone();
        if let Some(hook) = hook {
            hook(&updated);
        }
        Ok(())
    }

    /// Brings a minimized window back and focuses it.
    pub fn restore_window(&self, id: WindowId) -> Result<(), WindowManagerError> {
        self.focus_window(id)?;
        let record = self
            .shared
            .store
            .window(id)
            .ok_or(WindowManagerError::WindowNotFound(id))?;
        self.shared
            .events
            .emit(&WindowEvent::Restored { window_id: id });
        let hook = self.shared.hooks.borrow().on_restore.clone();
        if let Some(hook) = hook {
            hook(&record);
        }
        Ok(())
    }

    /// Taskbar semantics: restore when minimized, minimize when active,
    /// otherwise focus.
    pub fn toggle_window(&self, id: WindowId) -> Result<(), WindowManagerError> {
        let record = self
            .shared
            .store
            .window(id)
            .ok_or(WindowManagerError::WindowNotFound(id))?;
        if record.minimized {
            self.restore_window(id)
        } else if self.shared.store.active_window() == Some(id) {
            self.minimize_window(id)
        } else {
            self.focus_window(id)
        }
    }

    /// Expands the window to the full viewport, or puts it back on the
    /// geometry captured when it was maximized.
    pub fn toggle_maximize(&self, id: WindowId) -> Result<(), WindowManagerError> {
        let record = self
            .shared
            .store
            .window(id)
            .ok_or(WindowManagerError::WindowNotFound(id))?;
        if record.maximized {
            self.unmaximize_window(record)
        } else {
            self.maximize_window(record)
        }
    }

    fn maximize_window(&self, record: WindowRecord) -> Result<(), WindowManagerError> {
        let shared = &self.shared;
        let id = record.id;
        let viewport = shared.renderer.viewport_rect();
        let snapshot = record.geometry;
        let full = WindowGeometry::new(
            viewport.x,
            viewport.y,
            WindowSize::fixed(viewport.w, viewport.h),
        );
        let z_index = self.next_z_index()?;
        let ts = self.next_timestamp_ms();
        let was_minimized = record.minimized;
        let previous_active = shared.store.active_window();

        shared.store.batch(|| -> Result<(), StateError> {
            shared.store.update_window(id, |window| {
                window.pre_maximize = Some(snapshot);
                window.maximized = true;
                window.minimized = false;
                window.geometry = full;
                window.z_index = z_index;
                window.updated_at_unix_ms = ts;
            })?;
            shared.store.set_active_window(Some(id));
            self.sync_hud_visibility();
            Ok(())
        })?;

        shared.persist_update(
            id,
            &WindowPatch {
                geometry: Some(full),
                z_index: Some(z_index),
                minimized: Some(false),
                maximized: Some(true),
                pre_maximize: Some(Some(snapshot)),
                updated_at_unix_ms: Some(ts),
                ..WindowPatch::default()
            },
        );

        if let Some(surface) = shared.surface(id) {
            shared.renderer.update_position(surface, full.x, full.y);
            shared.renderer.update_size(surface, full.size);
            shared.renderer.update_z_index(surface, z_index);
            if was_minimized {
                shared.renderer.set_minimized(surface, false);
            }
            shared.renderer.set_active(surface, true);
        }
        if let Some(previous) = previous_active.filter(|previous| *previous != id) {
            if let Some(surface) = shared.surface(previous) {
                shared.renderer.set_active(surface, false);
            }
        }

        shared.events.emit(&WindowEvent::Maximized { window_id: id });
        Ok(())
    }

    fn unmaximize_window(&self, record: WindowRecord) -> Result<(), WindowManagerError> {
        let shared = &self.shared;
        let id = record.id;
        // A missing snapshot leaves the window where it is, flags cleared.
        let restored = record.pre_maximize.unwrap_or(record.geometry);
        let ts = self.next_timestamp_ms();

        let updated = shared.store.batch(|| -> Result<WindowRecord, StateError> {
            let updated = shared.store.update_window(id, |window| {
                window.geometry = restored;
                window.maximized = false;
                window.pre_maximize = None;
                window.updated_at_unix_ms = ts;
            })?;
            self.sync_hud_visibility();
            Ok(updated)
        })?;

        shared.persist_update(
            id,
            &WindowPatch {
                geometry: Some(restored),
                maximized: Some(false),
                pre_maximize: Some(None),
                updated_at_unix_ms: Some(ts),
                ..WindowPatch::default()
            },
        );

        if let Some(surface) = shared.surface(id) {
            shared.renderer.update_position(surface, restored.x, restored.y);
            shared.renderer.update_size(surface, restored.size);
        }

        shared.events.emit(&WindowEvent::Restored { window_id: id });
        let hook = shared.hooks.borrow().on_restore.clone();
        if let Some(hook) = hook {
            hook(&updated);
        }
        Ok(())
    }

    /// Applies a clamped geometry change and routes durability per `persist`.
    /// The interaction controllers call this directly; [`Self::set_position`]
    /// and [`Self::set_size`] are thin wrappers.
    ///
    /// A change that clamps back to the current geometry leaves the store and
    /// the event bus untouched; `Immediate` still flushes a pending debounced
    /// write so a session that ends where it started repairs durability.
    pub fn set_geometry(
        &self,
        id: WindowId,
        geometry: WindowGeometry,
        persist: PersistPolicy,
    ) -> Result<(), WindowManagerError> {
        let shared = &self.shared;
        let record = shared
            .store
            .window(id)
            .ok_or(WindowManagerError::WindowNotFound(id))?;
        let (estimate_width, estimate_height) = shared.config.auto_size_estimate();

        let size = match geometry.size {
            WindowSize::Fixed { width, height } => {
                let (width, height) = shared.renderer.constrain_size(
                    shared.config.min_window_width,
                    shared.config.min_window_height,
                    width,
                    height,
                );
                WindowSize::fixed(width, height)
            }
            WindowSize::Auto => WindowSize::Auto,
        };
        let footprint =
            WindowGeometry::new(geometry.x, geometry.y, size).rect(estimate_width, estimate_height);
        let (x, y) = shared.renderer.constrain_position(footprint);
        let target = WindowGeometry::new(x, y, size);

        let moved = (target.x, target.y) != (record.geometry.x, record.geometry.y);
        let resized = target.size != record.geometry.size;

        let updated = if moved || resized {
            let ts = self.next_timestamp_ms();
            let updated = shared.store.update_window(id, |window| {
                window.geometry = target;
                window.updated_at_unix_ms = ts;
            })?;
            if let Some(surface) = shared.surface(id) {
                if moved {
                    shared.renderer.update_position(surface, target.x, target.y);
                }
                if resized {
                    shared.renderer.update_size(surface, target.size);
                }
            }
            if moved {
                shared.events.emit(&WindowEvent::Moved {
                    window_id: id,
                    x: target.x,
                    y: target.y,
                });
            }
            if resized {
                let (width, height) = target.size.resolve(estimate_width, estimate_height);
                shared.events.emit(&WindowEvent::Resized {
                    window_id: id,
                    width,
                    height,
                });
                let hook = shared.hooks.borrow().on_resize.clone();
                if let Some(hook) = hook {
                    hook(&updated);
                }
            }
            updated
        } else {
            record
        };

        match persist {
            PersistPolicy::Immediate => {
                let was_armed = shared.debounce_armed.borrow_mut().remove(&id);
                shared
                    .scheduler
                    .cancel_debounce(DebounceKey::WindowPersist(id));
                if moved || resized || was_armed {
                    shared.persist_update(
                        id,
                        &WindowPatch::geometry(updated.geometry, updated.updated_at_unix_ms),
                    );
                }
            }
            PersistPolicy::Debounced => {
                if moved || resized {
                    self.arm_geometry_debounce(id);
                }
            }
            PersistPolicy::Skip => {
                shared.debounce_armed.borrow_mut().remove(&id);
                shared
                    .scheduler
                    .cancel_debounce(DebounceKey::WindowPersist(id));
            }
        }
        Ok(())
    }

    pub fn set_position(
        &self,
        id: WindowId,
        x: i32,
        y: i32,
        persist: PersistPolicy,
    ) -> Result<(), WindowManagerError> {
        let record = self
            .shared
            .store
            .window(id)
            .ok_or(WindowManagerError::WindowNotFound(id))?;
        self.set_geometry(id, WindowGeometry::new(x, y, record.geometry.size), persist)
    }

    pub fn set_size(
        &self,
        id: WindowId,
        width: i32,
        height: i32,
        persist: PersistPolicy,
    ) -> Result<(), WindowManagerError> {
        let record = self
            .shared
            .store
            .window(id)
            .ok_or(WindowManagerError::WindowNotFound(id))?;
        self.set_geometry(
            id,
            WindowGeometry::new(
                record.geometry.x,
                record.geometry.y,
                WindowSize::fixed(width, height),
            ),
            persist,
        )
    }

    pub fn set_window_title(
        &self,
        id: WindowId,
        title: impl Into<String>,
    ) -> Result<(), WindowManagerError> {
        let shared = &self.shared;
        let title = title.into();
        let record = shared
            .store
            .window(id)
            .ok_or(WindowManagerError::WindowNotFound(id))?;
        if record.title == title {
            return Ok(());
        }
        let ts = self.next_timestamp_ms();
        shared.store.update_window(id, |window| {
            window.title = title.clone();
            window.updated_at_unix_ms = ts;
        })?;
        shared.persist_update(
            id,
            &WindowPatch {
                title: Some(title),
                updated_at_unix_ms: Some(ts),
                ..WindowPatch::default()
            },
        );
        Ok(())
    }

    pub fn set_window_icon(
        &self,
        id: WindowId,
        icon: impl Into<String>,
    ) -> Result<(), WindowManagerError> {
        let shared = &self.shared;
        let icon = icon.into();
        let record = shared
            .store
            .window(id)
            .ok_or(WindowManagerError::WindowNotFound(id))?;
        if record.icon == icon {
            return Ok(());
        }
        let ts = self.next_timestamp_ms();
        shared.store.update_window(id, |window| {
            window.icon = icon.clone();
            window.updated_at_unix_ms = ts;
        })?;
        shared.persist_update(
            id,
            &WindowPatch {
                icon: Some(icon),
                updated_at_unix_ms: Some(ts),
                ..WindowPatch::default()
            },
        );
        Ok(())
    }

    /// Closes the window unless a before-close hook vetoes. State and storage
    /// are updated synchronously; only the visual teardown is deferred behind
    /// the returned completion.
    pub fn close_window(&self, id: WindowId) -> Result<CloseOutcome, WindowManagerError> {
        let shared = &self.shared;
        let record = shared
            .store
            .window(id)
            .ok_or(WindowManagerError::WindowNotFound(id))?;

        let veto = shared.hooks.borrow().on_before_close.clone();
        if let Some(veto) = veto {
            if !veto(&record) {
                return Ok(CloseOutcome::Vetoed);
            }
        }

        let was_active = shared.store.active_window() == Some(id);
        shared.store.batch(|| -> Result<(), StateError> {
            shared.store.remove_window(id)?;
            if was_active {
                let next = shared.store.snapshot().top_non_minimized().map(|w| w.id);
                shared.store.set_active_window(next);
            }
            self.sync_hud_visibility();
            Ok(())
        })?;

        shared.debounce_armed.borrow_mut().remove(&id);
        shared
            .scheduler
            .cancel_debounce(DebounceKey::WindowPersist(id));
        shared.persist_delete(id);

        let removed = shared.surfaces.borrow_mut().remove(&id);
        let removal: RendererFuture<()> = match removed {
            Some(surface) => shared.renderer.remove(surface),
            None => Box::pin(async {}),
        };

        if was_active {
            if let Some(next) = shared.store.active_window() {
                if let Some(surface) = shared.surface(next) {
                    shared.renderer.set_active(surface, true);
                }
            }
        }

        shared.events.emit(&WindowEvent::Closed { window_id: id });
        let hook = shared.hooks.borrow().on_after_close.clone();
        if let Some(hook) = hook {
            hook(id);
        }

        Ok(CloseOutcome::Closed(CloseCompletion { removal }))
    }

    /// Packs all z-indices back onto consecutive values from the configured
    /// base, preserving relative order. Runs automatically when an assignment
    /// would cross the high-water mark.
    pub fn reindex_windows(&self) -> Result<(), WindowManagerError> {
        let shared = &self.shared;
        let mut windows = shared.store.windows();
        windows.sort_by_key(|window| window.z_index);
        let base = shared.config.z_index_base;
        let updates: Vec<(WindowId, i32)> = windows
            .iter()
            .enumerate()
            .filter_map(|(index, window)| {
                let z_index = base + index as i32;
                (window.z_index != z_index).then_some((window.id, z_index))
            })
            .collect();
        if updates.is_empty() {
            return Ok(());
        }
        log::debug!("reindexing {} windows from z {base}", updates.len());

        let mut applied: Vec<(WindowId, i32, u64)> = Vec::with_capacity(updates.len());
        shared.store.batch(|| -> Result<(), StateError> {
            for (id, z_index) in &updates {
                let ts = self.next_timestamp_ms();
                shared.store.update_window(*id, |window| {
                    window.z_index = *z_index;
                    window.updated_at_unix_ms = ts;
                })?;
                applied.push((*id, *z_index, ts));
            }
            Ok(())
        })?;

        for (id, z_index, ts) in applied {
            shared.persist_update(
                id,
                &WindowPatch {
                    z_index: Some(z_index),
                    updated_at_unix_ms: Some(ts),
                    ..WindowPatch::default()
                },
            );
            if let Some(surface) = shared.surface(id) {
                shared.renderer.update_z_index(surface, z_index);
            }
        }
        Ok(())
    }

    /// Loads persisted windows, normalizes them against the current viewport
    /// and config, and mounts their surfaces. Returns how many windows were
    /// restored. A storage failure logs a warning and starts the desktop
    /// empty.
    pub fn hydrate(&self) -> usize {
        let shared = &self.shared;
        let stored = match shared.gateway.all_windows() {
            Ok(stored) => stored,
            Err(error) => {
                log::warn!("window hydration failed, starting empty: {error}");
                return 0;
            }
        };
        if stored.is_empty() {
            return 0;
        }

        // Duplicate ids keep the newest record.
        let mut records: Vec<WindowRecord> = Vec::with_capacity(stored.len());
        for record in stored {
            match records.iter_mut().find(|existing| existing.id == record.id) {
                Some(existing) => {
                    if record.updated_at_unix_ms > existing.updated_at_unix_ms {
                        *existing = record;
                    }
                }
                None => records.push(record),
            }
        }

        records.sort_by_key(|record| record.z_index);
        let overflow = records.len().saturating_sub(shared.config.max_open_windows);
        if overflow > 0 {
            log::warn!("dropping {overflow} stored windows over the open-window ceiling");
            records.drain(..overflow);
        }

        let viewport = shared.renderer.viewport_rect();
        let (estimate_width, estimate_height) = shared.config.auto_size_estimate();
        for (index, record) in records.iter_mut().enumerate() {
            record.z_index = shared.config.z_index_base + index as i32;
            if record.maximized && record.pre_maximize.is_none() {
                record.maximized = false;
            }
            if !record.maximized && record.pre_maximize.is_some() {
                record.pre_maximize = None;
            }
            if record.maximized {
                record.geometry = WindowGeometry::new(
                    viewport.x,
                    viewport.y,
                    WindowSize::fixed(viewport.w, viewport.h),
                );
            } else {
                if let WindowSize::Fixed { width, height } = record.geometry.size {
                    let (width, height) = shared.renderer.constrain_size(
                        shared.config.min_window_width,
                        shared.config.min_window_height,
                        width,
                        height,
                    );
                    record.geometry.size = WindowSize::fixed(width, height);
                }
                let footprint = record.geometry.rect(estimate_width, estimate_height);
                let (x, y) = shared.renderer.constrain_position(footprint);
                record.geometry.x = x;
                record.geometry.y = y;
            }
        }

        let restored = records.len();
        let last_seen = records
            .iter()
            .map(|record| record.updated_at_unix_ms.max(record.created_at_unix_ms))
            .max()
            .unwrap_or(0);
        shared
            .last_timestamp_ms
            .set(shared.last_timestamp_ms.get().max(last_seen));
        let active = records
            .iter()
            .filter(|record| !record.minimized)
            .max_by_key(|record| record.z_index)
            .map(|record| record.id);

        shared.store.batch(|| {
            shared.store.replace_windows(records.clone());
            shared.store.set_active_window(active);
            self.sync_hud_visibility();
        });

        for record in &records {
            let surface = shared.renderer.mount(record);
            shared.surfaces.borrow_mut().insert(record.id, surface);
            shared.renderer.mount_content(
                surface,
                &AppMountContext {
                    app_id: record.app_id.clone(),
                    window_id: record.id,
                    launch_params: record.launch_params.clone(),
                },
            );
            if record.minimized {
                shared.renderer.set_minimized(surface, true);
            }
        }
        if let Some(active) = active {
            if let Some(surface) = shared.surface(active) {
                shared.renderer.set_active(surface, true);
            }
        }
        restored
    }

    /// The HUD survives unless some window is maximized and actually visible.
    fn sync_hud_visibility(&self) {
        let visible = !self
            .shared
            .store
            .windows()
            .iter()
            .any(|window| window.maximized && !window.minimized);
        self.shared.store.set_hud_visible(visible);
    }

    fn arm_geometry_debounce(&self, id: WindowId) {
        let shared = &self.shared;
        shared.debounce_armed.borrow_mut().insert(id);
        let weak = Rc::downgrade(&self.shared);
        shared.scheduler.debounce(
            DebounceKey::WindowPersist(id),
            shared.config.persist_debounce(),
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.flush_geometry(id);
                }
            }),
        );
    }

    /// One above the current maximum, compacting first when that would cross
    /// the high-water mark.
    fn next_z_index(&self) -> Result<i32, WindowManagerError> {
        let shared = &self.shared;
        let max = shared
            .store
            .windows()
            .iter()
            .map(|window| window.z_index)
            .max();
        let Some(max) = max else {
            return Ok(shared.config.z_index_base);
        };
        if max + 1 > shared.config.z_index_high_water {
            self.reindex_windows()?;
            let max = shared
                .store
                .windows()
                .iter()
                .map(|window| window.z_index)
                .max()
                .unwrap_or(shared.config.z_index_base - 1);
            return Ok(max + 1);
        }
        Ok(max + 1)
    }

    /// Monotonic wall-clock milliseconds: never repeats even when the clock
    /// stalls or steps backwards.
    fn next_timestamp_ms(&self) -> u64 {
        let now = self.shared.clock.now_unix_ms();
        let next = now.max(self.shared.last_timestamp_ms.get().saturating_add(1));
        self.shared.last_timestamp_ms.set(next);
        next
    }
}
