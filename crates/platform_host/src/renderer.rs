//! Renderer adapters: a recording headless surface tree and a no-op fallback.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use desktop_contract::{
    AppMountContext, ApplicationId, Renderer, RendererFuture, SurfaceHandle, WindowId, WindowRect,
    WindowRecord, WindowSize,
};

/// Viewport reported by headless renderers unless overridden.
pub const DEFAULT_HEADLESS_VIEWPORT: WindowRect = WindowRect {
    x: 0,
    y: 0,
    w: 1280,
    h: 800,
};

#[derive(Debug, Clone, PartialEq)]
/// Last state pushed to one headless surface.
pub struct SurfaceState {
    /// Window the surface was mounted for.
    pub window_id: WindowId,
    /// Left edge in pixels.
    pub x: i32,
    /// Top edge in pixels.
    pub y: i32,
    /// Sizing mode.
    pub size: WindowSize,
    /// Stacking rank.
    pub z_index: i32,
    /// Surface carries the active-window styling.
    pub active: bool,
    /// Surface is hidden as minimized.
    pub minimized: bool,
    /// Application whose content was mounted, once requested.
    pub content_app: Option<ApplicationId>,
}

#[derive(Clone, Default)]
/// [`Renderer`] that records surface state instead of drawing; clones share one
/// surface tree. Removal futures resolve immediately.
pub struct HeadlessRenderer {
    inner: Rc<RefCell<RendererInner>>,
}

struct RendererInner {
    viewport: WindowRect,
    next_surface: u64,
    surfaces: HashMap<SurfaceHandle, SurfaceState>,
    removed: Vec<SurfaceHandle>,
}

impl Default for RendererInner {
    fn default() -> Self {
        Self {
            viewport: DEFAULT_HEADLESS_VIEWPORT,
            next_surface: 1,
            surfaces: HashMap::new(),
            removed: Vec::new(),
        }
    }
}

impl HeadlessRenderer {
    /// Renderer with the default headless viewport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer reporting `viewport` as the usable desktop area.
    pub fn with_viewport(viewport: WindowRect) -> Self {
        let renderer = Self::default();
        renderer.inner.borrow_mut().viewport = viewport;
        renderer
    }

    /// Changes the reported viewport; existing surfaces are left untouched.
    pub fn set_viewport(&self, viewport: WindowRect) {
        self.inner.borrow_mut().viewport = viewport;
    }

    /// Number of live surfaces.
    pub fn surface_count(&self) -> usize {
        self.inner.borrow().surfaces.len()
    }

    /// Recorded state of one surface.
    pub fn surface_state(&self, surface: SurfaceHandle) -> Option<SurfaceState> {
        self.inner.borrow().surfaces.get(&surface).cloned()
    }

    /// Live surface mounted for `window_id`, if any.
    pub fn surface_for_window(&self, window_id: WindowId) -> Option<(SurfaceHandle, SurfaceState)> {
        self.inner
            .borrow()
            .surfaces
            .iter()
            .find(|(_, state)| state.window_id == window_id)
            .map(|(handle, state)| (*handle, state.clone()))
    }

    /// Handles whose surfaces have been removed, in removal order.
    pub fn removed_surfaces(&self) -> Vec<SurfaceHandle> {
        self.inner.borrow().removed.clone()
    }

    fn update_surface(&self, surface: SurfaceHandle, apply: impl FnOnce(&mut SurfaceState)) {
        if let Some(state) = self.inner.borrow_mut().surfaces.get_mut(&surface) {
            apply(state);
        }
    }
}

impl Renderer for HeadlessRenderer {
    fn viewport_rect(&self) -> WindowRect {
        self.inner.borrow().viewport
    }

    fn mount(&self, record: &WindowRecord) -> SurfaceHandle {
        let mut inner = self.inner.borrow_mut();
        let handle = SurfaceHandle(inner.next_surface);
        inner.next_surface += 1;
        inner.surfaces.insert(
            handle,
            SurfaceState {
                window_id: record.id,
                x: record.geometry.x,
                y: record.geometry.y,
                size: record.geometry.size,
                z_index: record.z_index,
                active: false,
                minimized: record.minimized,
                content_app: None,
            },
        );
        handle
    }

    fn mount_content(&self, surface: SurfaceHandle, context: &AppMountContext) {
        let app_id = context.app_id.clone();
        self.update_surface(surface, |state| state.content_app = Some(app_id));
    }

    fn update_position(&self, surface: SurfaceHandle, x: i32, y: i32) {
        self.update_surface(surface, |state| {
            state.x = x;
            state.y = y;
        });
    }

    fn update_size(&self, surface: SurfaceHandle, size: WindowSize) {
        self.update_surface(surface, |state| state.size = size);
    }

    fn update_z_index(&self, surface: SurfaceHandle, z_index: i32) {
        self.update_surface(surface, |state| state.z_index = z_index);
    }

    fn set_active(&self, surface: SurfaceHandle, active: bool) {
        self.update_surface(surface, |state| state.active = active);
    }

    fn set_minimized(&self, surface: SurfaceHandle, minimized: bool) {
        self.update_surface(surface, |state| state.minimized = minimized);
    }

    fn remove(&self, surface: SurfaceHandle) -> RendererFuture<()> {
        let mut inner = self.inner.borrow_mut();
        inner.surfaces.remove(&surface);
        inner.removed.push(surface);
        Box::pin(async {})
    }
}

#[derive(Debug, Clone, Copy, Default)]
/// [`Renderer`] that discards every call; all surfaces share one handle.
pub struct NoopRenderer;

impl Renderer for NoopRenderer {
    fn viewport_rect(&self) -> WindowRect {
        DEFAULT_HEADLESS_VIEWPORT
    }

    fn mount(&self, _record: &WindowRecord) -> SurfaceHandle {
        SurfaceHandle(0)
    }

    fn mount_content(&self, _surface: SurfaceHandle, _context: &AppMountContext) {}

    fn update_position(&self, _surface: SurfaceHandle, _x: i32, _y: i32) {}

    fn update_size(&self, _surface: SurfaceHandle, _size: WindowSize) {}

    fn update_z_index(&self, _surface: SurfaceHandle, _z_index: i32) {}

    fn set_active(&self, _surface: SurfaceHandle, _active: bool) {}

    fn set_minimized(&self, _surface: SurfaceHandle, _minimized: bool) {}

    fn remove(&self, _surface: SurfaceHandle) -> RendererFuture<()> {
        Box::pin(async {})
    }
}
