//! Shared contract types between the desktop window-manager core and its host collaborators.
//!
//! Defines the window record model, geometry primitives, and the capability traits
//! (rendering, durable storage, cooperative scheduling, time) the core consumes.
//! Headless adapters live in `platform_host`; the reactive store, window manager,
//! and interaction controllers live in `desktop_runtime`.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

use std::{fmt, time::Duration};

use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default width for windows whose descriptor does not choose a size.
pub const DEFAULT_WINDOW_WIDTH: i32 = 420;
/// Default height for windows whose descriptor does not choose a size.
pub const DEFAULT_WINDOW_HEIGHT: i32 = 300;

/// Stable identifier for a managed window, unique among open windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to a renderer-managed window surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

/// Stable identifier for a registered application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(String);

impl ApplicationId {
    /// Returns an application identifier when `raw` conforms to the dotted-segment policy.
    pub fn new(raw: impl Into<String>) -> Result<Self, String> {
        let raw = raw.into();
        if is_valid_application_id(&raw) {
            Ok(Self(raw))
        } else {
            Err(format!(
                "invalid application id `{raw}`; expected lowercase dotted segments"
            ))
        }
    }

    /// Returns the string form of the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Creates an id without validation for compile-time/runtime trusted constants.
    pub fn trusted(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn is_valid_application_id(raw: &str) -> bool {
    if raw.is_empty() || raw.len() > 120 {
        return false;
    }

    for part in raw.split('.') {
        if part.is_empty() || part.len() > 32 {
            return false;
        }
        let bytes = part.as_bytes();
        if !bytes[0].is_ascii_lowercase() {
            return false;
        }
        if !bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-' || *b == b'_')
        {
            return false;
        }
        if part.ends_with('-') {
            return false;
        }
    }

    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Pixel rectangle used for window footprints and the usable viewport.
pub struct WindowRect {
    /// Left edge in pixels.
    pub x: i32,
    /// Top edge in pixels.
    pub y: i32,
    /// Width in pixels.
    pub w: i32,
    /// Height in pixels.
    pub h: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
/// Window content sizing: explicit pixels or content-determined.
pub enum WindowSize {
    /// Fixed pixel dimensions.
    Fixed {
        /// Width in pixels.
        width: i32,
        /// Height in pixels.
        height: i32,
    },
    /// Sized by the mounted content; bounds logic substitutes an estimated footprint.
    Auto,
}

impl WindowSize {
    /// Shorthand for a fixed size.
    pub fn fixed(width: i32, height: i32) -> Self {
        Self::Fixed { width, height }
    }

    /// True when the window is content-sized.
    pub fn is_auto(self) -> bool {
        matches!(self, Self::Auto)
    }

    /// Concrete dimensions, substituting the estimate for [`WindowSize::Auto`].
    pub fn resolve(self, estimate_width: i32, estimate_height: i32) -> (i32, i32) {
        match self {
            Self::Fixed { width, height } => (width, height),
            Self::Auto => (estimate_width, estimate_height),
        }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::Fixed {
            width: DEFAULT_WINDOW_WIDTH,
            height: DEFAULT_WINDOW_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// A window's position plus sizing mode.
pub struct WindowGeometry {
    /// Left edge in pixels.
    pub x: i32,
    /// Top edge in pixels.
    pub y: i32,
    /// Sizing mode.
    pub size: WindowSize,
}

impl WindowGeometry {
    /// Geometry at `(x, y)` with the given size.
    pub fn new(x: i32, y: i32, size: WindowSize) -> Self {
        Self { x, y, size }
    }

    /// Concrete footprint rect, substituting the estimate for auto-sized windows.
    pub fn rect(self, estimate_width: i32, estimate_height: i32) -> WindowRect {
        let (w, h) = self.size.resolve(estimate_width, estimate_height);
        WindowRect {
            x: self.x,
            y: self.y,
            w,
            h,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One managed window. Exclusively owned by the runtime state store; collaborators
/// only ever receive copies or id references.
pub struct WindowRecord {
    /// Stable id generated at creation.
    pub id: WindowId,
    /// Owning application in the registry.
    pub app_id: ApplicationId,
    /// Title-bar text, seeded from the descriptor and independently overridable.
    pub title: String,
    /// Icon identifier, seeded from the descriptor and independently overridable.
    pub icon: String,
    /// Current position and sizing mode.
    pub geometry: WindowGeometry,
    /// Stacking rank; unique among open windows, higher renders above lower.
    pub z_index: i32,
    /// Excluded from top-level stacking while set; geometry is retained.
    pub minimized: bool,
    /// Window currently fills the viewport.
    pub maximized: bool,
    /// Geometry restored when leaving the maximized state; present only while maximized.
    pub pre_maximize: Option<WindowGeometry>,
    /// Opaque launch arguments, replayed when content is mounted.
    pub launch_params: Value,
    /// Creation time in unix milliseconds.
    pub created_at_unix_ms: u64,
    /// Last mutation time in unix milliseconds; strictly increases per mutation.
    pub updated_at_unix_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
/// Partial window update consumed by [`WindowStore::update_window`]. `None` fields
/// leave the stored record untouched.
pub struct WindowPatch {
    /// New title-bar text.
    pub title: Option<String>,
    /// New icon identifier.
    pub icon: Option<String>,
    /// New position and sizing mode.
    pub geometry: Option<WindowGeometry>,
    /// New stacking rank.
    pub z_index: Option<i32>,
    /// New minimized flag.
    pub minimized: Option<bool>,
    /// New maximized flag.
    pub maximized: Option<bool>,
    /// New restore snapshot; `Some(None)` clears a stored snapshot.
    pub pre_maximize: Option<Option<WindowGeometry>>,
    /// New last-mutation timestamp.
    pub updated_at_unix_ms: Option<u64>,
}

impl WindowPatch {
    /// Patch carrying only a geometry change and its timestamp.
    pub fn geometry(geometry: WindowGeometry, updated_at_unix_ms: u64) -> Self {
        Self {
            geometry: Some(geometry),
            updated_at_unix_ms: Some(updated_at_unix_ms),
            ..Self::default()
        }
    }

    /// True when the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the populated fields onto `record`.
    pub fn apply_to(&self, record: &mut WindowRecord) {
        if let Some(title) = &self.title {
            record.title = title.clone();
        }
        if let Some(icon) = &self.icon {
            record.icon = icon.clone();
        }
        if let Some(geometry) = self.geometry {
            record.geometry = geometry;
        }
        if let Some(z_index) = self.z_index {
            record.z_index = z_index;
        }
        if let Some(minimized) = self.minimized {
            record.minimized = minimized;
        }
        if let Some(maximized) = self.maximized {
            record.maximized = maximized;
        }
        if let Some(pre_maximize) = self.pre_maximize {
            record.pre_maximize = pre_maximize;
        }
        if let Some(updated_at) = self.updated_at_unix_ms {
            record.updated_at_unix_ms = updated_at;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Registered application metadata consumed at window creation.
pub struct AppDescriptor {
    /// Canonical application id.
    pub app_id: ApplicationId,
    /// Default window title.
    pub title: String,
    /// Default icon identifier.
    pub icon: String,
    /// At most one open window for this application; a second create focuses the first.
    pub single_instance: bool,
    /// Size applied when a create request does not choose one.
    pub default_size: WindowSize,
    /// Listed by launcher chrome.
    pub show_in_launcher: bool,
}

impl AppDescriptor {
    /// Descriptor with default sizing, launcher-visible, multiple instances allowed.
    pub fn new(app_id: ApplicationId, title: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            app_id,
            title: title.into(),
            icon: icon.into(),
            single_instance: false,
            default_size: WindowSize::default(),
            show_in_launcher: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Context handed to the renderer when application content is mounted into a surface.
pub struct AppMountContext {
    /// Owning application.
    pub app_id: ApplicationId,
    /// Hosting window.
    pub window_id: WindowId,
    /// Launch arguments captured at creation.
    pub launch_params: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Durability mode applied by geometry mutations.
pub enum PersistPolicy {
    /// Write through the gateway now, cancelling any pending debounce for the window.
    Immediate,
    /// Arm (or re-arm) the per-window trailing-edge debounce.
    Debounced,
    /// Update only in-memory state and cancel any pending debounce for the window.
    Skip,
}

/// Durable storage collaborator for window records.
///
/// Writes are best-effort: the runtime logs failures and keeps in-memory state
/// authoritative. Adapters that need real asynchrony queue internally; the
/// runtime never awaits storage.
pub trait WindowStore {
    /// Stores a newly created window record.
    fn insert_window(&self, record: &WindowRecord) -> Result<(), String>;

    /// Applies a partial update to the stored record for `id`.
    fn update_window(&self, id: WindowId, patch: &WindowPatch) -> Result<(), String>;

    /// Deletes the stored record for `id`.
    fn delete_window(&self, id: WindowId) -> Result<(), String>;

    /// Loads every stored record; used once at boot to hydrate the runtime.
    fn all_windows(&self) -> Result<Vec<WindowRecord>, String>;
}

/// Object-safe boxed future returned by [`Renderer::remove`]; resolves after any
/// close animation has finished.
pub type RendererFuture<T> = LocalBoxFuture<'static, T>;

/// Visual-surface collaborator driven imperatively by the window manager.
///
/// The default geometry helpers delegate to [`geometry`] against
/// [`Renderer::viewport_rect`]; adapters with their own layout rules may override
/// them.
pub trait Renderer {
    /// Usable desktop area in pixels.
    fn viewport_rect(&self) -> WindowRect;

    /// Creates the visual surface for `record` and returns its handle.
    fn mount(&self, record: &WindowRecord) -> SurfaceHandle;

    /// Mounts application content into an existing surface.
    fn mount_content(&self, surface: SurfaceHandle, context: &AppMountContext);

    /// Moves a surface.
    fn update_position(&self, surface: SurfaceHandle, x: i32, y: i32);

    /// Resizes a surface.
    fn update_size(&self, surface: SurfaceHandle, size: WindowSize);

    /// Restacks a surface.
    fn update_z_index(&self, surface: SurfaceHandle, z_index: i32);

    /// Marks a surface as the active window or returns it to the inactive style.
    fn set_active(&self, surface: SurfaceHandle, active: bool);

    /// Hides a minimized surface or reveals a restored one.
    fn set_minimized(&self, surface: SurfaceHandle, minimized: bool);

    /// Tears a surface down; the future resolves after any close animation.
    fn remove(&self, surface: SurfaceHandle) -> RendererFuture<()>;

    /// Clamps `rect`'s origin so its footprint stays inside the viewport.
    fn constrain_position(&self, rect: WindowRect) -> (i32, i32) {
        geometry::constrain_position(self.viewport_rect(), rect)
    }

    /// Clamps a size between the given minimums and the viewport dimensions.
    fn constrain_size(
        &self,
        min_width: i32,
        min_height: i32,
        width: i32,
        height: i32,
    ) -> (i32, i32) {
        geometry::constrain_size(self.viewport_rect(), min_width, min_height, width, height)
    }

    /// Cascaded default position for the next window given how many are open.
    fn cascade_position(&self, width: i32, height: i32, step: i32, open_count: usize) -> (i32, i32) {
        geometry::cascade_position(self.viewport_rect(), width, height, step, open_count)
    }
}

/// Unit of deferred work accepted by [`Scheduler`].
pub type ScheduledTask = Box<dyn FnOnce()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Identifies debounced work; arming a key again replaces its pending task.
pub enum DebounceKey {
    /// Deferred geometry persistence for one window.
    WindowPersist(WindowId),
}

/// Cooperative scheduling collaborator: frame-aligned batching and trailing-edge timers.
///
/// Browser hosts back this with animation frames and timeouts; headless hosts
/// drive it manually.
pub trait Scheduler {
    /// Runs `task` at the next frame boundary. Tasks submitted for the same frame
    /// run in submission order.
    fn schedule_frame(&self, task: ScheduledTask);

    /// Arms (or re-arms) the trailing-edge timer for `key`; only the task from the
    /// last arm before the delay elapses fires.
    fn debounce(&self, key: DebounceKey, delay: Duration, task: ScheduledTask);

    /// Drops any pending task for `key`; no-op when none is armed.
    fn cancel_debounce(&self, key: DebounceKey);
}

/// Wall-clock collaborator.
pub trait Clock {
    /// Current unix time in milliseconds.
    fn now_unix_ms(&self) -> u64;
}

/// Pure placement and clamping helpers shared by the runtime and renderer adapters.
pub mod geometry {
    use super::WindowRect;

    /// Cascade slots before the diagonal offset pattern repeats.
    pub const CASCADE_WRAP: usize = 8;

    /// Clamps `width`/`height` between the given minimums and the viewport dimensions.
    pub fn constrain_size(
        viewport: WindowRect,
        min_width: i32,
        min_height: i32,
        width: i32,
        height: i32,
    ) -> (i32, i32) {
        let max_w = viewport.w.max(min_width);
        let max_h = viewport.h.max(min_height);
        (width.clamp(min_width, max_w), height.clamp(min_height, max_h))
    }

    /// Clamps `rect`'s origin so its footprint stays inside the viewport. Footprints
    /// larger than the viewport pin to the viewport origin.
    pub fn constrain_position(viewport: WindowRect, rect: WindowRect) -> (i32, i32) {
        let max_x = viewport.x + (viewport.w - rect.w).max(0);
        let max_y = viewport.y + (viewport.h - rect.h).max(0);
        (rect.x.clamp(viewport.x, max_x), rect.y.clamp(viewport.y, max_y))
    }

    /// Screen-centered diagonal cascade for the next window of the given footprint,
    /// wrapping every [`CASCADE_WRAP`] windows so deep stacks stay on screen.
    pub fn cascade_position(
        viewport: WindowRect,
        width: i32,
        height: i32,
        step: i32,
        open_count: usize,
    ) -> (i32, i32) {
        let slot = (open_count % CASCADE_WRAP) as i32;
        let rect = WindowRect {
            x: viewport.x + (viewport.w - width).max(0) / 2 + slot * step,
            y: viewport.y + (viewport.h - height).max(0) / 2 + slot * step,
            w: width,
            h: height,
        };
        constrain_position(viewport, rect)
    }
}
