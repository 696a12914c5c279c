use desktop_contract::{WindowGeometry, WindowId, WindowRecord, WindowRect, WindowSize};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesktopState {
    pub next_window_id: u64,
    pub windows: Vec<WindowRecord>,
    pub active_window: Option<WindowId>,
    pub hud_visible: bool,
}

impl Default for DesktopState {
    fn default() -> Self {
        Self {
            next_window_id: 1,
            windows: Vec::new(),
            active_window: None,
            hud_visible: true,
        }
    }
}

impl DesktopState {
    pub fn window(&self, id: WindowId) -> Option<&WindowRecord> {
        self.windows.iter().find(|window| window.id == id)
    }

    pub fn window_index(&self, id: WindowId) -> Option<usize> {
        self.windows.iter().position(|window| window.id == id)
    }

    pub fn max_z_index(&self) -> Option<i32> {
        self.windows.iter().map(|window| window.z_index).max()
    }

    pub fn top_non_minimized(&self) -> Option<&WindowRecord> {
        self.windows
            .iter()
            .filter(|window| !window.minimized)
            .max_by_key(|window| window.z_index)
    }
}

/// Optional overrides applied when a window is created; unset fields fall
/// back to the registered [`desktop_contract::AppDescriptor`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateWindowOptions {
    pub title: Option<String>,
    pub icon: Option<String>,
    pub position: Option<(i32, i32)>,
    pub size: Option<WindowSize>,
    pub launch_params: Value,
}

impl CreateWindowOptions {
    pub fn with_position(x: i32, y: i32) -> Self {
        Self {
            position: Some((x, y)),
            ..Self::default()
        }
    }

    pub fn with_size(size: WindowSize) -> Self {
        Self {
            size: Some(size),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: i32,
    pub y: i32,
}

impl PointerPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointerId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerButton {
    Primary,
    Secondary,
    Auxiliary,
}

/// What the pointer went down on inside the window chrome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PressTarget {
    DragRegion,
    ControlButton,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerPress {
    pub pointer_id: PointerId,
    pub position: PointerPosition,
    pub button: PointerButton,
    pub target: PressTarget,
}

impl PointerPress {
    /// Primary-button press on the drag region, the common case.
    pub fn primary(pointer_id: u32, x: i32, y: i32) -> Self {
        Self {
            pointer_id: PointerId(pointer_id),
            position: PointerPosition::new(x, y),
            button: PointerButton::Primary,
            target: PressTarget::DragRegion,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeEdge {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    pub window_id: WindowId,
    pub pointer_id: PointerId,
    pub pointer_start: PointerPosition,
    /// Geometry at the moment the session began; restored on cancel.
    pub origin: WindowGeometry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeSession {
    pub window_id: WindowId,
    pub edge: ResizeEdge,
    pub pointer_id: PointerId,
    pub pointer_start: PointerPosition,
    /// Geometry at the moment the session began; restored on cancel. Keeps
    /// the auto-size marker if the window had one.
    pub origin: WindowGeometry,
    /// Concrete rect the edge deltas are applied against.
    pub rect_start: WindowRect,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionState {
    pub dragging: Option<DragSession>,
    pub resizing: Option<ResizeSession>,
}

impl InteractionState {
    pub fn session_active(&self) -> bool {
        self.dragging.is_some() || self.resizing.is_some()
    }
}
