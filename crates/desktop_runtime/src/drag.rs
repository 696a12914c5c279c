//! Pointer-driven window move sessions.
//!
//! A session begins on a primary-button press in a window's drag region and
//! captures that pointer: moves from other pointers are ignored. Intermediate
//! positions apply at most once per frame with debounced durability; the
//! final position on pointer-up persists immediately. A cancelled session
//! puts the window back where it started without writing anything.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use desktop_contract::{PersistPolicy, WindowGeometry, WindowId, WindowRect, WindowSize};

use crate::model::{
    DragSession, InteractionState, PointerButton, PointerId, PointerPosition, PointerPress,
    PressTarget,
};
use crate::window_manager::WindowManager;

enum SnapTarget {
    Maximize,
    TileLeft,
    TileRight,
}

/// Which edge snap, if any, a drag released at `pointer` lands on.
fn snap_target(viewport: WindowRect, pointer: PointerPosition, threshold: i32) -> Option<SnapTarget> {
    if pointer.y <= viewport.y + threshold {
        Some(SnapTarget::Maximize)
    } else if pointer.x <= viewport.x + threshold {
        Some(SnapTarget::TileLeft)
    } else if pointer.x >= viewport.x + viewport.w - threshold {
        Some(SnapTarget::TileRight)
    } else {
        None
    }
}

struct DragInner {
    manager: WindowManager,
    interaction: Rc<RefCell<InteractionState>>,
    pending_pointer: Cell<Option<PointerPosition>>,
    frame_scheduled: Cell<bool>,
}

/// Shared-handle drag controller; one session at a time across the desktop.
#[derive(Clone)]
pub struct DragController {
    inner: Rc<DragInner>,
}

impl DragController {
    pub fn new(manager: WindowManager, interaction: Rc<RefCell<InteractionState>>) -> Self {
        Self {
            inner: Rc::new(DragInner {
                manager,
                interaction,
                pending_pointer: Cell::new(None),
                frame_scheduled: Cell::new(false),
            }),
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.inner.interaction.borrow().dragging.is_some()
    }

    pub fn session(&self) -> Option<DragSession> {
        self.inner.interaction.borrow().dragging.clone()
    }

    /// Starts a session. Returns `false` without starting when another
    /// drag/resize session is live, the press is not a primary-button press
    /// on the drag region, the window is unknown, or the window is maximized.
    pub fn begin(&self, window_id: WindowId, press: PointerPress) -> bool {
        if self.inner.interaction.borrow().session_active() {
            return false;
        }
        if press.button != PointerButton::Primary || press.target != PressTarget::DragRegion {
            return false;
        }
        let Some(record) = self.inner.manager.window(window_id) else {
            return false;
        };
        if record.maximized {
            return false;
        }

        self.inner.pending_pointer.set(None);
        self.inner.frame_scheduled.set(false);
        self.inner.interaction.borrow_mut().dragging = Some(DragSession {
            window_id,
            pointer_id: press.pointer_id,
            pointer_start: press.position,
            origin: record.geometry,
        });
        true
    }

    /// Feeds a pointer sample. Samples are coalesced and applied at the next
    /// frame boundary; only the captured pointer is honored.
    pub fn pointer_move(&self, pointer_id: PointerId, position: PointerPosition) {
        {
            let interaction = self.inner.interaction.borrow();
            let Some(session) = interaction.dragging.as_ref() else {
                return;
            };
            if session.pointer_id != pointer_id {
                return;
            }
        }
        self.inner.pending_pointer.set(Some(position));
        if self.inner.frame_scheduled.replace(true) {
            return;
        }
        let controller = self.clone();
        self.inner.manager.scheduler().schedule_frame(Box::new(move || {
            controller.apply_pending();
        }));
    }

    fn apply_pending(&self) {
        self.inner.frame_scheduled.set(false);
        let Some(position) = self.inner.pending_pointer.take() else {
            return;
        };
        let Some(session) = self.session() else {
            return;
        };
        let (x, y) = session_position(&session, position);
        if self
            .inner
            .manager
            .set_position(session.window_id, x, y, PersistPolicy::Debounced)
            .is_err()
        {
            // Window closed mid-session.
            self.inner.interaction.borrow_mut().dragging = None;
        }
    }

    /// Ends the session on pointer-up, committing the final position with an
    /// immediate write (or snapping against a viewport edge when enabled).
    /// Returns `false` when no session owns `pointer_id`.
    pub fn end(&self, pointer_id: PointerId, position: PointerPosition) -> bool {
        let Some(session) = self.take_session(pointer_id) else {
            return false;
        };
        let (x, y) = session_position(&session, position);

        let config = self.inner.manager.config();
        let snapped = config
            .edge_snap
            .then(|| {
                snap_target(
                    self.inner.manager.viewport_rect(),
                    position,
                    config.snap_edge_threshold,
                )
            })
            .flatten();
        match snapped {
            Some(SnapTarget::Maximize) => {
                // Take the dragged position without persisting it; the
                // maximize write carries it as the restore snapshot.
                let _ = self
                    .inner
                    .manager
                    .set_position(session.window_id, x, y, PersistPolicy::Skip);
                let _ = self.inner.manager.toggle_maximize(session.window_id);
            }
            Some(SnapTarget::TileLeft) => self.tile(session.window_id, true),
            Some(SnapTarget::TileRight) => self.tile(session.window_id, false),
            None => {
                let _ = self
                    .inner
                    .manager
                    .set_position(session.window_id, x, y, PersistPolicy::Immediate);
            }
        }
        true
    }

    /// Cancels the session owned by `pointer_id` (device pointer-cancel).
    pub fn pointer_cancel(&self, pointer_id: PointerId) -> bool {
        match self.take_session(pointer_id) {
            Some(session) => {
                self.revert(session);
                true
            }
            None => false,
        }
    }

    /// Cancels whatever session is live (escape key, focus loss).
    pub fn cancel(&self) -> bool {
        let session = self.inner.interaction.borrow_mut().dragging.take();
        match session {
            Some(session) => {
                self.revert(session);
                true
            }
            None => false,
        }
    }

    fn take_session(&self, pointer_id: PointerId) -> Option<DragSession> {
        let mut interaction = self.inner.interaction.borrow_mut();
        if interaction
            .dragging
            .as_ref()
            .is_some_and(|session| session.pointer_id == pointer_id)
        {
            interaction.dragging.take()
        } else {
            None
        }
    }

    fn revert(&self, session: DragSession) {
        self.inner.pending_pointer.set(None);
        let _ = self.inner.manager.set_position(
            session.window_id,
            session.origin.x,
            session.origin.y,
            PersistPolicy::Skip,
        );
    }

    fn tile(&self, window_id: WindowId, left: bool) {
        let viewport = self.inner.manager.viewport_rect();
        let width = viewport.w / 2;
        let geometry = if left {
            WindowGeometry::new(viewport.x, viewport.y, WindowSize::fixed(width, viewport.h))
        } else {
            WindowGeometry::new(
                viewport.x + width,
                viewport.y,
                WindowSize::fixed(viewport.w - width, viewport.h),
            )
        };
        let _ = self
            .inner
            .manager
            .set_geometry(window_id, geometry, PersistPolicy::Immediate);
    }
}

fn session_position(session: &DragSession, pointer: PointerPosition) -> (i32, i32) {
    (
        session.origin.x + pointer.x - session.pointer_start.x,
        session.origin.y + pointer.y - session.pointer_start.y,
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use desktop_contract::{AppDescriptor, ApplicationId, WindowPatch, WindowRecord, WindowStore};
    use platform_host::{HeadlessHost, MemoryWindowStore};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::apps::AppRegistry;
    use crate::config::DesktopConfig;
    use crate::model::CreateWindowOptions;

    fn notes() -> ApplicationId {
        ApplicationId::trusted("notes")
    }

    #[derive(Clone, Default)]
    struct CountingWindowStore {
        inner: MemoryWindowStore,
        updates: Rc<Cell<usize>>,
    }

    impl WindowStore for CountingWindowStore {
        fn insert_window(&self, record: &WindowRecord) -> Result<(), String> {
            self.inner.insert_window(record)
        }

        fn update_window(&self, id: WindowId, patch: &WindowPatch) -> Result<(), String> {
            self.updates.set(self.updates.get() + 1);
            self.inner.update_window(id, patch)
        }

        fn delete_window(&self, id: WindowId) -> Result<(), String> {
            self.inner.delete_window(id)
        }

        fn all_windows(&self) -> Result<Vec<WindowRecord>, String> {
            self.inner.all_windows()
        }
    }

    struct Fixture {
        manager: WindowManager,
        drag: DragController,
        host: HeadlessHost,
        store: CountingWindowStore,
    }

    fn fixture() -> Fixture {
        fixture_with_config(DesktopConfig::default())
    }

    fn fixture_with_config(config: DesktopConfig) -> Fixture {
        let host = HeadlessHost::new();
        let store = CountingWindowStore::default();
        let mut services = host.services();
        services.window_store = Rc::new(store.clone());
        let registry = AppRegistry::with_apps([AppDescriptor::new(notes(), "Notes", "icons/notes")]);
        let manager = WindowManager::new(&services, registry, config);
        let drag = DragController::new(manager.clone(), Rc::new(RefCell::new(InteractionState::default())));
        Fixture {
            manager,
            drag,
            host,
            store,
        }
    }

    fn open_window(fixture: &Fixture) -> WindowRecord {
        fixture
            .manager
            .create_window(
                &notes(),
                CreateWindowOptions {
                    position: Some((300, 200)),
                    size: Some(WindowSize::fixed(400, 300)),
                    ..CreateWindowOptions::default()
                },
            )
            .expect("create window")
    }

    fn position_of(fixture: &Fixture, id: WindowId) -> (i32, i32) {
        let record = fixture.manager.window(id).expect("window open");
        (record.geometry.x, record.geometry.y)
    }

    #[test]
    fn begin_rejects_everything_but_primary_presses_on_the_drag_region() {
        let fixture = fixture();
        let record = open_window(&fixture);

        let secondary = PointerPress {
            button: PointerButton::Secondary,
            ..PointerPress::primary(1, 320, 210)
        };
        assert!(!fixture.drag.begin(record.id, secondary));

        let on_control = PointerPress {
            target: PressTarget::ControlButton,
            ..PointerPress::primary(1, 320, 210)
        };
        assert!(!fixture.drag.begin(record.id, on_control));

        assert!(!fixture.drag.begin(WindowId(99), PointerPress::primary(1, 320, 210)));

        fixture.manager.toggle_maximize(record.id).expect("maximize");
        assert!(!fixture.drag.begin(record.id, PointerPress::primary(1, 320, 210)));
        assert!(!fixture.drag.is_dragging());
    }

    #[test]
    fn moves_apply_once_per_frame_with_the_latest_sample() {
        let fixture = fixture();
        let record = open_window(&fixture);
        assert!(fixture.drag.begin(record.id, PointerPress::primary(1, 320, 210)));

        fixture.drag.pointer_move(PointerId(1), PointerPosition::new(330, 220));
        fixture.drag.pointer_move(PointerId(1), PointerPosition::new(360, 240));
        // Nothing applies until the frame boundary.
        assert_eq!(position_of(&fixture, record.id), (300, 200));

        assert_eq!(fixture.host.scheduler.run_frame(), 1);
        assert_eq!(position_of(&fixture, record.id), (340, 230));

        // A new sample needs a new frame.
        fixture.drag.pointer_move(PointerId(1), PointerPosition::new(370, 250));
        fixture.host.scheduler.run_frame();
        assert_eq!(position_of(&fixture, record.id), (350, 240));
    }

    #[test]
    fn samples_from_other_pointers_are_ignored() {
        let fixture = fixture();
        let record = open_window(&fixture);
        assert!(fixture.drag.begin(record.id, PointerPress::primary(1, 320, 210)));

        fixture.drag.pointer_move(PointerId(2), PointerPosition::new(900, 700));
        assert_eq!(fixture.host.scheduler.run_frame(), 0);
        assert_eq!(position_of(&fixture, record.id), (300, 200));

        assert!(!fixture.drag.end(PointerId(2), PointerPosition::new(900, 700)));
        assert!(fixture.drag.is_dragging());
    }

    #[test]
    fn a_session_commits_exactly_one_durable_write_on_release() {
        let fixture = fixture();
        let record = open_window(&fixture);
        let writes_before = fixture.store.updates.get();
        assert!(fixture.drag.begin(record.id, PointerPress::primary(1, 320, 210)));

        for step in 1..=5 {
            fixture
                .drag
                .pointer_move(PointerId(1), PointerPosition::new(320 + step * 10, 210));
            fixture.host.scheduler.run_frame();
        }
        assert_eq!(fixture.store.updates.get(), writes_before);

        assert!(fixture.drag.end(PointerId(1), PointerPosition::new(400, 260)));
        assert_eq!(fixture.store.updates.get(), writes_before + 1);
        assert!(!fixture.drag.is_dragging());
        assert_eq!(position_of(&fixture, record.id), (380, 250));

        // The debounce armed during the drag must not fire afterwards.
        fixture.host.scheduler.advance(Duration::from_millis(5000));
        assert_eq!(fixture.store.updates.get(), writes_before + 1);
        let stored = fixture.store.inner.record(record.id).expect("persisted");
        assert_eq!((stored.geometry.x, stored.geometry.y), (380, 250));
    }

    #[test]
    fn a_quiet_mid_drag_second_flushes_the_debounced_position() {
        let fixture = fixture();
        let record = open_window(&fixture);
        let writes_before = fixture.store.updates.get();
        assert!(fixture.drag.begin(record.id, PointerPress::primary(1, 320, 210)));

        fixture.drag.pointer_move(PointerId(1), PointerPosition::new(380, 210));
        fixture.host.scheduler.run_frame();
        fixture.host.scheduler.advance(Duration::from_millis(1000));
        assert_eq!(fixture.store.updates.get(), writes_before + 1);

        assert!(fixture.drag.end(PointerId(1), PointerPosition::new(420, 210)));
        assert_eq!(fixture.store.updates.get(), writes_before + 2);
    }

    #[test]
    fn cancel_restores_the_origin_without_any_write() {
        let fixture = fixture();
        let record = open_window(&fixture);
        let writes_before = fixture.store.updates.get();
        assert!(fixture.drag.begin(record.id, PointerPress::primary(1, 320, 210)));

        fixture.drag.pointer_move(PointerId(1), PointerPosition::new(500, 400));
        fixture.host.scheduler.run_frame();
        assert_eq!(position_of(&fixture, record.id), (480, 390));

        assert!(fixture.drag.cancel());
        assert!(!fixture.drag.is_dragging());
        assert_eq!(position_of(&fixture, record.id), (300, 200));

        fixture.host.scheduler.advance(Duration::from_millis(5000));
        assert_eq!(fixture.store.updates.get(), writes_before);
    }

    #[test]
    fn device_pointer_cancel_only_honors_the_captured_pointer() {
        let fixture = fixture();
        let record = open_window(&fixture);
        assert!(fixture.drag.begin(record.id, PointerPress::primary(1, 320, 210)));

        assert!(!fixture.drag.pointer_cancel(PointerId(5)));
        assert!(fixture.drag.is_dragging());

        assert!(fixture.drag.pointer_cancel(PointerId(1)));
        assert!(!fixture.drag.is_dragging());
        assert_eq!(position_of(&fixture, record.id), (300, 200));
    }

    #[test]
    fn positions_clamp_against_the_viewport_during_the_drag() {
        let fixture = fixture();
        let record = open_window(&fixture);
        assert!(fixture.drag.begin(record.id, PointerPress::primary(1, 320, 210)));

        fixture
            .drag
            .pointer_move(PointerId(1), PointerPosition::new(5000, 60));
        fixture.host.scheduler.run_frame();
        // 1280x800 viewport, 400x300 window.
        assert_eq!(position_of(&fixture, record.id), (880, 50));
    }

    #[test]
    fn releasing_at_the_top_edge_maximizes_with_the_dragged_snapshot() {
        let fixture = fixture();
        let record = open_window(&fixture);
        let writes_before = fixture.store.updates.get();
        assert!(fixture.drag.begin(record.id, PointerPress::primary(1, 320, 210)));

        fixture.drag.pointer_move(PointerId(1), PointerPosition::new(500, 40));
        fixture.host.scheduler.run_frame();
        assert!(fixture.drag.end(PointerId(1), PointerPosition::new(500, 10)));

        let maximized = fixture.manager.window(record.id).expect("open");
        assert!(maximized.maximized);
        assert_eq!(maximized.geometry.size, WindowSize::fixed(1280, 800));
        // Restore snapshot is the dragged-to position, not the origin.
        assert_eq!(
            maximized.pre_maximize.map(|g| (g.x, g.y)),
            Some((480, 0))
        );
        // One durable write for the whole gesture.
        assert_eq!(fixture.store.updates.get(), writes_before + 1);
    }

    #[test]
    fn releasing_at_a_side_edge_tiles_half_the_viewport() {
        let fixture = fixture();
        let record = open_window(&fixture);
        assert!(fixture.drag.begin(record.id, PointerPress::primary(1, 320, 210)));
        assert!(fixture.drag.end(PointerId(1), PointerPosition::new(1275, 400)));

        let tiled = fixture.manager.window(record.id).expect("open");
        assert!(!tiled.maximized);
        assert_eq!((tiled.geometry.x, tiled.geometry.y), (640, 0));
        assert_eq!(tiled.geometry.size, WindowSize::fixed(640, 800));
    }

    #[test]
    fn edge_snapping_can_be_disabled() {
        let config = DesktopConfig {
            edge_snap: false,
            ..DesktopConfig::default()
        };
        let fixture = fixture_with_config(config);
        let record = open_window(&fixture);
        assert!(fixture.drag.begin(record.id, PointerPress::primary(1, 320, 210)));
        assert!(fixture.drag.end(PointerId(1), PointerPosition::new(320, 5)));

        let released = fixture.manager.window(record.id).expect("open");
        assert!(!released.maximized);
        assert_eq!((released.geometry.x, released.geometry.y), (300, 0));
    }

    #[test]
    fn only_one_drag_session_at_a_time() {
        let fixture = fixture();
        let first = open_window(&fixture);
        let second = fixture
            .manager
            .create_window(&notes(), CreateWindowOptions::default())
            .expect("second window");

        assert!(fixture.drag.begin(first.id, PointerPress::primary(1, 320, 210)));
        assert!(!fixture.drag.begin(second.id, PointerPress::primary(2, 500, 400)));

        assert!(fixture.drag.end(PointerId(1), PointerPosition::new(320, 210)));
        assert!(fixture.drag.begin(second.id, PointerPress::primary(2, 500, 400)));
    }
}
