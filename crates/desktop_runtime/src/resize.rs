//! Pointer-driven window resize sessions.
//!
//! Sessions anchor the edge or corner opposite the grabbed one: dragging the
//! north-west corner grows the rect leftwards and upwards while the
//! south-east corner stays put, even when the size clamps against the
//! configured minimums. Auto-sized windows resolve to their estimated
//! concrete size for the session and become fixed-size on the first applied
//! change; cancelling puts the auto marker back.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use desktop_contract::{PersistPolicy, WindowGeometry, WindowId, WindowRect, WindowSize};

use crate::model::{
    InteractionState, PointerButton, PointerId, PointerPosition, PointerPress, ResizeEdge,
    ResizeSession,
};
use crate::window_manager::WindowManager;

/// Applies pointer deltas to `start` for the grabbed `edge`. Arms touching
/// west or north move the origin so the opposite edge stays anchored; the
/// result may undershoot minimums and is clamped by the caller.
pub fn resize_rect(start: WindowRect, edge: ResizeEdge, dx: i32, dy: i32) -> WindowRect {
    match edge {
        ResizeEdge::East => WindowRect {
            w: start.w + dx,
            ..start
        },
        ResizeEdge::South => WindowRect {
            h: start.h + dy,
            ..start
        },
        ResizeEdge::West => WindowRect {
            x: start.x + dx,
            w: start.w - dx,
            ..start
        },
        ResizeEdge::North => WindowRect {
            y: start.y + dy,
            h: start.h - dy,
            ..start
        },
        ResizeEdge::SouthEast => WindowRect {
            w: start.w + dx,
            h: start.h + dy,
            ..start
        },
        ResizeEdge::NorthEast => WindowRect {
            y: start.y + dy,
            w: start.w + dx,
            h: start.h - dy,
            ..start
        },
        ResizeEdge::SouthWest => WindowRect {
            x: start.x + dx,
            w: start.w - dx,
            h: start.h + dy,
            ..start
        },
        ResizeEdge::NorthWest => WindowRect {
            x: start.x + dx,
            y: start.y + dy,
            w: start.w - dx,
            h: start.h - dy,
            ..start
        },
    }
}

struct ResizeInner {
    manager: WindowManager,
    interaction: Rc<RefCell<InteractionState>>,
    pending_pointer: Cell<Option<PointerPosition>>,
    frame_scheduled: Cell<bool>,
}

/// Shared-handle resize controller; one session at a time across the desktop.
#[derive(Clone)]
pub struct ResizeController {
    inner: Rc<ResizeInner>,
}

impl ResizeController {
    pub fn new(manager: WindowManager, interaction: Rc<RefCell<InteractionState>>) -> Self {
        Self {
            inner: Rc::new(ResizeInner {
                manager,
                interaction,
                pending_pointer: Cell::new(None),
                frame_scheduled: Cell::new(false),
            }),
        }
    }

    pub fn is_resizing(&self) -> bool {
        self.inner.interaction.borrow().resizing.is_some()
    }

    pub fn session(&self) -> Option<ResizeSession> {
        self.inner.interaction.borrow().resizing.clone()
    }

    /// Starts a session on `edge`. Returns `false` without starting when
    /// another drag/resize session is live, the press is not primary-button,
    /// the window is unknown, or the window is maximized.
    pub fn begin(&self, window_id: WindowId, edge: ResizeEdge, press: PointerPress) -> bool {
        if self.inner.interaction.borrow().session_active() {
            return false;
        }
        if press.button != PointerButton::Primary {
            return false;
        }
        let Some(record) = self.inner.manager.window(window_id) else {
            return false;
        };
        if record.maximized {
            return false;
        }

        let (estimate_width, estimate_height) = self.inner.manager.config().auto_size_estimate();
        self.inner.pending_pointer.set(None);
        self.inner.frame_scheduled.set(false);
        self.inner.interaction.borrow_mut().resizing = Some(ResizeSession {
            window_id,
            edge,
            pointer_id: press.pointer_id,
            pointer_start: press.position,
            origin: record.geometry,
            rect_start: record.geometry.rect(estimate_width, estimate_height),
        });
        true
    }

    /// Feeds a pointer sample. Samples are coalesced and applied at the next
    /// frame boundary; only the captured pointer is honored.
    pub fn pointer_move(&self, pointer_id: PointerId, position: PointerPosition) {
        {
            let interaction = self.inner.interaction.borrow();
            let Some(session) = interaction.resizing.as_ref() else {
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
        if self
            .apply_session(&session, position, PersistPolicy::Debounced)
            .is_err()
        {
            // Window closed mid-session.
            self.inner.interaction.borrow_mut().resizing = None;
        }
    }

    /// Ends the session on pointer-up, committing the final geometry with an
    /// immediate write. Returns `false` when no session owns `pointer_id`.
    pub fn end(&self, pointer_id: PointerId, position: PointerPosition) -> bool {
        let Some(session) = self.take_session(pointer_id) else {
            return false;
        };
        let _ = self.apply_session(&session, position, PersistPolicy::Immediate);
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
        let session = self.inner.interaction.borrow_mut().resizing.take();
        match session {
            Some(session) => {
                self.revert(session);
                true
            }
            None => false,
        }
    }

    fn take_session(&self, pointer_id: PointerId) -> Option<ResizeSession> {
        let mut interaction = self.inner.interaction.borrow_mut();
        if interaction
            .resizing
            .as_ref()
            .is_some_and(|session| session.pointer_id == pointer_id)
        {
            interaction.resizing.take()
        } else {
            None
        }
    }

    fn revert(&self, session: ResizeSession) {
        self.inner.pending_pointer.set(None);
        let _ = self.inner.manager.set_geometry(
            session.window_id,
            session.origin,
            PersistPolicy::Skip,
        );
    }

    fn apply_session(
        &self,
        session: &ResizeSession,
        pointer: PointerPosition,
        persist: PersistPolicy,
    ) -> Result<(), crate::window_manager::WindowManagerError> {
        let manager = &self.inner.manager;
        let config = manager.config();
        let dx = pointer.x - session.pointer_start.x;
        let dy = pointer.y - session.pointer_start.y;
        let raw = resize_rect(session.rect_start, session.edge, dx, dy);

        let viewport = manager.viewport_rect();
        let width = raw.w.clamp(config.min_window_width, viewport.w);
        let height = raw.h.clamp(config.min_window_height, viewport.h);

        // Re-derive the origin so the anchored edges hold once the size
        // clamps.
        let x = match session.edge {
            ResizeEdge::West | ResizeEdge::NorthWest | ResizeEdge::SouthWest => {
                session.rect_start.x + session.rect_start.w - width
            }
            _ => raw.x,
        };
        let y = match session.edge {
            ResizeEdge::North | ResizeEdge::NorthWest | ResizeEdge::NorthEast => {
                session.rect_start.y + session.rect_start.h - height
            }
            _ => raw.y,
        };

        manager.set_geometry(
            session.window_id,
            WindowGeometry::new(x, y, WindowSize::fixed(width, height)),
            persist,
        )
    }
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
    use crate::drag::DragController;
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
        resize: ResizeController,
        interaction: Rc<RefCell<InteractionState>>,
        host: HeadlessHost,
        store: CountingWindowStore,
    }

    fn fixture() -> Fixture {
        let host = HeadlessHost::new();
        let store = CountingWindowStore::default();
        let mut services = host.services();
        services.window_store = Rc::new(store.clone());
        let registry = AppRegistry::with_apps([AppDescriptor::new(notes(), "Notes", "icons/notes")]);
        let manager = WindowManager::new(&services, registry, DesktopConfig::default());
        let interaction = Rc::new(RefCell::new(InteractionState::default()));
        let resize = ResizeController::new(manager.clone(), interaction.clone());
        Fixture {
            manager,
            resize,
            interaction,
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
                    position: Some((100, 100)),
                    size: Some(WindowSize::fixed(600, 400)),
                    ..CreateWindowOptions::default()
                },
            )
            .expect("create window")
    }

    fn geometry_of(fixture: &Fixture, id: WindowId) -> (i32, i32, WindowSize) {
        let record = fixture.manager.window(id).expect("window open");
        (record.geometry.x, record.geometry.y, record.geometry.size)
    }

    #[test]
    fn rect_math_moves_only_the_grabbed_edges() {
        let start = WindowRect {
            x: 100,
            y: 100,
            w: 600,
            h: 400,
        };
        let cases = [
            (ResizeEdge::East, (100, 100, 630, 400)),
            (ResizeEdge::South, (100, 100, 600, 410)),
            (ResizeEdge::West, (130, 100, 570, 400)),
            (ResizeEdge::North, (100, 110, 600, 390)),
            (ResizeEdge::SouthEast, (100, 100, 630, 410)),
            (ResizeEdge::NorthEast, (100, 110, 630, 390)),
            (ResizeEdge::SouthWest, (130, 100, 570, 410)),
            (ResizeEdge::NorthWest, (130, 110, 570, 390)),
        ];
        for (edge, expected) in cases {
            let rect = resize_rect(start, edge, 30, 10);
            assert_eq!(
                (rect.x, rect.y, rect.w, rect.h),
                expected,
                "edge {edge:?}"
            );
        }
    }

    #[test]
    fn northwest_grab_grows_the_window_and_shifts_its_origin() {
        let fixture = fixture();
        let record = open_window(&fixture);
        assert!(fixture
            .resize
            .begin(record.id, ResizeEdge::NorthWest, PointerPress::primary(1, 100, 100)));

        fixture
            .resize
            .pointer_move(PointerId(1), PointerPosition::new(50, 70));
        fixture.host.scheduler.run_frame();

        assert_eq!(
            geometry_of(&fixture, record.id),
            (50, 70, WindowSize::fixed(650, 430))
        );
    }

    #[test]
    fn minimum_clamp_keeps_the_opposite_edge_anchored() {
        let fixture = fixture();
        let record = open_window(&fixture);
        assert!(fixture
            .resize
            .begin(record.id, ResizeEdge::West, PointerPress::primary(1, 100, 300)));

        // Push far past the minimum width.
        fixture
            .resize
            .pointer_move(PointerId(1), PointerPosition::new(680, 300));
        fixture.host.scheduler.run_frame();

        // Right edge stays at 700; width clamps to 220.
        assert_eq!(
            geometry_of(&fixture, record.id),
            (480, 100, WindowSize::fixed(220, 400))
        );
    }

    #[test]
    fn east_grab_keeps_the_origin_still() {
        let fixture = fixture();
        let record = open_window(&fixture);
        assert!(fixture
            .resize
            .begin(record.id, ResizeEdge::SouthEast, PointerPress::primary(1, 700, 500)));

        fixture
            .resize
            .pointer_move(PointerId(1), PointerPosition::new(760, 540));
        fixture.host.scheduler.run_frame();

        assert_eq!(
            geometry_of(&fixture, record.id),
            (100, 100, WindowSize::fixed(660, 440))
        );
    }

    #[test]
    fn a_session_commits_exactly_one_durable_write_on_release() {
        let fixture = fixture();
        let record = open_window(&fixture);
        let writes_before = fixture.store.updates.get();
        assert!(fixture
            .resize
            .begin(record.id, ResizeEdge::East, PointerPress::primary(1, 700, 300)));

        for step in 1..=4 {
            fixture
                .resize
                .pointer_move(PointerId(1), PointerPosition::new(700 + step * 15, 300));
            fixture.host.scheduler.run_frame();
        }
        assert_eq!(fixture.store.updates.get(), writes_before);

        assert!(fixture.resize.end(PointerId(1), PointerPosition::new(780, 300)));
        assert_eq!(fixture.store.updates.get(), writes_before + 1);
        assert!(!fixture.resize.is_resizing());

        fixture.host.scheduler.advance(Duration::from_millis(5000));
        assert_eq!(fixture.store.updates.get(), writes_before + 1);
        let stored = fixture.store.inner.record(record.id).expect("persisted");
        assert_eq!(stored.geometry.size, WindowSize::fixed(680, 400));
    }

    #[test]
    fn cancel_restores_the_starting_geometry_without_any_write() {
        let fixture = fixture();
        let record = open_window(&fixture);
        let writes_before = fixture.store.updates.get();
        assert!(fixture
            .resize
            .begin(record.id, ResizeEdge::South, PointerPress::primary(1, 400, 500)));

        fixture
            .resize
            .pointer_move(PointerId(1), PointerPosition::new(400, 620));
        fixture.host.scheduler.run_frame();
        assert_eq!(
            geometry_of(&fixture, record.id),
            (100, 100, WindowSize::fixed(600, 520))
        );

        assert!(fixture.resize.cancel());
        assert_eq!(
            geometry_of(&fixture, record.id),
            (100, 100, WindowSize::fixed(600, 400))
        );
        fixture.host.scheduler.advance(Duration::from_millis(5000));
        assert_eq!(fixture.store.updates.get(), writes_before);
    }

    #[test]
    fn auto_sized_windows_become_fixed_and_cancel_restores_the_marker() {
        let fixture = fixture();
        let record = fixture
            .manager
            .create_window(
                &notes(),
                CreateWindowOptions {
                    position: Some((100, 100)),
                    size: Some(WindowSize::Auto),
                    ..CreateWindowOptions::default()
                },
            )
            .expect("create auto-sized window");
        assert!(record.geometry.size.is_auto());

        assert!(fixture
            .resize
            .begin(record.id, ResizeEdge::East, PointerPress::primary(1, 580, 300)));
        fixture
            .resize
            .pointer_move(PointerId(1), PointerPosition::new(640, 300));
        fixture.host.scheduler.run_frame();

        // The 480x360 estimate plus the 60px pull, now concrete.
        let (_, _, size) = geometry_of(&fixture, record.id);
        assert_eq!(size, WindowSize::fixed(540, 360));

        assert!(fixture.resize.cancel());
        let (_, _, size) = geometry_of(&fixture, record.id);
        assert!(size.is_auto());
    }

    #[test]
    fn sessions_are_exclusive_with_drag_sessions() {
        let fixture = fixture();
        let record = open_window(&fixture);
        let drag = DragController::new(fixture.manager.clone(), fixture.interaction.clone());

        assert!(drag.begin(record.id, PointerPress::primary(1, 320, 210)));
        assert!(!fixture
            .resize
            .begin(record.id, ResizeEdge::East, PointerPress::primary(2, 700, 300)));

        assert!(drag.end(PointerId(1), PointerPosition::new(320, 210)));
        assert!(fixture
            .resize
            .begin(record.id, ResizeEdge::East, PointerPress::primary(2, 700, 300)));
        assert!(!drag.begin(record.id, PointerPress::primary(3, 320, 210)));
    }

    #[test]
    fn secondary_button_and_maximized_windows_cannot_start_sessions() {
        let fixture = fixture();
        let record = open_window(&fixture);

        let secondary = PointerPress {
            button: PointerButton::Secondary,
            ..PointerPress::primary(1, 700, 300)
        };
        assert!(!fixture.resize.begin(record.id, ResizeEdge::East, secondary));

        fixture.manager.toggle_maximize(record.id).expect("maximize");
        assert!(!fixture
            .resize
            .begin(record.id, ResizeEdge::East, PointerPress::primary(1, 700, 300)));
    }

    #[test]
    fn samples_from_other_pointers_are_ignored() {
        let fixture = fixture();
        let record = open_window(&fixture);
        assert!(fixture
            .resize
            .begin(record.id, ResizeEdge::East, PointerPress::primary(1, 700, 300)));

        fixture
            .resize
            .pointer_move(PointerId(9), PointerPosition::new(900, 300));
        assert_eq!(fixture.host.scheduler.run_frame(), 0);
        assert_eq!(
            geometry_of(&fixture, record.id),
            (100, 100, WindowSize::fixed(600, 400))
        );
        assert!(!fixture.resize.pointer_cancel(PointerId(9)));
        assert!(fixture.resize.is_resizing());
    }
}
