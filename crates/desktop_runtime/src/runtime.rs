//! Desktop assembly: one constructor that wires the window manager and the
//! two interaction controllers over a shared session lock, plus boot-time
//! hydration.
//!
//! Embedders hold one [`DesktopRuntime`] per desktop instance and route host
//! input (launcher clicks, pointer events on window chrome) into it; clones
//! share the same desktop.

use std::cell::RefCell;
use std::rc::Rc;

use desktop_contract::AppDescriptor;
use platform_host::HostServices;

use crate::apps::AppRegistry;
use crate::config::DesktopConfig;
use crate::drag::DragController;
use crate::events::EventBus;
use crate::model::InteractionState;
use crate::resize::ResizeController;
use crate::store::StateStore;
use crate::window_manager::WindowManager;

/// The assembled desktop: window manager plus drag and resize controllers.
#[derive(Clone)]
pub struct DesktopRuntime {
    manager: WindowManager,
    drag: DragController,
    resize: ResizeController,
    interaction: Rc<RefCell<InteractionState>>,
}

impl DesktopRuntime {
    /// Wires a desktop over the given host services without touching storage.
    pub fn new(services: &HostServices, registry: AppRegistry, config: DesktopConfig) -> Self {
        let manager = WindowManager::new(services, registry, config);
        let interaction = Rc::new(RefCell::new(InteractionState::default()));
        let drag = DragController::new(manager.clone(), interaction.clone());
        let resize = ResizeController::new(manager.clone(), interaction.clone());
        Self {
            manager,
            drag,
            resize,
            interaction,
        }
    }

    /// Wires a desktop and hydrates it from the persistence gateway.
    pub fn boot(services: &HostServices, registry: AppRegistry, config: DesktopConfig) -> Self {
        let runtime = Self::new(services, registry, config);
        let restored = runtime.manager.hydrate();
        if restored > 0 {
            log::debug!("restored {restored} windows from storage");
        }
        runtime
    }

    pub fn manager(&self) -> &WindowManager {
        &self.manager
    }

    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    pub fn resize(&self) -> &ResizeController {
        &self.resize
    }

    /// Handle on the reactive store, for chrome subscriptions.
    pub fn store(&self) -> StateStore {
        self.manager.store()
    }

    /// Handle on the lifecycle event bus.
    pub fn events(&self) -> EventBus {
        self.manager.events()
    }

    /// True while a drag or resize session is in flight.
    pub fn session_active(&self) -> bool {
        self.interaction.borrow().session_active()
    }

    /// Launcher-visible application descriptors, in registration order.
    pub fn launcher_apps(&self) -> Vec<AppDescriptor> {
        self.manager.registry().launcher_apps().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use desktop_contract::{
        ApplicationId, WindowGeometry, WindowId, WindowPatch, WindowRecord, WindowSize, WindowStore,
    };
    use futures::executor::block_on;
    use platform_host::HeadlessHost;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    use super::*;
    use crate::model::{CreateWindowOptions, PointerId, PointerPosition, PointerPress, ResizeEdge};
    use crate::store::{StateChange, StatePath};
    use crate::window_manager::CloseOutcome;

    fn calc() -> ApplicationId {
        ApplicationId::trusted("calc")
    }

    fn notes() -> ApplicationId {
        ApplicationId::trusted("notes")
    }

    fn registry() -> AppRegistry {
        AppRegistry::with_apps([
            AppDescriptor {
                single_instance: true,
                default_size: WindowSize::fixed(480, 720),
                ..AppDescriptor::new(calc(), "Calculator", "icons/calc")
            },
            AppDescriptor::new(notes(), "Notes", "icons/notes"),
        ])
    }

    fn stored_record(id: u64, z_index: i32, minimized: bool) -> WindowRecord {
        WindowRecord {
            id: WindowId(id),
            app_id: notes(),
            title: "Notes".into(),
            icon: "icons/notes".into(),
            geometry: WindowGeometry::new(120, 90, WindowSize::fixed(420, 320)),
            z_index,
            minimized,
            maximized: false,
            pre_maximize: None,
            launch_params: Value::Null,
            created_at_unix_ms: 1_000,
            updated_at_unix_ms: 1_000,
        }
    }

    fn close(runtime: &DesktopRuntime, id: WindowId) {
        match runtime.manager().close_window(id).expect("close accepted") {
            CloseOutcome::Closed(completion) => block_on(completion),
            CloseOutcome::Vetoed => panic!("close vetoed"),
        }
    }

    #[test]
    fn a_desktop_session_walks_windows_through_their_whole_lifecycle() {
        let host = HeadlessHost::new();
        let runtime = DesktopRuntime::boot(&host.services(), registry(), DesktopConfig::default());
        let manager = runtime.manager();

        let calc_window = manager
            .create_window(&calc(), CreateWindowOptions::default())
            .expect("calculator opens");
        assert_eq!(calc_window.z_index, 1000);
        assert_eq!(calc_window.geometry.size, WindowSize::fixed(480, 720));
        assert_eq!(manager.active_window_id(), Some(calc_window.id));

        let notes_window = manager
            .create_window(&notes(), CreateWindowOptions::default())
            .expect("notes opens");
        assert_eq!(notes_window.z_index, 1001);
        assert_eq!(manager.active_window_id(), Some(notes_window.id));

        // Single instance: a second calculator create focuses the first.
        let again = manager
            .create_window(&calc(), CreateWindowOptions::default())
            .expect("create resolves");
        assert_eq!(again.id, calc_window.id);
        assert_eq!(manager.open_count(), 2);
        assert_eq!(manager.active_window_id(), Some(calc_window.id));

        manager.minimize_window(calc_window.id).expect("minimize");
        assert_eq!(manager.active_window_id(), Some(notes_window.id));

        manager.restore_window(calc_window.id).expect("restore");
        assert_eq!(manager.active_window_id(), Some(calc_window.id));

        close(&runtime, calc_window.id);
        assert_eq!(manager.active_window_id(), Some(notes_window.id));

        close(&runtime, notes_window.id);
        assert_eq!(manager.open_count(), 0);
        assert_eq!(manager.active_window_id(), None);
        assert_eq!(host.renderer.surface_count(), 0);
    }

    #[test]
    fn boot_restores_persisted_windows_and_their_surfaces() {
        let host = HeadlessHost::new();
        host.window_store
            .insert_window(&stored_record(3, 1007, false))
            .expect("seed");
        host.window_store
            .insert_window(&stored_record(5, 1004, true))
            .expect("seed");

        let runtime = DesktopRuntime::boot(&host.services(), registry(), DesktopConfig::default());

        assert_eq!(runtime.manager().open_count(), 2);
        assert_eq!(runtime.manager().active_window_id(), Some(WindowId(3)));
        assert_eq!(host.renderer.surface_count(), 2);

        // The id counter resumes past the restored records.
        let next = runtime
            .manager()
            .create_window(&notes(), CreateWindowOptions::default())
            .expect("create");
        assert_eq!(next.id, WindowId(6));
    }

    #[test]
    fn boot_with_a_failing_gateway_starts_an_empty_desktop() {
        struct FailingWindowStore;

        impl WindowStore for FailingWindowStore {
            fn insert_window(&self, _record: &WindowRecord) -> Result<(), String> {
                Err("disk offline".into())
            }

            fn update_window(&self, _id: WindowId, _patch: &WindowPatch) -> Result<(), String> {
                Err("disk offline".into())
            }

            fn delete_window(&self, _id: WindowId) -> Result<(), String> {
                Err("disk offline".into())
            }

            fn all_windows(&self) -> Result<Vec<WindowRecord>, String> {
                Err("disk offline".into())
            }
        }

        let host = HeadlessHost::new();
        let mut services = host.services();
        services.window_store = Rc::new(FailingWindowStore);
        let runtime = DesktopRuntime::boot(&services, registry(), DesktopConfig::default());

        assert_eq!(runtime.manager().open_count(), 0);

        // Live state stays authoritative while writes keep failing.
        let record = runtime
            .manager()
            .create_window(&notes(), CreateWindowOptions::default())
            .expect("create");
        assert_eq!(runtime.manager().open_count(), 1);
        assert_eq!(runtime.manager().active_window_id(), Some(record.id));
    }

    #[test]
    fn one_interaction_lock_spans_dragging_and_resizing() {
        let host = HeadlessHost::new();
        let runtime = DesktopRuntime::boot(&host.services(), registry(), DesktopConfig::default());
        let record = runtime
            .manager()
            .create_window(
                &notes(),
                CreateWindowOptions {
                    position: Some((200, 200)),
                    size: Some(WindowSize::fixed(400, 300)),
                    ..CreateWindowOptions::default()
                },
            )
            .expect("create");

        assert!(!runtime.session_active());
        assert!(runtime.drag().begin(record.id, PointerPress::primary(1, 220, 210)));
        assert!(runtime.session_active());
        assert!(!runtime
            .resize()
            .begin(record.id, ResizeEdge::East, PointerPress::primary(2, 600, 300)));

        assert!(runtime.drag().end(PointerId(1), PointerPosition::new(220, 210)));
        assert!(!runtime.session_active());
        assert!(runtime
            .resize()
            .begin(record.id, ResizeEdge::East, PointerPress::primary(2, 600, 300)));
        assert!(runtime.session_active());
    }

    #[test]
    fn chrome_subscribers_see_hud_visibility_flip_with_maximize() {
        let host = HeadlessHost::new();
        let runtime = DesktopRuntime::boot(&host.services(), registry(), DesktopConfig::default());
        let record = runtime
            .manager()
            .create_window(&notes(), CreateWindowOptions::default())
            .expect("create");

        let seen: Rc<RefCell<Vec<bool>>> = Rc::default();
        let log = seen.clone();
        let _subscription = runtime
            .store()
            .subscribe(StatePath::HudVisible, move |change| {
                if let StateChange::HudVisible { new, .. } = change {
                    log.borrow_mut().push(*new);
                }
            });

        runtime.manager().toggle_maximize(record.id).expect("maximize");
        assert_eq!(*seen.borrow(), vec![false]);

        runtime.manager().toggle_maximize(record.id).expect("unmaximize");
        assert_eq!(*seen.borrow(), vec![false, true]);
    }

    #[test]
    fn launcher_listings_follow_registry_visibility() {
        let host = HeadlessHost::new();
        let registry = AppRegistry::with_apps([
            AppDescriptor::new(notes(), "Notes", "icons/notes"),
            AppDescriptor {
                show_in_launcher: false,
                ..AppDescriptor::new(ApplicationId::trusted("settings"), "Settings", "icons/settings")
            },
        ]);
        let runtime = DesktopRuntime::new(&host.services(), registry, DesktopConfig::default());

        let listed: Vec<ApplicationId> = runtime
            .launcher_apps()
            .into_iter()
            .map(|app| app.app_id)
            .collect();
        assert_eq!(listed, vec![notes()]);
    }
}
