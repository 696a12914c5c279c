pub mod apps;
pub mod config;
pub mod drag;
pub mod events;
pub mod model;
pub mod resize;
pub mod runtime;
pub mod store;
pub mod window_manager;

pub use apps::AppRegistry;
pub use config::DesktopConfig;
pub use drag::DragController;
pub use events::{EventBus, EventSubscription, LifecycleHooks, WindowEvent};
pub use model::*;
pub use resize::{resize_rect, ResizeController};
pub use runtime::DesktopRuntime;
pub use store::{StateChange, StateError, StatePath, StateStore, StoreSubscription};
pub use window_manager::{CloseCompletion, CloseOutcome, WindowManager, WindowManagerError};
