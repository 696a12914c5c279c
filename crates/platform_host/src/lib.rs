//! Headless host adapters for the desktop window-manager core.
//!
//! This crate supplies concrete implementations of the collaborator traits in
//! `desktop_contract` (window-record storage, a recording renderer, a manually
//! driven scheduler, and clocks) plus the [`HostServices`] bundle the runtime is
//! constructed from. Browser and native hosts supply their own adapters with the
//! same traits; everything here runs without a display or event loop, which is
//! also what makes the runtime's end-to-end tests deterministic.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod host;
pub mod renderer;
pub mod scheduler;
pub mod storage;
pub mod time;

pub use host::{HeadlessHost, HostServices, HEADLESS_EPOCH_MS};
pub use renderer::{HeadlessRenderer, NoopRenderer, SurfaceState, DEFAULT_HEADLESS_VIEWPORT};
pub use scheduler::ManualScheduler;
pub use storage::{
    JsonFileWindowStore, MemoryWindowStore, NoopWindowStore, StoredWindowSet,
    STORED_WINDOWS_SCHEMA_VERSION,
};
pub use time::{unix_time_ms_now, FixedClock, SystemClock};
