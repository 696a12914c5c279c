//! Tunable limits and defaults for a desktop instance.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const MIN_WINDOW_WIDTH: i32 = 220;
pub const MIN_WINDOW_HEIGHT: i32 = 140;
pub const SNAP_EDGE_THRESHOLD: i32 = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    /// Hard ceiling on simultaneously open windows, minimized included.
    pub max_open_windows: usize,
    /// Z-index handed to the first window; later windows stack above it.
    pub z_index_base: i32,
    /// Crossing this value triggers a compacting reindex before the next
    /// z-index is assigned.
    pub z_index_high_water: i32,
    pub min_window_width: i32,
    pub min_window_height: i32,
    /// Footprint assumed for auto-sized windows when clamping positions.
    pub auto_size_estimate_width: i32,
    pub auto_size_estimate_height: i32,
    /// Diagonal offset between successive cascade positions.
    pub cascade_step: i32,
    /// Trailing-edge delay for debounced geometry persistence.
    pub persist_debounce_ms: u64,
    /// Snap windows dragged against a viewport edge (maximize or half-tile).
    pub edge_snap: bool,
    pub snap_edge_threshold: i32,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            max_open_windows: 20,
            z_index_base: 1000,
            z_index_high_water: 9000,
            min_window_width: MIN_WINDOW_WIDTH,
            min_window_height: MIN_WINDOW_HEIGHT,
            auto_size_estimate_width: 480,
            auto_size_estimate_height: 360,
            cascade_step: 20,
            persist_debounce_ms: 1000,
            edge_snap: true,
            snap_edge_threshold: SNAP_EDGE_THRESHOLD,
        }
    }
}

impl DesktopConfig {
    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }

    pub fn auto_size_estimate(&self) -> (i32, i32) {
        (self.auto_size_estimate_width, self.auto_size_estimate_height)
    }
}
