//! Per-observer debug overlay: periodically labels every live cluster (and
//! bound processor) on screen. Observer-scoped and idempotent; never touches
//! clustering or queueing.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use common::{Drawer, PixMap};

use crate::hooks::WorldHandle;
use crate::monitor::Pipeline;

pub const DISPLAY_LABEL_COLOR: [u8; 3] = [255, 105, 180];
pub const CANVAS_LABEL_COLOR: [u8; 3] = [255, 255, 0];

const OVERLAY_PERIOD: Duration = Duration::from_secs(1);

/// The set of observers that currently want the overlay.
#[derive(Debug, Default)]
pub struct DebugOverlay {
    observers: Mutex<HashSet<String>>,
}

impl DebugOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the overlay for one observer; returns whether it is now enabled.
    pub fn toggle(&self, observer: &str) -> bool {
        let mut observers = self.observers.lock();
        if observers.remove(observer) {
            false
        } else {
            observers.insert(observer.to_string());
            true
        }
    }

    pub fn is_enabled(&self, observer: &str) -> bool {
        self.observers.lock().contains(observer)
    }

    /// Observer left, forget their toggle.
    pub fn remove_observer(&self, observer: &str) {
        self.observers.lock().remove(observer);
    }

    pub fn observers(&self) -> Vec<String> {
        self.observers.lock().iter().cloned().collect()
    }
}

/// Spawn the label loop: every second, draw `C{i}` over each cluster block
/// and `C{i}P{j}` over each bound processor, one color per device kind.
pub fn spawn(
    overlay: Arc<DebugOverlay>,
    displays: Arc<Pipeline<Drawer>>,
    canvases: Arc<Pipeline<PixMap>>,
    world: Arc<dyn WorldHandle>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = time::sleep(OVERLAY_PERIOD) => {}
                _ = shutdown.changed() => break,
            }
            let observers = overlay.observers();
            if observers.is_empty() {
                continue;
            }
            let display_clusters = displays.clusters();
            let canvas_clusters = canvases.clusters();
            for observer in &observers {
                for (ci, cluster) in display_clusters.iter().enumerate() {
                    for block in cluster.blocks() {
                        world
                            .draw_label(
                                observer,
                                format!("C{ci}"),
                                DISPLAY_LABEL_COLOR,
                                block.x as f32,
                                block.y as f32,
                            )
                            .await;
                        for (pi, processor) in block.data.processors.iter().enumerate() {
                            world
                                .draw_label(
                                    observer,
                                    format!("C{ci}P{pi}"),
                                    DISPLAY_LABEL_COLOR,
                                    processor.x as f32,
                                    processor.y as f32,
                                )
                                .await;
                        }
                    }
                }
                for (ci, cluster) in canvas_clusters.iter().enumerate() {
                    for block in cluster.blocks() {
                        world
                            .draw_label(
                                observer,
                                format!("C{ci}"),
                                CANVAS_LABEL_COLOR,
                                block.x as f32,
                                block.y as f32,
                            )
                            .await;
                    }
                }
            }
        }
    })
}
