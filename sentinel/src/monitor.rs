//! Cluster tracking wired to the debounce queue, plus the service that owns
//! both device-kind pipelines and their workers.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use common::canvas::CanvasSpec;
use common::content::ClusterContent;
use common::{
    Block, Cluster, ClusterChange, ClusterEvent, ClusterManager, DrawInstruction, Drawer, PixMap,
    Processor,
};

use crate::config::Config;
use crate::hooks::{DeviceKind, ModerationContext, PlacementHistory, PlayerUuid};
use crate::overlay::{self, DebugOverlay};
use crate::queue::DebounceQueue;
use crate::worker;

/// Kind-specific policy knobs, supplied as plain data.
pub struct KindStrategy<T> {
    /// Kind tag for logs.
    pub label: &'static str,
    /// Whether a changed cluster is worth queueing.
    pub qualifies: fn(&Cluster<T>, &Config) -> bool,
    /// Most-common placement author of the cluster, if any.
    pub resolve_author: fn(&Cluster<T>, &dyn PlacementHistory) -> Option<PlayerUuid>,
}

pub fn drawer_strategy() -> KindStrategy<Drawer> {
    KindStrategy { label: "display", qualifies: drawer_qualifies, resolve_author: drawer_author }
}

pub fn pixmap_strategy() -> KindStrategy<PixMap> {
    KindStrategy { label: "canvas", qualifies: pixmap_qualifies, resolve_author: pixmap_author }
}

fn drawer_qualifies(cluster: &Cluster<Drawer>, config: &Config) -> bool {
    let total: usize = cluster.blocks().iter().map(|b| b.data.instruction_count()).sum();
    total >= config.drawer_instruction_threshold
}

fn pixmap_qualifies(cluster: &Cluster<PixMap>, config: &Config) -> bool {
    cluster.blocks().len() >= config.pixmap_block_threshold
}

fn drawer_author(cluster: &Cluster<Drawer>, history: &dyn PlacementHistory) -> Option<PlayerUuid> {
    find_most_common(
        cluster
            .blocks()
            .iter()
            .flat_map(|b| b.data.processors.iter())
            .filter_map(|p| history.latest_place(p.x, p.y))
            .filter(|p| p.kind == DeviceKind::Processor)
            .map(|p| p.author),
    )
}

fn pixmap_author(cluster: &Cluster<PixMap>, history: &dyn PlacementHistory) -> Option<PlayerUuid> {
    find_most_common(
        cluster
            .blocks()
            .iter()
            .filter_map(|b| history.latest_place(b.x, b.y))
            .filter(|p| p.kind == DeviceKind::Canvas)
            .map(|p| p.author),
    )
}

/// Most frequent value; ties go to the first-seen candidate so resolution is
/// deterministic for a given input ordering.
fn find_most_common<I>(values: I) -> Option<PlayerUuid>
where
    I: IntoIterator<Item = PlayerUuid>,
{
    let mut counts: Vec<(PlayerUuid, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value, 1)),
        }
    }
    let mut best: Option<(PlayerUuid, usize)> = None;
    for (value, n) in counts {
        match &best {
            Some((_, m)) if *m >= n => {}
            _ => best = Some((value, n)),
        }
    }
    best.map(|(value, _)| value)
}

/// One device kind's tracker and queue. The tracker lock is held through
/// listener processing, so events are observed strictly in emission order and
/// each cancellation+scheduling step finishes before the next mutation.
pub struct Pipeline<T> {
    manager: Mutex<ClusterManager<T>>,
    queue: Arc<DebounceQueue<T>>,
    strategy: KindStrategy<T>,
    config: Config,
    history: Arc<dyn PlacementHistory>,
}

impl<T: ClusterContent> Pipeline<T> {
    pub fn new(
        strategy: KindStrategy<T>,
        config: Config,
        history: Arc<dyn PlacementHistory>,
    ) -> Self {
        Self {
            manager: Mutex::new(ClusterManager::new()),
            queue: Arc::new(DebounceQueue::new()),
            strategy,
            config,
            history,
        }
    }

    pub fn label(&self) -> &'static str {
        self.strategy.label
    }

    pub fn queue(&self) -> &Arc<DebounceQueue<T>> {
        &self.queue
    }

    pub fn add_element(&self, block: Block<T>) {
        let mut manager = self.manager.lock();
        let events = manager.add_element(block);
        self.handle_events(events);
    }

    pub fn remove_element(&self, x: i32, y: i32) {
        let mut manager = self.manager.lock();
        let events = manager.remove_element(x, y);
        self.handle_events(events);
    }

    pub fn get_block(&self, x: i32, y: i32) -> Option<Block<T>> {
        self.manager.lock().get_element(x, y).map(|(_, block)| block.clone())
    }

    /// Live cluster snapshot (overlay rendering).
    pub fn clusters(&self) -> Vec<Cluster<T>> {
        self.manager.lock().clusters().to_vec()
    }

    /// Bulk teardown: drops all clusters and every pending queue entry.
    pub fn reset(&self) {
        let mut manager = self.manager.lock();
        manager.reset();
        self.queue.clear();
    }

    fn handle_events(&self, events: Vec<ClusterEvent<T>>) {
        for event in events {
            self.on_cluster_event(event);
        }
    }

    fn on_cluster_event(&self, event: ClusterEvent<T>) {
        let removed = self.queue.cancel_overlapping(&event.cluster);
        match event.change {
            ClusterChange::New | ClusterChange::Update => {
                let cluster = event.cluster;
                if !(self.strategy.qualifies)(&cluster, &self.config) {
                    tracing::trace!(
                        "{} cluster ({}, {}) does not pass the filter",
                        self.strategy.label,
                        cluster.x(),
                        cluster.y()
                    );
                    return;
                }
                let Some(author) = (self.strategy.resolve_author)(&cluster, self.history.as_ref())
                else {
                    tracing::trace!(
                        "{} cluster ({}, {}) has no author",
                        self.strategy.label,
                        cluster.x(),
                        cluster.y()
                    );
                    return;
                };
                let due_at = Instant::now() + self.config.processing_delay;
                self.queue.schedule(cluster, due_at, author);
            }
            ClusterChange::Remove => {
                if removed {
                    tracing::trace!(
                        "Removed {} cluster ({}, {}) from queue",
                        self.strategy.label,
                        event.cluster.x(),
                        event.cluster.y()
                    );
                }
            }
        }
    }
}

/// The moderation service: one pipeline per device kind, their processing
/// workers, and the debug overlay loop.
pub struct ContentMonitor {
    pub displays: Arc<Pipeline<Drawer>>,
    pub canvases: Arc<Pipeline<PixMap>>,
    pub overlay: Arc<DebugOverlay>,
    config: Config,
    ctx: ModerationContext,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ContentMonitor {
    pub fn new(config: Config, ctx: ModerationContext) -> Arc<Self> {
        let displays =
            Arc::new(Pipeline::new(drawer_strategy(), config.clone(), ctx.history.clone()));
        let canvases =
            Arc::new(Pipeline::new(pixmap_strategy(), config.clone(), ctx.history.clone()));
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            displays,
            canvases,
            overlay: Arc::new(DebugOverlay::new()),
            config,
            ctx,
            shutdown,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the per-kind processing workers and the overlay loop.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        debug_assert!(tasks.is_empty());
        tasks.push(worker::spawn(
            self.displays.clone(),
            self.ctx.clone(),
            self.config.clone(),
            self.shutdown.subscribe(),
        ));
        tasks.push(worker::spawn(
            self.canvases.clone(),
            self.ctx.clone(),
            self.config.clone(),
            self.shutdown.subscribe(),
        ));
        tasks.push(overlay::spawn(
            self.overlay.clone(),
            self.displays.clone(),
            self.canvases.clone(),
            self.ctx.world.clone(),
            self.shutdown.subscribe(),
        ));
    }

    /// Signal the loops and wait for them to wind down. In-flight
    /// classification attempts run to completion on their own.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }
    }

    /// A display finished building, with the processors found bound to it.
    pub fn display_built(&self, block: Block<Drawer>) {
        tracing::trace!("Tracking display at ({}, {})", block.x, block.y);
        self.displays.add_element(block);
    }

    pub fn display_removed(&self, x: i32, y: i32) {
        tracing::trace!("Removed display at ({}, {})", x, y);
        self.displays.remove_element(x, y);
    }

    /// A canvas finished building; `config` is its packed pixel buffer.
    pub fn canvas_built(&self, x: i32, y: i32, size: i32, spec: &CanvasSpec, config: Option<&[u8]>) {
        tracing::trace!("Tracking canvas at ({x}, {y})");
        self.canvases.add_element(Block::new(x, y, size, spec.decode(config)));
    }

    pub fn canvas_removed(&self, x: i32, y: i32) {
        tracing::trace!("Removed canvas at ({x}, {y})");
        self.canvases.remove_element(x, y);
    }

    /// A processor at `(x, y)` was built or broken while linked to displays
    /// at the given coordinates. Each owning cluster is rewritten in place:
    /// the stale entry keyed by the processor's coordinate goes away, and a
    /// fresh one is recorded unless the processor is being broken.
    pub fn processor_changed(
        &self,
        x: i32,
        y: i32,
        instructions: Vec<DrawInstruction>,
        links: &[(i32, i32)],
        breaking: bool,
    ) {
        for &(dx, dy) in links {
            let Some(mut block) = self.displays.get_block(dx, dy) else {
                continue;
            };
            self.displays.remove_element(block.x, block.y);
            block.data.processors.retain(|p| !(p.x == x && p.y == y));
            if !breaking {
                block.data.processors.push(Processor {
                    x,
                    y,
                    instructions: instructions.clone(),
                });
            }
            tracing::trace!("Updated display at ({}, {})", block.x, block.y);
            self.displays.add_element(block);
        }
    }

    /// World reload: drop all clusters and pending work, no per-cluster
    /// events.
    pub fn world_reset(&self) {
        self.displays.reset();
        self.canvases.reset();
    }
}
