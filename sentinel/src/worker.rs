//! The processing worker: a periodic loop per device kind that turns due
//! queue entries into rendered, classified, moderated outcomes.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use common::content::ClusterContent;
use common::{Block, LogicImage};

use crate::config::Config;
use crate::hooks::ModerationContext;
use crate::monitor::Pipeline;
use crate::policy;
use crate::queue::QueueEntry;

/// Spawn the drain loop for one pipeline. Every period it pops all due
/// entries; each gets its own task so a slow render or classifier round-trip
/// never stalls the drain or the other kind's worker. The loop observes the
/// shutdown signal within one period; dispatched attempts run to completion.
pub fn spawn<T: ClusterContent>(
    pipeline: Arc<Pipeline<T>>,
    ctx: ModerationContext,
    config: Config,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = time::sleep(config.worker_period) => {}
                _ = shutdown.changed() => break,
            }
            let now = Instant::now();
            while let Some(entry) = pipeline.queue().pop_due(now) {
                let pipeline = pipeline.clone();
                let ctx = ctx.clone();
                let config = config.clone();
                tokio::spawn(async move {
                    process(&pipeline, &ctx, &config, entry).await;
                });
            }
        }
        tracing::debug!("{} worker stopped", pipeline.label());
    })
}

/// One classification attempt: render the snapshot, classify the bitmap,
/// apply the verdict. A classifier failure is logged and the entry dropped,
/// never retried.
async fn process<T: ClusterContent>(
    pipeline: &Pipeline<T>,
    ctx: &ModerationContext,
    config: &Config,
    entry: QueueEntry<T>,
) {
    let cluster = &entry.cluster;
    tracing::debug!(
        "Processing {} cluster ({}, {})",
        pipeline.label(),
        cluster.x(),
        cluster.y()
    );

    let blocks: Vec<Block<LogicImage>> = cluster
        .blocks()
        .iter()
        .map(|b| Block::new(b.x, b.y, b.size, b.data.to_logic_image()))
        .collect();
    let image = ctx.renderer.render(&blocks);

    match ctx.analysis.is_unsafe(&image).await {
        Err(e) => tracing::error!("Failed to analyze image: {e:#}"),
        Ok(analysis) => policy::apply(pipeline, ctx, config, &entry, &image, analysis).await,
    }
}
