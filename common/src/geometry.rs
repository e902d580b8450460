use serde::{Deserialize, Serialize};

/// A placed device occupying a square footprint in world-grid coordinates.
///
/// `x`/`y` are the device's normalized reference corner (its minimum corner
/// after size-offset correction), not necessarily its build origin. A block is
/// uniquely addressed by this anchor within its device kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block<T> {
    pub x: i32,
    pub y: i32,
    pub size: i32,
    pub data: T,
}

impl<T> Block<T> {
    pub fn new(x: i32, y: i32, size: i32, data: T) -> Self {
        debug_assert!(size > 0);
        Self { x, y, size, data }
    }

    /// Two blocks are adjacent iff their footprints, each expanded by one grid
    /// cell on every side, intersect. A one-cell gap still counts, a two-cell
    /// gap does not.
    pub fn is_adjacent(&self, other: &Block<T>) -> bool {
        self.x - 1 <= other.x + other.size
            && other.x - 1 <= self.x + self.size
            && self.y - 1 <= other.y + other.size
            && other.y - 1 <= self.y + self.size
    }
}

/// A maximal connected component of mutually adjacent blocks of one device
/// kind, identified by the minimum corner of its bounding box. Bounds are
/// recomputed on every membership change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster<T> {
    blocks: Vec<Block<T>>,
    x: i32,
    y: i32,
    w: i32,
    h: i32,
}

impl<T> Cluster<T> {
    pub fn new(block: Block<T>) -> Self {
        let (x, y, size) = (block.x, block.y, block.size);
        Self { blocks: vec![block], x, y, w: size, h: size }
    }

    fn from_blocks(blocks: Vec<Block<T>>) -> Self {
        debug_assert!(!blocks.is_empty());
        let mut cluster = Self { blocks, x: 0, y: 0, w: 0, h: 0 };
        cluster.update_bounds();
        cluster
    }

    /// Reference coordinate identifying this cluster.
    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    /// Bounding box extent in grid cells.
    pub fn width(&self) -> i32 {
        self.w
    }

    pub fn height(&self) -> i32 {
        self.h
    }

    pub fn blocks(&self) -> &[Block<T>] {
        &self.blocks
    }

    fn push(&mut self, block: Block<T>) {
        self.blocks.push(block);
        self.update_bounds();
    }

    fn update_bounds(&mut self) {
        let min_x = self.blocks.iter().map(|b| b.x).min().unwrap_or(0);
        let min_y = self.blocks.iter().map(|b| b.y).min().unwrap_or(0);
        let max_x = self.blocks.iter().map(|b| b.x + b.size).max().unwrap_or(0);
        let max_y = self.blocks.iter().map(|b| b.y + b.size).max().unwrap_or(0);
        self.x = min_x;
        self.y = min_y;
        self.w = max_x - min_x;
        self.h = max_y - min_y;
    }

    fn is_adjacent_block(&self, block: &Block<T>) -> bool {
        self.blocks.iter().any(|b| b.is_adjacent(block))
    }

    /// Coarse overlap test on expanded bounding boxes, covering both adjacency
    /// and containment. Used to cancel queued work superseded by a change.
    pub fn is_adjacent_or_contains(&self, other: &Cluster<T>) -> bool {
        self.x - 1 <= other.x + other.w
            && other.x - 1 <= self.x + self.w
            && self.y - 1 <= other.y + other.h
            && other.y - 1 <= self.y + self.h
    }
}

/// How a cluster changed as the result of one tracker mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterChange {
    New,
    Update,
    Remove,
}

/// A cluster snapshot paired with the change that produced it.
#[derive(Debug, Clone)]
pub struct ClusterEvent<T> {
    pub cluster: Cluster<T>,
    pub change: ClusterChange,
}

/// Tracks the live set of clusters for one device kind.
///
/// Mutations return the events they produced, in emission order; the caller is
/// expected to process them before the next mutation so listeners observe a
/// consistent sequence. Live clusters stay maximal and disjoint.
#[derive(Debug, Default)]
pub struct ClusterManager<T> {
    clusters: Vec<Cluster<T>>,
}

impl<T: Clone> ClusterManager<T> {
    pub fn new() -> Self {
        Self { clusters: Vec::new() }
    }

    pub fn clusters(&self) -> &[Cluster<T>] {
        &self.clusters
    }

    pub fn get_element(&self, x: i32, y: i32) -> Option<(&Cluster<T>, &Block<T>)> {
        self.clusters.iter().find_map(|cluster| {
            cluster
                .blocks()
                .iter()
                .find(|b| b.x == x && b.y == y)
                .map(|b| (cluster, b))
        })
    }

    /// Insert a block at its anchor, merging every cluster it touches. An
    /// occupied anchor is replaced (the removal events are emitted first).
    pub fn add_element(&mut self, block: Block<T>) -> Vec<ClusterEvent<T>> {
        let mut events = if self.get_element(block.x, block.y).is_some() {
            self.remove_element(block.x, block.y)
        } else {
            Vec::new()
        };

        let adjacent: Vec<usize> = self
            .clusters
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_adjacent_block(&block))
            .map(|(i, _)| i)
            .collect();

        match adjacent.split_first() {
            None => {
                let cluster = Cluster::new(block);
                events.push(ClusterEvent { cluster: cluster.clone(), change: ClusterChange::New });
                self.clusters.push(cluster);
            }
            Some((&target, rest)) => {
                // Bridging block: fold every other touched cluster into the
                // first one. Highest index first so the remaining ones stay valid.
                let mut absorbed = Vec::new();
                for &i in rest.iter().rev() {
                    absorbed.extend(self.clusters.swap_remove(i).blocks);
                }
                let cluster = &mut self.clusters[target];
                for b in absorbed {
                    cluster.blocks.push(b);
                }
                cluster.push(block);
                events.push(ClusterEvent {
                    cluster: cluster.clone(),
                    change: ClusterChange::Update,
                });
            }
        }

        events
    }

    /// Delete the block anchored at `(x, y)`. Removing the last block emits
    /// `Remove`; disconnecting the remainder splits it into one new cluster
    /// per connected component; anything else is an `Update`. An unknown
    /// coordinate is a no-op.
    pub fn remove_element(&mut self, x: i32, y: i32) -> Vec<ClusterEvent<T>> {
        let Some(idx) = self
            .clusters
            .iter()
            .position(|c| c.blocks().iter().any(|b| b.x == x && b.y == y))
        else {
            return Vec::new();
        };

        // Snapshot before deletion so a Remove event still carries bounds the
        // queue can match cancellations against.
        let snapshot = self.clusters[idx].clone();

        let cluster = &mut self.clusters[idx];
        cluster.blocks.retain(|b| !(b.x == x && b.y == y));
        if cluster.blocks.is_empty() {
            self.clusters.swap_remove(idx);
            return vec![ClusterEvent { cluster: snapshot, change: ClusterChange::Remove }];
        }
        cluster.update_bounds();

        let components = connected_components(&cluster.blocks);
        if components.len() == 1 {
            return vec![ClusterEvent {
                cluster: cluster.clone(),
                change: ClusterChange::Update,
            }];
        }

        let old = self.clusters.swap_remove(idx);
        let mut events = Vec::with_capacity(components.len());
        for indices in components {
            let blocks = indices.iter().map(|&i| old.blocks[i].clone()).collect();
            let cluster = Cluster::from_blocks(blocks);
            events.push(ClusterEvent { cluster: cluster.clone(), change: ClusterChange::New });
            self.clusters.push(cluster);
        }
        events
    }

    /// Drop every cluster without emitting per-cluster events (bulk teardown
    /// on world reload).
    pub fn reset(&mut self) {
        self.clusters.clear();
    }
}

/// Flood fill over a cluster's member set, grouping block indices into
/// connected components.
fn connected_components<T>(blocks: &[Block<T>]) -> Vec<Vec<usize>> {
    let mut visited = vec![false; blocks.len()];
    let mut components = Vec::new();
    for start in 0..blocks.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let mut stack = vec![start];
        let mut component = vec![start];
        while let Some(i) = stack.pop() {
            for j in 0..blocks.len() {
                if !visited[j] && blocks[i].is_adjacent(&blocks[j]) {
                    visited[j] = true;
                    stack.push(j);
                    component.push(j);
                }
            }
        }
        components.push(component);
    }
    components
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blk(x: i32, y: i32) -> Block<u32> {
        Block::new(x, y, 1, 0)
    }

    fn changes<T>(events: &[ClusterEvent<T>]) -> Vec<ClusterChange> {
        events.iter().map(|e| e.change).collect()
    }

    /// No two live clusters of the same kind may contain adjacent blocks.
    fn assert_maximal(manager: &ClusterManager<u32>) {
        let clusters = manager.clusters();
        for (i, a) in clusters.iter().enumerate() {
            for b in clusters.iter().skip(i + 1) {
                for ba in a.blocks() {
                    for bb in b.blocks() {
                        assert!(
                            !ba.is_adjacent(bb),
                            "blocks ({}, {}) and ({}, {}) live in separate clusters",
                            ba.x,
                            ba.y,
                            bb.x,
                            bb.y
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn adjacency_allows_one_cell_gap() {
        assert!(blk(0, 0).is_adjacent(&blk(1, 0)));
        assert!(blk(0, 0).is_adjacent(&blk(2, 0)));
        assert!(!blk(0, 0).is_adjacent(&blk(3, 0)));
        assert!(blk(0, 0).is_adjacent(&blk(2, 2)));
        // A 3x3 block reaches further than a 1x1 one.
        assert!(Block::new(0, 0, 3, 0u32).is_adjacent(&blk(4, 0)));
        assert!(!Block::new(0, 0, 3, 0u32).is_adjacent(&blk(5, 0)));
    }

    #[test]
    fn first_block_creates_new_cluster() {
        let mut manager = ClusterManager::new();
        let events = manager.add_element(blk(0, 0));
        assert_eq!(changes(&events), vec![ClusterChange::New]);
        assert_eq!(manager.clusters().len(), 1);
    }

    #[test]
    fn adjacent_block_grows_cluster() {
        let mut manager = ClusterManager::new();
        manager.add_element(blk(0, 0));
        let events = manager.add_element(blk(1, 0));
        assert_eq!(changes(&events), vec![ClusterChange::Update]);
        assert_eq!(manager.clusters().len(), 1);
        assert_eq!(manager.clusters()[0].blocks().len(), 2);
    }

    #[test]
    fn distant_block_starts_separate_cluster() {
        let mut manager = ClusterManager::new();
        manager.add_element(blk(0, 0));
        let events = manager.add_element(blk(10, 10));
        assert_eq!(changes(&events), vec![ClusterChange::New]);
        assert_eq!(manager.clusters().len(), 2);
        assert_maximal(&manager);
    }

    #[test]
    fn bridge_block_merges_clusters() {
        let mut manager = ClusterManager::new();
        manager.add_element(blk(0, 0));
        manager.add_element(blk(4, 0));
        assert_eq!(manager.clusters().len(), 2);

        let events = manager.add_element(blk(2, 0));
        assert_eq!(changes(&events), vec![ClusterChange::Update]);
        assert_eq!(manager.clusters().len(), 1);
        assert_eq!(manager.clusters()[0].blocks().len(), 3);
        assert_maximal(&manager);
    }

    #[test]
    fn removing_connector_splits_into_partition() {
        let mut manager = ClusterManager::new();
        manager.add_element(blk(0, 0));
        manager.add_element(blk(2, 0));
        manager.add_element(blk(4, 0));
        assert_eq!(manager.clusters().len(), 1);

        let events = manager.remove_element(2, 0);
        assert_eq!(changes(&events), vec![ClusterChange::New, ClusterChange::New]);
        assert_eq!(manager.clusters().len(), 2);

        let mut anchors: Vec<(i32, i32)> = manager
            .clusters()
            .iter()
            .flat_map(|c| c.blocks().iter().map(|b| (b.x, b.y)))
            .collect();
        anchors.sort_unstable();
        assert_eq!(anchors, vec![(0, 0), (4, 0)]);
        assert_maximal(&manager);
    }

    #[test]
    fn removing_last_block_emits_remove() {
        let mut manager = ClusterManager::new();
        manager.add_element(blk(0, 0));
        let events = manager.remove_element(0, 0);
        assert_eq!(changes(&events), vec![ClusterChange::Remove]);
        assert!(manager.clusters().is_empty());
        // The snapshot still covers the removed block.
        assert_eq!(events[0].cluster.blocks().len(), 1);
    }

    #[test]
    fn removing_interior_block_emits_update() {
        let mut manager = ClusterManager::new();
        manager.add_element(blk(0, 0));
        manager.add_element(blk(1, 0));
        manager.add_element(blk(1, 1));
        let events = manager.remove_element(1, 1);
        assert_eq!(changes(&events), vec![ClusterChange::Update]);
        assert_eq!(manager.clusters()[0].blocks().len(), 2);
    }

    #[test]
    fn removing_unknown_coordinate_is_noop() {
        let mut manager = ClusterManager::new();
        manager.add_element(blk(0, 0));
        assert!(manager.remove_element(5, 5).is_empty());
        assert_eq!(manager.clusters().len(), 1);
    }

    #[test]
    fn adding_at_occupied_anchor_replaces_data() {
        let mut manager = ClusterManager::new();
        manager.add_element(Block::new(0, 0, 1, 7u32));
        let events = manager.add_element(Block::new(0, 0, 1, 9u32));
        // Old block is torn down, then the replacement comes back in.
        assert_eq!(changes(&events), vec![ClusterChange::Remove, ClusterChange::New]);
        assert_eq!(manager.clusters().len(), 1);
        assert_eq!(manager.get_element(0, 0).unwrap().1.data, 9);
    }

    #[test]
    fn maximality_holds_across_mixed_operations() {
        let mut manager = ClusterManager::new();
        let ops: Vec<(i32, i32, bool)> = vec![
            (0, 0, true),
            (2, 0, true),
            (8, 8, true),
            (4, 0, true),
            (6, 0, true),
            (2, 0, false),
            (8, 8, false),
            (1, 0, true),
            (6, 0, false),
            (3, 3, true),
        ];
        for (x, y, add) in ops {
            if add {
                manager.add_element(blk(x, y));
            } else {
                manager.remove_element(x, y);
            }
            assert_maximal(&manager);
        }
    }

    #[test]
    fn cluster_bounds_track_membership() {
        let mut manager = ClusterManager::new();
        manager.add_element(Block::new(2, 3, 2, 0u32));
        manager.add_element(Block::new(5, 3, 2, 0u32));
        let cluster = &manager.clusters()[0];
        assert_eq!((cluster.x(), cluster.y()), (2, 3));
        assert_eq!((cluster.width(), cluster.height()), (5, 2));
    }

    #[test]
    fn adjacent_or_contains_matches_neighbors() {
        let a = Cluster::new(blk(0, 0));
        let near = Cluster::new(blk(2, 0));
        let far = Cluster::new(blk(5, 5));
        assert!(a.is_adjacent_or_contains(&near));
        assert!(!a.is_adjacent_or_contains(&far));
        assert!(a.is_adjacent_or_contains(&a.clone()));
    }

    #[test]
    fn reset_drops_everything() {
        let mut manager = ClusterManager::new();
        manager.add_element(blk(0, 0));
        manager.add_element(blk(10, 0));
        manager.reset();
        assert!(manager.clusters().is_empty());
    }
}
