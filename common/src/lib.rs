pub mod analysis;
pub mod canvas;
pub mod content;
pub mod geometry;

pub use analysis::{Analysis, Category, Rating};
pub use canvas::CanvasSpec;
pub use content::{ClusterContent, DrawInstruction, Drawer, LogicImage, PixMap, Processor};
pub use geometry::{Block, Cluster, ClusterChange, ClusterEvent, ClusterManager};
