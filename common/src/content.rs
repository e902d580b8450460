use serde::{Deserialize, Serialize};

/// Normalize a raw instruction component into `[0, 255]` (euclidean mod 256,
/// so negative inputs wrap around).
pub fn normalize_component(value: i64) -> u8 {
    value.rem_euclid(256) as u8
}

/// One recorded draw op, every component already normalized into `[0, 255]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawInstruction {
    Color { r: u8, g: u8, b: u8, a: u8 },
    Rect { x: u8, y: u8, w: u8, h: u8 },
    Triangle { x1: u8, y1: u8, x2: u8, y2: u8, x3: u8, y3: u8 },
}

impl DrawInstruction {
    /// Build a color op from raw executor values.
    pub fn color(r: i64, g: i64, b: i64, a: i64) -> Self {
        DrawInstruction::Color {
            r: normalize_component(r),
            g: normalize_component(g),
            b: normalize_component(b),
            a: normalize_component(a),
        }
    }

    /// Build a rect op from raw executor values.
    pub fn rect(x: i64, y: i64, w: i64, h: i64) -> Self {
        DrawInstruction::Rect {
            x: normalize_component(x),
            y: normalize_component(y),
            w: normalize_component(w),
            h: normalize_component(h),
        }
    }

    /// Build a triangle op from raw executor values.
    pub fn triangle(x1: i64, y1: i64, x2: i64, y2: i64, x3: i64, y3: i64) -> Self {
        DrawInstruction::Triangle {
            x1: normalize_component(x1),
            y1: normalize_component(y1),
            x2: normalize_component(x2),
            y2: normalize_component(y2),
            x3: normalize_component(x3),
            y3: normalize_component(y3),
        }
    }
}

/// A logic processor bound to a display, with the draw ops it executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Processor {
    pub x: i32,
    pub y: i32,
    pub instructions: Vec<DrawInstruction>,
}

/// Display-kind cluster content: the rendering surface resolution in pixels
/// and every processor currently bound to the cluster's displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drawer {
    pub resolution: u32,
    pub processors: Vec<Processor>,
}

impl Drawer {
    /// Total recorded instructions across all bound processors.
    pub fn instruction_count(&self) -> usize {
        self.processors.iter().map(|p| p.instructions.len()).sum()
    }
}

/// Canvas-kind cluster content: a decoded rgb888 grid, one entry per linear
/// pixel index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixMap {
    pub canvas_size: u32,
    pub pixels: Vec<u32>,
}

/// Closed variant over the two renderable content kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicImage {
    Drawer(Drawer),
    PixMap(PixMap),
}

impl From<Drawer> for LogicImage {
    fn from(drawer: Drawer) -> Self {
        LogicImage::Drawer(drawer)
    }
}

impl From<PixMap> for LogicImage {
    fn from(pixmap: PixMap) -> Self {
        LogicImage::PixMap(pixmap)
    }
}

/// What the pipeline needs from a content kind, carried by the content itself
/// so queue and worker code stays generic over the device kind.
pub trait ClusterContent: Clone + Send + Sync + 'static {
    fn to_logic_image(&self) -> LogicImage;

    /// Coordinates of companion devices belonging to this content (bound
    /// processors for displays) that must be destroyed with the cluster.
    fn linked_devices(&self) -> Vec<(i32, i32)>;
}

impl ClusterContent for Drawer {
    fn to_logic_image(&self) -> LogicImage {
        LogicImage::Drawer(self.clone())
    }

    fn linked_devices(&self) -> Vec<(i32, i32)> {
        self.processors.iter().map(|p| (p.x, p.y)).collect()
    }
}

impl ClusterContent for PixMap {
    fn to_logic_image(&self) -> LogicImage {
        LogicImage::PixMap(self.clone())
    }

    fn linked_devices(&self) -> Vec<(i32, i32)> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_wraps_into_byte_range() {
        assert_eq!(normalize_component(0), 0);
        assert_eq!(normalize_component(255), 255);
        assert_eq!(normalize_component(256), 0);
        assert_eq!(normalize_component(300), 44);
        assert_eq!(normalize_component(-1), 255);
        assert_eq!(normalize_component(-256), 0);
    }

    #[test]
    fn raw_op_components_are_normalized() {
        assert_eq!(
            DrawInstruction::color(300, -1, 0, 255),
            DrawInstruction::Color { r: 44, g: 255, b: 0, a: 255 }
        );
        assert_eq!(
            DrawInstruction::rect(-10, 512, 40, 40),
            DrawInstruction::Rect { x: 246, y: 0, w: 40, h: 40 }
        );
    }

    #[test]
    fn instruction_count_sums_all_processors() {
        let op = DrawInstruction::Color { r: 1, g: 2, b: 3, a: 255 };
        let drawer = Drawer {
            resolution: 80,
            processors: vec![
                Processor { x: 0, y: 0, instructions: vec![op; 3] },
                Processor { x: 1, y: 0, instructions: vec![op; 5] },
            ],
        };
        assert_eq!(drawer.instruction_count(), 8);
    }

    #[test]
    fn drawer_links_its_processors() {
        let drawer = Drawer {
            resolution: 80,
            processors: vec![
                Processor { x: 4, y: 2, instructions: Vec::new() },
                Processor { x: 7, y: 1, instructions: Vec::new() },
            ],
        };
        assert_eq!(drawer.linked_devices(), vec![(4, 2), (7, 1)]);
        let pixmap = PixMap { canvas_size: 4, pixels: vec![0; 16] };
        assert!(pixmap.linked_devices().is_empty());
    }
}
