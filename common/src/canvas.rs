use serde::{Deserialize, Serialize};

use crate::content::PixMap;

/// Stock engine canvas block: 12x12 surface, 3 bits per pixel, 8-color palette.
pub const DEFAULT_CANVAS_SIZE: u32 = 12;
pub const DEFAULT_BITS_PER_PIXEL: u32 = 3;
pub const DEFAULT_PALETTE: [u32; 8] = [
    0x362944, 0xc45d9f, 0xe39aac, 0xf0dab1, 0x6461c2, 0x2ba9b4, 0x93d4b5, 0xf0f6e8,
];

/// How one canvas block packs its pixels: palette indices stored LSB-first in
/// a flat bit stream, `bits_per_pixel` bits per linear pixel index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSpec {
    pub canvas_size: u32,
    pub bits_per_pixel: u32,
    pub palette: Vec<u32>,
}

impl Default for CanvasSpec {
    fn default() -> Self {
        Self {
            canvas_size: DEFAULT_CANVAS_SIZE,
            bits_per_pixel: DEFAULT_BITS_PER_PIXEL,
            palette: DEFAULT_PALETTE.to_vec(),
        }
    }
}

impl CanvasSpec {
    pub fn with_size(canvas_size: u32) -> Self {
        Self { canvas_size, ..Self::default() }
    }

    pub fn pixel_count(&self) -> usize {
        (self.canvas_size * self.canvas_size) as usize
    }

    /// Bytes a full config buffer occupies.
    pub fn packed_len(&self) -> usize {
        (self.pixel_count() * self.bits_per_pixel as usize).div_ceil(8)
    }

    /// Decode a packed config buffer into a pixel map. An absent buffer, or
    /// one shorter than a full surface, decodes as palette index 0 everywhere.
    pub fn decode(&self, config: Option<&[u8]>) -> PixMap {
        let fallback = self.palette.first().copied().unwrap_or(0);
        let pixels = match config {
            Some(data) if data.len() >= self.packed_len() => (0..self.pixel_count())
                .map(|i| {
                    let index = self.read_index(data, i * self.bits_per_pixel as usize);
                    self.palette.get(index).copied().unwrap_or(fallback)
                })
                .collect(),
            _ => vec![fallback; self.pixel_count()],
        };
        PixMap { canvas_size: self.canvas_size, pixels }
    }

    /// Unpack the raw palette indices of a full config buffer.
    pub fn decode_indices(&self, data: &[u8]) -> Vec<u8> {
        (0..self.pixel_count())
            .map(|i| self.read_index(data, i * self.bits_per_pixel as usize) as u8)
            .collect()
    }

    /// Pack palette indices into a config buffer (inverse of `decode_indices`).
    pub fn encode(&self, indices: &[u8]) -> Vec<u8> {
        debug_assert_eq!(indices.len(), self.pixel_count());
        let mut data = vec![0u8; self.packed_len()];
        for (i, &index) in indices.iter().enumerate() {
            let bit_offset = i * self.bits_per_pixel as usize;
            for bit in 0..self.bits_per_pixel as usize {
                if index & (1 << bit) != 0 {
                    let pos = bit + bit_offset;
                    data[pos >> 3] |= 1 << (pos & 7);
                }
            }
        }
        data
    }

    /// Read the palette index stored at `bit_offset`, LSB first across byte
    /// boundaries, matching the engine's packing.
    fn read_index(&self, data: &[u8], bit_offset: usize) -> usize {
        let mut result = 0usize;
        for bit in 0..self.bits_per_pixel as usize {
            let pos = bit + bit_offset;
            if data[pos >> 3] & (1 << (pos & 7)) != 0 {
                result |= 1 << bit;
            }
        }
        result
    }
}
