//! Instance masks: dense bitmaps, polygons and their run-length encoding.
//!
//! Raw annotation payloads arrive in several shapes (a list of polygon rings,
//! a COCO RLE object with list or string counts, or garbage). [`normalize_masks`]
//! turns them into a closed [`MaskPayload`] per instance, degrading anything
//! malformed to an ignored placeholder. [`Masks`] holds the per-record
//! collection produced by the loader.

mod rle;
mod structures;
mod validate;

pub use rle::{ring_within_reach, Rle};
pub use structures::{BitmapMasks, Masks, PolygonMasks};
pub use validate::{
    normalize_masks, payload_to_bitmap, MaskPayload, NormalizedMasks, RawMask, RleObject,
    DEGENERATE_RING,
};

/// A dense binary plane stored row-major, one byte per pixel.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    height: u32,
    width: u32,
    data: Vec<u8>,
}

impl Bitmap {
    /// An all-zero plane.
    pub fn new(height: u32, width: u32) -> Self {
        Self {
            height,
            width,
            data: vec![0; height as usize * width as usize],
        }
    }

    /// Wraps an existing row-major buffer. Any non-zero byte is foreground.
    pub fn from_raw(height: u32, width: u32, data: Vec<u8>) -> Option<Self> {
        (data.len() == height as usize * width as usize).then_some(Self {
            height,
            width,
            data,
        })
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn get(&self, row: u32, col: u32) -> bool {
        self.data[row as usize * self.width as usize + col as usize] != 0
    }

    #[inline]
    pub fn set(&mut self, row: u32, col: u32, value: bool) {
        self.data[row as usize * self.width as usize + col as usize] = u8::from(value);
    }

    /// Number of foreground pixels.
    pub fn count_ones(&self) -> u64 {
        self.data.iter().filter(|&&v| v != 0).count() as u64
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitmap")
            .field("height", &self.height)
            .field("width", &self.width)
            .field("ones", &self.count_ones())
            .finish()
    }
}
