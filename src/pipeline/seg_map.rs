use std::collections::BTreeMap;
use std::path::Path;

use image::DynamicImage;

use crate::error::DetError;

/// A decoded semantic segmentation map, one label per pixel, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegMap {
    pub height: u32,
    pub width: u32,
    pub data: Vec<u16>,
}

impl SegMap {
    /// Reads and decodes a label image.
    pub fn open(path: &Path) -> Result<Self, DetError> {
        let image = image::open(path).map_err(|source| DetError::ImageDecode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_image(image))
    }

    /// Converts a decoded image into labels.
    ///
    /// 8- and 16-bit grayscale images keep their values unchanged. Anything
    /// else is reduced to 8-bit luma first, which is only meaningful for
    /// label images that were saved with identical channels.
    pub fn from_image(image: DynamicImage) -> Self {
        let (width, height) = (image.width(), image.height());
        let data = match image {
            DynamicImage::ImageLuma8(buf) => buf.into_raw().into_iter().map(u16::from).collect(),
            DynamicImage::ImageLuma16(buf) => buf.into_raw(),
            other => other
                .to_luma8()
                .into_raw()
                .into_iter()
                .map(u16::from)
                .collect(),
        };
        Self {
            height,
            width,
            data,
        }
    }

    pub fn get(&self, row: u32, col: u32) -> u16 {
        self.data[row as usize * self.width as usize + col as usize]
    }

    /// Maps label 0 to `ignore_index` and shifts every other label down by one.
    ///
    /// Pixels that were already `ignore_index` stay there instead of landing
    /// on `ignore_index - 1`.
    pub fn reduce_zero_label(&mut self, ignore_index: u16) {
        let sentinel = ignore_index.wrapping_sub(1);
        for value in &mut self.data {
            if *value == 0 {
                *value = ignore_index;
            }
            *value = value.wrapping_sub(1);
            if *value == sentinel {
                *value = ignore_index;
            }
        }
    }

    /// Remaps labels. Each pixel is looked up by its value before remapping,
    /// so chained entries like `{1: 2, 2: 3}` do not cascade.
    pub fn apply_label_map(&mut self, label_map: &BTreeMap<u16, u16>) {
        for value in &mut self.data {
            if let Some(&new) = label_map.get(value) {
                *value = new;
            }
        }
    }
}
