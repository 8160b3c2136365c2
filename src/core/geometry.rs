use serde::{Deserialize, Serialize};

/// Axis-aligned box in layout units, as written in a `<coord>` element
/// (`x:y:width:height`, origin at the top left corner).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct LayoutRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl LayoutRect {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i64 {
        self.y + self.height
    }
}

/// Pixel-space window `[min_row, max_row) x [min_col, max_col)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CropWindow {
    pub min_row: u32,
    pub max_row: u32,
    pub min_col: u32,
    pub max_col: u32,
}

impl CropWindow {
    pub fn height(&self) -> u32 {
        self.max_row.saturating_sub(self.min_row)
    }

    pub fn width(&self) -> u32 {
        self.max_col.saturating_sub(self.min_col)
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0 || self.width() == 0
    }
}

/// Shape of a decoded page raster. `channels` is `None` for a plain 2-D
/// grayscale grid and `Some(n)` for an `H x W x n` array.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RasterShape {
    pub height: u32,
    pub width: u32,
    pub channels: Option<u8>,
}

impl RasterShape {
    pub fn gray(height: u32, width: u32) -> Self {
        Self {
            height,
            width,
            channels: None,
        }
    }

    pub fn with_channels(height: u32, width: u32, channels: u8) -> Self {
        Self {
            height,
            width,
            channels: Some(channels),
        }
    }

    pub fn is_two_dimensional(&self) -> bool {
        self.channels.is_none()
    }
}
