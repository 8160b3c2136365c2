use thiserror::Error;

use crate::core::geometry::{CropWindow, LayoutRect, RasterShape};
use crate::core::margins::Margins;

/// Layout coordinates span the full page in `0..=NORMALIZATION_SPAN`
/// whatever the scan resolution.
pub const NORMALIZATION_SPAN: f64 = 65535.0;

pub const DEFAULT_SCALE_PERCENT: u32 = 100;
pub const DEFAULT_PADDING: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("unsupported image shape {height}x{width}x{channels}; expected a 2-D grayscale array")]
    UnsupportedImageShape {
        height: u32,
        width: u32,
        channels: u8,
    },
}

/// Unpadded pixel bounds, before truncation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelBounds {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransformer {
    span: f64,
    scale_percent: u32,
    padding: u32,
}

impl Default for CoordinateTransformer {
    fn default() -> Self {
        Self {
            span: NORMALIZATION_SPAN,
            scale_percent: DEFAULT_SCALE_PERCENT,
            padding: DEFAULT_PADDING,
        }
    }
}

impl CoordinateTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scale_percent(mut self, scale_percent: u32) -> Self {
        self.scale_percent = scale_percent;
        self
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    pub fn padding(&self) -> u32 {
        self.padding
    }

    pub fn scale_percent(&self) -> u32 {
        self.scale_percent
    }

    /// Maps `rect` onto a `height x width` pixel grid without padding.
    pub fn map_bounds(&self, rect: &LayoutRect, height: u32, width: u32) -> PixelBounds {
        let scale = f64::from(self.scale_percent) / 100.0;
        let map = |raw: i64, dimension: u32| (raw as f64 / self.span) * f64::from(dimension) * scale;

        let top = map(rect.y, height);
        let left = map(rect.x, width);
        PixelBounds {
            top,
            bottom: top + map(rect.height, height),
            left,
            right: left + map(rect.width, width),
        }
    }

    pub fn transform(&self, rect: &LayoutRect, shape: &RasterShape) -> Result<CropWindow, TransformError> {
        self.transform_with_margins(rect, shape, None)
    }

    /// Like [`transform`](Self::transform), but maps onto the page area left
    /// after removing the detected right and bottom margins.
    pub fn transform_with_margins(
        &self,
        rect: &LayoutRect,
        shape: &RasterShape,
        margins: Option<&Margins>,
    ) -> Result<CropWindow, TransformError> {
        if let Some(channels) = shape.channels {
            return Err(TransformError::UnsupportedImageShape {
                height: shape.height,
                width: shape.width,
                channels,
            });
        }

        let (height, width) = match margins {
            Some(margins) => margins.content_dimensions(shape.height, shape.width),
            None => (shape.height, shape.width),
        };
        let bounds = self.map_bounds(rect, height, width);

        let pad = i64::from(self.padding);
        let clamp = |value: f64, offset: i64, limit: u32| -> u32 {
            (value.trunc() as i64 + offset).clamp(0, i64::from(limit)) as u32
        };

        Ok(CropWindow {
            min_row: clamp(bounds.top, -pad, shape.height),
            max_row: clamp(bounds.bottom, pad, shape.height),
            min_col: clamp(bounds.left, -pad, shape.width),
            max_col: clamp(bounds.right, pad, shape.width),
        })
    }
}
