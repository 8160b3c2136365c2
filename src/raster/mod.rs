pub mod cache;
pub mod jp2;

use std::path::{Path, PathBuf};

use image::{imageops, ColorType, DynamicImage, GrayImage};
use thiserror::Error;

use crate::core::geometry::{CropWindow, RasterShape};
use crate::core::transform::TransformError;

pub use cache::DecodedCache;
pub use jp2::Jp2Decoder;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("unsupported image extension `{0}`; expected jpg, jpeg or jp2")]
    UnsupportedExtension(String),
    #[error("failed to decode {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },
    #[error("crop window {0:?} is empty")]
    EmptyCrop(CropWindow),
    #[error(transparent)]
    Shape(#[from] TransformError),
}

/// Source image formats, dispatched by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Jpeg,
    Jp2,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Result<Self, RasterError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "jp2" => Ok(Self::Jp2),
            _ => Err(RasterError::UnsupportedExtension(extension)),
        }
    }
}

/// A decoded page scan.
#[derive(Debug, Clone)]
pub struct PageRaster {
    image: DynamicImage,
}

impl PageRaster {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn shape(&self) -> RasterShape {
        let (width, height) = (self.image.width(), self.image.height());
        match self.image.color() {
            ColorType::L8 | ColorType::L16 => RasterShape::gray(height, width),
            color => RasterShape::with_channels(height, width, color.channel_count()),
        }
    }

    /// The 8-bit grayscale grid, or `None` for colour rasters.
    pub fn gray(&self) -> Option<GrayImage> {
        match &self.image {
            DynamicImage::ImageLuma8(gray) => Some(gray.clone()),
            DynamicImage::ImageLuma16(_) => Some(self.image.to_luma8()),
            _ => None,
        }
    }

    pub fn crop(&self, window: &CropWindow) -> Result<GrayImage, RasterError> {
        let shape = self.shape();
        if let Some(channels) = shape.channels {
            return Err(TransformError::UnsupportedImageShape {
                height: shape.height,
                width: shape.width,
                channels,
            }
            .into());
        }
        if window.is_empty() {
            return Err(RasterError::EmptyCrop(*window));
        }
        let gray = match &self.image {
            DynamicImage::ImageLuma8(gray) => {
                imageops::crop_imm(gray, window.min_col, window.min_row, window.width(), window.height())
                    .to_image()
            }
            other => {
                let gray = other.to_luma8();
                imageops::crop_imm(&gray, window.min_col, window.min_row, window.width(), window.height())
                    .to_image()
            }
        };
        Ok(gray)
    }
}

pub trait RasterDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<PageRaster, RasterError>;
}

/// JPEG through the `image` crate, JPEG 2000 through [`Jp2Decoder`].
#[derive(Debug)]
pub struct SourceDecoder {
    jp2: Jp2Decoder,
}

impl SourceDecoder {
    pub fn new(jp2: Jp2Decoder) -> Self {
        Self { jp2 }
    }
}

impl RasterDecoder for SourceDecoder {
    fn decode(&self, path: &Path) -> Result<PageRaster, RasterError> {
        match SourceFormat::from_path(path)? {
            SourceFormat::Jpeg => open_image(path),
            SourceFormat::Jp2 => self.jp2.decode(path),
        }
    }
}

pub(crate) fn open_image(path: &Path) -> Result<PageRaster, RasterError> {
    image::open(path)
        .map(PageRaster::new)
        .map_err(|err| RasterError::Decode {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};
    use pretty_assertions::assert_eq;

    #[test]
    fn dispatches_by_extension() {
        assert_eq!(SourceFormat::from_path(Path::new("1.JPG")).unwrap(), SourceFormat::Jpeg);
        assert_eq!(SourceFormat::from_path(Path::new("a/3.jp2")).unwrap(), SourceFormat::Jp2);
        assert!(matches!(
            SourceFormat::from_path(Path::new("scan.tif")),
            Err(RasterError::UnsupportedExtension(ext)) if ext == "tif"
        ));
    }

    #[test]
    fn crops_grayscale_window() {
        let gray = GrayImage::from_fn(10, 8, |x, y| Luma([(x + 10 * y) as u8]));
        let raster = PageRaster::new(DynamicImage::ImageLuma8(gray));
        assert_eq!(raster.shape(), RasterShape::gray(8, 10));

        let window = CropWindow {
            min_row: 2,
            max_row: 5,
            min_col: 1,
            max_col: 4,
        };
        let crop = raster.crop(&window).unwrap();
        assert_eq!(crop.dimensions(), (3, 3));
        assert_eq!(crop.get_pixel(0, 0).0[0], 21);
    }

    #[test]
    fn colour_rasters_are_not_cropped() {
        let rgb = RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]));
        let raster = PageRaster::new(DynamicImage::ImageRgb8(rgb));
        assert_eq!(raster.shape(), RasterShape::with_channels(4, 4, 3));
        assert!(raster.gray().is_none());

        let window = CropWindow {
            min_row: 0,
            max_row: 2,
            min_col: 0,
            max_col: 2,
        };
        assert!(matches!(raster.crop(&window), Err(RasterError::Shape(_))));
    }
}
