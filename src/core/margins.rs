use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Pixels at or above this value count as paper after 1-bit quantization.
const PAPER_THRESHOLD: u8 = 128;

/// Blank page borders, in pixels.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Margins {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl Margins {
    /// Height and width left once the bottom and right margins are removed.
    pub fn content_dimensions(&self, height: u32, width: u32) -> (u32, u32) {
        (
            height.saturating_sub(self.bottom),
            width.saturating_sub(self.right),
        )
    }
}

/// Row and column sums of the quantized page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DensityProfile {
    pub rows: Vec<u64>,
    pub cols: Vec<u64>,
}

pub fn density_profile(image: &GrayImage) -> DensityProfile {
    let (width, height) = image.dimensions();
    let mut rows = vec![0u64; height as usize];
    let mut cols = vec![0u64; width as usize];

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel.0[0] >= PAPER_THRESHOLD {
            rows[y as usize] += 1;
            cols[x as usize] += 1;
        }
    }

    DensityProfile { rows, cols }
}

/// A margin is the run of leading (or trailing) rows/columns whose sum equals
/// the maximum sum along that axis, i.e. lines that are entirely as bright as
/// the brightest line.
pub fn detect_margins(image: &GrayImage) -> Margins {
    let profile = density_profile(image);
    Margins {
        top: leading_run(profile.rows.iter()),
        bottom: leading_run(profile.rows.iter().rev()),
        left: leading_run(profile.cols.iter()),
        right: leading_run(profile.cols.iter().rev()),
    }
}

fn leading_run<'a, I>(values: I) -> u32
where
    I: Iterator<Item = &'a u64> + Clone,
{
    let Some(max) = values.clone().max().copied() else {
        return 0;
    };
    values.take_while(|value| **value == max).count() as u32
}
