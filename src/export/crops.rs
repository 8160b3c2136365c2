use std::fs;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::assemble::Assembly;
use crate::core::margins::detect_margins;
use crate::core::transform::CoordinateTransformer;
use crate::export::{OutputLayout, SideLogs};
use crate::layout::Issue;
use crate::raster::{DecodedCache, RasterDecoder};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CropStats {
    pub written: usize,
    pub skipped: usize,
}

/// Cuts every queued rectangle of an issue out of its page, one page load
/// per page image.
pub struct CropExporter<'a, D> {
    layout: &'a OutputLayout,
    cache: &'a DecodedCache<D>,
    logs: &'a SideLogs,
    transformer: CoordinateTransformer,
    margin_correction: bool,
}

impl<'a, D: RasterDecoder> CropExporter<'a, D> {
    pub fn new(
        layout: &'a OutputLayout,
        cache: &'a DecodedCache<D>,
        logs: &'a SideLogs,
        transformer: CoordinateTransformer,
    ) -> Self {
        Self {
            layout,
            cache,
            logs,
            transformer,
            margin_correction: false,
        }
    }

    pub fn with_margin_correction(mut self, enabled: bool) -> Self {
        self.margin_correction = enabled;
        self
    }

    pub fn export_issue(&self, assembly: &Assembly, issue: &Issue) -> Result<CropStats> {
        let out_dir = self.layout.cropped_dir(&issue.name);
        fs::create_dir_all(&out_dir).with_context(|| format!("failed to create {}", out_dir.display()))?;

        let mut stats = CropStats::default();
        for (page_file, records) in assembly.crop_queue(&issue.name) {
            let source = issue.page_path(page_file);
            let raster = match self.cache.load(&issue.name, page_file, &source) {
                Ok(raster) => raster,
                Err(err) => {
                    warn!(issue = %issue.name, page = page_file, error = %err, "could not decode page");
                    self.logs.unprocessable_image(&source);
                    stats.skipped += records.len();
                    continue;
                }
            };

            let shape = raster.shape();
            let margins = if self.margin_correction {
                raster.gray().map(|gray| detect_margins(&gray))
            } else {
                None
            };

            for record in records {
                let window = match self
                    .transformer
                    .transform_with_margins(&record.coords, &shape, margins.as_ref())
                {
                    Ok(window) => window,
                    Err(err) => {
                        warn!(issue = %issue.name, page = page_file, rect_id = record.rect_id, error = %err, "crop window unavailable");
                        stats.skipped += 1;
                        continue;
                    }
                };

                let crop = match raster.crop(&window) {
                    Ok(crop) => crop,
                    Err(err) => {
                        warn!(issue = %issue.name, page = page_file, rect_id = record.rect_id, error = %err, "crop skipped");
                        stats.skipped += 1;
                        continue;
                    }
                };

                let path = self.layout.cropped_path(&issue.name, record.rect_id);
                crop.save(&path)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                debug!(rect_id = record.rect_id, ?window, "wrote crop");
                stats.written += 1;
            }
        }

        info!(issue = %issue.name, written = stats.written, skipped = stats.skipped, "cropped issue");
        Ok(stats)
    }
}
