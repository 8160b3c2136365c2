use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::raster::{open_image, PageRaster, RasterDecoder, RasterError};

/// Read-through cache of decoded pages, stored losslessly as PNG under
/// `<root>/<issue>/<file>.png`. Entries are never invalidated; callers must
/// not address the same key from two workers.
#[derive(Debug)]
pub struct DecodedCache<D> {
    root: PathBuf,
    decoder: D,
}

impl<D: RasterDecoder> DecodedCache<D> {
    pub fn new(root: PathBuf, decoder: D) -> Self {
        Self { root, decoder }
    }

    pub fn entry_path(&self, issue: &str, file: &str) -> PathBuf {
        self.root.join(issue).join(format!("{file}.png"))
    }

    pub fn load(&self, issue: &str, file: &str, source: &Path) -> Result<PageRaster, RasterError> {
        let entry = self.entry_path(issue, file);
        if entry.is_file() {
            match open_image(&entry) {
                Ok(raster) => {
                    debug!(issue, file, "decoded page cache hit");
                    return Ok(raster);
                }
                Err(err) => warn!(entry = %entry.display(), error = %err, "unreadable cache entry; decoding source"),
            }
        }

        let raster = self.decoder.decode(source)?;
        if let Err(err) = store(&entry, &raster) {
            warn!(entry = %entry.display(), error = %err, "failed to write decoded page cache");
        }
        Ok(raster)
    }
}

fn store(entry: &Path, raster: &PageRaster) -> anyhow::Result<()> {
    if let Some(parent) = entry.parent() {
        fs::create_dir_all(parent)?;
    }
    raster.image().save(entry)?;
    Ok(())
}
