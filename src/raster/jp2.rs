use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::raster::{open_image, PageRaster, RasterError};

/// Decodes JPEG 2000 scans by converting them to PNG with OpenJPEG's
/// `opj_decompress`, then reading the PNG.
#[derive(Debug)]
pub struct Jp2Decoder {
    work_dir: PathBuf,
    program: PathBuf,
    sequence: AtomicU64,
}

impl Jp2Decoder {
    pub fn new(work_dir: PathBuf) -> Self {
        Self {
            work_dir,
            program: PathBuf::from("opj_decompress"),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn with_program(mut self, program: PathBuf) -> Self {
        self.program = program;
        self
    }

    pub fn decode(&self, path: &Path) -> Result<PageRaster, RasterError> {
        let failed = |reason: String| RasterError::Decode {
            path: path.to_path_buf(),
            reason,
        };

        fs::create_dir_all(&self.work_dir).map_err(|err| failed(err.to_string()))?;
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        let converted = self
            .work_dir
            .join(format!("jp2-{}-{n}.png", std::process::id()));

        let output = Command::new(&self.program)
            .arg("-i")
            .arg(path)
            .arg("-o")
            .arg(&converted)
            .output()
            .map_err(|err| {
                failed(format!(
                    "failed to invoke {}: {err}; is openjpeg installed?",
                    self.program.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let _ = fs::remove_file(&converted);
            return Err(failed(format!("{} failed: {stderr}", self.program.display())));
        }

        debug!(source = %path.display(), converted = %converted.display(), "decoded jp2");
        let raster = open_image(&converted);
        let _ = fs::remove_file(&converted);
        raster.map_err(|err| match err {
            RasterError::Decode { reason, .. } => failed(reason),
            other => other,
        })
    }
}
