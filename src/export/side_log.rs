use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

pub const MISSING_PAGES_LOG: &str = "missing_page_articles.txt";
pub const UNPROCESSABLE_IMAGES_LOG: &str = "unprocessable-images.txt";
pub const MISSING_RECTS_LOG: &str = "missing_rects.txt";

/// Append-only diagnostic files for skipped items.
#[derive(Debug, Clone)]
pub struct SideLogs {
    dir: PathBuf,
}

impl SideLogs {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn clear(&self) -> Result<()> {
        for name in [MISSING_PAGES_LOG, UNPROCESSABLE_IMAGES_LOG, MISSING_RECTS_LOG] {
            let path = self.path(name);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(err).with_context(|| format!("failed to remove {}", path.display()))
                }
            }
        }
        Ok(())
    }

    pub fn missing_page(&self, issue: &str, inpage: &str) {
        self.append(MISSING_PAGES_LOG, &format!("{issue} {inpage}"));
    }

    pub fn unprocessable_image(&self, path: &Path) {
        self.append(UNPROCESSABLE_IMAGES_LOG, &path.display().to_string());
    }

    pub fn missing_rect(&self, path: &Path) {
        self.append(MISSING_RECTS_LOG, &path.display().to_string());
    }

    /// Writes one line in a single call so lines from concurrent workers do
    /// not interleave.
    fn append(&self, name: &str, line: &str) {
        let path = self.path(name);
        let result = fs::create_dir_all(&self.dir).and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?
                .write_all(format!("{line}\n").as_bytes())
        });
        if let Err(err) = result {
            warn!(log = %path.display(), error = %err, "failed to append side log");
        }
    }
}
