pub mod composites;
pub mod crops;
pub mod json_export;
pub mod segments;
pub mod side_log;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::model::{crop_file_name, ArticleKey, RectId};

pub use composites::CompositeExporter;
pub use crops::{CropExporter, CropStats};
pub use json_export::JsonExporter;
pub use segments::SegmentExporter;
pub use side_log::SideLogs;

pub const CROPPED_DIR: &str = "cropped_images";
pub const SEGMENTED_DIR: &str = "segmented_images";
pub const COMPOSITE_DIR: &str = "composite_images";
pub const DECODED_DIR: &str = "decoded";

/// Where every phase writes under the output root.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn decoded_dir(&self) -> PathBuf {
        self.root.join(DECODED_DIR)
    }

    pub fn cropped_dir(&self, issue: &str) -> PathBuf {
        self.root.join(CROPPED_DIR).join(issue)
    }

    pub fn cropped_path(&self, issue: &str, rect_id: RectId) -> PathBuf {
        self.cropped_dir(issue).join(crop_file_name(rect_id))
    }

    pub fn segmented_dir(&self, key: &ArticleKey) -> PathBuf {
        self.root
            .join(SEGMENTED_DIR)
            .join(&key.issue)
            .join(key.document_stem())
            .join(key.article_index.to_string())
    }

    pub fn composite_path(&self, key: &ArticleKey) -> PathBuf {
        self.root
            .join(COMPOSITE_DIR)
            .join(&key.issue)
            .join(format!("{}.png", key.composite_name()))
    }

    /// Removes the image output trees of a previous run. The decoded page
    /// cache is kept.
    pub fn clear_outputs(&self) -> Result<()> {
        for dir in [CROPPED_DIR, SEGMENTED_DIR, COMPOSITE_DIR] {
            remove_dir_if_present(&self.root.join(dir))?;
        }
        Ok(())
    }
}

fn remove_dir_if_present(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn output_paths() {
        let layout = OutputLayout::new(PathBuf::from("out"));
        let key = ArticleKey::new("1902-01-01", "4.articles.xml", 2);
        assert_eq!(
            layout.cropped_path("1902-01-01", 17),
            PathBuf::from("out/cropped_images/1902-01-01/17.png")
        );
        assert_eq!(
            layout.segmented_dir(&key),
            PathBuf::from("out/segmented_images/1902-01-01/4/2")
        );
        assert_eq!(
            layout.composite_path(&key),
            PathBuf::from("out/composite_images/1902-01-01/4_2.png")
        );
    }

    #[test]
    fn clearing_missing_outputs_is_fine() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let layout = OutputLayout::new(dir.path().to_path_buf());
        fs::create_dir_all(layout.cropped_dir("x"))?;
        fs::create_dir_all(layout.decoded_dir())?;
        layout.clear_outputs()?;
        layout.clear_outputs()?;
        assert!(!dir.path().join(CROPPED_DIR).exists());
        assert!(layout.decoded_dir().exists());
        Ok(())
    }
}
