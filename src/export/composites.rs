use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use image::GrayImage;
use tracing::{debug, warn};

use crate::core::composite::{self, CompositeError};
use crate::core::model::ArticleImages;
use crate::export::OutputLayout;

/// Writes one stacked image per article.
pub struct CompositeExporter<'a> {
    layout: &'a OutputLayout,
}

impl<'a> CompositeExporter<'a> {
    pub fn new(layout: &'a OutputLayout) -> Self {
        Self { layout }
    }

    /// Returns `Ok(false)` when the article had nothing to stack.
    pub fn export_article(&self, article: &ArticleImages) -> Result<bool> {
        let directory = Path::new(&article.directory);
        let crops = article
            .files
            .iter()
            .map(|file| load_gray(&directory.join(file)))
            .collect::<Result<Vec<_>>>()?;

        let stacked = match composite::build(&article.key, &crops) {
            Ok(stacked) => stacked,
            Err(err @ CompositeError::EmptyArticle(_)) => {
                warn!(error = %err, "no composite written");
                return Ok(false);
            }
        };

        let path = self.layout.composite_path(&article.key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        stacked
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!(article = %article.key, crops = crops.len(), "wrote composite");
        Ok(true)
    }
}

fn load_gray(path: &Path) -> Result<GrayImage> {
    let image = image::open(path).with_context(|| format!("failed to read crop {}", path.display()))?;
    Ok(image.to_luma8())
}
