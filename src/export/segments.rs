use std::fs;
use std::io::ErrorKind;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::assemble::Assembly;
use crate::core::model::{crop_file_name, ArticleImages};
use crate::export::{OutputLayout, SideLogs};

/// Moves the crops of each canonical article into
/// `segmented_images/<issue>/<page>/<article>/`.
pub struct SegmentExporter<'a> {
    layout: &'a OutputLayout,
    logs: &'a SideLogs,
}

impl<'a> SegmentExporter<'a> {
    pub fn new(layout: &'a OutputLayout, logs: &'a SideLogs) -> Self {
        Self { layout, logs }
    }

    /// Returns the regrouped files per article, in rectangle order. Crops
    /// that were never written are logged and left out.
    pub fn export_issue(&self, assembly: &Assembly, issue: &str) -> Result<Vec<ArticleImages>> {
        let mut grouped = Vec::new();
        let mut missing = 0usize;

        for entry in assembly.articles_in(issue) {
            let directory = self.layout.segmented_dir(&entry.key);
            fs::create_dir_all(&directory)
                .with_context(|| format!("failed to create {}", directory.display()))?;

            let mut files = Vec::with_capacity(entry.rect_ids.len());
            for rect_id in &entry.rect_ids {
                let source = self.layout.cropped_path(issue, *rect_id);
                let file = crop_file_name(*rect_id);
                match fs::rename(&source, directory.join(&file)) {
                    Ok(()) => files.push(file),
                    Err(err) if err.kind() == ErrorKind::NotFound => {
                        self.logs.missing_rect(&source);
                        missing += 1;
                    }
                    Err(err) => {
                        return Err(err).with_context(|| format!("failed to move {}", source.display()))
                    }
                }
            }

            grouped.push(ArticleImages {
                key: entry.key.clone(),
                directory: directory.display().to_string(),
                files,
            });
        }

        if missing > 0 {
            warn!(issue, missing, "crops missing during regrouping");
        }
        info!(issue, articles = grouped.len(), "regrouped crops");
        Ok(grouped)
    }
}
