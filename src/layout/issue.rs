use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, error};

use crate::core::model::{document_stem, LAYOUT_SUFFIX};
use crate::layout::document::LayoutDocument;
use crate::layout::page_index::PageIndex;
use crate::raster::SourceFormat;

/// One edition: a directory of page images and layout documents.
#[derive(Debug, Clone)]
pub struct Issue {
    pub name: String,
    pub path: PathBuf,
    /// Page image filenames, sorted by name.
    pub page_files: Vec<String>,
    /// Layout document filenames, sorted by numeric stem.
    pub documents: Vec<String>,
    pub pages: PageIndex,
}

impl Issue {
    pub fn open(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow::anyhow!("issue path has no UTF-8 name: {}", path.display()))?
            .to_string();

        let mut page_files = Vec::new();
        let mut documents = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("failed to list {}", path.display()))? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(file) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if file.ends_with(LAYOUT_SUFFIX) {
                documents.push(file);
            } else if SourceFormat::from_path(Path::new(&file)).is_ok() {
                page_files.push(file);
            }
        }

        page_files.sort();
        documents.sort_by(|a, b| document_order(a).cmp(&document_order(b)));

        let pages = PageIndex::load(path, &page_files)?;
        debug!(
            issue = %name,
            pages = pages.len(),
            documents = documents.len(),
            source = ?pages.source(),
            "opened issue"
        );

        Ok(Self {
            name,
            path: path.to_path_buf(),
            page_files,
            documents,
            pages,
        })
    }

    pub fn page_path(&self, file: &str) -> PathBuf {
        self.path.join(file)
    }

    pub fn read_document(&self, document: &str) -> Result<LayoutDocument> {
        let path = self.path.join(document);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let parsed = LayoutDocument::parse(document, &text)
            .with_context(|| format!("invalid layout document {}", path.display()))?;
        Ok(parsed)
    }
}

fn document_order(document: &str) -> (u64, String) {
    let stem = document_stem(document);
    // numbered documents first
    (stem.parse::<u64>().unwrap_or(u64::MAX), stem.to_string())
}

/// Every issue directory directly under `root`, sorted by name. Issues that
/// cannot be opened are logged and left out.
pub fn discover_issues(root: &Path) -> Result<Vec<Issue>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root).with_context(|| format!("failed to list {}", root.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();

    let mut issues = Vec::with_capacity(dirs.len());
    for dir in &dirs {
        match Issue::open(dir) {
            Ok(issue) => issues.push(issue),
            Err(err) => error!(issue = %dir.display(), error = %format!("{err:#}"), "skipping issue"),
        }
    }
    Ok(issues)
}
