use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::assemble::Assembly;
use crate::core::model::{ArticleEntry, RectRecord};

pub const CROP_QUEUE_FILE: &str = "crop_queue.json";
pub const ARTICLES_FILE: &str = "articles.json";
pub const UNRESOLVED_FILE: &str = "unresolved_rects.json";
pub const IMAGES_PER_ARTICLE_FILE: &str = "images_per_article.json";
pub const TITLES_FILE: &str = "articles_to_titles.json";

/// Phase artefacts as pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct JsonExporter {
    out_dir: PathBuf,
}

impl JsonExporter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }

    pub fn write<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join(name);
        let data = serde_json::to_string_pretty(value)?;
        fs::write(&path, data).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn read<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        read_json(&self.out_dir.join(name))
    }

    pub fn export_assembly(&self, assembly: &Assembly) -> Result<()> {
        self.write(CROP_QUEUE_FILE, assembly.records())?;
        self.write(ARTICLES_FILE, assembly.articles())?;
        self.write(UNRESOLVED_FILE, assembly.unresolved())?;
        Ok(())
    }

    /// Reads back the crop queue and article lists written by
    /// [`export_assembly`](Self::export_assembly) and checks they agree.
    pub fn load_assembly(&self) -> Result<Assembly> {
        let records: Vec<RectRecord> = self.read(CROP_QUEUE_FILE)?;
        let articles: Vec<ArticleEntry> = self.read(ARTICLES_FILE)?;
        let assembly = Assembly::from_parts(records, articles)
            .with_context(|| format!("inconsistent assembly in {}", self.out_dir.display()))?;
        Ok(assembly)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))
}
