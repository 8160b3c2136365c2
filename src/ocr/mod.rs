pub mod bridge;

use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::core::model::{ArticleImages, ArticleTitle};

pub use bridge::TesseractBridge;

pub const UNTITLED: &str = "[Untitled]";
pub const MAX_TITLE_CHARS: usize = 100;

pub trait TitleRecognizer {
    /// Raw recognized text of one crop image.
    fn recognize(&self, image: &Path) -> Result<String>;
}

/// Turns raw OCR output of an article's first crop into a one-line title.
pub fn clean_title(raw: &str) -> String {
    let joined = raw.replace("-\n", "").replace('\n', " ");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        return UNTITLED.to_string();
    }
    trimmed.chars().take(MAX_TITLE_CHARS).collect()
}

/// Guesses a title for every article from its first crop. Articles whose crop
/// cannot be read get the placeholder title.
pub fn recognize_titles<R: TitleRecognizer>(recognizer: &R, articles: &[ArticleImages]) -> Vec<ArticleTitle> {
    let mut titles = Vec::with_capacity(articles.len());
    for article in articles {
        let Some(first) = article.files.first() else {
            continue;
        };
        let path = Path::new(&article.directory).join(first);
        let title = match recognizer.recognize(&path) {
            Ok(raw) => clean_title(&raw),
            Err(err) => {
                warn!(article = %article.key, error = %err, "title recognition failed");
                UNTITLED.to_string()
            }
        };
        info!(article = %article.key, %title, "recognized title");
        titles.push(ArticleTitle {
            key: article.key.clone(),
            title,
        });
    }
    titles
}
