use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::geometry::LayoutRect;

pub type RectId = u64;

/// Suffix shared by every layout document file name.
pub const LAYOUT_SUFFIX: &str = ".articles.xml";

/// Identity of one article: its position inside one layout document of one issue.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArticleKey {
    pub issue: String,
    pub document: String,
    pub article_index: usize,
}

impl ArticleKey {
    pub fn new(issue: impl Into<String>, document: impl Into<String>, article_index: usize) -> Self {
        Self {
            issue: issue.into(),
            document: document.into(),
            article_index,
        }
    }

    /// `12.articles.xml` -> `12`
    pub fn document_stem(&self) -> &str {
        document_stem(&self.document)
    }

    /// File stem used for the article's composite image.
    pub fn composite_name(&self) -> String {
        format!("{}_{}", self.document_stem(), self.article_index)
    }
}

impl fmt::Display for ArticleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.issue,
            self.document_stem(),
            self.article_index
        )
    }
}

pub fn document_stem(document: &str) -> &str {
    document.strip_suffix(LAYOUT_SUFFIX).unwrap_or(document)
}

/// One resolved rectangle occurrence. Every record is queued for cropping;
/// `canonical` records also belong to their article's rectangle list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RectRecord {
    pub rect_id: RectId,
    pub issue: String,
    pub document: String,
    pub article_index: usize,
    pub clip_index: usize,
    pub coord_index: usize,
    pub page_id: u32,
    pub page_file: String,
    pub coords: LayoutRect,
    pub canonical: bool,
}

impl RectRecord {
    pub fn article_key(&self) -> ArticleKey {
        ArticleKey::new(&self.issue, &self.document, self.article_index)
    }

    pub fn crop_file_name(&self) -> String {
        crop_file_name(self.rect_id)
    }
}

pub fn crop_file_name(rect_id: RectId) -> String {
    format!("{rect_id}.png")
}

/// Canonical rectangle list of one article, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleEntry {
    pub key: ArticleKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub rect_ids: Vec<RectId>,
}

/// Crop files regrouped under one article directory, in stacking order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleImages {
    pub key: ArticleKey,
    pub directory: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleTitle {
    pub key: ArticleKey,
    pub title: String,
}
