use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::model::{ArticleEntry, ArticleKey, RectId, RectRecord};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    #[error("rect id {0} is not strictly increasing")]
    RectIdOrder(RectId),
    #[error("article {key} lists rect {rect_id}, which is not in the crop queue")]
    UnknownRect { key: ArticleKey, rect_id: RectId },
    #[error("article {key} lists rect {rect_id}, which is not a canonical rect of that article")]
    ForeignRect { key: ArticleKey, rect_id: RectId },
    #[error("canonical rect {0} is missing from its article's list")]
    UnlistedRect(RectId),
}

/// A `<coord>` whose `inpage` could not be resolved to a page image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedRect {
    pub issue: String,
    pub document: String,
    pub article_index: usize,
    pub inpage: String,
}

/// Flat table of every resolved rectangle plus the per-article index of
/// canonical rect ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assembly {
    records: Vec<RectRecord>,
    articles: Vec<ArticleEntry>,
    unresolved: Vec<UnresolvedRect>,
    article_positions: HashMap<ArticleKey, usize>,
}

impl Assembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds an assembly from its two persisted halves.
    pub fn from_parts(records: Vec<RectRecord>, articles: Vec<ArticleEntry>) -> Result<Self, AssemblyError> {
        let mut assembly = Self {
            records,
            articles,
            unresolved: Vec::new(),
            article_positions: HashMap::new(),
        };
        assembly.reindex();
        assembly.validate()?;
        Ok(assembly)
    }

    fn reindex(&mut self) {
        self.article_positions = self
            .articles
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.key.clone(), position))
            .collect();
    }

    pub fn push(&mut self, record: RectRecord, label: Option<&str>) {
        if record.canonical {
            let key = record.article_key();
            let position = match self.article_positions.get(&key) {
                Some(position) => *position,
                None => {
                    self.articles.push(ArticleEntry {
                        key: key.clone(),
                        label: label.map(str::to_string),
                        rect_ids: Vec::new(),
                    });
                    self.article_positions.insert(key, self.articles.len() - 1);
                    self.articles.len() - 1
                }
            };
            self.articles[position].rect_ids.push(record.rect_id);
        }
        self.records.push(record);
    }

    pub fn push_unresolved(&mut self, unresolved: UnresolvedRect) {
        self.unresolved.push(unresolved);
    }

    /// Every queued rectangle, ordered by rect id.
    pub fn records(&self) -> &[RectRecord] {
        &self.records
    }

    /// Canonical article lists, in registration order.
    pub fn articles(&self) -> &[ArticleEntry] {
        &self.articles
    }

    pub fn unresolved(&self) -> &[UnresolvedRect] {
        &self.unresolved
    }

    pub fn record(&self, rect_id: RectId) -> Option<&RectRecord> {
        self.records
            .binary_search_by_key(&rect_id, |record| record.rect_id)
            .ok()
            .map(|position| &self.records[position])
    }

    pub fn article(&self, key: &ArticleKey) -> Option<&ArticleEntry> {
        self.article_positions
            .get(key)
            .map(|position| &self.articles[*position])
    }

    /// Distinct issue names with queued rectangles, sorted.
    pub fn issues(&self) -> Vec<&str> {
        self.records
            .iter()
            .map(|record| record.issue.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Queued rectangles of one issue grouped by page image, each group in
    /// rect id order.
    pub fn crop_queue(&self, issue: &str) -> BTreeMap<&str, Vec<&RectRecord>> {
        let mut queue: BTreeMap<&str, Vec<&RectRecord>> = BTreeMap::new();
        for record in self.records.iter().filter(|record| record.issue == issue) {
            queue.entry(record.page_file.as_str()).or_default().push(record);
        }
        queue
    }

    pub fn articles_in(&self, issue: &str) -> impl Iterator<Item = &ArticleEntry> + '_ {
        let issue = issue.to_string();
        self.articles
            .iter()
            .filter(move |entry| entry.key.issue == issue)
    }

    pub fn validate(&self) -> Result<(), AssemblyError> {
        for pair in self.records.windows(2) {
            if pair[1].rect_id <= pair[0].rect_id {
                return Err(AssemblyError::RectIdOrder(pair[1].rect_id));
            }
        }

        let mut listed = BTreeSet::new();
        for entry in &self.articles {
            for rect_id in &entry.rect_ids {
                let record = self.record(*rect_id).ok_or_else(|| AssemblyError::UnknownRect {
                    key: entry.key.clone(),
                    rect_id: *rect_id,
                })?;
                if !record.canonical || record.article_key() != entry.key || !listed.insert(*rect_id) {
                    return Err(AssemblyError::ForeignRect {
                        key: entry.key.clone(),
                        rect_id: *rect_id,
                    });
                }
            }
        }

        if let Some(record) = self
            .records
            .iter()
            .find(|record| record.canonical && !listed.contains(&record.rect_id))
        {
            return Err(AssemblyError::UnlistedRect(record.rect_id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::LayoutRect;
    use pretty_assertions::assert_eq;

    fn record(rect_id: RectId, article_index: usize, page_file: &str, canonical: bool) -> RectRecord {
        RectRecord {
            rect_id,
            issue: "issue".to_string(),
            document: "1.articles.xml".to_string(),
            article_index,
            clip_index: 0,
            coord_index: 0,
            page_id: 1,
            page_file: page_file.to_string(),
            coords: LayoutRect::new(0, 0, 1, 1),
            canonical,
        }
    }

    #[test]
    fn canonical_records_are_indexed_per_article() {
        let mut assembly = Assembly::new();
        assembly.push(record(0, 0, "1.jp2", true), Some("DIVL1"));
        assembly.push(record(1, 0, "2.jp2", true), Some("DIVL1"));
        assembly.push(record(2, 1, "2.jp2", false), None);

        assert_eq!(assembly.articles().len(), 1);
        let entry = &assembly.articles()[0];
        assert_eq!(entry.rect_ids, vec![0, 1]);
        assert_eq!(entry.label.as_deref(), Some("DIVL1"));

        let queue = assembly.crop_queue("issue");
        assert_eq!(queue["1.jp2"].len(), 1);
        assert_eq!(
            queue["2.jp2"].iter().map(|r| r.rect_id).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(assembly.validate().is_ok());
    }

    #[test]
    fn rebuilt_assembly_is_validated() {
        let records = vec![record(0, 0, "1.jp2", true)];
        let bad = vec![ArticleEntry {
            key: ArticleKey::new("issue", "1.articles.xml", 0),
            label: None,
            rect_ids: vec![0, 9],
        }];
        assert_eq!(
            Assembly::from_parts(records.clone(), bad),
            Err(AssemblyError::UnknownRect {
                key: ArticleKey::new("issue", "1.articles.xml", 0),
                rect_id: 9,
            })
        );

        assert_eq!(
            Assembly::from_parts(records, Vec::new()),
            Err(AssemblyError::UnlistedRect(0))
        );
    }

    #[test]
    fn out_of_order_ids_are_rejected() {
        let records = vec![record(3, 0, "1.jp2", false), record(3, 1, "1.jp2", false)];
        assert_eq!(
            Assembly::from_parts(records, Vec::new()),
            Err(AssemblyError::RectIdOrder(3))
        );
    }
}
