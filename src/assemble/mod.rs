pub mod table;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::core::model::{document_stem, ArticleKey, RectId, RectRecord};
use crate::layout::{ClipFilter, Issue, LayoutDocument, PageIndex};

pub use table::{Assembly, AssemblyError, UnresolvedRect};

/// Hands out rect ids for a whole run. Ids are never reused, so one
/// allocator must be threaded through every issue.
#[derive(Debug, Default)]
pub struct RectIdAllocator {
    next: RectId,
}

impl RectIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> RectId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next
    }
}

/// Walks layout documents and records every resolvable rectangle.
///
/// Articles split over several pages are described again in the document of
/// each page they touch. When the first rectangle of a clip lies on a page
/// other than the one the document describes, the article was already
/// registered from an earlier document: its rectangles are still queued for
/// cropping, but no longer appended to the article's canonical list.
#[derive(Debug, Clone)]
pub struct Assembler {
    filter: ClipFilter,
}

impl Default for Assembler {
    fn default() -> Self {
        Self {
            filter: ClipFilter::UsableContent,
        }
    }
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: ClipFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Assembles every issue in order with one shared id allocator.
    pub fn assemble_all(&self, issues: &[Issue]) -> Result<Assembly> {
        let mut ids = RectIdAllocator::new();
        let mut assembly = Assembly::new();
        for issue in issues {
            self.assemble_issue(issue, &mut ids, &mut assembly)?;
        }
        info!(
            issues = issues.len(),
            rects = ids.issued(),
            articles = assembly.articles().len(),
            unresolved = assembly.unresolved().len(),
            "assembled layout"
        );
        Ok(assembly)
    }

    /// Reads and assembles every layout document of `issue`. A malformed
    /// document aborts with an error.
    pub fn assemble_issue(&self, issue: &Issue, ids: &mut RectIdAllocator, assembly: &mut Assembly) -> Result<()> {
        let documents = issue
            .documents
            .iter()
            .map(|document| issue.read_document(document))
            .collect::<Result<Vec<_>>>()?;
        self.assemble_documents(&issue.name, &issue.pages, &documents, ids, assembly);
        Ok(())
    }

    pub fn assemble_documents(
        &self,
        issue: &str,
        pages: &PageIndex,
        documents: &[LayoutDocument],
        ids: &mut RectIdAllocator,
        assembly: &mut Assembly,
    ) {
        for document in documents {
            let document_page = pages.filename_for_stem(document_stem(&document.name));
            if document_page.is_none() {
                warn!(issue, document = %document.name, "no page image matches layout document");
            }

            for article in &document.articles {
                let key = ArticleKey::new(issue, &document.name, article.index);
                let mut continuation = false;

                for (clip_index, clip) in article.clips(self.filter).enumerate() {
                    for (coord_index, coord) in clip.rects.iter().enumerate() {
                        let (page_id, page_file) = match pages.resolve(&coord.inpage) {
                            Ok(resolved) => resolved,
                            Err(err) => {
                                warn!(article = %key, error = %err, "skipping rect");
                                assembly.push_unresolved(UnresolvedRect {
                                    issue: issue.to_string(),
                                    document: document.name.clone(),
                                    article_index: article.index,
                                    inpage: coord.inpage.clone(),
                                });
                                continue;
                            }
                        };

                        if coord_index == 0 && document_page != Some(page_file) {
                            continuation = true;
                        }

                        let rect_id = ids.next_id();
                        debug!(article = %key, rect_id, page = page_file, continuation, "rect");
                        assembly.push(
                            RectRecord {
                                rect_id,
                                issue: issue.to_string(),
                                document: document.name.clone(),
                                article_index: article.index,
                                clip_index,
                                coord_index,
                                page_id,
                                page_file: page_file.to_string(),
                                coords: coord.rect,
                                canonical: !continuation,
                            },
                            article.label.as_deref(),
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::core::geometry::LayoutRect;
    use pretty_assertions::assert_eq;

    fn coord(inpage: u32, n: i64) -> String {
        format!("<coord inpage=\"{inpage}\">{n}:{n}:10:10</coord>\n")
    }

    fn article(coords: &[(u32, i64)]) -> String {
        let body: String = coords.iter().map(|(page, n)| coord(*page, *n)).collect();
        format!("<article><id>A</id><clip type=\"uc\">\n{body}</clip></article>\n")
    }

    fn document(name: &str, articles: &[&[(u32, i64)]]) -> LayoutDocument {
        let text: String = articles.iter().map(|coords| article(coords)).collect();
        LayoutDocument::parse(name, &format!("<page>{text}</page>")).unwrap()
    }

    fn run(pages: &PageIndex, documents: &[LayoutDocument]) -> Assembly {
        let mut ids = RectIdAllocator::new();
        let mut assembly = Assembly::new();
        Assembler::new().assemble_documents("issue", pages, documents, &mut ids, &mut assembly);
        assert_eq!(ids.issued(), assembly.records().len() as u64);
        assembly
    }

    #[test]
    fn manifest_pages_and_split_article() {
        // 3.img is page 1, 7.img is page 2
        let pages = PageIndex::from_manifest(
            "<cpd><page><pagefile>3.img</pagefile></page><page><pagefile>7.img</pagefile></page></cpd>",
        )
        .unwrap();
        let docs = vec![document("3.articles.xml", &[&[(1, 100), (2, 200)]])];

        let assembly = run(&pages, &docs);

        let records = assembly.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].page_file, "3.img");
        assert_eq!(records[1].page_file, "7.img");
        assert!(records.iter().all(|r| r.canonical));
        assert_eq!(assembly.articles()[0].rect_ids, vec![0, 1]);
        assert_eq!(assembly.crop_queue("issue")["7.img"][0].coords, LayoutRect::new(200, 200, 10, 10));
    }

    #[test]
    fn continuation_is_queued_but_not_listed() {
        let pages = PageIndex::from_filenames(["1.jp2", "2.jp2"]);
        let docs = vec![
            // article 0 starts on page 1 and continues on page 2
            document("1.articles.xml", &[&[(1, 1), (2, 2)]]),
            // page 2 repeats it, starting with its page 1 part
            document("2.articles.xml", &[&[(1, 1), (2, 2)], &[(2, 3)]]),
        ];

        let assembly = run(&pages, &docs);

        assert_eq!(assembly.records().len(), 5);
        let ids: BTreeSet<_> = assembly.records().iter().map(|r| r.rect_id).collect();
        assert_eq!(ids.len(), 5);

        let listed: Vec<_> = assembly
            .articles()
            .iter()
            .map(|entry| (entry.key.document.as_str(), entry.key.article_index, entry.rect_ids.clone()))
            .collect();
        assert_eq!(
            listed,
            vec![("1.articles.xml", 0, vec![0, 1]), ("2.articles.xml", 1, vec![4])]
        );

        // the repeated occurrences are still queued on their pages
        let queue = assembly.crop_queue("issue");
        assert_eq!(queue["1.jp2"].iter().map(|r| r.rect_id).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(queue["2.jp2"].iter().map(|r| r.rect_id).collect::<Vec<_>>(), vec![1, 3, 4]);

        // every canonical rect appears in exactly one article list
        let mut seen = BTreeSet::new();
        for entry in assembly.articles() {
            for rect_id in &entry.rect_ids {
                assert!(seen.insert(*rect_id));
            }
        }
        assert!(assembly.validate().is_ok());
    }

    #[test]
    fn unknown_pages_are_skipped_without_consuming_ids() {
        let pages = PageIndex::from_filenames(["1.jp2"]);
        let docs = vec![document("1.articles.xml", &[&[(1, 1), (9, 2), (1, 3)]])];

        let assembly = run(&pages, &docs);

        assert_eq!(assembly.records().iter().map(|r| r.rect_id).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(assembly.records()[1].coord_index, 2);
        assert_eq!(
            assembly.unresolved(),
            &[UnresolvedRect {
                issue: "issue".to_string(),
                document: "1.articles.xml".to_string(),
                article_index: 0,
                inpage: "9".to_string(),
            }]
        );
    }

    #[test]
    fn unfiltered_assembly_reads_every_clip() {
        let pages = PageIndex::from_filenames(["1.jp2"]);
        let text = "<article><clip type=\"normal\"><coord inpage=\"1\">1:1:1:1</coord></clip>\
                    <clip type=\"uc\"><coord inpage=\"1\">2:2:2:2</coord></clip></article>";
        let docs = vec![LayoutDocument::parse("1.articles.xml", text).unwrap()];

        let mut ids = RectIdAllocator::new();
        let mut assembly = Assembly::new();
        Assembler::new()
            .with_filter(ClipFilter::All)
            .assemble_documents("issue", &pages, &docs, &mut ids, &mut assembly);
        assert_eq!(assembly.records().len(), 2);

        let filtered = run(&pages, &docs);
        assert_eq!(filtered.records().len(), 1);
        assert_eq!(filtered.records()[0].coords, LayoutRect::new(2, 2, 2, 2));
    }

    #[test]
    fn ids_keep_counting_across_issues() {
        let pages = PageIndex::from_filenames(["1.jp2"]);
        let docs = vec![document("1.articles.xml", &[&[(1, 1)]])];

        let mut ids = RectIdAllocator::new();
        let mut assembly = Assembly::new();
        let assembler = Assembler::new();
        assembler.assemble_documents("first", &pages, &docs, &mut ids, &mut assembly);
        assembler.assemble_documents("second", &pages, &docs, &mut ids, &mut assembly);

        assert_eq!(assembly.records()[1].issue, "second");
        assert_eq!(assembly.records()[1].rect_id, 1);
        assert_eq!(assembly.issues(), vec!["first", "second"]);
    }

    #[test]
    fn document_without_its_page_lists_nothing() {
        let pages = PageIndex::from_filenames(["1.jp2", "2.jp2"]);
        // no 9.* page image exists
        let docs = vec![document("9.articles.xml", &[&[(1, 1), (2, 2)], &[(2, 3)]])];

        let assembly = run(&pages, &docs);

        assert_eq!(assembly.records().len(), 3);
        assert!(assembly.records().iter().all(|r| !r.canonical));
        assert!(assembly.articles().is_empty());
        assert_eq!(assembly.crop_queue("issue")["2.jp2"].len(), 2);
        assert!(assembly.validate().is_ok());
    }
}
