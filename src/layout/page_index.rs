use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Optional per-issue manifest listing page images in display order.
pub const MANIFEST_FILE: &str = "index.cpd";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("page `{0}` is not part of the issue")]
    UnknownPage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexSource {
    Manifest,
    Positional,
}

/// Bidirectional page id <-> image filename map for one issue. Ids are
/// 1-based display positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageIndex {
    source: IndexSource,
    by_id: BTreeMap<u32, String>,
    by_file: BTreeMap<String, u32>,
}

impl PageIndex {
    fn from_ordered(source: IndexSource, files: Vec<String>) -> Self {
        let mut by_id = BTreeMap::new();
        let mut by_file = BTreeMap::new();
        for file in files {
            if by_file.contains_key(&file) {
                warn!(file = %file, "page listed twice; keeping first position");
                continue;
            }
            let id = by_id.len() as u32 + 1;
            by_file.insert(file.clone(), id);
            by_id.insert(id, file);
        }
        Self {
            source,
            by_id,
            by_file,
        }
    }

    /// Ids follow the manifest order.
    pub fn from_manifest(text: &str) -> Result<Self> {
        Ok(Self::from_ordered(
            IndexSource::Manifest,
            parse_manifest(text)?,
        ))
    }

    /// Ids follow the numeric value of each filename's stem. Files whose stem
    /// is not a number are ignored.
    pub fn from_filenames<I, S>(filenames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut numbered: Vec<(u64, String)> = Vec::new();
        for name in filenames {
            let name = name.into();
            let stem = Path::new(&name)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default();
            match stem.parse::<u64>() {
                Ok(number) => numbered.push((number, name)),
                Err(_) => warn!(file = %name, "page image without numeric stem ignored"),
            }
        }
        numbered.sort();
        Self::from_ordered(
            IndexSource::Positional,
            numbered.into_iter().map(|(_, name)| name).collect(),
        )
    }

    /// Reads `index.cpd` from `issue_dir` when present, otherwise infers ids
    /// from `page_files`.
    pub fn load(issue_dir: &Path, page_files: &[String]) -> Result<Self> {
        let manifest = issue_dir.join(MANIFEST_FILE);
        if manifest.is_file() {
            let text = fs::read_to_string(&manifest)
                .with_context(|| format!("failed to read {}", manifest.display()))?;
            return Self::from_manifest(&text)
                .with_context(|| format!("failed to parse {}", manifest.display()));
        }
        Ok(Self::from_filenames(page_files.iter().cloned()))
    }

    pub fn source(&self) -> IndexSource {
        self.source
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn filename(&self, page_id: u32) -> Result<&str, ResolveError> {
        self.by_id
            .get(&page_id)
            .map(String::as_str)
            .ok_or_else(|| ResolveError::UnknownPage(page_id.to_string()))
    }

    /// Resolves a raw `inpage` value.
    pub fn resolve(&self, inpage: &str) -> Result<(u32, &str), ResolveError> {
        let page_id = inpage
            .trim()
            .parse::<u32>()
            .map_err(|_| ResolveError::UnknownPage(inpage.to_string()))?;
        self.filename(page_id).map(|file| (page_id, file))
    }

    pub fn page_id(&self, filename: &str) -> Option<u32> {
        self.by_file.get(filename).copied()
    }

    /// Image file whose stem is `stem`, e.g. the page a layout document
    /// `3.articles.xml` describes.
    pub fn filename_for_stem(&self, stem: &str) -> Option<&str> {
        self.by_file
            .keys()
            .find(|file| Path::new(file).file_stem().and_then(|s| s.to_str()) == Some(stem))
            .map(String::as_str)
    }

    pub fn pages(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.by_id.iter().map(|(id, file)| (*id, file.as_str()))
    }
}

/// Collects the `<pagefile>` of every `<page>` in document order.
fn parse_manifest(text: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut files = Vec::new();
    let mut in_pagefile = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"pagefile" => in_pagefile = true,
            Ok(Event::End(e)) if e.name().as_ref() == b"pagefile" => in_pagefile = false,
            Ok(Event::Text(t)) if in_pagefile => {
                let file = t.unescape().context("invalid text in <pagefile>")?;
                let file = file.trim();
                if !file.is_empty() {
                    files.push(file.to_string());
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                anyhow::bail!(
                    "manifest XML error at byte {}: {err}",
                    reader.buffer_position()
                )
            }
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MANIFEST: &str = r#"<?xml version="1.0"?>
<cpd>
  <type>Document</type>
  <page>
    <pagetitle>Page 1</pagetitle>
    <pagefile>1.jp2</pagefile>
    <pageptr>+</pageptr>
  </page>
  <page>
    <pagetitle>Page 2</pagetitle>
    <pagefile>5.jp2</pagefile>
    <pageptr>+</pageptr>
  </page>
</cpd>"#;

    fn assert_bijection(index: &PageIndex) {
        for (id, file) in index.pages() {
            assert_eq!(index.page_id(file), Some(id));
            assert_eq!(index.filename(id), Ok(file));
        }
        assert_eq!(index.by_id.len(), index.by_file.len());
    }

    #[test]
    fn manifest_order_assigns_ids() {
        let index = PageIndex::from_manifest(MANIFEST).unwrap();
        assert_eq!(index.source(), IndexSource::Manifest);
        assert_eq!(index.filename(1), Ok("1.jp2"));
        assert_eq!(index.filename(2), Ok("5.jp2"));
        assert_eq!(index.page_id("5.jp2"), Some(2));
        assert_bijection(&index);
    }

    #[test]
    fn positional_ids_sort_numerically() {
        let index = PageIndex::from_filenames(["28.jp2", "6.jp2", "1.jp2", "cover.jp2"]);
        assert_eq!(index.source(), IndexSource::Positional);
        assert_eq!(
            index.pages().collect::<Vec<_>>(),
            vec![(1, "1.jp2"), (2, "6.jp2"), (3, "28.jp2")]
        );
        assert_bijection(&index);
    }

    #[test]
    fn unknown_pages_are_recoverable_errors() {
        let index = PageIndex::from_filenames(["1.jp2", "2.jp2"]);
        assert_eq!(index.resolve("2"), Ok((2, "2.jp2")));
        assert_eq!(
            index.resolve("3"),
            Err(ResolveError::UnknownPage("3".to_string()))
        );
        assert_eq!(
            index.resolve("0"),
            Err(ResolveError::UnknownPage("0".to_string()))
        );
        assert_eq!(
            index.resolve("two"),
            Err(ResolveError::UnknownPage("two".to_string()))
        );
    }

    #[test]
    fn duplicate_manifest_entries_keep_ids_dense() {
        let text = "<cpd><page><pagefile>3.jp2</pagefile></page>\
                    <page><pagefile>3.jp2</pagefile></page>\
                    <page><pagefile>7.jp2</pagefile></page></cpd>";
        let index = PageIndex::from_manifest(text).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.filename(2), Ok("7.jp2"));
        assert_bijection(&index);
    }

    #[test]
    fn finds_page_for_document_stem() {
        let index = PageIndex::from_filenames(["3.jp2", "7.jp2"]);
        assert_eq!(index.filename_for_stem("7"), Some("7.jp2"));
        assert_eq!(index.filename_for_stem("9"), None);
    }
}
