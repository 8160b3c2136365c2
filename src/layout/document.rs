//! Delimiter-based reader for `*.articles.xml` layout documents.
//!
//! The documents are only loosely well-formed in practice, so they are cut
//! into `<article>`, `<clip>` and `<coord>` segments instead of being handed
//! to an XML parser.

use thiserror::Error;

use crate::core::geometry::LayoutRect;

/// Clip type tag marking usable content.
pub const USABLE_CONTENT: &str = "uc";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("{document}: coordinate tuple `{raw}` is not four integers")]
    MalformedCoordinates { document: String, raw: String },
    #[error("{document}: <coord> without an inpage attribute: `{raw}`")]
    MissingInpage { document: String, raw: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipFilter {
    UsableContent,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutDocument {
    pub name: String,
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub index: usize,
    pub label: Option<String>,
    pub clips: Vec<Clip>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clip {
    pub kind: Option<String>,
    pub rects: Vec<ClipRect>,
}

/// One `<coord>`: a rectangle plus the raw `inpage` value it declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipRect {
    pub inpage: String,
    pub rect: LayoutRect,
}

impl LayoutDocument {
    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self, LayoutError> {
        let name = name.into();
        let mut articles = Vec::new();

        for (index, article) in elements(text, "article").into_iter().enumerate() {
            let label = elements(article.body, "id")
                .into_iter()
                .next()
                .map(|id| id.body.trim().to_string())
                .filter(|id| !id.is_empty());

            let mut clips = Vec::new();
            for clip in elements(article.body, "clip") {
                let kind = attribute(clip.attrs, "type").map(str::to_string);
                let mut rects = Vec::new();
                for coord in elements(clip.body, "coord") {
                    rects.push(parse_coord(&name, coord)?);
                }
                clips.push(Clip { kind, rects });
            }

            articles.push(Article {
                index,
                label,
                clips,
            });
        }

        Ok(Self { name, articles })
    }
}

impl Article {
    pub fn clips(&self, filter: ClipFilter) -> impl Iterator<Item = &Clip> + '_ {
        self.clips.iter().filter(move |clip| match filter {
            ClipFilter::All => true,
            ClipFilter::UsableContent => clip.is_usable_content(),
        })
    }
}

impl Clip {
    pub fn is_usable_content(&self) -> bool {
        self.kind.as_deref() == Some(USABLE_CONTENT)
    }
}

#[derive(Debug, Clone, Copy)]
struct Element<'a> {
    attrs: &'a str,
    body: &'a str,
}

/// Every `<tag ...>body</tag` segment of `text`, in order. An unterminated
/// element runs to the end of the text.
fn elements<'a>(text: &'a str, tag: &str) -> Vec<Element<'a>> {
    let open = format!("<{tag}");
    let close = format!("</{tag}");
    let mut found = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        let boundary = after.chars().next();
        if !matches!(boundary, Some(c) if c == '>' || c == '/' || c.is_whitespace()) {
            rest = after;
            continue;
        }

        let Some(tag_end) = after.find('>') else {
            break;
        };
        let attrs = &after[..tag_end];
        if attrs.trim_end().ends_with('/') {
            found.push(Element {
                attrs: attrs.trim_end().trim_end_matches('/'),
                body: "",
            });
            rest = &after[tag_end + 1..];
            continue;
        }

        let content = &after[tag_end + 1..];
        let body_end = content.find(&close).unwrap_or(content.len());
        found.push(Element {
            attrs,
            body: &content[..body_end],
        });
        rest = &content[body_end..];
    }

    found
}

fn attribute<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    let mut rest = attrs;
    while let Some(pos) = rest.find(name) {
        let preceded_by_space = rest[..pos]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace);
        let after = rest[pos + name.len()..].trim_start();
        if let (true, Some(value)) = (preceded_by_space, after.strip_prefix('=')) {
            let value = value.trim_start();
            let quote = value.chars().next()?;
            if quote == '"' || quote == '\'' {
                let inner = &value[1..];
                return inner.find(quote).map(|end| &inner[..end]);
            }
        }
        rest = &rest[pos + name.len()..];
    }
    None
}

fn parse_coord(document: &str, coord: Element<'_>) -> Result<ClipRect, LayoutError> {
    let raw = coord.body.trim();
    let inpage = attribute(coord.attrs, "inpage").ok_or_else(|| LayoutError::MissingInpage {
        document: document.to_string(),
        raw: raw.to_string(),
    })?;

    let malformed = || LayoutError::MalformedCoordinates {
        document: document.to_string(),
        raw: raw.to_string(),
    };
    let values = raw
        .split(':')
        .map(|part| part.trim().parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| malformed())?;
    let &[x, y, width, height] = values.as_slice() else {
        return Err(malformed());
    };

    Ok(ClipRect {
        inpage: inpage.trim().to_string(),
        rect: LayoutRect::new(x, y, width, height),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = "<?xml version=\"1.0\"?>\r\n\
<page id=\"1\" unit=\"pixel\">\r\n\
  <article>\r\n\
    <id>DIVL11</id>\r\n\
    <title></title>\r\n\
    <type>ARTICLE</type>\r\n\
    <clip type=\"normal\">\r\n\
      <coord inpage=\"1\">425:619:210:20</coord>\r\n\
    </clip>\r\n\
    <clip type=\"uc\">\r\n\
      <coord inpage=\"1\">185:666:687:202</coord>\r\n\
      <coord inpage=\"2\"> 178 : 915 :668:47 </coord>\r\n\
    </clip>\r\n\
  </article>\r\n\
  <article>\r\n\
    <id></id>\r\n\
    <clip type=\"uc\"><coord inpage=\"3\">1:2:3:4</coord></clip>\r\n\
  </article>\r\n\
</page>\r\n";

    #[test]
    fn parses_articles_clips_and_coords() {
        let doc = LayoutDocument::parse("1.articles.xml", PAGE).unwrap();
        assert_eq!(doc.articles.len(), 2);

        let first = &doc.articles[0];
        assert_eq!(first.index, 0);
        assert_eq!(first.label.as_deref(), Some("DIVL11"));
        assert_eq!(first.clips.len(), 2);

        let usable: Vec<_> = first.clips(ClipFilter::UsableContent).collect();
        assert_eq!(usable.len(), 1);
        assert_eq!(
            usable[0].rects,
            vec![
                ClipRect {
                    inpage: "1".to_string(),
                    rect: LayoutRect::new(185, 666, 687, 202),
                },
                ClipRect {
                    inpage: "2".to_string(),
                    rect: LayoutRect::new(178, 915, 668, 47),
                },
            ]
        );

        let second = &doc.articles[1];
        assert_eq!(second.label, None);
        assert_eq!(second.clips(ClipFilter::All).count(), 1);
        assert_eq!(second.clips[0].rects[0].rect, LayoutRect::new(1, 2, 3, 4));
    }

    #[test]
    fn ignores_tags_sharing_a_prefix() {
        let text = "<articles><article><clip type=\"uc\"><coordinate/></clip></article></articles>";
        let doc = LayoutDocument::parse("x", text).unwrap();
        assert_eq!(doc.articles.len(), 1);
        assert!(doc.articles[0].clips[0].rects.is_empty());
    }

    #[test]
    fn malformed_tuple_is_rejected() {
        let text = "<article><clip type=\"uc\"><coord inpage=\"1\">1:2:x:4</coord></clip></article>";
        let err = LayoutDocument::parse("5.articles.xml", text).unwrap_err();
        assert_eq!(
            err,
            LayoutError::MalformedCoordinates {
                document: "5.articles.xml".to_string(),
                raw: "1:2:x:4".to_string(),
            }
        );

        let short = "<article><clip type=\"uc\"><coord inpage=\"1\">1:2:3</coord></clip></article>";
        assert!(matches!(
            LayoutDocument::parse("5.articles.xml", short),
            Err(LayoutError::MalformedCoordinates { .. })
        ));
    }

    #[test]
    fn coord_without_inpage_is_rejected() {
        let text = "<article><clip type=\"uc\"><coord>1:2:3:4</coord></clip></article>";
        assert!(matches!(
            LayoutDocument::parse("5.articles.xml", text),
            Err(LayoutError::MissingInpage { .. })
        ));
    }

    #[test]
    fn reads_single_quoted_attributes() {
        assert_eq!(attribute(" type='uc' id=\"2\"", "type"), Some("uc"));
        assert_eq!(attribute(" subtype=\"x\" type=\"uc\"", "type"), Some("uc"));
        assert_eq!(attribute(" id=\"2\"", "type"), None);
    }
}
