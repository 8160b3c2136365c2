use image::{imageops, GrayImage, Luma};
use thiserror::Error;

use crate::core::model::ArticleKey;

pub const BACKGROUND: u8 = 255;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositeError {
    #[error("article {0} has no crops to stack")]
    EmptyArticle(ArticleKey),
}

/// Stacks `crops` top to bottom, left-aligned, on a white canvas as wide as
/// the widest crop.
pub fn build(key: &ArticleKey, crops: &[GrayImage]) -> Result<GrayImage, CompositeError> {
    if crops.is_empty() {
        return Err(CompositeError::EmptyArticle(key.clone()));
    }

    let height: u32 = crops.iter().map(|crop| crop.height()).sum();
    let width = crops.iter().map(|crop| crop.width()).max().unwrap_or(0);

    let mut canvas = GrayImage::from_pixel(width, height, Luma([BACKGROUND]));
    let mut offset = 0u32;
    for crop in crops {
        imageops::replace(&mut canvas, crop, 0, i64::from(offset));
        offset += crop.height();
    }

    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key() -> ArticleKey {
        ArticleKey::new("issue", "1.articles.xml", 0)
    }

    #[test]
    fn stacks_in_order_on_white_background() {
        let first = GrayImage::from_pixel(4, 2, Luma([10]));
        let second = GrayImage::from_pixel(7, 3, Luma([20]));

        let composite = build(&key(), &[first, second]).unwrap();

        assert_eq!(composite.dimensions(), (7, 5));
        assert_eq!(composite.get_pixel(0, 0).0[0], 10);
        assert_eq!(composite.get_pixel(3, 1).0[0], 10);
        // right of the narrower first crop
        assert_eq!(composite.get_pixel(4, 0).0[0], BACKGROUND);
        assert_eq!(composite.get_pixel(6, 1).0[0], BACKGROUND);
        assert_eq!(composite.get_pixel(0, 2).0[0], 20);
        assert_eq!(composite.get_pixel(6, 4).0[0], 20);
    }

    #[test]
    fn empty_article_is_an_error() {
        let err = build(&key(), &[]).unwrap_err();
        assert_eq!(err, CompositeError::EmptyArticle(key()));
    }
}
