//! Validation shared by posts and group messages: a body made of optional
//! text, image and video parts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_TEXT_CHARS: usize = 5000;
pub const MAX_URL_CHARS: usize = 500;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "avi", "mkv"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("content must include text, an image or a video")]
    EmptyContent,

    #[error("text is longer than {MAX_TEXT_CHARS} characters")]
    TextTooLong,

    #[error("url is longer than {MAX_URL_CHARS} characters")]
    UrlTooLong,

    #[error("image must be a jpg, jpeg, png or gif")]
    InvalidImage,

    #[error("video must be an mp4, mov, webm, avi or mkv")]
    InvalidVideo,
}

/// How an edit treats an existing media reference.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MediaEdit {
    #[default]
    Keep,
    Replace(String),
    Remove,
}

impl MediaEdit {
    pub fn apply(self, current: Option<String>) -> Option<String> {
        match self {
            MediaEdit::Keep => current,
            MediaEdit::Replace(url) => Some(url),
            MediaEdit::Remove => None,
        }
    }
}

/// A validated, trimmed body. At least one part is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBody {
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

impl ContentBody {
    pub fn new(
        text: Option<String>,
        image_url: Option<String>,
        video_url: Option<String>,
    ) -> Result<Self, ContentError> {
        let text = non_blank(text);
        let image_url = non_blank(image_url);
        let video_url = non_blank(video_url);

        if text.is_none() && image_url.is_none() && video_url.is_none() {
            return Err(ContentError::EmptyContent);
        }

        if let Some(text) = &text {
            if text.chars().count() > MAX_TEXT_CHARS {
                return Err(ContentError::TextTooLong);
            }
        }

        if let Some(url) = &image_url {
            check_url(url, IMAGE_EXTENSIONS, ContentError::InvalidImage)?;
        }

        if let Some(url) = &video_url {
            check_url(url, VIDEO_EXTENSIONS, ContentError::InvalidVideo)?;
        }

        Ok(Self {
            text,
            image_url,
            video_url,
        })
    }
}

/// Checks a standalone image reference such as an avatar.
pub fn validate_image_url(url: &str) -> Result<(), ContentError> {
    check_url(url, IMAGE_EXTENSIONS, ContentError::InvalidImage)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_url(url: &str, extensions: &[&str], invalid: ContentError) -> Result<(), ContentError> {
    if url.chars().count() > MAX_URL_CHARS {
        return Err(ContentError::UrlTooLong);
    }

    // Ignore any query string or fragment
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.contains('/'));

    match extension {
        Some(ext) if extensions.contains(&ext.as_str()) => Ok(()),
        _ => Err(invalid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn blank_parts_are_dropped() {
        let body = ContentBody::new(s("  hi  "), s("   "), None).unwrap();
        assert_eq!(body.text.as_deref(), Some("hi"));
        assert_eq!(body.image_url, None);
    }

    #[test]
    fn all_blank_is_empty() {
        assert_eq!(
            ContentBody::new(s(" "), None, s("")),
            Err(ContentError::EmptyContent)
        );
    }

    #[test]
    fn text_limit_counts_characters() {
        let at_limit = "é".repeat(MAX_TEXT_CHARS);
        assert!(ContentBody::new(Some(at_limit), None, None).is_ok());

        let over = "a".repeat(MAX_TEXT_CHARS + 1);
        assert_eq!(
            ContentBody::new(Some(over), None, None),
            Err(ContentError::TextTooLong)
        );
    }

    #[test]
    fn media_extensions_are_checked() {
        assert!(ContentBody::new(None, s("https://cdn.example.com/a.PNG"), None).is_ok());
        assert!(ContentBody::new(None, s("https://cdn.example.com/a.jpeg?w=200"), None).is_ok());
        assert!(ContentBody::new(None, None, s("/media/clip.mkv")).is_ok());

        assert_eq!(
            ContentBody::new(None, s("https://cdn.example.com/a.mp4"), None),
            Err(ContentError::InvalidImage)
        );
        assert_eq!(
            ContentBody::new(None, None, s("https://example.com/watch")),
            Err(ContentError::InvalidVideo)
        );
        assert_eq!(
            ContentBody::new(None, s("https://example.com/v1.2/picture"), None),
            Err(ContentError::InvalidImage)
        );
    }

    #[test]
    fn long_urls_are_rejected() {
        let url = format!("https://example.com/{}.png", "a".repeat(MAX_URL_CHARS));
        assert_eq!(
            ContentBody::new(None, Some(url), None),
            Err(ContentError::UrlTooLong)
        );
    }

    #[test]
    fn media_edit_applies() {
        let current = s("a.png");
        assert_eq!(MediaEdit::Keep.apply(current.clone()), current);
        assert_eq!(MediaEdit::Remove.apply(current.clone()), None);
        assert_eq!(MediaEdit::Replace("b.png".into()).apply(current), s("b.png"));
    }
}
