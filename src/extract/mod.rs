//! Content extraction for downloaded files
//!
//! The crawler hands raw bytes and the file's MIME type to a
//! `ContentExtractor` and indexes whatever text comes back. `BasicExtractor`
//! covers plain-text formats and HTML; richer extractors (PDF, office
//! documents) plug in through the same trait.

use scraper::{ElementRef, Html, Node, Selector};
use thiserror::Error;

/// Errors that can occur while extracting text
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unsupported MIME type: {0}")]
    Unsupported(String),

    #[error("Extraction failed: {0}")]
    Failed(String),
}

impl ExtractError {
    pub fn classification(&self) -> &'static str {
        match self {
            Self::Unsupported(_) => "UnsupportedMimeType",
            Self::Failed(_) => "ExtractionFailed",
        }
    }
}

/// Turns file bytes into indexable text
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], mimetype: &str) -> Result<String, ExtractError>;
}

/// Extractor for text-like formats
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicExtractor;

impl ContentExtractor for BasicExtractor {
    fn extract(&self, bytes: &[u8], mimetype: &str) -> Result<String, ExtractError> {
        let essence = mime_essence(mimetype);
        match essence.as_str() {
            "text/html" | "application/xhtml+xml" => {
                Ok(html_to_text(&String::from_utf8_lossy(bytes)))
            }
            "application/json" | "application/xml" => {
                Ok(String::from_utf8_lossy(bytes).into_owned())
            }
            other if other.starts_with("text/") => Ok(String::from_utf8_lossy(bytes).into_owned()),
            _ => Err(ExtractError::Unsupported(mimetype.to_string())),
        }
    }
}

/// Lowercased MIME type without parameters (`text/html; charset=utf-8` -> `text/html`)
fn mime_essence(mimetype: &str) -> String {
    mimetype
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Collects the visible body text of an HTML document
fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let words: Vec<&str> = visible_text(root)
        .into_iter()
        .flat_map(str::split_whitespace)
        .collect();
    words.join(" ")
}

fn visible_text(root: ElementRef<'_>) -> Vec<&str> {
    root.descendants()
        .filter_map(|node| {
            let Node::Text(text) = node.value() else {
                return None;
            };
            let hidden = node
                .parent()
                .and_then(|parent| parent.value().as_element())
                .map(|element| matches!(element.name(), "script" | "style" | "noscript"))
                .unwrap_or(false);
            if hidden {
                None
            } else {
                Some(&**text)
            }
        })
        .collect()
}
