use std::fmt;

use serde::{Deserialize, Serialize};

use crate::atlas::border::BakedBorder;

/// Identifies one requested image: its source, plus the border signature
/// when a border is baked into the packed pixels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageKey(String);

impl ImageKey {
    pub fn new(source: &str, border: Option<&BakedBorder>) -> Self {
        match border {
            Some(border) => Self(format!("{}{}", source, border.signature())),
            None => Self(source.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageKey {
    fn from(source: &str) -> Self {
        Self(source.to_string())
    }
}

/// Everything the loader needs to fetch an image and pack it later.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub key: ImageKey,
    pub source: String,
    pub border: Option<BakedBorder>,
}

impl ImageRequest {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            key: ImageKey::new(&source, None),
            source,
            border: None,
        }
    }

    pub fn with_border(source: impl Into<String>, border: BakedBorder) -> Self {
        let source = source.into();
        Self {
            key: ImageKey::new(&source, Some(&border)),
            source,
            border: Some(border),
        }
    }

    /// Request with an explicit key, for callers that already derived one.
    pub fn keyed(key: ImageKey, source: impl Into<String>) -> Self {
        Self {
            key,
            source: source.into(),
            border: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::border::BorderWidth;

    #[test]
    fn test_plain_key_is_source() {
        assert_eq!(ImageRequest::new("a.png").key.as_str(), "a.png");
    }

    #[test]
    fn test_border_changes_key() {
        let border = BakedBorder::parse("blue", BorderWidth::Relative(0.1)).unwrap();
        let plain = ImageKey::new("a.png", None);
        let bordered = ImageRequest::with_border("a.png", border).key;
        assert_ne!(plain, bordered);
        assert_eq!(bordered.as_str(), "a.pngblue0.1");
    }
}
