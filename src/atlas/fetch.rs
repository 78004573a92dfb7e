use std::path::PathBuf;

use futures::future::BoxFuture;
use futures::FutureExt;

#[allow(unused_imports)]
use log::{debug, warn};

use crate::error::LoadError;

/// Obtains the raw bytes behind an image source locator.
pub trait ImageFetcher: Send + Sync + 'static {
    fn fetch(&self, source: &str) -> BoxFuture<'static, Result<Vec<u8>, LoadError>>;
}

/// Where a source locator points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    File(PathBuf),
    Http(String),
}

impl SourceLocation {
    pub fn parse(source: &str) -> Result<Self, LoadError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(LoadError::UnsupportedSource(String::new()));
        }
        if source.starts_with("http://") || source.starts_with("https://") {
            return Ok(SourceLocation::Http(source.to_string()));
        }
        if let Some(path) = source.strip_prefix("file://") {
            return Ok(SourceLocation::File(PathBuf::from(path)));
        }
        if source.contains("://") || source.starts_with("data:") {
            return Err(LoadError::UnsupportedSource(source.to_string()));
        }
        Ok(SourceLocation::File(PathBuf::from(source)))
    }
}

/// Reads local paths and `file://` URLs, and `http(s)://` URLs when the
/// `http` feature is enabled.
#[derive(Debug, Clone, Default)]
pub struct SourceFetcher {
    #[cfg(feature = "http")]
    client: reqwest::Client,
}

impl SourceFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageFetcher for SourceFetcher {
    fn fetch(&self, source: &str) -> BoxFuture<'static, Result<Vec<u8>, LoadError>> {
        let location = match SourceLocation::parse(source) {
            Ok(location) => location,
            Err(e) => return futures::future::ready(Err(e)).boxed(),
        };

        match location {
            SourceLocation::File(path) => async move {
                debug!("Reading image file {:?}", path);
                let bytes = tokio::fs::read(&path).await?;
                Ok::<_, LoadError>(bytes)
            }
            .boxed(),
            #[cfg(feature = "http")]
            SourceLocation::Http(url) => {
                let client = self.client.clone();
                async move {
                    debug!("Fetching image {}", url);
                    let response = client
                        .get(&url)
                        .send()
                        .await
                        .and_then(|response| response.error_for_status())
                        .map_err(|e| LoadError::Http(e.to_string()))?;
                    let bytes = response
                        .bytes()
                        .await
                        .map_err(|e| LoadError::Http(e.to_string()))?;
                    Ok::<_, LoadError>(bytes.to_vec())
                }
                .boxed()
            }
            #[cfg(not(feature = "http"))]
            SourceLocation::Http(url) => {
                warn!("Built without the http feature, cannot fetch {}", url);
                futures::future::ready(Err(LoadError::UnsupportedSource(url))).boxed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_locations() {
        assert_eq!(
            SourceLocation::parse("images/a.png").unwrap(),
            SourceLocation::File(PathBuf::from("images/a.png"))
        );
        assert_eq!(
            SourceLocation::parse("file:///tmp/a.png").unwrap(),
            SourceLocation::File(PathBuf::from("/tmp/a.png"))
        );
        assert_eq!(
            SourceLocation::parse("https://example.org/a.jpg").unwrap(),
            SourceLocation::Http("https://example.org/a.jpg".to_string())
        );
        assert!(SourceLocation::parse("").is_err());
        assert!(SourceLocation::parse("ftp://example.org/a.jpg").is_err());
    }

    #[tokio::test]
    async fn test_reads_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"bytes").unwrap();
        let source = file.path().to_string_lossy().to_string();

        let bytes = SourceFetcher::new().fetch(&source).await.unwrap();
        assert_eq!(bytes, b"bytes");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("missing.png").to_string_lossy().to_string();
        let result = SourceFetcher::new().fetch(&source).await;
        assert!(matches!(result, Err(LoadError::Io(_))));
    }
}
