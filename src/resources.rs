//! External resources - images and vector art referenced by card data
//!
//! Fetching is delegated to collaborators. Synchronous ones serve the
//! blocking pipeline, asynchronous ones the concurrent pipeline; `Blocking`
//! lets a synchronous collaborator stand in where an async one is expected.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors reported by fetch collaborators
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("No url provided")]
    NoUrl,

    #[error("No {0} fetcher configured")]
    NotConfigured(&'static str),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Decoded-or-raw image bytes, ready for a renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResource {
    /// Where the bytes came from, if fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl ImageResource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { source: None, data }
    }

    pub fn from_source(source: impl Into<String>, data: Vec<u8>) -> Self {
        Self { source: Some(source.into()), data }
    }
}

/// Loaded vector artwork
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub markup: String,
}

pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<ImageResource, FetchError>;
}

pub trait SvgLoader: Send + Sync {
    fn load_from_url(&self, url: &str) -> Result<VectorGroup, FetchError>;
}

#[async_trait]
pub trait AsyncImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ImageResource, FetchError>;
}

#[async_trait]
pub trait AsyncSvgLoader: Send + Sync {
    async fn load_from_url(&self, url: &str) -> Result<VectorGroup, FetchError>;
}

/// Collaborators available to a blocking render pass
#[derive(Clone, Copy, Default)]
pub struct Fetchers<'a> {
    pub images: Option<&'a dyn ImageFetcher>,
    pub svgs: Option<&'a dyn SvgLoader>,
}

/// Collaborators available to a concurrent render pass
#[derive(Clone, Copy, Default)]
pub struct AsyncFetchers<'a> {
    pub images: Option<&'a dyn AsyncImageFetcher>,
    pub svgs: Option<&'a dyn AsyncSvgLoader>,
}

/// Adapts a synchronous fetcher or loader to the async interface. The call
/// runs inline on the polling task.
pub struct Blocking<T>(pub T);

#[async_trait]
impl<T: ImageFetcher> AsyncImageFetcher for Blocking<T> {
    async fn fetch(&self, url: &str) -> Result<ImageResource, FetchError> {
        self.0.fetch(url)
    }
}

#[async_trait]
impl<T: SvgLoader> AsyncSvgLoader for Blocking<T> {
    async fn load_from_url(&self, url: &str) -> Result<VectorGroup, FetchError> {
        self.0.load_from_url(url)
    }
}

/// Serves `file://` and relative URLs from a directory on disk
#[derive(Debug, Clone)]
pub struct FileResources {
    root: PathBuf,
}

impl FileResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, url: &str) -> Result<PathBuf, FetchError> {
        if url.contains("://") && !url.starts_with("file://") {
            return Err(FetchError::Other(format!("unsupported url scheme: {}", url)));
        }
        let relative = url.trim_start_matches("file://").trim_start_matches('/');
        if Path::new(relative)
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(FetchError::NotFound(url.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn not_found_or_io(url: &str, err: std::io::Error) -> FetchError {
    if err.kind() == std::io::ErrorKind::NotFound {
        FetchError::NotFound(url.to_string())
    } else {
        FetchError::Io(err)
    }
}

#[async_trait]
impl AsyncImageFetcher for FileResources {
    async fn fetch(&self, url: &str) -> Result<ImageResource, FetchError> {
        let path = self.path_for(url)?;
        debug!(%url, path = %path.display(), "reading image");
        let data = tokio::fs::read(&path).await.map_err(|e| not_found_or_io(url, e))?;
        Ok(ImageResource::from_source(url, data))
    }
}

#[async_trait]
impl AsyncSvgLoader for FileResources {
    async fn load_from_url(&self, url: &str) -> Result<VectorGroup, FetchError> {
        let path = self.path_for(url)?;
        debug!(%url, path = %path.display(), "reading svg");
        let markup = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| not_found_or_io(url, e))?;
        Ok(VectorGroup { source: Some(url.to_string()), markup })
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_image_resource_base64() {
        let image: ImageResource = serde_json::from_value(json!({ "data": "AQID" })).unwrap();
        assert_eq!(image.data, vec![1, 2, 3]);
        assert_eq!(serde_json::to_value(&image).unwrap(), json!({ "data": "AQID" }));

        let bad = serde_json::from_value::<ImageResource>(json!({ "data": "***" }));
        assert!(bad.is_err());
    }

    #[tokio::test]
    async fn test_file_resources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo.png"), [9u8, 8, 7]).unwrap();
        std::fs::write(dir.path().join("badge.svg"), "<svg/>").unwrap();
        let files = FileResources::new(dir.path());

        let image = AsyncImageFetcher::fetch(&files, "file://logo.png").await.unwrap();
        assert_eq!(image.data, vec![9, 8, 7]);
        assert_eq!(image.source.as_deref(), Some("file://logo.png"));

        let svg = files.load_from_url("badge.svg").await.unwrap();
        assert_eq!(svg.markup, "<svg/>");

        assert!(matches!(
            AsyncImageFetcher::fetch(&files, "missing.png").await,
            Err(FetchError::NotFound(_))
        ));
        assert!(matches!(
            AsyncImageFetcher::fetch(&files, "../escape.png").await,
            Err(FetchError::NotFound(_))
        ));
        assert!(matches!(
            AsyncImageFetcher::fetch(&files, "https://example.com/a.png").await,
            Err(FetchError::Other(_))
        ));
    }

    struct Fixed;

    impl ImageFetcher for Fixed {
        fn fetch(&self, url: &str) -> Result<ImageResource, FetchError> {
            Ok(ImageResource::from_source(url, vec![1]))
        }
    }

    #[tokio::test]
    async fn test_blocking_adapter() {
        let fetcher = Blocking(Fixed);
        let image = AsyncImageFetcher::fetch(&fetcher, "x").await.unwrap();
        assert_eq!(image.source.as_deref(), Some("x"));
    }
}
