//! Logo loading for report headers.
//!
//! Browser-backed exports must not depend on external assets, so the one image a report
//! carries (the publisher logo) is loaded up front and re-encoded as a `data:` URI. A logo
//! that cannot be loaded is logged and skipped; it never aborts an export.
//!
//! ```rust
//! use reportpdf::images::{ImageData, ImageFormat};
//!
//! let logo = ImageData {
//!     bytes: b"<svg xmlns='http://www.w3.org/2000/svg'/>".to_vec(),
//!     format: ImageFormat::Svg,
//!     source: "logo.svg".to_string(),
//! };
//! assert!(logo.to_data_uri().starts_with("data:image/svg+xml;base64,"));
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{debug, warn};
use std::path::{Path, PathBuf};
#[cfg(feature = "fetch")]
use std::time::Duration;

#[cfg(feature = "fetch")]
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Image formats a logo may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Svg,
    WebP,
    Gif,
}

impl ImageFormat {
    /// Detect image format from the file extension.
    ///
    /// ```
    /// use reportpdf::images::ImageFormat;
    /// assert_eq!(ImageFormat::from_path("logo.JPG"), Some(ImageFormat::Jpeg));
    /// assert_eq!(ImageFormat::from_path("https://cdn.example.com/logo.png?v=3"), Some(ImageFormat::Png));
    /// assert_eq!(ImageFormat::from_path("logo"), None);
    /// ```
    pub fn from_path(path: &str) -> Option<ImageFormat> {
        let lower = path.to_lowercase();
        let lower = lower.split(['?', '#']).next().unwrap_or("");
        if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
            Some(ImageFormat::Jpeg)
        } else if lower.ends_with(".png") {
            Some(ImageFormat::Png)
        } else if lower.ends_with(".svg") {
            Some(ImageFormat::Svg)
        } else if lower.ends_with(".webp") {
            Some(ImageFormat::WebP)
        } else if lower.ends_with(".gif") {
            Some(ImageFormat::Gif)
        } else {
            None
        }
    }

    /// Detect image format from the leading bytes of the file.
    pub fn from_bytes(bytes: &[u8]) -> Option<ImageFormat> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(b"GIF8") {
            Some(ImageFormat::Gif)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageFormat::WebP)
        } else {
            let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]).to_lowercase();
            (head.contains("<svg") || head.trim_start().starts_with("<?xml"))
                .then_some(ImageFormat::Svg)
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Svg => "image/svg+xml",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Gif => "image/gif",
        }
    }
}

/// Error types for image operations.
#[derive(Debug)]
pub enum ImageError {
    /// Failed to load image from local filesystem
    LoadError(String),
    /// Failed to download image from remote URL
    DownloadError(String),
    /// Neither the name nor the content identify a supported format
    UnsupportedFormat(String),
}

impl std::fmt::Display for ImageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageError::LoadError(e) => write!(f, "Failed to load image: {}", e),
            ImageError::DownloadError(e) => write!(f, "Failed to download image: {}", e),
            ImageError::UnsupportedFormat(e) => write!(f, "Unsupported image format: {}", e),
        }
    }
}

impl std::error::Error for ImageError {}

/// Loaded image bytes together with their detected format.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    /// Original URL or path
    pub source: String,
}

impl ImageData {
    /// Encodes the image as a base64 `data:` URI suitable for an `<img src>`.
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            STANDARD.encode(&self.bytes)
        )
    }
}

/// Loads logos from local paths or HTTP(S) URLs.
pub struct ImageLoader {
    /// Base directory for resolving relative paths
    base_dir: Option<PathBuf>,
    allow_remote: bool,
}

impl ImageLoader {
    /// Creates a loader resolving relative paths against `base_dir` (typically the directory
    /// of the configuration file that names the logo).
    pub fn new(base_dir: Option<&Path>) -> Self {
        ImageLoader {
            base_dir: base_dir.map(Path::to_path_buf),
            allow_remote: true,
        }
    }

    pub fn set_allow_remote(&mut self, allow: bool) {
        self.allow_remote = allow;
    }

    /// Resolves a relative path against the base directory. URLs are returned unchanged.
    pub fn resolve_path(&self, url_or_path: &str) -> String {
        if is_remote(url_or_path) {
            return url_or_path.to_string();
        }
        match &self.base_dir {
            Some(base) if Path::new(url_or_path).is_relative() => {
                base.join(url_or_path).to_string_lossy().into_owned()
            }
            _ => url_or_path.to_string(),
        }
    }

    /// Loads an image from a URL or path.
    pub fn load(&self, url_or_path: &str) -> Result<ImageData, ImageError> {
        let resolved = self.resolve_path(url_or_path);
        let bytes = if is_remote(&resolved) {
            if !self.allow_remote {
                return Err(ImageError::DownloadError(
                    "Remote images are disabled".to_string(),
                ));
            }
            load_remote(&resolved)?
        } else {
            load_local(&resolved)?
        };

        let format = ImageFormat::from_bytes(&bytes)
            .or_else(|| ImageFormat::from_path(&resolved))
            .ok_or_else(|| ImageError::UnsupportedFormat(resolved.clone()))?;

        Ok(ImageData {
            bytes,
            format,
            source: url_or_path.to_string(),
        })
    }

    /// Loads a logo and returns it as a data URI, or `None` when it cannot be loaded.
    ///
    /// Values that already are data URIs are passed through untouched.
    pub fn load_data_uri(&self, url_or_path: &str) -> Option<String> {
        if url_or_path.starts_with("data:") {
            return Some(url_or_path.to_string());
        }
        match self.load(url_or_path) {
            Ok(image) => {
                debug!(
                    "Embedded logo {} ({} bytes, {})",
                    image.source,
                    image.bytes.len(),
                    image.format.mime_type()
                );
                Some(image.to_data_uri())
            }
            Err(e) => {
                warn!("Skipping logo {}: {}", url_or_path, e);
                None
            }
        }
    }
}

fn is_remote(url_or_path: &str) -> bool {
    url_or_path.starts_with("http://") || url_or_path.starts_with("https://")
}

fn load_local(path: &str) -> Result<Vec<u8>, ImageError> {
    debug!("Loading local image {}", path);
    std::fs::read(path)
        .map_err(|e| ImageError::LoadError(format!("Failed to read file {}: {}", path, e)))
}

#[cfg(feature = "fetch")]
fn load_remote(url: &str) -> Result<Vec<u8>, ImageError> {
    debug!("Downloading image {}", url);
    let client = reqwest::blocking::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(|e| ImageError::DownloadError(format!("Failed to build client: {}", e)))?;
    let response = client
        .get(url)
        .send()
        .map_err(|e| ImageError::DownloadError(format!("Failed to download {}: {}", url, e)))?;
    if !response.status().is_success() {
        return Err(ImageError::DownloadError(format!(
            "{} returned HTTP {}",
            url,
            response.status()
        )));
    }
    response
        .bytes()
        .map(|b| b.to_vec())
        .map_err(|e| ImageError::DownloadError(format!("Failed to read response: {}", e)))
}

#[cfg(not(feature = "fetch"))]
fn load_remote(url: &str) -> Result<Vec<u8>, ImageError> {
    Err(ImageError::DownloadError(format!(
        "Remote image loading from {} requires the 'fetch' feature",
        url
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_format_from_bytes() {
        assert_eq!(ImageFormat::from_bytes(&PNG_MAGIC), Some(ImageFormat::Png));
        assert_eq!(
            ImageFormat::from_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_bytes(b"<svg xmlns='x'></svg>"),
            Some(ImageFormat::Svg)
        );
        assert_eq!(ImageFormat::from_bytes(b"hello"), None);
    }

    #[test]
    fn test_relative_path_resolution() {
        let loader = ImageLoader::new(Some(Path::new("/data/reports")));
        assert!(loader
            .resolve_path("assets/logo.png")
            .ends_with("reports/assets/logo.png"));
        assert_eq!(
            loader.resolve_path("https://example.com/logo.png"),
            "https://example.com/logo.png"
        );
        assert_eq!(ImageLoader::new(None).resolve_path("logo.png"), "logo.png");
    }

    #[test]
    fn test_local_logo_becomes_data_uri() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo");
        std::fs::write(&path, PNG_MAGIC).unwrap();

        let loader = ImageLoader::new(None);
        let uri = loader.load_data_uri(path.to_str().unwrap()).unwrap();
        assert_eq!(uri, format!("data:image/png;base64,{}", STANDARD.encode(PNG_MAGIC)));

        let relative = ImageLoader::new(Some(dir.path()));
        assert_eq!(relative.load_data_uri("logo"), Some(uri));
    }

    #[test]
    fn test_missing_logo_is_skipped() {
        let mut loader = ImageLoader::new(None);
        loader.set_allow_remote(false);
        assert!(loader.load_data_uri("does-not-exist.png").is_none());
        assert!(loader.load_data_uri("https://example.com/logo.png").is_none());
        assert!(matches!(
            loader.load("https://example.com/logo.png"),
            Err(ImageError::DownloadError(_))
        ));
    }

    #[test]
    fn test_data_uri_passthrough() {
        let loader = ImageLoader::new(None);
        assert_eq!(
            loader.load_data_uri("data:image/png;base64,AAAA").as_deref(),
            Some("data:image/png;base64,AAAA")
        );
    }
}
