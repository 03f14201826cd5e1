//! HTTP media loader (feature `http`)
//!
//! Fetches a locator with `reqwest` and reads the image header with `image`
//! to obtain decoded dimensions. Only the header is decoded. Formats the
//! `image` build cannot read (AVIF by default) report a decode error.

use crate::error::LoadError;
use crate::metrics::MediaLoader;
use amp_types::Dimensions;
use async_trait::async_trait;
use image::ImageReader;
use std::io::Cursor;
use std::time::Duration;

/// Loader backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: reqwest::Client,
}

impl HttpLoader {
    /// Create loader with a request timeout
    ///
    /// # Errors
    /// Returns [`LoadError::Network`] if the client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoadError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    /// Create loader around an existing client
    #[inline]
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaLoader for HttpLoader {
    async fn load(&self, url: &str) -> Result<Dimensions, LoadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LoadError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LoadError::Network(e.to_string()))?;
        tracing::debug!(url, bytes = body.len(), "fetched media");

        read_dimensions(&body)
    }
}

/// Decoded dimensions from an encoded image's header
///
/// # Errors
/// Returns [`LoadError::Decode`] for unknown or unreadable formats.
pub fn read_dimensions(data: &[u8]) -> Result<Dimensions, LoadError> {
    let (width, height) = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| LoadError::Decode(format!("could not detect image format: {e}")))?
        .into_dimensions()
        .map_err(|e| LoadError::Decode(e.to_string()))?;
    Ok(Dimensions::new(width, height))
}
