//! Image acquisition from uploads and remote URLs.
//!
//! An uploaded file wins when it decodes. An upload that is not an image
//! counts as no upload at all, and the URL is tried instead. Remote images
//! are fetched once, optionally through a rewriting proxy that takes the
//! target URL as a query parameter.

use image::{ImageResult, RgbaImage};

use crate::error::{Error, Result};

/// Decode image bytes in any supported format into RGBA8.
///
/// # Errors
///
/// Returns the decoder error if the bytes are not a recognizable image.
pub fn decode(bytes: &[u8]) -> ImageResult<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// The raw inputs of one request.
#[derive(Debug, Clone, Default)]
pub struct ImageSource {
    /// Bytes of the uploaded file, if any.
    pub upload: Option<Vec<u8>>,
    /// Remote image URL, if any.
    pub url: Option<String>,
}

impl ImageSource {
    /// Drop empty uploads and blank URLs so they read as absent.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            upload: self.upload.filter(|b| !b.is_empty()),
            url: self
                .url
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
        }
    }
}

#[cfg(feature = "server")]
pub use remote::{acquire, Fetcher, DEFAULT_MAX_BYTES};

#[cfg(feature = "server")]
mod remote {
    use image::RgbaImage;
    use reqwest::StatusCode;
    use url::Url;

    use super::{decode, ImageSource};
    use crate::error::{Error, Result};
    use crate::pool::WorkerPool;

    /// Longest upstream body quoted back in a diagnostic.
    const MAX_BODY_CHARS: usize = 1024;

    /// Largest remote image accepted unless configured otherwise.
    pub const DEFAULT_MAX_BYTES: usize = 20 * 1024 * 1024;

    /// Fetches remote images, optionally through a rewriting proxy.
    #[derive(Debug, Clone)]
    pub struct Fetcher {
        client: reqwest::Client,
        proxy: Option<Url>,
        param: String,
        max_bytes: usize,
    }

    impl Fetcher {
        /// Create a fetcher. With a proxy, `GET {proxy}?{param}={target}` is
        /// requested instead of the target itself.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Http`] if the HTTP client cannot be built.
        pub fn new(proxy: Option<Url>, param: impl Into<String>) -> Result<Self> {
            let client = reqwest::Client::builder()
                .user_agent(concat!("afdicon/", env!("CARGO_PKG_VERSION")))
                .build()?;
            Ok(Self {
                client,
                proxy,
                param: param.into(),
                max_bytes: DEFAULT_MAX_BYTES,
            })
        }

        /// Refuse response bodies larger than `max_bytes`.
        #[must_use]
        pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
            self.max_bytes = max_bytes;
            self
        }

        /// Largest response body accepted.
        #[must_use]
        pub fn max_bytes(&self) -> usize {
            self.max_bytes
        }

        /// The URL actually requested for `target`.
        #[must_use]
        pub fn request_url(&self, target: &str) -> String {
            match &self.proxy {
                Some(base) => {
                    let mut rewritten = base.clone();
                    rewritten.query_pairs_mut().append_pair(&self.param, target);
                    rewritten.into()
                }
                None => target.to_string(),
            }
        }

        /// Fetch the raw bytes behind `url`.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Acquisition`] on transport failure, on any status
        /// other than 200 (the diagnostic carries the upstream body), or when
        /// the body is larger than the configured limit.
        pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            let failed = |reason: String| Error::Acquisition {
                url: url.to_string(),
                reason,
            };

            let target = self.request_url(url);
            tracing::debug!(%url, %target, "fetching image");

            let mut response = self
                .client
                .get(&target)
                .send()
                .await
                .map_err(|e| failed(e.to_string()))?;

            let status = response.status();
            if status != StatusCode::OK {
                let body = response.text().await.unwrap_or_default();
                let body: String = body.chars().take(MAX_BODY_CHARS).collect();
                return Err(failed(format!("upstream returned {status}: {body}")));
            }

            let too_large = || failed(format!("image larger than {} bytes", self.max_bytes));
            let declared = response
                .content_length()
                .and_then(|len| usize::try_from(len).ok());
            if declared.is_some_and(|len| len > self.max_bytes) {
                return Err(too_large());
            }

            // Content-Length may be absent or wrong; count what actually arrives.
            let mut body = Vec::new();
            while let Some(chunk) = response.chunk().await.map_err(|e| failed(e.to_string()))? {
                if body.len() + chunk.len() > self.max_bytes {
                    tracing::debug!(%url, limit = self.max_bytes, "remote image over limit");
                    return Err(too_large());
                }
                body.extend_from_slice(&chunk);
            }
            Ok(body)
        }
    }

    /// Produce a decoded RGBA image from an upload or a URL.
    ///
    /// Decoding runs on `pool`; fetching suspends only the calling task.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingInput`] if there is no decodable upload and no URL.
    /// - [`Error::Acquisition`] if the fetch fails or the fetched bytes do
    ///   not decode.
    /// - [`Error::Worker`] if a decode job is lost.
    pub async fn acquire(
        fetcher: &Fetcher,
        pool: &WorkerPool,
        source: ImageSource,
    ) -> Result<RgbaImage> {
        let ImageSource { upload, url } = source.normalized();

        if let Some(bytes) = upload {
            let len = bytes.len();
            match pool.run(move || decode(&bytes)).await? {
                Ok(image) => {
                    tracing::debug!(bytes = len, "using uploaded image");
                    return Ok(image);
                }
                Err(e) => {
                    tracing::debug!(bytes = len, error = %e, "upload is not an image, trying url");
                }
            }
        }

        let url = url.ok_or(Error::MissingInput)?;
        let bytes = fetcher.fetch(&url).await?;
        pool.run(move || decode(&bytes))
            .await?
            .map_err(|e| Error::Acquisition {
                url,
                reason: format!("not a decodable image: {e}"),
            })
    }
}

/// Blocking counterpart of acquisition for local files.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read, or [`Error::Image`] if
/// it does not decode.
pub fn load_file(path: &std::path::Path) -> Result<RgbaImage> {
    let bytes = std::fs::read(path)?;
    decode(&bytes).map_err(Error::from)
}
