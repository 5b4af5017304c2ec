//! Random pet-image sources: the live HTTP endpoint, or a scripted queue for
//! tests and offline simulation.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use contracts::ImageResult;
use log::debug;

pub const DEFAULT_IMAGE_ENDPOINT: &str = "https://api.thecatapi.com/v1/images/search";

#[derive(Debug)]
pub enum ProviderError {
    Http(reqwest::Error),
    EmptyResponse,
    Exhausted,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(err) => write!(f, "image fetch failed: {err}"),
            Self::EmptyResponse => write!(f, "image endpoint returned an empty list"),
            Self::Exhausted => write!(f, "scripted image source is exhausted"),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<reqwest::Error> for ProviderError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

/// Fetches random images over HTTPS. The endpoint returns a JSON list of
/// candidates; only the first entry's `{id, url}` is used.
#[derive(Debug, Clone)]
pub struct HttpImageProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpImageProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub async fn fetch_random(&self) -> Result<ImageResult, ProviderError> {
        debug!("fetching random image from {}", self.endpoint);
        let images: Vec<ImageResult> = self
            .client
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        images.into_iter().next().ok_or(ProviderError::EmptyResponse)
    }
}

impl Default for HttpImageProvider {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_ENDPOINT)
    }
}

#[derive(Debug)]
pub enum ImageSource {
    Http(HttpImageProvider),
    Scripted(Mutex<VecDeque<ImageResult>>),
}

impl ImageSource {
    pub fn http(endpoint: impl Into<String>) -> Self {
        Self::Http(HttpImageProvider::new(endpoint))
    }

    pub fn scripted(candidates: Vec<ImageResult>) -> Self {
        Self::Scripted(Mutex::new(candidates.into()))
    }

    pub async fn fetch_random(&self) -> Result<ImageResult, ProviderError> {
        match self {
            Self::Http(provider) => provider.fetch_random().await,
            Self::Scripted(queue) => {
                let mut queue = match queue.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                queue.pop_front().ok_or(ProviderError::Exhausted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str) -> ImageResult {
        ImageResult {
            id: id.to_string(),
            url: format!("https://x/{id}.jpg"),
        }
    }

    #[tokio::test]
    async fn scripted_source_pops_in_order_then_exhausts() {
        let source = ImageSource::scripted(vec![candidate("a"), candidate("b")]);

        let first = source.fetch_random().await.expect("first");
        let second = source.fetch_random().await.expect("second");
        assert_eq!(first.id, "a");
        assert_eq!(second.id, "b");

        let drained = source.fetch_random().await;
        assert!(matches!(drained, Err(ProviderError::Exhausted)));
    }
}
