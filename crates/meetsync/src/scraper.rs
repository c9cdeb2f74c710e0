use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Client;

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Page not found: {0}")]
    NotFound(String),
}

/// A fetched page. `url` is the final URL after redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub url: String,
    pub body: String,
}

/// Source of pages for the updater.
pub trait Fetch {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Page, ScraperError>>;
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP fetcher with an in-memory response cache shared by its clones.
#[derive(Debug, Clone)]
pub struct WebScraper {
    client: Client,
    cache: Arc<Mutex<HashMap<String, Page>>>,
}

impl WebScraper {
    pub fn new() -> Result<Self, ScraperError> {
        Self::with_config(FetchConfig::default())
    }

    pub fn with_config(config: FetchConfig) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()?;

        Ok(Self {
            client,
            cache: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn cached(&self, url: &str) -> Option<Page> {
        self.cache.lock().ok()?.get(url).cloned()
    }

    fn store(&self, url: &str, page: &Page) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(url.to_string(), page.clone());
        }
    }

    async fn get_page(&self, url: &str) -> Result<Page, ScraperError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?;
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?;

        Ok(Page {
            url: final_url,
            body,
        })
    }
}

impl Fetch for WebScraper {
    async fn fetch(&self, url: &str) -> Result<Page, ScraperError> {
        if let Some(page) = self.cached(url) {
            log::debug!("Cache hit: {}", url);
            return Ok(page);
        }

        log::debug!("GET {}", url);
        let page = self.get_page(url).await?;
        self.store(url, &page);
        Ok(page)
    }
}
