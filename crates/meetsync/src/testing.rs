use std::collections::HashMap;
use std::fs;
use std::sync::Mutex;

use crate::scraper::{Fetch, Page, ScraperError};

/// Serves fixture files for known URLs and records every request.
#[derive(Debug, Default)]
pub struct FixtureFetcher {
    pages: HashMap<String, (String, String)>,
    requests: Mutex<Vec<String>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, fixture: &str) -> Self {
        self.redirect(url, url, fixture)
    }

    pub fn redirect(mut self, url: &str, final_url: &str, fixture: &str) -> Self {
        self.pages
            .insert(url.to_string(), (final_url.to_string(), fixture.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl Fetch for FixtureFetcher {
    async fn fetch(&self, url: &str) -> Result<Page, ScraperError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(url.to_string());

        let (final_url, fixture) = self
            .pages
            .get(url)
            .ok_or_else(|| ScraperError::NotFound(url.to_string()))?;
        let body = fs::read_to_string(format!("fixtures/{fixture}"))
            .unwrap_or_else(|e| panic!("Failed to read fixture {fixture}: {e}"));

        Ok(Page {
            url: final_url.clone(),
            body,
        })
    }
}
