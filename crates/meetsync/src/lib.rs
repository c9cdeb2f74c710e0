pub mod ical;
pub mod merge;
pub mod parser;
pub mod scraper;
pub mod source;
pub mod types;
pub mod update;
pub mod utils;

#[cfg(test)]
mod testing;

pub use crate::scraper::{Fetch, FetchConfig, ScraperError, WebScraper};
pub use crate::update::{SeriesUpdater, UpdateError, UpdateOutcome};
