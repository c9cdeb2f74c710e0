use crate::ical::{MalformedBlockError, PropertyError, normalize_event, parse_export};
use crate::merge::{MergeOutcome, apply_page_meta, merge_event};
use crate::parser::{ParseError, discover_event_urls, parse_page_meta, series_group};
use crate::scraper::{Fetch, ScraperError};
use crate::types::{ScrapedEvent, Series};
use crate::utils::UpdateStats;

const CALENDAR_EXPORT_PATH: &str = "ical/x.ics";

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: ScraperError,
    },
    #[error("Event URL must end with '/': {0}")]
    MissingTrailingSlash(String),
    #[error("{url}: {source}")]
    Calendar {
        url: String,
        #[source]
        source: MalformedBlockError,
    },
    #[error("{url}: {source}")]
    Property {
        url: String,
        #[source]
        source: PropertyError,
    },
}

impl EventError {
    /// Transport failures and broken preconditions stop the whole series;
    /// anything wrong with the export itself only drops that event.
    pub fn aborts_series(&self) -> bool {
        matches!(
            self,
            EventError::Fetch { .. } | EventError::MissingTrailingSlash(_)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("Failed to fetch series page {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: ScraperError,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Event {url} aborted the series update: {source}")]
    Event {
        url: String,
        #[source]
        source: EventError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The series has no meetup.com URL to scrape.
    NoTarget,
    Updated(UpdateStats),
}

pub fn calendar_export_url(event_url: &str) -> Result<String, EventError> {
    if !event_url.ends_with('/') {
        return Err(EventError::MissingTrailingSlash(event_url.to_string()));
    }
    Ok(format!("{event_url}{CALENDAR_EXPORT_PATH}"))
}

pub struct SeriesUpdater<F> {
    fetcher: F,
}

impl<F: Fetch> SeriesUpdater<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Updates `series` in place. On error, changes merged before the failing
    /// event are kept in `series`; the caller decides whether to persist them.
    pub async fn update_series(&self, series: &mut Series) -> Result<UpdateOutcome, UpdateError> {
        let Some(target) = series.meetupcom.as_mut() else {
            log::debug!("No meetupcom field");
            return Ok(UpdateOutcome::NoTarget);
        };
        let Some(series_url) = target.url.clone().filter(|url| !url.is_empty()) else {
            log::debug!("No meetupcom.url field");
            return Ok(UpdateOutcome::NoTarget);
        };

        let group = series_group(&series_url)?;
        log::info!("Fetching series page {}", series_url);
        let page = self
            .fetcher
            .fetch(&series_url)
            .await
            .map_err(|source| UpdateError::Fetch {
                url: series_url.clone(),
                source,
            })?;

        apply_page_meta(target, parse_page_meta(&page.body));
        let event_urls = discover_event_urls(&page.body, &page.url, &group)?;
        log::info!("Found {} event(s) for {}", event_urls.len(), group);

        let mut stats = UpdateStats {
            discovered: event_urls.len(),
            ..Default::default()
        };

        for event_url in event_urls {
            match self.scrape_event(&event_url).await {
                Ok(scraped) => match merge_event(&mut series.events, &event_url, scraped) {
                    MergeOutcome::Created => stats.created += 1,
                    MergeOutcome::Updated => stats.updated += 1,
                },
                Err(e) if e.aborts_series() => {
                    return Err(UpdateError::Event {
                        url: event_url,
                        source: e,
                    });
                }
                Err(e) => {
                    log::warn!("Skipping event {}: {}", event_url, e);
                    stats.failed += 1;
                }
            }
        }

        Ok(UpdateOutcome::Updated(stats))
    }

    /// Fetches an event's detail page and calendar export.
    pub async fn scrape_event(&self, event_url: &str) -> Result<ScrapedEvent, EventError> {
        let export_url = calendar_export_url(event_url)?;

        log::info!("Fetching event {}", event_url);
        let page = self.fetch(event_url).await?;
        let meta = parse_page_meta(&page.body);

        let export = self.fetch(&export_url).await?;
        let calendar = parse_export(&export.body).map_err(|source| EventError::Calendar {
            url: export_url.clone(),
            source,
        })?;
        let ical = normalize_event(&calendar).map_err(|source| EventError::Property {
            url: export_url.clone(),
            source,
        })?;

        Ok(ScrapedEvent { meta, ical })
    }

    async fn fetch(&self, url: &str) -> Result<crate::scraper::Page, EventError> {
        self.fetcher
            .fetch(url)
            .await
            .map_err(|source| EventError::Fetch {
                url: url.to_string(),
                source,
            })
    }
}
