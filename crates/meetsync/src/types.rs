use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;

/// One source file: a series plus whatever else the file carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    #[serde(flatten)]
    pub extra: Mapping,
    pub series: Series,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    #[serde(flatten)]
    pub extra: Mapping,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meetupcom: Option<ProviderPage>,
    #[serde(default)]
    pub events: Vec<EventEntry>,
}

/// A stored event, identified by `meetupcom.url`. Entries without a
/// `meetupcom` object are kept as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventEntry {
    #[serde(flatten)]
    pub extra: Mapping,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meetupcom: Option<ProviderPage>,
}

impl EventEntry {
    pub fn new(url: &str) -> Self {
        Self {
            meetupcom: Some(ProviderPage {
                url: Some(url.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.meetupcom.as_ref().and_then(|page| page.url.as_deref())
    }
}

/// Provider-side view of a series or event page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderPage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ical: Option<IcalEvent>,
    #[serde(flatten)]
    pub extra: Mapping,
}

/// Metadata read from the `<head>` of a provider page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub og_title: Option<String>,
    pub meta_description: Option<String>,
    pub canonical_url: Option<String>,
    pub image: Option<String>,
}

/// Normalized `VEVENT` of a calendar export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcalEvent {
    pub summary: String,
    pub description: String,
    pub location: String,
    pub geo: Geo,
    pub status: String,
    pub uid: String,
    pub url: String,
    pub dtstart: EventTime,
    pub dtend: EventTime,
}

impl Display for IcalEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "┌─ {} ─ {}", self.summary, self.status)?;
        writeln!(f, "│  Start: {}", self.dtstart)?;
        writeln!(f, "│  End: {}", self.dtend)?;
        writeln!(f, "│  Location: {} ({})", self.location, self.geo)?;
        writeln!(f, "│  UID: {}", self.uid)?;
        writeln!(f, "└─ {}", self.url)?;
        if !self.description.is_empty() {
            writeln!(f)?;
            writeln!(f, "{}", self.description)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geo {
    pub lat: f64,
    pub lon: f64,
}

impl Display for Geo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.lat, self.lon)
    }
}

/// A timestamp kept in its source form alongside its UTC equivalent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTime {
    pub timezone: String,
    pub datetime: String,
    pub datetime_utc: String,
}

impl Display for EventTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.datetime, self.timezone, self.datetime_utc
        )
    }
}

/// Everything scraped for one event, ready to be merged.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedEvent {
    pub meta: PageMeta,
    pub ical: IcalEvent,
}
