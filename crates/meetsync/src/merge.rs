use crate::types::{EventEntry, PageMeta, ProviderPage, ScrapedEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Created,
    Updated,
}

/// Returns the provider page of the entry currently stored under `url`,
/// appending a new entry (seeded with `url`) when there is none. A canonical
/// URL that changed since the last run therefore yields a second entry.
pub fn find_or_insert<'a>(
    events: &'a mut Vec<EventEntry>,
    url: &str,
) -> (&'a mut ProviderPage, MergeOutcome) {
    let (index, outcome) = match events.iter().position(|event| event.url() == Some(url)) {
        Some(index) => (index, MergeOutcome::Updated),
        None => {
            log::debug!("New event entry for {}", url);
            events.push(EventEntry::new(url));
            (events.len() - 1, MergeOutcome::Created)
        }
    };
    let page = events[index]
        .meetupcom
        .get_or_insert_with(ProviderPage::default);
    (page, outcome)
}

/// Overwrites page metadata fields the page actually provided. The canonical
/// link replaces the stored URL.
pub fn apply_page_meta(page: &mut ProviderPage, meta: PageMeta) {
    if let Some(og_title) = meta.og_title {
        page.og_title = Some(og_title);
    }
    if let Some(meta_description) = meta.meta_description {
        page.meta_description = Some(meta_description);
    }
    if let Some(canonical_url) = meta.canonical_url {
        page.url = Some(canonical_url);
    }
    if let Some(image) = meta.image {
        page.image = Some(image);
    }
}

pub fn merge_event(events: &mut Vec<EventEntry>, url: &str, scraped: ScrapedEvent) -> MergeOutcome {
    let (page, outcome) = find_or_insert(events, url);
    apply_page_meta(page, scraped.meta);
    page.ical = Some(scraped.ical);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventTime, Geo, IcalEvent};
    use serde_yaml::{Mapping, Value};

    const URL: &str = "https://www.meetup.com/asociace-ux/events/280440185/";

    fn event_time(local: &str, utc: &str) -> EventTime {
        EventTime {
            timezone: "Europe/Prague".to_string(),
            datetime: local.to_string(),
            datetime_utc: utc.to_string(),
        }
    }

    fn scraped(summary: &str) -> ScrapedEvent {
        ScrapedEvent {
            meta: PageMeta {
                og_title: Some(summary.to_string()),
                meta_description: Some("Popis".to_string()),
                canonical_url: Some(URL.to_string()),
                image: None,
            },
            ical: IcalEvent {
                summary: summary.to_string(),
                description: "Line one\nLine two".to_string(),
                location: "Praha".to_string(),
                geo: Geo { lat: 50.08, lon: 14.43 },
                status: "CONFIRMED".to_string(),
                uid: "event_280440185@meetup.com".to_string(),
                url: URL.to_string(),
                dtstart: event_time("20210906T183000", "20210906T163000Z"),
                dtend: event_time("20210906T203000", "20210906T183000Z"),
            },
        }
    }

    fn stored(url: &str, title: &str) -> EventEntry {
        let mut entry = EventEntry::new(url);
        if let Some(page) = entry.meetupcom.as_mut() {
            page.og_title = Some(title.to_string());
        }
        entry
    }

    #[test]
    fn test_merge_into_empty_list_is_idempotent() {
        let mut events = Vec::new();

        assert_eq!(
            merge_event(&mut events, URL, scraped("UX Monday")),
            MergeOutcome::Created
        );
        let first = events.clone();

        assert_eq!(
            merge_event(&mut events, URL, scraped("UX Monday")),
            MergeOutcome::Updated
        );

        assert_eq!(events.len(), 1);
        assert_eq!(events, first);
        assert_eq!(
            serde_yaml::to_string(&events).expect("Should serialize"),
            serde_yaml::to_string(&first).expect("Should serialize")
        );
    }

    #[test]
    fn test_merge_updates_matching_entry_in_place() {
        let other = "https://www.meetup.com/asociace-ux/events/1/";
        let mut events = vec![stored(other, "Other"), stored(URL, "Old title")];
        events[1]
            .extra
            .insert(Value::from("note"), Value::from("kept"));

        let outcome = merge_event(&mut events, URL, scraped("New title"));

        assert_eq!(outcome, MergeOutcome::Updated);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], stored(other, "Other"));
        let page = events[1].meetupcom.as_ref().expect("Should have page");
        assert_eq!(page.og_title.as_deref(), Some("New title"));
        assert_eq!(
            page.ical.as_ref().map(|i| i.summary.as_str()),
            Some("New title")
        );
        assert_eq!(events[1].extra.get("note"), Some(&Value::from("kept")));
    }

    #[test]
    fn test_merge_appends_new_entries_in_call_order() {
        let mut events = vec![stored("https://www.meetup.com/g/events/1/", "One")];

        let mut second = scraped("Two");
        second.meta.canonical_url = None;
        merge_event(&mut events, "https://www.meetup.com/g/events/2/", second);

        let mut third = scraped("Three");
        third.meta.canonical_url = None;
        merge_event(&mut events, "https://www.meetup.com/g/events/3/", third);

        let urls: Vec<_> = events
            .iter()
            .map(|e| e.url().unwrap_or_default())
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://www.meetup.com/g/events/1/",
                "https://www.meetup.com/g/events/2/",
                "https://www.meetup.com/g/events/3/",
            ]
        );
    }

    #[test]
    fn test_merge_leaves_entries_without_provider_page_alone() {
        let mut offline = EventEntry::default();
        offline
            .extra
            .insert(Value::from("title"), Value::from("Offline event"));
        let mut events = vec![offline.clone()];

        let outcome = merge_event(&mut events, URL, scraped("UX Monday"));

        assert_eq!(outcome, MergeOutcome::Created);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], offline);
        assert_eq!(events[1].url(), Some(URL));
    }

    #[test]
    fn test_changed_canonical_url_creates_second_entry() {
        let moved = "https://www.meetup.com/asociace-ux/events/999/";
        let mut events = Vec::new();

        let mut first = scraped("UX Monday");
        first.meta.canonical_url = Some(moved.to_string());
        merge_event(&mut events, URL, first);

        // The stored URL is now the canonical one, so the discovery URL no longer matches.
        let outcome = merge_event(&mut events, URL, scraped("UX Monday"));

        assert_eq!(outcome, MergeOutcome::Created);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].url(), Some(moved));
    }

    #[test]
    fn test_apply_page_meta_keeps_fields_the_page_omits() {
        let mut page = ProviderPage {
            url: Some(URL.to_string()),
            og_title: Some("Title".to_string()),
            image: Some("https://example.com/a.jpeg".to_string()),
            extra: Mapping::new(),
            ..Default::default()
        };

        apply_page_meta(
            &mut page,
            PageMeta {
                meta_description: Some("Description".to_string()),
                ..Default::default()
            },
        );

        assert_eq!(page.url.as_deref(), Some(URL));
        assert_eq!(page.og_title.as_deref(), Some("Title"));
        assert_eq!(page.meta_description.as_deref(), Some("Description"));
        assert_eq!(page.image.as_deref(), Some("https://example.com/a.jpeg"));
    }
}
