use chrono::{LocalResult, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::{OffsetComponents, Tz};

use super::parser::Block;
use crate::types::{EventTime, Geo, IcalEvent};

pub const EVENT_BLOCK: &str = "VEVENT";

const LOCAL_FORMAT: &str = "%Y%m%dT%H%M%S";
const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const TZID_PARAM: &str = ";TZID=";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PropertyError {
    #[error("Missing calendar block: {0}")]
    MissingBlock(String),
    #[error("Could not find {0}")]
    MissingProperty(String),
    #[error("More than one {0} property")]
    AmbiguousProperty(String),
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),
    #[error("Invalid datetime {value:?}: {reason}")]
    InvalidDatetime { value: String, reason: String },
    #[error("Invalid geo pair: {0:?}")]
    InvalidGeo(String),
}

/// Normalizes the `VEVENT` child of a parsed calendar.
pub fn normalize_event(calendar: &Block) -> Result<IcalEvent, PropertyError> {
    let event = calendar
        .child(EVENT_BLOCK)
        .ok_or_else(|| PropertyError::MissingBlock(EVENT_BLOCK.to_string()))?;

    Ok(IcalEvent {
        summary: text_property(event, "SUMMARY")?,
        description: text_property(event, "DESCRIPTION")?,
        location: text_property(event, "LOCATION")?,
        geo: parse_geo(&text_property(event, "GEO")?)?,
        status: text_property(event, "STATUS")?,
        uid: text_property(event, "UID")?,
        url: text_property(event, "URL")?,
        dtstart: datetime_property(event, "DTSTART")?,
        dtend: datetime_property(event, "DTEND")?,
    })
}

pub fn text_property(block: &Block, key: &str) -> Result<String, PropertyError> {
    block
        .value(key)
        .map(str::to_owned)
        .ok_or_else(|| PropertyError::MissingProperty(key.to_string()))
}

/// Finds the single `name` or `name;TZID=<zone>` property of `block` and
/// resolves it to UTC. A bare `name` is read as UTC, with or without a
/// trailing `Z`.
pub fn datetime_property(block: &Block, name: &str) -> Result<EventTime, PropertyError> {
    let mut matches = block.properties().filter_map(|(key, value)| {
        let params = key.strip_prefix(name)?;
        if params.is_empty() {
            return Some((None, value));
        }
        params
            .strip_prefix(TZID_PARAM)
            .filter(|zone| !zone.is_empty() && !zone.contains([';', '=']))
            .map(|zone| (Some(zone), value))
    });

    let (zone, value) = matches
        .next()
        .ok_or_else(|| PropertyError::MissingProperty(name.to_string()))?;
    if matches.next().is_some() {
        return Err(PropertyError::AmbiguousProperty(name.to_string()));
    }

    match zone {
        Some(zone) => localize(zone, value),
        None => {
            let naive = parse_naive(value.strip_suffix('Z').unwrap_or(value))?;
            Ok(EventTime {
                timezone: "UTC".to_string(),
                datetime: value.to_string(),
                datetime_utc: naive.and_utc().format(UTC_FORMAT).to_string(),
            })
        }
    }
}

fn localize(zone: &str, value: &str) -> Result<EventTime, PropertyError> {
    let tz: Tz = zone
        .parse()
        .map_err(|_| PropertyError::UnknownTimezone(zone.to_string()))?;
    let naive = parse_naive(value)?;

    let utc = match tz.from_local_datetime(&naive) {
        LocalResult::Single(local) => local.with_timezone(&Utc),
        // DST fall-back overlap: the standard-time reading is the later instant.
        LocalResult::Ambiguous(_, latest) => latest.with_timezone(&Utc),
        // Spring-forward gap: read the wall time at the zone's standard offset.
        LocalResult::None => {
            let standard = tz
                .offset_from_utc_datetime(&(naive - TimeDelta::days(1)))
                .base_utc_offset();
            (naive - standard).and_utc()
        }
    };

    Ok(EventTime {
        timezone: zone.to_string(),
        datetime: value.to_string(),
        datetime_utc: utc.format(UTC_FORMAT).to_string(),
    })
}

fn parse_naive(value: &str) -> Result<NaiveDateTime, PropertyError> {
    NaiveDateTime::parse_from_str(value, LOCAL_FORMAT).map_err(|e| {
        PropertyError::InvalidDatetime {
            value: value.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Parses a `lat;lon` pair.
pub fn parse_geo(value: &str) -> Result<Geo, PropertyError> {
    let invalid = || PropertyError::InvalidGeo(value.to_string());

    let (lat, lon) = value.split_once(';').ok_or_else(invalid)?;
    if lon.contains(';') {
        return Err(invalid());
    }

    let parse = |part: &str| {
        part.trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(invalid)
    };

    Ok(Geo {
        lat: parse(lat)?,
        lon: parse(lon)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ical::parser::{parse_calendar, parse_export};
    use std::fs;

    fn event_block(lines: &[&str]) -> Block {
        let text = format!(
            "BEGIN:VCALENDAR\nBEGIN:VEVENT\n{}\nEND:VEVENT\nEND:VCALENDAR",
            lines.join("\n")
        );
        let calendar = parse_calendar(&text).expect("Failed to parse");
        calendar.child(EVENT_BLOCK).cloned().expect("Should contain VEVENT")
    }

    #[test]
    fn test_normalize_event_from_fixture() {
        let text = fs::read_to_string("fixtures/x.ics").expect("Failed to read fixture");
        let calendar = parse_export(&text).expect("Failed to parse fixture");

        let event = normalize_event(&calendar).expect("Failed to normalize");

        assert_eq!(
            event.summary,
            "UX Monday: Podpora začínajících designérů v týmu"
        );
        assert!(event.description.starts_with("Asociace UX\nMonday, September 6"));
        assert!(event.location.contains("Smíchov, Praha-Praha 5, Czech Republic"));
        assert_eq!(event.geo, Geo { lat: 50.08, lon: 14.43 });
        assert_eq!(event.status, "CONFIRMED");
        assert_eq!(event.uid, "event_280440185@meetup.com");
        assert_eq!(
            event.url,
            "https://www.meetup.com/asociace-ux/events/280440185/"
        );
        assert_eq!(
            event.dtstart,
            EventTime {
                timezone: "Europe/Prague".to_string(),
                datetime: "20210906T183000".to_string(),
                datetime_utc: "20210906T163000Z".to_string(),
            }
        );
        assert_eq!(event.dtend.datetime_utc, "20210906T183000Z");
    }

    #[test]
    fn test_datetime_winter_offset() {
        let block = event_block(&["DTSTART;TZID=Europe/Prague:20211206T183000"]);
        let time = datetime_property(&block, "DTSTART").expect("Should resolve");

        assert_eq!(time.datetime_utc, "20211206T173000Z");
    }

    #[test]
    fn test_datetime_bare_key_is_utc() {
        let block = event_block(&["DTSTART:20210906T183000Z"]);
        let time = datetime_property(&block, "DTSTART").expect("Should resolve");

        assert_eq!(time.timezone, "UTC");
        assert_eq!(time.datetime, "20210906T183000Z");
        assert_eq!(time.datetime_utc, "20210906T183000Z");
    }

    #[test]
    fn test_datetime_prefix_must_end_at_parameter() {
        let block = event_block(&["DTSTARTX:20210906T183000"]);
        let err = datetime_property(&block, "DTSTART").expect_err("Should not match");

        assert_eq!(err, PropertyError::MissingProperty("DTSTART".to_string()));
    }

    #[test]
    fn test_datetime_missing() {
        let block = event_block(&["DTEND;TZID=Europe/Prague:20210906T203000"]);
        let err = datetime_property(&block, "DTSTART").expect_err("Should be missing");

        assert_eq!(err, PropertyError::MissingProperty("DTSTART".to_string()));
    }

    #[test]
    fn test_datetime_ambiguous() {
        let block = event_block(&[
            "DTSTART;TZID=Europe/Prague:20210906T183000",
            "DTSTART;TZID=Europe/London:20210906T173000",
        ]);
        let err = datetime_property(&block, "DTSTART").expect_err("Should be ambiguous");

        assert_eq!(err, PropertyError::AmbiguousProperty("DTSTART".to_string()));
    }

    #[test]
    fn test_datetime_unknown_zone() {
        let block = event_block(&["DTSTART;TZID=Mars/Olympus:20210906T183000"]);
        let err = datetime_property(&block, "DTSTART").expect_err("Should fail");

        assert_eq!(err, PropertyError::UnknownTimezone("Mars/Olympus".to_string()));
    }

    #[test]
    fn test_datetime_malformed_value() {
        let block = event_block(&["DTSTART;TZID=Europe/Prague:2021-09-06 18:30"]);
        let err = datetime_property(&block, "DTSTART").expect_err("Should fail");

        assert!(matches!(err, PropertyError::InvalidDatetime { .. }));
    }

    #[test]
    fn test_datetime_fall_back_overlap_uses_standard_time() {
        let block = event_block(&["DTSTART;TZID=Europe/Prague:20211031T023000"]);
        let time = datetime_property(&block, "DTSTART").expect("Should resolve");

        assert_eq!(time.datetime_utc, "20211031T013000Z");
    }

    #[test]
    fn test_datetime_spring_forward_gap_uses_standard_offset() {
        let block = event_block(&["DTSTART;TZID=Europe/Prague:20210328T023000"]);
        let time = datetime_property(&block, "DTSTART").expect("Should resolve");

        assert_eq!(time.datetime, "20210328T023000");
        assert_eq!(time.datetime_utc, "20210328T013000Z");
    }

    #[test]
    fn test_parse_geo() {
        assert_eq!(
            parse_geo("50.08;14.43").expect("Should parse"),
            Geo { lat: 50.08, lon: 14.43 }
        );
        assert_eq!(
            parse_geo("-33.87;151.21").expect("Should parse"),
            Geo { lat: -33.87, lon: 151.21 }
        );
    }

    #[test]
    fn test_parse_geo_rejects_malformed_pairs() {
        for value in ["50.08", "50.08;14.43;1", "north;14.43", "50.08;", "NaN;14.43"] {
            assert_eq!(
                parse_geo(value),
                Err(PropertyError::InvalidGeo(value.to_string())),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn test_normalize_event_requires_vevent() {
        let calendar = parse_calendar("BEGIN:VCALENDAR\nVERSION:2.0\nEND:VCALENDAR")
            .expect("Failed to parse");

        assert_eq!(
            normalize_event(&calendar),
            Err(PropertyError::MissingBlock("VEVENT".to_string()))
        );
    }

    #[test]
    fn test_normalize_event_requires_fields() {
        let text = fs::read_to_string("fixtures/x.ics")
            .expect("Failed to read fixture")
            .replace("GEO:50.08;14.43\r\n", "");
        let calendar = parse_calendar(&text).expect("Failed to parse");

        assert_eq!(
            normalize_event(&calendar),
            Err(PropertyError::MissingProperty("GEO".to_string()))
        );
    }
}
