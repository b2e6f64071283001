//! Time normalization for news events.
//!
//! Raw news timestamps arrive in mixed serialized forms, some zone-aware and
//! some naive. Each is coerced to a UTC instant, converted to exchange-local
//! time, and attributed to a trading date using the market-close cutoff:
//! strictly after the cutoff means the next calendar day.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::debug;

use super::news::NewsEvent;
use crate::config::MarketConfig;

/// A news event with its derived time fields. All three derived fields are
/// `None` together when the raw timestamp could not be parsed; the row is
/// retained so downstream counts stay consistent with the input.
#[derive(Debug, Clone)]
pub struct NormalizedNewsEvent {
    pub instrument: String,
    pub raw_timestamp: String,
    pub sentiment: Option<f64>,
    pub utc_instant: Option<DateTime<Utc>>,
    pub local_instant: Option<DateTime<Tz>>,
    pub trading_date: Option<NaiveDate>,
}

/// Exchange clock: the close cutoff and the zone it applies in.
#[derive(Debug, Clone)]
pub struct MarketClock {
    cutoff: NaiveTime,
    zone: Tz,
}

impl MarketClock {
    pub fn new(market: &MarketConfig) -> Self {
        Self {
            cutoff: market.cutoff_time,
            zone: market.exchange_timezone,
        }
    }

    /// Attribute a UTC instant to a trading date.
    ///
    /// The zone database handles the UTC offset for the specific date, so
    /// daylight-saving transitions need no special casing here. Exactly at
    /// the cutoff stays same-day; strictly after rolls to the next calendar
    /// day with no weekend or holiday skipping.
    pub fn trading_date(&self, utc: DateTime<Utc>) -> (DateTime<Tz>, Option<NaiveDate>) {
        let local = utc.with_timezone(&self.zone);
        let date = local.date_naive();
        let bucket = if local.time() > self.cutoff {
            date.checked_add_days(Days::new(1))
        } else {
            Some(date)
        };
        (local, bucket)
    }

    /// Derive the full set of time fields for one event.
    pub fn normalize(&self, event: &NewsEvent) -> NormalizedNewsEvent {
        match parse_timestamp_utc(&event.raw_timestamp) {
            Some(utc) => {
                let (local, bucket) = self.trading_date(utc);
                NormalizedNewsEvent {
                    instrument: event.instrument.clone(),
                    raw_timestamp: event.raw_timestamp.clone(),
                    sentiment: event.sentiment,
                    utc_instant: Some(utc),
                    local_instant: Some(local),
                    trading_date: bucket,
                }
            }
            None => NormalizedNewsEvent {
                instrument: event.instrument.clone(),
                raw_timestamp: event.raw_timestamp.clone(),
                sentiment: event.sentiment,
                utc_instant: None,
                local_instant: None,
                trading_date: None,
            },
        }
    }
}

/// Normalize a batch of events. Rows with malformed timestamps are kept with
/// missing time fields, never dropped.
pub fn normalize_events(events: &[NewsEvent], clock: &MarketClock) -> Vec<NormalizedNewsEvent> {
    let normalized: Vec<NormalizedNewsEvent> = events.iter().map(|e| clock.normalize(e)).collect();
    let invalid = normalized.iter().filter(|e| e.utc_instant.is_none()).count();
    if invalid > 0 {
        debug!(
            "{} of {} news timestamps could not be parsed",
            invalid,
            normalized.len()
        );
    }
    normalized
}

/// Coerce a raw timestamp string to a UTC instant.
///
/// Zone-aware forms are converted; naive forms are treated as already UTC;
/// bare dates map to midnight UTC. Returns `None` for anything unparseable.
pub fn parse_timestamp_utc(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f %z",
        "%Y-%m-%d %H:%M:%S%.f%z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
    ] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive));
    }

    None
}
