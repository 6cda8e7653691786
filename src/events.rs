//! Time-of-day extraction
//!
//! Reduces raw timestamped events to (activity, local start time, duration)
//! rows. One row per input event; nothing is aggregated here.

use chrono::{NaiveTime, Timelike};
use log::debug;

use crate::error::ComputeError;
use crate::types::{
    parse_timestamp, DensitySample, EventPayload, EventRecord, RawEvent, SECONDS_PER_HOUR,
};

/// Extractor for time-of-day rows
pub struct TimeOfDayExtractor;

impl TimeOfDayExtractor {
    /// Convert raw events to time-of-day records.
    ///
    /// The start time is read in the offset the timestamp was recorded with;
    /// no zone conversion is applied. Durations become hours.
    pub fn extract(events: &[RawEvent]) -> Result<Vec<EventRecord>, ComputeError> {
        let records = events
            .iter()
            .map(extract_one)
            .collect::<Result<Vec<_>, _>>()?;
        debug!("extracted {} time-of-day records", records.len());
        Ok(records)
    }

    /// Convert an event payload to time-of-day records
    pub fn from_payload(payload: &EventPayload) -> Result<Vec<EventRecord>, ComputeError> {
        Self::extract(&payload.events)
    }

    /// Place records on the (time-of-day, duration) plane
    pub fn to_samples(records: &[EventRecord]) -> Vec<DensitySample> {
        records
            .iter()
            .map(|r| DensitySample {
                x: fractional_hours(r.start_time_of_day),
                y: r.duration_hours,
                activity: r.activity.clone(),
            })
            .collect()
    }
}

/// Time of day as fractional hours in `[0, 24)`
pub fn fractional_hours(time: NaiveTime) -> f64 {
    time.num_seconds_from_midnight() as f64 / SECONDS_PER_HOUR
        + time.nanosecond().min(999_999_999) as f64 / 1e9 / SECONDS_PER_HOUR
}

fn extract_one(event: &RawEvent) -> Result<EventRecord, ComputeError> {
    if !event.duration.is_finite() || event.duration < 0.0 {
        return Err(ComputeError::ParseError(format!(
            "event {} has invalid duration {}",
            event_label(event),
            event.duration
        )));
    }

    let start_time_of_day = match parse_timestamp(&event.timestamp) {
        Ok(timestamp) => timestamp.time(),
        // Fall back to the pre-split local time the server also sends
        Err(err) => match event.time.as_deref().map(parse_clock) {
            Some(Ok(time)) => time,
            _ => return Err(err),
        },
    };

    Ok(EventRecord {
        activity: event.data.app.clone(),
        start_time_of_day,
        duration_hours: event.duration / SECONDS_PER_HOUR,
    })
}

fn parse_clock(raw: &str) -> Result<NaiveTime, ComputeError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S%.f")
        .map_err(|e| ComputeError::ParseError(format!("invalid time '{}': {}", raw, e)))
}

fn event_label(event: &RawEvent) -> String {
    match &event.id {
        Some(id) => id.to_string(),
        None => event.timestamp.clone(),
    }
}
