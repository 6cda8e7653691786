//! Core types for the Activity Insights pipeline
//!
//! This module defines the values that flow between pipeline stages: category
//! snapshots and period pairs, stochastic series, time-of-day samples and
//! contour polygons, plus the raw payload shapes served by the tracking server.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::error::ComputeError;

/// Name of the synthetic overflow category
pub const OTHER_CATEGORY: &str = "Other";

/// Seconds in one hour
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// One category entry in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    /// Category name (unique within a snapshot)
    pub name: String,
    /// Tracked time (seconds)
    pub duration: f64,
    /// Share of the snapshot total (0-100)
    pub percentage: f64,
}

/// Category breakdown for one period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorySnapshot {
    /// Categories in caller-defined order
    pub categories: Vec<CategoryRecord>,
    /// Denominator for percentages (seconds); may exceed the category sum
    pub total_duration: f64,
}

impl CategorySnapshot {
    /// Duration of a named category, if present
    pub fn duration_of(&self, name: &str) -> Option<f64> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.duration)
    }

    /// Sum of all category durations (seconds)
    pub fn category_sum(&self) -> f64 {
        self.categories.iter().map(|c| c.duration).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Current period alongside the period immediately before it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodPair {
    pub current: CategorySnapshot,
    pub previous: CategorySnapshot,
}

/// One fixed-length bucket of a stochastic series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StochasticPoint {
    /// End of the point's period
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub end: DateTime<Utc>,
    /// Category name to tracked seconds
    pub categories: BTreeMap<String, f64>,
}

/// Chronological sequence of period snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StochasticSeries {
    pub points: Vec<StochasticPoint>,
    /// Length of each point's bucket (hours)
    pub period_hours: f64,
    /// Source bucket identifier
    pub bucket_id: String,
}

impl StochasticSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A windowed slice of a stochastic series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesWindow {
    pub series: StochasticSeries,
    /// Inclusive start of the window
    pub from: DateTime<Utc>,
    /// Exclusive end of the window
    pub to: DateTime<Utc>,
    /// Number of points that fell inside the window
    pub total_periods: usize,
}

/// Current and previous windows of equal length
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPair {
    pub current: SeriesWindow,
    pub previous: SeriesWindow,
}

/// A single activity occurrence reduced to its time of day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub activity: String,
    /// Local start time, as recorded (HH:MM:SS)
    pub start_time_of_day: chrono::NaiveTime,
    /// Duration (hours)
    pub duration_hours: f64,
}

/// A point on the (time-of-day, duration) plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensitySample {
    /// Time of day as fractional hours in [0, 24)
    pub x: f64,
    /// Duration (hours)
    pub y: f64,
    pub activity: String,
}

/// One closed iso-density ring for an activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourPolygon {
    pub activity: String,
    /// Density threshold this ring traces
    pub level: f64,
    /// Closed path; the first vertex is repeated at the end
    pub ring: Vec<(f64, f64)>,
}

// ============================================================================
// Raw server payloads
// ============================================================================

/// Category payload as served by `/category_data/{bucket}/{hours}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryPayload {
    pub categories: Vec<RawCategory>,
    #[serde(default)]
    pub total_duration: Option<f64>,
}

/// Category entry in a raw payload; the served percentage is not trusted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCategory {
    pub name: String,
    pub duration: f64,
    #[serde(default)]
    pub percentage: Option<f64>,
}

/// Stochastic payload as served by `/stochastic_data/{bucket}/{period}/{days}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StochasticPayload {
    pub period_data: Vec<StochasticPoint>,
    pub period_hours: f64,
    #[serde(default)]
    pub timeframe_days: Option<f64>,
    #[serde(default)]
    pub total_periods: Option<usize>,
    pub bucket_id: String,
}

impl From<StochasticPayload> for StochasticSeries {
    fn from(payload: StochasticPayload) -> Self {
        let mut points = payload.period_data;
        points.sort_by_key(|p| p.end);
        StochasticSeries {
            points,
            period_hours: payload.period_hours,
            bucket_id: payload.bucket_id,
        }
    }
}

/// Event payload for time-of-day analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPayload {
    pub bucket_id: String,
    #[serde(default)]
    pub data_source: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    pub events: Vec<RawEvent>,
}

/// Raw tracked event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    pub data: RawEventData,
    #[serde(default)]
    pub date: Option<String>,
    /// Duration (seconds)
    pub duration: f64,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub time: Option<String>,
    pub timestamp: String,
}

/// Window-watcher event data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEventData {
    pub app: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Parse a timestamp, keeping the offset it was recorded with.
///
/// Accepts RFC 3339 (`2024-01-15T09:30:00+01:00`, `...Z`) and offset-less ISO
/// timestamps, which are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, ComputeError> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    Err(ComputeError::ParseError(format!("Unrecognized timestamp: {}", raw)))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}

/// Convert seconds to hours rounded to two decimals for display
pub fn display_hours(seconds: f64) -> f64 {
    round2(seconds / SECONDS_PER_HOUR)
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_timestamp_keeps_offset() {
        let dt = parse_timestamp("2024-01-15T09:30:15+01:00").unwrap();
        assert_eq!(dt.hour(), 9);
        assert_eq!(dt.minute(), 30);
        assert_eq!(dt.second(), 15);
        assert_eq!(dt.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn test_parse_timestamp_naive_is_utc() {
        let dt = parse_timestamp("2024-01-15T22:05:00.123").unwrap();
        assert_eq!(dt.hour(), 22);
        assert_eq!(dt.offset().local_minus_utc(), 0);

        let spaced = parse_timestamp("2024-01-15 06:00:00").unwrap();
        assert_eq!(spaced.hour(), 6);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(ComputeError::ParseError(_))
        ));
    }

    #[test]
    fn test_stochastic_payload_sorts_points() {
        let json = r#"{
            "period_data": [
                {"end": "2024-01-16T00:00:00Z", "categories": {"Work": 3600}},
                {"end": "2024-01-15T00:00:00Z", "categories": {"Chat": 600}}
            ],
            "period_hours": 24,
            "timeframe_days": 2,
            "total_periods": 2,
            "bucket_id": "aw-watcher-window_host"
        }"#;
        let payload: StochasticPayload = serde_json::from_str(json).unwrap();
        let series = StochasticSeries::from(payload);
        assert_eq!(series.points.len(), 2);
        assert!(series.points[0].end < series.points[1].end);
        assert_eq!(series.points[0].categories["Chat"], 600.0);
    }

    #[test]
    fn test_display_hours_rounds() {
        assert_eq!(display_hours(5400.0), 1.5);
        assert_eq!(display_hours(1000.0), 0.28);
        assert_eq!(display_hours(0.0), 0.0);
    }
}
