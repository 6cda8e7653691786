//! Pipeline orchestration
//!
//! This module provides the public API for activity insights. Each request
//! kind carries its own payload and is dispatched to the matching chain of
//! stages:
//!
//! - `comparison`: snapshot builder → previous-period subtraction → top-N → rows
//! - `series`: payload → optional windowed split → series binner → stacked output
//! - `density`: events → time-of-day extraction → density contours

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::chart::{
    comparison_rows, stacked_series, trend_summary, ComparisonRow, StackedSeries, TrendSummary,
};
use crate::config::{DensityConfig, PipelineConfig};
use crate::density::DensityEstimator;
use crate::error::ComputeError;
use crate::events::TimeOfDayExtractor;
use crate::period::PeriodDeriver;
use crate::request::{RequestTicket, RequestTracker};
use crate::series::{BinnedSeries, SeriesBinner};
use crate::snapshot::SnapshotBuilder;
use crate::types::{
    CategoryPayload, ContourPolygon, EventPayload, PeriodPair, StochasticPayload,
    StochasticSeries, OTHER_CATEGORY,
};

/// Half-open date range `[from, to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// A dashboard request, tagged by `kind`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Request {
    /// Current period against the double-length window ending at the same time
    Comparison {
        current: CategoryPayload,
        combined: CategoryPayload,
        #[serde(default)]
        category_count: Option<usize>,
    },
    /// Stochastic series, optionally split into current and previous windows
    Series {
        payload: StochasticPayload,
        #[serde(default)]
        category_count: Option<usize>,
        #[serde(default)]
        range: Option<DateRange>,
    },
    /// Time-of-day density contours over tracked events
    Density {
        payload: EventPayload,
        #[serde(default)]
        config: Option<DensityConfig>,
    },
}

/// Result of a dispatched request, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    Comparison {
        pair: PeriodPair,
        rows: Vec<ComparisonRow>,
        trend: TrendSummary,
    },
    Series {
        bucket_id: String,
        current: StackedSeries,
        /// Present only when a range was requested
        previous: Option<StackedSeries>,
        total_periods: usize,
    },
    Density {
        polygons: Vec<ContourPolygon>,
    },
}

/// Binned current window and, when a range was given, the window before it
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesComparison {
    pub current: BinnedSeries,
    pub previous: Option<BinnedSeries>,
    pub total_periods: usize,
}

/// Derive the current/previous pair from a current payload and a payload
/// covering twice the period.
///
/// # Example
/// ```ignore
/// let pair = compare_periods(&current, &combined)?;
/// println!("{} previous categories", pair.previous.categories.len());
/// ```
pub fn compare_periods(
    current: &CategoryPayload,
    combined: &CategoryPayload,
) -> Result<PeriodPair, ComputeError> {
    let current = SnapshotBuilder::from_payload(current)?;
    let combined = SnapshotBuilder::from_payload(combined)?;
    Ok(PeriodDeriver::pair_by_subtraction(&combined, current))
}

/// Bin a stochastic payload into its top `category_count` categories.
///
/// With a `range`, the series is split into `[from, to)` and the equally long
/// window before it; the previous window is binned with the current window's
/// category set so both charts stack the same categories.
pub fn bin_series(
    payload: StochasticPayload,
    category_count: usize,
    range: Option<DateRange>,
) -> Result<SeriesComparison, ComputeError> {
    let reported_periods = payload.total_periods;
    let series = StochasticSeries::from(payload);

    match range {
        None => {
            let current = SeriesBinner::bin(&series, category_count)?;
            let total_periods = reported_periods.unwrap_or(current.points.len());
            Ok(SeriesComparison {
                current,
                previous: None,
                total_periods,
            })
        }
        Some(DateRange { from, to }) => {
            let pair = PeriodDeriver::windowed(&series, from, to)?;
            let current = SeriesBinner::bin(&pair.current.series, category_count)?;
            let top: Vec<String> = current
                .categories
                .iter()
                .filter(|name| name.as_str() != OTHER_CATEGORY)
                .cloned()
                .collect();
            let previous = SeriesBinner::bin_with_categories(&pair.previous.series, top)?;
            Ok(SeriesComparison {
                current,
                previous: Some(previous),
                total_periods: pair.current.total_periods,
            })
        }
    }
}

/// Contour polygons for the activities in an event payload
pub fn density_contours(
    payload: &EventPayload,
    config: &DensityConfig,
) -> Result<Vec<ContourPolygon>, ComputeError> {
    let records = TimeOfDayExtractor::from_payload(payload)?;
    let samples = TimeOfDayExtractor::to_samples(&records);
    DensityEstimator::estimate(&samples, config)
}

/// Dispatch a request with the default configuration
pub fn process(request: &Request) -> Result<Response, ComputeError> {
    InsightsProcessor::new().process(request)
}

/// Parse a JSON request, dispatch it with the default configuration and
/// return the JSON response
pub fn process_json(json: &str) -> Result<String, ComputeError> {
    InsightsProcessor::new().process_json(json)
}

/// Processor holding the configuration that fills in request defaults and
/// the last-request-wins tracker for its caller.
#[derive(Debug, Default)]
pub struct InsightsProcessor {
    config: PipelineConfig,
    tracker: RequestTracker,
}

impl InsightsProcessor {
    /// Create a processor with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a processor with validated settings
    pub fn with_config(config: PipelineConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            config,
            tracker: RequestTracker::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the stage chain for `request`
    pub fn process(&self, request: &Request) -> Result<Response, ComputeError> {
        match request {
            Request::Comparison {
                current,
                combined,
                category_count,
            } => {
                let n = category_count.unwrap_or(self.config.category_count);
                let pair = compare_periods(current, combined)?;
                let rows = comparison_rows(&pair, n)?;
                let trend = trend_summary(&pair);
                debug!("comparison request: {} rows", rows.len());
                Ok(Response::Comparison { pair, rows, trend })
            }
            Request::Series {
                payload,
                category_count,
                range,
            } => {
                let n = category_count.unwrap_or(self.config.category_count);
                let bucket_id = payload.bucket_id.clone();
                let binned = bin_series(payload.clone(), n, *range)?;
                debug!(
                    "series request for '{}': {} periods",
                    bucket_id, binned.total_periods
                );
                Ok(Response::Series {
                    bucket_id,
                    current: stacked_series(&binned.current),
                    previous: binned.previous.as_ref().map(stacked_series),
                    total_periods: binned.total_periods,
                })
            }
            Request::Density { payload, config } => {
                let config = config.as_ref().unwrap_or(&self.config.density);
                let polygons = density_contours(payload, config)?;
                Ok(Response::Density { polygons })
            }
        }
    }

    /// Parse a JSON request and return the JSON response
    pub fn process_json(&self, json: &str) -> Result<String, ComputeError> {
        let request: Request = serde_json::from_str(json)?;
        let response = self.process(&request)?;
        Ok(serde_json::to_string(&response)?)
    }

    /// Issue a ticket for a new request, superseding all earlier ones
    pub fn begin(&self) -> RequestTicket {
        self.tracker.begin()
    }

    /// Process `request` for `ticket`.
    ///
    /// Returns `Ok(None)` when a newer request was issued before or while this
    /// one was computed; its result must not be shown.
    pub fn complete(
        &self,
        ticket: RequestTicket,
        request: &Request,
    ) -> Result<Option<Response>, ComputeError> {
        if !self.tracker.is_current(ticket) {
            debug!("request {} superseded before processing", ticket.id());
            return Ok(None);
        }
        let response = self.process(request)?;
        Ok(self.tracker.accept(ticket, response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::TrendDirection;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn comparison_json() -> &'static str {
        r#"{
            "kind": "comparison",
            "current": {
                "categories": [
                    {"name": "Work", "duration": 3600, "percentage": 50},
                    {"name": "Media", "duration": 1800},
                    {"name": "Comms", "duration": 1800}
                ]
            },
            "combined": {
                "categories": [
                    {"name": "Work", "duration": 5400},
                    {"name": "Media", "duration": 1800},
                    {"name": "Comms", "duration": 5400}
                ]
            },
            "category_count": 2
        }"#
    }

    fn series_json() -> &'static str {
        r#"{
            "kind": "series",
            "payload": {
                "period_data": [
                    {"end": "2024-03-01T00:00:00Z", "categories": {"Work": 3600, "Chat": 600}},
                    {"end": "2024-03-02T00:00:00Z", "categories": {"Work": 1800, "Games": 7200}},
                    {"end": "2024-03-03T00:00:00Z", "categories": {"Chat": 900, "Mail": 60}},
                    {"end": "2024-03-04T00:00:00Z", "categories": {"Work": 7200, "Mail": 120}}
                ],
                "period_hours": 24,
                "bucket_id": "aw-watcher-window_host"
            },
            "category_count": 1
        }"#
    }

    fn density_payload() -> EventPayload {
        let events: Vec<String> = [
            ("2024-03-01T09:00:00Z", 3600.0),
            ("2024-03-02T09:30:00Z", 4000.0),
            ("2024-03-03T10:00:00Z", 3000.0),
            ("2024-03-04T09:15:00Z", 3500.0),
        ]
        .iter()
        .map(|(ts, secs)| {
            format!(
                r#"{{"data": {{"app": "Editor"}}, "duration": {}, "timestamp": "{}"}}"#,
                secs, ts
            )
        })
        .collect();
        let json = format!(
            r#"{{"bucket_id": "aw-watcher-window_host", "events": [{}]}}"#,
            events.join(",")
        );
        serde_json::from_str(&json).unwrap()
    }

    fn ymd(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_comparison_request() {
        let response = process_json(comparison_json()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&response).unwrap();

        assert_eq!(value["kind"], "comparison");
        assert_eq!(value["rows"][0]["name"], "Work");
        assert_eq!(value["rows"][0]["currentPercentage"], 50.0);
        assert_eq!(value["rows"][2]["name"], "Other");
        assert_eq!(value["trend"]["direction"], "up");
        // Media derives to 0 and is dropped from the previous period
        assert_eq!(
            value["pair"]["previous"]["categories"]
                .as_array()
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_compare_periods_rejects_negative_duration() {
        let current: CategoryPayload =
            serde_json::from_str(r#"{"categories": [{"name": "A", "duration": -1}]}"#).unwrap();
        let combined: CategoryPayload =
            serde_json::from_str(r#"{"categories": [{"name": "A", "duration": 10}]}"#).unwrap();
        assert!(matches!(
            compare_periods(&current, &combined),
            Err(ComputeError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn test_series_request_without_range() {
        let request: Request = serde_json::from_str(series_json()).unwrap();
        let response = process(&request).unwrap();

        match response {
            Response::Series {
                bucket_id,
                current,
                previous,
                total_periods,
            } => {
                assert_eq!(bucket_id, "aw-watcher-window_host");
                // Work 12600s beats Games 7200s
                assert_eq!(current.categories, vec!["Work", "Other"]);
                assert_eq!(current.points.len(), 4);
                assert_eq!(current.points[1].categories["Other"], 2.0);
                assert_eq!(current.points[2].categories["Work"], 0.0);
                assert!(previous.is_none());
                assert_eq!(total_periods, 4);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_series_with_range_shares_categories() {
        let request: Request = serde_json::from_str(series_json()).unwrap();
        let payload = match request {
            Request::Series { payload, .. } => payload,
            _ => unreachable!(),
        };
        let range = DateRange {
            from: ymd(3),
            to: ymd(5),
        };

        let result = bin_series(payload, 1, Some(range)).unwrap();
        let previous = result.previous.unwrap();

        assert_eq!(result.total_periods, 2);
        assert_eq!(result.current.categories, vec!["Work", "Other"]);
        assert_eq!(previous.categories, vec!["Work", "Other"]);
        assert_eq!(previous.points.len(), 2);
        assert_eq!(previous.points[1].categories.get("Other"), Some(&7200.0));
    }

    #[test]
    fn test_series_with_empty_window() {
        let request: Request = serde_json::from_str(series_json()).unwrap();
        let payload = match request {
            Request::Series { payload, .. } => payload,
            _ => unreachable!(),
        };
        let range = DateRange {
            from: ymd(10),
            to: ymd(12),
        };
        assert!(matches!(
            bin_series(payload, 3, Some(range)),
            Err(ComputeError::EmptySeries(_))
        ));
    }

    #[test]
    fn test_series_with_inverted_range() {
        let request: Request = serde_json::from_str(series_json()).unwrap();
        let payload = match request {
            Request::Series { payload, .. } => payload,
            _ => unreachable!(),
        };
        let range = DateRange {
            from: ymd(4),
            to: ymd(2),
        };
        assert!(matches!(
            bin_series(payload, 3, Some(range)),
            Err(ComputeError::InvalidDateRange(_))
        ));
    }

    #[test]
    fn test_density_request() {
        let config = DensityConfig {
            width: 240.0,
            height: 120.0,
            thresholds: 3,
            ..DensityConfig::default()
        };
        let polygons = density_contours(&density_payload(), &config).unwrap();

        assert!(!polygons.is_empty());
        assert!(polygons.iter().all(|p| p.activity == "Editor"));

        let request = Request::Density {
            payload: density_payload(),
            config: Some(config),
        };
        match process(&request).unwrap() {
            Response::Density { polygons: dispatched } => assert_eq!(dispatched, polygons),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_processor_fills_category_count() {
        let processor = InsightsProcessor::with_config(PipelineConfig {
            category_count: 1,
            ..PipelineConfig::default()
        })
        .unwrap();
        let mut request: Request = serde_json::from_str(comparison_json()).unwrap();
        if let Request::Comparison { category_count, .. } = &mut request {
            *category_count = None;
        }

        match processor.process(&request).unwrap() {
            Response::Comparison { rows, trend, .. } => {
                let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
                assert_eq!(names, vec!["Work", "Other"]);
                assert_eq!(trend.direction, TrendDirection::Up);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_processor_rejects_invalid_config() {
        let config = PipelineConfig {
            category_count: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            InsightsProcessor::with_config(config),
            Err(ComputeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_stale_request_is_dropped() {
        let processor = InsightsProcessor::new();
        let request: Request = serde_json::from_str(comparison_json()).unwrap();

        let first = processor.begin();
        let second = processor.begin();

        assert_eq!(processor.complete(first, &request).unwrap(), None);
        assert!(processor.complete(second, &request).unwrap().is_some());
    }

    #[test]
    fn test_unknown_kind() {
        let result = process_json(r#"{"kind": "heatmap"}"#);
        assert!(matches!(result, Err(ComputeError::JsonError(_))));
    }

    #[test]
    fn test_invalid_json() {
        let result = process_json("not json");
        assert!(result.is_err());
    }

    #[test]
    fn test_pipeline_idempotent() {
        let first = process_json(series_json()).unwrap();
        let second = process_json(series_json()).unwrap();
        assert_eq!(first, second);
    }
}
