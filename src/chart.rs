//! Chart-facing output
//!
//! Shapes pipeline results for the rendering layer. Everything crossing this
//! boundary is in hours rounded to two decimals; earlier stages keep seconds
//! at full precision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ComputeError;
use crate::series::BinnedSeries;
use crate::top_n::TopNSelector;
use crate::types::{display_hours, round2, CategorySnapshot, PeriodPair, OTHER_CATEGORY};

/// One bar pair in a current-vs-previous chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRow {
    pub name: String,
    /// Current period (hours)
    pub current: f64,
    pub current_percentage: f64,
    /// Previous period (hours)
    pub previous: f64,
    pub previous_percentage: f64,
}

/// Direction of the period-over-period change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

/// Totals and change between the two periods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub current_hours: f64,
    pub previous_hours: f64,
    /// `(current - previous) / previous * 100`; 100 when only current has time
    pub change_percentage: f64,
    pub direction: TrendDirection,
}

/// Stacked-area point with every chart category present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackedPoint {
    pub end: DateTime<Utc>,
    /// Category to hours
    pub categories: BTreeMap<String, f64>,
}

/// Stacked-area chart data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackedSeries {
    /// Stacking order
    pub categories: Vec<String>,
    pub points: Vec<StackedPoint>,
}

/// Build name-aligned comparison rows for the top `n` current categories.
///
/// Rows follow the current ranking; `Other` comes last when either side has
/// overflow time.
pub fn comparison_rows(pair: &PeriodPair, n: usize) -> Result<Vec<ComparisonRow>, ComputeError> {
    let reduced = TopNSelector::select_pair(pair, n)?;

    let mut names: Vec<&str> = reduced
        .current
        .categories
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    if !names.contains(&OTHER_CATEGORY)
        && reduced.previous.duration_of(OTHER_CATEGORY).is_some()
    {
        names.push(OTHER_CATEGORY);
    }

    Ok(names
        .into_iter()
        .map(|name| {
            let (current, current_percentage) = side(&reduced.current, name);
            let (previous, previous_percentage) = side(&reduced.previous, name);
            ComparisonRow {
                name: name.to_string(),
                current,
                current_percentage,
                previous,
                previous_percentage,
            }
        })
        .collect())
}

fn side(snapshot: &CategorySnapshot, name: &str) -> (f64, f64) {
    snapshot
        .categories
        .iter()
        .find(|c| c.name == name)
        .map(|c| (display_hours(c.duration), round2(c.percentage)))
        .unwrap_or((0.0, 0.0))
}

/// Summarize the change in total tracked time between the periods
pub fn trend_summary(pair: &PeriodPair) -> TrendSummary {
    let current = pair.current.total_duration;
    let previous = pair.previous.total_duration;

    let change = if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else if current > 0.0 {
        100.0
    } else {
        0.0
    };

    let direction = if change > 0.0 {
        TrendDirection::Up
    } else if change < 0.0 {
        TrendDirection::Down
    } else {
        TrendDirection::Flat
    };

    TrendSummary {
        current_hours: display_hours(current),
        previous_hours: display_hours(previous),
        change_percentage: round2(change),
        direction,
    }
}

/// Convert a binned series to stacked-area points in hours.
///
/// Every point carries every chart category, with 0 where it had no time.
pub fn stacked_series(binned: &BinnedSeries) -> StackedSeries {
    let points = binned
        .points
        .iter()
        .map(|point| StackedPoint {
            end: point.end,
            categories: binned
                .categories
                .iter()
                .map(|name| {
                    let seconds = point.categories.get(name).copied().unwrap_or(0.0);
                    (name.clone(), display_hours(seconds))
                })
                .collect(),
        })
        .collect();

    StackedSeries {
        categories: binned.categories.clone(),
        points,
    }
}
