//! Previous-period derivation
//!
//! Two strategies produce the "previous period" that a current period is
//! compared against:
//!
//! - **Subtraction**: the server is asked for a window twice as long as the
//!   current one and the current snapshot is subtracted from it.
//! - **Windowed filter**: a longer stochastic series is cut into a current
//!   window and an equally long window immediately before it.

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};

use crate::error::ComputeError;
use crate::snapshot::with_percentages;
use crate::types::{
    CategoryRecord, CategorySnapshot, PeriodPair, SeriesPair, SeriesWindow, StochasticSeries,
};

const SECONDS_PER_DAY: i64 = 86_400;

/// Previous-period deriver
pub struct PeriodDeriver;

impl PeriodDeriver {
    /// Derive `previous = combined - current` per category.
    ///
    /// `combined` spans `[t-2h, t]` and `current` spans `[t-h, t]`. Categories
    /// whose derived duration is `<= 0` are dropped. The previous total is
    /// `combined.total - current.total`, clamped at 0, and percentages are
    /// recomputed against it.
    pub fn subtract(combined: &CategorySnapshot, current: &CategorySnapshot) -> CategorySnapshot {
        let mut dropped = 0usize;

        let categories: Vec<CategoryRecord> = combined
            .categories
            .iter()
            .filter_map(|c| {
                let duration = c.duration - current.duration_of(&c.name).unwrap_or(0.0);
                if duration > 0.0 {
                    Some(CategoryRecord {
                        name: c.name.clone(),
                        duration,
                        percentage: 0.0,
                    })
                } else {
                    dropped += 1;
                    None
                }
            })
            .collect();

        // Categories only in `current` derive to a negative duration and are dropped too
        dropped += current
            .categories
            .iter()
            .filter(|c| combined.duration_of(&c.name).is_none() && c.duration > 0.0)
            .count();

        if dropped > 0 {
            warn!(
                "dropped {} categories with non-positive previous-period duration",
                dropped
            );
        }

        let total = (combined.total_duration - current.total_duration).max(0.0);
        with_percentages(categories, total)
    }

    /// Build a period pair from the current snapshot and a double-length one
    pub fn pair_by_subtraction(
        combined: &CategorySnapshot,
        current: CategorySnapshot,
    ) -> PeriodPair {
        let previous = Self::subtract(combined, &current);
        PeriodPair { current, previous }
    }

    /// Select the points whose `end` falls in `[from, to)`
    pub fn select_window(
        series: &StochasticSeries,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<SeriesWindow, ComputeError> {
        validate_range(from, to)?;

        let points: Vec<_> = series
            .points
            .iter()
            .filter(|p| p.end >= from && p.end < to)
            .cloned()
            .collect();
        let total_periods = points.len();

        Ok(SeriesWindow {
            series: StochasticSeries {
                points,
                period_hours: series.period_hours,
                bucket_id: series.bucket_id.clone(),
            },
            from,
            to,
            total_periods,
        })
    }

    /// Cut `series` into the window `[from, to)` and the equally long window
    /// immediately before `from`.
    ///
    /// Fails with `EmptySeries` when the current window holds no points; an
    /// empty previous window is valid.
    pub fn windowed(
        series: &StochasticSeries,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<SeriesPair, ComputeError> {
        let current = Self::select_window(series, from, to)?;
        if current.total_periods == 0 {
            return Err(ComputeError::EmptySeries(format!(
                "bucket '{}' has no points between {} and {}",
                series.bucket_id,
                from.to_rfc3339(),
                to.to_rfc3339()
            )));
        }

        let length = to - from;
        let previous = Self::select_window(series, from - length, from)?;

        debug!(
            "windowed split of '{}': {} current points, {} previous points",
            series.bucket_id, current.total_periods, previous.total_periods
        );

        Ok(SeriesPair { current, previous })
    }

    /// Whole days of stochastic data to request so that both the current
    /// window `[from, to)` and the previous window of equal length are covered
    /// when the server counts back from `now`.
    pub fn fetch_span_days(
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u32, ComputeError> {
        validate_range(from, to)?;
        let previous_from = from - (to - from);
        let span = now - previous_from;
        if span <= Duration::zero() {
            return Ok(1);
        }
        let seconds = span.num_seconds();
        let days = (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
        Ok(u32::try_from(days.max(1)).unwrap_or(u32::MAX))
    }
}

fn validate_range(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<(), ComputeError> {
    if to <= from {
        return Err(ComputeError::InvalidDateRange(format!(
            "end {} is not after start {}",
            to.to_rfc3339(),
            from.to_rfc3339()
        )));
    }
    Ok(())
}
