//! Stochastic series binning
//!
//! Applies top-N selection across every point of a time series. Category
//! membership is ranked once over the whole window and then applied to each
//! point, so a category never appears or disappears between frames.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ComputeError;
use crate::top_n::TopNSelector;
use crate::types::{StochasticSeries, OTHER_CATEGORY};

/// A series point partitioned into the global category set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinnedPoint {
    pub end: DateTime<Utc>,
    /// Category to seconds; only categories present at this point
    pub categories: BTreeMap<String, f64>,
}

/// A series whose every point uses the same category set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinnedSeries {
    /// Global top-N in rank order, followed by `Other` when any point has it
    pub categories: Vec<String>,
    pub points: Vec<BinnedPoint>,
    pub period_hours: f64,
    pub bucket_id: String,
}

/// Two-pass binner: global ranking, then per-point partition
pub struct SeriesBinner;

impl SeriesBinner {
    /// Total seconds per category over the whole series, in order of first
    /// appearance (chronological, then by name within a point)
    pub fn global_totals(series: &StochasticSeries) -> Result<Vec<(String, f64)>, ComputeError> {
        let mut totals: Vec<(String, f64)> = Vec::new();

        for point in &series.points {
            for (name, &seconds) in &point.categories {
                if !seconds.is_finite() || seconds < 0.0 {
                    return Err(ComputeError::InvalidSnapshot(format!(
                        "category '{}' at {} has invalid duration {}",
                        name,
                        point.end.to_rfc3339(),
                        seconds
                    )));
                }
                match totals.iter_mut().find(|(n, _)| n == name) {
                    Some((_, total)) => *total += seconds,
                    None => totals.push((name.clone(), seconds)),
                }
            }
        }

        Ok(totals)
    }

    /// The global top-`n` category names for a series
    pub fn top_categories(series: &StochasticSeries, n: usize) -> Result<Vec<String>, ComputeError> {
        let totals = Self::global_totals(series)?;
        Ok(TopNSelector::rank(
            totals.iter().map(|(name, total)| (name.as_str(), *total)),
            n,
        ))
    }

    /// Bin every point of `series` into the global top-`n` plus `Other`.
    ///
    /// `Other` holds everything else at that point and is omitted per point
    /// when it sums to 0. An empty series bins to an empty result.
    pub fn bin(series: &StochasticSeries, n: usize) -> Result<BinnedSeries, ComputeError> {
        if n == 0 {
            return Err(ComputeError::InvalidConfig(
                "category count must be at least 1".to_string(),
            ));
        }
        let top = Self::top_categories(series, n)?;
        Self::bin_with_categories(series, top)
    }

    /// Bin every point into a category set chosen elsewhere, e.g. the set of
    /// the current window applied to the previous one
    pub fn bin_with_categories(
        series: &StochasticSeries,
        top: Vec<String>,
    ) -> Result<BinnedSeries, ComputeError> {
        let mut points = Vec::with_capacity(series.points.len());

        for point in &series.points {
            let mut categories = BTreeMap::new();
            let mut other = 0.0;
            for (name, &seconds) in &point.categories {
                if !seconds.is_finite() || seconds < 0.0 {
                    return Err(ComputeError::InvalidSnapshot(format!(
                        "category '{}' at {} has invalid duration {}",
                        name,
                        point.end.to_rfc3339(),
                        seconds
                    )));
                }
                if top.contains(name) {
                    categories.insert(name.clone(), seconds);
                } else {
                    other += seconds;
                }
            }
            if other > 0.0 {
                *categories.entry(OTHER_CATEGORY.to_string()).or_insert(0.0) += other;
            }
            points.push(BinnedPoint {
                end: point.end,
                categories,
            });
        }

        let mut categories = top;
        let has_other = points
            .iter()
            .any(|p| p.categories.contains_key(OTHER_CATEGORY));
        if has_other && !categories.iter().any(|c| c == OTHER_CATEGORY) {
            categories.push(OTHER_CATEGORY.to_string());
        }

        debug!(
            "binned {} points of '{}' into {} categories",
            points.len(),
            series.bucket_id,
            categories.len()
        );

        Ok(BinnedSeries {
            categories,
            points,
            period_hours: series.period_hours,
            bucket_id: series.bucket_id.clone(),
        })
    }
}
