//! Time-of-day density contours
//!
//! Builds a Gaussian kernel density estimate over the (time-of-day, duration)
//! plane for each activity and traces iso-density rings through it.
//!
//! Pipeline: samples → noise filter → top-K activities → per-activity KDE grid
//! → threshold levels → marching squares → contour polygons
//!
//! The estimate is computed in plot space: the plane is scaled to the
//! configured width and height, and the kernel is isotropic there with a
//! standard deviation of `bandwidth_hours` along the time axis. Densities are
//! points per square pixel.

pub mod contour;

use log::{debug, warn};
use std::f64::consts::PI;

use crate::config::DensityConfig;
use crate::error::ComputeError;
use crate::top_n::TopNSelector;
use crate::types::{ContourPolygon, DensitySample};

/// Hours on the time-of-day axis
pub const HOURS_PER_DAY: f64 = 24.0;

/// Fewest distinct times of day an activity needs for a usable estimate
pub const MIN_DISTINCT_SAMPLES: usize = 2;

/// Kernel contributions beyond this many standard deviations are ignored
const KERNEL_CUTOFF_SIGMAS: f64 = 4.0;

/// Kernel density values on a regular grid over the plot
#[derive(Debug, Clone, PartialEq)]
pub struct DensityGrid {
    /// Columns (time-of-day axis)
    pub nx: usize,
    /// Rows (duration axis)
    pub ny: usize,
    /// Row-major densities, `values[j * nx + i]`
    pub values: Vec<f64>,
    /// Top of the duration axis (hours)
    pub y_max: f64,
    cell_size: f64,
    width: f64,
    height: f64,
}

impl DensityGrid {
    /// Estimate the density of `samples` on a grid spanning `[0, 24]` hours of
    /// day by `[0, y_max]` hours of duration.
    ///
    /// Fails with `InsufficientSamples` when fewer than two distinct times of
    /// day are present.
    pub fn estimate(
        samples: &[DensitySample],
        y_max: f64,
        config: &DensityConfig,
    ) -> Result<Self, ComputeError> {
        config.validate()?;

        let distinct = distinct_times(samples);
        if distinct < MIN_DISTINCT_SAMPLES {
            return Err(ComputeError::InsufficientSamples(format!(
                "{} distinct times of day, need {}",
                distinct, MIN_DISTINCT_SAMPLES
            )));
        }

        let y_max = if y_max > 0.0 && y_max.is_finite() { y_max } else { 1.0 };
        let (nx, ny) = config.grid_size()?;
        let x_scale = config.width / HOURS_PER_DAY;
        let y_scale = config.height / y_max;

        let sigma = config.bandwidth_hours * x_scale;
        let two_sigma_sq = 2.0 * sigma * sigma;
        let norm = 1.0 / (PI * two_sigma_sq);
        let reach = KERNEL_CUTOFF_SIGMAS * sigma;

        let mut values = vec![0.0; nx * ny];
        let mut wx = vec![0.0; nx];
        let mut wy = vec![0.0; ny];

        for sample in samples {
            let px = sample.x * x_scale;
            let py = sample.y * y_scale;

            // The kernel is separable: weight(i, j) = wx[i] * wy[j]
            let (i0, i1) = node_span(px, reach, config.cell_size, nx);
            let (j0, j1) = node_span(py, reach, config.cell_size, ny);
            if i0 > i1 || j0 > j1 {
                continue;
            }
            for i in i0..=i1 {
                let dx = node_position(i, config.cell_size) - px;
                wx[i] = (-dx * dx / two_sigma_sq).exp();
            }
            for j in j0..=j1 {
                let dy = node_position(j, config.cell_size) - py;
                wy[j] = (-dy * dy / two_sigma_sq).exp();
            }
            for j in j0..=j1 {
                let row = j * nx;
                for i in i0..=i1 {
                    values[row + i] += norm * wx[i] * wy[j];
                }
            }
        }

        Ok(Self {
            nx,
            ny,
            values,
            y_max,
            cell_size: config.cell_size,
            width: config.width,
            height: config.height,
        })
    }

    /// Largest density on the grid
    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    /// Density at grid node `(i, j)`
    pub fn value(&self, i: usize, j: usize) -> Option<f64> {
        if i < self.nx && j < self.ny {
            Some(self.values[j * self.nx + i])
        } else {
            None
        }
    }

    /// Closed rings at `level`, in data coordinates (hours of day, hours)
    pub fn rings(&self, level: f64) -> Vec<Vec<(f64, f64)>> {
        contour::isolines(&self.values, self.nx, self.ny, level)
            .into_iter()
            .map(|ring| ring.into_iter().map(|(u, v)| self.to_data(u, v)).collect())
            .collect()
    }

    /// Map fractional node coordinates back onto the data plane, clamped to
    /// the plot bounds
    fn to_data(&self, u: f64, v: f64) -> (f64, f64) {
        let px = ((u + 0.5) * self.cell_size).clamp(0.0, self.width);
        let py = ((v + 0.5) * self.cell_size).clamp(0.0, self.height);
        (
            px / self.width * HOURS_PER_DAY,
            py / self.height * self.y_max,
        )
    }
}

/// Density contour estimator
pub struct DensityEstimator;

impl DensityEstimator {
    /// Contour polygons for every retained activity.
    ///
    /// Samples shorter than `min_duration_hours` are dropped, then only the
    /// `max_activities` activities with the largest aggregate duration are
    /// kept. Activities without enough distinct samples yield no polygons.
    /// Output is ordered by activity rank, then level, then ring.
    pub fn estimate(
        samples: &[DensitySample],
        config: &DensityConfig,
    ) -> Result<Vec<ContourPolygon>, ComputeError> {
        config.validate()?;

        let retained = Self::prefilter(samples, config);
        let activities = rank_activities(&retained, config.max_activities);
        let y_max = retained.iter().map(|s| s.y).fold(0.0, f64::max);

        let mut polygons = Vec::new();
        for activity in &activities {
            let activity_samples: Vec<DensitySample> = retained
                .iter()
                .filter(|s| &s.activity == activity)
                .cloned()
                .collect();

            match Self::estimate_activity(activity, &activity_samples, y_max, config) {
                Ok(mut contours) => polygons.append(&mut contours),
                Err(ComputeError::InsufficientSamples(reason)) => {
                    warn!("no contours for '{}': {}", activity, reason);
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            "density estimate: {} samples, {} activities, {} polygons",
            retained.len(),
            activities.len(),
            polygons.len()
        );

        Ok(polygons)
    }

    /// Contour polygons for a single activity's samples.
    ///
    /// Fails with `InsufficientSamples` when the activity has fewer than two
    /// distinct times of day.
    pub fn estimate_activity(
        activity: &str,
        samples: &[DensitySample],
        y_max: f64,
        config: &DensityConfig,
    ) -> Result<Vec<ContourPolygon>, ComputeError> {
        let grid = DensityGrid::estimate(samples, y_max, config).map_err(|e| match e {
            ComputeError::InsufficientSamples(reason) => {
                ComputeError::InsufficientSamples(format!("activity '{}': {}", activity, reason))
            }
            other => other,
        })?;

        let mut polygons = Vec::new();
        for level in Self::threshold_levels(grid.max(), config.thresholds) {
            for ring in grid.rings(level) {
                polygons.push(ContourPolygon {
                    activity: activity.to_string(),
                    level,
                    ring,
                });
            }
        }
        Ok(polygons)
    }

    /// Drop samples under the noise cutoff or outside the plane
    pub fn prefilter(samples: &[DensitySample], config: &DensityConfig) -> Vec<DensitySample> {
        let mut rejected = 0usize;
        let kept: Vec<DensitySample> = samples
            .iter()
            .filter(|s| {
                let valid = s.x.is_finite()
                    && (0.0..HOURS_PER_DAY).contains(&s.x)
                    && s.y.is_finite()
                    && s.y >= config.min_duration_hours;
                if !valid {
                    rejected += 1;
                }
                valid
            })
            .cloned()
            .collect();

        if rejected > 0 {
            warn!("dropped {} samples before density estimation", rejected);
        }
        kept
    }

    /// `k` evenly spaced levels strictly between 0 and `max`
    pub fn threshold_levels(max: f64, k: usize) -> Vec<f64> {
        if !(max > 0.0) || !max.is_finite() {
            return Vec::new();
        }
        (1..=k).map(|i| max * i as f64 / (k + 1) as f64).collect()
    }
}

/// Activities ranked by aggregate duration, first appearance breaking ties
fn rank_activities(samples: &[DensitySample], k: usize) -> Vec<String> {
    let mut totals: Vec<(&str, f64)> = Vec::new();
    for sample in samples {
        match totals.iter_mut().find(|(name, _)| *name == sample.activity) {
            Some((_, total)) => *total += sample.y,
            None => totals.push((sample.activity.as_str(), sample.y)),
        }
    }
    TopNSelector::rank(totals, k)
}

fn distinct_times(samples: &[DensitySample]) -> usize {
    let mut xs: Vec<f64> = samples.iter().map(|s| s.x).collect();
    xs.sort_by(f64::total_cmp);
    xs.dedup();
    xs.len()
}

/// Pixel position of grid node `index` (node centres sit mid-cell)
fn node_position(index: usize, cell_size: f64) -> f64 {
    (index as f64 + 0.5) * cell_size
}

/// Inclusive node range within `reach` pixels of `position`
fn node_span(position: f64, reach: f64, cell_size: f64, count: usize) -> (usize, usize) {
    let lo = ((position - reach) / cell_size - 0.5).ceil().max(0.0) as usize;
    let hi = ((position + reach) / cell_size - 0.5).floor();
    if hi < 0.0 {
        return (1, 0);
    }
    (lo, (hi as usize).min(count - 1))
}
