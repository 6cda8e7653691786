//! Pipeline configuration
//!
//! Tunables for the CLI and FFI surfaces. Library entry points take these
//! values explicitly; a config only supplies the defaults.

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

/// Default number of named categories before the overflow bucket
pub const DEFAULT_CATEGORY_COUNT: usize = 10;

/// Largest density grid, in nodes, the estimator will allocate
pub const MAX_GRID_NODES: usize = 4_000_000;

/// Settings for the time-of-day density estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityConfig {
    /// Plot width in pixels
    pub width: f64,
    /// Plot height in pixels
    pub height: f64,
    /// Grid cell edge in pixels
    pub cell_size: f64,
    /// Gaussian kernel standard deviation along the time-of-day axis (hours)
    pub bandwidth_hours: f64,
    /// Number of iso-density levels to extract
    pub thresholds: usize,
    /// Activities kept, ranked by aggregate duration
    pub max_activities: usize,
    /// Samples shorter than this are dropped as noise (hours)
    pub min_duration_hours: f64,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            width: 600.0,
            height: 380.0,
            cell_size: 4.0,
            bandwidth_hours: 1.0,
            thresholds: 15,
            max_activities: 10,
            min_duration_hours: 0.0,
        }
    }
}

impl DensityConfig {
    pub fn validate(&self) -> Result<(), ComputeError> {
        if !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
        {
            return Err(ComputeError::InvalidConfig(format!(
                "plot size must be positive and finite, got {}x{}",
                self.width, self.height
            )));
        }
        if !self.cell_size.is_finite()
            || self.cell_size <= 0.0
            || self.cell_size > self.width.min(self.height)
        {
            return Err(ComputeError::InvalidConfig(format!(
                "cell size {} does not fit a {}x{} plot",
                self.cell_size, self.width, self.height
            )));
        }
        self.grid_size()?;
        if !self.bandwidth_hours.is_finite() || self.bandwidth_hours <= 0.0 {
            return Err(ComputeError::InvalidConfig(format!(
                "bandwidth must be positive and finite, got {}",
                self.bandwidth_hours
            )));
        }
        if self.thresholds == 0 {
            return Err(ComputeError::InvalidConfig(
                "at least one threshold is required".to_string(),
            ));
        }
        if self.max_activities == 0 {
            return Err(ComputeError::InvalidConfig(
                "at least one activity must be kept".to_string(),
            ));
        }
        if !self.min_duration_hours.is_finite() || self.min_duration_hours < 0.0 {
            return Err(ComputeError::InvalidConfig(format!(
                "minimum duration must be a non-negative number, got {}",
                self.min_duration_hours
            )));
        }
        Ok(())
    }

    /// Grid columns and rows covering the plot, at most `MAX_GRID_NODES` nodes
    pub fn grid_size(&self) -> Result<(usize, usize), ComputeError> {
        // Float to usize casts saturate, so oversized plots fail the node check
        let nx = (self.width / self.cell_size).ceil() as usize;
        let ny = (self.height / self.cell_size).ceil() as usize;
        match nx.checked_mul(ny) {
            Some(nodes) if nodes > 0 && nodes <= MAX_GRID_NODES => Ok((nx, ny)),
            _ => Err(ComputeError::InvalidConfig(format!(
                "a {}x{} plot with cell size {} exceeds {} grid nodes",
                self.width, self.height, self.cell_size, MAX_GRID_NODES
            ))),
        }
    }
}

/// Top-level pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Named categories shown before the overflow bucket
    pub category_count: usize,
    pub density: DensityConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            category_count: DEFAULT_CATEGORY_COUNT,
            density: DensityConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.category_count == 0 {
            return Err(ComputeError::InvalidConfig(
                "category count must be at least 1".to_string(),
            ));
        }
        self.density.validate()
    }

    /// Load configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = PipelineConfig::from_json(r#"{"density": {"thresholds": 5}}"#).unwrap();
        assert_eq!(config.category_count, DEFAULT_CATEGORY_COUNT);
        assert_eq!(config.density.thresholds, 5);
        assert_eq!(config.density.width, 600.0);
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = PipelineConfig::default();
        config.category_count = 4;
        config.density.bandwidth_hours = 0.5;
        let restored = PipelineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_rejects_zero_category_count() {
        let result = PipelineConfig::from_json(r#"{"category_count": 0}"#);
        assert!(matches!(result, Err(ComputeError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_oversized_grid() {
        let result =
            PipelineConfig::from_json(r#"{"density": {"width": 1e10, "height": 1e10, "cell_size": 1}}"#);
        assert!(matches!(result, Err(ComputeError::InvalidConfig(_))));

        let just_over = DensityConfig {
            width: 2001.0,
            height: 2000.0,
            cell_size: 1.0,
            ..DensityConfig::default()
        };
        assert!(matches!(
            just_over.validate(),
            Err(ComputeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_grid_size_of_defaults() {
        assert_eq!(DensityConfig::default().grid_size().unwrap(), (150, 95));
    }

    #[test]
    fn test_rejects_non_finite_values() {
        let defaults = DensityConfig::default();
        let configs = [
            DensityConfig {
                width: f64::INFINITY,
                ..defaults.clone()
            },
            DensityConfig {
                cell_size: f64::NAN,
                ..defaults.clone()
            },
            DensityConfig {
                bandwidth_hours: f64::INFINITY,
                ..defaults.clone()
            },
            DensityConfig {
                min_duration_hours: f64::NAN,
                ..defaults.clone()
            },
        ];
        for config in &configs {
            assert!(
                matches!(config.validate(), Err(ComputeError::InvalidConfig(_))),
                "{:?}",
                config
            );
        }
    }

    #[test]
    fn test_rejects_non_positive_bandwidth() {
        let config = DensityConfig {
            bandwidth_hours: 0.0,
            ..DensityConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ComputeError::InvalidConfig(_))
        ));
    }
}
