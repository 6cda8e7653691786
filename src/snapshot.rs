//! Category snapshot construction
//!
//! Normalizes raw name/duration pairs into a snapshot whose percentages are
//! recomputed against a single authoritative total.

use log::debug;

use crate::error::ComputeError;
use crate::types::{CategoryPayload, CategoryRecord, CategorySnapshot};

/// Builder for validated category snapshots
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Build a snapshot from `(name, seconds)` pairs.
    ///
    /// `total_duration` defaults to the sum of all durations. Percentages are
    /// `duration / total * 100`, or 0 everywhere when the total is 0.
    pub fn build<I, S>(
        entries: I,
        total_duration: Option<f64>,
    ) -> Result<CategorySnapshot, ComputeError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut categories: Vec<CategoryRecord> = Vec::new();

        for (name, duration) in entries {
            let name = name.into();
            validate_entry(&name, duration)?;
            if categories.iter().any(|c| c.name == name) {
                return Err(ComputeError::InvalidSnapshot(format!(
                    "duplicate category '{}'",
                    name
                )));
            }
            categories.push(CategoryRecord {
                name,
                duration,
                percentage: 0.0,
            });
        }

        let total = match total_duration {
            Some(total) if !total.is_finite() || total < 0.0 => {
                return Err(ComputeError::InvalidSnapshot(format!(
                    "total duration must be a non-negative number, got {}",
                    total
                )));
            }
            Some(total) => total,
            None => categories.iter().map(|c| c.duration).sum(),
        };

        debug!(
            "built snapshot with {} categories, total {:.0}s",
            categories.len(),
            total
        );

        Ok(with_percentages(categories, total))
    }

    /// Build a snapshot from a server category payload
    pub fn from_payload(payload: &CategoryPayload) -> Result<CategorySnapshot, ComputeError> {
        Self::build(
            payload
                .categories
                .iter()
                .map(|c| (c.name.clone(), c.duration)),
            payload.total_duration,
        )
    }

    /// Parse and build a snapshot from category payload JSON
    pub fn from_json(json: &str) -> Result<CategorySnapshot, ComputeError> {
        let payload: CategoryPayload = serde_json::from_str(json)?;
        Self::from_payload(&payload)
    }
}

/// Recompute every percentage against `total_duration`
pub(crate) fn with_percentages(
    mut categories: Vec<CategoryRecord>,
    total_duration: f64,
) -> CategorySnapshot {
    for category in &mut categories {
        category.percentage = percentage_of(category.duration, total_duration);
    }
    CategorySnapshot {
        categories,
        total_duration,
    }
}

pub(crate) fn percentage_of(duration: f64, total_duration: f64) -> f64 {
    if total_duration > 0.0 {
        duration / total_duration * 100.0
    } else {
        0.0
    }
}

fn validate_entry(name: &str, duration: f64) -> Result<(), ComputeError> {
    if name.is_empty() {
        return Err(ComputeError::InvalidSnapshot(
            "category name cannot be empty".to_string(),
        ));
    }
    if !duration.is_finite() {
        return Err(ComputeError::InvalidSnapshot(format!(
            "category '{}' has a non-finite duration",
            name
        )));
    }
    if duration < 0.0 {
        return Err(ComputeError::InvalidSnapshot(format!(
            "category '{}' has negative duration {}",
            name, duration
        )));
    }
    Ok(())
}
