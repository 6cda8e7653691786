//! Top-N category selection with an overflow bucket
//!
//! Reduces an arbitrary category set to the N largest entries plus a synthetic
//! `Other` category holding the remainder.

use log::debug;

use crate::error::ComputeError;
use crate::snapshot::with_percentages;
use crate::types::{CategoryRecord, CategorySnapshot, PeriodPair, OTHER_CATEGORY};

/// Top-N selector
pub struct TopNSelector;

impl TopNSelector {
    /// Rank `(name, seconds)` entries by duration, descending, and return the
    /// first `n` names. Ties keep their input order.
    pub fn rank<'a, I>(entries: I, n: usize) -> Vec<String>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut ranked: Vec<(&str, f64)> = entries.into_iter().collect();
        // `sort_by` is stable, so equal durations stay in input order
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
            .into_iter()
            .take(n)
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Keep the `n` longest categories and fold the rest into `Other`.
    ///
    /// The snapshot total is kept as the percentage denominator.
    pub fn select(snapshot: &CategorySnapshot, n: usize) -> Result<CategorySnapshot, ComputeError> {
        validate_n(n)?;
        let names = Self::rank(
            snapshot.categories.iter().map(|c| (c.name.as_str(), c.duration)),
            n,
        );
        Ok(Self::apply(snapshot, &names))
    }

    /// Reduce both sides of a pair to the same name set.
    ///
    /// The set is chosen from `current` only. On the `previous` side a selected
    /// name that is missing contributes 0, and anything outside the set goes to
    /// `Other` however large it is.
    pub fn select_pair(pair: &PeriodPair, n: usize) -> Result<PeriodPair, ComputeError> {
        validate_n(n)?;
        let names = Self::rank(
            pair.current
                .categories
                .iter()
                .map(|c| (c.name.as_str(), c.duration)),
            n,
        );

        debug!("paired top-{} selection: {:?}", n, names);

        Ok(PeriodPair {
            current: Self::apply(&pair.current, &names),
            previous: Self::apply(&pair.previous, &names),
        })
    }

    /// Partition `snapshot` into `names`, in that order, plus `Other`.
    ///
    /// Names absent from the snapshot appear with a zero duration. `Other` is
    /// omitted when its sum is 0.
    pub fn apply(snapshot: &CategorySnapshot, names: &[String]) -> CategorySnapshot {
        let mut categories: Vec<CategoryRecord> = names
            .iter()
            .map(|name| CategoryRecord {
                name: name.clone(),
                duration: snapshot.duration_of(name).unwrap_or(0.0),
                percentage: 0.0,
            })
            .collect();

        let overflow: f64 = snapshot
            .categories
            .iter()
            .filter(|c| !names.contains(&c.name))
            .map(|c| c.duration)
            .sum();

        if overflow > 0.0 {
            // A real category called "Other" absorbs the overflow instead of
            // producing a second entry with the same name
            match categories.iter_mut().find(|c| c.name == OTHER_CATEGORY) {
                Some(existing) => existing.duration += overflow,
                None => categories.push(CategoryRecord {
                    name: OTHER_CATEGORY.to_string(),
                    duration: overflow,
                    percentage: 0.0,
                }),
            }
        }

        with_percentages(categories, snapshot.total_duration)
    }
}

fn validate_n(n: usize) -> Result<(), ComputeError> {
    if n == 0 {
        return Err(ComputeError::InvalidConfig(
            "category count must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotBuilder;
    use pretty_assertions::assert_eq;

    fn names(snapshot: &CategorySnapshot) -> Vec<&str> {
        snapshot.categories.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_top_two_with_other() {
        let snapshot =
            SnapshotBuilder::build([("A", 3600.0), ("B", 1800.0), ("C", 1800.0)], None).unwrap();

        let reduced = TopNSelector::select(&snapshot, 2).unwrap();

        assert_eq!(names(&reduced), vec!["A", "B", "Other"]);
        assert_eq!(reduced.duration_of("Other"), Some(1800.0));
        assert_eq!(reduced.categories[2].percentage, 25.0);
        assert_eq!(reduced.total_duration, 7200.0);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let snapshot =
            SnapshotBuilder::build([("C", 60.0), ("A", 60.0), ("B", 60.0)], None).unwrap();
        let reduced = TopNSelector::select(&snapshot, 2).unwrap();
        assert_eq!(names(&reduced), vec!["C", "A", "Other"]);
    }

    #[test]
    fn test_other_omitted_when_empty() {
        let snapshot = SnapshotBuilder::build([("A", 60.0), ("B", 0.0)], None).unwrap();
        let reduced = TopNSelector::select(&snapshot, 1).unwrap();
        assert_eq!(names(&reduced), vec!["A"]);

        let all = TopNSelector::select(&snapshot, 10).unwrap();
        assert_eq!(names(&all), vec!["A", "B"]);
    }

    #[test]
    fn test_conservation_for_every_n() {
        let snapshot = SnapshotBuilder::build(
            [("A", 17.5), ("B", 300.0), ("C", 42.0), ("D", 9.25), ("E", 300.0)],
            None,
        )
        .unwrap();
        let original = snapshot.category_sum();

        for n in 1..=6 {
            let reduced = TopNSelector::select(&snapshot, n).unwrap();
            assert!((reduced.category_sum() - original).abs() < 1e-9, "n = {}", n);
        }
    }

    #[test]
    fn test_zero_n_rejected() {
        let snapshot = SnapshotBuilder::build([("A", 1.0)], None).unwrap();
        assert!(matches!(
            TopNSelector::select(&snapshot, 0),
            Err(ComputeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_pair_uses_current_names() {
        let current =
            SnapshotBuilder::build([("A", 3000.0), ("B", 2000.0), ("C", 100.0)], None).unwrap();
        let previous =
            SnapshotBuilder::build([("Z", 9000.0), ("A", 1000.0), ("C", 500.0)], None).unwrap();
        let pair = PeriodPair { current, previous };

        let reduced = TopNSelector::select_pair(&pair, 2).unwrap();

        assert_eq!(names(&reduced.current), vec!["A", "B", "Other"]);
        assert_eq!(names(&reduced.previous), vec!["A", "B", "Other"]);
        assert_eq!(reduced.previous.duration_of("B"), Some(0.0));
        // Z is large but outside the current selection
        assert_eq!(reduced.previous.duration_of("Other"), Some(9500.0));
    }

    #[test]
    fn test_real_other_category_absorbs_overflow() {
        let snapshot =
            SnapshotBuilder::build([("Other", 500.0), ("A", 400.0), ("B", 100.0)], None).unwrap();
        let reduced = TopNSelector::select(&snapshot, 1).unwrap();
        assert_eq!(names(&reduced), vec!["Other"]);
        assert_eq!(reduced.duration_of("Other"), Some(1000.0));
    }
}
