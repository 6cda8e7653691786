//! Marching-squares isoline extraction
//!
//! Traces closed rings where a scalar grid crosses a level. The grid is
//! treated as surrounded by zeros, so every ring closes for a positive level.

use std::collections::{BTreeMap, BTreeSet};

/// A grid edge that a ring crosses, in padded node coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Edge {
    /// From node `(p, q)` to `(p + 1, q)`
    Horizontal(usize, usize),
    /// From node `(p, q)` to `(p, q + 1)`
    Vertical(usize, usize),
}

/// Grid values padded with a ring of zeros
struct PaddedGrid<'a> {
    values: &'a [f64],
    nx: usize,
    ny: usize,
}

impl PaddedGrid<'_> {
    fn get(&self, p: usize, q: usize) -> f64 {
        if p == 0 || q == 0 || p > self.nx || q > self.ny {
            return 0.0;
        }
        self.values[(q - 1) * self.nx + (p - 1)]
    }
}

/// Extract the closed rings where `values` crosses `level`.
///
/// `values` is row-major with `nx` columns and `ny` rows. Vertices are in node
/// coordinates (`(i, j)` is the node at column `i`, row `j`) and each ring
/// repeats its first vertex at the end. Returns nothing for a non-positive or
/// non-finite level.
pub fn isolines(values: &[f64], nx: usize, ny: usize, level: f64) -> Vec<Vec<(f64, f64)>> {
    if nx == 0 || ny == 0 || values.len() != nx * ny || !(level > 0.0) || !level.is_finite() {
        return Vec::new();
    }

    let grid = PaddedGrid { values, nx, ny };
    let mut adjacency: BTreeMap<Edge, Vec<Edge>> = BTreeMap::new();

    // Padded grid has nx + 2 by ny + 2 nodes, hence nx + 1 by ny + 1 cells
    for q in 0..=ny {
        for p in 0..=nx {
            for (a, b) in cell_segments(&grid, p, q, level) {
                adjacency.entry(a).or_default().push(b);
                adjacency.entry(b).or_default().push(a);
            }
        }
    }

    let mut visited: BTreeSet<Edge> = BTreeSet::new();
    let mut rings = Vec::new();

    for &start in adjacency.keys() {
        if visited.contains(&start) {
            continue;
        }

        let mut ring = vec![crossing(&grid, start, level)];
        visited.insert(start);
        let mut previous = start;
        let mut current = match adjacency[&start].first() {
            Some(&next) => next,
            None => continue,
        };

        while current != start {
            visited.insert(current);
            ring.push(crossing(&grid, current, level));
            let next = adjacency[&current]
                .iter()
                .copied()
                .find(|&candidate| candidate != previous);
            previous = current;
            current = match next {
                Some(next) => next,
                None => break,
            };
        }

        if ring.len() >= 3 {
            ring.push(ring[0]);
            rings.push(ring);
        }
    }

    rings
}

/// Segments crossing cell `(p, q)`, whose corners are nodes `(p, q)` through
/// `(p + 1, q + 1)` of the padded grid
fn cell_segments(grid: &PaddedGrid<'_>, p: usize, q: usize, level: f64) -> Vec<(Edge, Edge)> {
    let a = grid.get(p, q);
    let b = grid.get(p + 1, q);
    let c = grid.get(p + 1, q + 1);
    let d = grid.get(p, q + 1);

    let case = (a >= level) as u8
        | ((b >= level) as u8) << 1
        | ((c >= level) as u8) << 2
        | ((d >= level) as u8) << 3;

    let bottom = Edge::Horizontal(p, q);
    let top = Edge::Horizontal(p, q + 1);
    let left = Edge::Vertical(p, q);
    let right = Edge::Vertical(p + 1, q);

    match case {
        0 | 15 => Vec::new(),
        1 | 14 => vec![(left, bottom)],
        2 | 13 => vec![(bottom, right)],
        3 | 12 => vec![(left, right)],
        4 | 11 => vec![(right, top)],
        6 | 9 => vec![(bottom, top)],
        7 | 8 => vec![(left, top)],
        5 | 10 => {
            // Saddle: the cell centre decides which diagonal is connected
            let centre_above = (a + b + c + d) / 4.0 >= level;
            let a_and_c_above = case == 5;
            if centre_above == a_and_c_above {
                vec![(left, top), (bottom, right)]
            } else {
                vec![(left, bottom), (right, top)]
            }
        }
        _ => unreachable!("case index is four bits"),
    }
}

/// Linearly interpolated crossing point, in unpadded node coordinates
fn crossing(grid: &PaddedGrid<'_>, edge: Edge, level: f64) -> (f64, f64) {
    let (p, q, dp, dq) = match edge {
        Edge::Horizontal(p, q) => (p, q, 1, 0),
        Edge::Vertical(p, q) => (p, q, 0, 1),
    };
    let v0 = grid.get(p, q);
    let v1 = grid.get(p + dp, q + dq);
    let t = if v1 != v0 {
        ((level - v0) / (v1 - v0)).clamp(0.0, 1.0)
    } else {
        0.5
    };
    (
        p as f64 + t * dp as f64 - 1.0,
        q as f64 + t * dq as f64 - 1.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn distinct(ring: &[(f64, f64)]) -> Vec<(f64, f64)> {
        ring[..ring.len() - 1].to_vec()
    }

    #[test]
    fn test_single_peak_gives_diamond() {
        #[rustfmt::skip]
        let values = [
            0.0, 0.0, 0.0,
            0.0, 1.0, 0.0,
            0.0, 0.0, 0.0,
        ];
        let rings = isolines(&values, 3, 3, 0.5);

        assert_eq!(rings.len(), 1);
        let ring = &rings[0];
        assert_eq!(ring.first(), ring.last());

        let mut vertices = distinct(ring);
        vertices.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(
            vertices,
            vec![(0.5, 1.0), (1.0, 0.5), (1.0, 1.5), (1.5, 1.0)]
        );
    }

    #[test]
    fn test_separate_peaks_give_separate_rings() {
        #[rustfmt::skip]
        let values = [
            0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 2.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 2.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0,
        ];
        assert_eq!(isolines(&values, 5, 5, 1.0).len(), 2);
    }

    #[test]
    fn test_plateau_touching_border_still_closes() {
        let values = [1.0; 4];
        let rings = isolines(&values, 2, 2, 0.5);

        assert_eq!(rings.len(), 1);
        let ring = &rings[0];
        assert_eq!(ring.first(), ring.last());
        assert_eq!(ring.len(), 9);
        assert!(ring
            .iter()
            .all(|&(x, y)| (-0.5..=1.5).contains(&x) && (-0.5..=1.5).contains(&y)));
    }

    #[test]
    fn test_level_above_maximum() {
        let values = [0.2, 0.4, 0.3, 0.1];
        assert!(isolines(&values, 2, 2, 0.5).is_empty());
    }

    #[test]
    fn test_non_positive_level() {
        let values = [0.2, 0.4, 0.3, 0.1];
        assert!(isolines(&values, 2, 2, 0.0).is_empty());
        assert!(isolines(&values, 2, 2, f64::NAN).is_empty());
    }

    #[test]
    fn test_saddle_rings_close() {
        #[rustfmt::skip]
        let values = [
            1.0, 0.0,
            0.0, 1.0,
        ];
        let rings = isolines(&values, 2, 2, 0.5);
        assert!(!rings.is_empty());
        for ring in &rings {
            assert_eq!(ring.first(), ring.last());
            assert!(ring.len() >= 4);
        }
    }
}
