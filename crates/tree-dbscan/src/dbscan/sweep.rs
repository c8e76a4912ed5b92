//! A sort-and-sweep index for epsilon-neighbourhood queries.

use crate::utils::euclidean;

/// Points sorted along the axis with the largest spread.
///
/// A query only measures full distances to the points whose coordinate on
/// that axis is within `epsilon` of the query's.
#[derive(Debug, Clone)]
pub struct SweepIndex {
    /// The number of coordinates per point.
    dimensionality: usize,
    /// The sweep axis.
    axis: usize,
    /// Point indices, sorted by their coordinate on the sweep axis.
    order: Vec<usize>,
    /// The sweep-axis coordinate of each entry of `order`.
    keys: Vec<f64>,
}

impl SweepIndex {
    /// Indexes the points of a flat, row-major coordinate buffer.
    pub fn new(coordinates: &[f64], dimensionality: usize) -> Self {
        let n = if dimensionality == 0 {
            0
        } else {
            coordinates.len() / dimensionality
        };

        let axis = (0..dimensionality)
            .map(|d| {
                let (lo, hi) = (0..n)
                    .map(|i| coordinates[i * dimensionality + d])
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
                (d, hi - lo)
            })
            .fold((0, f64::NEG_INFINITY), |best, (d, spread)| if spread > best.1 { (d, spread) } else { best })
            .0;

        let mut order = (0..n).collect::<Vec<_>>();
        order.sort_by(|&a, &b| {
            coordinates[a * dimensionality + axis]
                .total_cmp(&coordinates[b * dimensionality + axis])
                .then(a.cmp(&b))
        });
        let keys = order.iter().map(|&i| coordinates[i * dimensionality + axis]).collect();

        Self {
            dimensionality,
            axis,
            order,
            keys,
        }
    }

    /// The number of indexed points.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// The indices and distances of the indexed points within `epsilon` of
    /// `query`, the boundary included.
    pub fn within<'a>(
        &'a self,
        coordinates: &'a [f64],
        query: &'a [f64],
        epsilon: f64,
    ) -> impl Iterator<Item = (usize, f64)> + 'a {
        let center = query[self.axis];
        let start = self.keys.partition_point(|&k| k < center - epsilon);
        let end = self.keys.partition_point(|&k| k <= center + epsilon);
        self.order[start..end].iter().filter_map(move |&j| {
            let row = &coordinates[j * self.dimensionality..(j + 1) * self.dimensionality];
            let d = euclidean(query, row);
            (d <= epsilon).then_some((j, d))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::SweepIndex;

    #[test]
    fn finds_neighbours_inclusively() {
        // Spread is larger along the second axis.
        let coordinates = vec![0.0, 0.0, 0.0, 1.0, 0.0, 2.5, 0.5, 10.0];
        let index = SweepIndex::new(&coordinates, 2);
        assert_eq!(index.len(), 4);

        let mut hits = index
            .within(&coordinates, &[0.0, 0.0], 1.0)
            .map(|(j, _)| j)
            .collect::<Vec<_>>();
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 1]);

        let mut hits = index
            .within(&coordinates, &[0.0, 1.5], 1.0)
            .map(|(j, _)| j)
            .collect::<Vec<_>>();
        hits.sort_unstable();
        assert_eq!(hits, vec![1, 2]);
    }

    #[test]
    fn empty_index() {
        let index = SweepIndex::new(&[], 3);
        assert_eq!(index.len(), 0);
        assert_eq!(index.within(&[], &[0.0, 0.0, 0.0], 1.0).count(), 0);
    }
}
