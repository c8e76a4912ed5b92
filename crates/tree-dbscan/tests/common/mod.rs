//! Data generators shared by the integration tests.

#![allow(dead_code)]

use rand::prelude::*;
use tree_dbscan::{InstanceId, Point, PointStore};

/// Gaussian-ish blobs around the given centers, with instance identifiers
/// starting at `first_instance`.
pub fn blobs(
    centers: &[Vec<f64>],
    per_center: usize,
    spread: f64,
    first_instance: InstanceId,
    seed: u64,
) -> Vec<Point> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut instance = first_instance;
    let mut points = Vec::with_capacity(centers.len() * per_center);
    for center in centers {
        for _ in 0..per_center {
            // Sum of uniforms: cheap and bell-shaped enough for clustering.
            let coordinates = center
                .iter()
                .map(|&c| c + (0..3).map(|_| rng.gen_range(-spread..spread)).sum::<f64>() / 3.0)
                .collect();
            points.push(Point::new(instance, coordinates));
            instance += 1;
        }
    }
    points
}

/// Uniform points in `[0, side)^dimensionality`.
pub fn uniform(cardinality: usize, dimensionality: usize, side: f64, first_instance: InstanceId, seed: u64) -> Vec<Point> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..cardinality)
        .map(|i| {
            let coordinates = (0..dimensionality).map(|_| rng.gen_range(0.0..side)).collect();
            Point::new(first_instance + i as InstanceId, coordinates)
        })
        .collect()
}

/// Deals points out to `workers` stores, round-robin after a seeded shuffle.
pub fn scatter(mut points: Vec<Point>, dimensionality: usize, workers: usize, seed: u64) -> Result<Vec<PointStore>, String> {
    let mut rng = StdRng::seed_from_u64(seed);
    points.shuffle(&mut rng);
    let mut shares = vec![Vec::new(); workers];
    for (i, p) in points.into_iter().enumerate() {
        shares[i % workers].push(p);
    }
    shares
        .into_iter()
        .map(|share| PointStore::new(dimensionality, share).map_err(|e| e.to_string()))
        .collect()
}

/// The three-worker scenario: two points on the root, one on each child.
pub fn three_workers() -> Result<Vec<PointStore>, String> {
    let stores = vec![
        PointStore::new(2, vec![Point::new(0, vec![0.0, 0.0]), Point::new(1, vec![0.0, 1.0])]),
        PointStore::new(2, vec![Point::new(2, vec![0.0, 0.5])]),
        PointStore::new(2, vec![Point::new(3, vec![10.0, 10.0])]),
    ];
    stores.into_iter().map(|s| s.map_err(|e| e.to_string())).collect()
}
