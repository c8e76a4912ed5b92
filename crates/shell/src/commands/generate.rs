//! Synthetic data: gaussian blobs scattered over workers.

use std::path::Path;

use rand::prelude::*;
use rayon::prelude::*;
use tree_dbscan::{InstanceId, Point, PointStore};

use crate::utils;

/// What to generate.
#[derive(Debug, Clone)]
pub struct BlobSpec {
    /// The number of workers to scatter the points over.
    pub num_workers: usize,
    /// The number of blobs.
    pub num_blobs: usize,
    /// The number of points in each blob.
    pub points_per_blob: usize,
    /// The number of coordinates per point.
    pub dimensionality: usize,
    /// The standard deviation of each blob.
    pub std_dev: f64,
    /// The side of the cube holding the blob centers and the background.
    pub side: f64,
    /// The number of uniform background points.
    pub noise: usize,
}

/// A standard normal sample by the Box-Muller transform.
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u = rng.gen_range(f64::EPSILON..1.0);
    let v = rng.gen::<f64>();
    (-2.0 * u.ln()).sqrt() * (2.0 * core::f64::consts::PI * v).cos()
}

/// Generates the points of every worker. Instance identifiers are unique
/// across workers.
pub fn scattered_blobs(spec: &BlobSpec, seed: u64) -> Result<Vec<PointStore>, String> {
    if spec.num_workers == 0 || spec.dimensionality == 0 {
        return Err("Need at least one worker and one dimension".to_string());
    }
    if !(spec.side > 0.0 && spec.std_dev >= 0.0) {
        return Err(format!("Bad side {} or standard deviation {}", spec.side, spec.std_dev));
    }
    let mut rng = StdRng::seed_from_u64(seed);

    let centers = (0..spec.num_blobs)
        .map(|_| (0..spec.dimensionality).map(|_| rng.gen_range(0.0..spec.side)).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    let mut points = Vec::with_capacity(spec.num_blobs * spec.points_per_blob + spec.noise);
    for center in &centers {
        for _ in 0..spec.points_per_blob {
            let coordinates = center
                .iter()
                .map(|&c| spec.std_dev.mul_add(standard_normal(&mut rng), c))
                .collect();
            points.push(Point::new(points.len() as InstanceId, coordinates));
        }
    }
    for _ in 0..spec.noise {
        let coordinates = (0..spec.dimensionality).map(|_| rng.gen_range(0.0..spec.side)).collect();
        points.push(Point::new(points.len() as InstanceId, coordinates));
    }

    points.shuffle(&mut rng);
    let mut shares = vec![Vec::new(); spec.num_workers];
    for (i, p) in points.into_iter().enumerate() {
        shares[i % spec.num_workers].push(p);
    }
    shares
        .into_iter()
        .map(|share| PointStore::new(spec.dimensionality, share).map_err(|e| e.to_string()))
        .collect()
}

/// Writes `points_<rank>.csv` for every worker into `out_dir`.
pub fn run(out_dir: &Path, spec: &BlobSpec, seed: u64) -> Result<(), String> {
    let out_dir = utils::ensure_dir(out_dir)?;
    let stores = scattered_blobs(spec, seed)?;
    stores
        .par_iter()
        .enumerate()
        .try_for_each(|(rank, store)| {
            store
                .write_csv(utils::points_path(&out_dir, rank))
                .map_err(|e| e.to_string())
        })?;
    ftlog::info!(
        "Wrote {} points in {} blobs for {} workers to {out_dir:?}.",
        stores.iter().map(PointStore::cardinality).sum::<usize>(),
        spec.num_blobs,
        spec.num_workers
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{scattered_blobs, BlobSpec};

    fn spec() -> BlobSpec {
        BlobSpec {
            num_workers: 3,
            num_blobs: 4,
            points_per_blob: 25,
            dimensionality: 2,
            std_dev: 0.5,
            side: 50.0,
            noise: 10,
        }
    }

    #[test]
    fn instances_are_unique() -> Result<(), String> {
        let stores = scattered_blobs(&spec(), 42)?;
        assert_eq!(stores.len(), 3);

        let instances = stores.iter().flat_map(|s| s.instances().iter().copied()).collect::<Vec<_>>();
        assert_eq!(instances.len(), 110);
        assert_eq!(instances.iter().collect::<HashSet<_>>().len(), 110);
        Ok(())
    }

    #[test]
    fn seeded() -> Result<(), String> {
        assert_eq!(scattered_blobs(&spec(), 7)?, scattered_blobs(&spec(), 7)?);
        Ok(())
    }
}
