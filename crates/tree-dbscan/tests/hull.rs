//! Tests for hull summaries, their reconciliation and their encoding.

use std::collections::HashSet;

use rand::prelude::*;
use tree_dbscan::{
    hull::{absorb_noise, build_hulls, merge_hulls, noise_points},
    HullCodec, HullModel, InstanceId, LocalDensityClusterer, PointStore,
};

mod common;

/// A hull over the given instances, with a distinct neighbourhood size for
/// every (hull, instance) pair.
fn hull(tag: u64, instances: &[InstanceId]) -> Result<HullModel, String> {
    let sizes = instances.iter().map(|&i| tag * 1000 + i as u64).collect::<Vec<_>>();
    let coordinates = instances.iter().flat_map(|&i| [i as f64, -(i as f64)]).collect();
    HullModel::new(instances.len() as u64, 2, instances.to_vec(), sizes, coordinates).map_err(|e| e.to_string())
}

/// A hull over the given instances in which every member has the same
/// neighbourhood size and coordinates depend only on the instance.
fn tied_hull(instances: &[InstanceId]) -> Result<HullModel, String> {
    let coordinates = instances.iter().flat_map(|&i| [i as f64, 0.5]).collect();
    HullModel::new(instances.len() as u64, 2, instances.to_vec(), vec![2; instances.len()], coordinates)
        .map_err(|e| e.to_string())
}

fn random_hulls(count: u64, seed: u64) -> Result<Vec<HullModel>, String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (1..=count)
        .map(|tag| {
            let start = rng.gen_range(0..40);
            let len = rng.gen_range(1..15);
            let instances = (start..start + len).collect::<Vec<InstanceId>>();
            hull(tag, &instances)
        })
        .collect()
}

fn instances_of(hulls: &[HullModel]) -> Vec<InstanceId> {
    hulls.iter().flat_map(|h| h.instances().iter().copied()).collect()
}

#[test]
fn merge_is_commutative() -> Result<(), String> {
    let hulls = random_hulls(8, 17)?;
    let expected = merge_hulls(hulls.clone());

    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..5 {
        let mut shuffled = hulls.clone();
        shuffled.shuffle(&mut rng);
        assert_eq!(merge_hulls(shuffled), expected);
    }
    Ok(())
}

#[test]
fn merge_is_associative() -> Result<(), String> {
    let hulls = random_hulls(9, 23)?;
    let (a, rest) = hulls.split_at(3);
    let (b, c) = rest.split_at(3);

    let left = merge_hulls(merge_hulls(a.iter().chain(b).cloned()).into_iter().chain(c.iter().cloned()));
    let right = merge_hulls(a.iter().cloned().chain(merge_hulls(b.iter().chain(c).cloned())));
    assert_eq!(left, right);
    assert_eq!(left, merge_hulls(hulls));
    Ok(())
}

#[test]
fn tied_duplicates_merge_the_same_in_any_grouping() -> Result<(), String> {
    let x = tied_hull(&[1, 3])?;
    let y = tied_hull(&[1, 2, 5])?;
    let z = tied_hull(&[2, 6, 7, 8])?;

    let once = merge_hulls([x.clone(), y.clone(), z.clone()]);
    let groupings = [
        merge_hulls(merge_hulls([y.clone(), z.clone()]).into_iter().chain([x.clone()])),
        merge_hulls(merge_hulls([x.clone(), y.clone()]).into_iter().chain([z.clone()])),
        merge_hulls(merge_hulls([x.clone(), z.clone()]).into_iter().chain([y.clone()])),
        merge_hulls([y.clone()].into_iter().chain(merge_hulls([z, x]))),
    ];
    for grouped in groupings {
        assert_eq!(grouped, once);
    }

    let members = once.iter().map(|h| h.instances().to_vec()).collect::<Vec<_>>();
    assert_eq!(members, vec![vec![1, 2, 5], vec![6, 7, 8], vec![3]]);
    Ok(())
}

#[test]
fn tied_random_hulls_merge_the_same_in_any_grouping() -> Result<(), String> {
    let mut rng = StdRng::seed_from_u64(5);
    let hulls = (0..12)
        .map(|_| {
            let start = rng.gen_range(0..30);
            let len = rng.gen_range(1..10);
            tied_hull(&(start..start + len).collect::<Vec<InstanceId>>())
        })
        .collect::<Result<Vec<_>, _>>()?;
    let once = merge_hulls(hulls.clone());

    for _ in 0..5 {
        let mut shuffled = hulls.clone();
        shuffled.shuffle(&mut rng);
        let split = rng.gen_range(1..shuffled.len());
        let (left, right) = shuffled.split_at(split);
        let grouped = merge_hulls(merge_hulls(left.to_vec()).into_iter().chain(merge_hulls(right.to_vec())));
        assert_eq!(grouped, once);
    }
    Ok(())
}

#[test]
fn merged_instances_are_unique() -> Result<(), String> {
    let hulls = random_hulls(12, 5)?;
    let union = instances_of(&hulls).into_iter().collect::<HashSet<_>>();

    let merged = merge_hulls(hulls);
    let instances = instances_of(&merged);
    assert_eq!(instances.len(), union.len());
    assert_eq!(instances.into_iter().collect::<HashSet<_>>(), union);
    for h in &merged {
        assert_eq!(h.density(), h.point_count() as u64);
    }
    Ok(())
}

#[test]
fn overlapping_siblings() -> Result<(), String> {
    // Two workers hold copies of the same dense region.
    let centers = vec![vec![0.0, 0.0]];
    let points = common::blobs(&centers, 60, 1.0, 0, 8);
    let left = PointStore::new(2, points[..40].to_vec()).map_err(|e| e.to_string())?;
    let right = PointStore::new(2, points[20..].to_vec()).map_err(|e| e.to_string())?;

    let clusterer = LocalDensityClusterer::new(1.0, 3).map_err(|e| e.to_string())?;
    let mut hulls = build_hulls(&left, &clusterer.cluster(&left));
    hulls.extend(build_hulls(&right, &clusterer.cluster(&right)));
    let union = instances_of(&hulls).into_iter().collect::<HashSet<_>>();

    let merged = merge_hulls(hulls);
    assert_eq!(merged.iter().map(HullModel::point_count).sum::<usize>(), union.len());
    Ok(())
}

#[test]
fn noise_is_absorbed_across_workers() -> Result<(), String> {
    let centers = vec![vec![0.0, 0.0]];
    let points = common::blobs(&centers, 50, 1.0, 0, 12);
    let dense = PointStore::new(2, points).map_err(|e| e.to_string())?;
    let lonely = PointStore::new(2, vec![tree_dbscan::Point::new(500, vec![0.05, 0.05])]).map_err(|e| e.to_string())?;
    let far = PointStore::new(2, vec![tree_dbscan::Point::new(501, vec![90.0, 90.0])]).map_err(|e| e.to_string())?;

    let clusterer = LocalDensityClusterer::new(1.0, 3).map_err(|e| e.to_string())?;
    let hulls = build_hulls(&dense, &clusterer.cluster(&dense));
    let noise = [&lonely, &far]
        .into_iter()
        .flat_map(|s| noise_points(s, &clusterer.cluster(s)))
        .collect::<Vec<_>>();
    assert_eq!(noise.len(), 2);

    let (hulls, noise) = absorb_noise(merge_hulls(hulls), noise, 1.0, 3).map_err(|e| e.to_string())?;
    assert_eq!(noise.len(), 1);
    assert_eq!(noise[0].instance, 501);
    assert!(instances_of(&hulls).contains(&500));
    Ok(())
}

#[test]
fn codec_preserves_a_hull() -> Result<(), String> {
    let original = hull(3, &[9, 4, 7])?;
    let bytes = HullCodec::encode(&original).map_err(|e| e.to_string())?;
    assert_eq!(bytes.len(), HullCodec::encoded_len(&original));
    assert_eq!(HullCodec::decode(&bytes).map_err(|e| e.to_string())?, original);
    Ok(())
}

#[test]
fn codec_rejects_truncation() -> Result<(), String> {
    let bytes = HullCodec::encode(&hull(1, &[1, 2])?).map_err(|e| e.to_string())?;
    for len in 0..bytes.len() {
        assert!(HullCodec::decode(&bytes[..len]).is_err(), "{len} bytes decoded");
    }
    Ok(())
}
