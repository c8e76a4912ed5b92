//! Tests for classifying points against a global model.

use float_cmp::approx_eq;
use test_case::test_case;
use tree_dbscan::{
    Classifier, ClusterLabel, GlobalModel, HullModel, InstanceId, LocalDensityClusterer, Point, PointStore,
};

mod common;

/// A one-dimensional hull whose members are all core for `min_points <= 3`.
fn line_hull(density: u64, members: &[(InstanceId, f64)]) -> Result<HullModel, String> {
    HullModel::new(
        density,
        1,
        members.iter().map(|&(i, _)| i).collect(),
        vec![3; members.len()],
        members.iter().map(|&(_, x)| x).collect(),
    )
    .map_err(|e| e.to_string())
}

fn model() -> Result<GlobalModel, String> {
    Ok(GlobalModel::new(vec![
        line_hull(2, &[(10, 4.0), (11, 4.5)])?,
        line_hull(3, &[(1, 0.0), (2, 0.5), (3, 1.0)])?,
    ]))
}

#[test_case(0.25, ClusterLabel::Cluster(1); "inside the heavier hull")]
#[test_case(4.2, ClusterLabel::Cluster(2); "inside the lighter hull")]
#[test_case(2.0, ClusterLabel::Cluster(1); "nearer the heavier hull")]
#[test_case(3.0, ClusterLabel::Cluster(2); "nearer the lighter hull")]
#[test_case(2.5, ClusterLabel::Cluster(1); "equidistant")]
#[test_case(-2.0, ClusterLabel::Noise; "out of reach")]
#[test_case(9.0, ClusterLabel::Noise; "far away")]
fn labels(x: f64, expected: ClusterLabel) -> Result<(), String> {
    let classifier = Classifier::new(&model()?, 1.5, 3);
    assert_eq!(classifier.classify_point(&[x]), expected);
    Ok(())
}

#[test]
fn equal_density_ties_go_to_smaller_instances() -> Result<(), String> {
    let model = GlobalModel::new(vec![
        line_hull(2, &[(20, 2.0), (21, 2.5)])?,
        line_hull(2, &[(5, -2.0), (6, -2.5)])?,
    ]);
    assert_eq!(model.hull(1).and_then(HullModel::min_instance), Some(5));

    let classifier = Classifier::new(&model, 2.5, 3);
    assert_eq!(classifier.classify_point(&[0.0]), ClusterLabel::Cluster(1));
    Ok(())
}

#[test]
fn only_core_members_attract() -> Result<(), String> {
    let hull = HullModel::new(3, 1, vec![1, 2, 3], vec![3, 3, 1], vec![0.0, 0.5, 1.4]).map_err(|e| e.to_string())?;
    let classifier = Classifier::new(&GlobalModel::new(vec![hull]), 1.0, 3);

    // Within epsilon of the border member only.
    assert_eq!(classifier.classify_point(&[2.2]), ClusterLabel::Noise);
    assert_eq!(classifier.classify_point(&[1.4]), ClusterLabel::Cluster(1));
    Ok(())
}

#[test]
fn classification_is_stable() -> Result<(), String> {
    let centers = vec![vec![0.0, 0.0], vec![8.0, 8.0]];
    let points = common::blobs(&centers, 50, 1.0, 0, 13);
    let store = PointStore::new(2, points.clone()).map_err(|e| e.to_string())?;

    let clustering = LocalDensityClusterer::new(0.7, 4).map_err(|e| e.to_string())?.cluster(&store);
    let model = GlobalModel::new(tree_dbscan::hull::build_hulls(&store, &clustering));
    let classifier = Classifier::new(&model, 0.7, 4);

    let first = classifier.classify(&store).map_err(|e| e.to_string())?;
    let second = classifier.classify(&store).map_err(|e| e.to_string())?;
    assert_eq!(first, second);
    assert_eq!(first.len(), store.cardinality());

    // A point's label does not depend on the other points being classified.
    for p in points.iter().step_by(7) {
        let alone = PointStore::new(2, vec![p.clone()]).map_err(|e| e.to_string())?;
        let label = classifier.classify(&alone).map_err(|e| e.to_string())?.labels()[0];
        assert_eq!(Some(label), first.label_of(p.instance));
    }

    // Every locally clustered point lands in some global cluster.
    for (local, global) in clustering.partition().labels().iter().zip(first.labels()) {
        if !local.is_noise() {
            assert!(!global.is_noise());
        }
    }
    Ok(())
}

#[test]
fn empty_model_labels_everything_noise() -> Result<(), String> {
    let store = PointStore::new(3, common::uniform(20, 3, 1.0, 0, 2)).map_err(|e| e.to_string())?;
    let partition = Classifier::new(&GlobalModel::default(), 1.0, 1)
        .classify(&store)
        .map_err(|e| e.to_string())?;
    assert_eq!(partition.noise_count(), 20);
    Ok(())
}

#[test]
fn dimensionality_must_match() -> Result<(), String> {
    let store = PointStore::new(2, vec![Point::new(0, vec![0.0, 0.0])]).map_err(|e| e.to_string())?;
    assert!(Classifier::new(&model()?, 1.0, 3).classify(&store).is_err());
    assert!(Classifier::new(&model()?, 1.0, 3).classify(&PointStore::empty(2)).is_ok());
    Ok(())
}

#[test]
fn summaries_describe_clusters() -> Result<(), String> {
    let summaries = model()?.summaries();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].density, 3);
    assert_eq!(summaries[0].point_count, 3);
    assert!(approx_eq!(f64, summaries[0].extent.maxs()[0], 1.0));
    assert!(approx_eq!(f64, summaries[1].extent.mins()[0], 4.0));
    Ok(())
}
