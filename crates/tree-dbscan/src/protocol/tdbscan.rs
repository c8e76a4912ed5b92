//! The Tree-DBSCAN worker role.

use std::{collections::BTreeMap, time::Instant};

use super::{
    exchange::exchange_ranges,
    tree::{forward_to_children, gather_children, receive_from_parent, send_to_parent, ReductionState, Stream},
    Link, Message, NodeStatistics, RunStatistics, Tag, WorkerRole,
};
use crate::{
    dbscan::LocalDensityClusterer,
    hull::{absorb_noise, build_hulls, merge_hulls, noise_points, HullModel, NoisePoint},
    Classifier, ClusteringConfig, DimensionRange, GlobalModel, Partition, PointStore, Result, TdbscanError,
    TreePosition,
};

/// The largest number of noise points sent in one `NOISE` frame.
const NOISE_BATCH: usize = 4096;

/// The streams a child sends during the hull reduction.
const HULL_STREAMS: [Stream; 2] = [
    Stream::terminated(Tag::Hulls, Tag::AllHullsSent),
    Stream::terminated(Tag::Noise, Tag::AllNoiseSent),
];

/// Distributed DBSCAN on one worker.
///
/// The worker learns the run parameters and the global dimension ranges,
/// clusters its points, summarizes its clusters as hulls and reduces them
/// (with its unclustered points) up the tree. The root's merged hulls form
/// the [`GlobalModel`], which every worker receives and classifies its
/// points against.
#[derive(Debug)]
pub struct TreeDbscan {
    /// Where this worker sits in the tree.
    position: TreePosition,
    /// The run parameters: given at the root, received elsewhere.
    config: Option<ClusteringConfig>,
    /// The points as loaded.
    points: PointStore,
    /// The points clustering and classification work on.
    working: Option<PointStore>,
    /// The dimension range of the whole tree.
    global_range: Option<DimensionRange>,
    /// The result of local clustering.
    local_partition: Option<Partition>,
    /// The hulls of the local clusters.
    local_hulls: Vec<HullModel>,
    /// The global model, once received.
    global_model: Option<GlobalModel>,
    /// The result of classification.
    partition: Option<Partition>,
    /// The number of points classified into each global cluster.
    cluster_sizes: BTreeMap<u64, u64>,
    /// What this worker has done so far.
    node: NodeStatistics,
    /// Progress through the hull reduction, once it has started.
    state: Option<ReductionState>,
}

/// Everything a worker knows at the end of a run.
#[derive(Debug, Clone)]
pub struct WorkerOutput {
    /// The rank of the worker.
    pub rank: usize,
    /// The run parameters.
    pub config: ClusteringConfig,
    /// The dimension range of the whole tree.
    pub global_range: DimensionRange,
    /// The result of local clustering, with local cluster identifiers.
    pub local_partition: Partition,
    /// The hulls of the local clusters.
    pub local_hulls: Vec<HullModel>,
    /// The result of classification, with global cluster identifiers.
    pub partition: Partition,
    /// The global model.
    pub global_model: GlobalModel,
    /// What this worker did.
    pub node: NodeStatistics,
    /// The statistics of the whole run, at the root only.
    pub statistics: Option<RunStatistics>,
}

impl WorkerOutput {
    /// Whether this is the output of the root.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.statistics.is_some()
    }
}

impl TreeDbscan {
    /// Prepares a worker.
    ///
    /// # Errors
    ///
    /// * If the worker is the root and has no configuration.
    /// * If a given configuration is invalid.
    pub fn new(position: TreePosition, points: PointStore, config: Option<ClusteringConfig>) -> Result<Self> {
        if position.is_root && config.is_none() {
            return Err(TdbscanError::Config("The root needs a clustering configuration".to_string()));
        }
        if let Some(config) = &config {
            config.validate()?;
        }
        let node = NodeStatistics {
            rank: position.rank as u64,
            input_points: points.cardinality() as u64,
            ..NodeStatistics::default()
        };
        Ok(Self {
            position,
            config,
            points,
            working: None,
            global_range: None,
            local_partition: None,
            local_hulls: Vec::new(),
            global_model: None,
            partition: None,
            cluster_sizes: BTreeMap::new(),
            node,
            state: None,
        })
    }

    /// The current progress through the hull reduction, `None` before it
    /// starts.
    ///
    /// A worker with children moves through `AwaitingChildren` and `Merging`
    /// to `Forwarded`. A leaf has nothing to await or merge and goes straight
    /// to `Forwarded`.
    #[must_use]
    pub const fn state(&self) -> Option<ReductionState> {
        self.state
    }

    fn config(&self) -> Result<&ClusteringConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| TdbscanError::protocol(self.position.rank, "No configuration yet"))
    }

    fn working(&self) -> Result<&PointStore> {
        self.working
            .as_ref()
            .ok_or_else(|| TdbscanError::protocol(self.position.rank, "Points are not prepared yet"))
    }

    /// Collects the hulls and noise points of every child.
    fn gather_hulls(&mut self, link: &dyn Link) -> Result<(Vec<HullModel>, Vec<NoisePoint>)> {
        let rank = self.position.rank;
        let dimensionality = self.points.dimensionality();
        let mut hulls = Vec::new();
        let mut noise = Vec::new();

        gather_children(link, "hulls and noise", &HULL_STREAMS, |from, frame| {
            match Message::from_frame(frame)? {
                Message::Hull(hull) if hull.is_empty() || hull.dimensionality() == dimensionality => hulls.push(hull),
                Message::Noise(points, d) if points.is_empty() || d == dimensionality => noise.extend(points),
                _ => {
                    return Err(TdbscanError::protocol(
                        rank,
                        format!("Child {from} sent {} data of the wrong dimensionality", frame.tag()),
                    ))
                }
            }
            Ok(())
        })?;

        self.node.received_hulls = hulls.len() as u64;
        self.node.received_noise = noise.len() as u64;
        ftlog::debug!(
            "Worker {rank} received {} hulls and {} noise points from its children.",
            hulls.len(),
            noise.len()
        );
        Ok((hulls, noise))
    }

    /// Sends hulls and noise to the parent, each stream ended by its
    /// sentinel.
    fn forward_hulls(&self, link: &dyn Link, hulls: &[HullModel], noise: &[NoisePoint]) -> Result<()> {
        for hull in hulls {
            send_to_parent(link, &Message::Hull(hull.clone()))?;
        }
        send_to_parent(link, &Message::AllHullsSent)?;
        for batch in noise.chunks(NOISE_BATCH) {
            send_to_parent(link, &Message::Noise(batch.to_vec(), self.points.dimensionality()))?;
        }
        send_to_parent(link, &Message::AllNoiseSent)
    }
}

impl WorkerRole for TreeDbscan {
    type Model = GlobalModel;
    type Output = WorkerOutput;

    fn configure(&mut self, link: &dyn Link) -> Result<()> {
        let rank = self.position.rank;
        if link.rank() != rank || link.is_root() != self.position.is_root {
            return Err(TdbscanError::Config(format!(
                "Worker {rank} was given the link of worker {}",
                link.rank()
            )));
        }

        let frame = if link.is_root() {
            Message::Config(self.config()?.clone()).to_frame()?
        } else {
            let frame = receive_from_parent(link, Tag::Config, "the configuration")?;
            match Message::from_frame(&frame)? {
                Message::Config(config) => self.config = Some(config),
                _ => return Err(TdbscanError::protocol(rank, "CONFIG frame did not decode to a configuration")),
            }
            frame
        };
        forward_to_children(link, &frame)?;

        let config = self.config()?.clone();
        if config.verbose {
            ftlog::info!(
                "Worker {rank}: epsilon = {}, min_points = {}, normalize = {}, {} points of {} dimensions.",
                config.epsilon,
                config.min_points,
                config.normalize,
                self.points.cardinality(),
                self.points.dimensionality()
            );
        }

        let global_range = exchange_ranges(link, self.points.range())?;
        let working = if config.normalize {
            self.points.normalized(&global_range)?
        } else {
            self.points.clone()
        };
        self.global_range = Some(global_range);
        self.working = Some(working);
        Ok(())
    }

    fn run_reduction_phase(&mut self, link: &dyn Link) -> Result<Option<Self::Model>> {
        let rank = self.position.rank;
        let config = self.config()?.clone();

        let start = Instant::now();
        let working = self.working()?;
        let clustering = LocalDensityClusterer::from_config(&config)?.cluster(working);
        let local_hulls = build_hulls(working, &clustering);
        let local_noise = noise_points(working, &clustering);
        self.node.clustering_secs = start.elapsed().as_secs_f64();
        self.node.local_clusters = clustering.num_clusters() as u64;
        self.node.local_noise = clustering.noise_count() as u64;
        ftlog::info!(
            "Worker {rank} found {} local clusters and {} noise points in {:.3} s.",
            clustering.num_clusters(),
            clustering.noise_count(),
            self.node.clustering_secs
        );

        // A leaf's hulls are disjoint and its noise is out of reach of its
        // core points, so there is nothing to merge.
        let (hulls, noise) = if link.children().is_empty() {
            (local_hulls.clone(), local_noise)
        } else {
            self.state = Some(ReductionState::AwaitingChildren);
            let (child_hulls, child_noise) = self.gather_hulls(link)?;

            self.state = Some(ReductionState::Merging);
            let start = Instant::now();
            let merged = merge_hulls(local_hulls.iter().cloned().chain(child_hulls));
            let noise = local_noise.into_iter().chain(child_noise).collect::<Vec<_>>();
            let offered = noise.len();
            let (hulls, noise) = absorb_noise(merged, noise, config.epsilon, config.min_points)?;
            self.node.merge_secs = start.elapsed().as_secs_f64();
            self.node.absorbed_noise = (offered - noise.len()) as u64;
            (hulls, noise)
        };
        self.node.forwarded_hulls = hulls.len() as u64;
        self.node.forwarded_noise = noise.len() as u64;

        self.local_partition = Some(clustering.into_partition());
        self.local_hulls = local_hulls;

        let model = if link.is_root() {
            let model = GlobalModel::new(hulls);
            ftlog::info!(
                "The global model has {} clusters covering {} points; {} points remain noise.",
                model.len(),
                model.total_points(),
                noise.len()
            );
            Some(model)
        } else {
            self.forward_hulls(link, &hulls, &noise)?;
            ftlog::debug!(
                "Worker {rank} forwarded {} hulls and {} noise points.",
                hulls.len(),
                noise.len()
            );
            None
        };
        self.state = Some(ReductionState::Forwarded);
        Ok(model)
    }

    fn run_broadcast_phase(&mut self, link: &dyn Link, model: Option<Self::Model>) -> Result<Self::Model> {
        let rank = self.position.rank;
        let model = match model {
            Some(model) if link.is_root() => {
                forward_to_children(link, &Message::GlobalModel(model.clone()).to_frame()?)?;
                model
            }
            None if !link.is_root() => {
                let frame = receive_from_parent(link, Tag::GlobalModel, "the global model")?;
                forward_to_children(link, &frame)?;
                GlobalModel::from_bytes(frame.payload())?
            }
            _ => {
                return Err(TdbscanError::protocol(
                    rank,
                    "Only the root starts the broadcast with a model",
                ))
            }
        };
        ftlog::debug!("Worker {rank} has the global model of {} clusters.", model.len());
        self.global_model = Some(model.clone());
        Ok(model)
    }

    fn classify(&mut self, model: &Self::Model) -> Result<()> {
        let start = Instant::now();
        let config = self.config()?;
        let partition = Classifier::from_config(model, config).classify(self.working()?)?;
        self.node.classification_secs = start.elapsed().as_secs_f64();
        self.node.unclassified_points = partition.noise_count() as u64;
        self.node.classified_points = (partition.len() - partition.noise_count()) as u64;
        self.cluster_sizes = partition
            .cluster_sizes()
            .into_iter()
            .map(|(id, size)| (id as u64, size as u64))
            .collect();
        ftlog::info!(
            "Worker {} classified {} points, {} as noise.",
            self.position.rank,
            partition.len(),
            partition.noise_count()
        );
        self.partition = Some(partition);
        Ok(())
    }

    fn report(self, link: &dyn Link) -> Result<Self::Output> {
        let rank = self.position.rank;
        let mut statistics = RunStatistics::of_node(self.node.clone(), self.cluster_sizes.clone());
        gather_children(link, "statistics", &[Stream::single(Tag::Statistics)], |from, frame| {
            match Message::from_frame(frame)? {
                Message::Statistics(child) => {
                    statistics.absorb(child);
                    Ok(())
                }
                _ => Err(TdbscanError::protocol(rank, format!("Bad statistics from child {from}"))),
            }
        })?;

        let statistics = if link.is_root() {
            ftlog::info!(
                "Run complete: {} workers, {} points, {} classified as noise.",
                statistics.nodes.len(),
                statistics.input_points(),
                statistics.noise_points()
            );
            Some(statistics)
        } else {
            send_to_parent(link, &Message::Statistics(statistics))?;
            None
        };

        let missing = |what: &str| TdbscanError::protocol(rank, format!("Run finished without {what}"));
        Ok(WorkerOutput {
            rank,
            config: self.config.ok_or_else(|| missing("a configuration"))?,
            global_range: self.global_range.ok_or_else(|| missing("a global range"))?,
            local_partition: self.local_partition.ok_or_else(|| missing("a local clustering"))?,
            local_hulls: self.local_hulls,
            partition: self.partition.ok_or_else(|| missing("a classification"))?,
            global_model: self.global_model.ok_or_else(|| missing("a global model"))?,
            node: self.node,
            statistics,
        })
    }
}
