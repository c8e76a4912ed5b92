//! The commands under the `tdbscan` CLI.

pub mod generate;
pub mod simulate;
pub mod worker;

use std::{path::PathBuf, time::Duration};

use clap::{Args, Subcommand};
use tree_dbscan::{ClusteringConfig, Topology};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every worker in this process, one thread each.
    Simulate {
        /// The directory holding `points_<rank>.csv` for every worker.
        #[arg(short('i'), long)]
        inp_dir: PathBuf,

        /// The directory to write the results to.
        #[arg(short('o'), long)]
        out_dir: PathBuf,

        #[command(flatten)]
        tree: TreeArgs,

        #[command(flatten)]
        clustering: ClusteringArgs,

        /// Seconds a worker may wait for a message before giving up.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Run one worker, talking to its neighbours over TCP.
    Worker {
        /// The rank of this worker.
        #[arg(short('r'), long)]
        rank: usize,

        /// The `.csv` file holding this worker's points.
        #[arg(short('i'), long)]
        inp_path: PathBuf,

        /// The directory to write the results to.
        #[arg(short('o'), long)]
        out_dir: PathBuf,

        /// The listen address of every worker, in rank order.
        #[arg(short('a'), long, value_delimiter = ',')]
        addresses: Vec<String>,

        #[command(flatten)]
        tree: TreeArgs,

        #[command(flatten)]
        clustering: ClusteringArgs,

        /// Seconds a worker may wait for a message before giving up.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Write gaussian blobs, scattered over workers, as `points_<rank>.csv`.
    Generate {
        /// The directory to write the points to.
        #[arg(short('o'), long)]
        out_dir: PathBuf,

        /// The number of workers to scatter the points over.
        #[arg(short('n'), long)]
        num_workers: usize,

        /// The number of blobs.
        #[arg(short('b'), long, default_value_t = 5)]
        num_blobs: usize,

        /// The number of points in each blob.
        #[arg(short('p'), long, default_value_t = 1000)]
        points_per_blob: usize,

        /// The number of coordinates per point.
        #[arg(short('d'), long, default_value_t = 2)]
        dimensionality: usize,

        /// The standard deviation of each blob.
        #[arg(long, default_value_t = 1.0)]
        std_dev: f64,

        /// The side of the cube the blob centers are drawn from.
        #[arg(long, default_value_t = 100.0)]
        side: f64,

        /// The number of uniform background points.
        #[arg(long, default_value_t = 0)]
        noise: usize,

        /// The random seed to use.
        #[arg(short('s'), long, default_value_t = 42)]
        seed: u64,
    },
}

impl Commands {
    /// The name of the log file for this command.
    pub fn log_name(&self) -> String {
        match self {
            Self::Simulate { .. } => "tdbscan-simulate".to_string(),
            Self::Worker { rank, .. } => format!("tdbscan-worker-{rank}"),
            Self::Generate { .. } => "tdbscan-generate".to_string(),
        }
    }
}

/// The shape of the tree of workers.
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// The number of workers.
    #[arg(short('n'), long)]
    pub num_workers: usize,

    /// The number of children per worker. Without it (or `--parents`), every
    /// worker is a child of worker 0.
    #[arg(short('k'), long)]
    pub fanout: Option<usize>,

    /// The parent of every worker in rank order, `-` for the root, e.g.
    /// `-,0,0,1`.
    #[arg(long, value_delimiter = ',', conflicts_with = "fanout")]
    pub parents: Option<Vec<String>>,
}

impl TreeArgs {
    /// Builds the topology these arguments describe.
    pub fn topology(&self) -> Result<Topology, String> {
        let topology = match (&self.parents, self.fanout) {
            (Some(parents), _) => {
                if parents.len() != self.num_workers {
                    return Err(format!(
                        "Got {} parents for {} workers",
                        parents.len(),
                        self.num_workers
                    ));
                }
                let parents = parents
                    .iter()
                    .map(|p| match p.trim() {
                        "-" => Ok(None),
                        p => p.parse::<usize>().map(Some).map_err(|e| format!("Bad parent {p:?}: {e}")),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Topology::from_parents(parents)
            }
            (None, Some(fanout)) => Topology::k_ary(self.num_workers, fanout),
            (None, None) => Topology::flat(self.num_workers),
        };
        topology.map_err(|e| e.to_string())
    }
}

/// The density parameters of a run, read by the root.
#[derive(Args, Debug)]
pub struct ClusteringArgs {
    /// The density radius.
    #[arg(short('e'), long)]
    pub epsilon: f64,

    /// The number of neighbours, the point itself included, that makes a
    /// point a core point.
    #[arg(short('m'), long)]
    pub min_points: usize,

    /// A name for the clustering definition, recorded in the configuration.
    #[arg(long, default_value = "")]
    pub definition: String,

    /// Normalize the coordinates by the global range before clustering.
    /// Epsilon is then a fraction of each dimension's range.
    #[arg(long, default_value_t = false)]
    pub normalize: bool,

    /// Record that the traces behind the points should be reconstructed.
    #[arg(long, default_value_t = false)]
    pub reconstruct_trace: bool,

    /// The dimensionality of the points. Needed when some worker has none.
    #[arg(short('d'), long)]
    pub dimensionality: Option<usize>,
}

impl ClusteringArgs {
    /// The configuration the root distributes.
    pub fn config(&self, inp_path: &str, out_path: &str, verbose: bool) -> Result<ClusteringConfig, String> {
        Ok(ClusteringConfig::new(self.epsilon, self.min_points)
            .map_err(|e| e.to_string())?
            .with_definition(&self.definition)
            .with_paths(inp_path, out_path)
            .with_verbose(verbose)
            .with_reconstruct_trace(self.reconstruct_trace)
            .with_normalize(self.normalize))
    }
}

/// Converts a timeout in seconds.
pub fn timeout(secs: Option<u64>) -> Option<Duration> {
    secs.map(Duration::from_secs)
}
