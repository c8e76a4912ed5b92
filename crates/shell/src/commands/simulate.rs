//! Running a whole tree of workers in one process.

use std::path::Path;

use rayon::prelude::*;
use tree_dbscan::protocol::{LocalNetwork, TreeDbscan};

use super::{timeout, ClusteringArgs, TreeArgs};
use crate::{output, utils};

/// Reads `points_<rank>.csv` for every worker from `inp_dir`, runs the
/// protocol over an in-process network and writes every worker's results to
/// `out_dir`.
pub fn run(
    inp_dir: &Path,
    out_dir: &Path,
    tree: &TreeArgs,
    clustering: &ClusteringArgs,
    verbose: bool,
    timeout_secs: Option<u64>,
) -> Result<(), String> {
    let topology = tree.topology()?;
    let inp_dir = inp_dir.canonicalize().map_err(|e| e.to_string())?;
    let out_dir = utils::ensure_dir(out_dir)?;
    ftlog::info!("Input directory: {inp_dir:?}");
    ftlog::info!("Output directory: {out_dir:?}");

    let stores = (0..topology.len())
        .into_par_iter()
        .map(|rank| utils::read_points(&utils::points_path(&inp_dir, rank), clustering.dimensionality))
        .collect::<Result<Vec<_>, _>>()?;

    let config = clustering.config(&inp_dir.to_string_lossy(), &out_dir.to_string_lossy(), verbose)?;
    let outputs = LocalNetwork::run(&topology, timeout(timeout_secs), |position| {
        let config = position.is_root.then(|| config.clone());
        TreeDbscan::new(position, stores[position.rank].clone(), config)
    });

    let outputs = outputs
        .into_iter()
        .enumerate()
        .map(|(rank, output)| output.map_err(|e| format!("Worker {rank} failed: {e}")))
        .collect::<Result<Vec<_>, _>>()?;

    outputs.par_iter().try_for_each(|o| output::write_worker(&out_dir, o))?;

    if let Some(statistics) = outputs.iter().find_map(|o| o.statistics.as_ref()) {
        println!(
            "{} workers, {} points, {} clusters, {} points of noise.",
            statistics.nodes.len(),
            statistics.input_points(),
            statistics.cluster_sizes.len(),
            statistics.noise_points()
        );
    }
    Ok(())
}
