//! Running one worker of a tree spread over processes.

use std::{
    net::{SocketAddr, TcpListener, ToSocketAddrs},
    path::Path,
};

use tree_dbscan::protocol::{run_worker, tree::broadcast_abort, TcpLink, TreeDbscan};

use super::{timeout, ClusteringArgs, TreeArgs};
use crate::{output, utils};

fn resolve(address: &str) -> Result<SocketAddr, String> {
    address
        .to_socket_addrs()
        .map_err(|e| format!("Bad address {address:?}: {e}"))?
        .next()
        .ok_or_else(|| format!("Address {address:?} resolves to nothing"))
}

/// Connects worker `rank` to its neighbours, runs the protocol and writes
/// its results to `out_dir`.
///
/// `addresses` holds the listen address of every worker in rank order. A
/// worker listens on its own address if it has children and connects to
/// its parent's.
#[allow(clippy::too_many_arguments)]
pub fn run(
    rank: usize,
    inp_path: &Path,
    out_dir: &Path,
    addresses: &[String],
    tree: &TreeArgs,
    clustering: &ClusteringArgs,
    verbose: bool,
    timeout_secs: Option<u64>,
) -> Result<(), String> {
    let topology = tree.topology()?;
    if addresses.len() != topology.len() {
        return Err(format!(
            "Got {} addresses for {} workers",
            addresses.len(),
            topology.len()
        ));
    }
    let position = topology.position(rank).map_err(|e| e.to_string())?;

    let points = utils::read_points(inp_path, clustering.dimensionality)?;
    let out_dir = utils::ensure_dir(out_dir)?;
    let config = if position.is_root {
        Some(clustering.config(&inp_path.to_string_lossy(), &out_dir.to_string_lossy(), verbose)?)
    } else {
        None
    };

    let listener = if topology.children(rank).is_empty() {
        None
    } else {
        let address = resolve(&addresses[rank])?;
        let listener = TcpListener::bind(address).map_err(|e| format!("Cannot listen on {address}: {e}"))?;
        ftlog::info!("Worker {rank} listening on {address}.");
        Some(listener)
    };
    let parent_address = topology.parent(rank).map(|p| resolve(&addresses[p])).transpose()?;

    let link = TcpLink::connect(&topology, rank, listener, parent_address, timeout(timeout_secs))
        .map_err(|e| e.to_string())?;
    ftlog::info!("Worker {rank} of {} connected.", position.num_workers);

    let role = match TreeDbscan::new(position, points, config) {
        Ok(role) => role,
        Err(e) => {
            broadcast_abort(&link, &format!("worker {rank}: {e}"));
            return Err(e.to_string());
        }
    };
    let output = run_worker(role, &link).map_err(|e| e.to_string())?;
    output::write_worker(&out_dir, &output)?;

    println!(
        "Worker {rank}: {} points, {} global clusters, {} points of noise.",
        output.partition.len(),
        output.global_model.len(),
        output.partition.noise_count()
    );
    Ok(())
}
