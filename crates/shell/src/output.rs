//! Writing the results of a run to disk.

use std::path::Path;

use serde::Serialize;
use tree_dbscan::{protocol::WorkerOutput, GlobalModel, InstanceId, Partition};

/// One row of a clustering file.
#[derive(Serialize)]
struct LabelRecord {
    instance: InstanceId,
    cluster: usize,
}

/// Writes the labels of a partition, `0` standing for noise.
fn write_partition(path: &Path, partition: &Partition) -> Result<(), String> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| e.to_string())?;
    for (instance, label) in partition.iter() {
        writer
            .serialize(LabelRecord {
                instance,
                cluster: label.as_export_id(),
            })
            .map_err(|e| e.to_string())?;
    }
    writer.flush().map_err(|e| e.to_string())
}

/// Writes one summary row per global cluster.
fn write_model_summary(path: &Path, model: &GlobalModel) -> Result<(), String> {
    let dimensionality = model.hulls().first().map_or(0, tree_dbscan::HullModel::dimensionality);
    let mut writer = csv::Writer::from_path(path).map_err(|e| e.to_string())?;

    let header = ["cluster", "density", "point_count"]
        .into_iter()
        .map(String::from)
        .chain((0..dimensionality).map(|d| format!("min_{d}")))
        .chain((0..dimensionality).map(|d| format!("max_{d}")));
    writer.write_record(header).map_err(|e| e.to_string())?;

    for summary in model.summaries() {
        let record = [
            summary.cluster_id.to_string(),
            summary.density.to_string(),
            summary.point_count.to_string(),
        ]
        .into_iter()
        .chain(summary.extent.mins().iter().map(f64::to_string))
        .chain(summary.extent.maxs().iter().map(f64::to_string));
        writer.write_record(record).map_err(|e| e.to_string())?;
    }
    writer.flush().map_err(|e| e.to_string())
}

/// Writes everything a worker produced into `out_dir`.
///
/// Every worker writes `LOCAL_CLUSTERING_<rank>.csv` and
/// `GLOBAL_CLUSTERING_<rank>.csv`. The root also writes `GLOBAL_MODEL.csv`
/// and the encoded model, `GLOBAL_MODEL.bin`.
pub fn write_worker(out_dir: &Path, output: &WorkerOutput) -> Result<(), String> {
    let rank = output.rank;
    write_partition(&out_dir.join(format!("LOCAL_CLUSTERING_{rank}.csv")), &output.local_partition)?;
    write_partition(&out_dir.join(format!("GLOBAL_CLUSTERING_{rank}.csv")), &output.partition)?;

    if output.is_root() {
        write_model_summary(&out_dir.join("GLOBAL_MODEL.csv"), &output.global_model)?;
        let bytes = bitcode::encode(&output.global_model);
        std::fs::write(out_dir.join("GLOBAL_MODEL.bin"), bytes).map_err(|e| e.to_string())?;
        ftlog::info!(
            "Wrote the global model of {} clusters to {out_dir:?}.",
            output.global_model.len()
        );
    }
    ftlog::debug!("Worker {rank} wrote its clusterings to {out_dir:?}.");
    Ok(())
}
