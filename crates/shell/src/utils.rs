//! Some utilities

use std::path::{Path, PathBuf};

use ftlog::{
    appender::{FileAppender, Period},
    LevelFilter, LoggerGuard,
};
use tree_dbscan::PointStore;

/// Sets up `ftlog` to write to `./logs/<file_name>.log`, rotated daily.
pub fn configure_logger(file_name: &str, verbose: bool) -> Result<(LoggerGuard, PathBuf), String> {
    let root_dir = PathBuf::from(".").canonicalize().map_err(|e| e.to_string())?;
    let logs_dir = root_dir.join("logs");
    if !logs_dir.exists() {
        std::fs::create_dir(&logs_dir).map_err(|e| e.to_string())?;
    }
    let log_path = logs_dir.join(format!("{file_name}.log"));

    let writer = FileAppender::builder().path(&log_path).rotate(Period::Day).build();

    let err_path = log_path.with_extension("err.log");

    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let guard = ftlog::Builder::new()
        // global max log level
        .max_log_level(level)
        // define root appender, pass None would write to stderr
        .root(writer)
        // write `Warn` and `Error` logs in ftlog::appender to `err_path` instead of `log_path`
        .filter("ftlog::appender", "ftlog-appender", LevelFilter::Warn)
        .appender("ftlog-appender", FileAppender::new(err_path))
        .try_init()
        .map_err(|e| e.to_string())?;

    Ok((guard, log_path))
}

/// The file holding the points of a worker.
pub fn points_path(dir: &Path, rank: usize) -> PathBuf {
    dir.join(format!("points_{rank}.csv"))
}

/// Reads the points of one worker from a header-less `.csv` file.
///
/// An empty file yields an empty store, provided the dimensionality is
/// known.
pub fn read_points(path: &Path, dimensionality: Option<usize>) -> Result<PointStore, String> {
    let is_empty = std::fs::metadata(path)
        .map_err(|e| format!("Cannot read {path:?}: {e}"))?
        .len()
        == 0;
    if is_empty {
        return dimensionality
            .map(PointStore::empty)
            .ok_or_else(|| format!("{path:?} is empty; pass the dimensionality"));
    }
    let store = PointStore::read_csv(path, false, dimensionality).map_err(|e| format!("{path:?}: {e}"))?;
    ftlog::info!(
        "Read {} points of {} dimensions from {path:?}.",
        store.cardinality(),
        store.dimensionality()
    );
    Ok(store)
}

/// Creates a directory if it does not exist yet.
pub fn ensure_dir(dir: &Path) -> Result<PathBuf, String> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;
    }
    dir.canonicalize().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use tree_dbscan::{Point, PointStore};

    use super::{points_path, read_points};

    #[test]
    fn empty_files() -> Result<(), String> {
        let dir = tempdir::TempDir::new("tdbscan").map_err(|e| e.to_string())?;
        let path = points_path(dir.path(), 3);
        std::fs::write(&path, "").map_err(|e| e.to_string())?;

        assert!(read_points(&path, None).is_err());
        assert_eq!(read_points(&path, Some(4))?, PointStore::empty(4));
        Ok(())
    }

    #[test]
    fn written_points_are_read_back() -> Result<(), String> {
        let dir = tempdir::TempDir::new("tdbscan").map_err(|e| e.to_string())?;
        let path = points_path(dir.path(), 0);
        let store = PointStore::new(2, vec![Point::new(4, vec![1.5, -2.0]), Point::new(9, vec![0.0, 3.25])])
            .map_err(|e| e.to_string())?;
        store.write_csv(&path).map_err(|e| e.to_string())?;

        assert_eq!(read_points(&path, None)?, store);
        Ok(())
    }
}
