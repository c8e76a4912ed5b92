//! Utility functions for the crate.

/// The Euclidean distance between two points.
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    distances::vectors::euclidean::<f64, f64>(a, b)
}

/// Convert a count to the signed 64-bit integer used on the wire.
pub(crate) fn count_to_i64(count: u64) -> crate::Result<i64> {
    i64::try_from(count).map_err(|_| crate::TdbscanError::Codec(format!("Count {count} overflows an int64")))
}

/// Convert a length to the signed 32-bit integer used on the wire.
pub(crate) fn len_to_i32(len: usize) -> crate::Result<i32> {
    i32::try_from(len).map_err(|_| crate::TdbscanError::Codec(format!("Length {len} overflows an int32")))
}
