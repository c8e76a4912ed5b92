//! Flat, length-prefixed encodings of hulls and noise points.
//!
//! A hull is `density: i64, pointCount: i32, dimensionCount: i32`, followed
//! by `instances: i64[pointCount]`, `neighbourhoodSizes: i64[pointCount]`
//! and `coordinates: f64[pointCount * dimensionCount]`, then
//! `cededCount: i32, ceded: i64[cededCount]`, all little-endian.

use super::{HullModel, NoisePoint};
use crate::{
    codec::{put_f64s, put_i32, put_i64, ByteReader},
    utils::{count_to_i64, len_to_i32},
    Result, TdbscanError,
};

/// Converts hulls and noise points to and from their wire layout.
pub struct HullCodec;

impl HullCodec {
    /// Encodes one hull.
    ///
    /// # Errors
    ///
    /// * If a count does not fit its wire width.
    pub fn encode(hull: &HullModel) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::encoded_len(hull));
        Self::encode_into(hull, &mut buf)?;
        Ok(buf)
    }

    /// Decodes one hull, requiring the whole payload to be consumed.
    ///
    /// # Errors
    ///
    /// * If the payload is truncated, has trailing bytes, or declares
    ///   negative sizes.
    pub fn decode(bytes: &[u8]) -> Result<HullModel> {
        let mut reader = ByteReader::new(bytes);
        let hull = Self::decode_from(&mut reader)?;
        reader.finish()?;
        Ok(hull)
    }

    /// The number of bytes `encode` produces for this hull.
    #[must_use]
    pub fn encoded_len(hull: &HullModel) -> usize {
        8 + 4 + 4 + hull.point_count() * 16 + hull.flat_coordinates().len() * 8 + 4 + hull.ceded().len() * 8
    }

    /// Appends the encoding of a hull to `buf`.
    pub(crate) fn encode_into(hull: &HullModel, buf: &mut Vec<u8>) -> Result<()> {
        put_i64(buf, count_to_i64(hull.density())?);
        put_i32(buf, len_to_i32(hull.point_count())?);
        put_i32(buf, len_to_i32(hull.dimensionality())?);
        for &id in hull.instances() {
            put_i64(buf, id);
        }
        for &size in hull.neighbourhood_sizes() {
            put_i64(buf, count_to_i64(size)?);
        }
        put_f64s(buf, hull.flat_coordinates());
        put_i32(buf, len_to_i32(hull.ceded().len())?);
        for &id in hull.ceded() {
            put_i64(buf, id);
        }
        Ok(())
    }

    /// Reads one hull from `reader`.
    pub(crate) fn decode_from(reader: &mut ByteReader) -> Result<HullModel> {
        let density = reader.read_count("density")?;
        let point_count = reader.read_len("point count")?;
        let dimensionality = reader.read_len("dimension count")?;

        reader.check_remaining(point_count, 16)?;
        let instances = (0..point_count).map(|_| reader.read_i64()).collect::<Result<Vec<_>>>()?;
        let sizes = (0..point_count)
            .map(|_| reader.read_count("neighbourhood size"))
            .collect::<Result<Vec<_>>>()?;
        let n_coords = point_count
            .checked_mul(dimensionality)
            .ok_or_else(|| TdbscanError::Codec("Coordinate count overflow".to_string()))?;
        let coordinates = reader.read_f64s(n_coords)?;

        let ceded_count = reader.read_len("ceded count")?;
        reader.check_remaining(ceded_count, 8)?;
        let ceded = (0..ceded_count).map(|_| reader.read_i64()).collect::<Result<Vec<_>>>()?;

        HullModel::new(density, dimensionality, instances, sizes, coordinates)
            .map(|hull| hull.with_ceded(ceded))
            .map_err(|e| TdbscanError::Codec(e.to_string()))
    }

    /// Encodes a batch of noise points of the given dimensionality.
    ///
    /// # Errors
    ///
    /// * If a point does not have `dimensionality` coordinates.
    /// * If a count does not fit its wire width.
    pub fn encode_noise(points: &[NoisePoint], dimensionality: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(8 + points.len() * (16 + 8 * dimensionality));
        put_i32(&mut buf, len_to_i32(points.len())?);
        put_i32(&mut buf, len_to_i32(dimensionality)?);
        for p in points {
            if p.coordinates.len() != dimensionality {
                return Err(TdbscanError::Codec(format!(
                    "Noise point {} has {} coordinates, expected {dimensionality}",
                    p.instance,
                    p.coordinates.len()
                )));
            }
            put_i64(&mut buf, p.instance);
            put_i64(&mut buf, count_to_i64(p.neighbourhood_size)?);
            put_f64s(&mut buf, &p.coordinates);
        }
        Ok(buf)
    }

    /// Decodes a batch of noise points, returning them with their
    /// dimensionality.
    ///
    /// # Errors
    ///
    /// * If the payload is truncated, has trailing bytes, or declares
    ///   negative sizes.
    pub fn decode_noise(bytes: &[u8]) -> Result<(Vec<NoisePoint>, usize)> {
        let mut reader = ByteReader::new(bytes);
        let count = reader.read_len("noise count")?;
        let dimensionality = reader.read_len("dimension count")?;
        let width = dimensionality
            .checked_add(2)
            .ok_or_else(|| TdbscanError::Codec("Dimension count overflow".to_string()))?;
        reader.check_remaining(count, width * 8)?;

        let points = (0..count)
            .map(|_| -> Result<NoisePoint> {
                Ok(NoisePoint {
                    instance: reader.read_i64()?,
                    neighbourhood_size: reader.read_count("neighbourhood size")?,
                    coordinates: reader.read_f64s(dimensionality)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        reader.finish()?;
        Ok((points, dimensionality))
    }
}

#[cfg(test)]
mod tests {
    use crate::{codec::put_i32, HullModel};

    use super::{HullCodec, NoisePoint};

    #[test]
    fn layout() -> Result<(), String> {
        let hull = HullModel::new(3, 2, vec![4, 9], vec![2, 3], vec![0.5, 1.0, -2.0, 3.0]).map_err(|e| e.to_string())?;
        let bytes = HullCodec::encode(&hull).map_err(|e| e.to_string())?;
        assert_eq!(bytes.len(), HullCodec::encoded_len(&hull));
        assert_eq!(bytes.len(), 8 + 4 + 4 + 2 * 8 + 2 * 8 + 4 * 8 + 4);
        assert_eq!(&bytes[..8], &3_i64.to_le_bytes());
        assert_eq!(&bytes[8..12], &2_i32.to_le_bytes());
        assert_eq!(&bytes[12..16], &2_i32.to_le_bytes());
        assert_eq!(&bytes[16..24], &4_i64.to_le_bytes());
        assert_eq!(&bytes[32..40], &2_i64.to_le_bytes());
        assert_eq!(&bytes[48..56], &0.5_f64.to_le_bytes());
        assert_eq!(&bytes[80..84], &0_i32.to_le_bytes());

        assert_eq!(HullCodec::decode(&bytes).map_err(|e| e.to_string())?, hull);
        Ok(())
    }

    #[test]
    fn ceded_instances_travel() -> Result<(), String> {
        let hull = HullModel::new(3, 1, vec![4, 9, 11], vec![2, 3, 2], vec![0.5, 1.0, 1.5])
            .map_err(|e| e.to_string())?
            .retain_members(|i| i != 1);
        let bytes = HullCodec::encode(&hull).map_err(|e| e.to_string())?;
        assert_eq!(bytes.len(), HullCodec::encoded_len(&hull));
        assert_eq!(&bytes[bytes.len() - 12..bytes.len() - 8], &1_i32.to_le_bytes());
        assert_eq!(&bytes[bytes.len() - 8..], &9_i64.to_le_bytes());

        let decoded = HullCodec::decode(&bytes).map_err(|e| e.to_string())?;
        assert_eq!(decoded.ceded(), &[9]);
        assert_eq!(decoded, hull);
        Ok(())
    }

    #[test]
    fn malformed_payloads() -> Result<(), String> {
        let hull = HullModel::new(1, 1, vec![1], vec![1], vec![0.0]).map_err(|e| e.to_string())?;
        let bytes = HullCodec::encode(&hull).map_err(|e| e.to_string())?;

        assert!(HullCodec::decode(&bytes[..bytes.len() - 1]).is_err());

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(HullCodec::decode(&trailing).is_err());

        let mut negative = Vec::new();
        negative.extend_from_slice(&1_i64.to_le_bytes());
        put_i32(&mut negative, -1);
        put_i32(&mut negative, 1);
        assert!(HullCodec::decode(&negative).is_err());

        let mut huge = Vec::new();
        huge.extend_from_slice(&1_i64.to_le_bytes());
        put_i32(&mut huge, i32::MAX);
        put_i32(&mut huge, 1);
        assert!(HullCodec::decode(&huge).is_err());
        Ok(())
    }

    #[test]
    fn noise_batches() -> Result<(), String> {
        let points = vec![
            NoisePoint {
                instance: 7,
                neighbourhood_size: 1,
                coordinates: vec![1.0, 2.0],
            },
            NoisePoint {
                instance: -3,
                neighbourhood_size: 2,
                coordinates: vec![0.0, -1.0],
            },
        ];
        let bytes = HullCodec::encode_noise(&points, 2).map_err(|e| e.to_string())?;
        assert_eq!(bytes.len(), 8 + 2 * (16 + 16));
        let (decoded, dim) = HullCodec::decode_noise(&bytes).map_err(|e| e.to_string())?;
        assert_eq!(dim, 2);
        assert_eq!(decoded, points);

        assert!(HullCodec::encode_noise(&points, 3).is_err());
        Ok(())
    }
}
