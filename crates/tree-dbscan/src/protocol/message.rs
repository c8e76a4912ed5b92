//! Typed messages and their payload layouts.

use super::{Frame, RunStatistics, Tag};
use crate::{
    codec::{put_bool, put_f64s, put_i32, put_str, ByteReader},
    hull::{HullCodec, HullModel, NoisePoint},
    utils::len_to_i32,
    ClusteringConfig, DimensionRange, GlobalModel, Result, TdbscanError,
};

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// The clustering parameters.
    Config(ClusteringConfig),
    /// The dimension range of a subtree.
    Range(DimensionRange),
    /// End of a range stream.
    AllRangesSent,
    /// The dimension range of the whole tree.
    GlobalRange(DimensionRange),
    /// One hull.
    Hull(HullModel),
    /// End of a hull stream.
    AllHullsSent,
    /// A batch of noise points and their dimensionality.
    Noise(Vec<NoisePoint>, usize),
    /// End of a noise stream.
    AllNoiseSent,
    /// The global model.
    GlobalModel(GlobalModel),
    /// The statistics of a subtree.
    Statistics(RunStatistics),
    /// A neighbour failed with this message.
    Abort(String),
    /// A child announcing its rank.
    Hello(usize),
}

impl Message {
    /// The tag of the frame carrying this message.
    #[must_use]
    pub const fn tag(&self) -> Tag {
        match self {
            Self::Config(_) => Tag::Config,
            Self::Range(_) => Tag::Range,
            Self::AllRangesSent => Tag::AllRangesSent,
            Self::GlobalRange(_) => Tag::GlobalRange,
            Self::Hull(_) => Tag::Hulls,
            Self::AllHullsSent => Tag::AllHullsSent,
            Self::Noise(..) => Tag::Noise,
            Self::AllNoiseSent => Tag::AllNoiseSent,
            Self::GlobalModel(_) => Tag::GlobalModel,
            Self::Statistics(_) => Tag::Statistics,
            Self::Abort(_) => Tag::Abort,
            Self::Hello(_) => Tag::Hello,
        }
    }

    /// Encodes the message into a frame.
    ///
    /// # Errors
    ///
    /// * If a count does not fit its wire width.
    pub fn to_frame(&self) -> Result<Frame> {
        let payload = match self {
            Self::Config(config) => encode_config(config)?,
            Self::Range(range) | Self::GlobalRange(range) => encode_range(range)?,
            Self::Hull(hull) => HullCodec::encode(hull)?,
            Self::Noise(points, dimensionality) => HullCodec::encode_noise(points, *dimensionality)?,
            Self::GlobalModel(model) => model.to_bytes()?,
            Self::Statistics(stats) => stats.to_bytes(),
            Self::Abort(reason) => {
                let mut buf = Vec::new();
                put_str(&mut buf, reason)?;
                buf
            }
            Self::Hello(rank) => {
                let mut buf = Vec::new();
                put_i32(&mut buf, len_to_i32(*rank)?);
                buf
            }
            Self::AllRangesSent | Self::AllHullsSent | Self::AllNoiseSent => Vec::new(),
        };
        Ok(Frame::new(self.tag(), payload))
    }

    /// Decodes a frame.
    ///
    /// # Errors
    ///
    /// * If the payload does not match the layout of its tag.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let bytes = frame.payload();
        let sentinel = |message: Self| -> Result<Self> {
            if bytes.is_empty() {
                Ok(message)
            } else {
                Err(TdbscanError::Codec(format!("{} carries a payload", frame.tag())))
            }
        };

        match frame.tag() {
            Tag::Config => decode_config(bytes).map(Self::Config),
            Tag::Range => decode_range(bytes).map(Self::Range),
            Tag::AllRangesSent => sentinel(Self::AllRangesSent),
            Tag::GlobalRange => decode_range(bytes).map(Self::GlobalRange),
            Tag::Hulls => HullCodec::decode(bytes).map(Self::Hull),
            Tag::AllHullsSent => sentinel(Self::AllHullsSent),
            Tag::Noise => HullCodec::decode_noise(bytes).map(|(points, d)| Self::Noise(points, d)),
            Tag::AllNoiseSent => sentinel(Self::AllNoiseSent),
            Tag::GlobalModel => GlobalModel::from_bytes(bytes).map(Self::GlobalModel),
            Tag::Statistics => RunStatistics::from_bytes(bytes).map(Self::Statistics),
            Tag::Abort => {
                let mut reader = ByteReader::new(bytes);
                let reason = reader.read_str()?;
                reader.finish()?;
                Ok(Self::Abort(reason))
            }
            Tag::Hello => {
                let mut reader = ByteReader::new(bytes);
                let rank = reader.read_len("rank")?;
                reader.finish()?;
                Ok(Self::Hello(rank))
            }
        }
    }
}

fn encode_config(config: &ClusteringConfig) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    put_f64s(&mut buf, &[config.epsilon]);
    put_i32(&mut buf, len_to_i32(config.min_points)?);
    put_str(&mut buf, &config.clustering_definition)?;
    put_str(&mut buf, &config.input_path)?;
    put_str(&mut buf, &config.output_path)?;
    put_bool(&mut buf, config.verbose);
    put_bool(&mut buf, config.reconstruct_trace);
    put_bool(&mut buf, config.normalize);
    Ok(buf)
}

fn decode_config(bytes: &[u8]) -> Result<ClusteringConfig> {
    let mut reader = ByteReader::new(bytes);
    let epsilon = reader.read_f64()?;
    let min_points = reader.read_len("minPoints")?;
    let definition = reader.read_str()?;
    let input = reader.read_str()?;
    let output = reader.read_str()?;
    let verbose = reader.read_bool()?;
    let reconstruct = reader.read_bool()?;
    let normalize = reader.read_bool()?;
    reader.finish()?;

    Ok(ClusteringConfig::new(epsilon, min_points)?
        .with_definition(&definition)
        .with_paths(&input, &output)
        .with_verbose(verbose)
        .with_reconstruct_trace(reconstruct)
        .with_normalize(normalize))
}

fn encode_range(range: &DimensionRange) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(4 + 16 * range.dimensionality());
    put_i32(&mut buf, len_to_i32(range.dimensionality())?);
    put_f64s(&mut buf, range.mins());
    put_f64s(&mut buf, range.maxs());
    Ok(buf)
}

fn decode_range(bytes: &[u8]) -> Result<DimensionRange> {
    let mut reader = ByteReader::new(bytes);
    let d = reader.read_len("dimension count")?;
    let mins = reader.read_f64s(d)?;
    let maxs = reader.read_f64s(d)?;
    reader.finish()?;
    DimensionRange::new(mins, maxs)
}
