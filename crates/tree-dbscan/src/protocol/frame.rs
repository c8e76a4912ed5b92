//! Tagged, length-prefixed frames: `tag: u8, length: u64, payload`.

use std::io::{Read, Write};

use crate::{Result, TdbscanError};

/// The largest payload a peer may announce.
pub const MAX_PAYLOAD: u64 = 1 << 32;

/// The kind of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Tag {
    /// The clustering parameters, sent down the tree at start-up.
    Config = 1,
    /// The dimension range of a subtree.
    Range = 2,
    /// End of a child's range stream.
    AllRangesSent = 3,
    /// The dimension range of the whole tree.
    GlobalRange = 4,
    /// One hull.
    Hulls = 5,
    /// End of a child's hull stream.
    AllHullsSent = 6,
    /// A batch of unabsorbed noise points.
    Noise = 7,
    /// End of a child's noise stream.
    AllNoiseSent = 8,
    /// The global model.
    GlobalModel = 9,
    /// Run statistics of a subtree.
    Statistics = 10,
    /// A neighbour has failed.
    Abort = 11,
    /// The rank of a child opening a connection.
    Hello = 12,
}

impl Tag {
    /// The name used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Config => "CONFIG",
            Self::Range => "RANGE",
            Self::AllRangesSent => "ALL_RANGES_SENT",
            Self::GlobalRange => "GLOBAL_RANGE",
            Self::Hulls => "HULLS",
            Self::AllHullsSent => "ALL_HULLS_SENT",
            Self::Noise => "NOISE",
            Self::AllNoiseSent => "ALL_NOISE_SENT",
            Self::GlobalModel => "GLOBAL_MODEL",
            Self::Statistics => "STATISTICS",
            Self::Abort => "ABORT",
            Self::Hello => "HELLO",
        }
    }
}

impl TryFrom<u8> for Tag {
    type Error = TdbscanError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            1 => Self::Config,
            2 => Self::Range,
            3 => Self::AllRangesSent,
            4 => Self::GlobalRange,
            5 => Self::Hulls,
            6 => Self::AllHullsSent,
            7 => Self::Noise,
            8 => Self::AllNoiseSent,
            9 => Self::GlobalModel,
            10 => Self::Statistics,
            11 => Self::Abort,
            12 => Self::Hello,
            _ => return Err(TdbscanError::Codec(format!("Unknown message tag {value}"))),
        })
    }
}

impl core::fmt::Display for Tag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// One message on a tree edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The kind of message.
    tag: Tag,
    /// The encoded body.
    payload: Vec<u8>,
}

impl Frame {
    /// Creates a frame.
    #[must_use]
    pub const fn new(tag: Tag, payload: Vec<u8>) -> Self {
        Self { tag, payload }
    }

    /// Creates a frame with no payload, e.g. a sentinel.
    #[must_use]
    pub const fn empty(tag: Tag) -> Self {
        Self::new(tag, Vec::new())
    }

    /// The kind of message.
    #[must_use]
    pub const fn tag(&self) -> Tag {
        self.tag
    }

    /// The encoded body.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The frame as it goes on the wire.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(9 + self.payload.len());
        bytes.push(self.tag as u8);
        bytes.extend_from_slice(&(self.payload.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Writes the frame to a stream.
    ///
    /// # Errors
    ///
    /// * If the stream fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Reads the next frame from a stream.
    ///
    /// Returns `None` if the stream ends cleanly before a new frame.
    ///
    /// # Errors
    ///
    /// * If the stream fails or ends inside a frame.
    /// * If the tag is unknown or the length exceeds [`MAX_PAYLOAD`].
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Option<Self>> {
        let mut tag = [0_u8; 1];
        if reader.read(&mut tag)? == 0 {
            return Ok(None);
        }
        let tag = Tag::try_from(tag[0])?;

        let mut len = [0_u8; 8];
        reader.read_exact(&mut len)?;
        let len = u64::from_le_bytes(len);
        if len > MAX_PAYLOAD {
            return Err(TdbscanError::Codec(format!("{tag} frame announces {len} bytes")));
        }

        let len = usize::try_from(len).map_err(|e| TdbscanError::Codec(e.to_string()))?;
        let mut payload = vec![0_u8; len];
        reader.read_exact(&mut payload)?;
        Ok(Some(Self { tag, payload }))
    }
}

#[cfg(test)]
mod tests {
    use super::{Frame, Tag};

    #[test]
    fn frames_on_a_stream() -> Result<(), String> {
        let frames = vec![
            Frame::new(Tag::Hulls, vec![1, 2, 3]),
            Frame::empty(Tag::AllHullsSent),
        ];
        let mut bytes = Vec::new();
        for f in &frames {
            f.write_to(&mut bytes).map_err(|e| e.to_string())?;
        }
        assert_eq!(bytes[0], 5);
        assert_eq!(&bytes[1..9], &3_u64.to_le_bytes());

        let mut cursor = std::io::Cursor::new(bytes);
        let mut read = Vec::new();
        while let Some(f) = Frame::read_from(&mut cursor).map_err(|e| e.to_string())? {
            read.push(f);
        }
        assert_eq!(read, frames);
        Ok(())
    }

    #[test]
    fn bad_frames() {
        let mut cursor = std::io::Cursor::new(vec![42_u8, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(Frame::read_from(&mut cursor).is_err());

        let mut truncated = Frame::new(Tag::Abort, vec![1, 2, 3]).to_bytes();
        truncated.pop();
        assert!(Frame::read_from(&mut std::io::Cursor::new(truncated)).is_err());

        let mut huge = vec![Tag::Hulls as u8];
        huge.extend_from_slice(&u64::MAX.to_le_bytes());
        assert!(Frame::read_from(&mut std::io::Cursor::new(huge)).is_err());
    }

    #[test]
    fn tags() {
        for b in 1..=12_u8 {
            assert!(Tag::try_from(b).is_ok_and(|t| t as u8 == b));
        }
        assert!(Tag::try_from(0).is_err());
        assert_eq!(Tag::AllHullsSent.to_string(), "ALL_HULLS_SENT");
    }
}
