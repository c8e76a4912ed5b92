//! Reduction and broadcast primitives over a [`Link`].

use super::{Frame, Link, Message, Tag};
use crate::{Result, TdbscanError};

/// Where a worker is in a reduction phase.
///
/// A worker with children passes through every state in order; a leaf only
/// ever reaches `Forwarded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionState {
    /// Collecting the streams of the children.
    AwaitingChildren,
    /// Combining the children's data with the local data.
    Merging,
    /// The combined data went to the parent, or the root holds the result.
    Forwarded,
}

/// One kind of data a child sends during a reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stream {
    /// The tag of the data frames.
    pub data: Tag,
    /// The tag that ends the stream, or `None` for a stream of exactly one
    /// data frame.
    pub sentinel: Option<Tag>,
}

impl Stream {
    /// Any number of `data` frames ended by `sentinel`.
    #[must_use]
    pub const fn terminated(data: Tag, sentinel: Tag) -> Self {
        Self {
            data,
            sentinel: Some(sentinel),
        }
    }

    /// Exactly one `data` frame.
    #[must_use]
    pub const fn single(data: Tag) -> Self {
        Self { data, sentinel: None }
    }
}

/// Receives the given streams from every child, calling `on_data` with each
/// data frame.
///
/// Returns once every stream of every child is complete. Nothing is
/// returned early: a child that never completes a stream blocks this call
/// until the link times out.
///
/// # Errors
///
/// * If a neighbour sends `ABORT`.
/// * If a frame comes from the parent, arrives after its stream ended, or
///   belongs to no stream.
/// * If a child disconnects before completing its streams.
/// * Whatever `on_data` or the link returns.
pub fn gather_children<L, F>(link: &L, phase: &str, streams: &[Stream], mut on_data: F) -> Result<()>
where
    L: Link + ?Sized,
    F: FnMut(usize, &Frame) -> Result<()>,
{
    let rank = link.rank();
    let children = link.children();
    let mut done = vec![vec![false; streams.len()]; children.len()];

    while done.iter().any(|d| d.iter().any(|&s| !s)) {
        let envelope = link.recv(phase)?;
        let from = envelope.from;
        if let Some(frame) = envelope.frame.as_ref().filter(|f| f.tag() == Tag::Abort) {
            return Err(aborted(frame));
        }
        let Some(c) = children.iter().position(|&child| child == from) else {
            return Err(unexpected(rank, from, envelope.frame.as_ref(), phase));
        };

        let Some(frame) = envelope.frame else {
            if done[c].iter().all(|&s| s) {
                continue;
            }
            return Err(TdbscanError::protocol(
                rank,
                format!("Child {from} disconnected while sending {phase}"),
            ));
        };
        let tag = frame.tag();
        let Some(s) = streams.iter().position(|s| s.data == tag || s.sentinel == Some(tag)) else {
            return Err(unexpected(rank, from, Some(&frame), phase));
        };
        if done[c][s] {
            return Err(TdbscanError::protocol(
                rank,
                format!("Child {from} sent {tag} after its {phase} stream ended"),
            ));
        }

        if tag == streams[s].data {
            on_data(from, &frame)?;
            if streams[s].sentinel.is_none() {
                done[c][s] = true;
            }
        } else {
            ftlog::debug!("Worker {rank} received {tag} from child {from}.");
            done[c][s] = true;
        }
    }
    Ok(())
}

/// Blocks until the parent sends a frame with the `expected` tag.
///
/// # Errors
///
/// * If a neighbour sends `ABORT`.
/// * If any other frame arrives, or the parent disconnects.
/// * If called at the root.
pub fn receive_from_parent<L: Link + ?Sized>(link: &L, expected: Tag, phase: &str) -> Result<Frame> {
    let rank = link.rank();
    let parent = link
        .parent()
        .ok_or_else(|| TdbscanError::protocol(rank, format!("The root has no parent to send {expected}")))?;

    let envelope = link.recv(phase)?;
    match envelope.frame {
        Some(frame) if frame.tag() == Tag::Abort => Err(aborted(&frame)),
        Some(frame) if envelope.from == parent && frame.tag() == expected => Ok(frame),
        None if envelope.from == parent => Err(TdbscanError::protocol(
            rank,
            format!("Parent {parent} disconnected before sending {expected}"),
        )),
        frame => Err(unexpected(rank, envelope.from, frame.as_ref(), phase)),
    }
}

/// Sends a frame to every child.
///
/// # Errors
///
/// * If a send fails.
pub fn forward_to_children<L: Link + ?Sized>(link: &L, frame: &Frame) -> Result<()> {
    link.children().iter().try_for_each(|&child| link.send(child, frame))
}

/// Sends a message to the parent. Does nothing at the root.
///
/// # Errors
///
/// * If the send fails.
pub fn send_to_parent<L: Link + ?Sized>(link: &L, message: &Message) -> Result<()> {
    match link.parent() {
        Some(parent) => link.send_message(parent, message),
        None => Ok(()),
    }
}

/// Tells every neighbour that this worker is giving up. Failures are
/// ignored, since neighbours may already be gone.
pub fn broadcast_abort<L: Link + ?Sized>(link: &L, reason: &str) {
    match Message::Abort(reason.to_string()).to_frame() {
        Ok(frame) => {
            for n in link.neighbours() {
                if let Err(e) = link.send(n, &frame) {
                    ftlog::debug!("Worker {} could not tell worker {n} to abort: {e}", link.rank());
                }
            }
        }
        Err(e) => ftlog::error!("Worker {} could not encode an abort: {e}", link.rank()),
    }
}

fn aborted(frame: &Frame) -> TdbscanError {
    match Message::from_frame(frame) {
        Ok(Message::Abort(reason)) => TdbscanError::Aborted(reason),
        _ => TdbscanError::Aborted("a neighbour aborted".to_string()),
    }
}

fn unexpected(rank: usize, from: usize, frame: Option<&Frame>, phase: &str) -> TdbscanError {
    match frame {
        Some(frame) => TdbscanError::protocol(
            rank,
            format!("Unexpected {} from worker {from} while waiting for {phase}", frame.tag()),
        ),
        None => TdbscanError::protocol(rank, format!("Worker {from} disconnected while waiting for {phase}")),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        protocol::{Frame, Link, LocalNetwork, Message, Tag},
        TdbscanError, Topology,
    };

    use super::{gather_children, receive_from_parent, Stream};

    const HULL_STREAMS: [Stream; 2] = [
        Stream::terminated(Tag::Hulls, Tag::AllHullsSent),
        Stream::terminated(Tag::Noise, Tag::AllNoiseSent),
    ];

    #[test]
    fn waits_for_every_sentinel() -> Result<(), String> {
        let topology = Topology::flat(3).map_err(|e| e.to_string())?;
        let links = LocalNetwork::build(&topology, None);

        let send = |rank: usize, tag: Tag, payload: Vec<u8>| links[rank].send(0, &Frame::new(tag, payload));
        send(1, Tag::Hulls, vec![1]).map_err(|e| e.to_string())?;
        send(2, Tag::AllNoiseSent, Vec::new()).map_err(|e| e.to_string())?;
        send(1, Tag::AllHullsSent, Vec::new()).map_err(|e| e.to_string())?;
        send(2, Tag::Hulls, vec![2]).map_err(|e| e.to_string())?;
        send(2, Tag::Hulls, vec![3]).map_err(|e| e.to_string())?;
        send(2, Tag::AllHullsSent, Vec::new()).map_err(|e| e.to_string())?;
        send(1, Tag::AllNoiseSent, Vec::new()).map_err(|e| e.to_string())?;

        let mut seen = Vec::new();
        gather_children(&links[0], "hulls", &HULL_STREAMS, |from, frame| {
            seen.push((from, frame.payload()[0]));
            Ok(())
        })
        .map_err(|e| e.to_string())?;
        assert_eq!(seen, vec![(1, 1), (2, 2), (2, 3)]);
        Ok(())
    }

    #[test]
    fn data_after_sentinel_is_rejected() -> Result<(), String> {
        let topology = Topology::flat(2).map_err(|e| e.to_string())?;
        let links = LocalNetwork::build(&topology, None);
        links[1].send(0, &Frame::empty(Tag::AllHullsSent)).map_err(|e| e.to_string())?;
        links[1].send(0, &Frame::new(Tag::Hulls, vec![0])).map_err(|e| e.to_string())?;

        let result = gather_children(&links[0], "hulls", &HULL_STREAMS, |_, _| Ok(()));
        assert!(matches!(result, Err(TdbscanError::Protocol { rank: 0, .. })));
        Ok(())
    }

    #[test]
    fn wrong_phase_is_rejected() -> Result<(), String> {
        let topology = Topology::flat(2).map_err(|e| e.to_string())?;
        let links = LocalNetwork::build(&topology, None);
        links[1].send(0, &Frame::empty(Tag::AllRangesSent)).map_err(|e| e.to_string())?;
        assert!(gather_children(&links[0], "hulls", &HULL_STREAMS, |_, _| Ok(())).is_err());

        links[0].send(1, &Frame::empty(Tag::AllHullsSent)).map_err(|e| e.to_string())?;
        assert!(receive_from_parent(&links[1], Tag::GlobalModel, "the global model").is_err());
        Ok(())
    }

    #[test]
    fn aborts_surface() -> Result<(), String> {
        let topology = Topology::flat(2).map_err(|e| e.to_string())?;
        let links = LocalNetwork::build(&topology, None);
        links[0]
            .send_message(1, &Message::Abort("disk full".to_string()))
            .map_err(|e| e.to_string())?;
        let result = receive_from_parent(&links[1], Tag::GlobalModel, "the global model");
        assert!(matches!(result, Err(TdbscanError::Aborted(reason)) if reason == "disk full"));
        Ok(())
    }
}
