//! The transport seen by one worker: its neighbours in the tree and a
//! single inbox.

use super::{Frame, Message};
use crate::Result;

/// Something a worker received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// The rank of the sender.
    pub from: usize,
    /// The frame, or `None` if the connection to the sender closed.
    pub frame: Option<Frame>,
}

/// One worker's connections to its parent and children.
///
/// Frames from a given sender arrive in the order they were sent. Frames
/// from different senders may interleave arbitrarily.
pub trait Link {
    /// The rank of this worker.
    fn rank(&self) -> usize;

    /// The rank of the parent, `None` at the root.
    fn parent(&self) -> Option<usize>;

    /// The ranks of the children, in ascending order.
    fn children(&self) -> &[usize];

    /// Sends a frame to a neighbour.
    ///
    /// # Errors
    ///
    /// * If `to` is not a neighbour.
    /// * If the connection to `to` has failed.
    fn send(&self, to: usize, frame: &Frame) -> Result<()>;

    /// Blocks until the next frame arrives from any neighbour.
    ///
    /// `waiting_for` names the phase, for timeout errors and logs.
    ///
    /// # Errors
    ///
    /// * If the receive times out.
    /// * If every neighbour has gone away.
    fn recv(&self, waiting_for: &str) -> Result<Envelope>;

    /// Whether this worker is the root.
    fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    /// Encodes and sends a message.
    ///
    /// # Errors
    ///
    /// See [`Message::to_frame`] and [`Link::send`].
    fn send_message(&self, to: usize, message: &Message) -> Result<()> {
        self.send(to, &message.to_frame()?)
    }

    /// All neighbours: the parent, if any, then the children.
    fn neighbours(&self) -> Vec<usize> {
        self.parent().into_iter().chain(self.children().iter().copied()).collect()
    }
}
