//! An in-process network: one thread per worker, one channel per inbox.

use std::{
    collections::HashMap,
    sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender},
    time::Duration,
};

use super::{run_worker, tree::broadcast_abort, Envelope, Frame, Link, WorkerRole};
use crate::{Result, TdbscanError, Topology, TreePosition};

/// Builds the links of every worker of a topology.
pub struct LocalNetwork;

impl LocalNetwork {
    /// Creates one connected link per rank, in rank order.
    ///
    /// With a `timeout`, a receive that waits longer fails with
    /// [`TdbscanError::Timeout`].
    #[must_use]
    pub fn build(topology: &Topology, timeout: Option<Duration>) -> Vec<LocalLink> {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..topology.len()).map(|_| channel::<Envelope>()).unzip();

        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| {
                let parent = topology.parent(rank);
                let children = topology.children(rank).to_vec();
                let outboxes = parent
                    .into_iter()
                    .chain(children.iter().copied())
                    .map(|n| (n, senders[n].clone()))
                    .collect();
                LocalLink {
                    rank,
                    parent,
                    children,
                    outboxes,
                    inbox,
                    timeout,
                }
            })
            .collect()
    }

    /// Runs a role on every worker of a topology, one thread per worker.
    ///
    /// Returns the result of each worker, in rank order.
    pub fn run<R, F>(topology: &Topology, timeout: Option<Duration>, make_role: F) -> Vec<Result<R::Output>>
    where
        R: WorkerRole,
        R::Output: Send,
        F: Fn(TreePosition) -> Result<R> + Sync,
    {
        let links = Self::build(topology, timeout);
        std::thread::scope(|scope| {
            let handles = links
                .into_iter()
                .map(|link| {
                    let make_role = &make_role;
                    scope.spawn(move || match topology.position(link.rank()).and_then(make_role) {
                        Ok(role) => run_worker(role, &link),
                        Err(e) => {
                            broadcast_abort(&link, &format!("worker {}: {e}", link.rank()));
                            Err(e)
                        }
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|h| {
                    h.join()
                        .unwrap_or_else(|_| Err(TdbscanError::Aborted("a worker thread panicked".to_string())))
                })
                .collect()
        })
    }
}

/// A worker's end of a [`LocalNetwork`].
pub struct LocalLink {
    /// The rank of this worker.
    rank: usize,
    /// The rank of the parent.
    parent: Option<usize>,
    /// The ranks of the children.
    children: Vec<usize>,
    /// The inbox of each neighbour.
    outboxes: HashMap<usize, Sender<Envelope>>,
    /// This worker's inbox.
    inbox: Receiver<Envelope>,
    /// How long a receive may block.
    timeout: Option<Duration>,
}

impl Link for LocalLink {
    fn rank(&self) -> usize {
        self.rank
    }

    fn parent(&self) -> Option<usize> {
        self.parent
    }

    fn children(&self) -> &[usize] {
        &self.children
    }

    fn send(&self, to: usize, frame: &Frame) -> Result<()> {
        let outbox = self
            .outboxes
            .get(&to)
            .ok_or_else(|| TdbscanError::protocol(self.rank, format!("Worker {to} is not a neighbour")))?;
        outbox
            .send(Envelope {
                from: self.rank,
                frame: Some(frame.clone()),
            })
            .map_err(|_| TdbscanError::protocol(self.rank, format!("Worker {to} has left")))
    }

    fn recv(&self, waiting_for: &str) -> Result<Envelope> {
        let gone = || TdbscanError::protocol(self.rank, format!("All neighbours left while waiting for {waiting_for}"));
        match self.timeout {
            Some(timeout) => self.inbox.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => TdbscanError::Timeout {
                    rank: self.rank,
                    waiting_for: waiting_for.to_string(),
                },
                RecvTimeoutError::Disconnected => gone(),
            }),
            None => self.inbox.recv().map_err(|_| gone()),
        }
    }
}
