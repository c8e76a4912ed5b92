//! A TCP transport: one process per worker, one connection per tree edge.
//!
//! Every worker with children listens; every worker with a parent connects
//! to it and introduces itself with a `HELLO` frame. A reader thread per
//! connection feeds the worker's single inbox.

use std::{
    collections::HashMap,
    io::ErrorKind,
    net::{Shutdown, SocketAddr, TcpListener, TcpStream},
    sync::{
        mpsc::{channel, Receiver, RecvTimeoutError, Sender},
        Mutex,
    },
    time::{Duration, Instant},
};

use super::{Envelope, Frame, Link, Message, Tag};
use crate::{Result, TdbscanError, Topology};

/// How long to keep retrying the connection to the parent, or to wait for
/// the children, when no receive timeout is set.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Pause between connection attempts.
const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// A worker's TCP connections to its neighbours.
pub struct TcpLink {
    /// The rank of this worker.
    rank: usize,
    /// The rank of the parent.
    parent: Option<usize>,
    /// The ranks of the children.
    children: Vec<usize>,
    /// The write half of each connection.
    writers: HashMap<usize, Mutex<TcpStream>>,
    /// Frames from every connection.
    inbox: Receiver<Envelope>,
    /// How long a receive may block.
    timeout: Option<Duration>,
}

impl TcpLink {
    /// Connects a worker to its neighbours.
    ///
    /// # Arguments
    ///
    /// - `topology`: The shape of the tree.
    /// - `rank`: The rank of this worker.
    /// - `listener`: Where the children connect. Required if the worker has
    ///   children.
    /// - `parent_address`: Where the parent listens. Required unless the
    ///   worker is the root.
    /// - `timeout`: The receive timeout. Also bounds how long to wait for
    ///   connections.
    ///
    /// # Errors
    ///
    /// * If a required address is missing.
    /// * If the parent cannot be reached or the children do not all connect
    ///   in time.
    /// * If a connecting peer does not introduce itself as a child.
    pub fn connect(
        topology: &Topology,
        rank: usize,
        listener: Option<TcpListener>,
        parent_address: Option<SocketAddr>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let parent = topology.parent(rank);
        let children = topology.children(rank).to_vec();
        let deadline = Instant::now() + timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let (sender, inbox) = channel();
        let mut writers = HashMap::new();

        if let Some(p) = parent {
            let address = parent_address
                .ok_or_else(|| TdbscanError::Config(format!("Worker {rank} needs the address of its parent {p}")))?;
            let mut stream = connect_with_retry(address, deadline)?;
            stream.set_nodelay(true)?;
            Message::Hello(rank).to_frame()?.write_to(&mut stream)?;
            ftlog::debug!("Worker {rank} connected to parent {p} at {address}.");
            spawn_reader(rank, p, &stream, sender.clone())?;
            writers.insert(p, Mutex::new(stream));
        }

        if !children.is_empty() {
            let listener = listener
                .ok_or_else(|| TdbscanError::Config(format!("Worker {rank} has children but no listen address")))?;
            listener.set_nonblocking(true)?;
            while writers.len() < children.len() + usize::from(parent.is_some()) {
                let stream = match listener.accept() {
                    Ok((stream, _)) => stream,
                    Err(e) if e.kind() == ErrorKind::WouldBlock => {
                        if Instant::now() > deadline {
                            return Err(TdbscanError::Timeout {
                                rank,
                                waiting_for: "children to connect".to_string(),
                            });
                        }
                        std::thread::sleep(RETRY_INTERVAL);
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };
                stream.set_nonblocking(false)?;
                stream.set_nodelay(true)?;

                let mut reader = &stream;
                let child = match Frame::read_from(&mut reader)?.map(|f| Message::from_frame(&f)) {
                    Some(Ok(Message::Hello(child))) => child,
                    _ => return Err(TdbscanError::protocol(rank, "A peer connected without a HELLO")),
                };
                if !children.contains(&child) || writers.contains_key(&child) {
                    return Err(TdbscanError::protocol(
                        rank,
                        format!("Unexpected HELLO from worker {child}"),
                    ));
                }
                ftlog::debug!("Worker {rank} accepted child {child}.");
                spawn_reader(rank, child, &stream, sender.clone())?;
                writers.insert(child, Mutex::new(stream));
            }
        }

        Ok(Self {
            rank,
            parent,
            children,
            writers,
            inbox,
            timeout,
        })
    }
}

impl Drop for TcpLink {
    fn drop(&mut self) {
        // Wakes the reader threads on both ends.
        for writer in self.writers.values() {
            if let Ok(stream) = writer.lock() {
                let _ = stream.shutdown(Shutdown::Both);
            }
        }
    }
}

/// Connects to `address`, retrying until `deadline`.
fn connect_with_retry(address: SocketAddr, deadline: Instant) -> Result<TcpStream> {
    loop {
        match TcpStream::connect(address) {
            Ok(stream) => return Ok(stream),
            Err(e) if Instant::now() < deadline => {
                ftlog::debug!("Could not connect to {address} yet: {e}");
                std::thread::sleep(RETRY_INTERVAL);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Forwards every frame read from `stream` to the inbox, then a closing
/// envelope.
fn spawn_reader(rank: usize, from: usize, stream: &TcpStream, inbox: Sender<Envelope>) -> Result<()> {
    let mut stream = stream.try_clone()?;
    std::thread::spawn(move || loop {
        match Frame::read_from(&mut stream) {
            Ok(Some(frame)) => {
                if inbox.send(Envelope { from, frame: Some(frame) }).is_err() {
                    break;
                }
            }
            Ok(None) => {
                let _ = inbox.send(Envelope { from, frame: None });
                break;
            }
            Err(e) => {
                ftlog::warn!("Worker {rank} lost the connection to worker {from}: {e}");
                let _ = inbox.send(Envelope { from, frame: None });
                break;
            }
        }
    });
    Ok(())
}

impl Link for TcpLink {
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
        let writer = self
            .writers
            .get(&to)
            .ok_or_else(|| TdbscanError::protocol(self.rank, format!("Worker {to} is not a neighbour")))?;
        let mut stream = writer
            .lock()
            .map_err(|_| TdbscanError::protocol(self.rank, format!("Connection to worker {to} is poisoned")))?;
        if frame.tag() != Tag::Abort {
            ftlog::debug!("Worker {} sends {} to worker {to}.", self.rank, frame.tag());
        }
        frame.write_to(&mut *stream)
    }

    fn recv(&self, waiting_for: &str) -> Result<Envelope> {
        let gone = || TdbscanError::protocol(self.rank, format!("All connections closed while waiting for {waiting_for}"));
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
