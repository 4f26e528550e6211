//! TCP star: every worker holds one connection to the coordinator.
//!
//! Frame layout, little-endian:
//!
//! ```text
//! tag: u64 | kind: u8 (0 data, 1 abort) | len: u64 | payload
//! ```
//!
//! A worker opens its connection with an 8-byte hello carrying its rank.

use crate::comm::Communicator;
use crate::error::TransportError;
use std::collections::{HashMap, VecDeque};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;
use tremor_kernel::{COORDINATOR, ProcessLayout};

const KIND_DATA: u8 = 0;
const KIND_ABORT: u8 = 1;
const MAX_FRAME: u64 = 1 << 34;
const CONNECT_ATTEMPTS: u32 = 50;
const CONNECT_BACKOFF: Duration = Duration::from_millis(100);
/// Frames a rank may hold for tags it has not asked for yet.
pub const DEFAULT_MAX_PENDING: usize = 4096;

struct Link {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Link {
    fn new(stream: TcpStream) -> Result<Self, TransportError> {
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            reader,
            writer: BufWriter::new(stream),
        })
    }

    fn write_frame(&mut self, tag: u64, kind: u8, payload: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(&tag.to_le_bytes())?;
        self.writer.write_all(&[kind])?;
        self.writer.write_all(&(payload.len() as u64).to_le_bytes())?;
        self.writer.write_all(payload)?;
        self.writer.flush()
    }

    fn read_frame(&mut self) -> std::io::Result<(u64, u8, Vec<u8>)> {
        let mut word = [0u8; 8];
        self.reader.read_exact(&mut word)?;
        let tag = u64::from_le_bytes(word);
        let mut kind = [0u8; 1];
        self.reader.read_exact(&mut kind)?;
        self.reader.read_exact(&mut word)?;
        let len = u64::from_le_bytes(word);
        if len > MAX_FRAME {
            return Err(std::io::Error::new(
                ErrorKind::InvalidData,
                format!("frame of {len} bytes exceeds limit"),
            ));
        }
        let mut payload = vec![0u8; len as usize];
        self.reader.read_exact(&mut payload)?;
        Ok((tag, kind[0], payload))
    }
}

pub struct TcpEndpoint {
    layout: ProcessLayout,
    links: Vec<Option<Link>>,
    pending: HashMap<(usize, u64), VecDeque<Vec<u8>>>,
    stashed: usize,
    max_pending: usize,
    finished: bool,
}

impl TcpEndpoint {
    /// Coordinator side: binds `addr` and waits for every worker.
    pub fn coordinator(addr: impl ToSocketAddrs, nprocs: usize) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)?;
        Self::accept(listener, nprocs)
    }

    /// Coordinator side on an already bound listener.
    pub fn accept(listener: TcpListener, nprocs: usize) -> Result<Self, TransportError> {
        let layout = ProcessLayout::new(COORDINATOR, nprocs)?;
        let mut links: Vec<Option<Link>> = (0..nprocs).map(|_| None).collect();
        let mut connected = 0;
        while connected + 1 < nprocs {
            let (stream, peer_addr) = listener.accept()?;
            let mut hello = [0u8; 8];
            (&stream).read_exact(&mut hello)?;
            let rank = usize::try_from(u64::from_le_bytes(hello))
                .map_err(|_| TransportError::Protocol("hello rank exceeds usize".to_string()))?;
            if rank == COORDINATOR || rank >= nprocs {
                return Err(TransportError::Protocol(format!(
                    "{peer_addr} announced rank {rank} outside 1..{nprocs}"
                )));
            }
            if links[rank].is_some() {
                return Err(TransportError::Protocol(format!(
                    "rank {rank} connected twice"
                )));
            }
            tracing::debug!(rank = COORDINATOR, worker = rank, %peer_addr, "worker connected");
            links[rank] = Some(Link::new(stream)?);
            connected += 1;
        }
        tracing::info!(rank = COORDINATOR, nprocs, "all workers connected");
        Ok(Self {
            layout,
            links,
            pending: HashMap::new(),
            stashed: 0,
            max_pending: DEFAULT_MAX_PENDING,
            finished: false,
        })
    }

    /// Worker side: connects to the coordinator, retrying while it starts up.
    pub fn worker(addr: &str, rank: usize, nprocs: usize) -> Result<Self, TransportError> {
        let layout = ProcessLayout::new(rank, nprocs)?;
        if layout.is_coordinator() {
            return Err(TransportError::Protocol(
                "rank 0 must use the coordinator endpoint".to_string(),
            ));
        }
        let stream = connect_with_retry(addr)?;
        (&stream).write_all(&(rank as u64).to_le_bytes())?;
        let mut links: Vec<Option<Link>> = (0..nprocs).map(|_| None).collect();
        links[COORDINATOR] = Some(Link::new(stream)?);
        tracing::debug!(rank, %addr, "connected to coordinator");
        Ok(Self {
            layout,
            links,
            pending: HashMap::new(),
            stashed: 0,
            max_pending: DEFAULT_MAX_PENDING,
            finished: false,
        })
    }

    /// Caps the frames held back while waiting for another tag.
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    fn stash(&mut self, source: usize, tag: u64, payload: Vec<u8>) {
        self.pending.entry((source, tag)).or_default().push_back(payload);
        self.stashed += 1;
    }

    fn link(&mut self, peer: usize) -> Result<&mut Link, TransportError> {
        let rank = self.layout.rank();
        if peer >= self.layout.nprocs() {
            return Err(TransportError::Unreachable {
                rank,
                dest: peer,
                reason: "rank out of range",
            });
        }
        self.links[peer]
            .as_mut()
            .ok_or(TransportError::Unreachable {
                rank,
                dest: peer,
                reason: "workers only talk to the coordinator",
            })
    }
}

fn connect_with_retry(addr: &str) -> Result<TcpStream, TransportError> {
    let mut last = String::new();
    for attempt in 0..CONNECT_ATTEMPTS {
        match TcpStream::connect(addr) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                last = err.to_string();
                tracing::trace!(attempt, %addr, error = %err, "coordinator not reachable yet");
                thread::sleep(CONNECT_BACKOFF);
            }
        }
    }
    Err(TransportError::Connect {
        addr: addr.to_string(),
        message: last,
    })
}

fn disconnected(peer: usize, err: std::io::Error) -> TransportError {
    match err.kind() {
        ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::BrokenPipe => {
            TransportError::Disconnected { peer }
        }
        _ => TransportError::Io(err.to_string()),
    }
}

impl Communicator for TcpEndpoint {
    fn rank(&self) -> usize {
        self.layout.rank()
    }

    fn size(&self) -> usize {
        self.layout.nprocs()
    }

    fn send(&mut self, dest: usize, tag: u64, payload: Vec<u8>) -> Result<(), TransportError> {
        if dest == self.layout.rank() {
            self.stash(dest, tag, payload);
            return Ok(());
        }
        self.link(dest)?
            .write_frame(tag, KIND_DATA, &payload)
            .map_err(|err| disconnected(dest, err))
    }

    fn recv(&mut self, source: usize, tag: u64) -> Result<Vec<u8>, TransportError> {
        if let Some(queue) = self.pending.get_mut(&(source, tag))
            && let Some(payload) = queue.pop_front()
        {
            self.stashed -= 1;
            return Ok(payload);
        }
        loop {
            let (got, kind, payload) = self
                .link(source)?
                .read_frame()
                .map_err(|err| disconnected(source, err))?;
            match kind {
                KIND_DATA if got == tag => return Ok(payload),
                KIND_DATA => {
                    if self.stashed >= self.max_pending {
                        return Err(TransportError::Protocol(format!(
                            "rank {source} sent {} frames ahead of tag {tag}",
                            self.stashed
                        )));
                    }
                    self.stash(source, got, payload);
                    tracing::debug!(
                        rank = self.layout.rank(),
                        source,
                        tag = got,
                        waiting_for = tag,
                        stashed = self.stashed,
                        "holding out-of-order frame"
                    );
                }
                KIND_ABORT => {
                    self.finished = true;
                    return Err(TransportError::Aborted {
                        rank: source,
                        reason: String::from_utf8_lossy(&payload).into_owned(),
                    });
                }
                other => {
                    return Err(TransportError::Protocol(format!(
                        "unknown frame kind {other} from rank {source}"
                    )));
                }
            }
        }
    }

    fn abort(&mut self, reason: &str) {
        if self.finished {
            return;
        }
        self.finished = true;
        tracing::warn!(rank = self.layout.rank(), reason, "aborting tcp job");
        for link in self.links.iter_mut().flatten() {
            let _ = link.write_frame(0, KIND_ABORT, reason.as_bytes());
        }
    }

    fn finish(&mut self) {
        for link in self.links.iter_mut().flatten() {
            let _ = link.writer.flush();
        }
        self.finished = true;
    }
}

impl Drop for TcpEndpoint {
    fn drop(&mut self) {
        if !self.finished {
            self.abort("endpoint dropped before finish");
        }
    }
}
