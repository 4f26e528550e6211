//! In-process cluster: one thread per rank, channels between every pair.

use crate::comm::Communicator;
use crate::error::TransportError;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

enum Envelope {
    Data {
        source: usize,
        tag: u64,
        payload: Vec<u8>,
    },
    Abort {
        source: usize,
        reason: String,
    },
    Closed {
        source: usize,
    },
}

pub struct LocalEndpoint {
    rank: usize,
    size: usize,
    inbox: Receiver<Envelope>,
    peers: Vec<Option<Sender<Envelope>>>,
    pending: HashMap<(usize, u64), VecDeque<Vec<u8>>>,
    closed: BTreeSet<usize>,
    finished: bool,
}

impl LocalEndpoint {
    fn take_pending(&mut self, source: usize, tag: u64) -> Option<Vec<u8>> {
        let queue = self.pending.get_mut(&(source, tag))?;
        let payload = queue.pop_front();
        if queue.is_empty() {
            self.pending.remove(&(source, tag));
        }
        payload
    }

    fn broadcast_envelope(&self, make: impl Fn() -> Envelope) {
        for peer in self.peers.iter().flatten() {
            let _ = peer.send(make());
        }
    }
}

impl Communicator for LocalEndpoint {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&mut self, dest: usize, tag: u64, payload: Vec<u8>) -> Result<(), TransportError> {
        if dest >= self.size {
            return Err(TransportError::Unreachable {
                rank: self.rank,
                dest,
                reason: "rank out of range",
            });
        }
        if dest == self.rank {
            self.pending
                .entry((dest, tag))
                .or_default()
                .push_back(payload);
            return Ok(());
        }
        let Some(peer) = self.peers[dest].as_ref() else {
            return Err(TransportError::Unreachable {
                rank: self.rank,
                dest,
                reason: "no channel",
            });
        };
        peer.send(Envelope::Data {
            source: self.rank,
            tag,
            payload,
        })
        .map_err(|_| TransportError::Disconnected { peer: dest })
    }

    fn recv(&mut self, source: usize, tag: u64) -> Result<Vec<u8>, TransportError> {
        if let Some(payload) = self.take_pending(source, tag) {
            return Ok(payload);
        }
        if source >= self.size {
            return Err(TransportError::Unreachable {
                rank: self.rank,
                dest: source,
                reason: "rank out of range",
            });
        }
        loop {
            if self.closed.contains(&source) || source == self.rank {
                return Err(TransportError::Disconnected { peer: source });
            }
            let envelope = self
                .inbox
                .recv()
                .map_err(|_| TransportError::Disconnected { peer: source })?;
            match envelope {
                Envelope::Data {
                    source: from,
                    tag: got,
                    payload,
                } => {
                    if from == source && got == tag {
                        return Ok(payload);
                    }
                    self.pending.entry((from, got)).or_default().push_back(payload);
                }
                Envelope::Abort { source: from, reason } => {
                    self.finished = true;
                    return Err(TransportError::Aborted { rank: from, reason });
                }
                Envelope::Closed { source: from } => {
                    self.closed.insert(from);
                }
            }
        }
    }

    fn abort(&mut self, reason: &str) {
        if self.finished {
            return;
        }
        self.finished = true;
        tracing::warn!(rank = self.rank, reason, "aborting in-process job");
        let rank = self.rank;
        self.broadcast_envelope(|| Envelope::Abort {
            source: rank,
            reason: reason.to_string(),
        });
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for LocalEndpoint {
    fn drop(&mut self) {
        if !self.finished {
            self.abort("endpoint dropped before finish");
        }
        let rank = self.rank;
        self.broadcast_envelope(|| Envelope::Closed { source: rank });
    }
}

/// Runs `nprocs` ranks of one job on scoped threads.
pub struct LocalCluster;

impl LocalCluster {
    /// Builds a fully connected set of endpoints without running anything.
    pub fn endpoints(nprocs: usize) -> Result<Vec<LocalEndpoint>, TransportError> {
        if nprocs == 0 {
            return Err(TransportError::Schedule(
                tremor_kernel::ScheduleError::NoProcesses,
            ));
        }
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..nprocs).map(|_| channel()).unzip();
        Ok(receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| LocalEndpoint {
                rank,
                size: nprocs,
                inbox,
                peers: senders
                    .iter()
                    .enumerate()
                    .map(|(dest, tx)| (dest != rank).then(|| tx.clone()))
                    .collect(),
                pending: HashMap::new(),
                closed: BTreeSet::new(),
                finished: false,
            })
            .collect())
    }

    /// Runs `job` once per rank and returns the results in rank order.
    pub fn run<T, F>(nprocs: usize, job: F) -> Result<Vec<T>, TransportError>
    where
        T: Send,
        F: Fn(LocalEndpoint) -> T + Sync,
    {
        let endpoints = Self::endpoints(nprocs)?;
        let job = &job;
        thread::scope(|scope| {
            let handles: Vec<_> = endpoints
                .into_iter()
                .map(|endpoint| {
                    let rank = endpoint.rank;
                    thread::Builder::new()
                        .name(format!("tremor-rank-{rank}"))
                        .spawn_scoped(scope, move || job(endpoint))
                        .map_err(TransportError::from)
                })
                .collect();
            let mut results = Vec::with_capacity(nprocs);
            let mut failure = None;
            for (rank, handle) in handles.into_iter().enumerate() {
                match handle {
                    Ok(handle) => match handle.join() {
                        Ok(value) => results.push(value),
                        Err(_) => {
                            failure.get_or_insert(TransportError::Protocol(format!(
                                "rank {rank} panicked"
                            )));
                        }
                    },
                    Err(err) => {
                        failure.get_or_insert(err);
                    }
                }
            }
            match failure {
                Some(err) => Err(err),
                None => Ok(results),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_on_source_and_tag() {
        let results = LocalCluster::run(3, |mut comm| {
            match comm.rank() {
                0 => {
                    let b = comm.recv(2, 7).expect("recv from 2 should succeed");
                    let a = comm.recv(1, 7).expect("recv from 1 should succeed");
                    let c = comm.recv(1, 3).expect("recv tag 3 should succeed");
                    comm.finish();
                    vec![a, b, c]
                }
                r => {
                    if r == 1 {
                        comm.send(0, 3, vec![13]).expect("send should succeed");
                    }
                    comm.send(0, 7, vec![r as u8]).expect("send should succeed");
                    comm.finish();
                    Vec::new()
                }
            }
        })
        .expect("cluster should run");
        assert_eq!(results[0], vec![vec![1], vec![2], vec![13]]);
    }

    #[test]
    fn abort_reaches_blocked_receivers() {
        let results = LocalCluster::run(2, |mut comm| {
            if comm.rank() == 1 {
                comm.abort("bad input");
                return None;
            }
            Some(comm.recv(1, 0))
        })
        .expect("cluster should run");
        match &results[0] {
            Some(Err(TransportError::Aborted { rank, reason })) => {
                assert_eq!(*rank, 1);
                assert_eq!(reason, "bad input");
            }
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[test]
    fn finished_peer_reports_disconnect_instead_of_hanging() {
        let results = LocalCluster::run(2, |mut comm| {
            if comm.rank() == 1 {
                comm.finish();
                return None;
            }
            Some(comm.recv(1, 42))
        })
        .expect("cluster should run");
        assert!(matches!(
            results[0],
            Some(Err(TransportError::Disconnected { peer: 1 }))
        ));
    }

    #[test]
    fn zero_ranks_is_rejected() {
        assert!(LocalCluster::endpoints(0).is_err());
    }
}
