use crate::error::TransportError;

/// Point-to-point message passing between the processes of one job.
///
/// Messages are matched on `(source, tag)` and arrive in send order for a
/// given pair of endpoints. Receives block until the message arrives, the
/// peer disconnects, or some process aborts.
pub trait Communicator: Send {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn send(&mut self, dest: usize, tag: u64, payload: Vec<u8>) -> Result<(), TransportError>;

    fn recv(&mut self, source: usize, tag: u64) -> Result<Vec<u8>, TransportError>;

    /// Tear down every process of the job.
    fn abort(&mut self, reason: &str);

    /// Mark a clean shutdown; dropping an unfinished endpoint aborts.
    fn finish(&mut self) {}
}

impl<T: Communicator + ?Sized> Communicator for Box<T> {
    fn rank(&self) -> usize {
        (**self).rank()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn send(&mut self, dest: usize, tag: u64, payload: Vec<u8>) -> Result<(), TransportError> {
        (**self).send(dest, tag, payload)
    }

    fn recv(&mut self, source: usize, tag: u64) -> Result<Vec<u8>, TransportError> {
        (**self).recv(source, tag)
    }

    fn abort(&mut self, reason: &str) {
        (**self).abort(reason)
    }

    fn finish(&mut self) {
        (**self).finish()
    }
}
