//! Buffered network output queue.
//!
//! [`NetSide`] gives a [`Daemon`](crate::daemon::Daemon) implementation
//! the outbound-queue semantics the engine's AO/DM and LOGOUT handling
//! assume: append, clear-unsent, urgent mark, and an explicit flush
//! request the connection pump honors.

use tokio_util::bytes::{Buf, Bytes, BytesMut};

#[derive(Debug, Default)]
pub struct NetSide {
    out: BytesMut,
    /// Offset into `out` of the byte to send with TCP urgent, if any.
    urgent: Option<usize>,
    flush: bool,
}

impl NetSide {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the peer.
    pub fn append(&mut self, data: &[u8]) {
        self.out.extend_from_slice(data);
    }

    /// Drop everything not yet handed to the socket (Abort Output).
    pub fn clear(&mut self) {
        self.out.clear();
        self.urgent = None;
    }

    /// Remember that the last queued byte should go out urgent.
    pub fn mark_urgent(&mut self) {
        self.urgent = Some(self.out.len().saturating_sub(1));
    }

    /// Ask the pump to push queued bytes out on its next turn.
    pub fn request_flush(&mut self) {
        self.flush = true;
    }

    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.out
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    #[must_use]
    pub fn flush_requested(&self) -> bool {
        self.flush
    }

    /// Hand the queued bytes to the pump, resetting the urgent mark and
    /// flush request.
    pub fn take_pending(&mut self) -> Bytes {
        self.urgent = None;
        self.flush = false;
        self.out.split().freeze()
    }

    /// Drop `n` already-written bytes from the front without touching
    /// the flush/urgent state.
    pub fn advance(&mut self, n: usize) {
        self.out.advance(n);
        if let Some(mark) = self.urgent {
            self.urgent = mark.checked_sub(n);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn append_take_round_trip() {
        let mut net = NetSide::new();
        net.append(&[0xFF, 0xFD, 0x00]);
        assert_eq!(net.pending(), &[0xFF, 0xFD, 0x00]);
        assert_eq!(&net.take_pending()[..], &[0xFF, 0xFD, 0x00]);
        assert!(net.is_empty());
    }

    #[test]
    fn clear_discards_unsent() {
        let mut net = NetSide::new();
        net.append(b"half a reply");
        net.mark_urgent();
        net.clear();
        assert!(net.is_empty());
        assert_eq!(net.urgent, None);
    }

    #[test]
    fn urgent_marks_queue_tail() {
        let mut net = NetSide::new();
        net.append(&[0xFF, 0xF2]);
        net.mark_urgent();
        assert_eq!(net.urgent, Some(1));
        net.advance(1);
        assert_eq!(net.urgent, Some(0));
    }

    #[test]
    fn flush_request_cleared_by_take() {
        let mut net = NetSide::new();
        net.request_flush();
        assert!(net.flush_requested());
        let _ = net.take_pending();
        assert!(!net.flush_requested());
    }
}
