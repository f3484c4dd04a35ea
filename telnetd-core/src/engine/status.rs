//! STATUS report generation (RFC 859).
//!
//! Serializes the want-state of every option into one
//! `IAC SB STATUS IS … IAC SE` reply, with the LFLOW and LINEMODE
//! sub-blocks appended when those options are in play. The reply buffer
//! grows as needed, so a large SLC table can never force a truncated
//! frame onto the wire.

use tokio_util::bytes::{BufMut, BytesMut};
use tracing::{debug, trace};

use super::Engine;
use crate::daemon::Daemon;
use crate::telnet::{command, lflow, lm, option, telqual};

/// Append a payload byte, doubling it when it collides with `IAC` or
/// `SE`.
fn add_data(buf: &mut BytesMut, byte: u8) {
    buf.put_u8(byte);
    if byte == command::SE || byte == command::IAC {
        buf.put_u8(byte);
    }
}

impl Engine {
    /// Build and send the STATUS IS reply.
    ///
    /// We report the want-state rather than the acknowledged state: after
    /// refusing a peer request the acknowledged state is still the
    /// peer's view, and it is the want-state that describes what we are
    /// actually doing.
    pub(crate) fn send_status<D: Daemon>(&mut self, d: &mut D) {
        d.netflush();

        let mut buf = BytesMut::with_capacity(64);
        buf.put_slice(&[
            command::IAC,
            command::SB,
            option::STATUS,
            telqual::IS,
        ]);

        for opt in 0..=option::NEW_ENVIRON {
            if self.opts.my_want_is_will(opt) {
                buf.put_u8(command::WILL);
                add_data(&mut buf, opt);
            }
            if self.opts.his_want_is_will(opt) {
                buf.put_u8(command::DO);
                add_data(&mut buf, opt);
            }
        }

        if self.opts.his_want_is_will(option::LFLOW) {
            buf.put_slice(&[
                command::SB,
                option::LFLOW,
                if self.flowmode { lflow::ON } else { lflow::OFF },
                command::SE,
            ]);
            if let Some(restartany) = self.restartany {
                buf.put_slice(&[
                    command::SB,
                    option::LFLOW,
                    if restartany {
                        lflow::RESTART_ANY
                    } else {
                        lflow::RESTART_XON
                    },
                    command::SE,
                ]);
            }
        }

        if self.opts.his_want_is_will(option::LINEMODE) {
            buf.put_slice(&[command::SB, option::LINEMODE, lm::MODE]);
            add_data(&mut buf, self.editmode);
            buf.put_u8(command::SE);

            buf.put_slice(&[command::SB, option::LINEMODE, lm::SLC]);
            d.start_slc(false);
            d.send_slc();
            for byte in d.end_slc() {
                add_data(&mut buf, byte);
            }
            buf.put_u8(command::SE);
        }

        buf.put_slice(&[command::IAC, command::SE]);

        debug!(len = buf.len(), "send status");
        trace!(reply = ?&buf[..], "status reply");
        d.net_output(&buf);
        d.netflush();
    }
}
