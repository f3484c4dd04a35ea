//! The receive tokenizer: a byte-at-a-time state machine over the
//! inbound network stream.
//!
//! Plain data goes to the pty (with CR/LF canonicalization while the
//! peer is not in BINARY), IAC commands are dispatched here, option
//! verbs go to the negotiator, and SB…SE payloads accumulate for the
//! suboption decoder. The state persists across calls so frames split
//! between input batches survive intact.

use tokio_util::bytes::{Buf, BytesMut};
use tracing::{debug, trace, warn};

use super::Engine;
use crate::daemon::{Daemon, Milestone, SlcFunction, TtySignal};
use crate::telnet::{command, option};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenState {
    /// Base state.
    Data,
    /// Saw IAC, next byte is a command.
    Iac,
    /// Saw a bare CR, strip a following NL or NUL.
    Cr,
    /// Accumulating a suboption payload.
    Sb,
    /// Saw IAC inside a suboption.
    Se,
    /// Option capture states for the four verbs.
    Will,
    Wont,
    Do,
    Dont,
}

impl Engine {
    /// Consume inbound bytes until the batch is drained, the pty is
    /// backed up, or the session closed.
    ///
    /// Bytes left in `input` when the pty side is full are picked up by
    /// the next call; no tokenizer state is lost in between.
    pub fn receive<D: Daemon>(&mut self, input: &mut BytesMut, d: &mut D) {
        while !input.is_empty() && !d.pty_buffer_is_full() && !self.closing {
            let c = d.decrypt_byte(input.get_u8());
            match self.state {
                TokenState::Cr => {
                    self.state = TokenState::Data;
                    // Strip an NL or NUL trailing a CR.
                    if c == 0 || c == b'\n' {
                        continue;
                    }
                    self.data_byte(c, input, d);
                }

                TokenState::Data => self.data_byte(c, input, d),

                TokenState::Iac => self.iac_command(c, d),

                TokenState::Sb => {
                    if c == command::IAC {
                        self.state = TokenState::Se;
                    } else {
                        self.sub.accum(c);
                    }
                }

                TokenState::Se => self.suboption_end(c, d),

                TokenState::Will => {
                    self.will_option(d, c);
                    self.state = TokenState::Data;
                }
                TokenState::Wont => {
                    self.wont_option(d, c);
                    self.state = TokenState::Data;
                }
                TokenState::Do => {
                    self.do_option(d, c);
                    self.state = TokenState::Data;
                }
                TokenState::Dont => {
                    self.dont_option(d, c);
                    self.state = TokenState::Data;
                }
            }
        }
    }

    fn data_byte<D: Daemon>(&mut self, c: u8, input: &mut BytesMut, d: &mut D) {
        if c == command::IAC {
            self.state = TokenState::Iac;
            return;
        }
        let mut c = c;
        // Map CR LF to a bare CR (or to NL in linemode): most clients
        // send the pair for the return key, and the pty wants one
        // end-of-line byte, not two.
        if c == b'\r' && self.opts.his_state_is_wont(option::BINARY) {
            let peeked = input.first().copied().map(|nc| d.decrypt_byte(nc));
            if self.linemode
                && peeked.is_some_and(|nc| nc == b'\n' || (nc == 0 && d.tty_iscrnl()))
            {
                input.advance(1);
                c = b'\n';
            } else {
                if peeked.is_some() {
                    d.decrypt_rewind();
                }
                self.state = TokenState::Cr;
            }
        }
        d.pty_output_byte(c);
    }

    fn iac_command<D: Daemon>(&mut self, c: u8, d: &mut D) {
        trace!(command = command::name(c), code = c, "recv iac");
        match c {
            command::IP => send_intr(d),

            command::BRK | command::ABORT => send_brk(d),

            command::AYT => recv_ayt(d),

            command::AO => {
                debug!("abort output");
                d.ptyflush();
                d.init_termbuf();
                if let Some(ch) = d.slc_char(SlcFunction::AbortOutput) {
                    d.pty_output_byte(ch);
                }
                // Wipe queued output and mark the data mark urgent so
                // the client flushes to it.
                d.netclear();
                d.net_output(&[command::IAC, command::DM]);
                d.set_neturg();
            }

            command::EC | command::EL => {
                d.ptyflush();
                d.init_termbuf();
                let func = if c == command::EC {
                    SlcFunction::EraseChar
                } else {
                    SlcFunction::EraseLine
                };
                if let Some(ch) = d.slc_char(func) {
                    d.pty_output_byte(ch);
                }
            }

            command::DM => {
                self.synching = d.still_oob();
                d.settimer(Milestone::DataMark);
            }

            command::SB => {
                self.sub.clear();
                self.state = TokenState::Sb;
                return;
            }

            command::WILL => {
                self.state = TokenState::Will;
                return;
            }
            command::WONT => {
                self.state = TokenState::Wont;
                return;
            }
            command::DO => {
                self.state = TokenState::Do;
                return;
            }
            command::DONT => {
                self.state = TokenState::Dont;
                return;
            }

            command::EOR => {
                if self.opts.his_state_is_will(option::EOR) {
                    send_eof(d);
                }
            }

            command::XEOF => send_eof(d),

            command::SUSP => send_susp(d),

            // IAC IAC: a literal 0xFF data byte.
            command::IAC => d.pty_output_byte(c),

            _ => {}
        }
        self.state = TokenState::Data;
    }

    /// An IAC arrived inside a suboption; `c` decides how it ends.
    fn suboption_end<D: Daemon>(&mut self, c: u8, d: &mut D) {
        if c == command::SE {
            self.sub.seal([command::IAC, command::SE]);
            self.suboption(d);
            self.state = TokenState::Data;
        } else if c == command::IAC {
            // Doubled IAC: one literal 0xFF in the payload.
            self.sub.accum(command::IAC);
            self.state = TokenState::Sb;
        } else {
            // Bad suboption framing. Decode what we have so local state
            // is not damaged, then treat the remaining stream as a
            // fresh command sequence.
            warn!(byte = c, "malformed suboption end");
            self.sub.seal([command::IAC, c]);
            self.suboption(d);
            self.state = TokenState::Iac;
            self.iac_command(c, d);
        }
    }
}

/// Interrupt the process on the pty side, by signal if the driver can,
/// by interrupt character otherwise.
fn send_intr<D: Daemon>(d: &mut D) {
    debug!("interrupt");
    d.ptyflush();
    if d.tty_signal(TtySignal::Interrupt) {
        return;
    }
    d.init_termbuf();
    let ch = d.slc_char(SlcFunction::Interrupt).unwrap_or(0x7F);
    d.pty_output_byte(ch);
}

/// Quit the process on the pty side.
fn send_brk<D: Daemon>(d: &mut D) {
    debug!("break");
    d.ptyflush();
    if d.tty_signal(TtySignal::Quit) {
        return;
    }
    d.init_termbuf();
    let ch = d.slc_char(SlcFunction::Abort).unwrap_or(0x1C);
    d.pty_output_byte(ch);
}

fn send_susp<D: Daemon>(d: &mut D) {
    debug!("suspend");
    d.ptyflush();
    if d.tty_signal(TtySignal::Suspend) {
        return;
    }
    let ch = d.slc_char(SlcFunction::Suspend).unwrap_or(0x1A);
    d.pty_output_byte(ch);
}

fn send_eof<D: Daemon>(d: &mut D) {
    d.init_termbuf();
    d.term_send_eof();
    let ch = d.slc_char(SlcFunction::Eof).unwrap_or(0x04);
    d.pty_output_byte(ch);
}

/// When an AYT character is mapped, report status via the tty; plain
/// clients get the classic reassurance instead.
fn recv_ayt<D: Daemon>(d: &mut D) {
    if d.slc_char(SlcFunction::AreYouThere).is_some() && d.tty_signal(TtySignal::Info) {
        return;
    }
    d.net_output(b"\r\n[Yes]\r\n");
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::EngineConfig;
    use crate::daemon::testing::{Call, MockDaemon};
    use crate::telnet::lm;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default())
    }

    fn feed(e: &mut Engine, d: &mut MockDaemon, bytes: &[u8]) {
        let mut input = BytesMut::from(bytes);
        e.receive(&mut input, d);
        assert!(
            input.is_empty() || d.pty_full || e.closed(),
            "tokenizer left input behind without backpressure"
        );
    }

    #[test]
    fn binary_negotiation_on_the_wire() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        feed(&mut e, &mut d, &[0xFF, 0xFD, 0x00]);
        assert_eq!(d.wire(), &[0xFF, 0xFB, 0x00]);
        assert!(e.local_enabled(option::BINARY));
        assert!(d.calls.contains(&Call::TtyBinaryOut(true)));
    }

    #[test]
    fn echo_kludge_on_the_wire() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        feed(&mut e, &mut d, &[0xFF, 0xFB, 0x01]);
        assert_eq!(d.wire(), &[0xFF, 0xFE, 0x01]);
        assert!(!e.not42);
    }

    #[test]
    fn doubled_iac_is_one_data_byte() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        feed(&mut e, &mut d, &[0x41, 0xFF, 0xFF, 0x42]);
        assert_eq!(d.pty, vec![0x41, 0xFF, 0x42]);
        assert!(d.wire().is_empty());
    }

    #[test]
    fn crlf_becomes_nl_in_linemode() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        e.linemode = true;
        feed(&mut e, &mut d, &[0x48, 0x0D, 0x0A, 0x49]);
        assert_eq!(d.pty, vec![0x48, 0x0A, 0x49]);
    }

    #[test]
    fn crlf_becomes_cr_in_character_mode() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        feed(&mut e, &mut d, b"a\r\nb");
        assert_eq!(d.pty, vec![b'a', b'\r', b'b']);
    }

    #[test]
    fn cr_nul_strips_the_nul() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        feed(&mut e, &mut d, &[b'x', 0x0D, 0x00, b'y']);
        assert_eq!(d.pty, vec![b'x', b'\r', b'y']);
    }

    #[test]
    fn cr_nul_becomes_nl_when_tty_maps_crnl() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        e.linemode = true;
        d.iscrnl = true;
        feed(&mut e, &mut d, &[0x0D, 0x00, b'y']);
        assert_eq!(d.pty, vec![b'\n', b'y']);
    }

    #[test]
    fn cr_handling_survives_batch_boundaries() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        feed(&mut e, &mut d, &[0x0D]);
        assert_eq!(d.pty, vec![b'\r']);
        assert_eq!(e.state, TokenState::Cr);
        feed(&mut e, &mut d, &[0x0A, 0x58]);
        assert_eq!(d.pty, vec![b'\r', b'X']);
    }

    #[test]
    fn cr_passes_through_untouched_in_binary() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        e.opts.set_his_state(option::BINARY, true);
        feed(&mut e, &mut d, b"a\r\nb");
        assert_eq!(d.pty, b"a\r\nb".to_vec());
    }

    #[test]
    fn naws_suboption_on_the_wire() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        e.opts.set_his_state(option::NAWS, true);
        feed(
            &mut e,
            &mut d,
            &[0xFF, 0xFA, 0x1F, 0x00, 0x50, 0x00, 0x18, 0xFF, 0xF0],
        );
        assert!(d.calls.contains(&Call::WindowSize(80, 24)));
    }

    #[test]
    fn subnegotiation_split_across_batches() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        e.opts.set_his_state(option::NAWS, true);
        feed(&mut e, &mut d, &[0xFF, 0xFA, 0x1F, 0x00]);
        feed(&mut e, &mut d, &[0x50, 0x00, 0x18]);
        feed(&mut e, &mut d, &[0xFF, 0xF0]);
        assert!(d.calls.contains(&Call::WindowSize(80, 24)));
    }

    #[test]
    fn doubled_iac_inside_suboption() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        e.opts.set_his_state(option::TTYPE, true);
        // TTYPE IS "a<0xFF>b"
        feed(
            &mut e,
            &mut d,
            &[
                0xFF, 0xFA, 0x18, 0x00, b'a', 0xFF, 0xFF, b'b', 0xFF, 0xF0,
            ],
        );
        assert_eq!(e.terminal_type(), Some("a\u{fffd}b"));
    }

    #[test]
    fn malformed_suboption_recovers_and_executes_command() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        e.opts.set_his_state(option::TTYPE, true);
        // SB TTYPE IS "xterm" IAC IP IAC SE: the IP must run and the
        // terminal type must still land.
        feed(
            &mut e,
            &mut d,
            &[
                0xFF, 0xFA, 0x18, 0x00, 0x78, 0x74, 0x65, 0x72, 0x6D, 0xFF, 0xF4, 0xFF, 0xF0,
            ],
        );
        assert_eq!(e.terminal_type(), Some("xterm"));
        assert!(d.calls.contains(&Call::TtySignal(TtySignal::Interrupt)));
        // Signal delivery is off in the mock, so the interrupt char hit
        // the pty instead.
        assert_eq!(d.pty, vec![0x7F]);
        assert_eq!(e.state, TokenState::Data);
    }

    #[test]
    fn oversized_suboption_truncates_but_decodes() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        e.opts.set_his_state(option::TTYPE, true);
        let mut bytes = vec![0xFF, 0xFA, 0x18, 0x00];
        bytes.extend(std::iter::repeat(b'a').take(600));
        bytes.extend_from_slice(&[0xFF, 0xF0]);
        feed(&mut e, &mut d, &bytes);
        let name = e.terminal_type().unwrap();
        assert_eq!(name.len(), 510);
        assert!(name.bytes().all(|b| b == b'a'));
    }

    #[test]
    fn interrupt_via_signal_when_driver_supports_it() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        d.signals_work = true;
        feed(&mut e, &mut d, &[0xFF, 0xF4]);
        assert_eq!(
            d.calls,
            vec![Call::Ptyflush, Call::TtySignal(TtySignal::Interrupt)]
        );
        assert!(d.pty.is_empty());
    }

    #[test]
    fn break_and_abort_send_quit() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        d.slc_chars.insert(SlcFunction::Abort, 0x1C);
        feed(&mut e, &mut d, &[0xFF, 0xF3, 0xFF, 0xEE]);
        assert_eq!(d.pty, vec![0x1C, 0x1C]);
    }

    #[test]
    fn ayt_without_slc_char_answers_yes() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        feed(&mut e, &mut d, &[0xFF, 0xF6]);
        assert_eq!(d.wire(), b"\r\n[Yes]\r\n");
    }

    #[test]
    fn ayt_with_slc_char_signals_instead() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        d.slc_chars.insert(SlcFunction::AreYouThere, 0x14);
        d.signals_work = true;
        feed(&mut e, &mut d, &[0xFF, 0xF6]);
        assert!(d.wire().is_empty());
        assert!(d.calls.contains(&Call::TtySignal(TtySignal::Info)));
    }

    #[test]
    fn abort_output_clears_queue_and_marks_data_mark_urgent() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        d.slc_chars.insert(SlcFunction::AbortOutput, 0x0F);
        // Queue a reply first so there is something for AO to discard.
        feed(&mut e, &mut d, &[0xFF, 0xFB, 0x01]);
        assert!(!d.wire().is_empty());
        feed(&mut e, &mut d, &[0xFF, 0xF5]);
        assert_eq!(d.wire(), &[0xFF, 0xF2]);
        assert!(d.calls.contains(&Call::Netclear));
        assert!(d.calls.contains(&Call::SetNeturg));
        assert_eq!(d.pty, vec![0x0F]);
    }

    #[test]
    fn data_mark_tracks_urgent_state() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        d.oob_pending = true;
        feed(&mut e, &mut d, &[0xFF, 0xF2]);
        assert!(e.synching());
        assert!(d.calls.contains(&Call::Settimer(Milestone::DataMark)));

        d.oob_pending = false;
        feed(&mut e, &mut d, &[0xFF, 0xF2]);
        assert!(!e.synching());
    }

    #[test]
    fn erase_char_and_line_forward_slc_chars() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        d.slc_chars.insert(SlcFunction::EraseChar, 0x08);
        d.slc_chars.insert(SlcFunction::EraseLine, 0x15);
        feed(&mut e, &mut d, &[0xFF, 0xF7, 0xFF, 0xF8]);
        assert_eq!(d.pty, vec![0x08, 0x15]);
    }

    #[test]
    fn erase_char_without_mapping_does_nothing() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        feed(&mut e, &mut d, &[0xFF, 0xF7]);
        assert!(d.pty.is_empty());
    }

    #[test]
    fn eor_sends_eof_only_when_negotiated() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        feed(&mut e, &mut d, &[0xFF, 0xEF]);
        assert!(d.pty.is_empty());

        e.opts.set_his_state(option::EOR, true);
        feed(&mut e, &mut d, &[0xFF, 0xEF]);
        assert!(d.calls.contains(&Call::TermSendEof));
        assert_eq!(d.pty, vec![0x04]);
    }

    #[test]
    fn xeof_always_sends_eof() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        d.slc_chars.insert(SlcFunction::Eof, 0x04);
        feed(&mut e, &mut d, &[0xFF, 0xEC]);
        assert_eq!(d.pty, vec![0x04]);
    }

    #[test]
    fn susp_falls_back_to_suspend_char() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        feed(&mut e, &mut d, &[0xFF, 0xED]);
        assert_eq!(d.pty, vec![0x1A]);
    }

    #[test]
    fn unknown_iac_command_is_ignored() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        // NOP and GA do nothing; data resumes.
        feed(&mut e, &mut d, &[0xFF, 0xF1, b'k', 0xFF, 0xF9, b'o']);
        assert_eq!(d.pty, b"ko".to_vec());
    }

    #[test]
    fn pty_backpressure_stops_the_loop() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        d.pty_full = true;
        let mut input = BytesMut::from(&b"hello"[..]);
        e.receive(&mut input, &mut d);
        assert_eq!(input.len(), 5);
        assert!(d.pty.is_empty());

        d.pty_full = false;
        e.receive(&mut input, &mut d);
        assert!(input.is_empty());
        assert_eq!(d.pty, b"hello".to_vec());
    }

    #[test]
    fn logout_stops_consumption_mid_batch() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        let mut input = BytesMut::from(&[0xFF, 0xFD, 0x12, b'x', b'y'][..]);
        e.receive(&mut input, &mut d);
        assert!(e.closed());
        assert_eq!(input.len(), 2);
        assert!(d.pty.is_empty());
    }

    #[test]
    fn status_request_round_trip() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        // DO BINARY, WILL LINEMODE, DO STATUS, then the STATUS SEND.
        feed(&mut e, &mut d, &[0xFF, 0xFD, 0x00]);
        feed(&mut e, &mut d, &[0xFF, 0xFB, 0x22]);
        feed(&mut e, &mut d, &[0xFF, 0xFD, 0x05]);
        let _ = d.net.take_pending();
        feed(&mut e, &mut d, &[0xFF, 0xFA, 0x05, 0x01, 0xFF, 0xF0]);

        let reply = d.wire().to_vec();
        assert_eq!(&reply[..4], &[0xFF, 0xFA, 0x05, 0x00]);
        assert_eq!(&reply[reply.len() - 2..], &[0xFF, 0xF0]);
        let body = &reply[4..reply.len() - 2];
        assert!(body.windows(2).any(|w| w == [command::WILL, 0x00]));
        assert!(body.windows(2).any(|w| w == [command::WILL, 0x05]));
        assert!(body.windows(2).any(|w| w == [command::DO, 0x22]));
        // The LINEMODE MODE and SLC sub-blocks follow the option list.
        assert!(body.windows(3).any(|w| w == [command::SB, 0x22, lm::MODE]));
        assert!(body.windows(3).any(|w| w == [command::SB, 0x22, lm::SLC]));
    }

    #[test]
    fn arbitrary_garbage_is_consumed_without_panic() {
        let mut e = engine();
        let mut d = MockDaemon::new();
        // Deterministic pseudo-random stream with extra IACs thrown in.
        let mut x: u32 = 0x2545_F491;
        let mut bytes = Vec::with_capacity(4096);
        for i in 0..4096 {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            bytes.push(if i % 7 == 0 { 0xFF } else { (x >> 24) as u8 });
        }
        let mut input = BytesMut::from(&bytes[..]);
        e.receive(&mut input, &mut d);
        assert!(input.is_empty() || e.closed());
    }
}
