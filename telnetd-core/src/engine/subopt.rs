//! Suboption accumulation and decoding.
//!
//! The tokenizer collects `IAC SB … IAC SE` payloads into [`SubBuffer`];
//! [`Engine::suboption`] interprets the completed frame. Most options
//! are ignored unless the peer actually negotiated them on — STATUS and
//! XDISPLOC are historical exceptions.

use tracing::{debug, trace, warn};

use super::{Engine, EnvTags};
use crate::daemon::{Daemon, Milestone};
use crate::telnet::{command, encrypt, env, lm, option, telqual};

/// Suboption payload capacity. Bytes past this are dropped; the frame
/// is still decoded from what fits.
pub(crate) const SUBBUF_SIZE: usize = 512;

/// The SB…SE accumulation buffer.
///
/// `end` marks the payload boundary; the two delimiter bytes that
/// finished the frame are kept just past it so diagnostics can show the
/// full wire sequence.
#[derive(Debug, Default)]
pub(crate) struct SubBuffer {
    buf: Vec<u8>,
    end: usize,
}

impl SubBuffer {
    pub(crate) fn clear(&mut self) {
        self.buf.clear();
        self.end = 0;
    }

    pub(crate) fn accum(&mut self, byte: u8) {
        if self.buf.len() < SUBBUF_SIZE {
            self.buf.push(byte);
        } else {
            trace!(byte, "suboption buffer full, dropping");
        }
    }

    /// Mark the frame complete. `tail` is the two-byte sequence that
    /// ended it (`IAC SE`, or `IAC x` for a malformed frame).
    pub(crate) fn seal(&mut self, tail: [u8; 2]) {
        self.end = self.buf.len();
        for byte in tail {
            if self.buf.len() < SUBBUF_SIZE + tail.len() {
                self.buf.push(byte);
            }
        }
    }

    pub(crate) fn payload(&self) -> &[u8] {
        &self.buf[..self.end]
    }

    /// Payload plus the trailing delimiter, for diagnostics.
    pub(crate) fn raw(&self) -> &[u8] {
        &self.buf
    }
}

/// Cursor over a completed frame, the moral equivalent of the
/// `SB_GET`/`SB_EOF` pointer walk.
#[derive(Debug, Clone)]
struct SubReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SubReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn get(&mut self) -> Option<u8> {
        let byte = self.data.get(self.pos).copied();
        if byte.is_some() {
            self.pos += 1;
        }
        byte
    }

    fn eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

/// `atoi` for the ASCII-decimal speeds in a TSPEED reply: optional
/// leading spaces, then digits, stopping at the first non-digit.
fn ascii_speed(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .skip_while(|byte| **byte == b' ')
        .take_while(|byte| byte.is_ascii_digit())
        .fold(0u32, |acc, byte| {
            acc.saturating_mul(10).saturating_add(u32::from(byte - b'0'))
        })
}

impl Engine {
    /// Decode the completed frame sitting in the suboption buffer.
    pub(crate) fn suboption<D: Daemon>(&mut self, d: &mut D) {
        trace!(frame = ?self.sub.raw(), "recv suboption frame");

        let frame = self.sub.payload().to_vec();
        let mut r = SubReader::new(&frame);
        let Some(subchar) = r.get() else {
            return;
        };
        debug!(
            option = option::name(subchar),
            len = frame.len(),
            "recv suboption"
        );

        match subchar {
            option::TSPEED => self.subopt_tspeed(d, &mut r),
            option::TTYPE => self.subopt_ttype(d, &mut r),
            option::NAWS => self.subopt_naws(d, &mut r),
            option::LINEMODE => self.subopt_linemode(d, &mut r),
            option::STATUS => self.subopt_status(d, &mut r),
            option::XDISPLOC => self.subopt_xdisploc(d, &mut r),
            option::NEW_ENVIRON | option::OLD_ENVIRON => self.subopt_environ(d, subchar, &mut r),
            option::AUTHENTICATION if self.config.authentication => Self::subopt_auth(d, &mut r),
            option::ENCRYPT if self.config.encryption => Self::subopt_encrypt(d, &mut r),
            _ => {}
        }
    }

    fn subopt_tspeed<D: Daemon>(&mut self, d: &mut D, r: &mut SubReader) {
        if self.opts.his_state_is_wont(option::TSPEED) {
            return;
        }
        d.settimer(Milestone::TspeedDone);

        if r.get() != Some(telqual::IS) {
            return;
        }
        let transmit = ascii_speed(r.rest());
        loop {
            match r.get() {
                Some(b',') => break,
                Some(_) => {}
                None => return,
            }
        }
        let receive = ascii_speed(r.rest());
        d.terminal_speed(transmit, receive);
    }

    fn subopt_ttype<D: Daemon>(&mut self, d: &mut D, r: &mut SubReader) {
        if self.opts.his_state_is_wont(option::TTYPE) {
            return;
        }
        d.settimer(Milestone::TtypeDone);

        if r.get() != Some(telqual::IS) {
            return;
        }
        let mut name = r.rest().to_vec();
        name.make_ascii_lowercase();
        let name = String::from_utf8_lossy(&name).into_owned();
        debug!(terminal = %name, "terminal type");
        self.terminal_type = Some(name);
    }

    fn subopt_naws<D: Daemon>(&mut self, d: &mut D, r: &mut SubReader) {
        if self.opts.his_state_is_wont(option::NAWS) {
            return;
        }
        let (Some(c0), Some(c1), Some(r0), Some(r1)) = (r.get(), r.get(), r.get(), r.get()) else {
            return;
        };
        d.window_size(u16::from_be_bytes([c0, c1]), u16::from_be_bytes([r0, r1]));
    }

    fn subopt_linemode<D: Daemon>(&mut self, d: &mut D, r: &mut SubReader) {
        if self.opts.his_state_is_wont(option::LINEMODE) {
            return;
        }
        let Some(request) = r.get() else {
            return;
        };
        if r.eof() {
            return;
        }

        if request == lm::SLC {
            d.start_slc(true);
            d.do_opt_slc(r.rest());
            let _ = d.end_slc();
            return;
        }
        if request == lm::MODE {
            let Some(mode) = r.get() else {
                return;
            };
            self.useeditmode = mode;
            d.edit_mode(mode);
            return;
        }

        // request was WILL/WONT/DO/DONT; only FORWARDMASK can follow.
        // The server alone may request a forwardmask and a client can
        // only answer positively, so there is nothing to act on.
        let _ = r.get();
    }

    fn subopt_status<D: Daemon>(&mut self, d: &mut D, r: &mut SubReader) {
        let Some(mode) = r.get() else {
            return;
        };
        match mode {
            telqual::SEND => {
                if self.opts.my_state_is_will(option::STATUS) {
                    self.send_status(d);
                }
            }
            // A client-sent IS is legal but nothing we asked for.
            _ => {}
        }
    }

    fn subopt_xdisploc<D: Daemon>(&mut self, d: &mut D, r: &mut SubReader) {
        if r.get() != Some(telqual::IS) {
            return;
        }
        d.settimer(Milestone::XdisplocDone);
        d.set_env(b"DISPLAY", Some(r.rest()));
    }

    fn subopt_environ<D: Daemon>(&mut self, d: &mut D, subchar: u8, r: &mut SubReader) {
        let Some(qual) = r.get() else {
            return;
        };
        if qual == telqual::IS {
            d.settimer(if subchar == option::OLD_ENVIRON {
                Milestone::OldEnvironDone
            } else {
                Milestone::EnvironDone
            });
        } else if qual != telqual::INFO {
            return;
        }

        if subchar == option::NEW_ENVIRON {
            // Seek the first variable tag.
            while let Some(c) = r.get() {
                if c == env::VAR || c == env::USERVAR {
                    break;
                }
            }
        } else {
            if self.env_tags.is_none() {
                self.env_tags = classify_old_environ(&mut r.clone());
                match self.env_tags {
                    Some(tags) if tags.var == env::OLD_VALUE => {
                        debug!("peer's OLD_ENVIRON VALUE and VAR are reversed");
                    }
                    None => warn!("could not classify OLD_ENVIRON tag order"),
                    Some(_) => {}
                }
            }
            let var_tag = self.env_tags.map(|tags| tags.var);
            while let Some(c) = r.get() {
                if Some(c) == var_tag || c == env::USERVAR {
                    break;
                }
            }
        }

        if r.eof() {
            return;
        }

        let mut name: Vec<u8> = Vec::new();
        let mut value: Option<Vec<u8>> = None;
        while let Some(mut c) = r.get() {
            if subchar == option::OLD_ENVIRON {
                if let Some(tags) = self.env_tags {
                    if c == tags.var {
                        c = env::VAR;
                    } else if c == tags.value {
                        c = env::VALUE;
                    }
                }
            }
            match c {
                env::VALUE => value = Some(Vec::new()),

                env::VAR | env::USERVAR => {
                    d.set_env(&name, value.take().as_deref());
                    name.clear();
                }

                env::ESC => match r.get() {
                    Some(quoted) => push_env_byte(&mut name, &mut value, quoted),
                    None => break,
                },

                _ => push_env_byte(&mut name, &mut value, c),
            }
        }
        d.set_env(&name, value.as_deref());
    }

    fn subopt_auth<D: Daemon>(d: &mut D, r: &mut SubReader) {
        let Some(qual) = r.get() else {
            return;
        };
        match qual {
            telqual::IS => d.auth_is(r.rest()),
            telqual::NAME => d.auth_name(r.rest()),
            // SEND and REPLY originate with the server; a client may not
            // send them back at us.
            _ => {}
        }
    }

    fn subopt_encrypt<D: Daemon>(d: &mut D, r: &mut SubReader) {
        let Some(cmd) = r.get() else {
            return;
        };
        match cmd {
            encrypt::SUPPORT => d.encrypt_support(r.rest()),
            encrypt::IS => d.encrypt_is(r.rest()),
            encrypt::REPLY => d.encrypt_reply(r.rest()),
            encrypt::START => d.encrypt_start(r.rest()),
            encrypt::END => d.encrypt_end(),
            encrypt::REQSTART => d.encrypt_request_start(r.rest()),
            // Always answered, so the peers can never get stuck
            // encrypting.
            encrypt::REQEND => d.encrypt_request_end(),
            encrypt::ENC_KEYID => d.encrypt_enc_keyid(r.rest()),
            encrypt::DEC_KEYID => d.encrypt_dec_keyid(r.rest()),
            _ => {}
        }
    }
}

fn push_env_byte(name: &mut Vec<u8>, value: &mut Option<Vec<u8>>, byte: u8) {
    match value {
        Some(v) => v.push(byte),
        None => name.push(byte),
    }
}

/// Decide whether the peer's OLD_ENVIRON tags follow the conventional
/// assignment (VAR=1, VALUE=0) or the reversed one.
///
/// If the first recognized tag is a VAR or VALUE it settles the matter
/// outright (a well-formed item list can't open with a VALUE, nor
/// repeat one back to back, nor leave one empty before a VAR). When the
/// list opens with USERVARs instead, count distinct items: as many
/// VALUEs as VARs-plus-USERVARs means conventional, the mirror image
/// means reversed, anything else stays undecided until the next frame.
fn classify_old_environ(scan: &mut SubReader) -> Option<EnvTags> {
    const CONVENTIONAL: Option<EnvTags> = Some(EnvTags {
        var: env::OLD_VAR,
        value: env::OLD_VALUE,
    });
    const REVERSED: Option<EnvTags> = Some(EnvTags {
        var: env::OLD_VALUE,
        value: env::OLD_VAR,
    });

    let mut last: Option<u8> = None;
    let mut empty = false;
    let (mut got_var, mut got_value, mut got_uservar) = (0u32, 0u32, 0u32);

    while let Some(c) = scan.get() {
        match c {
            env::OLD_VAR => {
                if last.is_none()
                    || last == Some(env::OLD_VAR)
                    || (empty && last == Some(env::OLD_VALUE))
                {
                    return CONVENTIONAL;
                }
                got_var += 1;
                last = Some(env::OLD_VAR);
            }
            env::OLD_VALUE => {
                if last.is_none()
                    || last == Some(env::OLD_VALUE)
                    || (empty && last == Some(env::OLD_VAR))
                {
                    return REVERSED;
                }
                got_value += 1;
                last = Some(env::OLD_VALUE);
            }
            env::USERVAR => {
                // Runs of USERVAR count once.
                if last != Some(env::USERVAR) {
                    got_uservar += 1;
                }
                if empty {
                    if last == Some(env::OLD_VALUE) {
                        return CONVENTIONAL;
                    }
                    if last == Some(env::OLD_VAR) {
                        return REVERSED;
                    }
                }
                last = Some(env::USERVAR);
            }
            env::ESC => {
                let _ = scan.get();
                empty = false;
                continue;
            }
            _ => {
                empty = false;
                continue;
            }
        }
        empty = true;
    }

    if empty {
        if last == Some(env::OLD_VALUE) {
            return CONVENTIONAL;
        }
        if last == Some(env::OLD_VAR) {
            return REVERSED;
        }
    }
    if got_uservar + got_var == got_value {
        CONVENTIONAL
    } else if got_uservar + got_value == got_var {
        REVERSED
    } else {
        None
    }
}
