//! WILL/WONT/DO/DONT negotiation.
//!
//! This is Dave Borman's option processing state machine. Per option and
//! direction we track the last acknowledged state, the state we want,
//! and how many requests of ours are still unanswered.
//!
//! When initiating a request to change state to `new_state`:
//!
//! ```text
//! if (resp == 0 && new_state == state) || want_state == new_state {
//!     do nothing
//! } else {
//!     want_state = new_state; send new_state; resp += 1;
//! }
//! ```
//!
//! When receiving `new_state`:
//!
//! ```text
//! if resp > 0 {
//!     resp -= 1;
//!     if resp > 0 && new_state == state { resp -= 1; }
//! }
//! if resp == 0 && new_state != want_state {
//!     if ok_to_switch_to(new_state) { want_state = new_state }
//!     else { resp += 1 }
//!     send want_state;
//! }
//! state = new_state;
//! ```
//!
//! The double decrement is what absorbs a request/response pair that
//! crossed a spontaneous request from the peer; the want-state check is
//! what keeps a hostile peer from driving an acknowledgement loop.
//!
//! One catch: after we refuse a positive request, `state` is positive
//! while `want_state` stays negative until the peer's negative
//! acknowledgement lands. `state` therefore tracks what the peer thinks
//! is in effect, `want_state` what we intend — data-path decisions use
//! whichever of the two their semantics call for.

use tracing::debug;

use super::{Engine, LinemodeKind};
use crate::daemon::{Daemon, Milestone};
use crate::telnet::{command, option};

/// Work that must run after the option table settles, mirroring the
/// session-layer hooks a confirmation can trigger.
#[derive(Debug, Clone, Copy)]
enum PostConfirm {
    LinemodeOn,
    AuthRequest,
    EncryptSendSupport,
    FlowChange,
}

impl Engine {
    /// Ask the peer to enable `opt` (`IAC DO opt`).
    ///
    /// With `init` the request is suppressed when the option is already
    /// on (or asked to be) and the outstanding-response counter is
    /// bumped; without it this is a raw acknowledgement send.
    pub fn send_do<D: Daemon>(&mut self, d: &mut D, opt: u8, init: bool) {
        if init {
            if (self.opts.do_dont_resp(opt) == 0 && self.opts.his_state_is_will(opt))
                || self.opts.his_want_is_will(opt)
            {
                return;
            }
            // TM is special: we send DO but record DONT, so the probe
            // can be repeated.
            self.opts.set_his_want(opt, opt != option::TM);
            self.opts.incr_do_dont_resp(opt);
        }
        d.net_output(&[command::IAC, command::DO, opt]);
        debug!(option = option::name(opt), code = opt, "send do");
    }

    /// Ask the peer to disable `opt` (`IAC DONT opt`).
    pub fn send_dont<D: Daemon>(&mut self, d: &mut D, opt: u8, init: bool) {
        if init {
            if (self.opts.do_dont_resp(opt) == 0 && self.opts.his_state_is_wont(opt))
                || self.opts.his_want_is_wont(opt)
            {
                return;
            }
            self.opts.set_his_want(opt, false);
            self.opts.incr_do_dont_resp(opt);
        }
        d.net_output(&[command::IAC, command::DONT, opt]);
        debug!(option = option::name(opt), code = opt, "send dont");
    }

    /// Offer to enable `opt` on our side (`IAC WILL opt`).
    pub fn send_will<D: Daemon>(&mut self, d: &mut D, opt: u8, init: bool) {
        if init {
            if (self.opts.will_wont_resp(opt) == 0 && self.opts.my_state_is_will(opt))
                || self.opts.my_want_is_will(opt)
            {
                return;
            }
            self.opts.set_my_want(opt, true);
            self.opts.incr_will_wont_resp(opt);
        }
        d.net_output(&[command::IAC, command::WILL, opt]);
        debug!(option = option::name(opt), code = opt, "send will");
    }

    /// Withdraw `opt` on our side (`IAC WONT opt`).
    pub fn send_wont<D: Daemon>(&mut self, d: &mut D, opt: u8, init: bool) {
        if init {
            if (self.opts.will_wont_resp(opt) == 0 && self.opts.my_state_is_wont(opt))
                || self.opts.my_want_is_wont(opt)
            {
                return;
            }
            self.opts.set_my_want(opt, false);
            self.opts.incr_will_wont_resp(opt);
        }
        d.net_output(&[command::IAC, command::WONT, opt]);
        debug!(option = option::name(opt), code = opt, "send wont");
    }

    /// Peer sent `IAC WILL opt`.
    pub(crate) fn will_option<D: Daemon>(&mut self, d: &mut D, opt: u8) {
        debug!(option = option::name(opt), code = opt, "recv will");

        let mut func = None;

        if self.opts.do_dont_resp(opt) > 0 {
            self.opts.decr_do_dont_resp(opt);
            if self.opts.do_dont_resp(opt) > 0 && self.opts.his_state_is_will(opt) {
                self.opts.decr_do_dont_resp(opt);
            }
        }
        if self.opts.do_dont_resp(opt) == 0 {
            if self.opts.his_want_is_wont(opt) {
                let mut changeok = false;
                match opt {
                    option::BINARY => {
                        d.init_termbuf();
                        d.tty_binaryin(true);
                        d.set_termbuf();
                        changeok = true;
                    }

                    // The client echoing at us marks a 4.2BSD-era stack.
                    option::ECHO => self.not42 = false,

                    option::TM => {
                        // We do not really support timing marks; WILL TM
                        // only ever means the client is answering our
                        // kludge-linemode probe. Eat it without touching
                        // the recorded state so the probe stays armed.
                        if self.lmodetype < LinemodeKind::KludgeLinemode {
                            self.lmodetype = LinemodeKind::KludgeLinemode;
                            self.linemode = d.linemode_change(true);
                            self.send_wont(d, option::SGA, true);
                        } else if self.lmodetype == LinemodeKind::NoAutoKludge {
                            self.lmodetype = LinemodeKind::KludgeOk;
                        }
                        return;
                    }

                    option::LFLOW => {
                        // We will manage flow control, so the peer may
                        // redefine the XON/XOFF characters.
                        d.slc_flow_changeable(true);
                        changeok = true;
                    }

                    option::TTYPE
                    | option::SGA
                    | option::NAWS
                    | option::TSPEED
                    | option::XDISPLOC
                    | option::NEW_ENVIRON
                    | option::OLD_ENVIRON => changeok = true,

                    option::LINEMODE => {
                        self.lmodetype = LinemodeKind::RealLinemode;
                        func = Some(PostConfirm::LinemodeOn);
                        changeok = true;
                    }

                    option::AUTHENTICATION if self.config.authentication => {
                        func = Some(PostConfirm::AuthRequest);
                        changeok = true;
                    }

                    option::ENCRYPT if self.config.encryption => {
                        func = Some(PostConfirm::EncryptSendSupport);
                        changeok = true;
                    }

                    _ => {}
                }
                if changeok {
                    self.opts.set_his_want(opt, true);
                    self.send_do(d, opt, false);
                } else {
                    self.opts.incr_do_dont_resp(opt);
                    self.send_dont(d, opt, false);
                }
            } else {
                // Confirmation of a change we requested.
                match opt {
                    option::ECHO => {
                        self.not42 = false;
                        // A 4.2 client is now echoing at its own tty.
                        // Shut that down immediately; the WONT TM that
                        // follows our probe will drop linemode and the
                        // pty state change re-raises WILL ECHO properly.
                        self.send_dont(d, option::ECHO, true);
                    }
                    option::LINEMODE => {
                        self.lmodetype = LinemodeKind::RealLinemode;
                        func = Some(PostConfirm::LinemodeOn);
                    }
                    option::AUTHENTICATION if self.config.authentication => {
                        func = Some(PostConfirm::AuthRequest);
                    }
                    option::ENCRYPT if self.config.encryption => {
                        func = Some(PostConfirm::EncryptSendSupport);
                    }
                    option::LFLOW => func = Some(PostConfirm::FlowChange),
                    _ => {}
                }
            }
        }
        self.opts.set_his_state(opt, true);
        self.run_post_confirm(d, func);
    }

    /// Peer sent `IAC WONT opt`.
    pub(crate) fn wont_option<D: Daemon>(&mut self, d: &mut D, opt: u8) {
        debug!(option = option::name(opt), code = opt, "recv wont");

        if self.opts.do_dont_resp(opt) > 0 {
            self.opts.decr_do_dont_resp(opt);
            if self.opts.do_dont_resp(opt) > 0 && self.opts.his_state_is_wont(opt) {
                self.opts.decr_do_dont_resp(opt);
            }
        }
        if self.opts.do_dont_resp(opt) == 0 {
            if self.opts.his_want_is_will(opt) {
                // Switching to off is always acceptable.
                match opt {
                    option::ECHO => self.not42 = true,

                    option::BINARY => {
                        d.init_termbuf();
                        d.tty_binaryin(false);
                        d.set_termbuf();
                    }

                    option::LINEMODE => {
                        if self.lmodetype == LinemodeKind::RealLinemode {
                            self.linemode = d.linemode_change(false);
                        }
                    }

                    option::TM => {
                        // A WONT TM answering our DO TM gets no DONT;
                        // short circuit the state machine entirely.
                        self.opts.set_his_want(option::TM, false);
                        return;
                    }

                    option::LFLOW => {
                        // No flow control from us, so the peer must not
                        // touch the XON/XOFF characters.
                        d.slc_flow_changeable(false);
                    }

                    option::AUTHENTICATION if self.config.authentication => d.auth_reject(),

                    // Options we spin waiting on sub-negotiation for: a
                    // refusal has to count as the sub-negotiation
                    // completing or startup would hang.
                    option::TTYPE => d.settimer(Milestone::TtypeDone),
                    option::TSPEED => d.settimer(Milestone::TspeedDone),
                    option::XDISPLOC => d.settimer(Milestone::XdisplocDone),
                    option::OLD_ENVIRON => d.settimer(Milestone::OldEnvironDone),
                    option::NEW_ENVIRON => d.settimer(Milestone::EnvironDone),

                    _ => {}
                }
                self.opts.set_his_want(opt, false);
                if self.opts.his_state_is_will(opt) {
                    self.send_dont(d, opt, false);
                }
            } else {
                match opt {
                    option::TM => {
                        // Probe refused: no kludge linemode either. Drop
                        // to character mode with server echo.
                        if self.lmodetype < LinemodeKind::NoAutoKludge {
                            self.lmodetype = LinemodeKind::NoLinemode;
                            self.linemode = d.linemode_change(false);
                            self.send_will(d, option::SGA, true);
                            self.send_will(d, option::ECHO, true);
                        }
                    }

                    option::AUTHENTICATION if self.config.authentication => d.auth_reject(),

                    _ => {}
                }
            }
        }
        self.opts.set_his_state(opt, false);
    }

    /// Peer sent `IAC DO opt`.
    pub(crate) fn do_option<D: Daemon>(&mut self, d: &mut D, opt: u8) {
        debug!(option = option::name(opt), code = opt, "recv do");

        if self.opts.will_wont_resp(opt) > 0 {
            self.opts.decr_will_wont_resp(opt);
            if self.opts.will_wont_resp(opt) > 0 && self.opts.my_state_is_will(opt) {
                self.opts.decr_will_wont_resp(opt);
            }
        }
        if self.opts.will_wont_resp(opt) == 0 && self.opts.my_want_is_wont(opt) {
            let mut changeok = false;
            match opt {
                option::ECHO => {
                    if self.lmodetype == LinemodeKind::NoLinemode {
                        d.init_termbuf();
                        d.tty_setecho(true);
                        d.set_termbuf();
                    }
                    changeok = true;
                }

                option::BINARY => {
                    d.init_termbuf();
                    d.tty_binaryout(true);
                    d.set_termbuf();
                    changeok = true;
                }

                option::SGA => {
                    // In kludge linemode a DO SGA is the peer asking to
                    // leave linemode. If the tty would not leave, refuse
                    // the SGA so the peer knows.
                    if self.lmodetype == LinemodeKind::KludgeLinemode {
                        self.linemode = d.linemode_change(false);
                        if !self.linemode {
                            changeok = true;
                        }
                    } else {
                        changeok = true;
                    }
                }

                option::STATUS => changeok = true,

                option::TM => {
                    // Answer WILL but record WONT, exactly as the DO TM
                    // probe pretends on the other direction.
                    self.send_will(d, opt, false);
                    self.opts.set_my_want(opt, false);
                    self.opts.set_my_state(opt, false);
                    return;
                }

                option::LOGOUT => {
                    // Agree, force the reply out, and go away.
                    self.opts.set_my_want(option::LOGOUT, true);
                    self.send_will(d, option::LOGOUT, false);
                    self.opts.set_my_state(option::LOGOUT, true);
                    d.netflush();
                    d.cleanup();
                    self.closing = true;
                    return;
                }

                option::ENCRYPT if self.config.encryption => changeok = true,

                _ => {}
            }
            if changeok {
                self.opts.set_my_want(opt, true);
                self.send_will(d, opt, false);
            } else {
                self.opts.incr_will_wont_resp(opt);
                self.send_wont(d, opt, false);
            }
        }
        self.opts.set_my_state(opt, true);
    }

    /// Peer sent `IAC DONT opt`.
    pub(crate) fn dont_option<D: Daemon>(&mut self, d: &mut D, opt: u8) {
        debug!(option = option::name(opt), code = opt, "recv dont");

        if self.opts.will_wont_resp(opt) > 0 {
            self.opts.decr_will_wont_resp(opt);
            if self.opts.will_wont_resp(opt) > 0 && self.opts.my_state_is_wont(opt) {
                self.opts.decr_will_wont_resp(opt);
            }
        }
        if self.opts.will_wont_resp(opt) == 0 && self.opts.my_want_is_will(opt) {
            match opt {
                option::BINARY => {
                    d.init_termbuf();
                    d.tty_binaryout(false);
                    d.set_termbuf();
                }

                option::ECHO => {
                    if self.lmodetype != LinemodeKind::RealLinemode
                        && self.lmodetype != LinemodeKind::KludgeLinemode
                    {
                        d.init_termbuf();
                        d.tty_setecho(false);
                        d.set_termbuf();
                    }
                }

                option::SGA => {
                    // DONT SGA while kludge linemode is available is the
                    // peer asking to turn linemode on.
                    if self.lmodetype == LinemodeKind::KludgeLinemode
                        || self.lmodetype == LinemodeKind::KludgeOk
                    {
                        self.lmodetype = LinemodeKind::KludgeLinemode;
                        self.linemode = d.linemode_change(true);
                    }
                }

                _ => {}
            }

            self.opts.set_my_want(opt, false);
            if self.opts.my_state_is_will(opt) {
                self.send_wont(d, opt, false);
            }
        }
        self.opts.set_my_state(opt, false);
    }

    /// Issue the opening volley of requests a fresh session makes:
    /// terminal queries first, then window/status/flow, then either a
    /// linemode offer or plain character-at-a-time with server echo.
    pub fn start_negotiation<D: Daemon>(&mut self, d: &mut D) {
        self.send_do(d, option::TTYPE, true);
        self.send_do(d, option::TSPEED, true);
        self.send_do(d, option::XDISPLOC, true);
        self.send_do(d, option::NEW_ENVIRON, true);
        self.send_do(d, option::OLD_ENVIRON, true);
        self.send_do(d, option::NAWS, true);
        self.send_will(d, option::STATUS, true);
        self.send_do(d, option::LFLOW, true);
        if self.config.linemode {
            self.send_do(d, option::LINEMODE, true);
        } else {
            self.send_will(d, option::SGA, true);
            self.send_will(d, option::ECHO, true);
        }
    }

    /// Send the `DO TM` kludge-linemode probe. `send_do` records the
    /// want state as WONT for TM, so the probe can be repeated later.
    pub fn probe_kludge_linemode<D: Daemon>(&mut self, d: &mut D) {
        if self.config.linemode && self.lmodetype < LinemodeKind::KludgeLinemode {
            self.send_do(d, option::TM, true);
        }
    }

    fn run_post_confirm<D: Daemon>(&mut self, d: &mut D, func: Option<PostConfirm>) {
        match func {
            Some(PostConfirm::LinemodeOn) => self.linemode = d.linemode_change(true),
            Some(PostConfirm::AuthRequest) => d.auth_request(),
            Some(PostConfirm::EncryptSendSupport) => d.encrypt_send_support(),
            Some(PostConfirm::FlowChange) => d.flow_change(),
            None => {}
        }
    }
}
