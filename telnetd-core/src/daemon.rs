//! The narrow interface between the protocol engine and the rest of the
//! daemon: network buffers, the pseudo-terminal, the termios layer, the
//! SLC table manager, and the optional security plugins.
//!
//! The engine calls these synchronously from inside
//! [`Engine::receive`](crate::engine::Engine::receive); implementations
//! must not block. Everything the engine does not strictly require has a
//! no-op default so small embeddings stay small.

/// Signals the engine asks the pty driver to post to the foreground
/// process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TtySignal {
    /// IAC IP.
    Interrupt,
    /// IAC BREAK / IAC ABORT.
    Quit,
    /// IAC SUSP.
    Suspend,
    /// IAC AYT when an AYT character is mapped.
    Info,
}

/// SLC table entries whose characters the engine reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlcFunction {
    Eof,
    EraseChar,
    EraseLine,
    Interrupt,
    Abort,
    Suspend,
    AbortOutput,
    AreYouThere,
}

/// Named milestones in the startup synchronization dance. The outer
/// session spins waiting for these; a milestone fires either when the
/// matching suboption arrives or when the peer refuses the option
/// outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Milestone {
    /// A data mark arrived (synch processing).
    DataMark,
    /// TTYPE suboption done.
    TtypeDone,
    /// TSPEED suboption done.
    TspeedDone,
    /// XDISPLOC suboption done.
    XdisplocDone,
    /// NEW_ENVIRON suboption done.
    EnvironDone,
    /// OLD_ENVIRON suboption done.
    OldEnvironDone,
}

/// Everything the engine needs from its host.
///
/// One connection owns one `Daemon` implementation; the engine never
/// shares it across connections.
pub trait Daemon {
    // ── network egress ────────────────────────────────────────────────

    /// Append bytes to the network send queue.
    fn net_output(&mut self, data: &[u8]);

    /// Discard queued-but-unsent network output (Abort Output).
    fn netclear(&mut self) {}

    /// Push queued output toward the socket as soon as possible.
    fn netflush(&mut self) {}

    /// Mark the current end of the send queue as TCP urgent.
    fn set_neturg(&mut self) {}

    /// Whether unread TCP urgent data is still pending on the input side.
    fn still_oob(&self) -> bool {
        false
    }

    // ── pty egress ────────────────────────────────────────────────────

    /// Write one byte of session data toward the pty.
    fn pty_output_byte(&mut self, byte: u8);

    /// Backpressure probe: the tokenizer stops consuming while this is
    /// true.
    fn pty_buffer_is_full(&self) -> bool {
        false
    }

    /// Push buffered pty output out now (best effort).
    fn ptyflush(&mut self) {}

    // ── termios ───────────────────────────────────────────────────────

    /// Snapshot the pty's terminal state before mutating it.
    fn init_termbuf(&mut self) {}

    /// Apply a mutated terminal state back to the pty.
    fn set_termbuf(&mut self) {}

    fn tty_binaryin(&mut self, on: bool) {
        let _ = on;
    }

    fn tty_binaryout(&mut self, on: bool) {
        let _ = on;
    }

    fn tty_setecho(&mut self, on: bool) {
        let _ = on;
    }

    /// Whether the tty maps CR to NL on input (ICRNL).
    fn tty_iscrnl(&self) -> bool {
        false
    }

    /// Deliver EOF to the session (VEOF handling lives with the termios
    /// layer; the engine follows up with the SLC EOF character).
    fn term_send_eof(&mut self) {}

    /// Post a signal through the pty driver. Return `false` when the
    /// platform can't (no TCSIG equivalent); the engine then falls back
    /// to writing the mapped control character.
    fn tty_signal(&mut self, signal: TtySignal) -> bool {
        let _ = signal;
        false
    }

    // ── SLC table manager ─────────────────────────────────────────────

    /// The character currently mapped for `func`, or `None` when the
    /// entry is unset (`_POSIX_VDISABLE`).
    fn slc_char(&self, func: SlcFunction) -> Option<u8> {
        let _ = func;
        None
    }

    /// Record whether the peer may change the XON/XOFF characters
    /// (LFLOW accepted) or must leave them alone (LFLOW refused).
    fn slc_flow_changeable(&mut self, changeable: bool) {
        let _ = changeable;
    }

    /// Begin an SLC exchange; `getebuf` is set when a peer-initiated
    /// table follows via [`Daemon::do_opt_slc`].
    fn start_slc(&mut self, getebuf: bool) {
        let _ = getebuf;
    }

    /// Feed the peer's SLC triplets to the table manager.
    fn do_opt_slc(&mut self, data: &[u8]) {
        let _ = data;
    }

    /// Queue the server's full SLC table for export.
    fn send_slc(&mut self) {}

    /// Finish the exchange, returning any reply triplets accumulated
    /// since [`Daemon::start_slc`].
    fn end_slc(&mut self) -> Vec<u8> {
        Vec::new()
    }

    // ── session state changes ─────────────────────────────────────────

    /// The peer asked to enter (`true`) or leave (`false`) linemode.
    /// Returns whether linemode is active afterwards, which may differ
    /// from the request when the tty refuses to switch.
    fn linemode_change(&mut self, enable: bool) -> bool {
        let _ = enable;
        false
    }

    /// NAWS: the client window is now `cols` x `rows`.
    fn window_size(&mut self, cols: u16, rows: u16) {
        let _ = (cols, rows);
    }

    /// TSPEED: transmit and receive speeds in bits per second.
    fn terminal_speed(&mut self, transmit: u32, receive: u32) {
        let _ = (transmit, receive);
    }

    /// LINEMODE MODE: the client announced its edit-mode bits.
    fn edit_mode(&mut self, mode: u8) {
        let _ = mode;
    }

    /// Mark a startup synchronization milestone.
    fn settimer(&mut self, milestone: Milestone) {
        let _ = milestone;
    }

    /// ENVIRON: set (`Some`) or unset (`None`) a variable for the login
    /// environment.
    fn set_env(&mut self, name: &[u8], value: Option<&[u8]>) {
        let _ = (name, value);
    }

    // ── authentication plugin ─────────────────────────────────────────

    fn auth_request(&mut self) {}

    fn auth_is(&mut self, data: &[u8]) {
        let _ = data;
    }

    fn auth_name(&mut self, data: &[u8]) {
        let _ = data;
    }

    /// The peer backed out of authentication (WONT AUTHENTICATION).
    fn auth_reject(&mut self) {}

    // ── encryption plugin ─────────────────────────────────────────────

    fn encrypt_send_support(&mut self) {}

    fn encrypt_support(&mut self, data: &[u8]) {
        let _ = data;
    }

    fn encrypt_is(&mut self, data: &[u8]) {
        let _ = data;
    }

    fn encrypt_reply(&mut self, data: &[u8]) {
        let _ = data;
    }

    fn encrypt_start(&mut self, data: &[u8]) {
        let _ = data;
    }

    fn encrypt_end(&mut self) {}

    fn encrypt_request_start(&mut self, data: &[u8]) {
        let _ = data;
    }

    fn encrypt_request_end(&mut self) {}

    fn encrypt_enc_keyid(&mut self, data: &[u8]) {
        let _ = data;
    }

    fn encrypt_dec_keyid(&mut self, data: &[u8]) {
        let _ = data;
    }

    /// LFLOW confirmation: flow-control state should be re-announced.
    fn flow_change(&mut self) {}

    // ── input decryption hook ─────────────────────────────────────────

    /// Decrypt one inbound byte. Identity when encryption is off.
    fn decrypt_byte(&mut self, byte: u8) -> u8 {
        byte
    }

    /// Undo the most recent [`Daemon::decrypt_byte`]: the tokenizer
    /// peeked a byte it is not consuming yet.
    fn decrypt_rewind(&mut self) {}

    // ── teardown ──────────────────────────────────────────────────────

    /// Orderly shutdown (LOGOUT accepted). The engine stops consuming
    /// input after this returns.
    fn cleanup(&mut self) {}
}
