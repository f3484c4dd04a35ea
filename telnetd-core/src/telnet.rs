//! TELNET wire constants (RFC 854 and friends).
//!
//! Grouped by namespace the way `arpa/telnet.h` groups them: command
//! codes, option codes, suboption qualifiers, and the LINEMODE / LFLOW /
//! ENVIRON sub-vocabularies.

/// IAC-prefixed command bytes.
pub mod command {
    /// End of urgent-data "synch" stream (xEOF from RFC 1184).
    pub const XEOF: u8 = 236;
    /// Suspend process (linemode addition).
    pub const SUSP: u8 = 237;
    /// Abort process (linemode addition).
    pub const ABORT: u8 = 238;
    /// End of record (RFC 885).
    pub const EOR: u8 = 239;
    /// Suboption end.
    pub const SE: u8 = 240;
    /// No operation.
    pub const NOP: u8 = 241;
    /// Data mark, sent with TCP urgent to bound a synch.
    pub const DM: u8 = 242;
    /// Break.
    pub const BRK: u8 = 243;
    /// Interrupt process.
    pub const IP: u8 = 244;
    /// Abort output.
    pub const AO: u8 = 245;
    /// Are you there.
    pub const AYT: u8 = 246;
    /// Erase character.
    pub const EC: u8 = 247;
    /// Erase line.
    pub const EL: u8 = 248;
    /// Go ahead.
    pub const GA: u8 = 249;
    /// Suboption begin.
    pub const SB: u8 = 250;
    /// Option negotiation verbs.
    pub const WILL: u8 = 251;
    pub const WONT: u8 = 252;
    pub const DO: u8 = 253;
    pub const DONT: u8 = 254;
    /// Interpret as command.
    pub const IAC: u8 = 255;

    #[must_use]
    pub fn name(cmd: u8) -> &'static str {
        match cmd {
            XEOF => "EOF",
            SUSP => "SUSP",
            ABORT => "ABORT",
            EOR => "EOR",
            SE => "SE",
            NOP => "NOP",
            DM => "DM",
            BRK => "BRK",
            IP => "IP",
            AO => "AO",
            AYT => "AYT",
            EC => "EC",
            EL => "EL",
            GA => "GA",
            SB => "SB",
            WILL => "WILL",
            WONT => "WONT",
            DO => "DO",
            DONT => "DONT",
            IAC => "IAC",
            _ => "?",
        }
    }
}

/// Option codes the server knows by name.
pub mod option {
    pub const BINARY: u8 = 0;
    pub const ECHO: u8 = 1;
    pub const SGA: u8 = 3;
    pub const STATUS: u8 = 5;
    pub const TM: u8 = 6;
    pub const LOGOUT: u8 = 18;
    pub const TTYPE: u8 = 24;
    pub const EOR: u8 = 25;
    pub const NAWS: u8 = 31;
    pub const TSPEED: u8 = 32;
    pub const LFLOW: u8 = 33;
    pub const LINEMODE: u8 = 34;
    pub const XDISPLOC: u8 = 35;
    pub const OLD_ENVIRON: u8 = 36;
    pub const AUTHENTICATION: u8 = 37;
    pub const ENCRYPT: u8 = 38;
    pub const NEW_ENVIRON: u8 = 39;

    /// One past the highest option the STATUS report enumerates.
    pub const N_OPTS: usize = NEW_ENVIRON as usize + 1;

    #[must_use]
    pub fn name(opt: u8) -> &'static str {
        match opt {
            BINARY => "BINARY",
            ECHO => "ECHO",
            SGA => "SUPPRESS GO AHEAD",
            STATUS => "STATUS",
            TM => "TIMING MARK",
            LOGOUT => "LOGOUT",
            TTYPE => "TERMINAL TYPE",
            EOR => "END OF RECORD",
            NAWS => "NAWS",
            TSPEED => "TSPEED",
            LFLOW => "TOGGLE FLOW CONTROL",
            LINEMODE => "LINEMODE",
            XDISPLOC => "XDISPLOC",
            OLD_ENVIRON => "OLD-ENVIRON",
            AUTHENTICATION => "AUTHENTICATION",
            ENCRYPT => "ENCRYPT",
            NEW_ENVIRON => "NEW-ENVIRON",
            _ => "?",
        }
    }
}

/// Suboption qualifiers shared by TTYPE, TSPEED, STATUS, ENVIRON and
/// AUTHENTICATION.
pub mod telqual {
    pub const IS: u8 = 0;
    pub const SEND: u8 = 1;
    /// ENVIRON unsolicited update.
    pub const INFO: u8 = 2;
    /// AUTHENTICATION reply (same code point as INFO).
    pub const REPLY: u8 = 2;
    /// AUTHENTICATION account name.
    pub const NAME: u8 = 3;
}

/// RFC 1372 LFLOW function bytes.
pub mod lflow {
    pub const OFF: u8 = 0;
    pub const ON: u8 = 1;
    pub const RESTART_ANY: u8 = 2;
    pub const RESTART_XON: u8 = 3;
}

/// RFC 1184 LINEMODE suboption vocabulary.
pub mod lm {
    pub const MODE: u8 = 1;
    pub const FORWARDMASK: u8 = 2;
    pub const SLC: u8 = 3;

    /// MODE bit: client-side line editing.
    pub const MODE_EDIT: u8 = 0x01;
    /// MODE bit: client traps signals locally.
    pub const MODE_TRAPSIG: u8 = 0x02;
    /// MODE bit: acknowledgement of a mode change.
    pub const MODE_ACK: u8 = 0x04;
}

/// ENVIRON tag bytes for both RFC 1572 (new) and RFC 1408 (old) flavors.
///
/// The old-style values are the BSD assignment; clients following RFC
/// 1408 to the letter send them swapped, which is what the reversed-tag
/// heuristic sorts out.
pub mod env {
    pub const VAR: u8 = 0;
    pub const VALUE: u8 = 1;
    pub const ESC: u8 = 2;
    pub const USERVAR: u8 = 3;

    pub const OLD_VAR: u8 = 1;
    pub const OLD_VALUE: u8 = 0;
}

/// RFC 2946 ENCRYPT suboption commands.
pub mod encrypt {
    pub const IS: u8 = 0;
    pub const SUPPORT: u8 = 1;
    pub const REPLY: u8 = 2;
    pub const START: u8 = 3;
    pub const END: u8 = 4;
    pub const REQSTART: u8 = 5;
    pub const REQEND: u8 = 6;
    pub const ENC_KEYID: u8 = 7;
    pub const DEC_KEYID: u8 = 8;
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn command_codes_are_contiguous() {
        // RFC 854 lays the verbs out back to back under IAC.
        assert_eq!(command::WILL, 251);
        assert_eq!(command::DONT, command::WILL + 3);
        assert_eq!(command::IAC, 255);
        assert_eq!(command::SE, 240);
        assert_eq!(command::SB, 250);
    }

    #[test]
    fn option_table_size() {
        assert_eq!(option::N_OPTS, 40);
        assert!(usize::from(option::NEW_ENVIRON) < option::N_OPTS);
    }

    #[test]
    fn names() {
        assert_eq!(option::name(option::LINEMODE), "LINEMODE");
        assert_eq!(option::name(200), "?");
        assert_eq!(command::name(command::DM), "DM");
    }
}
