//! The per-connection protocol engine.
//!
//! [`Engine`] bundles every piece of negotiation state one connection
//! owns: the option table, the receive tokenizer state, the suboption
//! buffer, and the session flags. The daemon feeds it inbound bytes via
//! [`Engine::receive`]; the engine talks back through the
//! [`Daemon`](crate::daemon::Daemon) trait.
//!
//! The historical implementation kept all of this in process globals;
//! one `Engine` per connection replaces that wholesale.

mod negotiation;
mod options;
mod status;
mod subopt;
mod tokenizer;

use crate::config::EngineConfig;
use options::OptionTable;
use subopt::SubBuffer;
use tokenizer::TokenState;

/// How much linemode the peer has been talked into.
///
/// The ladder is strictly ordered; comparisons against rungs are how
/// the TM-probe transitions are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LinemodeKind {
    /// No linemode of any kind.
    NoLinemode,
    /// Kludge linemode must not be offered automatically.
    NoAutoKludge,
    /// Kludge linemode may be used, but is not active.
    KludgeOk,
    /// Pre-RFC-1184 kludge linemode (TM probe accepted).
    KludgeLinemode,
    /// RFC 1184 linemode.
    RealLinemode,
}

/// Resolved OLD_ENVIRON tag bytes for this connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EnvTags {
    pub(crate) var: u8,
    pub(crate) value: u8,
}

#[derive(Debug)]
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) opts: OptionTable,
    pub(crate) state: TokenState,
    pub(crate) sub: SubBuffer,

    /// Server currently treats pty output as line-oriented.
    pub(crate) linemode: bool,
    pub(crate) lmodetype: LinemodeKind,
    /// Cleared the moment the peer behaves like a 4.2BSD client.
    pub(crate) not42: bool,
    /// Draining toward a data mark under TCP urgent.
    pub(crate) synching: bool,
    pub(crate) flowmode: bool,
    /// LFLOW restart semantics: unset until the tty layer reports one.
    pub(crate) restartany: Option<bool>,
    /// Edit-mode bits we last told the client.
    pub(crate) editmode: u8,
    /// Edit-mode bits the client last told us.
    pub(crate) useeditmode: u8,

    pub(crate) terminal_type: Option<String>,
    /// `None` until the reversed-tag heuristic settles (or forever, for
    /// frames it cannot classify).
    pub(crate) env_tags: Option<EnvTags>,

    pub(crate) closing: bool,
}

impl Engine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let lmodetype = if config.linemode {
            LinemodeKind::NoLinemode
        } else {
            LinemodeKind::NoAutoKludge
        };
        let env_tags = if config.env_tag_heuristic {
            None
        } else {
            Some(EnvTags {
                var: crate::telnet::env::OLD_VAR,
                value: crate::telnet::env::OLD_VALUE,
            })
        };
        Self {
            config,
            opts: OptionTable::default(),
            state: TokenState::Data,
            sub: SubBuffer::default(),
            linemode: false,
            lmodetype,
            not42: true,
            synching: false,
            flowmode: true,
            restartany: None,
            editmode: 0,
            useeditmode: 0,
            terminal_type: None,
            env_tags,
            closing: false,
        }
    }

    /// The lowercased terminal name from the last TTYPE IS, if any.
    #[must_use]
    pub fn terminal_type(&self) -> Option<&str> {
        self.terminal_type.as_deref()
    }

    #[must_use]
    pub fn linemode_active(&self) -> bool {
        self.linemode
    }

    #[must_use]
    pub fn linemode_kind(&self) -> LinemodeKind {
        self.lmodetype
    }

    /// Whether the engine is draining input toward a data mark.
    #[must_use]
    pub fn synching(&self) -> bool {
        self.synching
    }

    /// True once LOGOUT has torn the session down; `receive` consumes
    /// nothing further.
    #[must_use]
    pub fn closed(&self) -> bool {
        self.closing
    }

    /// Peer-side acknowledged state for `opt` (his_state == WILL).
    #[must_use]
    pub fn peer_enabled(&self, opt: u8) -> bool {
        self.opts.his_state_is_will(opt)
    }

    /// Local acknowledged state for `opt` (my_state == WILL).
    #[must_use]
    pub fn local_enabled(&self, opt: u8) -> bool {
        self.opts.my_state_is_will(opt)
    }

    /// The termios layer reports its current flow-control posture; the
    /// STATUS report serializes it.
    pub fn set_flow(&mut self, flowmode: bool, restartany: Option<bool>) {
        self.flowmode = flowmode;
        self.restartany = restartany;
    }

    /// The linemode layer reports the edit-mode bits it announced.
    pub fn set_edit_mode(&mut self, editmode: u8) {
        self.editmode = editmode;
    }

    /// Edit-mode bits the client last sent in LINEMODE MODE.
    #[must_use]
    pub fn client_edit_mode(&self) -> u8 {
        self.useeditmode
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::telnet::option;

    #[test]
    fn fresh_engine_wants_nothing() {
        let engine = Engine::new(EngineConfig::default());
        assert!(!engine.peer_enabled(option::BINARY));
        assert!(!engine.local_enabled(option::ECHO));
        assert!(!engine.linemode_active());
        assert!(!engine.closed());
        assert_eq!(engine.terminal_type(), None);
        assert_eq!(engine.linemode_kind(), LinemodeKind::NoLinemode);
    }

    #[test]
    fn linemode_capability_seeds_the_ladder() {
        let engine = Engine::new(EngineConfig {
            linemode: false,
            ..EngineConfig::default()
        });
        assert_eq!(engine.linemode_kind(), LinemodeKind::NoAutoKludge);
    }

    #[test]
    fn heuristic_off_fixes_old_environ_tags() {
        let engine = Engine::new(EngineConfig {
            env_tag_heuristic: false,
            ..EngineConfig::default()
        });
        assert_eq!(
            engine.env_tags,
            Some(EnvTags {
                var: crate::telnet::env::OLD_VAR,
                value: crate::telnet::env::OLD_VALUE,
            })
        );
    }

    #[test]
    fn ladder_is_ordered() {
        assert!(LinemodeKind::NoLinemode < LinemodeKind::NoAutoKludge);
        assert!(LinemodeKind::NoAutoKludge < LinemodeKind::KludgeOk);
        assert!(LinemodeKind::KludgeOk < LinemodeKind::KludgeLinemode);
        assert!(LinemodeKind::KludgeLinemode < LinemodeKind::RealLinemode);
    }
}
