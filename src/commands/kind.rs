//! Command names and their minimum arity.

/// Every command the dispatcher understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Get,
    Set,
    Del,
    Keys,
    Expire,
    Ttl,
    Type,
    ZAdd,
    ZRange,
    Ping,
}

impl CommandKind {
    /// All commands the dispatcher accepts.
    pub const ALL: [CommandKind; 10] = [
        CommandKind::Get,
        CommandKind::Set,
        CommandKind::Del,
        CommandKind::Keys,
        CommandKind::Expire,
        CommandKind::Ttl,
        CommandKind::Type,
        CommandKind::ZAdd,
        CommandKind::ZRange,
        CommandKind::Ping,
    ];

    /// Looks up a command by name. Names are case-sensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// The command name as it appears on the wire.
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Get => "GET",
            CommandKind::Set => "SET",
            CommandKind::Del => "DEL",
            CommandKind::Keys => "KEYS",
            CommandKind::Expire => "EXPIRE",
            CommandKind::Ttl => "TTL",
            CommandKind::Type => "TYPE",
            CommandKind::ZAdd => "ZADD",
            CommandKind::ZRange => "ZRANGE",
            CommandKind::Ping => "PING",
        }
    }

    /// Minimum number of arguments after the command name.
    pub fn min_args(self) -> usize {
        match self {
            CommandKind::Ping => 0,
            CommandKind::Get
            | CommandKind::Del
            | CommandKind::Keys
            | CommandKind::Ttl
            | CommandKind::Type => 1,
            CommandKind::Set | CommandKind::Expire => 2,
            CommandKind::ZAdd | CommandKind::ZRange => 3,
        }
    }
}
