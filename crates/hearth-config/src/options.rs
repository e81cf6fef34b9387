//! Loose parsing of process launch flags.
//!
//! Launch arguments use single-dash literal tokens (`-programdata`, `-v`)
//! rather than GNU-style long options, and flags the host does not know about
//! must be tolerated so newer launchers keep working with older hosts. The
//! store therefore records every flag it sees and leaves interpretation to the
//! callers that query it.

use std::collections::HashMap;
use std::env;
use std::ffi::OsStr;

/// Flag overriding the program-data root.
pub const PROGRAM_DATA_FLAG: &str = "-programdata";

/// Flag requesting the version string instead of a service launch.
pub const VERSION_FLAG: &str = "-v";

/// Value bound to a flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// The flag appeared without a following value token.
    Present,
    /// The flag was followed by a value token.
    Value(String),
}

impl OptionValue {
    /// Returns the bound value, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Present => None,
            Self::Value(value) => Some(value.as_str()),
        }
    }
}

/// Immutable view of the flags passed at launch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupOptions {
    flags: HashMap<String, OptionValue>,
}

impl StartupOptions {
    /// Parses the arguments that follow the program name.
    ///
    /// A token starting with `-` (other than a lone `-`) is a flag. A flag
    /// immediately followed by a non-flag token binds that token as its value;
    /// otherwise the flag is presence-only. Stray positional tokens are
    /// ignored. When a flag repeats, the first occurrence wins.
    #[must_use]
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut flags = HashMap::new();
        let mut pending: Option<String> = None;

        for arg in args {
            let token = arg.as_ref().to_string_lossy().into_owned();
            if is_flag(&token) {
                if let Some(flag) = pending.replace(token) {
                    flags.entry(flag).or_insert(OptionValue::Present);
                }
            } else if let Some(flag) = pending.take() {
                flags.entry(flag).or_insert(OptionValue::Value(token));
            }
        }

        if let Some(flag) = pending {
            flags.entry(flag).or_insert(OptionValue::Present);
        }

        Self { flags }
    }

    /// Parses the current process arguments, skipping the program name.
    #[must_use]
    pub fn from_env() -> Self {
        Self::parse(env::args_os().skip(1))
    }

    /// Returns the value bound to `flag`.
    ///
    /// Absent flags and presence-only flags both yield `None`.
    #[must_use]
    pub fn get(&self, flag: &str) -> Option<&str> {
        self.flags.get(flag).and_then(OptionValue::as_str)
    }

    /// Returns `true` when `flag` appeared on the command line.
    #[must_use]
    pub fn has(&self, flag: &str) -> bool {
        self.flags.contains_key(flag)
    }

    /// Returns the raw entry recorded for `flag`.
    #[must_use]
    pub fn value(&self, flag: &str) -> Option<&OptionValue> {
        self.flags.get(flag)
    }

    /// Program-data override supplied with [`PROGRAM_DATA_FLAG`].
    #[must_use]
    pub fn program_data(&self) -> Option<&str> {
        self.get(PROGRAM_DATA_FLAG)
    }

    /// Whether [`VERSION_FLAG`] was supplied.
    #[must_use]
    pub fn version_requested(&self) -> bool {
        self.has(VERSION_FLAG)
    }

    /// Number of distinct flags recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Returns `true` when no flags were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

fn is_flag(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-')
}
