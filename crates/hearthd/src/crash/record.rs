//! Faults and the records persisted for them.

use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::panic::PanicHookInfo;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::environment::EnvironmentSnapshot;

/// Shape of a fault payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultClass {
    /// The payload carried a message.
    Message,
    /// The payload was of an unknown type.
    Opaque,
}

impl FaultClass {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Opaque => "opaque",
        }
    }
}

/// Source location where a fault was raised.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaultLocation {
    /// Source file.
    pub file: String,
    /// Line number.
    pub line: u32,
    /// Column number.
    pub column: u32,
}

impl FaultLocation {
    /// Builds a location.
    #[must_use]
    pub fn new(file: &str, line: u32, column: u32) -> Self {
        Self {
            file: file.to_owned(),
            line,
            column,
        }
    }
}

impl fmt::Display for FaultLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// The parts of a fault that determine its exit code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FaultIdentity {
    class: FaultClass,
    location: Option<FaultLocation>,
}

impl FaultIdentity {
    /// Builds an identity.
    #[must_use]
    pub const fn new(class: FaultClass, location: Option<FaultLocation>) -> Self {
        Self { class, location }
    }

    /// Stable textual form, `class@file:line:column`.
    #[must_use]
    pub fn canonical(&self) -> String {
        match &self.location {
            Some(location) => format!("{}@{location}", self.class.as_str()),
            None => format!("{}@unknown", self.class.as_str()),
        }
    }
}

/// An uncaught fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    class: FaultClass,
    message: Option<String>,
    location: Option<FaultLocation>,
    thread: Option<String>,
    backtrace: String,
}

impl Fault {
    /// Builds a fault carrying `message`.
    #[must_use]
    pub fn message(message: impl Into<String>, location: Option<FaultLocation>) -> Self {
        Self {
            class: FaultClass::Message,
            message: Some(message.into()),
            location,
            thread: current_thread_name(),
            backtrace: String::new(),
        }
    }

    /// Builds a fault whose payload could not be interpreted.
    #[must_use]
    pub fn opaque(location: Option<FaultLocation>) -> Self {
        Self {
            class: FaultClass::Opaque,
            message: None,
            location,
            thread: current_thread_name(),
            backtrace: String::new(),
        }
    }

    /// Captures the fault described by a panic hook invocation.
    #[must_use]
    pub fn from_panic(info: &PanicHookInfo<'_>) -> Self {
        let location = info
            .location()
            .map(|location| FaultLocation::new(location.file(), location.line(), location.column()));
        let mut fault = match payload_message(info.payload()) {
            Some(message) => Self::message(message, location),
            None => Self::opaque(location),
        };
        fault.backtrace = Backtrace::force_capture().to_string();
        fault
    }

    /// Identity used to derive the exit code.
    #[must_use]
    pub fn identity(&self) -> FaultIdentity {
        FaultIdentity::new(self.class, self.location.clone())
    }

    /// Payload class.
    #[must_use]
    pub const fn class(&self) -> FaultClass {
        self.class
    }

    /// Payload message, when present.
    #[must_use]
    pub fn description(&self) -> &str {
        self.message.as_deref().unwrap_or("opaque panic payload")
    }
}

fn payload_message(payload: &(dyn Any + Send)) -> Option<String> {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
}

fn current_thread_name() -> Option<String> {
    std::thread::current().name().map(str::to_owned)
}

/// Write-once diagnostic record for a fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashRecord {
    /// RFC 3339 capture time.
    pub timestamp: String,
    /// Payload class.
    pub class: FaultClass,
    /// Payload message.
    pub message: Option<String>,
    /// Source location.
    pub location: Option<FaultLocation>,
    /// Name of the faulting thread.
    pub thread: Option<String>,
    /// Captured stack context.
    pub backtrace: String,
    /// Exit code derived from the fault identity.
    pub exit_code: u8,
    /// Process snapshot.
    pub environment: EnvironmentSnapshot,
}

impl CrashRecord {
    /// Builds the record for `fault`.
    #[must_use]
    pub fn capture(fault: &Fault, exit_code: u8, environment: EnvironmentSnapshot) -> Self {
        let now = OffsetDateTime::now_utc();
        let timestamp = now
            .format(&Rfc3339)
            .unwrap_or_else(|_| now.unix_timestamp().to_string());
        Self {
            timestamp,
            class: fault.class,
            message: fault.message.clone(),
            location: fault.location.clone(),
            thread: fault.thread.clone(),
            backtrace: fault.backtrace.clone(),
            exit_code,
            environment,
        }
    }
}
