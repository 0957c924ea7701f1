use std::fmt;
use std::str::FromStr;

use crate::value::Fields;

/// Correlation token prefixed to a command and echoed in its result record.
pub type Token = u64;

/// A single output record of the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Result of a previously issued command (`^done`, `^error`, ...).
    Result(ResultRecord),

    /// Execution state notification (`*stopped`, `*running`).
    Exec(AsyncRecord),

    /// Progress notification of a slow operation (`+download`).
    Status(AsyncRecord),

    /// Supplementary notification (`=breakpoint-created`, ...).
    Notify(AsyncRecord),

    /// Console output of the backend (`~"..."`).
    Console(String),

    /// Output of the target program (`@"..."`), without trailing CR/LF.
    Target(String),

    /// Backend log output (`&"..."`), or any line that could not be parsed.
    Log(String),
}

/// A result record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    /// Token of the command this record answers.
    pub token: Option<Token>,

    /// Result class.
    pub class: ResultClass,

    /// Result fields.
    pub fields: Fields,
}

impl ResultRecord {
    /// Returns the error message of an `^error` record.
    pub fn error_message(&self) -> Option<&str> {
        match self.class {
            ResultClass::Error => Some(self.fields.str("msg").unwrap_or("unknown error")),
            _ => None,
        }
    }
}

/// Class of a result record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultClass {
    /// `^done`
    Done,
    /// `^running`
    Running,
    /// `^connected`
    Connected,
    /// `^error`
    Error,
    /// `^exit`
    Exit,
}

impl FromStr for ResultClass {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "done" => Ok(Self::Done),
            "running" => Ok(Self::Running),
            "connected" => Ok(Self::Connected),
            "error" => Ok(Self::Error),
            "exit" => Ok(Self::Exit),
            _ => Err(crate::Error::UnknownResultClass(s.to_owned())),
        }
    }
}

impl fmt::Display for ResultClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Done => "done",
            Self::Running => "running",
            Self::Connected => "connected",
            Self::Error => "error",
            Self::Exit => "exit",
        })
    }
}

/// An asynchronous record (exec, status or notify).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncRecord {
    /// Token of the command that caused this record, if any.
    pub token: Option<Token>,

    /// Async class (e.g., `stopped`, `breakpoint-created`).
    pub class: String,

    /// Record fields.
    pub fields: Fields,
}
