/// Error type of this crate.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The line ended in the middle of a record.
    #[error("unexpected end of line at offset {0}")]
    UnexpectedEnd(usize),

    /// An unexpected character was found.
    #[error("unexpected character {found:?} at offset {offset}")]
    UnexpectedChar {
        /// Character found in the line.
        found: char,

        /// Byte offset of the character.
        offset: usize,
    },

    /// A C-string contains an invalid escape sequence.
    #[error("invalid escape sequence at offset {0}")]
    InvalidEscape(usize),

    /// A result record has a class not defined by the protocol.
    #[error("unknown result class: {0}")]
    UnknownResultClass(String),

    /// An async record has no class.
    #[error("missing async class at offset {0}")]
    MissingAsyncClass(usize),

    /// A `variable=value` pair has no variable name.
    #[error("missing variable name at offset {0}")]
    MissingVariable(usize),

    /// Tuples and lists are nested too deeply.
    #[error("nesting too deep at offset {0}")]
    TooDeep(usize),

    /// Characters were found after a complete record.
    #[error("trailing characters at offset {0}")]
    TrailingCharacters(usize),
}

/// Result type of this crate.
pub type Result<T> = core::result::Result<T, Error>;
