//! This crate implements the line-oriented machine interface protocol (MI)
//! spoken by gdb-like debuggers.
//!
//! It is purely syntactic: it turns backend output lines into structured
//! [records](Record), and encodes [commands](MiCommand) with their
//! correlation token. Interpreting the records is the job of
//! `mimic-session`.
//!
//! ```
//! use mimic_mi::{Record, ResultClass};
//!
//! let record = mimic_mi::parse_line(r#"4^done,value="5",type="int""#);
//!
//! let Some(Record::Result(result)) = record else {
//!     unreachable!()
//! };
//!
//! assert_eq!(result.token, Some(4));
//! assert_eq!(result.class, ResultClass::Done);
//! assert_eq!(result.fields.str("value"), Some("5"));
//! ```
//!
//! # Tolerance
//!
//! Lines which do not follow the grammar (e.g., raw output of a target
//! sharing the backend's terminal) are never dropped: [parse_line] returns
//! them as [Record::Log].

mod command;
mod error;
mod parser;
mod record;
mod value;

pub use self::command::{escape, quote, MiCommand};
pub use self::error::{Error, Result};
pub use self::parser::{parse_line, parse_record};
pub use self::record::{AsyncRecord, Record, ResultClass, ResultRecord, Token};
pub use self::value::{Fields, List, ListIter, Value};
