use std::borrow::Cow;
use std::fmt;

use crate::record::Token;

/// A machine interface command, ready to be sent to the backend.
///
/// ```
/// use mimic_mi::MiCommand;
///
/// let cmd = MiCommand::new("break-insert").option("-f").arg("my func");
/// assert_eq!(cmd.to_line(7), r#"7-break-insert -f "my func""#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiCommand {
    operation: String,
    options: Vec<String>,
    parameters: Vec<String>,
}

impl MiCommand {
    /// Creates a command for the given operation (without its leading `-`).
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            options: Vec::new(),
            parameters: Vec::new(),
        }
    }

    /// Adds an option, written verbatim before the parameters.
    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    /// Adds a parameter, quoted as a C-string if needed.
    pub fn arg(mut self, parameter: impl Into<String>) -> Self {
        self.parameters.push(parameter.into());
        self
    }

    /// Adds multiple parameters.
    pub fn args<I, S>(self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        parameters.into_iter().fold(self, |cmd, p| cmd.arg(p))
    }

    /// Operation name of this command.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Encodes the command as a single protocol line, prefixed with `token`.
    pub fn to_line(&self, token: Token) -> String {
        format!("{token}{self}")
    }
}

impl fmt::Display for MiCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-{}", self.operation)?;

        for option in self.options.iter() {
            write!(f, " {option}")?;
        }

        for parameter in self.parameters.iter() {
            write!(f, " {}", quote(parameter))?;
        }

        Ok(())
    }
}

/// Quotes a command parameter as a C-string, if it contains characters
/// that would break the command line.
pub fn quote(parameter: &str) -> Cow<'_, str> {
    let needs_quotes = parameter.is_empty()
        || parameter
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | '\\' | '\''));

    if needs_quotes {
        Cow::Owned(escape(parameter))
    } else {
        Cow::Borrowed(parameter)
    }
}

/// Escapes a string as a quoted C-string.
pub fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len() + 2);
    escaped.push('"');

    for c in s.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            c if c.is_control() => escaped.push_str(&format!("\\{:03o}", u32::from(c))),
            c => escaped.push(c),
        }
    }

    escaped.push('"');
    escaped
}

#[cfg(test)]
mod tests {
    use super::{quote, MiCommand};
    use crate::parser::parse_line;
    use crate::record::Record;

    #[test]
    fn encodes_token_and_operation() {
        assert_eq!(MiCommand::new("exec-next").to_line(1), "1-exec-next");
        assert_eq!(
            MiCommand::new("stack-list-locals").arg("1").to_line(42),
            "42-stack-list-locals 1"
        );
        assert_eq!(
            MiCommand::new("var-create")
                .args(["w1", "*", "a[i] + 1"])
                .to_line(3),
            r#"3-var-create w1 * "a[i] + 1""#
        );
    }

    #[test]
    fn quotes_only_when_needed() {
        assert_eq!(quote("main"), "main");
        assert_eq!(quote("/tmp/a.out"), "/tmp/a.out");
        assert_eq!(quote(""), r#""""#);
        assert_eq!(quote("my dir"), r#""my dir""#);
        assert_eq!(quote(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(quote(r"C:\path"), r#""C:\\path""#);
    }

    #[test]
    fn escaped_strings_parse_back() {
        let value = "tab\there \"quoted\" back\\slash\u{1}";
        let line = format!("~{}", super::escape(value));

        assert_eq!(parse_line(&line), Some(Record::Console(value.to_owned())));
    }
}
