use crate::record::{AsyncRecord, Record, ResultRecord, Token};
use crate::value::{Fields, List, Value};
use crate::{Error, Result};

/// Prompt printed by the backend once it is ready for new commands.
const PROMPT: &str = "(gdb)";

/// Maximum nesting of tuples and lists in a record.
const MAX_DEPTH: usize = 128;

/// Parses a single output line of the backend.
///
/// Blank lines and the backend prompt produce no record. Any line that does
/// not follow the protocol grammar is returned as a [Record::Log], so that
/// nothing printed by the backend is lost.
pub fn parse_line(line: &str) -> Option<Record> {
    match parse_record(line) {
        Ok(record) => record,
        Err(e) => {
            tracing::debug!(error = %e, line, "unparsable line forwarded as log");
            Some(Record::Log(strip_line_ending(line).to_owned()))
        }
    }
}

/// Parses a single output line of the backend, reporting grammar errors.
pub fn parse_record(line: &str) -> Result<Option<Record>> {
    let line = strip_line_ending(line);

    if line.trim().is_empty() || line.trim_end() == PROMPT {
        return Ok(None);
    }

    let mut parser = Parser::new(line);

    let token = parser.token();

    let record = match parser.bump()? {
        b'^' => {
            let class = parser.class()?.parse()?;
            let fields = parser.trailing_results()?;
            Record::Result(ResultRecord {
                token,
                class,
                fields,
            })
        }
        b'*' => Record::Exec(parser.async_record(token)?),
        b'+' => Record::Status(parser.async_record(token)?),
        b'=' => Record::Notify(parser.async_record(token)?),
        b'~' if token.is_none() => Record::Console(parser.c_string()?),
        b'@' if token.is_none() => {
            let text = parser.c_string()?;
            Record::Target(strip_target_line_ending(&text).to_owned())
        }
        b'&' if token.is_none() => Record::Log(parser.c_string()?),
        found => {
            return Err(Error::UnexpectedChar {
                found: char::from(found),
                offset: parser.pos - 1,
            });
        }
    };

    parser.finish()?;

    Ok(Some(record))
}

fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

fn strip_target_line_ending(text: &str) -> &str {
    let text = text.strip_suffix('\n').unwrap_or(text);
    text.strip_suffix('\r').unwrap_or(text)
}

/// Recursive descent parser over a single line.
struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    const fn new(line: &'a str) -> Self {
        Self {
            input: line.as_bytes(),
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Result<u8> {
        let c = self.peek().ok_or(Error::UnexpectedEnd(self.pos))?;
        self.pos += 1;
        Ok(c)
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        match self.bump()? {
            c if c == expected => Ok(()),
            found => Err(Error::UnexpectedChar {
                found: char::from(found),
                offset: self.pos - 1,
            }),
        }
    }

    fn finish(&self) -> Result<()> {
        if self.pos == self.input.len() {
            Ok(())
        } else {
            Err(Error::TrailingCharacters(self.pos))
        }
    }

    fn slice(&self, start: usize) -> String {
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    /// Optional sequence of digits prefixing a record.
    fn token(&mut self) -> Option<Token> {
        let start = self.pos;

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }

        if start == self.pos {
            return None;
        }

        match self.slice(start).parse() {
            Ok(token) => Some(token),
            Err(_) => {
                // token overflow, treat the digits as part of the record
                self.pos = start;
                None
            }
        }
    }

    fn class(&mut self) -> Result<String> {
        let start = self.pos;

        while self.peek().is_some_and(|c| c != b',') {
            self.pos += 1;
        }

        if start == self.pos {
            return Err(Error::MissingAsyncClass(start));
        }

        Ok(self.slice(start))
    }

    fn async_record(&mut self, token: Option<Token>) -> Result<AsyncRecord> {
        let class = self.class()?;
        let fields = self.trailing_results()?;

        Ok(AsyncRecord {
            token,
            class,
            fields,
        })
    }

    /// `( "," result )*`
    fn trailing_results(&mut self) -> Result<Fields> {
        let mut fields = Fields::new();

        while self.peek() == Some(b',') {
            self.pos += 1;
            let (name, value) = self.result()?;
            fields.push(name, value);
        }

        Ok(fields)
    }

    /// `variable "=" value`
    fn result(&mut self) -> Result<(String, Value)> {
        let start = self.pos;

        loop {
            match self.peek() {
                Some(b'=') => break,
                Some(b',' | b'{' | b'}' | b'[' | b']' | b'"') | None => {
                    return Err(Error::MissingVariable(start));
                }
                Some(_) => self.pos += 1,
            }
        }

        if start == self.pos {
            return Err(Error::MissingVariable(start));
        }

        let name = self.slice(start);
        self.expect(b'=')?;
        let value = self.value()?;

        Ok((name, value))
    }

    fn value(&mut self) -> Result<Value> {
        match self.peek() {
            Some(b'"') => self.c_string().map(Value::Const),
            Some(b'{') => self.nested(Self::tuple).map(Value::Tuple),
            Some(b'[') => self.nested(Self::list).map(Value::List),
            Some(found) => Err(Error::UnexpectedChar {
                found: char::from(found),
                offset: self.pos,
            }),
            None => Err(Error::UnexpectedEnd(self.pos)),
        }
    }

    /// Parses a tuple or a list, one level deeper.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::TooDeep(self.pos));
        }

        self.depth += 1;
        let res = parse(self);
        self.depth -= 1;

        res
    }

    /// `"{}" | "{" result ( "," result )* "}"`
    fn tuple(&mut self) -> Result<Fields> {
        self.expect(b'{')?;

        let mut fields = Fields::new();

        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(fields);
        }

        loop {
            let (name, value) = self.result()?;
            fields.push(name, value);

            match self.bump()? {
                b',' => continue,
                b'}' => break Ok(fields),
                found => {
                    break Err(Error::UnexpectedChar {
                        found: char::from(found),
                        offset: self.pos - 1,
                    });
                }
            }
        }
    }

    /// `"[]" | "[" value ( "," value )* "]" | "[" result ( "," result )* "]"`
    fn list(&mut self) -> Result<List> {
        self.expect(b'[')?;

        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(List::Values(Vec::new()));
        }

        let is_value_list = matches!(self.peek(), Some(b'"' | b'{' | b'['));

        let mut values = Vec::new();
        let mut fields = Fields::new();

        loop {
            if is_value_list {
                values.push(self.value()?);
            } else {
                let (name, value) = self.result()?;
                fields.push(name, value);
            }

            match self.bump()? {
                b',' => continue,
                b']' => break,
                found => {
                    return Err(Error::UnexpectedChar {
                        found: char::from(found),
                        offset: self.pos - 1,
                    });
                }
            }
        }

        if is_value_list {
            Ok(List::Values(values))
        } else {
            Ok(List::Results(fields))
        }
    }

    /// Quoted C-string, unescaped.
    fn c_string(&mut self) -> Result<String> {
        self.expect(b'"')?;

        let mut bytes = Vec::new();

        loop {
            match self.bump()? {
                b'"' => break,
                b'\\' => {
                    let escape_pos = self.pos - 1;
                    let c = self.bump()?;
                    match c {
                        b'n' => bytes.push(b'\n'),
                        b't' => bytes.push(b'\t'),
                        b'r' => bytes.push(b'\r'),
                        b'a' => bytes.push(0x07),
                        b'b' => bytes.push(0x08),
                        b'f' => bytes.push(0x0c),
                        b'v' => bytes.push(0x0b),
                        b'e' => bytes.push(0x1b),
                        b'0'..=b'7' => {
                            let mut code = u32::from(c - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        code = code * 8 + u32::from(d - b'0');
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            let byte =
                                u8::try_from(code).map_err(|_| Error::InvalidEscape(escape_pos))?;
                            bytes.push(byte);
                        }
                        // `\"`, `\\`, `\'` and unknown escapes map to the escaped character
                        other => bytes.push(other),
                    }
                }
                c => bytes.push(c),
            }
        }

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
