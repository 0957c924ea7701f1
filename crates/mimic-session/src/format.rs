use std::collections::HashMap;
use std::fmt;

/// How a variable value is displayed.
///
/// Only values that the backend reports as plain decimal integers can be
/// displayed in another format. Other values (pointers, structures,
/// characters, floats...) keep their native representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayFormat {
    /// Decimal integer.
    Dec,
    /// Hexadecimal integer.
    Hex,
    /// Binary integer.
    Bin,
    /// Character.
    Char,
    /// Representation chosen by the backend.
    Native,
}

impl DisplayFormat {
    /// Infers the format of a value reported by the backend.
    pub fn infer(value: &str) -> Self {
        if value.starts_with("0x") {
            Self::Hex
        } else if value.contains('\'') {
            Self::Char
        } else if value.parse::<i64>().is_ok() {
            Self::Dec
        } else {
            Self::Native
        }
    }

    /// Next format of the Dec, Hex, Bin, Char cycle.
    pub const fn next(self) -> Self {
        match self {
            Self::Dec => Self::Hex,
            Self::Hex => Self::Bin,
            Self::Bin => Self::Char,
            Self::Char => Self::Dec,
            Self::Native => Self::Native,
        }
    }

    /// Renders an integer in this format.
    ///
    /// Hexadecimal and binary digits are zero-padded and grouped by four.
    ///
    /// ```
    /// use mimic_session::DisplayFormat;
    ///
    /// assert_eq!(DisplayFormat::Hex.render(0x12345), "0x0001_2345");
    /// assert_eq!(DisplayFormat::Bin.render(5), "0b0000_0101");
    /// assert_eq!(DisplayFormat::Char.render(65), "'A'");
    /// ```
    pub fn render(self, value: i64) -> String {
        match self {
            Self::Dec | Self::Native => value.to_string(),
            Self::Hex => {
                let mut digits = format!("{:x}", value as u64);

                while digits.len() % 4 != 0 && digits.len() > 4 {
                    digits.insert(0, '0');
                }
                if digits.len() % 2 != 0 {
                    digits.insert(0, '0');
                }

                format!("0x{}", group_by_four(&digits))
            }
            Self::Bin => {
                let mut digits = String::new();
                let mut rest = value;

                loop {
                    digits.insert(0, if rest & 1 == 1 { '1' } else { '0' });
                    rest >>= 1;

                    if rest <= 0 && digits.len() % 8 == 0 {
                        break;
                    }
                }

                format!("0b{}", group_by_four(&digits))
            }
            Self::Char => match u8::try_from(value) {
                Ok(c) if c.is_ascii_graphic() => format!("'{}'", char::from(c)),
                _ => "' '".to_owned(),
            },
        }
    }

    /// Renders a raw backend value in this format.
    ///
    /// Values which are not decimal integers are returned unchanged.
    pub fn display(self, raw: &str) -> String {
        match self {
            Self::Dec | Self::Native => raw.to_owned(),
            format => raw
                .parse::<i64>()
                .map(|value| format.render(value))
                .unwrap_or_else(|_| raw.to_owned()),
        }
    }
}

impl fmt::Display for DisplayFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dec => "dec",
            Self::Hex => "hex",
            Self::Bin => "bin",
            Self::Char => "char",
            Self::Native => "native",
        })
    }
}

fn group_by_four(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 4);

    for (i, c) in digits.chars().enumerate() {
        grouped.push(c);

        if i % 4 == 3 && i + 1 != digits.len() {
            grouped.push('_');
        }
    }

    grouped
}

/// Display settings of a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayInfo {
    /// Value as reported by the backend.
    pub original_value: String,

    /// Format the backend reported the value in.
    pub original_format: DisplayFormat,

    /// Format the value is displayed in.
    pub format: DisplayFormat,
}

/// Display settings of variables, keyed by variable name.
///
/// Settings outlive the values: a local variable keeps its format across
/// stops, as long as its name stays the same.
#[derive(Debug, Default)]
pub struct FormatCache {
    entries: HashMap<String, DisplayInfo>,
}

impl FormatCache {
    /// Records a new value of a variable, and returns its display format.
    pub fn observe(&mut self, name: &str, value: &str) -> DisplayFormat {
        match self.entries.get_mut(name) {
            Some(info) => {
                info.original_value = value.to_owned();
                info.format
            }
            None => {
                let format = DisplayFormat::infer(value);

                self.entries.insert(
                    name.to_owned(),
                    DisplayInfo {
                        original_value: value.to_owned(),
                        original_format: format,
                        format,
                    },
                );

                format
            }
        }
    }

    /// Advances the display format of a variable, and returns its new
    /// rendering.
    ///
    /// Returns `None` if the variable is unknown, and the original value if
    /// it cannot be displayed in another format.
    pub fn cycle(&mut self, name: &str) -> Option<String> {
        let info = self.entries.get_mut(name)?;

        if info.original_format != DisplayFormat::Dec {
            return Some(info.original_value.clone());
        }

        info.format = info.format.next();

        Some(info.format.display(&info.original_value))
    }

    /// Returns the display settings of a variable.
    pub fn get(&self, name: &str) -> Option<&DisplayInfo> {
        self.entries.get(name)
    }

    /// Forgets the display settings of a variable.
    pub fn remove(&mut self, name: &str) -> Option<DisplayInfo> {
        self.entries.remove(name)
    }

    /// Number of variables with display settings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no variable has display settings.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
