//! printf-style numeric format specs (`%.1f`, `%03.0f`, `%s`, ...).
//!
//! A spec holds exactly one conversion and no surrounding text, because its
//! output is written verbatim as a line protocol field value.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("Invalid format spec '{0}': expected a single %[flags][width][.precision]conversion")]
    InvalidSpec(String),
    #[error("Value {0} is not finite")]
    NonFinite(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    Fixed,
    Exponent { upper: bool },
    General { upper: bool },
    Integer,
    Shortest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSpec {
    source: String,
    left_align: bool,
    plus: bool,
    space: bool,
    zero_pad: bool,
    alternate: bool,
    width: usize,
    precision: Option<usize>,
    conversion: Conversion,
}

fn spec_regex() -> &'static Regex {
    static SPEC: OnceLock<Regex> = OnceLock::new();
    SPEC.get_or_init(|| {
        Regex::new(r"^%([-+ 0#]*)([0-9]+)?(?:\.([0-9]*))?([fFeEgGdis])$")
            .unwrap_or_else(|_| unreachable!("format spec pattern is a valid regex"))
    })
}

impl FormatSpec {
    /// The generic `%s` formatter: shortest round-trip representation.
    pub fn shortest() -> Self {
        Self {
            source: "%s".to_string(),
            left_align: false,
            plus: false,
            space: false,
            zero_pad: false,
            alternate: false,
            width: 0,
            precision: None,
            conversion: Conversion::Shortest,
        }
    }

    pub fn parse(spec: &str) -> Result<Self, FormatError> {
        let caps = spec_regex()
            .captures(spec.trim())
            .ok_or_else(|| FormatError::InvalidSpec(spec.to_string()))?;

        let flags = caps.get(1).map_or("", |m| m.as_str());
        let width = match caps.get(2) {
            Some(m) => m
                .as_str()
                .parse()
                .map_err(|_| FormatError::InvalidSpec(spec.to_string()))?,
            None => 0,
        };
        // "%.f" means precision zero, like C.
        let precision = match caps.get(3) {
            Some(m) if m.as_str().is_empty() => Some(0),
            Some(m) => Some(
                m.as_str()
                    .parse()
                    .map_err(|_| FormatError::InvalidSpec(spec.to_string()))?,
            ),
            None => None,
        };
        let conversion = match caps.get(4).map_or("", |m| m.as_str()) {
            "f" | "F" => Conversion::Fixed,
            "e" => Conversion::Exponent { upper: false },
            "E" => Conversion::Exponent { upper: true },
            "g" => Conversion::General { upper: false },
            "G" => Conversion::General { upper: true },
            "d" | "i" => Conversion::Integer,
            "s" => Conversion::Shortest,
            _ => return Err(FormatError::InvalidSpec(spec.to_string())),
        };

        Ok(Self {
            source: spec.trim().to_string(),
            left_align: flags.contains('-'),
            plus: flags.contains('+'),
            space: flags.contains(' '),
            zero_pad: flags.contains('0'),
            alternate: flags.contains('#'),
            width,
            precision,
            conversion,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn apply(&self, value: f64) -> Result<String, FormatError> {
        if !value.is_finite() {
            return Err(FormatError::NonFinite(value));
        }

        let (negative, digits) = match self.conversion {
            Conversion::Fixed => {
                let prec = self.precision.unwrap_or(6);
                let mut body = format!("{:.*}", prec, value.abs());
                if self.alternate && prec == 0 {
                    body.push('.');
                }
                (value.is_sign_negative(), body)
            }
            Conversion::Exponent { upper } => {
                let body = c_exponent(value.abs(), self.precision.unwrap_or(6), upper);
                (value.is_sign_negative(), body)
            }
            Conversion::General { upper } => {
                let body = c_general(value.abs(), self.precision.unwrap_or(6), upper, self.alternate);
                (value.is_sign_negative(), body)
            }
            Conversion::Integer => {
                let truncated = value.trunc() as i64;
                (truncated < 0, truncated.unsigned_abs().to_string())
            }
            Conversion::Shortest => (value.is_sign_negative(), format!("{}", value.abs())),
        };

        let sign = if negative {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        };

        Ok(self.pad(sign, &digits))
    }

    fn pad(&self, sign: &str, digits: &str) -> String {
        let len = sign.len() + digits.len();
        if len >= self.width {
            return format!("{sign}{digits}");
        }
        let fill = self.width - len;
        if self.left_align {
            format!("{sign}{digits}{}", " ".repeat(fill))
        } else if self.zero_pad && self.conversion != Conversion::Shortest {
            format!("{sign}{}{digits}", "0".repeat(fill))
        } else {
            format!("{}{sign}{digits}", " ".repeat(fill))
        }
    }
}

impl Default for FormatSpec {
    fn default() -> Self {
        Self::shortest()
    }
}

impl FromStr for FormatSpec {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// Rust prints `7.25e1`; C prints `7.25e+01`.
fn c_exponent(value: f64, precision: usize, upper: bool) -> String {
    let rust = format!("{:.*e}", precision, value);
    let (mantissa, exponent) = rust.split_once('e').unwrap_or((rust.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    let marker = if upper { 'E' } else { 'e' };
    format!("{mantissa}{marker}{sign}{:02}", exponent.unsigned_abs())
}

fn c_general(value: f64, precision: usize, upper: bool, alternate: bool) -> String {
    let precision = precision.max(1);
    let exponent = if value == 0.0 {
        0
    } else {
        let rounded = format!("{:.*e}", precision - 1, value);
        rounded
            .split_once('e')
            .and_then(|(_, exp)| exp.parse::<i32>().ok())
            .unwrap_or(0)
    };

    if exponent < -4 || exponent >= precision as i32 {
        let body = c_exponent(value, precision - 1, upper);
        if alternate {
            return body;
        }
        let marker = if upper { 'E' } else { 'e' };
        match body.split_once(marker) {
            Some((mantissa, exp)) => format!("{}{marker}{exp}", strip_zeros(mantissa)),
            None => body,
        }
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        let body = format!("{:.*}", decimals, value);
        if alternate { body } else { strip_zeros(&body).to_string() }
    }
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
