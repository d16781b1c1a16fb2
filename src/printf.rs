//! printf-style formatting of a single numeric value, as used by the
//! `format` attribute of numeric iterators (e.g. "%d", "%03d", "%.2f",
//! "year-%d").
use crate::errors::Error;
use std::iter::Peekable;
use std::str::Chars;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_float(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn as_int(self) -> i64 {
        match self {
            Number::Int(i) => i,
            Number::Float(f) => f.trunc() as i64,
        }
    }
}

#[derive(Default)]
struct Conversion {
    left_align: bool,
    zero_pad: bool,
    plus_sign: bool,
    space_sign: bool,
    width: usize,
    precision: Option<usize>,
}

impl Conversion {
    /// Combine sign and digits, and pad to the requested width
    fn pad(&self, negative: bool, digits: String) -> String {
        let sign = if negative {
            "-"
        } else if self.plus_sign {
            "+"
        } else if self.space_sign {
            " "
        } else {
            ""
        };
        let len = sign.len() + digits.chars().count();
        if len >= self.width {
            return format!("{}{}", sign, digits);
        }
        let fill = self.width - len;
        if self.left_align {
            format!("{}{}{}", sign, digits, " ".repeat(fill))
        } else if self.zero_pad {
            format!("{}{}{}", sign, "0".repeat(fill), digits)
        } else {
            format!("{}{}{}", " ".repeat(fill), sign, digits)
        }
    }
}

fn invalid(format: &str, reason: &str) -> Error {
    Error::InvalidFormat {
        format: format.to_string(),
        reason: reason.to_string(),
    }
}

/// Exponent notation the way C prints it: at least two digits in the
/// exponent, always signed.
fn exponent(value: f64, precision: usize, upper: bool) -> String {
    let s = format!("{:.*e}", precision, value);
    let (mantissa, exp) = s.split_once('e').unwrap_or((s.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let e = if upper { 'E' } else { 'e' };
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{}{}{}{:02}", mantissa, e, sign, exp.abs())
}

/// Larger widths and precisions are rejected rather than padded
const MAX_COUNT: usize = 1000;

fn scan_count(
    chars: &mut Peekable<Chars>,
    format: &str,
    what: &str,
) -> Result<usize, Error> {
    let mut count: usize = 0;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        count = count
            .checked_mul(10)
            .and_then(|c| c.checked_add(d as usize))
            .filter(|c| *c <= MAX_COUNT)
            .ok_or_else(|| invalid(format, &format!("{} too large", what)))?;
        chars.next();
    }
    Ok(count)
}

/// Format the value with a printf-like pattern, which must contain exactly
/// one conversion.
pub fn format_number(format: &str, value: Number) -> Result<String, Error> {
    let mut result = String::new();
    let mut conversions = 0;
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            result.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            result.push('%');
            continue;
        }

        let mut conv = Conversion::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => conv.left_align = true,
                '0' => conv.zero_pad = true,
                '+' => conv.plus_sign = true,
                ' ' => conv.space_sign = true,
                '#' => {}
                _ => break,
            }
            chars.next();
        }
        conv.width = scan_count(&mut chars, format, "width")?;
        if chars.peek() == Some(&'.') {
            chars.next();
            conv.precision = Some(scan_count(&mut chars, format, "precision")?);
        }

        conversions += 1;
        let formatted = match chars.next() {
            Some('d' | 'i' | 'u') => {
                let v = value.as_int();
                conv.pad(v < 0, v.unsigned_abs().to_string())
            }
            Some(ch @ ('f' | 'F')) => {
                let v = value.as_float();
                let digits =
                    format!("{:.*}", conv.precision.unwrap_or(6), v.abs());
                let digits = if ch == 'F' {
                    digits.to_uppercase()
                } else {
                    digits
                };
                conv.pad(v.is_sign_negative() && v != 0.0, digits)
            }
            Some(ch @ ('e' | 'E')) => {
                let v = value.as_float();
                let digits = exponent(
                    v.abs(),
                    conv.precision.unwrap_or(6),
                    ch == 'E',
                );
                conv.pad(v.is_sign_negative() && v != 0.0, digits)
            }
            Some(ch @ ('x' | 'X' | 'o')) => {
                let v = value.as_int();
                let a = v.unsigned_abs();
                let digits = match ch {
                    'x' => format!("{:x}", a),
                    'X' => format!("{:X}", a),
                    _ => format!("{:o}", a),
                };
                conv.pad(v < 0, digits)
            }
            Some('s') => {
                let s = match value {
                    Number::Int(i) => i.to_string(),
                    Number::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                        format!("{:.1}", f)
                    }
                    Number::Float(f) => f.to_string(),
                };
                let (negative, digits) = match s.strip_prefix('-') {
                    Some(d) => (true, d.to_string()),
                    None => (false, s),
                };
                conv.pad(negative, digits)
            }
            Some(c) => {
                return Err(invalid(
                    format,
                    &format!("unsupported conversion '%{}'", c),
                ))
            }
            None => return Err(invalid(format, "incomplete conversion")),
        };
        result.push_str(&formatted);
    }

    if conversions != 1 {
        return Err(invalid(format, "expected exactly one conversion"));
    }
    Ok(result)
}
