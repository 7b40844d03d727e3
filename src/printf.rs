//! C-style formatted output.
//!
//! Renders printf templates such as `"found minimum at f(%g,%g) = %0.10g\n"` with the same
//! bytes C's `vfprintf` would produce for the supported conversions. Log files written by
//! the example routines depend on this, so `%g` notation switching, exponent shape and
//! padding rules follow C exactly.
//!
//! # Example
//!
//! ```
//! use hostfuncs::printf::{format, Arg};
//!
//! let text = format("value = %5.2f, n = %2d", &[Arg::from(3.14159), Arg::from(7)]).unwrap();
//! assert_eq!(text, "value =  3.14, n =  7");
//! ```

use std::borrow::Cow;

use crate::errors::FormatError;

/// A single positional argument for [`format`].
#[derive(Debug, Clone, PartialEq)]
pub enum Arg<'a> {
    Int(i64),
    UInt(u64),
    Double(f64),
    Str(Cow<'a, str>),
    Char(char),
}

macro_rules! impl_from_int {
    ($variant:ident, $target:ty, $($t:ty),*) => {
        $(
            impl From<$t> for Arg<'_> {
                fn from(value: $t) -> Self {
                    Arg::$variant(value as $target)
                }
            }
        )*
    };
}

impl_from_int!(Int, i64, i8, i16, i32, i64, isize);
impl_from_int!(UInt, u64, u8, u16, u32, u64, usize);

impl From<f64> for Arg<'_> {
    fn from(value: f64) -> Self {
        Arg::Double(value)
    }
}

impl From<f32> for Arg<'_> {
    fn from(value: f32) -> Self {
        Arg::Double(value as f64)
    }
}

impl From<char> for Arg<'_> {
    fn from(value: char) -> Self {
        Arg::Char(value)
    }
}

impl From<bool> for Arg<'_> {
    fn from(value: bool) -> Self {
        Arg::Str(Cow::Borrowed(if value { "true" } else { "false" }))
    }
}

impl<'a> From<&'a str> for Arg<'a> {
    fn from(value: &'a str) -> Self {
        Arg::Str(Cow::Borrowed(value))
    }
}

impl<'a> From<&'a String> for Arg<'a> {
    fn from(value: &'a String) -> Self {
        Arg::Str(Cow::Borrowed(value.as_str()))
    }
}

impl From<String> for Arg<'_> {
    fn from(value: String) -> Self {
        Arg::Str(Cow::Owned(value))
    }
}

/// Parsed `%[flags][width][.precision][length]conversion` directive.
#[derive(Debug, Default, Clone, Copy)]
struct Directive {
    left: bool,
    plus: bool,
    space: bool,
    alt: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
    conversion: char,
}

/// Walks the argument list, keeping track of positions for error messages.
struct Args<'s, 'a> {
    args: &'s [Arg<'a>],
    next: usize,
}

impl<'s, 'a> Args<'s, 'a> {
    fn take(&mut self) -> Result<(usize, &'s Arg<'a>), FormatError> {
        let index = self.next;
        let arg = self
            .args
            .get(index)
            .ok_or(FormatError::MissingArgument { index })?;
        self.next += 1;
        Ok((index, arg))
    }

    fn take_star(&mut self) -> Result<i64, FormatError> {
        match self.take()? {
            (_, Arg::Int(v)) => Ok(*v),
            (_, Arg::UInt(v)) => Ok(*v as i64),
            (index, _) => Err(FormatError::ArgumentMismatch {
                index,
                conversion: '*',
            }),
        }
    }
}

/// Renders `template` with `args` following C's `printf` rules.
///
/// Supported conversions are `d i u o x X f F e E g G s c %`. Flags, `*` width and
/// precision, and length modifiers (ignored) are accepted. Arguments left over after the
/// template is consumed are ignored, as in C.
///
/// # Errors
/// Returns a [`FormatError`] for missing or mismatched arguments, unknown conversions and
/// templates that end inside a directive.
pub fn format(template: &str, args: &[Arg<'_>]) -> Result<String, FormatError> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut args = Args { args, next: 0 };
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut d = Directive::default();

        // flags
        while let Some(&f) = chars.peek() {
            match f {
                '-' => d.left = true,
                '+' => d.plus = true,
                ' ' => d.space = true,
                '#' => d.alt = true,
                '0' => d.zero = true,
                _ => break,
            }
            chars.next();
        }

        // width
        if chars.peek() == Some(&'*') {
            chars.next();
            let w = args.take_star()?;
            if w < 0 {
                d.left = true;
            }
            d.width = bounded(w.unsigned_abs())?;
        } else {
            d.width = bounded(read_number(&mut chars))?;
        }

        // precision
        if chars.peek() == Some(&'.') {
            chars.next();
            if chars.peek() == Some(&'*') {
                chars.next();
                let p = args.take_star()?;
                d.precision = if p >= 0 {
                    Some(bounded(p.unsigned_abs())?)
                } else {
                    None
                };
            } else {
                d.precision = Some(bounded(read_number(&mut chars))?);
            }
        }

        // length modifiers carry no meaning for typed arguments
        while let Some(&l) = chars.peek() {
            if matches!(l, 'h' | 'l' | 'L' | 'q' | 'j' | 'z' | 't') {
                chars.next();
            } else {
                break;
            }
        }

        d.conversion = chars.next().ok_or(FormatError::IncompleteDirective)?;
        render(&d, &mut args, &mut out)?;
    }

    Ok(out)
}

fn read_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> u64 {
    let mut n = 0u64;
    while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
        n = n.saturating_mul(10).saturating_add(u64::from(digit));
        chars.next();
    }
    n
}

/// Widths and precisions are capped at C's `INT_MAX`.
fn bounded(n: u64) -> Result<usize, FormatError> {
    match usize::try_from(n) {
        Ok(n) if n <= i32::MAX as usize => Ok(n),
        _ => Err(FormatError::FieldTooLarge(n)),
    }
}

fn render(d: &Directive, args: &mut Args<'_, '_>, out: &mut String) -> Result<(), FormatError> {
    let conversion = d.conversion;
    let mismatch = |index| FormatError::ArgumentMismatch { index, conversion };

    match conversion {
        '%' => out.push('%'),
        'd' | 'i' => {
            let (index, arg) = args.take()?;
            let value = match arg {
                Arg::Int(v) => *v,
                Arg::UInt(v) => *v as i64,
                Arg::Char(c) => *c as i64,
                _ => return Err(mismatch(index)),
            };
            out.push_str(&format_signed(value, d));
        }
        'u' | 'o' | 'x' | 'X' => {
            let (index, arg) = args.take()?;
            let value = match arg {
                Arg::UInt(v) => *v,
                Arg::Int(v) => *v as u64,
                Arg::Char(c) => *c as u64,
                _ => return Err(mismatch(index)),
            };
            out.push_str(&format_unsigned(value, d));
        }
        'f' | 'F' | 'e' | 'E' | 'g' | 'G' => {
            let (index, arg) = args.take()?;
            let value = match arg {
                Arg::Double(v) => *v,
                _ => return Err(mismatch(index)),
            };
            out.push_str(&format_float(value, d));
        }
        's' => {
            let (index, arg) = args.take()?;
            let text = match arg {
                Arg::Str(s) => s.as_ref(),
                _ => return Err(mismatch(index)),
            };
            let text: Cow<'_, str> = match d.precision {
                Some(p) => Cow::Owned(text.chars().take(p).collect()),
                None => Cow::Borrowed(text),
            };
            out.push_str(&pad(&text, d.width, d.left));
        }
        'c' => {
            let (index, arg) = args.take()?;
            let c = match arg {
                Arg::Char(c) => *c,
                Arg::Int(v) => char::from(*v as u8),
                Arg::UInt(v) => char::from(*v as u8),
                _ => return Err(mismatch(index)),
            };
            out.push_str(&pad(&c.to_string(), d.width, d.left));
        }
        other => return Err(FormatError::UnsupportedConversion(other)),
    }
    Ok(())
}

/// Pads with spaces to `width`, on the right when `left` is set.
fn pad(text: &str, width: usize, left: bool) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let fill = " ".repeat(width - len);
    if left {
        format!("{text}{fill}")
    } else {
        format!("{fill}{text}")
    }
}

/// Assembles sign, prefix and digits, zero padding between prefix and digits when allowed.
fn pad_numeric(sign: &str, prefix: &str, body: &str, d: &Directive, zero_ok: bool) -> String {
    let len = sign.len() + prefix.len() + body.len();
    if len >= d.width {
        return format!("{sign}{prefix}{body}");
    }
    let fill = d.width - len;
    if d.left {
        format!("{sign}{prefix}{body}{}", " ".repeat(fill))
    } else if d.zero && zero_ok {
        format!("{sign}{prefix}{}{body}", "0".repeat(fill))
    } else {
        format!("{}{sign}{prefix}{body}", " ".repeat(fill))
    }
}

fn apply_int_precision(digits: String, precision: Option<usize>, is_zero: bool) -> String {
    match precision {
        Some(0) if is_zero => String::new(),
        Some(p) if digits.len() < p => format!("{}{digits}", "0".repeat(p - digits.len())),
        _ => digits,
    }
}

fn sign_of(negative: bool, d: &Directive) -> &'static str {
    if negative {
        "-"
    } else if d.plus {
        "+"
    } else if d.space {
        " "
    } else {
        ""
    }
}

fn format_signed(value: i64, d: &Directive) -> String {
    let magnitude = value.unsigned_abs();
    let digits = apply_int_precision(magnitude.to_string(), d.precision, magnitude == 0);
    pad_numeric(
        sign_of(value < 0, d),
        "",
        &digits,
        d,
        d.precision.is_none(),
    )
}

fn format_unsigned(value: u64, d: &Directive) -> String {
    let (digits, prefix) = match d.conversion {
        'o' => (format!("{value:o}"), ""),
        'x' => (format!("{value:x}"), if d.alt && value != 0 { "0x" } else { "" }),
        'X' => (format!("{value:X}"), if d.alt && value != 0 { "0X" } else { "" }),
        _ => (value.to_string(), ""),
    };
    let mut digits = apply_int_precision(digits, d.precision, value == 0);
    if d.conversion == 'o' && d.alt && !digits.starts_with('0') {
        digits.insert(0, '0');
    }
    pad_numeric("", prefix, &digits, d, d.precision.is_none())
}

fn format_float(value: f64, d: &Directive) -> String {
    let upper = d.conversion.is_ascii_uppercase();
    let sign = sign_of(value.is_sign_negative(), d);

    if !value.is_finite() {
        let body = match (value.is_nan(), upper) {
            (true, false) => "nan",
            (true, true) => "NAN",
            (false, false) => "inf",
            (false, true) => "INF",
        };
        return pad_numeric(sign, "", body, d, false);
    }

    let magnitude = value.abs();
    let body = match d.conversion.to_ascii_lowercase() {
        'f' => fixed(magnitude, d.precision.unwrap_or(6), d.alt),
        'e' => exponential(magnitude, d.precision.unwrap_or(6), upper, d.alt),
        _ => general(magnitude, d.precision, upper, d.alt),
    };
    pad_numeric(sign, "", &body, d, true)
}

fn fixed(magnitude: f64, precision: usize, alt: bool) -> String {
    let mut s = format!("{magnitude:.precision$}");
    if alt && precision == 0 {
        s.push('.');
    }
    s
}

/// Splits Rust's `{:e}` output into mantissa and decimal exponent.
fn rust_exponential(magnitude: f64, precision: usize) -> (String, i32) {
    let s = format!("{magnitude:.precision$e}");
    match s.split_once('e') {
        Some((mantissa, exp)) => (mantissa.to_string(), exp.parse().unwrap_or(0)),
        None => (s, 0),
    }
}

fn exponential(magnitude: f64, precision: usize, upper: bool, alt: bool) -> String {
    let (mut mantissa, exp) = rust_exponential(magnitude, precision);
    if alt && precision == 0 {
        mantissa.push('.');
    }
    join_exponent(&mantissa, exp, upper)
}

fn join_exponent(mantissa: &str, exp: i32, upper: bool) -> String {
    format!(
        "{mantissa}{}{}{:02}",
        if upper { 'E' } else { 'e' },
        if exp < 0 { '-' } else { '+' },
        exp.unsigned_abs()
    )
}

/// `%g`: fixed notation when `-4 <= X < P`, exponential otherwise, where `X` is the
/// exponent after rounding to `P` significant digits.
fn general(magnitude: f64, precision: Option<usize>, upper: bool, alt: bool) -> String {
    let p = match precision {
        Some(0) => 1,
        Some(p) => p,
        None => 6,
    };

    let exp = if magnitude == 0.0 {
        0
    } else {
        rust_exponential(magnitude, p - 1).1
    };

    if exp >= -4 && (exp as i64) < p as i64 {
        let decimals = (p as i64 - 1 - exp as i64) as usize;
        let s = fixed(magnitude, decimals, alt);
        if alt {
            s
        } else {
            strip_fraction_zeros(&s).to_string()
        }
    } else {
        let (mantissa, exp) = rust_exponential(magnitude, p - 1);
        let mantissa = if alt {
            if mantissa.contains('.') {
                mantissa
            } else {
                format!("{mantissa}.")
            }
        } else {
            strip_fraction_zeros(&mantissa).to_string()
        };
        join_exponent(&mantissa, exp, upper)
    }
}

fn strip_fraction_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
