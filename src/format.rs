//! Number formats for legend and tooltip labels.
//!
//! Formats are written with the specifier mini-language of d3:
//! `[sign][$][,][.precision][type]`, e.g. `"$,.2f"` or `",.1%"`, and
//! follow d3 (version 3) rounding rules.  The most common ones are
//! registered under a name, see [`NumberFormat::lookup`].

use std::collections::HashMap;
use std::fmt;
use lazy_static::lazy_static;
use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Sign { Minus, Plus, Space }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    /// No type: shortest representation.
    Shortest,
    /// `f`
    Fixed,
    /// `e`
    Exponent,
    /// `g`
    Significant,
    /// `r`: rounded to significant digits, never in exponent notation.
    Rounded,
    /// `d`
    Integer,
    /// `%`: multiply by 100, fixed.
    Percent,
    /// `p`: multiply by 100, rounded.
    PercentRounded,
    /// `s`: SI prefix, rounded.
    Si,
}

/// A parsed number format.
///
/// ```
/// use choropleth::NumberFormat;
/// let f = NumberFormat::parse("$,.2f").unwrap();
/// assert_eq!(f.format(1234.5), "$1,234.50");
/// let f = NumberFormat::lookup("thousands").unwrap();
/// assert_eq!(f.format(82_500.), "$82.5k");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NumberFormat {
    spec: String,
    sign: Sign,
    currency: bool,
    comma: bool,
    precision: Option<usize>,
    kind: Kind,
}

const SI_PREFIXES: [&str; 17] = ["y", "z", "a", "f", "p", "n", "µ", "m", "",
                                 "k", "M", "G", "T", "P", "E", "Z", "Y"];

fn preset(spec: &str, currency: bool, comma: bool, precision: Option<usize>,
          kind: Kind) -> NumberFormat {
    NumberFormat { spec: spec.to_string(), sign: Sign::Minus, currency, comma,
                   precision, kind }
}

lazy_static! {
    static ref PRESETS: HashMap<&'static str, NumberFormat> = {
        use Kind::*;
        HashMap::from([
            ("percentage", preset("%", false, false, None, Percent)),
            ("percentageWithDecimals", preset(",.1%", false, true, Some(1), Percent)),
            ("dollars", preset("$,", true, true, None, Shortest)),
            ("dollarsAndCents", preset("$,.2f", true, true, Some(2), Fixed)),
            ("tens", preset("$,.4r", true, true, Some(4), Rounded)),
            ("hundreds", preset("$,.5r", true, true, Some(5), Rounded)),
            ("thousands", preset("$s", true, false, None, Si)),
        ])
    };
}

impl NumberFormat {
    /// Parse a format specifier.  Fill, alignment, width, zero
    /// padding and the radix types are not supported.
    pub fn parse(spec: &str) -> Result<Self> {
        let err = |reason| Error::InvalidFormat { spec: spec.to_string(), reason };
        let chars: Vec<char> = spec.chars().collect();
        if chars.iter().take(2).any(|c| matches!(c, '<' | '>' | '^' | '=')) {
            return Err(err("fill and alignment are not supported"))
        }
        let mut i = 0;
        let sign = match chars.first() {
            Some('+') => { i += 1; Sign::Plus }
            Some(' ') => { i += 1; Sign::Space }
            Some('-') => { i += 1; Sign::Minus }
            _ => Sign::Minus,
        };
        let currency = chars.get(i) == Some(&'$');
        if currency { i += 1 }
        match chars.get(i) {
            Some('#') => return Err(err("the # flag is not supported")),
            Some('0') => return Err(err("zero padding is not supported")),
            Some(c) if c.is_ascii_digit() => return Err(err("width is not supported")),
            _ => (),
        }
        let comma = chars.get(i) == Some(&',');
        if comma { i += 1 }
        let mut precision = None;
        if chars.get(i) == Some(&'.') {
            i += 1;
            let start = i;
            while chars.get(i).is_some_and(|c| c.is_ascii_digit()) { i += 1 }
            if i == start { return Err(err("missing precision after '.'")) }
            let digits: String = chars[start .. i].iter().collect();
            precision = Some(digits.parse().map_err(|_| err("precision too large"))?);
        }
        let mut kind = match chars.get(i) {
            None => Kind::Shortest,
            Some('f') => Kind::Fixed,
            Some('e') => Kind::Exponent,
            Some('g') => Kind::Significant,
            Some('r') => Kind::Rounded,
            Some('d') => Kind::Integer,
            Some('%') => Kind::Percent,
            Some('p') => Kind::PercentRounded,
            Some('s') => Kind::Si,
            Some(_) => return Err(err("unsupported type")),
        };
        if i < chars.len() { i += 1 }
        if i != chars.len() { return Err(err("trailing characters")) }
        // Without precision, `r` falls back to the shortest notation.
        if kind == Kind::Rounded && precision.unwrap_or(0) == 0 {
            kind = Kind::Significant;
            precision = None;
        }
        precision = match kind {
            Kind::Significant => precision.map(|p| p.clamp(1, 21)),
            Kind::Fixed | Kind::Exponent | Kind::Percent => precision.map(|p| p.min(20)),
            Kind::Integer => Some(0),
            _ => precision,
        };
        Ok(NumberFormat { spec: spec.to_string(), sign, currency, comma,
                          precision, kind })
    }

    /// Return the format registered under `name` or, if there is
    /// none, parse `name` as a specifier.
    ///
    /// Registered names: `percentage` (`%`), `percentageWithDecimals`
    /// (`,.1%`), `dollars` (`$,`), `dollarsAndCents` (`$,.2f`),
    /// `tens` (`$,.4r`), `hundreds` (`$,.5r`) and `thousands` (`$s`).
    pub fn lookup(name: &str) -> Result<Self> {
        match PRESETS.get(name) {
            Some(f) => Ok(f.clone()),
            None => Self::parse(name),
        }
    }

    /// The specifier this format was parsed from.
    pub fn spec(&self) -> &str { &self.spec }

    pub fn format(&self, x: f64) -> String {
        if x.is_nan() { return "NaN".to_string() }
        if self.kind == Kind::Integer && x.fract() != 0. { return String::new() }
        let negative = x < 0. || (x == 0. && x.is_sign_negative());
        let sign = if negative { "-" } else {
            match self.sign { Sign::Minus => "", Sign::Plus => "+", Sign::Space => " " }
        };
        let mut value = x.abs();
        let mut suffix = "";
        match self.kind {
            Kind::Percent | Kind::PercentRounded => value *= 100.,
            Kind::Si => {
                let (e, symbol) = si_prefix(value, self.precision);
                if e >= 0 { value /= 10f64.powi(e) } else { value *= 10f64.powi(-e) }
                suffix = symbol;
            }
            _ => (),
        }
        let mut body = match self.kind {
            Kind::Shortest => shortest(value),
            Kind::Fixed | Kind::Percent => fixed(value, self.precision.unwrap_or(0)),
            Kind::Exponent => exponential(value, self.precision),
            Kind::Significant => match self.precision {
                Some(p) => significant(value, p),
                None => shortest(value),
            },
            Kind::Rounded | Kind::PercentRounded | Kind::Si => match self.precision {
                Some(p) if p > 0 => rounded(value, p),
                _ => shortest(value),
            },
            Kind::Integer => fixed(value, 0),
        };
        if self.comma { body = group(&body) }
        let percent = matches!(self.kind, Kind::Percent | Kind::PercentRounded);
        format!("{sign}{}{body}{suffix}{}", if self.currency { "$" } else { "" },
                if percent { "%" } else { "" })
    }
}

impl fmt::Display for NumberFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}

/// Exponent (a multiple of 3) and symbol of the SI prefix for `x ≥ 0`.
fn si_prefix(x: f64, precision: Option<usize>) -> (i32, &'static str) {
    let mut e = 0;
    if x != 0. && x.is_finite() {
        let x = match precision {
            Some(p) if p > 0 => round_to(x, digits_after(x, p)),
            _ => x,
        };
        let i = 1 + (1e-12 + x.log10()).floor() as i32;
        e = ((i - 1) as f64 / 3.).floor() as i32 * 3;
        e = e.clamp(-24, 24);
    }
    (e, SI_PREFIXES[(8 + e / 3) as usize])
}

/// Number of decimals keeping `p` significant digits of `x`.
fn digits_after(x: f64, p: usize) -> i32 {
    p as i32 - if x != 0. { x.log10().ceil() as i32 } else { 1 }
}

fn round_to(x: f64, n: i32) -> f64 {
    if n == 0 { return x.round() }
    let k = 10f64.powi(n);
    (x * k).round() / k
}

fn shortest(x: f64) -> String {
    if x != 0. && x.is_finite() && (x.abs() >= 1e21 || x.abs() < 1e-6) {
        js_exponent(&format!("{x:e}"))
    } else if x.is_infinite() {
        "Infinity".to_string()
    } else {
        format!("{x}")
    }
}

/// Number of decimals of the exact value of `x`, that is its number
/// of binary digits after the point.
fn exact_decimals(x: f64) -> u32 {
    if x.fract() == 0. { return 0 }
    let bits = x.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    let mantissa = bits & ((1 << 52) - 1);
    let (mantissa, e) = if biased == 0 { (mantissa, -1074) }
                        else { (mantissa | 1 << 52, biased - 1075) };
    (-(e + mantissa.trailing_zeros() as i32)).max(0) as u32
}

/// `x` with `p` decimals, ties away from zero like JavaScript's
/// `toFixed` (Rust rounds them to even).
fn fixed(x: f64, p: usize) -> String {
    if x.is_infinite() { return "Infinity".to_string() }
    // The exact value ends in 5 right after the last kept decimal:
    // nudge it past the tie.
    let x = if exact_decimals(x) as usize == p + 1 { f64::from_bits(x.to_bits() + 1) }
            else { x };
    format!("{x:.p$}")
}

fn exponential(x: f64, p: Option<usize>) -> String {
    if x.is_infinite() { return "Infinity".to_string() }
    match p {
        Some(p) => js_exponent(&format!("{x:.p$e}")),
        None => js_exponent(&format!("{x:e}")),
    }
}

fn significant(x: f64, p: usize) -> String {
    if x.is_infinite() { return "Infinity".to_string() }
    if x == 0. { return fixed(0., p - 1) }
    let s = format!("{:.*e}", p - 1, x);
    let e: i32 = s.rsplit('e').next().and_then(|e| e.parse().ok()).unwrap_or(0);
    if e < -6 || e >= p as i32 {
        js_exponent(&s)
    } else {
        fixed(x, (p as i32 - 1 - e) as usize)
    }
}

fn rounded(x: f64, p: usize) -> String {
    if x.is_infinite() { return "Infinity".to_string() }
    let x = round_to(x, digits_after(x, p));
    let d = digits_after(x * (1. + 1e-15), p).clamp(0, 20);
    fixed(x, d as usize)
}

/// Rust writes `1.5e3`, d3 `1.5e+3`.
fn js_exponent(s: &str) -> String {
    match s.split_once('e') {
        Some((m, e)) if !e.starts_with('-') => format!("{m}e+{e}"),
        _ => s.to_string(),
    }
}

/// Insert thousands separators in the integer part.
fn group(s: &str) -> String {
    let end = s.find(|c: char| c == '.' || c == 'e').unwrap_or(s.len());
    let (int, rest) = s.split_at(end);
    if !int.bytes().all(|b| b.is_ascii_digit()) { return s.to_string() }
    let mut out = String::with_capacity(s.len() + int.len() / 3);
    for (k, c) in int.chars().enumerate() {
        if k > 0 && (int.len() - k) % 3 == 0 { out.push(',') }
        out.push(c);
    }
    out.push_str(rest);
    out
}
