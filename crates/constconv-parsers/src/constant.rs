//! Exact constant values with Go-compatible display forms.
//!
//! Integers are arbitrary precision, floats are exact rationals and complex
//! numbers are pairs of rationals. Display strings follow the classic Go
//! constant formatting: `%.6g` for floats, quoted strings shortened to 72
//! runes, `(re + imi)` for complex values.

use std::cmp::Ordering;
use std::f64::consts::{LN_10, LN_2};

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::quote::quote_bytes;
use crate::types::Kind;

const MAX_STRING_DISPLAY: usize = 72;

/// An exact rational number in lowest terms with a positive denominator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rat {
    num: BigInt,
    den: BigInt,
}

impl Rat {
    /// Build `num/den`; `None` when `den` is zero.
    pub fn new(num: BigInt, den: BigInt) -> Option<Self> {
        if den.is_zero() {
            return None;
        }
        let (num, den) = if den.is_negative() { (-num, -den) } else { (num, den) };
        let g = gcd(num.abs(), den.clone());
        if g.is_one() {
            Some(Self { num, den })
        } else {
            Some(Self {
                num: num / &g,
                den: den / &g,
            })
        }
    }

    pub fn from_int(num: BigInt) -> Self {
        Self {
            num,
            den: BigInt::one(),
        }
    }

    pub fn zero() -> Self {
        Self::from_int(BigInt::zero())
    }

    pub fn numer(&self) -> &BigInt {
        &self.num
    }

    pub fn denom(&self) -> &BigInt {
        &self.den
    }

    pub fn is_int(&self) -> bool {
        self.den.is_one()
    }

    pub fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.num.is_negative()
    }

    pub fn neg(&self) -> Self {
        Self {
            num: -&self.num,
            den: self.den.clone(),
        }
    }

    pub fn add(&self, other: &Self) -> Self {
        Self::reduced(&self.num * &other.den + &other.num * &self.den, &self.den * &other.den)
    }

    pub fn sub(&self, other: &Self) -> Self {
        self.add(&other.neg())
    }

    pub fn mul(&self, other: &Self) -> Self {
        Self::reduced(&self.num * &other.num, &self.den * &other.den)
    }

    pub fn div(&self, other: &Self) -> Option<Self> {
        Self::new(&self.num * &other.den, &self.den * &other.num)
    }

    /// Integer part, rounded toward zero.
    pub fn trunc(&self) -> BigInt {
        &self.num / &self.den
    }

    fn reduced(num: BigInt, den: BigInt) -> Self {
        // den is a product of positive denominators here
        Self::new(num, den).unwrap_or_else(Self::zero)
    }

    /// Exact value of a finite `f64`.
    pub fn from_f64(f: f64) -> Option<Self> {
        if !f.is_finite() {
            return None;
        }
        let bits = f.to_bits();
        let negative = bits >> 63 == 1;
        let exp = ((bits >> 52) & 0x7ff) as i64;
        let frac = bits & ((1u64 << 52) - 1);
        let (mant, e) = if exp == 0 {
            (frac, -1074)
        } else {
            (frac | (1u64 << 52), exp - 1075)
        };
        let mut num = BigInt::from(mant);
        if negative {
            num = -num;
        }
        if e >= 0 {
            Some(Self::from_int(num << (e as usize)))
        } else {
            Self::new(num, BigInt::one() << ((-e) as usize))
        }
    }

    /// Nearest `f64` (ties to even).
    pub fn to_f64(&self) -> f64 {
        self.to_float_bits(53)
    }

    /// Nearest `f32`, widened to `f64`.
    pub fn to_f32(&self) -> f64 {
        let f = self.to_float_bits(24);
        if f.abs() > f32::MAX as f64 {
            f.signum() * f64::INFINITY
        } else {
            f
        }
    }

    fn to_float_bits(&self, mant_bits: u64) -> f64 {
        if self.num.is_zero() {
            return 0.0;
        }
        let negative = self.num.is_negative();
        let n = self.num.magnitude();
        let d = self.den.magnitude();
        let mut shift = mant_bits as i64 - (n.bits() as i64 - d.bits() as i64);
        let (mut q, r, divisor) = loop {
            let (a, b) = shifted(n, d, shift);
            let q = &a / &b;
            let bits = q.bits();
            if bits > mant_bits {
                shift -= 1;
            } else if bits < mant_bits {
                shift += 1;
            } else {
                let r = &a - &q * &b;
                break (q, r, b);
            }
        };
        let twice = &r << 1usize;
        let odd = (&q & BigUint::one()).is_one();
        if twice > divisor || (twice == divisor && odd) {
            q += 1u32;
            if q.bits() > mant_bits {
                q >>= 1usize;
                shift -= 1;
            }
        }
        let mant = q.to_u64().map(|m| m as f64).unwrap_or(f64::INFINITY);
        let value = ldexp(mant, -shift);
        if negative {
            -value
        } else {
            value
        }
    }

    /// `(mantissa, exponent)` with `0.5 <= |mantissa| < 1` and
    /// `self == mantissa * 2^exponent` (approximately for the mantissa).
    fn mant_exp(&self) -> (f64, i64) {
        let mut exp = self.num.magnitude().bits() as i64 - self.den.magnitude().bits() as i64;
        let (a, b) = shifted(self.num.magnitude(), self.den.magnitude(), -exp);
        let scaled = Rat::new(BigInt::from(a), BigInt::from(b)).unwrap_or_else(Rat::zero);
        let mut mant = scaled.to_f64();
        while mant >= 1.0 {
            mant /= 2.0;
            exp += 1;
        }
        while mant > 0.0 && mant < 0.5 {
            mant *= 2.0;
            exp -= 1;
        }
        if self.num.is_negative() {
            mant = -mant;
        }
        (mant, exp)
    }
}

impl PartialOrd for Rat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rat {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.num * &other.den).cmp(&(&other.num * &self.den))
    }
}

/// `(n * 2^shift, d)` or `(n, d * 2^-shift)`.
fn shifted(n: &BigUint, d: &BigUint, shift: i64) -> (BigUint, BigUint) {
    if shift >= 0 {
        (n << (shift as usize), d.clone())
    } else {
        (n.clone(), d << ((-shift) as usize))
    }
}

fn gcd(mut a: BigInt, mut b: BigInt) -> BigInt {
    while !b.is_zero() {
        let r = &a % &b;
        a = b;
        b = r;
    }
    if a.is_zero() {
        BigInt::one()
    } else {
        a
    }
}

fn ldexp(mut x: f64, mut e: i64) -> f64 {
    while e > 1000 {
        x *= 2f64.powi(1000);
        e -= 1000;
        if x.is_infinite() {
            return x;
        }
    }
    while e < -1000 {
        x *= 2f64.powi(-1000);
        e += 1000;
        if x == 0.0 {
            return x;
        }
    }
    x * 2f64.powi(e as i32)
}

/// A constant value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstValue {
    Unknown,
    Bool(bool),
    String(Vec<u8>),
    Int(BigInt),
    Float(Rat),
    Complex(Rat, Rat),
}

impl ConstValue {
    pub fn kind(&self) -> Kind {
        match self {
            ConstValue::Unknown => Kind::Unknown,
            ConstValue::Bool(_) => Kind::Bool,
            ConstValue::String(_) => Kind::String,
            ConstValue::Int(_) => Kind::Int,
            ConstValue::Float(_) => Kind::Float,
            ConstValue::Complex(..) => Kind::Complex,
        }
    }

    pub fn int(value: impl Into<BigInt>) -> Self {
        ConstValue::Int(value.into())
    }

    pub fn string(value: impl Into<Vec<u8>>) -> Self {
        ConstValue::String(value.into())
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ConstValue::Int(_) | ConstValue::Float(_) | ConstValue::Complex(..)
        )
    }

    /// Default display form.
    pub fn display_string(&self) -> String {
        match self {
            ConstValue::Unknown => "unknown".to_string(),
            ConstValue::Bool(b) => b.to_string(),
            ConstValue::String(s) => shorten(quote_bytes(s)),
            ConstValue::Int(i) => i.to_string(),
            ConstValue::Float(r) => format_float(r),
            ConstValue::Complex(re, im) => {
                format!("({} + {}i)", format_float(re), format_float(im))
            }
        }
    }

    /// Exact form: full strings, `num/den` for non-integral floats.
    pub fn exact_string(&self) -> String {
        match self {
            ConstValue::String(s) => quote_bytes(s),
            ConstValue::Float(r) => exact_rat(r),
            ConstValue::Complex(re, im) => format!("({} + {}i)", exact_rat(re), exact_rat(im)),
            other => other.display_string(),
        }
    }

    /// Rank used to bring numeric operands to a common representation.
    fn numeric_rank(&self) -> u8 {
        match self {
            ConstValue::Int(_) => 1,
            ConstValue::Float(_) => 2,
            ConstValue::Complex(..) => 3,
            _ => 0,
        }
    }

    /// Integer value, if this is a numeric constant with an integral value.
    pub fn to_int(&self) -> Option<BigInt> {
        match self {
            ConstValue::Int(i) => Some(i.clone()),
            ConstValue::Float(r) if r.is_int() => Some(r.numer().clone()),
            ConstValue::Complex(re, im) if im.is_zero() && re.is_int() => Some(re.numer().clone()),
            _ => None,
        }
    }

    /// Real value as a rational, if this is numeric with no imaginary part.
    pub fn to_rat(&self) -> Option<Rat> {
        match self {
            ConstValue::Int(i) => Some(Rat::from_int(i.clone())),
            ConstValue::Float(r) => Some(r.clone()),
            ConstValue::Complex(re, im) if im.is_zero() => Some(re.clone()),
            _ => None,
        }
    }

    fn to_complex(&self) -> Option<(Rat, Rat)> {
        match self {
            ConstValue::Int(i) => Some((Rat::from_int(i.clone()), Rat::zero())),
            ConstValue::Float(r) => Some((r.clone(), Rat::zero())),
            ConstValue::Complex(re, im) => Some((re.clone(), im.clone())),
            _ => None,
        }
    }

    /// Bring two numeric values to the same representation.
    pub fn matched(x: &Self, y: &Self) -> Option<(Self, Self)> {
        if !x.is_numeric() || !y.is_numeric() {
            return None;
        }
        let rank = x.numeric_rank().max(y.numeric_rank());
        Some((x.promote(rank)?, y.promote(rank)?))
    }

    fn promote(&self, rank: u8) -> Option<Self> {
        match rank {
            1 => self.to_int().map(ConstValue::Int),
            2 => self.to_rat().map(ConstValue::Float),
            3 => self.to_complex().map(|(re, im)| ConstValue::Complex(re, im)),
            _ => None,
        }
    }

    pub fn negate(&self) -> Option<Self> {
        match self {
            ConstValue::Int(i) => Some(ConstValue::Int(-i)),
            ConstValue::Float(r) => Some(ConstValue::Float(r.neg())),
            ConstValue::Complex(re, im) => Some(ConstValue::Complex(re.neg(), im.neg())),
            _ => None,
        }
    }

    /// Arithmetic and bitwise operators. `/` on two integers is integer
    /// division truncated toward zero.
    pub fn binary(op: &str, x: &Self, y: &Self) -> Option<Self> {
        match (op, x, y) {
            ("+", ConstValue::String(a), ConstValue::String(b)) => {
                let mut s = a.clone();
                s.extend_from_slice(b);
                return Some(ConstValue::String(s));
            }
            ("&&", ConstValue::Bool(a), ConstValue::Bool(b)) => return Some(ConstValue::Bool(*a && *b)),
            ("||", ConstValue::Bool(a), ConstValue::Bool(b)) => return Some(ConstValue::Bool(*a || *b)),
            _ => {}
        }
        let (x, y) = Self::matched(x, y)?;
        match (&x, &y) {
            (ConstValue::Int(a), ConstValue::Int(b)) => {
                let v = match op {
                    "+" => a + b,
                    "-" => a - b,
                    "*" => a * b,
                    "/" | "%" if b.is_zero() => return None,
                    "/" => a / b,
                    "%" => a % b,
                    "&" => a & b,
                    "|" => a | b,
                    "^" => a ^ b,
                    "&^" => a & !b,
                    _ => return None,
                };
                Some(ConstValue::Int(v))
            }
            (ConstValue::Float(a), ConstValue::Float(b)) => {
                let v = match op {
                    "+" => a.add(b),
                    "-" => a.sub(b),
                    "*" => a.mul(b),
                    "/" => a.div(b)?,
                    _ => return None,
                };
                Some(ConstValue::Float(v))
            }
            (ConstValue::Complex(a, b), ConstValue::Complex(c, d)) => {
                let (re, im) = match op {
                    "+" => (a.add(c), b.add(d)),
                    "-" => (a.sub(c), b.sub(d)),
                    "*" => (a.mul(c).sub(&b.mul(d)), b.mul(c).add(&a.mul(d))),
                    "/" => {
                        let denom = c.mul(c).add(&d.mul(d));
                        let re = a.mul(c).add(&b.mul(d)).div(&denom)?;
                        let im = b.mul(c).sub(&a.mul(d)).div(&denom)?;
                        (re, im)
                    }
                    _ => return None,
                };
                Some(ConstValue::Complex(re, im))
            }
            _ => None,
        }
    }

    /// `x << s` or `x >> s` for an integral `x`.
    pub fn shift(op: &str, x: &Self, count: &Self) -> Option<Self> {
        let x = x.to_int()?;
        let count = count.to_int()?;
        if count.is_negative() {
            return None;
        }
        let count = count.to_usize().filter(|c| *c <= 1074)?;
        match op {
            "<<" => Some(ConstValue::Int(x << count)),
            ">>" => Some(ConstValue::Int(x >> count)),
            _ => None,
        }
    }

    pub fn compare(op: &str, x: &Self, y: &Self) -> Option<bool> {
        let ordering = match (x, y) {
            (ConstValue::Bool(a), ConstValue::Bool(b)) => {
                return match op {
                    "==" => Some(a == b),
                    "!=" => Some(a != b),
                    _ => None,
                }
            }
            (ConstValue::String(a), ConstValue::String(b)) => a.cmp(b),
            _ => match Self::matched(x, y)? {
                (ConstValue::Int(a), ConstValue::Int(b)) => a.cmp(&b),
                (ConstValue::Float(a), ConstValue::Float(b)) => a.cmp(&b),
                (ConstValue::Complex(a, b), ConstValue::Complex(c, d)) => {
                    let equal = a == c && b == d;
                    return match op {
                        "==" => Some(equal),
                        "!=" => Some(!equal),
                        _ => None,
                    };
                }
                _ => return None,
            },
        };
        match op {
            "==" => Some(ordering == Ordering::Equal),
            "!=" => Some(ordering != Ordering::Equal),
            "<" => Some(ordering == Ordering::Less),
            "<=" => Some(ordering != Ordering::Greater),
            ">" => Some(ordering == Ordering::Greater),
            ">=" => Some(ordering != Ordering::Less),
            _ => None,
        }
    }
}

fn exact_rat(r: &Rat) -> String {
    if r.is_int() {
        r.numer().to_string()
    } else {
        format!("{}/{}", r.numer(), r.denom())
    }
}

fn shorten(quoted: String) -> String {
    if quoted.chars().count() <= MAX_STRING_DISPLAY {
        return quoted;
    }
    let mut s: String = quoted.chars().take(MAX_STRING_DISPLAY - 3).collect();
    s.push_str("...");
    s
}

/// Decimal approximation of a rational, `%.6g` style.
pub fn format_float(r: &Rat) -> String {
    let x = r.to_f64();
    if r.is_zero() == (x == 0.0) && x.is_finite() {
        let s = format_g(x, Some(6));
        if !r.is_int() && !s.contains('.') {
            // not an integer, but the short form hides that
            return format_g(x, None);
        }
        return s;
    }

    // Out of float64 range: approximate mantissa and decimal exponent.
    let (mant, exp) = r.mant_exp();
    let d = exp as f64 * (LN_2 / LN_10);
    let mut e = d as i64;
    let mut m = mant * 10f64.powf(d - e as f64);
    let am = m.abs();
    if am < 1.0 - 0.5e-6 {
        m *= 10.0;
        e -= 1;
    } else if am >= 10.0 {
        m /= 10.0;
        e += 1;
    }
    format!("{}e{:+}", format_g(m, Some(6)), e)
}

/// Go's `%g` (`prec == None`) and `%.<prec>g` verbs.
pub fn format_g(x: f64, prec: Option<usize>) -> String {
    if x == 0.0 {
        return if x.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    if x.is_infinite() {
        return if x < 0.0 { "-Inf" } else { "+Inf" }.to_string();
    }
    if x.is_nan() {
        return "NaN".to_string();
    }
    let (digits, dp) = decimal_digits(x.abs(), prec);
    let nd = digits.len() as i64;
    let shortest = prec.is_none();
    let mut p = prec.map(|p| p.max(1) as i64).unwrap_or(nd);

    let mut eprec = p;
    if eprec > nd && nd >= dp {
        eprec = nd;
    }
    if shortest {
        eprec = 6;
    }
    let exp = dp - 1;

    let mut out = String::new();
    if x < 0.0 {
        out.push('-');
    }
    if exp < -4 || exp >= eprec {
        if p > nd {
            p = nd;
        }
        fmt_e(&mut out, &digits, dp, p - 1);
    } else {
        if p > dp {
            p = nd;
        }
        fmt_f(&mut out, &digits, dp, (p - dp).max(0));
    }
    out
}

/// Significant decimal digits (trailing zeros trimmed) and the decimal
/// point position, so that `x = 0.d1d2... * 10^dp`.
fn decimal_digits(x: f64, prec: Option<usize>) -> (Vec<u8>, i64) {
    let s = match prec {
        Some(p) => format!("{:.*e}", p.max(1) - 1, x),
        None => format!("{:e}", x),
    };
    let (mant, exp) = s.split_once('e').unwrap_or((s.as_str(), "0"));
    let exp: i64 = exp.parse().unwrap_or(0);
    let mut digits: Vec<u8> = mant.bytes().filter(u8::is_ascii_digit).collect();
    while digits.len() > 1 && digits.last() == Some(&b'0') {
        digits.pop();
    }
    (digits, exp + 1)
}

fn fmt_e(out: &mut String, digits: &[u8], dp: i64, prec: i64) {
    out.push(digits.first().copied().unwrap_or(b'0') as char);
    if prec > 0 {
        out.push('.');
        for i in 1..=prec as usize {
            out.push(digits.get(i).copied().unwrap_or(b'0') as char);
        }
    }
    out.push('e');
    let exp = if digits.iter().all(|d| *d == b'0') { 0 } else { dp - 1 };
    out.push(if exp < 0 { '-' } else { '+' });
    let exp = exp.abs();
    if exp < 10 {
        out.push('0');
    }
    out.push_str(&exp.to_string());
}

fn fmt_f(out: &mut String, digits: &[u8], dp: i64, prec: i64) {
    if dp > 0 {
        for i in 0..dp as usize {
            out.push(digits.get(i).copied().unwrap_or(b'0') as char);
        }
    } else {
        out.push('0');
    }
    if prec > 0 {
        out.push('.');
        for i in 1..=prec {
            let idx = dp + i - 1;
            let d = if idx >= 0 {
                digits.get(idx as usize).copied().unwrap_or(b'0')
            } else {
                b'0'
            };
            out.push(d as char);
        }
    }
}

/// Parse a Go integer literal: decimal, `0x`, `0o`, `0b` or legacy octal,
/// with optional `_` separators.
pub fn parse_int_literal(lit: &str) -> Option<BigInt> {
    let clean: String = lit.chars().filter(|c| *c != '_').collect();
    let lower = clean.to_ascii_lowercase();
    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (&lower[1..], 8)
    } else {
        (lower.as_str(), 10)
    };
    if digits.is_empty() {
        return None;
    }
    BigInt::parse_bytes(digits.as_bytes(), radix)
}

/// Parse a Go float literal (decimal or hexadecimal) exactly.
pub fn parse_float_literal(lit: &str) -> Option<Rat> {
    let clean: String = lit.chars().filter(|c| *c != '_').collect();
    let lower = clean.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        let (mantissa, exp) = hex.split_once('p')?;
        let exp: i64 = exp.parse().ok()?;
        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        let digits = format!("{}{}", int_part, frac_part);
        if digits.is_empty() {
            return None;
        }
        let num = BigInt::parse_bytes(digits.as_bytes(), 16)?;
        let exp = exp - 4 * frac_part.len() as i64;
        return scale_pow(num, 2, exp);
    }
    let (mantissa, exp) = match lower.split_once('e') {
        Some((m, e)) => (m, e.parse::<i64>().ok()?),
        None => (lower.as_str(), 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits = format!("{}{}", int_part, frac_part);
    if digits.is_empty() {
        return None;
    }
    let num = BigInt::parse_bytes(digits.as_bytes(), 10)?;
    scale_pow(num, 10, exp - frac_part.len() as i64)
}

fn scale_pow(num: BigInt, base: u32, exp: i64) -> Option<Rat> {
    if exp.unsigned_abs() > 100_000 {
        return None;
    }
    let factor = num_traits::pow(BigInt::from(base), exp.unsigned_abs() as usize);
    if exp >= 0 {
        Some(Rat::from_int(num * factor))
    } else {
        Rat::new(num, factor)
    }
}
