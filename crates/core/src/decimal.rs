//! Fixed-scale decimal numbers.
//!
//! A value is an unbounded integer mantissa counted in units of
//! `10^-DECIMAL_SCALE`. Results with more fractional digits than that are
//! rounded half-to-even, so repeated divide/multiply chains drift in a
//! predictable way. The integer part never overflows.

use crate::error::{Error, Result};
use crate::FieldType;
use core::cmp::Ordering;
use core::fmt;
use core::ops::{Add, Mul, Neg, Sub};
use core::str::FromStr;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{Signed, Zero};

/// Number of fractional digits kept after any operation.
pub const DECIMAL_SCALE: u32 = 18;

fn ten_pow(exp: u32) -> BigInt {
    BigInt::from(10u32).pow(exp)
}

/// `num / den` rounded half-to-even. `den` must be non-zero.
fn div_half_even(num: &BigInt, den: &BigInt) -> BigInt {
    let quotient = num / den;
    let remainder = num % den;
    if remainder.is_zero() {
        return quotient;
    }
    let twice = remainder.magnitude() * 2u32;
    let away = match twice.cmp(den.magnitude()) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => !(&quotient % 2u32).is_zero(),
    };
    if !away {
        quotient
    } else if num.is_negative() != den.is_negative() {
        quotient - 1
    } else {
        quotient + 1
    }
}

/// A signed decimal with [`DECIMAL_SCALE`] fractional digits.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Decimal(BigInt);

impl Decimal {
    /// Zero.
    pub const ZERO: Self = Self(BigInt::ZERO);

    /// One.
    pub fn one() -> Self {
        Self(ten_pow(DECIMAL_SCALE))
    }

    /// Rescales `mantissa * 10^-scale` to the fixed scale.
    fn from_scaled(mantissa: BigInt, scale: u32) -> Self {
        match scale.cmp(&DECIMAL_SCALE) {
            Ordering::Equal => Self(mantissa),
            Ordering::Less => Self(mantissa * ten_pow(DECIMAL_SCALE - scale)),
            Ordering::Greater => Self(div_half_even(&mantissa, &ten_pow(scale - DECIMAL_SCALE))),
        }
    }

    /// Creates a decimal from a mantissa and a scale: `num * 10^-scale`.
    pub fn new(num: i64, scale: u32) -> Self {
        Self::from_scaled(BigInt::from(num), scale)
    }

    /// Converts an unsigned integer without scaling.
    pub fn from_uint(value: &BigUint) -> Self {
        Self::from_uint_scaled(value, 0)
    }

    /// Converts base units into a decimal amount: `value / 10^decimals`.
    pub fn from_uint_scaled(value: &BigUint, decimals: u32) -> Self {
        Self::from_scaled(BigInt::from(value.clone()), decimals)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is below zero.
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    /// Checked division. Dividing by zero is an error.
    pub fn checked_div(&self, other: &Self) -> Result<Self> {
        if other.is_zero() {
            return Err(Error::arithmetic(format!("{} / 0", self)));
        }
        let num = &self.0 * ten_pow(DECIMAL_SCALE);
        Ok(Self(div_half_even(&num, &other.0)))
    }

    /// Divides by an unsigned integer.
    pub fn div_uint(&self, divisor: u64) -> Result<Self> {
        self.checked_div(&Self::from(divisor))
    }

    /// Moves the decimal point `places` digits to the left.
    pub fn shift(&self, places: u32) -> Self {
        Self(div_half_even(&self.0, &ten_pow(places)))
    }
}

impl Add for &Decimal {
    type Output = Decimal;

    fn add(self, other: &Decimal) -> Decimal {
        Decimal(&self.0 + &other.0)
    }
}

impl Sub for &Decimal {
    type Output = Decimal;

    fn sub(self, other: &Decimal) -> Decimal {
        Decimal(&self.0 - &other.0)
    }
}

impl Mul for &Decimal {
    type Output = Decimal;

    fn mul(self, other: &Decimal) -> Decimal {
        Decimal(div_half_even(&(&self.0 * &other.0), &ten_pow(DECIMAL_SCALE)))
    }
}

impl Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

impl fmt::Display for Decimal {
    /// Normalized form: no trailing fractional zeros, `"0"` for zero.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.magnitude().to_str_radix(10);
        let scale = DECIMAL_SCALE as usize;
        let padded = format!("{:0>width$}", digits, width = scale + 1);
        let (int, frac) = padded.split_at(padded.len() - scale);
        let frac = frac.trim_end_matches('0');

        if self.0.is_negative() {
            f.write_str("-")?;
        }
        f.write_str(int)?;
        if !frac.is_empty() {
            write!(f, ".{}", frac)?;
        }
        Ok(())
    }
}

impl FromStr for Decimal {
    type Err = Error;

    /// Parses `[-]digits[.digits]`. Extra fractional digits are rounded.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::parse(FieldType::Decimal, s);
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (int, frac) = body.split_once('.').unwrap_or((body, ""));
        let well_formed = !(int.is_empty() && frac.is_empty())
            && !(body.ends_with('.') && frac.is_empty())
            && int.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit());
        if !well_formed {
            return Err(invalid());
        }

        let digits = format!("{}{}", int, frac);
        let magnitude = BigUint::parse_bytes(digits.as_bytes(), 10).ok_or_else(invalid)?;
        let sign = if negative { Sign::Minus } else { Sign::Plus };
        let scale = u32::try_from(frac.len()).map_err(|_| invalid())?;
        Ok(Self::from_scaled(BigInt::from_biguint(sign, magnitude), scale))
    }
}

impl From<u64> for Decimal {
    fn from(value: u64) -> Self {
        Self::from_scaled(BigInt::from(value), 0)
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self::from_scaled(BigInt::from(value), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_decimal_display_is_normalized() {
        assert_eq!(dec("1.500").to_string(), "1.5");
        assert_eq!(dec("0.000").to_string(), "0");
        assert_eq!(dec("-0").to_string(), "0");
        assert_eq!(Decimal::ZERO.to_string(), "0");
        assert_eq!(dec("100").to_string(), "100");
        assert_eq!(dec("-0.25").to_string(), "-0.25");
        assert_eq!(dec(".5").to_string(), "0.5");
    }

    #[test]
    fn test_decimal_shift() {
        let v = Decimal::from(22u64).shift(2);
        assert_eq!(v.to_string(), "0.22");

        let wei = BigUint::from(1_500_000_000_000_000_000u64);
        let amount = Decimal::from_uint(&wei).shift(18);
        assert_eq!(amount.to_string(), "1.5");
    }

    #[test]
    fn test_decimal_from_uint_scaled() {
        let raw = BigUint::from(4_000_000_000_000_000_000u64);
        assert_eq!(Decimal::from_uint_scaled(&raw, 18), dec("4"));

        let raw = BigUint::from(1234u64);
        assert_eq!(Decimal::from_uint_scaled(&raw, 2), dec("12.34"));

        // more decimals than the kept scale rounds the last digit
        let raw = BigUint::from(15u64);
        assert_eq!(Decimal::from_uint_scaled(&raw, 19).to_string(), "0.000000000000000002");
    }

    #[test]
    fn test_decimal_large_amounts() {
        let raw = BigUint::from(10u32).pow(30);
        let amount = Decimal::from_uint_scaled(&raw, 18);
        assert_eq!(amount.to_string(), "1000000000000");

        let max = BigUint::from_bytes_be(&[0xff; 32]);
        let amount = Decimal::from_uint_scaled(&max, 18);
        assert_eq!(
            amount.to_string(),
            "115792089237316195423570985008687907853269984665640564039457.584007913129639935"
        );
        assert_eq!(dec(&amount.to_string()), amount);

        let reserve = dec("100000000000000000000000000000");
        let doubled = &reserve + &reserve;
        assert_eq!(doubled.to_string(), "200000000000000000000000000000");
        assert_eq!(doubled.checked_div(&reserve).unwrap(), dec("2"));
    }

    #[test]
    fn test_decimal_rounding_policy() {
        let third = Decimal::one().checked_div(&Decimal::from(3u64)).unwrap();
        assert_eq!(third.to_string(), "0.333333333333333333");

        let two_thirds = Decimal::from(2u64).checked_div(&Decimal::from(3u64)).unwrap();
        assert_eq!(two_thirds.to_string(), "0.666666666666666667");

        let minus = (-Decimal::from(2u64)).checked_div(&Decimal::from(3u64)).unwrap();
        assert_eq!(minus.to_string(), "-0.666666666666666667");

        // half-to-even at the 18th digit
        assert_eq!(dec("0.0000000000000000005").to_string(), "0");
        assert_eq!(dec("0.0000000000000000015").to_string(), "0.000000000000000002");
        assert_eq!(dec("-0.0000000000000000015").to_string(), "-0.000000000000000002");
        assert_eq!(dec("0.0000000000000000025").to_string(), "0.000000000000000002");
    }

    #[test]
    fn test_decimal_division_by_zero() {
        assert!(Decimal::one().checked_div(&Decimal::ZERO).is_err());
        assert!(Decimal::one().div_uint(0).is_err());
    }

    #[test]
    fn test_decimal_parse_rejects_garbage() {
        for bad in ["", "abc", " 1", "1 ", "1.", ".", "-", "1.2.3", "+1", "1e5", "--1"] {
            assert!(bad.parse::<Decimal>().is_err(), "{:?}", bad);
        }
    }

    #[test]
    fn test_decimal_arithmetic() {
        let a = dec("1.25");
        let b = dec("0.75");
        assert_eq!(&a + &b, dec("2"));
        assert_eq!(&a - &b, dec("0.5"));
        assert_eq!(&a * &b, dec("0.9375"));
        assert!((&b - &a).is_negative());
        assert_eq!(&dec("0.000000000000000001") * &dec("0.5"), Decimal::ZERO);
    }
}
